use wingman_protocol::RoutingSelector;

/// Deterministically derive a session key from an agent id and routing.
///
/// Identical `(agent_id, routing)` always yields an identical key, across
/// restarts and process boundaries — callers must never introduce
/// wall-clock time, randomness, or process-local identifiers here.
///
/// Rules:
/// - No routing, or a `dm`-kind peer: `agent:{agentId}:main`.
/// - Otherwise: `agent:{agentId}:{channel}` followed by `account:{accountId}`
///   (if present), `{peer.kind}:{peer.id}` (if present), and
///   `thread:{threadId}` (if present), joined with `:`. If none of those
///   three optional segments were present, `:main` is appended so a bare
///   channel binding still lands on a stable "main" thread.
#[must_use]
pub fn derive_session_key(agent_id: &str, routing: Option<&RoutingSelector>) -> String {
    let Some(routing) = routing else {
        return format!("agent:{agent_id}:main");
    };
    if routing.peer.as_ref().is_some_and(|p| p.kind == "dm") {
        return format!("agent:{agent_id}:main");
    }

    let channel = routing.channel.as_deref().unwrap_or("unknown");
    let mut segments = vec!["agent".to_string(), agent_id.to_string(), channel.to_string()];
    let fixed_len = segments.len();

    if let Some(account_id) = &routing.account_id {
        segments.push(format!("account:{account_id}"));
    }
    if let Some(peer) = &routing.peer {
        segments.push(format!("{}:{}", peer.kind, peer.id));
    }
    if let Some(thread_id) = &routing.thread_id {
        segments.push(format!("thread:{thread_id}"));
    }
    if segments.len() == fixed_len {
        segments.push("main".to_string());
    }
    segments.join(":")
}
