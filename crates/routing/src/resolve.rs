use wingman_protocol::RoutingSelector;

use crate::{Binding, Error, Result, key::derive_session_key};

/// Resolved route: which agent handles this message and the session key it
/// should be scheduled under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub agent_id: String,
    pub session_key: String,
}

/// Resolve which agent should handle a request, then derive its session key.
///
/// Agent resolution order:
/// 1. `explicit_agent_id`, if the caller supplied one.
/// 2. The first binding whose `match` fields are all satisfied by `routing`.
/// 3. `default_agent`.
/// 4. The first entry of `configured_agents`.
///
/// Session key resolution: `explicit_session_key` if supplied, otherwise the
/// pure derivation in [`crate::key::derive_session_key`].
pub fn resolve_agent_route(
    explicit_agent_id: Option<&str>,
    explicit_session_key: Option<&str>,
    routing: Option<&RoutingSelector>,
    bindings: &[Binding],
    default_agent: Option<&str>,
    configured_agents: &[String],
) -> Result<ResolvedRoute> {
    let agent_id = resolve_agent_id(
        explicit_agent_id,
        routing,
        bindings,
        default_agent,
        configured_agents,
    )?;

    let session_key = match explicit_session_key {
        Some(key) => key.to_string(),
        None => derive_session_key(&agent_id, routing),
    };

    Ok(ResolvedRoute {
        agent_id,
        session_key,
    })
}

fn resolve_agent_id(
    explicit_agent_id: Option<&str>,
    routing: Option<&RoutingSelector>,
    bindings: &[Binding],
    default_agent: Option<&str>,
    configured_agents: &[String],
) -> Result<String> {
    if let Some(agent_id) = explicit_agent_id {
        return Ok(agent_id.to_string());
    }

    let empty_routing = RoutingSelector::default();
    let routing = routing.unwrap_or(&empty_routing);
    for binding in bindings {
        if binding.match_.matches(routing) {
            return Ok(binding.agent_id.clone());
        }
    }

    if let Some(default_agent) = default_agent {
        return Ok(default_agent.to_string());
    }

    configured_agents
        .first()
        .cloned()
        .ok_or(Error::NotConfigured)
}
