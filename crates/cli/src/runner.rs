//! The Agent Runner seam (§3): invoking an agent — the LLM call, tool
//! execution, provider selection — is explicitly out of this repository's
//! scope. `PlaceholderRunner` is the integration point a real agent runtime
//! plugs into by implementing [`wingman_gateway::AgentRunner`] and handing
//! an `Arc` of it to [`wingman_gateway::build_state`] in place of this one.

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wingman_gateway::{AgentRequest, AgentRunner, RunnerError};
use wingman_protocol::AgentEventPayload;

pub struct PlaceholderRunner;

impl AgentRunner for PlaceholderRunner {
    fn run(
        &self,
        request: AgentRequest,
        events: mpsc::UnboundedSender<AgentEventPayload>,
        _cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<(), RunnerError>> {
        Box::pin(async move {
            let _ = events.send(AgentEventPayload::AgentError {
                code: "NotImplemented".into(),
                message: format!(
                    "no agent runtime configured for agent '{}'; wire a real AgentRunner in",
                    request.agent_id
                ),
            });
            Err(RunnerError::hard("NotImplemented", "no agent runtime configured"))
        })
    }
}
