//! Route inbound messages to agents and build session keys.
//!
//! Binding cascade (precedence):
//! 1. Explicit `agentId` on the request.
//! 2. First binding whose specified `match` fields are all satisfied.
//! 3. `defaultAgent`.
//! 4. The first configured agent.

pub mod binding;
pub mod error;
pub mod key;
pub mod resolve;

pub use binding::{Binding, BindingMatch};
pub use error::{Error, Result};
pub use key::derive_session_key;
pub use resolve::{ResolvedRoute, resolve_agent_route};
