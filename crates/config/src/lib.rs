//! Gateway configuration: schema, discovery, and `${ENV_VAR}` substitution.
//!
//! Config lives at `.wingman/wingman.config.json`, discovered by walking up
//! from the current directory, or at `$HOME/.wingman/gateway.json` as a
//! user-global fallback. `WINGMAN_GATEWAY_CONFIG` overrides both.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    env_subst::substitute_env,
    loader::{discover_and_load, find_config_path, load_config, save_config, wingman_home},
    schema::{
        AgentEntry, AgentsConfig, AuthConfig, AuthMode, GatewayConfig, WingmanConfig,
    },
};
