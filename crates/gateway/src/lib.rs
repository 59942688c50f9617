//! Wingman Gateway: the Connection Hub, Node Registry, Broadcast Groups,
//! Request Scheduler, and Session Persistence wiring that makes up the
//! long-lived server process multiplexing client connections onto a bounded
//! pool of agent workers.
//!
//! Lifecycle:
//! 1. Load + validate config (`wingman-config`).
//! 2. Open the SQLite pool, run each crate's own migrations.
//! 3. Build the connect-time authenticator, operator credential store,
//!    session manager, and request scheduler (given an `AgentRunner`
//!    supplied by the caller — invoking agents is out of scope here).
//! 4. Assemble the router and serve `/ws`, `/bridge/*`, `/api/*`,
//!    `/health`, `/stats` on the configured `host:port`.
//!
//! Agent invocation, LLM providers, and CLI UX all live outside this crate;
//! it is reached through the Agent Runner seam (`scheduler::AgentRunner`),
//! not by importing them directly.

pub mod agents_api;
pub mod auth_middleware;
pub mod bridge;
pub mod connections;
pub mod daemon;
pub mod error;
pub mod fs_api;
pub mod groups;
pub mod health;
pub mod nodes;
pub mod providers_api;
pub mod router;
pub mod scheduler;
pub mod sessions_api;
pub mod state;
pub mod subscriptions;
pub mod sweeper;
pub mod ws;

use std::sync::Arc;

pub use scheduler::{AgentRequest, AgentRunner, RunnerError, Scheduler, SchedulerConfig};
pub use state::GatewayState;
use wingman_auth::{ConnectAuthenticator, CredentialStore};
use wingman_config::WingmanConfig;
use wingman_sessions::SessionManager;

/// Run every crate's own migrations/table-init against one pool. There is no
/// `sqlx::migrate!` directory here deliberately: the sessions and auth
/// crates each own `CREATE TABLE IF NOT EXISTS` init routines scoped to
/// their tables, run in dependency order.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> anyhow::Result<()> {
    wingman_sessions::run_migrations(pool).await?;
    Ok(())
}

/// Build the shared [`GatewayState`] from a loaded config and a pool, wiring
/// up auth, sessions, and the scheduler. `runner` is the caller-supplied
/// Agent Runner; this crate only calls it through the [`AgentRunner`] trait.
pub async fn build_state(
    config: WingmanConfig,
    pool: sqlx::SqlitePool,
    runner: Arc<dyn AgentRunner>,
) -> anyhow::Result<Arc<GatewayState>> {
    run_migrations(&pool).await?;

    let connect_auth = ConnectAuthenticator::new(config.gateway.auth.clone());
    let credentials = Arc::new(CredentialStore::new(pool.clone()).await?);

    let wingman_home = wingman_config::wingman_home();
    let sessions = SessionManager::new(
        pool,
        wingman_home.join("sessions"),
        wingman_home.join("attachments"),
    );

    let scheduler_config = SchedulerConfig {
        max_concurrent_requests: config.gateway.max_concurrent_requests,
        graceful_shutdown: std::time::Duration::from_millis(config.gateway.graceful_shutdown_ms),
        coordinator_idle: std::time::Duration::from_secs(60),
        retry: scheduler::RetryPolicy::default(),
    };
    let scheduler = Scheduler::new(scheduler_config, runner);

    let metrics = wingman_metrics::init_metrics(wingman_metrics::MetricsRecorderConfig {
        enabled: true,
        global_labels: vec![("service".to_string(), "wingman-gateway".to_string())],
    })?;

    Ok(GatewayState::new(config, connect_auth, credentials, sessions, scheduler, metrics))
}

/// Serve the gateway on `config.gateway.host:port` until the process is
/// signalled to stop. Binds with `SO_REUSEADDR` semantics via the stdlib
/// `TcpListener`, same as this codebase's own server bring-up.
pub async fn serve(state: Arc<GatewayState>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.gateway.host, state.config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "wingman-gateway listening");

    sweeper::spawn(Arc::clone(&state));

    let app = router::build(state);
    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Resolves on SIGINT or SIGTERM, whichever arrives first, so a daemonized
/// gateway (`SIGTERM` from `daemon::stop`) and a foreground one (`Ctrl-C`)
/// both drain in-flight requests before the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let Ok(mut signal) = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) else {
            return;
        };
        signal.recv().await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("wingman-gateway: shutdown signal received, draining connections");
}
