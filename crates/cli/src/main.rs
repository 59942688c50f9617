mod runner;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use sqlx::sqlite::SqliteConnectOptions;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "wingman", about = "Wingman Gateway — daemon lifecycle CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, env = "WINGMAN_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Run the gateway in the foreground. Set by `start`/`restart` when they
    /// re-exec themselves as the detached child; not meant to be passed by
    /// hand.
    #[arg(long, global = true, hide = true)]
    foreground: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway, detached from the current terminal.
    Start,
    /// Stop a running gateway (SIGTERM, then SIGKILL after a grace period).
    Stop,
    /// Report whether the gateway is running.
    Status,
    /// Stop and start the gateway.
    Restart,
}

fn init_telemetry(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    if cli.json_logs {
        registry.with(fmt::layer().json().with_target(true).with_thread_ids(false)).init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_thread_ids(false).with_ansi(true))
            .init();
    }
}

async fn open_pool() -> anyhow::Result<sqlx::SqlitePool> {
    let home = wingman_config::wingman_home();
    std::fs::create_dir_all(&home)?;
    let options = SqliteConnectOptions::new().filename(home.join("gateway.db")).create_if_missing(true);
    Ok(sqlx::SqlitePool::connect_with(options).await?)
}

async fn run_foreground() -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let config = wingman_config::discover_and_load(&cwd);
    let pool = open_pool().await?;
    let state = wingman_gateway::build_state(config, pool, Arc::new(runner::PlaceholderRunner)).await?;
    wingman_gateway::serve(state).await
}

/// Re-exec the current binary as a detached daemon running the given
/// subcommand; `daemon::start` itself appends `--foreground`.
fn spawn_detached(home: &std::path::Path, subcommand: &str) -> anyhow::Result<u32> {
    let exe = std::env::current_exe()?;
    let pid = wingman_gateway::daemon::start(home, &exe, &[subcommand.to_string()])?;
    Ok(pid)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);
    info!(version = env!("CARGO_PKG_VERSION"), "wingman starting");

    if cli.foreground {
        return run_foreground().await;
    }

    let home = wingman_config::wingman_home();

    match cli.command {
        Commands::Start => {
            let pid = spawn_detached(&home, "start")?;
            println!("gateway started, pid {pid}");
            Ok(())
        },
        Commands::Stop => {
            wingman_gateway::daemon::stop(&home).await?;
            println!("gateway stopped");
            Ok(())
        },
        Commands::Status => {
            match wingman_gateway::daemon::read_status(&home)? {
                Some(status) if status.running => {
                    println!(
                        "gateway running, pid {}, uptime {}s",
                        status.pid.unwrap_or_default(),
                        status.uptime_secs.unwrap_or_default()
                    );
                },
                _ => println!("gateway not running"),
            }
            Ok(())
        },
        Commands::Restart => {
            wingman_gateway::daemon::stop(&home).await?;
            let pid = spawn_detached(&home, "restart")?;
            println!("gateway restarted, pid {pid}");
            Ok(())
        },
    }
}
