use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use flowpanel::db::{FlowRepository, SeaOrmRepository};
use flowpanel::server::agent_state::{AgentCommandChannel, ConnectedAgents};
use flowpanel::server::config::ServerConfig;
use flowpanel::version::VERSION;
use flowpanel::web::{AppState, create_axum_router};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(log_dir: &str) -> WorkerGuard {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "server.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .json();

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sea_orm=warn,sqlx::query=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    guard
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal.");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Bare version output, handled before clap so it stays a single line.
    if std::env::args().any(|arg| arg == "--version") {
        println!("Server version: {VERSION}");
        return Ok(());
    }

    let args = Args::parse();

    // --- Server Config Setup ---
    let server_config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load server configuration: {e}");
            return Err(e.into());
        }
    };

    let _log_guard = init_logging(&server_config.log_dir);
    info!("Starting server, version: {}", VERSION);
    if server_config.panel_addr.is_none() {
        warn!("PANEL_ADDR not set, observer reconciliation will skip every node.");
    }

    // --- Database Pool Setup ---
    let mut opt = ConnectOptions::new(server_config.database_url.clone());
    opt.max_connections(server_config.db_max_connections);
    let db_pool: DatabaseConnection = Database::connect(opt).await.map_err(|e| {
        error!(error = %e, "Failed to create database connection.");
        e
    })?;
    let repo: Arc<dyn FlowRepository> = Arc::new(SeaOrmRepository::new(db_pool));

    // --- Agent Command Channel ---
    let connected_agents = ConnectedAgents::new();
    let command_channel = Arc::new(AgentCommandChannel::new(
        connected_agents.clone(),
        server_config.command_timeout(),
    ));

    let app_state = Arc::new(AppState::new(
        repo,
        connected_agents,
        command_channel,
        server_config.panel_addr.clone(),
    ));

    // --- Observer Reconciler Task ---
    let reconciler = app_state.reconciler.clone();
    let reconciler_task = tokio::spawn(reconciler.run(server_config.observer_interval()));

    // --- Axum HTTP Server Setup ---
    let addr: SocketAddr = server_config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "HTTP server listening");

    let app = create_axum_router(app_state);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reconciler_task.abort();
    info!("Server stopped.");
    Ok(())
}
