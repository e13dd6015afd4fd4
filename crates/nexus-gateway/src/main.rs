use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use nexus_core::config::NexusConfig;
use nexus_github::GithubClient;
use nexus_scheduler::{LogNotifier, Notifier, TeardownScheduler};
use nexus_services::{ServiceReconciler, SqliteServiceStore};
use nexus_store::SqliteKv;
use tracing::{info, warn};

mod app;
mod http;
mod notify;

#[derive(Parser, Debug)]
#[command(name = "nexus-gateway", version, about = "Nexus stack control plane")]
struct Cli {
    /// Path to nexus.toml (default: ~/.nexus/nexus.toml)
    #[arg(long, env = "NEXUS_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nexus_gateway=info,tower_http=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = NexusConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        NexusConfig::default()
    });

    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");
    let db = rusqlite::Connection::open(&db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;
    nexus_store::db::init_db(&db)?;
    nexus_services::db::init_db(&db)?;
    info!("database migrations complete");

    // each store gets its own connection
    let settings = Arc::new(SqliteKv::new(rusqlite::Connection::open(&db_path)?)?);
    let service_store = Arc::new(SqliteServiceStore::new(rusqlite::Connection::open(
        &db_path,
    )?)?);
    let reconciler = ServiceReconciler::new(service_store);

    let client = match &config.github {
        Some(gh) => Some(Arc::new(GithubClient::new(gh.clone())?)),
        None => {
            warn!("no [github] section: status, services and trigger endpoints will fail");
            None
        }
    };
    let github = client.clone().map(app::GithubBinding::from_client);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    match (&client, config.scheduler.enabled) {
        (Some(client), true) => {
            let notifier: Arc<dyn Notifier> = match &config.notify.webhook_url {
                Some(url) => Arc::new(notify::WebhookNotifier::new(
                    url.clone(),
                    Duration::from_secs(client.config().timeout_secs),
                )?),
                None => Arc::new(LogNotifier),
            };
            let scheduler = Arc::new(TeardownScheduler::new(
                settings.clone(),
                client.clone(),
                notifier,
            ));
            let every = Duration::from_secs(config.scheduler.tick_secs.max(1));
            let cron = config.scheduler.cron.clone();
            tokio::spawn(scheduler.run(every, cron, shutdown_rx));
        }
        (None, true) => warn!("scheduled teardown inactive: github not configured"),
        (_, false) => info!("scheduled teardown ticker disabled by config"),
    }

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState::new(settings, reconciler, github));
    let router = app::build_router(state);

    info!("Nexus gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // signal scheduler to stop
    let _ = shutdown_tx.send(true);
    Ok(())
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %parent.display(), "could not create database directory: {e}");
            }
        }
    }
}
