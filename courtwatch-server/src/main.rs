//! Courtwatch
//!
//! Watches tennis court availability scraped by external collectors and
//! alerts users about slots matching their preferences.

mod commands;
mod config;
mod roles;
mod server;
mod shutdown;
mod state;

use clap::{Parser, Subcommand};
use commands::TestEventArgs;
use config::file::LogFormat;
use config::{ConfigLoader, get_database_url, get_redis_url};
use courtwatch_core::broker::{RedisBroker, mask_redis_url};
use courtwatch_core::store::PgStore;
use roles::{Role, Services, build_notifier, spawn_role};
use server::{build_router, run_server};
use shutdown::{shutdown_signal, spawn_config_reload_handler};
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Slack on top of the coordinator's grace period when joining processors.
const JOIN_SLACK: Duration = Duration::from_secs(5);

/// Courtwatch - tennis court availability alerts
#[derive(Parser, Debug)]
#[command(name = "courtwatch")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "COURTWATCH_CONFIG", default_value = "./courtwatch.toml")]
    config: PathBuf,

    /// Override the health endpoint listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enqueue scraping tasks for due venues
    Scheduler,
    /// Turn new scrape logs into availability events
    Detector,
    /// Match availability events and send alerts
    Coordinator,
    /// Run every role in one process
    All,
    /// Send a sample alert through the configured notifier
    SendTest {
        #[arg(long)]
        to: String,
    },
    /// Publish a synthetic availability event
    PublishTestEvent(TestEventArgs),
    /// Show the best matches for a user among recently scraped slots
    Match {
        #[arg(long)]
        user: Uuid,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

impl Command {
    fn role(&self) -> Option<Role> {
        match self {
            Command::Scheduler => Some(Role::Scheduler),
            Command::Detector => Some(Role::Detector),
            Command::Coordinator => Some(Role::Coordinator),
            Command::All => Some(Role::All),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load()?;
    init_tracing(loaded_config.server.log_format);

    tracing::info!("Starting courtwatch v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Configuration loaded from {:?}", args.config);

    // The notifier needs no connection, so the test message goes out first.
    let notifier = build_notifier(&loaded_config.notifier).inspect_err(|e| {
        tracing::error!("Failed to build notifier: {}", e);
    })?;
    if let Command::SendTest { to } = &args.command {
        return commands::send_test(notifier, to).await;
    }

    let database_url = get_database_url().inspect_err(|_| {
        tracing::error!("DATABASE_URL environment variable not set");
    })?;
    let redis_url = get_redis_url().inspect_err(|_| {
        tracing::error!("REDIS_URL environment variable not set");
    })?;

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .inspect_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
        })?;
    tracing::info!("Database connection established");

    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .inspect_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
            })?;
        tracing::info!("Migrations completed successfully");
    }

    let broker = RedisBroker::connect(&redis_url).await.inspect_err(|e| {
        tracing::error!(url = %mask_redis_url(&redis_url), "Failed to connect to Redis: {}", e);
    })?;

    let services = Services {
        store: Arc::new(PgStore::new(db_pool.clone())),
        broker: Arc::new(broker),
        pool: db_pool.clone(),
    };

    let result = match (&args.command, args.command.role()) {
        (_, Some(role)) => run_role(role, &services, &loaded_config, config_loader, notifier).await,
        (Command::PublishTestEvent(event_args), None) => {
            commands::publish_test_event(services.broker.clone(), &loaded_config.detector, event_args)
                .await
                .map(|_| ())
        }
        (Command::Match { user, limit }, None) => {
            commands::match_user(
                &services,
                *user,
                *limit,
                loaded_config.coordinator.venue_utc_offset,
            )
            .await
        }
        (_, None) => Ok(()),
    };

    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Shutdown complete");

    result
}

/// Run the processors of `role` and the health endpoint until a shutdown
/// signal arrives.
async fn run_role(
    role: Role,
    services: &Services,
    loaded_config: &config::LoadedConfig,
    config_loader: Arc<ConfigLoader>,
    notifier: Arc<dyn courtwatch_core::notifier::Notifier>,
) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = signal_tx.send(true);
    });

    let running = spawn_role(role, services, loaded_config, notifier, shutdown_rx.clone());
    let reload_notify =
        spawn_config_reload_handler(config_loader, running.coordinator_config.clone());

    let router = build_router(AppState::new(running.health.clone(), role));
    let listen_addr = loaded_config.server.listen;
    tracing::info!(role = %role, "Starting health endpoint on {}", listen_addr);
    let result = run_server(router, listen_addr, shutdown_rx).await;
    if let Err(e) = &result {
        tracing::error!("Health endpoint failed: {}", e);
    }

    // The server returns on shutdown or on a bind error; the processors
    // stop in both cases.
    let _ = shutdown_tx.send(true);
    reload_notify.notify_one();
    running
        .join(loaded_config.coordinator.shutdown_grace + JOIN_SLACK)
        .await;

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}
