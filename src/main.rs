use std::net::SocketAddr;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use finance_ledger::jobs::AccrualScheduler;
use finance_ledger::ledger::Ledger;
use finance_ledger::profit::ProfitConfig;
use finance_ledger::snapshot::SnapshotBook;
use finance_ledger::storage::PgStore;
use finance_ledger::{build_router, AppState, Config};

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "finance_ledger=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Starting financeLedger server");

    let snapshots = SnapshotBook::new();

    // With a database the journal is loaded at boot and kept in sync;
    // without one the ledger lives purely in memory.
    let (ledger, repo) = match &config.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(database_url)
                .await?;
            finance_ledger::db::verify_connection(&pool).await?;

            let store = PgStore::new(pool);
            store.ensure_schema().await?;
            let state = store.load_state().await?;
            store.load_snapshots(&snapshots).await?;
            tracing::info!("Database connected and state loaded");

            (Ledger::from_state(state), Some(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, running with in-memory state only");
            (Ledger::new(), None)
        }
    };

    let profit = ProfitConfig {
        min_accrual_days: config.accrual_min_interval_days,
        year_length_days: config.year_length_days,
        breakage_floor: config.breakage_floor,
    };
    let state = AppState::new(ledger, snapshots, profit, repo);

    let scheduler = AccrualScheduler::new(
        state.clone(),
        Duration::from_secs(config.scheduler_tick_secs),
    );
    let scheduler_handle = scheduler.start();

    tracing::info!("Listening on http://{}", addr);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutting down...");
    scheduler_handle.abort();
    tracing::info!("Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
