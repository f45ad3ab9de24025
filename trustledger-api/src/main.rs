//! # TrustLedger API Server
//!
//! Serves the membership and payments ledger of the trust over a JSON API.
//!
//! ## Startup
//!
//! 1. Load configuration from the environment
//! 2. Open the record store (PostgreSQL with migrations, or in-memory)
//! 3. Create the admin account if configured and missing
//! 4. Serve until Ctrl-C / SIGTERM
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p trustledger-api
//! ```

use std::sync::Arc;

use anyhow::Context;
use trustledger_api::{
    app::{build_router, AppState},
    config::{Config, StoreBackend},
};
use trustledger_shared::{
    db::{
        migrations::{ensure_database_exists, run_migrations},
        pool::{create_pool, DatabaseConfig},
    },
    store::{memory::MemoryStore, postgres::PgStore},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "trustledger_api=debug,trustledger_shared=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first so .env can set RUST_LOG
    let config = Config::from_env()?;
    init_tracing();

    tracing::info!(
        "TrustLedger API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let state = match config.store.backend {
        StoreBackend::Postgres => {
            let url = config
                .store
                .database_url
                .clone()
                .context("DATABASE_URL environment variable is required")?;

            ensure_database_exists(&url).await.context("Failed to prepare database")?;

            let pool = create_pool(DatabaseConfig {
                url,
                max_connections: config.store.max_connections,
                ..Default::default()
            })
            .await
            .context("Failed to connect to database")?;

            run_migrations(&pool).await.context("Failed to run migrations")?;

            AppState::new(Arc::new(PgStore::new(pool)), config)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on shutdown");
            AppState::new(Arc::new(MemoryStore::new()), config)
        }
    };

    if let Some(admin) = state.config.admin.clone() {
        let created = state
            .ledger
            .bootstrap_admin(&admin.username, &admin.password)
            .await
            .context("Failed to bootstrap admin account")?;
        if !created {
            tracing::debug!(username = %admin.username, "Admin account already exists");
        }
    }

    let address = state.config.bind_address();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!("Server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
