use axum::Router;
use launchgate_core::Result;
use launchgate_provider::{MemoryPlatformRegistry, MemoryStateStore, Platform};
use launchgate_server::app;
use launchgate_server::auth::Provider;
use launchgate_server::config::{ServerConfig, parse_platforms};
use launchgate_server::db::{PgNonceStore, PgPlatformRegistry, PgStateStore, Stores};
use launchgate_server::error::StartupError;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often expired login states and nonces are deleted.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(report) = run().await {
        tracing::error!("{report}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    // Load configuration from environment
    let config = ServerConfig::from_env().map_err(|e| StartupError::Config {
        details: e.to_string(),
    })?;
    tracing::info!("Loaded configuration");

    let platforms = match &config.platforms_file {
        Some(path) => parse_platforms(&read_file(path)?).map_err(|e| StartupError::File {
            path: path.display().to_string(),
            details: e.to_string(),
        })?,
        None => Vec::new(),
    };
    let keyset: Option<Value> = match &config.keyset_file {
        Some(path) => Some(serde_json::from_str(&read_file(path)?).map_err(|e| {
            StartupError::File {
                path: path.display().to_string(),
                details: e.to_string(),
            }
        })?),
        None => None,
    };

    let stores = match &config.database_url {
        Some(url) => postgres_stores(url, platforms).await?,
        None => {
            tracing::warn!(
                "No DATABASE_URL configured; login state, nonces and platforms are kept in memory"
            );
            memory_stores(platforms)
        }
    };

    let mut builder = Provider::builder(config.provider)
        .cookies(config.cookies)
        .stores(stores);
    if let Some(keyset) = keyset {
        builder = builder.keyset(keyset);
    }
    let provider = builder.build().map_err(|report| StartupError::Provider {
        details: report.to_string(),
    })?;

    let app = app::router(Arc::new(provider), Router::new());

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .map_err(|e| StartupError::Serve {
            details: format!("failed to bind to {}: {e}", config.bind_address),
        })?;

    tracing::info!("listening on http://{}", config.bind_address);

    axum::serve(listener, app.into_make_service())
        .await
        .map_err(|e| StartupError::Serve {
            details: e.to_string(),
        })?;

    Ok(())
}

fn read_file(path: &Path) -> Result<String, StartupError> {
    Ok(std::fs::read_to_string(path).map_err(|e| StartupError::File {
        path: path.display().to_string(),
        details: e.to_string(),
    })?)
}

async fn postgres_stores(url: &str, platforms: Vec<Platform>) -> Result<Stores, StartupError> {
    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(url)
        .await
        .map_err(database)?;

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(database)?;

    let registry = PgPlatformRegistry::new(pool.clone());
    for platform in &platforms {
        registry.upsert(platform).await.map_err(database)?;
    }
    if !platforms.is_empty() {
        tracing::info!(count = platforms.len(), "Registered platforms from file");
    }

    // Spawn periodic cleanup of expired login state
    let states = PgStateStore::new(pool.clone());
    let nonces = PgNonceStore::new(pool.clone());
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match states.purge_expired().await {
                Ok(count) if count > 0 => {
                    tracing::debug!(deleted_states = count, "Periodic state cleanup");
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Failed to cleanup expired states"),
            }
            if let Err(e) = nonces.purge_expired().await {
                tracing::warn!(error = %e, "Failed to cleanup expired nonces");
            }
        }
    });

    Ok(Stores::postgres(pool))
}

fn database(e: impl std::fmt::Display) -> StartupError {
    StartupError::Database {
        details: e.to_string(),
    }
}

fn memory_stores(platforms: Vec<Platform>) -> Stores {
    let registry = MemoryPlatformRegistry::new();
    for platform in platforms {
        registry.register(platform);
    }

    let states = Arc::new(MemoryStateStore::new());
    let purge = states.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let count = purge.purge_expired();
            if count > 0 {
                tracing::debug!(deleted_states = count, "Periodic state cleanup");
            }
        }
    });

    Stores::in_memory()
        .with_platforms(Arc::new(registry))
        .with_states(states)
}
