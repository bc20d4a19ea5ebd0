//! # inspire-feed
//!
//! Entry point that assembles the service from compile-time features:
//! configuration, then tracing, then stores, then the router.

use std::sync::Arc;

use anyhow::Context;
use api_adapters::{router, AppState, Metrics, Ports};
use auth_adapters::JwtIdentityProvider;
use configs::{AppConfig, LogConfig};
use domains::{
    AvatarStore, InspireRepository, NotificationRepository, PostRepository, ProfileDirectory,
};
use secrecy::ExposeSecret;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Store adapters selected at compile time.
struct Stores {
    posts: Arc<dyn PostRepository>,
    inspires: Arc<dyn InspireRepository>,
    notifications: Arc<dyn NotificationRepository>,
    profiles: Arc<dyn ProfileDirectory>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    init_tracing(&config.log);

    let stores = build_stores(&config).await?;
    let identity = JwtIdentityProvider::new(
        config.auth.jwt_secret.expose_secret(),
        config.auth.issuer.clone(),
        config.auth.token_ttl_secs,
    );

    let state = AppState::new(
        Ports {
            posts: stores.posts,
            inspires: stores.inspires,
            notifications: stores.notifications,
            profiles: stores.profiles,
            avatars: build_avatars(&config),
            identity: Arc::new(identity),
        },
        Arc::new(Metrics::new()),
    );

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "inspire-feed listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;

    info!("shutdown complete");
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    // RUST_LOG wins over the configured directive
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let registry = tracing_subscriber::registry().with(filter);
    if log.json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().pretty()).init();
    }
}

#[cfg(feature = "db-postgres")]
async fn build_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    use storage_adapters::postgres;

    let pool = postgres::connect(
        config.database.url.expose_secret(),
        config.database.max_connections,
    )
    .await
    .context("connecting to postgres")?;
    postgres::migrate(&pool).await.context("running migrations")?;
    info!(max_connections = config.database.max_connections, "postgres ready");

    let store = postgres::PgStore::new(pool);
    Ok(Stores {
        posts: Arc::new(store.clone()),
        inspires: Arc::new(store.clone()),
        notifications: Arc::new(store.clone()),
        profiles: Arc::new(store),
    })
}

#[cfg(not(feature = "db-postgres"))]
async fn build_stores(_config: &AppConfig) -> anyhow::Result<Stores> {
    use storage_adapters::{InMemoryProfiles, InMemoryStore};

    warn!("db-postgres disabled, state lives in memory and is lost on exit");
    let store = InMemoryStore::new();
    Ok(Stores {
        posts: Arc::new(store.clone()),
        inspires: Arc::new(store.clone()),
        notifications: Arc::new(store),
        profiles: Arc::new(InMemoryProfiles::new()),
    })
}

#[cfg(feature = "media-local")]
fn build_avatars(config: &AppConfig) -> Arc<dyn AvatarStore> {
    info!(root = %config.media.avatar_root.display(), "serving avatars from disk");
    Arc::new(storage_adapters::LocalAvatarStore::new(
        config.media.avatar_root.clone(),
    ))
}

#[cfg(not(feature = "media-local"))]
fn build_avatars(_config: &AppConfig) -> Arc<dyn AvatarStore> {
    Arc::new(storage_adapters::InMemoryAvatars::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
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
    info!("shutdown signal received, draining connections");
}
