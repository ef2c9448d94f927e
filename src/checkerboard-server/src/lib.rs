//! Checkerboard - Slack to GitHub identity mapping service.
//!
//! This crate provides:
//! - The HTTP API over the mapping (`/<name>/slack`, `/<name>/github`)
//! - HTTP Basic authentication
//! - Configuration from JSON files or the environment
//! - Service bootstrap: warm start, refresh loop, graceful shutdown

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, middleware};
use anyhow::Context;
use checkerboard_core::{FileStore, Mapper, RedisStore, WarmStore};
use checkerboard_slack::SlackDirectory;
use tokio::net::TcpListener;
use secrecy::ExposeSecret;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use config::ServerConfig;
pub use error::{AppError, AppResult};
pub use state::AppState;

/// Run the server with graceful shutdown support.
///
/// The listener is bound first so a bad address fails fast, but requests are
/// only served once the initial mapping is loaded (or refreshed).
pub async fn run_with_shutdown<F>(config: ServerConfig, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    config.validate()?;

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen address {:?}", config.listen_addr))?;
    let listener = TcpListener::bind(addr).await?;

    let directory = SlackDirectory::new(config.slack_config()?)?;
    let store = warm_store(&config).await?;
    let mapper = Mapper::new(Arc::new(directory), store, config.mapper_options());

    mapper.start().await;
    let refresh_loop = mapper.spawn_refresh_loop();

    let state = Arc::new(AppState::new(config, mapper.clone()));
    let app = create_router_with_state(state);

    info!("Starting checkerboard server on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutting down, stopping mapping refresh...");
    mapper.shutdown();
    if let Err(e) = refresh_loop.await {
        warn!("Refresh loop did not stop cleanly: {}", e);
    }

    Ok(())
}

/// The configured warm-start store, if any.
pub async fn warm_store(config: &ServerConfig) -> anyhow::Result<Option<Arc<dyn WarmStore>>> {
    if let Some(url) = &config.redis.url {
        let password = config.redis.password.as_ref().map(|p| p.expose_secret());
        let store = RedisStore::connect(url, password)
            .await
            .context("connecting to the Redis mapping cache")?;
        info!("Using Redis warm-start cache");
        return Ok(Some(Arc::new(store)));
    }

    Ok(config.cache_path.as_ref().map(|path| {
        info!(path = %path.display(), "Using warm-start cache file");
        Arc::new(FileStore::new(path)) as Arc<dyn WarmStore>
    }))
}

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    create_router_with_state(Arc::new(state))
}

/// Create the application router with an Arc-wrapped state.
pub fn create_router_with_state(state: Arc<AppState>) -> Router {
    let prefix = format!("/{}", state.config.name);

    let protected = api::protected_routes(&prefix).route_layer(middleware::from_fn_with_state(
        Arc::clone(&state),
        auth::basic_auth_middleware,
    ));

    Router::new()
        .merge(api::public_routes(&prefix))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
