//! ClueGrid backend binary entrypoint wiring REST, SSE, and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "couch-store")]
use cluegrid_back::dao::{
    session_store::couchdb::{CouchConfig, CouchSessionStore},
    storage::StoreError,
};
use cluegrid_back::{
    config::AppConfig,
    dao::session_store::{SessionStore, memory::MemoryStore},
    routes,
    services::{janitor, storage_supervisor},
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let app_state = AppState::new(config);

    init_storage(app_state.clone()).await;
    tokio::spawn(janitor::run_global_sweep(app_state.clone()));

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Pick the session store backend: CouchDB behind the supervisor when
/// configured, otherwise the in-memory store for single-node setups.
async fn init_storage(state: SharedState) {
    #[cfg(feature = "couch-store")]
    if env::var("COUCH_BASE_URL").is_ok() {
        tokio::spawn(storage_supervisor::run(state, connect_couch));
        return;
    }

    info!("no CouchDB configured; using the in-memory session store");
    let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
    state.install_session_store(store).await;
}

#[cfg(feature = "couch-store")]
async fn connect_couch() -> Result<Arc<dyn SessionStore>, StoreError> {
    let config = CouchConfig::from_env()?;
    let store = CouchSessionStore::connect(config).await?;
    Ok(Arc::new(store) as Arc<dyn SessionStore>)
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
