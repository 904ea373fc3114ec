//! predictions-back binary entrypoint wiring configuration, storage supervision and the REST API.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::{Context, bail};
use axum::Router;
use predictions_back::{
    config::AppConfig,
    dao::survey_store::{SurveyStore, memory::MemorySurveyStore},
    routes,
    services::{session_sweeper, storage_supervisor},
    state::{AppState, SharedState},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const STORE_BACKEND_ENV: &str = "STORE_BACKEND";

/// Storage backend selected through [`STORE_BACKEND_ENV`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    #[cfg(feature = "mongo-store")]
    Mongo,
    #[cfg(feature = "couch-store")]
    Couch,
    Memory,
}

impl Backend {
    fn from_env() -> anyhow::Result<Self> {
        let value = env::var(STORE_BACKEND_ENV).unwrap_or_default();
        match value.trim().to_ascii_lowercase().as_str() {
            #[cfg(feature = "mongo-store")]
            "" | "mongo" | "mongodb" => Ok(Self::Mongo),
            #[cfg(all(not(feature = "mongo-store"), feature = "couch-store"))]
            "" => Ok(Self::Couch),
            #[cfg(feature = "couch-store")]
            "couch" | "couchdb" => Ok(Self::Couch),
            #[cfg(not(any(feature = "mongo-store", feature = "couch-store")))]
            "" => Ok(Self::Memory),
            "memory" => Ok(Self::Memory),
            other => bail!("unsupported {STORE_BACKEND_ENV} `{other}`"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let backend = Backend::from_env()?;
    let app_state = AppState::new(AppConfig::load());
    spawn_storage(app_state.clone(), backend).await?;
    tokio::spawn(session_sweeper::run(app_state.clone()));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, ?backend, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Start the storage supervisor for `backend`.
async fn spawn_storage(state: SharedState, backend: Backend) -> anyhow::Result<()> {
    match backend {
        #[cfg(feature = "mongo-store")]
        Backend::Mongo => {
            use predictions_back::dao::survey_store::mongodb::{MongoConfig, MongoSurveyStore};

            let config = MongoConfig::from_env()
                .await
                .context("reading MongoDB configuration")?;
            tokio::spawn(storage_supervisor::run(state, move || {
                let config = config.clone();
                async move {
                    let store = MongoSurveyStore::connect(config).await?;
                    Ok(Arc::new(store) as Arc<dyn SurveyStore>)
                }
            }));
        }
        #[cfg(feature = "couch-store")]
        Backend::Couch => {
            use predictions_back::dao::survey_store::couchdb::{CouchConfig, CouchSurveyStore};

            let config = CouchConfig::from_env().context("reading CouchDB configuration")?;
            tokio::spawn(storage_supervisor::run(state, move || {
                let config = config.clone();
                async move {
                    let store = CouchSurveyStore::connect(config).await?;
                    Ok(Arc::new(store) as Arc<dyn SurveyStore>)
                }
            }));
        }
        Backend::Memory => {
            info!("using the in-memory store; data is lost on restart");
            tokio::spawn(storage_supervisor::run(state, || async {
                Ok(Arc::new(MemorySurveyStore::new()) as Arc<dyn SurveyStore>)
            }));
        }
    }
    Ok(())
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

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
