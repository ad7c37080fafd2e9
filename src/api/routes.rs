//! HTTP route wiring and server lifecycle.

use std::sync::Arc;

use axum::{
    extract::State,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::{Config, RankerKind, StoreBackend};
use crate::llm::{OpenRouterClient, RetryConfig};
use crate::prioritizer::Prioritizer;
use crate::ranking::{HeuristicRanker, LlmRanker, LlmRankerConfig, SharedRanker};
use crate::reorder::ReorderService;
use crate::store::{InMemoryTaskStore, SharedTaskStore, SqliteTaskStore};

use super::auth;
use super::prioritize;
use super::tasks;
use super::types::HealthResponse;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Task store (memory or SQLite)
    pub store: SharedTaskStore,
    /// Prioritization workflow bound to `store`
    pub reorder: ReorderService,
}

impl AppState {
    pub fn new(config: Config, store: SharedTaskStore, ranker: SharedRanker) -> Self {
        let reorder = ReorderService::new(
            Arc::clone(&store),
            Prioritizer::new(ranker),
            config.ranking_timeout,
        )
        .with_strict_commit(config.strict_commit);
        Self {
            config,
            store,
            reorder,
        }
    }
}

/// Open the configured task store.
pub async fn build_store(config: &Config) -> anyhow::Result<SharedTaskStore> {
    let store: SharedTaskStore = match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory task store; tasks are lost on restart");
            Arc::new(InMemoryTaskStore::new())
        }
        StoreBackend::Sqlite => {
            let store = SqliteTaskStore::new(config.data_dir.clone()).await?;
            tracing::info!("SQLite task store at {}", config.data_dir.display());
            Arc::new(store)
        }
    };
    Ok(store)
}

/// Build the configured ranking backend.
pub fn build_ranker(config: &Config) -> anyhow::Result<SharedRanker> {
    match config.ranker {
        RankerKind::Heuristic => Ok(Arc::new(HeuristicRanker::new())),
        RankerKind::Llm => {
            let api_key = config
                .llm
                .api_key
                .clone()
                .ok_or_else(|| anyhow::anyhow!("OPENROUTER_API_KEY is required for the llm ranker"))?;
            let retry = RetryConfig {
                max_retries: config.llm.max_retries,
                ..RetryConfig::default()
            };
            let client = OpenRouterClient::with_retry_config(api_key, retry)
                .with_endpoint(config.llm.api_url.clone());
            let ranker_config = LlmRankerConfig {
                model: config.llm.model.clone(),
                ..LlmRankerConfig::default()
            };
            Ok(Arc::new(LlmRanker::new(Arc::new(client), ranker_config)))
        }
    }
}

/// Assemble the router for `state`.
pub fn router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .nest("/api/tasks", tasks::routes())
        .route("/api/prioritize", post(prioritize::prioritize))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store = build_store(&config).await?;
    let ranker = build_ranker(&config)?;
    tracing::info!(
        ranker = ranker.name(),
        timeout_secs = config.ranking_timeout.as_secs(),
        strict_commit = config.strict_commit,
        "Prioritizer ready"
    );

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config, store, ranker));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Setup graceful shutdown on SIGTERM/SIGINT
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    tracing::info!("Shutdown signal received");
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        dev_mode: state.config.dev_mode,
        auth_required: state.config.auth.auth_required(state.config.dev_mode),
        persistent_store: state.store.is_persistent(),
        ranker: state.reorder.ranker_name().to_string(),
    })
}
