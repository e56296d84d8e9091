mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Json, State};
use axum::http::{Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use helpdesk_core::{LexEvent, LexResponse};
use helpdesk_dispatch::IntentDispatcher;
use helpdesk_notify::Mailer;
use helpdesk_observability::{AppMetrics, MetricsSnapshot};
use helpdesk_storage::{import_articles, load_seed_file, KnowledgeBase};
use serde::Serialize;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use config::ServiceConfig;

pub type Dispatcher = IntentDispatcher<KnowledgeBase, Mailer>;

#[derive(Clone)]
pub struct ApiState {
    pub dispatcher: Arc<Dispatcher>,
    pub metrics: Arc<AppMetrics>,
    pub api_key: Option<String>,
}

impl ApiState {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        metrics: Arc<AppMetrics>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            dispatcher,
            metrics,
            api_key,
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
    capabilities: HealthCapabilities,
}

#[derive(Debug, Serialize)]
struct HealthCapabilities {
    knowledge_store: bool,
    knowledge_backend: &'static str,
    notifier: bool,
    notifier_backend: &'static str,
}

pub async fn serve(config: ServiceConfig) -> Result<()> {
    let bind = config.bind.clone();
    let app = build_app(config).await?;

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    info!(bind = %bind, "helpdesk fulfillment api started");

    axum::serve(listener, app).await?;
    Ok(())
}

pub async fn build_dispatcher(
    config: &ServiceConfig,
    metrics: Arc<AppMetrics>,
) -> Result<Dispatcher> {
    let store = match config.database_url.as_deref() {
        Some(database_url) => KnowledgeBase::sqlite(database_url).await?,
        None => KnowledgeBase::memory(),
    };

    if let Some(seed) = config.kb_seed.as_ref() {
        match config.dispatcher.store_table_name.as_deref() {
            Some(table) => {
                let articles = load_seed_file(seed)?;
                import_articles(&store, table, articles).await?;
            }
            None => warn!(
                seed = %seed.display(),
                "seed file ignored: no table name configured"
            ),
        }
    }

    let mailer = match config.mail_relay_url.as_deref() {
        Some(url) => Mailer::http(url, config.mail_relay_token.clone())?,
        None => Mailer::outbox(),
    };

    if config.dispatcher.store_table_name.is_none() {
        warn!(
            "knowledge store table name not set; FAQ intents will report a configuration error"
        );
    }
    if config.dispatcher.support_address.is_none() {
        warn!("support address not set; escalations will not be emailed");
    }
    info!(
        knowledge_backend = store.backend_name(),
        notifier_backend = mailer.backend_name(),
        "dispatcher collaborators ready"
    );

    Ok(IntentDispatcher::new(
        Arc::new(store),
        Arc::new(mailer),
        config.dispatcher.clone(),
        metrics,
    ))
}

pub async fn build_app(config: ServiceConfig) -> Result<Router> {
    let metrics = AppMetrics::shared();
    let dispatcher = build_dispatcher(&config, metrics.clone()).await?;

    let state = ApiState::new(Arc::new(dispatcher), metrics, config.api_key.clone());
    Ok(build_router(state))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/fulfillment", post(fulfillment))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let config = state.dispatcher.config();
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: chrono::Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
        capabilities: HealthCapabilities {
            knowledge_store: config.store_table_name.is_some(),
            knowledge_backend: state.dispatcher.store().backend_name(),
            notifier: config.support_address.is_some(),
            notifier_backend: state.dispatcher.notifier().backend_name(),
        },
    };
    (StatusCode::OK, Json(payload))
}

async fn fulfillment(
    State(state): State<ApiState>,
    Json(event): Json<LexEvent>,
) -> impl IntoResponse {
    let request = event.to_intent_request();
    let reply = state.dispatcher.dispatch(&request).await;

    let response = LexResponse::close(&reply, event.session_state.session_attributes);
    (StatusCode::OK, Json(response))
}

async fn api_key_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.api_key.as_deref() else {
        return next.run(request).await;
    };
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let header_key = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if header_key != expected {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "unauthorized",
                "message": "missing or invalid x-api-key"
            })),
        )
            .into_response();
    }

    next.run(request).await
}

fn is_public_endpoint(path: &str) -> bool {
    path == "/health"
}
