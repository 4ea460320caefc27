//! HTTP gateway for Mailwright.
//!
//! Exposes the chat endpoint the web frontend talks to, plus health,
//! mail-authorization and configuration-reload endpoints.
//!
//! Built on Axum.

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    response::Json,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

use mailwright_agent::DispatchLoop;
use mailwright_config::{AppConfig, ConfigError, GatewayConfig};
use mailwright_core::ChatRequest;
use mailwright_mail::{AuthStatus, Authenticator, GmailAuth, GmailSender};
use mailwright_providers::ModelSlot;

/// Re-resolves configuration on demand.
pub type ConfigLoader = Arc<dyn Fn() -> Result<AppConfig, ConfigError> + Send + Sync>;

/// Shared application state for the gateway.
///
/// Every service is built once at startup and shared by reference with all
/// handlers.
pub struct GatewayState {
    pub config: RwLock<AppConfig>,
    pub agent: Arc<DispatchLoop>,
    pub model: Arc<ModelSlot>,
    pub auth: Option<Arc<dyn Authenticator>>,
    pub loader: ConfigLoader,
}

type SharedState = Arc<GatewayState>;

impl GatewayState {
    /// Build the production services from configuration.
    pub fn from_config(config: AppConfig) -> Self {
        let model = Arc::new(ModelSlot::from_config(&config));
        let auth = Arc::new(GmailAuth::new(&config.mail));
        let sender = Arc::new(GmailSender::new(auth.clone(), &config.mail));
        let config_path = config.source.clone().unwrap_or_else(AppConfig::config_path);
        let agent = Arc::new(DispatchLoop::new(model.clone(), sender).with_config_path(config_path));

        Self {
            config: RwLock::new(config),
            agent,
            model,
            auth: Some(auth),
            loader: Arc::new(AppConfig::reload),
        }
    }
}

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState, gateway: &GatewayConfig) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/auth/status", get(auth_status_handler))
        .route("/api/auth/init", post(auth_init_handler))
        .route("/api/config/reload", post(reload_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(gateway.body_limit_bytes))
        .layer(cors_layer(&gateway.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// `"*"` anywhere in the list allows every origin.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let gateway = config.gateway.clone();

    let state = Arc::new(GatewayState::from_config(config));
    if !state.model.is_bound() {
        warn!(
            provider = %state.model.provider_name(),
            "Starting without a model; chat replies will report the missing key until POST /api/config/reload"
        );
    }

    let app = build_router(state, &gateway);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            detail: detail.into(),
        }),
    )
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

async fn root_handler() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Mailwright backend is running",
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
}

async fn chat_handler(
    State(state): State<SharedState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    info!(
        message_len = request.message.len(),
        history = request.history.len(),
        "Chat message received"
    );

    match state.agent.process(&request).await {
        Ok(reply) => Ok(Json(ChatResponse { response: reply.text })),
        Err(e) => {
            error!(error = %e, "Chat turn failed");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

async fn auth_status_handler(
    State(state): State<SharedState>,
) -> Result<Json<AuthStatus>, ApiError> {
    let auth = state.auth.as_ref().ok_or_else(auth_unconfigured)?;
    Ok(Json(auth.status().await))
}

#[derive(Serialize)]
struct AuthInitResponse {
    success: bool,
    message: &'static str,
}

async fn auth_init_handler(
    State(state): State<SharedState>,
) -> Result<Json<AuthInitResponse>, ApiError> {
    let auth = state.auth.as_ref().ok_or_else(auth_unconfigured)?;
    match auth.authorize().await {
        Ok(status) => {
            info!(expiry = ?status.expiry, "Mail account authorized");
            Ok(Json(AuthInitResponse {
                success: true,
                message: "Authentication successful. You can now send emails.",
            }))
        }
        Err(e) => {
            warn!(error = %e, "Mail authorization failed");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Authentication failed: {e}"),
            ))
        }
    }
}

fn auth_unconfigured() -> ApiError {
    api_error(
        StatusCode::SERVICE_UNAVAILABLE,
        "Mail authentication is not configured",
    )
}

#[derive(Serialize)]
struct ReloadResponse {
    model_bound: bool,
    provider: String,
}

async fn reload_handler(
    State(state): State<SharedState>,
) -> Result<Json<ReloadResponse>, ApiError> {
    let config = (state.loader)().map_err(|e| {
        warn!(error = %e, "Configuration reload failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    let model_bound = state.model.rebind(&config);
    let provider = config.provider.clone();
    *state.config.write().await = config;

    Ok(Json(ReloadResponse {
        model_bound,
        provider,
    }))
}
