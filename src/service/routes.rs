//! Axum routes for the tally service.

use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};

use crate::dispatcher::Outcome;
use crate::format::DisplayStyle;
use crate::status::BotStatus;
use crate::transport::update::Update;
use crate::types::{ChannelId, SymbolCounts};

use super::middleware::{record_webhook_update, REQUEST_ID_HEADER};
use super::state::ServiceState;

/// State handed to every handler.
pub type AppState = ServiceState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Counters of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelCounters {
    /// Channel id.
    pub channel: ChannelId,
    /// Current totals.
    pub counters: SymbolCounts,
}

/// One selectable display style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleInfo {
    /// Style number, 1 to 5.
    pub number: u8,
    /// French description.
    pub description: String,
}

/// Full bot status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Last recorded bot status.
    pub bot_status: BotStatus,
    /// Every channel with stored counters.
    pub channels: Vec<ChannelCounters>,
    /// Finalized sequence numbers tracked.
    pub messages_processed: usize,
    /// Active display style number.
    pub current_style: u8,
    /// Available styles.
    pub styles: Vec<StyleInfo>,
}

/// Request to reset a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetRequest {
    /// Channel to reset.
    pub channel: ChannelId,
}

/// Reset result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    /// Always `ok`.
    pub status: String,
    /// Channel that was reset.
    pub channel: ChannelId,
    /// Ledger entries removed.
    pub ledger_entries_removed: usize,
}

/// Request to change the display style.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleRequest {
    /// Style number, 1 to 5.
    pub style: u8,
}

/// Style change result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleResponse {
    /// Always `ok`.
    pub status: String,
    /// Newly active style.
    pub current_style: StyleInfo,
}

/// Webhook acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    /// Always `ok`.
    pub status: String,
}

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Whether the bot last reported itself running.
    pub bot_running: bool,
    /// Seconds since start.
    pub uptime_secs: i64,
    /// Channels with stored counters.
    pub channel_count: usize,
    /// Finalized sequence numbers tracked.
    pub messages_processed: usize,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    /// Always `alive`.
    pub status: String,
}

/// Readiness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Whether updates are being received.
    pub ready: bool,
    /// Why not, when not ready.
    pub details: Option<String>,
}

/// JSON error body returned by failing handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Caller's `X-Request-Id`, echoed back when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Additional error details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            correlation_id: None,
            details: None,
        }
    }

    /// Echo the caller's request id.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> axum::response::Response {
        tracing::warn!(
            code = %self.code,
            error = %self.error,
            correlation_id = ?self.correlation_id,
            "Request error"
        );
        (StatusCode::BAD_REQUEST, Json(self)).into_response()
    }
}

impl From<DisplayStyle> for StyleInfo {
    fn from(style: DisplayStyle) -> Self {
        Self {
            number: style.number(),
            description: style.description().to_string(),
        }
    }
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Bot status, per-channel counters and style settings.
async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let dispatcher = &state.dispatcher;
    let channels = dispatcher
        .counters()
        .snapshot()
        .into_iter()
        .map(|(channel, counters)| ChannelCounters { channel, counters })
        .collect();

    Json(StatusResponse {
        bot_status: dispatcher.status().current(),
        channels,
        messages_processed: dispatcher.messages_processed(),
        current_style: dispatcher.style().number(),
        styles: DisplayStyle::ALL.into_iter().map(StyleInfo::from).collect(),
    })
}

/// Reset one channel's counters and ledger entries.
async fn reset_handler(
    State(state): State<AppState>,
    Json(request): Json<ResetRequest>,
) -> Json<ResetResponse> {
    let outcome = state.dispatcher.reset_channel(request.channel, None).await;
    Json(ResetResponse {
        status: "ok".to_string(),
        channel: request.channel,
        ledger_entries_removed: outcome.ledger_entries_removed,
    })
}

/// Change the active display style.
async fn style_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<StyleRequest>,
) -> Result<Json<StyleResponse>, ErrorResponse> {
    let style = DisplayStyle::from_number(request.style).map_err(|e| {
        let error = ErrorResponse::new("INVALID_STYLE", e.to_string())
            .with_details(format!("expected 1-{}", DisplayStyle::ALL.len()));
        match request_id(&headers) {
            Some(id) => error.with_correlation_id(id),
            None => error,
        }
    })?;
    state.dispatcher.set_style(style);
    Ok(Json(StyleResponse {
        status: "ok".to_string(),
        current_style: style.into(),
    }))
}

/// Receive one Telegram update.
async fn webhook_handler(
    State(state): State<AppState>,
    Json(update): Json<Update>,
) -> Json<WebhookResponse> {
    let label = match update.normalize(state.bot_id) {
        Some(event) => outcome_label(&state.dispatcher.handle_event(event).await),
        None => "unsupported",
    };
    record_webhook_update(update.update_id, label);
    Json(WebhookResponse {
        status: "ok".to_string(),
    })
}

fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|id| !id.is_empty())
}

fn outcome_label(outcome: &Outcome) -> &'static str {
    match outcome {
        Outcome::Ignored(_) => "ignored",
        Outcome::Deferred { .. } => "deferred",
        Outcome::NoSymbols => "no_symbols",
        Outcome::Counted { .. } => "counted",
        Outcome::Command { .. } => "command",
        Outcome::Welcomed { .. } => "welcomed",
    }
}

/// Health check endpoint (detailed).
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let dispatcher = &state.dispatcher;
    let bot_running = dispatcher.status().current().running;

    Json(HealthResponse {
        status: if bot_running { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        bot_running,
        uptime_secs: state.uptime_secs(),
        channel_count: dispatcher.counters().channels().len(),
        messages_processed: dispatcher.messages_processed(),
    })
}

/// Liveness probe endpoint. Does NOT check dependencies.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Returns 200 once update delivery is set up, 503 otherwise.
async fn readiness_handler(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    if state.is_ready() {
        Ok(Json(ReadinessResponse {
            ready: true,
            details: None,
        }))
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                details: Some("Update delivery not yet configured".to_string()),
            }),
        ))
    }
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for the tally service.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Bot management
        .route("/api/status", get(status_handler))
        .route("/api/reset", post(reset_handler))
        .route("/api/style", post(style_handler))
        // Telegram webhook delivery
        .route("/webhook", post(webhook_handler))
        // Health checks
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .with_state(state)
}
