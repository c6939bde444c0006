//! Card Tally Service Binary
//!
//! Runs the tally bot with its management API:
//! - Structured JSON logging
//! - Request ids propagated into logs and error bodies
//! - Long polling or webhook update delivery
//! - Graceful shutdown handling
//!
//! ## Configuration
//!
//! Environment variables:
//! - `TELEGRAM_BOT_TOKEN`: Bot API token (required)
//! - `TALLY_DATA_DIR`: Counter, ledger and status files (default: .)
//! - `TALLY_TRANSPORT_MODE`: "polling" or "webhook" (default: polling)
//! - `WEBHOOK_URL`: Public base URL in webhook mode
//! - `PORT`: Service port (default: 10000)
//! - `HOST`: Service host (default: 0.0.0.0)
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! ## Usage
//!
//! ```bash
//! TELEGRAM_BOT_TOKEN=... cargo run --bin card_tally_service --features service
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use card_tally::config::{ConfigError, TallyConfig, TransportMode};
use card_tally::service::{create_router, metrics_middleware, ServiceState, REQUEST_ID_HEADER};
use card_tally::status::StatusFile;
use card_tally::transport::{TelegramClient, TelegramConfig, Transport, TransportError};
use card_tally::{CounterStore, DedupeLedger, Dispatcher, DurableStorage, FileStorage};

/// Seconds the Bot API holds a long-poll request open.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Pause after a failed poll.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Install the global subscriber. `LOG_FORMAT=pretty` selects human-readable
/// output; anything else logs flattened JSON.
fn init_tracing() {
    let pretty = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("pretty"));
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "card_tally=info,card_tally_service=info,tower_http=info".into());

    let pretty_layer = pretty.then(|| {
        fmt::layer()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
    });
    let json_layer = (!pretty).then(|| {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_span_events(FmtSpan::CLOSE)
            .flatten_event(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty_layer)
        .with(json_layer)
        .init();
}

/// Tag each request with an id, log it on completion, and echo the id back.
///
/// A caller-supplied `X-Request-Id` is kept; otherwise a fresh UUID is
/// inserted so handlers can put it in error bodies.
async fn request_logging_middleware(mut request: Request, next: Next) -> Response {
    let start = Instant::now();

    let request_id = match request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        Some(id) => id.to_string(),
        None => uuid::Uuid::new_v4().to_string(),
    };
    let header_value = HeaderValue::from_str(&request_id).ok();
    if let Some(value) = &header_value {
        request.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
        status = tracing::field::Empty,
    );

    let mut response = next.run(request).instrument(span.clone()).await;
    let status = response.status().as_u16();
    span.record("status", status);

    if let Some(value) = header_value {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    info!(
        target: "card_tally_service::access",
        request_id = %request_id,
        method = %method,
        path = %path,
        status,
        latency_ms = start.elapsed().as_millis() as u64,
        "request completed"
    );

    response
}

/// Fetch updates until shutdown, feeding each one to the dispatcher.
async fn poll_updates(
    client: Arc<TelegramClient>,
    state: ServiceState,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut offset: Option<i64> = None;
    info!("Long polling started");

    loop {
        let batch = tokio::select! {
            _ = shutdown.changed() => break,
            batch = client.get_updates(offset, POLL_TIMEOUT_SECS) => batch,
        };

        match batch {
            Ok(updates) => {
                for update in updates {
                    offset = Some(update.update_id + 1);
                    if let Some(event) = update.normalize(state.bot_id) {
                        state.dispatcher.handle_event(event).await;
                    }
                }
            }
            Err(TransportError::RateLimited { retry_after }) => {
                let wait = retry_after.map(Duration::from_secs).unwrap_or(POLL_ERROR_BACKOFF);
                warn!(wait_secs = wait.as_secs(), "Polling rate limited");
                tokio::time::sleep(wait).await;
            }
            Err(TransportError::Timeout) => {
                warn!("Polling request timed out, retrying");
            }
            Err(e) => {
                error!(error = %e, "Polling failed");
                tokio::time::sleep(POLL_ERROR_BACKOFF).await;
            }
        }
    }

    info!("Long polling stopped");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let version = env!("CARGO_PKG_VERSION");
    let build_sha = option_env!("BUILD_SHA").unwrap_or("dev");

    info!(
        version = version,
        build_sha = build_sha,
        "Starting Card Tally Service"
    );

    let config = match TallyConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            let dir = std::env::var("TALLY_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."));
            let message = match e {
                ConfigError::MissingToken => "Token not found".to_string(),
                ConfigError::Invalid { .. } => "Invalid configuration".to_string(),
            };
            StatusFile::in_dir(&dir).stopped(Some(message), Some(e.to_string()));
            return Err(e.into());
        }
    };
    info!(config = ?config, "Configuration loaded");

    // Storage and stores
    let storage: Arc<dyn DurableStorage> = Arc::new(FileStorage::open(&config.data_dir)?);
    let counters = CounterStore::with_capacity(Arc::clone(&storage), config.counter_cache_size);
    let ledger = DedupeLedger::open(storage);
    info!(
        data_dir = %config.data_dir.display(),
        messages_processed = ledger.count(),
        "Stores opened"
    );

    let status = Arc::new(StatusFile::in_dir(&config.data_dir));

    // Bot API client
    let client = Arc::new(TelegramClient::new(TelegramConfig {
        token: config.bot_token.clone(),
        api_base: config.api_base.clone(),
        timeout_secs: config.send_timeout_secs,
    })?);

    let me = match client.get_me().await {
        Ok(me) => me,
        Err(e) => {
            error!(error = %e, "Failed to reach the Bot API");
            status.stopped(Some("Bot API unreachable".to_string()), Some(e.to_string()));
            return Err(e.into());
        }
    };
    info!(bot_id = me.id, username = ?me.username, "Bot identity resolved");

    let transport: Arc<dyn Transport> = client.clone();
    let dispatcher = Dispatcher::new(counters, ledger, transport)
        .with_status(Arc::clone(&status))
        .with_style(config.display_style);

    let state = ServiceState::new(Arc::new(dispatcher)).with_bot_id(me.id);

    // Update delivery
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = match config.transport_mode {
        TransportMode::Polling => {
            client.delete_webhook(true).await?;
            state.mark_ready();
            Some(tokio::spawn(poll_updates(
                Arc::clone(&client),
                state.clone(),
                shutdown_rx,
            )))
        }
        TransportMode::Webhook => {
            let url = format!("{}/webhook", config.webhook_url);
            client.set_webhook(&url).await?;
            info!(url = %url, "Webhook registered");
            state.mark_ready();
            None
        }
    };
    status.running("Bot started successfully");

    // Build router with middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        address = %addr,
        mode = ?config.transport_mode,
        version = version,
        "Card Tally Service listening"
    );

    let listener = TcpListener::bind(addr).await?;

    // Graceful shutdown handling
    let shutdown_signal = async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to install Ctrl+C handler");
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
                    error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
            _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
        }
        let _ = shutdown_tx.send(true);
    };

    info!("Ready to accept connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    if let Some(poller) = poller {
        if let Err(e) = poller.await {
            warn!(error = %e, "Polling task ended abnormally");
        }
    }

    status.stopped(Some("Bot stopped".to_string()), None);
    info!("Card Tally Service shutdown complete");

    Ok(())
}
