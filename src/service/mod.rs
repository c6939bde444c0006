//! Tally REST Service
//!
//! Exposes the dispatcher over HTTP: bot management, webhook delivery and
//! health probes.
//!
//! ## Endpoints
//!
//! - `GET /api/status` - Bot status, per-channel counters, display styles
//! - `POST /api/reset` - Reset one channel
//! - `POST /api/style` - Change the display style
//! - `POST /webhook` - Telegram update delivery
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe

pub mod middleware;
pub mod routes;
pub mod state;

pub use middleware::{metrics_middleware, record_webhook_update, REQUEST_ID_HEADER};
pub use routes::{create_router, AppState, ErrorResponse};
pub use state::{ServiceState, SharedDispatcher};
