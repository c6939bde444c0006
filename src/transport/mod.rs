//! Chat transport interface.
//!
//! The dispatcher only needs to send replies; inbound events arrive already
//! normalized into [`InboundEvent`](crate::types::InboundEvent). The Telegram
//! Bot API adapter lives in [`telegram`] behind the `telegram` feature; the
//! update payload types in [`update`] are always available.

pub mod recording;
pub mod update;

#[cfg(feature = "telegram")]
pub mod telegram;

use async_trait::async_trait;

use crate::types::ChannelId;

/// Errors raised when sending through a transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The platform is throttling the bot.
    #[error("Flood control exceeded (retry after {retry_after:?}s)")]
    RateLimited {
        /// Seconds to wait, when the platform says.
        retry_after: Option<u64>,
    },

    /// The platform rejected the request.
    #[error("API error {code}: {description}")]
    Api {
        /// Platform error code.
        code: i64,
        /// Platform error description.
        description: String,
    },

    /// Network or HTTP failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The request timed out.
    #[error("Request timed out")]
    Timeout,
}

impl TransportError {
    /// Whether the failure is throttling rather than a real fault.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Outbound side of a chat transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `text` to `channel`, threading it under `reply_to` when given.
    async fn send_reply(
        &self,
        channel: ChannelId,
        reply_to: Option<i64>,
        text: &str,
    ) -> Result<(), TransportError>;
}

pub use recording::{RecordingTransport, SentReply};

#[cfg(feature = "telegram")]
pub use telegram::{TelegramClient, TelegramConfig};
