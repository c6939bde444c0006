//! Recording transport for testing.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Transport, TransportError};
use crate::types::ChannelId;

/// One reply captured by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentReply {
    /// Destination channel.
    pub channel: ChannelId,
    /// Message the reply was threaded under.
    pub reply_to: Option<i64>,
    /// Reply text.
    pub text: String,
}

/// Transport that records replies instead of sending them.
///
/// Can be told to fail every send, to exercise the best-effort reply path.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentReply>>,
    failure: Mutex<Option<TransportError>>,
}

impl RecordingTransport {
    /// Create a transport that accepts every send.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail with `error`.
    pub fn fail_with(&self, error: TransportError) {
        *self.failure.lock() = Some(error);
    }

    /// Accept sends again.
    pub fn succeed(&self) {
        *self.failure.lock() = None;
    }

    /// Replies sent so far.
    pub fn sent(&self) -> Vec<SentReply> {
        self.sent.lock().clone()
    }

    /// Replies sent to one channel.
    pub fn sent_to(&self, channel: ChannelId) -> Vec<SentReply> {
        self.sent
            .lock()
            .iter()
            .filter(|r| r.channel == channel)
            .cloned()
            .collect()
    }

    /// Text of the most recent reply.
    pub fn last_text(&self) -> Option<String> {
        self.sent.lock().last().map(|r| r.text.clone())
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_reply(
        &self,
        channel: ChannelId,
        reply_to: Option<i64>,
        text: &str,
    ) -> Result<(), TransportError> {
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        self.sent.lock().push(SentReply {
            channel,
            reply_to,
            text: text.to_string(),
        });
        Ok(())
    }
}
