//! Normalized inbound message types.
//!
//! Every transport event shape (new message, edited message, channel post,
//! edited channel post) is collapsed into one [`MessageRecord`] before it
//! reaches the classifier.

use serde::{Deserialize, Serialize};

use super::channel::ChannelId;

/// Where a message was posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    /// Private chat or group message.
    Direct,
    /// Broadcast channel post.
    Broadcast,
}

/// Shape of the transport event a record was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// First delivery of a message.
    New(Surface),
    /// Re-delivery after the author edited the message.
    Edited(Surface),
}

impl EventKind {
    /// Whether this delivery is an edit of a previously seen message.
    pub fn is_edit(&self) -> bool {
        matches!(self, Self::Edited(_))
    }

    /// The surface the event came from.
    pub fn surface(&self) -> Surface {
        match self {
            Self::New(s) | Self::Edited(s) => *s,
        }
    }
}

/// One inbound message, normalized.
///
/// Produced once per transport event and consumed within a single
/// classification pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Originating channel.
    pub channel: ChannelId,
    /// Raw text. `None` for events without text (stickers, photos, joins).
    pub text: Option<String>,
    /// Event shape.
    pub kind: EventKind,
    /// Platform message id, used to thread the reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
}

impl MessageRecord {
    /// Create a new record.
    pub fn new(channel: ChannelId, text: Option<String>, kind: EventKind) -> Self {
        Self {
            channel,
            text,
            kind,
            message_id: None,
        }
    }

    /// Attach the platform message id.
    pub fn with_message_id(mut self, message_id: i64) -> Self {
        self.message_id = Some(message_id);
        self
    }

    /// Whether this delivery is an edit.
    pub fn is_edit(&self) -> bool {
        self.kind.is_edit()
    }

    /// Text, if present and non-empty.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }
}

/// Transport event after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A message to run through commands and classification.
    Message(MessageRecord),
    /// The bot itself was added to a chat.
    BotAdded {
        /// Chat the bot joined.
        channel: ChannelId,
    },
}
