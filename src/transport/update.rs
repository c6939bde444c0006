//! Telegram update payloads and their normalization.
//!
//! Only the fields the bot reads are modeled; everything else in the
//! payload is ignored by serde.

use serde::{Deserialize, Serialize};

use crate::types::{ChannelId, EventKind, InboundEvent, MessageRecord, Surface};

/// One update from `getUpdates` or a webhook delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    /// Monotonic update id.
    pub update_id: i64,
    /// New message in a private chat or group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    /// Edited message in a private chat or group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_message: Option<Message>,
    /// New broadcast channel post.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_post: Option<Message>,
    /// Edited broadcast channel post.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_channel_post: Option<Message>,
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message id within the chat.
    pub message_id: i64,
    /// Chat the message belongs to.
    pub chat: Chat,
    /// Message text, absent for media and service messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Members who joined, for service messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_chat_members: Option<Vec<User>>,
}

/// A chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    /// Chat id; negative for groups and channels.
    pub id: i64,
    /// `private`, `group`, `supergroup` or `channel`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// A user or bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User id.
    pub id: i64,
    /// Whether this account is a bot.
    #[serde(default)]
    pub is_bot: bool,
    /// Username without `@`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Update {
    /// The carried message and the event shape it arrived as.
    ///
    /// When several shapes are present the first of message, channel post,
    /// edited channel post, edited message wins.
    pub fn message_with_kind(&self) -> Option<(&Message, EventKind)> {
        if let Some(m) = &self.message {
            return Some((m, EventKind::New(Surface::Direct)));
        }
        if let Some(m) = &self.channel_post {
            return Some((m, EventKind::New(Surface::Broadcast)));
        }
        if let Some(m) = &self.edited_channel_post {
            return Some((m, EventKind::Edited(Surface::Broadcast)));
        }
        self.edited_message
            .as_ref()
            .map(|m| (m, EventKind::Edited(Surface::Direct)))
    }

    /// Normalize into an inbound event.
    ///
    /// `bot_id` identifies this bot so join notifications can be recognized.
    /// Updates carrying no message shape yield `None`.
    pub fn normalize(&self, bot_id: Option<i64>) -> Option<InboundEvent> {
        let (message, kind) = self.message_with_kind()?;
        let channel = ChannelId::new(message.chat.id);

        let bot_joined = match (bot_id, &message.new_chat_members) {
            (Some(id), Some(members)) => members.iter().any(|u| u.id == id),
            _ => false,
        };
        if bot_joined {
            return Some(InboundEvent::BotAdded { channel });
        }

        Some(InboundEvent::Message(
            MessageRecord::new(channel, message.text.clone(), kind)
                .with_message_id(message.message_id),
        ))
    }
}
