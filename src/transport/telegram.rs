//! Telegram Bot API client.
//!
//! ## API Reference
//!
//! Endpoint: `{api_base}/bot{token}/{method}`, JSON in and out. Every
//! response is wrapped as `{"ok": bool, "result": ..., "error_code": ...,
//! "description": ..., "parameters": {"retry_after": ...}}`.
//!
//! ## Methods used
//!
//! - `getMe` - resolve the bot's own id (join detection)
//! - `getUpdates` - long polling
//! - `setWebhook` / `deleteWebhook` - webhook registration
//! - `sendMessage` - replies

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::update::{Update, User};
use super::{Transport, TransportError};
use crate::types::ChannelId;

/// Update shapes the bot subscribes to.
pub const ALLOWED_UPDATES: [&str; 4] = [
    "message",
    "edited_message",
    "channel_post",
    "edited_channel_post",
];

/// Client settings.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token.
    pub token: String,
    /// API base URL without trailing slash.
    pub api_base: String,
    /// Timeout for ordinary requests, in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to_message_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allow_sending_without_reply: Option<bool>,
}

/// Telegram Bot API client.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramClient {
    /// Build a client.
    pub fn new(config: TelegramConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(map_reqwest_error)?;
        Ok(Self { http, config })
    }

    /// The bot's own account.
    pub async fn get_me(&self) -> Result<User, TransportError> {
        self.call("getMe", &json!({}), None).await
    }

    /// Long-poll for updates after `offset`, waiting up to `timeout_secs`.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TransportError> {
        let body = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ALLOWED_UPDATES,
        });
        // Allow the server its full hold time plus headroom.
        let request_timeout = Duration::from_secs(timeout_secs + self.config.timeout_secs);
        self.call("getUpdates", &body, Some(request_timeout)).await
    }

    /// Register `url` as the webhook.
    pub async fn set_webhook(&self, url: &str) -> Result<bool, TransportError> {
        let body = json!({
            "url": url,
            "allowed_updates": ALLOWED_UPDATES,
        });
        self.call("setWebhook", &body, None).await
    }

    /// Remove any webhook, optionally dropping queued updates.
    pub async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<bool, TransportError> {
        let body = json!({ "drop_pending_updates": drop_pending_updates });
        self.call("deleteWebhook", &body, None).await
    }

    /// Send a text message.
    pub async fn send_message(
        &self,
        chat_id: ChannelId,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<(), TransportError> {
        let body = SendMessageRequest {
            chat_id: chat_id.as_i64(),
            text,
            reply_to_message_id: reply_to,
            allow_sending_without_reply: reply_to.map(|_| true),
        };
        let _: serde_json::Value = self.call("sendMessage", &body, None).await?;
        Ok(())
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.config.api_base, self.config.token, method)
    }

    async fn call<B, T>(
        &self,
        method: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.http.post(self.method_url(method)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let envelope: ApiResponse<T> = response.json().await.map_err(map_reqwest_error)?;

        debug!(method, status = status.as_u16(), ok = envelope.ok, "Bot API call");
        unwrap_envelope(status.as_u16(), envelope)
    }
}

fn unwrap_envelope<T>(status: u16, envelope: ApiResponse<T>) -> Result<T, TransportError> {
    if envelope.ok {
        return envelope.result.ok_or_else(|| TransportError::Api {
            code: i64::from(status),
            description: "missing result".to_string(),
        });
    }

    let code = envelope.error_code.unwrap_or(i64::from(status));
    let description = envelope.description.unwrap_or_default();
    let retry_after = envelope.parameters.and_then(|p| p.retry_after);

    if code == 429 || description.contains("Flood control exceeded") {
        return Err(TransportError::RateLimited { retry_after });
    }
    Err(TransportError::Api { code, description })
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        // Request URLs embed the bot token.
        TransportError::Http(e.without_url().to_string())
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn send_reply(
        &self,
        channel: ChannelId,
        reply_to: Option<i64>,
        text: &str,
    ) -> Result<(), TransportError> {
        self.send_message(channel, text, reply_to).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope<T: DeserializeOwned>(json: &str) -> ApiResponse<T> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_ok_envelope_yields_result() {
        let result: Result<bool, _> = unwrap_envelope(200, envelope(r#"{"ok": true, "result": true}"#));
        assert_eq!(result, Ok(true));
    }

    #[test]
    fn test_rate_limit_envelope() {
        let env = envelope::<serde_json::Value>(
            r#"{"ok": false, "error_code": 429,
                "description": "Too Many Requests: retry after 7",
                "parameters": {"retry_after": 7}}"#,
        );
        assert_eq!(
            unwrap_envelope(429, env),
            Err(TransportError::RateLimited { retry_after: Some(7) })
        );
    }

    #[test]
    fn test_flood_description_is_rate_limit() {
        let env = envelope::<serde_json::Value>(
            r#"{"ok": false, "error_code": 400, "description": "Flood control exceeded"}"#,
        );
        assert!(unwrap_envelope(400, env).unwrap_err().is_rate_limited());
    }

    #[test]
    fn test_api_error_envelope() {
        let env = envelope::<serde_json::Value>(
            r#"{"ok": false, "error_code": 403, "description": "Forbidden: bot was kicked"}"#,
        );
        assert_eq!(
            unwrap_envelope(403, env),
            Err(TransportError::Api {
                code: 403,
                description: "Forbidden: bot was kicked".to_string()
            })
        );
    }

    #[test]
    fn test_send_message_body_shape() {
        let body = SendMessageRequest {
            chat_id: -100,
            text: "❤️: 1",
            reply_to_message_id: Some(5),
            allow_sending_without_reply: Some(true),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["chat_id"], -100);
        assert_eq!(value["reply_to_message_id"], 5);

        let bare = SendMessageRequest {
            chat_id: 1,
            text: "x",
            reply_to_message_id: None,
            allow_sending_without_reply: None,
        };
        let value = serde_json::to_value(&bare).unwrap();
        assert!(value.get("reply_to_message_id").is_none());
    }

    #[test]
    fn test_debug_hides_token() {
        let config = TelegramConfig {
            token: "123:SECRET".to_string(),
            api_base: "https://api.telegram.org".to_string(),
            timeout_secs: 10,
        };
        assert!(!format!("{:?}", config).contains("SECRET"));
    }
}
