//! Runtime configuration.
//!
//! ## Configuration
//!
//! All settings are read from environment variables:
//! - `TELEGRAM_BOT_TOKEN`: Bot API token (required)
//! - `TALLY_DATA_DIR`: Directory for counter, ledger and status files (default: `.`)
//! - `TALLY_DISPLAY_STYLE`: Reply style 1-5 (default: 1)
//! - `TALLY_TRANSPORT_MODE`: `polling` or `webhook` (default: polling)
//! - `WEBHOOK_URL`: Public base URL for webhook mode (default: derived from
//!   `RENDER_SERVICE_NAME`)
//! - `TELEGRAM_API_BASE`: Bot API base URL (default: https://api.telegram.org)
//! - `HOST`: Bind host (default: 0.0.0.0)
//! - `PORT`: Bind port (default: 10000)
//! - `TALLY_COUNTER_CACHE_SIZE`: Channels kept in the counter cache (default: 1024)
//! - `TALLY_SEND_TIMEOUT_SECS`: Reply send timeout (default: 10)

use std::path::PathBuf;
use std::str::FromStr;

use tracing::warn;

use crate::counter::DEFAULT_CACHE_CAPACITY;
use crate::format::DisplayStyle;

/// Default Telegram Bot API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Default service name used to derive the webhook URL.
pub const DEFAULT_SERVICE_NAME: &str = "telegram-bot-webhook";

/// Configuration errors. Any of these stops the service before it serves.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No bot token available.
    #[error("TELEGRAM_BOT_TOKEN is not set")]
    MissingToken,

    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {name}: {value}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
    },
}

/// How updates reach the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    /// Long-poll `getUpdates`.
    #[default]
    Polling,
    /// Receive updates on `POST /webhook`.
    Webhook,
}

impl FromStr for TransportMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "polling" | "poll" => Ok(Self::Polling),
            "webhook" => Ok(Self::Webhook),
            _ => Err(()),
        }
    }
}

/// Service configuration.
#[derive(Clone)]
pub struct TallyConfig {
    /// Bot API token.
    pub bot_token: String,
    /// Directory holding counter, ledger and status files.
    pub data_dir: PathBuf,
    /// Initial reply style.
    pub display_style: DisplayStyle,
    /// Update delivery mode.
    pub transport_mode: TransportMode,
    /// Public base URL for webhook registration.
    pub webhook_url: String,
    /// Bot API base URL.
    pub api_base: String,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Channels kept in the counter cache.
    pub counter_cache_size: usize,
    /// Reply send timeout in seconds.
    pub send_timeout_secs: u64,
}

impl TallyConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let bot_token = var("TELEGRAM_BOT_TOKEN").ok_or(ConfigError::MissingToken)?;

        let display_style = match var("TALLY_DISPLAY_STYLE") {
            None => DisplayStyle::default(),
            Some(raw) => match raw.trim().parse::<u8>().ok().map(DisplayStyle::from_number) {
                Some(Ok(style)) => style,
                _ => {
                    warn!(value = %raw, "Invalid TALLY_DISPLAY_STYLE, using style 1");
                    DisplayStyle::default()
                }
            },
        };

        let transport_mode = match var("TALLY_TRANSPORT_MODE") {
            None => TransportMode::default(),
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "TALLY_TRANSPORT_MODE",
                value: raw.clone(),
            })?,
        };

        let webhook_url = var("WEBHOOK_URL").unwrap_or_else(|| {
            let service = var("RENDER_SERVICE_NAME")
                .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());
            format!("https://{}.onrender.com", service)
        });

        let port = match var("PORT") {
            None => 10000,
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: raw.clone(),
            })?,
        };

        Ok(Self {
            bot_token,
            data_dir: var("TALLY_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            display_style,
            transport_mode,
            webhook_url: webhook_url.trim_end_matches('/').to_string(),
            api_base: var("TELEGRAM_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            counter_cache_size: var("TALLY_COUNTER_CACHE_SIZE")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(DEFAULT_CACHE_CAPACITY),
            send_timeout_secs: var("TALLY_SEND_TIMEOUT_SECS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(10),
        })
    }

    /// Token prefix safe to log.
    pub fn token_hint(&self) -> String {
        let prefix: String = self.bot_token.chars().take(10).collect();
        format!("{}...", prefix)
    }
}

impl std::fmt::Debug for TallyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TallyConfig")
            .field("bot_token", &self.token_hint())
            .field("data_dir", &self.data_dir)
            .field("display_style", &self.display_style)
            .field("transport_mode", &self.transport_mode)
            .field("webhook_url", &self.webhook_url)
            .field("api_base", &self.api_base)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("counter_cache_size", &self.counter_cache_size)
            .field("send_timeout_secs", &self.send_timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<TallyConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        TallyConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_missing_token_is_fatal() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::MissingToken);
        assert_eq!(
            load(&[("TELEGRAM_BOT_TOKEN", "  ")]).unwrap_err(),
            ConfigError::MissingToken
        );
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("TELEGRAM_BOT_TOKEN", "123:abc")]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("."));
        assert_eq!(config.display_style, DisplayStyle::Vertical);
        assert_eq!(config.transport_mode, TransportMode::Polling);
        assert_eq!(config.webhook_url, "https://telegram-bot-webhook.onrender.com");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.port, 10000);
        assert_eq!(config.counter_cache_size, DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn test_webhook_url_from_service_name() {
        let config = load(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("RENDER_SERVICE_NAME", "tally"),
        ])
        .unwrap();
        assert_eq!(config.webhook_url, "https://tally.onrender.com");
    }

    #[test]
    fn test_explicit_values() {
        let config = load(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("TALLY_DISPLAY_STYLE", "5"),
            ("TALLY_TRANSPORT_MODE", "webhook"),
            ("WEBHOOK_URL", "https://example.test/"),
            ("PORT", "8080"),
        ])
        .unwrap();
        assert_eq!(config.display_style, DisplayStyle::Total);
        assert_eq!(config.transport_mode, TransportMode::Webhook);
        assert_eq!(config.webhook_url, "https://example.test");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_bad_style_falls_back() {
        let config = load(&[("TELEGRAM_BOT_TOKEN", "t"), ("TALLY_DISPLAY_STYLE", "9")]).unwrap();
        assert_eq!(config.display_style, DisplayStyle::Vertical);
    }

    #[test]
    fn test_bad_port_is_rejected() {
        let err = load(&[("TELEGRAM_BOT_TOKEN", "t"), ("PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }

    #[test]
    fn test_debug_hides_token() {
        let config = load(&[("TELEGRAM_BOT_TOKEN", "7749786995:SECRETSECRET")]).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("SECRETSECRET"));
    }
}
