//! Client configuration.
//!
//! One [`ClientConfig`] captures every knob that differs between
//! deployments of the service: timeout windows, reconnection policy, the
//! model field name and the row-limit policy. It is loaded from an optional
//! TOML file and then overridden by command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::EnrichError;

// ---------------------------------------------------------------------------
// Variant switches
// ---------------------------------------------------------------------------

/// JSON field name carrying the model identifier in a processing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelField {
    #[default]
    ApiModel,
    GptModel,
}

impl ModelField {
    pub fn key(self) -> &'static str {
        match self {
            ModelField::ApiModel => "api_model",
            ModelField::GptModel => "gpt_model",
        }
    }
}

/// How an absent row limit is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowLimitPolicy {
    /// Absent means "no limit"; the field is left out of the payload.
    #[default]
    Optional,
    /// Absent is a validation error.
    Required,
}

/// How the processing request reaches the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitMode {
    /// Emit `start_processing` over the open channel and await an ack.
    #[default]
    Channel,
    /// `POST /process`; the response body is the result CSV.
    Http,
}

/// Delay schedule between reconnection attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconnectPolicy {
    Fixed {
        #[serde(with = "millis")]
        delay: Duration,
    },
    Exponential {
        #[serde(with = "millis")]
        base: Duration,
        #[serde(with = "millis")]
        max: Duration,
        /// Fraction of the delay randomly added or removed (0.0 disables).
        #[serde(default)]
        jitter: f64,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Fixed { delay: Duration::from_millis(1000) }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnection attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            ReconnectPolicy::Fixed { delay } => *delay,
            ReconnectPolicy::Exponential { base, max, jitter } => {
                let shift = attempt.saturating_sub(1).min(16);
                let raw = base.saturating_mul(1u32 << shift).min(*max);
                if *jitter <= 0.0 {
                    return raw;
                }
                let spread = jitter.min(1.0);
                let factor = rand::thread_rng().gen_range((1.0 - spread)..=(1.0 + spread));
                raw.mul_f64(factor).min(*max)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the service, e.g. `http://127.0.0.1:5000`.
    pub server_url: String,
    /// Socket.IO endpoint path.
    pub socket_path: String,
    #[serde(with = "millis")]
    pub notify_dismiss_after: Duration,
    #[serde(with = "millis")]
    pub stall_window: Duration,
    #[serde(with = "millis")]
    pub stall_check_interval: Duration,
    /// Window after startup in which the first connect must succeed.
    #[serde(with = "millis")]
    pub connect_timeout: Duration,
    #[serde(with = "millis")]
    pub ack_timeout: Duration,
    #[serde(with = "millis")]
    pub request_timeout: Duration,
    pub max_reconnect_attempts: u32,
    pub reconnect: ReconnectPolicy,
    pub model_field: ModelField,
    pub row_limit_policy: RowLimitPolicy,
    pub submit_mode: SubmitMode,
    /// Reject non-`.csv` files before uploading.
    pub require_csv_extension: bool,
    pub download_dir: PathBuf,
    /// `Cookie` header sent with every HTTP request and the socket handshake,
    /// e.g. `session=...` copied from a logged-in browser.
    pub session_cookie: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".to_string(),
            socket_path: "/socket.io".to_string(),
            notify_dismiss_after: Duration::from_secs(5),
            stall_window: Duration::from_secs(10),
            stall_check_interval: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            ack_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(300),
            max_reconnect_attempts: 5,
            reconnect: ReconnectPolicy::default(),
            model_field: ModelField::default(),
            row_limit_policy: RowLimitPolicy::default(),
            submit_mode: SubmitMode::default(),
            require_csv_extension: true,
            download_dir: PathBuf::from("."),
            session_cookie: None,
        }
    }
}

impl ClientConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, EnrichError> {
        let config: ClientConfig =
            toml::from_str(text).map_err(|e| EnrichError::Config(e.to_string()))?;
        config.validated()
    }

    pub fn load(path: &Path) -> Result<Self, EnrichError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            EnrichError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject combinations the controller cannot run with.
    pub fn validated(self) -> Result<Self, EnrichError> {
        if self.stall_window.is_zero() || self.stall_check_interval.is_zero() {
            return Err(EnrichError::Config(
                "stall_window and stall_check_interval must be non-zero".into(),
            ));
        }
        if !(self.server_url.starts_with("http://") || self.server_url.starts_with("https://")) {
            return Err(EnrichError::Config(format!(
                "server_url must start with http:// or https:// (got {})",
                self.server_url
            )));
        }
        Ok(self)
    }

    /// `http(s)://host[:port]/path` for an HTTP endpoint.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), path)
    }

    /// Engine.IO websocket URL for the configured server.
    pub fn socket_url(&self) -> String {
        let base = self.server_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        let path = self.socket_path.trim_end_matches('/');
        format!("{ws_base}{path}/?EIO=4&transport=websocket")
    }
}

/// Durations are written as integer milliseconds in TOML.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
