//! Application configuration: a `config/default.toml` overlaid by
//! environment variables, driving the `config` crate's layered builder
//! so env overrides work without bespoke glue.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_store_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_sse_endpoint() -> String {
    String::new()
}
fn default_sse_reconnect_interval_ms() -> u64 {
    500
}
fn default_sse_max_reconnect_attempts() -> u32 {
    auction_sse::DEFAULT_MAX_RECONNECT_ATTEMPTS
}
fn default_polling_interval_ms() -> u64 {
    6_000
}
fn default_cleanup_interval_ms() -> u64 {
    auction_monitor::cleanup::DEFAULT_SWEEP_INTERVAL.as_millis() as u64
}
fn default_retention_ms() -> u64 {
    auction_monitor::cleanup::DEFAULT_RETENTION.as_millis() as u64
}
fn default_ws_max_payload_size() -> usize {
    auction_broadcast::MAX_PAYLOAD_BYTES
}
fn default_upstream_base_url() -> String {
    "https://www.example-marketplace.test".to_string()
}
fn default_shutdown_grace_secs() -> u64 {
    5
}

/// Rate-limit windows, all configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_api_limit")]
    pub api_per_minute_per_ip: u32,
    #[serde(default = "default_auth_limit")]
    pub auth_per_15_min_per_ip: u32,
    #[serde(default = "default_bid_limit")]
    pub bid_per_minute_per_auction: u32,
    #[serde(default = "default_ws_accept_limit")]
    pub ws_accept_per_minute_per_ip: u32,
}

fn default_api_limit() -> u32 {
    100
}
fn default_auth_limit() -> u32 {
    5
}
fn default_bid_limit() -> u32 {
    10
}
fn default_ws_accept_limit() -> u32 {
    10
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            api_per_minute_per_ip: default_api_limit(),
            auth_per_15_min_per_ip: default_auth_limit(),
            bid_per_minute_per_auction: default_bid_limit(),
            ws_accept_per_minute_per_ip: default_ws_accept_limit(),
        }
    }
}

/// Top-level process configuration, loaded from CLI args and environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Static shared token gating every command. Required; startup-fatal
    /// if absent — the server refuses to start with no token configured.
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Master secret credentials are encrypted with at rest. Required;
    /// 32 bytes of entropy recommended.
    #[serde(default)]
    pub encryption_secret: Option<String>,
    /// Optional second factor: when set, sensitive endpoints additionally
    /// require a valid HMAC-SHA256 signed-request envelope.
    #[serde(default)]
    pub signing_secret: Option<String>,

    #[serde(default = "default_store_url")]
    pub store_url: String,

    #[serde(default = "default_sse_endpoint")]
    pub sse_endpoint: String,
    #[serde(default = "default_sse_reconnect_interval_ms")]
    pub sse_reconnect_interval_ms: u64,
    #[serde(default = "default_sse_max_reconnect_attempts")]
    pub sse_max_reconnect_attempts: u32,

    #[serde(default = "default_upstream_base_url")]
    pub upstream_base_url: String,

    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
    #[serde(default = "default_cleanup_interval_ms")]
    pub auction_cleanup_interval_ms: u64,
    #[serde(default = "default_retention_ms")]
    pub ended_auction_retention_ms: u64,
    #[serde(default = "default_ws_max_payload_size")]
    pub ws_max_payload_size: usize,
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    #[serde(default)]
    pub rate_limits: RateLimitConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            auth_token: None,
            encryption_secret: None,
            signing_secret: None,
            store_url: default_store_url(),
            sse_endpoint: default_sse_endpoint(),
            sse_reconnect_interval_ms: default_sse_reconnect_interval_ms(),
            sse_max_reconnect_attempts: default_sse_max_reconnect_attempts(),
            upstream_base_url: default_upstream_base_url(),
            polling_interval_ms: default_polling_interval_ms(),
            auction_cleanup_interval_ms: default_cleanup_interval_ms(),
            ended_auction_retention_ms: default_retention_ms(),
            ws_max_payload_size: default_ws_max_payload_size(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            rate_limits: RateLimitConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load `config/default.toml` (or the path named by `--config` /
    /// `AUCTION_TRACKER_CONFIG`), overlaid by `AUCTION_TRACKER_*` env vars,
    /// and verify the fields that must never fall back to a default.
    pub fn load(cli_path: Option<&str>) -> AppResult<Self> {
        let config_path = cli_path
            .map(str::to_string)
            .or_else(|| std::env::var("AUCTION_TRACKER_CONFIG").ok())
            .unwrap_or_else(|| "config/default.toml".to_string());

        let mut builder = config::Config::builder();
        if Path::new(&config_path).exists() {
            builder = builder.add_source(config::File::with_name(&config_path));
        } else {
            tracing::warn!(path = %config_path, "config file not found, using built-in defaults");
        }
        builder = builder.add_source(
            config::Environment::with_prefix("AUCTION_TRACKER")
                .separator("__")
                .try_parsing(true),
        );

        let layered = builder
            .build()
            .map_err(|e| AppError::Config(format!("failed to build config: {e}")))?;

        let mut parsed: AppConfig = layered
            .try_deserialize()
            .map_err(|e| AppError::Config(format!("failed to parse config: {e}")))?;

        // These bare env var names (not namespaced under AUCTION_TRACKER__*)
        // take precedence, matching the marketplace's own convention for
        // these specific names.
        if let Ok(v) = std::env::var("AUTH_TOKEN") {
            parsed.auth_token = Some(v);
        }
        if let Ok(v) = std::env::var("ENCRYPTION_SECRET") {
            parsed.encryption_secret = Some(v);
        }
        if let Ok(v) = std::env::var("STORE_URL") {
            parsed.store_url = v;
        }
        if let Ok(v) = std::env::var("SSE_ENDPOINT") {
            parsed.sse_endpoint = v;
        }
        if let Ok(v) = std::env::var("SSE_RECONNECT_INTERVAL") {
            parsed.sse_reconnect_interval_ms = v.parse().unwrap_or(parsed.sse_reconnect_interval_ms);
        }
        if let Ok(v) = std::env::var("SSE_MAX_RECONNECT_ATTEMPTS") {
            parsed.sse_max_reconnect_attempts =
                v.parse().unwrap_or(parsed.sse_max_reconnect_attempts);
        }
        if let Ok(v) = std::env::var("POLLING_INTERVAL_MS") {
            parsed.polling_interval_ms = v.parse().unwrap_or(parsed.polling_interval_ms);
        }
        if let Ok(v) = std::env::var("AUCTION_CLEANUP_INTERVAL_MS") {
            parsed.auction_cleanup_interval_ms =
                v.parse().unwrap_or(parsed.auction_cleanup_interval_ms);
        }
        if let Ok(v) = std::env::var("ENDED_AUCTION_RETENTION_MS") {
            parsed.ended_auction_retention_ms =
                v.parse().unwrap_or(parsed.ended_auction_retention_ms);
        }
        if let Ok(v) = std::env::var("WS_MAX_PAYLOAD_SIZE") {
            parsed.ws_max_payload_size = v.parse().unwrap_or(parsed.ws_max_payload_size);
        }

        parsed.validate()?;
        Ok(parsed)
    }

    fn validate(&self) -> AppResult<()> {
        if self.auth_token.as_deref().unwrap_or("").is_empty() {
            return Err(AppError::Config(
                "AUTH_TOKEN is required and has no default".into(),
            ));
        }
        if self.encryption_secret.as_deref().unwrap_or("").is_empty() {
            return Err(AppError::Config(
                "ENCRYPTION_SECRET is required and has no default".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_socket_addr(&self) -> AppResult<SocketAddr> {
        self.bind_addr
            .parse()
            .map_err(|e| AppError::Config(format!("invalid bind_addr {}: {e}", self.bind_addr)))
    }

    pub fn store_config(&self) -> auction_store::StoreConfig {
        auction_store::StoreConfig {
            redis_url: self.store_url.clone(),
            credentials_master_secret: self
                .encryption_secret
                .clone()
                .unwrap_or_default()
                .into_bytes(),
            ..Default::default()
        }
    }

    pub fn sse_config(&self) -> auction_sse::SseConfig {
        auction_sse::SseConfig {
            stream_url: self.sse_endpoint.clone(),
            max_reconnect_attempts: self.sse_max_reconnect_attempts,
        }
    }

    pub fn upstream_config(&self) -> auction_upstream::UpstreamConfig {
        auction_upstream::UpstreamConfig {
            base_url: self.upstream_base_url.clone(),
            ..Default::default()
        }
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.auction_cleanup_interval_ms)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.ended_auction_retention_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let config = AppConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.rate_limits.api_per_minute_per_ip, 100);
        assert_eq!(config.rate_limits.auth_per_15_min_per_ip, 5);
        assert_eq!(config.rate_limits.bid_per_minute_per_auction, 10);
        assert_eq!(config.rate_limits.ws_accept_per_minute_per_ip, 10);
    }

    #[test]
    fn validate_rejects_missing_auth_token() {
        let config = AppConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_configured_secrets() {
        let mut config = AppConfig::default();
        config.auth_token = Some("token".into());
        config.encryption_secret = Some("secret-material-32-bytes-long!!".into());
        assert!(config.validate().is_ok());
    }
}
