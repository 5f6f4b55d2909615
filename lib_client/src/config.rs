//! # Client Configuration
//!
//! Layered configuration for the OfficeStream client: compiled-in defaults,
//! then an optional JSON config file, then `OFFICESTREAM_*` environment
//! variables. Later sources win per field. Unreadable or unparsable files are
//! logged and skipped rather than treated as fatal.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Runtime settings of an [`crate::client::OfficeClient`] instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Base URL of the backend HTTP API (e.g. `http://localhost:3000`).
    pub api_base: String,
    /// WebSocket endpoint. When unset it is derived from `api_base` by
    /// swapping the scheme and appending `/ws`.
    pub ws_url: Option<String>,
    /// Scene kind joined by default when `connect` carries an organization.
    pub scene_kind: String,
    /// Optional bearer token attached to every HTTP request.
    pub auth_token: Option<String>,
    /// Base delay before the first reconnect attempt.
    pub reconnect_base_delay_ms: u64,
    /// Ceiling of the reconnect backoff window.
    pub reconnect_max_delay_ms: u64,
    /// Consecutive transport failures tolerated before giving up.
    pub max_reconnect_attempts: u32,
    /// Interval between keepalive pings while connected.
    pub heartbeat_interval_secs: u64,
    /// Seconds of transport silence before the connection is declared dead.
    pub inactivity_timeout_secs: u64,
    /// Freshness window of the remote-read caches.
    pub cache_ttl_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:3000".to_string(),
            ws_url: None,
            scene_kind: "office".to_string(),
            auth_token: None,
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 5000,
            max_reconnect_attempts: 5,
            heartbeat_interval_secs: 30,
            inactivity_timeout_secs: 60,
            cache_ttl_ms: 30_000,
        }
    }
}

impl ClientConfig {
    /// Loads configuration by layering defaults, the optional JSON file at
    /// `path`, and `OFFICESTREAM_*` environment variables.
    pub fn load(path: Option<&Path>) -> Self {
        let mut config = Self::default();

        if let Some(file_path) = path {
            if file_path.exists() {
                match fs::read_to_string(file_path) {
                    Ok(config_str) => match serde_json::from_str::<Self>(&config_str) {
                        // `#[serde(default)]` fills fields the file omits,
                        // which gives file-over-defaults merge semantics.
                        Ok(file_config) => config = file_config,
                        Err(e) => log::warn!(
                            "Failed to parse config file {}: {}. Falling back to other sources.",
                            file_path.display(),
                            e
                        ),
                    },
                    Err(e) => log::warn!(
                        "Failed to read config file {}: {}. Falling back to other sources.",
                        file_path.display(),
                        e
                    ),
                }
            } else {
                log::info!(
                    "Config file not found at {}. Using defaults and environment variables.",
                    file_path.display()
                );
            }
        }

        config.apply_env();
        config
    }

    /// Overrides individual fields from `OFFICESTREAM_*` environment
    /// variables. Unparsable numeric values are logged and ignored.
    pub fn apply_env(&mut self) {
        if let Ok(v) = env::var("OFFICESTREAM_API_BASE") {
            self.api_base = v;
        }
        if let Ok(v) = env::var("OFFICESTREAM_WS_URL") {
            self.ws_url = Some(v);
        }
        if let Ok(v) = env::var("OFFICESTREAM_SCENE_KIND") {
            self.scene_kind = v;
        }
        if let Ok(v) = env::var("OFFICESTREAM_AUTH_TOKEN") {
            self.auth_token = Some(v);
        }
        Self::env_u64("OFFICESTREAM_RECONNECT_BASE_DELAY_MS", &mut self.reconnect_base_delay_ms);
        Self::env_u64("OFFICESTREAM_RECONNECT_MAX_DELAY_MS", &mut self.reconnect_max_delay_ms);
        Self::env_u32("OFFICESTREAM_MAX_RECONNECT_ATTEMPTS", &mut self.max_reconnect_attempts);
        Self::env_u64("OFFICESTREAM_HEARTBEAT_INTERVAL_SECS", &mut self.heartbeat_interval_secs);
        Self::env_u64("OFFICESTREAM_INACTIVITY_TIMEOUT_SECS", &mut self.inactivity_timeout_secs);
        Self::env_u64("OFFICESTREAM_CACHE_TTL_MS", &mut self.cache_ttl_ms);
    }

    fn env_u64(name: &str, slot: &mut u64) {
        if let Ok(raw) = env::var(name) {
            match raw.parse::<u64>() {
                Ok(v) => *slot = v,
                Err(_) => log::warn!("Ignoring non-numeric {}={}", name, raw),
            }
        }
    }

    fn env_u32(name: &str, slot: &mut u32) {
        if let Ok(raw) = env::var(name) {
            match raw.parse::<u32>() {
                Ok(v) => *slot = v,
                Err(_) => log::warn!("Ignoring non-numeric {}={}", name, raw),
            }
        }
    }

    /// The WebSocket endpoint, derived from `api_base` unless overridden.
    pub fn ws_endpoint(&self) -> String {
        if let Some(url) = &self.ws_url {
            return url.clone();
        }
        let base = self.api_base.trim_end_matches('/');
        let derived = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            format!("ws://{}", base)
        };
        format!("{}/ws", derived)
    }
}
