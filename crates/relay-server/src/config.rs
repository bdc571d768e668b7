//! Hub configuration with file and environment layering.
//!
//! Defaults come from [`RelayConfig::default`], an optional JSON file is
//! merged over them, and `RELAY_`-prefixed environment variables win over
//! both.

use std::path::Path;

use figment::providers::{Env, Format, Json, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration for the relay server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Maximum concurrent client connections.
    pub max_connections: usize,
    /// Interval between transport-level pings, in seconds.
    pub ping_interval_secs: u64,
    /// Close the connection if no pong arrives within this window.
    pub pong_timeout_secs: u64,
    /// Max WebSocket message size in bytes.
    pub max_message_size: usize,
    /// Per-client outbound queue capacity.
    pub outbound_queue_size: usize,
    /// Hub event queue capacity (register and dispatch queues).
    pub hub_queue_size: usize,
    /// Default log level when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            max_connections: 256,
            ping_interval_secs: 30,
            pong_timeout_secs: 60,
            max_message_size: 64 * 1024,
            outbound_queue_size: 256,
            hub_queue_size: 512,
            log_level: "info".into(),
        }
    }
}

/// Configuration errors surfaced at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File or environment layer could not be read or parsed.
    #[error("failed to load configuration: {0}")]
    Load(#[from] figment::Error),

    /// Values loaded but are mutually inconsistent.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl RelayConfig {
    /// Load configuration: defaults, then an optional JSON file, then
    /// `RELAY_`-prefixed environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Json::file(path));
        }
        let config: Self = figment.merge(Env::prefixed("RELAY_")).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants.
    ///
    /// The ping interval must stay below the pong timeout so the write
    /// loop's probe pre-empts the liveness deadline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ping_interval_secs == 0 {
            return Err(ConfigError::Invalid("ping_interval_secs must be positive".into()));
        }
        if self.ping_interval_secs >= self.pong_timeout_secs {
            return Err(ConfigError::Invalid(format!(
                "ping_interval_secs ({}) must be less than pong_timeout_secs ({})",
                self.ping_interval_secs, self.pong_timeout_secs
            )));
        }
        if self.outbound_queue_size == 0 || self.hub_queue_size == 0 {
            return Err(ConfigError::Invalid("queue sizes must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = RelayConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 0);
        assert_eq!(cfg.max_connections, 256);
        assert_eq!(cfg.outbound_queue_size, 256);
    }

    #[test]
    fn ping_must_precede_pong_timeout() {
        let cfg = RelayConfig {
            ping_interval_secs: 60,
            pong_timeout_secs: 60,
            ..RelayConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_queue_rejected() {
        let cfg = RelayConfig {
            outbound_queue_size: 0,
            ..RelayConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_without_file_uses_defaults() {
        let cfg = RelayConfig::load(None).unwrap();
        assert_eq!(cfg.max_connections, RelayConfig::default().max_connections);
    }

    #[test]
    fn file_layer_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.json");
        std::fs::write(&path, r#"{"port": 9300, "max_connections": 8}"#).unwrap();
        let cfg = RelayConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.port, 9300);
        assert_eq!(cfg.max_connections, 8);
        // Untouched fields keep their defaults.
        assert_eq!(cfg.ping_interval_secs, 30);
    }

    #[test]
    fn missing_file_is_ignored() {
        let cfg = RelayConfig::load(Some(Path::new("/nonexistent/relay.json"))).unwrap();
        assert_eq!(cfg.port, 0);
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = RelayConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: RelayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.host, cfg.host);
        assert_eq!(back.hub_queue_size, cfg.hub_queue_size);
    }
}
