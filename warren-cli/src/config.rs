//! Configuration for the `warren` command-line client.

use std::path::Path;

use serde::{Deserialize, Serialize};
use warren_core::ClientConfig;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Broker address, credentials and tuning.
    pub broker: ClientConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. "info" or
    /// "warren_core=debug".
    pub level: String,
    /// Log every frame sent and received at trace level.
    pub frames: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            frames: false,
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl CliConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Defaults rendered as TOML.
    pub fn default_toml() -> std::io::Result<String> {
        toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)
    }

    /// Filter directive for tracing, including frame events if enabled.
    pub fn log_filter(&self) -> String {
        if self.logging.frames {
            format!("{},warren::frames=trace", self.logging.level)
        } else {
            self.logging.level.clone()
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use warren_core::ProtocolVersion;

    #[test]
    fn default_config_serializes() {
        let text = CliConfig::default_toml().unwrap();
        assert!(text.contains("[broker]"));
        assert!(text.contains("vhost"));
        assert!(text.contains("[logging]"));
    }

    #[test]
    fn roundtrip_config() {
        let text = CliConfig::default_toml().unwrap();
        let parsed: CliConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.broker, ClientConfig::default());
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let parsed: CliConfig = toml::from_str(
            r#"
            [broker]
            host = "mq.internal"
            spec = "0-8"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.broker.host, "mq.internal");
        assert_eq!(parsed.broker.spec, ProtocolVersion::V0_8);
        assert_eq!(parsed.broker.user, "guest");
        assert!(!parsed.logging.frames);
    }

    #[test]
    fn missing_file_falls_back() {
        let cfg = CliConfig::load(Path::new("/nonexistent/warren.toml"));
        assert_eq!(cfg.broker.port(), 5672);
    }

    #[test]
    fn frame_logging_extends_filter() {
        let mut cfg = CliConfig::default();
        assert_eq!(cfg.log_filter(), "info");
        cfg.logging.frames = true;
        assert_eq!(cfg.log_filter(), "info,warren::frames=trace");
    }
}
