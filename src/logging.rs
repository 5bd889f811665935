//! Logging configuration and subscriber setup.
//!
//! The engine only emits `tracing` events; installing a subscriber is the
//! embedding application's choice. [`LoggingConfig`] rides along in the
//! top-level [`Config`](crate::config::Config) so the filter and output
//! format come from the same TOML file as the detection tunables.

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive. `RUST_LOG` takes precedence when set.
    pub level: String,
    /// `pretty` for humans, `json` for log shippers.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<()> {
        if EnvFilter::try_new(&self.level).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "logging.level",
                reason: format!("not a valid filter directive: {:?}", self.level),
            }
            .into());
        }
        if !matches!(self.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::InvalidValue {
                field: "logging.format",
                reason: format!("expected \"pretty\" or \"json\", got {:?}", self.format),
            }
            .into());
        }
        Ok(())
    }

    /// Install the global subscriber. The first call wins; later calls are
    /// no-ops, so embedding applications and test harnesses can both call
    /// this without coordinating.
    pub fn init(&self) {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        // An Err here means a subscriber is already active; keep it.
        let _ = match self.format.as_str() {
            "json" => fmt().json().with_env_filter(filter).try_init(),
            _ => fmt().with_env_filter(filter).try_init(),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn defaults_validate() {
        LoggingConfig::default().validate().unwrap();
    }

    #[test]
    fn directive_levels_validate() {
        let config = LoggingConfig {
            level: "debug,bergwatch=trace".into(),
            format: "json".into(),
        };
        config.validate().unwrap();
    }

    #[test]
    fn unknown_format_is_rejected() {
        let config = LoggingConfig {
            format: "yaml".into(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn malformed_filter_is_rejected() {
        let config = LoggingConfig {
            level: "bergwatch=notalevel".into(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn init_tolerates_repeated_calls() {
        let config = LoggingConfig::default();
        config.init();
        // Second call must not panic even though a subscriber is active.
        config.init();
        LoggingConfig {
            format: "json".into(),
            ..Default::default()
        }
        .init();

        tracing::debug!("subscriber installed");
    }
}
