//! Configuration for the detection and clustering engine.
//!
//! All tunables are constructor-level: nothing in the engine reads ambient
//! global state. The empirically chosen constants (15% refill growth,
//! 2.3-sigma anomaly threshold, the normality gate) are named fields here
//! rather than inlined magic numbers; their defaults come from observation
//! on liquid crypto books and are not assumed optimal for every market.

use chrono::{DateTime, Datelike, Timelike, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;

use crate::error::{ConfigError, Result};
use crate::logging::LoggingConfig;

/// Configuration for the iceberg detector.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Fractional excess of traded over visible volume required before the
    /// trade-flow pass emits a candidate (0.05 = 5%).
    pub threshold: Decimal,

    /// Snapshot history capacity; the trade history holds three times this.
    pub lookback_window: usize,

    /// Candidates below this confidence are dropped after merging.
    pub min_confidence: f64,

    /// Per-side sample count at which the normality test is trusted; below
    /// it the robust median/MAD estimator is used directly.
    pub min_trades_for_stats: usize,

    /// Per-side floor below which the volume-anomaly pass is skipped.
    pub min_samples_per_side: usize,

    /// Book depth examined by the trade-flow pass, per side.
    pub depth_levels: usize,

    /// Book depth tracked for refill patterns, per side.
    pub refill_depth_levels: usize,

    /// Fractional volume increase at a level that counts as a refill
    /// event (0.15 = 15%).
    pub refill_growth: Decimal,

    /// Refill events required at a (price, side) before it becomes a
    /// candidate.
    pub min_refill_events: usize,

    /// Z-score threshold for the volume-anomaly pass.
    pub anomaly_sigma: f64,

    /// Shapiro-Francia W' at or above which a sample counts as normal.
    pub normality_w_min: f64,

    /// Time-of-day window in which trade-flow confidence is boosted.
    pub session: SessionWindow,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: dec!(0.05),
            lookback_window: 200,
            min_confidence: 0.4,
            min_trades_for_stats: 25,
            min_samples_per_side: 20,
            depth_levels: 30,
            refill_depth_levels: 10,
            refill_growth: dec!(0.15),
            min_refill_events: 3,
            anomaly_sigma: 2.3,
            normality_w_min: 0.95,
            session: SessionWindow::default(),
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.threshold <= Decimal::ZERO {
            return Err(invalid("detector.threshold", "must be positive"));
        }
        if self.lookback_window == 0 {
            return Err(invalid("detector.lookback_window", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(invalid("detector.min_confidence", "must be within [0, 1]"));
        }
        if self.min_samples_per_side < 3 {
            return Err(invalid(
                "detector.min_samples_per_side",
                "must be at least 3",
            ));
        }
        if self.refill_growth <= Decimal::ZERO {
            return Err(invalid("detector.refill_growth", "must be positive"));
        }
        if self.min_refill_events == 0 {
            return Err(invalid("detector.min_refill_events", "must be at least 1"));
        }
        if self.anomaly_sigma <= 0.0 {
            return Err(invalid("detector.anomaly_sigma", "must be positive"));
        }
        if !(0.0..=1.0).contains(&self.normality_w_min) {
            return Err(invalid("detector.normality_w_min", "must be within [0, 1]"));
        }
        self.session.validate()?;
        Ok(())
    }
}

/// An "active session" window: a UTC hour range, optionally restricted to
/// weekdays. Trades inside the window get a small confidence boost in the
/// trade-flow pass.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionWindow {
    pub start_hour: u32,
    pub end_hour: u32,
    pub weekdays_only: bool,
}

impl Default for SessionWindow {
    fn default() -> Self {
        Self {
            start_hour: 12,
            end_hour: 20,
            weekdays_only: true,
        }
    }
}

impl SessionWindow {
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        if self.weekdays_only && timestamp.weekday().number_from_monday() > 5 {
            return false;
        }
        let hour = timestamp.hour();
        hour >= self.start_hour && hour < self.end_hour
    }

    fn validate(&self) -> Result<()> {
        if self.start_hour >= 24 || self.end_hour > 24 {
            return Err(invalid("detector.session", "hours must be within 0..24"));
        }
        if self.start_hour >= self.end_hour {
            return Err(invalid(
                "detector.session",
                "start_hour must precede end_hour",
            ));
        }
        Ok(())
    }
}

/// Configuration for the clusterer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClustererConfig {
    /// Maximum gap in seconds between a candidate and the nearest cluster
    /// boundary.
    pub time_window_seconds: i64,

    /// Maximum price deviation as a percent (0.1 = 0.1%).
    pub price_tolerance_percent: f64,

    /// Maximum volume ratio excess as a percent (50 = ratio up to 1.5).
    pub volume_tolerance_percent: f64,

    /// Minimum members for a cluster to become a parent order.
    pub min_refills: usize,

    /// Minimum consistency score for a cluster to become a parent order.
    pub min_consistency_score: f64,
}

impl Default for ClustererConfig {
    fn default() -> Self {
        Self {
            time_window_seconds: 300,
            price_tolerance_percent: 0.1,
            volume_tolerance_percent: 50.0,
            min_refills: 3,
            min_consistency_score: 0.5,
        }
    }
}

impl ClustererConfig {
    pub fn validate(&self) -> Result<()> {
        if self.time_window_seconds <= 0 {
            return Err(invalid("clusterer.time_window_seconds", "must be positive"));
        }
        if self.price_tolerance_percent <= 0.0 {
            return Err(invalid(
                "clusterer.price_tolerance_percent",
                "must be positive",
            ));
        }
        if self.volume_tolerance_percent <= 0.0 {
            return Err(invalid(
                "clusterer.volume_tolerance_percent",
                "must be positive",
            ));
        }
        if self.min_refills < 2 {
            return Err(invalid("clusterer.min_refills", "must be at least 2"));
        }
        if !(0.0..=1.0).contains(&self.min_consistency_score) {
            return Err(invalid(
                "clusterer.min_consistency_score",
                "must be within [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Top-level configuration, loadable from a TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detector: DetectorConfig,
    pub clusterer: ClustererConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.detector.validate()?;
        self.clusterer.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> crate::error::Error {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
    .into()
}
