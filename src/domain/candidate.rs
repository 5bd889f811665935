//! Iceberg candidate sightings.
//!
//! An [`IcebergCandidate`] is one detection pass's claim that hidden volume
//! rests at a price level. Candidates are created fresh on every detector
//! run and never mutated afterwards; the clusterer only consumes them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::trade::Side;

/// Which detection pass produced a sighting.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    TradeFlow,
    RefillPattern,
    VolumeAnomaly,
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TradeFlow => write!(f, "trade_flow"),
            Self::RefillPattern => write!(f, "refill_pattern"),
            Self::VolumeAnomaly => write!(f, "volume_anomaly"),
        }
    }
}

/// Size class of a sighting, by hidden-to-visible ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeCategory {
    Small,
    Medium,
    Large,
}

/// A single inferred iceberg sighting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IcebergCandidate {
    pub side: Side,
    pub price: Decimal,
    pub visible_volume: Decimal,
    pub hidden_volume: Decimal,
    /// Heuristic confidence, always within [0, 1].
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    /// Detection passes that agree on this sighting. A single entry unless
    /// multiple passes hit the same (price, side) key.
    pub methods: Vec<DetectionMethod>,
    pub venue: String,
    pub symbol: String,
}

impl IcebergCandidate {
    /// Create a candidate from one detection pass. Confidence is clamped
    /// into [0, 1] here so no later arithmetic can push it outside.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        side: Side,
        price: Decimal,
        visible_volume: Decimal,
        hidden_volume: Decimal,
        confidence: f64,
        timestamp: DateTime<Utc>,
        method: DetectionMethod,
        venue: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        debug_assert!(!visible_volume.is_sign_negative());
        debug_assert!(!hidden_volume.is_sign_negative());
        Self {
            side,
            price,
            visible_volume,
            hidden_volume,
            confidence: confidence.clamp(0.0, 1.0),
            timestamp,
            methods: vec![method],
            venue: venue.into(),
            symbol: symbol.into(),
        }
    }

    /// Total inferred size: visible plus hidden.
    #[must_use]
    pub fn total_volume(&self) -> Decimal {
        self.visible_volume + self.hidden_volume
    }

    /// Hidden-to-visible ratio. Zero when nothing is visible, which reads
    /// as "no ratio signal" rather than a division error.
    #[must_use]
    pub fn hidden_ratio(&self) -> Decimal {
        if self.visible_volume <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.hidden_volume / self.visible_volume
    }

    /// Volume used when comparing candidates during clustering: hidden
    /// volume when present, otherwise the total.
    #[must_use]
    pub(crate) fn matching_volume(&self) -> Decimal {
        if self.hidden_volume > Decimal::ZERO {
            self.hidden_volume
        } else {
            self.total_volume()
        }
    }

    /// Size class by hidden-to-visible ratio.
    #[must_use]
    pub fn size_category(&self) -> SizeCategory {
        let ratio = self.hidden_ratio();
        if ratio >= Decimal::from(3) {
            SizeCategory::Large
        } else if ratio >= Decimal::ONE {
            SizeCategory::Medium
        } else {
            SizeCategory::Small
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::domain::ts;
    use rust_decimal_macros::dec;

    fn candidate(visible: Decimal, hidden: Decimal, confidence: f64) -> IcebergCandidate {
        IcebergCandidate::new(
            Side::Buy,
            dec!(100),
            visible,
            hidden,
            confidence,
            ts(0),
            DetectionMethod::TradeFlow,
            "binance",
            "BTC/USDT",
        )
    }

    #[test]
    fn total_volume_is_visible_plus_hidden() {
        let c = candidate(dec!(3), dec!(7), 0.5);
        assert_eq!(c.total_volume(), dec!(10));
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(candidate(dec!(1), dec!(1), 1.4).confidence, 1.0);
        assert_eq!(candidate(dec!(1), dec!(1), -0.2).confidence, 0.0);
    }

    #[test]
    fn hidden_ratio_guards_zero_visible() {
        let c = candidate(dec!(0), dec!(5), 0.5);
        assert_eq!(c.hidden_ratio(), Decimal::ZERO);
    }

    #[test]
    fn size_categories() {
        assert_eq!(candidate(dec!(10), dec!(1), 0.5).size_category(), SizeCategory::Small);
        assert_eq!(candidate(dec!(10), dec!(15), 0.5).size_category(), SizeCategory::Medium);
        assert_eq!(candidate(dec!(10), dec!(40), 0.5).size_category(), SizeCategory::Large);
    }

    #[test]
    fn matching_volume_falls_back_to_total() {
        let c = candidate(dec!(4), dec!(0), 0.5);
        assert_eq!(c.matching_volume(), dec!(4));
        let c = candidate(dec!(4), dec!(6), 0.5);
        assert_eq!(c.matching_volume(), dec!(6));
    }
}
