//! Spread-adaptive clustering.
//!
//! A fixed price tolerance treats a tight book and a wide one the same,
//! over-grouping in the former and splitting real clusters in the latter.
//! [`AdaptiveClusterer`] derives the tolerance from the current spread on
//! each call and reports what it used, falling back to the base
//! configuration when the spread cannot be computed.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::debug;

use crate::config::ClustererConfig;
use crate::domain::{IcebergCandidate, OrderBookSnapshot};

use super::{ClusterOutcome, IcebergClusterer};

/// Spread percent scaled by this factor gives the price tolerance percent.
const SPREAD_FACTOR: Decimal = dec!(50);
const TOLERANCE_PERCENT_MIN: Decimal = dec!(0.05);
const TOLERANCE_PERCENT_MAX: Decimal = dec!(0.5);

/// The parameters one adaptive pass actually ran with.
#[derive(Debug, Clone, Serialize)]
pub struct AdaptiveParams {
    /// Spread percent the tolerance was derived from, when available.
    pub spread_percent: Option<Decimal>,
    /// Price tolerance percent used for this pass.
    pub price_tolerance_percent: f64,
    /// False when the base configuration was used as a fallback.
    pub adapted: bool,
}

/// A clustering result plus the parameters that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct AdaptiveOutcome {
    pub outcome: ClusterOutcome,
    pub params: AdaptiveParams,
}

/// Clusterer that re-derives its price tolerance from market conditions.
pub struct AdaptiveClusterer {
    base: ClustererConfig,
}

impl AdaptiveClusterer {
    pub fn new(base: ClustererConfig) -> Self {
        Self { base }
    }

    /// Cluster with a tolerance derived from the snapshot's spread.
    pub fn cluster_adaptive(
        &self,
        candidates: Vec<IcebergCandidate>,
        snapshot: &OrderBookSnapshot,
    ) -> AdaptiveOutcome {
        let spread_percent = snapshot.spread_percent();
        let (tolerance, adapted) = match spread_percent.and_then(derive_tolerance) {
            Some(tolerance) => (tolerance, true),
            None => (self.base.price_tolerance_percent, false),
        };

        debug!(
            spread_percent = ?spread_percent,
            tolerance_percent = tolerance,
            adapted,
            "adaptive clustering pass"
        );

        let config = ClustererConfig {
            price_tolerance_percent: tolerance,
            ..self.base.clone()
        };
        let outcome = IcebergClusterer::new(config).cluster(candidates);

        AdaptiveOutcome {
            outcome,
            params: AdaptiveParams {
                spread_percent,
                price_tolerance_percent: tolerance,
                adapted,
            },
        }
    }
}

/// Tolerance percent from spread percent, clamped to a sane band. `None`
/// for non-positive spreads (crossed or degenerate books).
fn derive_tolerance(spread_percent: Decimal) -> Option<f64> {
    if spread_percent <= Decimal::ZERO {
        return None;
    }
    (spread_percent * SPREAD_FACTOR)
        .clamp(TOLERANCE_PERCENT_MIN, TOLERANCE_PERCENT_MAX)
        .to_f64()
}
