//! Inferred parent iceberg orders.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::candidate::{DetectionMethod, IcebergCandidate};
use super::trade::Side;
use crate::stats;

/// A parent order reconstructed from a cluster of correlated sightings.
///
/// Built only inside a single clustering pass and never persisted by the
/// engine. `refill_count` always satisfies the clusterer's configured
/// minimum, and both confidence fields stay within [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentIcebergOrder {
    pub side: Side,

    // Price aggregates
    pub avg_price: Decimal,
    pub price_min: Decimal,
    pub price_max: Decimal,
    pub price_std: f64,

    // Volume aggregates
    pub total_volume: Decimal,
    pub total_visible_volume: Decimal,
    pub total_hidden_volume: Decimal,
    pub avg_refill_size: f64,
    pub refill_size_std: f64,

    pub refill_count: usize,

    // Timing
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub duration_seconds: f64,
    pub avg_refill_interval: f64,
    pub refill_interval_std: f64,

    // Confidence
    /// Mean confidence of the member sightings.
    pub overall_confidence: f64,
    /// How uniform price, volume and timing are across members.
    pub consistency_score: f64,

    /// Union of detection passes that contributed members.
    pub methods: Vec<DetectionMethod>,
    pub venue: String,
    pub symbol: String,

    /// Member sightings, in chronological order.
    pub refills: Vec<IcebergCandidate>,
}

impl ParentIcebergOrder {
    /// Aggregate a non-empty, chronologically sorted member list into a
    /// parent order. The consistency score is computed by the clusterer,
    /// which owns that policy.
    pub(crate) fn from_members(members: Vec<IcebergCandidate>, consistency_score: f64) -> Self {
        debug_assert!(!members.is_empty());
        let n = Decimal::from(members.len());

        let prices: Vec<Decimal> = members.iter().map(|m| m.price).collect();
        let prices_f: Vec<f64> = prices.iter().map(|p| p.to_f64().unwrap_or(0.0)).collect();
        let totals_f: Vec<f64> = members
            .iter()
            .map(|m| m.total_volume().to_f64().unwrap_or(0.0))
            .collect();

        let first_seen = members
            .iter()
            .map(|m| m.timestamp)
            .min()
            .unwrap_or(members[0].timestamp);
        let last_seen = members
            .iter()
            .map(|m| m.timestamp)
            .max()
            .unwrap_or(members[0].timestamp);

        let intervals = refill_intervals(&members);

        let mut methods: Vec<DetectionMethod> = Vec::new();
        for member in &members {
            for method in &member.methods {
                if !methods.contains(method) {
                    methods.push(*method);
                }
            }
        }

        let confidences: Vec<f64> = members.iter().map(|m| m.confidence).collect();

        Self {
            side: members[0].side,
            avg_price: prices.iter().sum::<Decimal>() / n,
            price_min: prices.iter().copied().min().unwrap_or(members[0].price),
            price_max: prices.iter().copied().max().unwrap_or(members[0].price),
            price_std: stats::std_dev(&prices_f),
            total_volume: members.iter().map(|m| m.total_volume()).sum(),
            total_visible_volume: members.iter().map(|m| m.visible_volume).sum(),
            total_hidden_volume: members.iter().map(|m| m.hidden_volume).sum(),
            avg_refill_size: stats::mean(&totals_f),
            refill_size_std: stats::std_dev(&totals_f),
            refill_count: members.len(),
            first_seen,
            last_seen,
            duration_seconds: (last_seen - first_seen).num_milliseconds() as f64 / 1000.0,
            avg_refill_interval: stats::mean(&intervals),
            refill_interval_std: stats::std_dev(&intervals),
            overall_confidence: stats::mean(&confidences),
            consistency_score: consistency_score.clamp(0.0, 1.0),
            methods,
            venue: members[0].venue.clone(),
            symbol: members[0].symbol.clone(),
            refills: members,
        }
    }
}

/// Positive gaps in seconds between consecutive member timestamps.
pub(crate) fn refill_intervals(members: &[IcebergCandidate]) -> Vec<f64> {
    members
        .windows(2)
        .map(|w| (w[1].timestamp - w[0].timestamp).num_milliseconds() as f64 / 1000.0)
        .filter(|secs| *secs > 0.0)
        .collect()
}
