//! Iceberg detection engine.
//!
//! [`IcebergDetector`] owns the per-(venue, symbol) history buffers and
//! runs the three detection passes over each new snapshot + trade batch:
//!
//! 1. [`trade_flow`] - traded volume vs. visible resting volume
//! 2. [`refill`] - repeated replenishment at the same level
//! 3. [`anomaly`] - maker-side trade sizes outside the recent distribution
//!
//! Their outputs are merged by (rounded price, side), confidence-boosted
//! where passes agree, size-adjusted, then filtered by the configured
//! confidence floor.

mod anomaly;
mod history;
mod refill;
mod trade_flow;

pub use history::HistoryBuffer;

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::debug;

use crate::config::DetectorConfig;
use crate::domain::{DetectionMethod, IcebergCandidate, OrderBookSnapshot, Side, Trade};
use crate::error::Result;
use crate::stats;

/// Decimal places used for (price, side) dedup and refill keys. Tight
/// enough for crypto ticks while absorbing adapter formatting noise.
pub(crate) const PRICE_KEY_DP: u32 = 8;

/// Dynamic tolerance: spread percent scaled by this factor, then clamped.
const TOLERANCE_FACTOR: Decimal = dec!(0.005);
const TOLERANCE_MIN: Decimal = dec!(0.0005);
const TOLERANCE_MAX: Decimal = dec!(0.005);

/// Boost when multiple passes agree on the same (price, side), and its cap.
const AGREEMENT_BOOST: f64 = 1.15;
const AGREEMENT_CAP: f64 = 0.98;

/// Size-based adjustment: small hidden/visible ratios get a nudge up when
/// confidence is middling, very large ratios are penalized as likely
/// outlier artifacts.
const SMALL_RATIO_MAX: Decimal = dec!(2);
const SMALL_CONFIDENCE_MAX: f64 = 0.6;
const SMALL_BOOST: f64 = 0.05;
const LARGE_RATIO_MIN: Decimal = dec!(5);
const LARGE_PENALTY: f64 = 0.8;

/// One row of the detection timeline.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub side: Side,
    pub price: Decimal,
    pub volume: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Context for one detection run.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionMetadata {
    pub venue: String,
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub threshold: Decimal,
    /// Price tolerance (fraction) derived from the current spread.
    pub price_tolerance: Decimal,
    pub algorithms: Vec<DetectionMethod>,
}

/// Aggregate statistics over one run's candidates.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectionStatistics {
    pub total_detected: usize,
    pub buy_count: usize,
    pub sell_count: usize,
    pub total_hidden_volume: Decimal,
    pub average_confidence: f64,
    pub method_counts: BTreeMap<DetectionMethod, usize>,
    /// Candidate with the most hidden volume, when any were detected.
    pub largest: Option<IcebergCandidate>,
}

impl DetectionStatistics {
    fn from_candidates(candidates: &[IcebergCandidate]) -> Self {
        let mut method_counts: BTreeMap<DetectionMethod, usize> = BTreeMap::new();
        for candidate in candidates {
            for method in &candidate.methods {
                *method_counts.entry(*method).or_default() += 1;
            }
        }
        let confidences: Vec<f64> = candidates.iter().map(|c| c.confidence).collect();

        Self {
            total_detected: candidates.len(),
            buy_count: candidates.iter().filter(|c| c.side == Side::Buy).count(),
            sell_count: candidates.iter().filter(|c| c.side == Side::Sell).count(),
            total_hidden_volume: candidates.iter().map(|c| c.hidden_volume).sum(),
            average_confidence: stats::mean(&confidences),
            method_counts,
            largest: candidates
                .iter()
                .max_by_key(|c| c.hidden_volume)
                .cloned(),
        }
    }
}

/// Everything one `detect` call produces.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub candidates: Vec<IcebergCandidate>,
    pub timeline: Vec<TimelineEntry>,
    pub metadata: DetectionMetadata,
    pub statistics: DetectionStatistics,
}

/// Iceberg detector for a single (venue, symbol) pair.
///
/// The history buffers are the only state carried between invocations, so
/// one instance must be owned by exactly one key; run one instance per
/// pair for concurrent processing.
pub struct IcebergDetector {
    config: DetectorConfig,
    venue: String,
    symbol: String,
    snapshots: HistoryBuffer<OrderBookSnapshot>,
    trades: HistoryBuffer<Trade>,
}

impl IcebergDetector {
    pub fn new(config: DetectorConfig, venue: impl Into<String>, symbol: impl Into<String>) -> Self {
        let snapshots = HistoryBuffer::new(config.lookback_window);
        let trades = HistoryBuffer::new(config.lookback_window * 3);
        Self {
            config,
            venue: venue.into(),
            symbol: symbol.into(),
            snapshots,
            trades,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Run all three detection passes over one snapshot and trade batch.
    ///
    /// Appends the inputs to the history buffers before analysis. An empty
    /// order book or trade batch yields an empty candidate list, not an
    /// error; only structurally invalid input fails.
    pub fn detect(
        &mut self,
        snapshot: OrderBookSnapshot,
        trades: Vec<Trade>,
    ) -> Result<DetectionReport> {
        snapshot.validate()?;
        for trade in &trades {
            trade.validate()?;
        }

        self.snapshots.push(snapshot.clone());
        self.trades.extend(trades.iter().cloned());

        let tolerance = dynamic_tolerance(&snapshot);

        let candidates = if snapshot.is_empty() {
            debug!(venue = %self.venue, symbol = %self.symbol, "empty order book, skipping detection");
            Vec::new()
        } else {
            let mut raw = trade_flow::detect(&snapshot, &trades, tolerance, &self.config);
            raw.extend(refill::detect(&self.snapshots, tolerance, &self.config));
            raw.extend(anomaly::detect(
                &snapshot,
                &trades,
                &self.trades,
                tolerance,
                &self.config,
            ));

            let mut merged: Vec<IcebergCandidate> = merge(raw)
                .into_iter()
                .map(adjust_for_size)
                .filter(|c| c.confidence >= self.config.min_confidence)
                .collect();
            merged.sort_by(|a, b| {
                a.timestamp
                    .cmp(&b.timestamp)
                    .then(a.price.cmp(&b.price))
                    .then(a.side.cmp(&b.side))
            });
            merged
        };

        debug!(
            venue = %self.venue,
            symbol = %self.symbol,
            candidates = candidates.len(),
            tolerance = %tolerance,
            "detection pass complete"
        );

        let timeline = candidates
            .iter()
            .map(|c| TimelineEntry {
                side: c.side,
                price: c.price,
                volume: c.total_volume(),
                timestamp: c.timestamp,
            })
            .collect();
        let statistics = DetectionStatistics::from_candidates(&candidates);

        Ok(DetectionReport {
            statistics,
            timeline,
            metadata: DetectionMetadata {
                venue: self.venue.clone(),
                symbol: self.symbol.clone(),
                timestamp: snapshot.timestamp,
                threshold: self.config.threshold,
                price_tolerance: tolerance,
                algorithms: vec![
                    DetectionMethod::TradeFlow,
                    DetectionMethod::RefillPattern,
                    DetectionMethod::VolumeAnomaly,
                ],
            },
            candidates,
        })
    }

    /// Snapshots currently buffered, for diagnostics.
    pub fn snapshot_history_len(&self) -> usize {
        self.snapshots.len()
    }

    /// Trades currently buffered, for diagnostics.
    pub fn trade_history_len(&self) -> usize {
        self.trades.len()
    }
}

/// Price tolerance derived from the current spread, so matching stays
/// consistent with current liquidity. Falls back to the tight bound when
/// the spread cannot be computed.
fn dynamic_tolerance(snapshot: &OrderBookSnapshot) -> Decimal {
    match snapshot.spread_percent() {
        Some(spread_percent) => {
            (spread_percent * TOLERANCE_FACTOR).clamp(TOLERANCE_MIN, TOLERANCE_MAX)
        }
        None => TOLERANCE_MIN,
    }
}

/// Deduplicate by (rounded price, side), keeping the higher-confidence
/// candidate and the union of methods. The agreement boost applies only
/// when the colliding candidates come from different passes; two hits from
/// one pass are a duplicate, not corroboration.
fn merge(candidates: Vec<IcebergCandidate>) -> Vec<IcebergCandidate> {
    let mut merged: HashMap<(Decimal, Side), IcebergCandidate> = HashMap::new();

    for candidate in candidates {
        let key = (candidate.price.round_dp(PRICE_KEY_DP), candidate.side);
        match merged.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(candidate);
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                let cross_agreement = candidate
                    .methods
                    .iter()
                    .any(|m| !existing.methods.contains(m));
                let mut methods = existing.methods.clone();
                for method in &candidate.methods {
                    if !methods.contains(method) {
                        methods.push(*method);
                    }
                }
                let mut best = if candidate.confidence > existing.confidence {
                    candidate
                } else {
                    existing.clone()
                };
                if cross_agreement {
                    best.confidence = (best.confidence * AGREEMENT_BOOST).min(AGREEMENT_CAP);
                }
                best.methods = methods;
                *existing = best;
            }
        }
    }

    merged.into_values().collect()
}

/// Size-based confidence adjustment: keep genuinely small icebergs,
/// discount detections implying implausibly deep reserves.
fn adjust_for_size(mut candidate: IcebergCandidate) -> IcebergCandidate {
    let ratio = candidate.hidden_ratio();
    if ratio > LARGE_RATIO_MIN {
        candidate.confidence *= LARGE_PENALTY;
    } else if ratio < SMALL_RATIO_MAX && candidate.confidence < SMALL_CONFIDENCE_MAX {
        candidate.confidence += SMALL_BOOST;
    }
    candidate.confidence = candidate.confidence.clamp(0.0, 1.0);
    candidate
}
