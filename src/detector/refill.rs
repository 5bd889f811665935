//! Refill-pattern detection.
//!
//! Tracks visible volume per (price, side) across the snapshot history. A
//! level that keeps jumping back up after being eaten is being replenished
//! from a hidden reserve; enough such events make it a candidate.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::DetectorConfig;
use crate::domain::{DetectionMethod, IcebergCandidate, OrderBookSnapshot, Side};
use crate::stats;

use super::history::HistoryBuffer;
use super::PRICE_KEY_DP;

/// Snapshots needed before refill patterns are worth looking for.
const MIN_SNAPSHOT_HISTORY: usize = 5;
/// Refill count at which confidence saturates (count / 8, capped).
const CONFIDENCE_DIVISOR: f64 = 8.0;
const CONFIDENCE_CAP: f64 = 0.9;
/// Boost for a regular refill cadence, and its cap.
const CADENCE_BOOST: f64 = 1.15;
const CADENCE_CAP: f64 = 0.95;
/// Interval std below this fraction of the mean counts as regular cadence.
const CADENCE_CV_MAX: f64 = 0.3;
/// Fraction of refilled volume assumed to remain hidden.
const HIDDEN_ESTIMATE: Decimal = dec!(0.8);

pub(super) fn detect(
    history: &HistoryBuffer<OrderBookSnapshot>,
    tolerance: Decimal,
    config: &DetectorConfig,
) -> Vec<IcebergCandidate> {
    if history.len() < MIN_SNAPSHOT_HISTORY {
        return Vec::new();
    }
    let Some(latest) = history.latest() else {
        return Vec::new();
    };

    // Volume series per (rounded price, side) across the snapshot window.
    let mut series: HashMap<(Decimal, Side), Vec<(DateTime<Utc>, Decimal)>> = HashMap::new();
    for snapshot in history.iter() {
        for side in [Side::Buy, Side::Sell] {
            for level in snapshot.levels(side).iter().take(config.refill_depth_levels) {
                series
                    .entry((level.price.round_dp(PRICE_KEY_DP), side))
                    .or_default()
                    .push((snapshot.timestamp, level.volume));
            }
        }
    }

    let growth = Decimal::ONE + config.refill_growth;
    let mut candidates = Vec::new();

    for ((price, side), points) in series {
        if points.len() < 2 {
            continue;
        }

        let mut refill_count = 0usize;
        let mut total_refilled = Decimal::ZERO;
        let mut event_times: Vec<DateTime<Utc>> = Vec::new();

        for pair in points.windows(2) {
            let (_, prev_volume) = pair[0];
            let (time, volume) = pair[1];
            if prev_volume > Decimal::ZERO && volume > prev_volume * growth {
                refill_count += 1;
                total_refilled += volume - prev_volume;
                event_times.push(time);
            }
        }

        if refill_count < config.min_refill_events {
            continue;
        }

        let mut confidence = (refill_count as f64 / CONFIDENCE_DIVISOR).min(CONFIDENCE_CAP);

        let intervals: Vec<f64> = event_times
            .windows(2)
            .map(|w| (w[1] - w[0]).num_milliseconds() as f64 / 1000.0)
            .filter(|secs| *secs > 0.0)
            .collect();
        if intervals.len() >= 2 {
            let mean = stats::mean(&intervals);
            if mean > 0.0 && stats::std_dev(&intervals) < CADENCE_CV_MAX * mean {
                confidence = (confidence * CADENCE_BOOST).min(CADENCE_CAP);
            }
        }

        candidates.push(IcebergCandidate::new(
            side,
            price,
            latest.volume_near(side, price, tolerance),
            total_refilled * HIDDEN_ESTIMATE,
            confidence,
            latest.timestamp,
            DetectionMethod::RefillPattern,
            latest.venue.clone(),
            latest.symbol.clone(),
        ));
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::domain::{level, snapshot, ts};
    use rust_decimal_macros::dec;

    fn tolerance() -> Decimal {
        dec!(0.001)
    }

    /// Bid volume series at a fixed price, one snapshot per minute.
    fn history_with_bid_volumes(volumes: &[Decimal]) -> HistoryBuffer<OrderBookSnapshot> {
        let mut history = HistoryBuffer::new(200);
        for (i, &volume) in volumes.iter().enumerate() {
            history.push(snapshot(
                vec![level(dec!(100), volume)],
                vec![level(dec!(100.1), dec!(5))],
                ts(i as i64 * 60),
            ));
        }
        history
    }

    #[test]
    fn repeated_refills_become_candidate() {
        // Three clear >15% jumps: 2->10, 3->10, 2->10.
        let history = history_with_bid_volumes(&[
            dec!(10),
            dec!(2),
            dec!(10),
            dec!(3),
            dec!(10),
            dec!(2),
            dec!(10),
        ]);

        let candidates = detect(&history, tolerance(), &DetectorConfig::default());

        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.side, Side::Buy);
        assert_eq!(c.price, dec!(100));
        assert_eq!(c.visible_volume, dec!(10));
        // Refilled 8 + 7 + 8 = 23, hidden estimate 80%.
        assert_eq!(c.hidden_volume, dec!(23) * HIDDEN_ESTIMATE);
        assert_eq!(c.methods, vec![DetectionMethod::RefillPattern]);
    }

    #[test]
    fn too_few_refills_is_silent() {
        let history = history_with_bid_volumes(&[
            dec!(10),
            dec!(2),
            dec!(10),
            dec!(9),
            dec!(9),
            dec!(9),
        ]);

        let candidates = detect(&history, tolerance(), &DetectorConfig::default());
        assert!(candidates.is_empty());
    }

    #[test]
    fn short_history_is_silent() {
        let history = history_with_bid_volumes(&[dec!(2), dec!(10), dec!(2)]);
        let candidates = detect(&history, tolerance(), &DetectorConfig::default());
        assert!(candidates.is_empty());
    }

    #[test]
    fn regular_cadence_boosts_confidence() {
        // Four refill events at a perfectly even 2-minute cadence.
        let even = history_with_bid_volumes(&[
            dec!(10),
            dec!(2),
            dec!(10),
            dec!(2),
            dec!(10),
            dec!(2),
            dec!(10),
            dec!(2),
            dec!(10),
        ]);
        let candidates = detect(&even, tolerance(), &DetectorConfig::default());
        assert_eq!(candidates.len(), 1);
        let base = 4.0 / CONFIDENCE_DIVISOR;
        assert!(candidates[0].confidence > base);
    }
}
