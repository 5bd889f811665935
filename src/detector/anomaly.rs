//! Volume-anomaly detection.
//!
//! Builds a size distribution over recent maker-side trade amounts, then
//! flags trades in the current batch that sit far outside it. When such a
//! trade also dwarfs the visible volume at its price, the excess is
//! attributed to hidden liquidity.
//!
//! The estimator choice is an explicit branch keyed on sample size: with
//! enough samples the Shapiro-Francia check decides between mean/std and
//! the robust median/MAD pair; with fewer, the robust pair is used
//! directly. Too few samples on a side simply skips that side.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::config::DetectorConfig;
use crate::domain::{DetectionMethod, IcebergCandidate, OrderBookSnapshot, Side, Trade};
use crate::stats;

use super::history::HistoryBuffer;

/// Base confidence at the anomaly threshold.
const BASE_CONFIDENCE: f64 = 0.5;
/// Confidence gained per z-score unit beyond the threshold.
const Z_SLOPE: f64 = 0.1;
const CONFIDENCE_CAP: f64 = 0.85;

/// Center/scale pair describing one side's trade-size distribution.
#[derive(Debug, Clone, Copy)]
struct SizeDistribution {
    center: f64,
    scale: f64,
}

pub(super) fn detect(
    snapshot: &OrderBookSnapshot,
    batch: &[Trade],
    history: &HistoryBuffer<Trade>,
    tolerance: Decimal,
    config: &DetectorConfig,
) -> Vec<IcebergCandidate> {
    let mut candidates = Vec::new();

    for side in [Side::Buy, Side::Sell] {
        let samples: Vec<f64> = history
            .iter()
            .filter(|t| t.maker_side == side)
            .map(|t| t.amount.to_f64().unwrap_or(0.0))
            .collect();

        let Some(dist) = estimate(&samples, config) else {
            continue;
        };
        let threshold = dist.center + config.anomaly_sigma * dist.scale;

        for trade in batch.iter().filter(|t| t.maker_side == side) {
            let amount = trade.amount.to_f64().unwrap_or(0.0);
            if amount <= threshold {
                continue;
            }

            let visible = snapshot.volume_near(side, trade.price, tolerance);
            if visible >= trade.amount {
                continue;
            }

            let z = (amount - dist.center) / dist.scale;
            let confidence =
                (BASE_CONFIDENCE + Z_SLOPE * (z - config.anomaly_sigma)).min(CONFIDENCE_CAP);

            candidates.push(IcebergCandidate::new(
                side,
                trade.price,
                visible,
                trade.amount - visible,
                confidence,
                trade.timestamp,
                DetectionMethod::VolumeAnomaly,
                snapshot.venue.clone(),
                snapshot.symbol.clone(),
            ));
        }
    }

    candidates
}

/// Pick the distribution estimate for one side, or `None` when the side
/// has too few samples or no usable dispersion.
fn estimate(samples: &[f64], config: &DetectorConfig) -> Option<SizeDistribution> {
    if samples.len() < config.min_samples_per_side {
        return None;
    }

    let dist = if samples.len() >= config.min_trades_for_stats && looks_normal(samples, config) {
        SizeDistribution {
            center: stats::mean(samples),
            scale: stats::std_dev(samples),
        }
    } else {
        SizeDistribution {
            center: stats::median(samples),
            scale: stats::mad(samples) * stats::MAD_SCALE,
        }
    };

    // Zero dispersion means every trade is the "same size"; no anomaly
    // signal can be extracted.
    if dist.scale <= 0.0 {
        return None;
    }
    Some(dist)
}

fn looks_normal(samples: &[f64], config: &DetectorConfig) -> bool {
    match stats::shapiro_francia_w(samples) {
        Some(w) => w >= config.normality_w_min,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::domain::{level, snapshot, trade, ts};
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal_macros::dec;

    fn tolerance() -> Decimal {
        dec!(0.001)
    }

    /// 20 sell-taker trades (buy makers) of roughly similar size.
    fn history_of_buy_maker_trades() -> HistoryBuffer<Trade> {
        let mut history = HistoryBuffer::new(600);
        for i in 0..20 {
            let amount = dec!(10) + Decimal::from(i % 5);
            history.push(trade(dec!(100), amount, Side::Sell, ts(i)));
        }
        history
    }

    #[test]
    fn outlier_trade_becomes_candidate() {
        let snap = snapshot(
            vec![level(dec!(100), dec!(5))],
            vec![level(dec!(100.1), dec!(5))],
            ts(30),
        );
        let history = history_of_buy_maker_trades();
        let outlier = trade(dec!(100), dec!(120), Side::Sell, ts(25));

        let candidates = detect(
            &snap,
            std::slice::from_ref(&outlier),
            &history,
            tolerance(),
            &DetectorConfig::default(),
        );

        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.side, Side::Buy);
        assert_eq!(c.visible_volume, dec!(5));
        assert_eq!(c.hidden_volume, dec!(115));
        assert!(c.confidence > 0.5);
        assert!(c.confidence <= CONFIDENCE_CAP);
        assert_eq!(c.methods, vec![DetectionMethod::VolumeAnomaly]);
    }

    #[test]
    fn too_few_samples_is_silent() {
        let snap = snapshot(vec![level(dec!(100), dec!(5))], vec![], ts(0));
        let mut history = HistoryBuffer::new(600);
        for i in 0..10 {
            history.push(trade(dec!(100), dec!(10), Side::Sell, ts(i)));
        }
        let outlier = trade(dec!(100), dec!(500), Side::Sell, ts(11));

        let candidates = detect(
            &snap,
            std::slice::from_ref(&outlier),
            &history,
            tolerance(),
            &DetectorConfig::default(),
        );
        assert!(candidates.is_empty());
    }

    #[test]
    fn zero_dispersion_is_silent() {
        let snap = snapshot(vec![level(dec!(100), dec!(5))], vec![], ts(0));
        let mut history = HistoryBuffer::new(600);
        for i in 0..30 {
            history.push(trade(dec!(100), dec!(10), Side::Sell, ts(i)));
        }
        let outlier = trade(dec!(100), dec!(500), Side::Sell, ts(31));

        let candidates = detect(
            &snap,
            std::slice::from_ref(&outlier),
            &history,
            tolerance(),
            &DetectorConfig::default(),
        );
        assert!(candidates.is_empty());
    }

    #[test]
    fn covered_by_visible_volume_is_silent() {
        // Big trade, but the book showed even more at that level.
        let snap = snapshot(vec![level(dec!(100), dec!(200))], vec![], ts(0));
        let history = history_of_buy_maker_trades();
        let big = trade(dec!(100), dec!(120), Side::Sell, ts(25));

        let candidates = detect(
            &snap,
            std::slice::from_ref(&big),
            &history,
            tolerance(),
            &DetectorConfig::default(),
        );
        assert!(candidates.is_empty());
    }

    #[test]
    fn larger_sample_still_flags_moderate_outlier() {
        // 40 symmetric samples around 10; the outlier trips whichever
        // estimator the normality gate selects.
        let mut history = HistoryBuffer::new(600);
        let offsets = [-3.0, -2.0, -1.5, -1.0, -0.5, 0.0, 0.5, 1.0, 1.5, 2.0];
        for rep in 0..4 {
            for (i, off) in offsets.iter().enumerate() {
                let amount = Decimal::from_f64(10.0 + off).unwrap_or(dec!(10));
                history.push(trade(
                    dec!(100),
                    amount,
                    Side::Sell,
                    ts((rep * 10 + i) as i64),
                ));
            }
        }
        let snap = snapshot(vec![level(dec!(100), dec!(1))], vec![], ts(50));
        let outlier = trade(dec!(100), dec!(30), Side::Sell, ts(45));

        let candidates = detect(
            &snap,
            std::slice::from_ref(&outlier),
            &history,
            tolerance(),
            &DetectorConfig::default(),
        );
        assert_eq!(candidates.len(), 1);
    }
}
