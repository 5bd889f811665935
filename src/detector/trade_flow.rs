//! Trade-flow analysis.
//!
//! If the volume traded against a level materially exceeds what the book
//! ever showed there, something was replenishing it. Trades are attributed
//! to a level via their maker side: buy-maker trades consumed resting bids,
//! sell-maker trades consumed resting asks.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::config::DetectorConfig;
use crate::domain::{DetectionMethod, IcebergCandidate, OrderBookSnapshot, Side, Trade};

/// Base confidence when traded volume just clears the threshold.
const BASE_CONFIDENCE: f64 = 0.4;
/// Confidence gained per unit of traded-to-visible excess.
const EXCESS_SLOPE: f64 = 0.3;
/// Confidence cap before the session boost.
const CONFIDENCE_CAP: f64 = 0.95;
/// Multiplier applied when the triggering trades fall in the active session.
const SESSION_BOOST: f64 = 1.1;

pub(super) fn detect(
    snapshot: &OrderBookSnapshot,
    trades: &[Trade],
    tolerance: Decimal,
    config: &DetectorConfig,
) -> Vec<IcebergCandidate> {
    let mut candidates = Vec::new();

    for side in [Side::Buy, Side::Sell] {
        for level in snapshot.levels(side).iter().take(config.depth_levels) {
            if level.volume <= Decimal::ZERO {
                continue;
            }

            let bound = level.price * tolerance;
            let matched: Vec<&Trade> = trades
                .iter()
                .filter(|t| t.maker_side == side && (t.price - level.price).abs() <= bound)
                .collect();

            let traded: Decimal = matched.iter().map(|t| t.amount).sum();
            if traded <= level.volume * (Decimal::ONE + config.threshold) {
                continue;
            }

            let ratio = (traded / level.volume).to_f64().unwrap_or(0.0);
            let mut confidence =
                (BASE_CONFIDENCE + EXCESS_SLOPE * (ratio - 1.0)).min(CONFIDENCE_CAP);
            if matched.iter().any(|t| config.session.contains(t.timestamp)) {
                confidence = (confidence * SESSION_BOOST).min(1.0);
            }

            candidates.push(IcebergCandidate::new(
                side,
                level.price,
                level.volume,
                traded - level.volume,
                confidence,
                snapshot.timestamp,
                DetectionMethod::TradeFlow,
                snapshot.venue.clone(),
                snapshot.symbol.clone(),
            ));
        }
    }

    candidates
}
