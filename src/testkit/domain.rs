//! Builders for domain primitives used across tests.
//!
//! Provides concise factory functions for order book levels, snapshots,
//! trades and candidates so tests focus on assertions rather than
//! construction boilerplate. All builders use the `binance` / `BTC/USDT`
//! pair and timestamps relative to [`ts`]'s fixed anchor.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    DetectionMethod, IcebergCandidate, OrderBookLevel, OrderBookSnapshot, Side, Trade,
};

pub const VENUE: &str = "binance";
pub const SYMBOL: &str = "BTC/USDT";

/// Seconds relative to a fixed anchor: Wednesday 2024-07-03 00:00:00 UTC.
/// The anchor hour lies outside the default session window, so session
/// boosts never fire unless a test opts in explicitly.
pub fn ts(secs: i64) -> DateTime<Utc> {
    let anchor = Utc
        .with_ymd_and_hms(2024, 7, 3, 0, 0, 0)
        .single()
        .unwrap_or_default();
    anchor + chrono::Duration::seconds(secs)
}

/// Create a level without an order count.
pub fn level(price: Decimal, volume: Decimal) -> OrderBookLevel {
    OrderBookLevel::new(price, volume)
}

/// Create a snapshot for the canonical test pair.
pub fn snapshot(
    bids: Vec<OrderBookLevel>,
    asks: Vec<OrderBookLevel>,
    timestamp: DateTime<Utc>,
) -> OrderBookSnapshot {
    OrderBookSnapshot {
        bids,
        asks,
        timestamp,
        venue: VENUE.to_string(),
        symbol: SYMBOL.to_string(),
    }
}

/// Create a trade with the maker side derived from the taker side.
pub fn trade(
    price: Decimal,
    amount: Decimal,
    taker_side: Side,
    timestamp: DateTime<Utc>,
) -> Trade {
    Trade {
        price,
        amount,
        taker_side,
        maker_side: taker_side.opposite(),
        timestamp,
        id: format!("t-{}", timestamp.timestamp_millis()),
    }
}

/// Create a trade-flow candidate for the canonical test pair.
pub fn candidate(
    side: Side,
    price: Decimal,
    visible: Decimal,
    hidden: Decimal,
    confidence: f64,
    timestamp: DateTime<Utc>,
) -> IcebergCandidate {
    IcebergCandidate::new(
        side,
        price,
        visible,
        hidden,
        confidence,
        timestamp,
        DetectionMethod::TradeFlow,
        VENUE,
        SYMBOL,
    )
}
