//! Order book snapshot types.
//!
//! An [`OrderBookSnapshot`] is an immutable view of visible liquidity at one
//! instant: bid levels in descending price order, ask levels ascending.
//! Venue adapters normalize their wire formats into this one shape before
//! anything reaches the detection engine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::trade::Side;
use crate::error::DomainError;

/// A single price level in the order book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookLevel {
    pub price: Decimal,
    pub volume: Decimal,
    /// Number of resting orders at this level, if the venue exposes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_count: Option<u32>,
}

impl OrderBookLevel {
    pub fn new(price: Decimal, volume: Decimal) -> Self {
        Self {
            price,
            volume,
            order_count: None,
        }
    }
}

/// An immutable order book snapshot for one (venue, symbol) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    /// Bid levels, best (highest) price first.
    pub bids: Vec<OrderBookLevel>,
    /// Ask levels, best (lowest) price first.
    pub asks: Vec<OrderBookLevel>,
    pub timestamp: DateTime<Utc>,
    pub venue: String,
    pub symbol: String,
}

impl OrderBookSnapshot {
    /// Create a validated snapshot. Fails fast on negative prices or
    /// volumes and on empty venue/symbol identifiers.
    pub fn new(
        bids: Vec<OrderBookLevel>,
        asks: Vec<OrderBookLevel>,
        timestamp: DateTime<Utc>,
        venue: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let snapshot = Self {
            bids,
            asks,
            timestamp,
            venue: venue.into(),
            symbol: symbol.into(),
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.venue.is_empty() {
            return Err(DomainError::EmptyVenue);
        }
        if self.symbol.is_empty() {
            return Err(DomainError::EmptySymbol);
        }
        for (context, levels) in [("bid level", &self.bids), ("ask level", &self.asks)] {
            for level in levels.iter() {
                if level.price.is_sign_negative() {
                    return Err(DomainError::NegativePrice {
                        context,
                        price: level.price,
                    });
                }
                if level.volume.is_sign_negative() {
                    return Err(DomainError::NegativeVolume {
                        context,
                        volume: level.volume,
                    });
                }
            }
        }
        Ok(())
    }

    /// True when neither side has any visible liquidity.
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Best bid (highest buy price).
    #[must_use]
    pub fn best_bid(&self) -> Option<&OrderBookLevel> {
        self.bids.first()
    }

    /// Best ask (lowest sell price).
    #[must_use]
    pub fn best_ask(&self) -> Option<&OrderBookLevel> {
        self.asks.first()
    }

    /// Levels on the side where a maker of the given side rests: bids for
    /// buy makers, asks for sell makers.
    pub fn levels(&self, side: Side) -> &[OrderBookLevel] {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// Absolute bid-ask spread, when both sides are present.
    pub fn spread(&self) -> Option<Decimal> {
        Some(self.best_ask()?.price - self.best_bid()?.price)
    }

    /// Spread as a percentage of the best bid. `None` when either side is
    /// missing or the best bid is not strictly positive.
    pub fn spread_percent(&self) -> Option<Decimal> {
        let bid = self.best_bid()?.price;
        if bid <= Decimal::ZERO {
            return None;
        }
        Some(self.spread()? / bid * Decimal::ONE_HUNDRED)
    }

    /// Visible volume at the first level on the given side whose price lies
    /// within `tolerance` (a fraction) of `price`. Zero when no level
    /// matches, which downstream code treats as "no visible liquidity"
    /// rather than an error.
    pub fn volume_near(&self, side: Side, price: Decimal, tolerance: Decimal) -> Decimal {
        let bound = price * tolerance;
        self.levels(side)
            .iter()
            .find(|level| (level.price - price).abs() <= bound)
            .map(|level| level.volume)
            .unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::domain::{level, snapshot, ts};
    use rust_decimal_macros::dec;

    #[test]
    fn spread_and_percent() {
        let snap = snapshot(
            vec![level(dec!(100), dec!(5))],
            vec![level(dec!(101), dec!(3))],
            ts(0),
        );
        assert_eq!(snap.spread(), Some(dec!(1)));
        assert_eq!(snap.spread_percent(), Some(dec!(1)));
    }

    #[test]
    fn spread_missing_side_is_none() {
        let snap = snapshot(vec![level(dec!(100), dec!(5))], vec![], ts(0));
        assert_eq!(snap.spread(), None);
        assert_eq!(snap.spread_percent(), None);
    }

    #[test]
    fn volume_near_matches_within_tolerance() {
        let snap = snapshot(
            vec![level(dec!(100), dec!(5)), level(dec!(99), dec!(7))],
            vec![],
            ts(0),
        );
        assert_eq!(
            snap.volume_near(Side::Buy, dec!(99.01), dec!(0.001)),
            dec!(7)
        );
        assert_eq!(
            snap.volume_near(Side::Buy, dec!(95), dec!(0.001)),
            Decimal::ZERO
        );
    }

    #[test]
    fn negative_volume_rejected() {
        let result = OrderBookSnapshot::new(
            vec![OrderBookLevel::new(dec!(100), dec!(-1))],
            vec![],
            ts(0),
            "binance",
            "BTC/USDT",
        );
        assert!(matches!(
            result,
            Err(DomainError::NegativeVolume { .. })
        ));
    }

    #[test]
    fn empty_symbol_rejected() {
        let result = OrderBookSnapshot::new(vec![], vec![], ts(0), "binance", "");
        assert!(matches!(result, Err(DomainError::EmptySymbol)));
    }
}
