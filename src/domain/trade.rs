//! Trade prints and order sides.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DomainError;

/// Side of an order or trade leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// A single trade print.
///
/// The maker side is the side that supplied resting liquidity and is always
/// the opposite of the taker side. It is the key signal for attributing a
/// fill to a hidden resting order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub price: Decimal,
    pub amount: Decimal,
    pub taker_side: Side,
    pub maker_side: Side,
    pub timestamp: DateTime<Utc>,
    pub id: String,
}

impl Trade {
    /// Create a validated trade from adapter fields. The maker side is
    /// derived from the taker side; the timestamp arrives as epoch
    /// milliseconds and is converted here, at the ingestion boundary.
    pub fn new(
        price: Decimal,
        amount: Decimal,
        taker_side: Side,
        timestamp_ms: i64,
        id: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let id = id.into();
        let timestamp = DateTime::<Utc>::from_timestamp_millis(timestamp_ms).ok_or(
            DomainError::InvalidTimestamp {
                id: id.clone(),
                millis: timestamp_ms,
            },
        )?;
        let trade = Self {
            price,
            amount,
            taker_side,
            maker_side: taker_side.opposite(),
            timestamp,
            id,
        };
        trade.validate()?;
        Ok(trade)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.price <= Decimal::ZERO {
            return Err(DomainError::NonPositiveTradePrice {
                id: self.id.clone(),
                price: self.price,
            });
        }
        if self.amount <= Decimal::ZERO {
            return Err(DomainError::NonPositiveTradeAmount {
                id: self.id.clone(),
                amount: self.amount,
            });
        }
        Ok(())
    }
}
