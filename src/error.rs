//! Error types for the crate.

use rust_decimal::Decimal;
use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Structural validation errors raised at the ingestion boundary.
///
/// Insufficient data (empty books, short histories) is a normal outcome and
/// never produces one of these; only structurally invalid input does.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("negative price {price} in {context}")]
    NegativePrice { context: &'static str, price: Decimal },

    #[error("negative volume {volume} in {context}")]
    NegativeVolume { context: &'static str, volume: Decimal },

    #[error("trade {id}: price must be positive, got {price}")]
    NonPositiveTradePrice { id: String, price: Decimal },

    #[error("trade {id}: amount must be positive, got {amount}")]
    NonPositiveTradeAmount { id: String, amount: Decimal },

    #[error("trade {id}: invalid epoch milliseconds {millis}")]
    InvalidTimestamp { id: String, millis: i64 },

    #[error("venue must not be empty")]
    EmptyVenue,

    #[error("symbol must not be empty")]
    EmptySymbol,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
