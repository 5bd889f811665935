//! Bergwatch - Iceberg order detection and clustering engine.
//!
//! This crate infers the presence of hidden ("iceberg") limit orders from a
//! venue's visible order book and trade stream, and groups repeated partial
//! fills of the same hidden order into a single inferred parent order. It
//! produces a confidence-scored signal for surveillance and analytics
//! consumers, not ground truth.
//!
//! # Architecture
//!
//! Detection runs three independent statistical passes over one order-book
//! snapshot plus a batch of recent trades:
//!
//! - **Trade-flow analysis** - traded volume at a level exceeding its
//!   visible resting volume
//! - **Refill-pattern detection** - repeated volume replenishment at the
//!   same price level across snapshots
//! - **Volume-anomaly detection** - maker-side trade sizes far outside the
//!   recent size distribution
//!
//! Candidate sightings from the three passes are merged, deduplicated and
//! filtered, then handed to a clusterer that groups chronologically, price-
//! and volume-consistent sightings into parent orders with a consistency
//! score.
//!
//! # Modules
//!
//! - [`config`] - Constructor-level tunables with TOML loading
//! - [`domain`] - Order books, trades, candidates, parent orders
//! - [`detector`] - The three detection passes and their merge step
//! - [`cluster`] - Clustering into parent orders, adaptive tolerance
//! - [`service`] - Per-(venue, symbol) detector registry
//! - [`stats`] - Shared statistics helpers
//! - [`error`] - Error types for the crate
//!
//! # Example
//!
//! ```
//! use bergwatch::config::DetectorConfig;
//! use bergwatch::detector::IcebergDetector;
//! use bergwatch::domain::{OrderBookLevel, OrderBookSnapshot};
//! use chrono::Utc;
//! use rust_decimal_macros::dec;
//!
//! let mut detector = IcebergDetector::new(DetectorConfig::default(), "binance", "BTC/USDT");
//! let snapshot = OrderBookSnapshot::new(
//!     vec![OrderBookLevel::new(dec!(100), dec!(5))],
//!     vec![OrderBookLevel::new(dec!(100.1), dec!(5))],
//!     Utc::now(),
//!     "binance",
//!     "BTC/USDT",
//! )?;
//! let report = detector.detect(snapshot, Vec::new())?;
//! for candidate in &report.candidates {
//!     println!("{} @ {} hidden {}", candidate.side, candidate.price, candidate.hidden_volume);
//! }
//! # Ok::<(), bergwatch::error::Error>(())
//! ```

pub mod cluster;
pub mod config;
pub mod detector;
pub mod domain;
pub mod error;
pub mod logging;
pub mod service;
pub mod stats;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
