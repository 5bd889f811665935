//! Venue-agnostic domain types.

mod candidate;
mod orderbook;
mod parent;
mod trade;

pub use candidate::{DetectionMethod, IcebergCandidate, SizeCategory};
pub use orderbook::{OrderBookLevel, OrderBookSnapshot};
pub use parent::ParentIcebergOrder;
pub(crate) use parent::refill_intervals;
pub use trade::{Side, Trade};
