//! Per-(venue, symbol) detection service.
//!
//! Detectors are stateful, so each (venue, symbol) pair gets exactly one
//! instance, created on first use and kept behind its own lock. The
//! registry itself is guarded by a read-write lock so concurrent lookups
//! of existing keys never contend with each other.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::config::DetectorConfig;
use crate::detector::{DetectionReport, IcebergDetector};
use crate::domain::{OrderBookSnapshot, Trade};
use crate::error::Result;

type DetectorKey = (String, String);

/// Thread-safe registry of detectors keyed by (venue, symbol).
pub struct DetectionService {
    config: DetectorConfig,
    detectors: RwLock<HashMap<DetectorKey, Arc<Mutex<IcebergDetector>>>>,
}

impl DetectionService {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            detectors: RwLock::new(HashMap::new()),
        }
    }

    /// Run detection for one pair, creating its detector on first use.
    ///
    /// Only the pair's own detector is locked for the duration of the run;
    /// other pairs proceed concurrently.
    pub fn detect(
        &self,
        venue: &str,
        symbol: &str,
        snapshot: OrderBookSnapshot,
        trades: Vec<Trade>,
    ) -> Result<DetectionReport> {
        let detector = self.detector_for(venue, symbol);
        let mut detector = detector.lock();
        detector.detect(snapshot, trades)
    }

    /// Drop the detector (and its history) for one pair. Returns whether a
    /// detector existed.
    pub fn reset(&self, venue: &str, symbol: &str) -> bool {
        let removed = self
            .detectors
            .write()
            .remove(&(venue.to_string(), symbol.to_string()))
            .is_some();
        if removed {
            debug!(venue, symbol, "detector state reset");
        }
        removed
    }

    /// Pairs that currently have a detector instance.
    pub fn tracked_pairs(&self) -> Vec<DetectorKey> {
        let mut pairs: Vec<DetectorKey> = self.detectors.read().keys().cloned().collect();
        pairs.sort();
        pairs
    }

    fn detector_for(&self, venue: &str, symbol: &str) -> Arc<Mutex<IcebergDetector>> {
        let key = (venue.to_string(), symbol.to_string());
        if let Some(detector) = self.detectors.read().get(&key) {
            return Arc::clone(detector);
        }

        let mut detectors = self.detectors.write();
        // A racing writer may have created it between the two locks.
        Arc::clone(detectors.entry(key).or_insert_with(|| {
            debug!(venue, symbol, "creating detector");
            Arc::new(Mutex::new(IcebergDetector::new(
                self.config.clone(),
                venue,
                symbol,
            )))
        }))
    }
}
