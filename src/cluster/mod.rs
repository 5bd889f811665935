//! Clustering of candidate sightings into parent orders.
//!
//! Detection passes emit point-in-time sightings; an actual iceberg order
//! shows up as a run of them at nearly the same price with similar volume
//! and steady timing. [`IcebergClusterer`] groups same-side sightings with
//! a single chronological sweep, scores each group's uniformity, and
//! promotes qualifying groups to [`ParentIcebergOrder`]s. Everything that
//! does not qualify is passed through untouched as an individual sighting.

mod adaptive;

pub use adaptive::{AdaptiveClusterer, AdaptiveOutcome, AdaptiveParams};

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use crate::config::ClustererConfig;
use crate::domain::{refill_intervals, IcebergCandidate, ParentIcebergOrder, Side};
use crate::stats;

/// Consistency score when a cluster offers no usable series, e.g. all
/// members share one timestamp. Neutral rather than zero so such clusters
/// are not rejected outright.
const NEUTRAL_CONSISTENCY: f64 = 0.5;

/// Aggregate numbers for one clustering pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusteringStats {
    pub total_input_candidates: usize,
    pub parent_orders_found: usize,
    /// Candidates absorbed into parent orders.
    pub clustered_candidates: usize,
    pub unclustered_candidates: usize,
    /// Percentage of input candidates absorbed into parents.
    pub clustering_rate: f64,
    pub avg_refills_per_parent: f64,
}

/// Result of one clustering pass.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterOutcome {
    pub parent_orders: Vec<ParentIcebergOrder>,
    /// Candidates that did not join any parent order, in input order after
    /// sorting by (timestamp, price).
    pub individual_candidates: Vec<IcebergCandidate>,
    pub stats: ClusteringStats,
}

/// Cross-parent rollup for reporting endpoints.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParentOrderSummary {
    pub total_parent_orders: usize,
    pub buy_count: usize,
    pub sell_count: usize,
    pub total_refills: usize,
    pub total_volume: Decimal,
    pub total_hidden_volume: Decimal,
    pub average_refill_count: f64,
    pub average_duration_seconds: f64,
    pub average_consistency_score: f64,
    pub average_confidence: f64,
    /// Parent with the most total volume, when any exist.
    pub largest: Option<ParentIcebergOrder>,
}

impl ParentOrderSummary {
    pub fn from_parents(parents: &[ParentIcebergOrder]) -> Self {
        if parents.is_empty() {
            return Self::default();
        }
        let refill_counts: Vec<f64> = parents.iter().map(|p| p.refill_count as f64).collect();
        let durations: Vec<f64> = parents.iter().map(|p| p.duration_seconds).collect();
        let consistencies: Vec<f64> = parents.iter().map(|p| p.consistency_score).collect();
        let confidences: Vec<f64> = parents.iter().map(|p| p.overall_confidence).collect();

        Self {
            total_parent_orders: parents.len(),
            buy_count: parents.iter().filter(|p| p.side == Side::Buy).count(),
            sell_count: parents.iter().filter(|p| p.side == Side::Sell).count(),
            total_refills: parents.iter().map(|p| p.refill_count).sum(),
            total_volume: parents.iter().map(|p| p.total_volume).sum(),
            total_hidden_volume: parents.iter().map(|p| p.total_hidden_volume).sum(),
            average_refill_count: stats::mean(&refill_counts),
            average_duration_seconds: stats::mean(&durations),
            average_consistency_score: stats::mean(&consistencies),
            average_confidence: stats::mean(&confidences),
            largest: parents.iter().max_by_key(|p| p.total_volume).cloned(),
        }
    }
}

/// Groups candidate sightings into parent iceberg orders.
///
/// Stateless apart from its configuration; each `cluster` call sees only
/// the candidates handed to it.
pub struct IcebergClusterer {
    config: ClustererConfig,
}

impl IcebergClusterer {
    pub fn new(config: ClustererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClustererConfig {
        &self.config
    }

    /// Cluster one batch of candidates.
    ///
    /// Candidates are sorted by (timestamp, price) first, so the outcome
    /// does not depend on input order. Buys and sells never share a
    /// cluster.
    pub fn cluster(&self, mut candidates: Vec<IcebergCandidate>) -> ClusterOutcome {
        let total = candidates.len();
        candidates.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.price.cmp(&b.price)));

        let mut parents = Vec::new();
        let mut individuals = Vec::new();

        for side in [Side::Buy, Side::Sell] {
            let side_candidates: Vec<IcebergCandidate> = candidates
                .iter()
                .filter(|c| c.side == side)
                .cloned()
                .collect();

            for group in self.sweep(side_candidates) {
                if group.len() < 2 {
                    individuals.extend(group);
                    continue;
                }
                let consistency = consistency_score(&group);
                if group.len() >= self.config.min_refills
                    && consistency >= self.config.min_consistency_score
                {
                    parents.push(ParentIcebergOrder::from_members(group, consistency));
                } else {
                    individuals.extend(group);
                }
            }
        }

        individuals.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.price.cmp(&b.price)));

        let clustered: usize = parents.iter().map(|p| p.refill_count).sum();
        let stats = ClusteringStats {
            total_input_candidates: total,
            parent_orders_found: parents.len(),
            clustered_candidates: clustered,
            unclustered_candidates: total - clustered,
            clustering_rate: if total == 0 {
                0.0
            } else {
                clustered as f64 / total as f64 * 100.0
            },
            avg_refills_per_parent: if parents.is_empty() {
                0.0
            } else {
                clustered as f64 / parents.len() as f64
            },
        };

        debug!(
            input = total,
            parents = stats.parent_orders_found,
            clustered = stats.clustered_candidates,
            "clustering pass complete"
        );

        ClusterOutcome {
            parent_orders: parents,
            individual_candidates: individuals,
            stats,
        }
    }

    /// One chronological sweep over same-side candidates. A candidate
    /// joins the open group when it is close to the group's latest member
    /// or to the group as a whole; otherwise it opens a new group.
    fn sweep(&self, candidates: Vec<IcebergCandidate>) -> Vec<Vec<IcebergCandidate>> {
        let mut groups: Vec<Vec<IcebergCandidate>> = Vec::new();

        for candidate in candidates {
            match groups.last_mut() {
                Some(group) if self.belongs(group, &candidate) => group.push(candidate),
                _ => groups.push(vec![candidate]),
            }
        }

        groups
    }

    fn belongs(&self, group: &[IcebergCandidate], candidate: &IcebergCandidate) -> bool {
        let Some(latest) = group.last() else {
            return false;
        };
        if self.matches(candidate, latest.price, latest.matching_volume(), latest) {
            return true;
        }

        let n = Decimal::from(group.len());
        let avg_price = group.iter().map(|m| m.price).sum::<Decimal>() / n;
        let avg_volume = group.iter().map(|m| m.matching_volume()).sum::<Decimal>() / n;
        self.matches(candidate, avg_price, avg_volume, latest)
    }

    /// Proximity check against a reference price and volume. The time gap
    /// is always taken to the group's latest member, the nearest boundary
    /// under chronological processing.
    fn matches(
        &self,
        candidate: &IcebergCandidate,
        price: Decimal,
        volume: Decimal,
        latest: &IcebergCandidate,
    ) -> bool {
        let gap = (candidate.timestamp - latest.timestamp).num_seconds();
        if gap.abs() > self.config.time_window_seconds {
            return false;
        }

        if price <= Decimal::ZERO {
            return false;
        }
        let price_diff = ((candidate.price - price).abs() / price)
            .to_f64()
            .unwrap_or(f64::MAX);
        if price_diff > self.config.price_tolerance_percent / 100.0 {
            return false;
        }

        // The volume check needs two usable volumes; a zero on either side
        // reads as "no volume signal" and the candidate is admitted on time
        // and price alone.
        let candidate_volume = candidate.matching_volume();
        if candidate_volume <= Decimal::ZERO || volume <= Decimal::ZERO {
            return true;
        }
        let ratio = (candidate_volume.max(volume) / candidate_volume.min(volume))
            .to_f64()
            .unwrap_or(f64::MAX);
        ratio <= 1.0 + self.config.volume_tolerance_percent / 100.0
    }
}

/// Uniformity of a cluster: the mean of `max(0, 1 - CV)` over its price,
/// volume and refill-interval series, skipping series with no dispersion
/// signal. Perfectly steady refills score close to 1.
pub(crate) fn consistency_score(members: &[IcebergCandidate]) -> f64 {
    let prices: Vec<f64> = members
        .iter()
        .map(|m| m.price.to_f64().unwrap_or(0.0))
        .collect();
    let volumes: Vec<f64> = members
        .iter()
        .map(|m| m.total_volume().to_f64().unwrap_or(0.0))
        .collect();
    let intervals = refill_intervals(members);

    let mut components = Vec::with_capacity(3);
    if prices.len() >= 2 {
        components.push((1.0 - stats::coefficient_of_variation(&prices)).max(0.0));
    }
    if volumes.len() >= 2 {
        components.push((1.0 - stats::coefficient_of_variation(&volumes)).max(0.0));
    }
    if intervals.len() >= 2 {
        components.push((1.0 - stats::coefficient_of_variation(&intervals)).max(0.0));
    }

    if components.is_empty() {
        return NEUTRAL_CONSISTENCY;
    }
    stats::mean(&components)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::domain::{candidate, ts};
    use rust_decimal_macros::dec;

    fn steady_members(n: i64) -> Vec<IcebergCandidate> {
        (0..n)
            .map(|i| candidate(Side::Buy, dec!(100), dec!(2), dec!(8), 0.6, ts(i * 60)))
            .collect()
    }

    #[test]
    fn steady_refills_score_near_one() {
        let score = consistency_score(&steady_members(5));
        assert!(score > 0.99, "score was {score}");
    }

    #[test]
    fn jitter_lowers_consistency() {
        let steady = consistency_score(&steady_members(5));

        let jittered = vec![
            candidate(Side::Buy, dec!(100), dec!(2), dec!(8), 0.6, ts(0)),
            candidate(Side::Buy, dec!(100.05), dec!(2), dec!(20), 0.6, ts(10)),
            candidate(Side::Buy, dec!(99.9), dec!(2), dec!(3), 0.6, ts(250)),
            candidate(Side::Buy, dec!(100.02), dec!(2), dec!(12), 0.6, ts(280)),
            candidate(Side::Buy, dec!(100), dec!(2), dec!(8), 0.6, ts(500)),
        ];
        assert!(consistency_score(&jittered) < steady);
    }

    #[test]
    fn same_timestamp_cluster_gets_neutral_interval_free_score() {
        let members = vec![
            candidate(Side::Sell, dec!(50), dec!(1), dec!(4), 0.5, ts(0)),
            candidate(Side::Sell, dec!(50), dec!(1), dec!(4), 0.5, ts(0)),
        ];
        // Price and volume series are still defined and perfectly uniform.
        assert!(consistency_score(&members) > 0.99);
    }

    #[test]
    fn far_apart_candidates_do_not_group() {
        let clusterer = IcebergClusterer::new(ClustererConfig::default());
        let candidates = vec![
            candidate(Side::Buy, dec!(100), dec!(2), dec!(8), 0.6, ts(0)),
            // Ten minutes later: outside the 300s window.
            candidate(Side::Buy, dec!(100), dec!(2), dec!(8), 0.6, ts(600)),
        ];

        let outcome = clusterer.cluster(candidates);
        assert!(outcome.parent_orders.is_empty());
        assert_eq!(outcome.individual_candidates.len(), 2);
        assert_eq!(outcome.stats.clustering_rate, 0.0);
    }

    #[test]
    fn opposite_sides_never_share_a_parent() {
        let clusterer = IcebergClusterer::new(ClustererConfig::default());
        let mut candidates = steady_members(3);
        candidates.extend((0..3).map(|i| {
            candidate(Side::Sell, dec!(100), dec!(2), dec!(8), 0.6, ts(i * 60 + 10))
        }));

        let outcome = clusterer.cluster(candidates);
        assert_eq!(outcome.parent_orders.len(), 2);
        let sides: Vec<Side> = outcome.parent_orders.iter().map(|p| p.side).collect();
        assert!(sides.contains(&Side::Buy));
        assert!(sides.contains(&Side::Sell));
    }

    #[test]
    fn pair_below_min_refills_stays_individual() {
        let clusterer = IcebergClusterer::new(ClustererConfig::default());
        let outcome = clusterer.cluster(steady_members(2));

        assert!(outcome.parent_orders.is_empty());
        assert_eq!(outcome.individual_candidates.len(), 2);
        assert_eq!(outcome.stats.unclustered_candidates, 2);
    }

    #[test]
    fn empty_input_is_empty_outcome() {
        let clusterer = IcebergClusterer::new(ClustererConfig::default());
        let outcome = clusterer.cluster(Vec::new());

        assert!(outcome.parent_orders.is_empty());
        assert!(outcome.individual_candidates.is_empty());
        assert_eq!(outcome.stats.total_input_candidates, 0);
        assert_eq!(outcome.stats.clustering_rate, 0.0);
    }

    #[test]
    fn summary_rolls_up_parents() {
        let clusterer = IcebergClusterer::new(ClustererConfig::default());
        let outcome = clusterer.cluster(steady_members(4));
        assert_eq!(outcome.parent_orders.len(), 1);

        let summary = ParentOrderSummary::from_parents(&outcome.parent_orders);
        assert_eq!(summary.total_parent_orders, 1);
        assert_eq!(summary.buy_count, 1);
        assert_eq!(summary.sell_count, 0);
        assert_eq!(summary.total_refills, 4);
        assert_eq!(summary.total_volume, dec!(40));
        assert_eq!(summary.total_hidden_volume, dec!(32));
        assert_eq!(summary.average_refill_count, 4.0);
        assert_eq!(summary.average_duration_seconds, 180.0);
        assert!(summary.largest.is_some());
    }

    #[test]
    fn summary_largest_is_keyed_on_total_volume() {
        // Mostly-hidden parent: totals 63, hidden 60.
        let hidden_heavy = ParentIcebergOrder::from_members(
            (0..3)
                .map(|i| candidate(Side::Buy, dec!(100), dec!(1), dec!(20), 0.6, ts(i * 60)))
                .collect(),
            0.9,
        );
        // Mostly-visible parent: totals 120, hidden 30.
        let total_heavy = ParentIcebergOrder::from_members(
            (0..3)
                .map(|i| candidate(Side::Sell, dec!(50), dec!(30), dec!(10), 0.6, ts(i * 60)))
                .collect(),
            0.9,
        );

        let summary = ParentOrderSummary::from_parents(&[hidden_heavy, total_heavy]);
        let largest = summary.largest.unwrap();
        assert_eq!(largest.side, Side::Sell);
        assert_eq!(largest.total_volume, dec!(120));
    }

    #[test]
    fn zero_volume_candidate_admits_on_time_and_price() {
        let clusterer = IcebergClusterer::new(ClustererConfig::default());
        let candidates = vec![
            candidate(Side::Buy, dec!(100), dec!(2), dec!(8), 0.6, ts(0)),
            candidate(Side::Buy, dec!(100), dec!(2), dec!(8), 0.6, ts(60)),
            candidate(Side::Buy, dec!(100), dec!(2), dec!(8), 0.6, ts(120)),
            // No volume signal at all; time and price still match.
            candidate(Side::Buy, dec!(100), dec!(0), dec!(0), 0.6, ts(180)),
        ];

        let outcome = clusterer.cluster(candidates);
        assert_eq!(outcome.parent_orders.len(), 1);
        assert_eq!(outcome.parent_orders[0].refill_count, 4);
    }

    #[test]
    fn summary_of_no_parents_is_all_zero() {
        let summary = ParentOrderSummary::from_parents(&[]);
        assert_eq!(summary.total_parent_orders, 0);
        assert_eq!(summary.total_hidden_volume, Decimal::ZERO);
        assert!(summary.largest.is_none());
    }
}
