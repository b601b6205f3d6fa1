use crate::config::SelectionConfig;
use crate::profile::{SiteProfile, SiteProfileRegistry, Strategy};
use crate::strategy::{PerformanceLedger, StrategyPerformanceRecord};
use std::sync::Arc;

/// Orders the strategies to try for a domain
///
/// The order is:
///
/// 1. The best-scoring strategy with enough recorded attempts, if any
/// 2. The profile's recommended strategy
/// 3. The profile's fallbacks, in declared order
/// 4. [`Strategy::BASELINE`]
///
/// Duplicates are skipped, so the list is never empty and never repeats.
#[derive(Debug, Clone)]
pub struct StrategySelector {
    ledger: Arc<PerformanceLedger>,
    registry: Arc<SiteProfileRegistry>,
    config: SelectionConfig,
}

impl StrategySelector {
    pub fn new(
        ledger: Arc<PerformanceLedger>,
        registry: Arc<SiteProfileRegistry>,
        config: SelectionConfig,
    ) -> Self {
        Self {
            ledger,
            registry,
            config,
        }
    }

    /// Candidate strategies for a domain, best first
    pub fn select(&self, domain: &str) -> Vec<Strategy> {
        let profile = self.registry.resolve(domain);
        self.select_for_profile(domain, profile)
    }

    /// Like [`select`](Self::select) with an already resolved profile
    pub fn select_for_profile(&self, domain: &str, profile: &SiteProfile) -> Vec<Strategy> {
        let mut candidates = Vec::with_capacity(Strategy::ALL.len());
        let mut push = |strategy: Strategy| {
            if !candidates.contains(&strategy) {
                candidates.push(strategy);
            }
        };

        if let Some(best) = self.best_strategy(domain) {
            push(best);
        }
        push(profile.recommended);
        for &fallback in &profile.fallbacks {
            push(fallback);
        }
        push(Strategy::BASELINE);

        tracing::debug!(
            "Strategy order for {}: {}",
            domain,
            candidates.iter().map(Strategy::as_str).collect::<Vec<_>>().join(", ")
        );
        candidates
    }

    /// The highest-scoring strategy among those with at least
    /// `min-attempts` recorded attempts
    ///
    /// Equal scores resolve to the strategy declared first.
    pub fn best_strategy(&self, domain: &str) -> Option<Strategy> {
        let mut best: Option<(Strategy, f64)> = None;
        for record in self.ledger.domain_records(domain) {
            if record.total_attempts < self.config.min_attempts {
                continue;
            }
            let score = self.score(&record);
            tracing::trace!("{} on {} scores {:.4}", record.strategy, domain, score);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((record.strategy, score));
            }
        }
        best.map(|(strategy, _)| strategy)
    }

    /// `success_weight * success_rate + speed_weight / (1 + avg_response_time / scale)`
    pub fn score(&self, record: &StrategyPerformanceRecord) -> f64 {
        let speed = 1.0 / (1.0 + record.avg_response_time() / self.config.response_time_scale);
        self.config.success_weight * record.success_rate() + self.config.speed_weight * speed
    }
}
