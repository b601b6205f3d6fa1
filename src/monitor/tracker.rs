use crate::clock::Clock;
use crate::config::MonitorConfig;
use crate::fetcher::ErrorCategory;
use crate::monitor::{CrawlAttempt, MonitorSnapshot, ProblemSite, SiteStats, TrendPoint};
use crate::url::normalize_domain;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Attempts included in a snapshot's recent-attempt list
const SNAPSHOT_RECENT: usize = 100;

/// Failure categories reported per problem site
const TOP_ERRORS: usize = 3;

/// Bounded attempt history plus cumulative per-domain counters
///
/// All state sits behind one lock; every update is a handful of map and
/// deque operations.
pub struct CrawlMonitor {
    config: MonitorConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<MonitorState>,
}

#[derive(Default)]
struct MonitorState {
    history: VecDeque<CrawlAttempt>,
    next_seq: u64,
    total_attempts: u64,
    successful_attempts: u64,
    sites: HashMap<String, SiteCounters>,
    trend: VecDeque<TrendPoint>,
}

#[derive(Debug, Clone, Default)]
struct SiteCounters {
    total: u64,
    successful: u64,
    failed: u64,
    total_success_length: u64,
    last_success: Option<chrono::DateTime<chrono::Utc>>,
    last_failure: Option<chrono::DateTime<chrono::Utc>>,
    errors: HashMap<ErrorCategory, u64>,
}

impl SiteCounters {
    fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.successful as f64 / self.total as f64
    }

    /// Error counts, most common first; equal counts in category order
    fn sorted_errors(&self) -> Vec<(ErrorCategory, u64)> {
        let mut errors: Vec<_> = self.errors.iter().map(|(k, v)| (*k, *v)).collect();
        errors.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        errors
    }

    fn to_stats(&self, domain: &str) -> SiteStats {
        SiteStats {
            domain: domain.to_string(),
            total_attempts: self.total,
            successful_attempts: self.successful,
            failed_attempts: self.failed,
            avg_content_length: if self.successful == 0 {
                0.0
            } else {
                self.total_success_length as f64 / self.successful as f64
            },
            last_success: self.last_success,
            last_failure: self.last_failure,
            errors: self.sorted_errors(),
        }
    }
}

impl CrawlMonitor {
    pub fn new(config: MonitorConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(MonitorState::default()),
        }
    }

    /// Records a completed attempt
    ///
    /// Assigns the attempt its sequence number, appends it to the history
    /// (dropping the oldest entry past capacity), updates the domain's
    /// counters and appends a trend point.
    ///
    /// # Returns
    ///
    /// The sequence number assigned to the attempt
    pub fn record(&self, mut attempt: CrawlAttempt) -> u64 {
        attempt.domain = normalize_domain(&attempt.domain);

        let mut state = self.state.lock();
        state.next_seq += 1;
        attempt.seq = state.next_seq;

        state.total_attempts += 1;
        if attempt.success {
            state.successful_attempts += 1;
        }

        let site = state.sites.entry(attempt.domain.clone()).or_default();
        site.total += 1;
        if attempt.success {
            site.successful += 1;
            site.total_success_length += attempt.content_length as u64;
            site.last_success = Some(attempt.timestamp);
        } else {
            site.failed += 1;
            site.last_failure = Some(attempt.timestamp);
            if let Some(category) = attempt.error {
                *site.errors.entry(category).or_insert(0) += 1;
            }
        }

        let seq = attempt.seq;
        let timestamp = attempt.timestamp;
        state.history.push_back(attempt);
        while state.history.len() > self.config.history_capacity {
            state.history.pop_front();
        }

        let window = self.config.trend_window.min(state.history.len());
        let successes = state
            .history
            .iter()
            .rev()
            .take(window)
            .filter(|a| a.success)
            .count();
        state.trend.push_back(TrendPoint {
            timestamp,
            success_rate: if window == 0 {
                0.0
            } else {
                successes as f64 / window as f64
            },
            window,
        });
        while state.trend.len() > self.config.trend_capacity {
            state.trend.pop_front();
        }

        seq
    }

    pub fn total_attempts(&self) -> u64 {
        self.state.lock().total_attempts
    }

    /// Success rate over every attempt ever recorded
    pub fn success_rate(&self) -> f64 {
        let state = self.state.lock();
        if state.total_attempts == 0 {
            return 0.0;
        }
        state.successful_attempts as f64 / state.total_attempts as f64
    }

    pub fn site_stats(&self, domain: &str) -> Option<SiteStats> {
        let domain = normalize_domain(domain);
        self.state
            .lock()
            .sites
            .get(&domain)
            .map(|site| site.to_stats(&domain))
    }

    /// Every domain's counters, sorted by domain
    pub fn all_site_stats(&self) -> Vec<SiteStats> {
        sorted_site_stats(&self.state.lock())
    }

    pub fn domain_success_rate(&self, domain: &str) -> Option<f64> {
        self.state
            .lock()
            .sites
            .get(&normalize_domain(domain))
            .map(SiteCounters::success_rate)
    }

    /// The `n` most common failure categories for a domain
    pub fn top_errors(&self, domain: &str, n: usize) -> Vec<(ErrorCategory, u64)> {
        self.state
            .lock()
            .sites
            .get(&normalize_domain(domain))
            .map(|site| site.sorted_errors().into_iter().take(n).collect())
            .unwrap_or_default()
    }

    /// Whether a domain currently qualifies as a problem site
    ///
    /// A domain qualifies once it has at least `problem-min-attempts`
    /// attempts and either its success rate is below `problem-success-rate`,
    /// or it has at least `problem-min-failures` failures with a success
    /// rate below `problem-soft-success-rate`.
    pub fn is_problem_site(&self, domain: &str) -> bool {
        self.state
            .lock()
            .sites
            .get(&normalize_domain(domain))
            .is_some_and(|site| self.qualifies(site))
    }

    fn qualifies(&self, site: &SiteCounters) -> bool {
        let config = &self.config;
        if site.total < config.problem_min_attempts {
            return false;
        }
        let rate = site.success_rate();
        rate < config.problem_success_rate
            || (site.failed >= config.problem_min_failures && rate < config.problem_soft_success_rate)
    }

    /// Problem sites, most failed attempts first
    pub fn problem_sites(&self) -> Vec<ProblemSite> {
        self.problem_sites_in(&self.state.lock())
    }

    fn problem_sites_in(&self, state: &MonitorState) -> Vec<ProblemSite> {
        let mut problems: Vec<ProblemSite> = state
            .sites
            .iter()
            .filter(|(_, site)| self.qualifies(site))
            .map(|(domain, site)| ProblemSite {
                domain: domain.clone(),
                success_rate: site.success_rate(),
                total_attempts: site.total,
                failed_attempts: site.failed,
                last_failure: site.last_failure,
                common_errors: site.sorted_errors().into_iter().take(TOP_ERRORS).collect(),
            })
            .collect();

        problems.sort_by(|a, b| {
            b.failed_attempts
                .cmp(&a.failed_attempts)
                .then_with(|| a.domain.cmp(&b.domain))
        });
        problems
    }

    /// Rolling success-rate points, oldest first
    pub fn trend(&self) -> Vec<TrendPoint> {
        self.state.lock().trend.iter().cloned().collect()
    }

    /// The `limit` most recent attempts, oldest first
    pub fn recent_attempts(&self, limit: usize) -> Vec<CrawlAttempt> {
        recent_in(&self.state.lock(), limit)
    }

    /// Attempts still in the history with a sequence number above `seq`
    pub fn attempts_since(&self, seq: u64) -> Vec<CrawlAttempt> {
        self.state
            .lock()
            .history
            .iter()
            .filter(|a| a.seq > seq)
            .cloned()
            .collect()
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }

    /// Drops history entries older than `retention`, and domains with no
    /// activity inside it
    ///
    /// # Returns
    ///
    /// Number of history entries removed
    pub fn cleanup(&self, retention: chrono::Duration) -> usize {
        let cutoff = self.clock.now() - retention;
        let mut state = self.state.lock();

        let before = state.history.len();
        state.history.retain(|attempt| attempt.timestamp >= cutoff);
        let removed = before - state.history.len();

        let stale: Vec<String> = state
            .sites
            .iter()
            .filter(|(_, site)| site.last_success.max(site.last_failure).is_some_and(|t| t < cutoff))
            .map(|(domain, _)| domain.clone())
            .collect();
        for domain in &stale {
            state.sites.remove(domain);
        }

        if removed > 0 || !stale.is_empty() {
            tracing::info!(
                "Monitor cleanup removed {} attempts and {} idle domains",
                removed,
                stale.len()
            );
        }
        removed
    }

    /// Full monitor state for external dashboards
    ///
    /// Built under a single lock, so totals always agree with the per-site
    /// counters.
    pub fn snapshot(&self) -> MonitorSnapshot {
        let state = self.state.lock();
        let sites = sorted_site_stats(&state);
        let problem_sites = self.problem_sites_in(&state);
        let recent_attempts = recent_in(&state, SNAPSHOT_RECENT);
        let trend = state.trend.iter().cloned().collect();

        let success_rate = if state.total_attempts == 0 {
            0.0
        } else {
            state.successful_attempts as f64 / state.total_attempts as f64
        };

        MonitorSnapshot {
            generated_at: self.clock.now(),
            total_attempts: state.total_attempts,
            successful_attempts: state.successful_attempts,
            failed_attempts: state.total_attempts - state.successful_attempts,
            success_rate,
            sites,
            problem_sites,
            recent_attempts,
            trend,
        }
    }
}

fn sorted_site_stats(state: &MonitorState) -> Vec<SiteStats> {
    let mut sites: Vec<SiteStats> = state
        .sites
        .iter()
        .map(|(domain, site)| site.to_stats(domain))
        .collect();
    sites.sort_by(|a, b| a.domain.cmp(&b.domain));
    sites
}

fn recent_in(state: &MonitorState, limit: usize) -> Vec<CrawlAttempt> {
    let skip = state.history.len().saturating_sub(limit);
    state.history.iter().skip(skip).cloned().collect()
}

impl std::fmt::Debug for CrawlMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CrawlMonitor")
            .field("total_attempts", &state.total_attempts)
            .field("history", &state.history.len())
            .field("sites", &state.sites.len())
            .finish()
    }
}
