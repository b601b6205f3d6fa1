use crate::profile::Strategy;
use crate::url::normalize_domain;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Aggregate outcome of one strategy on one domain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyPerformanceRecord {
    pub domain: String,
    pub strategy: Strategy,
    pub total_attempts: u64,
    pub successful_attempts: u64,
    /// Sum of attempt durations, in seconds
    pub total_response_time: f64,
    /// Sum of extracted text lengths, in characters
    pub total_content_length: u64,
}

impl StrategyPerformanceRecord {
    pub fn new(domain: impl Into<String>, strategy: Strategy) -> Self {
        Self {
            domain: domain.into(),
            strategy,
            total_attempts: 0,
            successful_attempts: 0,
            total_response_time: 0.0,
            total_content_length: 0,
        }
    }

    /// Fraction of successful attempts, in [0, 1]; 0 before any attempt
    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            return 0.0;
        }
        self.successful_attempts as f64 / self.total_attempts as f64
    }

    /// Mean attempt duration in seconds
    pub fn avg_response_time(&self) -> f64 {
        if self.total_attempts == 0 {
            return 0.0;
        }
        self.total_response_time / self.total_attempts as f64
    }

    /// Mean extracted length over all attempts, failures counting as zero
    pub fn avg_content_length(&self) -> f64 {
        if self.total_attempts == 0 {
            return 0.0;
        }
        self.total_content_length as f64 / self.total_attempts as f64
    }

    fn add(&mut self, success: bool, response_time: Duration, content_length: usize) {
        self.total_attempts += 1;
        if success {
            self.successful_attempts += 1;
        }
        self.total_response_time += response_time.as_secs_f64();
        self.total_content_length += content_length as u64;
    }
}

/// Per (domain, strategy) success and latency statistics
///
/// Each domain is a separate map shard, so concurrent crawls of different
/// domains do not contend.
#[derive(Debug, Default)]
pub struct PerformanceLedger {
    domains: DashMap<String, HashMap<Strategy, StrategyPerformanceRecord>>,
}

impl PerformanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of one attempt
    ///
    /// # Arguments
    ///
    /// * `domain` - Domain of the crawled URL (normalized here)
    /// * `strategy` - Strategy that made the attempt
    /// * `success` - Whether the attempt produced enough text
    /// * `response_time` - Wall time of the attempt, fetch and extraction
    /// * `content_length` - Extracted characters (0 on failure)
    pub fn record(
        &self,
        domain: &str,
        strategy: Strategy,
        success: bool,
        response_time: Duration,
        content_length: usize,
    ) {
        let domain = normalize_domain(domain);
        let mut entry = self.domains.entry(domain.clone()).or_default();
        entry
            .entry(strategy)
            .or_insert_with(|| StrategyPerformanceRecord::new(domain, strategy))
            .add(success, response_time, content_length);
    }

    /// Statistics for one (domain, strategy) pair, if it was ever attempted
    pub fn stats(&self, domain: &str, strategy: Strategy) -> Option<StrategyPerformanceRecord> {
        self.domains
            .get(&normalize_domain(domain))
            .and_then(|strategies| strategies.get(&strategy).cloned())
    }

    /// All records of a domain, in strategy declaration order
    pub fn domain_records(&self, domain: &str) -> Vec<StrategyPerformanceRecord> {
        let Some(strategies) = self.domains.get(&normalize_domain(domain)) else {
            return Vec::new();
        };
        let mut records: Vec<_> = strategies.values().cloned().collect();
        records.sort_by_key(|r| r.strategy);
        records
    }

    /// Every record, sorted by domain then strategy
    pub fn records(&self) -> Vec<StrategyPerformanceRecord> {
        let mut records: Vec<_> = self
            .domains
            .iter()
            .flat_map(|entry| entry.value().values().cloned().collect::<Vec<_>>())
            .collect();
        records.sort_by(|a, b| a.domain.cmp(&b.domain).then(a.strategy.cmp(&b.strategy)));
        records
    }

    /// Replaces the ledger contents with persisted records
    pub fn load(&self, records: impl IntoIterator<Item = StrategyPerformanceRecord>) {
        self.domains.clear();
        let mut count = 0usize;
        for record in records {
            let domain = normalize_domain(&record.domain);
            self.domains
                .entry(domain.clone())
                .or_default()
                .insert(record.strategy, StrategyPerformanceRecord { domain, ..record });
            count += 1;
        }
        tracing::debug!("Loaded {} strategy performance records", count);
    }

    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }

    /// Per-domain summary with each domain's best strategy
    ///
    /// # Arguments
    ///
    /// * `min_attempts` - Attempts a strategy needs before it can be named best
    pub fn crawling_stats(&self, min_attempts: u64) -> CrawlingStats {
        let mut by_domain: Vec<(String, Vec<StrategyPerformanceRecord>)> = Vec::new();
        for record in self.records() {
            match by_domain.last_mut() {
                Some((domain, records)) if *domain == record.domain => records.push(record),
                _ => by_domain.push((record.domain.clone(), vec![record])),
            }
        }

        let mut overall = OverallPerformance::default();
        let mut total_response_time = 0.0;
        let mut total_content_length = 0u64;

        let domains = by_domain
            .into_iter()
            .map(|(domain, strategies)| {
                let total_attempts: u64 = strategies.iter().map(|r| r.total_attempts).sum();
                let successful: u64 = strategies.iter().map(|r| r.successful_attempts).sum();

                overall.total_attempts += total_attempts;
                overall.total_successes += successful;
                total_response_time += strategies.iter().map(|r| r.total_response_time).sum::<f64>();
                total_content_length += strategies.iter().map(|r| r.total_content_length).sum::<u64>();

                let mut best: Option<&StrategyPerformanceRecord> = None;
                for record in strategies.iter().filter(|r| r.total_attempts >= min_attempts) {
                    if best.map_or(true, |b| record.success_rate() > b.success_rate()) {
                        best = Some(record);
                    }
                }

                DomainPerformance {
                    best_strategy: best.map(|r| r.strategy),
                    success_rate: ratio(successful, total_attempts),
                    total_attempts,
                    domain,
                    strategies,
                }
            })
            .collect::<Vec<_>>();

        if overall.total_attempts > 0 {
            overall.avg_response_time = total_response_time / overall.total_attempts as f64;
            overall.avg_content_length = total_content_length as f64 / overall.total_attempts as f64;
        }
        overall.success_rate = ratio(overall.total_successes, overall.total_attempts);

        CrawlingStats {
            total_domains: domains.len(),
            overall,
            domains,
        }
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Ledger export for dashboards and the CLI
#[derive(Debug, Clone, Serialize)]
pub struct CrawlingStats {
    pub total_domains: usize,
    pub overall: OverallPerformance,
    pub domains: Vec<DomainPerformance>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OverallPerformance {
    pub total_attempts: u64,
    pub total_successes: u64,
    pub success_rate: f64,
    pub avg_response_time: f64,
    pub avg_content_length: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainPerformance {
    pub domain: String,
    pub best_strategy: Option<Strategy>,
    pub total_attempts: u64,
    pub success_rate: f64,
    pub strategies: Vec<StrategyPerformanceRecord>,
}
