//! Adaptive strategy selection
//!
//! The [`PerformanceLedger`] accumulates per (domain, strategy) outcomes for
//! the lifetime of the process. The [`StrategySelector`] turns those numbers
//! and the site profile into an ordered candidate list for the orchestrator.

mod ledger;
mod selector;

pub use ledger::{CrawlingStats, DomainPerformance, OverallPerformance, PerformanceLedger, StrategyPerformanceRecord};
pub use selector::StrategySelector;
