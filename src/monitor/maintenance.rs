//! Periodic telemetry maintenance
//!
//! The owner of the crawler starts a [`MaintenanceTask`] with an interval and
//! stops it through the returned [`MaintenanceHandle`]. Each pass prunes the
//! monitor and, when a store is attached, persists the ledger and any
//! attempts recorded since the previous pass, then prunes old rows. A final
//! pass runs on stop.

use crate::clock::Clock;
use crate::config::MonitorConfig;
use crate::monitor::CrawlMonitor;
use crate::storage::{StorageResult, TelemetryStore};
use crate::strategy::PerformanceLedger;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A telemetry store shared between the maintenance task and its owner
pub type SharedStore = Arc<Mutex<dyn TelemetryStore>>;

/// What one maintenance pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Attempts dropped from the in-memory history
    pub pruned_history: usize,
    /// Attempt rows deleted from the store
    pub pruned_rows: usize,
    pub persisted_records: usize,
    pub persisted_attempts: usize,
    /// Highest attempt sequence number persisted so far
    pub last_seq: u64,
}

/// Runs one maintenance pass synchronously
///
/// # Arguments
///
/// * `monitor` - Monitor to prune and read new attempts from
/// * `ledger` - Ledger to persist
/// * `store` - Telemetry store, if persistence is enabled
/// * `retention` - Age past which attempts are dropped
/// * `last_seq` - Highest sequence number persisted by the previous pass
/// * `now` - Current time, for the store's retention cutoff
pub fn run_maintenance(
    monitor: &CrawlMonitor,
    ledger: &PerformanceLedger,
    store: Option<&mut (dyn TelemetryStore + 'static)>,
    retention: chrono::Duration,
    last_seq: u64,
    now: DateTime<Utc>,
) -> StorageResult<MaintenanceReport> {
    let mut report = MaintenanceReport {
        last_seq,
        ..MaintenanceReport::default()
    };

    if let Some(store) = store {
        let records = ledger.records();
        store.save_performance(&records)?;
        report.persisted_records = records.len();

        let attempts = monitor.attempts_since(last_seq);
        report.persisted_attempts = store.append_attempts(&attempts)?;
        report.last_seq = attempts.iter().map(|a| a.seq).max().unwrap_or(last_seq);

        report.pruned_rows = store.prune_attempts(now - retention)?;
    }

    report.pruned_history = monitor.cleanup(retention);

    tracing::debug!(
        "Maintenance: persisted {} records and {} attempts, pruned {} rows and {} history entries",
        report.persisted_records,
        report.persisted_attempts,
        report.pruned_rows,
        report.pruned_history
    );
    Ok(report)
}

/// Scheduled maintenance, not yet started
pub struct MaintenanceTask {
    monitor: Arc<CrawlMonitor>,
    ledger: Arc<PerformanceLedger>,
    clock: Arc<dyn Clock>,
    store: Option<SharedStore>,
    interval: Duration,
    retention: chrono::Duration,
}

impl MaintenanceTask {
    pub fn new(
        monitor: Arc<CrawlMonitor>,
        ledger: Arc<PerformanceLedger>,
        clock: Arc<dyn Clock>,
        config: &MonitorConfig,
    ) -> Self {
        Self {
            monitor,
            ledger,
            clock,
            store: None,
            interval: Duration::from_secs(config.maintenance_interval_secs),
            retention: chrono::Duration::days(config.retention_days),
        }
    }

    /// Persists telemetry to `store` on every pass
    pub fn with_store(mut self, store: SharedStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawns the task on the current runtime
    pub fn start(self) -> MaintenanceHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        tracing::info!("Starting telemetry maintenance every {:?}", self.interval);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            let mut last = MaintenanceReport::default();
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        last = self.pass(last.last_seq).await;
                    }
                }
            }

            self.pass(last.last_seq).await
        });

        MaintenanceHandle {
            shutdown: Some(shutdown_tx),
            join,
        }
    }

    async fn pass(&self, last_seq: u64) -> MaintenanceReport {
        let monitor = self.monitor.clone();
        let ledger = self.ledger.clone();
        let store = self.store.clone();
        let retention = self.retention;
        let now = self.clock.now();

        let result = tokio::task::spawn_blocking(move || {
            let mut guard = store.as_ref().map(|s| s.lock());
            run_maintenance(&monitor, &ledger, guard.as_deref_mut(), retention, last_seq, now)
        })
        .await;

        match result {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                tracing::error!("Telemetry maintenance failed: {}", e);
                MaintenanceReport {
                    last_seq,
                    ..MaintenanceReport::default()
                }
            }
            Err(e) => {
                if e.is_panic() {
                    std::panic::resume_unwind(e.into_panic());
                }
                tracing::error!("Telemetry maintenance task cancelled: {}", e);
                MaintenanceReport {
                    last_seq,
                    ..MaintenanceReport::default()
                }
            }
        }
    }
}

/// Stops a running [`MaintenanceTask`]
pub struct MaintenanceHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<MaintenanceReport>,
}

impl MaintenanceHandle {
    /// Signals the task, waits for its final pass and returns that pass's report
    pub async fn stop(mut self) -> MaintenanceReport {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        match (&mut self.join).await {
            Ok(report) => report,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                tracing::warn!("Telemetry maintenance task ended abnormally: {}", e);
                MaintenanceReport::default()
            }
        }
    }
}

impl Drop for MaintenanceHandle {
    fn drop(&mut self) {
        if self.shutdown.is_some() {
            self.join.abort();
        }
    }
}
