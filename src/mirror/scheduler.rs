// ABOUTME: SyncScheduler - drives reconciliation passes on a fixed interval
// ABOUTME: Reconcile, log, sleep, repeat until a shutdown signal arrives

use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

use super::logger::ChangeLogger;
use super::reconciler::Reconciler;
use super::report::ChangeReport;

/// What to do when a pass fails with an I/O error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Stop the scheduler and return the error
    #[default]
    Abort,
    /// Log the error and try again after the interval
    Continue,
}

/// Configuration for the SyncScheduler.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Pause between the end of one pass and the start of the next
    pub interval: Duration,
    pub error_policy: ErrorPolicy,
    /// Minimum pause after a failed pass, so a persistent failure under
    /// `ErrorPolicy::Continue` with a zero interval does not spin
    pub failure_backoff: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            error_policy: ErrorPolicy::Abort,
            failure_backoff: Duration::from_secs(1),
        }
    }
}

impl SchedulerConfig {
    /// How long to sleep after a pass.
    fn pause_after(&self, failed: bool) -> Duration {
        if failed {
            self.interval.max(self.failure_backoff)
        } else {
            self.interval
        }
    }
}

/// Where the scheduler is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Reconciling,
    Logging,
    Sleeping,
    Stopped,
}

/// Totals for a scheduler run, returned when it stops cleanly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub passes: u64,
    pub failed_passes: u64,
    pub changes: u64,
}

/// SyncScheduler runs reconciliation passes back to back, never overlapping.
///
/// Each cycle:
/// 1. Reconcile the replica against the source (on the blocking thread pool)
/// 2. Hand the report to the ChangeLogger
/// 3. Sleep for the configured interval
///
/// Shutdown is checked before every pass and during the sleep. A pass that
/// has already started runs to completion.
pub struct SyncScheduler {
    reconciler: Reconciler,
    logger: ChangeLogger,
    config: SchedulerConfig,
    state: SchedulerState,
}

impl SyncScheduler {
    pub fn new(reconciler: Reconciler, logger: ChangeLogger, config: SchedulerConfig) -> Self {
        Self {
            reconciler,
            logger,
            config,
            state: SchedulerState::Idle,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Run one pass and log its report.
    pub async fn run_once(&mut self) -> Result<ChangeReport> {
        let result = self.pass().await;
        self.state = SchedulerState::Idle;
        result
    }

    async fn pass(&mut self) -> Result<ChangeReport> {
        self.state = SchedulerState::Reconciling;
        let reconciler = self.reconciler.clone();
        let report = tokio::task::spawn_blocking(move || reconciler.reconcile())
            .await
            .context("Reconciliation task panicked")??;

        self.state = SchedulerState::Logging;
        self.logger
            .record(&report)
            .context("Failed to write change log")?;

        Ok(report)
    }

    /// Run the scheduler until a shutdown signal is received.
    ///
    /// The source root is checked once up front; a missing source stops the
    /// scheduler before any pass runs, whatever the error policy. A closed
    /// shutdown channel counts as a shutdown request.
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) -> Result<RunSummary> {
        self.reconciler
            .check_source()
            .context("Cannot start sync")?;

        tracing::info!(
            "Starting SyncScheduler for {} -> {} with interval={:?}, error_policy={:?}",
            self.reconciler.source_root().display(),
            self.reconciler.replica_root().display(),
            self.config.interval,
            self.config.error_policy
        );

        let mut summary = RunSummary::default();

        loop {
            if shutdown_requested(&mut shutdown) {
                tracing::info!("Shutdown signal received, stopping SyncScheduler");
                break;
            }

            summary.passes += 1;
            let pass = summary.passes;
            let start = Instant::now();
            tracing::debug!("Starting sync pass {}", pass);

            let failed = match self.run_once().await {
                Ok(report) => {
                    summary.changes += report.total_changes() as u64;
                    tracing::debug!(
                        "Sync pass {} completed: {} changes in {}ms",
                        pass,
                        report.total_changes(),
                        start.elapsed().as_millis()
                    );
                    false
                }
                Err(e) => match self.config.error_policy {
                    ErrorPolicy::Abort => {
                        self.state = SchedulerState::Stopped;
                        return Err(e.context(format!("Sync pass {} failed", pass)));
                    }
                    ErrorPolicy::Continue => {
                        summary.failed_passes += 1;
                        // :? shows the full error chain
                        tracing::error!("Sync pass {} failed: {:?}", pass, e);
                        true
                    }
                },
            };

            self.state = SchedulerState::Sleeping;
            tokio::select! {
                biased; // Check shutdown first

                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received while sleeping, stopping SyncScheduler");
                    break;
                }
                _ = tokio::time::sleep(self.config.pause_after(failed)) => {}
            }
        }

        self.state = SchedulerState::Stopped;
        tracing::info!(
            "SyncScheduler stopped after {} passes ({} failed, {} changes)",
            summary.passes,
            summary.failed_passes,
            summary.changes
        );
        Ok(summary)
    }
}

fn shutdown_requested(shutdown: &mut broadcast::Receiver<()>) -> bool {
    match shutdown.try_recv() {
        Ok(()) => true,
        Err(TryRecvError::Empty) => false,
        Err(TryRecvError::Closed) | Err(TryRecvError::Lagged(_)) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.error_policy, ErrorPolicy::Abort);
        assert_eq!(config.failure_backoff, Duration::from_secs(1));
    }

    #[test]
    fn test_failed_pass_waits_at_least_the_backoff() {
        let config = SchedulerConfig {
            interval: Duration::ZERO,
            ..SchedulerConfig::default()
        };
        assert_eq!(config.pause_after(false), Duration::ZERO);
        assert_eq!(config.pause_after(true), Duration::from_secs(1));

        let slow = SchedulerConfig {
            interval: Duration::from_secs(30),
            ..SchedulerConfig::default()
        };
        assert_eq!(slow.pause_after(true), Duration::from_secs(30));
    }

    #[test]
    fn test_error_policy_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            policy: ErrorPolicy,
        }
        let w: Wrapper = toml::from_str("policy = \"continue\"").unwrap();
        assert_eq!(w.policy, ErrorPolicy::Continue);
        let w: Wrapper = toml::from_str("policy = \"abort\"").unwrap();
        assert_eq!(w.policy, ErrorPolicy::Abort);
    }

    #[test]
    fn test_shutdown_requested() {
        let (tx, mut rx) = broadcast::channel::<()>(1);
        assert!(!shutdown_requested(&mut rx));
        tx.send(()).unwrap();
        assert!(shutdown_requested(&mut rx));
        drop(tx);
        assert!(shutdown_requested(&mut rx));
    }
}
