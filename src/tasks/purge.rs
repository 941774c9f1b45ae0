use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{TemplateError, TemplateResult};
use crate::metrics::PurgeMetrics;
use crate::template::SweepReport;

/// Something the purge scheduler can sweep
pub trait PurgeTarget: Send + Sync + 'static {
    /// Run one sweep cycle
    fn purge(&self) -> TemplateResult<SweepReport>;
}

/// Background task that sweeps a [`PurgeTarget`] on a fixed period.
///
/// Stop it with [`PurgeScheduler::shutdown`]; once that returns no further
/// sweep runs. Dropping the scheduler without shutting it down aborts the
/// task.
pub struct PurgeScheduler {
    period: Duration,
    shutdown_tx: broadcast::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl PurgeScheduler {
    /// Spawn the purge task on the current tokio runtime
    pub fn start(target: Arc<dyn PurgeTarget>, period: Duration) -> TemplateResult<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            TemplateError::Runtime(format!("auto purge requires a tokio runtime: {}", e))
        })?;

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = PurgeTask {
            target,
            period,
            shutdown: shutdown_rx,
        };
        let handle = runtime.spawn(task.run());

        Ok(Self {
            period,
            shutdown_tx,
            handle: Some(handle),
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Signal the task to stop and wait for it to finish
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(());

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Purge task did not stop cleanly");
            }
        }
    }
}

impl Drop for PurgeScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

struct PurgeTask {
    target: Arc<dyn PurgeTarget>,
    period: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl PurgeTask {
    async fn run(mut self) {
        let mut timer = tokio::time::interval(self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Skip immediate first tick
        timer.tick().await;

        tracing::info!(
            purge_interval_ms = self.period.as_millis() as u64,
            "Template purge task started"
        );

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.recv() => {
                    tracing::info!("Template purge task received shutdown signal");
                    break;
                }
                _ = timer.tick() => {
                    self.run_cycle();
                }
            }
        }

        tracing::info!("Template purge task stopped");
    }

    /// Run one sweep; a failed or panicking cycle never stops the schedule
    fn run_cycle(&self) {
        match panic::catch_unwind(AssertUnwindSafe(|| self.target.purge())) {
            Ok(Ok(report)) => {
                if report.evicted > 0 {
                    tracing::info!(
                        evicted = report.evicted,
                        retained = report.retained,
                        generation = report.generation,
                        "Purged stale templates"
                    );
                }
            }
            Ok(Err(e)) => {
                PurgeMetrics::record_failure();
                tracing::error!(error = %e, code = e.code(), "Template purge cycle failed");
            }
            Err(_) => {
                PurgeMetrics::record_failure();
                tracing::error!("Template purge cycle panicked");
            }
        }
    }
}
