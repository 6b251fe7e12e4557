//! Periodic reconciliation worker.
//!
//! Per-item matching is event-driven; this worker catches what those runs
//! miss. On each tick it runs the batch matching sweep (registers leftover
//! unregistered embeddings, records any pairs above the confidence
//! threshold) and the notification retention sweep.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{error, info};

use refind_core::{Error, Result};

use crate::notify::NotificationDispatcher;
use crate::orchestrator::MatchingOrchestrator;
use crate::DEFAULT_SWEEP_INTERVAL_SECS;

/// Configuration for the reconciliation worker.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Seconds between sweeps.
    pub interval_secs: u64,
    /// Whether sweeping is enabled at all.
    pub enabled: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            enabled: true,
        }
    }
}

impl SweepConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `SWEEP_ENABLED` | `true` | Enable/disable the worker |
    /// | `SWEEP_INTERVAL_SECS` | `3600` | Seconds between sweeps |
    pub fn from_env() -> Self {
        let enabled = std::env::var("SWEEP_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let interval_secs = std::env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS)
            .max(1);

        Self {
            interval_secs,
            enabled,
        }
    }

    /// Set the sweep interval.
    pub fn with_interval_secs(mut self, secs: u64) -> Self {
        self.interval_secs = secs;
        self
    }

    /// Enable or disable sweeping.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Handle for controlling a running worker.
pub struct SweepHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SweepHandle {
    /// Signal the worker to shut down gracefully.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }
}

/// Worker that runs the reconciliation sweeps on a fixed interval.
pub struct SweepWorker {
    orchestrator: MatchingOrchestrator,
    dispatcher: NotificationDispatcher,
    config: SweepConfig,
}

impl SweepWorker {
    pub fn new(
        orchestrator: MatchingOrchestrator,
        dispatcher: NotificationDispatcher,
        config: SweepConfig,
    ) -> Self {
        Self {
            orchestrator,
            dispatcher,
            config,
        }
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> SweepHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        tokio::spawn(async move {
            self.run(&mut shutdown_rx).await;
        });

        SweepHandle { shutdown_tx }
    }

    /// Run the sweep loop. The first sweep runs immediately; later sweeps
    /// run one interval apart.
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!(
                subsystem = "jobs",
                component = "worker",
                "Reconciliation worker is disabled, not starting"
            );
            return;
        }

        info!(
            subsystem = "jobs",
            component = "worker",
            interval_secs = self.config.interval_secs,
            "Reconciliation worker started"
        );

        let interval = Duration::from_secs(self.config.interval_secs);

        loop {
            self.sweep_once().await;

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!(
                        subsystem = "jobs",
                        component = "worker",
                        "Reconciliation worker received shutdown signal"
                    );
                    break;
                }
                _ = sleep(interval) => {}
            }
        }

        info!(
            subsystem = "jobs",
            component = "worker",
            "Reconciliation worker stopped"
        );
    }

    /// One sweep pass. Failures are logged and never stop the loop.
    async fn sweep_once(&self) {
        match self.orchestrator.run_batch_matching().await {
            Ok(created) if created > 0 => {
                info!(
                    subsystem = "jobs",
                    component = "worker",
                    op = "batch_matching",
                    match_count = created,
                    "Sweep recorded new matches"
                );
            }
            Ok(_) => {}
            Err(e) => {
                error!(
                    subsystem = "jobs",
                    component = "worker",
                    op = "batch_matching",
                    error_msg = %e,
                    "Batch matching sweep failed"
                );
            }
        }

        if let Err(e) = self.dispatcher.run_retention_sweep().await {
            error!(
                subsystem = "jobs",
                component = "worker",
                op = "retention_sweep",
                error_msg = %e,
                "Notification retention sweep failed"
            );
        }
    }
}
