use malblock_common::{MaintenanceConfig, PushgatewayConfig};
use malblock_reputation::ReputationStore;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::pushgateway::{PushError, PushgatewayExporter};

/// Drives the two periodic maintenance tasks.
///
/// Eviction and metrics export run on their own intervals with no ordering
/// between them. The export interval is normally offset from the eviction
/// interval so the two rarely hit the store at the same moment.
pub struct MaintenanceScheduler {
    store: ReputationStore,
    exporter: Option<PushgatewayExporter>,
    eviction_interval: Duration,
    export_interval: Duration,
}

/// Handle to a scheduler started with [`MaintenanceScheduler::spawn`].
pub struct MaintenanceHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MaintenanceHandle {
    /// Signal both tasks to stop and wait for them to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "maintenance task ended abnormally");
        }
    }
}

impl MaintenanceScheduler {
    pub fn new(
        store: ReputationStore,
        exporter: Option<PushgatewayExporter>,
        eviction_interval: Duration,
        export_interval: Duration,
    ) -> Self {
        Self {
            store,
            exporter,
            eviction_interval,
            export_interval,
        }
    }

    pub fn from_config(
        store: ReputationStore,
        maintenance: &MaintenanceConfig,
        pushgateway: Option<&PushgatewayConfig>,
    ) -> Result<Self, PushError> {
        let exporter = pushgateway.map(PushgatewayExporter::new).transpose()?;
        Ok(Self::new(
            store,
            exporter,
            maintenance.eviction_interval(),
            maintenance.export_interval(),
        ))
    }

    /// Run both tasks until `shutdown` turns `true` or its sender is dropped.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        info!(
            eviction_interval_ms = self.eviction_interval.as_millis() as u64,
            export_interval_ms = self.export_interval.as_millis() as u64,
            pushgateway = self.exporter.as_ref().map(|e| e.url()),
            "starting reputation maintenance"
        );

        tokio::join!(
            self.eviction_loop(shutdown.clone()),
            self.export_loop(shutdown)
        );

        info!("reputation maintenance stopped");
    }

    /// Run on a new Tokio task.
    pub fn spawn(self) -> MaintenanceHandle {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(async move { self.run(rx).await });
        MaintenanceHandle { shutdown: tx, task }
    }

    async fn eviction_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval_at(
            Instant::now() + self.eviction_interval,
            self.eviction_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.store.evict();
                    if removed > 0 {
                        debug!(removed, "evicted stale reputation records");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }

    async fn export_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval_at(Instant::now() + self.export_interval, self.export_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    // A push may take up to the client timeout; shutdown must not wait for it.
                    tokio::select! {
                        _ = self.export_once() => {}
                        _ = shutdown.changed() => {
                            debug!("shutdown requested, abandoning in-flight metrics push");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }

    /// Push one snapshot. Failures are logged and dropped.
    pub async fn export_once(&self) {
        let Some(exporter) = &self.exporter else {
            debug!("no pushgateway configured, skipping metrics export");
            return;
        };

        let snapshot = self.store.snapshot();
        match exporter.push(&snapshot).await {
            Ok(()) => debug!(
                url = exporter.url(),
                identities = snapshot.len(),
                "pushed reputation metrics"
            ),
            Err(e) => warn!(url = exporter.url(), error = %e, "failed to push metrics"),
        }
    }
}
