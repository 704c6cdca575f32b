use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arca_refs::ReferencesStore;
use arca_types::NamespaceId;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::blob_cleanup::BlobCleanup;
use crate::config::GcSettings;
use crate::error::GcResult;
use crate::leader::LeaderElection;
use crate::ref_cleanup::RefCleanup;

/// Why a sweep did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// Another sweep on this instance is still in progress.
    AlreadyRunning,
    /// This instance is not the leader.
    NotLeader,
}

/// A namespace whose sweep failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamespaceFailure {
    pub namespace: NamespaceId,
    pub error: String,
}

/// Totals of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub namespaces_swept: usize,
    pub records_deleted: u64,
    pub blobs_deleted: u64,
    pub failures: Vec<NamespaceFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SweepOutcome {
    Completed(SweepReport),
    Skipped(SkipReason),
    /// Shutdown was signalled part-way; the report covers what ran.
    Cancelled(SweepReport),
}

/// Clears the running flag when a sweep ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Periodic, leader-gated garbage collection.
pub struct GcService {
    settings: GcSettings,
    leader: Arc<dyn LeaderElection>,
    refs: Arc<dyn ReferencesStore>,
    ref_cleanup: RefCleanup,
    blob_cleanup: Option<BlobCleanup>,
    running: AtomicBool,
}

impl GcService {
    /// `blob_cleanup` is ignored when `settings.blob_cleanup` is off.
    pub fn new(
        settings: GcSettings,
        leader: Arc<dyn LeaderElection>,
        refs: Arc<dyn ReferencesStore>,
        ref_cleanup: RefCleanup,
        blob_cleanup: BlobCleanup,
    ) -> Self {
        let blob_cleanup = settings.blob_cleanup.then_some(blob_cleanup);
        Self {
            settings,
            leader,
            refs,
            ref_cleanup,
            blob_cleanup,
            running: AtomicBool::new(false),
        }
    }

    pub fn settings(&self) -> &GcSettings {
        &self.settings
    }

    /// Run one sweep over every namespace.
    ///
    /// Failures inside a namespace are logged and recorded in the report;
    /// the sweep moves on to the next namespace. Only a failure to start
    /// the namespace enumeration is returned as an error.
    pub async fn sweep(&self, shutdown: &watch::Receiver<bool>) -> GcResult<SweepOutcome> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("gc sweep already running");
            return Ok(SweepOutcome::Skipped(SkipReason::AlreadyRunning));
        }
        let _guard = RunningGuard(&self.running);

        if !self.leader.is_this_instance_leader() {
            info!("skipped gc sweep as this instance is not the leader");
            return Ok(SweepOutcome::Skipped(SkipReason::NotLeader));
        }

        let mut report = SweepReport::default();
        let mut namespaces = self.refs.namespaces();
        let mut started = false;

        while let Some(next) = namespaces.next().await {
            let ns = match next {
                Ok(ns) => ns,
                Err(e) if !started => return Err(e.into()),
                Err(e) => {
                    error!(error = %e, "namespace enumeration failed mid-sweep");
                    break;
                }
            };
            started = true;

            if *shutdown.borrow() {
                info!(swept = report.namespaces_swept, "gc sweep cancelled");
                return Ok(SweepOutcome::Cancelled(report));
            }

            self.sweep_namespace(&ns, &mut report).await;
            report.namespaces_swept += 1;
        }

        info!(
            namespaces = report.namespaces_swept,
            records_deleted = report.records_deleted,
            blobs_deleted = report.blobs_deleted,
            failures = report.failures.len(),
            "gc sweep complete"
        );
        Ok(SweepOutcome::Completed(report))
    }

    async fn sweep_namespace(&self, ns: &NamespaceId, report: &mut SweepReport) {
        debug!(namespace = %ns, "running refs cleanup");
        match self.ref_cleanup.cleanup(ns).await {
            Ok(removed) => {
                info!(namespace = %ns, count = removed.len(), "ran refs cleanup");
                report.records_deleted += removed.len() as u64;
            }
            Err(e) => {
                error!(namespace = %ns, error = %e, "error running refs cleanup");
                report.failures.push(NamespaceFailure {
                    namespace: ns.clone(),
                    error: e.to_string(),
                });
                return;
            }
        }

        let Some(blob_cleanup) = &self.blob_cleanup else {
            return;
        };
        match blob_cleanup.cleanup(ns).await {
            Ok(removed) => {
                info!(namespace = %ns, count = removed.len(), "ran blob cleanup");
                report.blobs_deleted += removed.len() as u64;
            }
            Err(e) => {
                error!(namespace = %ns, error = %e, "error running blob cleanup");
                report.failures.push(NamespaceFailure {
                    namespace: ns.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Sweep on a fixed interval until `shutdown` turns true or its sender
    /// is dropped. Returns immediately if scheduling is disabled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let Some(period) = self.settings.interval() else {
            info!("gc scheduling disabled");
            return;
        };
        let sweep_signal = shutdown.clone();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = period.as_secs(), "gc loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep(&sweep_signal).await {
                        Ok(SweepOutcome::Skipped(reason)) => debug!(?reason, "gc sweep skipped"),
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "gc sweep failed to start"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("gc loop stopped");
    }
}

impl std::fmt::Debug for GcService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcService")
            .field("settings", &self.settings)
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish()
    }
}
