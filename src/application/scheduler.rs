//! Drain loop over the trigger ledger.
//!
//! Passes run one after the other. All triggers recorded for a documentation
//! before a drain collapse into one pass.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::gauge;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;
use crate::application::ledger::TriggerLedger;
use crate::application::locks::BuildLockRegistry;
use crate::application::pipeline::{BuildPipeline, PassOutcome, PipelineError};
use crate::application::repos::{DocumentationRepo, RepoError};
use crate::domain::entities::BuildTriggerRecord;
use crate::domain::types::BuildOutcome;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

const METRIC_PENDING_TRIGGERS: &str = "docsmith_pending_triggers";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub passes: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub triggers: usize,
}

impl DrainReport {
    fn record(&mut self, triggers: usize, outcome: &BuildOutcome) {
        self.passes += 1;
        self.triggers += triggers;
        match outcome {
            BuildOutcome::Succeeded => self.succeeded += 1,
            BuildOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub documentations: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct Scheduler {
    ledger: TriggerLedger,
    documentations: Arc<dyn DocumentationRepo>,
    pipeline: Arc<dyn BuildPipeline>,
    interval: Duration,
    locks: Option<BuildLockRegistry>,
}

impl Scheduler {
    pub fn new(
        ledger: TriggerLedger,
        documentations: Arc<dyn DocumentationRepo>,
        pipeline: Arc<dyn BuildPipeline>,
    ) -> Self {
        Self {
            ledger,
            documentations,
            pipeline,
            interval: DEFAULT_INTERVAL,
            locks: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Idle locks in `locks` are evicted after every drain.
    pub fn with_lock_registry(mut self, locks: BuildLockRegistry) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Verify every lineage root's site directory and queue a build for each.
    ///
    /// A failure on one documentation is logged and the others still run.
    pub async fn reconcile_on_startup(&self) -> Result<ReconcileSummary, RepoError> {
        let roots = self.documentations.list_lineage_roots().await?;
        let mut summary = ReconcileSummary::default();

        for root in roots {
            summary.documentations += 1;
            if let Err(err) = self.pipeline.reconcile(&root).await {
                summary.failed += 1;
                let report = ErrorReport::from_error("application::scheduler::reconcile", &err);
                error!(
                    target = "application::scheduler",
                    op = "reconcile",
                    result = "error",
                    documentation_id = %root.id,
                    error = %report.joined(),
                    "Failed to reconcile site directory"
                );
            }
            self.ledger.add_trigger(root.id).await;
        }

        info!(
            target = "application::scheduler",
            op = "reconcile",
            documentations = summary.documentations,
            failed = summary.failed,
            "Startup reconciliation finished"
        );
        Ok(summary)
    }

    /// Drain every pending trigger once: one pass per documentation.
    pub async fn drain_once(&self) -> Result<DrainReport, RepoError> {
        let started_at = Instant::now();
        let grouped = self.ledger.drain_pending().await?;
        let pending: usize = grouped.values().map(Vec::len).sum();
        gauge!(METRIC_PENDING_TRIGGERS).set(pending as f64);
        let mut report = DrainReport::default();

        for (documentation_id, rows) in grouped {
            let outcome = self.run_and_mark(documentation_id, &rows).await;
            report.record(rows.len(), &outcome);
        }

        if let Some(locks) = &self.locks {
            locks.prune_idle();
        }

        if report.passes > 0 {
            info!(
                target = "application::scheduler",
                op = "drain",
                passes = report.passes,
                succeeded = report.succeeded,
                failed = report.failed,
                triggers = report.triggers,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "Drained build triggers"
            );
        }
        Ok(report)
    }

    /// Build one documentation now, settling whatever triggers it has pending.
    pub async fn build_now(&self, documentation_id: Uuid) -> Result<BuildOutcome, RepoError> {
        let mut grouped = self.ledger.drain_pending().await?;
        let rows = grouped.remove(&documentation_id).unwrap_or_default();
        Ok(self.run_and_mark(documentation_id, &rows).await)
    }

    async fn run_and_mark(
        &self,
        documentation_id: Uuid,
        rows: &[BuildTriggerRecord],
    ) -> BuildOutcome {
        let outcome = match self.pipeline.run_pass(documentation_id).await {
            Ok(PassOutcome::Built { report, installed }) => {
                info!(
                    target = "application::scheduler",
                    op = "pass",
                    result = "built",
                    documentation_id = %documentation_id,
                    written = report.files.written,
                    skipped = report.files.skipped,
                    shadowed = report.shadowed.len(),
                    installed,
                    "Documentation built"
                );
                for shadowed in &report.shadowed {
                    warn!(
                        target = "application::scheduler",
                        op = "pass",
                        root_id = %report.root_id,
                        version = %shadowed.label,
                        shadowed = %shadowed.documentation_id,
                        replaced_by = %shadowed.replaced_by,
                        "Version not published; a newer clone claims its label"
                    );
                }
                BuildOutcome::Succeeded
            }
            Ok(PassOutcome::Removed { site_root }) => {
                info!(
                    target = "application::scheduler",
                    op = "pass",
                    result = "removed",
                    documentation_id = %documentation_id,
                    site_root = %site_root.display(),
                    "Documentation removed"
                );
                BuildOutcome::Succeeded
            }
            Err(err) => failure(documentation_id, &err),
        };

        if let Err(err) = self
            .ledger
            .mark_processed(rows, OffsetDateTime::now_utc(), &outcome)
            .await
        {
            warn!(
                target = "application::scheduler",
                op = "mark_processed",
                documentation_id = %documentation_id,
                triggers = rows.len(),
                status = outcome.status().as_str(),
                error = %err,
                "Failed to mark triggers processed; they will be drained again"
            );
        }

        outcome
    }

    /// Startup reconciliation, then drain forever.
    pub async fn run_forever(&self) {
        if let Err(err) = self.reconcile_on_startup().await {
            error!(
                target = "application::scheduler",
                op = "reconcile",
                error = %err,
                "Failed to list documentations for reconciliation"
            );
        }

        loop {
            if let Err(err) = self.drain_once().await {
                error!(
                    target = "application::scheduler",
                    op = "drain",
                    error = %err,
                    "Failed to drain build triggers"
                );
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

fn failure(documentation_id: Uuid, err: &PipelineError) -> BuildOutcome {
    let report = ErrorReport::from_error("application::scheduler::pass", err);
    let message = report.joined();
    error!(
        target = "application::scheduler",
        op = "pass",
        result = "error",
        documentation_id = %documentation_id,
        error = %message,
        "Build pass failed"
    );
    BuildOutcome::failed(message)
}
