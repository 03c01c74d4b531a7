//! Trigger ledger: the durable record of "this documentation needs a build".
//!
//! Rows are append-only. Every mutation appends a pending row; the scheduler
//! drains pending rows grouped by documentation and flips each batch to
//! `succeeded` or `failed` exactly once.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::repos::{MarkProcessedParams, RepoError, TriggersRepo};
use crate::domain::entities::BuildTriggerRecord;
use crate::domain::types::{BuildOutcome, BuildStatus};

/// Latest known build state of one documentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentationBuildStatus {
    pub documentation_id: Uuid,
    pub trigger_id: Uuid,
    pub status: BuildStatus,
    pub pending: bool,
    pub last_error: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

impl From<BuildTriggerRecord> for DocumentationBuildStatus {
    fn from(record: BuildTriggerRecord) -> Self {
        Self {
            documentation_id: record.documentation_id,
            trigger_id: record.id,
            status: record.status,
            pending: !record.triggered,
            last_error: record.last_error,
            created_at: record.created_at,
            completed_at: record.completed_at,
        }
    }
}

#[derive(Clone)]
pub struct TriggerLedger {
    triggers: Arc<dyn TriggersRepo>,
}

impl TriggerLedger {
    pub fn new(triggers: Arc<dyn TriggersRepo>) -> Self {
        Self { triggers }
    }

    /// Record that `documentation_id` changed. Failures are logged and
    /// swallowed so callers never fail because of the ledger.
    pub async fn add_trigger(&self, documentation_id: Uuid) {
        match self
            .triggers
            .insert_trigger(documentation_id, OffsetDateTime::now_utc())
            .await
        {
            Ok(record) => debug!(
                target = "application::ledger",
                op = "add_trigger",
                documentation_id = %documentation_id,
                trigger_id = %record.id,
                "build trigger recorded"
            ),
            Err(err) => warn!(
                target = "application::ledger",
                op = "add_trigger",
                documentation_id = %documentation_id,
                error = %err,
                "failed to record build trigger"
            ),
        }
    }

    /// Every pending row, partitioned by documentation.
    pub async fn drain_pending(
        &self,
    ) -> Result<BTreeMap<Uuid, Vec<BuildTriggerRecord>>, RepoError> {
        let rows = self.triggers.list_pending().await?;
        let mut grouped: BTreeMap<Uuid, Vec<BuildTriggerRecord>> = BTreeMap::new();
        for row in rows.into_iter().filter(|row| !row.triggered) {
            grouped.entry(row.documentation_id).or_default().push(row);
        }
        Ok(grouped)
    }

    /// Mark a drained batch processed with the outcome of its pass.
    pub async fn mark_processed(
        &self,
        rows: &[BuildTriggerRecord],
        completed_at: OffsetDateTime,
        outcome: &BuildOutcome,
    ) -> Result<u64, RepoError> {
        if rows.is_empty() {
            return Ok(0);
        }

        self.triggers
            .mark_processed(MarkProcessedParams {
                ids: rows.iter().map(|row| row.id).collect(),
                completed_at,
                status: outcome.status(),
                last_error: outcome.error_message().map(str::to_string),
            })
            .await
    }

    pub async fn last_status_per_documentation(
        &self,
    ) -> Result<Vec<DocumentationBuildStatus>, RepoError> {
        let mut rows = self.triggers.latest_per_documentation().await?;
        rows.sort_by_key(|row| row.documentation_id);
        Ok(rows.into_iter().map(DocumentationBuildStatus::from).collect())
    }
}

/// Newest row per documentation by `created_at`, rows without a timestamp
/// losing to any stamped row.
pub fn select_latest(rows: &[BuildTriggerRecord]) -> Vec<BuildTriggerRecord> {
    let mut latest: HashMap<Uuid, &BuildTriggerRecord> = HashMap::new();
    for row in rows {
        latest
            .entry(row.documentation_id)
            .and_modify(|current| {
                if compare_created(row, current) == Ordering::Greater {
                    *current = row;
                }
            })
            .or_insert(row);
    }

    let mut selected: Vec<BuildTriggerRecord> = latest.into_values().cloned().collect();
    selected.sort_by_key(|row| row.documentation_id);
    selected
}

fn compare_created(left: &BuildTriggerRecord, right: &BuildTriggerRecord) -> Ordering {
    match (left.created_at, right.created_at) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}
