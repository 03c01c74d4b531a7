//! Shared domain enumerations aligned with persisted database enums.

use serde::{Deserialize, Serialize};

/// Outcome recorded on a build trigger row.
///
/// Rows start `Pending` and move to `Succeeded` or `Failed` exactly once. A
/// failed row is never retried; only a new trigger causes another pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "build_status", rename_all = "snake_case")]
pub enum BuildStatus {
    Pending,
    Succeeded,
    Failed,
}

impl BuildStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildStatus::Pending => "pending",
            BuildStatus::Succeeded => "succeeded",
            BuildStatus::Failed => "failed",
        }
    }
}

/// Result of one pipeline pass, applied to every trigger row of a drained group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Succeeded,
    Failed { message: String },
}

impl BuildOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    pub fn status(&self) -> BuildStatus {
        match self {
            BuildOutcome::Succeeded => BuildStatus::Succeeded,
            BuildOutcome::Failed { .. } => BuildStatus::Failed,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            BuildOutcome::Succeeded => None,
            BuildOutcome::Failed { message } => Some(message.as_str()),
        }
    }
}

/// Kind of a navigable entry inside a meta sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaEntryType {
    File,
    Dir,
}
