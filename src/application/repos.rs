//! Repository traits describing persistence adapters.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{
    BuildTriggerRecord, DocumentationRecord, PageGroupRecord, PageRecord,
};
use crate::domain::tree::VersionFork;
use crate::domain::types::BuildStatus;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[async_trait]
pub trait DocumentationRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<DocumentationRecord>, RepoError>;

    /// Documentations with no `cloned_from`, oldest first.
    async fn list_lineage_roots(&self) -> Result<Vec<DocumentationRecord>, RepoError>;

    /// Documentations whose `cloned_from` equals `id`, by creation time.
    async fn list_cloned_from(&self, id: Uuid) -> Result<Vec<DocumentationRecord>, RepoError>;
}

#[async_trait]
pub trait PageGroupsRepo: Send + Sync {
    async fn find_group(&self, id: Uuid) -> Result<Option<PageGroupRecord>, RepoError>;

    async fn list_groups_for_documentation(
        &self,
        documentation_id: Uuid,
    ) -> Result<Vec<PageGroupRecord>, RepoError>;
}

#[async_trait]
pub trait PagesRepo: Send + Sync {
    async fn list_pages_for_documentation(
        &self,
        documentation_id: Uuid,
    ) -> Result<Vec<PageRecord>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct MarkProcessedParams {
    pub ids: Vec<Uuid>,
    pub completed_at: OffsetDateTime,
    pub status: BuildStatus,
    pub last_error: Option<String>,
}

#[async_trait]
pub trait TriggersRepo: Send + Sync {
    async fn insert_trigger(
        &self,
        documentation_id: Uuid,
        created_at: OffsetDateTime,
    ) -> Result<BuildTriggerRecord, RepoError>;

    /// Every row with `triggered = false`.
    async fn list_pending(&self) -> Result<Vec<BuildTriggerRecord>, RepoError>;

    /// Flip the listed rows to processed; returns the number of rows updated.
    async fn mark_processed(&self, params: MarkProcessedParams) -> Result<u64, RepoError>;

    /// Per documentation, the row with the most recent `created_at` (nulls last).
    async fn latest_per_documentation(&self) -> Result<Vec<BuildTriggerRecord>, RepoError>;
}

#[async_trait]
pub trait StructureWriteRepo: Send + Sync {
    async fn update_group_parent(
        &self,
        group_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> Result<PageGroupRecord, RepoError>;

    /// Persist a forked version (documentation, groups, pages) atomically.
    async fn insert_version(&self, fork: VersionFork) -> Result<DocumentationRecord, RepoError>;
}

/// Shared handles to every repository the pipeline needs.
#[derive(Clone)]
pub struct Repositories {
    pub documentations: Arc<dyn DocumentationRepo>,
    pub groups: Arc<dyn PageGroupsRepo>,
    pub pages: Arc<dyn PagesRepo>,
    pub triggers: Arc<dyn TriggersRepo>,
    pub structure: Arc<dyn StructureWriteRepo>,
}

impl Repositories {
    /// Use one adapter for every repository role.
    pub fn from_shared<R>(repo: Arc<R>) -> Self
    where
        R: DocumentationRepo
            + PageGroupsRepo
            + PagesRepo
            + TriggersRepo
            + StructureWriteRepo
            + 'static,
    {
        Self {
            documentations: repo.clone(),
            groups: repo.clone(),
            pages: repo.clone(),
            triggers: repo.clone(),
            structure: repo,
        }
    }
}
