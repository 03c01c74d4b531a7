//! Structural writes: moving page groups and forking versions.
//!
//! Both operations check the tree invariants before anything is persisted and
//! record a build trigger afterwards.

use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::ledger::TriggerLedger;
use crate::application::repos::{RepoError, Repositories};
use crate::application::versions::{LineageError, VersionResolver};
use crate::domain::entities::{DocumentationRecord, PageGroupRecord};
use crate::domain::error::{DomainError, path_segment};
use crate::domain::tree::{TreeError, plan_version_fork, validate_reparent};

#[derive(Debug, Error)]
pub enum StructureError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Lineage(#[from] LineageError),
    #[error("documentation `{id}` not found")]
    DocumentationNotFound { id: Uuid },
    #[error("page group `{id}` not found")]
    GroupNotFound { id: Uuid },
    #[error("version `{version}` already exists in this lineage")]
    DuplicateVersion { version: String },
}

#[derive(Clone)]
pub struct StructureService {
    repositories: Repositories,
    versions: VersionResolver,
    ledger: TriggerLedger,
}

impl StructureService {
    pub fn new(repositories: Repositories, ledger: TriggerLedger) -> Self {
        let versions = VersionResolver::new(Arc::clone(&repositories.documentations));
        Self {
            repositories,
            versions,
            ledger,
        }
    }

    /// Re-parent a group. `None` makes it a root group.
    pub async fn move_group(
        &self,
        group_id: Uuid,
        new_parent: Option<Uuid>,
    ) -> Result<PageGroupRecord, StructureError> {
        let group = self
            .repositories
            .groups
            .find_group(group_id)
            .await?
            .ok_or(StructureError::GroupNotFound { id: group_id })?;

        let mut candidates = self
            .repositories
            .groups
            .list_groups_for_documentation(group.documentation_id)
            .await?;
        if let Some(parent_id) = new_parent
            && !candidates.iter().any(|candidate| candidate.id == parent_id)
        {
            // Foreign parents are loaded so validation can name the problem.
            if let Some(parent) = self.repositories.groups.find_group(parent_id).await? {
                candidates.push(parent);
            }
        }

        validate_reparent(group_id, new_parent, &candidates)?;

        let updated = self
            .repositories
            .structure
            .update_group_parent(group_id, new_parent)
            .await?;

        info!(
            target = "application::structure",
            op = "move_group",
            result = "success",
            group_id = %group_id,
            parent_id = ?new_parent,
            documentation_id = %updated.documentation_id,
            "Page group moved"
        );
        self.ledger.add_trigger(updated.documentation_id).await;
        Ok(updated)
    }

    /// Fork `source_id` (its groups and pages) into a new version of its
    /// lineage.
    pub async fn create_version(
        &self,
        source_id: Uuid,
        version: &str,
    ) -> Result<DocumentationRecord, StructureError> {
        let label = path_segment("version", version)?;

        let source = self
            .repositories
            .documentations
            .find_by_id(source_id)
            .await?
            .ok_or(StructureError::DocumentationNotFound { id: source_id })?;
        let root = self.versions.lineage_root(source_id).await?;

        let existing = self.versions.resolve_version_set(root.id).await?;
        if existing.contains(&label) {
            return Err(StructureError::DuplicateVersion { version: label });
        }

        let groups = self
            .repositories
            .groups
            .list_groups_for_documentation(source.id)
            .await?;
        let pages = self
            .repositories
            .pages
            .list_pages_for_documentation(source.id)
            .await?;

        let fork = plan_version_fork(
            &source,
            root.id,
            &label,
            &groups,
            &pages,
            OffsetDateTime::now_utc(),
        );
        let copied_groups = fork.groups.len();
        let copied_pages = fork.pages.len();
        let created = self.repositories.structure.insert_version(fork).await?;

        info!(
            target = "application::structure",
            op = "create_version",
            result = "success",
            source_id = %source_id,
            root_id = %root.id,
            documentation_id = %created.id,
            version = %label,
            groups = copied_groups,
            pages = copied_pages,
            "Version created"
        );
        self.ledger.add_trigger(created.id).await;
        Ok(created)
    }
}
