//! Read-only walks over the version lineage (`cloned_from`).

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::application::repos::{DocumentationRepo, RepoError};
use crate::domain::entities::DocumentationRecord;

#[derive(Debug, Error)]
pub enum LineageError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error("documentation `{id}` not found")]
    NotFound { id: Uuid },
    #[error("documentation `{id}` is part of a `cloned_from` cycle")]
    Cycle { id: Uuid },
}

/// One version directory and the documentation that fills it.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionMember {
    pub label: String,
    pub documentation: DocumentationRecord,
}

/// A documentation left out of the site because a newer clone claimed its label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowedVersion {
    pub label: String,
    pub documentation_id: Uuid,
    pub replaced_by: Uuid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VersionSet {
    /// Label of the newest version; always the last entry of `labels`.
    pub latest: String,
    pub labels: Vec<String>,
    pub members: Vec<VersionMember>,
    pub shadowed: Vec<ShadowedVersion>,
}

impl VersionSet {
    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|existing| existing == label)
    }
}

#[derive(Clone)]
pub struct VersionResolver {
    documentations: Arc<dyn DocumentationRepo>,
}

impl VersionResolver {
    pub fn new(documentations: Arc<dyn DocumentationRepo>) -> Self {
        Self { documentations }
    }

    async fn load(&self, id: Uuid) -> Result<DocumentationRecord, LineageError> {
        self.documentations
            .find_by_id(id)
            .await?
            .ok_or(LineageError::NotFound { id })
    }

    /// The document's own version followed by each direct clone, oldest first.
    ///
    /// Two members sharing a label would write the same directory; the most
    /// recently created one keeps the slot.
    pub async fn resolve_version_set(&self, id: Uuid) -> Result<VersionSet, LineageError> {
        let documentation = self.load(id).await?;
        let mut clones = self.documentations.list_cloned_from(id).await?;
        clones.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let mut seen = HashSet::from([documentation.id]);
        clones.retain(|clone| seen.insert(clone.id));

        let mut members: Vec<VersionMember> = Vec::with_capacity(clones.len() + 1);
        let mut shadowed = Vec::new();
        for candidate in std::iter::once(documentation).chain(clones) {
            match members
                .iter_mut()
                .find(|member| member.label == candidate.version)
            {
                Some(member) => {
                    warn!(
                        target = "application::versions",
                        documentation_id = %id,
                        version = %candidate.version,
                        kept = %candidate.id,
                        dropped = %member.documentation.id,
                        "duplicate version label in lineage"
                    );
                    shadowed.push(ShadowedVersion {
                        label: member.label.clone(),
                        documentation_id: member.documentation.id,
                        replaced_by: candidate.id,
                    });
                    member.documentation = candidate;
                }
                None => members.push(VersionMember {
                    label: candidate.version.clone(),
                    documentation: candidate,
                }),
            }
        }

        let labels: Vec<String> = members.iter().map(|member| member.label.clone()).collect();
        let latest = labels.last().cloned().unwrap_or_default();

        Ok(VersionSet {
            latest,
            labels,
            members,
            shadowed,
        })
    }

    pub async fn child_versions(&self, id: Uuid) -> Result<Vec<Uuid>, LineageError> {
        let mut clones = self.documentations.list_cloned_from(id).await?;
        clones.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(clones
            .into_iter()
            .map(|clone| clone.id)
            .filter(|clone| *clone != id)
            .collect())
    }

    pub async fn parent_of(&self, id: Uuid) -> Result<Option<Uuid>, LineageError> {
        Ok(self.load(id).await?.cloned_from)
    }

    /// Ancestors nearest first. A reference to a missing documentation ends
    /// the chain.
    pub async fn ancestors(&self, id: Uuid) -> Result<Vec<DocumentationRecord>, LineageError> {
        let start = self.load(id).await?;
        let mut seen = HashSet::from([start.id]);
        let mut chain = Vec::new();
        let mut cursor = start.cloned_from;

        while let Some(parent_id) = cursor {
            if !seen.insert(parent_id) {
                return Err(LineageError::Cycle { id });
            }
            let Some(parent) = self.documentations.find_by_id(parent_id).await? else {
                break;
            };
            cursor = parent.cloned_from;
            chain.push(parent);
        }

        Ok(chain)
    }

    /// The furthest ancestor, or the documentation itself.
    pub async fn lineage_root(&self, id: Uuid) -> Result<DocumentationRecord, LineageError> {
        let mut ancestors = self.ancestors(id).await?;
        match ancestors.pop() {
            Some(root) => Ok(root),
            None => self.load(id).await,
        }
    }
}
