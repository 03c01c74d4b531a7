//! Page-group tree assembly, re-parent validation and version fork planning.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{DocumentationRecord, PageGroupRecord, PageRecord};
use crate::domain::ordering::compare_siblings;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("page group `{id}` not found")]
    MissingGroup { id: Uuid },
    #[error("page group `{id}` cannot be its own parent")]
    SelfParent { id: Uuid },
    #[error("page group `{child}` and parent `{parent}` belong to different documentations")]
    CrossDocumentation { child: Uuid, parent: Uuid },
    #[error("moving page group `{child}` under `{parent}` would create a cycle")]
    Cycle { child: Uuid, parent: Uuid },
}

/// A document's content tree, with siblings already in display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentTree {
    pub pages: Vec<PageRecord>,
    pub groups: Vec<GroupNode>,
    /// Groups not reachable from a root group (dangling parent or cycle).
    pub detached_groups: Vec<Uuid>,
    /// Pages whose group is not part of the tree.
    pub detached_pages: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupNode {
    pub group: PageGroupRecord,
    pub pages: Vec<PageRecord>,
    pub groups: Vec<GroupNode>,
}

/// Assemble the tree of one documentation from its flat group and page rows.
///
/// Only groups reachable from a root group are materialized; everything else is
/// reported as detached instead of failing the whole document.
pub fn build_document_tree(groups: Vec<PageGroupRecord>, pages: Vec<PageRecord>) -> DocumentTree {
    let known: HashSet<Uuid> = groups.iter().map(|group| group.id).collect();
    let mut children: HashMap<Option<Uuid>, Vec<PageGroupRecord>> = HashMap::new();
    let mut dangling = Vec::new();
    for group in groups {
        match group.parent_id {
            Some(parent) if !known.contains(&parent) => dangling.push(group.id),
            parent => children.entry(parent).or_default().push(group),
        }
    }

    let mut pages_by_group: HashMap<Option<Uuid>, Vec<PageRecord>> = HashMap::new();
    for page in pages {
        pages_by_group.entry(page.page_group_id).or_default().push(page);
    }

    let mut visited = HashSet::new();
    let root_groups = children.remove(&None).unwrap_or_default();
    let groups = assemble(root_groups, &mut children, &mut pages_by_group, &mut visited);
    let root_pages = sorted_pages(pages_by_group.remove(&None).unwrap_or_default());

    let mut detached_groups: Vec<Uuid> = children
        .into_values()
        .flatten()
        .map(|group| group.id)
        .filter(|id| !visited.contains(id))
        .chain(dangling)
        .collect();
    detached_groups.sort();

    let mut detached_pages: Vec<Uuid> = pages_by_group
        .into_values()
        .flatten()
        .map(|page| page.id)
        .collect();
    detached_pages.sort();

    DocumentTree {
        pages: root_pages,
        groups,
        detached_groups,
        detached_pages,
    }
}

fn assemble(
    mut level: Vec<PageGroupRecord>,
    children: &mut HashMap<Option<Uuid>, Vec<PageGroupRecord>>,
    pages_by_group: &mut HashMap<Option<Uuid>, Vec<PageRecord>>,
    visited: &mut HashSet<Uuid>,
) -> Vec<GroupNode> {
    level.sort_by(|a, b| compare_siblings(a.order, &a.name, b.order, &b.name));

    let mut nodes = Vec::with_capacity(level.len());
    for group in level {
        if !visited.insert(group.id) {
            continue;
        }
        let nested = children.remove(&Some(group.id)).unwrap_or_default();
        let groups = assemble(nested, children, pages_by_group, visited);
        let pages = sorted_pages(pages_by_group.remove(&Some(group.id)).unwrap_or_default());
        nodes.push(GroupNode {
            group,
            pages,
            groups,
        });
    }
    nodes
}

fn sorted_pages(mut pages: Vec<PageRecord>) -> Vec<PageRecord> {
    pages.sort_by(|a, b| compare_siblings(a.order, &a.title, b.order, &b.title));
    pages
}

/// Check that moving `group_id` under `new_parent` keeps the group forest a
/// strict, single-documentation tree.
///
/// `groups` must contain every group that can appear on the new parent's
/// ancestor chain.
pub fn validate_reparent(
    group_id: Uuid,
    new_parent: Option<Uuid>,
    groups: &[PageGroupRecord],
) -> Result<(), TreeError> {
    let by_id: HashMap<Uuid, &PageGroupRecord> =
        groups.iter().map(|group| (group.id, group)).collect();

    let child = by_id
        .get(&group_id)
        .ok_or(TreeError::MissingGroup { id: group_id })?;

    let Some(parent_id) = new_parent else {
        return Ok(());
    };

    if parent_id == group_id {
        return Err(TreeError::SelfParent { id: group_id });
    }

    let parent = by_id
        .get(&parent_id)
        .ok_or(TreeError::MissingGroup { id: parent_id })?;

    if parent.documentation_id != child.documentation_id {
        return Err(TreeError::CrossDocumentation {
            child: group_id,
            parent: parent_id,
        });
    }

    let mut seen = HashSet::new();
    let mut cursor = Some(parent_id);
    while let Some(current) = cursor {
        if current == group_id || !seen.insert(current) {
            return Err(TreeError::Cycle {
                child: group_id,
                parent: parent_id,
            });
        }
        cursor = by_id.get(&current).and_then(|group| group.parent_id);
    }

    Ok(())
}

/// Rows to insert when forking a documentation into a new version.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionFork {
    pub documentation: DocumentationRecord,
    /// Parents always precede their children.
    pub groups: Vec<PageGroupRecord>,
    pub pages: Vec<PageRecord>,
}

/// Plan a copy of `source` (its groups and pages) as a new version attached to
/// `lineage_root`.
///
/// The clone closure is the set of groups owned by `source`. A copied group
/// whose parent falls outside that closure becomes a root group; a copied page
/// whose group falls outside it is attached at the document root.
pub fn plan_version_fork(
    source: &DocumentationRecord,
    lineage_root: Uuid,
    version: &str,
    groups: &[PageGroupRecord],
    pages: &[PageRecord],
    now: OffsetDateTime,
) -> VersionFork {
    let new_documentation_id = Uuid::new_v4();

    let documentation = DocumentationRecord {
        id: new_documentation_id,
        version: version.to_string(),
        cloned_from: Some(lineage_root),
        created_at: now,
        updated_at: now,
        ..source.clone()
    };

    let closure: Vec<&PageGroupRecord> = groups
        .iter()
        .filter(|group| group.documentation_id == source.id)
        .collect();
    let id_map: HashMap<Uuid, Uuid> = closure
        .iter()
        .map(|group| (group.id, Uuid::new_v4()))
        .collect();

    let mut pending: Vec<PageGroupRecord> = closure
        .iter()
        .map(|group| PageGroupRecord {
            id: id_map[&group.id],
            documentation_id: new_documentation_id,
            parent_id: group
                .parent_id
                .and_then(|parent| id_map.get(&parent).copied()),
            name: group.name.clone(),
            order: group.order,
            created_at: now,
        })
        .collect();

    let mut emitted: HashSet<Uuid> = HashSet::new();
    let mut ordered = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let ready = pending
            .iter()
            .position(|group| group.parent_id.is_none_or(|parent| emitted.contains(&parent)));
        let index = match ready {
            Some(index) => index,
            None => {
                // Only a cycle in the source can get here; break it at the first row.
                pending[0].parent_id = None;
                0
            }
        };
        let group = pending.remove(index);
        emitted.insert(group.id);
        ordered.push(group);
    }

    let pages = pages
        .iter()
        .filter(|page| page.documentation_id == source.id)
        .map(|page| PageRecord {
            id: Uuid::new_v4(),
            documentation_id: new_documentation_id,
            page_group_id: page
                .page_group_id
                .and_then(|group| id_map.get(&group).copied()),
            created_at: now,
            ..page.clone()
        })
        .collect();

    VersionFork {
        documentation,
        groups: ordered,
        pages,
    }
}
