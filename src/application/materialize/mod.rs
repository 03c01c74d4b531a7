//! Tree-to-filesystem materialization.
//!
//! For a documentation the site directory is `<data-root>/<lineage-root-id>`.
//! Each version of the lineage lands in `docs/<version>/`, with the content
//! tree mounted under the documentation's base URL:
//!
//! ```text
//! <site>/
//!   package.json, rspress.config.ts, ... scaffold from the template bundle
//!   docsmith.versions.json                version manifest
//!   docs/<version>/
//!     _meta.json                          one dir entry for the base URL
//!     index.mdx                           landing page or redirect stub
//!     styles.css
//!     <base-url>/
//!       _meta.json
//!       index.mdx                         intro page
//!       <page>.mdx
//!       <group>/...
//! ```

mod lander;
mod manifest;
mod meta;
mod prune;
mod styles;
mod writer;

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub use lander::render_landing;
pub use manifest::{MANIFEST_FILE, ManifestVersion, VersionManifest, find_owner, read_manifest};
pub use meta::{MetaEntry, render_sidecar, url_path};
pub use prune::{META_FILE, prune_version, prune_versions};
pub use styles::render_stylesheet;
pub use writer::{ContentWriter, WriteReport, content_digest};

use crate::application::render::render_content;
use crate::application::repos::{RepoError, Repositories};
use crate::application::versions::{
    LineageError, ShadowedVersion, VersionMember, VersionResolver, VersionSet,
};
use crate::domain::blocks::BlockParseError;
use crate::domain::entities::{DocumentationRecord, PageRecord};
use crate::domain::error::{DomainError, path_segment, path_segments};
use crate::domain::slug::{INDEX_NAME, SiblingNamer};
use crate::domain::tree::{GroupNode, build_document_tree};
use crate::infra::templates::{TemplateBundle, TemplateContext, quoted_fragment};

const METRIC_FILES_WRITTEN: &str = "docsmith_materialize_files_written_total";
const METRIC_FILES_SKIPPED: &str = "docsmith_materialize_files_skipped_total";

pub const DOCS_DIR: &str = "docs";
const STYLESHEET_FILE: &str = "styles.css";
const DEFAULT_PRIMARY_COLOR: &str = "#2563eb";

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Lineage(LineageError),
    #[error(transparent)]
    Path(#[from] DomainError),
    #[error("page `{page_id}` content could not be parsed")]
    Render {
        page_id: Uuid,
        #[source]
        source: BlockParseError,
    },
    #[error("failed to serialize `{}`", .path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write `{}`", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializeReport {
    pub root_id: Uuid,
    pub site_root: PathBuf,
    pub versions: Vec<String>,
    /// Documentations left out because a newer clone claimed their label.
    pub shadowed: Vec<ShadowedVersion>,
    pub files: WriteReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeOutcome {
    Written(MaterializeReport),
    /// The documentation no longer exists; its site directory was deleted.
    Removed { site_root: PathBuf },
}

/// A directory still to be written.
struct DirectoryJob {
    path: PathBuf,
    url_segments: Vec<String>,
    pages: Vec<PageRecord>,
    groups: Vec<GroupNode>,
}

#[derive(Clone)]
pub struct Materializer {
    data_root: PathBuf,
    repositories: Repositories,
    versions: VersionResolver,
    templates: Arc<TemplateBundle>,
}

impl Materializer {
    pub fn new(
        data_root: impl Into<PathBuf>,
        repositories: Repositories,
        templates: Arc<TemplateBundle>,
    ) -> Self {
        let versions = VersionResolver::new(repositories.documentations.clone());
        Self {
            data_root: data_root.into(),
            repositories,
            versions,
            templates,
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn site_root(&self, root_id: Uuid) -> PathBuf {
        self.data_root.join(root_id.to_string())
    }

    pub fn versions(&self) -> &VersionResolver {
        &self.versions
    }

    /// The manifest last written for the site of `root_id`.
    pub async fn manifest(&self, root_id: Uuid) -> Option<VersionManifest> {
        read_manifest(&self.site_root(root_id)).await
    }

    /// Lineage root of the site that last published `documentation_id`.
    pub async fn published_root(&self, documentation_id: Uuid) -> Option<Uuid> {
        find_owner(&self.data_root, documentation_id).await
    }

    /// Materialize every version of the lineage `documentation_id` belongs to.
    pub async fn materialize(
        &self,
        documentation_id: Uuid,
    ) -> Result<MaterializeOutcome, MaterializeError> {
        match self.versions.lineage_root(documentation_id).await {
            Ok(root) => self.materialize_root(documentation_id, root).await,
            Err(LineageError::NotFound { .. }) => self.materialize_removed(documentation_id).await,
            Err(err) => Err(lineage_error(err)),
        }
    }

    /// A deleted version is pruned by rebuilding the lineage that published
    /// it; a deleted lineage root loses its whole site directory.
    async fn materialize_removed(
        &self,
        documentation_id: Uuid,
    ) -> Result<MaterializeOutcome, MaterializeError> {
        let owner = self
            .published_root(documentation_id)
            .await
            .filter(|owner| *owner != documentation_id);
        if let Some(owner) = owner {
            match self.versions.lineage_root(owner).await {
                Ok(root) => {
                    info!(
                        target = "application::materialize",
                        op = "materialize",
                        documentation_id = %documentation_id,
                        root_id = %root.id,
                        "Documentation is gone; rebuilding the lineage that published it"
                    );
                    return self.materialize_root(documentation_id, root).await;
                }
                Err(LineageError::NotFound { .. }) => {}
                Err(err) => return Err(lineage_error(err)),
            }
        }

        let site_root = self.site_root(documentation_id);
        remove_site(&site_root).await?;
        info!(
            target = "application::materialize",
            op = "materialize",
            result = "removed",
            documentation_id = %documentation_id,
            site_root = %site_root.display(),
            "Documentation is gone; removed its site directory"
        );
        Ok(MaterializeOutcome::Removed { site_root })
    }

    async fn materialize_root(
        &self,
        documentation_id: Uuid,
        root: DocumentationRecord,
    ) -> Result<MaterializeOutcome, MaterializeError> {
        let started_at = Instant::now();
        let version_set = self
            .versions
            .resolve_version_set(root.id)
            .await
            .map_err(lineage_error)?;

        let site_root = self.site_root(root.id);
        let docs_root = site_root.join(DOCS_DIR);
        let mut writer = ContentWriter::new();

        let mut layouts = Vec::with_capacity(version_set.members.len());
        for member in &version_set.members {
            let label = path_segment("version", &member.label)?;
            let base = path_segments("base_url", &member.documentation.base_url)?;
            layouts.push((member, label, base));
        }

        for (member, label, base) in &layouts {
            self.write_version(&docs_root, member, label, base, &mut writer)
                .await?;
        }

        self.write_scaffold_with(&root, &version_set, &mut writer)
            .await?;

        let manifest_path = site_root.join(MANIFEST_FILE);
        let manifest = VersionManifest::from_version_set(root.id, &version_set)
            .render()
            .map_err(|source| MaterializeError::Serialize {
                path: manifest_path.clone(),
                source,
            })?;
        write_file(&mut writer, &manifest_path, manifest.as_bytes()).await?;

        for (_, label, _) in &layouts {
            let pruned = prune_version(&docs_root.join(label), &writer).await;
            writer.record_pruned(pruned);
        }
        let keep: HashSet<String> = layouts.iter().map(|(_, label, _)| label.clone()).collect();
        let pruned_versions = prune_versions(&docs_root, &keep).await;
        writer.record_pruned(pruned_versions);

        let files = writer.report();
        counter!(METRIC_FILES_WRITTEN).increment(files.written as u64);
        counter!(METRIC_FILES_SKIPPED).increment(files.skipped as u64);

        info!(
            target = "application::materialize",
            op = "materialize",
            result = "written",
            documentation_id = %documentation_id,
            root_id = %root.id,
            versions = version_set.labels.len(),
            shadowed = version_set.shadowed.len(),
            written = files.written,
            skipped = files.skipped,
            pruned = files.pruned,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Documentation materialized"
        );

        Ok(MaterializeOutcome::Written(MaterializeReport {
            root_id: root.id,
            site_root,
            versions: version_set.labels,
            shadowed: version_set.shadowed,
            files,
        }))
    }

    /// Render the template bundle into the site root of `root`.
    pub async fn write_scaffold(
        &self,
        root: &DocumentationRecord,
    ) -> Result<WriteReport, MaterializeError> {
        let version_set = self
            .versions
            .resolve_version_set(root.id)
            .await
            .map_err(lineage_error)?;
        let mut writer = ContentWriter::new();
        self.write_scaffold_with(root, &version_set, &mut writer)
            .await?;
        Ok(writer.report())
    }

    async fn write_scaffold_with(
        &self,
        root: &DocumentationRecord,
        version_set: &VersionSet,
        writer: &mut ContentWriter,
    ) -> Result<(), MaterializeError> {
        let site_root = self.site_root(root.id);
        let versions = serde_json::to_string(&version_set.labels).map_err(|source| {
            MaterializeError::Serialize {
                path: site_root.clone(),
                source,
            }
        })?;
        let context = TemplateContext {
            title: quoted_fragment(&root.name),
            base_url: root.base_url.trim_matches('/').to_string(),
            version: version_set.latest.clone(),
            versions,
            primary_color: root
                .primary_color
                .clone()
                .unwrap_or_else(|| DEFAULT_PRIMARY_COLOR.to_string()),
            logo_url: quoted_fragment(root.logo_url.as_deref().unwrap_or_default()),
            favicon_url: quoted_fragment(root.favicon_url.as_deref().unwrap_or_default()),
        };

        for file in self.templates.render(&context) {
            let path = site_root.join(&file.path);
            write_file(writer, &path, &file.contents).await?;
        }
        Ok(())
    }

    async fn write_version(
        &self,
        docs_root: &Path,
        member: &VersionMember,
        label: &str,
        base: &[String],
        writer: &mut ContentWriter,
    ) -> Result<(), MaterializeError> {
        let documentation = &member.documentation;
        let version_root = docs_root.join(label);

        // Version root and every intermediate base-URL directory point at the
        // next segment only.
        let mut dir = version_root.clone();
        let mut url = vec![label.to_string()];
        for (depth, segment) in base.iter().enumerate() {
            url.push(segment.clone());
            let mut entries = vec![MetaEntry::dir(
                segment.clone(),
                documentation.name.clone(),
                url_path(url.iter().map(String::as_str)),
                None,
            )];
            if depth == 0 {
                entries.push(
                    MetaEntry::file(
                        INDEX_NAME,
                        documentation.name.clone(),
                        url_path([label]),
                        None,
                    )
                    .hidden(),
                );
            }
            write_sidecar(writer, &dir.join(META_FILE), entries).await?;
            dir = dir.join(segment);
        }

        let landing_path = version_root.join(format!("{INDEX_NAME}.mdx"));
        let landing = render_landing(documentation, label, base).map_err(|source| {
            MaterializeError::Serialize {
                path: landing_path.clone(),
                source,
            }
        })?;
        write_file(writer, &landing_path, landing.as_bytes()).await?;

        let groups = self
            .repositories
            .groups
            .list_groups_for_documentation(documentation.id)
            .await?;
        let pages = self
            .repositories
            .pages
            .list_pages_for_documentation(documentation.id)
            .await?;
        let tree = build_document_tree(groups, pages);
        if !tree.detached_groups.is_empty() || !tree.detached_pages.is_empty() {
            warn!(
                target = "application::materialize",
                op = "write_version",
                documentation_id = %documentation.id,
                version = %label,
                detached_groups = tree.detached_groups.len(),
                detached_pages = tree.detached_pages.len(),
                "Skipping nodes not reachable from the document root"
            );
        }

        let mut stack = vec![DirectoryJob {
            path: dir,
            url_segments: url,
            pages: tree.pages,
            groups: tree.groups,
        }];
        while let Some(job) = stack.pop() {
            let nested = write_directory(job, writer).await?;
            stack.extend(nested);
        }

        let stylesheet = render_stylesheet(
            self.templates.base_stylesheet(),
            documentation.custom_css.as_deref(),
            documentation.primary_color.as_deref(),
        );
        write_file(writer, &version_root.join(STYLESHEET_FILE), stylesheet.as_bytes()).await?;

        Ok(())
    }
}

/// Write one directory's pages and sidecar, returning its child directories.
async fn write_directory(
    job: DirectoryJob,
    writer: &mut ContentWriter,
) -> Result<Vec<DirectoryJob>, MaterializeError> {
    let mut namer = SiblingNamer::new();
    let mut entries = Vec::with_capacity(job.pages.len() + job.groups.len());
    let mut intro_written = false;

    for page in &job.pages {
        let name = if page.is_intro_page && !intro_written {
            intro_written = true;
            INDEX_NAME.to_string()
        } else {
            namer.name_for(&page.title, &page.slug)
        };

        let body = render_content(&page.content).map_err(|source| MaterializeError::Render {
            page_id: page.id,
            source,
        })?;
        let path = job.path.join(format!("{name}.mdx"));
        let document = page_document(&page.title, &body).map_err(|source| {
            MaterializeError::Serialize {
                path: path.clone(),
                source,
            }
        })?;
        write_file(writer, &path, document.as_bytes()).await?;

        let url = if name == INDEX_NAME {
            url_path(job.url_segments.iter().map(String::as_str))
        } else {
            url_path(
                job.url_segments
                    .iter()
                    .map(String::as_str)
                    .chain([name.as_str()]),
            )
        };
        entries.push(MetaEntry::file(name, page.title.clone(), url, page.order));
    }

    let mut nested = Vec::with_capacity(job.groups.len());
    for node in job.groups {
        let name = namer.name_for(&node.group.name, "group");
        let mut url_segments = job.url_segments.clone();
        url_segments.push(name.clone());
        entries.push(MetaEntry::dir(
            name.clone(),
            node.group.name.clone(),
            url_path(url_segments.iter().map(String::as_str)),
            node.group.order,
        ));
        nested.push(DirectoryJob {
            path: job.path.join(&name),
            url_segments,
            pages: node.pages,
            groups: node.groups,
        });
    }

    write_sidecar(writer, &job.path.join(META_FILE), entries).await?;
    Ok(nested)
}

fn page_document(title: &str, body: &str) -> Result<String, serde_json::Error> {
    let title = serde_json::to_string(title)?;
    if body.is_empty() {
        Ok(format!("---\ntitle: {title}\n---\n"))
    } else {
        Ok(format!("---\ntitle: {title}\n---\n\n{body}"))
    }
}

async fn write_sidecar(
    writer: &mut ContentWriter,
    path: &Path,
    entries: Vec<MetaEntry>,
) -> Result<(), MaterializeError> {
    let json = render_sidecar(entries).map_err(|source| MaterializeError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    write_file(writer, path, json.as_bytes()).await
}

async fn write_file(
    writer: &mut ContentWriter,
    path: &Path,
    contents: &[u8],
) -> Result<(), MaterializeError> {
    writer
        .write(path, contents)
        .await
        .map(|_| ())
        .map_err(|source| MaterializeError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn lineage_error(err: LineageError) -> MaterializeError {
    match err {
        LineageError::Repo(err) => MaterializeError::Repo(err),
        other => MaterializeError::Lineage(other),
    }
}

async fn remove_site(site_root: &Path) -> Result<(), MaterializeError> {
    match tokio::fs::remove_dir_all(site_root).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(MaterializeError::Io {
            path: site_root.to_path_buf(),
            source,
        }),
    }
}
