//! One build pass: lock, materialize, install, build, publish.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::locks::{BuildLockRegistry, LockError};
use crate::application::materialize::{
    MaterializeError, MaterializeOutcome, MaterializeReport, Materializer,
};
use crate::application::toolchain::{BuildInvoker, ToolchainError};
use crate::application::versions::LineageError;
use crate::domain::entities::DocumentationRecord;
use crate::infra::templates::SCAFFOLD_MARKER;

const METRIC_PASS_TOTAL: &str = "docsmith_build_passes_total";
const METRIC_PASS_MS: &str = "docsmith_build_pass_ms";

/// Directory the finished site is published to, relative to the site root.
pub const PUBLISHED_DIR: &str = "build";
const RETIRED_DIR: &str = "build.old";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Lineage(LineageError),
    #[error(transparent)]
    Materialize(#[from] MaterializeError),
    #[error(transparent)]
    Toolchain(#[from] ToolchainError),
    #[error("build finished without producing `{}`", .path.display())]
    MissingOutput { path: PathBuf },
    #[error("failed to publish `{}`", .path.display())]
    Publish {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Built {
        report: MaterializeReport,
        installed: bool,
    },
    Removed {
        site_root: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub scaffolded: bool,
    pub installed: bool,
}

/// The unit of work the scheduler drives.
#[async_trait]
pub trait BuildPipeline: Send + Sync {
    /// Make sure a lineage root's site directory is initialized.
    async fn reconcile(&self, root: &DocumentationRecord)
    -> Result<ReconcileReport, PipelineError>;

    /// Run one full pass for the lineage `documentation_id` belongs to.
    async fn run_pass(&self, documentation_id: Uuid) -> Result<PassOutcome, PipelineError>;
}

#[derive(Clone)]
pub struct SitePipeline {
    materializer: Materializer,
    invoker: BuildInvoker,
    locks: BuildLockRegistry,
}

impl SitePipeline {
    pub fn new(
        materializer: Materializer,
        invoker: BuildInvoker,
        locks: BuildLockRegistry,
    ) -> Self {
        Self {
            materializer,
            invoker,
            locks,
        }
    }

    pub fn locks(&self) -> &BuildLockRegistry {
        &self.locks
    }

    /// Passes for any version of a lineage serialize on the root's lock.
    async fn lock_key(&self, documentation_id: Uuid) -> Result<Uuid, PipelineError> {
        match self
            .materializer
            .versions()
            .lineage_root(documentation_id)
            .await
        {
            Ok(root) => Ok(root.id),
            // Serialize with the lineage that still publishes the deleted version.
            Err(LineageError::NotFound { .. }) => Ok(self
                .materializer
                .published_root(documentation_id)
                .await
                .unwrap_or(documentation_id)),
            Err(LineageError::Repo(err)) => Err(MaterializeError::Repo(err).into()),
            Err(err) => Err(PipelineError::Lineage(err)),
        }
    }

    async fn pass(&self, documentation_id: Uuid) -> Result<PassOutcome, PipelineError> {
        let report = match self.materializer.materialize(documentation_id).await? {
            MaterializeOutcome::Removed { site_root } => {
                return Ok(PassOutcome::Removed { site_root });
            }
            MaterializeOutcome::Written(report) => report,
        };

        let site_root = report.site_root.clone();
        let installed = if path_exists(&self.invoker.dependency_path(&site_root)).await {
            false
        } else {
            self.invoker.install(&site_root).await?;
            true
        };

        self.invoker.build(&site_root).await?;
        publish(&self.invoker.output_path(&site_root), &site_root).await?;

        Ok(PassOutcome::Built { report, installed })
    }
}

#[async_trait]
impl BuildPipeline for SitePipeline {
    async fn reconcile(
        &self,
        root: &DocumentationRecord,
    ) -> Result<ReconcileReport, PipelineError> {
        let site_root = self.materializer.site_root(root.id);
        let site_root = site_root.as_path();
        let materializer = &self.materializer;
        let invoker = &self.invoker;

        self.locks
            .run_exclusive(root.id, move || async move {
                let mut report = ReconcileReport::default();
                let scaffold_missing = !path_exists(&site_root.join(SCAFFOLD_MARKER)).await;
                let dependencies_missing = !path_exists(&invoker.dependency_path(site_root)).await;

                if scaffold_missing {
                    materializer.write_scaffold(root).await?;
                    report.scaffolded = true;
                }
                if scaffold_missing || dependencies_missing {
                    invoker.install(site_root).await?;
                    report.installed = true;
                }

                info!(
                    target = "application::pipeline",
                    op = "reconcile",
                    result = "success",
                    documentation_id = %root.id,
                    scaffolded = report.scaffolded,
                    installed = report.installed,
                    "Site directory reconciled"
                );
                Ok::<_, PipelineError>(report)
            })
            .await?
    }

    async fn run_pass(&self, documentation_id: Uuid) -> Result<PassOutcome, PipelineError> {
        let started_at = Instant::now();
        let lock_key = self.lock_key(documentation_id).await?;
        let result = self
            .locks
            .run_exclusive(lock_key, move || self.pass(documentation_id))
            .await
            .map_err(PipelineError::from)
            .and_then(|result| result);

        let label = match &result {
            Ok(PassOutcome::Built { .. }) => "built",
            Ok(PassOutcome::Removed { .. }) => "removed",
            Err(PipelineError::Lock(_)) => "lock_timeout",
            Err(_) => "error",
        };
        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        counter!(METRIC_PASS_TOTAL, "result" => label).increment(1);
        histogram!(METRIC_PASS_MS, "result" => label).record(elapsed_ms);

        info!(
            target = "application::pipeline",
            op = "run_pass",
            result = label,
            documentation_id = %documentation_id,
            lock_key = %lock_key,
            elapsed_ms = elapsed_ms as u64,
            "Build pass finished"
        );

        result
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Swap the fresh output into `build/`: move the old tree aside, move the new
/// one in, then delete the old one.
async fn publish(output: &Path, site_root: &Path) -> Result<(), PipelineError> {
    if !path_exists(output).await {
        return Err(PipelineError::MissingOutput {
            path: output.to_path_buf(),
        });
    }

    let published = site_root.join(PUBLISHED_DIR);
    let retired = site_root.join(RETIRED_DIR);
    let publish_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| PipelineError::Publish { path, source }
    };

    if path_exists(&retired).await {
        tokio::fs::remove_dir_all(&retired)
            .await
            .map_err(publish_error(&retired))?;
    }

    let had_previous = path_exists(&published).await;
    if had_previous {
        tokio::fs::rename(&published, &retired)
            .await
            .map_err(publish_error(&published))?;
    }

    if let Err(source) = tokio::fs::rename(output, &published).await {
        if had_previous {
            let _ = tokio::fs::rename(&retired, &published).await;
        }
        return Err(PipelineError::Publish {
            path: published,
            source,
        });
    }

    if had_previous {
        if let Err(err) = tokio::fs::remove_dir_all(&retired).await {
            warn!(
                target = "application::pipeline",
                op = "publish",
                path = %retired.display(),
                error = %err,
                "Failed to delete retired build output"
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn publish_replaces_previous_output() {
        let dir = TempDir::new().expect("temp dir");
        let site = dir.path();
        std::fs::create_dir_all(site.join("build")).expect("mkdir");
        std::fs::write(site.join("build/old.html"), "old").expect("write");
        std::fs::create_dir_all(site.join("build_tmp")).expect("mkdir");
        std::fs::write(site.join("build_tmp/new.html"), "new").expect("write");

        publish(&site.join("build_tmp"), site).await.expect("publish");

        assert!(site.join("build/new.html").exists());
        assert!(!site.join("build/old.html").exists());
        assert!(!site.join("build_tmp").exists());
        assert!(!site.join(RETIRED_DIR).exists());
    }

    #[tokio::test]
    async fn publish_requires_fresh_output() {
        let dir = TempDir::new().expect("temp dir");
        std::fs::create_dir_all(dir.path().join("build")).expect("mkdir");

        let err = publish(&dir.path().join("build_tmp"), dir.path())
            .await
            .expect_err("missing output");
        assert!(matches!(err, PipelineError::MissingOutput { .. }));
        assert!(dir.path().join("build").exists());
    }
}
