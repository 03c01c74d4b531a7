//! Best-effort removal of generated files the current pass did not produce.
//!
//! Only files the materializer owns (`*.mdx` and `_meta.json`) are candidates.
//! Failures are logged and skipped; pruning never fails a pass.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use super::writer::ContentWriter;

pub const META_FILE: &str = "_meta.json";
const PAGE_EXTENSION: &str = "mdx";

fn is_generated(path: &Path) -> bool {
    path.file_name().is_some_and(|name| name == META_FILE)
        || path.extension().is_some_and(|ext| ext == PAGE_EXTENSION)
}

/// Remove generated files under `version_root` that `writer` never saw, then
/// any directories left empty. Returns the number of files removed.
pub async fn prune_version(version_root: &Path, writer: &ContentWriter) -> usize {
    let mut removed = 0;
    let mut directories = Vec::new();
    let mut stack = vec![version_root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) => {
                warn_prune(&dir, &err);
                continue;
            }
        };
        directories.push(dir.clone());

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    warn_prune(&dir, &err);
                    break;
                }
            };
            let path = entry.path();
            match entry.file_type().await {
                Ok(kind) if kind.is_dir() => stack.push(path),
                Ok(_) if is_generated(&path) && !writer.was_touched(&path) => {
                    match fs::remove_file(&path).await {
                        Ok(()) => removed += 1,
                        Err(err) => warn_prune(&path, &err),
                    }
                }
                Ok(_) => {}
                Err(err) => warn_prune(&path, &err),
            }
        }
    }

    // Deepest first; `remove_dir` refuses non-empty directories.
    directories.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));
    for dir in directories.into_iter().filter(|dir| dir != version_root) {
        match fs::remove_dir(&dir).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::DirectoryNotEmpty => {}
            Err(err) => debug!(
                target = "application::materialize::prune",
                path = %dir.display(),
                error = %err,
                "Failed to remove emptied directory"
            ),
        }
    }

    removed
}

/// Remove version directories under `docs_root` whose label is not in `keep`.
/// Returns the number of directories removed.
pub async fn prune_versions(docs_root: &Path, keep: &HashSet<String>) -> usize {
    let mut entries = match fs::read_dir(docs_root).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return 0,
        Err(err) => {
            warn_prune(docs_root, &err);
            return 0;
        }
    };

    let mut stale: Vec<PathBuf> = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let is_dir = entry.file_type().await.is_ok_and(|kind| kind.is_dir());
                let label = entry.file_name().to_string_lossy().into_owned();
                if is_dir && !keep.contains(&label) {
                    stale.push(entry.path());
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn_prune(docs_root, &err);
                break;
            }
        }
    }

    let mut removed = 0;
    for path in stale {
        match fs::remove_dir_all(&path).await {
            Ok(()) => removed += 1,
            Err(err) => warn_prune(&path, &err),
        }
    }
    removed
}

fn warn_prune(path: &Path, err: &std::io::Error) {
    warn!(
        target = "application::materialize::prune",
        path = %path.display(),
        error = %err,
        "Failed to prune stale generated content"
    );
}
