use std::collections::HashSet;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::fs;

/// Write counters for one materialization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub written: usize,
    pub skipped: usize,
    pub pruned: usize,
}

impl WriteReport {
    pub fn merge(&mut self, other: WriteReport) {
        self.written += other.written;
        self.skipped += other.skipped;
        self.pruned += other.pruned;
    }
}

/// Content-addressed file writer.
///
/// A file whose current bytes hash to the same SHA-256 digest as the new
/// bytes is left alone, so repeated passes over unchanged content touch
/// nothing on disk. Every path offered to the writer is remembered, written
/// or not, which is what the prune step compares against.
#[derive(Debug, Default)]
pub struct ContentWriter {
    touched: HashSet<PathBuf>,
    report: WriteReport,
}

impl ContentWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the file was (re)written.
    pub async fn write(&mut self, path: &Path, contents: &[u8]) -> io::Result<bool> {
        self.touched.insert(path.to_path_buf());

        match fs::read(path).await {
            Ok(existing) if content_digest(&existing) == content_digest(contents) => {
                self.report.skipped += 1;
                return Ok(false);
            }
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, contents).await?;
        self.report.written += 1;
        Ok(true)
    }

    pub fn was_touched(&self, path: &Path) -> bool {
        self.touched.contains(path)
    }

    pub(crate) fn record_pruned(&mut self, count: usize) {
        self.report.pruned += count;
    }

    pub fn report(&self) -> WriteReport {
        self.report
    }
}

pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
