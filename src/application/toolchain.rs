//! Bounded-retry invocation of the external site generator.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};

const METRIC_TOOL_ATTEMPTS: &str = "docsmith_tool_attempts_total";

/// Output tail kept in errors and logs.
const OUTPUT_TAIL_BYTES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStep {
    Install,
    Build,
}

impl ToolStep {
    pub fn as_str(self) -> &'static str {
        match self {
            ToolStep::Install => "install",
            ToolStep::Build => "build",
        }
    }
}

/// Captured result of one tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: None,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Trailing stdout and stderr, suitable for an error message.
    pub fn summary(&self) -> String {
        let stdout = tail(&self.stdout);
        let stderr = tail(&self.stderr);
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, true) => format!("exit {:?} without output", self.exit_code),
            (false, true) => format!("exit {:?}; stdout: {stdout}", self.exit_code),
            (true, false) => format!("exit {:?}; stderr: {stderr}", self.exit_code),
            (false, false) => format!(
                "exit {:?}; stdout: {stdout}; stderr: {stderr}",
                self.exit_code
            ),
        }
    }
}

fn tail(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.len() <= OUTPUT_TAIL_BYTES {
        return trimmed;
    }
    let mut start = trimmed.len() - OUTPUT_TAIL_BYTES;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    &trimmed[start..]
}

/// Runs one step of the site generator inside a site root.
#[async_trait]
pub trait SiteToolchain: Send + Sync {
    /// `Err` means the tool could not be started at all.
    async fn run(&self, step: ToolStep, site_root: &Path) -> io::Result<ToolOutput>;
}

#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("{} failed after {attempts} attempt(s): {}", .step.as_str(), .output.summary())]
    Exhausted {
        step: ToolStep,
        attempts: u32,
        output: ToolOutput,
    },
    #[error("failed to clean `{}` after a failed {}: {source}", .path.display(), .step.as_str())]
    Cleanup {
        step: ToolStep,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokerSettings {
    pub max_attempts: u32,
    /// Relative to the site root; removed after a failed install.
    pub dependency_dir: PathBuf,
    /// Relative to the site root; removed after a failed build.
    pub output_dir: PathBuf,
}

impl Default for InvokerSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            dependency_dir: PathBuf::from("node_modules"),
            output_dir: PathBuf::from("build_tmp"),
        }
    }
}

#[derive(Clone)]
pub struct BuildInvoker {
    toolchain: Arc<dyn SiteToolchain>,
    settings: InvokerSettings,
}

impl BuildInvoker {
    pub fn new(toolchain: Arc<dyn SiteToolchain>, settings: InvokerSettings) -> Self {
        Self {
            toolchain,
            settings,
        }
    }

    pub fn settings(&self) -> &InvokerSettings {
        &self.settings
    }

    pub fn dependency_path(&self, site_root: &Path) -> PathBuf {
        site_root.join(&self.settings.dependency_dir)
    }

    pub fn output_path(&self, site_root: &Path) -> PathBuf {
        site_root.join(&self.settings.output_dir)
    }

    pub async fn install(&self, site_root: &Path) -> Result<ToolOutput, ToolchainError> {
        let cleanup = self.dependency_path(site_root);
        self.run_with_retries(ToolStep::Install, site_root, &cleanup)
            .await
    }

    pub async fn build(&self, site_root: &Path) -> Result<ToolOutput, ToolchainError> {
        let cleanup = self.output_path(site_root);
        self.run_with_retries(ToolStep::Build, site_root, &cleanup)
            .await
    }

    async fn run_with_retries(
        &self,
        step: ToolStep,
        site_root: &Path,
        cleanup: &Path,
    ) -> Result<ToolOutput, ToolchainError> {
        let max_attempts = self.settings.max_attempts.max(1);
        let started_at = Instant::now();
        let mut last_output = ToolOutput::default();

        for attempt in 1..=max_attempts {
            let output = match self.toolchain.run(step, site_root).await {
                Ok(output) => output,
                Err(err) => ToolOutput::failed(format!("failed to start {}: {err}", step.as_str())),
            };

            if output.success {
                counter!(METRIC_TOOL_ATTEMPTS, "step" => step.as_str(), "result" => "success")
                    .increment(1);
                info!(
                    target = "application::toolchain",
                    op = step.as_str(),
                    result = "success",
                    attempt,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    site_root = %site_root.display(),
                    "site tool step completed"
                );
                return Ok(output);
            }

            counter!(METRIC_TOOL_ATTEMPTS, "step" => step.as_str(), "result" => "failure")
                .increment(1);
            warn!(
                target = "application::toolchain",
                op = step.as_str(),
                result = "error",
                attempt,
                max_attempts,
                exit_code = output.exit_code.map(i64::from).unwrap_or(-1),
                stderr = %tail(&output.stderr),
                site_root = %site_root.display(),
                "site tool step failed"
            );

            remove_partial(cleanup)
                .await
                .map_err(|source| ToolchainError::Cleanup {
                    step,
                    path: cleanup.to_path_buf(),
                    source,
                })?;
            last_output = output;
        }

        Err(ToolchainError::Exhausted {
            step,
            attempts: max_attempts,
            output: last_output,
        })
    }
}

async fn remove_partial(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}
