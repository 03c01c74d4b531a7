use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    process::Stdio,
    time::Instant,
};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::application::toolchain::{SiteToolchain, ToolOutput, ToolStep};

use super::error::InfraError;

/// Environment variable telling the generator where to write its output.
pub const OUTPUT_DIR_ENV: &str = "DOCSMITH_OUTPUT_DIR";

/// A program plus its arguments, parsed from a configured command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Split on whitespace. Quoting is not supported; wrap complex commands in
    /// a package script instead.
    pub fn parse(line: &str) -> Result<Self, InfraError> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| InfraError::configuration("site tool command is empty"))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs the configured install and build commands as child processes.
#[derive(Debug, Clone)]
pub struct CommandToolchain {
    install: CommandSpec,
    build: CommandSpec,
    output_dir: PathBuf,
}

impl CommandToolchain {
    pub fn new(install: CommandSpec, build: CommandSpec, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            install,
            build,
            output_dir: output_dir.into(),
        }
    }

    fn command_for(&self, step: ToolStep) -> &CommandSpec {
        match step {
            ToolStep::Install => &self.install,
            ToolStep::Build => &self.build,
        }
    }
}

#[async_trait]
impl SiteToolchain for CommandToolchain {
    async fn run(&self, step: ToolStep, site_root: &Path) -> io::Result<ToolOutput> {
        let spec = self.command_for(step);
        let started_at = Instant::now();

        let output = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(site_root)
            .env(OUTPUT_DIR_ENV, &self.output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .inspect_err(|err| {
                warn!(
                    target = "infra::toolchain",
                    op = step.as_str(),
                    result = "error",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error_code = if err.kind() == ErrorKind::NotFound {
                        "tool_not_found"
                    } else {
                        "spawn_tool"
                    },
                    command = %spec.display(),
                    error = %err,
                    "Failed to spawn site tool"
                );
            })?;

        let result = ToolOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        info!(
            target = "infra::toolchain",
            op = step.as_str(),
            result = if result.success { "success" } else { "error" },
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            exit_code = result.exit_code.map(i64::from).unwrap_or(-1),
            command = %spec.display(),
            site_root = %site_root.display(),
            "Site tool finished"
        );

        Ok(result)
    }
}
