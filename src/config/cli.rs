use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use uuid::Uuid;

/// Command-line arguments for the docsmith binary.
#[derive(Debug, Parser)]
#[command(
    name = "docsmith",
    version,
    about = "Documentation site build orchestrator"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "DOCSMITH_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Reconcile every site directory, then drain build triggers forever.
    Serve(ServeArgs),
    /// Run one build pass for a documentation and settle its pending triggers.
    Build(BuildArgs),
    /// Print the latest build status of every documentation as JSON lines.
    Status,
    /// Fork a documentation into a new version of its lineage.
    #[command(name = "create-version")]
    CreateVersion(CreateVersionArgs),
    /// Move a page group under another group, or to the root.
    #[command(name = "move-group")]
    MoveGroup(MoveGroupArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace, debug, info, warn, error).
    #[arg(long = "log-level", global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON.
    #[arg(
        long = "log-json",
        global = true,
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", global = true, value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the directory site trees are written to.
    #[arg(
        long = "data-root",
        global = true,
        value_name = "PATH",
        value_hint = ValueHint::DirPath
    )]
    pub data_root: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    /// Override the delay between drains of the trigger ledger.
    #[arg(long = "scheduler-interval-seconds", value_name = "SECONDS")]
    pub interval_seconds: Option<u64>,

    /// Override how long a pass waits for its documentation's build lock.
    #[arg(long = "lock-timeout-seconds", value_name = "SECONDS")]
    pub lock_timeout_seconds: Option<u64>,

    /// Override the number of attempts for install and build commands.
    #[arg(long = "max-attempts", value_name = "COUNT")]
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Args, Clone)]
pub struct BuildArgs {
    /// Documentation to build; any version of a lineage builds the whole lineage.
    #[arg(long = "documentation", value_name = "UUID")]
    pub documentation: Uuid,
}

#[derive(Debug, Args, Clone)]
pub struct CreateVersionArgs {
    /// Documentation whose groups and pages are copied.
    #[arg(long = "source", value_name = "UUID")]
    pub source: Uuid,

    /// Label of the new version, e.g. `2.0`.
    #[arg(long = "label", value_name = "LABEL")]
    pub label: String,
}

#[derive(Debug, Args, Clone)]
pub struct MoveGroupArgs {
    /// Group to move.
    #[arg(long = "group", value_name = "UUID")]
    pub group: Uuid,

    /// New parent group; omit to move the group to the root.
    #[arg(long = "parent", value_name = "UUID")]
    pub parent: Option<Uuid>,
}
