//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{
    BuildArgs, CliArgs, Command, CreateVersionArgs, GlobalOverrides, MoveGroupArgs, ServeArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "docsmith";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_SCHEDULER_INTERVAL_SECS: u64 = 10;
const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 60;
const DEFAULT_DATA_ROOT: &str = "data";
const DEFAULT_INSTALL_COMMAND: &str = "npm install";
const DEFAULT_BUILD_COMMAND: &str = "npm run build";
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_DEPENDENCY_DIR: &str = "node_modules";
const DEFAULT_OUTPUT_DIR: &str = "build_tmp";

#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub scheduler: SchedulerSettings,
    pub site: SiteSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub interval: Duration,
    pub lock_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub data_root: PathBuf,
    pub install_command: String,
    pub build_command: String,
    pub max_attempts: NonZeroU32,
    pub dependency_dir: String,
    pub output_dir: String,
    /// Replaces the embedded site template when set.
    pub template_dir: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("DOCSMITH").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    raw.apply_global_overrides(&cli.overrides);
    if let Some(Command::Serve(args)) = cli.command.as_ref() {
        raw.apply_serve_overrides(args);
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    scheduler: RawSchedulerSettings,
    site: RawSiteSettings,
}

impl RawSettings {
    fn apply_global_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(root) = overrides.data_root.as_ref() {
            self.site.data_root = Some(root.clone());
        }
    }

    fn apply_serve_overrides(&mut self, overrides: &ServeArgs) {
        if let Some(seconds) = overrides.interval_seconds {
            self.scheduler.interval_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.lock_timeout_seconds {
            self.scheduler.lock_timeout_seconds = Some(seconds);
        }
        if let Some(attempts) = overrides.max_attempts {
            self.site.max_attempts = Some(attempts);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            database,
            scheduler,
            site,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            scheduler: build_scheduler_settings(scheduler)?,
            site: build_site_settings(site)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);
    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_scheduler_settings(
    scheduler: RawSchedulerSettings,
) -> Result<SchedulerSettings, LoadError> {
    let interval_seconds = scheduler
        .interval_seconds
        .unwrap_or(DEFAULT_SCHEDULER_INTERVAL_SECS);
    if interval_seconds == 0 {
        return Err(LoadError::invalid(
            "scheduler.interval_seconds",
            "must be greater than zero",
        ));
    }

    let lock_timeout_seconds = scheduler
        .lock_timeout_seconds
        .unwrap_or(DEFAULT_LOCK_TIMEOUT_SECS);
    if lock_timeout_seconds == 0 {
        return Err(LoadError::invalid(
            "scheduler.lock_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(SchedulerSettings {
        interval: Duration::from_secs(interval_seconds),
        lock_timeout: Duration::from_secs(lock_timeout_seconds),
    })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let data_root = site
        .data_root
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_ROOT));
    if data_root.as_os_str().is_empty() {
        return Err(LoadError::invalid("site.data_root", "must not be empty"));
    }

    let install_command = non_blank(site.install_command)
        .unwrap_or_else(|| DEFAULT_INSTALL_COMMAND.to_string());
    let build_command =
        non_blank(site.build_command).unwrap_or_else(|| DEFAULT_BUILD_COMMAND.to_string());

    let max_attempts = non_zero_u32(
        site.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS).into(),
        "site.max_attempts",
    )?;

    let dependency_dir = relative_dir(
        site.dependency_dir,
        DEFAULT_DEPENDENCY_DIR,
        "site.dependency_dir",
    )?;
    let output_dir = relative_dir(site.output_dir, DEFAULT_OUTPUT_DIR, "site.output_dir")?;
    if output_dir == crate::application::pipeline::PUBLISHED_DIR {
        return Err(LoadError::invalid(
            "site.output_dir",
            "must differ from the published `build` directory",
        ));
    }

    let template_dir = site
        .template_dir
        .filter(|path| !path.as_os_str().is_empty());

    Ok(SiteSettings {
        data_root,
        install_command,
        build_command,
        max_attempts,
        dependency_dir,
        output_dir,
        template_dir,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSchedulerSettings {
    interval_seconds: Option<u64>,
    lock_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    data_root: Option<PathBuf>,
    install_command: Option<String>,
    build_command: Option<String>,
    max_attempts: Option<u32>,
    dependency_dir: Option<String>,
    output_dir: Option<String>,
    template_dir: Option<PathBuf>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// A single directory name inside the site root.
fn relative_dir(
    value: Option<String>,
    default: &str,
    key: &'static str,
) -> Result<String, LoadError> {
    let value = non_blank(value).unwrap_or_else(|| default.to_string());
    if value == "." || value == ".." || value.contains(['/', '\\']) {
        return Err(LoadError::invalid(
            key,
            format!("`{value}` must be a plain directory name"),
        ));
    }
    Ok(value)
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
