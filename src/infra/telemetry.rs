use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_gauge!(
            "docsmith_pending_triggers",
            Unit::Count,
            "Unprocessed build triggers seen by the last drain."
        );
        describe_counter!(
            "docsmith_build_passes_total",
            Unit::Count,
            "Build passes finished, labelled by result."
        );
        describe_histogram!(
            "docsmith_build_pass_ms",
            Unit::Milliseconds,
            "Build pass latency in milliseconds, lock wait included."
        );
        describe_counter!(
            "docsmith_tool_attempts_total",
            Unit::Count,
            "Install and build command attempts, labelled by step and result."
        );
        describe_counter!(
            "docsmith_materialize_files_written_total",
            Unit::Count,
            "Site files written because their content changed."
        );
        describe_counter!(
            "docsmith_materialize_files_skipped_total",
            Unit::Count,
            "Site files left untouched because their content was unchanged."
        );
    });
}
