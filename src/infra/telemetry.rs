use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge};
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
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
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

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_gauge!(
            "folio_cache_posts",
            Unit::Count,
            "Number of posts in the current cache snapshot."
        );
        describe_counter!(
            "folio_cache_upsert_total",
            Unit::Count,
            "Total number of posts inserted or replaced in the cache."
        );
        describe_counter!(
            "folio_cache_remove_total",
            Unit::Count,
            "Total number of posts removed from the cache."
        );
        describe_counter!(
            "folio_cache_reload_total",
            Unit::Count,
            "Total number of full cache replacements from a backend load."
        );
        describe_counter!(
            "folio_backend_write_failures_total",
            Unit::Count,
            "Total number of backend writes that failed and left the cache unchanged."
        );
    });
}
