use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    application::{site::METRIC_RENDER_MS, snippet::METRIC_SNIPPET_FETCH_TOTAL},
    cache::{
        METRIC_CACHE_FLUSH_TOTAL, METRIC_PAGE_CACHE_ERROR_TOTAL, METRIC_PAGE_CACHE_HIT_TOTAL,
        METRIC_PAGE_CACHE_MISS_TOTAL,
    },
    config::{LogFormat, LoggingSettings},
};

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
        describe_counter!(
            METRIC_PAGE_CACHE_HIT_TOTAL,
            Unit::Count,
            "Total number of rendered pages served from the page cache."
        );
        describe_counter!(
            METRIC_PAGE_CACHE_MISS_TOTAL,
            Unit::Count,
            "Total number of page cache misses that triggered a render."
        );
        describe_counter!(
            METRIC_PAGE_CACHE_ERROR_TOTAL,
            Unit::Count,
            "Total number of page cache operations that failed or timed out."
        );
        describe_counter!(
            METRIC_CACHE_FLUSH_TOTAL,
            Unit::Count,
            "Total number of full cache flushes after content writes."
        );
        describe_counter!(
            METRIC_SNIPPET_FETCH_TOTAL,
            Unit::Count,
            "Total number of external snippet lookups, labelled by outcome."
        );
        describe_histogram!(
            METRIC_RENDER_MS,
            Unit::Milliseconds,
            "Template render latency in milliseconds."
        );
    });
}
