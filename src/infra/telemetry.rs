use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    application::{
        comments::METRIC_COMMENTS_SUBMITTED,
        revalidate::{
            METRIC_PAGE_CACHE_HIT, METRIC_PAGE_CACHE_MISS, METRIC_PAGE_CACHE_STALE,
            METRIC_REGENERATION_FAILURES, METRIC_REGENERATION_MS, METRIC_REGENERATIONS,
        },
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
            METRIC_PAGE_CACHE_HIT,
            Unit::Count,
            "Article pages served fresh from the page store."
        );
        describe_counter!(
            METRIC_PAGE_CACHE_STALE,
            Unit::Count,
            "Article pages served stale while a refresh runs."
        );
        describe_counter!(
            METRIC_PAGE_CACHE_MISS,
            Unit::Count,
            "Article pages generated while the visitor waited."
        );
        describe_counter!(
            METRIC_REGENERATIONS,
            Unit::Count,
            "Successful page regenerations."
        );
        describe_counter!(
            METRIC_REGENERATION_FAILURES,
            Unit::Count,
            "Page regenerations that failed and left the previous artifact in place."
        );
        describe_histogram!(
            METRIC_REGENERATION_MS,
            Unit::Milliseconds,
            "Time spent querying and rendering one page."
        );
        describe_counter!(
            METRIC_COMMENTS_SUBMITTED,
            Unit::Count,
            "Comments accepted for moderation."
        );
    });
}
