use std::env;

#[cfg(feature = "opentelemetry-otlp")]
use opentelemetry_otlp as otlp;
#[cfg(feature = "opentelemetry-otlp")]
use opentelemetry_sdk as sdk;
use tracing::{debug, dispatcher, Subscriber};
#[cfg(feature = "opentelemetry-otlp")]
use tracing_subscriber::Layer;
use tracing_subscriber::{
    layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Registry,
};

const KEY_LOG: &str = "RUST_LOG";
const KEY_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
const KEY_SERVICE_NAME: &str = "OTEL_SERVICE_NAME";

/// Installs the global subscriber, exporting to OTLP when an endpoint is configured.
///
/// Calling it again after a subscriber has been installed is a no-op.
pub fn init_once() {
    init_once_with_default(true)
}

/// Installs the global subscriber with `RUST_LOG=INFO` unless the filter is already set.
///
/// With `export` unset the OTLP exporters stay off even if an endpoint is configured.
pub fn init_once_with_default(export: bool) {
    if dispatcher::has_been_set() {
        return;
    }

    if env::var_os(KEY_LOG).is_none() {
        env::set_var(KEY_LOG, "INFO");
    }
    if env::var_os(KEY_SERVICE_NAME).is_none() {
        env::set_var(KEY_SERVICE_NAME, env!("CARGO_CRATE_NAME"));
    }

    let registry = Registry::default()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer());

    let is_exporter_activated = env::var_os(KEY_OTLP_ENDPOINT).is_some();
    if export && is_exporter_activated {
        init_with_exporters(registry)
    } else {
        registry.init();
        if export {
            debug!("OTEL exporter is not activated.");
        }
    }
}

#[cfg(not(feature = "opentelemetry-otlp"))]
fn init_with_exporters<S>(registry: S)
where
    S: Subscriber + for<'span> LookupSpan<'span> + Send + Sync + 'static,
{
    registry.init();
    debug!("OTEL exporter is requested, but the crate is built without OTLP support.");
}

#[cfg(feature = "opentelemetry-otlp")]
fn init_with_exporters<S>(registry: S)
where
    S: Subscriber + for<'span> LookupSpan<'span> + Send + Sync + 'static,
{
    #[allow(unused_mut)]
    let mut failures = Vec::new();

    #[cfg(feature = "opentelemetry-logs")]
    let registry = registry.with(enable(&mut failures, "log", otlp_logger()));
    #[cfg(feature = "opentelemetry-metrics")]
    let registry = registry.with(enable(&mut failures, "metric", otlp_metrics()));
    #[cfg(feature = "opentelemetry-trace")]
    let registry = registry.with(enable(&mut failures, "span", otlp_tracer()));

    registry.init();
    for failure in failures {
        ::tracing::warn!("{failure}");
    }
}

// A broken exporter disables its own pillar only; the rest of the subscriber still comes up.
#[cfg(feature = "opentelemetry-otlp")]
#[allow(dead_code)]
fn enable<L>(failures: &mut Vec<String>, name: &str, layer: ::anyhow::Result<L>) -> Option<L> {
    match layer {
        Ok(layer) => Some(layer),
        Err(error) => {
            failures.push(format!("failed to init an OTLP {name} exporter: {error}"));
            None
        }
    }
}

#[cfg(all(feature = "opentelemetry-otlp", feature = "opentelemetry-logs"))]
fn otlp_logger<S>() -> ::anyhow::Result<impl Layer<S>>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let exporter = otlp::LogExporter::builder().with_tonic().build()?;
    let provider = sdk::logs::LoggerProvider::builder()
        .with_batch_exporter(exporter, sdk::runtime::Tokio)
        .build();

    Ok(::opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new(&provider))
}

#[cfg(all(feature = "opentelemetry-otlp", feature = "opentelemetry-metrics"))]
fn otlp_metrics<S>() -> ::anyhow::Result<impl Layer<S>>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let exporter = otlp::MetricExporter::builder().with_tonic().build()?;
    let reader = sdk::metrics::PeriodicReader::builder(exporter, sdk::runtime::Tokio).build();
    let provider = sdk::metrics::MeterProviderBuilder::default()
        .with_reader(reader)
        .build();

    Ok(::tracing_opentelemetry::MetricsLayer::new(provider))
}

#[cfg(all(feature = "opentelemetry-otlp", feature = "opentelemetry-trace"))]
fn otlp_tracer<S>() -> ::anyhow::Result<impl Layer<S>>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    use opentelemetry::trace::TracerProvider;

    let name = env::var(KEY_SERVICE_NAME).unwrap_or_else(|_| env!("CARGO_CRATE_NAME").into());
    let exporter = otlp::SpanExporter::builder().with_tonic().build()?;
    let provider = sdk::trace::TracerProvider::builder()
        .with_batch_exporter(exporter, sdk::runtime::Tokio)
        .build();

    Ok(::tracing_opentelemetry::OpenTelemetryLayer::new(
        provider.tracer(name),
    ))
}
