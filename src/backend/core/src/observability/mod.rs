//! Observability: Distributed Tracing, Metrics, and Logging.

use opentelemetry::trace::TraceContextExt;
use opentelemetry::Context;
use opentelemetry_otlp::WithExportConfig;
use tracing::Subscriber;
use tracing_subscriber::{
    layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
};

use crate::config::ObservabilityConfig;

/// Initialize the observability stack.
///
/// `RUST_LOG` wins over the configured log level when set.
pub fn init(config: &ObservabilityConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if let Some(endpoint) = config.otlp_endpoint.as_deref() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(
                opentelemetry_otlp::new_exporter()
                    .tonic()
                    .with_endpoint(endpoint),
            )
            .with_trace_config(
                opentelemetry_sdk::trace::config()
                    .with_resource(opentelemetry_sdk::Resource::new(vec![
                        opentelemetry::KeyValue::new("service.name", config.service_name.clone()),
                    ])),
            )
            .install_batch(opentelemetry_sdk::runtime::Tokio)?;

        let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);

        tracing_subscriber::registry()
            .with(filter)
            .with(telemetry_layer)
            .with(fmt_layer(config.json_logs))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer(config.json_logs))
            .try_init()?;
    }

    Ok(())
}

fn fmt_layer<S>(json: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    if json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().pretty().boxed()
    }
}

/// Shutdown OpenTelemetry.
pub fn shutdown() {
    opentelemetry::global::shutdown_tracer_provider();
}

/// Current trace ID, when an OpenTelemetry span is active.
pub fn current_trace_id() -> Option<String> {
    let ctx = Context::current();
    let span = ctx.span();
    let span_ctx = span.span_context();

    if span_ctx.is_valid() {
        Some(span_ctx.trace_id().to_string())
    } else {
        None
    }
}

/// Metrics registry and helpers.
pub mod metrics {
    use metrics::{counter, describe_counter, describe_histogram, histogram};
    use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

    /// Install the global Prometheus recorder and describe every metric.
    pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        register_metrics();
        Ok(handle)
    }

    /// Register all metric descriptions.
    pub fn register_metrics() {
        describe_counter!(
            "backoffice_requests_total",
            "Pipeline dispatches by operation and response status"
        );
        describe_counter!(
            "backoffice_errors_total",
            "Errors rendered to callers by code and category"
        );
        describe_counter!(
            "auth_errors_total",
            "Rejected authentication attempts"
        );
        describe_counter!(
            "auth_success_total",
            "Successful authentications by method"
        );
        describe_histogram!(
            "backoffice_request_duration_seconds",
            "Pipeline dispatch duration in seconds"
        );
    }

    /// Record one pipeline dispatch.
    pub fn record_request(operation: &'static str, status: u16, duration_secs: f64) {
        counter!(
            "backoffice_requests_total",
            "operation" => operation,
            "status" => status.to_string(),
        )
        .increment(1);
        histogram!("backoffice_request_duration_seconds", "operation" => operation).record(duration_secs);
    }
}
