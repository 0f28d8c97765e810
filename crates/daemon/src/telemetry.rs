//! Telemetry setup for OpenTelemetry integration
//!
//! Enabled by the `telemetry` cargo feature and `OTEL_EXPORTER_OTLP_ENDPOINT`.
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (e.g., http://localhost:4317)
//! - `OTEL_SERVICE_NAME`: Service name (default: enrollment-engine)

use anyhow::Result;
use tracing_subscriber::{Layer, Registry};

const ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Build the OpenTelemetry tracing layer if configured
///
/// Runs before the subscriber exists, so problems are reported on stderr.
pub fn layer() -> Result<Option<Box<dyn Layer<Registry> + Send + Sync>>> {
    let Ok(endpoint) = std::env::var(ENDPOINT_ENV) else {
        return Ok(None);
    };

    #[cfg(feature = "telemetry")]
    {
        otlp_layer(&endpoint).map(Some)
    }

    #[cfg(not(feature = "telemetry"))]
    {
        eprintln!(
            "{} is set to {} but the 'telemetry' feature is not enabled; rebuild with --features telemetry",
            ENDPOINT_ENV, endpoint
        );
        Ok(None)
    }
}

#[cfg(feature = "telemetry")]
fn otlp_layer(endpoint: &str) -> Result<Box<dyn Layer<Registry> + Send + Sync>> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::{SpanExporter, WithExportConfig};
    use opentelemetry_sdk::{runtime, trace::TracerProvider, Resource};

    let service_name =
        std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "enrollment-engine".to_string());

    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            service_name.clone(),
        )]))
        .build();
    let tracer = provider.tracer(service_name);
    opentelemetry::global::set_tracer_provider(provider);

    Ok(tracing_opentelemetry::layer().with_tracer(tracer).boxed())
}

/// Flush pending spans on shutdown
pub fn shutdown() {
    #[cfg(feature = "telemetry")]
    opentelemetry::global::shutdown_tracer_provider();
}
