use std::time::Duration;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::{Protocol, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub type Result<T> = core::result::Result<T, Box<dyn std::error::Error>>;

pub const SERVICE_NAME: &str = "streakboard";
pub const TRACER_NAME: &str = "streakboard-tracer";
pub const DEFAULT_FILTER: &str = "streakboard=info,sqlx=warn,warn";

/// Owns the OTLP tracer provider (if one was configured) so it can be flushed on exit.
#[derive(Debug)]
pub struct Telemetry {
    tracer_provider: Option<SdkTracerProvider>,
}

impl Telemetry {
    /// Installs the global subscriber: env filter (`RUST_LOG`) and console output to stderr,
    /// plus span export over OTLP/gRPC when a collector endpoint is given.
    pub fn init(collector_url: Option<&str>) -> Result<Self> {
        let tracer_provider = collector_url.map(build_tracer_provider).transpose()?;
        let trace_layer = tracer_provider.as_ref().map(|provider| {
            tracing_opentelemetry::layer().with_tracer(provider.tracer(TRACER_NAME))
        });

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        tracing_subscriber::registry()
            .with(trace_layer)
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;

        tracing::debug!(
            otlp_enabled = tracer_provider.is_some(),
            "telemetry registered"
        );

        Ok(Self { tracer_provider })
    }

    pub fn shutdown(self) {
        let Some(provider) = self.tracer_provider else {
            return;
        };

        if let Err(e) = provider.shutdown() {
            eprintln!("error during tracing shutdown: {e:?}");
        }
    }
}

pub fn build_tracer_provider(collector_url: &str) -> Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_protocol(Protocol::Grpc)
        .with_endpoint(collector_url)
        .with_timeout(Duration::from_secs(5))
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(base_attrs(SERVICE_NAME, env!("CARGO_PKG_VERSION")))
        .build();

    global::set_tracer_provider(provider.clone());

    Ok(provider)
}

fn base_attrs(name: &'static str, version: &'static str) -> Resource {
    Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", name),
            KeyValue::new("service.version", version),
        ])
        .build()
}
