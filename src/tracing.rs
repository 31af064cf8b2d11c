use anyhow::Result;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{SpanExporter as OtlpSpanExporter, WithExportConfig};
use opentelemetry_sdk::{trace::TracerProviderBuilder, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::config::ServerConfig;

pub fn get_env_filter() -> tracing_subscriber::EnvFilter {
    // RUST_LOG used to control logging level.
    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::default()
            .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
    })
}

pub fn setup_tracing(config: &ServerConfig) -> Result<()> {
    if !config.tracing.enabled {
        let log_layer = tracing_subscriber::fmt::layer()
            .compact()
            .with_filter(get_env_filter());
        tracing_subscriber::registry().with(log_layer).try_init()?;
        return Ok(());
    }

    let mut otlp = OtlpSpanExporter::builder().with_tonic();
    if let Some(endpoint) = &config.tracing.endpoint {
        otlp = otlp.with_endpoint(endpoint);
    }
    let exporter = otlp.build()?;

    let tracer_provider = TracerProviderBuilder::default()
        .with_resource(
            Resource::builder_empty()
                .with_service_name(config.service_name.clone())
                .build(),
        )
        .with_batch_exporter(exporter)
        .build();

    let tracer = tracer_provider.tracer("dispatch-server");
    let tracing_span_layer = tracing_opentelemetry::layer().with_tracer(tracer);
    let log_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_filter(get_env_filter());

    tracing_subscriber::registry()
        .with(tracing_span_layer)
        .with(log_layer)
        .try_init()?;
    Ok(())
}
