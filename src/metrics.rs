use std::time::{Duration, Instant};

use anyhow::Result;
use opentelemetry::{
    metrics::{Counter, Histogram},
    KeyValue,
};
use opentelemetry_sdk::metrics::SdkMeterProvider;

pub fn low_latency_boundaries() -> Vec<f64> {
    vec![
        0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0,
        250.0, 500.0, 750.0, 1000.0,
    ]
}

/// Installs the global meter provider backed by a prometheus registry and
/// returns the registry for the /metrics endpoint.
pub fn init_provider() -> Result<prometheus::Registry> {
    let registry = prometheus::Registry::new();
    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;
    let provider = SdkMeterProvider::builder().with_reader(exporter).build();
    opentelemetry::global::set_meter_provider(provider);
    Ok(registry)
}

pub struct ControllerMetrics {
    pub reconciliations: Counter<u64>,
    pub reconcile_latency: Histogram<f64>,
    pub resyncs: Counter<u64>,
}

impl Default for ControllerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerMetrics {
    pub fn new() -> Self {
        let meter = opentelemetry::global::meter("controller_metrics");
        let reconciliations = meter
            .u64_counter("dispatch.reconciliations")
            .with_description("number of entity reconciliations dispatched")
            .build();
        let reconcile_latency = meter
            .f64_histogram("dispatch.reconcile_latency")
            .with_unit("s")
            .with_boundaries(low_latency_boundaries())
            .with_description("entity reconciliation latency in seconds")
            .build();
        let resyncs = meter
            .u64_counter("dispatch.resyncs")
            .with_description("number of resync sweeps")
            .build();
        Self {
            reconciliations,
            reconcile_latency,
            resyncs,
        }
    }
}

pub mod api_io_stats {
    use opentelemetry::metrics::Counter;

    #[derive(Debug)]
    pub struct Metrics {
        pub function_writes: Counter<u64>,
        pub run_submissions: Counter<u64>,
    }

    impl Default for Metrics {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Metrics {
        pub fn new() -> Metrics {
            let meter = opentelemetry::global::meter("service-api");
            let function_writes = meter
                .u64_counter("dispatch.function_writes")
                .with_description("number of function create/update/delete requests")
                .build();
            let run_submissions = meter
                .u64_counter("dispatch.run_submissions")
                .with_description("number of function run submissions")
                .build();
            Metrics {
                function_writes,
                run_submissions,
            }
        }
    }
}

pub trait TimerUpdate {
    fn add(&self, duration: Duration, labels: &[KeyValue]);
}

impl TimerUpdate for Histogram<f64> {
    fn add(&self, duration: Duration, labels: &[KeyValue]) {
        self.record(duration.as_secs_f64(), labels);
    }
}

pub struct Timer<'a, T: TimerUpdate + Sync> {
    start: Instant,
    metric: &'a T,
    labels: &'a [KeyValue],
}

impl<'a, T: TimerUpdate + Sync> Timer<'a, T> {
    pub fn start_with_labels(metric: &'a T, labels: &'a [KeyValue]) -> Self {
        Self {
            start: Instant::now(),
            metric,
            labels,
        }
    }
}

impl<T: TimerUpdate + Sync> Drop for Timer<'_, T> {
    fn drop(&mut self) {
        self.metric.add(self.start.elapsed(), self.labels);
    }
}
