//! Prometheus-format metrics registry (spec.md 6, "Observability").

use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntGauge, IntGaugeVec, Opts, Registry};

pub struct Metrics {
    pub registry: Registry,
    pub errors_total: IntCounter,
    pub machines: IntGauge,
    pub nodes: IntGauge,
    pub workers: IntGauge,
    pub deployment_replicas: IntGaugeVec,
    pub deployment_available_replicas: IntGaugeVec,
    pub deployment_ready_replicas: IntGaugeVec,
    pub deployment_updated_replicas: IntGaugeVec,
    pub controller_operation_duration_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let errors_total = IntCounter::new("errors_total", "total reconcile errors").unwrap();
        let machines = IntGauge::new("machines", "current number of Machine objects").unwrap();
        let nodes = IntGauge::new("nodes", "current number of joined cluster nodes").unwrap();
        let workers = IntGauge::new("workers", "currently running reconciler workers").unwrap();

        let deployment_replicas = IntGaugeVec::new(
            Opts::new("replicas", "MachineDeployment replica count"),
            &["deployment"],
        )
        .unwrap();
        let deployment_available_replicas = IntGaugeVec::new(
            Opts::new("available_replicas", "MachineDeployment available replica count"),
            &["deployment"],
        )
        .unwrap();
        let deployment_ready_replicas = IntGaugeVec::new(
            Opts::new("ready_replicas", "MachineDeployment ready replica count"),
            &["deployment"],
        )
        .unwrap();
        let deployment_updated_replicas = IntGaugeVec::new(
            Opts::new("updated_replicas", "MachineDeployment updated replica count"),
            &["deployment"],
        )
        .unwrap();

        let controller_operation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "controller_operation_duration_seconds",
                "duration of one reconcile operation",
            ),
            &["operation"],
        )
        .unwrap();

        for collector in [
            Box::new(errors_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(machines.clone()),
            Box::new(nodes.clone()),
            Box::new(workers.clone()),
            Box::new(deployment_replicas.clone()),
            Box::new(deployment_available_replicas.clone()),
            Box::new(deployment_ready_replicas.clone()),
            Box::new(deployment_updated_replicas.clone()),
            Box::new(controller_operation_duration_seconds.clone()),
        ] {
            registry.register(collector).unwrap();
        }

        Self {
            registry,
            errors_total,
            machines,
            nodes,
            workers,
            deployment_replicas,
            deployment_available_replicas,
            deployment_ready_replicas,
            deployment_updated_replicas,
            controller_operation_duration_seconds,
        }
    }

    pub fn record_operation(&self, operation: &str) -> Histogram {
        self.controller_operation_duration_seconds
            .with_label_values(&[operation])
    }

    pub fn render(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&families, &mut buf).unwrap();
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
