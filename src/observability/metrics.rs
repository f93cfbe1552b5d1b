use prometheus::{Encoder, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub fare_quotes_total: IntCounterVec,
    pub snapshots_total: IntCounterVec,
    pub active_subscriptions: IntGaugeVec,
    pub active_trackers: IntGauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let fare_quotes_total = IntCounterVec::new(
            Opts::new("fare_quotes_total", "Fare quotes by vehicle class and outcome"),
            &["vehicle_class", "outcome"],
        )
        .expect("valid fare_quotes_total metric");

        let snapshots_total = IntCounterVec::new(
            Opts::new("snapshots_total", "Delivery snapshots processed by outcome"),
            &["outcome"],
        )
        .expect("valid snapshots_total metric");

        let active_subscriptions = IntGaugeVec::new(
            Opts::new("active_subscriptions", "Open live-feed subscriptions"),
            &["feed"],
        )
        .expect("valid active_subscriptions metric");

        let active_trackers =
            IntGauge::new("active_trackers", "Attached delivery timeline trackers")
                .expect("valid active_trackers metric");

        registry
            .register(Box::new(fare_quotes_total.clone()))
            .expect("register fare_quotes_total");
        registry
            .register(Box::new(snapshots_total.clone()))
            .expect("register snapshots_total");
        registry
            .register(Box::new(active_subscriptions.clone()))
            .expect("register active_subscriptions");
        registry
            .register(Box::new(active_trackers.clone()))
            .expect("register active_trackers");

        Self {
            registry,
            fare_quotes_total,
            snapshots_total,
            active_subscriptions,
            active_trackers,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
