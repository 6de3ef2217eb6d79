use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub bookings_total: IntCounterVec,
    pub fare_estimate_total: Histogram,
    pub tracking_sessions_active: IntGauge,
    pub tracking_ticks_total: IntCounterVec,
    pub geocode_requests_total: IntCounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let bookings_total = IntCounterVec::new(
            Opts::new("bookings_total", "Booking confirmations by outcome"),
            &["outcome"],
        )
        .expect("valid bookings_total metric");

        let fare_estimate_total = Histogram::with_opts(
            HistogramOpts::new("fare_estimate_total", "Estimated fare totals in currency units")
                .buckets(vec![
                    75.0, 100.0, 150.0, 200.0, 300.0, 500.0, 750.0, 1000.0, 2000.0,
                ]),
        )
        .expect("valid fare_estimate_total metric");

        let tracking_sessions_active = IntGauge::new(
            "tracking_sessions_active",
            "Tracking sessions currently being ticked",
        )
        .expect("valid tracking_sessions_active metric");

        let tracking_ticks_total = IntCounterVec::new(
            Opts::new("tracking_ticks_total", "Tracking ticks by outcome"),
            &["outcome"],
        )
        .expect("valid tracking_ticks_total metric");

        let geocode_requests_total = IntCounterVec::new(
            Opts::new("geocode_requests_total", "Address lookups by outcome"),
            &["outcome"],
        )
        .expect("valid geocode_requests_total metric");

        registry
            .register(Box::new(bookings_total.clone()))
            .expect("register bookings_total");
        registry
            .register(Box::new(fare_estimate_total.clone()))
            .expect("register fare_estimate_total");
        registry
            .register(Box::new(tracking_sessions_active.clone()))
            .expect("register tracking_sessions_active");
        registry
            .register(Box::new(tracking_ticks_total.clone()))
            .expect("register tracking_ticks_total");
        registry
            .register(Box::new(geocode_requests_total.clone()))
            .expect("register geocode_requests_total");

        Self {
            registry,
            bookings_total,
            fare_estimate_total,
            tracking_sessions_active,
            tracking_ticks_total,
            geocode_requests_total,
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
