use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub order_transitions_total: IntCounterVec,
    pub order_claims_total: IntCounterVec,
    pub order_ratings_total: IntCounter,
    pub owner_rating_recomputations_total: IntCounterVec,
    pub engine_operation_latency_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let order_transitions_total = IntCounterVec::new(
            Opts::new("order_transitions_total", "Applied status transitions"),
            &["from", "to"],
        )
        .expect("valid order_transitions_total metric");

        let order_claims_total = IntCounterVec::new(
            Opts::new("order_claims_total", "Courier claim attempts by outcome"),
            &["outcome"],
        )
        .expect("valid order_claims_total metric");

        let order_ratings_total = IntCounter::new("order_ratings_total", "Ratings stored on orders")
            .expect("valid order_ratings_total metric");

        let owner_rating_recomputations_total = IntCounterVec::new(
            Opts::new(
                "owner_rating_recomputations_total",
                "Owner rating aggregation runs by outcome",
            ),
            &["outcome"],
        )
        .expect("valid owner_rating_recomputations_total metric");

        let engine_operation_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "engine_operation_latency_seconds",
                "Latency of order engine operations in seconds",
            ),
            &["operation", "outcome"],
        )
        .expect("valid engine_operation_latency_seconds metric");

        registry
            .register(Box::new(order_transitions_total.clone()))
            .expect("register order_transitions_total");
        registry
            .register(Box::new(order_claims_total.clone()))
            .expect("register order_claims_total");
        registry
            .register(Box::new(order_ratings_total.clone()))
            .expect("register order_ratings_total");
        registry
            .register(Box::new(owner_rating_recomputations_total.clone()))
            .expect("register owner_rating_recomputations_total");
        registry
            .register(Box::new(engine_operation_latency_seconds.clone()))
            .expect("register engine_operation_latency_seconds");

        Self {
            registry,
            order_transitions_total,
            order_claims_total,
            order_ratings_total,
            owner_rating_recomputations_total,
            engine_operation_latency_seconds,
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

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
