//! Prometheus counters served at `/metrics`.
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

pub const OUTCOME_APPLIED: &str = "applied";
pub const OUTCOME_REJECTED: &str = "rejected";
pub const OUTCOME_FAILED: &str = "failed";

/// Counters live in a per-app registry, not the process-global one.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub sessions_created: IntCounter,
    pub posts_registered: IntCounter,
    pub refinements: IntCounterVec,
    pub resets: IntCounter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let sessions_created =
            IntCounter::new("trendpost_sessions_created_total", "Sessions created")?;
        let posts_registered =
            IntCounter::new("trendpost_posts_registered_total", "Generated posts registered")?;
        let refinements = IntCounterVec::new(
            Opts::new("trendpost_refinements_total", "Refinement attempts by outcome"),
            &["outcome"],
        )?;
        let resets = IntCounter::new("trendpost_resets_total", "Post resets")?;

        registry.register(Box::new(sessions_created.clone()))?;
        registry.register(Box::new(posts_registered.clone()))?;
        registry.register(Box::new(refinements.clone()))?;
        registry.register(Box::new(resets.clone()))?;

        Ok(Self {
            registry,
            sessions_created,
            posts_registered,
            refinements,
            resets,
        })
    }

    pub fn refinement(&self, outcome: &str) {
        self.refinements.with_label_values(&[outcome]).inc();
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        encode(&self.registry)
    }
}

pub fn encode(registry: &Registry) -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).to_string())
}
