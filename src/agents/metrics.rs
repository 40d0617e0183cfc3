use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, Opts, Registry,
    TextEncoder,
};

use crate::agents::domain::AgentResponse;

/// Prometheus metrics for agent executions, owned by the registry that
/// reports them
pub struct AgentMetrics {
    registry: Registry,

    // Execution metrics
    pub executions_total: CounterVec,
    pub execution_duration: HistogramVec,
    pub executions_in_flight: Gauge,
    pub tokens_total: CounterVec,

    // Agent cache metrics
    pub cache_hits: IntCounter,
    pub cache_misses: IntCounter,

    // History compression
    pub compressions_total: CounterVec,
}

impl AgentMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let executions_total = CounterVec::new(
            Opts::new("agentry_agent_executions_total", "Total agent executions"),
            &["role", "tenant", "status"],
        )?;
        registry.register(Box::new(executions_total.clone()))?;

        let execution_duration = HistogramVec::new(
            HistogramOpts::new(
                "agentry_agent_execution_duration_seconds",
                "Agent execution duration in seconds",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
            &["role", "tenant"],
        )?;
        registry.register(Box::new(execution_duration.clone()))?;

        let executions_in_flight = Gauge::new(
            "agentry_agent_executions_in_flight",
            "Number of agent executions currently running",
        )?;
        registry.register(Box::new(executions_in_flight.clone()))?;

        let tokens_total = CounterVec::new(
            Opts::new("agentry_agent_tokens_total", "Tokens consumed by agent executions"),
            &["role", "tenant", "kind"],
        )?;
        registry.register(Box::new(tokens_total.clone()))?;

        let cache_hits = IntCounter::new("agentry_agent_cache_hits_total", "Agent cache hits")?;
        registry.register(Box::new(cache_hits.clone()))?;

        let cache_misses =
            IntCounter::new("agentry_agent_cache_misses_total", "Agent cache misses")?;
        registry.register(Box::new(cache_misses.clone()))?;

        let compressions_total = CounterVec::new(
            Opts::new(
                "agentry_history_compressions_total",
                "History compressions by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(compressions_total.clone()))?;

        Ok(Self {
            registry,
            executions_total,
            execution_duration,
            executions_in_flight,
            tokens_total,
            cache_hits,
            cache_misses,
            compressions_total,
        })
    }

    /// Record one finished execution, successful or not
    pub fn record_execution(&self, role: &str, tenant: &str, response: &AgentResponse, seconds: f64) {
        let status = response.status.to_string();
        self.executions_total
            .with_label_values(&[role, tenant, &status])
            .inc();
        self.execution_duration
            .with_label_values(&[role, tenant])
            .observe(seconds);
        self.tokens_total
            .with_label_values(&[role, tenant, "prompt"])
            .inc_by(response.usage.prompt_tokens as f64);
        self.tokens_total
            .with_label_values(&[role, tenant, "completion"])
            .inc_by(response.usage.completion_tokens as f64);
    }

    /// Count one execution as in flight until the guard is dropped
    pub fn track_in_flight(&self) -> InFlightGuard {
        self.executions_in_flight.inc();
        InFlightGuard {
            gauge: self.executions_in_flight.clone(),
        }
    }

    pub fn record_compression(&self, outcome: &str) {
        self.compressions_total.with_label_values(&[outcome]).inc();
    }

    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Decrements the in-flight gauge on drop, including when the owning
/// future is cancelled
pub struct InFlightGuard {
    gauge: Gauge,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}
