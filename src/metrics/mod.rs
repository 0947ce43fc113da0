//! Metrics collection for observability

use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_with_registry, Counter, CounterVec, Histogram, Opts, Registry,
};
use std::sync::Arc;
use once_cell::sync::Lazy;

/// Global metrics registry
pub static METRICS: Lazy<Arc<Metrics>> = Lazy::new(|| {
    Arc::new(Metrics::new().expect("Failed to initialize metrics"))
});

/// Metrics collector
pub struct Metrics {
    registry: Registry,

    // Token budget metrics
    pub token_budget_used: Histogram,
    pub token_budget_remaining: Histogram,
    pub token_budget_overflows: Counter,

    // History window metrics
    pub history_truncations: Counter,
    pub history_dropped_messages: Counter,

    // Summarization metrics
    pub summaries_due: CounterVec,

    // Store metrics
    pub checkpoint_read_fallbacks: Counter,
    pub history_read_failures: Counter,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let token_budget_used = register_histogram_with_registry!(
            "token_budget_used",
            "Estimated prompt tokens per assembled turn",
            registry
        )?;

        let token_budget_remaining = register_histogram_with_registry!(
            "token_budget_remaining",
            "Tokens left in the context window per assembled turn",
            registry
        )?;

        let token_budget_overflows = register_counter_with_registry!(
            Opts::new("token_budget_overflows_total", "Turns whose prompt exceeded the context window"),
            registry
        )?;

        let history_truncations = register_counter_with_registry!(
            Opts::new("history_truncations_total", "Turns that dropped older history"),
            registry
        )?;

        let history_dropped_messages = register_counter_with_registry!(
            Opts::new("history_dropped_messages_total", "Messages left out of the live prompt"),
            registry
        )?;

        let summaries_due = register_counter_vec_with_registry!(
            Opts::new("summaries_due_total", "Turns that flagged summarization"),
            &["reason"],
            registry
        )?;

        let checkpoint_read_fallbacks = register_counter_with_registry!(
            Opts::new(
                "checkpoint_read_fallbacks_total",
                "Checkpoint reads that failed and defaulted to no summary"
            ),
            registry
        )?;

        let history_read_failures = register_counter_with_registry!(
            Opts::new("history_read_failures_total", "Failed or timed out history reads"),
            registry
        )?;

        Ok(Self {
            registry,
            token_budget_used,
            token_budget_remaining,
            token_budget_overflows,
            history_truncations,
            history_dropped_messages,
            summaries_due,
            checkpoint_read_fallbacks,
            history_read_failures,
        })
    }

    /// Get the metrics registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record token usage of an assembled turn
    pub fn record_turn(&self, used: usize, remaining: usize, overflow: bool, dropped: usize) {
        self.token_budget_used.observe(used as f64);
        self.token_budget_remaining.observe(remaining as f64);
        if overflow {
            self.token_budget_overflows.inc();
        }
        if dropped > 0 {
            self.history_truncations.inc();
            self.history_dropped_messages.inc_by(dropped as f64);
        }
    }

    /// Record that a turn flagged summarization
    pub fn record_summary_due(&self, reason: &str) {
        self.summaries_due.with_label_values(&[reason]).inc();
    }

    /// Record a checkpoint read that fell back to "no summary"
    pub fn record_checkpoint_fallback(&self) {
        self.checkpoint_read_fallbacks.inc();
    }

    /// Record a failed history read
    pub fn record_history_read_failure(&self) {
        self.history_read_failures.inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let metrics = Metrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_record_turn() {
        let metrics = Metrics::new().unwrap();
        metrics.record_turn(3000, 1000, false, 0);
        metrics.record_turn(4200, 0, true, 3);
        assert_eq!(metrics.token_budget_overflows.get(), 1.0);
        assert_eq!(metrics.history_truncations.get(), 1.0);
        assert_eq!(metrics.history_dropped_messages.get(), 3.0);
    }

    #[test]
    fn test_export_contains_recorded_series() {
        let metrics = Metrics::new().unwrap();
        metrics.record_summary_due("interval");
        metrics.record_checkpoint_fallback();
        let exported = metrics.export_prometheus();
        assert!(exported.contains("summaries_due_total{reason=\"interval\"} 1"));
        assert!(exported.contains("checkpoint_read_fallbacks_total 1"));
    }
}
