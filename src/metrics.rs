use std::time::{Duration, Instant};

use metrics::{counter, histogram};

use crate::error::{EngagementError, ErrorKind, Result};

/// Metrics collection and management
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    // AI pipeline metrics
    pub ai_requests_total: &'static str,
    pub ai_request_duration: &'static str,
    pub classifications_total: &'static str,
    pub interactions_logged_total: &'static str,

    // Record store metrics
    pub db_operations_total: &'static str,
    pub db_operation_duration: &'static str,
    pub fallback_reads_total: &'static str,

    // Export metrics
    pub export_operations_total: &'static str,
    pub export_rows_total: &'static str,
    pub export_duration: &'static str,

    // Error metrics
    pub errors_total: &'static str,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self {
            ai_requests_total: "engagement_ai_requests_total",
            ai_request_duration: "engagement_ai_request_duration_seconds",
            classifications_total: "engagement_classifications_total",
            interactions_logged_total: "engagement_interactions_logged_total",

            db_operations_total: "engagement_db_operations_total",
            db_operation_duration: "engagement_db_operation_duration_seconds",
            fallback_reads_total: "engagement_store_fallback_reads_total",

            export_operations_total: "engagement_export_operations_total",
            export_rows_total: "engagement_export_rows_total",
            export_duration: "engagement_export_duration_seconds",

            errors_total: "engagement_errors_total",
        }
    }
}

impl MetricsCollector {
    /// Install the no-op recorder when the host did not install one
    pub fn init() -> Result<()> {
        metrics::set_global_recorder(metrics::NoopRecorder)
            .map_err(|e| EngagementError::InvalidConfig(format!("Failed to initialize metrics recorder: {e}")))
    }

    /// Record one AI pipeline call
    pub fn record_ai_request(&self, operation: &'static str, duration: Duration, outcome: &'static str) {
        counter!(self.ai_requests_total, "operation" => operation, "outcome" => outcome).increment(1);
        histogram!(self.ai_request_duration, "operation" => operation).record(duration.as_secs_f64());
    }

    /// Record the suggested value of a comment classification
    pub fn record_classification(&self, classification: &'static str) {
        counter!(self.classifications_total, "classification" => classification).increment(1);
    }

    /// Record one appended interaction history entry
    pub fn record_interaction_logged(&self, success: bool) {
        let status = if success { "success" } else { "failure" };
        counter!(self.interactions_logged_total, "status" => status).increment(1);
    }

    /// Record database operation metrics
    pub fn record_db_operation(&self, operation: &'static str, duration: Duration, success: bool) {
        let status = if success { "success" } else { "error" };
        counter!(self.db_operations_total, "operation" => operation, "status" => status).increment(1);
        histogram!(self.db_operation_duration, "operation" => operation).record(duration.as_secs_f64());

        if !success {
            counter!(self.errors_total, "kind" => ErrorKind::Storage.as_str(), "operation" => operation)
                .increment(1);
        }
    }

    /// Record a read served by the fallback data source
    pub fn record_fallback_read(&self, collection: &'static str) {
        counter!(self.fallback_reads_total, "collection" => collection).increment(1);
    }

    /// Record export operation metrics
    pub fn record_export_operation(&self, format: &'static str, rows: usize, duration: Duration) {
        counter!(self.export_operations_total, "format" => format).increment(1);
        counter!(self.export_rows_total, "format" => format).increment(rows as u64);
        histogram!(self.export_duration, "format" => format).record(duration.as_secs_f64());
    }

    /// Record error metrics
    pub fn record_error(&self, kind: ErrorKind, operation: &'static str) {
        counter!(self.errors_total, "kind" => kind.as_str(), "operation" => operation).increment(1);
    }
}

/// Times one AI pipeline call and records its outcome
pub struct MetricsTimer {
    collector: MetricsCollector,
    operation: &'static str,
    start: Instant,
}

impl MetricsTimer {
    #[must_use]
    pub fn new(collector: MetricsCollector, operation: &'static str) -> Self {
        Self {
            collector,
            operation,
            start: Instant::now(),
        }
    }

    /// Record duration and outcome; errors are also counted by kind
    pub fn finish<T>(self, result: &Result<T>) -> Duration {
        let duration = self.start.elapsed();
        match result {
            Ok(_) => self.collector.record_ai_request(self.operation, duration, "success"),
            Err(e) => {
                self.collector.record_ai_request(self.operation, duration, e.kind().as_str());
                self.collector.record_error(e.kind(), self.operation);
            }
        }
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::default();
        assert_eq!(collector.fallback_reads_total, "engagement_store_fallback_reads_total");
    }

    #[test]
    fn timer_reports_elapsed_time_for_failures() {
        let timer = MetricsTimer::new(MetricsCollector::default(), "generate_response");
        let result: Result<()> = Err(EngagementError::malformed("bad"));
        let elapsed = timer.finish(&result);
        assert!(elapsed < Duration::from_secs(5));
    }
}
