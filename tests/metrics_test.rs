//! Tests for metrics.rs; recording must never fail, with or without a recorder

use std::time::Duration;

use engagement_ai::error::{EngagementError, ErrorKind, Result};
use engagement_ai::metrics::{MetricsCollector, MetricsTimer};

#[test]
fn test_metrics_collector_default_names() {
    let collector = MetricsCollector::default();
    assert_eq!(collector.ai_requests_total, "engagement_ai_requests_total");
    assert_eq!(collector.interactions_logged_total, "engagement_interactions_logged_total");
    assert_eq!(collector.errors_total, "engagement_errors_total");
}

#[test]
fn test_metric_names_share_prefix() {
    let collector = MetricsCollector::default();
    for name in [
        collector.ai_requests_total,
        collector.ai_request_duration,
        collector.classifications_total,
        collector.db_operations_total,
        collector.db_operation_duration,
        collector.fallback_reads_total,
        collector.export_operations_total,
        collector.export_rows_total,
        collector.export_duration,
    ] {
        assert!(name.starts_with("engagement_"), "unexpected metric name: {name}");
    }
}

#[test]
fn test_metrics_initialization_only_once() {
    assert!(MetricsCollector::init().is_ok());
    let err = MetricsCollector::init().expect_err("recorder already installed");
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_record_pipeline_metrics() {
    let collector = MetricsCollector::default();
    collector.record_ai_request("generate_response", Duration::from_millis(900), "success");
    collector.record_classification("approved");
    collector.record_interaction_logged(true);
    collector.record_interaction_logged(false);
}

#[test]
fn test_record_store_metrics() {
    let collector = MetricsCollector::default();
    collector.record_db_operation("get_unit", Duration::from_millis(3), true);
    collector.record_db_operation("append_interaction", Duration::from_millis(7), false);
    collector.record_fallback_read("unit");
}

#[test]
fn test_record_export_operation() {
    let collector = MetricsCollector::default();
    collector.record_export_operation("csv", 120, Duration::from_millis(40));
    collector.record_export_operation("json", 0, Duration::ZERO);
}

#[test]
fn test_record_every_error_kind() {
    let collector = MetricsCollector::default();
    for kind in [
        ErrorKind::NotFound,
        ErrorKind::TransportFailure,
        ErrorKind::MalformedModelOutput,
        ErrorKind::ValidationError,
        ErrorKind::Storage,
        ErrorKind::Configuration,
    ] {
        collector.record_error(kind, "test");
    }
}

#[test]
fn test_metrics_timer_success() {
    let timer = MetricsTimer::new(MetricsCollector::default(), "classify_comment");
    std::thread::sleep(Duration::from_millis(5));
    let result: Result<u8> = Ok(1);
    let elapsed = timer.finish(&result);
    assert!(elapsed >= Duration::from_millis(5));
}

#[test]
fn test_metrics_timer_failure() {
    let timer = MetricsTimer::new(MetricsCollector::default(), "recommendations");
    let result: Result<()> = Err(EngagementError::Cancelled);
    let elapsed = timer.finish(&result);
    assert!(elapsed < Duration::from_secs(5));
}
