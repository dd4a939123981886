/// Prometheus metrics for performance issue detection
///
/// Tracks how many events were analysed, what the detectors found and how
/// long detection took.
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::detection::{DetectionError, DetectionReport};

/// Metrics registry for the detection engine
pub struct DetectionMetrics {
    registry: Registry,

    // Outcomes
    pub events_analyzed_total: IntCounterVec,
    pub detector_outcomes_total: IntCounterVec,
    pub issues_aggregate_total: IntCounterVec,
    pub issues_detected_total: IntCounterVec,
    pub issues_by_op_total: IntCounterVec,

    // Error Tracking
    pub detection_failures_total: IntCounterVec,

    // Latency
    pub detection_duration: HistogramVec,
}

impl DetectionMetrics {
    /// Create a new registry with all detection counters registered
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let events_analyzed_total = IntCounterVec::new(
            Opts::new("performance_events_analyzed_total", "Total number of events analysed"),
            &["detected"]
        )?;

        let detector_outcomes_total = IntCounterVec::new(
            Opts::new("performance_detector_outcomes_total", "Events analysed per detector, by whether it found anything"),
            &["detected", "detector"]
        )?;

        let issues_aggregate_total = IntCounterVec::new(
            Opts::new("performance_issues_aggregate_total", "Total number of performance issues across all detectors"),
            &["source"]
        )?;

        let issues_detected_total = IntCounterVec::new(
            Opts::new("performance_issues_detected_total", "Total number of performance issues by detector"),
            &["detector"]
        )?;

        let issues_by_op_total = IntCounterVec::new(
            Opts::new("performance_issue_ops_total", "Detections by detector and matched span op"),
            &["detector", "op"]
        )?;

        let detection_failures_total = IntCounterVec::new(
            Opts::new("performance_detection_failures_total", "Detection passes that failed and were discarded"),
            &["error_type"]
        )?;

        let detection_duration = HistogramVec::new(
            HistogramOpts::new(
                "performance_detection_duration_seconds",
                "Time spent running all detectors over one event"
            ).buckets(vec![0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1]),
            &["outcome"]
        )?;

        registry.register(Box::new(events_analyzed_total.clone()))?;
        registry.register(Box::new(detector_outcomes_total.clone()))?;
        registry.register(Box::new(issues_aggregate_total.clone()))?;
        registry.register(Box::new(issues_detected_total.clone()))?;
        registry.register(Box::new(issues_by_op_total.clone()))?;
        registry.register(Box::new(detection_failures_total.clone()))?;
        registry.register(Box::new(detection_duration.clone()))?;

        info!("Prometheus detection metrics registry initialized");

        Ok(Self {
            registry,
            events_analyzed_total,
            detector_outcomes_total,
            issues_aggregate_total,
            issues_detected_total,
            issues_by_op_total,
            detection_failures_total,
            detection_duration,
        })
    }

    /// Export metrics in Prometheus text format
    pub fn export_metrics(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer)
            .map_err(|e| prometheus::Error::Msg(format!("UTF-8 encoding error: {}", e)))
    }

    /// Record the findings of a successful pass
    pub fn record_report(&self, report: &DetectionReport, elapsed: Duration) {
        let detected = report.has_detected_issues();
        self.events_analyzed_total
            .with_label_values(&[if detected { "true" } else { "false" }])
            .inc();
        self.detection_duration
            .with_label_values(&["success"])
            .observe(elapsed.as_secs_f64());

        for (detector, found) in report.detected_flags() {
            self.detector_outcomes_total
                .with_label_values(&[if found { "true" } else { "false" }, detector.as_str()])
                .inc();
        }

        if !detected {
            return;
        }

        self.issues_aggregate_total
            .with_label_values(&["all"])
            .inc_by(report.all_issue_count() as u64);

        for findings in report.findings.iter().filter(|findings| !findings.issues.is_empty()) {
            self.issues_detected_total
                .with_label_values(&[findings.detector.as_str()])
                .inc_by(findings.issues.len() as u64);
        }
        for (detector, ops) in report.detected_ops() {
            for op in ops {
                self.issues_by_op_total
                    .with_label_values(&[detector.as_str(), op])
                    .inc();
            }
        }
    }

    /// Record a pass whose results were discarded
    pub fn record_failure(&self, error: &DetectionError, elapsed: Duration) {
        let error_type = match error {
            DetectionError::InvalidSettings { .. } => "invalid_settings",
            DetectionError::PassFailed { .. } => "pass_failed",
        };
        self.detection_failures_total
            .with_label_values(&[error_type])
            .inc();
        self.detection_duration
            .with_label_values(&["failure"])
            .observe(elapsed.as_secs_f64());
    }
}

/// Shared handle, cheap to clone across worker threads
pub fn init_metrics() -> Result<Arc<DetectionMetrics>, prometheus::Error> {
    Ok(Arc::new(DetectionMetrics::new()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{detect_performance_issues, DetectionSettings};
    use crate::event::{Event, Span};

    #[test]
    fn test_metrics_export_contains_detector_counts() {
        let metrics = DetectionMetrics::new().unwrap();
        let spans: Vec<Span> = (0..5)
            .map(|i| {
                let start = 10.0 + i as f64;
                Span::new(&format!("s{}", i), "db", start, start + 0.11).with_description("SELECT 1")
            })
            .collect();
        let event = Event::new("abc", 10.0, spans);
        let report = detect_performance_issues(&event, &DetectionSettings::default());

        metrics.record_report(&report, Duration::from_micros(120));
        let exported = metrics.export_metrics().unwrap();

        assert!(exported.contains("performance_events_analyzed_total{detected=\"true\"} 1"));
        assert!(exported.contains("performance_issues_detected_total{detector=\"duplicates\"} 1"));
        assert!(exported.contains("performance_issue_ops_total{detector=\"duplicates\",op=\"db\"} 1"));
        assert!(exported.contains("performance_issues_aggregate_total{source=\"all\"} 1"));
    }

    #[test]
    fn test_every_detector_reports_its_outcome() {
        let metrics = DetectionMetrics::new().unwrap();
        let quiet = Event::new("quiet", 10.0, vec![Span::new("s", "db", 10.0, 10.1).with_description("SELECT 1")]);
        let slow = Event::new("slow", 10.0, vec![Span::new("s", "db", 10.0, 12.0).with_description("SELECT 1")]);
        let settings = DetectionSettings::default();

        metrics.record_report(&detect_performance_issues(&quiet, &settings), Duration::from_micros(10));
        metrics.record_report(&detect_performance_issues(&slow, &settings), Duration::from_micros(10));
        let exported = metrics.export_metrics().unwrap();

        assert!(exported.contains("performance_detector_outcomes_total{detected=\"false\",detector=\"slow_span\"} 1"));
        assert!(exported.contains("performance_detector_outcomes_total{detected=\"true\",detector=\"slow_span\"} 1"));
        assert!(exported.contains("performance_detector_outcomes_total{detected=\"false\",detector=\"duplicates\"} 2"));
        assert!(exported.contains("performance_detector_outcomes_total{detected=\"false\",detector=\"render_blocking_assets\"} 2"));
        assert!(exported.contains("performance_events_analyzed_total{detected=\"false\"} 1"));
    }

    #[test]
    fn test_failures_are_counted() {
        let metrics = DetectionMetrics::new().unwrap();
        let error = DetectionError::PassFailed {
            event_id: "abc".to_string(),
            message: "boom".to_string(),
        };
        metrics.record_failure(&error, Duration::from_micros(5));
        metrics.record_failure(&error, Duration::from_micros(5));

        let exported = metrics.export_metrics().unwrap();
        assert!(exported.contains("performance_detection_failures_total{error_type=\"pass_failed\"} 2"));
    }
}
