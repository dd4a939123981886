use super::detector::{Detector, PerformanceDetector};
use super::orchestrator::detect_performance_issues;
use super::settings::{DetectionSettings, DetectorType};
use crate::event::{Event, Span};

fn page_load() -> Event {
    let spans = vec![
        Span::new("script", "resource.script", 100.1, 101.0).with_description("https://cdn.example.com/app.js"),
        Span::new("task1", "ui.long-task", 100.2, 100.5).with_description("Main UI thread blocked"),
        Span::new("task2", "ui.long-task", 100.6, 100.9).with_description("Main UI thread blocked"),
        Span::new("late", "resource.link", 104.0, 104.5).with_description("https://cdn.example.com/late.css"),
    ];
    Event::new("page", 100.0, spans).with_measurement("fcp", 2500.0, Some("millisecond"))
}

#[test]
fn test_page_load_findings_across_detectors() {
    let settings = DetectionSettings::default();
    let report = detect_performance_issues(&page_load(), &settings);

    let flags = report.detected_flags();
    assert!(flags[&DetectorType::RenderBlockingAssetSpan]);
    assert!(flags[&DetectorType::LongTaskSpans]);
    assert!(!flags[&DetectorType::SlowSpan]);
    assert_eq!(report.all_issue_count(), 2);

    let blocking = report.first_issue(DetectorType::RenderBlockingAssetSpan).unwrap();
    assert_eq!(blocking.span_id, "script");
    let long_tasks = report.first_issue(DetectorType::LongTaskSpans).unwrap();
    assert_eq!(long_tasks.span_id, "task2");
    assert_eq!(long_tasks.spans_involved, vec!["task1", "task2"]);
}

#[test]
fn test_detection_is_idempotent() {
    let settings = DetectionSettings::default();
    let event = page_load();
    let first = detect_performance_issues(&event, &settings);
    let second = detect_performance_issues(&event, &settings);
    assert_eq!(first, second);
    assert_eq!(first.transaction_tags(), second.transaction_tags());
}

#[test]
fn test_spans_without_id_are_never_evidence() {
    let settings = DetectionSettings::default();
    let mut spans: Vec<Span> = (0..6)
        .map(|i| {
            let start = 10.0 + i as f64;
            Span::new(&format!("s{}", i), "db", start, start + 0.2).with_description("SELECT 1")
        })
        .collect();
    spans.insert(
        2,
        Span {
            op: Some("db".to_string()),
            description: Some("SELECT 1".to_string()),
            start_timestamp: Some(12.0),
            timestamp: Some(15.0),
            ..Default::default()
        },
    );
    let event = Event::new("e", 10.0, spans);
    let report = detect_performance_issues(&event, &settings);

    for (_, issue) in report.all_issues() {
        assert!(!issue.spans_involved.is_empty());
        assert!(issue.spans_involved.iter().all(|id| id.starts_with('s')));
    }
    let duplicates = report.first_issue(DetectorType::DuplicateSpans).unwrap();
    assert_eq!(duplicates.spans_involved, vec!["s0", "s1", "s2", "s3", "s4"]);
    // The 3s span has no id and cannot be reported as slow
    assert!(report.first_issue(DetectorType::SlowSpan).is_none());
}

#[test]
fn test_detectors_receive_each_span_once() {
    let settings = DetectionSettings::default();
    let event = page_load();
    let mut detectors = Detector::all(&settings, &event);
    for span in &event.spans {
        for detector in detectors.iter_mut() {
            detector.visit_span(span);
        }
    }
    for detector in detectors.iter_mut() {
        detector.visited_all_spans();
    }
    let total: usize = detectors.iter().map(|d| d.stored_issues().len()).sum();
    assert_eq!(total, detect_performance_issues(&event, &settings).all_issue_count());
}

#[test]
fn test_extreme_durations_do_not_overflow_totals() {
    let settings = DetectionSettings::default();
    let spans = (0..5000)
        .map(|i| {
            Span::new(&format!("huge{}", i), "db", f64::NEG_INFINITY, f64::INFINITY).with_description("SELECT 1")
        })
        .collect();
    let event = Event::new("huge", 0.0, spans);
    let report = detect_performance_issues(&event, &settings);

    let duplicate = report.first_issue(DetectorType::DuplicateSpans).unwrap();
    assert_eq!(duplicate.span_id, "huge4");
    assert_eq!(duplicate.spans_involved.len(), 5);
    assert!(report.detected_flags()[&DetectorType::SlowSpan]);
}
