use rayon::prelude::*;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

use crate::detection::errors::DetectionError;
use crate::detection::orchestrator::detect_performance_issues;
use crate::detection::report::DetectionReport;
use crate::detection::settings::DetectionSettings;
use crate::event::Event;
use crate::metrics::DetectionMetrics;

/// Facade in front of detection that keeps failures away from the caller.
///
/// A failing pass is logged, counted and its partial results dropped. It is
/// never retried.
pub struct DetectionService {
    settings: DetectionSettings,
    metrics: Option<Arc<DetectionMetrics>>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl DetectionService {
    pub fn new(settings: DetectionSettings) -> Result<Self, DetectionError> {
        settings.validate()?;
        Ok(Self {
            settings,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<DetectionMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn settings(&self) -> &DetectionSettings {
        &self.settings
    }

    pub fn metrics(&self) -> Option<&Arc<DetectionMetrics>> {
        self.metrics.as_ref()
    }

    /// Run a guarded pass, surfacing failures as errors without recording them
    pub fn try_detect(&self, event: &Event) -> Result<DetectionReport, DetectionError> {
        catch_unwind(AssertUnwindSafe(|| detect_performance_issues(event, &self.settings))).map_err(|payload| {
            DetectionError::PassFailed {
                event_id: event.event_id().unwrap_or_default().to_string(),
                message: panic_message(payload.as_ref()),
            }
        })
    }

    /// Detect issues in one event. Returns `None` when the pass failed.
    pub fn detect(&self, event: &Event) -> Option<DetectionReport> {
        let started = Instant::now();
        match self.try_detect(event) {
            Ok(report) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_report(&report, started.elapsed());
                }
                debug!(
                    event_id = event.event_id().unwrap_or_default(),
                    issues = report.all_issue_count(),
                    elapsed_us = started.elapsed().as_micros() as u64,
                    "Event analysed"
                );
                Some(report)
            }
            Err(e) => {
                error!("❌ Performance detection failed: {}", e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_failure(&e, started.elapsed());
                }
                None
            }
        }
    }

    /// Detect issues across a batch of events in parallel, results in input order
    pub fn detect_all(&self, events: &[Event]) -> Vec<Option<DetectionReport>> {
        events.par_iter().map(|event| self.detect(event)).collect()
    }
}
