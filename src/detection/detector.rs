use crate::detection::detectors::{
    DuplicateSpanDetector, LongTaskSpanDetector, NPlusOneDbSpanDetector, NPlusOneSpanDetector,
    RenderBlockingAssetSpanDetector, SequentialSlowSpanDetector, SlowSpanDetector,
};
use crate::detection::settings::{DetectionSettings, DetectorType};
use crate::detection::structs::StoredIssues;
use crate::event::{Event, Span};

/// A single-pass, stateful span stream algorithm.
///
/// `visit_span` is called once per span in stream order, then
/// `visited_all_spans` exactly once after the last span.
pub trait PerformanceDetector<'a> {
    fn detector_type(&self) -> DetectorType;

    fn visit_span(&mut self, span: &'a Span);

    fn visited_all_spans(&mut self) {}

    fn stored_issues(&self) -> &StoredIssues;
}

/// One detector of each kind behind a closed set of variants
#[derive(Debug)]
pub enum Detector<'a> {
    DuplicateSpans(DuplicateSpanDetector<'a>),
    DuplicateSpansHash(DuplicateSpanDetector<'a>),
    SlowSpan(SlowSpanDetector<'a>),
    SequentialSlowSpans(SequentialSlowSpanDetector<'a>),
    LongTaskSpans(LongTaskSpanDetector<'a>),
    RenderBlockingAssetSpan(RenderBlockingAssetSpanDetector<'a>),
    NPlusOneSpans(NPlusOneSpanDetector<'a>),
    NPlusOneDbSpans(NPlusOneDbSpanDetector<'a>),
}

impl<'a> Detector<'a> {
    pub fn new(detector_type: DetectorType, settings: &'a DetectionSettings, event: &'a Event) -> Self {
        match detector_type {
            DetectorType::DuplicateSpans => {
                Detector::DuplicateSpans(DuplicateSpanDetector::by_description(settings))
            }
            DetectorType::DuplicateSpansHash => {
                Detector::DuplicateSpansHash(DuplicateSpanDetector::by_hash(settings))
            }
            DetectorType::SlowSpan => Detector::SlowSpan(SlowSpanDetector::new(settings)),
            DetectorType::SequentialSlowSpans => {
                Detector::SequentialSlowSpans(SequentialSlowSpanDetector::new(settings))
            }
            DetectorType::LongTaskSpans => Detector::LongTaskSpans(LongTaskSpanDetector::new(settings)),
            DetectorType::RenderBlockingAssetSpan => {
                Detector::RenderBlockingAssetSpan(RenderBlockingAssetSpanDetector::new(settings, event))
            }
            DetectorType::NPlusOneSpans => Detector::NPlusOneSpans(NPlusOneSpanDetector::new(settings)),
            DetectorType::NPlusOneDbSpans => Detector::NPlusOneDbSpans(NPlusOneDbSpanDetector::new(settings)),
        }
    }

    /// Every detector kind, in registration order
    pub fn all(settings: &'a DetectionSettings, event: &'a Event) -> Vec<Self> {
        DetectorType::ALL
            .iter()
            .map(|&detector_type| Detector::new(detector_type, settings, event))
            .collect()
    }
}

macro_rules! dispatch {
    ($self:expr, $detector:ident => $body:expr) => {
        match $self {
            Detector::DuplicateSpans($detector) => $body,
            Detector::DuplicateSpansHash($detector) => $body,
            Detector::SlowSpan($detector) => $body,
            Detector::SequentialSlowSpans($detector) => $body,
            Detector::LongTaskSpans($detector) => $body,
            Detector::RenderBlockingAssetSpan($detector) => $body,
            Detector::NPlusOneSpans($detector) => $body,
            Detector::NPlusOneDbSpans($detector) => $body,
        }
    };
}

impl<'a> PerformanceDetector<'a> for Detector<'a> {
    fn detector_type(&self) -> DetectorType {
        dispatch!(self, detector => detector.detector_type())
    }

    fn visit_span(&mut self, span: &'a Span) {
        dispatch!(self, detector => detector.visit_span(span))
    }

    fn visited_all_spans(&mut self) {
        dispatch!(self, detector => detector.visited_all_spans())
    }

    fn stored_issues(&self) -> &StoredIssues {
        dispatch!(self, detector => detector.stored_issues())
    }
}
