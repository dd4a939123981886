pub mod detector;
pub mod detectors;
pub mod errors;
pub mod fingerprint;
pub mod orchestrator;
pub mod report;
pub mod service;
pub mod settings;
pub mod structs;

#[cfg(test)]
mod tests;

pub use detector::{Detector, PerformanceDetector};
pub use errors::DetectionError;
pub use fingerprint::Fingerprint;
pub use orchestrator::{detect_performance_issues, PerformanceDetection};
pub use report::{DetectionReport, DetectorFindings, TransactionTag};
pub use service::DetectionService;
pub use settings::{DetectionSettings, DetectorType};
pub use structs::{PerformanceIssue, StoredIssues};
