use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Invalid detection settings for {detector}: {reason}")]
    InvalidSettings { detector: &'static str, reason: String },
    #[error("Detection pass failed for event {event_id}: {message}")]
    PassFailed { event_id: String, message: String },
}
