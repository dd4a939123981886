use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::constants::*;
use crate::detection::errors::DetectionError;
use crate::event::Span;

/// The fixed set of detectors, keyed by the short names used in
/// configuration, transaction tags and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DetectorType {
    #[serde(rename = "duplicates")]
    DuplicateSpans,
    // Has to stay within tag key length limits
    #[serde(rename = "dupes_hash")]
    DuplicateSpansHash,
    #[serde(rename = "slow_span")]
    SlowSpan,
    #[serde(rename = "sequential")]
    SequentialSlowSpans,
    #[serde(rename = "long_task")]
    LongTaskSpans,
    #[serde(rename = "render_blocking_assets")]
    RenderBlockingAssetSpan,
    #[serde(rename = "n_plus_one")]
    NPlusOneSpans,
    #[serde(rename = "n_plus_one_db")]
    NPlusOneDbSpans,
}

impl DetectorType {
    /// Registration order. Spans are dispatched to detectors in this order.
    pub const ALL: [DetectorType; 8] = [
        DetectorType::DuplicateSpans,
        DetectorType::DuplicateSpansHash,
        DetectorType::SlowSpan,
        DetectorType::SequentialSlowSpans,
        DetectorType::LongTaskSpans,
        DetectorType::RenderBlockingAssetSpan,
        DetectorType::NPlusOneSpans,
        DetectorType::NPlusOneDbSpans,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorType::DuplicateSpans => "duplicates",
            DetectorType::DuplicateSpansHash => "dupes_hash",
            DetectorType::SlowSpan => "slow_span",
            DetectorType::SequentialSlowSpans => "sequential",
            DetectorType::LongTaskSpans => "long_task",
            DetectorType::RenderBlockingAssetSpan => "render_blocking_assets",
            DetectorType::NPlusOneSpans => "n_plus_one",
            DetectorType::NPlusOneDbSpans => "n_plus_one_db",
        }
    }
}

impl fmt::Display for DetectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threshold groups that restrict themselves to span op prefixes
pub trait AllowedSpanOps {
    fn allowed_span_ops(&self) -> &[String];
}

/// Occurrence count plus cumulative duration (duplicates, sequential)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountThresholds {
    pub count: usize,
    /// Milliseconds
    pub cumulative_duration: f64,
    #[serde(default)]
    pub allowed_span_ops: Vec<String>,
}

/// Single span duration (slow span)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurationThresholds {
    /// Milliseconds
    pub duration_threshold: f64,
    #[serde(default)]
    pub allowed_span_ops: Vec<String>,
}

/// Cumulative duration across the whole event (long tasks)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CumulativeDurationThresholds {
    /// Milliseconds
    pub cumulative_duration: f64,
    #[serde(default)]
    pub allowed_span_ops: Vec<String>,
}

/// Near-simultaneous dispatch of identical spans (N+1 fan-out)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcurrencyThresholds {
    #[serde(default = "fallback_n_plus_one_count")]
    pub count: usize,
    /// Milliseconds between consecutive span starts
    #[serde(default = "fallback_n_plus_one_start_time")]
    pub start_time_threshold: f64,
    #[serde(default)]
    pub allowed_span_ops: Vec<String>,
}

fn fallback_n_plus_one_count() -> usize {
    FALLBACK_N_PLUS_ONE_COUNT
}

fn fallback_n_plus_one_start_time() -> f64 {
    FALLBACK_N_PLUS_ONE_START_TIME_MS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderBlockingSettings {
    /// Milliseconds, inclusive
    pub fcp_minimum_threshold: f64,
    /// Milliseconds, exclusive
    pub fcp_maximum_threshold: f64,
    /// Span duration over FCP above which a span counts as blocking
    pub fcp_ratio_threshold: f64,
    /// Matched exactly, not as prefixes
    #[serde(default)]
    pub allowed_span_ops: Vec<String>,
}

impl Default for RenderBlockingSettings {
    fn default() -> Self {
        Self {
            fcp_minimum_threshold: DEFAULT_FCP_MINIMUM_MS,
            fcp_maximum_threshold: DEFAULT_FCP_MAXIMUM_MS,
            fcp_ratio_threshold: DEFAULT_FCP_RATIO,
            allowed_span_ops: ops(&["resource.link", "resource.script"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NPlusOneDbSettings {
    pub count: usize,
    /// Milliseconds, summed over the repeated spans
    pub duration_threshold: f64,
}

impl Default for NPlusOneDbSettings {
    fn default() -> Self {
        Self {
            count: DEFAULT_N_PLUS_ONE_DB_COUNT,
            duration_threshold: DEFAULT_N_PLUS_ONE_DB_DURATION_MS,
        }
    }
}

macro_rules! impl_allowed_span_ops {
    ($($settings:ty),*) => {
        $(impl AllowedSpanOps for $settings {
            fn allowed_span_ops(&self) -> &[String] {
                &self.allowed_span_ops
            }
        })*
    };
}

impl_allowed_span_ops!(
    CountThresholds,
    DurationThresholds,
    CumulativeDurationThresholds,
    ConcurrencyThresholds
);

/// Detection thresholds for every detector.
///
/// Deserialized from the `[detection]` table of the configuration file; any
/// detector missing from the table keeps its built-in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    #[serde(rename = "duplicates")]
    pub duplicate_spans: Vec<CountThresholds>,
    #[serde(rename = "dupes_hash")]
    pub duplicate_spans_hash: Vec<CountThresholds>,
    #[serde(rename = "slow_span")]
    pub slow_span: Vec<DurationThresholds>,
    #[serde(rename = "sequential")]
    pub sequential_slow_spans: Vec<CountThresholds>,
    #[serde(rename = "long_task")]
    pub long_task_spans: Vec<CumulativeDurationThresholds>,
    #[serde(rename = "render_blocking_assets")]
    pub render_blocking_asset_span: RenderBlockingSettings,
    #[serde(rename = "n_plus_one")]
    pub n_plus_one_spans: Vec<ConcurrencyThresholds>,
    #[serde(rename = "n_plus_one_db")]
    pub n_plus_one_db_spans: NPlusOneDbSettings,
}

fn ops(values: &[&str]) -> Vec<String> {
    values.iter().map(|op| op.to_string()).collect()
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            duplicate_spans: vec![CountThresholds {
                count: DEFAULT_DUPLICATE_COUNT,
                cumulative_duration: DEFAULT_DUPLICATE_CUMULATIVE_MS,
                allowed_span_ops: ops(&["db", "http"]),
            }],
            duplicate_spans_hash: vec![CountThresholds {
                count: DEFAULT_DUPLICATE_COUNT,
                cumulative_duration: DEFAULT_DUPLICATE_CUMULATIVE_MS,
                allowed_span_ops: ops(&["http"]),
            }],
            slow_span: vec![
                DurationThresholds {
                    duration_threshold: DEFAULT_SLOW_DB_SPAN_MS,
                    allowed_span_ops: ops(&["db"]),
                },
                DurationThresholds {
                    duration_threshold: DEFAULT_SLOW_HTTP_SPAN_MS,
                    allowed_span_ops: ops(&["http"]),
                },
            ],
            sequential_slow_spans: vec![CountThresholds {
                count: DEFAULT_SEQUENTIAL_COUNT,
                cumulative_duration: DEFAULT_SEQUENTIAL_CUMULATIVE_MS,
                allowed_span_ops: ops(&["db", "http", "ui"]),
            }],
            long_task_spans: vec![CumulativeDurationThresholds {
                cumulative_duration: DEFAULT_LONG_TASK_CUMULATIVE_MS,
                allowed_span_ops: ops(&["ui.long-task", "ui.sentry.long-task"]),
            }],
            render_blocking_asset_span: RenderBlockingSettings::default(),
            n_plus_one_spans: vec![ConcurrencyThresholds {
                count: DEFAULT_N_PLUS_ONE_COUNT,
                start_time_threshold: DEFAULT_N_PLUS_ONE_START_TIME_MS,
                allowed_span_ops: ops(&["http.client"]),
            }],
            n_plus_one_db_spans: NPlusOneDbSettings::default(),
        }
    }
}

fn check_millis(detector: DetectorType, field: &str, value: f64) -> Result<(), DetectionError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(DetectionError::InvalidSettings {
            detector: detector.as_str(),
            reason: format!("{} must be a finite, non-negative number of milliseconds, got {}", field, value),
        })
    }
}

fn check_count(detector: DetectorType, count: usize) -> Result<(), DetectionError> {
    if count == 0 {
        return Err(DetectionError::InvalidSettings {
            detector: detector.as_str(),
            reason: "count must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn check_count_groups(detector: DetectorType, groups: &[CountThresholds]) -> Result<(), DetectionError> {
    for group in groups {
        check_count(detector, group.count)?;
        check_millis(detector, "cumulative_duration", group.cumulative_duration)?;
    }
    Ok(())
}

impl DetectionSettings {
    /// Reject thresholds no detector could act on sensibly
    pub fn validate(&self) -> Result<(), DetectionError> {
        check_count_groups(DetectorType::DuplicateSpans, &self.duplicate_spans)?;
        check_count_groups(DetectorType::DuplicateSpansHash, &self.duplicate_spans_hash)?;
        check_count_groups(DetectorType::SequentialSlowSpans, &self.sequential_slow_spans)?;

        for group in &self.slow_span {
            check_millis(DetectorType::SlowSpan, "duration_threshold", group.duration_threshold)?;
        }
        for group in &self.long_task_spans {
            check_millis(DetectorType::LongTaskSpans, "cumulative_duration", group.cumulative_duration)?;
        }
        for group in &self.n_plus_one_spans {
            check_count(DetectorType::NPlusOneSpans, group.count)?;
            check_millis(DetectorType::NPlusOneSpans, "start_time_threshold", group.start_time_threshold)?;
        }

        let render = &self.render_blocking_asset_span;
        let detector = DetectorType::RenderBlockingAssetSpan;
        check_millis(detector, "fcp_minimum_threshold", render.fcp_minimum_threshold)?;
        check_millis(detector, "fcp_maximum_threshold", render.fcp_maximum_threshold)?;
        if render.fcp_minimum_threshold > render.fcp_maximum_threshold {
            return Err(DetectionError::InvalidSettings {
                detector: detector.as_str(),
                reason: format!(
                    "fcp_minimum_threshold ({}) exceeds fcp_maximum_threshold ({})",
                    render.fcp_minimum_threshold, render.fcp_maximum_threshold
                ),
            });
        }
        if !render.fcp_ratio_threshold.is_finite() || render.fcp_ratio_threshold < 0.0 {
            return Err(DetectionError::InvalidSettings {
                detector: detector.as_str(),
                reason: format!("fcp_ratio_threshold must be non-negative, got {}", render.fcp_ratio_threshold),
            });
        }

        check_count(DetectorType::NPlusOneDbSpans, self.n_plus_one_db_spans.count)?;
        check_millis(
            DetectorType::NPlusOneDbSpans,
            "duration_threshold",
            self.n_plus_one_db_spans.duration_threshold,
        )?;

        Ok(())
    }
}

/// A span resolved against the first matching threshold group
#[derive(Debug)]
pub struct SpanMatch<'a, T> {
    pub op: &'a str,
    pub span_id: &'a str,
    /// The allowed op prefix that matched, or the span op for unrestricted groups
    pub op_prefix: &'a str,
    pub duration: Duration,
    pub settings: &'a T,
}

/// Find the first group (configuration order) whose allowed ops are empty or
/// contain a prefix of the span's op. Spans lacking an op or span id never match.
pub fn settings_for_span<'a, T: AllowedSpanOps>(groups: &'a [T], span: &'a Span) -> Option<SpanMatch<'a, T>> {
    let op = span.op()?;
    let span_id = span.span_id()?;

    groups.iter().find_map(|settings| {
        let allowed = settings.allowed_span_ops();
        let op_prefix = if allowed.is_empty() {
            op
        } else {
            allowed.iter().find(|prefix| op.starts_with(prefix.as_str()))?.as_str()
        };

        Some(SpanMatch {
            op,
            span_id,
            op_prefix,
            duration: span.duration(),
            settings,
        })
    })
}
