//! Command line front end for performance issue detection
//!
//! Reads transaction events from JSON files and prints one JSON report per
//! event on stdout.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use performance_issues::common::constants::DEFAULT_CONFIG_PATH;
use performance_issues::config::{AppConfig, ConfigError};
use performance_issues::detection::{
    DetectionReport, DetectionService, DetectorFindings, DetectorType, TransactionTag,
};
use performance_issues::event::Event;
use performance_issues::logging::{cleanup_old_logs, init_dual_logging, init_simple_logging};
use performance_issues::metrics::init_metrics;

const USAGE: &str = "Usage: performance_issues [--config FILE] [--metrics] EVENT.json...";

#[derive(Debug, Default)]
struct CliArgs {
    config_path: Option<PathBuf>,
    print_metrics: bool,
    event_files: Vec<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut cli = CliArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                let Some(path) = args.get(i + 1) else {
                    return Err("--config requires a file path".to_string());
                };
                cli.config_path = Some(PathBuf::from(path));
                i += 1;
            }
            "--metrics" => cli.print_metrics = true,
            "--help" | "-h" => return Err(USAGE.to_string()),
            flag if flag.starts_with("--") => return Err(format!("Unknown option {}\n{}", flag, USAGE)),
            path => cli.event_files.push(PathBuf::from(path)),
        }
        i += 1;
    }

    if cli.event_files.is_empty() {
        return Err(USAGE.to_string());
    }
    Ok(cli)
}

/// An event file holds either a single event or an array of events
#[derive(Deserialize)]
#[serde(untagged)]
enum EventFile {
    Batch(Vec<Event>),
    Single(Box<Event>),
}

fn read_events(path: &Path) -> Result<Vec<Event>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(match serde_json::from_str(&content)? {
        EventFile::Batch(events) => events,
        EventFile::Single(event) => vec![*event],
    })
}

fn load_config(cli: &CliArgs) -> Result<AppConfig, ConfigError> {
    match &cli.config_path {
        Some(path) => AppConfig::from_toml(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => AppConfig::from_toml(DEFAULT_CONFIG_PATH),
        None => Ok(AppConfig::default()),
    }
}

/// Report as printed on stdout
#[derive(Serialize)]
struct ReportOutput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    event_id: Option<&'a str>,
    all_issue_count: usize,
    detected: BTreeMap<DetectorType, bool>,
    tags: Vec<TransactionTag>,
    findings: Vec<&'a DetectorFindings>,
}

impl<'a> From<&'a DetectionReport> for ReportOutput<'a> {
    fn from(report: &'a DetectionReport) -> Self {
        Self {
            event_id: report.event_id.as_deref(),
            all_issue_count: report.all_issue_count(),
            detected: report.detected_flags(),
            tags: report.transaction_tags(),
            findings: report.findings.iter().filter(|findings| !findings.issues.is_empty()).collect(),
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args: Vec<String> = env::args().collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(2);
        }
    };

    let config = load_config(&cli)?;

    let logging_config = config.logging.to_logging_config()?;
    let _logging_guard = if config.logging.file_output() {
        let guard = init_dual_logging(&logging_config)?;
        if let Some(keep_days) = config.logging.cleanup_days {
            if let Err(e) = cleanup_old_logs(&logging_config.log_dir, keep_days) {
                warn!("⚠️ Failed to clean up old log files: {}", e);
            }
        }
        Some(guard)
    } else {
        init_simple_logging(&logging_config.level_filter)?;
        None
    };

    let mut service = DetectionService::new(config.detection)?;
    if cli.print_metrics {
        service = service.with_metrics(init_metrics()?);
    }

    let mut events = Vec::new();
    for path in &cli.event_files {
        match read_events(path) {
            Ok(mut batch) => events.append(&mut batch),
            Err(e) => error!(path = %path.display(), "❌ Skipping unreadable event file: {}", e),
        }
    }
    info!(events = events.len(), files = cli.event_files.len(), "🔍 Running performance detection");

    let reports = service.detect_all(&events);
    let mut failed = 0;
    for report in &reports {
        match report {
            Some(report) => println!("{}", serde_json::to_string(&ReportOutput::from(report))?),
            None => failed += 1,
        }
    }

    let detected = reports.iter().flatten().filter(|report| report.has_detected_issues()).count();
    info!(analysed = reports.len(), detected, failed, "✅ Detection finished");

    if let Some(metrics) = service.metrics() {
        eprintln!("{}", metrics.export_metrics()?);
    }
    Ok(())
}
