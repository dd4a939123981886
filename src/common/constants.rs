/// Span and detection constants
// Span operations
pub const DB_SPAN_OP: &str = "db";

// Measurements
pub const FCP_MEASUREMENT: &str = "fcp";
pub const MILLISECOND_UNIT: &str = "millisecond";

// Fingerprinting
pub const SPAN_FINGERPRINT_LEN: usize = 20; // 80 bits of the sha1 hex digest
pub const MISSING_FINGERPRINT_PART: &str = "None";

// Time constants
pub const MICROSECONDS_PER_SECOND: f64 = 1_000_000.0;
pub const MICROSECONDS_PER_MILLISECOND: f64 = 1_000.0;
// Bound on converted timestamps and thresholds, roughly year 33000
pub const MAX_TIME_SECONDS: f64 = 1_000_000_000_000.0;

// Default thresholds (milliseconds)
pub const DEFAULT_DUPLICATE_COUNT: usize = 5;
pub const DEFAULT_DUPLICATE_CUMULATIVE_MS: f64 = 500.0;
pub const DEFAULT_SEQUENTIAL_COUNT: usize = 3;
pub const DEFAULT_SEQUENTIAL_CUMULATIVE_MS: f64 = 1200.0;
pub const DEFAULT_SLOW_DB_SPAN_MS: f64 = 1000.0;
pub const DEFAULT_SLOW_HTTP_SPAN_MS: f64 = 2000.0;
pub const DEFAULT_LONG_TASK_CUMULATIVE_MS: f64 = 500.0;
pub const DEFAULT_FCP_MINIMUM_MS: f64 = 2000.0;
pub const DEFAULT_FCP_MAXIMUM_MS: f64 = 10000.0;
pub const DEFAULT_FCP_RATIO: f64 = 0.25;
pub const DEFAULT_N_PLUS_ONE_COUNT: usize = 3;
pub const DEFAULT_N_PLUS_ONE_START_TIME_MS: f64 = 5.0;
pub const DEFAULT_N_PLUS_ONE_DB_COUNT: usize = 5;
pub const DEFAULT_N_PLUS_ONE_DB_DURATION_MS: f64 = 500.0;

// Fallbacks used when a concurrency group omits a field
pub const FALLBACK_N_PLUS_ONE_COUNT: usize = 10;
pub const FALLBACK_N_PLUS_ONE_START_TIME_MS: f64 = 0.0;

// Transaction tag names
pub const TAG_PREFIX: &str = "_pi_";
pub const TAG_ALL_ISSUE_COUNT: &str = "_pi_all_issue_count";
pub const TAG_TRANSACTION: &str = "_pi_transaction";

// Configuration
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
