pub mod duplicate;
pub mod long_task;
pub mod n_plus_one;
pub mod n_plus_one_db;
pub mod render_blocking;
pub mod sequential;
pub mod slow_span;

pub use duplicate::{DuplicateGrouping, DuplicateSpanDetector};
pub use long_task::LongTaskSpanDetector;
pub use n_plus_one::NPlusOneSpanDetector;
pub use n_plus_one_db::NPlusOneDbSpanDetector;
pub use render_blocking::RenderBlockingAssetSpanDetector;
pub use sequential::SequentialSlowSpanDetector;
pub use slow_span::SlowSpanDetector;
