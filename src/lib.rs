pub mod common;
pub mod config;
pub mod detection;
pub mod event;
pub mod logging;
pub mod metrics;
