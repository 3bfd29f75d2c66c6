//! Monitoring Module
//!
//! - Structured logging setup
//! - Extraction run counters

pub mod logging;
pub mod metrics;

pub use logging::{init_tracing, LogFormat, LogLevel, LoggerConfig};
pub use metrics::{Counter, ExtractionMetrics, MetricsSnapshot};
