//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges via the metrics facade)
//!
//! Consumers:
//!     → Log aggregation (stdout through the fmt layer)
//!     → Whatever metrics recorder the host installs
//! ```
//!
//! # Design Decisions
//! - Request ID flows through all log events of a dispatch
//! - Metrics are cheap (no-op without a recorder)

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LoggingError};
