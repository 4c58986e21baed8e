//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms via `metrics`)
//!
//! Consumers:
//!     → stdout (fmt subscriber, filtered by RUST_LOG or config)
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Request ID travels as the `X-Request-ID` header and log field
//! - Metric updates are no-ops until a recorder is installed, so library
//!   users and tests pay nothing

pub mod logging;
pub mod metrics;
