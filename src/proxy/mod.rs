//! Proxy subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyRequest (service, path, method, headers, query, body)
//!     → forwarder.rs (admission, selection, attempts, outcome)
//!     → headers.rs (outbound transformation, response allow-list)
//!     → ProxyResponse or GatewayError (error.rs)
//! ```
//!
//! # Design Decisions
//! - Bodies are buffered so every retry resends identical bytes
//! - The breaker records one outcome per request, never per attempt
//! - 5xx responses count as failed attempts; 4xx responses are returned as-is

pub mod error;
pub mod forwarder;
pub mod headers;
pub mod types;

pub use error::{ErrorKind, GatewayError, UnavailableReason};
pub use forwarder::{Forwarder, WarmupResult};
pub use types::{CallerIdentity, ProxyRequest, ProxyResponse};
