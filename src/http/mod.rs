//! HTTP shim in front of the gateway core.
//!
//! # Data Flow
//! ```text
//! Client request
//!     → server.rs (Axum router, body buffering, connection release)
//!     → request.rs (service/path split, caller identity, X-Forwarded-*)
//!     → Gateway::proxy_request
//!     → response.rs (client response or JSON error)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use server::{AppState, GatewayServer};
