//! HTTP middleware shared by every service router.

pub mod metrics;
pub mod tracing;

pub use metrics::metrics_middleware;
pub use tracing::{REQUEST_ID_HEADER, request_id_middleware};
