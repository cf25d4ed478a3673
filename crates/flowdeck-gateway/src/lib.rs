//! HTTP gateway to the remote flow process.
//!
//! Implements [`flowdeck_core::FlowGateway`] over the backend's JSON API
//! using `reqwest`. No streaming, no automatic retries: a timed-out or
//! failed request surfaces as a single error and the caller's next
//! scheduled tick is the only retry.

mod http;

pub use http::HttpFlowGateway;
