//! HTTP access layer
//!
//! Every call to the API goes through [`ApiClient`]. It attaches credentials,
//! enforces the request timeout, normalises failures into [`ApiError`] and
//! transparently renews the access credential once when the server answers
//! 401. Concurrent 401s share a single renewal.

mod client;
mod endpoints;
mod error;

pub use client::{ApiClient, ApiEnvelope, ApiRequest, RequestBody, REFRESH_ENDPOINT};
pub use endpoints::{counter_route, IDEMPOTENCY_HEADER};
pub use error::{ApiError, ErrorClass, DEFAULT_ERROR_MESSAGE};
