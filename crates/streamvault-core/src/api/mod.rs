//! REST API client module for the StreamVault backend.
//!
//! This module provides the `SessionClient`, which signs every outbound
//! request with the session's bearer token and transparently refreshes an
//! expired token, replaying the requests that hit the 401.
//!
//! Network access sits behind the `Transport` trait; `HttpTransport` is the
//! reqwest implementation.

pub mod client;
pub mod error;
pub mod request;
pub mod singleflight;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{RefreshState, SessionClient};
pub use error::ApiError;
pub use request::{ApiRequest, ApiResponse, FileUpload, RetryBudget};
pub use singleflight::SingleFlight;
pub use transport::{HttpTransport, Transport};
