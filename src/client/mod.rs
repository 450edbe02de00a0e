//! Datadog API integration module.
//!
//! This module provides the HTTP client shared by every resource type, for
//! both the source and the destination organization.

mod http;

pub use http::{
    ApiClient, ClientSettings, DEFAULT_API_URL, DEFAULT_RETRY_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS,
};
