//! HTTP Client Factory
//!
//! Builds the reqwest clients shared by providers and the embedding backend.

use std::time::Duration;

use crate::types::{LlmError, LlmResult};

/// Connect timeout applied to every client; the overall request timeout
/// comes from configuration.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build a `reqwest::Client` whose requests give up after `request_timeout`.
///
/// Environment proxy variables are ignored; the assistant talks to the
/// configured endpoint directly.
pub fn build_http_client(request_timeout: Duration) -> LlmResult<reqwest::Client> {
    reqwest::Client::builder()
        .no_proxy()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(request_timeout)
        .build()
        .map_err(|e| LlmError::Other {
            message: format!("failed to build HTTP client: {}", e),
        })
}
