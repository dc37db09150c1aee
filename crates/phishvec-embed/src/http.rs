//! Shared HTTP client construction for consistent timeout and TLS configuration.

use std::time::Duration;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Timeout for a single HTTP request, so that every attempt allowed by
/// `max_retries` fits inside the caller's `call_budget`.
#[must_use]
pub fn request_timeout(call_budget: Duration, max_retries: u32) -> Duration {
    (call_budget / max_retries.saturating_add(1)).max(MIN_REQUEST_TIMEOUT)
}

/// Build the HTTP client used for embedding and vector-store calls.
///
/// Config: 10s connect timeout, `timeout` per request, rustls TLS,
/// `phishvec/{version}` user-agent, redirect limit 10.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialised.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
        .timeout(timeout)
        .user_agent(concat!("phishvec/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
}
