use std::future::Future;
use std::time::Duration;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF_SHIFT: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff: DEFAULT_BASE_BACKOFF,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_base_backoff(mut self, base: Duration) -> Self {
        self.base_backoff = base;
        self
    }

    /// Exponential backoff for the given zero-based attempt, capped at [`Self::max_backoff`].
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff
            .saturating_mul(1u32 << attempt.min(MAX_BACKOFF_SHIFT))
    }

    /// Longest wait between attempts: 64x the base.
    #[must_use]
    pub fn max_backoff(&self) -> Duration {
        self.base_backoff.saturating_mul(1u32 << MAX_BACKOFF_SHIFT)
    }
}

/// `Retry-After` in seconds, capped at the policy's longest backoff. Falls back to
/// exponential backoff when the header is absent or not a number.
pub(crate) fn retry_delay(response: &reqwest::Response, attempt: u32, policy: &RetryPolicy) -> Duration {
    match retry_after(response.headers()) {
        Some(delay) => delay.min(policy.max_backoff()),
        None => policy.backoff(attempt),
    }
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let secs = headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()?;
    Some(Duration::from_secs(secs))
}

#[must_use]
pub fn is_retryable_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

/// Send an HTTP request, retrying up to `policy.max_retries` times on 429, 5xx,
/// connect and timeout failures.
///
/// `f` builds and sends a fresh request on each call. When retries run out on a
/// retryable status the last response is returned, so the caller decides how to
/// report it.
///
/// # Errors
///
/// Returns the `reqwest::Error` of the last attempt for transport failures, or
/// immediately for non-transient ones.
pub async fn send_with_retry<F, Fut>(
    service: &str,
    policy: &RetryPolicy,
    mut f: F,
) -> Result<reqwest::Response, reqwest::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(response) => {
                let status = response.status();
                if !is_retryable_status(status) || attempt >= policy.max_retries {
                    return Ok(response);
                }
                let delay = retry_delay(&response, attempt, policy);
                tracing::warn!(
                    "{service} returned {status}, retrying in {}ms ({}/{})",
                    delay.as_millis(),
                    attempt + 1,
                    policy.max_retries
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) if is_transient(&e) && attempt < policy.max_retries => {
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    "{service} request failed: {e}, retrying in {}ms ({}/{})",
                    delay.as_millis(),
                    attempt + 1,
                    policy.max_retries
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries).with_base_backoff(Duration::from_millis(1))
    }

    async fn get(client: &reqwest::Client, url: &str, policy: &RetryPolicy) -> reqwest::Response {
        send_with_retry("test", policy, || client.get(url).send())
            .await
            .unwrap()
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
        assert_eq!(policy.backoff(40), Duration::from_secs(64));
    }

    #[test]
    fn retry_after_parses_seconds_only() {
        use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static(" 12 "));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(12)));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn max_backoff_is_64x_base() {
        assert_eq!(RetryPolicy::default().max_backoff(), Duration::from_secs(64));
        assert_eq!(fast_policy(1).max_backoff(), Duration::from_millis(64));
    }

    #[tokio::test]
    async fn huge_retry_after_is_capped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "86400"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let resp = tokio::time::timeout(
            Duration::from_secs(5),
            get(&client, &server.uri(), &fast_policy(1)),
        )
        .await
        .unwrap();
        assert_eq!(resp.status(), 200);
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(reqwest::StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(reqwest::StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(reqwest::StatusCode::CONFLICT));
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let resp = get(&client, &format!("{}/ok", server.uri()), &fast_policy(3)).await;
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn succeeds_after_one_429() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let resp = get(&client, &server.uri(), &fast_policy(2)).await;
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let resp = get(&client, &server.uri(), &fast_policy(2)).await;
        assert_eq!(resp.status(), 503);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let resp = get(&client, &server.uri(), &fast_policy(3)).await;
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn connection_refused_is_retried_then_returned() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = reqwest::Client::new();
        let url = format!("http://127.0.0.1:{port}/");
        let mut calls = 0;
        let result = send_with_retry("test", &fast_policy(2), || {
            calls += 1;
            client.get(&url).send()
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn backoff_is_monotonic(attempt in 0u32..100) {
            let policy = RetryPolicy::default();
            prop_assert!(policy.backoff(attempt) >= policy.base_backoff);
            prop_assert!(policy.backoff(attempt + 1) >= policy.backoff(attempt));
        }
    }
}
