use std::fmt;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{error, warn};

const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY_SECS: u64 = 5;
const REQUEST_TIMEOUT_SECS: u64 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A user-visible diagnostic, rendered alongside the results.
#[derive(Debug, Clone)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

/// Per-request sink for notices. Everything pushed here is also mirrored to
/// the log at the matching level.
#[derive(Debug, Default)]
pub struct Notices(Vec<Notice>);

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.0.push(Notice {
            severity: Severity::Warning,
            message,
        });
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{}", message);
        self.0.push(Notice {
            severity: Severity::Error,
            message,
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    /// Fixed pause between attempts. Not a backoff schedule; callers that
    /// need backpressure semantics must bring their own.
    pub retry_delay: Duration,
    /// Upper bound on a single attempt, connect through body.
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            retry_delay: Duration::from_secs(RETRY_DELAY_SECS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug)]
pub enum FetchError {
    /// Every attempt timed out or failed to connect.
    Exhausted { attempts: u32 },
    /// HTTP error status, malformed body, or another failure that retrying
    /// will not fix.
    Terminal(reqwest::Error),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Exhausted { attempts } => {
                write!(f, "no response after {} attempts", attempts)
            }
            FetchError::Terminal(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::Exhausted { .. } => None,
            FetchError::Terminal(err) => Some(err),
        }
    }
}

/// GET `url` with `query` and parse the JSON body, retrying transient
/// failures up to the policy's attempt bound with a fixed delay in between.
///
/// Timeouts and connection-level failures are transient; an HTTP error status
/// or anything else ends the call immediately. The discriminated error keeps
/// "fetch failed" separate from a legitimately empty payload at the call
/// sites.
pub async fn fetch_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
    policy: &RetryPolicy,
    notices: &mut Notices,
) -> Result<T, FetchError> {
    let max_attempts = policy.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        match try_fetch::<T>(client, url, query, policy.request_timeout).await {
            Ok(body) => return Ok(body),
            Err(err) if err.is_timeout() => {
                notices.warn(format!("Attempt {}: API request timed out. Retrying...", attempt));
            }
            Err(err) if err.is_connect() => {
                notices.warn(format!("Attempt {}: Network issue. Check your connection.", attempt));
            }
            Err(err) if err.is_status() => {
                notices.error(format!("HTTP Error: {}", err));
                return Err(FetchError::Terminal(err));
            }
            Err(err) => {
                notices.error(format!("Unexpected Error: {}", err));
                return Err(FetchError::Terminal(err));
            }
        }
        if attempt < max_attempts {
            tokio::time::sleep(policy.retry_delay).await;
        }
    }
    Err(FetchError::Exhausted {
        attempts: max_attempts,
    })
}

async fn try_fetch<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, String)],
    timeout: Duration,
) -> Result<T, reqwest::Error> {
    let response = client
        .get(url)
        .query(query)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?;
    response.json::<T>().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::time::Instant;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            retry_delay: Duration::from_millis(0),
            request_timeout: Duration::from_millis(100),
        }
    }

    fn count(notices: &Notices, severity: Severity) -> usize {
        notices.iter().filter(|n| n.severity == severity).count()
    }

    #[tokio::test]
    async fn returns_body_on_first_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new();
        let mut notices = Notices::new();
        let url = format!("{}/ping", server.uri());
        let body: Value = fetch_json(&client, &url, &[], &quick(3), &mut notices)
            .await
            .unwrap();
        assert_eq!(body["ok"], true);
        assert!(notices.is_empty());
    }

    #[tokio::test]
    async fn http_error_is_terminal_and_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new();
        let mut notices = Notices::new();
        let result: Result<Value, FetchError> =
            fetch_json(&client, &server.uri(), &[], &quick(3), &mut notices).await;
        assert!(matches!(result, Err(FetchError::Terminal(_))));
        assert_eq!(count(&notices, Severity::Error), 1);
        assert_eq!(count(&notices, Severity::Warning), 0);
    }

    #[tokio::test]
    async fn malformed_body_is_terminal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new();
        let mut notices = Notices::new();
        let result: Result<Value, FetchError> =
            fetch_json(&client, &server.uri(), &[], &quick(3), &mut notices).await;
        assert!(matches!(result, Err(FetchError::Terminal(_))));
        assert_eq!(count(&notices, Severity::Error), 1);
    }

    #[tokio::test]
    async fn timeouts_consume_every_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({}))
                    .set_delay(Duration::from_millis(400)),
            )
            .expect(3)
            .mount(&server)
            .await;

        let client = Client::new();
        let mut notices = Notices::new();
        let result: Result<Value, FetchError> =
            fetch_json(&client, &server.uri(), &[], &quick(3), &mut notices).await;
        assert!(matches!(result, Err(FetchError::Exhausted { attempts: 3 })));
        assert_eq!(count(&notices, Severity::Warning), 3);
    }

    #[tokio::test]
    async fn connection_errors_are_retryable() {
        // Nothing listens on the discard port.
        let client = Client::new();
        let mut notices = Notices::new();
        let result: Result<Value, FetchError> =
            fetch_json(&client, "http://127.0.0.1:9", &[], &quick(2), &mut notices).await;
        assert!(matches!(result, Err(FetchError::Exhausted { attempts: 2 })));
        assert_eq!(count(&notices, Severity::Warning), 2);
    }

    #[tokio::test]
    async fn recovers_after_transient_failure() {
        let server = MockServer::start().await;
        // First request runs into the timeout, the second one is served fast.
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ok": false}))
                    .set_delay(Duration::from_millis(400)),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let client = Client::new();
        let mut notices = Notices::new();
        let body: Value = fetch_json(&client, &server.uri(), &[], &quick(3), &mut notices)
            .await
            .unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(count(&notices, Severity::Warning), 1);
    }

    #[tokio::test]
    async fn sleeps_between_attempts_but_not_after_the_last() {
        let client = Client::new();

        // Two inter-attempt delays for three attempts.
        let policy = RetryPolicy {
            max_attempts: 3,
            retry_delay: Duration::from_millis(150),
            request_timeout: Duration::from_millis(100),
        };
        let mut notices = Notices::new();
        let start = Instant::now();
        let result: Result<Value, FetchError> =
            fetch_json(&client, "http://127.0.0.1:9", &[], &policy, &mut notices).await;
        assert!(matches!(result, Err(FetchError::Exhausted { attempts: 3 })));
        assert!(start.elapsed() >= Duration::from_millis(300));

        // A single attempt returns without ever touching the delay.
        let policy = RetryPolicy {
            max_attempts: 1,
            retry_delay: Duration::from_secs(60),
            request_timeout: Duration::from_millis(100),
        };
        let mut notices = Notices::new();
        let start = Instant::now();
        let result: Result<Value, FetchError> =
            fetch_json(&client, "http://127.0.0.1:9", &[], &policy, &mut notices).await;
        assert!(matches!(result, Err(FetchError::Exhausted { attempts: 1 })));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
