use std::thread;
use std::time::Duration;

use log::debug;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::Settings;
use crate::error::{PipelineError, RequestError};

const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Attempt budget and backoff curve for one logical request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_factor: f64,
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        RetryPolicy {
            max_attempts: settings.retry_count.max(1),
            backoff_factor: settings.backoff_factor,
        }
    }

    /// Pause after failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16) as i32;
        Duration::from_secs_f64(self.backoff_factor * 2f64.powi(exp))
    }
}

/// Blocking GET client for a single fixed endpoint, retrying transient failures.
pub struct RetryingHttpClient {
    client: Client,
    endpoint: Url,
    policy: RetryPolicy,
}

impl RetryingHttpClient {
    pub fn new(settings: &Settings) -> Result<Self, PipelineError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("address_standardizer/", env!("CARGO_PKG_VERSION"))),
        );

        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.read_timeout)
            .default_headers(headers)
            .build()?;

        Ok(RetryingHttpClient {
            client,
            endpoint: settings.endpoint.clone(),
            policy: RetryPolicy::from_settings(settings),
        })
    }

    /// GETs the endpoint with `params` and decodes the JSON body as `T`.
    pub fn get_json<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T, RequestError> {
        let body = self.get_with_retry(params)?;
        serde_json::from_str(&body).map_err(|e| RequestError::Decode(e.to_string()))
    }

    fn get_with_retry(&self, params: &[(&str, &str)]) -> Result<String, RequestError> {
        let mut attempt = 1;
        loop {
            let (err, retry_after) = match self.send_once(params) {
                Ok(body) => return Ok(body),
                Err(failure) => failure,
            };

            if !err.is_transient() || attempt >= self.policy.max_attempts {
                return Err(err);
            }

            let wait = retry_after
                .map(|d| d.min(MAX_RETRY_AFTER))
                .unwrap_or_else(|| self.policy.backoff(attempt));
            debug!(
                "Attempt {}/{} failed ({}); retrying in {:?}",
                attempt, self.policy.max_attempts, err, wait
            );
            thread::sleep(wait);
            attempt += 1;
        }
    }

    fn send_once(&self, params: &[(&str, &str)]) -> Result<String, (RequestError, Option<Duration>)> {
        let resp = self
            .client
            .get(self.endpoint.clone())
            .query(params)
            .send()
            .map_err(|e| {
                if e.is_builder() {
                    (RequestError::InvalidEndpoint(e.to_string()), None)
                } else {
                    (RequestError::Transport(e), None)
                }
            })?;

        let status = resp.status();
        if status.is_success() {
            return resp.text().map_err(|e| (RequestError::Transport(e), None));
        }

        let retry_after = retry_after(&resp);
        let body = resp.text().unwrap_or_default();
        Err((RequestError::Status { status, body }, retry_after))
    }
}

/// Integer-seconds `Retry-After`, honoured on 429 and 503 only.
fn retry_after(resp: &Response) -> Option<Duration> {
    if !matches!(resp.status(), StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE) {
        return None;
    }
    resp.headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy { max_attempts: 3, backoff_factor: 1.0 };
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
    }

    #[test]
    fn test_zero_factor_never_sleeps() {
        let policy = RetryPolicy { max_attempts: 3, backoff_factor: 0.0 };
        assert_eq!(policy.backoff(2), Duration::ZERO);
    }

    #[test]
    fn test_policy_from_settings() {
        let mut settings = Settings::new("in.csv", "out.csv");
        settings.retry_count = 4;
        settings.backoff_factor = 0.25;
        let policy = RetryPolicy::from_settings(&settings);
        assert_eq!(policy, RetryPolicy { max_attempts: 4, backoff_factor: 0.25 });
        assert_eq!(policy.backoff(3), Duration::from_secs(1));
    }
}
