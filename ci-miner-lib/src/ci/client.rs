//! Rate-limited HTTP client for the CI provider's REST API.
//!
//! Every page request goes through [`Client::get`], which masks transient server
//! errors behind a seatbelt retry layer with linear backoff and waits out exhausted
//! rate-limit quotas.

use super::LOG_TARGET;
use crate::Result;
use chrono::{DateTime, Utc};
use core::time::Duration;
use layered::{Execute, Service, Stack};
use ohno::{IntoAppError, bail};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use seatbelt::retry::{Backoff, Retry};
use seatbelt::{RecoveryInfo, ResilienceContext};
use tick::Clock;
use url::Url;

/// Retry and throttling knobs for [`Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Attempts per request before the failure becomes fatal.
    pub max_retries: u32,

    /// The n-th retry waits `base_backoff * n`.
    pub base_backoff: Duration,

    /// Timeout for a single HTTP exchange.
    pub request_timeout: Duration,

    /// After a success, sleep until reset once remaining quota is at or below this.
    pub preemptive_quota_threshold: u64,

    /// Upper bound on any single rate-limit wait.
    pub max_rate_limit_wait: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            base_backoff: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
            preemptive_quota_threshold: 0,
            max_rate_limit_wait: Duration::from_secs(3600),
        }
    }
}

/// Rate limit information from response headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitInfo {
    /// How long to sleep before the quota is usable again, if at all.
    ///
    /// A wait is only needed when the remaining quota is at or below `threshold` and the
    /// reset time lies in the future; the wait covers the reset plus one second.
    #[must_use]
    pub fn wait_until_reset(&self, threshold: u64, now: DateTime<Utc>, cap: Duration) -> Option<Duration> {
        if self.remaining > threshold || self.reset_at <= now {
            return None;
        }

        let until_reset = (self.reset_at - now).to_std().unwrap_or(Duration::ZERO) + Duration::from_secs(1);
        Some(until_reset.min(cap))
    }
}

/// CI provider API client
#[derive(Debug, Clone)]
#[expect(clippy::struct_field_names, reason = "client field stores the underlying HTTP client")]
pub struct Client {
    client: reqwest::Client,
    base_url: String,
    policy: FetchPolicy,
}

impl Client {
    /// Create a new client with an optional bearer token.
    pub fn new(token: Option<&str>, base_url: impl Into<String>, policy: FetchPolicy) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

        if let Some(t) = token {
            let mut auth_val = HeaderValue::from_str(&format!("Bearer {t}"))?;
            auth_val.set_sensitive(true);
            let _ = headers.insert(AUTHORIZATION, auth_val);
        }

        let client = reqwest::Client::builder()
            .user_agent("ci-miner")
            .default_headers(headers)
            .timeout(policy.request_timeout)
            .build()
            .into_app_err("unable to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            policy,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub const fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// Issue a GET and return the first successful response.
    ///
    /// - 403 with an exhausted quota and a future reset sleeps until the reset and
    ///   retries without consuming an attempt; any other 403 backs off like a 5xx.
    /// - 5xx and connection failures back off linearly and consume an attempt.
    /// - Any other non-2xx status fails immediately.
    ///
    /// After a success, a nearly exhausted quota triggers a preemptive sleep so the
    /// next request does not fail.
    pub async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let target = Url::parse_with_params(url, query).into_app_err_with(|| format!("invalid request URL '{url}'"))?;
        let attempts = self.policy.max_retries.max(1);
        let cap = self.policy.max_rate_limit_wait;

        let clock = Clock::new_tokio();
        let context = ResilienceContext::new(&clock).name("ci_get");
        let client = self.client.clone();

        let service = (
            Retry::layer("retry", &context)
                .clone_input()
                .recovery_with(move |result: &Result<reqwest::Response>, _| classify(result, cap))
                .max_retry_attempts(attempts - 1)
                .base_delay(self.policy.base_backoff)
                .backoff(Backoff::Linear)
                .on_retry(|_output, args| {
                    log::debug!(
                        target: LOG_TARGET,
                        "retrying GET (attempt {}, delay {}ms)",
                        args.attempt().index() + 1,
                        args.retry_delay().as_millis(),
                    );
                }),
            Execute::new(move |target: Url| {
                let client = client.clone();
                async move { client.get(target).send().await.map_err(ohno::AppError::from) }
            }),
        )
            .into_service();

        loop {
            let resp = match service.execute(target.clone()).await {
                Ok(resp) => resp,
                Err(e) => bail!("giving up on GET {url} after {attempts} attempt(s): {e}"),
            };

            let status = resp.status();
            if status == StatusCode::FORBIDDEN
                && let Some(wait) = reset_wait(&resp, 0, cap)
            {
                log::warn!(target: LOG_TARGET, "Rate limit reached, sleeping {}s until reset", wait.as_secs());
                tokio::time::sleep(wait).await;
                continue;
            }

            if status == StatusCode::FORBIDDEN || status.is_server_error() {
                bail!("giving up on GET {url} after {attempts} attempt(s): HTTP {status}");
            }

            if !status.is_success() {
                bail!("GET {url} failed with HTTP {status}");
            }

            if let Some(wait) = reset_wait(&resp, self.policy.preemptive_quota_threshold, cap) {
                log::info!(target: LOG_TARGET, "Rate limit nearly exhausted, sleeping {}s until reset", wait.as_secs());
                tokio::time::sleep(wait).await;
            }

            return Ok(resp);
        }
    }
}

/// Retry transport failures, 5xx, and 403s that are not an exhausted quota.
///
/// An exhausted quota is handed back to [`Client::get`], which sleeps until the reset
/// without spending the retry budget.
fn classify(result: &Result<reqwest::Response>, cap: Duration) -> RecoveryInfo {
    match result {
        Err(_) => RecoveryInfo::retry(),
        Ok(resp) if resp.status().is_server_error() => RecoveryInfo::retry(),
        Ok(resp) if resp.status() == StatusCode::FORBIDDEN => {
            if reset_wait(resp, 0, cap).is_some() {
                RecoveryInfo::never()
            } else {
                RecoveryInfo::retry()
            }
        }
        Ok(_) => RecoveryInfo::never(),
    }
}

fn reset_wait(resp: &reqwest::Response, threshold: u64, cap: Duration) -> Option<Duration> {
    extract_rate_limit_from_headers(resp.headers()).and_then(|rl| rl.wait_until_reset(threshold, Utc::now(), cap))
}

/// Extract rate limit information from API response headers
fn extract_rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let remaining = headers.get("x-ratelimit-remaining")?.to_str().ok()?.parse::<u64>().ok()?;

    let reset_timestamp = headers.get("x-ratelimit-reset")?.to_str().ok()?.parse::<i64>().ok()?;

    let reset_at = DateTime::from_timestamp(reset_timestamp, 0)?;

    Some(RateLimitInfo { remaining, reset_at })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ts: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(ts, 0).unwrap()
    }

    #[test]
    fn test_extract_rate_limit_from_headers() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("4999"));
        let _ = headers.insert("x-ratelimit-reset", HeaderValue::from_static("1704067200"));

        let rate_limit = extract_rate_limit_from_headers(&headers).unwrap();

        assert_eq!(rate_limit.remaining, 4999);
        assert_eq!(rate_limit.reset_at.timestamp(), 1_704_067_200);
    }

    #[test]
    fn test_extract_rate_limit_missing_or_invalid() {
        assert!(extract_rate_limit_from_headers(&HeaderMap::new()).is_none());

        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("invalid"));
        let _ = headers.insert("x-ratelimit-reset", HeaderValue::from_static("1704067200"));
        assert!(extract_rate_limit_from_headers(&headers).is_none());

        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        let _ = headers.insert("x-ratelimit-reset", HeaderValue::from_static("soon"));
        assert!(extract_rate_limit_from_headers(&headers).is_none());
    }

    #[test]
    fn test_wait_when_exhausted_with_future_reset() {
        let info = RateLimitInfo { remaining: 0, reset_at: at(1_000) };
        let wait = info.wait_until_reset(0, at(990), Duration::from_secs(3600));
        assert_eq!(wait, Some(Duration::from_secs(11)));
    }

    #[test]
    fn test_no_wait_when_quota_remains() {
        let info = RateLimitInfo { remaining: 10, reset_at: at(1_000) };
        assert_eq!(info.wait_until_reset(0, at(990), Duration::from_secs(3600)), None);
        assert_eq!(
            info.wait_until_reset(10, at(990), Duration::from_secs(3600)),
            Some(Duration::from_secs(11))
        );
    }

    #[test]
    fn test_no_wait_when_reset_passed() {
        let info = RateLimitInfo { remaining: 0, reset_at: at(1_000) };
        assert_eq!(info.wait_until_reset(0, at(1_000), Duration::from_secs(3600)), None);
        assert_eq!(info.wait_until_reset(0, at(2_000), Duration::from_secs(3600)), None);
    }

    #[test]
    fn test_wait_is_capped() {
        let info = RateLimitInfo { remaining: 0, reset_at: at(100_000) };
        assert_eq!(info.wait_until_reset(0, at(0), Duration::from_secs(60)), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_client_trims_base_url() {
        let client = Client::new(Some("token"), "https://api.github.com/", FetchPolicy::default()).unwrap();
        assert_eq!(client.base_url(), "https://api.github.com");
        assert_eq!(client.policy().max_retries, 4);
    }
}
