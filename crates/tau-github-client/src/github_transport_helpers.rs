//! Retry policy for GitHub requests, aware of primary and secondary rate limits.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;

/// Longest wait the moderator accepts before a retry. A run that would have to
/// sleep longer gives up and reports the failure instead.
const MAX_RETRY_WAIT: Duration = Duration::from_secs(30);
const RETRY_AFTER: &str = "retry-after";
const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    max_attempts: usize,
    base_delay: Duration,
}

impl RetryPolicy {
    pub(crate) fn new(max_attempts: usize, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(base_delay_ms.max(1)),
        }
    }

    /// Wait before the attempt after `attempt`, or `None` once attempts are
    /// spent or the server asks for a wait beyond the cap.
    pub(crate) fn next_delay(&self, attempt: usize, server_wait: Option<Duration>) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        match server_wait {
            Some(wait) if wait > MAX_RETRY_WAIT => None,
            Some(wait) => Some(wait.max(self.base_delay)),
            None => {
                let exponent = attempt.saturating_sub(1).min(10) as u32;
                let scaled = self
                    .base_delay
                    .saturating_mul(2_u32.saturating_pow(exponent));
                Some(scaled.min(MAX_RETRY_WAIT))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Rate-limit signals GitHub attaches to a failed response.
pub(crate) struct FailureSignals {
    pub(crate) rate_limited: bool,
    pub(crate) server_wait: Option<Duration>,
}

impl FailureSignals {
    pub(crate) fn from_headers(headers: &HeaderMap, now: DateTime<Utc>) -> Self {
        let retry_after = header_str(headers, RETRY_AFTER).and_then(|raw| parse_retry_after(raw, now));
        let exhausted = header_str(headers, RATE_LIMIT_REMAINING).is_some_and(|raw| raw.trim() == "0");
        let reset_wait = if exhausted {
            header_str(headers, RATE_LIMIT_RESET).and_then(|raw| wait_until_epoch(raw, now))
        } else {
            None
        };
        Self {
            rate_limited: exhausted || retry_after.is_some(),
            server_wait: retry_after.or(reset_wait),
        }
    }

    /// 429 and 5xx always retry. A 403 retries only when GitHub marks it as a
    /// secondary rate limit.
    pub(crate) fn is_retryable(&self, status: u16) -> bool {
        status == 429 || status >= 500 || (status == 403 && self.rate_limited)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}

/// `Retry-After` as delta seconds or as an HTTP date.
fn parse_retry_after(raw: &str, now: DateTime<Utc>) -> Option<Duration> {
    let raw = raw.trim();
    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    Some(wait_until(at, now))
}

fn wait_until_epoch(raw: &str, now: DateTime<Utc>) -> Option<Duration> {
    let seconds = raw.trim().parse::<i64>().ok()?;
    DateTime::from_timestamp(seconds, 0).map(|at| wait_until(at, now))
}

fn wait_until(at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (at - now).to_std().unwrap_or(Duration::ZERO)
}

pub(crate) fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request()
}

/// First `max_chars` characters of an error body, marked when cut.
pub(crate) fn error_excerpt(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

/// GraphQL endpoint for a REST api base. Enterprise servers expose REST at
/// `/api/v3` and GraphQL at `/api/graphql`.
pub(crate) fn graphql_endpoint(api_base: &str) -> String {
    let base = api_base.trim_end_matches('/');
    match base.strip_suffix("/api/v3") {
        Some(host) => format!("{host}/api/graphql"),
        None => format!("{base}/graphql"),
    }
}
