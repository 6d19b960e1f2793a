use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub const BASE_BACKOFF_MS: u64 = 200;

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(1);
static JITTER_COUNTER: AtomicU64 = AtomicU64::new(1);

pub fn should_retry_status(status: u16) -> bool {
    matches!(status, 408 | 409 | 425 | 429) || status >= 500
}

pub fn is_retryable_http_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

pub fn next_backoff_ms(attempt: usize) -> u64 {
    BASE_BACKOFF_MS.saturating_mul(1_u64 << attempt.min(6))
}

fn jittered(base: u64) -> u64 {
    if base <= 1 {
        return base;
    }
    // Keeps the delay within [50%, 100%] of `base`.
    let low = base / 2;
    let width = base - low;
    let seed = JITTER_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mixed = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).rotate_left(17) ^ 0xA24B_AED4_963E_E407;
    low + mixed % (width + 1)
}

pub fn parse_retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    let raw = headers.get("retry-after")?.to_str().ok()?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(seconds.saturating_mul(1000));
    }

    let retry_at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    let delay_ms = retry_at
        .signed_duration_since(Utc::now())
        .num_milliseconds();
    Some(u64::try_from(delay_ms).unwrap_or(0))
}

pub fn new_request_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let count = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("tau-mod-{millis}-{count}")
}

/// Backoff bookkeeping for one logical provider request.
#[derive(Debug)]
pub struct RetrySchedule {
    max_retries: usize,
    jitter: bool,
    budget_ms: u64,
    started: Instant,
}

impl RetrySchedule {
    pub fn start(max_retries: usize, jitter: bool, budget_ms: u64) -> Self {
        Self {
            max_retries,
            jitter,
            budget_ms,
            started: Instant::now(),
        }
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Returns how long to wait before the next attempt, or `None` once
    /// attempts or the retry budget (0 = unbounded) are exhausted.
    pub fn delay_after(&self, attempt: usize, retry_after_ms: Option<u64>) -> Option<Duration> {
        if attempt >= self.max_retries {
            return None;
        }
        let backoff_ms = delay_ms(attempt, self.jitter, retry_after_ms);
        let elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        if self.budget_ms > 0 && elapsed_ms.saturating_add(backoff_ms) > self.budget_ms {
            return None;
        }
        Some(Duration::from_millis(backoff_ms))
    }
}

fn delay_ms(attempt: usize, jitter: bool, retry_after_ms: Option<u64>) -> u64 {
    let base = next_backoff_ms(attempt);
    let backoff = if jitter { jittered(base) } else { base };
    retry_after_ms.map_or(backoff, |floor| backoff.max(floor))
}
