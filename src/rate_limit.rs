use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::header::HeaderMap;

/// Rate limit headers reported alongside a response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    /// Unix timestamp (seconds) at which the window resets.
    pub reset_at: Option<u64>,
    pub retry_after: Option<Duration>,
}

impl RateLimitInfo {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            limit: header_value(headers, "x-rate-limit-limit"),
            remaining: header_value(headers, "x-rate-limit-remaining"),
            reset_at: header_value(headers, "x-rate-limit-reset"),
            retry_after: header_value(headers, "retry-after").map(Duration::from_secs),
        }
    }

    /// How long to wait before the limit is lifted, measured from `now`.
    pub fn wait_hint(&self, now: SystemTime) -> Option<Duration> {
        if let Some(retry_after) = self.retry_after {
            return Some(retry_after);
        }
        let reset_at = UNIX_EPOCH + Duration::from_secs(self.reset_at?);
        Some(reset_at.duration_since(now).unwrap_or(Duration::ZERO))
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn header_value<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
