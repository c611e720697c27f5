//! Fixed-window request throttling, in memory and per process.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap};

/// Expired windows are swept once the table grows past this many identifiers.
const PURGE_THRESHOLD: usize = 10_000;
const AUTH_PREFIX_CHARS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_in: Duration,
}

impl RateLimitStatus {
    /// Whole seconds until the window resets, never less than one.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.reset_in.as_secs();
        if self.reset_in.subsec_nanos() > 0 || secs == 0 {
            secs + 1
        } else {
            secs
        }
    }
}

#[derive(Debug)]
struct Window {
    count: u32,
    reset_at: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, identifier: &str) -> RateLimitStatus {
        self.check_at(identifier, Instant::now())
    }

    pub fn check_at(&self, identifier: &str, now: Instant) -> RateLimitStatus {
        // The table holds plain counters, so a poisoned lock is still usable.
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        if windows.len() > PURGE_THRESHOLD {
            windows.retain(|_, w| w.reset_at > now);
        }

        match windows.get_mut(identifier) {
            Some(w) if w.reset_at > now => {
                let reset_in = w.reset_at - now;
                if w.count >= self.max_requests {
                    return RateLimitStatus {
                        allowed: false,
                        remaining: 0,
                        reset_in,
                    };
                }
                w.count += 1;
                RateLimitStatus {
                    allowed: true,
                    remaining: self.max_requests - w.count,
                    reset_in,
                }
            }
            _ => {
                windows.insert(
                    identifier.to_string(),
                    Window {
                        count: 1,
                        reset_at: now + self.window,
                    },
                );
                RateLimitStatus {
                    allowed: true,
                    remaining: self.max_requests.saturating_sub(1),
                    reset_in: self.window,
                }
            }
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// `user:<auth prefix>` when an Authorization header is present, otherwise
/// `ip:<client address>` from the proxy headers.
pub fn identifier(headers: &HeaderMap) -> String {
    if let Some(auth) = header_str(headers, header::AUTHORIZATION.as_str()) {
        let prefix: String = auth.chars().take(AUTH_PREFIX_CHARS).collect();
        return format!("user:{prefix}");
    }

    let forwarded = header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    let ip = forwarded
        .or_else(|| header_str(headers, "x-real-ip"))
        .unwrap_or("unknown");
    format!("ip:{ip}")
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
