//! Fixed-window free-tier quota guard.

use std::sync::Mutex;

use chrono::{DateTime, Datelike, Local, Timelike};

use crate::config::AiSettings;
use crate::error::{AiError, AiResult, RateLimitKind};

#[derive(Debug, Default)]
struct Windows {
    minute: Option<(i32, u32, u32, u32)>,
    day: Option<(i32, u32)>,
    requests_minute: u32,
    requests_day: u32,
    tokens_minute: u64,
}

/// Per-minute request, per-day request and per-minute token counters.
///
/// Windows follow the wall clock: counters reset when the minute or the
/// day changes. A refused request consumes nothing.
#[derive(Debug)]
pub struct RateLimiter {
    enabled: bool,
    max_rpm: u32,
    max_rpd: u32,
    max_tpm: u64,
    windows: Mutex<Windows>,
}

impl RateLimiter {
    pub fn new(max_rpm: u32, max_rpd: u32, max_tpm: u64) -> Self {
        Self {
            enabled: true,
            max_rpm,
            max_rpd,
            max_tpm,
            windows: Mutex::new(Windows::default()),
        }
    }

    /// A limiter that accepts everything.
    pub fn unlimited() -> Self {
        Self {
            enabled: false,
            ..Self::new(0, 0, 0)
        }
    }

    pub fn from_settings(settings: &AiSettings) -> Self {
        if settings.free_tier {
            Self::new(settings.max_rpm, settings.max_rpd, settings.max_tpm)
        } else {
            Self::unlimited()
        }
    }

    /// Reserve one request of `tokens` estimated tokens now.
    pub fn acquire(&self, tokens: u64) -> AiResult<()> {
        self.acquire_at(Local::now(), tokens)
    }

    pub fn acquire_at(&self, now: DateTime<Local>, tokens: u64) -> AiResult<()> {
        if !self.enabled {
            return Ok(());
        }

        let mut w = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        let minute = (now.year(), now.ordinal(), now.hour(), now.minute());
        if w.minute != Some(minute) {
            w.minute = Some(minute);
            w.requests_minute = 0;
            w.tokens_minute = 0;
        }
        let day = (now.year(), now.ordinal());
        if w.day != Some(day) {
            w.day = Some(day);
            w.requests_day = 0;
        }

        if w.requests_minute >= self.max_rpm {
            return Err(AiError::RateLimited(RateLimitKind::RequestsPerMinute));
        }
        if w.requests_day >= self.max_rpd {
            return Err(AiError::RateLimited(RateLimitKind::RequestsPerDay));
        }
        if w.tokens_minute + tokens > self.max_tpm {
            return Err(AiError::RateLimited(RateLimitKind::TokensPerMinute));
        }

        w.requests_minute += 1;
        w.requests_day += 1;
        w.tokens_minute += tokens;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32, minute: u32, second: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, day, hour, minute, second).unwrap()
    }

    fn kind(result: AiResult<()>) -> Option<RateLimitKind> {
        match result {
            Err(AiError::RateLimited(kind)) => Some(kind),
            _ => None,
        }
    }

    #[test]
    fn test_requests_per_minute() {
        let limiter = RateLimiter::new(2, 100, 1_000);

        assert!(limiter.acquire_at(at(1, 10, 0, 1), 1).is_ok());
        assert!(limiter.acquire_at(at(1, 10, 0, 2), 1).is_ok());
        assert_eq!(
            kind(limiter.acquire_at(at(1, 10, 0, 3), 1)),
            Some(RateLimitKind::RequestsPerMinute)
        );

        // next minute resets the window
        assert!(limiter.acquire_at(at(1, 10, 1, 0), 1).is_ok());
    }

    #[test]
    fn test_requests_per_day() {
        let limiter = RateLimiter::new(10, 2, 1_000);

        assert!(limiter.acquire_at(at(1, 10, 0, 0), 1).is_ok());
        assert!(limiter.acquire_at(at(1, 11, 0, 0), 1).is_ok());
        assert_eq!(
            kind(limiter.acquire_at(at(1, 12, 0, 0), 1)),
            Some(RateLimitKind::RequestsPerDay)
        );
        assert!(limiter.acquire_at(at(2, 0, 0, 0), 1).is_ok());
    }

    #[test]
    fn test_tokens_per_minute_and_refusal_is_free() {
        let limiter = RateLimiter::new(10, 100, 100);

        assert!(limiter.acquire_at(at(1, 10, 0, 0), 80).is_ok());
        assert_eq!(
            kind(limiter.acquire_at(at(1, 10, 0, 1), 30)),
            Some(RateLimitKind::TokensPerMinute)
        );
        // the refused 30 tokens were not counted
        assert!(limiter.acquire_at(at(1, 10, 0, 2), 20).is_ok());
    }

    #[test]
    fn test_disabled_outside_free_tier() {
        let settings = AiSettings {
            free_tier: false,
            max_rpm: 0,
            ..AiSettings::default()
        };
        let limiter = RateLimiter::from_settings(&settings);

        for _ in 0..50 {
            assert!(limiter.acquire(10_000_000).is_ok());
        }
    }
}
