use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Source of wall-clock UNIX seconds for freshness decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        now_i64()
    }
}

pub fn now_i64() -> i64 {
    Utc::now().timestamp()
}

pub fn get_instant() -> Instant {
    Instant::now()
}

/// RFC 3339 rendering for logs; falls back to the raw number when out of range.
pub fn format_unix_ts(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_known_timestamp() {
        assert_eq!(format_unix_ts(0), "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn system_clock_tracks_chrono() {
        let before = Utc::now().timestamp();
        let now = SystemClock.now();
        assert!(now >= before && now <= before + 1);
    }
}
