//! Session-backed rate limiting.
//!
//! Two independent mechanisms:
//! - [`FixedWindowLimiter`] gates form submissions. Failed attempts count up; once the
//!   count hits the limit the client is blocked until `block` has passed since the last
//!   attempt, after which the counter starts over.
//! - [`SlidingWindowLimiter`] gates the poll API. Every request leaves a timestamp;
//!   timestamps older than the window are dropped on each check.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct AttemptRecord {
    count: u32,
    last_attempt: i64,
}

#[derive(Debug, Clone)]
pub struct FixedWindowLimiter {
    max_attempts: u32,
    block_secs: i64,
}

impl FixedWindowLimiter {
    pub fn new(max_attempts: u32, block: Duration) -> Self {
        Self {
            max_attempts,
            block_secs: block.as_secs() as i64,
        }
    }

    pub fn allow(&self, session: &Session, client_id: &str) -> bool {
        self.allow_at(session, client_id, crate::unix_now())
    }

    /// False only while the client is blocked. Never mutates the session.
    pub fn allow_at(&self, session: &Session, client_id: &str, now: i64) -> bool {
        match self.live_record(session, client_id, now) {
            Some(record) => record.count < self.max_attempts,
            None => true,
        }
    }

    pub fn record_attempt(&self, session: &mut Session, client_id: &str) {
        self.record_attempt_at(session, client_id, crate::unix_now());
    }

    /// Counts one attempt. A record whose window has elapsed is reset first.
    pub fn record_attempt_at(&self, session: &mut Session, client_id: &str, now: i64) {
        let mut record = self
            .live_record(session, client_id, now)
            .unwrap_or(AttemptRecord {
                count: 0,
                last_attempt: now,
            });
        record.count = record.count.saturating_add(1);
        record.last_attempt = now;

        if record.count >= self.max_attempts {
            debug!(client = %client_id, attempts = record.count, "Submission limit reached");
        }
        session.insert(&key(client_id), &record);
    }

    pub fn time_remaining(&self, session: &Session, client_id: &str) -> u64 {
        self.time_remaining_at(session, client_id, crate::unix_now())
    }

    /// Seconds until the block lifts; 0 when not blocked.
    pub fn time_remaining_at(&self, session: &Session, client_id: &str, now: i64) -> u64 {
        match self.live_record(session, client_id, now) {
            Some(record) if record.count >= self.max_attempts => {
                (self.block_secs - (now - record.last_attempt)).max(0) as u64
            }
            _ => 0,
        }
    }

    /// The stored record, unless its window has fully elapsed.
    fn live_record(&self, session: &Session, client_id: &str, now: i64) -> Option<AttemptRecord> {
        session
            .get::<AttemptRecord>(&key(client_id))
            .filter(|r| now - r.last_attempt < self.block_secs)
    }
}

fn key(client_id: &str) -> String {
    format!("rate_limit_{client_id}")
}

#[derive(Debug, Clone)]
pub struct SlidingWindowLimiter {
    max_requests: usize,
    window_secs: i64,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window_secs: window.as_secs() as i64,
        }
    }

    pub fn check_and_record(&self, session: &mut Session, client_id: &str) -> Result<(), u64> {
        self.check_and_record_at(session, client_id, crate::unix_now())
    }

    /// Admits the request and logs its timestamp, or returns the retry-after hint in
    /// seconds. Rejected requests are not logged.
    pub fn check_and_record_at(
        &self,
        session: &mut Session,
        client_id: &str,
        now: i64,
    ) -> Result<(), u64> {
        let key = api_key(client_id);
        let mut stamps: Vec<i64> = session.get(&key).unwrap_or_default();
        stamps.retain(|&t| now - t < self.window_secs);

        let result = if stamps.len() >= self.max_requests {
            debug!(client = %client_id, requests = stamps.len(), "API rate limit exceeded");
            Err(self.window_secs as u64)
        } else {
            stamps.push(now);
            Ok(())
        };

        session.insert(&key, &stamps);
        result
    }
}

fn api_key(client_id: &str) -> String {
    format!("api_requests_{client_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT: &str = "client-a";

    fn fixed() -> FixedWindowLimiter {
        FixedWindowLimiter::new(5, Duration::from_secs(300))
    }

    #[test]
    fn test_fresh_client_allowed() {
        let limiter = fixed();
        let session = Session::new(0);
        assert!(limiter.allow_at(&session, CLIENT, 0));
        assert_eq!(limiter.time_remaining_at(&session, CLIENT, 0), 0);
    }

    #[test]
    fn test_blocks_after_max_attempts() {
        let limiter = fixed();
        let mut session = Session::new(0);

        for i in 0..4 {
            limiter.record_attempt_at(&mut session, CLIENT, i);
            assert!(limiter.allow_at(&session, CLIENT, i));
        }
        limiter.record_attempt_at(&mut session, CLIENT, 4);
        assert!(!limiter.allow_at(&session, CLIENT, 4));
        assert_eq!(limiter.time_remaining_at(&session, CLIENT, 4), 300);
        assert_eq!(limiter.time_remaining_at(&session, CLIENT, 104), 200);
    }

    #[test]
    fn test_unblocks_after_block_duration() {
        let limiter = fixed();
        let mut session = Session::new(0);
        for _ in 0..5 {
            limiter.record_attempt_at(&mut session, CLIENT, 1000);
        }
        assert!(!limiter.allow_at(&session, CLIENT, 1299));

        assert!(limiter.allow_at(&session, CLIENT, 1300));
        assert_eq!(limiter.time_remaining_at(&session, CLIENT, 1300), 0);
    }

    #[test]
    fn test_elapsed_window_resets_instead_of_incrementing() {
        let limiter = fixed();
        let mut session = Session::new(0);
        for _ in 0..4 {
            limiter.record_attempt_at(&mut session, CLIENT, 0);
        }
        // Four stale attempts plus one new one must not block.
        limiter.record_attempt_at(&mut session, CLIENT, 400);
        assert!(limiter.allow_at(&session, CLIENT, 400));

        for _ in 0..4 {
            limiter.record_attempt_at(&mut session, CLIENT, 401);
        }
        assert!(!limiter.allow_at(&session, CLIENT, 401));
    }

    #[test]
    fn test_allow_is_read_only() {
        let limiter = fixed();
        let mut session = Session::new(0);
        limiter.record_attempt_at(&mut session, CLIENT, 0);
        let snapshot = session.clone();

        for t in [0, 10, 500, 10_000] {
            limiter.allow_at(&session, CLIENT, t);
            limiter.time_remaining_at(&session, CLIENT, t);
        }
        assert_eq!(session, snapshot);
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = fixed();
        let mut session = Session::new(0);
        for _ in 0..5 {
            limiter.record_attempt_at(&mut session, CLIENT, 0);
        }
        assert!(!limiter.allow_at(&session, CLIENT, 1));
        assert!(limiter.allow_at(&session, "client-b", 1));
    }

    #[test]
    fn test_sliding_window_limit() {
        let limiter = SlidingWindowLimiter::new(30, Duration::from_secs(60));
        let mut session = Session::new(0);

        for i in 0..30 {
            assert_eq!(limiter.check_and_record_at(&mut session, CLIENT, i), Ok(()));
        }
        assert_eq!(limiter.check_and_record_at(&mut session, CLIENT, 30), Err(60));
    }

    #[test]
    fn test_sliding_window_drops_old_timestamps() {
        let limiter = SlidingWindowLimiter::new(3, Duration::from_secs(60));
        let mut session = Session::new(0);

        limiter.check_and_record_at(&mut session, CLIENT, 0).unwrap();
        limiter.check_and_record_at(&mut session, CLIENT, 20).unwrap();
        limiter.check_and_record_at(&mut session, CLIENT, 40).unwrap();
        assert!(limiter.check_and_record_at(&mut session, CLIENT, 59).is_err());

        // The request at t=0 slides out of the window at t=60.
        assert!(limiter.check_and_record_at(&mut session, CLIENT, 60).is_ok());
        assert!(limiter.check_and_record_at(&mut session, CLIENT, 61).is_err());
        assert!(limiter.check_and_record_at(&mut session, CLIENT, 80).is_ok());
    }

    #[test]
    fn test_limiters_do_not_share_state() {
        let fixed = fixed();
        let sliding = SlidingWindowLimiter::new(1, Duration::from_secs(60));
        let mut session = Session::new(0);

        sliding.check_and_record_at(&mut session, CLIENT, 0).unwrap();
        assert!(sliding.check_and_record_at(&mut session, CLIENT, 1).is_err());
        assert!(fixed.allow_at(&session, CLIENT, 1));
    }
}
