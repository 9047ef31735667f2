use std::time::Duration;

use crate::config::RetryConfig;

/// High-level classification of a segment failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect or no bytes within the request timeout).
    Timeout,
    /// Server asked us to slow down (429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// Retryable server error (5xx).
    Http5xx(u16),
    /// Range ignored, Content-Range mismatch, short or long body.
    Protocol,
    /// Local store write failed.
    Storage,
    /// Worker marked stalled by the liveness monitor.
    Stalled,
    /// Job shutting down.
    Cancelled,
    /// Anything else (4xx, unexpected curl errors).
    Other,
}

impl ErrorKind {
    /// Stalls and cancellation are about the worker, not the segment: the
    /// segment goes straight back to the queue without spending an attempt.
    pub fn counts_as_attempt(&self) -> bool {
        !matches!(self, ErrorKind::Stalled | ErrorKind::Cancelled)
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Give up on the segment.
    NoRetry,
    /// Re-enqueue after the given delay.
    RetryAfter(Duration),
}

/// Per-segment attempt budget with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of failed attempts per segment (including the first).
    pub max_attempts: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(cfg.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(cfg.max_delay_secs),
        }
    }
}

impl RetryPolicy {
    /// Decide what to do after the `failures`-th failed attempt (1-based).
    ///
    /// Every failure kind is retried until the budget is spent; throttling
    /// backs off twice as long.
    pub fn decide(&self, failures: u32, kind: ErrorKind) -> RetryDecision {
        if !kind.counts_as_attempt() {
            return RetryDecision::RetryAfter(Duration::ZERO);
        }
        if failures >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        let exp = 1u32 << failures.saturating_sub(1).min(8);
        let mut raw = self.base_delay.saturating_mul(exp);
        if kind == ErrorKind::Throttled {
            raw = raw.saturating_mul(2);
        }
        RetryDecision::RetryAfter(raw.min(self.max_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delay(d: RetryDecision) -> Duration {
        match d {
            RetryDecision::RetryAfter(d) => d,
            RetryDecision::NoRetry => panic!("expected retry"),
        }
    }

    #[test]
    fn every_kind_is_retried_within_budget() {
        let p = RetryPolicy::default();
        for kind in [
            ErrorKind::Timeout,
            ErrorKind::Connection,
            ErrorKind::Http5xx(500),
            ErrorKind::Protocol,
            ErrorKind::Storage,
            ErrorKind::Other,
        ] {
            assert!(matches!(p.decide(1, kind), RetryDecision::RetryAfter(_)));
        }
    }

    #[test]
    fn exponential_backoff_grows_and_is_capped() {
        let mut p = RetryPolicy::default();
        p.max_attempts = 20;
        let d1 = delay(p.decide(1, ErrorKind::Timeout));
        let d2 = delay(p.decide(2, ErrorKind::Timeout));
        assert_eq!(d1, p.base_delay);
        assert_eq!(d2, p.base_delay * 2);
        let d_last = delay(p.decide(15, ErrorKind::Timeout));
        assert_eq!(d_last, p.max_delay);
    }

    #[test]
    fn throttling_backs_off_longer() {
        let p = RetryPolicy::default();
        let plain = delay(p.decide(1, ErrorKind::Http5xx(502)));
        let throttled = delay(p.decide(1, ErrorKind::Throttled));
        assert!(throttled > plain);
    }

    #[test]
    fn respects_max_attempts() {
        let p = RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        };
        assert!(matches!(p.decide(1, ErrorKind::Other), RetryDecision::RetryAfter(_)));
        assert!(matches!(p.decide(2, ErrorKind::Other), RetryDecision::RetryAfter(_)));
        assert_eq!(p.decide(3, ErrorKind::Other), RetryDecision::NoRetry);
    }

    #[test]
    fn stalls_never_spend_the_budget() {
        let p = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        assert_eq!(
            p.decide(50, ErrorKind::Stalled),
            RetryDecision::RetryAfter(Duration::ZERO)
        );
    }

    #[test]
    fn from_config() {
        let cfg = RetryConfig {
            max_attempts: 0,
            base_delay_secs: 0.5,
            max_delay_secs: 4,
        };
        let p = RetryPolicy::from(&cfg);
        assert_eq!(p.max_attempts, 1);
        assert_eq!(p.base_delay, Duration::from_millis(500));
        assert_eq!(p.max_delay, Duration::from_secs(4));
    }
}
