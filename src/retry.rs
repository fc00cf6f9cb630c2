use std::time::Duration;

use reqwest::StatusCode;

use crate::{BlobVisionError, Result};

/// Exponential backoff schedule applied to every request a client sends.
///
/// Retry attempt `n` (1-based) waits `min(base_delay * 2^(n-1), max_delay)`.
/// At most `max_retries` retries follow the initial attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Builds a policy, rejecting a zero base delay or `base_delay > max_delay`.
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Result<Self> {
        if base_delay.is_zero() {
            return Err(BlobVisionError::InvalidConfig(
                "retry base delay must be greater than zero".to_owned(),
            ));
        }
        if base_delay > max_delay {
            return Err(BlobVisionError::InvalidConfig(format!(
                "retry base delay {base_delay:?} exceeds max delay {max_delay:?}"
            )));
        }
        Ok(Self {
            max_retries,
            base_delay,
            max_delay,
        })
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Total number of attempts, the initial one included.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry attempt `attempt` (1-based). Attempt 0 is the
    /// initial request and never waits.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exp = (attempt - 1).min(31);
        let multiplier = 1u32 << exp;
        self.base_delay
            .checked_mul(multiplier)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Delays for every retry this policy allows, in order.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.max_retries).map(|n| self.delay_for(n)).collect()
    }

    /// Whether `retries_done` retries leave room for another one.
    pub fn allows_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }

    /// 429 and every 5xx are worth retrying; other 4xx are final.
    pub fn is_transient_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    pub fn is_transient_transport(err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::StatusCode;

    use crate::{BlobVisionError, RetryPolicy};

    fn secs(value: u64) -> Duration {
        Duration::from_secs(value)
    }

    #[test]
    fn default_schedule_doubles_from_base() {
        let policy = RetryPolicy::new(3, secs(1), secs(10)).expect("valid policy");
        assert_eq!(policy.schedule(), vec![secs(1), secs(2), secs(4)]);
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy, RetryPolicy::default());
    }

    #[test]
    fn delays_are_capped_at_max_delay() {
        let policy = RetryPolicy::new(6, secs(1), secs(10)).expect("valid policy");
        assert_eq!(
            policy.schedule(),
            vec![secs(1), secs(2), secs(4), secs(8), secs(10), secs(10)]
        );
    }

    #[test]
    fn huge_attempt_numbers_saturate_to_max_delay() {
        let policy = RetryPolicy::new(100, Duration::from_millis(250), secs(30)).expect("valid");
        assert_eq!(policy.delay_for(64), secs(30));
        assert_eq!(policy.delay_for(u32::MAX), secs(30));
    }

    #[test]
    fn every_delay_matches_closed_form() {
        let base = Duration::from_millis(150);
        let max = Duration::from_millis(5_000);
        let policy = RetryPolicy::new(12, base, max).expect("valid");
        for n in 1..=12u32 {
            let expected = (base * 2u32.pow(n - 1)).min(max);
            assert_eq!(policy.delay_for(n), expected, "attempt {n}");
        }
        assert_eq!(policy.delay_for(0), Duration::ZERO);
    }

    #[test]
    fn zero_retries_has_empty_schedule() {
        let policy = RetryPolicy::new(0, secs(1), secs(1)).expect("valid");
        assert!(policy.schedule().is_empty());
        assert_eq!(policy.max_attempts(), 1);
        assert!(!policy.allows_retry(0));
    }

    #[test]
    fn rejects_zero_base_delay() {
        let err = RetryPolicy::new(3, Duration::ZERO, secs(1)).expect_err("must fail");
        assert!(matches!(err, BlobVisionError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_base_above_max() {
        let err = RetryPolicy::new(3, secs(20), secs(10)).expect_err("must fail");
        assert!(matches!(err, BlobVisionError::InvalidConfig(_)));
    }

    #[test]
    fn classifies_statuses() {
        assert!(RetryPolicy::is_transient_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(RetryPolicy::is_transient_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(RetryPolicy::is_transient_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(RetryPolicy::is_transient_status(StatusCode::GATEWAY_TIMEOUT));
        assert!(!RetryPolicy::is_transient_status(StatusCode::BAD_REQUEST));
        assert!(!RetryPolicy::is_transient_status(StatusCode::UNAUTHORIZED));
        assert!(!RetryPolicy::is_transient_status(StatusCode::NOT_FOUND));
    }
}
