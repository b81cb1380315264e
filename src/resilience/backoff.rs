//! Exponential backoff with jitter for transport retries.

use rand::Rng;
use std::time::Duration;

use crate::config::RetryConfig;

/// Delay before retry number `retry` (1-based) of a logical call.
///
/// `base * 2^(retry-1)`, capped at `max`, plus up to 10% jitter so that
/// collectors hitting the same failing tenant do not retry in lockstep.
pub fn calculate_backoff(retry: u32, base_ms: u64, max_ms: u64) -> Duration {
    if retry == 0 {
        return Duration::ZERO;
    }

    let factor = 2u64.saturating_pow(retry - 1);
    let capped = base_ms.saturating_mul(factor).min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

/// Backoff for `retry` under the configured policy.
pub fn backoff_for(retry: u32, config: &RetryConfig) -> Duration {
    calculate_backoff(retry, config.base_delay_ms, config.max_delay_ms)
}

/// Sleep requested by a rate-limited response, bounded by the policy maximum.
pub fn rate_limit_delay(retry_after: Duration, config: &RetryConfig) -> Duration {
    retry_after.min(Duration::from_millis(config.max_delay_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(calculate_backoff(0, 100, 2000), Duration::ZERO);

        let b1 = calculate_backoff(1, 100, 2000);
        assert!(b1.as_millis() >= 100 && b1.as_millis() < 110);

        let b2 = calculate_backoff(2, 100, 2000);
        assert!(b2.as_millis() >= 200 && b2.as_millis() < 220);

        let capped = calculate_backoff(10, 100, 1000);
        assert!(capped.as_millis() >= 1000 && capped.as_millis() < 1100);
    }

    #[test]
    fn test_huge_retry_does_not_overflow() {
        let d = calculate_backoff(200, u64::MAX / 2, 5000);
        assert!(d.as_millis() >= 5000);
    }

    #[test]
    fn test_rate_limit_delay_bounded_by_max() {
        let config = RetryConfig {
            max_attempts: 3,
            base_delay_ms: 10,
            max_delay_ms: 2000,
        };
        assert_eq!(
            rate_limit_delay(Duration::from_secs(60), &config),
            Duration::from_millis(2000)
        );
        assert_eq!(
            rate_limit_delay(Duration::from_secs(1), &config),
            Duration::from_secs(1)
        );
        assert!(backoff_for(1, &config) >= Duration::from_millis(10));
    }
}
