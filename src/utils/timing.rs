//! Jittered delay helpers.
//!
//! A fixed request cadence is trivially fingerprintable; every pause the
//! queue engine takes goes through these helpers so the rhythm stays
//! irregular.

use std::time::Duration;

use rand::Rng;

/// Returns `base` plus a uniformly random jitter in `[0, jitter]`.
pub fn jittered_delay(base: Duration, jitter: Duration) -> Duration {
    if jitter.is_zero() {
        return base;
    }
    let extra_ms = rand::rng().random_range(0..=jitter.as_millis() as u64);
    base + Duration::from_millis(extra_ms)
}

/// Sleeps for a jittered delay.
pub async fn sleep_jittered(base: Duration, jitter: Duration) {
    tokio::time::sleep(jittered_delay(base, jitter)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jittered_delay_within_bounds() {
        let base = Duration::from_millis(100);
        let jitter = Duration::from_millis(50);
        for _ in 0..100 {
            let d = jittered_delay(base, jitter);
            assert!(d >= base);
            assert!(d <= base + jitter);
        }
    }

    #[test]
    fn test_zero_jitter_is_exact() {
        let base = Duration::from_millis(250);
        assert_eq!(jittered_delay(base, Duration::ZERO), base);
    }

    #[test]
    fn test_jitter_actually_varies() {
        let base = Duration::from_millis(0);
        let jitter = Duration::from_millis(10_000);
        let samples: Vec<Duration> = (0..20)
            .map(|_| jittered_delay(base, jitter))
            .collect();
        let first = samples[0];
        assert!(
            samples.iter().any(|d| *d != first),
            "20 samples over a 10s jitter range should not all collide"
        );
    }
}
