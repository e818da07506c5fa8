//! Session expiry evaluation
//!
//! Pure functions of the policy and the session timestamps; the codec calls
//! them after every successful decrypt.

use crate::settings::ExpiryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Expired,
    /// `renew` is set when the rolling window should be pushed forward
    Valid { renew: bool },
}

fn secs(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Epoch second after which the session is no longer accepted
#[must_use]
pub fn deadline(policy: &ExpiryPolicy, created_at: i64, updated_at: i64) -> i64 {
    match *policy {
        ExpiryPolicy::Rolling {
            rolling_duration,
            absolute_duration,
        } => {
            let idle = updated_at.saturating_add(secs(rolling_duration));
            absolute_duration.map_or(idle, |absolute| {
                idle.min(created_at.saturating_add(secs(absolute)))
            })
        }
        ExpiryPolicy::Absolute { absolute_duration } => {
            created_at.saturating_add(secs(absolute_duration))
        }
    }
}

/// Seconds that must pass since the last write before a rolling session is
/// re-issued
#[must_use]
pub const fn renewal_threshold(rolling_duration: u64) -> u64 {
    rolling_duration / 10
}

#[must_use]
pub fn evaluate(policy: &ExpiryPolicy, created_at: i64, updated_at: i64, now: i64) -> Freshness {
    if now > deadline(policy, created_at, updated_at) {
        return Freshness::Expired;
    }
    match *policy {
        ExpiryPolicy::Rolling {
            rolling_duration, ..
        } => {
            let elapsed = now.saturating_sub(updated_at);
            Freshness::Valid {
                renew: elapsed >= secs(renewal_threshold(rolling_duration)),
            }
        }
        ExpiryPolicy::Absolute { .. } => Freshness::Valid { renew: false },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROLLING: ExpiryPolicy = ExpiryPolicy::Rolling {
        rolling_duration: 1000,
        absolute_duration: Some(5000),
    };
    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_rolling_idle_expiry() {
        assert_eq!(evaluate(&ROLLING, NOW - 10, NOW - 1001, NOW), Freshness::Expired);
        assert_eq!(
            evaluate(&ROLLING, NOW - 10, NOW - 1000, NOW),
            Freshness::Valid { renew: true }
        );
    }

    #[test]
    fn test_rolling_bounded_by_absolute() {
        assert_eq!(evaluate(&ROLLING, NOW - 5001, NOW - 5, NOW), Freshness::Expired);
        assert_eq!(deadline(&ROLLING, NOW - 4900, NOW), NOW + 100);
    }

    #[test]
    fn test_renewal_threshold() {
        assert_eq!(
            evaluate(&ROLLING, NOW - 99, NOW - 99, NOW),
            Freshness::Valid { renew: false }
        );
        assert_eq!(
            evaluate(&ROLLING, NOW - 100, NOW - 100, NOW),
            Freshness::Valid { renew: true }
        );
    }

    #[test]
    fn test_rolling_without_absolute() {
        let policy = ExpiryPolicy::Rolling {
            rolling_duration: 1000,
            absolute_duration: None,
        };
        assert_eq!(
            evaluate(&policy, NOW - 1_000_000, NOW - 500, NOW),
            Freshness::Valid { renew: true }
        );
    }

    #[test]
    fn test_absolute_only() {
        let policy = ExpiryPolicy::Absolute {
            absolute_duration: 3600,
        };
        assert_eq!(evaluate(&policy, NOW - 3601, NOW, NOW), Freshness::Expired);
        assert_eq!(
            evaluate(&policy, NOW - 3600, NOW - 3600, NOW),
            Freshness::Valid { renew: false }
        );
    }
}
