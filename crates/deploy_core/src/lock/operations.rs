use std::time::{Duration, SystemTime};

use super::types::LockState;

/// Age of a lock file given its modification time.
///
/// A modification time in the future (clock skew) counts as age zero.
pub fn lock_age(modified: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(modified).unwrap_or(Duration::ZERO)
}

/// A lock is stale once it is strictly older than `stale_after`.
pub fn classify_lock(age: Duration, stale_after: Duration) -> LockState {
    if age > stale_after {
        LockState::Stale
    } else {
        LockState::Fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THIRTY_MINUTES: Duration = Duration::from_secs(30 * 60);

    #[test]
    fn test_young_lock_is_fresh() {
        assert_eq!(
            classify_lock(Duration::from_secs(5), THIRTY_MINUTES),
            LockState::Fresh
        );
    }

    #[test]
    fn test_lock_at_exact_timeout_is_fresh() {
        assert_eq!(classify_lock(THIRTY_MINUTES, THIRTY_MINUTES), LockState::Fresh);
    }

    #[test]
    fn test_old_lock_is_stale() {
        assert_eq!(
            classify_lock(THIRTY_MINUTES + Duration::from_secs(1), THIRTY_MINUTES),
            LockState::Stale
        );
    }

    #[test]
    fn test_lock_age_from_past_mtime() {
        let now = SystemTime::now();
        let modified = now - Duration::from_secs(90);
        assert_eq!(lock_age(modified, now), Duration::from_secs(90));
    }

    #[test]
    fn test_lock_age_future_mtime_is_zero() {
        let now = SystemTime::now();
        let modified = now + Duration::from_secs(600);
        assert_eq!(lock_age(modified, now), Duration::ZERO);
    }
}
