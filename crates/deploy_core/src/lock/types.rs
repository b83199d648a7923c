use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::revision::CommitSha;

/// Record written into the lock file by the process holding it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub pid: u32,
    pub acquired_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<CommitSha>,
}

impl LockInfo {
    pub fn new(pid: u32, acquired_at: DateTime<Utc>, target: Option<CommitSha>) -> Self {
        Self {
            pid,
            acquired_at,
            target,
        }
    }

    /// Serializes the record as a single JSON line.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parses a lock record, returning `None` for foreign or truncated files.
    pub fn from_json(contents: &str) -> Option<Self> {
        serde_json::from_str(contents.trim()).ok()
    }
}

/// Whether an existing lock may still belong to a running deploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Younger than the maximum deploy duration; must be respected.
    Fresh,
    /// Older than the maximum deploy duration; may be reclaimed.
    Stale,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_lock_info_json_round_trip() {
        let target = CommitSha::parse(&"d".repeat(40)).unwrap();
        let info = LockInfo::new(
            4242,
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            Some(target),
        );

        let json = info.to_json().unwrap();
        assert!(json.contains("\"pid\":4242"));
        assert!(json.contains("2026-03-01T12:00:00Z"));
        assert_eq!(LockInfo::from_json(&json), Some(info));
    }

    #[test]
    fn test_lock_info_without_target() {
        let info = LockInfo::new(1, Utc::now(), None);
        assert!(!info.to_json().unwrap().contains("target"));
    }

    #[test]
    fn test_lock_info_garbage_is_none() {
        assert_eq!(LockInfo::from_json(""), None);
        assert_eq!(LockInfo::from_json("12345"), None);
        assert_eq!(LockInfo::from_json("{\"pid\":"), None);
    }
}
