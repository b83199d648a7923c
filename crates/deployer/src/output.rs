//! Operator-facing output for the `status`, `unlock` and `once` commands.

pub use anstream::println as aprintln;

use smartdiary_deploy_core::lock::LockState;
use smartdiary_deploy_core::revision::CommitSha;

use crate::cycle::CycleOutcome;
use crate::lock::LockStatus;

/// Tokyo Night colors, matching the rest of the tooling.
pub mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const RED: &str = "\x1b[38;2;247;118;142m"; // #f7768e
    pub const GREEN: &str = "\x1b[38;2;158;206;106m"; // #9ece6a
    pub const YELLOW: &str = "\x1b[38;2;224;175;104m"; // #e0af68
    pub const BLUE: &str = "\x1b[38;2;122;162;247m"; // #7aa2f7
}

pub fn p_g(text: &str) -> String {
    format!("{}{}{}", colors::GREEN, text, colors::RESET)
}

pub fn p_r(text: &str) -> String {
    format!("{}{}{}", colors::RED, text, colors::RESET)
}

pub fn p_y(text: &str) -> String {
    format!("{}{}{}", colors::YELLOW, text, colors::RESET)
}

pub fn p_b(text: &str) -> String {
    format!("{}{}{}", colors::BLUE, text, colors::RESET)
}

/// Renders the `status` report.
pub fn format_status(last_deployed: Option<&CommitSha>, lock: &LockStatus) -> String {
    let deployed = match last_deployed {
        Some(sha) => p_g(sha.as_str()),
        None => p_y("nothing deployed yet"),
    };

    let lock_line = match lock {
        LockStatus::Free => p_g("free"),
        LockStatus::Held { age, state, holder } => {
            let label = match state {
                LockState::Fresh => p_y("held"),
                LockState::Stale => p_r("stale"),
            };
            let mut line = format!("{label} for {}", humantime::format_duration(*age));
            if let Some(holder) = holder {
                line.push_str(&format!(
                    " by pid {} since {}",
                    holder.pid,
                    holder.acquired_at.to_rfc3339()
                ));
                if let Some(target) = &holder.target {
                    line.push_str(&format!(" (deploying {})", target.short()));
                }
            }
            line
        }
    };

    format!(
        "{}\n  Last deployed: {}\n  Deploy lock:   {}",
        p_b("SmartDiary deployer"),
        deployed,
        lock_line
    )
}

/// One-line summary of a finished poll for the `once` command.
pub fn format_outcome(outcome: &CycleOutcome) -> String {
    match outcome {
        CycleOutcome::UpToDate { sha } => format!("Up to date at {}", sha.short()),
        CycleOutcome::LockBusy { age } => format!(
            "Skipped: another deploy has held the lock for {}",
            humantime::format_duration(*age)
        ),
        CycleOutcome::Deployed { sha, services, .. } if services.is_empty() => {
            format!("Recorded {} (no service affected)", sha.short())
        }
        CycleOutcome::Deployed { sha, services, .. } => {
            format!("Deployed {} ({})", sha.short(), services.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use smartdiary_deploy_core::lock::LockInfo;
    use std::time::Duration;

    fn sha() -> CommitSha {
        CommitSha::parse("3f786850e387550fdab836ed7e6dc881de23001b").unwrap()
    }

    #[test]
    fn test_status_free_lock() {
        let text = format_status(Some(&sha()), &LockStatus::Free);
        assert!(text.contains("3f786850e387550fdab836ed7e6dc881de23001b"));
        assert!(text.contains("free"));
    }

    #[test]
    fn test_status_nothing_deployed() {
        let text = format_status(None, &LockStatus::Free);
        assert!(text.contains("nothing deployed yet"));
    }

    #[test]
    fn test_status_held_lock_shows_holder() {
        let lock = LockStatus::Held {
            age: Duration::from_secs(90),
            state: LockState::Fresh,
            holder: Some(LockInfo::new(321, Utc::now(), Some(sha()))),
        };
        let text = format_status(None, &lock);

        assert!(text.contains("held"));
        assert!(text.contains("1m 30s"));
        assert!(text.contains("pid 321"));
        assert!(text.contains("deploying 3f78685"));
    }

    #[test]
    fn test_status_stale_lock() {
        let lock = LockStatus::Held {
            age: Duration::from_secs(7200),
            state: LockState::Stale,
            holder: None,
        };
        assert!(format_status(None, &lock).contains("stale"));
    }

    #[test]
    fn test_format_outcome() {
        assert_eq!(
            format_outcome(&CycleOutcome::UpToDate { sha: sha() }),
            "Up to date at 3f78685"
        );
        assert_eq!(
            format_outcome(&CycleOutcome::Deployed {
                sha: sha(),
                services: vec!["backend".to_string(), "web".to_string()],
                health_attempts: 2,
            }),
            "Deployed 3f78685 (backend, web)"
        );
        assert_eq!(
            format_outcome(&CycleOutcome::Deployed {
                sha: sha(),
                services: vec![],
                health_attempts: 1,
            }),
            "Recorded 3f78685 (no service affected)"
        );
    }
}
