//! Lock file contents and staleness rules.
//!
//! Staleness is judged purely by the age of the lock file. The holder
//! record is informational and never consulted when deciding whether to
//! reclaim a lock.

mod operations;
mod types;

pub use operations::{classify_lock, lock_age};
pub use types::{LockInfo, LockState};
