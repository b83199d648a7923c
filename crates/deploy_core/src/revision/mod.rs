mod error;
mod operations;
mod types;

pub use error::RevisionError;
pub use operations::plan_poll;
pub use types::{CommitSha, PollDecision};
