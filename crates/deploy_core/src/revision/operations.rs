use super::types::{CommitSha, PollDecision};

/// Compares the fetched remote head against the last deployed commit.
pub fn plan_poll(remote: &CommitSha, last_deployed: Option<&CommitSha>) -> PollDecision {
    match last_deployed {
        Some(last) if last == remote => PollDecision::UpToDate,
        _ => PollDecision::Deploy {
            from: last_deployed.cloned(),
            to: remote.clone(),
        },
    }
}
