//! Configuration validation shared by the daemon's argument parsing.

mod error;

pub use error::ConfigError;

/// Splits a comma-separated list, trimming entries and dropping empty ones.
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

/// Rejects an empty branch name or one git would not accept as a ref.
pub fn validate_branch(branch: &str) -> Result<(), ConfigError> {
    let branch = branch.trim();
    if branch.is_empty() {
        return Err(ConfigError::EmptyBranch);
    }
    let invalid = branch.starts_with('-')
        || branch.starts_with('/')
        || branch.ends_with('/')
        || branch.ends_with(".lock")
        || branch.contains("..")
        || branch
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '~' | '^' | ':' | '?' | '*' | '[' | '\\'));
    if invalid {
        return Err(ConfigError::InvalidBranch(branch.to_string()));
    }
    Ok(())
}
