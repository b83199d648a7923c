use thiserror::Error;

/// Errors that can occur when parsing a commit identifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RevisionError {
    #[error("Commit identifier cannot be empty")]
    Empty,
    #[error("Commit identifier must be 40 or 64 characters, got {0}")]
    InvalidLength(usize),
    #[error("Commit identifier contains non-hex characters: {0}")]
    NonHex(String),
}
