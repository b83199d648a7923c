use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::RevisionError;

const SHA1_HEX_LEN: usize = 40;
const SHA256_HEX_LEN: usize = 64;
const SHORT_LEN: usize = 7;

/// A full git commit identifier (SHA-1 or SHA-256), stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommitSha(String);

impl CommitSha {
    /// Parses a commit identifier, trimming surrounding whitespace.
    pub fn parse(input: &str) -> Result<Self, RevisionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(RevisionError::Empty);
        }
        if trimmed.len() != SHA1_HEX_LEN && trimmed.len() != SHA256_HEX_LEN {
            return Err(RevisionError::InvalidLength(trimmed.len()));
        }
        if !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RevisionError::NonHex(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form used in log lines.
    pub fn short(&self) -> &str {
        &self.0[..SHORT_LEN]
    }
}

impl fmt::Display for CommitSha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CommitSha {
    type Err = RevisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CommitSha {
    type Error = RevisionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CommitSha> for String {
    fn from(sha: CommitSha) -> Self {
        sha.0
    }
}

/// What one poll iteration should do after comparing commit identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollDecision {
    /// The remote head is the commit already running.
    UpToDate,
    /// The remote head moved; `from` is `None` when nothing was deployed yet.
    Deploy {
        from: Option<CommitSha>,
        to: CommitSha,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA: &str = "3f786850e387550fdab836ed7e6dc881de23001b";

    #[test]
    fn test_parse_sha1() {
        let sha = CommitSha::parse(SHA).unwrap();
        assert_eq!(sha.as_str(), SHA);
        assert_eq!(sha.short(), "3f78685");
    }

    #[test]
    fn test_parse_trims_and_lowercases() {
        let sha = CommitSha::parse("  3F786850E387550FDAB836ED7E6DC881DE23001B\n").unwrap();
        assert_eq!(sha.as_str(), SHA);
    }

    #[test]
    fn test_parse_sha256() {
        let input = "a".repeat(64);
        assert!(CommitSha::parse(&input).is_ok());
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(CommitSha::parse("   "), Err(RevisionError::Empty));
    }

    #[test]
    fn test_parse_rejects_abbreviated() {
        assert_eq!(
            CommitSha::parse("3f78685"),
            Err(RevisionError::InvalidLength(7))
        );
    }

    #[test]
    fn test_parse_rejects_non_hex() {
        let input = "z".repeat(40);
        assert!(matches!(
            CommitSha::parse(&input),
            Err(RevisionError::NonHex(_))
        ));
    }

    #[test]
    fn test_serde_uses_plain_string() {
        let sha = CommitSha::parse(SHA).unwrap();
        let json = serde_json::to_string(&sha).unwrap();
        assert_eq!(json, format!("\"{SHA}\""));

        let back: CommitSha = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sha);
        assert!(serde_json::from_str::<CommitSha>("\"nope\"").is_err());
    }
}
