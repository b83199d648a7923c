//! Last-deployed commit record.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use smartdiary_deploy_core::revision::CommitSha;

use crate::error::{DeployError, Result};

/// File holding exactly the SHA of the last successful deploy.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `None` when nothing has been deployed yet.
    pub fn read(&self) -> Result<Option<CommitSha>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.error(e.to_string())),
        };

        if contents.trim().is_empty() {
            return Ok(None);
        }

        CommitSha::parse(&contents)
            .map(Some)
            .map_err(|e| self.error(e.to_string()))
    }

    /// Atomically replaces the record with `sha` (temporary file, then rename).
    pub fn write(&self, sha: &CommitSha) -> Result<()> {
        let tmp = self.path.with_extension("tmp");

        let written = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(sha.as_str().as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        })();

        written.map_err(|e| {
            let _ = fs::remove_file(&tmp);
            self.error(e.to_string())
        })
    }

    fn error(&self, message: String) -> DeployError {
        DeployError::State {
            path: self.path.clone(),
            message,
        }
    }
}
