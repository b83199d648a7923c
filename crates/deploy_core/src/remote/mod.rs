//! Remote repository credentials and URL handling.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use url::Url;

use crate::config::ConfigError;

/// Username GitHub and Gitea accept alongside a personal access token.
pub const TOKEN_USERNAME: &str = "x-access-token";

const REPO_SCHEMES: [&str; 5] = ["https", "http", "ssh", "git", "file"];

/// Builds the `http.extraHeader` value that authenticates git over HTTPS.
///
/// The header is passed per invocation through `GIT_CONFIG_*` variables and
/// never lands in `.git/config` or in a remote URL.
pub fn basic_auth_header(token: &str) -> String {
    let credentials = STANDARD.encode(format!("{TOKEN_USERNAME}:{token}"));
    format!("Authorization: Basic {credentials}")
}

/// Removes user info from a URL so it can be logged.
///
/// Inputs that are not URLs (scp-style `git@host:path`, local paths) are
/// returned unchanged.
pub fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) if url.has_authority() => {
            if !url.username().is_empty() || url.password().is_some() {
                let _ = url.set_username("");
                let _ = url.set_password(None);
            }
            url.to_string()
        }
        _ => raw.to_string(),
    }
}

/// Accepts URLs with a git transport scheme, scp-style remotes, and paths.
pub fn validate_repo_url(raw: &str) -> Result<(), ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() || raw.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidUrl {
            field: "repository",
            message: format!("{raw:?} is not a repository location"),
        });
    }

    match Url::parse(raw) {
        Ok(url) if REPO_SCHEMES.contains(&url.scheme()) => Ok(()),
        // `C:\repo` parses with a drive letter as its scheme
        Ok(url) if url.scheme().len() == 1 => Ok(()),
        Ok(url) => Err(ConfigError::InvalidUrl {
            field: "repository",
            message: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Err(_) => Ok(()),
    }
}

/// The health endpoint must be an absolute HTTP(S) URL.
pub fn validate_health_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl {
        field: "health",
        message: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidUrl {
            field: "health",
            message: format!("unsupported scheme '{other}'"),
        }),
    }
}
