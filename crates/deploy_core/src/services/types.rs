/// A compose service the deployer rebuilds, with the repository paths that
/// feed its image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: String,
    /// Path prefixes relative to the repository root. Empty means the
    /// service is affected by every change.
    pub paths: Vec<String>,
}

impl ServiceSpec {
    pub fn new(name: impl Into<String>, paths: Vec<String>) -> Self {
        Self {
            name: name.into(),
            paths,
        }
    }

    /// Returns true if a changed file feeds this service.
    pub fn matches(&self, changed_path: &str) -> bool {
        self.paths.is_empty()
            || self
                .paths
                .iter()
                .any(|prefix| path_is_under(changed_path, prefix))
    }
}

/// `prefix` ending in `/` matches anything below it; otherwise it matches the
/// exact file or a directory of that name.
pub(crate) fn path_is_under(path: &str, prefix: &str) -> bool {
    let path = path.strip_prefix("./").unwrap_or(path);
    let prefix = prefix.strip_prefix("./").unwrap_or(prefix);

    if prefix.is_empty() {
        return true;
    }
    if prefix.ends_with('/') {
        return path.starts_with(prefix);
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}
