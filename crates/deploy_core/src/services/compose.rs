/// Compose file and project the deployer drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeTarget {
    pub file: String,
    pub project: String,
}

impl ComposeTarget {
    fn base_args(&self) -> Vec<String> {
        vec![
            "compose".to_string(),
            "-f".to_string(),
            self.file.clone(),
            "-p".to_string(),
            self.project.clone(),
        ]
    }
}

/// Arguments for `<runtime> compose build <services...>`.
pub fn compose_build_args(target: &ComposeTarget, services: &[String]) -> Vec<String> {
    let mut args = target.base_args();
    args.push("build".to_string());
    args.extend(services.iter().cloned());
    args
}

/// Arguments for recreating only the given services.
///
/// `--no-deps` keeps compose from touching linked services such as the
/// database even when they are declared as dependencies.
pub fn compose_up_args(target: &ComposeTarget, services: &[String]) -> Vec<String> {
    let mut args = target.base_args();
    args.extend(
        ["up", "-d", "--no-deps", "--force-recreate"]
            .iter()
            .map(|s| s.to_string()),
    );
    args.extend(services.iter().cloned());
    args
}
