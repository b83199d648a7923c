use std::collections::HashSet;

use crate::config::ConfigError;

use super::types::{path_is_under, ServiceSpec};

/// Parses `name=prefix|prefix,name=prefix` service definitions.
///
/// A bare `name` entry has no path filter.
pub fn parse_service_specs(input: &str) -> Result<Vec<ServiceSpec>, ConfigError> {
    let mut specs = Vec::new();

    for entry in input.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, paths) = match entry.split_once('=') {
            Some((name, paths)) => {
                let paths: Vec<String> = paths
                    .split('|')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(String::from)
                    .collect();
                if paths.is_empty() {
                    return Err(ConfigError::InvalidServiceEntry(entry.to_string()));
                }
                (name.trim(), paths)
            }
            None => (entry, Vec::new()),
        };

        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidServiceEntry(entry.to_string()));
        }

        specs.push(ServiceSpec::new(name, paths));
    }

    Ok(specs)
}

/// Validates the redeploy set against the services that must stay untouched.
pub fn validate_services(
    services: &[ServiceSpec],
    protected: &[String],
) -> Result<(), ConfigError> {
    if services.is_empty() {
        return Err(ConfigError::NoServices);
    }

    let mut seen = HashSet::new();
    for spec in services {
        if !seen.insert(spec.name.as_str()) {
            return Err(ConfigError::DuplicateService(spec.name.clone()));
        }
        if protected.iter().any(|p| p == &spec.name) {
            return Err(ConfigError::ProtectedService(spec.name.clone()));
        }
    }

    Ok(())
}

/// Selects the services a set of changed paths touches.
///
/// - `changed == None` means the diff is unknown (first deploy, or the old
///   commit is gone after a force push): every service is affected.
/// - A change under any global path affects every service.
/// - Otherwise a service is affected when one of its prefixes matches.
///
/// The result keeps configuration order.
pub fn affected_services<'a>(
    services: &'a [ServiceSpec],
    changed: Option<&[String]>,
    global_paths: &[String],
) -> Vec<&'a ServiceSpec> {
    let Some(changed) = changed else {
        return services.iter().collect();
    };

    let touches_global = changed
        .iter()
        .any(|path| global_paths.iter().any(|g| path_is_under(path, g)));
    if touches_global {
        return services.iter().collect();
    }

    services
        .iter()
        .filter(|spec| changed.iter().any(|path| spec.matches(path)))
        .collect()
}

pub fn service_names(services: &[&ServiceSpec]) -> Vec<String> {
    services.iter().map(|s| s.name.clone()).collect()
}
