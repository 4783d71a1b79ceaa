//! Namespace, package and version naming rules shared by every component.

use depot_fs::validate_path_identifier;

use crate::{Error, Result};

/// The default namespace. Always present, never deletable.
pub const PRIVILEGED_NAMESPACE: &str = "global";

/// Separator between a package scope and its name (`@scope/name`).
pub const SCOPE_SEPARATOR: char = '/';

/// Marker that begins a scope segment.
pub const SCOPE_PREFIX: char = '@';

pub fn is_privileged(namespace: &str) -> bool {
    namespace == PRIVILEGED_NAMESPACE
}

/// Order namespace names privileged-first, the rest alphabetically.
pub fn sort_namespaces<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
    names.sort_by(|a, b| {
        is_privileged(b)
            .cmp(&is_privileged(a))
            .then_with(|| a.cmp(b))
    });
    names.dedup();
    names
}

/// Key identifying one published version within a namespace.
pub fn version_key(package: &str, version: &str) -> String {
    format!("{package}@{version}")
}

/// Split `@scope/name` into `(Some("@scope"), "name")`; plain names give `(None, name)`.
pub fn split_scope(package: &str) -> (Option<&str>, &str) {
    match package.split_once(SCOPE_SEPARATOR) {
        Some((scope, name)) => (Some(scope), name),
        None => (None, package),
    }
}

pub fn validate_namespace(namespace: &str) -> Result<()> {
    validate_path_identifier(namespace, "Namespace")
        .map_err(|reason| Error::invalid_name("namespace", namespace, reason))
}

pub fn validate_version(version: &str) -> Result<()> {
    validate_path_identifier(version, "Version")
        .map_err(|reason| Error::invalid_name("version", version, reason))
}

/// A package is `name` or `@scope/name`.
pub fn validate_package(package: &str) -> Result<()> {
    let invalid = |reason: String| Error::invalid_name("package", package, reason);

    match split_scope(package) {
        (None, name) => {
            if name.starts_with(SCOPE_PREFIX) {
                return Err(invalid(format!(
                    "scoped package '{name}' needs a name after the scope"
                )));
            }
            validate_path_identifier(name, "Package").map_err(invalid)
        }
        (Some(scope), name) => {
            if !scope.starts_with(SCOPE_PREFIX) || scope.len() == 1 {
                return Err(invalid(format!(
                    "scope '{scope}' must start with '{SCOPE_PREFIX}' followed by a name"
                )));
            }
            validate_path_identifier(scope, "Scope").map_err(&invalid)?;
            validate_path_identifier(name, "Package").map_err(&invalid)?;
            if name.starts_with(SCOPE_PREFIX) {
                return Err(invalid("package name must not start with '@'".to_string()));
            }
            Ok(())
        }
    }
}
