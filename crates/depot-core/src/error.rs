//! Error types for depot-core

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::lock::LockInfo;

/// Result type for depot-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in depot-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Waiting for the store lock exceeded the configured timeout
    #[error("{}", lock_timeout_message(path, *waited, holder.as_ref()))]
    LockTimeout {
        path: PathBuf,
        waited: Duration,
        holder: Option<LockInfo>,
    },

    /// Attempted deletion of the privileged namespace
    #[error("Namespace '{namespace}' is reserved and cannot be deleted")]
    ReservedNamespace { namespace: String },

    /// A `name@version` specifier could not be parsed
    #[error("Invalid package specifier '{input}': expected <name>@<version>")]
    InvalidSpecifier { input: String },

    /// A namespace, package or version name is not usable as a path
    #[error("Invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: String,
    },

    /// The registry document exists but cannot be parsed
    #[error("Registry at {path} is corrupt: {message}")]
    RegistryCorrupt { path: PathBuf, message: String },

    /// A publish source file is missing or escapes the source directory
    #[error("Invalid publish source {path}: {reason}")]
    InvalidSource { path: PathBuf, reason: String },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Filesystem error from depot-fs
    #[error(transparent)]
    Fs(#[from] depot_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),

    /// JSON serialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn invalid_name(kind: &'static str, name: &str, reason: String) -> Self {
        Self::InvalidName {
            kind,
            name: name.to_string(),
            reason,
        }
    }
}

fn lock_timeout_message(path: &Path, waited: Duration, holder: Option<&LockInfo>) -> String {
    let holder = match holder {
        Some(info) => format!(
            "held by process {} running `{}` since {}",
            info.owner_id,
            info.command,
            info.acquired.to_rfc3339()
        ),
        None => "holder unknown".to_string(),
    };
    format!(
        "Timed out after {:.1}s waiting for store lock {} ({}). \
         If that process is no longer running, remove {} manually.",
        waited.as_secs_f64(),
        path.display(),
        holder,
        path.display()
    )
}
