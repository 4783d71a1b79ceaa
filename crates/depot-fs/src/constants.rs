//! Well-known names inside a store root.

use std::path::Path;

/// Fixed files and directories that make up a store root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePath {
    /// The registry index document
    Registry,
    /// The lock side-file (absent means unlocked)
    Lock,
    /// Root of the physical artifact tree
    NamespacesDir,
    /// Signature marker written inside every version directory
    SignatureMarker,
    /// Optional store-level configuration overrides
    Config,
}

impl StorePath {
    /// Get the string representation of the path.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registry => "registry.toml",
            Self::Lock => ".lock",
            Self::NamespacesDir => "namespaces",
            Self::SignatureMarker => ".depot-signature",
            Self::Config => "config.toml",
        }
    }
}

impl AsRef<Path> for StorePath {
    fn as_ref(&self) -> &Path {
        Path::new(self.as_str())
    }
}

impl AsRef<str> for StorePath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for StorePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
