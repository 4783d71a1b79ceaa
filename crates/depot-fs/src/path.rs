//! Normalized path handling for cross-platform compatibility

use std::path::{Path, PathBuf};

/// A path normalized to use forward slashes internally.
///
/// Store keys (`@scope/name`, relative artifact paths) are compared in this
/// form, and only converted to platform-native paths at I/O boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedPath {
    /// Internal representation always uses forward slashes
    inner: String,
}

impl NormalizedPath {
    /// Create a new NormalizedPath from any path-like input.
    ///
    /// Converts backslashes to forward slashes for internal storage.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path_str = path.as_ref().to_string_lossy();
        let normalized = path_str.replace('\\', "/");
        Self { inner: normalized }
    }

    /// Get the internal normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Convert to a platform-native PathBuf for I/O operations.
    pub fn to_native(&self) -> PathBuf {
        PathBuf::from(&self.inner)
    }

    /// Join this path with a segment.
    ///
    /// The segment may itself contain `/` separators, which is how scoped
    /// package names map onto nested directories.
    pub fn join(&self, segment: &str) -> Self {
        let segment_normalized = segment.replace('\\', "/");
        let joined = if self.inner.ends_with('/') {
            format!("{}{}", self.inner, segment_normalized)
        } else {
            format!("{}/{}", self.inner, segment_normalized)
        };
        Self { inner: joined }
    }

    /// Get the parent directory.
    pub fn parent(&self) -> Option<Self> {
        let trimmed = self.inner.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(idx) if idx > 0 => Some(Self {
                inner: trimmed[..idx].to_string(),
            }),
            Some(0) => Some(Self {
                inner: "/".to_string(),
            }),
            _ => None,
        }
    }

    /// Get the file name component.
    pub fn file_name(&self) -> Option<&str> {
        let trimmed = self.inner.trim_end_matches('/');
        trimmed.rsplit('/').next()
    }

    /// Strip `base` from the front of this path, returning the remainder.
    pub fn strip_prefix(&self, base: &NormalizedPath) -> Option<&str> {
        let base = base.inner.trim_end_matches('/');
        let rest = self.inner.strip_prefix(base)?;
        if rest.is_empty() {
            Some(rest)
        } else {
            rest.strip_prefix('/')
        }
    }

    /// Check if this path exists on the filesystem.
    pub fn exists(&self) -> bool {
        self.to_native().exists()
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.to_native().is_dir()
    }

    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        self.to_native().is_file()
    }

    /// Get the extension if present.
    pub fn extension(&self) -> Option<&str> {
        self.file_name().and_then(|name| {
            let idx = name.rfind('.')?;
            if idx == 0 {
                None
            } else {
                Some(&name[idx + 1..])
            }
        })
    }
}

impl AsRef<Path> for NormalizedPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.inner)
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<&str> for NormalizedPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NormalizedPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<PathBuf> for NormalizedPath {
    fn from(p: PathBuf) -> Self {
        Self::new(p)
    }
}

impl From<&Path> for NormalizedPath {
    fn from(p: &Path) -> Self {
        Self::new(p)
    }
}

/// Validate that `name` is safe to use as a single directory component.
///
/// `kind` is used in the error message ("Namespace", "Version", ...).
/// Rejects empty names, `.`/`..`, hidden names, separators and NUL bytes.
pub fn validate_path_identifier(name: &str, kind: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err(format!("{kind} must not be empty"));
    }
    if name == "." || name == ".." {
        return Err(format!("{kind} '{name}' is a relative path component"));
    }
    if name.starts_with('.') {
        return Err(format!("{kind} '{name}' must not start with '.'"));
    }
    if name.contains(['/', '\\']) {
        return Err(format!("{kind} '{name}' must not contain path separators"));
    }
    if name.contains('\0') {
        return Err(format!("{kind} '{name}' must not contain NUL bytes"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_nests_scoped_names() {
        let base = NormalizedPath::new("/store/namespaces/global");
        let joined = base.join("@scope/lib").join("1.0.0");
        assert_eq!(joined.as_str(), "/store/namespaces/global/@scope/lib/1.0.0");
    }

    #[test]
    fn strip_prefix_returns_relative_remainder() {
        let base = NormalizedPath::new("/a/b");
        let full = NormalizedPath::new("/a/b/c/d.txt");
        assert_eq!(full.strip_prefix(&base), Some("c/d.txt"));
        assert_eq!(NormalizedPath::new("/x").strip_prefix(&base), None);
    }

    #[test]
    fn identifier_rules() {
        assert!(validate_path_identifier("global", "Namespace").is_ok());
        assert!(validate_path_identifier("1.0.0-beta+build", "Version").is_ok());
        assert!(validate_path_identifier("", "Namespace").is_err());
        assert!(validate_path_identifier("..", "Namespace").is_err());
        assert!(validate_path_identifier(".hidden", "Namespace").is_err());
        assert!(validate_path_identifier("a/b", "Version").is_err());
        assert!(validate_path_identifier("a\\b", "Version").is_err());
    }
}
