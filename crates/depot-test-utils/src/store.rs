//! [`TestDepot`] builder for store engine test scenarios.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use depot_core::{
    Depot, FixedLiveness, LockOptions, PublishOutcome, PublishRequest, Registry, StoreConfig,
};
use depot_fs::NormalizedPath;
use tempfile::TempDir;

/// A depot rooted in a temporary directory, with short lock timeouts so
/// contention tests fail fast instead of hanging.
///
/// # Example
///
/// ```rust,no_run
/// use depot_test_utils::TestDepot;
///
/// let store = TestDepot::new();
/// store.publish("global", "@scope/lib", "1.0.0", &[("index.js", "x")]);
/// store.assert_version_dir_exists("global", "@scope/lib", "1.0.0");
/// ```
pub struct TestDepot {
    temp_dir: TempDir,
    depot: Depot,
}

impl Default for TestDepot {
    fn default() -> Self {
        Self::new()
    }
}

impl TestDepot {
    /// Lock options used by every test store.
    pub fn lock_options() -> LockOptions {
        LockOptions::default()
            .with_timeout(Duration::from_secs(5))
            .with_retry_interval(Duration::from_millis(10))
            .with_stale_after(Duration::from_secs(10))
            .with_command("depot-test")
    }

    /// Create an empty store in a fresh temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::new(temp_dir.path().join("store")).with_lock_options(Self::lock_options());
        Self {
            depot: Depot::new(config),
            temp_dir,
        }
    }

    /// Treat every recorded lock holder as dead.
    pub fn with_dead_holders(mut self) -> Self {
        self.depot = self.depot.with_liveness(Arc::new(FixedLiveness(false)));
        self
    }

    pub fn depot(&self) -> &Depot {
        &self.depot
    }

    pub fn config(&self) -> &StoreConfig {
        self.depot.config()
    }

    /// Store root (the directory holding the registry and lock file).
    pub fn root(&self) -> PathBuf {
        self.config().root.to_native()
    }

    /// Scratch directory next to the store for publish sources.
    pub fn scratch(&self, name: &str) -> PathBuf {
        let dir = self.temp_dir.path().join("sources").join(name);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Build a source tree and publish it.
    pub fn publish(&self, namespace: &str, name: &str, version: &str, files: &[(&str, &str)]) -> PublishOutcome {
        let label = format!("{namespace}-{}-{version}", name.replace(['@', '/'], "_"));
        let source = self.scratch(&label);
        write_artifact(&source, files);
        self.depot
            .publish(&PublishRequest::new(namespace, name, version, &source))
            .unwrap_or_else(|e| panic!("publish {namespace}:{name}@{version} failed: {e}"))
    }

    pub fn registry(&self) -> Registry {
        self.depot.registry().unwrap()
    }

    pub fn version_dir(&self, namespace: &str, name: &str, version: &str) -> NormalizedPath {
        self.depot.store().version_path(namespace, name, version)
    }

    /// Create a version directory that the registry knows nothing about.
    pub fn plant_disk_version(&self, namespace: &str, name: &str, version: &str) -> NormalizedPath {
        let dir = self.version_dir(namespace, name, version);
        write_artifact(&dir.to_native(), &[("planted.txt", version)]);
        dir
    }

    /// Delete a version directory behind the registry's back.
    pub fn remove_version_dir(&self, namespace: &str, name: &str, version: &str) {
        fs::remove_dir_all(self.version_dir(namespace, name, version).to_native()).unwrap();
    }

    /// Assert that the version directory exists.
    ///
    /// # Panics
    /// Panics with a descriptive message if it does not.
    pub fn assert_version_dir_exists(&self, namespace: &str, name: &str, version: &str) {
        let dir = self.version_dir(namespace, name, version);
        assert!(dir.is_dir(), "Expected version directory to exist: {dir}");
    }

    /// Assert that the version directory does **not** exist.
    ///
    /// # Panics
    /// Panics with a descriptive message if it exists.
    pub fn assert_version_dir_missing(&self, namespace: &str, name: &str, version: &str) {
        let dir = self.version_dir(namespace, name, version);
        assert!(!dir.exists(), "Expected version directory NOT to exist: {dir}");
    }
}

/// Write `(relative path, content)` pairs below `dir`, creating parents.
pub fn write_artifact(dir: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
    }
}
