//! Store configuration
//!
//! A [`StoreConfig`] is an explicit value handed to every component that
//! touches a store root. Nothing reads the environment behind the caller's
//! back, so independent stores can coexist in one process (tests rely on it).
//!
//! Resolution order for the root:
//!
//! 1. `DEPOT_HOME` environment variable
//! 2. `<home>/.depot`
//!
//! Lock tuning can be overridden per store in `<root>/config.toml`:
//!
//! ```toml
//! [lock]
//! timeout_ms = 30000
//! retry_interval_ms = 100
//! stale_after_ms = 10000
//! ```

use std::path::Path;
use std::time::Duration;

use depot_fs::{ConfigStore, NormalizedPath, StorePath};
use serde::{Deserialize, Serialize};

use crate::lock::LockOptions;
use crate::{Error, Result};

/// Environment variable that overrides the store root
pub const ROOT_ENV_VAR: &str = "DEPOT_HOME";

/// Directory name used under the user's home when no override is set
pub const DEFAULT_DIR_NAME: &str = ".depot";

/// Configuration for one store root
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory holding the registry, lock and artifact tree
    pub root: NormalizedPath,
    /// Default options for lock acquisition
    pub lock: LockOptions,
}

/// On-disk shape of `<root>/config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfigFile {
    pub lock: LockSection,
}

/// `[lock]` section of the store config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockSection {
    pub timeout_ms: Option<u64>,
    pub retry_interval_ms: Option<u64>,
    pub stale_after_ms: Option<u64>,
}

impl StoreConfig {
    /// Configuration for `root` with default lock options.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: NormalizedPath::new(root),
            lock: LockOptions::default(),
        }
    }

    /// Resolve the store root from the process environment and apply
    /// overrides from the store's config file.
    ///
    /// # Errors
    ///
    /// Returns an error if no root can be determined or the config file
    /// exists but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`StoreConfig::from_env`] with an injectable variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let root = match lookup(ROOT_ENV_VAR).filter(|v| !v.trim().is_empty()) {
            Some(custom) => {
                tracing::debug!(root = %custom, "Using store root from {}", ROOT_ENV_VAR);
                NormalizedPath::new(custom.trim())
            }
            None => {
                let home = dirs::home_dir().ok_or_else(|| {
                    Error::NotFound(format!(
                        "home directory (set {} to choose a store root)",
                        ROOT_ENV_VAR
                    ))
                })?;
                NormalizedPath::new(home.join(DEFAULT_DIR_NAME))
            }
        };

        let mut config = Self {
            root,
            lock: LockOptions::default(),
        };
        config.apply_file_overrides()?;
        Ok(config)
    }

    /// Load `<root>/config.toml` (if present) and apply its overrides.
    pub fn apply_file_overrides(&mut self) -> Result<()> {
        let path = self.config_path();
        let Some(file) = ConfigStore::new().load_if_exists::<StoreConfigFile>(&path)? else {
            return Ok(());
        };
        tracing::debug!(path = %path, "Applying store config overrides");

        let section = file.lock;
        if let Some(ms) = section.timeout_ms {
            self.lock.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = section.retry_interval_ms {
            self.lock.retry_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = section.stale_after_ms {
            self.lock.stale_after = Duration::from_millis(ms);
        }
        Ok(())
    }

    /// Replace the default lock options.
    pub fn with_lock_options(mut self, lock: LockOptions) -> Self {
        self.lock = lock;
        self
    }

    pub fn registry_path(&self) -> NormalizedPath {
        self.root.join(StorePath::Registry.as_str())
    }

    pub fn lock_path(&self) -> NormalizedPath {
        self.root.join(StorePath::Lock.as_str())
    }

    pub fn namespaces_dir(&self) -> NormalizedPath {
        self.root.join(StorePath::NamespacesDir.as_str())
    }

    pub fn config_path(&self) -> NormalizedPath {
        self.root.join(StorePath::Config.as_str())
    }
}
