//! Store-wide advisory lock
//!
//! The lock is a side-file in the store root created with fail-if-exists
//! semantics. Its content names the holder so that waiters can tell a live
//! holder from a dead one, and so an operator can decide to remove it by hand.
//!
//! Acquisition loops until the file is created or the timeout elapses. Each
//! time the file is found already present, the holder is classified:
//!
//! - [`Contention::Fresh`]: the holder is alive and recent; sleep one retry
//!   interval and try again.
//! - [`Contention::Stale`]: the holder is dead or the lock is older than the
//!   staleness threshold; delete it and retry at once.
//!
//! Eviction claims the stale file by renaming it aside before deleting it.
//! One window remains: while a live lock that was claimed by mistake is
//! being linked back, a third process may create a new lock, and the
//! restored holder then loses its file.
//!
//! Dropping a [`LockGuard`] releases the lock, so an operation that fails or
//! panics cannot leave the store locked.

mod liveness;

pub use liveness::{FixedLiveness, LivenessCheck, SystemLiveness};

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use depot_fs::{NormalizedPath, io};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::{Error, Result};

/// Default time to wait for a held lock
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default pause between attempts while the holder is fresh
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);
/// Default age after which a lock is considered abandoned
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(10);

/// Contents of the lock side-file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Process id of the holder
    pub owner_id: u32,
    /// When the lock was taken
    pub acquired: DateTime<Utc>,
    /// Human-readable description of what the holder is doing
    pub command: String,
    /// Identifies this particular acquisition
    pub token: Uuid,
}

impl LockInfo {
    /// Time elapsed since acquisition; a timestamp in the future counts as zero.
    pub fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.acquired)
            .to_std()
            .unwrap_or_default()
    }
}

/// Tuning for a single acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOptions {
    pub timeout: Duration,
    pub retry_interval: Duration,
    pub stale_after: Duration,
    /// Recorded in the lock file for diagnostics
    pub command: String,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            stale_after: DEFAULT_STALE_AFTER,
            command: String::from("depot"),
        }
    }
}

impl LockOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }
}

/// Why an existing lock may be reclaimed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// The recorded owner process no longer exists
    DeadOwner(u32),
    /// The lock is older than the staleness threshold
    Expired(Duration),
}

/// Classification of a lock found already held
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contention {
    /// Live, recent holder. `None` when the file exists but its content is
    /// not yet readable (the creator is still writing it).
    Fresh(Option<LockInfo>),
    /// Holder may be evicted. `token` is the evicted acquisition, if known.
    Stale {
        reason: StaleReason,
        token: Option<Uuid>,
    },
    /// The file disappeared between the create attempt and the liveness check.
    Released,
}

/// Manages the lock side-file of one store root
#[derive(Debug, Clone)]
pub struct LockManager {
    path: NormalizedPath,
    defaults: LockOptions,
    liveness: Arc<dyn LivenessCheck>,
}

impl LockManager {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            path: config.lock_path(),
            defaults: config.lock.clone(),
            liveness: Arc::new(SystemLiveness),
        }
    }

    /// Substitute the process liveness check.
    pub fn with_liveness(mut self, liveness: Arc<dyn LivenessCheck>) -> Self {
        self.liveness = liveness;
        self
    }

    pub fn path(&self) -> &NormalizedPath {
        &self.path
    }

    /// The store's default options with `command` filled in.
    pub fn options(&self, command: impl Into<String>) -> LockOptions {
        self.defaults.clone().with_command(command)
    }

    /// Acquire the lock, waiting up to `options.timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockTimeout`] when the lock stays held by a live
    /// holder for longer than the timeout, or an I/O error if the lock file
    /// cannot be created or inspected.
    pub fn acquire(&self, options: &LockOptions) -> Result<LockGuard> {
        let started = Instant::now();
        let mut announced = false;

        loop {
            if let Some(guard) = self.try_create(options)? {
                tracing::debug!(path = %self.path, command = %options.command, "Acquired store lock");
                return Ok(guard);
            }

            let waited = started.elapsed();
            if waited >= options.timeout {
                return Err(Error::LockTimeout {
                    path: self.path.to_native(),
                    waited,
                    holder: self.holder().ok().flatten(),
                });
            }

            match self.assess(options)? {
                Contention::Released => continue,
                Contention::Stale { reason, token } => {
                    tracing::warn!(path = %self.path, ?reason, "Reclaiming stale store lock");
                    self.evict(token)?;
                }
                Contention::Fresh(holder) => {
                    if !announced {
                        announced = true;
                        match &holder {
                            Some(info) => tracing::info!(
                                pid = info.owner_id,
                                command = %info.command,
                                "Waiting for store lock held by another process"
                            ),
                            None => tracing::info!("Waiting for store lock"),
                        }
                    }
                    std::thread::sleep(options.retry_interval);
                }
            }
        }
    }

    /// Run `op` while holding the lock.
    ///
    /// The lock is released whether `op` succeeds or fails. An error from
    /// `op` takes precedence over an error from releasing.
    pub fn with_lock<T, F>(&self, options: &LockOptions, op: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let guard = self.acquire(options)?;
        let outcome = op();
        let released = guard.release();

        match outcome {
            Ok(value) => {
                released?;
                Ok(value)
            }
            Err(e) => {
                if let Err(release_err) = released {
                    tracing::warn!("Failed to release store lock after error: {}", release_err);
                }
                Err(e)
            }
        }
    }

    /// Current holder, if the lock is held and its content is readable.
    pub fn holder(&self) -> Result<Option<LockInfo>> {
        Ok(read_info(&self.path)?.and_then(|parsed| parsed.ok()))
    }

    /// Classify the lock that is currently present.
    pub fn assess(&self, options: &LockOptions) -> Result<Contention> {
        let Some(parsed) = read_info(&self.path)? else {
            return Ok(Contention::Released);
        };

        match parsed {
            Ok(info) => {
                if !self.liveness.is_process_alive(info.owner_id) {
                    return Ok(Contention::Stale {
                        reason: StaleReason::DeadOwner(info.owner_id),
                        token: Some(info.token),
                    });
                }
                let age = info.age();
                if age > options.stale_after {
                    return Ok(Contention::Stale {
                        reason: StaleReason::Expired(age),
                        token: Some(info.token),
                    });
                }
                Ok(Contention::Fresh(Some(info)))
            }
            Err(()) => match self.file_age()? {
                None => Ok(Contention::Released),
                Some(age) if age > options.stale_after => Ok(Contention::Stale {
                    reason: StaleReason::Expired(age),
                    token: None,
                }),
                Some(_) => Ok(Contention::Fresh(None)),
            },
        }
    }

    fn try_create(&self, options: &LockOptions) -> Result<Option<LockGuard>> {
        let native = self.path.to_native();
        if let Some(parent) = self.path.parent() {
            io::ensure_dir(&parent)?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&native) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(depot_fs::Error::io(&native, e).into()),
        };

        let info = LockInfo {
            owner_id: std::process::id(),
            acquired: Utc::now(),
            command: options.command.clone(),
            token: Uuid::new_v4(),
        };

        let written = toml::to_string_pretty(&info)
            .map_err(Error::from)
            .and_then(|content| {
                file.write_all(content.as_bytes())?;
                file.sync_all()?;
                Ok(())
            });

        if let Err(e) = written {
            let _ = fs::remove_file(&native);
            return Err(e);
        }

        Ok(Some(LockGuard {
            path: self.path.clone(),
            token: info.token,
            released: false,
        }))
    }

    /// Delete a stale lock, but only if it is still the one that was judged
    /// stale. Another waiter may already have reclaimed it and taken a fresh
    /// lock in the meantime.
    ///
    /// The lock is first renamed to a unique claim file, so of several
    /// waiters evicting at once only one takes any given file. The token is
    /// checked on the claimed copy; a live lock claimed by mistake is linked
    /// back into place.
    fn evict(&self, token: Option<Uuid>) -> Result<()> {
        let native = self.path.to_native();
        let claim = NormalizedPath::new(native.with_file_name(format!(
            "{}.{}.evict",
            self.path.file_name().unwrap_or(".lock"),
            Uuid::new_v4()
        )));

        match fs::rename(&native, claim.to_native()) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(depot_fs::Error::io(&native, e).into()),
        }

        let still_same = match (read_info(&claim)?, token) {
            (Some(Ok(info)), Some(expected)) => info.token == expected,
            (Some(Err(())), None) => true,
            _ => false,
        };

        if !still_same {
            match fs::hard_link(claim.to_native(), &native) {
                Ok(()) => tracing::debug!(path = %self.path, "Restored a lock claimed during eviction"),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => tracing::warn!(
                    path = %self.path,
                    "Could not restore a live lock claimed during eviction; another waiter took its place"
                ),
                Err(e) => {
                    io::remove_file_if_exists(&claim)?;
                    return Err(depot_fs::Error::io(&native, e).into());
                }
            }
        }
        io::remove_file_if_exists(&claim)?;
        Ok(())
    }

    fn file_age(&self) -> Result<Option<Duration>> {
        let native = self.path.to_native();
        match fs::metadata(&native) {
            Ok(metadata) => {
                let modified = metadata
                    .modified()
                    .map_err(|e| depot_fs::Error::io(&native, e))?;
                Ok(Some(modified.elapsed().unwrap_or_default()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(depot_fs::Error::io(&native, e).into()),
        }
    }
}

/// Proof of holding the store lock
///
/// Released explicitly with [`LockGuard::release`] or implicitly on drop.
#[derive(Debug)]
#[must_use = "dropping the guard releases the lock immediately"]
pub struct LockGuard {
    path: NormalizedPath,
    token: Uuid,
    released: bool,
}

impl LockGuard {
    pub fn token(&self) -> Uuid {
        self.token
    }

    pub fn path(&self) -> PathBuf {
        self.path.to_native()
    }

    /// Release the lock.
    ///
    /// Releasing a lock whose file is already gone is not an error. A lock
    /// that was reclaimed by another process is left in place.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.release_inner()
    }

    fn release_inner(&self) -> Result<()> {
        match read_info(&self.path)? {
            None => Ok(()),
            Some(Ok(info)) if info.token == self.token => {
                io::remove_file_if_exists(&self.path)?;
                tracing::debug!(path = %self.path, "Released store lock");
                Ok(())
            }
            Some(_) => {
                tracing::warn!(
                    path = %self.path,
                    "Store lock was reclaimed by another process; leaving it in place"
                );
                Ok(())
            }
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.release_inner() {
            tracing::warn!("Failed to release store lock on drop: {}", e);
        }
    }
}

/// Read the lock file. Outer `None`: no lock. Inner `Err`: present but unparsable.
fn read_info(path: &NormalizedPath) -> Result<Option<std::result::Result<LockInfo, ()>>> {
    let Some(content) = io::read_text_if_exists(path)? else {
        return Ok(None);
    };
    Ok(Some(toml::from_str(&content).map_err(|_| ())))
}
