//! The store engine facade
//!
//! [`Depot`] wires the lock, registry index and package store of one store
//! root together. Every mutating operation follows the same sequence:
//!
//! 1. acquire the store lock
//! 2. read the registry
//! 3. mutate the artifact tree
//! 4. update and atomically persist the registry
//! 5. release the lock
//!
//! Read-only operations read the registry without locking.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use depot_fs::{NormalizedPath, StorePath, io, signature};
use serde::Serialize;

use crate::config::StoreConfig;
use crate::lock::{LockManager, LivenessCheck};
use crate::names::{self, validate_namespace, validate_package, validate_version};
use crate::registry::{Registry, RegistryIndex, VersionEntry};
use crate::resolver::{self, PackageSpec, Resolution, Resolver};
use crate::store::PackageStore;
use crate::{Error, Result};

/// What to publish and where
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub namespace: String,
    pub name: String,
    pub version: String,
    /// Directory the files are copied from
    pub source: PathBuf,
    /// Paths relative to `source`; `None` publishes every file below it
    pub files: Option<Vec<String>>,
}

impl PublishRequest {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        source: impl Into<PathBuf>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            version: version.into(),
            source: source.into(),
            files: None,
        }
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files = Some(files.into_iter().map(Into::into).collect());
        self
    }
}

/// Result of a successful publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub signature: String,
    pub files: u64,
    pub path: NormalizedPath,
    /// Whether an existing version was replaced
    pub replaced: bool,
}

/// Summary counts for a store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub namespaces: usize,
    pub packages: usize,
    pub versions: usize,
    pub disk_bytes: u64,
}

/// One store root: lock, registry index and artifact tree
#[derive(Debug, Clone)]
pub struct Depot {
    config: StoreConfig,
    pub(crate) locks: LockManager,
    pub(crate) index: RegistryIndex,
    pub(crate) store: PackageStore,
}

impl Depot {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            locks: LockManager::new(&config),
            index: RegistryIndex::new(&config),
            store: PackageStore::new(&config),
            config,
        }
    }

    /// Open the store selected by the environment (see [`StoreConfig::from_env`]).
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(StoreConfig::from_env()?))
    }

    /// Substitute the process liveness check used for stale-lock detection.
    pub fn with_liveness(mut self, liveness: Arc<dyn LivenessCheck>) -> Self {
        self.locks = self.locks.with_liveness(liveness);
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub fn index(&self) -> &RegistryIndex {
        &self.index
    }

    pub fn store(&self) -> &PackageStore {
        &self.store
    }

    /// Lock-free registry snapshot.
    pub fn registry(&self) -> Result<Registry> {
        self.index.read()
    }

    /// Run `op` against the registry under the store lock, persisting the
    /// registry afterwards if `op` changed it.
    pub fn transact<T, F>(&self, command: impl Into<String>, op: F) -> Result<T>
    where
        F: FnOnce(&mut Registry) -> Result<T>,
    {
        let options = self.locks.options(command);
        self.locks.with_lock(&options, || {
            let mut registry = self.index.read()?;
            let before = registry.clone();
            let value = op(&mut registry)?;
            if registry != before {
                self.index.write(&registry)?;
            }
            Ok(value)
        })
    }

    // ---- namespaces ----

    /// Create a namespace in both the registry and on disk.
    ///
    /// Returns `true` if the registry did not know it yet.
    pub fn create_namespace(&self, namespace: &str) -> Result<bool> {
        validate_namespace(namespace)?;
        self.transact(format!("create namespace {namespace}"), |registry| {
            self.store.ensure_namespace(namespace)?;
            let created = registry.ensure_namespace(namespace);
            if created {
                tracing::info!(namespace, "Created namespace");
            }
            Ok(created)
        })
    }

    /// Namespaces known to the registry, privileged first.
    pub fn namespaces(&self) -> Result<Vec<String>> {
        Ok(self.registry()?.namespaces())
    }

    // ---- publish ----

    /// Publish a version, replacing any existing one with the same key.
    ///
    /// # Errors
    ///
    /// Fails on invalid names, missing or escaping source files, lock
    /// timeout, or I/O errors. A failed copy removes the partial directory.
    pub fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome> {
        let PublishRequest {
            namespace,
            name,
            version,
            source,
            ..
        } = request;
        validate_namespace(namespace)?;
        validate_package(name)?;
        validate_version(version)?;
        let files = collect_source_files(request)?;

        let spec = PackageSpec::new(name.as_str(), version.as_str());
        let options = self.locks.options(format!("publish {namespace}:{spec}"));

        self.locks.with_lock(&options, || {
            let mut registry = self.index.read()?;

            let replaced = registry.contains(namespace, name, version)
                || self.store.version_exists(namespace, name, version);
            if replaced {
                self.store.delete_version(namespace, name, version)?;
                if registry.remove_version(namespace, name, Some(version.as_str())) {
                    self.index.write(&registry)?;
                }
                tracing::debug!(%namespace, %spec, "Removed previous publication");
            }

            self.store.ensure_namespace(namespace)?;
            registry.ensure_namespace(namespace);

            let dest = self.store.version_path(namespace, name, version);
            let signature = match copy_files(source, &files, &dest) {
                Ok(()) => signature::compute_signature(&dest)?,
                Err(e) => {
                    if let Err(cleanup) = self.store.delete_version(namespace, name, version) {
                        tracing::warn!("Failed to remove partial publish at {}: {}", dest, cleanup);
                    }
                    return Err(e);
                }
            };
            self.store
                .write_signature(namespace, name, version, &signature)?;

            let count = files.len() as u64;
            registry.add_version(namespace, name, version, VersionEntry::new(&signature, count));
            self.index.write(&registry)?;

            tracing::info!(%namespace, %spec, files = count, replaced, "Published");
            Ok(PublishOutcome {
                signature,
                files: count,
                path: dest,
                replaced,
            })
        })
    }

    // ---- removal ----

    /// Remove one version from disk and registry.
    pub fn remove_version(&self, namespace: &str, package: &str, version: &str) -> Result<()> {
        validate_namespace(namespace)?;
        validate_package(package)?;
        validate_version(version)?;

        let key = names::version_key(package, version);
        self.transact(format!("remove {namespace}:{key}"), |registry| {
            if !registry.contains(namespace, package, version)
                && !self.store.version_exists(namespace, package, version)
            {
                return Err(Error::NotFound(format!("{namespace}:{key}")));
            }
            self.store.delete_version(namespace, package, version)?;
            registry.remove_version(namespace, package, Some(version));
            tracing::info!(namespace, package, version, "Removed version");
            Ok(())
        })
    }

    /// Remove every version of a package from disk and registry.
    pub fn remove_package(&self, namespace: &str, package: &str) -> Result<()> {
        validate_namespace(namespace)?;
        validate_package(package)?;

        self.transact(format!("remove {namespace}:{package}"), |registry| {
            if registry.package(namespace, package).is_none()
                && !self.store.package_path(namespace, package).is_dir()
            {
                return Err(Error::NotFound(format!("{namespace}:{package}")));
            }
            self.store.delete_package(namespace, package)?;
            registry.remove_version(namespace, package, None);
            tracing::info!(namespace, package, "Removed package");
            Ok(())
        })
    }

    /// Remove a namespace with everything in it.
    ///
    /// # Errors
    ///
    /// The privileged namespace is rejected with
    /// [`Error::ReservedNamespace`] before the lock is taken.
    pub fn remove_namespace(&self, namespace: &str) -> Result<()> {
        if names::is_privileged(namespace) {
            return Err(Error::ReservedNamespace {
                namespace: namespace.to_string(),
            });
        }
        validate_namespace(namespace)?;

        self.transact(format!("remove namespace {namespace}"), |registry| {
            if !registry.has_namespace(namespace) && !self.store.namespace_exists(namespace) {
                return Err(Error::NotFound(format!("namespace {namespace}")));
            }
            self.store.delete_namespace(namespace)?;
            registry.remove_namespace(namespace)?;
            tracing::info!(namespace, "Removed namespace");
            Ok(())
        })
    }

    // ---- resolution ----

    /// Resolve one package against a lock-free registry snapshot.
    pub fn resolve<S: AsRef<str>>(&self, spec: &PackageSpec, namespaces: &[S]) -> Result<Resolution> {
        let registry = self.registry()?;
        Ok(Resolver::new(&registry, &self.store).resolve(spec, namespaces))
    }

    /// Resolve an explicit `name@version` string. A malformed specifier is
    /// an error.
    pub fn resolve_specifier<S: AsRef<str>>(&self, input: &str, namespaces: &[S]) -> Result<Resolution> {
        let spec = resolver::parse_specifier(input)?;
        self.resolve(&spec, namespaces)
    }

    /// Resolve many specifiers against one snapshot. Malformed entries are
    /// dropped; misses are reported as [`Resolution::NotFound`].
    pub fn resolve_all<I, T, S>(&self, inputs: I, namespaces: &[S]) -> Result<Vec<Resolution>>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
        S: AsRef<str>,
    {
        let specs = resolver::parse_specifiers(inputs);
        let registry = self.registry()?;
        Ok(Resolver::new(&registry, &self.store).resolve_all(&specs, namespaces))
    }

    // ---- stats ----

    pub fn stats(&self) -> Result<StoreStats> {
        let registry = self.registry()?;
        let namespaces = registry.namespaces();
        let packages = namespaces
            .iter()
            .map(|ns| registry.packages(ns).len())
            .sum();
        Ok(StoreStats {
            namespaces: namespaces.len(),
            packages,
            versions: registry.version_count(),
            disk_bytes: self.store.disk_usage()?,
        })
    }
}

/// Relative paths of the files to publish, validated against the source.
fn collect_source_files(request: &PublishRequest) -> Result<Vec<String>> {
    let source = &request.source;
    if !source.is_dir() {
        return Err(Error::InvalidSource {
            path: source.clone(),
            reason: "source is not a directory".to_string(),
        });
    }

    let files = match &request.files {
        Some(listed) => {
            let mut files = Vec::with_capacity(listed.len());
            for relative in listed {
                files.push(check_relative(source, relative)?);
            }
            files.sort();
            files.dedup();
            files
        }
        None => io::list_files(
            &NormalizedPath::new(source),
            &[StorePath::SignatureMarker.as_str()],
        )?,
    };

    if files.is_empty() {
        return Err(Error::InvalidSource {
            path: source.clone(),
            reason: "nothing to publish".to_string(),
        });
    }
    Ok(files)
}

/// Validate one listed file and return its canonical `/`-joined form, so
/// different spellings of the same file compare equal.
fn check_relative(source: &Path, relative: &str) -> Result<String> {
    let invalid = |reason: &str| Error::InvalidSource {
        path: source.join(relative),
        reason: reason.to_string(),
    };

    let mut parts = Vec::new();
    for component in Path::new(&relative.replace('\\', "/")).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return Err(invalid("file paths must be relative and stay inside the source")),
        }
    }
    if parts.is_empty() {
        return Err(invalid("file paths must be relative and stay inside the source"));
    }
    if parts.last().map(String::as_str) == Some(StorePath::SignatureMarker.as_str()) {
        return Err(invalid("file name is reserved for the signature marker"));
    }

    let canonical = parts.join("/");
    if !source.join(&canonical).is_file() {
        return Err(invalid("not a file"));
    }
    Ok(canonical)
}

fn copy_files(source: &Path, files: &[String], dest: &NormalizedPath) -> Result<()> {
    io::ensure_dir(dest)?;
    for relative in files {
        io::copy_file(&source.join(relative), &dest.join(relative))?;
    }
    Ok(())
}
