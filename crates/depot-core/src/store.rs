//! Physical artifact tree
//!
//! ```text
//! <root>/namespaces/<namespace>/<package>/<version>/...
//! <root>/namespaces/<namespace>/@<scope>/<name>/<version>/...
//! ```
//!
//! Every version directory carries a signature marker file. The store knows
//! nothing about the registry; reconciling the two is the job of
//! [`crate::verify`].

use std::collections::BTreeSet;

use depot_fs::{NormalizedPath, StorePath, io};

use crate::config::StoreConfig;
use crate::names::{self, SCOPE_PREFIX};
use crate::{Error, Result};

/// A `(package, version)` pair found on disk
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DiskVersion {
    pub package: String,
    pub version: String,
}

impl DiskVersion {
    pub fn key(&self) -> String {
        names::version_key(&self.package, &self.version)
    }
}

/// CRUD over the namespace directory tree of one store
#[derive(Debug, Clone)]
pub struct PackageStore {
    root: NormalizedPath,
    namespaces_dir: NormalizedPath,
}

impl PackageStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            root: config.root.clone(),
            namespaces_dir: config.namespaces_dir(),
        }
    }

    pub fn root(&self) -> &NormalizedPath {
        &self.root
    }

    // ---- paths ----

    pub fn namespace_path(&self, namespace: &str) -> NormalizedPath {
        self.namespaces_dir.join(namespace)
    }

    /// `@scope/name` maps onto the nested directory `@scope/name`.
    pub fn package_path(&self, namespace: &str, package: &str) -> NormalizedPath {
        self.namespace_path(namespace).join(package)
    }

    pub fn version_path(&self, namespace: &str, package: &str, version: &str) -> NormalizedPath {
        self.package_path(namespace, package).join(version)
    }

    pub fn signature_path(&self, namespace: &str, package: &str, version: &str) -> NormalizedPath {
        self.version_path(namespace, package, version)
            .join(StorePath::SignatureMarker.as_str())
    }

    // ---- creation and existence checks ----

    /// Create the store root and its namespaces directory.
    pub fn ensure_store(&self) -> Result<()> {
        io::ensure_dir(&self.namespaces_dir)?;
        Ok(())
    }

    /// Create the directory of `namespace`, returning its path.
    pub fn ensure_namespace(&self, namespace: &str) -> Result<NormalizedPath> {
        let path = self.namespace_path(namespace);
        io::ensure_dir(&path)?;
        Ok(path)
    }

    pub fn namespace_exists(&self, namespace: &str) -> bool {
        self.namespace_path(namespace).is_dir()
    }

    pub fn version_exists(&self, namespace: &str, package: &str, version: &str) -> bool {
        self.version_path(namespace, package, version).is_dir()
    }

    // ---- listings ----

    /// Namespaces present on disk, privileged first. Empty if the store
    /// has never been created.
    pub fn list_namespaces(&self) -> Result<Vec<String>> {
        let names = visible(io::list_dir_names(&self.namespaces_dir)?);
        Ok(names::sort_namespaces(names))
    }

    /// Packages in `namespace`, with scope directories folded back into
    /// `@scope/name` strings.
    pub fn list_packages(&self, namespace: &str) -> Result<Vec<String>> {
        let ns_path = self.namespace_path(namespace);
        let mut packages = Vec::new();

        for entry in visible(io::list_dir_names(&ns_path)?) {
            if entry.starts_with(SCOPE_PREFIX) {
                for name in visible(io::list_dir_names(&ns_path.join(&entry))?) {
                    packages.push(format!("{entry}/{name}"));
                }
            } else {
                packages.push(entry);
            }
        }
        packages.sort();
        Ok(packages)
    }

    /// Versions of one package present on disk.
    pub fn list_versions(&self, namespace: &str, package: &str) -> Result<Vec<String>> {
        Ok(visible(io::list_dir_names(&self.package_path(namespace, package))?))
    }

    /// Every `(package, version)` pair present in `namespace`.
    pub fn list_versions_in_namespace(&self, namespace: &str) -> Result<Vec<DiskVersion>> {
        let mut found = Vec::new();
        for package in self.list_packages(namespace)? {
            for version in self.list_versions(namespace, &package)? {
                found.push(DiskVersion {
                    package: package.clone(),
                    version,
                });
            }
        }
        Ok(found)
    }

    /// Every version in `namespace` whose `package@version` key is not in
    /// `registered`.
    pub fn find_orphaned(
        &self,
        namespace: &str,
        registered: &BTreeSet<String>,
    ) -> Result<Vec<DiskVersion>> {
        Ok(self
            .list_versions_in_namespace(namespace)?
            .into_iter()
            .filter(|found| !registered.contains(&found.key()))
            .collect())
    }

    // ---- deletion ----

    /// Delete one version directory and prune empty ancestors up to, but
    /// not including, the namespace directory.
    pub fn delete_version(&self, namespace: &str, package: &str, version: &str) -> Result<bool> {
        let path = self.version_path(namespace, package, version);
        let removed = io::remove_dir_all_if_exists(&path)?;
        self.prune_empty_ancestors(namespace, &path)?;
        Ok(removed)
    }

    /// Delete every version of a package.
    pub fn delete_package(&self, namespace: &str, package: &str) -> Result<bool> {
        let path = self.package_path(namespace, package);
        let removed = io::remove_dir_all_if_exists(&path)?;
        self.prune_empty_ancestors(namespace, &path)?;
        Ok(removed)
    }

    /// Delete a namespace directory with everything below it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReservedNamespace`] for the privileged namespace,
    /// before touching the filesystem.
    pub fn delete_namespace(&self, namespace: &str) -> Result<bool> {
        if names::is_privileged(namespace) {
            return Err(Error::ReservedNamespace {
                namespace: namespace.to_string(),
            });
        }
        Ok(io::remove_dir_all_if_exists(&self.namespace_path(namespace))?)
    }

    fn prune_empty_ancestors(&self, namespace: &str, removed: &NormalizedPath) -> Result<()> {
        let stop = self.namespace_path(namespace);
        let mut current = removed.parent();

        while let Some(dir) = current {
            if dir == stop || dir.strip_prefix(&stop).is_none() {
                break;
            }
            if !io::remove_dir_if_empty(&dir)? {
                break;
            }
            tracing::debug!(path = %dir, "Pruned empty directory");
            current = dir.parent();
        }
        Ok(())
    }

    // ---- signatures ----

    /// Read the signature marker, trimmed. `None` if it does not exist.
    pub fn read_signature(
        &self,
        namespace: &str,
        package: &str,
        version: &str,
    ) -> Result<Option<String>> {
        let path = self.signature_path(namespace, package, version);
        Ok(io::read_text_if_exists(&path)?.map(|s| s.trim().to_string()))
    }

    pub fn write_signature(
        &self,
        namespace: &str,
        package: &str,
        version: &str,
        signature: &str,
    ) -> Result<()> {
        let path = self.signature_path(namespace, package, version);
        io::write_text(&path, &format!("{signature}\n"))?;
        Ok(())
    }

    // ---- usage ----

    /// Bytes used by the whole artifact tree.
    pub fn disk_usage(&self) -> Result<u64> {
        Ok(io::dir_size(&self.namespaces_dir)?)
    }

    /// Bytes used by one namespace.
    pub fn namespace_usage(&self, namespace: &str) -> Result<u64> {
        Ok(io::dir_size(&self.namespace_path(namespace))?)
    }
}

/// Drop dot-directories (temp files, editor droppings) from a listing.
fn visible(names: Vec<String>) -> Vec<String> {
    names.into_iter().filter(|n| !n.starts_with('.')).collect()
}
