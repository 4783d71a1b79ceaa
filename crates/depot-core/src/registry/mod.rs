//! Registry index
//!
//! The registry is the single document describing every namespace, package
//! and published version in a store. [`Registry`] is the in-memory form with
//! pure mutators; [`RegistryIndex`] reads and atomically persists it.
//!
//! Mutators never touch disk. Callers hold the store lock, mutate, and then
//! persist with [`RegistryIndex::write`].

mod index;

pub use index::RegistryIndex;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::names::{self, PRIVILEGED_NAMESPACE, SCOPE_SEPARATOR};
use crate::{Error, Result};

/// Current registry document schema
pub const SCHEMA_VERSION: &str = "1";

/// Record of one published version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    /// Hex content signature of the published files
    pub signature: String,
    /// When the version was published
    pub published: DateTime<Utc>,
    /// Number of published files (the marker file is not counted)
    pub files: u64,
}

impl VersionEntry {
    pub fn new(signature: impl Into<String>, files: u64) -> Self {
        Self {
            signature: signature.into(),
            published: Utc::now(),
            files,
        }
    }
}

/// All versions of one package within a namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    pub versions: BTreeMap<String, VersionEntry>,
}

/// One isolation scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceEntry {
    pub created: DateTime<Utc>,
    pub packages: BTreeMap<String, PackageEntry>,
}

impl NamespaceEntry {
    pub fn new() -> Self {
        Self {
            created: Utc::now(),
            packages: BTreeMap::new(),
        }
    }
}

impl Default for NamespaceEntry {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a package was found by [`Registry::locate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageLocation {
    pub namespace: String,
    pub package: String,
    pub versions: Vec<String>,
}

/// One row of [`Registry::entries`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRef<'a> {
    pub namespace: &'a str,
    pub package: &'a str,
    pub version: &'a str,
    pub entry: &'a VersionEntry,
}

/// In-memory registry document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    schema_version: String,
    namespaces: BTreeMap<String, NamespaceEntry>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// An empty registry containing only the privileged namespace.
    pub fn new() -> Self {
        let mut namespaces = BTreeMap::new();
        namespaces.insert(PRIVILEGED_NAMESPACE.to_string(), NamespaceEntry::new());
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            namespaces,
        }
    }

    pub(crate) fn from_parts(
        schema_version: String,
        namespaces: BTreeMap<String, NamespaceEntry>,
    ) -> Self {
        let mut registry = Self {
            schema_version,
            namespaces,
        };
        registry.ensure_namespace(PRIVILEGED_NAMESPACE);
        registry
    }

    pub fn schema_version(&self) -> &str {
        &self.schema_version
    }

    // ---- mutators ----

    /// Create `namespace` if missing. Returns `true` when it was created.
    pub fn ensure_namespace(&mut self, namespace: &str) -> bool {
        if self.namespaces.contains_key(namespace) {
            return false;
        }
        self.namespaces
            .insert(namespace.to_string(), NamespaceEntry::new());
        true
    }

    /// Record a version, creating its namespace and package as needed.
    ///
    /// Returns the entry it replaced, if any.
    pub fn add_version(
        &mut self,
        namespace: &str,
        package: &str,
        version: &str,
        entry: VersionEntry,
    ) -> Option<VersionEntry> {
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .packages
            .entry(package.to_string())
            .or_default()
            .versions
            .insert(version.to_string(), entry)
    }

    /// Remove one version, or the whole package when `version` is `None`.
    ///
    /// A package left with no versions is removed too. Returns whether
    /// anything was removed.
    pub fn remove_version(&mut self, namespace: &str, package: &str, version: Option<&str>) -> bool {
        let Some(ns) = self.namespaces.get_mut(namespace) else {
            return false;
        };

        match version {
            None => ns.packages.remove(package).is_some(),
            Some(version) => {
                let Some(pkg) = ns.packages.get_mut(package) else {
                    return false;
                };
                let removed = pkg.versions.remove(version).is_some();
                if pkg.versions.is_empty() {
                    ns.packages.remove(package);
                }
                removed
            }
        }
    }

    /// Remove a namespace with all of its packages.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReservedNamespace`] for the privileged namespace.
    pub fn remove_namespace(&mut self, namespace: &str) -> Result<Option<NamespaceEntry>> {
        if names::is_privileged(namespace) {
            return Err(Error::ReservedNamespace {
                namespace: namespace.to_string(),
            });
        }
        Ok(self.namespaces.remove(namespace))
    }

    // ---- queries ----

    /// Namespace names, privileged first, the rest alphabetical.
    pub fn namespaces(&self) -> Vec<String> {
        names::sort_namespaces(self.namespaces.keys().cloned())
    }

    pub fn namespace(&self, namespace: &str) -> Option<&NamespaceEntry> {
        self.namespaces.get(namespace)
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    /// Package names in `namespace`; empty when the namespace is absent.
    pub fn packages(&self, namespace: &str) -> Vec<String> {
        self.namespaces
            .get(namespace)
            .map(|ns| ns.packages.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn package(&self, namespace: &str, package: &str) -> Option<&PackageEntry> {
        self.namespaces.get(namespace)?.packages.get(package)
    }

    /// Versions of `package` in `namespace`; empty when either is absent.
    pub fn versions(&self, namespace: &str, package: &str) -> Vec<String> {
        self.package(namespace, package)
            .map(|pkg| pkg.versions.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn version(&self, namespace: &str, package: &str, version: &str) -> Option<&VersionEntry> {
        self.package(namespace, package)?.versions.get(version)
    }

    pub fn contains(&self, namespace: &str, package: &str, version: &str) -> bool {
        self.version(namespace, package, version).is_some()
    }

    /// Every namespace containing `package`, in namespace order.
    pub fn locate(&self, package: &str) -> Vec<PackageLocation> {
        self.namespaces()
            .into_iter()
            .filter_map(|namespace| {
                let versions = self.versions(&namespace, package);
                (!versions.is_empty()).then(|| PackageLocation {
                    namespace,
                    package: package.to_string(),
                    versions,
                })
            })
            .collect()
    }

    /// Every package under `scope` (`@scope` or `@scope/`), across namespaces.
    pub fn locate_scope(&self, scope: &str) -> Vec<PackageLocation> {
        let prefix = format!("{}{}", scope.trim_end_matches(SCOPE_SEPARATOR), SCOPE_SEPARATOR);

        let mut found = Vec::new();
        for namespace in self.namespaces() {
            let Some(ns) = self.namespaces.get(&namespace) else {
                continue;
            };
            for (package, entry) in ns.packages.range(prefix.clone()..) {
                if !package.starts_with(&prefix) {
                    break;
                }
                found.push(PackageLocation {
                    namespace: namespace.clone(),
                    package: package.clone(),
                    versions: entry.versions.keys().cloned().collect(),
                });
            }
        }
        found
    }

    /// Total number of published versions across all namespaces.
    pub fn version_count(&self) -> usize {
        self.namespaces
            .values()
            .flat_map(|ns| ns.packages.values())
            .map(|pkg| pkg.versions.len())
            .sum()
    }

    /// `package@version` keys registered in `namespace`.
    pub fn registered_keys(&self, namespace: &str) -> BTreeSet<String> {
        let Some(ns) = self.namespaces.get(namespace) else {
            return BTreeSet::new();
        };
        ns.packages
            .iter()
            .flat_map(|(package, pkg)| {
                pkg.versions
                    .keys()
                    .map(move |version| names::version_key(package, version))
            })
            .collect()
    }

    /// Every version entry, in namespace, package, version order.
    pub fn entries(&self) -> impl Iterator<Item = EntryRef<'_>> {
        self.namespaces()
            .into_iter()
            .filter_map(move |name| self.namespaces.get_key_value(name.as_str()))
            .flat_map(|(namespace, ns)| {
                ns.packages.iter().flat_map(move |(package, pkg)| {
                    pkg.versions.iter().map(move |(version, entry)| EntryRef {
                        namespace,
                        package,
                        version,
                        entry,
                    })
                })
            })
    }
}
