//! Persistence of the registry document
//!
//! The document on disk is parsed into a permissive shape first and then
//! normalized into a [`Registry`]. All repair of hand-edited or older
//! documents happens here, so the rest of the engine only sees
//! well-formed registries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use depot_fs::{ConfigStore, NormalizedPath, io};
use serde::Deserialize;

use super::{NamespaceEntry, PackageEntry, Registry, SCHEMA_VERSION, VersionEntry};
use crate::config::StoreConfig;
use crate::names::PRIVILEGED_NAMESPACE;
use crate::{Error, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RegistryDocument {
    schema_version: Option<String>,
    namespaces: BTreeMap<String, NamespaceDocument>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NamespaceDocument {
    created: Option<DateTime<Utc>>,
    packages: BTreeMap<String, PackageDocument>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PackageDocument {
    versions: BTreeMap<String, VersionEntry>,
}

impl RegistryDocument {
    fn normalize(self) -> Registry {
        let now = Utc::now();
        let namespaces = self
            .namespaces
            .into_iter()
            .map(|(name, ns)| {
                let packages = ns
                    .packages
                    .into_iter()
                    .filter(|(package, pkg)| {
                        let keep = !pkg.versions.is_empty();
                        if !keep {
                            tracing::debug!(namespace = %name, %package, "Dropping package with no versions");
                        }
                        keep
                    })
                    .map(|(package, pkg)| {
                        (
                            package,
                            PackageEntry {
                                versions: pkg.versions,
                            },
                        )
                    })
                    .collect();
                let entry = NamespaceEntry {
                    created: ns.created.unwrap_or(now),
                    packages,
                };
                (name, entry)
            })
            .collect::<BTreeMap<_, _>>();

        if !namespaces.contains_key(PRIVILEGED_NAMESPACE) {
            tracing::debug!("Registry is missing the '{}' namespace; restoring it", PRIVILEGED_NAMESPACE);
        }

        Registry::from_parts(
            self.schema_version
                .unwrap_or_else(|| SCHEMA_VERSION.to_string()),
            namespaces,
        )
    }
}

/// Reads and atomically writes the registry document of one store
#[derive(Debug, Clone)]
pub struct RegistryIndex {
    path: NormalizedPath,
}

impl RegistryIndex {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            path: config.registry_path(),
        }
    }

    /// Index backed by an explicit document path.
    pub fn at(path: NormalizedPath) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &NormalizedPath {
        &self.path
    }

    /// Read the registry.
    ///
    /// A missing document yields a fresh registry containing only the
    /// privileged namespace. Does not take the store lock; the snapshot may
    /// already be superseded but is never torn.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistryCorrupt`] if the document cannot be parsed,
    /// or an I/O error for anything other than "not found".
    pub fn read(&self) -> Result<Registry> {
        let Some(content) = io::read_text_if_exists(&self.path)? else {
            tracing::debug!(path = %self.path, "No registry document yet; starting empty");
            return Ok(Registry::new());
        };

        let document: RegistryDocument = ConfigStore::new()
            .parse(&self.path, &content)
            .map_err(|e| match e {
                depot_fs::Error::ConfigParse { path, message, .. } => {
                    Error::RegistryCorrupt { path, message }
                }
                other => other.into(),
            })?;

        Ok(document.normalize())
    }

    /// Persist the registry with write-to-temp-then-rename.
    pub fn write(&self, registry: &Registry) -> Result<()> {
        ConfigStore::new().save(&self.path, registry)?;
        tracing::debug!(path = %self.path, versions = registry.version_count(), "Wrote registry");
        Ok(())
    }
}
