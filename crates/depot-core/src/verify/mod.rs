//! Reconciliation of the registry index with the artifact tree
//!
//! The index and the tree are persisted independently, so a crash between
//! a disk mutation and the following index write leaves one of two orphan
//! classes behind. `verify` finds both (plus signature disagreements) and
//! optionally repairs the orphans; `prune` only removes disk orphans.

mod report;

pub use report::{
    MismatchKind, PruneReport, Repair, SignatureMismatch, VerifyReport, VerifyStatus, VersionRef,
};

use std::collections::BTreeSet;

use depot_fs::{io, signature};

use crate::Result;
use crate::depot::Depot;
use crate::registry::Registry;
use crate::store::PackageStore;

/// Options for [`Depot::verify`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Drop registry orphans and delete disk orphans
    pub fix: bool,
    /// Also rehash each version's files against the recorded signature
    pub deep: bool,
}

impl VerifyOptions {
    pub fn check() -> Self {
        Self::default()
    }

    pub fn fix() -> Self {
        Self {
            fix: true,
            deep: false,
        }
    }

    pub fn with_deep(mut self, deep: bool) -> Self {
        self.deep = deep;
        self
    }
}

/// Options for [`Depot::prune`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneOptions {
    /// Report what would be removed without removing it
    pub dry_run: bool,
}

impl PruneOptions {
    pub fn dry_run() -> Self {
        Self { dry_run: true }
    }
}

impl Depot {
    /// Compare the registry with the artifact tree.
    ///
    /// Without `fix` this only reads and takes no lock. With `fix` the whole
    /// scan and repair runs under the store lock: registry orphans are
    /// removed from the index, disk orphans are deleted. Signature
    /// mismatches are reported and left alone in either mode.
    pub fn verify(&self, options: VerifyOptions) -> Result<VerifyReport> {
        if !options.fix {
            let registry = self.index.read()?;
            return scan(&registry, &self.store, options.deep);
        }

        let lock = self.locks.options("verify --fix");
        self.locks.with_lock(&lock, || {
            let mut registry = self.index.read()?;
            let mut report = scan(&registry, &self.store, options.deep)?;

            for orphan in &report.registry_orphans {
                if registry.remove_version(&orphan.namespace, &orphan.package, Some(orphan.version.as_str())) {
                    tracing::warn!(entry = %orphan, "Dropped registry entry with no directory");
                    report.repairs.push(Repair::DroppedRegistryEntry(orphan.clone()));
                }
            }
            if !report.repairs.is_empty() {
                self.index.write(&registry)?;
            }

            for orphan in &report.disk_orphans {
                if self
                    .store
                    .delete_version(&orphan.namespace, &orphan.package, &orphan.version)?
                {
                    tracing::warn!(entry = %orphan, "Deleted directory with no registry entry");
                    report.repairs.push(Repair::DeletedDiskVersion(orphan.clone()));
                }
            }

            tracing::info!(
                repairs = report.repairs.len(),
                mismatches = report.signature_mismatches.len(),
                "Verification with repair finished"
            );
            Ok(report)
        })
    }

    /// Remove disk orphans. A dry run reports them without taking the lock.
    pub fn prune(&self, options: PruneOptions) -> Result<PruneReport> {
        if options.dry_run {
            let registry = self.index.read()?;
            let orphans = disk_orphans(&registry, &self.store)?;
            let bytes = orphan_bytes(&self.store, &orphans)?;
            tracing::debug!(orphans = orphans.len(), bytes, "Prune dry run");
            return Ok(PruneReport {
                dry_run: true,
                orphans,
                removed: Vec::new(),
                bytes,
            });
        }

        let lock = self.locks.options("prune");
        self.locks.with_lock(&lock, || {
            let registry = self.index.read()?;
            let orphans = disk_orphans(&registry, &self.store)?;
            let bytes = orphan_bytes(&self.store, &orphans)?;

            let mut removed = Vec::with_capacity(orphans.len());
            for orphan in &orphans {
                if self
                    .store
                    .delete_version(&orphan.namespace, &orphan.package, &orphan.version)?
                {
                    tracing::warn!(entry = %orphan, "Pruned orphaned directory");
                    removed.push(orphan.clone());
                }
            }

            tracing::info!(removed = removed.len(), bytes, "Prune finished");
            Ok(PruneReport {
                dry_run: false,
                orphans,
                removed,
                bytes,
            })
        })
    }
}

fn scan(registry: &Registry, store: &PackageStore, deep: bool) -> Result<VerifyReport> {
    let mut report = VerifyReport::default();

    for item in registry.entries() {
        let target = VersionRef::new(item.namespace, item.package, item.version);
        if !store.version_exists(item.namespace, item.package, item.version) {
            report.registry_orphans.push(target);
            continue;
        }

        let recorded = &item.entry.signature;
        let marker = store.read_signature(item.namespace, item.package, item.version)?;
        if marker.as_deref() != Some(recorded.as_str()) {
            report.signature_mismatches.push(SignatureMismatch {
                target,
                kind: MismatchKind::Marker,
                recorded: recorded.clone(),
                actual: marker,
            });
            continue;
        }

        if deep {
            let path = store.version_path(item.namespace, item.package, item.version);
            let actual = signature::compute_signature(&path)?;
            if &actual != recorded {
                report.signature_mismatches.push(SignatureMismatch {
                    target,
                    kind: MismatchKind::Content,
                    recorded: recorded.clone(),
                    actual: Some(actual),
                });
            }
        }
    }

    report.disk_orphans = disk_orphans(registry, store)?;
    tracing::debug!(
        registry_orphans = report.registry_orphans.len(),
        disk_orphans = report.disk_orphans.len(),
        mismatches = report.signature_mismatches.len(),
        "Scanned store"
    );
    Ok(report)
}

/// Directories on disk with no registry entry, across every namespace
/// known to either side.
fn disk_orphans(registry: &Registry, store: &PackageStore) -> Result<Vec<VersionRef>> {
    let namespaces: BTreeSet<String> = registry
        .namespaces()
        .into_iter()
        .chain(store.list_namespaces()?)
        .collect();

    let mut orphans = Vec::new();
    for namespace in namespaces {
        let registered = registry.registered_keys(&namespace);
        orphans.extend(
            store
                .find_orphaned(&namespace, &registered)?
                .into_iter()
                .map(|found| VersionRef::new(namespace.as_str(), found.package, found.version)),
        );
    }
    Ok(orphans)
}

fn orphan_bytes(store: &PackageStore, orphans: &[VersionRef]) -> Result<u64> {
    orphans.iter().try_fold(0u64, |total, orphan| {
        let path = store.version_path(&orphan.namespace, &orphan.package, &orphan.version);
        Ok(total + io::dir_size(&path)?)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::registry::VersionEntry;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn setup() -> (TempDir, Registry, PackageStore) {
        let dir = tempdir().unwrap();
        let store = PackageStore::new(&StoreConfig::new(dir.path()));
        (dir, Registry::new(), store)
    }

    fn plant(store: &PackageStore, ns: &str, pkg: &str, ver: &str) -> String {
        let path = store.version_path(ns, pkg, ver);
        fs::create_dir_all(path.to_native()).unwrap();
        fs::write(path.join("index.js").to_native(), format!("{pkg}@{ver}")).unwrap();
        let sig = signature::compute_signature(&path).unwrap();
        store.write_signature(ns, pkg, ver, &sig).unwrap();
        sig
    }

    #[test]
    fn consistent_store_is_healthy() {
        let (_dir, mut registry, store) = setup();
        let sig = plant(&store, "global", "@scope/lib", "1.0.0");
        registry.add_version("global", "@scope/lib", "1.0.0", VersionEntry::new(sig, 1));

        let report = scan(&registry, &store, true).unwrap();
        assert!(report.is_healthy(), "{report:?}");
    }

    #[test]
    fn missing_marker_is_a_mismatch_not_an_orphan() {
        let (_dir, mut registry, store) = setup();
        let sig = plant(&store, "team", "lib", "1.0.0");
        fs::remove_file(store.signature_path("team", "lib", "1.0.0").to_native()).unwrap();
        registry.add_version("team", "lib", "1.0.0", VersionEntry::new(sig.clone(), 1));

        let report = scan(&registry, &store, false).unwrap();
        assert_eq!(report.orphan_count(), 0);
        assert_eq!(
            report.signature_mismatches,
            vec![SignatureMismatch {
                target: VersionRef::new("team", "lib", "1.0.0"),
                kind: MismatchKind::Marker,
                recorded: sig,
                actual: None,
            }]
        );
    }

    #[test]
    fn deep_scan_detects_tampered_content() {
        let (_dir, mut registry, store) = setup();
        let sig = plant(&store, "global", "lib", "2.0.0");
        registry.add_version("global", "lib", "2.0.0", VersionEntry::new(sig, 1));
        let file = store.version_path("global", "lib", "2.0.0").join("index.js");
        fs::write(file.to_native(), "tampered").unwrap();

        assert!(scan(&registry, &store, false).unwrap().is_healthy());

        let deep = scan(&registry, &store, true).unwrap();
        assert_eq!(deep.status(), VerifyStatus::Mismatched);
        assert_eq!(deep.signature_mismatches[0].kind, MismatchKind::Content);
    }

    #[test]
    fn disk_orphans_span_unregistered_namespaces() {
        let (_dir, registry, store) = setup();
        plant(&store, "stray", "lib", "0.1.0");

        let orphans = disk_orphans(&registry, &store).unwrap();
        assert_eq!(orphans, vec![VersionRef::new("stray", "lib", "0.1.0")]);
    }
}
