//! Report types for verification and pruning
//!
//! Describe how the registry index and the artifact tree disagree, and
//! what (if anything) was done about it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Identifies one published version in one namespace
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionRef {
    pub namespace: String,
    pub package: String,
    pub version: String,
}

impl VersionRef {
    pub fn new(
        namespace: impl Into<String>,
        package: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            package: package.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for VersionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.namespace, self.package, self.version)
    }
}

/// Which check found a signature disagreement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MismatchKind {
    /// The marker file is missing or differs from the recorded signature
    Marker,
    /// The marker agrees, but the files no longer hash to it
    Content,
}

/// A version present on both sides whose signatures disagree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureMismatch {
    pub target: VersionRef,
    pub kind: MismatchKind,
    /// Signature stored in the registry
    pub recorded: String,
    /// Signature found on disk; `None` when the marker file is missing
    pub actual: Option<String>,
}

/// A repair performed by `verify` with fixing enabled, or by `prune`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Repair {
    /// A registry entry without a directory was removed from the index
    DroppedRegistryEntry(VersionRef),
    /// A directory without a registry entry was deleted
    DeletedDiskVersion(VersionRef),
}

/// Overall verdict of a verification run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerifyStatus {
    /// Index and disk agree
    Healthy,
    /// Only signature mismatches remain; these need an operator
    Mismatched,
    /// At least one orphan exists
    Diverged,
}

/// Result of [`crate::Depot::verify`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Registry entries with no matching directory
    pub registry_orphans: Vec<VersionRef>,
    /// Directories with no matching registry entry
    pub disk_orphans: Vec<VersionRef>,
    /// Signature disagreements; never repaired automatically
    pub signature_mismatches: Vec<SignatureMismatch>,
    /// What was repaired (empty unless fixing was requested)
    pub repairs: Vec<Repair>,
}

impl VerifyReport {
    pub fn status(&self) -> VerifyStatus {
        if !self.registry_orphans.is_empty() || !self.disk_orphans.is_empty() {
            VerifyStatus::Diverged
        } else if !self.signature_mismatches.is_empty() {
            VerifyStatus::Mismatched
        } else {
            VerifyStatus::Healthy
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status() == VerifyStatus::Healthy
    }

    pub fn orphan_count(&self) -> usize {
        self.registry_orphans.len() + self.disk_orphans.len()
    }

    /// Machine-readable form for tooling.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Result of [`crate::Depot::prune`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneReport {
    /// Whether the run only reported
    pub dry_run: bool,
    /// Disk orphans found
    pub orphans: Vec<VersionRef>,
    /// Disk orphans actually deleted
    pub removed: Vec<VersionRef>,
    /// Bytes occupied by the orphans found
    pub bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_prefers_orphans_over_mismatches() {
        let target = VersionRef::new("global", "lib", "1.0.0");
        let mut report = VerifyReport::default();
        assert_eq!(report.status(), VerifyStatus::Healthy);

        report.signature_mismatches.push(SignatureMismatch {
            target: target.clone(),
            kind: MismatchKind::Marker,
            recorded: "a".into(),
            actual: None,
        });
        assert_eq!(report.status(), VerifyStatus::Mismatched);

        report.disk_orphans.push(target);
        assert_eq!(report.status(), VerifyStatus::Diverged);
        assert_eq!(report.orphan_count(), 1);
    }

    #[test]
    fn version_ref_display() {
        let target = VersionRef::new("global", "@scope/lib", "1.0.0");
        assert_eq!(target.to_string(), "global:@scope/lib@1.0.0");
    }

    #[test]
    fn json_form_names_orphans() {
        let report = VerifyReport {
            registry_orphans: vec![VersionRef::new("global", "lib", "1.0.0")],
            ..Default::default()
        };
        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["registry_orphans"][0]["package"], "lib");
        assert!(value["repairs"].as_array().unwrap().is_empty());
    }
}
