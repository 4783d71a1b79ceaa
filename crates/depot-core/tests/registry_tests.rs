//! Property tests for registry mutators

use depot_core::registry::{Registry, RegistryIndex, VersionEntry};
use depot_core::{Error, PRIVILEGED_NAMESPACE};
use depot_fs::NormalizedPath;
use proptest::prelude::*;
use std::collections::BTreeSet;
use tempfile::tempdir;

#[derive(Debug, Clone)]
enum Op {
    Add(String, String, String),
    RemoveVersion(String, String, String),
    RemovePackage(String, String),
    RemoveNamespace(String),
}

fn name(options: &'static [&'static str]) -> impl Strategy<Value = String> {
    prop::sample::select(options).prop_map(String::from)
}

fn op() -> impl Strategy<Value = Op> {
    let ns = || name(&["global", "team", "ops"]);
    let pkg = || name(&["lib", "@scope/lib", "app"]);
    let ver = || name(&["1.0.0", "1.1.0", "2.0.0"]);
    prop_oneof![
        4 => (ns(), pkg(), ver()).prop_map(|(n, p, v)| Op::Add(n, p, v)),
        2 => (ns(), pkg(), ver()).prop_map(|(n, p, v)| Op::RemoveVersion(n, p, v)),
        1 => (ns(), pkg()).prop_map(|(n, p)| Op::RemovePackage(n, p)),
        1 => ns().prop_map(Op::RemoveNamespace),
    ]
}

proptest! {
    #[test]
    fn mutators_keep_registry_well_formed(ops in prop::collection::vec(op(), 0..40)) {
        let mut registry = Registry::new();
        let mut model: BTreeSet<(String, String, String)> = BTreeSet::new();

        for op in ops {
            match op {
                Op::Add(n, p, v) => {
                    registry.add_version(&n, &p, &v, VersionEntry::new("ab".repeat(32), 1));
                    model.insert((n, p, v));
                }
                Op::RemoveVersion(n, p, v) => {
                    let key = (n, p, v);
                    let removed = registry.remove_version(&key.0, &key.1, Some(key.2.as_str()));
                    prop_assert_eq!(removed, model.remove(&key));
                }
                Op::RemovePackage(n, p) => {
                    registry.remove_version(&n, &p, None);
                    model.retain(|(mn, mp, _)| !(mn == &n && mp == &p));
                }
                Op::RemoveNamespace(n) => match registry.remove_namespace(&n) {
                    Err(Error::ReservedNamespace { .. }) => {
                        prop_assert_eq!(n.as_str(), PRIVILEGED_NAMESPACE);
                    }
                    Err(other) => {
                        prop_assert!(false, "unexpected error {}", other);
                    }
                    Ok(_) => model.retain(|(mn, _, _)| mn != &n),
                },
            }

            prop_assert!(registry.has_namespace(PRIVILEGED_NAMESPACE));
            let namespaces = registry.namespaces();
            prop_assert_eq!(namespaces.first().map(String::as_str), Some(PRIVILEGED_NAMESPACE));
            for ns in registry.namespaces() {
                for pkg in registry.packages(&ns) {
                    prop_assert!(!registry.versions(&ns, &pkg).is_empty(), "{}:{} has no versions", ns, pkg);
                }
            }
        }

        let actual: BTreeSet<_> = registry
            .entries()
            .map(|e| (e.namespace.to_string(), e.package.to_string(), e.version.to_string()))
            .collect();
        prop_assert_eq!(registry.version_count(), model.len());
        prop_assert_eq!(actual, model);
    }

    #[test]
    fn persisted_registry_reads_back_equal(ops in prop::collection::vec(op(), 0..20)) {
        let dir = tempdir().unwrap();
        let index = RegistryIndex::at(NormalizedPath::new(dir.path().join("registry.toml")));

        let mut registry = Registry::new();
        for op in ops {
            if let Op::Add(n, p, v) = op {
                registry.add_version(&n, &p, &v, VersionEntry::new("cd".repeat(32), 2));
            }
        }
        index.write(&registry).unwrap();

        prop_assert_eq!(index.read().unwrap(), registry);
    }
}
