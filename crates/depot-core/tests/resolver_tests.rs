//! Property tests for namespace-ordered resolution

use depot_core::registry::{Registry, VersionEntry};
use depot_core::{PackageSpec, PackageStore, Resolver, StoreConfig};
use proptest::prelude::*;
const NAMESPACES: &[&str] = &["global", "team", "ops", "qa"];
const VERSIONS: &[&str] = &["1.0.0", "2.0.0", "3.0.0"];

proptest! {
    #[test]
    fn first_namespace_holding_the_version_wins(
        holders in prop::sample::subsequence(NAMESPACES.to_vec(), 0..=NAMESPACES.len()),
        order in Just(NAMESPACES.to_vec()).prop_shuffle(),
    ) {
        let mut registry = Registry::new();
        for (i, ns) in holders.iter().enumerate() {
            registry.add_version(ns, "@scope/lib", "1.0.0", VersionEntry::new(format!("{i:0>64}"), 1));
        }
        let store = PackageStore::new(&StoreConfig::new("/store"));
        let resolver = Resolver::new(&registry, &store);
        let spec = PackageSpec::new("@scope/lib", "1.0.0");

        let first = resolver.resolve(&spec, &order);
        let again = resolver.resolve(&spec, &order);
        prop_assert_eq!(&first, &again);

        let expected = order.iter().position(|ns| holders.contains(ns));
        match expected {
            Some(idx) => {
                prop_assert_eq!(first.namespace(), Some(order[idx]));
                prop_assert_eq!(first.searched().len(), idx + 1);
            }
            None => {
                prop_assert!(!first.is_found());
                prop_assert_eq!(first.searched().len(), order.len());
            }
        }
    }

    #[test]
    fn batch_resolution_matches_single_resolution(
        versions in prop::collection::vec(prop::sample::select(VERSIONS), 1..6),
        order in Just(NAMESPACES.to_vec()).prop_shuffle(),
    ) {
        let mut registry = Registry::new();
        registry.add_version("team", "lib", "1.0.0", VersionEntry::new("a".repeat(64), 1));
        registry.add_version("qa", "lib", "2.0.0", VersionEntry::new("b".repeat(64), 1));
        let store = PackageStore::new(&StoreConfig::new("/store"));
        let resolver = Resolver::new(&registry, &store);

        let specs: Vec<_> = versions.iter().map(|v| PackageSpec::new("lib", *v)).collect();
        let batch = resolver.resolve_all(&specs, &order);

        prop_assert_eq!(batch.len(), specs.len());
        for (spec, result) in specs.iter().zip(&batch) {
            prop_assert_eq!(result, &resolver.resolve(spec, &order));
        }
    }
}
