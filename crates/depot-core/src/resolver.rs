//! Namespace-ordered package resolution
//!
//! Resolution is exact: a `(name, version)` pair either exists in a namespace
//! or it does not. Namespaces are tried in the caller's order and the first
//! hit wins. Choosing a "best" version for a range belongs to callers.

use std::fmt;
use std::str::FromStr;

use depot_fs::NormalizedPath;

use crate::names::PRIVILEGED_NAMESPACE;
use crate::registry::Registry;
use crate::store::PackageStore;
use crate::{Error, Result};

/// A parsed `name@version` request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageSpec {
    pub name: String,
    pub version: String,
}

impl PackageSpec {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

impl FromStr for PackageSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_specifier(s)
    }
}

/// Parse `name@version`. Scoped names (`@scope/name@1.0.0`) split on the
/// last `@` that is not the leading scope marker.
///
/// # Errors
///
/// Returns [`Error::InvalidSpecifier`] when either half is missing.
pub fn parse_specifier(input: &str) -> Result<PackageSpec> {
    let trimmed = input.trim();
    let invalid = || Error::InvalidSpecifier {
        input: input.to_string(),
    };

    let at = trimmed.rfind('@').filter(|&idx| idx > 0).ok_or_else(invalid)?;
    let (name, version) = (&trimmed[..at], &trimmed[at + 1..]);
    if name.is_empty() || version.is_empty() || name.ends_with('/') {
        return Err(invalid());
    }
    Ok(PackageSpec::new(name, version))
}

/// Parse many specifiers, silently dropping malformed ones.
pub fn parse_specifiers<I, S>(inputs: I) -> Vec<PackageSpec>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    inputs
        .into_iter()
        .filter_map(|input| match parse_specifier(input.as_ref()) {
            Ok(spec) => Some(spec),
            Err(e) => {
                tracing::debug!("Skipping specifier: {}", e);
                None
            }
        })
        .collect()
}

/// The namespaces to search, in order: the caller's list without
/// duplicates, or just the privileged namespace when the list is empty.
pub fn search_order<S: AsRef<str>>(namespaces: &[S]) -> Vec<String> {
    let mut order: Vec<String> = Vec::with_capacity(namespaces.len().max(1));
    for ns in namespaces {
        let ns = ns.as_ref();
        if !order.iter().any(|seen| seen == ns) {
            order.push(ns.to_string());
        }
    }
    if order.is_empty() {
        order.push(PRIVILEGED_NAMESPACE.to_string());
    }
    order
}

/// Outcome of resolving one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found {
        spec: PackageSpec,
        namespace: String,
        path: NormalizedPath,
        signature: String,
        /// Namespaces tried, ending with the one that matched
        searched: Vec<String>,
    },
    NotFound {
        spec: PackageSpec,
        /// Every namespace tried
        searched: Vec<String>,
    },
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    pub fn spec(&self) -> &PackageSpec {
        match self {
            Self::Found { spec, .. } | Self::NotFound { spec, .. } => spec,
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        match self {
            Self::Found { namespace, .. } => Some(namespace),
            Self::NotFound { .. } => None,
        }
    }

    pub fn searched(&self) -> &[String] {
        match self {
            Self::Found { searched, .. } | Self::NotFound { searched, .. } => searched,
        }
    }
}

/// Resolves packages against one registry snapshot
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    registry: &'a Registry,
    store: &'a PackageStore,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a Registry, store: &'a PackageStore) -> Self {
        Self { registry, store }
    }

    /// Find the first namespace in `namespaces` holding exactly `spec`.
    pub fn resolve<S: AsRef<str>>(&self, spec: &PackageSpec, namespaces: &[S]) -> Resolution {
        let order = search_order(namespaces);
        let mut searched = Vec::with_capacity(order.len());

        for namespace in order {
            searched.push(namespace.clone());
            if let Some(entry) = self.registry.version(&namespace, &spec.name, &spec.version) {
                return Resolution::Found {
                    spec: spec.clone(),
                    path: self.store.version_path(&namespace, &spec.name, &spec.version),
                    signature: entry.signature.clone(),
                    namespace,
                    searched,
                };
            }
        }

        Resolution::NotFound {
            spec: spec.clone(),
            searched,
        }
    }

    /// Resolve each spec independently, preserving order. A miss never
    /// stops the batch.
    pub fn resolve_all<S: AsRef<str>>(&self, specs: &[PackageSpec], namespaces: &[S]) -> Vec<Resolution> {
        specs.iter().map(|spec| self.resolve(spec, namespaces)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::registry::VersionEntry;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn fixture() -> (Registry, PackageStore) {
        let mut registry = Registry::new();
        registry.add_version("nsA", "lib", "1.0.0", VersionEntry::new("aa".repeat(32), 1));
        registry.add_version("nsB", "lib", "1.0.0", VersionEntry::new("bb".repeat(32), 1));
        registry.add_version("global", "@scope/lib", "1.0.1", VersionEntry::new("cc".repeat(32), 1));
        (registry, PackageStore::new(&StoreConfig::new("/store")))
    }

    #[rstest]
    #[case("lib@1.0.0", "lib", "1.0.0")]
    #[case("@scope/lib@1.0.0", "@scope/lib", "1.0.0")]
    #[case("  pkg@2.0.0-beta.1  ", "pkg", "2.0.0-beta.1")]
    fn parses_specifiers(#[case] input: &str, #[case] name: &str, #[case] version: &str) {
        assert_eq!(parse_specifier(input).unwrap(), PackageSpec::new(name, version));
    }

    #[rstest]
    #[case("lib")]
    #[case("lib@")]
    #[case("@scope/lib")]
    #[case("@1.0.0")]
    #[case("")]
    #[case("@scope/@1.0.0")]
    fn rejects_malformed_specifiers(#[case] input: &str) {
        assert!(matches!(parse_specifier(input), Err(Error::InvalidSpecifier { .. })));
    }

    #[test]
    fn batch_parsing_drops_malformed() {
        let specs = parse_specifiers(["a@1", "broken", "@s/b@2", "c@"]);
        assert_eq!(specs, vec![PackageSpec::new("a", "1"), PackageSpec::new("@s/b", "2")]);
    }

    #[test]
    fn namespace_order_decides() {
        let (registry, store) = fixture();
        let resolver = Resolver::new(&registry, &store);
        let spec = PackageSpec::new("lib", "1.0.0");

        let ab = resolver.resolve(&spec, &["nsA", "nsB"]);
        let ba = resolver.resolve(&spec, &["nsB", "nsA"]);

        assert_eq!(ab.namespace(), Some("nsA"));
        assert_eq!(ba.namespace(), Some("nsB"));
        assert_eq!(ab.searched(), ["nsA"]);
    }

    #[test]
    fn found_carries_path_and_signature() {
        let (registry, store) = fixture();
        let resolution =
            Resolver::new(&registry, &store).resolve(&PackageSpec::new("lib", "1.0.0"), &["nsB"]);

        match resolution {
            Resolution::Found { path, signature, .. } => {
                assert_eq!(path.as_str(), "/store/namespaces/nsB/lib/1.0.0");
                assert_eq!(signature, "bb".repeat(32));
            }
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn exact_versions_only() {
        let (registry, store) = fixture();
        let resolution = Resolver::new(&registry, &store)
            .resolve(&PackageSpec::new("@scope/lib", "1.0.0"), &["global"]);

        assert!(!resolution.is_found());
        assert_eq!(resolution.searched(), ["global"]);
    }

    #[test]
    fn empty_namespace_list_defaults_to_privileged() {
        let (registry, store) = fixture();
        let resolver = Resolver::new(&registry, &store);
        let none: [&str; 0] = [];

        let hit = resolver.resolve(&PackageSpec::new("@scope/lib", "1.0.1"), &none);
        assert_eq!(hit.namespace(), Some("global"));

        let miss = resolver.resolve(&PackageSpec::new("lib", "1.0.0"), &none);
        assert_eq!(miss.searched(), ["global"]);
    }

    #[test]
    fn batch_preserves_order_and_continues_after_miss() {
        let (registry, store) = fixture();
        let specs = vec![
            PackageSpec::new("missing", "1"),
            PackageSpec::new("lib", "1.0.0"),
            PackageSpec::new("@scope/lib", "1.0.1"),
        ];

        let results = Resolver::new(&registry, &store).resolve_all(&specs, &["global", "nsB"]);

        let found: Vec<_> = results.iter().map(|r| r.namespace()).collect();
        assert_eq!(found, vec![None, Some("nsB"), Some("global")]);
        assert_eq!(results[0].searched(), ["global", "nsB"]);
    }

    #[test]
    fn search_order_dedupes() {
        assert_eq!(search_order(&["b", "a", "b"]), vec!["b", "a"]);
    }
}
