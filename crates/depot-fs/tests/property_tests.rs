use depot_fs::NormalizedPath;
use depot_fs::signature::{is_signature, signature_of};
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_normalization_has_no_backslashes(s in "\\PC*") {
        let path = NormalizedPath::new(&s);
        prop_assert!(!path.as_str().contains('\\'));

        let roundtripped = NormalizedPath::new(path.to_native());
        prop_assert_eq!(path, roundtripped);
    }

    #[test]
    fn test_signature_is_permutation_invariant(
        files in proptest::collection::btree_map("[a-z]{1,8}(/[a-z]{1,8})?", proptest::collection::vec(any::<u8>(), 0..64), 0..8)
    ) {
        let forward: Vec<(&str, &[u8])> = files.iter().map(|(k, v)| (k.as_str(), v.as_slice())).collect();
        let mut reversed = forward.clone();
        reversed.reverse();

        let a = signature_of(forward);
        let b = signature_of(reversed);
        prop_assert!(is_signature(&a));
        prop_assert_eq!(a, b);
    }
}
