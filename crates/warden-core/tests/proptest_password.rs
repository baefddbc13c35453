//! Property-based tests for the password hasher
//!
//! These tests verify:
//! - Any password verifies against its own digest
//! - A different password never verifies
//! - Arbitrary stored digests never panic and never verify

use proptest::prelude::*;
use warden_core::{PasswordConfig, PasswordHasher};

fn hasher() -> PasswordHasher {
    PasswordHasher::new(&PasswordConfig {
        pepper: "proptest-pepper".to_string(),
        memory_cost: 1024,
        time_cost: 1,
        parallelism: 1,
    })
    .expect("valid params")
}

proptest! {
    // Each case runs Argon2 several times; keep the count low
    #![proptest_config(ProptestConfig::with_cases(8))]

    /// Property: verify(p, hash(p)) holds and verify(q, hash(p)) does not
    #[test]
    fn prop_hash_verify_roundtrip(p in ".{1,64}", q in ".{1,64}") {
        prop_assume!(p != q);
        let hasher = hasher();
        let digest = hasher.hash(&p).unwrap();

        prop_assert!(hasher.verify(&p, &digest));
        prop_assert!(!hasher.verify(&q, &digest));
    }
}

proptest! {
    /// Property: arbitrary digest strings are a mismatch, never a panic
    #[test]
    fn prop_garbage_digest_is_false(digest in ".{0,200}") {
        prop_assert!(!hasher().verify("password", &digest));
    }

    /// Property: PHC-looking but corrupted digests are a mismatch
    #[test]
    fn prop_corrupted_phc_is_false(tail in "[A-Za-z0-9+/$=,]{0,80}") {
        let digest = format!("$argon2id$v=19$m=1024,t=1,p=1${tail}");
        prop_assert!(!hasher().verify("password", &digest));
    }
}
