use proptest::prelude::*;
use vaultbridge_crypto::aead;
use vaultbridge_crypto::kdf;

proptest! {
    #[test]
    fn seal_open_roundtrips_for_any_plaintext(key in any::<[u8; 32]>(), plaintext in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let (ct, nonce) = aead::seal(&key, &plaintext).unwrap();
        let pt = aead::open(&key, &ct, &nonce).unwrap();
        prop_assert_eq!(&pt[..], &plaintext[..]);
    }

    #[test]
    fn flipping_any_ciphertext_byte_breaks_the_tag(key in any::<[u8; 32]>(), plaintext in proptest::collection::vec(any::<u8>(), 1..256), flip_index in 0usize..256) {
        let (mut ct, nonce) = aead::seal(&key, &plaintext).unwrap();
        let idx = flip_index % ct.len();
        ct[idx] ^= 0x01;
        prop_assert!(aead::open(&key, &ct, &nonce).is_err());
    }

    #[test]
    fn kdf_is_deterministic_for_the_same_inputs(entropy in proptest::collection::vec(any::<u8>(), 0..64), salt in proptest::collection::vec(any::<u8>(), 1..64)) {
        let a = kdf::derive_master_key(&entropy, &salt).unwrap();
        let b = kdf::derive_master_key(&entropy, &salt).unwrap();
        prop_assert_eq!(*a, *b);
    }
}
