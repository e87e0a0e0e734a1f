use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vaultbridge_crypto::{aead, kdf};

fn bench_kdf(c: &mut Criterion) {
    c.bench_function("pbkdf2_hmac_sha512_256k", |b| {
        b.iter(|| kdf::derive_master_key(black_box(b"host-entropy-string"), black_box(b"install-salt-bytes")))
    });
}

fn bench_aead(c: &mut Criterion) {
    let key = [0x42u8; aead::KEY_BYTES];
    let plaintext = vec![0xAAu8; 256];

    c.bench_function("xchacha20poly1305_seal", |b| {
        b.iter(|| aead::seal(black_box(&key), black_box(&plaintext)))
    });

    let (ciphertext, nonce) = aead::seal(&key, &plaintext).unwrap();
    c.bench_function("xchacha20poly1305_open", |b| {
        b.iter(|| aead::open(black_box(&key), black_box(&ciphertext), black_box(&nonce)))
    });
}

criterion_group!(benches, bench_kdf, bench_aead);
criterion_main!(benches);
