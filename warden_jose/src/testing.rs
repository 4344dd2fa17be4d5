//! Cached signing keys for tests
//!
//! Key generation is slow, particularly for RSA, so each key is generated
//! once per process and shared.

use once_cell::sync::Lazy;

use crate::{jwa::Curve, PrivateKey};

static RSA_KEY: Lazy<PrivateKey> =
    Lazy::new(|| PrivateKey::generate_rsa(2048).expect("RSA key generation failed"));

static OTHER_RSA_KEY: Lazy<PrivateKey> =
    Lazy::new(|| PrivateKey::generate_rsa(2048).expect("RSA key generation failed"));

static P256_KEY: Lazy<PrivateKey> =
    Lazy::new(|| PrivateKey::generate_ec(Curve::P256).expect("P-256 key generation failed"));

static P384_KEY: Lazy<PrivateKey> =
    Lazy::new(|| PrivateKey::generate_ec(Curve::P384).expect("P-384 key generation failed"));

static P521_KEY: Lazy<PrivateKey> =
    Lazy::new(|| PrivateKey::generate_ec(Curve::P521).expect("P-521 key generation failed"));

/// A shared 2048-bit RSA key
pub fn rsa_key() -> &'static PrivateKey {
    &RSA_KEY
}

/// A second RSA key, distinct from [`rsa_key`]
pub fn other_rsa_key() -> &'static PrivateKey {
    &OTHER_RSA_KEY
}

/// A shared ECDSA key on `curve`
pub fn ec_key(curve: Curve) -> &'static PrivateKey {
    match curve {
        Curve::P256 => &P256_KEY,
        Curve::P384 => &P384_KEY,
        Curve::P521 => &P521_KEY,
    }
}
