//! Verification of signed JSON Web Tokens against a configured public key
//!
//! This crate implements the narrow subset of the JOSE standards that an
//! authorization gateway needs:
//!
//! * JSON Web Algorithms (JWA), [RFC7518][]: `RS256`, `RS384`, `RS512`,
//!   `ES256`, `ES384`, and `ES512`
//! * JSON Web Token (JWT), [RFC7519][]: compact tokens with a JSON payload
//!
//! Symmetric algorithms are never accepted. The key is supplied up front,
//! either directly or from configuration, rather than fetched from a JWKS
//! endpoint.
//!
//! [RFC7518]: https://tools.ietf.org/html/rfc7518
//! [RFC7519]: https://tools.ietf.org/html/rfc7519
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use warden_jose::{jwa::Algorithm, jwt::Jwt, testing, JwtVerifier};
//!
//! let signer = testing::rsa_key();
//!
//! let mut config = HashMap::new();
//! config.insert("RSAPublicKey".to_owned(), signer.public_key_pem().unwrap());
//! config.insert("SentinelTokenIssuer".to_owned(), "sentinel".to_owned());
//!
//! let verifier = JwtVerifier::from_source(&config).unwrap();
//!
//! let token = Jwt::sign(
//!     signer,
//!     Algorithm::RS256,
//!     &serde_json::json!({ "sub": "user-1", "iss": "sentinel" }),
//! )
//! .unwrap();
//!
//! let claims = verifier.verify(&token).expect("JWT was invalid");
//! assert_eq!(claims["sub"], "user-1");
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

pub mod error;
pub mod jwa;
mod key;
pub mod jwt;
mod verifier;

#[cfg(feature = "private-keys")]
#[cfg_attr(docsrs, doc(cfg(feature = "private-keys")))]
pub mod testing;

#[doc(inline)]
pub use jwt::{Jwt, JwtRef};
#[cfg(feature = "private-keys")]
#[cfg_attr(docsrs, doc(cfg(feature = "private-keys")))]
pub use key::PrivateKey;
pub use key::PublicKey;
pub use verifier::{
    JwtVerifier, VerifierConfig, AUDIENCE_CONFIG_KEY, ISSUER_CONFIG_KEY, PUBLIC_KEY_CONFIG_KEY,
};
