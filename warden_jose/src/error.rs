//! Common errors

#![allow(missing_copy_implementations)]

use std::error::Error as StdError;

use thiserror::Error;

use crate::jwa::{Algorithm, KeyFamily};

/// The configured key cannot be used with the requested algorithm
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("{key} key incompatible with algorithm '{alg}'")]
pub struct IncompatibleAlgorithm {
    alg: Algorithm,
    key: KeyFamily,
}

impl IncompatibleAlgorithm {
    /// The algorithm named by the token
    pub fn algorithm(&self) -> Algorithm {
        self.alg
    }
}

#[inline]
pub(crate) fn incompatible_algorithm(alg: Algorithm, key: KeyFamily) -> IncompatibleAlgorithm {
    IncompatibleAlgorithm { alg, key }
}

/// The provided name could not be matched with supported algorithms
#[derive(Debug, Error)]
#[error("'{alg}' does not match supported algorithms")]
pub struct UnknownAlgorithm {
    alg: String,
}

#[inline]
pub(crate) fn unknown_algorithm(alg: String) -> UnknownAlgorithm {
    UnknownAlgorithm { alg }
}

/// The JWT is malformed and cannot be parsed out into header, payload, and signature sections
#[derive(Clone, Copy, Debug, Error)]
#[error("malformed JWT")]
pub struct MalformedJwt {
    _p: (),
}

pub(crate) fn malformed_jwt() -> MalformedJwt {
    MalformedJwt { _p: () }
}

/// The JWT header section is malformed
#[derive(Debug, Error)]
#[error("malformed JWT header")]
pub struct MalformedJwtHeader {
    #[from]
    source: Box<dyn StdError + Send + Sync + 'static>,
}

pub(crate) fn malformed_jwt_header(
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> MalformedJwtHeader {
    MalformedJwtHeader {
        source: source.into(),
    }
}

/// The JWT payload section is malformed
#[derive(Debug, Error)]
#[error("malformed JWT payload")]
pub struct MalformedJwtPayload {
    #[from]
    source: Box<dyn StdError + Send + Sync + 'static>,
}

pub(crate) fn malformed_jwt_payload(
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> MalformedJwtPayload {
    MalformedJwtPayload {
        source: source.into(),
    }
}

/// The JWT signature section is malformed
#[derive(Debug, Error)]
#[error("malformed JWT signature")]
pub struct MalformedJwtSignature {
    #[from]
    source: Box<dyn StdError + Send + Sync + 'static>,
}

pub(crate) fn malformed_jwt_signature(
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> MalformedJwtSignature {
    MalformedJwtSignature {
        source: source.into(),
    }
}

/// The signature did not match
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Error)]
#[error("signature mismatch")]
pub struct SignatureMismatch {
    _p: (),
}

pub(crate) const fn signature_mismatch() -> SignatureMismatch {
    SignatureMismatch { _p: () }
}

/// Unexpected error (possibly a bug)
#[derive(Debug, Error)]
#[error("unexpected error")]
pub struct Unexpected {
    #[from]
    source: Box<dyn StdError + Send + Sync + 'static>,
}

pub(crate) fn unexpected(
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> Unexpected {
    Unexpected {
        source: source.into(),
    }
}

/// An error occurring while importing a public key
#[derive(Debug, Error)]
pub enum KeyImportError {
    /// No key material was provided
    #[error("empty public key data")]
    Empty,

    /// The value was neither PEM nor base64-wrapped PEM
    #[error("failed to decode public key")]
    Base64(#[source] base64::DecodeError),

    /// No PEM block could be found
    #[error("failed to decode PEM block")]
    MissingPemBlock,

    /// The PEM block label is not one of the supported public key types
    #[error("unsupported public key type: {0}")]
    UnsupportedBlockType(String),

    /// The key is neither RSA nor ECDSA, or the block promised a different kind of key
    #[error("unsupported public key algorithm in {0} block")]
    UnsupportedKeyType(&'static str),

    /// The ECDSA key is not on P-256, P-384, or P-521
    #[error("unsupported elliptic curve")]
    UnsupportedCurve,

    /// The key material could not be parsed
    #[error("key rejected")]
    KeyRejected(#[source] Box<dyn StdError + Send + Sync + 'static>),
}

pub(crate) fn key_rejected(
    source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
) -> KeyImportError {
    KeyImportError::KeyRejected(source.into())
}

/// An error occurring while building a verifier from configuration
#[derive(Debug, Error)]
pub enum VerifierConfigError {
    /// No public key was configured
    #[error("{0} not configured")]
    MissingPublicKey(&'static str),

    /// The configured public key could not be imported
    #[error("parse public key")]
    PublicKey(#[from] KeyImportError),
}

/// An error occurring while verifying a JWT
#[derive(Debug, Error)]
pub enum JwtVerifyError {
    /// The JWT is malformed, without a discernible header, payload, and signature
    #[error(transparent)]
    MalformedToken(#[from] MalformedJwt),

    /// The JWT header is malformed
    #[error(transparent)]
    MalformedTokenHeader(#[from] MalformedJwtHeader),

    /// The JWT payload is malformed
    #[error(transparent)]
    MalformedTokenPayload(#[from] MalformedJwtPayload),

    /// The JWT signature is malformed
    #[error(transparent)]
    MalformedTokenSignature(#[from] MalformedJwtSignature),

    /// The JWT names an algorithm that is not supported
    #[error(transparent)]
    UnknownAlgorithm(#[from] UnknownAlgorithm),

    /// The JWT names an algorithm that does not fit the configured key
    #[error("unexpected signing method")]
    IncompatibleAlgorithm(#[from] IncompatibleAlgorithm),

    /// The signature is invalid
    #[error(transparent)]
    SignatureMismatch(#[from] SignatureMismatch),

    /// The JWT was rejected by the claims validator
    #[error("token rejected by claims validator")]
    ClaimsRejected(#[from] ClaimsRejected),

    /// An unexpected error
    #[error(transparent)]
    Unexpected(#[from] Unexpected),
}

impl JwtVerifyError {
    /// Whether the error is due to an algorithm that does not fit the key
    #[must_use]
    pub fn is_incompatible_alg(&self) -> bool {
        matches!(self, Self::IncompatibleAlgorithm(_))
    }

    /// Whether the error is due to a signature mismatch
    #[must_use]
    pub fn is_signature_mismatch(&self) -> bool {
        matches!(self, Self::SignatureMismatch(_))
    }
}

/// An error occurring when validating the claims of a JWT
#[derive(Debug, Error)]
pub enum ClaimsRejected {
    /// The token audience is not acceptable
    #[error("invalid audience")]
    InvalidAudience,

    /// The token issuer is not acceptable
    #[error("invalid issuer")]
    InvalidIssuer,

    /// The token is expired according to the `exp` claim
    #[error("token expired")]
    TokenExpired,

    /// The token is not yet valid according to the `nbf` claim
    #[error("token not yet valid")]
    TokenNotYetValid,

    /// A required claim is missing
    #[error("required {_0} claim missing")]
    MissingRequiredClaim(&'static str),

    /// A registered claim has the wrong JSON type
    #[error("{_0} claim has an invalid type")]
    InvalidClaimType(&'static str),
}

/// An error occurring while creating a signature
#[cfg(feature = "private-keys")]
#[cfg_attr(docsrs, doc(cfg(feature = "private-keys")))]
#[derive(Debug, Error)]
pub enum SigningError {
    /// Algorithm cannot be used with this key
    #[error(transparent)]
    IncompatibleAlgorithm(#[from] IncompatibleAlgorithm),

    /// The header or payload could not be serialized
    #[error("unable to serialize token section")]
    Serialization(#[from] serde_json::Error),

    /// An unexpected error
    #[error(transparent)]
    Unexpected(#[from] Unexpected),
}
