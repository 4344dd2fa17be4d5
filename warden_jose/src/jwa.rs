//! JSON Web Algorithms supported for token verification
//!
//! Only asymmetric signing algorithms are accepted. The HMAC family and
//! RSASSA-PSS are not recognized, and `none` is always rejected.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error;

/// A JWS signing algorithm
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    /// RSASSA-PKCS1-v1_5 using SHA-256
    RS256,
    /// RSASSA-PKCS1-v1_5 using SHA-384
    RS384,
    /// RSASSA-PKCS1-v1_5 using SHA-512
    RS512,
    /// ECDSA using P-256 and SHA-256
    ES256,
    /// ECDSA using P-384 and SHA-384
    ES384,
    /// ECDSA using P-521 and SHA-512
    ES512,
}

impl Algorithm {
    /// The kind of key that can produce this algorithm's signatures
    pub fn key_family(self) -> KeyFamily {
        match self {
            Self::RS256 | Self::RS384 | Self::RS512 => KeyFamily::Rsa,
            Self::ES256 | Self::ES384 | Self::ES512 => KeyFamily::EllipticCurve,
        }
    }

    /// The curve required by an ECDSA algorithm
    pub fn curve(self) -> Option<Curve> {
        match self {
            Self::ES256 => Some(Curve::P256),
            Self::ES384 => Some(Curve::P384),
            Self::ES512 => Some(Curve::P521),
            _ => None,
        }
    }

    /// The registered name of the algorithm
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
            Self::ES512 => "ES512",
        }
    }

    pub(crate) fn rsa_verification_params(self) -> Option<&'static ring::signature::RsaParameters> {
        match self {
            Self::RS256 => Some(&ring::signature::RSA_PKCS1_2048_8192_SHA256),
            Self::RS384 => Some(&ring::signature::RSA_PKCS1_2048_8192_SHA384),
            Self::RS512 => Some(&ring::signature::RSA_PKCS1_2048_8192_SHA512),
            _ => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&'_ str> for Algorithm {
    type Error = error::UnknownAlgorithm;

    #[inline]
    fn try_from(value: &'_ str) -> Result<Self, Self::Error> {
        match value {
            "RS256" => Ok(Self::RS256),
            "RS384" => Ok(Self::RS384),
            "RS512" => Ok(Self::RS512),
            "ES256" => Ok(Self::ES256),
            "ES384" => Ok(Self::ES384),
            "ES512" => Ok(Self::ES512),
            _ => Err(error::unknown_algorithm(value.to_string())),
        }
    }
}

impl FromStr for Algorithm {
    type Err = error::UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

/// The broad kind of a public key
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub enum KeyFamily {
    /// An RSA key
    Rsa,
    /// An ECDSA key
    EllipticCurve,
}

impl fmt::Display for KeyFamily {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Rsa => f.write_str("RSA"),
            Self::EllipticCurve => f.write_str("ECDSA"),
        }
    }
}

/// A named ECC curve
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Curve {
    /// The P-256 curve (prime256v1/secp256r1)
    #[serde(rename = "P-256")]
    P256,

    /// The P-384 curve (secp384r1)
    #[serde(rename = "P-384")]
    P384,

    /// The P-521 curve (secp521r1)
    #[serde(rename = "P-521")]
    P521,
}

impl Curve {
    /// The curve size in bits
    pub fn bits(self) -> u16 {
        match self {
            Self::P256 => 256,
            Self::P384 => 384,
            Self::P521 => 521,
        }
    }

    /// The size of one scalar (`r` or `s`) in a fixed-width signature
    pub(crate) fn scalar_len(self) -> usize {
        match self {
            Self::P256 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
        }
    }

    pub(crate) fn nid(self) -> openssl::nid::Nid {
        match self {
            Self::P256 => openssl::nid::Nid::X9_62_PRIME256V1,
            Self::P384 => openssl::nid::Nid::SECP384R1,
            Self::P521 => openssl::nid::Nid::SECP521R1,
        }
    }

    pub(crate) fn from_nid(nid: openssl::nid::Nid) -> Option<Self> {
        if nid == openssl::nid::Nid::X9_62_PRIME256V1 {
            Some(Self::P256)
        } else if nid == openssl::nid::Nid::SECP384R1 {
            Some(Self::P384)
        } else if nid == openssl::nid::Nid::SECP521R1 {
            Some(Self::P521)
        } else {
            None
        }
    }
}

impl fmt::Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::P256 => f.write_str("P-256"),
            Self::P384 => f.write_str("P-384"),
            Self::P521 => f.write_str("P-521"),
        }
    }
}
