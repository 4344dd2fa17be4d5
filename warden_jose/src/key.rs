//! Public key import and signature verification
//!
//! Keys are imported from PEM, optionally wrapped in an extra layer of
//! standard base64 so that they can travel through environment variables.
//! The following PEM blocks are understood:
//!
//! | label | contents |
//! |---|---|
//! | `PUBLIC KEY` | SubjectPublicKeyInfo holding an RSA or ECDSA key |
//! | `RSA PUBLIC KEY` | PKCS#1 RSA public key |
//! | `EC PUBLIC KEY` | SubjectPublicKeyInfo that must hold an ECDSA key |

use std::fmt;

use base64::{
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD},
    Engine as _,
};
use openssl::{
    bn::{BigNum, BigNumContext},
    ec::{EcGroup, EcKey, EcKeyRef, EcPoint, PointConversionForm},
    ecdsa::EcdsaSig,
    pkey::{Id, PKey, Public},
    rsa::Rsa,
};

use crate::{
    error::{self, KeyImportError},
    jwa::{Algorithm, Curve, KeyFamily},
};

#[cfg(feature = "private-keys")]
mod private;

#[cfg(feature = "private-keys")]
#[cfg_attr(docsrs, doc(cfg(feature = "private-keys")))]
pub use private::PrivateKey;

const PEM_LABEL_SPKI: &str = "PUBLIC KEY";
const PEM_LABEL_PKCS1: &str = "RSA PUBLIC KEY";
const PEM_LABEL_EC: &str = "EC PUBLIC KEY";

/// A public key that token signatures are verified against
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    material: KeyMaterial,
}

#[derive(Clone, PartialEq, Eq)]
enum KeyMaterial {
    Rsa { modulus: Vec<u8>, exponent: Vec<u8> },
    EllipticCurve { curve: Curve, point: Vec<u8> },
}

impl PublicKey {
    /// Imports a key from a configuration value
    ///
    /// The value may be a PEM document or a base64 encoding of one. Standard
    /// padded base64 is tried before unpadded.
    pub fn from_config_value(raw: &str) -> Result<Self, KeyImportError> {
        let normalized = raw.trim();
        if normalized.is_empty() {
            return Err(KeyImportError::Empty);
        }

        if normalized.contains("-----BEGIN") {
            return Self::from_pem(normalized);
        }

        let compact: String = normalized
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let decoded = match STANDARD.decode(&compact) {
            Ok(decoded) => decoded,
            Err(err) => STANDARD_NO_PAD
                .decode(&compact)
                .map_err(|_| KeyImportError::Base64(err))?,
        };

        let pem = String::from_utf8(decoded).map_err(|_| KeyImportError::MissingPemBlock)?;
        Self::from_pem(&pem)
    }

    /// Imports a key from the first PEM block found in `pem`
    pub fn from_pem(pem: &str) -> Result<Self, KeyImportError> {
        match first_pem_label(pem)? {
            PEM_LABEL_SPKI => {
                let key = PKey::public_key_from_pem(pem.as_bytes()).map_err(error::key_rejected)?;
                Self::from_pkey(&key, PEM_LABEL_SPKI)
            }
            PEM_LABEL_PKCS1 => {
                let rsa =
                    Rsa::public_key_from_pem_pkcs1(pem.as_bytes()).map_err(error::key_rejected)?;
                Ok(Self::from_rsa_components(
                    rsa.n().to_vec(),
                    rsa.e().to_vec(),
                ))
            }
            PEM_LABEL_EC => {
                // openssl only reads SubjectPublicKeyInfo under the standard label
                let spki = pem
                    .replace("-----BEGIN EC PUBLIC KEY-----", "-----BEGIN PUBLIC KEY-----")
                    .replace("-----END EC PUBLIC KEY-----", "-----END PUBLIC KEY-----");
                let key = PKey::public_key_from_pem(spki.as_bytes()).map_err(error::key_rejected)?;
                if key.id() != Id::EC {
                    return Err(KeyImportError::UnsupportedKeyType(PEM_LABEL_EC));
                }
                Self::from_pkey(&key, PEM_LABEL_EC)
            }
            other => Err(KeyImportError::UnsupportedBlockType(other.to_owned())),
        }
    }

    fn from_pkey(key: &PKey<Public>, label: &'static str) -> Result<Self, KeyImportError> {
        match key.id() {
            Id::RSA => {
                let rsa = key.rsa().map_err(error::key_rejected)?;
                Ok(Self::from_rsa_components(
                    rsa.n().to_vec(),
                    rsa.e().to_vec(),
                ))
            }
            Id::EC => {
                let ec = key.ec_key().map_err(error::key_rejected)?;
                Self::from_ec_key(&ec)
            }
            _ => Err(KeyImportError::UnsupportedKeyType(label)),
        }
    }

    fn from_rsa_components(modulus: Vec<u8>, exponent: Vec<u8>) -> Self {
        Self {
            material: KeyMaterial::Rsa { modulus, exponent },
        }
    }

    pub(crate) fn from_ec_key<T>(key: &EcKeyRef<T>) -> Result<Self, KeyImportError>
    where
        T: openssl::pkey::HasPublic,
    {
        let group = key.group();
        let curve = group
            .curve_name()
            .and_then(Curve::from_nid)
            .ok_or(KeyImportError::UnsupportedCurve)?;

        let mut ctx = BigNumContext::new().map_err(error::key_rejected)?;
        let point = key
            .public_key()
            .to_bytes(group, PointConversionForm::UNCOMPRESSED, &mut ctx)
            .map_err(error::key_rejected)?;

        Ok(Self {
            material: KeyMaterial::EllipticCurve { curve, point },
        })
    }

    /// The kind of key
    pub fn family(&self) -> KeyFamily {
        match self.material {
            KeyMaterial::Rsa { .. } => KeyFamily::Rsa,
            KeyMaterial::EllipticCurve { .. } => KeyFamily::EllipticCurve,
        }
    }

    /// The curve of an ECDSA key
    pub fn curve(&self) -> Option<Curve> {
        match self.material {
            KeyMaterial::Rsa { .. } => None,
            KeyMaterial::EllipticCurve { curve, .. } => Some(curve),
        }
    }

    /// Checks that `alg` is a signing method this key can verify
    ///
    /// An RSA key only accepts RSA algorithms. An ECDSA key only accepts the
    /// ECDSA algorithm for its own curve size.
    pub fn check_algorithm(&self, alg: Algorithm) -> Result<(), error::IncompatibleAlgorithm> {
        let compatible = match self.material {
            KeyMaterial::Rsa { .. } => alg.key_family() == KeyFamily::Rsa,
            KeyMaterial::EllipticCurve { curve, .. } => alg.curve() == Some(curve),
        };

        if compatible {
            Ok(())
        } else {
            Err(error::incompatible_algorithm(alg, self.family()))
        }
    }

    /// Verifies `signature` over `data` using algorithm `alg`
    pub fn verify(
        &self,
        alg: Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), error::JwtVerifyError> {
        self.check_algorithm(alg)?;

        match &self.material {
            KeyMaterial::Rsa { modulus, exponent } => {
                let params = alg
                    .rsa_verification_params()
                    .ok_or_else(|| error::incompatible_algorithm(alg, KeyFamily::Rsa))?;
                let pk = ring::signature::RsaPublicKeyComponents {
                    n: modulus.as_slice(),
                    e: exponent.as_slice(),
                };

                pk.verify(params, data, signature)
                    .map_err(|_| error::signature_mismatch().into())
            }
            KeyMaterial::EllipticCurve {
                curve: Curve::P256,
                point,
            } => ring::signature::UnparsedPublicKey::new(
                &ring::signature::ECDSA_P256_SHA256_FIXED,
                point,
            )
            .verify(data, signature)
            .map_err(|_| error::signature_mismatch().into()),
            KeyMaterial::EllipticCurve {
                curve: Curve::P384,
                point,
            } => ring::signature::UnparsedPublicKey::new(
                &ring::signature::ECDSA_P384_SHA384_FIXED,
                point,
            )
            .verify(data, signature)
            .map_err(|_| error::signature_mismatch().into()),
            KeyMaterial::EllipticCurve {
                curve: Curve::P521,
                point,
            } => verify_p521(point, data, signature),
        }
    }
}

// ring has no P-521 support, so this curve is verified through openssl.
fn verify_p521(point: &[u8], data: &[u8], signature: &[u8]) -> Result<(), error::JwtVerifyError> {
    let scalar_len = Curve::P521.scalar_len();
    if signature.len() != scalar_len * 2 {
        return Err(error::signature_mismatch().into());
    }

    let group = EcGroup::from_curve_name(Curve::P521.nid()).map_err(error::unexpected)?;
    let mut ctx = BigNumContext::new().map_err(error::unexpected)?;
    let point = EcPoint::from_bytes(&group, point, &mut ctx).map_err(error::unexpected)?;
    let key = EcKey::from_public_key(&group, &point).map_err(error::unexpected)?;

    let r = BigNum::from_slice(&signature[..scalar_len]).map_err(error::unexpected)?;
    let s = BigNum::from_slice(&signature[scalar_len..]).map_err(error::unexpected)?;
    let sig = EcdsaSig::from_private_components(r, s).map_err(error::unexpected)?;

    let digest = openssl::sha::sha512(data);
    match sig.verify(&digest, &key) {
        Ok(true) => Ok(()),
        Ok(false) | Err(_) => Err(error::signature_mismatch().into()),
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.material {
            KeyMaterial::Rsa { modulus, .. } => f
                .debug_struct("PublicKey")
                .field("family", &KeyFamily::Rsa)
                .field("bits", &(modulus.len() * 8))
                .finish(),
            KeyMaterial::EllipticCurve { curve, .. } => f
                .debug_struct("PublicKey")
                .field("family", &KeyFamily::EllipticCurve)
                .field("curve", curve)
                .finish(),
        }
    }
}

fn first_pem_label(pem: &str) -> Result<&str, KeyImportError> {
    const BEGIN: &str = "-----BEGIN ";

    let start = pem.find(BEGIN).ok_or(KeyImportError::MissingPemBlock)? + BEGIN.len();
    let rest = &pem[start..];
    let end = rest.find("-----").ok_or(KeyImportError::MissingPemBlock)?;
    Ok(&rest[..end])
}
