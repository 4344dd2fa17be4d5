use std::fmt;

use openssl::{
    ec::{EcGroup, EcKey},
    ecdsa::EcdsaSig,
    hash::MessageDigest,
    pkey::{PKey, Private},
    rsa::Rsa,
    sign::Signer,
};

use super::PublicKey;
use crate::{
    error::{self, KeyImportError, SigningError},
    jwa::{Algorithm, Curve, KeyFamily},
};

/// A private key able to sign tokens
///
/// Used to mint tokens in tests and tooling. The key material is never
/// printed by the [`Debug`] implementation.
#[derive(Clone)]
pub struct PrivateKey {
    key: PKey<Private>,
    curve: Option<Curve>,
}

impl PrivateKey {
    /// Generates a new RSA key with a modulus of `bits` bits
    pub fn generate_rsa(bits: u32) -> Result<Self, error::Unexpected> {
        let rsa = Rsa::generate(bits).map_err(error::unexpected)?;
        let key = PKey::from_rsa(rsa).map_err(error::unexpected)?;
        Ok(Self { key, curve: None })
    }

    /// Generates a new ECDSA key on `curve`
    pub fn generate_ec(curve: Curve) -> Result<Self, error::Unexpected> {
        let group = EcGroup::from_curve_name(curve.nid()).map_err(error::unexpected)?;
        let ec = EcKey::generate(&group).map_err(error::unexpected)?;
        let key = PKey::from_ec_key(ec).map_err(error::unexpected)?;
        Ok(Self {
            key,
            curve: Some(curve),
        })
    }

    /// The kind of key
    pub fn family(&self) -> KeyFamily {
        if self.curve.is_some() {
            KeyFamily::EllipticCurve
        } else {
            KeyFamily::Rsa
        }
    }

    /// The public half as a `PUBLIC KEY` (SubjectPublicKeyInfo) PEM block
    pub fn public_key_pem(&self) -> Result<String, error::Unexpected> {
        let pem = self.key.public_key_to_pem().map_err(error::unexpected)?;
        String::from_utf8(pem).map_err(error::unexpected)
    }

    /// The public half as an `RSA PUBLIC KEY` (PKCS#1) PEM block
    pub fn rsa_public_key_pkcs1_pem(&self) -> Result<String, SigningError> {
        let rsa = self.key.rsa().map_err(|_| {
            error::incompatible_algorithm(Algorithm::RS256, KeyFamily::EllipticCurve)
        })?;
        let pem = rsa.public_key_to_pem_pkcs1().map_err(error::unexpected)?;
        Ok(String::from_utf8(pem).map_err(error::unexpected)?)
    }

    /// The public half of this key
    pub fn public_key(&self) -> Result<PublicKey, KeyImportError> {
        let pem = self.public_key_pem().map_err(error::key_rejected)?;
        PublicKey::from_pem(&pem)
    }

    /// Signs `data` using algorithm `alg`
    ///
    /// ECDSA signatures are returned in the fixed-width `r || s` form used by JWS.
    pub fn sign(&self, alg: Algorithm, data: &[u8]) -> Result<Vec<u8>, SigningError> {
        let compatible = match self.curve {
            None => alg.key_family() == KeyFamily::Rsa,
            Some(curve) => alg.curve() == Some(curve),
        };
        if !compatible {
            return Err(error::incompatible_algorithm(alg, self.family()).into());
        }

        let mut signer = Signer::new(digest(alg), &self.key).map_err(error::unexpected)?;
        signer.update(data).map_err(error::unexpected)?;
        let signature = signer.sign_to_vec().map_err(error::unexpected)?;

        match self.curve {
            None => Ok(signature),
            Some(curve) => {
                let sig = EcdsaSig::from_der(&signature).map_err(error::unexpected)?;
                let len = curve.scalar_len() as i32;
                let mut fixed = sig.r().to_vec_padded(len).map_err(error::unexpected)?;
                fixed.extend(sig.s().to_vec_padded(len).map_err(error::unexpected)?);
                Ok(fixed)
            }
        }
    }
}

fn digest(alg: Algorithm) -> MessageDigest {
    match alg {
        Algorithm::RS256 | Algorithm::ES256 => MessageDigest::sha256(),
        Algorithm::RS384 | Algorithm::ES384 => MessageDigest::sha384(),
        Algorithm::RS512 | Algorithm::ES512 => MessageDigest::sha512(),
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("family", &self.family())
            .field("curve", &self.curve)
            .finish_non_exhaustive()
    }
}
