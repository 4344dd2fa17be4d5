//! Verification of bearer tokens against a single configured key

use warden_clock::{Clock, System};
use warden_traits::ConfigSource;

use crate::{
    error,
    jwt::{Audience, Issuer, JwtRef, RawClaims, Validator},
    PublicKey,
};

/// Configuration key holding the verification public key
pub const PUBLIC_KEY_CONFIG_KEY: &str = "RSAPublicKey";

/// Configuration key holding the expected token issuer
pub const ISSUER_CONFIG_KEY: &str = "SentinelTokenIssuer";

/// Configuration key holding the comma-separated accepted audiences
pub const AUDIENCE_CONFIG_KEY: &str = "SentinelTokenAudience";

/// The settings needed to verify tokens
#[derive(Clone, Debug)]
pub struct VerifierConfig {
    /// The key that token signatures must verify against
    pub public_key: PublicKey,

    /// The issuer tokens must name, if any
    pub issuer: Option<Issuer>,

    /// The audiences a token may name; empty disables the check
    pub audiences: Vec<Audience>,
}

impl VerifierConfig {
    /// Builds a configuration around `public_key` with no issuer or audience checks
    pub fn new(public_key: PublicKey) -> Self {
        Self {
            public_key,
            issuer: None,
            audiences: Vec::new(),
        }
    }

    /// Reads the verifier settings from a configuration source
    ///
    /// The public key is required. The issuer and audiences are optional, and
    /// blank audience entries are dropped.
    pub fn from_source<S: ConfigSource + ?Sized>(
        source: &S,
    ) -> Result<Self, error::VerifierConfigError> {
        let raw_key = source
            .get_trimmed(PUBLIC_KEY_CONFIG_KEY)
            .ok_or(error::VerifierConfigError::MissingPublicKey(
                PUBLIC_KEY_CONFIG_KEY,
            ))?;
        let public_key = PublicKey::from_config_value(&raw_key)?;

        let issuer = source.get_trimmed(ISSUER_CONFIG_KEY).map(Issuer::new);

        let audiences = source
            .get_trimmed(AUDIENCE_CONFIG_KEY)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(|a| Audience::new(a.to_owned()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            public_key,
            issuer,
            audiences,
        })
    }
}

/// Verifies token signatures and validates their registered claims
#[derive(Clone, Debug)]
pub struct JwtVerifier<C = System> {
    key: PublicKey,
    validator: Validator,
    clock: C,
}

impl JwtVerifier {
    /// Constructs a verifier using the system clock
    pub fn new(config: VerifierConfig) -> Self {
        let mut validator = Validator::default().extend_allowed_audiences(config.audiences);
        if let Some(issuer) = config.issuer {
            validator = validator.require_issuer(issuer);
        }

        Self {
            key: config.public_key,
            validator,
            clock: System,
        }
    }

    /// Constructs a verifier from a configuration source
    pub fn from_source<S: ConfigSource + ?Sized>(
        source: &S,
    ) -> Result<Self, error::VerifierConfigError> {
        Ok(Self::new(VerifierConfig::from_source(source)?))
    }
}

impl<C> JwtVerifier<C> {
    /// Replaces the clock used for `exp` and `nbf` checks
    pub fn with_clock<D: Clock>(self, clock: D) -> JwtVerifier<D> {
        JwtVerifier {
            key: self.key,
            validator: self.validator,
            clock,
        }
    }

    /// Replaces the claims validator
    pub fn with_validator(self, validator: Validator) -> Self {
        Self { validator, ..self }
    }

    /// The claims validator in use
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// The verification key
    pub fn public_key(&self) -> &PublicKey {
        &self.key
    }
}

impl<C: Clock> JwtVerifier<C> {
    /// Verifies the token and returns its claims
    ///
    /// # Errors
    ///
    /// Fails if the token is malformed, names an algorithm unsuited to the key,
    /// carries an invalid signature, or is rejected by the validator.
    pub fn verify(&self, token: &JwtRef) -> Result<RawClaims, error::JwtVerifyError> {
        let decomposed = token.decompose()?;
        let claims = decomposed.verify(&self.key)?;
        self.validator.validate_with_clock(&claims, &self.clock)?;

        tracing::trace!(alg = %decomposed.alg(), "token verified");
        Ok(claims)
    }
}
