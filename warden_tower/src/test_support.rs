use std::collections::HashMap;

use color_eyre::Result;
use warden_jose::{jwa::Algorithm, testing, Jwt, VerifierConfig};
use warden_permissions::PermissionMetadata;

use crate::Authorizer;

pub(crate) fn authorizer() -> Result<Authorizer> {
    let key = testing::rsa_key().public_key()?;
    Ok(Authorizer::new(VerifierConfig::new(key)))
}

pub(crate) fn bearer(claims: serde_json::Value) -> Result<String> {
    let token = Jwt::sign(testing::rsa_key(), Algorithm::RS256, &claims)?;
    Ok(format!("Bearer {}", token.as_str()))
}

/// `usr-users-create` registered as bit 1 of `usr`
pub(crate) fn lookup() -> HashMap<String, PermissionMetadata> {
    HashMap::from([(
        "usr-users-create".to_owned(),
        PermissionMetadata {
            id: "perm-1".to_owned(),
            service: "usr".to_owned(),
            bit_value: 1,
        },
    )])
}
