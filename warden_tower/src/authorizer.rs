use std::{fmt, sync::Arc};

use http::{header, HeaderMap, StatusCode};
use tower_http::validate_request::ValidateRequestHeaderLayer;
use warden_jose::{
    error::{JwtVerifyError, VerifierConfigError},
    JwtRef, JwtVerifier, VerifierConfig,
};
use warden_permissions::{Claims, PermissionLookup};
use warden_traits::ConfigSource;

use crate::{Authenticate, ClaimsPolicy, JsonErrorHandler, RequireClaims, RequirePermission};

/// An error authenticating the caller of a request
#[derive(Debug, thiserror::Error)]
pub enum AuthenticationError {
    /// No `Authorization` header was sent, or it was blank
    #[error("authorization header missing")]
    MissingHeader,

    /// The `Authorization` header does not carry a bearer token
    #[error("authorization header must be a bearer token")]
    NotBearer,

    /// The bearer token failed verification
    #[error("invalid token")]
    InvalidToken(#[from] JwtVerifyError),
}

/// An error authorizing an authenticated caller
#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    /// No permission lookup was available to resolve the permission
    #[error("service not available in context")]
    ServiceNotAvailable,

    /// The permission code is not known to the authority
    #[error("permission is not registered in sentinel")]
    PermissionNotRegistered {
        /// The requested permission code
        code: String,
    },

    /// The caller's token does not grant the permission
    #[error("caller lacks required permission")]
    PermissionDenied {
        /// The requested permission code
        code: String,
        /// The service owning the permission
        service: String,
        /// The permission's bit value within the service
        bit_value: i64,
    },

    /// The token was not granted the scopes a route requires
    #[error("insufficient scope")]
    InsufficientScope {
        /// The scopes the route asked for
        required: Vec<String>,
    },

    /// The token does not carry the roles a route requires
    #[error("insufficient role")]
    InsufficientRole {
        /// The roles the route asked for
        required: Vec<String>,
    },
}

impl AuthorizationError {
    /// The response status for this failure
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ServiceNotAvailable => StatusCode::INTERNAL_SERVER_ERROR,
            Self::PermissionNotRegistered { .. }
            | Self::PermissionDenied { .. }
            | Self::InsufficientScope { .. }
            | Self::InsufficientRole { .. } => StatusCode::FORBIDDEN,
        }
    }

    /// The machine-readable error code reported to the caller
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ServiceNotAvailable => "service_not_available",
            Self::PermissionNotRegistered { .. } => "permission_not_registered",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::InsufficientScope { .. } => "insufficient_scope",
            Self::InsufficientRole { .. } => "insufficient_role",
        }
    }
}

/// Extracts the bearer token from an `Authorization` header value
///
/// The scheme is matched case-insensitively and surrounding whitespace is
/// ignored.
///
/// ```
/// use warden_tower::{extract_bearer, AuthenticationError};
///
/// assert_eq!(extract_bearer(" bearer abc.def.ghi ").unwrap().as_str(), "abc.def.ghi");
/// assert!(matches!(extract_bearer("  "), Err(AuthenticationError::MissingHeader)));
/// assert!(matches!(extract_bearer("Basic abc"), Err(AuthenticationError::NotBearer)));
/// ```
pub fn extract_bearer(header: &str) -> Result<&JwtRef, AuthenticationError> {
    const SCHEME: &str = "bearer ";

    let header = header.trim();
    if header.is_empty() {
        return Err(AuthenticationError::MissingHeader);
    }

    match header.get(..SCHEME.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(SCHEME) => {}
        _ => return Err(AuthenticationError::NotBearer),
    }

    let token = header[SCHEME.len()..].trim();
    if token.is_empty() {
        return Err(AuthenticationError::NotBearer);
    }

    Ok(JwtRef::from_str(token))
}

/// Authenticates bearer tokens and checks bitmask permission grants
///
/// Cloning is cheap; clones share the same verifier.
pub struct Authorizer<OnError = JsonErrorHandler> {
    verifier: Arc<JwtVerifier>,
    on_error: OnError,
}

impl<OnError> Clone for Authorizer<OnError>
where
    OnError: Clone,
{
    #[inline]
    fn clone(&self) -> Self {
        Self {
            verifier: Arc::clone(&self.verifier),
            on_error: self.on_error.clone(),
        }
    }
}

impl<OnError> fmt::Debug for Authorizer<OnError>
where
    OnError: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Authorizer")
            .field("verifier", &self.verifier)
            .field("on_error", &self.on_error)
            .finish()
    }
}

impl Authorizer {
    /// Constructs an authorizer that verifies tokens according to `config`
    #[inline]
    pub fn new(config: VerifierConfig) -> Self {
        Self::with_verifier(JwtVerifier::new(config))
    }

    /// Constructs an authorizer around an existing verifier
    #[inline]
    pub fn with_verifier(verifier: JwtVerifier) -> Self {
        Self {
            verifier: Arc::new(verifier),
            on_error: JsonErrorHandler::new(),
        }
    }

    /// Reads the verifier settings from a configuration source
    ///
    /// # Errors
    ///
    /// Fails if the public key is missing or cannot be imported.
    pub fn from_source<S: ConfigSource + ?Sized>(config: &S) -> Result<Self, VerifierConfigError> {
        Ok(Self::with_verifier(JwtVerifier::from_source(config)?))
    }
}

impl<OnError> Authorizer<OnError> {
    /// Attaches a custom error handler to generate responses
    /// in the event of a verification failure
    #[inline]
    pub fn with_error_handler<E>(self, on_error: E) -> Authorizer<E> {
        Authorizer {
            verifier: self.verifier,
            on_error,
        }
    }

    /// The error handler in use
    #[inline]
    pub fn error_handler(&self) -> &OnError {
        &self.on_error
    }

    /// Verifies the bearer token carried in `headers`
    ///
    /// # Errors
    ///
    /// Fails if the header is missing, does not carry a bearer token, or the
    /// token does not verify.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Claims, AuthenticationError> {
        let header = match headers.get(header::AUTHORIZATION) {
            None => return Err(AuthenticationError::MissingHeader),
            Some(value) => value.to_str().map_err(|_| AuthenticationError::NotBearer)?,
        };

        let token = extract_bearer(header)?;
        let raw = self.verifier.verify(token)?;

        Ok(Claims::from_raw(raw))
    }

    /// Checks that `claims` grant the permission registered as `code`
    ///
    /// Service tokens are always allowed. Otherwise the permission is
    /// resolved through `lookup` and the caller must hold its bit.
    ///
    /// # Errors
    ///
    /// Fails closed: a missing lookup, an unregistered code, and an
    /// ungranted bit are all errors.
    pub fn authorize(
        &self,
        claims: &Claims,
        lookup: Option<&dyn PermissionLookup>,
        code: &str,
    ) -> Result<(), AuthorizationError> {
        if claims.is_service_token() {
            tracing::trace!(
                permission = code,
                subject = claims.subject(),
                "service token bypasses permission check"
            );
            return Ok(());
        }

        let Some(lookup) = lookup else {
            tracing::error!(
                permission = code,
                "permission check failed: service not available in context"
            );
            return Err(AuthorizationError::ServiceNotAvailable);
        };

        let Some(metadata) = lookup.lookup_permission(code) else {
            tracing::warn!(
                permission = code,
                "permission check failed: permission not registered"
            );
            return Err(AuthorizationError::PermissionNotRegistered {
                code: code.to_owned(),
            });
        };

        if !claims.has_permission(&metadata.service, metadata.bit_value) {
            tracing::warn!(
                permission = code,
                service = %metadata.service,
                bit_value = metadata.bit_value,
                subject = claims.subject(),
                "permission check failed: caller lacks required permission"
            );
            return Err(AuthorizationError::PermissionDenied {
                code: code.to_owned(),
                service: metadata.service,
                bit_value: metadata.bit_value,
            });
        }

        tracing::trace!(permission = code, subject = claims.subject(), "permission granted");
        Ok(())
    }
}

impl<OnError> Authorizer<OnError>
where
    OnError: Clone,
{
    /// Layer that verifies the bearer token and stores the resulting
    /// [`Claims`] in the request extensions
    #[inline]
    pub fn authenticate_layer(&self) -> ValidateRequestHeaderLayer<Authenticate<OnError>> {
        ValidateRequestHeaderLayer::custom(Authenticate::new(self.clone()))
    }

    /// Layer that requires the caller to hold the permission registered as
    /// `code`
    ///
    /// The permission lookup must be present in the request extensions as a
    /// [`SharedPermissionLookup`](warden_permissions::SharedPermissionLookup).
    /// Claims verified by an earlier layer are reused.
    #[inline]
    pub fn require_permission(
        &self,
        code: impl Into<Arc<str>>,
    ) -> ValidateRequestHeaderLayer<RequirePermission<OnError>> {
        ValidateRequestHeaderLayer::custom(RequirePermission::new(self.clone(), code.into()))
    }

    /// Layer that enforces an arbitrary [`ClaimsPolicy`]
    #[inline]
    pub fn require(&self, policy: ClaimsPolicy) -> ValidateRequestHeaderLayer<RequireClaims<OnError>> {
        ValidateRequestHeaderLayer::custom(RequireClaims::new(self.clone(), policy))
    }

    /// Layer that requires the token to be granted every one of `scopes`
    #[inline]
    pub fn require_scopes<I, S>(&self, scopes: I) -> ValidateRequestHeaderLayer<RequireClaims<OnError>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.require(ClaimsPolicy::all_scopes(scopes))
    }

    /// Layer that requires the token to be granted at least one of `scopes`
    #[inline]
    pub fn require_any_scope<I, S>(&self, scopes: I) -> ValidateRequestHeaderLayer<RequireClaims<OnError>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.require(ClaimsPolicy::any_scope(scopes))
    }

    /// Layer that requires every one of `roles` in the top-level `roles` claim
    #[inline]
    pub fn require_roles<I, S>(&self, roles: I) -> ValidateRequestHeaderLayer<RequireClaims<OnError>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.require(ClaimsPolicy::all_roles(roles))
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;
    use serde_json::json;
    use warden_jose::{jwa::Algorithm, testing, Jwt};

    use super::*;
    use crate::test_support::{authorizer, bearer, lookup};

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, authorization.parse().unwrap());
        headers
    }

    mod extract {
        use super::*;

        #[test]
        fn accepts_any_scheme_case() {
            for header in ["Bearer tok", "bearer tok", "BEARER tok", "  Bearer   tok  "] {
                assert_eq!(extract_bearer(header).unwrap().as_str(), "tok", "{header:?}");
            }
        }

        #[test]
        fn blank_header_is_missing() {
            assert!(matches!(extract_bearer(""), Err(AuthenticationError::MissingHeader)));
            assert!(matches!(extract_bearer(" \t"), Err(AuthenticationError::MissingHeader)));
        }

        #[test]
        fn rejects_other_schemes_and_empty_tokens() {
            for header in ["Basic dXNlcg==", "Bearer", "Bearer    ", "Bearertok", "tok"] {
                assert!(
                    matches!(extract_bearer(header), Err(AuthenticationError::NotBearer)),
                    "{header:?}"
                );
            }
        }

        #[test]
        fn multibyte_prefix_does_not_panic() {
            assert!(matches!(extract_bearer("ĉĉĉĉ tok"), Err(AuthenticationError::NotBearer)));
        }
    }

    mod authenticate {
        use super::*;

        #[test]
        fn verified_token_yields_claims() -> Result<()> {
            let authorizer = authorizer()?;
            let header = bearer(json!({ "sub": " user-1 ", "svc_perm": "usr:2" }))?;

            let claims = authorizer.authenticate(&headers(&header))?;

            assert_eq!(claims.subject(), "user-1");
            assert!(claims.has_permission("usr", 1));
            Ok(())
        }

        #[test]
        fn missing_header_is_rejected() -> Result<()> {
            let err = authorizer()?.authenticate(&HeaderMap::new()).unwrap_err();
            assert!(matches!(err, AuthenticationError::MissingHeader));
            Ok(())
        }

        #[test]
        fn token_signed_by_another_key_is_rejected() -> Result<()> {
            let token = Jwt::sign(testing::other_rsa_key(), Algorithm::RS256, &json!({}))?;

            let err = authorizer()?
                .authenticate(&headers(&format!("Bearer {}", token.as_str())))
                .unwrap_err();

            assert!(matches!(err, AuthenticationError::InvalidToken(ref e) if e.is_signature_mismatch()));
            Ok(())
        }
    }

    mod authorize {
        use super::*;

        fn claims(value: serde_json::Value) -> Claims {
            match value {
                serde_json::Value::Object(raw) => Claims::from_raw(raw),
                _ => unreachable!("claims are always an object"),
            }
        }

        #[test]
        fn granted_bit_is_allowed() -> Result<()> {
            let lookup = lookup();
            let claims = claims(json!({ "sub": "user-1", "svc_perm": "usr:2" }));

            authorizer()?.authorize(&claims, Some(&lookup), "usr-users-create")?;
            Ok(())
        }

        #[test]
        #[tracing_test::traced_test]
        fn missing_bit_is_denied_and_logged() -> Result<()> {
            let lookup = lookup();
            let claims = claims(json!({ "sub": "user-1", "svc_perm": "usr:1" }));

            let err = authorizer()?
                .authorize(&claims, Some(&lookup), "usr-users-create")
                .unwrap_err();

            assert_eq!(err.status(), StatusCode::FORBIDDEN);
            assert_eq!(err.error_code(), "permission_denied");
            assert!(matches!(
                err,
                AuthorizationError::PermissionDenied { ref service, bit_value: 1, .. } if service == "usr"
            ));
            assert!(logs_contain("caller lacks required permission"));
            assert!(logs_contain("subject=\"user-1\""));
            Ok(())
        }

        #[test]
        fn unknown_code_is_not_registered() -> Result<()> {
            let lookup = lookup();
            let claims = claims(json!({ "svc_perm": "usr:zzzz" }));

            let err = authorizer()?
                .authorize(&claims, Some(&lookup), "usr-users-delete")
                .unwrap_err();

            assert_eq!(err.status(), StatusCode::FORBIDDEN);
            assert_eq!(err.error_code(), "permission_not_registered");
            Ok(())
        }

        #[test]
        fn missing_lookup_fails_closed() -> Result<()> {
            let claims = claims(json!({ "svc_perm": "usr:2" }));

            let err = authorizer()?
                .authorize(&claims, None, "usr-users-create")
                .unwrap_err();

            assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(err.error_code(), "service_not_available");
            Ok(())
        }

        #[test]
        fn service_tokens_bypass_the_check() -> Result<()> {
            let claims = claims(json!({ "sub": "billing", "token_use": "Service" }));

            authorizer()?.authorize(&claims, None, "usr-users-create")?;
            Ok(())
        }
    }
}
