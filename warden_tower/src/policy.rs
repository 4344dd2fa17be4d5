//! Scope and role requirements on verified claims

use std::{fmt, sync::Arc};

use http::{Request, Response};
use http_body::Body;
use tower_http::validate_request::ValidateRequest;
use warden_permissions::Claims;

use crate::{validate::ensure_claims, AuthorizationError, Authorizer, OnAuthError};

/// A requirement on the scopes or roles carried by a token
///
/// Service tokens get no special treatment here; they must carry the
/// scopes or roles like any other caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClaimsPolicy {
    /// Every listed scope must be granted
    AllScopes(Arc<[String]>),

    /// At least one listed scope must be granted
    ///
    /// An empty list is never satisfied.
    AnyScope(Arc<[String]>),

    /// Every listed role must appear in the top-level `roles` claim
    AllRoles(Arc<[String]>),
}

impl ClaimsPolicy {
    /// Requires every one of `scopes`
    pub fn all_scopes<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AllScopes(scopes.into_iter().map(Into::into).collect())
    }

    /// Requires at least one of `scopes`
    pub fn any_scope<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AnyScope(scopes.into_iter().map(Into::into).collect())
    }

    /// Requires every one of `roles`
    pub fn all_roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::AllRoles(roles.into_iter().map(Into::into).collect())
    }

    /// Evaluates the policy against verified claims
    ///
    /// # Errors
    ///
    /// Reports the requirement that was not met.
    pub fn evaluate(&self, claims: &Claims) -> Result<(), AuthorizationError> {
        match self {
            Self::AllScopes(required) => {
                let granted = claims.scopes();
                if required.iter().all(|s| granted.contains(&s.as_str())) {
                    return Ok(());
                }
                Err(AuthorizationError::InsufficientScope {
                    required: required.to_vec(),
                })
            }
            Self::AnyScope(required) => {
                let granted = claims.scopes();
                if required.iter().any(|s| granted.contains(&s.as_str())) {
                    return Ok(());
                }
                Err(AuthorizationError::InsufficientScope {
                    required: required.to_vec(),
                })
            }
            Self::AllRoles(required) => {
                let granted = claims.roles();
                if required.iter().all(|r| granted.contains(&r.as_str())) {
                    return Ok(());
                }
                Err(AuthorizationError::InsufficientRole {
                    required: required.to_vec(),
                })
            }
        }
    }
}

/// Validator that enforces a [`ClaimsPolicy`]
///
/// Runs authentication first when no verified claims are present.
pub struct RequireClaims<OnError> {
    authorizer: Authorizer<OnError>,
    policy: ClaimsPolicy,
}

impl<OnError> RequireClaims<OnError> {
    #[inline]
    pub(crate) fn new(authorizer: Authorizer<OnError>, policy: ClaimsPolicy) -> Self {
        Self { authorizer, policy }
    }

    /// The policy being enforced
    #[inline]
    pub fn policy(&self) -> &ClaimsPolicy {
        &self.policy
    }
}

impl<OnError> Clone for RequireClaims<OnError>
where
    OnError: Clone,
{
    #[inline]
    fn clone(&self) -> Self {
        Self {
            authorizer: self.authorizer.clone(),
            policy: self.policy.clone(),
        }
    }
}

impl<OnError> fmt::Debug for RequireClaims<OnError>
where
    OnError: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RequireClaims")
            .field("authorizer", &self.authorizer)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<OnError, ReqBody> ValidateRequest<ReqBody> for RequireClaims<OnError>
where
    OnError: OnAuthError,
    OnError::Body: Body,
{
    type ResponseBody = OnError::Body;

    fn validate(
        &mut self,
        request: &mut Request<ReqBody>,
    ) -> Result<(), Response<Self::ResponseBody>> {
        let claims = ensure_claims(&self.authorizer, request)?;

        tracing::trace!(policy = ?self.policy, "evaluating claims policy");

        self.policy.evaluate(&claims).map_err(|err| {
            tracing::warn!(
                subject = claims.subject(),
                error = %err,
                "claims policy rejected caller"
            );
            self.authorizer.error_handler().on_authorization_failure(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use bytes::Bytes;
    use color_eyre::Result;
    use http::{header, StatusCode};
    use http_body_util::{BodyExt, Full};
    use serde_json::json;
    use tower::{service_fn, ServiceBuilder, ServiceExt};

    use super::*;
    use crate::test_support::{authorizer, bearer};

    fn claims(value: serde_json::Value) -> Claims {
        match value {
            serde_json::Value::Object(map) => Claims::from_raw(map),
            _ => panic!("claims must be an object"),
        }
    }

    mod evaluate {
        use super::*;

        #[test]
        fn all_scopes_needs_every_scope() {
            let policy = ClaimsPolicy::all_scopes(["users:read", "users:write"]);

            assert!(policy
                .evaluate(&claims(json!({ "scope": "users:write users:read admin" })))
                .is_ok());

            let err = policy
                .evaluate(&claims(json!({ "scope": "users:read" })))
                .unwrap_err();
            assert_eq!(err.error_code(), "insufficient_scope");
            assert_eq!(err.status(), StatusCode::FORBIDDEN);
        }

        #[test]
        fn empty_all_scopes_is_always_met() {
            let policy = ClaimsPolicy::all_scopes(Vec::<String>::new());

            assert!(policy.evaluate(&claims(json!({}))).is_ok());
        }

        #[test]
        fn any_scope_needs_one_match() {
            let policy = ClaimsPolicy::any_scope(["users:read", "users:admin"]);

            assert!(policy
                .evaluate(&claims(json!({ "scp": ["users:admin"] })))
                .is_ok());
            assert!(policy
                .evaluate(&claims(json!({ "scp": ["billing:read"] })))
                .is_err());
            assert!(ClaimsPolicy::any_scope(Vec::<String>::new())
                .evaluate(&claims(json!({ "scope": "users:read" })))
                .is_err());
        }

        #[test]
        fn all_roles_reads_top_level_roles() {
            let policy = ClaimsPolicy::all_roles(["admin"]);

            assert!(policy
                .evaluate(&claims(json!({ "roles": ["admin", "auditor"] })))
                .is_ok());

            let err = policy
                .evaluate(&claims(json!({
                    "realm_access": { "roles": ["admin"] },
                })))
                .unwrap_err();
            assert_eq!(err.error_code(), "insufficient_role");
        }

        #[test]
        fn service_tokens_are_not_exempt() {
            let policy = ClaimsPolicy::all_scopes(["users:read"]);

            assert!(policy
                .evaluate(&claims(json!({ "token_use": "service" })))
                .is_err());
        }
    }

    mod layers {
        use super::*;

        async fn ok(_: Request<Full<Bytes>>) -> Result<Response<Full<Bytes>>, Infallible> {
            Ok(Response::new(Full::default()))
        }

        fn request(authorization: Option<&str>) -> Request<Full<Bytes>> {
            let mut builder = Request::get("/reports");
            if let Some(value) = authorization {
                builder = builder.header(header::AUTHORIZATION, value);
            }
            builder.body(Full::default()).unwrap()
        }

        #[tokio::test]
        async fn granted_scopes_reach_the_handler() -> Result<()> {
            let service = ServiceBuilder::new()
                .layer(authorizer()?.require_scopes(["reports:read"]))
                .service(service_fn(ok));

            let header = bearer(json!({ "sub": "user-1", "scope": "reports:read" }))?;
            let response = service.oneshot(request(Some(&header))).await?;

            assert_eq!(response.status(), StatusCode::OK);
            Ok(())
        }

        #[tokio::test]
        async fn missing_scope_is_forbidden() -> Result<()> {
            let service = ServiceBuilder::new()
                .layer(authorizer()?.require_any_scope(["reports:read", "reports:admin"]))
                .service(service_fn(ok));

            let header = bearer(json!({ "sub": "user-1", "scope": "billing:read" }))?;
            let response = service.oneshot(request(Some(&header))).await?;

            assert_eq!(response.status(), StatusCode::FORBIDDEN);
            let body = response.into_body().collect().await?.to_bytes();
            let body: serde_json::Value = serde_json::from_slice(&body)?;
            assert_eq!(body["error"], "insufficient_scope");
            Ok(())
        }

        #[tokio::test]
        async fn missing_role_is_forbidden() -> Result<()> {
            let authorizer = authorizer()?;
            let service = ServiceBuilder::new()
                .layer(authorizer.authenticate_layer())
                .layer(authorizer.require_roles(["admin", "auditor"]))
                .service(service_fn(ok));

            let header = bearer(json!({ "sub": "user-1", "roles": ["admin"] }))?;
            let response = service.oneshot(request(Some(&header))).await?;

            assert_eq!(response.status(), StatusCode::FORBIDDEN);
            let body = response.into_body().collect().await?.to_bytes();
            let body: serde_json::Value = serde_json::from_slice(&body)?;
            assert_eq!(body["error"], "insufficient_role");
            Ok(())
        }

        #[tokio::test]
        async fn unauthenticated_caller_is_unauthorized() -> Result<()> {
            let service = ServiceBuilder::new()
                .layer(authorizer()?.require_roles(["admin"]))
                .service(service_fn(ok));

            let response = service.oneshot(request(None)).await?;

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            Ok(())
        }
    }
}
