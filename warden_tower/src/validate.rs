use std::{fmt, sync::Arc};

use http::{Request, Response};
use http_body::Body;
use tower_http::validate_request::ValidateRequest;
use warden_permissions::{Claims, SharedPermissionLookup};

use crate::{Authorizer, OnAuthError};

/// Retrieves the claims verified by an earlier [`Authenticate`] or
/// [`RequirePermission`] layer
#[inline]
pub fn claims_from_request<B>(request: &Request<B>) -> Option<&Claims> {
    request.extensions().get::<Claims>()
}

/// Verifies the request's claims once, reusing any already in the extensions
pub(crate) fn ensure_claims<OnError, ReqBody>(
    authorizer: &Authorizer<OnError>,
    request: &mut Request<ReqBody>,
) -> Result<Claims, Response<OnError::Body>>
where
    OnError: OnAuthError,
{
    if let Some(claims) = request.extensions().get::<Claims>() {
        tracing::trace!("found verified claims");
        return Ok(claims.clone());
    }

    tracing::trace!("verifying bearer token from headers");
    let claims = authorizer
        .authenticate(request.headers())
        .map_err(|err| authorizer.error_handler().on_authentication_failure(err))?;

    let _ = request.extensions_mut().insert(claims.clone());
    Ok(claims)
}

/// Validator that verifies the bearer token and stores the resulting
/// [`Claims`] in the request extensions
pub struct Authenticate<OnError> {
    authorizer: Authorizer<OnError>,
}

impl<OnError> Authenticate<OnError> {
    #[inline]
    pub(crate) fn new(authorizer: Authorizer<OnError>) -> Self {
        Self { authorizer }
    }
}

impl<OnError> Clone for Authenticate<OnError>
where
    OnError: Clone,
{
    #[inline]
    fn clone(&self) -> Self {
        Self {
            authorizer: self.authorizer.clone(),
        }
    }
}

impl<OnError> fmt::Debug for Authenticate<OnError>
where
    OnError: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Authenticate")
            .field("authorizer", &self.authorizer)
            .finish()
    }
}

impl<OnError, ReqBody> ValidateRequest<ReqBody> for Authenticate<OnError>
where
    OnError: OnAuthError,
    OnError::Body: Body,
{
    type ResponseBody = OnError::Body;

    fn validate(
        &mut self,
        request: &mut Request<ReqBody>,
    ) -> Result<(), Response<Self::ResponseBody>> {
        ensure_claims(&self.authorizer, request)?;
        tracing::trace!("bearer token was valid");
        Ok(())
    }
}

/// Validator that requires the caller to hold a registered permission
///
/// Runs authentication first when no verified claims are present, then
/// resolves the permission through the [`SharedPermissionLookup`] found in
/// the request extensions.
pub struct RequirePermission<OnError> {
    authorizer: Authorizer<OnError>,
    code: Arc<str>,
}

impl<OnError> RequirePermission<OnError> {
    #[inline]
    pub(crate) fn new(authorizer: Authorizer<OnError>, code: Arc<str>) -> Self {
        Self { authorizer, code }
    }

    /// The permission code being enforced
    #[inline]
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl<OnError> Clone for RequirePermission<OnError>
where
    OnError: Clone,
{
    #[inline]
    fn clone(&self) -> Self {
        Self {
            authorizer: self.authorizer.clone(),
            code: Arc::clone(&self.code),
        }
    }
}

impl<OnError> fmt::Debug for RequirePermission<OnError>
where
    OnError: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RequirePermission")
            .field("authorizer", &self.authorizer)
            .field("code", &self.code)
            .finish()
    }
}

impl<OnError, ReqBody> ValidateRequest<ReqBody> for RequirePermission<OnError>
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

        let lookup = request.extensions().get::<SharedPermissionLookup>();
        self.authorizer
            .authorize(&claims, lookup.map(|l| &**l), &self.code)
            .map_err(|err| self.authorizer.error_handler().on_authorization_failure(err))
    }
}
