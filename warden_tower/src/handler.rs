use std::{fmt, marker::PhantomData};

use bytes::Bytes;
use http::Response;
use http_body_util::Full;

use crate::{
    util::{error_response, unauthorized},
    AuthenticationError, AuthorizationError,
};

/// Handler for responding to authentication and authorization failures
pub trait OnAuthError {
    /// The body type returned on an error
    type Body;

    /// Response when the caller could not be authenticated
    fn on_authentication_failure(&self, error: AuthenticationError) -> Response<Self::Body>;

    /// Response when an authenticated caller was refused access
    fn on_authorization_failure(&self, error: AuthorizationError) -> Response<Self::Body>;
}

macro_rules! delegate_impls {
    ($($ty:ty)*) => {
        $(
            impl<T> OnAuthError for $ty
            where
                T: OnAuthError + ?Sized,
            {
                type Body = T::Body;

                fn on_authentication_failure(&self, error: AuthenticationError) -> Response<Self::Body> {
                    T::on_authentication_failure(self, error)
                }

                fn on_authorization_failure(&self, error: AuthorizationError) -> Response<Self::Body> {
                    T::on_authorization_failure(self, error)
                }
            }
        )*
    }
}

delegate_impls!(
    &'_ T
    Box<T>
    std::rc::Rc<T>
    std::sync::Arc<T>
);

/// Responds to failures with a JSON body of the form
/// `{"error": code, "message": message}`
///
/// Authentication failures always answer `401 Unauthorized` with the generic
/// message `authentication required`. The cause is logged at debug level and,
/// only in verbose mode, echoed in the `www-authenticate` header.
pub struct JsonErrorHandler<ResBody = Full<Bytes>> {
    verbose: bool,
    _ty: PhantomData<fn() -> ResBody>,
}

impl<ResBody> JsonErrorHandler<ResBody> {
    /// Instantiates a new handler over a given body type
    #[inline]
    pub fn new() -> Self {
        Self {
            verbose: false,
            _ty: PhantomData,
        }
    }

    /// A handler that describes authentication failures to the caller
    #[inline]
    pub fn verbose() -> Self {
        Self {
            verbose: true,
            _ty: PhantomData,
        }
    }
}

impl<ResBody> fmt::Debug for JsonErrorHandler<ResBody> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("JsonErrorHandler")
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl<ResBody> Default for JsonErrorHandler<ResBody> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<ResBody> Clone for JsonErrorHandler<ResBody> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<ResBody> Copy for JsonErrorHandler<ResBody> {}

impl<ResBody> OnAuthError for JsonErrorHandler<ResBody>
where
    ResBody: From<Bytes>,
{
    type Body = ResBody;

    fn on_authentication_failure(&self, error: AuthenticationError) -> Response<Self::Body> {
        let description = describe(&error);
        tracing::debug!(error = %description, "authentication failed");

        if self.verbose {
            unauthorized(&description)
        } else {
            unauthorized("")
        }
    }

    fn on_authorization_failure(&self, error: AuthorizationError) -> Response<Self::Body> {
        error_response(error.status(), error.error_code(), &error.to_string())
    }
}

fn describe(error: &dyn std::error::Error) -> String {
    use std::fmt::Write;

    let mut description = error.to_string();
    let mut err = error;
    while let Some(next) = err.source() {
        let _ = write!(&mut description, ": {next}");
        err = next;
    }
    description
}

#[cfg(test)]
mod tests {
    use http::{header, StatusCode};

    use super::*;

    #[test]
    fn terse_handler_hides_the_cause() {
        let resp = JsonErrorHandler::<Vec<u8>>::new()
            .on_authentication_failure(AuthenticationError::NotBearer);

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            r#"Bearer error="invalid_token""#
        );

        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["error"], "invalid_token");
        assert_eq!(body["message"], "authentication required");
    }

    #[test]
    fn verbose_handler_describes_the_cause() {
        let resp = JsonErrorHandler::<Vec<u8>>::verbose()
            .on_authentication_failure(AuthenticationError::MissingHeader);

        assert_eq!(
            resp.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            r#"Bearer error="invalid_token" error_description="authorization header missing""#
        );
    }

    #[test]
    fn authorization_failures_carry_their_code() {
        let handler = std::sync::Arc::new(JsonErrorHandler::<Vec<u8>>::new());

        let resp = handler.on_authorization_failure(AuthorizationError::PermissionNotRegistered {
            code: "usr-users-purge".to_owned(),
        });

        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "error": "permission_not_registered",
                "message": "permission is not registered in sentinel",
            })
        );
    }
}
