//! Permission enforcement for `tower_http` and other constructs in the
//! ecosystem, including `axum`.
//!
//! An [`Authorizer`] verifies bearer tokens against a configured public key
//! and checks that the caller's `svc_perm` claim grants the bit registered
//! for a permission code. Permission codes are resolved through a
//! [`SharedPermissionLookup`](warden_permissions::SharedPermissionLookup)
//! that the application places in the request extensions.
//!
//! Routes can also require OAuth2 scopes or roles with
//! [`Authorizer::require_scopes`], [`Authorizer::require_any_scope`], and
//! [`Authorizer::require_roles`].
//!
//! See the `examples` folder in the repository for a working example using
//! an `axum` web server.
//!
//! ```no_run
//! use axum::{body::Body, routing::{get, post}, Extension, Router};
//! use warden_permissions::SharedPermissionLookup;
//! use warden_tower::{claims_from_request, Authorizer, JsonErrorHandler};
//!
//! fn router(config: &std::collections::HashMap<String, String>, lookup: SharedPermissionLookup) -> Router {
//!     let authorizer = Authorizer::from_source(config)
//!         .expect("verifier configuration")
//!         .with_error_handler(JsonErrorHandler::<Body>::new());
//!
//!     Router::new()
//!         .route(
//!             "/users",
//!             post(handle_post).layer(authorizer.require_permission("usr-users-create")),
//!         )
//!         .route(
//!             "/users/:id",
//!             get(handle_get).layer(authorizer.require_permission("usr-users-read")),
//!         )
//!         .layer(authorizer.authenticate_layer())
//!         .layer(Extension(lookup))
//! }
//!
//! async fn handle_post(request: axum::extract::Request) -> String {
//!     let subject = claims_from_request(&request).map(|c| c.subject()).unwrap_or_default();
//!     format!("created by {subject}")
//! }
//!
//! async fn handle_get() {}
//! ```

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod authorizer;
mod handler;
mod policy;
pub mod util;
mod validate;

#[cfg(test)]
mod test_support;

pub use crate::authorizer::{extract_bearer, AuthenticationError, AuthorizationError, Authorizer};
pub use crate::handler::{JsonErrorHandler, OnAuthError};
pub use crate::policy::{ClaimsPolicy, RequireClaims};
pub use crate::validate::{claims_from_request, Authenticate, RequirePermission};
