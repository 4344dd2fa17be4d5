//! An HTTP client for calls between services
//!
//! [`CredentialClient`] attaches a cached bearer token from a
//! [`TokenSource`](warden_tokens::TokenSource) to every outgoing request,
//! retries transport failures with a capped exponential backoff, and
//! recovers from a revoked token by refreshing it when the server answers
//! `401 Unauthorized`.
//!
//! ```
//! use std::time::Duration;
//! use warden_reqwest::CredentialClient;
//! use warden_tokens::sources::StaticTokenSource;
//!
//! # fn main() -> Result<(), warden_reqwest::ClientError> {
//! let client = CredentialClient::builder()
//!     .token_source(StaticTokenSource::new("opaque-token"), Duration::from_secs(60))
//!     .retry(5, Duration::from_millis(250))
//!     .build()?;
//!
//! let request = client.get_json::<serde_json::Value>("https://example.com/api/v1/items");
//! # let _ = request;
//! # Ok(())
//! # }
//! ```
//!
//! A service that authenticates with the permission authority can build its
//! client from configuration with [`service_client`].
//!
//! The client also implements [`JsonClient`](warden_traits::JsonClient), so
//! it can drive the permission bootstrap and role sync directly.

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

mod client;
mod error;
mod service;

pub use client::{
    CredentialClient, CredentialClientBuilder, RequestHook, ResponseHook, SharedTokenCache,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT, MAX_RETRY_DELAY,
};
pub use error::ClientError;
pub use service::{
    service_client, service_client_builder, SERVICE_API_KEY_CONFIG_KEY,
    SERVICE_ENDPOINT_CONFIG_KEY, SERVICE_ID_CONFIG_KEY, SERVICE_TOKEN_REFRESH_BUFFER,
};
