//! Cached access tokens for service-to-service calls
//!
//! A [`TokenSource`] knows how to obtain a token from an authority. A
//! [`TokenCache`] sits in front of it, hands out the current token while it
//! still has more than the refresh buffer left, and refreshes it once when
//! it goes stale, no matter how many callers are waiting.
//!
//! ```
//! use warden_clock::DurationSecs;
//! use warden_tokens::{sources::StaticTokenSource, TokenCache};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), warden_tokens::TokenError> {
//! let cache = TokenCache::new(StaticTokenSource::new("opaque-token"), DurationSecs(60));
//!
//! let token = cache.get_token().await?;
//! assert_eq!(token.as_str(), "opaque-token");
//!
//! // A 401 from the upstream means the token was revoked early
//! cache.invalidate().await;
//! assert!(!cache.is_valid().await);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! * `client-credentials` (default): Provides a token source for the OAuth2
//!   _client credentials_ flow on top of [reqwest].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

pub mod backoff;
mod braids;
mod cache;
pub mod sources;
mod tokens;

pub use braids::*;
pub use cache::{TokenCache, DEFAULT_REFRESH_BUFFER};
pub use tokens::{IssuedToken, TokenError, TokenSource};
