use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use warden_clock::{DurationSecs, UnixTime};
use warden_traits::BoxError;

use crate::{AccessToken, AccessTokenRef};

/// A token as handed out by a [`TokenSource`], with its expiry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedToken {
    access_token: AccessToken,
    expires_at: UnixTime,
}

impl IssuedToken {
    /// Pairs an access token with the time it expires
    pub fn new(access_token: impl Into<AccessToken>, expires_at: UnixTime) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    /// Gets the access token
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// Gets the time that the token expires
    #[inline]
    pub fn expires_at(&self) -> UnixTime {
        self.expires_at
    }

    /// Takes the access token
    pub fn into_access_token(self) -> AccessToken {
        self.access_token
    }

    /// Whether the token can still be used at `now`, keeping `buffer` in
    /// reserve before expiry
    ///
    /// An empty token is never usable.
    pub fn is_usable_at(&self, now: UnixTime, buffer: DurationSecs) -> bool {
        !self.access_token.as_str().is_empty() && now + buffer < self.expires_at
    }
}

/// An error while obtaining a token
#[derive(Debug, Error)]
pub enum TokenError {
    /// A required setting of the token source is empty
    #[error("{0} is required")]
    MissingSetting(&'static str),

    /// The authority answered without an access token
    #[error("empty access token in response")]
    EmptyToken,

    /// The authority rejected the token request
    #[error("token request failed with status {status}: {body}")]
    Rejected {
        /// The HTTP status code
        status: u16,
        /// The response body
        body: String,
    },

    /// The token request could not be completed
    #[error("failed to request token")]
    Request(#[source] BoxError),
}

impl TokenError {
    /// Wraps any error raised while requesting a token
    pub fn request(err: impl Into<BoxError>) -> Self {
        Self::Request(err.into())
    }
}

/// An asynchronous source of tokens
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Obtains a new token
    async fn fetch_token(&self) -> Result<IssuedToken, TokenError>;
}

#[async_trait]
impl<T: TokenSource + ?Sized> TokenSource for &'_ T {
    async fn fetch_token(&self) -> Result<IssuedToken, TokenError> {
        T::fetch_token(self).await
    }
}

#[async_trait]
impl<T: TokenSource + ?Sized> TokenSource for Box<T> {
    async fn fetch_token(&self) -> Result<IssuedToken, TokenError> {
        T::fetch_token(self).await
    }
}

#[async_trait]
impl<T: TokenSource + ?Sized> TokenSource for Arc<T> {
    async fn fetch_token(&self) -> Result<IssuedToken, TokenError> {
        T::fetch_token(self).await
    }
}
