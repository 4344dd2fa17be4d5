use std::fmt;

use tokio::sync::RwLock;
use warden_clock::{Clock, DurationSecs, System};

use crate::{AccessToken, IssuedToken, TokenError, TokenSource};

/// The refresh buffer used when none is configured
pub const DEFAULT_REFRESH_BUFFER: DurationSecs = DurationSecs(30);

/// Holds the current token of a [`TokenSource`] and refreshes it ahead of
/// expiry
///
/// A token is reused while it has more than the refresh buffer left before
/// it expires. Concurrent callers that find the token stale wait on a single
/// refresh and share its result.
///
/// Dropping a pending [`get_token`](Self::get_token) future releases any
/// lock it holds, so callers can bound the wait with
/// [`tokio::time::timeout`].
pub struct TokenCache<S, C = System> {
    source: S,
    refresh_buffer: DurationSecs,
    clock: C,
    current: RwLock<Option<IssuedToken>>,
}

impl<S> TokenCache<S> {
    /// Constructs a cache over `source`
    ///
    /// A zero `refresh_buffer` falls back to [`DEFAULT_REFRESH_BUFFER`].
    pub fn new(source: S, refresh_buffer: DurationSecs) -> Self {
        let refresh_buffer = if refresh_buffer.0 == 0 {
            DEFAULT_REFRESH_BUFFER
        } else {
            refresh_buffer
        };

        Self {
            source,
            refresh_buffer,
            clock: System,
            current: RwLock::new(None),
        }
    }
}

impl<S, C> TokenCache<S, C> {
    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> TokenCache<S, D> {
        TokenCache {
            source: self.source,
            refresh_buffer: self.refresh_buffer,
            clock,
            current: self.current,
        }
    }

    /// The time kept in reserve before a token's expiry
    pub fn refresh_buffer(&self) -> DurationSecs {
        self.refresh_buffer
    }

    /// Discards the current token so that the next request fetches a new one
    pub async fn invalidate(&self) {
        *self.current.write().await = None;
        tracing::debug!("cached token invalidated");
    }
}

impl<S: TokenSource, C: Clock> TokenCache<S, C> {
    /// Gets a usable access token, fetching a new one if needed
    pub async fn get_token(&self) -> Result<AccessToken, TokenError> {
        if let Some(token) = self.usable(&*self.current.read().await) {
            return Ok(token);
        }

        let mut current = self.current.write().await;

        // Another caller may have refreshed while we waited for the lock
        if let Some(token) = self.usable(&current) {
            return Ok(token);
        }

        tracing::debug!("fetching new token");
        let token = self.source.fetch_token().await.map_err(|error| {
            tracing::warn!(
                error = (&error as &dyn std::error::Error),
                "unable to fetch token"
            );
            error
        })?;

        tracing::debug!(expires_at = token.expires_at().0, "token refreshed");
        let access_token = token.access_token().to_owned();
        *current = Some(token);

        Ok(access_token)
    }

    /// Whether the current token is still usable
    pub async fn is_valid(&self) -> bool {
        self.usable(&*self.current.read().await).is_some()
    }

    fn usable(&self, current: &Option<IssuedToken>) -> Option<AccessToken> {
        current
            .as_ref()
            .filter(|token| token.is_usable_at(self.clock.now(), self.refresh_buffer))
            .map(|token| token.access_token().to_owned())
    }
}

impl<S: fmt::Debug, C: fmt::Debug> fmt::Debug for TokenCache<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TokenCache")
            .field("source", &self.source)
            .field("refresh_buffer", &self.refresh_buffer)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
