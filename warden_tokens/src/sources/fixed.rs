//! A token source that always hands out the same token

use async_trait::async_trait;
use warden_clock::{Clock, DurationSecs, System};

use crate::{AccessToken, IssuedToken, TokenError, TokenSource};

/// How long a static token is considered valid after each fetch
pub const STATIC_TOKEN_LIFETIME: DurationSecs = DurationSecs(365 * 24 * 60 * 60);

/// A token source for tokens managed outside of this process
///
/// The token is reported as expiring one year after every fetch, so a cache
/// in front of it never refreshes on its own.
#[derive(Clone, Debug)]
pub struct StaticTokenSource<C = System> {
    token: AccessToken,
    clock: C,
}

impl StaticTokenSource {
    /// Constructs a source for a fixed token
    pub fn new(token: impl Into<AccessToken>) -> Self {
        Self {
            token: token.into(),
            clock: System,
        }
    }
}

impl<C> StaticTokenSource<C> {
    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> StaticTokenSource<D> {
        StaticTokenSource {
            token: self.token,
            clock,
        }
    }
}

#[async_trait]
impl<C: Clock + Send + Sync> TokenSource for StaticTokenSource<C> {
    async fn fetch_token(&self) -> Result<IssuedToken, TokenError> {
        Ok(IssuedToken::new(
            self.token.clone(),
            self.clock.now() + STATIC_TOKEN_LIFETIME,
        ))
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::Result;
    use warden_clock::{TestClock, UnixTime};

    use super::*;

    #[tokio::test]
    async fn expires_a_year_after_each_fetch() -> Result<()> {
        let clock = TestClock::new(UnixTime(1_000));
        let source = StaticTokenSource::new("fixed").with_clock(clock.clone());

        let first = source.fetch_token().await?;
        clock.inc(10);
        let second = source.fetch_token().await?;

        assert_eq!(first.access_token().as_str(), "fixed");
        assert_eq!(first.expires_at(), UnixTime(1_000 + 31_536_000));
        assert_eq!(second.expires_at(), UnixTime(1_010 + 31_536_000));
        Ok(())
    }
}
