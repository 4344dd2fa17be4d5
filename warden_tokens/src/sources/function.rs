//! A token source backed by a caller-supplied async function

use std::{fmt, future::Future};

use async_trait::async_trait;

use crate::{IssuedToken, TokenError, TokenSource};

/// A [`TokenSource`] that calls a function for every fetch
///
/// Constructed with [`token_source_fn`].
pub struct FnTokenSource<F> {
    fetch: F,
}

impl<F> fmt::Debug for FnTokenSource<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FnTokenSource").finish_non_exhaustive()
    }
}

/// Builds a [`TokenSource`] from an async function
///
/// ```
/// use warden_clock::UnixTime;
/// use warden_tokens::{sources::token_source_fn, IssuedToken, TokenError};
///
/// let source = token_source_fn(|| async {
///     Ok::<_, TokenError>(IssuedToken::new("from-vault", UnixTime(4_102_444_800)))
/// });
/// # let _ = source;
/// ```
pub fn token_source_fn<F, Fut>(fetch: F) -> FnTokenSource<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<IssuedToken, TokenError>> + Send,
{
    FnTokenSource { fetch }
}

#[async_trait]
impl<F, Fut> TokenSource for FnTokenSource<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<IssuedToken, TokenError>> + Send,
{
    async fn fetch_token(&self) -> Result<IssuedToken, TokenError> {
        (self.fetch)().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use color_eyre::Result;
    use warden_clock::UnixTime;

    use super::*;

    #[tokio::test]
    async fn calls_the_function_on_every_fetch() -> Result<()> {
        let counter = AtomicU64::new(0);
        let source = token_source_fn(|| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(IssuedToken::new(format!("token-{n}"), UnixTime(n))) }
        });

        assert_eq!(source.fetch_token().await?.access_token().as_str(), "token-0");
        assert_eq!(source.fetch_token().await?.expires_at(), UnixTime(1));
        Ok(())
    }

    #[tokio::test]
    async fn errors_pass_through() {
        let source = token_source_fn(|| async { Err(TokenError::EmptyToken) });

        assert!(matches!(
            source.fetch_token().await,
            Err(TokenError::EmptyToken)
        ));
    }
}
