use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// A client able to exchange JSON documents with a remote service
///
/// The permission bootstrap, permission loader, role sync and service token
/// source only need these two calls, so they are written against this trait
/// rather than a concrete HTTP stack.
#[async_trait]
pub trait JsonClient: Send + Sync {
    /// The error returned when a call fails
    type Error: std::error::Error + Send + Sync + 'static;

    /// Performs a `GET` against `url` and decodes the JSON response
    async fn get_json<R>(&self, url: &str) -> Result<R, Self::Error>
    where
        R: DeserializeOwned + Send;

    /// Performs a `POST` of `body` as JSON against `url` and decodes the JSON
    /// response
    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, Self::Error>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned + Send;
}

#[async_trait]
impl<T: JsonClient + ?Sized> JsonClient for std::sync::Arc<T> {
    type Error = T::Error;

    async fn get_json<R>(&self, url: &str) -> Result<R, Self::Error>
    where
        R: DeserializeOwned + Send,
    {
        T::get_json(self, url).await
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, Self::Error>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned + Send,
    {
        T::post_json(self, url, body).await
    }
}

#[async_trait]
impl<T: JsonClient + ?Sized> JsonClient for &'_ T {
    type Error = T::Error;

    async fn get_json<R>(&self, url: &str) -> Result<R, Self::Error>
    where
        R: DeserializeOwned + Send,
    {
        T::get_json(self, url).await
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, Self::Error>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned + Send,
    {
        T::post_json(self, url, body).await
    }
}
