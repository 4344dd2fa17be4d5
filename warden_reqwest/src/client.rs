use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use http_body_util::BodyExt;
use reqwest::{
    header::{self, HeaderValue},
    Method, Request, Response, StatusCode,
};
use reqwest_middleware::{ClientWithMiddleware, Middleware};
use serde::{de::DeserializeOwned, Serialize};
use warden_clock::DurationSecs;
use warden_tokens::{backoff::ErrorBackoffConfig, AccessTokenRef, TokenCache, TokenSource};
use warden_traits::{BoxError, JsonClient};

use crate::ClientError;

/// The per-request timeout of a client built without a custom HTTP client
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The number of attempts made for each request, including the first
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// The delay before the first retry
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// The longest delay between two attempts
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(15);

/// A token cache shared between clients
pub type SharedTokenCache = Arc<TokenCache<Box<dyn TokenSource>>>;

/// A function that may modify or reject a request before it is sent
pub type RequestHook = Arc<dyn Fn(&mut Request) -> Result<(), BoxError> + Send + Sync>;

/// A function that may reject a response when it arrives
pub type ResponseHook = Arc<dyn Fn(&Response) -> Result<(), BoxError> + Send + Sync>;

/// An HTTP client that authenticates with a cached bearer token and retries
/// failed requests
///
/// Every request runs the request hooks, then receives the current access
/// token. Each attempt replays the same buffered body. Transport errors are
/// retried with a doubling delay. A `401 Unauthorized` discards the cached
/// token and retries with a fresh one, except on the final attempt, where the
/// response is returned as is.
#[derive(Clone)]
pub struct CredentialClient {
    inner: reqwest::Client,
    http: ClientWithMiddleware,
    tokens: Option<SharedTokenCache>,
    max_attempts: u32,
    backoff: ErrorBackoffConfig,
    request_hooks: Vec<RequestHook>,
    response_hooks: Vec<ResponseHook>,
}

impl fmt::Debug for CredentialClient {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CredentialClient")
            .field("has_token_source", &self.tokens.is_some())
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("request_hooks", &self.request_hooks.len())
            .field("response_hooks", &self.response_hooks.len())
            .finish_non_exhaustive()
    }
}

/// Builder for a [`CredentialClient`]
pub struct CredentialClientBuilder {
    http_client: Option<reqwest::Client>,
    middleware: Vec<Arc<dyn Middleware>>,
    tokens: Option<SharedTokenCache>,
    max_attempts: u32,
    initial_delay: Duration,
    request_hooks: Vec<RequestHook>,
    response_hooks: Vec<ResponseHook>,
}

impl fmt::Debug for CredentialClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CredentialClientBuilder")
            .field("http_client", &self.http_client)
            .field("middleware", &self.middleware.len())
            .field("has_token_source", &self.tokens.is_some())
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .finish_non_exhaustive()
    }
}

impl Default for CredentialClientBuilder {
    fn default() -> Self {
        Self {
            http_client: None,
            middleware: Vec::new(),
            tokens: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_RETRY_DELAY,
            request_hooks: Vec::new(),
            response_hooks: Vec::new(),
        }
    }
}

impl CredentialClientBuilder {
    /// Uses a preconfigured HTTP client
    ///
    /// Without one, a client with a 30 second timeout is created.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Adds a middleware to the stack that executes each attempt
    pub fn with<M: Middleware>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Adds a shared middleware to the stack that executes each attempt
    pub fn with_arc(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Authenticates requests with tokens from `source`
    ///
    /// Tokens are refreshed once less than `refresh_buffer` remains before
    /// they expire. A zero buffer uses the cache default of 30 seconds.
    pub fn token_source<S: TokenSource + 'static>(self, source: S, refresh_buffer: Duration) -> Self {
        let source: Box<dyn TokenSource> = Box::new(source);
        self.token_cache(Arc::new(TokenCache::new(
            source,
            DurationSecs::from(refresh_buffer),
        )))
    }

    /// Authenticates requests with tokens from an existing cache
    pub fn token_cache(mut self, cache: SharedTokenCache) -> Self {
        self.tokens = Some(cache);
        self
    }

    /// Sets the number of attempts and the delay before the first retry
    ///
    /// The delay doubles with every further retry, up to 15 seconds. At least
    /// one attempt is always made.
    pub fn retry(mut self, max_attempts: u32, initial_delay: Duration) -> Self {
        self.max_attempts = max_attempts;
        self.initial_delay = initial_delay;
        self
    }

    /// Adds a hook that runs before each request
    pub fn request_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Request) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.request_hooks.push(Arc::new(hook));
        self
    }

    /// Adds a hook that runs on each response
    pub fn response_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Response) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.response_hooks.push(Arc::new(hook));
        self
    }

    /// Builds the client
    pub fn build(self) -> Result<CredentialClient, ClientError> {
        let inner = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .map_err(ClientError::Build)?,
        };

        let http = self
            .middleware
            .into_iter()
            .fold(
                reqwest_middleware::ClientBuilder::new(inner.clone()),
                |builder, middleware| builder.with_arc(middleware),
            )
            .build();

        Ok(CredentialClient {
            inner,
            http,
            tokens: self.tokens,
            max_attempts: self.max_attempts.max(1),
            backoff: ErrorBackoffConfig::new(self.initial_delay, MAX_RETRY_DELAY, 2),
            request_hooks: self.request_hooks,
            response_hooks: self.response_hooks,
        })
    }
}

async fn buffer_body(mut request: Request) -> Result<Request, ClientError> {
    if request.try_clone().is_some() {
        return Ok(request);
    }

    if let Some(body) = request.body_mut().take() {
        let bytes = body
            .collect()
            .await
            .map_err(ClientError::BufferBody)?
            .to_bytes();
        tracing::trace!(len = bytes.len(), "buffered streaming request body");
        *request.body_mut() = Some(bytes.into());
    }

    Ok(request)
}

fn set_bearer(request: &mut Request, token: &AccessTokenRef) -> Result<(), ClientError> {
    let mut header_value = BytesMut::with_capacity(token.as_str().len() + 7);
    header_value.put_slice(b"Bearer ");
    header_value.put_slice(token.as_str().as_bytes());

    let mut value =
        HeaderValue::from_maybe_shared(header_value.freeze()).map_err(ClientError::InvalidToken)?;
    value.set_sensitive(true);

    request.headers_mut().insert(header::AUTHORIZATION, value);
    Ok(())
}

impl CredentialClient {
    /// Starts building a client
    pub fn builder() -> CredentialClientBuilder {
        CredentialClientBuilder::default()
    }

    /// The token cache used to authenticate requests, if any
    pub fn token_cache(&self) -> Option<&SharedTokenCache> {
        self.tokens.as_ref()
    }

    /// Sends a request, authenticating and retrying as configured
    ///
    /// A streaming body is read into memory once, before the first attempt,
    /// so that every attempt can replay it.
    pub async fn execute(&self, mut request: Request) -> Result<Response, ClientError> {
        for hook in &self.request_hooks {
            hook(&mut request).map_err(ClientError::RequestHook)?;
        }

        if let Some(tokens) = &self.tokens {
            let token = tokens.get_token().await?;
            set_bearer(&mut request, &token)?;
        }

        let request = buffer_body(request).await?;

        let mut last_error: Option<BoxError> = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = self.backoff.delay_after(attempt);
                tracing::debug!(
                    attempt = attempt + 1,
                    max_attempts = self.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "retrying request"
                );
                tokio::time::sleep(delay).await;
            }

            let mut attempt_request = request.try_clone().ok_or(ClientError::StreamingBody)?;

            if attempt > 0 {
                if let Some(tokens) = &self.tokens {
                    match tokens.get_token().await {
                        Ok(token) => set_bearer(&mut attempt_request, &token)?,
                        Err(error) => {
                            tracing::warn!(
                                attempt = attempt + 1,
                                max_attempts = self.max_attempts,
                                error = (&error as &dyn std::error::Error),
                                "failed to get token for retry"
                            );
                            last_error = Some(Box::new(ClientError::Token(error)));
                            continue;
                        }
                    }
                }
            }

            let response = match self.http.execute(attempt_request).await {
                Ok(response) => response,
                Err(error) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        error = (&error as &dyn std::error::Error),
                        "request failed"
                    );
                    last_error = Some(Box::new(error));
                    continue;
                }
            };

            for hook in &self.response_hooks {
                hook(&response).map_err(ClientError::ResponseHook)?;
            }

            if response.status() == StatusCode::UNAUTHORIZED && attempt + 1 < self.max_attempts {
                if let Some(tokens) = &self.tokens {
                    tracing::info!(
                        attempt = attempt + 1,
                        "received 401, invalidating token and retrying"
                    );
                    tokens.invalidate().await;
                    continue;
                }
            }

            tracing::trace!(status = response.status().as_u16(), "received response");
            return Ok(response);
        }

        Err(ClientError::RetriesExhausted {
            attempts: self.max_attempts,
            source: last_error,
        })
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.inner.request(method, url)
    }

    async fn send_builder(&self, builder: reqwest::RequestBuilder) -> Result<Response, ClientError> {
        let request = builder.build().map_err(ClientError::InvalidRequest)?;
        self.execute(request).await
    }

    /// Performs a `GET`
    pub async fn get(&self, url: &str) -> Result<Response, ClientError> {
        self.send_builder(self.request(Method::GET, url)).await
    }

    /// Performs a `POST` with a JSON body
    pub async fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<Response, ClientError> {
        self.send_builder(self.request(Method::POST, url).json(body))
            .await
    }

    /// Performs a `PUT` with a JSON body
    pub async fn put<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<Response, ClientError> {
        self.send_builder(self.request(Method::PUT, url).json(body))
            .await
    }

    /// Performs a `PATCH` with a JSON body
    pub async fn patch<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<Response, ClientError> {
        self.send_builder(self.request(Method::PATCH, url).json(body))
            .await
    }

    /// Performs a `DELETE`
    pub async fn delete(&self, url: &str) -> Result<Response, ClientError> {
        self.send_builder(self.request(Method::DELETE, url)).await
    }

    /// Sends a request and decodes a JSON response
    ///
    /// A status outside of `2xx` is reported with the response body.
    pub async fn send_json<R: DeserializeOwned>(&self, request: Request) -> Result<R, ClientError> {
        let response = self.execute(request).await?;
        decode_json(response).await
    }

    /// Performs a `GET` and decodes the JSON response
    pub async fn get_json<R: DeserializeOwned>(&self, url: &str) -> Result<R, ClientError> {
        let response = self.get(url).await?;
        decode_json(response).await
    }

    /// Performs a `POST` with a JSON body and decodes the JSON response
    pub async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, ClientError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.post(url, body).await?;
        decode_json(response).await
    }
}

async fn decode_json<R: DeserializeOwned>(response: Response) -> Result<R, ClientError> {
    let status = response.status();
    let body = response.bytes().await.map_err(ClientError::Body)?;

    if !status.is_success() {
        return Err(ClientError::Status {
            status,
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }

    serde_json::from_slice(&body).map_err(ClientError::Decode)
}

#[async_trait]
impl JsonClient for CredentialClient {
    type Error = ClientError;

    async fn get_json<R>(&self, url: &str) -> Result<R, Self::Error>
    where
        R: DeserializeOwned + Send,
    {
        CredentialClient::get_json(self, url).await
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, Self::Error>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned + Send,
    {
        CredentialClient::post_json(self, url, body).await
    }
}
