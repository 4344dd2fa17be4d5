//! A token source that uses the OAuth2 client credentials flow

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use warden_clock::{Clock, DurationSecs, System, UnixTime};

use crate::{ClientId, ClientSecret, IssuedToken, TokenError, TokenSource};

const EXPIRY_MARGIN: DurationSecs = DurationSecs(10);
const FALLBACK_LIFETIME: DurationSecs = DurationSecs(60 * 60);

/// Client credentials
#[derive(Debug, Serialize)]
pub struct ClientCredentials {
    /// The client ID
    pub client_id: ClientId,

    /// The client secret
    pub client_secret: ClientSecret,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<&'a str>,
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

/// Requests tokens from an OAuth2 token endpoint
///
/// Credentials are sent as URL-encoded form data. The reported lifetime is
/// shortened by ten seconds; a response without a lifetime is treated as
/// valid for one hour.
#[derive(Debug)]
pub struct ClientCredentialsTokenSource<C = System> {
    client: reqwest::Client,
    token_url: reqwest::Url,
    credentials: ClientCredentials,
    scope: Option<String>,
    clock: C,
}

impl ClientCredentialsTokenSource {
    /// Constructs a new client credentials source
    pub fn new(
        client: reqwest::Client,
        token_url: reqwest::Url,
        credentials: ClientCredentials,
    ) -> Self {
        Self {
            client,
            token_url,
            credentials,
            scope: None,
            clock: System,
        }
    }
}

impl<C> ClientCredentialsTokenSource<C> {
    /// Requests the given scope
    ///
    /// An empty scope is not sent.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into()).filter(|s| !s.is_empty());
        self
    }

    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> ClientCredentialsTokenSource<D> {
        ClientCredentialsTokenSource {
            client: self.client,
            token_url: self.token_url,
            credentials: self.credentials,
            scope: self.scope,
            clock,
        }
    }

    fn form(&self) -> TokenRequest<'_> {
        TokenRequest {
            grant_type: "client_credentials",
            client_id: self.credentials.client_id.as_str(),
            client_secret: self.credentials.client_secret.as_str(),
            scope: self.scope.as_deref(),
        }
    }
}

fn token_from_response(status: u16, body: &[u8], now: UnixTime) -> Result<IssuedToken, TokenError> {
    if status != 200 {
        return Err(TokenError::Rejected {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        });
    }

    let response: TokenResponse = serde_json::from_slice(body).map_err(TokenError::request)?;
    if response.access_token.is_empty() {
        return Err(TokenError::EmptyToken);
    }

    let expires_at = match u64::try_from(response.expires_in) {
        Ok(secs) if secs > 0 => now + DurationSecs(secs) - EXPIRY_MARGIN,
        _ => now + FALLBACK_LIFETIME,
    };

    Ok(IssuedToken::new(response.access_token, expires_at))
}

#[async_trait]
impl<C: Clock + Send + Sync> TokenSource for ClientCredentialsTokenSource<C> {
    #[tracing::instrument(
        skip(self),
        fields(
            token_url = %self.token_url,
            credentials.client_id = %self.credentials.client_id,
        ),
    )]
    async fn fetch_token(&self) -> Result<IssuedToken, TokenError> {
        tracing::trace!("requesting token from authority");

        let response = self
            .client
            .post(self.token_url.clone())
            .form(&self.form())
            .send()
            .await
            .map_err(TokenError::request)?;

        let status = response.status().as_u16();
        tracing::debug!(
            response.status = status,
            "received token response from issuing authority"
        );

        let body = response.bytes().await.map_err(TokenError::request)?;
        let token = token_from_response(status, &body, self.clock.now())?;

        tracing::info!(expiry = token.expires_at().0, "received new token");
        Ok(token)
    }
}
