//! A token source that exchanges a service's API key for a service token

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use warden_clock::{Clock, DurationSecs, System, UnixTime};
use warden_traits::JsonClient;

use crate::{ApiKey, IssuedToken, ServiceId, TokenError, TokenSource};

/// The path of the authority's service token endpoint
pub const SERVICE_TOKEN_PATH: &str = "/internal/api/v1/service-token";

/// The scope requested when none is configured
pub const DEFAULT_SCOPE: &str = "service";

/// The audience requested when none is configured
pub const DEFAULT_AUDIENCE: &str = "sentinel";

const FALLBACK_LIFETIME: DurationSecs = DurationSecs(60 * 60);

/// Obtains service tokens from the authority
///
/// The request carries the service ID, API key, scope, and audience. The
/// token's expiry is taken from the RFC 3339 `expires_at` of the response
/// when it parses, then from `expires_in`, and otherwise defaults to one
/// hour.
#[derive(Debug)]
pub struct ServiceTokenSource<J, C = System> {
    client: J,
    base_url: String,
    service_id: ServiceId,
    api_key: ApiKey,
    scope: String,
    audience: Vec<String>,
    clock: C,
}

impl<J> ServiceTokenSource<J> {
    /// Constructs a source that calls the authority at `base_url` through
    /// `client`
    pub fn new(
        client: J,
        base_url: impl Into<String>,
        service_id: impl Into<ServiceId>,
        api_key: impl Into<ApiKey>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            service_id: service_id.into(),
            api_key: api_key.into(),
            scope: DEFAULT_SCOPE.to_owned(),
            audience: vec![DEFAULT_AUDIENCE.to_owned()],
            clock: System,
        }
    }
}

impl<J, C> ServiceTokenSource<J, C> {
    /// Requests a different scope
    ///
    /// An empty scope keeps the default.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        let scope = scope.into();
        if !scope.is_empty() {
            self.scope = scope;
        }
        self
    }

    /// Requests a different audience
    ///
    /// An empty audience keeps the default.
    pub fn with_audience<I, S>(mut self, audience: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let audience: Vec<String> = audience.into_iter().map(Into::into).collect();
        if !audience.is_empty() {
            self.audience = audience;
        }
        self
    }

    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> ServiceTokenSource<J, D> {
        ServiceTokenSource {
            client: self.client,
            base_url: self.base_url,
            service_id: self.service_id,
            api_key: self.api_key,
            scope: self.scope,
            audience: self.audience,
            clock,
        }
    }

    fn validate(&self) -> Result<String, TokenError> {
        let base = self.base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(TokenError::MissingSetting("service URL"));
        }
        if self.service_id.as_str().is_empty() {
            return Err(TokenError::MissingSetting("service ID"));
        }
        if self.api_key.as_str().is_empty() {
            return Err(TokenError::MissingSetting("API key"));
        }

        Ok(format!("{base}{SERVICE_TOKEN_PATH}"))
    }
}

#[derive(Serialize)]
struct ServiceTokenRequest<'a> {
    service_id: &'a str,
    api_key: &'a str,
    scope: &'a str,
    audience: &'a [String],
}

#[derive(Deserialize)]
struct ServiceTokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: i64,
    #[serde(default)]
    expires_at: String,
}

fn expiry(expires_at: &str, expires_in: i64, now: UnixTime) -> UnixTime {
    if let Some(at) = UnixTime::parse_rfc3339(expires_at) {
        return at;
    }

    match u64::try_from(expires_in) {
        Ok(secs) if secs > 0 => now + DurationSecs(secs),
        _ => now + FALLBACK_LIFETIME,
    }
}

#[async_trait]
impl<J, C> TokenSource for ServiceTokenSource<J, C>
where
    J: JsonClient,
    C: Clock + Send + Sync,
{
    #[tracing::instrument(skip(self), fields(service_id = %self.service_id))]
    async fn fetch_token(&self) -> Result<IssuedToken, TokenError> {
        let url = self.validate()?;

        let request = ServiceTokenRequest {
            service_id: self.service_id.as_str(),
            api_key: self.api_key.as_str(),
            scope: &self.scope,
            audience: &self.audience,
        };

        let response: ServiceTokenResponse = self
            .client
            .post_json(&url, &request)
            .await
            .map_err(TokenError::request)?;

        if response.access_token.is_empty() {
            return Err(TokenError::EmptyToken);
        }

        let expires_at = expiry(
            &response.expires_at,
            response.expires_in,
            self.clock.now(),
        );
        tracing::debug!(expires_at = expires_at.0, "received service token");

        Ok(IssuedToken::new(response.access_token, expires_at))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use color_eyre::Result;
    use serde::de::DeserializeOwned;
    use serde_json::{json, Value};
    use thiserror::Error;
    use warden_clock::TestClock;

    use super::*;

    #[derive(Debug, Error)]
    #[error("authority unavailable")]
    struct Unavailable;

    #[derive(Debug)]
    struct Authority {
        response: Option<Value>,
        requests: Mutex<Vec<(String, Value)>>,
    }

    impl Authority {
        fn answering(response: Value) -> Self {
            Self {
                response: Some(response),
                requests: Mutex::default(),
            }
        }

        fn down() -> Self {
            Self {
                response: None,
                requests: Mutex::default(),
            }
        }

        fn requests(&self) -> Vec<(String, Value)> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JsonClient for Authority {
        type Error = Unavailable;

        async fn get_json<R>(&self, _url: &str) -> Result<R, Self::Error>
        where
            R: DeserializeOwned + Send,
        {
            Err(Unavailable)
        }

        async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, Self::Error>
        where
            B: Serialize + Sync + ?Sized,
            R: DeserializeOwned + Send,
        {
            let body = serde_json::to_value(body).map_err(|_| Unavailable)?;
            self.requests.lock().unwrap().push((url.to_owned(), body));

            let response = self.response.clone().ok_or(Unavailable)?;
            serde_json::from_value(response).map_err(|_| Unavailable)
        }
    }

    fn clock() -> TestClock {
        TestClock::new(UnixTime(1_700_000_000))
    }

    mod request {
        use super::*;

        #[tokio::test]
        async fn posts_credentials_with_defaults() -> Result<()> {
            let authority = Authority::answering(json!({ "access_token": "svc-token" }));
            let source = ServiceTokenSource::new(&authority, "https://sentinel.test/", "billing", "key-1");

            source.fetch_token().await?;

            let requests = authority.requests();
            assert_eq!(
                requests,
                [(
                    "https://sentinel.test/internal/api/v1/service-token".to_owned(),
                    json!({
                        "service_id": "billing",
                        "api_key": "key-1",
                        "scope": "service",
                        "audience": ["sentinel"],
                    })
                )]
            );
            Ok(())
        }

        #[tokio::test]
        async fn custom_scope_and_audience() -> Result<()> {
            let authority = Authority::answering(json!({ "access_token": "svc-token" }));
            let source = ServiceTokenSource::new(&authority, "https://sentinel.test", "billing", "key-1")
                .with_scope("internal")
                .with_audience(["sentinel", "ledger"])
                .with_scope("");

            source.fetch_token().await?;

            let (_, body) = &authority.requests()[0];
            assert_eq!(body["scope"], "internal");
            assert_eq!(body["audience"], json!(["sentinel", "ledger"]));
            Ok(())
        }

        #[tokio::test]
        async fn missing_settings_fail_before_calling() {
            let authority = Authority::answering(json!({ "access_token": "svc-token" }));

            let no_url = ServiceTokenSource::new(&authority, " ", "billing", "key-1");
            let no_id = ServiceTokenSource::new(&authority, "https://sentinel.test", "", "key-1");
            let no_key = ServiceTokenSource::new(&authority, "https://sentinel.test", "billing", "");

            assert!(matches!(
                no_url.fetch_token().await,
                Err(TokenError::MissingSetting("service URL"))
            ));
            assert!(matches!(
                no_id.fetch_token().await,
                Err(TokenError::MissingSetting("service ID"))
            ));
            assert!(matches!(
                no_key.fetch_token().await,
                Err(TokenError::MissingSetting("API key"))
            ));
            assert!(authority.requests().is_empty());
        }

        #[tokio::test]
        async fn transport_errors_are_wrapped() {
            let authority = Authority::down();
            let source = ServiceTokenSource::new(&authority, "https://sentinel.test", "billing", "key-1");

            let err = source.fetch_token().await.unwrap_err();

            assert!(matches!(err, TokenError::Request(_)));
        }

        #[tokio::test]
        async fn empty_token_is_rejected() {
            let authority = Authority::answering(json!({ "access_token": "", "expires_in": 60 }));
            let source = ServiceTokenSource::new(&authority, "https://sentinel.test", "billing", "key-1");

            assert!(matches!(
                source.fetch_token().await,
                Err(TokenError::EmptyToken)
            ));
        }
    }

    mod expiry {
        use super::*;

        #[tokio::test]
        async fn prefers_expires_at() -> Result<()> {
            let authority = Authority::answering(json!({
                "access_token": "svc-token",
                "expires_in": 60,
                "expires_at": "2023-11-14T23:13:20Z",
            }));
            let source = ServiceTokenSource::new(&authority, "https://sentinel.test", "billing", "key-1")
                .with_clock(clock());

            let token = source.fetch_token().await?;

            assert_eq!(token.expires_at(), UnixTime(1_700_003_600));
            Ok(())
        }

        #[tokio::test]
        async fn falls_back_to_expires_in() -> Result<()> {
            let authority = Authority::answering(json!({
                "access_token": "svc-token",
                "expires_in": 900,
                "expires_at": "not a timestamp",
            }));
            let source = ServiceTokenSource::new(&authority, "https://sentinel.test", "billing", "key-1")
                .with_clock(clock());

            let token = source.fetch_token().await?;

            assert_eq!(token.expires_at(), UnixTime(1_700_000_900));
            Ok(())
        }

        #[test]
        fn defaults_to_one_hour() {
            let now = UnixTime(1_700_000_000);

            assert_eq!(super::super::expiry("", 0, now), UnixTime(1_700_003_600));
            assert_eq!(super::super::expiry("", -5, now), UnixTime(1_700_003_600));
        }
    }
}
