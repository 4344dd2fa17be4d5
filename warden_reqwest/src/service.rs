use std::time::Duration;

use warden_tokens::sources::ServiceTokenSource;
use warden_traits::{require_keys, ConfigSource};

use crate::{ClientError, CredentialClient, CredentialClientBuilder};

/// Configuration key for the authority's base URL
pub const SERVICE_ENDPOINT_CONFIG_KEY: &str = "SentinelServiceEndpoint";

/// Configuration key for the calling service's identifier
pub const SERVICE_ID_CONFIG_KEY: &str = "SentinelServiceID";

/// Configuration key for the calling service's API key
pub const SERVICE_API_KEY_CONFIG_KEY: &str = "SentinelServiceAPIKey";

/// How long before expiry a service token is refreshed
pub const SERVICE_TOKEN_REFRESH_BUFFER: Duration = Duration::from_secs(60);

/// Builds a client that authenticates with service tokens from the authority
///
/// The authority endpoint, service ID, and API key are read from `config`.
/// If any is missing, the error names every missing key. Service tokens are
/// obtained through a separate unauthenticated client.
pub fn service_client<C: ConfigSource + ?Sized>(config: &C) -> Result<CredentialClient, ClientError> {
    service_client_builder(config, CredentialClient::builder())?.build()
}

/// Configures `builder` to authenticate with service tokens from the
/// authority, leaving its other settings in place
pub fn service_client_builder<C: ConfigSource + ?Sized>(
    config: &C,
    builder: CredentialClientBuilder,
) -> Result<CredentialClientBuilder, ClientError> {
    require_keys(
        config,
        &[
            SERVICE_ENDPOINT_CONFIG_KEY,
            SERVICE_ID_CONFIG_KEY,
            SERVICE_API_KEY_CONFIG_KEY,
        ],
    )?;

    let endpoint = config.get_trimmed(SERVICE_ENDPOINT_CONFIG_KEY).unwrap_or_default();
    let service_id = config.get_trimmed(SERVICE_ID_CONFIG_KEY).unwrap_or_default();
    let api_key = config.get_trimmed(SERVICE_API_KEY_CONFIG_KEY).unwrap_or_default();

    tracing::debug!(%endpoint, %service_id, "configuring service token client");

    let token_client = CredentialClient::builder().build()?;
    let source = ServiceTokenSource::new(token_client, endpoint, service_id, api_key);

    Ok(builder.token_source(source, SERVICE_TOKEN_REFRESH_BUFFER))
}
