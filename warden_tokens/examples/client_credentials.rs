use std::time::Duration;

use clap::Parser;
use warden_clock::DurationSecs;
use warden_tokens::{
    sources::{client_credentials::ClientCredentials, ClientCredentialsTokenSource},
    ClientId, ClientSecret, TokenCache,
};

#[derive(Debug, Parser)]
struct Opts {
    /// The issuing authority's token request URL
    #[clap(short, long, env)]
    token_url: reqwest::Url,

    /// The client ID of the client
    #[clap(short, long, env)]
    client_id: ClientId,

    /// The client secret used to identify the client to the issuing authority
    #[clap(short = 's', long, env, hide_env_values = true)]
    client_secret: ClientSecret,

    /// The scope to request
    #[clap(long, env, default_value = "")]
    scope: String,

    /// Seconds before expiry at which the token is refreshed
    #[clap(long, env, default_value_t = 60)]
    refresh_buffer: u64,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let client = reqwest::Client::builder().https_only(true).build()?;

    let source = ClientCredentialsTokenSource::new(
        client,
        opts.token_url,
        ClientCredentials {
            client_id: opts.client_id,
            client_secret: opts.client_secret,
        },
    )
    .with_scope(opts.scope);

    let cache = TokenCache::new(source, DurationSecs(opts.refresh_buffer));

    let mut interval = tokio::time::interval(Duration::from_secs(10));
    loop {
        interval.tick().await;

        match cache.get_token().await {
            Ok(token) => tracing::info!(token = format_args!("{:#?}", token), "current token"),
            Err(error) => {
                tracing::error!(error = (&error as &dyn std::error::Error), "no token available")
            }
        }
    }
}
