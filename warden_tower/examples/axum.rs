use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::{
    body::Body,
    extract::{Path, Request},
    routing::{get, post},
    Extension, Router,
};
use clap::Parser;
use serde_json::json;
use warden_clock::{Clock, DurationSecs, System};
use warden_jose::{jwa::Algorithm, testing, Jwt, VerifierConfig};
use warden_permissions::{PermissionMetadata, SharedPermissionLookup, Store};
use warden_tower::{claims_from_request, Authorizer, JsonErrorHandler};

const ISSUER: &str = "sentinel";
const AUDIENCE: &str = "users-api";

#[derive(Debug, Parser)]
struct Opts {
    /// The address to listen on
    #[clap(short, long, env, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// Describe token failures in the `www-authenticate` header
    #[clap(long, env)]
    verbose_errors: bool,
}

fn permission_store() -> Store {
    let store = Store::new();
    store.replace(HashMap::from([
        (
            "usr-users-create".to_owned(),
            PermissionMetadata {
                id: "perm-create".to_owned(),
                service: "usr".to_owned(),
                bit_value: 0,
            },
        ),
        (
            "usr-users-read".to_owned(),
            PermissionMetadata {
                id: "perm-read".to_owned(),
                service: "usr".to_owned(),
                bit_value: 1,
            },
        ),
    ]));
    store
}

async fn handle_post(request: Request) -> String {
    let subject = claims_from_request(&request)
        .map(|c| c.subject().to_owned())
        .unwrap_or_default();
    format!("Handled POST /users for {subject}")
}

async fn handle_export() -> &'static str {
    "Handled GET /users/export"
}

async fn handle_get(Path(id): Path<u64>) -> String {
    format!("Handled GET /users/{id}")
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    let key = testing::rsa_key();
    let mut config = VerifierConfig::new(key.public_key()?);
    config.issuer = Some(ISSUER.into());
    config.audiences = vec![AUDIENCE.into()];

    let handler = if opts.verbose_errors {
        JsonErrorHandler::<Body>::verbose()
    } else {
        JsonErrorHandler::<Body>::new()
    };
    let authorizer = Authorizer::new(config).with_error_handler(handler);

    let lookup: SharedPermissionLookup = Arc::new(permission_store());

    print_example_token()?;

    let app = Router::new()
        .route(
            "/users",
            post(handle_post).layer(authorizer.require_permission("usr-users-create")),
        )
        .route(
            "/users/export",
            get(handle_export).layer(authorizer.require_scopes(["users:export"])),
        )
        .route(
            "/users/:id",
            get(handle_get).layer(authorizer.require_permission("usr-users-read")),
        )
        .layer(authorizer.authenticate_layer())
        .layer(Extension(lookup));

    tracing::info!(listen = %opts.listen, "press Ctrl+C to exit");

    let listener = tokio::net::TcpListener::bind(opts.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn print_example_token() -> color_eyre::Result<()> {
    let payload = json!({
        "sub": "test",
        "iss": ISSUER,
        "aud": AUDIENCE,
        "exp": System.now() + DurationSecs(300),
        "svc_perm": "usr:2",
        "scope": "users:export",
    });

    let jwt = Jwt::sign(testing::rsa_key(), Algorithm::RS256, &payload)?;

    println!("Use the following JWT to access the service. It is good for the next 5 minutes, so use it fast!");
    println!("It may read and export users but not create them.");
    println!("Token: {:#}", jwt);
    Ok(())
}
