//! Token sources

#[cfg(feature = "client-credentials")]
pub mod client_credentials;
pub mod fixed;
pub mod function;
pub mod service;

#[cfg(feature = "client-credentials")]
pub use client_credentials::ClientCredentialsTokenSource;
pub use fixed::StaticTokenSource;
pub use function::{token_source_fn, FnTokenSource};
pub use service::ServiceTokenSource;
