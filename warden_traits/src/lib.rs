//! Capability traits shared across the `warden` crates
//!
//! The authorization core never depends on a concrete configuration system
//! or HTTP client. Instead, it asks for the narrow capabilities defined here:
//!
//! * [`ConfigSource`]: look up a configuration value by key
//! * [`JsonClient`]: issue `GET` and `POST` calls that exchange JSON
//!
//! Small in-process implementations of [`ConfigSource`] are provided for the
//! process environment ([`EnvConfig`]) and for maps of values.

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_must_use
)]
#![forbid(unsafe_code)]

mod config;
mod json;

pub use config::{require_keys, ConfigSource, EnvConfig, MissingConfig};
pub use json::JsonClient;

/// A boxed error that can cross thread and crate boundaries
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
