use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use thiserror::Error;

/// A source of string configuration values
///
/// Implementations return `None` for keys that are not set. Callers treat an
/// empty string the same way as a missing value.
pub trait ConfigSource {
    /// Gets the raw value configured for `key`
    fn get_string(&self, key: &str) -> Option<String>;

    /// Gets the value for `key` with surrounding whitespace removed
    ///
    /// Blank values are reported as `None`.
    fn get_trimmed(&self, key: &str) -> Option<String> {
        self.get_string(key)
            .map(|v| v.trim().to_owned())
            .filter(|v| !v.is_empty())
    }
}

impl<T: ConfigSource + ?Sized> ConfigSource for &'_ T {
    #[inline]
    fn get_string(&self, key: &str) -> Option<String> {
        T::get_string(self, key)
    }
}

impl<T: ConfigSource + ?Sized> ConfigSource for std::sync::Arc<T> {
    #[inline]
    fn get_string(&self, key: &str) -> Option<String> {
        T::get_string(self, key)
    }
}

impl<S: std::hash::BuildHasher> ConfigSource for HashMap<String, String, S> {
    #[inline]
    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl ConfigSource for BTreeMap<String, String> {
    #[inline]
    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Configuration read from the process environment
///
/// An optional prefix is prepended to every key, so that with a prefix of
/// `APP_` the key `RSAPublicKey` is read from `APP_RSAPublicKey`.
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    prefix: String,
}

impl EnvConfig {
    /// Reads keys from the environment as-is
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads keys from the environment with `prefix` prepended
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl ConfigSource for EnvConfig {
    fn get_string(&self, key: &str) -> Option<String> {
        std::env::var(format!("{}{}", self.prefix, key)).ok()
    }
}

/// One or more required configuration keys were missing or blank
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub struct MissingConfig {
    keys: Vec<String>,
}

impl MissingConfig {
    /// The keys that were missing
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl fmt::Display for MissingConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "missing required configuration: {}", self.keys.join(", "))
    }
}

/// Verifies that every key in `keys` has a non-blank value
///
/// The error lists all of the missing keys, not just the first.
pub fn require_keys<C: ConfigSource + ?Sized>(
    config: &C,
    keys: &[&str],
) -> Result<(), MissingConfig> {
    let missing: Vec<String> = keys
        .iter()
        .filter(|k| config.get_trimmed(k).is_none())
        .map(|k| (*k).to_owned())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(MissingConfig { keys: missing })
    }
}
