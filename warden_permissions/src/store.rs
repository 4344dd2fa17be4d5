//! A concurrent cache of permission metadata
//!
//! The store maps permission codes to the service and bit value assigned by
//! the permission authority. The whole map is replaced at once: readers see
//! either the old map or the new one, never a mixture.

use std::{
    collections::HashMap,
    fmt,
    future::Future,
    sync::{Arc, PoisonError, RwLock},
};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use warden_traits::BoxError;

/// What the authority knows about a registered permission
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionMetadata {
    /// The authority's identifier for the permission
    pub id: String,

    /// The owning service
    pub service: String,

    /// The sequential position of the permission within its service
    pub bit_value: i64,
}

/// Resolves permission codes to metadata
pub trait PermissionLookup: Send + Sync {
    /// Looks up the metadata registered for `code`
    fn lookup_permission(&self, code: &str) -> Option<PermissionMetadata>;
}

impl<T: PermissionLookup + ?Sized> PermissionLookup for &'_ T {
    #[inline]
    fn lookup_permission(&self, code: &str) -> Option<PermissionMetadata> {
        T::lookup_permission(self, code)
    }
}

impl<T: PermissionLookup + ?Sized> PermissionLookup for Arc<T> {
    #[inline]
    fn lookup_permission(&self, code: &str) -> Option<PermissionMetadata> {
        T::lookup_permission(self, code)
    }
}

impl<S> PermissionLookup for HashMap<String, PermissionMetadata, S>
where
    S: std::hash::BuildHasher + Send + Sync,
{
    #[inline]
    fn lookup_permission(&self, code: &str) -> Option<PermissionMetadata> {
        self.get(code.trim()).cloned()
    }
}

/// A permission lookup that can be shared across requests
pub type SharedPermissionLookup = Arc<dyn PermissionLookup>;

/// Produces a complete permission map, typically from the authority
#[async_trait]
pub trait Loader: Send + Sync {
    /// Fetches every known permission, keyed by code
    async fn load(&self) -> Result<HashMap<String, PermissionMetadata>, BoxError>;
}

#[async_trait]
impl<T: Loader + ?Sized> Loader for Arc<T> {
    async fn load(&self) -> Result<HashMap<String, PermissionMetadata>, BoxError> {
        T::load(self).await
    }
}

/// A loader backed by an async closure
pub struct FnLoader<F> {
    f: F,
}

impl<F> fmt::Debug for FnLoader<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FnLoader").finish_non_exhaustive()
    }
}

/// Adapts an async closure into a [`Loader`]
pub fn loader_fn<F, Fut>(f: F) -> FnLoader<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<HashMap<String, PermissionMetadata>, BoxError>> + Send,
{
    FnLoader { f }
}

#[async_trait]
impl<F, Fut> Loader for FnLoader<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<HashMap<String, PermissionMetadata>, BoxError>> + Send,
{
    async fn load(&self) -> Result<HashMap<String, PermissionMetadata>, BoxError> {
        (self.f)().await
    }
}

/// An error occurring while loading the store
#[derive(Debug, Error)]
pub enum StoreError {
    /// No loader has been configured
    #[error("permission loader not configured")]
    LoaderNotConfigured,

    /// The loader failed
    #[error("failed to load permissions")]
    Load(#[source] BoxError),
}

type PermissionMap = HashMap<String, PermissionMetadata>;

/// A thread-safe, wholesale-replaceable permission cache
///
/// Cloning is cheap and clones share the same underlying data.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    data: ArcSwap<PermissionMap>,
    loader: RwLock<Option<Arc<dyn Loader>>>,
}

impl Store {
    /// Constructs an empty store without a loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Constructs an empty store that refreshes through `loader`
    pub fn with_loader<L: Loader + 'static>(loader: L) -> Self {
        let store = Self::new();
        store.set_loader(loader);
        store
    }

    /// Replaces the loader
    pub fn set_loader<L: Loader + 'static>(&self, loader: L) {
        let mut guard = self
            .inner
            .loader
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Some(Arc::new(loader));
    }

    /// Looks up the metadata for `code`
    ///
    /// The code is trimmed and otherwise matched exactly.
    pub fn lookup(&self, code: &str) -> Option<PermissionMetadata> {
        let code = code.trim();
        if code.is_empty() {
            return None;
        }

        self.inner.data.load().get(code).cloned()
    }

    /// Lists every permission registered for `service`
    ///
    /// Services are compared case-insensitively.
    pub fn list_by_service(&self, service: &str) -> Vec<PermissionMetadata> {
        let service = service.trim();
        self.inner
            .data
            .load()
            .values()
            .filter(|m| m.service.trim().eq_ignore_ascii_case(service))
            .cloned()
            .collect()
    }

    /// Atomically replaces the whole map
    ///
    /// Keys are trimmed and empty keys are dropped.
    pub fn replace(&self, permissions: HashMap<String, PermissionMetadata>) {
        self.swap(permissions);
    }

    fn swap(&self, permissions: HashMap<String, PermissionMetadata>) -> usize {
        let normalized: PermissionMap = permissions
            .into_iter()
            .filter_map(|(code, meta)| {
                let code = code.trim();
                (!code.is_empty()).then(|| (code.to_owned(), meta))
            })
            .collect();

        let count = normalized.len();
        self.inner.data.store(Arc::new(normalized));
        tracing::debug!(permissions = count, "permission store replaced");
        count
    }

    /// Refreshes the store from its loader, returning the new entry count
    ///
    /// On failure the store is left untouched.
    pub async fn load(&self) -> Result<usize, StoreError> {
        let loader = self
            .inner
            .loader
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(StoreError::LoaderNotConfigured)?;

        let permissions = loader.load().await.map_err(|err| {
            let error: &dyn std::error::Error = err.as_ref();
            tracing::warn!(error, "permission load failed");
            StoreError::Load(err)
        })?;

        Ok(self.swap(permissions))
    }

    /// A deep copy of the current map
    pub fn snapshot(&self) -> HashMap<String, PermissionMetadata> {
        HashMap::clone(&self.inner.data.load())
    }

    /// The number of registered permissions
    pub fn len(&self) -> usize {
        self.inner.data.load().len()
    }

    /// Whether the store holds no permissions
    pub fn is_empty(&self) -> bool {
        self.inner.data.load().is_empty()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let has_loader = self
            .inner
            .loader
            .read()
            .map(|l| l.is_some())
            .unwrap_or_default();
        f.debug_struct("Store")
            .field("permissions", &self.len())
            .field("has_loader", &has_loader)
            .finish()
    }
}

impl PermissionLookup for Store {
    #[inline]
    fn lookup_permission(&self, code: &str) -> Option<PermissionMetadata> {
        self.lookup(code)
    }
}
