//! Start-up synchronization with the permission authority
//!
//! At start-up a service registers the permissions it declares, then pulls
//! the authority's catalog to learn the bit value assigned to each code.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use warden_traits::{BoxError, JsonClient};

use crate::{
    catalog::Catalog,
    dto::{BulkCreateRequest, BulkCreateResponse, CatalogResponse, CreatePermissionRequest},
    store::{Loader, PermissionMetadata, Store},
};

const BULK_CREATE_PATH: &str = "/api/v1/permissions/bulk";
const BITMASK_CATALOG_PATH: &str = "/api/v1/permissions/bitmask";

/// An error occurring while synchronizing with the permission authority
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The authority base URL was empty
    #[error("permission authority endpoint not configured")]
    MissingEndpoint,

    /// Registering the catalog failed
    #[error("failed to ensure permissions")]
    Ensure(#[source] BoxError),

    /// Fetching the authority's catalog failed
    #[error("failed to fetch permission catalog")]
    Fetch(#[source] BoxError),
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> Result<String, BootstrapError> {
    let base = base_url.trim().trim_end_matches('/');
    if base.is_empty() {
        return Err(BootstrapError::MissingEndpoint);
    }

    Ok(format!("{base}{path}"))
}

/// Registers every permission in `catalog` with the authority
///
/// The authority creates missing permissions and returns the registration
/// of every submitted permission.
#[tracing::instrument(skip_all, fields(permissions = catalog.count()))]
pub async fn ensure_permissions<J: JsonClient>(
    catalog: &Catalog,
    client: &J,
    base_url: &str,
) -> Result<BulkCreateResponse, BootstrapError> {
    let url = endpoint(base_url, BULK_CREATE_PATH)?;

    let request = BulkCreateRequest {
        permissions: catalog
            .all()
            .iter()
            .map(CreatePermissionRequest::from)
            .collect(),
    };

    let response: BulkCreateResponse = client
        .post_json(&url, &request)
        .await
        .map_err(|err| BootstrapError::Ensure(err.into()))?;

    tracing::info!(
        registered = response.permissions.len(),
        "permissions ensured with authority"
    );

    Ok(response)
}

/// Fetches the authority's catalog as a code-keyed metadata map
#[tracing::instrument(skip_all)]
pub async fn fetch_permission_metadata<J: JsonClient>(
    client: &J,
    base_url: &str,
) -> Result<HashMap<String, PermissionMetadata>, BootstrapError> {
    let url = endpoint(base_url, BITMASK_CATALOG_PATH)?;

    let response: CatalogResponse = client
        .get_json(&url)
        .await
        .map_err(|err| BootstrapError::Fetch(err.into()))?;

    let metadata = response.into_metadata();
    tracing::debug!(permissions = metadata.len(), "permission catalog fetched");

    Ok(metadata)
}

/// A [`Loader`] that fetches the authority's catalog
#[derive(Debug)]
pub struct HttpLoader<J> {
    client: J,
    base_url: String,
}

/// Builds a [`Loader`] that fetches the authority's catalog at `base_url`
pub fn http_loader<J: JsonClient>(client: J, base_url: impl Into<String>) -> HttpLoader<J> {
    HttpLoader {
        client,
        base_url: base_url.into(),
    }
}

#[async_trait]
impl<J: JsonClient> Loader for HttpLoader<J> {
    async fn load(&self) -> Result<HashMap<String, PermissionMetadata>, BoxError> {
        Ok(fetch_permission_metadata(&self.client, &self.base_url).await?)
    }
}

/// Registers the catalog with the authority and, when a store is given,
/// loads the authority's bit assignments into it
pub async fn bootstrap<J: JsonClient>(
    catalog: &Catalog,
    client: &J,
    base_url: &str,
    store: Option<&Store>,
) -> Result<(), BootstrapError> {
    endpoint(base_url, "")?;

    ensure_permissions(catalog, client, base_url).await?;

    if let Some(store) = store {
        let metadata = fetch_permission_metadata(client, base_url).await?;
        store.replace(metadata);
        tracing::info!(permissions = store.len(), "permission store bootstrapped");
    }

    Ok(())
}
