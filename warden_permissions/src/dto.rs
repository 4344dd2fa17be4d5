//! Documents exchanged with the permission authority

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{catalog::PermissionDefinition, store::PermissionMetadata};

/// Body of a bulk permission create
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkCreateRequest {
    /// The permissions to create if missing
    pub permissions: Vec<CreatePermissionRequest>,
}

/// A single permission in a bulk create
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePermissionRequest {
    /// Human-readable name
    pub name: String,
    /// The owning service
    pub service: String,
    /// The resource category
    pub category: String,
    /// The action, named `sub_category` by the authority
    pub sub_category: String,
    /// Feature flags gating the permission
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feature_flags: Vec<String>,
    /// Human-readable description
    pub description: String,
}

impl From<&PermissionDefinition> for CreatePermissionRequest {
    fn from(def: &PermissionDefinition) -> Self {
        Self {
            name: def.name.clone(),
            service: def.reference.service.clone(),
            category: def.reference.category.clone(),
            sub_category: def.reference.action.clone(),
            feature_flags: def.feature_flags.clone(),
            description: def.description.clone(),
        }
    }
}

/// Response to a bulk permission create
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkCreateResponse {
    /// The permissions as registered by the authority
    #[serde(default)]
    pub permissions: Vec<CreatedPermission>,
}

/// A permission as registered by the authority
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreatedPermission {
    /// The authority's identifier
    pub id: String,
    /// The permission code
    pub code: String,
    /// The owning service
    pub service: String,
    /// The assigned bit value
    pub bit_value: i64,
}

/// The authority's full permission catalog, grouped by service
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogResponse {
    /// Permissions and groups, keyed by service
    #[serde(default)]
    pub services: HashMap<String, ServiceCatalog>,
}

impl CatalogResponse {
    /// Flattens the catalog into a code-keyed metadata map
    ///
    /// The service of each entry is taken from the key it is listed under.
    /// Groups are not included.
    pub fn into_metadata(self) -> HashMap<String, PermissionMetadata> {
        self.services
            .into_iter()
            .flat_map(|(service, catalog)| {
                catalog.permissions.into_iter().map(move |(code, entry)| {
                    (
                        code,
                        PermissionMetadata {
                            id: entry.id,
                            service: service.clone(),
                            bit_value: entry.bit_value,
                        },
                    )
                })
            })
            .collect()
    }
}

/// The permissions and groups of one service
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCatalog {
    /// Permissions keyed by code
    #[serde(default)]
    pub permissions: HashMap<String, CatalogEntry>,

    /// Permission groups keyed by code
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub groups: HashMap<String, GroupCatalogEntry>,
}

/// A permission in the authority's catalog
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogEntry {
    /// The authority's identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// The resource category
    pub category: String,
    /// The action
    pub sub_category: String,
    /// The permission code
    pub code: String,
    /// The sequential position of the permission within its service
    pub bit_value: i64,
    /// Feature flags gating the permission
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub feature_flags: Vec<String>,
}

/// A named group of permissions in the authority's catalog
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupCatalogEntry {
    /// The authority's identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// The resource category
    pub category: String,
    /// The group code
    pub code: String,
    /// The code of the category the group covers
    pub category_code: String,
    /// The combined mask of the group's permissions
    pub bitmask: i64,
    /// The member permissions
    pub permission_ids: Vec<String>,
}
