//! Default permissions for the authority's native roles
//!
//! A service declares which of its permissions each native role should hold.
//! [`sync_roles`] checks that the roles exist at the authority and assigns
//! the permissions to them.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use warden_traits::{BoxError, JsonClient};

use crate::{bootstrap::endpoint, catalog::PermissionReference};

const ROLES_BULK_PATH: &str = "/api/v1/roles/bulk";
const PERMISSIONS_BY_CODES_PATH: &str = "/api/v1/permissions/by-codes";

/// A role and the permissions it should hold
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleDefinition {
    /// The authority's identifier for the role
    pub role_id: String,

    /// Human-readable name, used in logs
    pub name: String,

    /// The permissions assigned to the role
    pub permissions: Vec<PermissionReference>,
}

impl RoleDefinition {
    /// Constructs a role definition
    pub fn new(
        role_id: impl Into<String>,
        name: impl Into<String>,
        permissions: Vec<PermissionReference>,
    ) -> Self {
        Self {
            role_id: role_id.into(),
            name: name.into(),
            permissions,
        }
    }

    /// The number of permissions assigned to the role
    pub fn permission_count(&self) -> usize {
        self.permissions.len()
    }

    /// Whether the definition names a role
    pub fn is_valid(&self) -> bool {
        !self.role_id.is_empty()
    }
}

/// An ordered collection of role definitions
#[derive(Clone, Debug, Default)]
pub struct RoleCatalog {
    definitions: Vec<RoleDefinition>,
}

impl RoleCatalog {
    /// Builds a catalog from definitions
    pub fn new(definitions: Vec<RoleDefinition>) -> Self {
        Self { definitions }
    }

    /// All definitions, in declaration order
    pub fn definitions(&self) -> &[RoleDefinition] {
        &self.definitions
    }

    /// Finds the first definition for `role_id`
    pub fn get_role_by_id(&self, role_id: &str) -> Option<&RoleDefinition> {
        self.definitions.iter().find(|d| d.role_id == role_id)
    }

    /// The role identifiers, in declaration order
    pub fn get_all_role_ids(&self) -> Vec<&str> {
        self.definitions.iter().map(|d| d.role_id.as_str()).collect()
    }

    /// The number of definitions
    pub fn count(&self) -> usize {
        self.definitions.len()
    }
}

/// An error occurring while synchronizing roles
#[derive(Debug, Error)]
pub enum RoleSyncError {
    /// The authority base URL was empty
    #[error("permission authority endpoint not configured")]
    MissingEndpoint,

    /// The roles could not be fetched from the authority
    #[error("failed to validate roles")]
    ValidateRoles(#[source] BoxError),

    /// Some roles do not exist at the authority
    #[error("roles not found in authority: {}", .0.join(", "))]
    RolesNotFound(Vec<String>),

    /// Assigning permissions to a role failed
    #[error("failed to assign permissions to role {role_id}")]
    AssignPermissions {
        /// The role being updated
        role_id: String,
        /// The cause
        #[source]
        source: BoxError,
    },
}

#[derive(Serialize)]
struct RolesByIdsRequest<'a> {
    role_ids: &'a [&'a str],
}

/// Only the id of an existing role is needed; other fields are ignored
#[derive(Debug, Deserialize)]
struct RoleResponse {
    id: String,
}

#[derive(Serialize)]
struct PermissionsByCodesRequest<'a> {
    codes: &'a [String],
}

#[derive(Deserialize)]
struct PermissionIdResponse {
    id: String,
}

#[derive(Serialize)]
struct AssignPermissionsRequest<'a> {
    permissions: &'a [String],
}

#[derive(Deserialize)]
struct AssignPermissionsResponse {
    #[serde(default)]
    message: String,
}

/// Checks that every defined role exists and assigns its permissions
///
/// Definitions without a role identifier are skipped. Permission codes are
/// the canonical codes of each reference. A role whose permissions cannot be
/// resolved to any identifier is left unchanged.
#[tracing::instrument(skip_all, fields(roles = definitions.len()))]
pub async fn sync_roles<J: JsonClient>(
    definitions: &[RoleDefinition],
    client: &J,
    base_url: &str,
) -> Result<(), RoleSyncError> {
    if definitions.is_empty() {
        tracing::warn!("no role definitions provided; skipping role sync");
        return Ok(());
    }

    let base = endpoint(base_url, "").map_err(|_| RoleSyncError::MissingEndpoint)?;

    let valid: Vec<&RoleDefinition> = definitions
        .iter()
        .filter(|role| {
            if !role.is_valid() {
                tracing::warn!(role.name = %role.name, "skipping role definition without role id");
            }
            role.is_valid()
        })
        .collect();

    let role_ids: Vec<&str> = valid.iter().map(|r| r.role_id.as_str()).collect();
    validate_role_ids(client, &base, &role_ids).await?;

    for role in valid {
        assign_permissions(client, &base, role)
            .await
            .map_err(|source| RoleSyncError::AssignPermissions {
                role_id: role.role_id.clone(),
                source,
            })?;
    }

    tracing::info!("role permissions synchronized");
    Ok(())
}

async fn validate_role_ids<J: JsonClient>(
    client: &J,
    base: &str,
    role_ids: &[&str],
) -> Result<(), RoleSyncError> {
    if role_ids.is_empty() {
        return Ok(());
    }

    let found: Vec<RoleResponse> = client
        .post_json(
            &format!("{base}{ROLES_BULK_PATH}"),
            &RolesByIdsRequest { role_ids },
        )
        .await
        .map_err(|err| RoleSyncError::ValidateRoles(err.into()))?;

    let missing: Vec<String> = role_ids
        .iter()
        .filter(|id| !found.iter().any(|r| r.id == **id))
        .map(|id| (*id).to_owned())
        .collect();

    if !missing.is_empty() {
        return Err(RoleSyncError::RolesNotFound(missing));
    }

    tracing::debug!(roles = role_ids.len(), "roles validated");
    Ok(())
}

async fn assign_permissions<J: JsonClient>(
    client: &J,
    base: &str,
    role: &RoleDefinition,
) -> Result<(), BoxError> {
    if role.permissions.is_empty() {
        tracing::debug!(role.id = %role.role_id, "no permissions to assign");
        return Ok(());
    }

    let codes: Vec<String> = role.permissions.iter().map(|p| p.code()).collect();

    let resolved: Vec<PermissionIdResponse> = client
        .post_json(
            &format!("{base}{PERMISSIONS_BY_CODES_PATH}"),
            &PermissionsByCodesRequest { codes: &codes },
        )
        .await?;

    let ids: Vec<String> = resolved.into_iter().map(|p| p.id).collect();
    if ids.is_empty() {
        tracing::warn!(role.id = %role.role_id, "no permission ids found for role");
        return Ok(());
    }

    let responses: Vec<AssignPermissionsResponse> = client
        .post_json(
            &format!("{base}/api/v1/roles/{}/permissions", role.role_id),
            &AssignPermissionsRequest { permissions: &ids },
        )
        .await?;

    for response in responses.iter().filter(|r| !r.message.is_empty()) {
        tracing::debug!(role.id = %role.role_id, message = %response.message, "authority response");
    }
    tracing::info!(role.id = %role.role_id, permissions = ids.len(), "permissions assigned to role");

    Ok(())
}
