//! Per-service bitmask permissions
//!
//! Each service owns a set of permissions, and the authority assigns every
//! permission a sequential bit value within its service. A token carries the
//! caller's grants in the `svc_perm` claim as a compact list of 63-bit ranges
//! per service.
//!
//! * [`claims`] decodes that claim and answers "does this caller hold bit N?"
//! * [`catalog`] declares the permissions a service defines and derives their
//!   codes
//! * [`store`] holds the authority's code-to-bit assignments and swaps them
//!   atomically on refresh
//! * [`bootstrap`] and [`roles`] register a service's catalog and role
//!   defaults with the authority at start-up
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use warden_permissions::{Claims, PermissionMetadata, PermissionReference, Store};
//!
//! let store = Store::new();
//! let create = PermissionReference::new("pms", "property", "create");
//!
//! let mut assigned = HashMap::new();
//! assigned.insert(
//!     create.code(),
//!     PermissionMetadata {
//!         id: "p1".to_owned(),
//!         service: "pms".to_owned(),
//!         bit_value: 70,
//!     },
//! );
//! store.replace(assigned);
//!
//! let raw = serde_json::json!({ "sub": "user-1", "svc_perm": "pms:0,3k" });
//! let claims = Claims::from(raw.as_object().unwrap().clone());
//!
//! let meta = store.lookup(&create.code()).unwrap();
//! assert!(claims.has_permission(&meta.service, meta.bit_value));
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

pub mod bootstrap;
pub mod catalog;
pub mod claims;
pub mod dto;
#[cfg(test)]
mod mock;
pub mod roles;
pub mod store;

pub use bootstrap::{
    bootstrap, ensure_permissions, fetch_permission_metadata, http_loader, BootstrapError,
};
pub use catalog::{Catalog, CodeStyle, PermissionDefinition, PermissionReference, PermissionSource};
pub use claims::{Claims, RawClaims, ServicePermissions};
pub use roles::{sync_roles, RoleCatalog, RoleDefinition, RoleSyncError};
pub use store::{
    loader_fn, Loader, PermissionLookup, PermissionMetadata, SharedPermissionLookup, Store,
    StoreError,
};
