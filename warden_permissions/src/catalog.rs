//! Static permission definitions and permission codes
//!
//! A permission is named by a `(service, category, action)` triple. Its
//! _code_ is derived from that triple and is the key shared with the
//! permission authority.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Generates the canonical permission code
///
/// Each part is trimmed, stripped of spaces, and lower-cased, then the parts
/// are joined with `-`.
///
/// ```
/// # use warden_permissions::catalog::generate_code;
/// assert_eq!(generate_code(" Users ", "Admin Users", "CREATE"), "users-adminusers-create");
/// ```
pub fn generate_code(service: &str, category: &str, action: &str) -> String {
    format!(
        "{}-{}-{}",
        normalize(service),
        normalize(category),
        normalize(action)
    )
}

/// Generates the abbreviated legacy permission code
///
/// Each normalized part is cut to its first three characters and
/// upper-cased.
///
/// ```
/// # use warden_permissions::catalog::generate_abbreviated_code;
/// assert_eq!(generate_abbreviated_code("pms", "property", "create"), "PMS-PRO-CRE");
/// ```
pub fn generate_abbreviated_code(service: &str, category: &str, action: &str) -> String {
    format!(
        "{}-{}-{}",
        abbreviate(service),
        abbreviate(category),
        abbreviate(action)
    )
}

fn normalize(part: &str) -> String {
    part.trim().replace(' ', "").to_lowercase()
}

fn abbreviate(part: &str) -> String {
    normalize(part).chars().take(3).collect::<String>().to_uppercase()
}

/// The style used to derive codes from references
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CodeStyle {
    /// `service-category-action`, normalized
    #[default]
    Hyphenated,

    /// `SER-CAT-ACT`, from the first three characters of each part
    Abbreviated,
}

impl CodeStyle {
    /// Generates a code in this style
    pub fn generate(self, service: &str, category: &str, action: &str) -> String {
        match self {
            Self::Hyphenated => generate_code(service, category, action),
            Self::Abbreviated => generate_abbreviated_code(service, category, action),
        }
    }
}

/// Identifies a permission within a service
///
/// On the wire, the action travels in the `sub_category` field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionReference {
    /// The owning service
    pub service: String,

    /// The resource category
    pub category: String,

    /// The action performed on the category
    #[serde(rename = "sub_category")]
    pub action: String,
}

impl PermissionReference {
    /// Constructs a reference
    pub fn new(
        service: impl Into<String>,
        category: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            category: category.into(),
            action: action.into(),
        }
    }

    /// The canonical code for this reference
    pub fn code(&self) -> String {
        self.code_with(CodeStyle::Hyphenated)
    }

    /// The code for this reference in the given style
    pub fn code_with(&self, style: CodeStyle) -> String {
        style.generate(&self.service, &self.category, &self.action)
    }
}

/// A permission a service declares at start-up
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDefinition {
    /// What the permission grants
    pub reference: PermissionReference,

    /// Human-readable name
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// Feature flags gating the permission at the authority
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feature_flags: Vec<String>,
}

impl PermissionDefinition {
    /// Constructs a definition without feature flags
    pub fn new(
        reference: PermissionReference,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            reference,
            name: name.into(),
            description: description.into(),
            feature_flags: Vec::new(),
        }
    }

    /// Sets the feature flags
    pub fn with_feature_flags<I, S>(self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            feature_flags: flags.into_iter().map(Into::into).collect(),
            ..self
        }
    }
}

/// Any application type that describes a permission
///
/// Lets a catalog be built straight from an application's own permission
/// table.
pub trait PermissionSource {
    /// Human-readable name
    fn name(&self) -> &str;
    /// Human-readable description
    fn description(&self) -> &str;
    /// The owning service
    fn service(&self) -> &str;
    /// The resource category
    fn category(&self) -> &str;
    /// The action performed on the category
    fn action(&self) -> &str;
}

impl<T: PermissionSource + ?Sized> PermissionSource for &'_ T {
    fn name(&self) -> &str {
        T::name(self)
    }

    fn description(&self) -> &str {
        T::description(self)
    }

    fn service(&self) -> &str {
        T::service(self)
    }

    fn category(&self) -> &str {
        T::category(self)
    }

    fn action(&self) -> &str {
        T::action(self)
    }
}

fn definition_from_source<T: PermissionSource>(source: &T) -> PermissionDefinition {
    PermissionDefinition::new(
        PermissionReference::new(source.service(), source.category(), source.action()),
        source.name(),
        source.description(),
    )
}

/// An immutable, indexed collection of permission definitions
///
/// When two definitions share a name or a code, lookups return the later one.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    definitions: Vec<PermissionDefinition>,
    codes: Vec<String>,
    by_name: HashMap<String, usize>,
    by_code: HashMap<String, usize>,
    style: CodeStyle,
}

impl Catalog {
    /// Builds a catalog keyed by canonical codes
    pub fn new(definitions: Vec<PermissionDefinition>) -> Self {
        Self::with_code_style(definitions, CodeStyle::Hyphenated)
    }

    /// Builds a catalog keyed by codes in the given style
    pub fn with_code_style(definitions: Vec<PermissionDefinition>, style: CodeStyle) -> Self {
        let codes: Vec<String> = definitions
            .iter()
            .map(|d| d.reference.code_with(style))
            .collect();

        let mut by_name = HashMap::with_capacity(definitions.len());
        let mut by_code = HashMap::with_capacity(definitions.len());
        for (idx, (definition, code)) in definitions.iter().zip(&codes).enumerate() {
            by_name.insert(definition.name.clone(), idx);
            by_code.insert(code.clone(), idx);
        }

        Self {
            definitions,
            codes,
            by_name,
            by_code,
            style,
        }
    }

    /// Builds a catalog from definitions
    pub fn from_definitions<I: IntoIterator<Item = PermissionDefinition>>(definitions: I) -> Self {
        Self::new(definitions.into_iter().collect())
    }

    /// Builds a catalog from application permission types, in iteration order
    pub fn from_sources<I>(sources: I) -> Self
    where
        I: IntoIterator,
        I::Item: PermissionSource,
    {
        Self::new(
            sources
                .into_iter()
                .map(|s| definition_from_source(&s))
                .collect(),
        )
    }

    /// Builds a catalog from a keyed table of application permission types
    ///
    /// Definitions are ordered by key so that the result does not depend on
    /// the map's iteration order.
    pub fn from_source_map<K, T, I>(sources: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Ord,
        T: PermissionSource,
    {
        let mut entries: Vec<(K, T)> = sources.into_iter().collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        Self::new(
            entries
                .iter()
                .map(|(_, s)| definition_from_source(s))
                .collect(),
        )
    }

    /// All definitions, in declaration order
    pub fn all(&self) -> &[PermissionDefinition] {
        &self.definitions
    }

    /// Finds a definition by its name
    pub fn by_name(&self, name: &str) -> Option<&PermissionDefinition> {
        self.by_name.get(name).map(|&idx| &self.definitions[idx])
    }

    /// Finds a definition by its code
    pub fn by_code(&self, code: &str) -> Option<&PermissionDefinition> {
        self.by_code.get(code).map(|&idx| &self.definitions[idx])
    }

    /// The code of every definition, in declaration order
    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    /// The number of definitions
    pub fn count(&self) -> usize {
        self.definitions.len()
    }

    /// The style used for this catalog's codes
    pub fn code_style(&self) -> CodeStyle {
        self.style
    }

    /// The code for `reference` in this catalog's style
    pub fn code_for(&self, reference: &PermissionReference) -> String {
        reference.code_with(self.style)
    }
}

impl FromIterator<PermissionDefinition> for Catalog {
    fn from_iter<I: IntoIterator<Item = PermissionDefinition>>(iter: I) -> Self {
        Self::from_definitions(iter)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn definition(service: &str, category: &str, action: &str, name: &str) -> PermissionDefinition {
        PermissionDefinition::new(
            PermissionReference::new(service, category, action),
            name,
            format!("Allows {action} on {category}"),
        )
    }

    mod codes {
        use super::*;

        #[test]
        fn canonical_code_ignores_case_and_whitespace() {
            assert_eq!(generate_code("USR", " Users ", "Create"), "usr-users-create");
            assert_eq!(
                generate_code("usr", "user groups", "create"),
                generate_code(" USR ", "User Groups", "CREATE ")
            );
        }

        #[test]
        fn abbreviated_code_takes_three_characters() {
            assert_eq!(
                generate_abbreviated_code("pms", "property", "create"),
                "PMS-PRO-CRE"
            );
            assert_eq!(generate_abbreviated_code("hr", "leave type", "x"), "HR-LEA-X");
        }

        #[test]
        fn reference_code_uses_requested_style() {
            let reference = PermissionReference::new("pms", "property", "create");

            assert_eq!(reference.code(), "pms-property-create");
            assert_eq!(reference.code_with(CodeStyle::Abbreviated), "PMS-PRO-CRE");
        }

        #[test]
        fn reference_serializes_action_as_sub_category() {
            let reference = PermissionReference::new("pms", "property", "create");

            let json = serde_json::to_value(&reference).unwrap();

            assert_eq!(
                json,
                serde_json::json!({
                    "service": "pms",
                    "category": "property",
                    "sub_category": "create",
                })
            );
        }
    }

    mod catalog {
        use super::*;

        #[test]
        fn indexes_by_name_and_code() {
            let catalog = Catalog::new(vec![
                definition("pms", "property", "create", "Create property"),
                definition("pms", "property", "delete", "Delete property"),
            ]);

            assert_eq!(catalog.count(), 2);
            assert_eq!(catalog.codes(), ["pms-property-create", "pms-property-delete"]);
            assert_eq!(
                catalog.by_code("pms-property-delete").map(|d| d.name.as_str()),
                Some("Delete property")
            );
            assert_eq!(
                catalog
                    .by_name("Create property")
                    .map(|d| d.reference.action.as_str()),
                Some("create")
            );
            assert!(catalog.by_code("PMS-PRO-CRE").is_none());
        }

        #[test]
        fn abbreviated_catalog_uses_legacy_codes() {
            let catalog = Catalog::with_code_style(
                vec![definition("pms", "property", "create", "Create property")],
                CodeStyle::Abbreviated,
            );

            assert_eq!(catalog.code_style(), CodeStyle::Abbreviated);
            assert_eq!(catalog.codes(), ["PMS-PRO-CRE"]);
            assert!(catalog.by_code("PMS-PRO-CRE").is_some());
            assert_eq!(
                catalog.code_for(&PermissionReference::new("pms", "property", "read")),
                "PMS-PRO-REA"
            );
        }

        #[test]
        fn later_duplicates_win_lookups() {
            let catalog = Catalog::new(vec![
                definition("pms", "property", "create", "first"),
                definition("pms", "property", "create", "second"),
            ]);

            assert_eq!(catalog.count(), 2);
            assert_eq!(
                catalog.by_code("pms-property-create").map(|d| d.name.as_str()),
                Some("second")
            );
        }

        #[test]
        fn empty_catalog_has_no_codes() {
            let catalog = Catalog::default();

            assert_eq!(catalog.count(), 0);
            assert!(catalog.codes().is_empty());
            assert!(catalog.all().is_empty());
        }
    }

    mod sources {
        use super::*;

        struct AppPermission {
            name: &'static str,
            service: &'static str,
            category: &'static str,
            action: &'static str,
        }

        impl PermissionSource for AppPermission {
            fn name(&self) -> &str {
                self.name
            }

            fn description(&self) -> &str {
                "application permission"
            }

            fn service(&self) -> &str {
                self.service
            }

            fn category(&self) -> &str {
                self.category
            }

            fn action(&self) -> &str {
                self.action
            }
        }

        const CREATE: AppPermission = AppPermission {
            name: "Create user",
            service: "usr",
            category: "users",
            action: "create",
        };

        const LIST: AppPermission = AppPermission {
            name: "List users",
            service: "usr",
            category: "users",
            action: "list",
        };

        #[test]
        fn converts_sources_in_order() {
            let catalog = Catalog::from_sources([&LIST, &CREATE]);

            assert_eq!(catalog.codes(), ["usr-users-list", "usr-users-create"]);
            assert_eq!(
                catalog.by_name("Create user").map(|d| d.description.as_str()),
                Some("application permission")
            );
        }

        #[test]
        fn converts_source_map_in_key_order() {
            let mut table = HashMap::new();
            table.insert("b_list", LIST);
            table.insert("a_create", CREATE);

            let catalog = Catalog::from_source_map(table);

            assert_eq!(catalog.codes(), ["usr-users-create", "usr-users-list"]);
        }
    }
}
