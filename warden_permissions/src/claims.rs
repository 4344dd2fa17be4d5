//! Verified token claims and per-service permission bitmasks
//!
//! Each service's permissions travel in the `svc_perm` claim as one or more
//! base-36 encoded 63-bit ranges:
//!
//! ```text
//! pms:5;crm:1a,3
//! ```
//!
//! A permission is identified by its sequential _bit value_ within a
//! service. Bit value `n` lives in range `n / 63` at position `n % 63`, so
//! that the sign bit of each 64-bit range is never used.
//!
//! A single-range string (`svc:<mask>`) is the legacy form of the claim and
//! decodes as range 0.

use std::{collections::BTreeMap, convert::Infallible, fmt, str::FromStr};

use serde_json::Value;

/// Raw JSON claims of a verified token
pub type RawClaims = serde_json::Map<String, Value>;

/// The claim holding the encoded service permissions
pub const SERVICE_PERMISSIONS_CLAIM: &str = "svc_perm";

/// The claim distinguishing service tokens from user access tokens
pub const TOKEN_USE_CLAIM: &str = "token_use";

/// The `token_use` assumed when a token does not carry one
pub const DEFAULT_TOKEN_USE: &str = "access";

const SERVICE_TOKEN_USE: &str = "service";

/// The number of usable bits in each range
pub const BITS_PER_RANGE: i64 = 63;

/// The most ranges [`ServicePermissions::grant`] will grow a service to
pub const MAX_GRANT_RANGES: usize = 1024;

/// Decoded per-service permission ranges
///
/// Service keys are stored lower-cased and trimmed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServicePermissions(BTreeMap<String, Vec<i64>>);

impl ServicePermissions {
    /// An empty permission set
    pub const fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Decodes the `svc_perm` wire format
    ///
    /// Decoding is permissive: malformed entries and ranges are skipped
    /// rather than failing the whole claim. A service is kept only when at
    /// least one of its ranges parsed. A later entry for the same service
    /// replaces an earlier one.
    pub fn decode(raw: &str) -> Self {
        let mut services = BTreeMap::new();

        for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let Some((service, ranges)) = entry.split_once(':') else {
                continue;
            };

            let service = normalize_service(service);
            if service.is_empty() {
                continue;
            }

            let ranges: Vec<i64> = ranges
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .filter_map(|r| i64::from_str_radix(r, 36).ok())
                .collect();

            if !ranges.is_empty() {
                services.insert(service, ranges);
            }
        }

        Self(services)
    }

    /// Renders the canonical wire form
    ///
    /// Services appear in key order and ranges in lower-case base 36.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Sets the ranges for a service, replacing any existing ranges
    pub fn insert(&mut self, service: &str, ranges: Vec<i64>) {
        self.0.insert(normalize_service(service), ranges);
    }

    /// Grants bit value `bit_value` for `service`, growing the ranges as needed
    ///
    /// Returns `false` without changing anything when the bit value is
    /// negative or would need more than [`MAX_GRANT_RANGES`] ranges.
    pub fn grant(&mut self, service: &str, bit_value: i64) -> bool {
        if bit_value < 0 {
            return false;
        }

        let (index, mask) = locate(bit_value);
        if index >= MAX_GRANT_RANGES {
            return false;
        }

        let ranges = self.0.entry(normalize_service(service)).or_default();
        if ranges.len() <= index {
            ranges.resize(index + 1, 0);
        }
        ranges[index] |= mask;
        true
    }

    /// The ranges held for `service`
    pub fn ranges(&self, service: &str) -> Option<&[i64]> {
        self.0.get(&normalize_service(service)).map(Vec::as_slice)
    }

    /// Checks whether bit value `bit_value` is set for `service`
    ///
    /// Negative bit values, unknown services, and bit values beyond the last
    /// range are never granted. Bit value `0` is a valid position.
    pub fn has_bit(&self, service: &str, bit_value: i64) -> bool {
        if bit_value < 0 {
            return false;
        }

        let Some(ranges) = self.0.get(&normalize_service(service)) else {
            return false;
        };

        let (index, mask) = locate(bit_value);
        ranges.get(index).map_or(false, |range| range & mask == mask)
    }

    /// Iterates over services and their ranges in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[i64])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// The number of services with permissions
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no service has any permissions
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[inline]
fn locate(bit_value: i64) -> (usize, i64) {
    let index = (bit_value / BITS_PER_RANGE) as usize;
    let mask = 1_i64 << (bit_value % BITS_PER_RANGE);
    (index, mask)
}

fn normalize_service(service: &str) -> String {
    service.trim().to_lowercase()
}

impl fmt::Display for ServicePermissions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, (service, ranges)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            f.write_str(service)?;
            f.write_str(":")?;
            for (j, range) in ranges.iter().enumerate() {
                if j > 0 {
                    f.write_str(",")?;
                }
                f.write_str(&to_base36(*range))?;
            }
        }
        Ok(())
    }
}

impl FromStr for ServicePermissions {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::decode(s))
    }
}

fn to_base36(value: i64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    let mut n = value.unsigned_abs();
    let mut digits = Vec::with_capacity(13);
    loop {
        digits.push(DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }

    let sign = if value < 0 { "-" } else { "" };
    sign.chars()
        .chain(digits.iter().rev().map(|&d| char::from(d)))
        .collect()
}

/// The claims of a verified token
///
/// Built once per request from the verified JSON payload and never modified.
#[derive(Clone, Debug, PartialEq)]
pub struct Claims {
    subject: String,
    identity_id: String,
    role_id: String,
    token_use: String,
    service_permissions: ServicePermissions,
    raw: RawClaims,
}

impl Claims {
    /// Materializes claims from a verified JSON payload
    ///
    /// `sub`, `identity_id`, and `role_id` are trimmed; when missing they are
    /// empty. A missing or blank `token_use` is treated as `access`.
    pub fn from_raw(raw: RawClaims) -> Self {
        let token_use = match string_claim(&raw, TOKEN_USE_CLAIM) {
            use_ if use_.is_empty() => DEFAULT_TOKEN_USE.to_owned(),
            use_ => use_,
        };

        let service_permissions = match raw.get(SERVICE_PERMISSIONS_CLAIM) {
            None | Some(Value::Null) => ServicePermissions::empty(),
            Some(Value::String(encoded)) => ServicePermissions::decode(encoded),
            Some(other) => ServicePermissions::decode(&other.to_string()),
        };

        Self {
            subject: string_claim(&raw, "sub"),
            identity_id: string_claim(&raw, "identity_id"),
            role_id: string_claim(&raw, "role_id"),
            token_use,
            service_permissions,
            raw,
        }
    }

    /// The token subject
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The identity the token was issued for
    pub fn identity_id(&self) -> &str {
        &self.identity_id
    }

    /// The role of the caller
    pub fn role_id(&self) -> &str {
        &self.role_id
    }

    /// The token use, `access` unless the token says otherwise
    pub fn token_use(&self) -> &str {
        &self.token_use
    }

    /// The decoded per-service permissions
    pub fn service_permissions(&self) -> &ServicePermissions {
        &self.service_permissions
    }

    /// The full verified payload
    pub fn raw(&self) -> &RawClaims {
        &self.raw
    }

    /// Gets an arbitrary claim from the payload
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.raw.get(name)
    }

    /// Whether the token was issued to a service rather than a user
    ///
    /// Service tokens bypass per-permission bit checks.
    pub fn is_service_token(&self) -> bool {
        self.token_use.trim().eq_ignore_ascii_case(SERVICE_TOKEN_USE)
    }

    /// Checks whether the caller holds bit value `bit_value` for `service`
    pub fn has_permission(&self, service: &str, bit_value: i64) -> bool {
        self.service_permissions.has_bit(service, bit_value)
    }

    /// The OAuth2 scopes granted to the token
    ///
    /// Read from the space-separated `scope` claim, or else from an `scp`
    /// array. Non-string array entries are skipped.
    pub fn scopes(&self) -> Vec<&str> {
        match self.raw.get("scope") {
            Some(Value::String(scope)) => scope.split_whitespace().collect(),
            _ => strings(self.raw.get("scp")).collect(),
        }
    }

    /// Whether the token was granted `scope`
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes().contains(&scope)
    }

    /// The roles listed in the top-level `roles` claim
    pub fn roles(&self) -> Vec<&str> {
        strings(self.raw.get("roles")).collect()
    }

    /// Realm and client roles from Keycloak's `realm_access` and
    /// `resource_access` claims, realm roles first
    pub fn keycloak_roles(&self) -> Vec<&str> {
        let realm = strings(self.realm_access().and_then(|r| r.get("roles")));
        let clients = self
            .resource_access()
            .into_iter()
            .flat_map(|clients| clients.values())
            .flat_map(|client| strings(client.get("roles")));

        realm.chain(clients).collect()
    }

    /// Whether Keycloak granted the realm role `role`
    pub fn has_realm_role(&self, role: &str) -> bool {
        strings(self.realm_access().and_then(|r| r.get("roles"))).any(|r| r == role)
    }

    /// Whether Keycloak granted the role `role` on client `client_id`
    pub fn has_client_role(&self, client_id: &str, role: &str) -> bool {
        let roles = self
            .resource_access()
            .and_then(|clients| clients.get(client_id))
            .and_then(|client| client.get("roles"));
        strings(roles).any(|r| r == role)
    }

    fn realm_access(&self) -> Option<&RawClaims> {
        self.raw.get("realm_access").and_then(Value::as_object)
    }

    fn resource_access(&self) -> Option<&RawClaims> {
        self.raw.get("resource_access").and_then(Value::as_object)
    }

    /// Checks a raw power-of-two mask against the first range of `service`
    ///
    /// A zero mask never matches.
    #[deprecated(note = "permissions are identified by bit value; use `has_permission`")]
    pub fn has_legacy_mask(&self, service: &str, mask: i64) -> bool {
        if mask == 0 {
            return false;
        }

        self.service_permissions
            .ranges(service)
            .and_then(|ranges| ranges.first())
            .map_or(false, |range0| range0 & mask == mask)
    }
}

impl From<RawClaims> for Claims {
    fn from(raw: RawClaims) -> Self {
        Self::from_raw(raw)
    }
}

fn strings(value: Option<&Value>) -> impl Iterator<Item = &str> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

fn string_claim(raw: &RawClaims, name: &str) -> String {
    match raw.get(name) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_owned(),
        Some(other) => other.to_string().trim().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn claims(value: Value) -> Claims {
        match value {
            Value::Object(map) => Claims::from_raw(map),
            _ => panic!("claims must be an object"),
        }
    }

    mod decoding {
        use super::*;

        #[test]
        fn single_range_holds_positions_zero_through_sixty_two() {
            let perms = ServicePermissions::decode("pms:5");

            assert!(perms.has_bit("pms", 0));
            assert!(!perms.has_bit("pms", 1));
            assert!(perms.has_bit("pms", 2));
            assert!(!perms.has_bit("pms", 63));
        }

        #[test]
        fn later_ranges_hold_higher_positions() {
            let perms = ServicePermissions::decode("pms:1,1");

            assert!(perms.has_bit("pms", 0));
            assert!(perms.has_bit("pms", 63));
            assert!(!perms.has_bit("pms", 64));
            assert!(!perms.has_bit("pms", 126));
        }

        #[test]
        fn highest_position_in_a_range_is_usable() {
            let perms = ServicePermissions::decode(&format!("pms:{}", to_base36(1 << 62)));

            assert!(perms.has_bit("pms", 62));
            assert!(!perms.has_bit("pms", 61));
        }

        #[test]
        fn negative_bit_values_are_never_granted() {
            let perms = ServicePermissions::decode("pms:-1");

            assert!(!perms.has_bit("pms", -1));
            assert!(!perms.has_bit("pms", i64::MIN));
            assert!(perms.has_bit("pms", 5));
        }

        #[test]
        fn service_keys_are_case_and_whitespace_insensitive() {
            let perms = ServicePermissions::decode("  PMS : 5 ; Crm:A");

            assert_eq!(perms.ranges("pms"), Some(&[5][..]));
            assert_eq!(perms.ranges(" CRM "), Some(&[10][..]));
            assert!(perms.has_bit("Pms", 2));
        }

        #[test]
        fn malformed_entries_and_ranges_are_skipped() {
            let perms = ServicePermissions::decode("pms:zz!,5;bad;:7;crm:;;hr: , ,");

            assert_eq!(perms.len(), 1);
            assert_eq!(perms.ranges("pms"), Some(&[5][..]));
            assert_eq!(perms.ranges("crm"), None);
            assert_eq!(perms.ranges("hr"), None);
        }

        #[test]
        fn later_duplicates_replace_earlier_entries() {
            let perms = ServicePermissions::decode("pms:1;PMS:2");

            assert_eq!(perms.ranges("pms"), Some(&[2][..]));
        }

        #[test]
        fn unknown_service_is_never_granted() {
            let perms = ServicePermissions::decode("pms:7");

            assert!(!perms.has_bit("crm", 0));
            assert!(!ServicePermissions::empty().has_bit("pms", 0));
        }
    }

    mod encoding {
        use super::*;

        #[test]
        fn renders_sorted_lowercase_base36() {
            let mut perms = ServicePermissions::empty();
            perms.insert("PMS", vec![35, 36]);
            perms.insert("crm", vec![-10]);

            assert_eq!(perms.encode(), "crm:-a;pms:z,10");
        }

        #[test]
        fn decoding_the_encoding_preserves_ranges() {
            let original = ServicePermissions::decode(&format!(
                "pms:{},0,1b;crm:{}",
                to_base36(i64::MAX),
                to_base36(i64::MIN + 1)
            ));

            let reparsed = ServicePermissions::decode(&original.encode());

            assert_eq!(reparsed, original);
        }

        #[test]
        fn grant_sets_positions_across_ranges() {
            let mut perms = ServicePermissions::empty();
            assert!(perms.grant("pms", 0));
            assert!(perms.grant("pms", 2));
            assert!(perms.grant("pms", 64));
            assert!(!perms.grant("pms", -3));

            assert_eq!(perms.ranges("pms"), Some(&[5, 2][..]));
            assert_eq!(perms.encode(), "pms:5,2");
        }

        #[test]
        fn grant_refuses_bits_beyond_the_range_limit() {
            let mut perms = ServicePermissions::empty();

            assert!(!perms.grant("pms", i64::MAX));
            assert!(!perms.grant("pms", MAX_GRANT_RANGES as i64 * BITS_PER_RANGE));
            assert_eq!(perms.ranges("pms"), None);

            let last = MAX_GRANT_RANGES as i64 * BITS_PER_RANGE - 1;
            assert!(perms.grant("pms", last));
            assert_eq!(perms.ranges("pms").map(<[i64]>::len), Some(MAX_GRANT_RANGES));
            assert!(perms.has_bit("pms", last));
        }
    }

    mod materialization {
        use super::*;

        #[test]
        fn reads_identity_fields_trimmed() {
            let claims = claims(json!({
                "sub": "  user-1 ",
                "identity_id": "id-9",
                "role_id": 42,
                "svc_perm": "pms:5",
            }));

            assert_eq!(claims.subject(), "user-1");
            assert_eq!(claims.identity_id(), "id-9");
            assert_eq!(claims.role_id(), "42");
            assert!(claims.has_permission("PMS", 2));
        }

        #[test]
        fn missing_fields_are_empty() {
            let claims = claims(json!({}));

            assert_eq!(claims.subject(), "");
            assert_eq!(claims.role_id(), "");
            assert_eq!(claims.token_use(), "access");
            assert!(claims.service_permissions().is_empty());
            assert!(!claims.is_service_token());
        }

        #[test]
        fn recognizes_service_tokens_case_insensitively() {
            assert!(claims(json!({ "token_use": " Service " })).is_service_token());
            assert!(claims(json!({ "token_use": "SERVICE" })).is_service_token());
            assert!(!claims(json!({ "token_use": "services" })).is_service_token());
            assert!(!claims(json!({ "token_use": "access" })).is_service_token());
        }

        #[test]
        fn blank_token_use_defaults_to_access() {
            assert_eq!(claims(json!({ "token_use": "  " })).token_use(), "access");
        }

        #[test]
        fn keeps_raw_payload() {
            let claims = claims(json!({ "tenant": "acme" }));

            assert_eq!(claims.claim("tenant"), Some(&json!("acme")));
            assert_eq!(claims.raw().len(), 1);
        }
    }

    mod legacy_mask {
        #![allow(deprecated)]

        use super::*;

        #[test]
        fn checks_raw_mask_against_first_range() {
            let claims = claims(json!({ "svc_perm": "pms:6,1" }));

            assert!(claims.has_legacy_mask("pms", 2));
            assert!(claims.has_legacy_mask("pms", 6));
            assert!(!claims.has_legacy_mask("pms", 1));
            assert!(!claims.has_legacy_mask("pms", 0));
            assert!(!claims.has_legacy_mask("crm", 2));
        }
    }

    mod scopes_and_roles {
        use super::*;

        #[test]
        fn scope_string_wins_over_scp_array() {
            let claims = claims(json!({
                "scope": " users:read  users:write ",
                "scp": ["ignored"],
            }));

            assert_eq!(claims.scopes(), ["users:read", "users:write"]);
            assert!(claims.has_scope("users:write"));
            assert!(!claims.has_scope("ignored"));
        }

        #[test]
        fn scp_array_skips_non_strings() {
            assert_eq!(claims(json!({ "scp": ["users:read", 7, null] })).scopes(), ["users:read"]);
            assert!(claims(json!({})).scopes().is_empty());
        }

        #[test]
        fn top_level_roles() {
            let granted = claims(json!({ "roles": ["admin", false, "auditor"] }));

            assert_eq!(granted.roles(), ["admin", "auditor"]);
            assert!(claims(json!({ "roles": "admin" })).roles().is_empty());
        }

        #[test]
        fn keycloak_realm_and_client_roles() {
            let claims = claims(json!({
                "realm_access": { "roles": ["offline_access", "admin"] },
                "resource_access": {
                    "billing": { "roles": ["invoice-reader"] },
                    "users": { "roles": ["user-manager", 3] },
                    "broken": "not an object",
                },
            }));

            let mut roles = claims.keycloak_roles();
            assert_eq!(roles[..2], ["offline_access", "admin"]);
            roles.sort_unstable();
            assert_eq!(
                roles,
                ["admin", "invoice-reader", "offline_access", "user-manager"]
            );

            assert!(claims.has_realm_role("admin"));
            assert!(!claims.has_realm_role("invoice-reader"));
            assert!(claims.has_client_role("billing", "invoice-reader"));
            assert!(!claims.has_client_role("users", "invoice-reader"));
            assert!(!claims.has_client_role("broken", "anything"));
        }
    }
}
