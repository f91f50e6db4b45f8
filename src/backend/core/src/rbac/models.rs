//! RBAC data models: the backoffice permission catalogue and caller grants.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Grant string that covers every permission.
pub const WILDCARD: &str = "*";

// ═══════════════════════════════════════════════════════════════════════════════
// Permission
// ═══════════════════════════════════════════════════════════════════════════════

/// A permission an operation can require, written `"resource:action"` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Permission {
    ReadRoles,
    AddRoles,
    EditRoles,
    DeleteRoles,
    ReadPermissions,
    AddPermissions,
    EditPermissions,
    DeletePermissions,
}

impl Permission {
    pub const ALL: [Permission; 8] = [
        Permission::ReadRoles,
        Permission::AddRoles,
        Permission::EditRoles,
        Permission::DeleteRoles,
        Permission::ReadPermissions,
        Permission::AddPermissions,
        Permission::EditPermissions,
        Permission::DeletePermissions,
    ];

    /// Canonical string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadRoles => "roles:read",
            Self::AddRoles => "roles:add",
            Self::EditRoles => "roles:edit",
            Self::DeleteRoles => "roles:delete",
            Self::ReadPermissions => "permissions:read",
            Self::AddPermissions => "permissions:add",
            Self::EditPermissions => "permissions:edit",
            Self::DeletePermissions => "permissions:delete",
        }
    }

    /// The resource half of the string form.
    pub fn resource(&self) -> &'static str {
        self.as_str().split_once(':').map(|(resource, _)| resource).unwrap_or_default()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown permission string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission: {0}")]
pub struct UnknownPermission(pub String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|permission| permission.as_str() == s)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

impl TryFrom<String> for Permission {
    type Error = UnknownPermission;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Permission> for String {
    fn from(permission: Permission) -> Self {
        permission.as_str().to_string()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Permission Set
// ═══════════════════════════════════════════════════════════════════════════════

/// The grants a caller holds, as carried in a token.
///
/// Grants are kept as raw strings so tokens minted with permissions this
/// build does not know about still round-trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeSet<String>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding only the wildcard.
    pub fn everything() -> Self {
        std::iter::once(WILDCARD.to_string()).collect()
    }

    pub fn insert(&mut self, grant: impl Into<String>) {
        self.0.insert(grant.into());
    }

    /// Whether `permission` is held directly or through a wildcard.
    pub fn grants(&self, permission: Permission) -> bool {
        self.0.contains(WILDCARD)
            || self.0.contains(permission.as_str())
            || self.0.contains(&format!("{}:{}", permission.resource(), WILDCARD))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<String>> for PermissionSet {
    fn from(grants: Vec<String>) -> Self {
        grants.into_iter().collect()
    }
}
