//! Storage contracts for resources and many-to-many associations.
//!
//! Handlers only ever see [`ResourceStore`] and [`AssociationStore`]; the
//! memory and Postgres backends implement both against the same observable
//! contract, including unique and foreign-key constraint reporting.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::{MemoryAssociationStore, MemoryDatabase, MemoryResourceStore};
pub use postgres::{PgAssociationStore, PgResourceStore};

/// Writable column values keyed by column name.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Result type for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// ═══════════════════════════════════════════════════════════════════════════════
// Records
// ═══════════════════════════════════════════════════════════════════════════════

/// A stored resource row.
///
/// `id` and the timestamps are managed by the store; everything else lives in
/// `fields` and is flattened into the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: Uuid,

    #[serde(flatten)]
    pub fields: Fields,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Set by an archive; such records are hidden from normal reads.
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Field value by column name.
    pub fn get(&self, column: &str) -> Option<&serde_json::Value> {
        self.fields.get(column)
    }
}

/// All visible records of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPage {
    pub records: Vec<Record>,
    pub total_records: usize,
}

impl RecordPage {
    pub fn new(records: Vec<Record>) -> Self {
        let total_records = records.len();
        Self {
            records,
            total_records,
        }
    }
}

/// How a delete is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    /// Remove the row; associations referencing it cascade.
    Hard,
    /// Stamp `deleted_at` and keep the row for audit.
    Soft,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Table Descriptions
// ═══════════════════════════════════════════════════════════════════════════════

/// Static description of a resource table.
#[derive(Debug, Clone, Copy)]
pub struct ResourceSpec {
    /// Singular name used in logs
    pub name: &'static str,
    pub table: &'static str,
    /// Columns callers may write. Anything else in a payload is ignored.
    pub columns: &'static [&'static str],
    /// Columns unique among non-deleted rows.
    pub unique: &'static [&'static str],
}

impl ResourceSpec {
    /// Keep only writable columns.
    pub fn writable(&self, data: Fields) -> Fields {
        data.into_iter()
            .filter(|(column, _)| self.columns.contains(&column.as_str()))
            .collect()
    }
}

/// Static description of a join table between two resource tables.
#[derive(Debug, Clone, Copy)]
pub struct AssociationSpec {
    pub table: &'static str,
    pub owner_table: &'static str,
    pub owner_column: &'static str,
    pub member_table: &'static str,
    pub member_column: &'static str,
}

impl AssociationSpec {
    pub fn pair_constraint(&self) -> String {
        format!("{}_pkey", self.table)
    }

    pub fn owner_constraint(&self) -> String {
        format!("{}_{}_fkey", self.table, self.owner_column)
    }

    pub fn member_constraint(&self) -> String {
        format!("{}_{}_fkey", self.table, self.member_column)
    }
}

pub const ROLES: ResourceSpec = ResourceSpec {
    name: "role",
    table: "roles",
    columns: &["name"],
    unique: &["name"],
};

pub const PERMISSIONS: ResourceSpec = ResourceSpec {
    name: "permission",
    table: "permissions",
    columns: &["name"],
    unique: &["name"],
};

pub const ROLE_PERMISSIONS: AssociationSpec = AssociationSpec {
    table: "roles_permissions",
    owner_table: "roles",
    owner_column: "role_id",
    member_table: "permissions",
    member_column: "permission_id",
};

// ═══════════════════════════════════════════════════════════════════════════════
// Contracts
// ═══════════════════════════════════════════════════════════════════════════════

/// CRUD access to one resource table.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    fn spec(&self) -> &ResourceSpec;

    /// Every non-deleted record, oldest first.
    async fn find_all(&self) -> StoreResult<RecordPage>;

    /// A non-deleted record by id.
    async fn find_one(&self, id: Uuid) -> StoreResult<Option<Record>>;

    /// A record by id whether or not it has been archived.
    async fn lookup(&self, id: Uuid) -> StoreResult<Option<Record>>;

    async fn create(&self, data: Fields) -> StoreResult<Record>;

    /// Apply the present columns to a non-deleted record.
    async fn update(&self, id: Uuid, data: Fields) -> StoreResult<Option<Record>>;

    /// Returns the record as it was removed or archived. Archiving an
    /// already archived record finds nothing.
    async fn delete(&self, id: Uuid, mode: Deletion) -> StoreResult<Option<Record>>;
}

/// Membership of a many-to-many join. Every call returns the owner's members
/// after the operation.
#[async_trait]
pub trait AssociationStore: Send + Sync {
    fn spec(&self) -> &AssociationSpec;

    async fn list(&self, owner: Uuid) -> StoreResult<Vec<Record>>;

    /// Insert every `(owner, member)` pair. An existing pair or an unknown id
    /// fails the call with a constraint violation.
    async fn add(&self, owner: Uuid, members: &[Uuid]) -> StoreResult<Vec<Record>>;

    /// Delete exactly the named pairs; missing pairs are ignored.
    async fn remove(&self, owner: Uuid, members: &[Uuid]) -> StoreResult<Vec<Record>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Constraint families the handlers know how to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
}

impl ConstraintKind {
    /// Map a Postgres SQLSTATE.
    pub fn from_sqlstate(code: &str) -> Option<Self> {
        match code {
            "23505" => Some(Self::Unique),
            "23503" => Some(Self::ForeignKey),
            _ => None,
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unique => write!(f, "unique"),
            Self::ForeignKey => write!(f, "foreign key"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} constraint \"{constraint}\" violated: {message}")]
    Constraint {
        kind: ConstraintKind,
        constraint: String,
        message: String,
    },

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("failed to decode stored record: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    pub fn unique(constraint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Constraint {
            kind: ConstraintKind::Unique,
            constraint: constraint.into(),
            message: message.into(),
        }
    }

    pub fn foreign_key(constraint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Constraint {
            kind: ConstraintKind::ForeignKey,
            constraint: constraint.into(),
            message: message.into(),
        }
    }

    pub fn constraint_kind(&self) -> Option<ConstraintKind> {
        match self {
            Self::Constraint { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &error {
            let kind = db_err.code().as_deref().and_then(ConstraintKind::from_sqlstate);
            if let Some(kind) = kind {
                return Self::Constraint {
                    kind,
                    constraint: db_err.constraint().unwrap_or_default().to_string(),
                    message: db_err.message().to_string(),
                };
            }
        }
        Self::Database(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_serializes_flat() {
        let now = Utc::now();
        let mut fields = Fields::new();
        fields.insert("name".into(), json!("Editor"));
        let record = Record {
            id: Uuid::nil(),
            fields,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["name"], "Editor");
        assert!(value["deleted_at"].is_null());
        assert!(value.get("fields").is_none());

        let back: Record = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_page_envelope() {
        let page = RecordPage::new(Vec::new());
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value, json!({"records": [], "totalRecords": 0}));
    }

    #[test]
    fn test_writable_filters_columns() {
        let mut data = Fields::new();
        data.insert("name".into(), json!("Admin"));
        data.insert("id".into(), json!("ignored"));
        data.insert("deleted_at".into(), json!(null));

        let writable = ROLES.writable(data);
        assert_eq!(writable.len(), 1);
        assert!(writable.contains_key("name"));
    }

    #[test]
    fn test_constraint_kind_from_sqlstate() {
        assert_eq!(ConstraintKind::from_sqlstate("23505"), Some(ConstraintKind::Unique));
        assert_eq!(ConstraintKind::from_sqlstate("23503"), Some(ConstraintKind::ForeignKey));
        assert_eq!(ConstraintKind::from_sqlstate("23502"), None);
    }
}
