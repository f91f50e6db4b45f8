//! Process-local storage backend.
//!
//! All tables share one lock so a multi-row association insert either lands
//! completely or not at all, the way a single SQL statement would.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::{
    AssociationSpec, AssociationStore, Deletion, Fields, Record, RecordPage, ResourceSpec,
    ResourceStore, StoreError, StoreResult,
};

#[derive(Debug, Clone)]
struct Link {
    owner: Uuid,
    member: Uuid,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    /// Rows per table in insertion order.
    rows: HashMap<&'static str, Vec<Record>>,
    links: HashMap<&'static str, Vec<Link>>,
    associations: Vec<AssociationSpec>,
}

impl Tables {
    fn table(&self, table: &str) -> &[Record] {
        self.rows.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    fn exists(&self, table: &str, id: Uuid) -> bool {
        self.table(table).iter().any(|r| r.id == id)
    }

    fn check_unique(&self, spec: &ResourceSpec, candidate: &Record) -> StoreResult<()> {
        for column in spec.unique {
            let Some(value) = candidate.get(column) else {
                continue;
            };
            let taken = self.table(spec.table).iter().any(|other| {
                other.id != candidate.id && !other.is_deleted() && other.get(column) == Some(value)
            });
            if taken {
                return Err(StoreError::unique(
                    format!("{}_{}_key", spec.table, column),
                    format!("Key ({})=({}) already exists.", column, value),
                ));
            }
        }
        Ok(())
    }

    /// Drop every link that references a removed row.
    fn cascade(&mut self, table: &str, id: Uuid) {
        for spec in &self.associations {
            let Some(links) = self.links.get_mut(spec.table) else {
                continue;
            };
            if spec.owner_table == table {
                links.retain(|link| link.owner != id);
            }
            if spec.member_table == table {
                links.retain(|link| link.member != id);
            }
        }
    }

    fn members(&self, spec: &AssociationSpec, owner: Uuid) -> Vec<Record> {
        let Some(links) = self.links.get(spec.table) else {
            return Vec::new();
        };
        let catalog = self.table(spec.member_table);
        links
            .iter()
            .filter(|link| link.owner == owner)
            .filter_map(|link| catalog.iter().find(|r| r.id == link.member))
            .filter(|record| !record.is_deleted())
            .cloned()
            .collect()
    }
}

/// Shared in-memory database. Cloning shares the tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    inner: Arc<RwLock<Tables>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store for one resource table.
    pub fn resource(&self, spec: ResourceSpec) -> MemoryResourceStore {
        self.inner.write().rows.entry(spec.table).or_default();
        MemoryResourceStore {
            db: self.clone(),
            spec,
        }
    }

    /// Store for one join table. Registering it enables cascades from both sides.
    pub fn association(&self, spec: AssociationSpec) -> MemoryAssociationStore {
        {
            let mut tables = self.inner.write();
            tables.links.entry(spec.table).or_default();
            if !tables.associations.iter().any(|s| s.table == spec.table) {
                tables.associations.push(spec);
            }
        }
        MemoryAssociationStore {
            db: self.clone(),
            spec,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Resource Store
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct MemoryResourceStore {
    db: MemoryDatabase,
    spec: ResourceSpec,
}

#[async_trait]
impl ResourceStore for MemoryResourceStore {
    fn spec(&self) -> &ResourceSpec {
        &self.spec
    }

    async fn find_all(&self) -> StoreResult<RecordPage> {
        let tables = self.db.inner.read();
        let records = tables
            .table(self.spec.table)
            .iter()
            .filter(|r| !r.is_deleted())
            .cloned()
            .collect();
        Ok(RecordPage::new(records))
    }

    async fn find_one(&self, id: Uuid) -> StoreResult<Option<Record>> {
        let tables = self.db.inner.read();
        Ok(tables
            .table(self.spec.table)
            .iter()
            .find(|r| r.id == id && !r.is_deleted())
            .cloned())
    }

    async fn lookup(&self, id: Uuid) -> StoreResult<Option<Record>> {
        let tables = self.db.inner.read();
        Ok(tables.table(self.spec.table).iter().find(|r| r.id == id).cloned())
    }

    async fn create(&self, data: Fields) -> StoreResult<Record> {
        let now = Utc::now();
        let record = Record {
            id: Uuid::new_v4(),
            fields: self.spec.writable(data),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let mut tables = self.db.inner.write();
        tables.check_unique(&self.spec, &record)?;
        tables
            .rows
            .entry(self.spec.table)
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: Uuid, data: Fields) -> StoreResult<Option<Record>> {
        let mut tables = self.db.inner.write();
        let Some(current) = tables
            .table(self.spec.table)
            .iter()
            .find(|r| r.id == id && !r.is_deleted())
            .cloned()
        else {
            return Ok(None);
        };

        let mut updated = current;
        updated.fields.extend(self.spec.writable(data));
        updated.updated_at = Utc::now();
        tables.check_unique(&self.spec, &updated)?;

        if let Some(slot) = tables
            .rows
            .get_mut(self.spec.table)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == id))
        {
            *slot = updated.clone();
        }
        Ok(Some(updated))
    }

    async fn delete(&self, id: Uuid, mode: Deletion) -> StoreResult<Option<Record>> {
        let mut tables = self.db.inner.write();
        let Some(rows) = tables.rows.get_mut(self.spec.table) else {
            return Ok(None);
        };

        match mode {
            Deletion::Soft => Ok(rows
                .iter_mut()
                .find(|r| r.id == id && !r.is_deleted())
                .map(|record| {
                    record.deleted_at = Some(Utc::now());
                    record.clone()
                })),
            Deletion::Hard => {
                let Some(position) = rows.iter().position(|r| r.id == id) else {
                    return Ok(None);
                };
                let removed = rows.remove(position);
                tables.cascade(self.spec.table, id);
                Ok(Some(removed))
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Association Store
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct MemoryAssociationStore {
    db: MemoryDatabase,
    spec: AssociationSpec,
}

#[async_trait]
impl AssociationStore for MemoryAssociationStore {
    fn spec(&self) -> &AssociationSpec {
        &self.spec
    }

    async fn list(&self, owner: Uuid) -> StoreResult<Vec<Record>> {
        Ok(self.db.inner.read().members(&self.spec, owner))
    }

    async fn add(&self, owner: Uuid, members: &[Uuid]) -> StoreResult<Vec<Record>> {
        let mut tables = self.db.inner.write();
        let spec = self.spec;

        if !tables.exists(spec.owner_table, owner) {
            return Err(StoreError::foreign_key(
                spec.owner_constraint(),
                format!("Key ({})=({}) is not present in table \"{}\".", spec.owner_column, owner, spec.owner_table),
            ));
        }

        let existing = tables.links.get(spec.table).cloned().unwrap_or_default();
        let mut pending: Vec<Link> = Vec::with_capacity(members.len());
        let now = Utc::now();
        for &member in members {
            if !tables.exists(spec.member_table, member) {
                return Err(StoreError::foreign_key(
                    spec.member_constraint(),
                    format!("Key ({})=({}) is not present in table \"{}\".", spec.member_column, member, spec.member_table),
                ));
            }
            let duplicate = existing
                .iter()
                .chain(pending.iter())
                .any(|link| link.owner == owner && link.member == member);
            if duplicate {
                return Err(StoreError::unique(
                    spec.pair_constraint(),
                    format!("Key ({}, {})=({}, {}) already exists.", spec.owner_column, spec.member_column, owner, member),
                ));
            }
            pending.push(Link {
                owner,
                member,
                created_at: now,
            });
        }

        tables.links.entry(spec.table).or_default().extend(pending);
        Ok(tables.members(&spec, owner))
    }

    async fn remove(&self, owner: Uuid, members: &[Uuid]) -> StoreResult<Vec<Record>> {
        let mut tables = self.db.inner.write();
        if let Some(links) = tables.links.get_mut(self.spec.table) {
            links.retain(|link| !(link.owner == owner && members.contains(&link.member)));
        }
        Ok(tables.members(&self.spec, owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ConstraintKind, PERMISSIONS, ROLES, ROLE_PERMISSIONS};
    use serde_json::json;

    fn named(name: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), json!(name));
        fields
    }

    fn setup() -> (MemoryResourceStore, MemoryResourceStore, MemoryAssociationStore) {
        let db = MemoryDatabase::new();
        (
            db.resource(ROLES),
            db.resource(PERMISSIONS),
            db.association(ROLE_PERMISSIONS),
        )
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let (roles, _, _) = setup();
        let created = roles.create(named("Editor")).await.unwrap();

        assert_eq!(created.get("name"), Some(&json!("Editor")));
        assert_eq!(roles.find_one(created.id).await.unwrap(), Some(created.clone()));
        assert_eq!(roles.find_all().await.unwrap().total_records, 1);
        assert!(roles.find_one(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_name_among_live_rows() {
        let (roles, _, _) = setup();
        let first = roles.create(named("Editor")).await.unwrap();

        let err = roles.create(named("Editor")).await.unwrap_err();
        assert_eq!(err.constraint_kind(), Some(ConstraintKind::Unique));

        roles.delete(first.id, Deletion::Soft).await.unwrap();
        assert!(roles.create(named("Editor")).await.is_ok());
    }

    #[tokio::test]
    async fn test_soft_delete_keeps_row_for_lookup() {
        let (roles, _, _) = setup();
        let role = roles.create(named("Auditor")).await.unwrap();

        let archived = roles.delete(role.id, Deletion::Soft).await.unwrap().unwrap();
        assert!(archived.deleted_at.is_some());

        assert!(roles.find_one(role.id).await.unwrap().is_none());
        assert_eq!(roles.find_all().await.unwrap().total_records, 0);
        assert!(roles.lookup(role.id).await.unwrap().unwrap().is_deleted());
        assert!(roles.delete(role.id, Deletion::Soft).await.unwrap().is_none());
        assert!(roles.update(role.id, named("x")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let (roles, _, _) = setup();
        let role = roles.create(named("Ops")).await.unwrap();

        let updated = roles.update(role.id, named("Operations")).await.unwrap().unwrap();
        assert_eq!(updated.get("name"), Some(&json!("Operations")));
        assert_eq!(updated.created_at, role.created_at);
        assert!(updated.updated_at >= role.updated_at);

        let untouched = roles.update(role.id, Fields::new()).await.unwrap().unwrap();
        assert_eq!(untouched.get("name"), Some(&json!("Operations")));
    }

    #[tokio::test]
    async fn test_add_is_all_or_nothing() {
        let (roles, permissions, links) = setup();
        let role = roles.create(named("Editor")).await.unwrap();
        let p1 = permissions.create(named("roles:read")).await.unwrap();

        let err = links.add(role.id, &[p1.id, Uuid::new_v4()]).await.unwrap_err();
        assert_eq!(err.constraint_kind(), Some(ConstraintKind::ForeignKey));
        assert!(links.list(role.id).await.unwrap().is_empty());

        let err = links.add(role.id, &[p1.id, p1.id]).await.unwrap_err();
        assert_eq!(err.constraint_kind(), Some(ConstraintKind::Unique));
        assert!(links.list(role.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_missing_pair_is_noop() {
        let (roles, permissions, links) = setup();
        let role = roles.create(named("Editor")).await.unwrap();
        let p1 = permissions.create(named("roles:read")).await.unwrap();
        links.add(role.id, &[p1.id]).await.unwrap();

        let members = links.remove(role.id, &[Uuid::new_v4()]).await.unwrap();
        assert_eq!(members, vec![p1]);
    }

    #[tokio::test]
    async fn test_hard_delete_cascades() {
        let (roles, permissions, links) = setup();
        let role = roles.create(named("Editor")).await.unwrap();
        let p1 = permissions.create(named("roles:read")).await.unwrap();
        let p2 = permissions.create(named("roles:edit")).await.unwrap();
        links.add(role.id, &[p1.id, p2.id]).await.unwrap();

        permissions.delete(p1.id, Deletion::Hard).await.unwrap();
        assert_eq!(links.list(role.id).await.unwrap(), vec![p2.clone()]);

        // re-adding the surviving pair still collides
        assert!(links.add(role.id, &[p2.id]).await.is_err());

        roles.delete(role.id, Deletion::Hard).await.unwrap();
        assert!(links.list(role.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_archived_member_hidden_from_list() {
        let (roles, permissions, links) = setup();
        let role = roles.create(named("Editor")).await.unwrap();
        let p1 = permissions.create(named("roles:read")).await.unwrap();
        links.add(role.id, &[p1.id]).await.unwrap();

        permissions.delete(p1.id, Deletion::Soft).await.unwrap();
        assert!(links.list(role.id).await.unwrap().is_empty());
    }
}
