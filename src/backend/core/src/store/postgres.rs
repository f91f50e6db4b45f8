//! PostgreSQL storage backend.
//!
//! Queries are generated per table from the static [`ResourceSpec`] and
//! [`AssociationSpec`] descriptions, so only known identifiers are ever
//! interpolated. Rows travel as JSONB and decode straight into [`Record`].

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    AssociationSpec, AssociationStore, Deletion, Fields, Record, RecordPage, ResourceSpec,
    ResourceStore, StoreResult,
};

fn decode(value: serde_json::Value) -> StoreResult<Record> {
    Ok(serde_json::from_value(value)?)
}

fn decode_all(values: Vec<serde_json::Value>) -> StoreResult<Vec<Record>> {
    values.into_iter().map(decode).collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Resource Store
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct PgResourceStore {
    pool: PgPool,
    spec: ResourceSpec,
}

impl PgResourceStore {
    pub fn new(pool: PgPool, spec: ResourceSpec) -> Self {
        Self { pool, spec }
    }

    fn insert_sql(&self, columns: &[&str]) -> String {
        let table = self.spec.table;
        if columns.is_empty() {
            return format!(
                "WITH inserted AS (INSERT INTO {table} DEFAULT VALUES RETURNING *) \
                 SELECT to_jsonb(inserted) FROM inserted"
            );
        }
        let list = columns.join(", ");
        format!(
            "WITH inserted AS ( \
                 INSERT INTO {table} ({list}) \
                 SELECT {list} FROM jsonb_populate_record(NULL::{table}, $1) \
                 RETURNING * \
             ) SELECT to_jsonb(inserted) FROM inserted"
        )
    }

    fn update_sql(&self, columns: &[&str]) -> String {
        let table = self.spec.table;
        let assignments: Vec<String> = columns
            .iter()
            .map(|column| format!("{column} = src.{column}"))
            .chain(std::iter::once("updated_at = NOW()".to_string()))
            .collect();
        format!(
            "WITH updated AS ( \
                 UPDATE {table} AS t SET {} \
                 FROM jsonb_populate_record(NULL::{table}, $2) AS src \
                 WHERE t.id = $1 AND t.deleted_at IS NULL \
                 RETURNING t.* \
             ) SELECT to_jsonb(updated) FROM updated",
            assignments.join(", ")
        )
    }

    /// Writable columns present in `data`, in declaration order.
    fn present_columns(&self, data: &Fields) -> Vec<&'static str> {
        self.spec
            .columns
            .iter()
            .copied()
            .filter(|column| data.contains_key(*column))
            .collect()
    }
}

#[async_trait]
impl ResourceStore for PgResourceStore {
    fn spec(&self) -> &ResourceSpec {
        &self.spec
    }

    async fn find_all(&self) -> StoreResult<RecordPage> {
        let sql = format!(
            "SELECT to_jsonb(t) FROM {} AS t WHERE t.deleted_at IS NULL ORDER BY t.created_at, t.id",
            self.spec.table
        );
        let rows: Vec<serde_json::Value> = sqlx::query_scalar(&sql).fetch_all(&self.pool).await?;
        Ok(RecordPage::new(decode_all(rows)?))
    }

    async fn find_one(&self, id: Uuid) -> StoreResult<Option<Record>> {
        let sql = format!(
            "SELECT to_jsonb(t) FROM {} AS t WHERE t.id = $1 AND t.deleted_at IS NULL",
            self.spec.table
        );
        let row: Option<serde_json::Value> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(decode).transpose()
    }

    async fn lookup(&self, id: Uuid) -> StoreResult<Option<Record>> {
        let sql = format!("SELECT to_jsonb(t) FROM {} AS t WHERE t.id = $1", self.spec.table);
        let row: Option<serde_json::Value> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(decode).transpose()
    }

    async fn create(&self, data: Fields) -> StoreResult<Record> {
        let data = self.spec.writable(data);
        let columns = self.present_columns(&data);
        let sql = self.insert_sql(&columns);

        let row: serde_json::Value = sqlx::query_scalar(&sql)
            .bind(serde_json::Value::Object(data))
            .fetch_one(&self.pool)
            .await?;
        decode(row)
    }

    async fn update(&self, id: Uuid, data: Fields) -> StoreResult<Option<Record>> {
        let data = self.spec.writable(data);
        let columns = self.present_columns(&data);
        let sql = self.update_sql(&columns);

        let row: Option<serde_json::Value> = sqlx::query_scalar(&sql)
            .bind(id)
            .bind(serde_json::Value::Object(data))
            .fetch_optional(&self.pool)
            .await?;
        row.map(decode).transpose()
    }

    async fn delete(&self, id: Uuid, mode: Deletion) -> StoreResult<Option<Record>> {
        let table = self.spec.table;
        let sql = match mode {
            Deletion::Hard => format!(
                "WITH removed AS (DELETE FROM {table} WHERE id = $1 RETURNING *) \
                 SELECT to_jsonb(removed) FROM removed"
            ),
            Deletion::Soft => format!(
                "WITH archived AS ( \
                     UPDATE {table} SET deleted_at = NOW() \
                     WHERE id = $1 AND deleted_at IS NULL RETURNING * \
                 ) SELECT to_jsonb(archived) FROM archived"
            ),
        };

        let row: Option<serde_json::Value> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        tracing::debug!(resource = self.spec.name, %id, ?mode, found = row.is_some(), "Deleted record");
        row.map(decode).transpose()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Association Store
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct PgAssociationStore {
    pool: PgPool,
    spec: AssociationSpec,
}

impl PgAssociationStore {
    pub fn new(pool: PgPool, spec: AssociationSpec) -> Self {
        Self { pool, spec }
    }

    fn list_sql(&self) -> String {
        let AssociationSpec {
            table,
            owner_column,
            member_table,
            member_column,
            ..
        } = self.spec;
        format!(
            "SELECT to_jsonb(m) FROM {table} AS j \
             JOIN {member_table} AS m ON m.id = j.{member_column} \
             WHERE j.{owner_column} = $1 AND m.deleted_at IS NULL \
             ORDER BY j.created_at, m.created_at, m.id"
        )
    }
}

#[async_trait]
impl AssociationStore for PgAssociationStore {
    fn spec(&self) -> &AssociationSpec {
        &self.spec
    }

    async fn list(&self, owner: Uuid) -> StoreResult<Vec<Record>> {
        let rows: Vec<serde_json::Value> = sqlx::query_scalar(&self.list_sql())
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
        decode_all(rows)
    }

    async fn add(&self, owner: Uuid, members: &[Uuid]) -> StoreResult<Vec<Record>> {
        // One statement: either every pair lands or none does.
        let sql = format!(
            "INSERT INTO {} ({}, {}) SELECT $1, UNNEST($2::uuid[])",
            self.spec.table, self.spec.owner_column, self.spec.member_column
        );
        sqlx::query(&sql)
            .bind(owner)
            .bind(members)
            .execute(&self.pool)
            .await?;
        self.list(owner).await
    }

    async fn remove(&self, owner: Uuid, members: &[Uuid]) -> StoreResult<Vec<Record>> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = $1 AND {} = ANY($2)",
            self.spec.table, self.spec.owner_column, self.spec.member_column
        );
        let result = sqlx::query(&sql)
            .bind(owner)
            .bind(members)
            .execute(&self.pool)
            .await?;
        tracing::debug!(table = self.spec.table, %owner, removed = result.rows_affected(), "Removed association pairs");
        self.list(owner).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ROLES, ROLE_PERMISSIONS};

    fn lazy_pool() -> PgPool {
        sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/backoffice")
            .unwrap()
    }

    #[tokio::test]
    async fn test_insert_sql_lists_present_columns() {
        let store = PgResourceStore::new(lazy_pool(), ROLES);
        let sql = store.insert_sql(&["name"]);
        assert!(sql.contains("INSERT INTO roles (name)"));
        assert!(sql.contains("jsonb_populate_record(NULL::roles, $1)"));

        let empty = store.insert_sql(&[]);
        assert!(empty.contains("DEFAULT VALUES"));
    }

    #[tokio::test]
    async fn test_update_sql_touches_updated_at() {
        let store = PgResourceStore::new(lazy_pool(), ROLES);
        let sql = store.update_sql(&["name"]);
        assert!(sql.contains("SET name = src.name, updated_at = NOW()"));
        assert!(sql.contains("t.deleted_at IS NULL"));
    }

    #[tokio::test]
    async fn test_list_sql_hides_archived_members() {
        let store = PgAssociationStore::new(lazy_pool(), ROLE_PERMISSIONS);
        let sql = store.list_sql();
        assert!(sql.contains("JOIN permissions AS m ON m.id = j.permission_id"));
        assert!(sql.contains("j.role_id = $1 AND m.deleted_at IS NULL"));
    }
}
