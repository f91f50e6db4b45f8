//! Canonical resource handlers.
//!
//! `List`, `Get`, `Create`, `Update` and `Delete` work against any
//! [`ResourceStore`]; `ListMembers`, `AddMembers` and `RemoveMembers` against
//! any [`AssociationStore`]. Per-resource modules only supply body schemas
//! and permissions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{BackofficeError, ErrorCode, RecoverConstraint, Result};
use crate::pipeline::{Handler, Input, OneOrMany, Reply, Schema, Unchecked};
use crate::store::{AssociationStore, Deletion, Fields, Record, ResourceStore};
use crate::validation::{
    validate_field, validate_request, MinItems, Required, UniqueItems, Uuid as UuidRule, Validate,
    ValidationResult,
};

// ═══════════════════════════════════════════════════════════════════════════════
// Shared Schemas
// ═══════════════════════════════════════════════════════════════════════════════

/// `{id}` path parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct IdPath {
    pub id: String,
}

impl IdPath {
    pub fn id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.id).map_err(|e| {
            BackofficeError::with_internal(ErrorCode::InvalidInput, "Invalid identifier", e.to_string())
        })
    }
}

impl Validate for IdPath {
    fn validate(&self) -> ValidationResult<()> {
        validate_request()
            .field(validate_field("id", &self.id).rule(Required).rule(UuidRule))
            .result()
    }
}

/// A body that maps onto writable columns.
pub trait WriteBody: Schema + Sync {
    fn into_fields(self) -> Result<Fields>;
}

/// Serialize `body` into column values, dropping absent optionals.
pub fn serialize_fields(body: &impl Serialize) -> Result<Fields> {
    match serde_json::to_value(body)? {
        serde_json::Value::Object(fields) => Ok(fields.into_iter().filter(|(_, v)| !v.is_null()).collect()),
        other => Err(BackofficeError::internal(format!("body serialized to non-object: {}", other))),
    }
}

/// JSON array of member ids, the body of an add-members call.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct MemberIds(pub Vec<String>);

impl MemberIds {
    pub fn uuids(&self) -> Result<Vec<Uuid>> {
        parse_ids(&self.0)
    }
}

impl Validate for MemberIds {
    fn validate(&self) -> ValidationResult<()> {
        validate_request()
            .field(validate_field("", &self.0).rule(MinItems(1)).rule(UniqueItems))
            .each("", &self.0, |item| item.rule(UuidRule))
            .result()
    }
}

/// `?permissionIds=..` given once or repeated.
#[derive(Debug, Clone, Deserialize)]
pub struct PermissionIdsQuery {
    #[serde(rename = "permissionIds")]
    pub permission_ids: OneOrMany<String>,
}

impl Validate for PermissionIdsQuery {
    fn validate(&self) -> ValidationResult<()> {
        let ids = self.permission_ids.to_vec();
        validate_request()
            .field(validate_field("permissionIds", &ids).rule(MinItems(1)))
            .each("permissionIds", &ids, |item| item.rule(UuidRule))
            .result()
    }
}

fn parse_ids(ids: &[String]) -> Result<Vec<Uuid>> {
    ids.iter()
        .map(|id| IdPath { id: id.clone() }.id())
        .collect()
}

#[derive(Serialize)]
struct RecordBody<'a> {
    record: Option<&'a Record>,
}

#[derive(Serialize)]
struct RecordsBody<'a> {
    records: &'a [Record],
}

// ═══════════════════════════════════════════════════════════════════════════════
// Resource Handlers
// ═══════════════════════════════════════════════════════════════════════════════

/// All visible records: 200 `{records, totalRecords}`.
pub struct List {
    store: Arc<dyn ResourceStore>,
}

impl List {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Handler for List {
    type Path = Unchecked;
    type Query = Unchecked;
    type Body = Unchecked;

    async fn handle(&self, _input: Input<Unchecked, Unchecked, Unchecked>) -> Result<Reply> {
        let page = self.store.find_all().await?;
        Reply::ok(&page)
    }
}

/// One record: 200 `{record}`, where a missing record is `null`.
pub struct Get {
    store: Arc<dyn ResourceStore>,
}

impl Get {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Handler for Get {
    type Path = IdPath;
    type Query = Unchecked;
    type Body = Unchecked;

    async fn handle(&self, input: Input<IdPath, Unchecked, Unchecked>) -> Result<Reply> {
        let record = self.store.find_one(input.path.id()?).await?;
        Reply::ok(&RecordBody {
            record: record.as_ref(),
        })
    }
}

/// Insert from a validated body: 201 `{record}`.
pub struct Create<B> {
    store: Arc<dyn ResourceStore>,
    _body: PhantomData<fn() -> B>,
}

impl<B> Create<B> {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            _body: PhantomData,
        }
    }
}

#[async_trait]
impl<B: WriteBody> Handler for Create<B> {
    type Path = Unchecked;
    type Query = Unchecked;
    type Body = B;

    async fn handle(&self, input: Input<Unchecked, Unchecked, B>) -> Result<Reply> {
        let fields = input.body.into_fields()?;
        let record = self.store.create(fields).await.recover_constraint()?;

        tracing::info!(resource = self.store.spec().name, id = %record.id, user = %input.caller.user_id, "Created record");
        Reply::created(&RecordBody { record: Some(&record) })
    }
}

/// Partial update: 200 `{record}`, `null` when nothing live matched.
pub struct Update<B> {
    store: Arc<dyn ResourceStore>,
    _body: PhantomData<fn() -> B>,
}

impl<B> Update<B> {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            _body: PhantomData,
        }
    }
}

#[async_trait]
impl<B: WriteBody> Handler for Update<B> {
    type Path = IdPath;
    type Query = Unchecked;
    type Body = B;

    async fn handle(&self, input: Input<IdPath, Unchecked, B>) -> Result<Reply> {
        let id = input.path.id()?;
        let fields = input.body.into_fields()?;
        let record = self.store.update(id, fields).await.recover_constraint()?;
        Reply::ok(&RecordBody {
            record: record.as_ref(),
        })
    }
}

/// Hard delete or archive: 200 `{record}`.
pub struct Delete {
    store: Arc<dyn ResourceStore>,
    mode: Deletion,
}

impl Delete {
    pub fn hard(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            mode: Deletion::Hard,
        }
    }

    pub fn archive(store: Arc<dyn ResourceStore>) -> Self {
        Self {
            store,
            mode: Deletion::Soft,
        }
    }
}

#[async_trait]
impl Handler for Delete {
    type Path = IdPath;
    type Query = Unchecked;
    type Body = Unchecked;

    async fn handle(&self, input: Input<IdPath, Unchecked, Unchecked>) -> Result<Reply> {
        let record = self.store.delete(input.path.id()?, self.mode).await?;
        if let Some(ref record) = record {
            tracing::info!(resource = self.store.spec().name, id = %record.id, mode = ?self.mode, user = %input.caller.user_id, "Deleted record");
        }
        Reply::ok(&RecordBody {
            record: record.as_ref(),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Association Handlers
// ═══════════════════════════════════════════════════════════════════════════════

/// Current members of an owner: 200 `{records}`.
pub struct ListMembers {
    store: Arc<dyn AssociationStore>,
}

impl ListMembers {
    pub fn new(store: Arc<dyn AssociationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Handler for ListMembers {
    type Path = IdPath;
    type Query = Unchecked;
    type Body = Unchecked;

    async fn handle(&self, input: Input<IdPath, Unchecked, Unchecked>) -> Result<Reply> {
        let records = self.store.list(input.path.id()?).await?;
        Reply::ok(&RecordsBody { records: &records })
    }
}

/// Add members; an existing pair or unknown id is a 400.
pub struct AddMembers {
    store: Arc<dyn AssociationStore>,
}

impl AddMembers {
    pub fn new(store: Arc<dyn AssociationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Handler for AddMembers {
    type Path = IdPath;
    type Query = Unchecked;
    type Body = MemberIds;

    async fn handle(&self, input: Input<IdPath, Unchecked, MemberIds>) -> Result<Reply> {
        let owner = input.path.id()?;
        let members = input.body.uuids()?;
        let records = self.store.add(owner, &members).await.recover_constraint()?;
        Reply::ok(&RecordsBody { records: &records })
    }
}

/// Remove members; pairs that do not exist are ignored.
pub struct RemoveMembers {
    store: Arc<dyn AssociationStore>,
}

impl RemoveMembers {
    pub fn new(store: Arc<dyn AssociationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Handler for RemoveMembers {
    type Path = IdPath;
    type Query = PermissionIdsQuery;
    type Body = Unchecked;

    async fn handle(&self, input: Input<IdPath, PermissionIdsQuery, Unchecked>) -> Result<Reply> {
        let owner = input.path.id()?;
        let members = parse_ids(&input.query.permission_ids.into_vec())?;
        let records = self.store.remove(owner, &members).await?;
        Reply::ok(&RecordsBody { records: &records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{RawRequest, Region};
    use serde_json::json;

    #[test]
    fn test_id_path_validation() {
        let valid = IdPath { id: Uuid::new_v4().to_string() };
        assert!(valid.validate().is_ok());
        assert!(valid.id().is_ok());

        let invalid = IdPath { id: "abc".into() };
        assert!(invalid.validate().is_err());
        assert!(invalid.id().is_err());
    }

    #[test]
    fn test_member_ids_errors_are_indexed() {
        let request = RawRequest::new().json(json!([Uuid::new_v4().to_string(), "nope"]));
        let errors = request.decode::<MemberIds>(Region::Body).unwrap_err();
        assert!(errors.has_errors("body[1]"));
        assert!(!errors.has_errors("body[0]"));
    }

    #[test]
    fn test_member_ids_reject_empty_and_duplicates() {
        let empty = RawRequest::new().json(json!([]));
        assert!(empty.decode::<MemberIds>(Region::Body).unwrap_err().has_errors("body"));

        let id = Uuid::new_v4().to_string();
        let dup = RawRequest::new().json(json!([id, id]));
        assert!(dup.decode::<MemberIds>(Region::Body).unwrap_err().has_errors("body"));

        let object = RawRequest::new().json(json!({"ids": []}));
        assert!(object.decode::<MemberIds>(Region::Body).is_err());
    }

    #[test]
    fn test_permission_ids_query() {
        let id = Uuid::new_v4().to_string();
        let request = RawRequest::new().query_param("permissionIds", id.clone());
        let query: PermissionIdsQuery = request.decode(Region::QueryStringParameters).unwrap();
        assert_eq!(query.permission_ids.into_vec(), vec![id]);

        let bad = RawRequest::new()
            .query_param("permissionIds", Uuid::new_v4().to_string())
            .query_param("permissionIds", "x");
        let errors = bad.decode::<PermissionIdsQuery>(Region::QueryStringParameters).unwrap_err();
        assert!(errors.has_errors("queryStringParameters.permissionIds[1]"));
    }

    #[test]
    fn test_serialize_fields_drops_nulls() {
        #[derive(Serialize)]
        struct Patch {
            name: Option<String>,
        }
        assert!(serialize_fields(&Patch { name: None }).unwrap().is_empty());
        let fields = serialize_fields(&Patch { name: Some("x".into()) }).unwrap();
        assert_eq!(fields.get("name"), Some(&json!("x")));
    }
}
