//! Client-side projection of one resource.
//!
//! A [`ResourceCache`] wraps the list/get/create/edit/delete endpoints of a
//! [`Resource`] and publishes their progress through [`StatusCell`]s. Every
//! operation follows the same sequence:
//!
//! 1. wait for any earlier call that writes the same cells to finish
//! 2. clear the matching error cell and raise the busy cell
//! 3. await the network call
//! 4. lower the busy cell
//! 5. store the mapped result, or the failed response in the error cell
//!
//! Failed responses are returned to the caller as data, never as `Err`. A
//! 401 is left out of the error cells because the client has already fired
//! its login redirect. Mutations do not touch `records`; callers refresh the
//! list with [`ResourceCache::get`] when they need it.
//!
//! Loads, saves and deletes each share one set of cells across all records,
//! so calls are serialised per set rather than per record. Two edits on
//! different ids still finish in the order they were issued.

use serde_json::Value;

use crate::cell::{BusyFlag, StatusCell};
use crate::error::{ClientError, Result};
use crate::guard::InFlightGuard;
use crate::mapping::Fields;
use crate::remote::{ApiResponse, RemoteResourceClient};
use crate::resources::Resource;

/// Response of one call plus its mapped payload on success.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub response: ApiResponse,
    pub data: Option<T>,
}

impl<T> Outcome<T> {
    pub fn ok(response: ApiResponse, data: Option<T>) -> Self {
        Self { response, data }
    }

    pub fn failed(response: ApiResponse) -> Self {
        Self { response, data: None }
    }

    pub fn is_success(&self) -> bool {
        self.response.is_success()
    }
}

/// Decoded `{records, totalRecords}` body.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordList<R> {
    pub records: Vec<R>,
    pub total_records: u64,
}

const LOAD: &str = "load";
const SAVE: &str = "save";
const DELETE: &str = "delete";

pub struct ResourceCache<R: Resource> {
    client: RemoteResourceClient,
    guard: InFlightGuard,

    pub records: StatusCell<Vec<R>>,
    pub record: StatusCell<Option<R>>,
    pub total_records: StatusCell<u64>,
    pub is_loading: StatusCell<bool>,
    pub load_error: StatusCell<Option<ApiResponse>>,

    pub record_to_save: StatusCell<Option<Fields>>,
    pub is_saving: StatusCell<bool>,
    pub save_error: StatusCell<Option<ApiResponse>>,
    pub saved_record: StatusCell<Option<R>>,

    pub record_to_delete: StatusCell<Option<R>>,
    pub is_deleting: StatusCell<bool>,
    pub delete_error: StatusCell<Option<ApiResponse>>,
    pub deleted_record: StatusCell<Option<R>>,
}

impl<R: Resource> ResourceCache<R> {
    pub fn new(client: RemoteResourceClient) -> Self {
        Self {
            client,
            guard: InFlightGuard::new(),
            records: StatusCell::new(Vec::new()),
            record: StatusCell::new(None),
            total_records: StatusCell::new(0),
            is_loading: StatusCell::new(false),
            load_error: StatusCell::new(None),
            record_to_save: StatusCell::new(None),
            is_saving: StatusCell::new(false),
            save_error: StatusCell::new(None),
            saved_record: StatusCell::new(None),
            record_to_delete: StatusCell::new(None),
            is_deleting: StatusCell::new(false),
            delete_error: StatusCell::new(None),
            deleted_record: StatusCell::new(None),
        }
    }

    pub fn client(&self) -> &RemoteResourceClient {
        &self.client
    }

    fn turn_key(group: &str) -> String {
        format!("{}:{}", R::BASE_PATH, group)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Reads
    // ───────────────────────────────────────────────────────────────────────────

    /// Load the list into `records` and `total_records`.
    pub async fn get(&self) -> Result<Outcome<RecordList<R>>> {
        let _turn = self.guard.acquire(&Self::turn_key(LOAD)).await;
        self.load_error.set(None);

        let flag = BusyFlag::raise(&self.is_loading);
        let response = self.client.get(R::BASE_PATH).await;
        drop(flag);
        let response = response?;

        if !response.is_success() {
            record_failure(&self.load_error, &response);
            return Ok(Outcome::failed(response));
        }

        let list = self.decode_list(&response.body)?;
        self.records.set(list.records.clone());
        self.total_records.set(list.total_records);
        Ok(Outcome::ok(response, Some(list)))
    }

    /// Load one record into `record`.
    ///
    /// An unknown identifier succeeds with no data and clears `record`.
    pub async fn get_by_id(&self, id: &str) -> Result<Outcome<R>> {
        let path = item_path::<R>(id);
        let _turn = self.guard.acquire(&Self::turn_key(LOAD)).await;
        self.load_error.set(None);

        let flag = BusyFlag::raise(&self.is_loading);
        let response = self.client.get(&path).await;
        drop(flag);
        let response = response?;

        if !response.is_success() {
            record_failure(&self.load_error, &response);
            return Ok(Outcome::failed(response));
        }

        let record = self.decode_record(&path, &response.body)?;
        self.record.set(record.clone());
        Ok(Outcome::ok(response, record))
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Writes
    // ───────────────────────────────────────────────────────────────────────────

    /// Create a record from local fields.
    pub async fn create(&self, fields: &Fields) -> Result<Outcome<R>> {
        let body = Value::Object(R::mapping().map_to_api(fields));
        self.write(R::BASE_PATH, || self.client.post(R::BASE_PATH, &body)).await
    }

    /// Apply a partial update from local fields.
    pub async fn edit(&self, id: &str, fields: &Fields) -> Result<Outcome<R>> {
        let path = item_path::<R>(id);
        let body = Value::Object(R::mapping().map_to_api(fields));
        self.write(&path, || self.client.patch(&path, &body)).await
    }

    /// Edit when an identifier is given, create otherwise.
    pub async fn save(&self, id: Option<&str>, fields: &Fields) -> Result<Outcome<R>> {
        match id {
            Some(id) => self.edit(id, fields).await,
            None => self.create(fields).await,
        }
    }

    /// Hard delete.
    pub async fn delete(&self, id: &str) -> Result<Outcome<R>> {
        let path = item_path::<R>(id);
        self.remove(&path, || self.client.delete(&path)).await
    }

    /// Soft delete: the server stamps the record's delete time.
    pub async fn archive(&self, id: &str) -> Result<Outcome<R>> {
        let path = item_path::<R>(id);
        let archive = format!("{}/archive", path);
        self.remove(&path, || self.client.post(&archive, &Value::Null)).await
    }

    async fn write<F, Fut>(&self, path: &str, call: F) -> Result<Outcome<R>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<ApiResponse>>,
    {
        let _turn = self.guard.acquire(&Self::turn_key(SAVE)).await;
        self.save_error.set(None);

        let flag = BusyFlag::raise(&self.is_saving);
        let response = call().await;
        drop(flag);
        let response = response?;

        if !response.is_success() {
            record_failure(&self.save_error, &response);
            return Ok(Outcome::failed(response));
        }

        let record = self.decode_record(path, &response.body)?;
        if record.is_some() {
            self.saved_record.set(record.clone());
        }
        Ok(Outcome::ok(response, record))
    }

    async fn remove<F, Fut>(&self, path: &str, call: F) -> Result<Outcome<R>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<ApiResponse>>,
    {
        let _turn = self.guard.acquire(&Self::turn_key(DELETE)).await;
        self.delete_error.set(None);

        let flag = BusyFlag::raise(&self.is_deleting);
        let response = call().await;
        drop(flag);
        let response = response?;

        if !response.is_success() {
            record_failure(&self.delete_error, &response);
            return Ok(Outcome::failed(response));
        }

        let record = self.decode_record(path, &response.body)?;
        if record.is_some() {
            self.deleted_record.set(record.clone());
        }
        Ok(Outcome::ok(response, record))
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Decoding
    // ───────────────────────────────────────────────────────────────────────────

    fn decode_list(&self, body: &Value) -> Result<RecordList<R>> {
        let url = self.client.url(R::BASE_PATH);
        let records = body
            .get("records")
            .and_then(Value::as_array)
            .ok_or_else(|| ClientError::decode(&url, "missing records"))?
            .iter()
            .map(R::from_api)
            .collect::<serde_json::Result<Vec<R>>>()
            .map_err(|e| ClientError::decode(&url, e))?;
        let total_records = body
            .get("totalRecords")
            .and_then(Value::as_u64)
            .unwrap_or(records.len() as u64);
        Ok(RecordList { records, total_records })
    }

    fn decode_record(&self, path: &str, body: &Value) -> Result<Option<R>> {
        decode_record(&self.client.url(path), body)
    }
}

pub(crate) fn item_path<R: Resource>(id: &str) -> String {
    format!("{}/{}", R::BASE_PATH, id)
}

pub(crate) fn decode_record<R: Resource>(url: &str, body: &Value) -> Result<Option<R>> {
    match body.get("record") {
        None => Err(ClientError::decode(url, "missing record")),
        Some(Value::Null) => Ok(None),
        Some(record) => R::from_api(record).map(Some).map_err(|e| ClientError::decode(url, e)),
    }
}

/// Store a failed response, unless it was a 401 already handled by redirect.
pub(crate) fn record_failure(cell: &StatusCell<Option<ApiResponse>>, response: &ApiResponse) {
    if response.is_unauthorized() {
        return;
    }
    tracing::debug!(status = response.status, "Request failed");
    cell.set(Some(response.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::Role;
    use serde_json::json;

    #[test]
    fn test_decode_record_variants() {
        let role: Option<Role> = decode_record("u", &json!({"record": {"id": "1", "name": "Editor"}})).unwrap();
        assert_eq!(role.unwrap().name, "Editor");

        let none: Option<Role> = decode_record("u", &json!({"record": null})).unwrap();
        assert!(none.is_none());

        assert!(decode_record::<Role>("u", &json!({})).is_err());
    }

    #[test]
    fn test_unauthorized_is_not_recorded() {
        let cell = StatusCell::new(None);
        record_failure(&cell, &ApiResponse::new(401, Value::Null));
        assert!(cell.get().is_none());

        record_failure(&cell, &ApiResponse::new(403, Value::Null));
        assert_eq!(cell.get().map(|r| r.status), Some(403));
    }

    #[test]
    fn test_item_path() {
        assert_eq!(item_path::<Role>("abc"), "roles/abc");
    }
}
