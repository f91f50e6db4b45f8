//! Edit-form lifecycle for one resource.

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

use super::{failure_message, NOT_ALLOWED_TO_SAVE, NOT_ALLOWED_TO_VIEW};
use crate::cache::ResourceCache;
use crate::cell::StatusCell;
use crate::error::Result;
use crate::mapping::Fields;
use crate::resources::Resource;

/// Binds a cached record to an editable draft.
///
/// `init` picks the record to edit (or none, for a new one), `set_values`
/// edits the draft, `save` persists it and refreshes the list, `cancel`
/// throws the draft away.
pub struct FormSyncController<R: Resource> {
    cache: Arc<ResourceCache<R>>,
    editing: Mutex<Option<String>>,
    pub draft: StatusCell<Fields>,
    pub error: StatusCell<Option<String>>,
}

impl<R: Resource> FormSyncController<R> {
    pub fn new(cache: Arc<ResourceCache<R>>) -> Self {
        Self {
            cache,
            editing: Mutex::new(None),
            draft: StatusCell::new(Fields::new()),
            error: StatusCell::new(None),
        }
    }

    pub fn cache(&self) -> &ResourceCache<R> {
        &self.cache
    }

    /// Identifier of the record being edited, `None` for a new record.
    pub fn editing_id(&self) -> Option<String> {
        self.editing.lock().clone()
    }

    /// Start editing `id`, or a blank record when `id` is `None`.
    ///
    /// Returns false, with `error` set, when the record could not be loaded.
    pub async fn init(&self, id: Option<&str>) -> Result<bool> {
        self.cancel();
        let Some(id) = id else {
            return Ok(true);
        };

        let outcome = self.cache.get_by_id(id).await?;
        if !outcome.is_success() {
            self.error.set(failure_message(&outcome.response, NOT_ALLOWED_TO_VIEW));
            return Ok(false);
        }
        let Some(record) = outcome.data else {
            self.error.set(Some("Record not found".to_string()));
            return Ok(false);
        };

        let fields = record.to_fields();
        *self.editing.lock() = Some(id.to_string());
        self.cache.record_to_save.set(Some(fields.clone()));
        self.draft.set(fields);
        Ok(true)
    }

    /// Merge `values` into the draft.
    pub fn set_values(&self, values: Fields) {
        self.draft.update(|draft| draft.extend(values));
    }

    pub fn set_value(&self, field: &str, value: impl Into<Value>) {
        let value = value.into();
        self.draft.update(|draft| {
            draft.insert(field.to_string(), value);
        });
    }

    /// Editable fields of the draft.
    pub fn values(&self) -> Fields {
        let draft = self.draft.get();
        R::EDITABLE
            .iter()
            .filter_map(|&field| draft.get(field).map(|v| (field.to_string(), v.clone())))
            .collect()
    }

    /// Create or update from the draft, then refresh the list.
    ///
    /// On failure the draft is kept and `error` explains why.
    pub async fn save(&self) -> Result<Option<R>> {
        self.error.set(None);
        let id = self.editing_id();
        let outcome = self.cache.save(id.as_deref(), &self.values()).await?;

        if !outcome.is_success() {
            self.error.set(failure_message(&outcome.response, NOT_ALLOWED_TO_SAVE));
            return Ok(None);
        }
        let Some(saved) = outcome.data else {
            self.error.set(Some("Record not found".to_string()));
            return Ok(None);
        };

        self.reset();
        self.cache.get().await?;
        Ok(Some(saved))
    }

    pub fn cancel(&self) {
        self.reset();
        self.error.set(None);
    }

    fn reset(&self) {
        *self.editing.lock() = None;
        self.draft.set(Fields::new());
        self.cache.record_to_save.set(None);
    }
}
