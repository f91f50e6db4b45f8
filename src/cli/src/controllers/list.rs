//! List screen: load, then delete or archive with a refresh.

use std::sync::Arc;

use super::{failure_message, NOT_ALLOWED_TO_SAVE, NOT_ALLOWED_TO_VIEW};
use crate::cache::{Outcome, ResourceCache};
use crate::cell::StatusCell;
use crate::error::Result;
use crate::resources::Resource;

pub struct ResourceListController<R: Resource> {
    cache: Arc<ResourceCache<R>>,
    pub error: StatusCell<Option<String>>,
}

enum Removal {
    Delete,
    Archive,
}

impl<R: Resource> ResourceListController<R> {
    pub fn new(cache: Arc<ResourceCache<R>>) -> Self {
        Self {
            cache,
            error: StatusCell::new(None),
        }
    }

    pub fn cache(&self) -> &ResourceCache<R> {
        &self.cache
    }

    pub fn records(&self) -> Vec<R> {
        self.cache.records.get()
    }

    /// Refresh the list. A 403 becomes "Not allowed to view".
    pub async fn load(&self) -> Result<bool> {
        self.error.set(None);
        let outcome = self.cache.get().await?;
        if !outcome.is_success() {
            self.error.set(failure_message(&outcome.response, NOT_ALLOWED_TO_VIEW));
        }
        Ok(outcome.is_success())
    }

    /// Mark `record` as the one a following `delete` or `archive` acts on.
    pub fn confirm(&self, record: R) {
        self.cache.record_to_delete.set(Some(record));
    }

    pub async fn delete(&self) -> Result<Option<R>> {
        self.remove(Removal::Delete).await
    }

    pub async fn archive(&self) -> Result<Option<R>> {
        self.remove(Removal::Archive).await
    }

    async fn remove(&self, removal: Removal) -> Result<Option<R>> {
        let Some(record) = self.cache.record_to_delete.get() else {
            return Ok(None);
        };
        self.error.set(None);

        let outcome: Outcome<R> = match removal {
            Removal::Delete => self.cache.delete(record.id()).await?,
            Removal::Archive => self.cache.archive(record.id()).await?,
        };
        if !outcome.is_success() {
            self.error.set(failure_message(&outcome.response, NOT_ALLOWED_TO_SAVE));
            return Ok(None);
        }

        self.cache.record_to_delete.set(None);
        self.load().await?;
        Ok(outcome.data)
    }
}
