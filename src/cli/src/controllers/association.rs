//! Editing an owner together with its member set.

use parking_lot::Mutex;
use std::sync::Arc;

use super::{failure_message, NOT_ALLOWED_TO_SAVE};
use crate::association::AssociationClient;
use crate::cache::{Outcome, ResourceCache};
use crate::cell::{BusyFlag, StatusCell};
use crate::error::Result;
use crate::mapping::Fields;
use crate::remote::ApiResponse;
use crate::resources::Resource;

#[derive(Debug, Clone)]
pub enum CommitOutcome<O> {
    /// Owner and membership saved
    Saved(O),
    /// A call failed; earlier steps in the commit are not rolled back
    Rejected(ApiResponse),
}

/// Holds the pending selection of members for one owner.
///
/// The selection is seeded from the owner's current members and edited
/// locally. [`commit`](Self::commit) saves the owner and then applies the
/// difference between the loaded members and the selection: new ids are
/// added, dropped ids are removed.
pub struct AssociationEditController<O: Resource, M: Resource> {
    owners: Arc<ResourceCache<O>>,
    catalog: Arc<ResourceCache<M>>,
    association: Arc<AssociationClient<O, M>>,
    loaded: Mutex<Vec<M>>,
    pub pending: StatusCell<Vec<M>>,
    pub is_saving: StatusCell<bool>,
    pub error: StatusCell<Option<String>>,
}

impl<O: Resource, M: Resource> AssociationEditController<O, M> {
    pub fn new(
        owners: Arc<ResourceCache<O>>,
        catalog: Arc<ResourceCache<M>>,
        association: Arc<AssociationClient<O, M>>,
    ) -> Self {
        Self {
            owners,
            catalog,
            association,
            loaded: Mutex::new(Vec::new()),
            pending: StatusCell::new(Vec::new()),
            is_saving: StatusCell::new(false),
            error: StatusCell::new(None),
        }
    }

    /// Prepare to edit `owner`, or a new owner when `None`.
    ///
    /// Loads the member catalog if it has not been loaded yet.
    pub async fn init(&self, owner: Option<&str>) -> Result<bool> {
        self.cancel();
        if self.catalog.records.get().is_empty() {
            self.catalog.get().await?;
        }
        match owner {
            Some(owner) => self.load_existing(owner).await,
            None => Ok(true),
        }
    }

    /// Seed the selection with the owner's members, from cache when present.
    pub async fn load_existing(&self, owner: &str) -> Result<bool> {
        match self.association.load(owner).await? {
            Some(members) => {
                *self.loaded.lock() = members.clone();
                self.pending.set(members);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Add the catalog member `id` to the selection.
    ///
    /// Returns false when it is already selected or not in the catalog.
    pub fn add(&self, id: &str) -> bool {
        let Some(member) = self.available().into_iter().find(|m| m.id() == id) else {
            return false;
        };
        self.pending.update(|pending| pending.push(member));
        true
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut removed = false;
        self.pending.update(|pending| {
            let before = pending.len();
            pending.retain(|m| m.id() != id);
            removed = pending.len() != before;
        });
        removed
    }

    /// Catalog members not yet selected, in catalog order.
    pub fn available(&self) -> Vec<M> {
        let pending = self.pending.get();
        self.catalog
            .records
            .get()
            .into_iter()
            .filter(|m| !pending.iter().any(|p| p.id() == m.id()))
            .collect()
    }

    /// Ids to add and to remove so the owner ends up with the selection.
    pub fn diff(&self) -> (Vec<String>, Vec<String>) {
        let pending = self.pending.get();
        let loaded = self.loaded.lock().clone();

        let added = pending
            .iter()
            .filter(|p| !loaded.iter().any(|l| l.id() == p.id()))
            .map(|p| p.id().to_string())
            .collect();
        let removed = loaded
            .iter()
            .filter(|l| !pending.iter().any(|p| p.id() == l.id()))
            .map(|l| l.id().to_string())
            .collect();
        (added, removed)
    }

    /// Save the owner from `fields`, then its membership.
    ///
    /// `owner` is the id being edited, or `None` to create. The owner's
    /// association cache entry is dropped once membership calls have run.
    pub async fn commit(&self, owner: Option<&str>, fields: &Fields) -> Result<CommitOutcome<O>> {
        self.error.set(None);
        let _flag = BusyFlag::raise(&self.is_saving);

        let saved = self.owners.save(owner, fields).await?;
        if !saved.is_success() {
            return Ok(self.reject(saved.response));
        }
        let Some(record) = saved.data else {
            self.error.set(Some("Record not found".to_string()));
            return Ok(CommitOutcome::Rejected(saved.response));
        };

        let owner_id = record.id().to_string();
        let (added, removed) = self.diff();

        // Each applied step is folded into `loaded` so a retry only sends what is left.
        if !added.is_empty() {
            let outcome = self.association.add(&owner_id, &added).await;
            if let Some(rejected) = self.check(&owner_id, outcome)? {
                return Ok(rejected);
            }
            let pending = self.pending.get();
            self.loaded
                .lock()
                .extend(pending.into_iter().filter(|m| added.iter().any(|id| id == m.id())));
        }
        if !removed.is_empty() {
            let outcome = self.association.remove(&owner_id, &removed).await;
            if let Some(rejected) = self.check(&owner_id, outcome)? {
                return Ok(rejected);
            }
            self.loaded.lock().retain(|m| !removed.iter().any(|id| id == m.id()));
        }

        self.association.invalidate(&owner_id);
        tracing::info!(owner = %owner_id, added = added.len(), removed = removed.len(), "Saved membership");

        self.loaded.lock().clear();
        self.pending.set(Vec::new());
        Ok(CommitOutcome::Saved(record))
    }

    /// Drop the selection without saving.
    pub fn cancel(&self) {
        self.loaded.lock().clear();
        self.pending.set(Vec::new());
        self.error.set(None);
    }

    fn check(
        &self,
        owner: &str,
        outcome: Result<Outcome<Vec<M>>>,
    ) -> Result<Option<CommitOutcome<O>>> {
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                self.association.invalidate(owner);
                return Err(e);
            }
        };
        if outcome.is_success() {
            return Ok(None);
        }
        self.association.invalidate(owner);
        Ok(Some(self.reject(outcome.response)))
    }

    fn reject(&self, response: ApiResponse) -> CommitOutcome<O> {
        self.error.set(failure_message(&response, NOT_ALLOWED_TO_SAVE));
        CommitOutcome::Rejected(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::association::RolePermissions;
    use crate::remote::RemoteResourceClient;
    use crate::resources::{Permission, Role};
    use serde_json::json;

    fn permission(id: &str) -> Permission {
        Permission::from_api(&json!({"id": id, "name": format!("perm-{}", id)})).unwrap()
    }

    fn controller() -> AssociationEditController<Role, Permission> {
        let client = RemoteResourceClient::new("http://localhost:1").unwrap();
        let catalog = Arc::new(ResourceCache::new(client.clone()));
        catalog.records.set(vec![permission("p1"), permission("p2"), permission("p3")]);
        AssociationEditController::new(
            Arc::new(ResourceCache::new(client.clone())),
            catalog,
            Arc::new(RolePermissions::role_permissions(client)),
        )
    }

    fn ids(members: &[Permission]) -> Vec<&str> {
        members.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn test_add_ignores_duplicates_and_unknown_ids() {
        let controller = controller();
        assert!(controller.add("p2"));
        assert!(!controller.add("p2"));
        assert!(!controller.add("missing"));
        assert_eq!(ids(&controller.pending.get()), vec!["p2"]);
    }

    #[test]
    fn test_available_excludes_pending() {
        let controller = controller();
        controller.add("p3");
        controller.add("p1");
        assert_eq!(ids(&controller.available()), vec!["p2"]);

        assert!(controller.remove("p1"));
        assert!(!controller.remove("p1"));
        assert_eq!(ids(&controller.available()), vec!["p1", "p2"]);
    }

    #[test]
    fn test_available_never_overlaps_pending() {
        let controller = controller();
        let steps = ["+p1", "+p2", "-p1", "+p3", "+p1", "-p2", "-p3", "+p2"];
        for step in steps {
            let (op, id) = step.split_at(1);
            if op == "+" {
                controller.add(id);
            } else {
                controller.remove(id);
            }
            let pending = controller.pending.get();
            for option in controller.available() {
                assert!(!pending.iter().any(|p| p.id == option.id));
            }
        }
    }

    #[test]
    fn test_diff_against_loaded() {
        let controller = controller();
        *controller.loaded.lock() = vec![permission("p1"), permission("p2")];
        controller.pending.set(vec![permission("p2"), permission("p3")]);

        let (added, removed) = controller.diff();
        assert_eq!(added, vec!["p3".to_string()]);
        assert_eq!(removed, vec!["p1".to_string()]);
    }

    #[test]
    fn test_cancel_clears_selection() {
        let controller = controller();
        controller.add("p1");
        controller.cancel();
        assert!(controller.pending.get().is_empty());
        assert_eq!(controller.available().len(), 3);
    }
}
