//! Owner-to-members association: client calls and local cache.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::cache::{item_path, record_failure, Outcome};
use crate::cell::{BusyFlag, StatusCell};
use crate::error::{ClientError, Result};
use crate::guard::InFlightGuard;
use crate::remote::{ApiResponse, RemoteResourceClient};
use crate::resources::{Permission, Resource, Role};

// ═══════════════════════════════════════════════════════════════════════════════
// Association Cache
// ═══════════════════════════════════════════════════════════════════════════════

/// Last-fetched member list per owner.
///
/// Each owner has a generation that [`invalidate`](Self::invalidate) bumps.
/// A fetch records the generation before it starts and passes it to
/// [`put`](Self::put); if the owner was invalidated in between, the stale
/// list is discarded instead of cached.
#[derive(Debug)]
pub struct AssociationCache<M> {
    state: Mutex<CacheState<M>>,
}

#[derive(Debug)]
struct CacheState<M> {
    entries: HashMap<String, Vec<M>>,
    generations: HashMap<String, u64>,
}

impl<M: Clone> AssociationCache<M> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                generations: HashMap::new(),
            }),
        }
    }

    pub fn get(&self, owner: &str) -> Option<Vec<M>> {
        self.state.lock().entries.get(owner).cloned()
    }

    pub fn contains(&self, owner: &str) -> bool {
        self.state.lock().entries.contains_key(owner)
    }

    pub fn generation(&self, owner: &str) -> u64 {
        self.state.lock().generations.get(owner).copied().unwrap_or(0)
    }

    /// Cache `members` if `owner` has not been invalidated since `generation`.
    pub fn put(&self, owner: &str, generation: u64, members: Vec<M>) -> bool {
        let mut state = self.state.lock();
        let current = state.generations.get(owner).copied().unwrap_or(0);
        if current != generation {
            return false;
        }
        state.entries.insert(owner.to_string(), members);
        true
    }

    pub fn invalidate(&self, owner: &str) {
        let mut state = self.state.lock();
        state.entries.remove(owner);
        *state.generations.entry(owner.to_string()).or_insert(0) += 1;
    }
}

impl<M: Clone> Default for AssociationCache<M> {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Association Client
// ═══════════════════════════════════════════════════════════════════════════════

/// List, add and remove calls for `{owner}/{id}/{members}`.
///
/// Adds send the member ids as a JSON array body; removes send them as
/// repeated query values. Any successful add or remove drops the owner's
/// cache entry.
pub struct AssociationClient<O, M> {
    client: RemoteResourceClient,
    member_segment: &'static str,
    query_key: &'static str,
    cache: Arc<AssociationCache<M>>,
    guard: InFlightGuard,
    pub is_loading: StatusCell<bool>,
    pub load_error: StatusCell<Option<ApiResponse>>,
    _owner: PhantomData<fn() -> O>,
}

/// Member lists of every owner share `is_loading` and `load_error`.
const LIST_TURN: &str = "list";

/// The permissions granted to a role.
pub type RolePermissions = AssociationClient<Role, Permission>;

impl RolePermissions {
    pub fn role_permissions(client: RemoteResourceClient) -> Self {
        Self::new(client, "permissions", "permissionIds")
    }
}

impl<O: Resource, M: Resource> AssociationClient<O, M> {
    pub fn new(client: RemoteResourceClient, member_segment: &'static str, query_key: &'static str) -> Self {
        Self {
            client,
            member_segment,
            query_key,
            cache: Arc::new(AssociationCache::new()),
            guard: InFlightGuard::new(),
            is_loading: StatusCell::new(false),
            load_error: StatusCell::new(None),
            _owner: PhantomData,
        }
    }

    pub fn cache(&self) -> &AssociationCache<M> {
        &self.cache
    }

    pub fn invalidate(&self, owner: &str) {
        self.cache.invalidate(owner);
    }

    fn path(&self, owner: &str) -> String {
        format!("{}/{}", item_path::<O>(owner), self.member_segment)
    }

    /// Cached members of `owner`, fetching them on a miss.
    ///
    /// `None` means the fetch failed; the response is in `load_error`.
    pub async fn load(&self, owner: &str) -> Result<Option<Vec<M>>> {
        if let Some(members) = self.cache.get(owner) {
            return Ok(Some(members));
        }

        let generation = self.cache.generation(owner);
        let outcome = self.list(owner).await?;
        match outcome.data {
            Some(members) => {
                if !self.cache.put(owner, generation, members.clone()) {
                    tracing::debug!(owner = %owner, "Discarded member list invalidated mid-fetch");
                }
                Ok(Some(members))
            }
            None => Ok(None),
        }
    }

    /// Fetch the members of `owner`, bypassing the cache.
    pub async fn list(&self, owner: &str) -> Result<Outcome<Vec<M>>> {
        let path = self.path(owner);
        let _turn = self.guard.acquire(LIST_TURN).await;
        self.load_error.set(None);

        let flag = BusyFlag::raise(&self.is_loading);
        let response = self.client.get(&path).await;
        drop(flag);
        let response = response?;

        if !response.is_success() {
            record_failure(&self.load_error, &response);
            return Ok(Outcome::failed(response));
        }
        let members = self.decode_members(&path, &response.body)?;
        Ok(Outcome::ok(response, Some(members)))
    }

    /// Associate `members` with `owner`. Fails as a whole on any duplicate or
    /// unknown id.
    pub async fn add(&self, owner: &str, members: &[String]) -> Result<Outcome<Vec<M>>> {
        let path = self.path(owner);
        let _turn = self.guard.acquire(&path).await;

        let body = Value::from(members.to_vec());
        let response = self.client.put(&path, &body).await?;
        self.finish_mutation(owner, &path, response)
    }

    /// Dissociate `members` from `owner`. Pairs that do not exist are ignored.
    pub async fn remove(&self, owner: &str, members: &[String]) -> Result<Outcome<Vec<M>>> {
        let path = self.path(owner);
        let _turn = self.guard.acquire(&path).await;

        let query: Vec<(&str, &str)> = members.iter().map(|id| (self.query_key, id.as_str())).collect();
        let response = self.client.delete_with_query(&path, &query).await?;
        self.finish_mutation(owner, &path, response)
    }

    fn finish_mutation(&self, owner: &str, path: &str, response: ApiResponse) -> Result<Outcome<Vec<M>>> {
        if !response.is_success() {
            return Ok(Outcome::failed(response));
        }
        self.cache.invalidate(owner);
        let members = self.decode_members(path, &response.body)?;
        Ok(Outcome::ok(response, Some(members)))
    }

    fn decode_members(&self, path: &str, body: &Value) -> Result<Vec<M>> {
        let url = self.client.url(path);
        body.get("records")
            .and_then(Value::as_array)
            .ok_or_else(|| ClientError::decode(&url, "missing records"))?
            .iter()
            .map(M::from_api)
            .collect::<serde_json::Result<Vec<M>>>()
            .map_err(|e| ClientError::decode(&url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_and_get() {
        let cache = AssociationCache::new();
        assert!(cache.get("r1").is_none());

        let generation = cache.generation("r1");
        assert!(cache.put("r1", generation, vec!["p1"]));
        assert_eq!(cache.get("r1"), Some(vec!["p1"]));
    }

    #[test]
    fn test_invalidate_removes_entry() {
        let cache = AssociationCache::new();
        cache.put("r1", 0, vec!["p1"]);
        cache.invalidate("r1");
        assert!(!cache.contains("r1"));
    }

    #[test]
    fn test_stale_put_is_discarded() {
        let cache = AssociationCache::new();
        let generation = cache.generation("r1");

        cache.invalidate("r1");
        assert!(!cache.put("r1", generation, vec!["stale"]));
        assert!(cache.get("r1").is_none());

        assert!(cache.put("r1", cache.generation("r1"), vec!["fresh"]));
    }

    #[test]
    fn test_owners_are_independent() {
        let cache = AssociationCache::new();
        cache.put("r1", 0, vec![1]);
        cache.put("r2", 0, vec![2]);
        cache.invalidate("r1");
        assert_eq!(cache.get("r2"), Some(vec![2]));
    }

    #[test]
    fn test_role_permissions_path() {
        let client = RemoteResourceClient::new("http://localhost:8080").unwrap();
        let association = RolePermissions::role_permissions(client);
        assert_eq!(association.path("abc"), "roles/abc/permissions");
    }
}
