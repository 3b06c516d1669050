//! Persistence seam for lists.

use crate::types::PlayerList;
use crate::{ListError, ListResult};
use std::collections::HashMap;
use std::sync::Mutex;

/// Backend operations on the list table.
///
/// Writes are whole-record upserts: each mutation rewrites the full list so
/// the order invariant is persisted exactly as computed.
#[allow(async_fn_in_trait)]
pub trait ListStore {
    /// All live (non-deleted) lists owned by an identity.
    async fn lists_for_owner(&self, owner_user_id: &str) -> ListResult<Vec<PlayerList>>;

    /// Fetch a list by id, deleted or not.
    async fn get_list(&self, list_id: &str) -> ListResult<Option<PlayerList>>;

    /// Insert or replace a list.
    async fn put_list(&self, list: &PlayerList) -> ListResult<()>;

    /// Re-key every list owned by `anonymous_id` to `user_id`.
    async fn adopt_owner(&self, anonymous_id: &str, user_id: &str) -> ListResult<()>;
}

/// In-memory store for tests and offline use.
#[derive(Default)]
pub struct MemoryListStore {
    lists: Mutex<HashMap<String, PlayerList>>,
}

impl MemoryListStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> ListResult<std::sync::MutexGuard<'_, HashMap<String, PlayerList>>> {
        self.lists
            .lock()
            .map_err(|_| ListError::Store("list store lock poisoned".to_string()))
    }
}

impl ListStore for MemoryListStore {
    async fn lists_for_owner(&self, owner_user_id: &str) -> ListResult<Vec<PlayerList>> {
        let lists = self.locked()?;
        let mut owned: Vec<PlayerList> = lists
            .values()
            .filter(|l| l.owner_user_id == owner_user_id && !l.is_deleted())
            .cloned()
            .collect();
        owned.sort_by_key(|l| l.created_at);
        Ok(owned)
    }

    async fn get_list(&self, list_id: &str) -> ListResult<Option<PlayerList>> {
        Ok(self.locked()?.get(list_id).cloned())
    }

    async fn put_list(&self, list: &PlayerList) -> ListResult<()> {
        self.locked()?.insert(list.id.clone(), list.clone());
        Ok(())
    }

    async fn adopt_owner(&self, anonymous_id: &str, user_id: &str) -> ListResult<()> {
        for list in self.locked()?.values_mut() {
            if list.owner_user_id == anonymous_id {
                list.owner_user_id = user_id.to_string();
            }
        }
        Ok(())
    }
}

// MemoryListStore holds a plain Mutex; tests share it behind a reference.
impl ListStore for &MemoryListStore {
    async fn lists_for_owner(&self, owner_user_id: &str) -> ListResult<Vec<PlayerList>> {
        (**self).lists_for_owner(owner_user_id).await
    }

    async fn get_list(&self, list_id: &str) -> ListResult<Option<PlayerList>> {
        (**self).get_list(list_id).await
    }

    async fn put_list(&self, list: &PlayerList) -> ListResult<()> {
        (**self).put_list(list).await
    }

    async fn adopt_owner(&self, anonymous_id: &str, user_id: &str) -> ListResult<()> {
        (**self).adopt_owner(anonymous_id, user_id).await
    }
}
