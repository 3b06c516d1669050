//! List operations bound to the current identity.
//!
//! Every operation re-reads the identity snapshot at the point of use: the
//! owning user id can change between a caller deciding to act and the
//! operation running (sign-in mid-flight, adoption re-keying data), so
//! nothing here caches it.

use crate::quota::{can_create, ResourceKind, Tier};
use crate::store::ListStore;
use crate::types::{AddPlayerOutcome, PlayerList};
use crate::{ListError, ListResult};
use statcheck_auth::IdentitySnapshot;
use tokio::sync::watch;
use tracing::{debug, info};

/// Result of a quota-gated list creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(PlayerList),
    /// Free-tier ceiling reached; render an upgrade prompt.
    UpgradeRequired,
}

/// Result of a quota-gated link creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddLinkOutcome {
    Added { link_id: String },
    UpgradeRequired,
}

/// List operations for whoever the identity snapshot currently names.
pub struct ListService<S> {
    store: S,
    identity: watch::Receiver<IdentitySnapshot>,
}

impl<S: ListStore> ListService<S> {
    pub fn new(store: S, identity: watch::Receiver<IdentitySnapshot>) -> Self {
        Self { store, identity }
    }

    /// The identity and tier to run an operation as.
    fn current_identity(&self) -> ListResult<(String, Tier)> {
        let snapshot = self.identity.borrow().clone();
        let user_id = snapshot.user_id().ok_or(ListError::NotReady)?.to_string();
        let tier = Tier::for_user(snapshot.user.as_ref());
        Ok((user_id, tier))
    }

    /// Fetch a list and check it is live and owned by `owner`.
    async fn fetch_owned(&self, list_id: &str, owner: &str) -> ListResult<PlayerList> {
        let list = self
            .store
            .get_list(list_id)
            .await?
            .filter(|l| !l.is_deleted())
            .ok_or_else(|| ListError::NotFound(list_id.to_string()))?;
        if list.owner_user_id != owner {
            return Err(ListError::NotOwner(list_id.to_string()));
        }
        Ok(list)
    }

    /// All live lists owned by the current identity.
    pub async fn my_lists(&self) -> ListResult<Vec<PlayerList>> {
        let (owner, _) = self.current_identity()?;
        self.store.lists_for_owner(&owner).await
    }

    /// Create a list, subject to the tier quota. The count feeding the gate
    /// comes from the store, not from whatever the caller has rendered.
    pub async fn create_list(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> ListResult<CreateOutcome> {
        let (owner, tier) = self.current_identity()?;

        let current_count = self.store.lists_for_owner(&owner).await?.len();
        if !can_create(tier, ResourceKind::List, current_count) {
            debug!(%owner, current_count, "list creation blocked by quota");
            return Ok(CreateOutcome::UpgradeRequired);
        }

        let mut list = PlayerList::new(uuid::Uuid::new_v4().to_string(), owner, name);
        list.description = description.map(str::to_string);
        self.store.put_list(&list).await?;
        info!(list_id = %list.id, "created list");
        Ok(CreateOutcome::Created(list))
    }

    /// Rename a list.
    pub async fn rename_list(&self, list_id: &str, name: &str) -> ListResult<()> {
        let (owner, _) = self.current_identity()?;
        let mut list = self.fetch_owned(list_id, &owner).await?;
        list.name = name.to_string();
        self.store.put_list(&list).await
    }

    /// Soft-delete a list. The record is retained but disappears from
    /// listings immediately.
    pub async fn delete_list(&self, list_id: &str) -> ListResult<()> {
        let (owner, _) = self.current_identity()?;
        let mut list = self.fetch_owned(list_id, &owner).await?;
        list.mark_deleted();
        self.store.put_list(&list).await?;
        info!(%list_id, "deleted list");
        Ok(())
    }

    /// Add a player to a list. Duplicates are reported, not duplicated.
    pub async fn add_player(&self, list_id: &str, player_id: &str) -> ListResult<AddPlayerOutcome> {
        let (owner, _) = self.current_identity()?;
        let mut list = self.fetch_owned(list_id, &owner).await?;
        let outcome = list.add_player(player_id);
        if outcome == AddPlayerOutcome::Added {
            self.store.put_list(&list).await?;
        }
        Ok(outcome)
    }

    /// Remove a player from a list. Returns false when it was not there.
    pub async fn remove_player(&self, list_id: &str, player_id: &str) -> ListResult<bool> {
        let (owner, _) = self.current_identity()?;
        let mut list = self.fetch_owned(list_id, &owner).await?;
        if !list.remove_player(player_id) {
            return Ok(false);
        }
        self.store.put_list(&list).await?;
        Ok(true)
    }

    /// Rearrange a list's players to match `player_ids` exactly.
    pub async fn reorder_players(&self, list_id: &str, player_ids: &[String]) -> ListResult<()> {
        let (owner, _) = self.current_identity()?;
        let mut list = self.fetch_owned(list_id, &owner).await?;
        if !list.reorder_players(player_ids) {
            return Err(ListError::InvalidReorder(
                "input is not a permutation of the list's players".to_string(),
            ));
        }
        self.store.put_list(&list).await
    }

    /// Attach a link to a list, subject to the tier quota.
    pub async fn add_link(
        &self,
        list_id: &str,
        url: &str,
        title: Option<&str>,
    ) -> ListResult<AddLinkOutcome> {
        let (owner, tier) = self.current_identity()?;
        let mut list = self.fetch_owned(list_id, &owner).await?;

        if !can_create(tier, ResourceKind::Link, list.links.len()) {
            debug!(%list_id, "link creation blocked by quota");
            return Ok(AddLinkOutcome::UpgradeRequired);
        }

        let link_id = list.add_link(url, title);
        self.store.put_list(&list).await?;
        Ok(AddLinkOutcome::Added { link_id })
    }

    /// Rearrange a list's links to match `link_ids` exactly.
    pub async fn reorder_links(&self, list_id: &str, link_ids: &[String]) -> ListResult<()> {
        let (owner, _) = self.current_identity()?;
        let mut list = self.fetch_owned(list_id, &owner).await?;
        if !list.reorder_links(link_ids) {
            return Err(ListError::InvalidReorder(
                "input is not a permutation of the list's links".to_string(),
            ));
        }
        self.store.put_list(&list).await
    }

    /// Remove a link from a list. Returns false when it was not there.
    pub async fn remove_link(&self, list_id: &str, link_id: &str) -> ListResult<bool> {
        let (owner, _) = self.current_identity()?;
        let mut list = self.fetch_owned(list_id, &owner).await?;
        if !list.remove_link(link_id) {
            return Ok(false);
        }
        self.store.put_list(&list).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryListStore;
    use statcheck_auth::{AuthStatus, CanonicalUser};

    fn snapshot(
        status: AuthStatus,
        user: Option<CanonicalUser>,
        anon: Option<&str>,
    ) -> IdentitySnapshot {
        IdentitySnapshot {
            status,
            user,
            anonymous_id: anon.map(str::to_string),
        }
    }

    fn pro_user() -> CanonicalUser {
        CanonicalUser {
            id: "user-1".to_string(),
            email: None,
            name: None,
            username: Some("statking".to_string()),
            image: None,
            pro: true,
        }
    }

    fn guest_service(
        store: &MemoryListStore,
    ) -> (watch::Sender<IdentitySnapshot>, ListService<&MemoryListStore>) {
        let (tx, rx) = watch::channel(snapshot(AuthStatus::Guest, None, Some("anon_1_abc")));
        (tx, ListService::new(store, rx))
    }

    #[tokio::test]
    async fn operations_require_a_settled_identity() {
        let store = MemoryListStore::new();
        let (_tx, rx) = watch::channel(snapshot(AuthStatus::Loading, None, None));
        let service = ListService::new(&store, rx);

        assert!(matches!(service.my_lists().await, Err(ListError::NotReady)));
        assert!(matches!(
            service.create_list("Starters", None).await,
            Err(ListError::NotReady)
        ));
    }

    #[tokio::test]
    async fn free_tier_gets_one_list_then_an_upgrade_prompt() {
        let store = MemoryListStore::new();
        let (_tx, service) = guest_service(&store);

        let outcome = service.create_list("Starters", None).await.unwrap();
        assert!(matches!(outcome, CreateOutcome::Created(_)));

        let outcome = service.create_list("Bench", None).await.unwrap();
        assert_eq!(outcome, CreateOutcome::UpgradeRequired);

        assert_eq!(service.my_lists().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleting_the_only_list_frees_the_quota_slot() {
        let store = MemoryListStore::new();
        let (_tx, service) = guest_service(&store);

        let list = match service.create_list("Starters", None).await.unwrap() {
            CreateOutcome::Created(list) => list,
            other => panic!("unexpected outcome: {:?}", other),
        };
        service.delete_list(&list.id).await.unwrap();

        let outcome = service.create_list("Bench", None).await.unwrap();
        assert!(matches!(outcome, CreateOutcome::Created(_)));
    }

    #[tokio::test]
    async fn pro_tier_creates_without_limit() {
        let store = MemoryListStore::new();
        let (_tx, rx) = watch::channel(snapshot(
            AuthStatus::Authenticated,
            Some(pro_user()),
            None,
        ));
        let service = ListService::new(&store, rx);

        for i in 0..5 {
            let outcome = service.create_list(&format!("List {}", i), None).await.unwrap();
            assert!(matches!(outcome, CreateOutcome::Created(_)));
        }
        assert_eq!(service.my_lists().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn foreign_lists_are_not_touchable() {
        let store = MemoryListStore::new();
        store
            .put_list(&PlayerList::new("l-theirs", "anon_2_xyz", "Theirs"))
            .await
            .unwrap();
        let (_tx, service) = guest_service(&store);

        assert!(matches!(
            service.add_player("l-theirs", "p1").await,
            Err(ListError::NotOwner(_))
        ));
        assert!(matches!(
            service.delete_list("l-theirs").await,
            Err(ListError::NotOwner(_))
        ));
    }

    #[tokio::test]
    async fn deleted_lists_read_as_not_found() {
        let store = MemoryListStore::new();
        let (_tx, service) = guest_service(&store);

        let list = match service.create_list("Starters", None).await.unwrap() {
            CreateOutcome::Created(list) => list,
            other => panic!("unexpected outcome: {:?}", other),
        };
        service.delete_list(&list.id).await.unwrap();

        assert!(matches!(
            service.add_player(&list.id, "p1").await,
            Err(ListError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn player_mutations_persist_with_dense_orders() {
        let store = MemoryListStore::new();
        let (_tx, service) = guest_service(&store);

        let list = match service.create_list("Starters", None).await.unwrap() {
            CreateOutcome::Created(list) => list,
            other => panic!("unexpected outcome: {:?}", other),
        };

        service.add_player(&list.id, "p1").await.unwrap();
        service.add_player(&list.id, "p2").await.unwrap();
        service.add_player(&list.id, "p3").await.unwrap();
        assert_eq!(
            service.add_player(&list.id, "p2").await.unwrap(),
            AddPlayerOutcome::AlreadyExists
        );

        assert!(service.remove_player(&list.id, "p2").await.unwrap());
        assert!(!service.remove_player(&list.id, "p2").await.unwrap());

        service
            .reorder_players(&list.id, &["p3".to_string(), "p1".to_string()])
            .await
            .unwrap();

        let stored = store.get_list(&list.id).await.unwrap().unwrap();
        assert_eq!(stored.player_ids(), vec!["p3", "p1"]);
        for (position, player) in stored.players.iter().enumerate() {
            assert_eq!(player.order, position as u32);
        }
    }

    #[tokio::test]
    async fn invalid_reorder_is_an_error_and_changes_nothing() {
        let store = MemoryListStore::new();
        let (_tx, service) = guest_service(&store);

        let list = match service.create_list("Starters", None).await.unwrap() {
            CreateOutcome::Created(list) => list,
            other => panic!("unexpected outcome: {:?}", other),
        };
        service.add_player(&list.id, "p1").await.unwrap();
        service.add_player(&list.id, "p2").await.unwrap();

        let result = service
            .reorder_players(&list.id, &["p1".to_string(), "p9".to_string()])
            .await;
        assert!(matches!(result, Err(ListError::InvalidReorder(_))));

        let stored = store.get_list(&list.id).await.unwrap().unwrap();
        assert_eq!(stored.player_ids(), vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn free_tier_links_stop_at_the_limit() {
        let store = MemoryListStore::new();
        let (_tx, service) = guest_service(&store);

        let list = match service.create_list("Starters", None).await.unwrap() {
            CreateOutcome::Created(list) => list,
            other => panic!("unexpected outcome: {:?}", other),
        };

        for i in 0..3 {
            let outcome = service
                .add_link(&list.id, &format!("https://example.com/{}", i), None)
                .await
                .unwrap();
            assert!(matches!(outcome, AddLinkOutcome::Added { .. }));
        }
        let outcome = service
            .add_link(&list.id, "https://example.com/4", None)
            .await
            .unwrap();
        assert_eq!(outcome, AddLinkOutcome::UpgradeRequired);

        // Removing one frees a slot.
        let stored = store.get_list(&list.id).await.unwrap().unwrap();
        let first_link = stored.links[0].id.clone();
        assert!(service.remove_link(&list.id, &first_link).await.unwrap());

        let outcome = service
            .add_link(&list.id, "https://example.com/5", Some("Highlights"))
            .await
            .unwrap();
        assert!(matches!(outcome, AddLinkOutcome::Added { .. }));
    }

    #[tokio::test]
    async fn links_can_be_reordered() {
        let store = MemoryListStore::new();
        let (_tx, service) = guest_service(&store);

        let list = match service.create_list("Starters", None).await.unwrap() {
            CreateOutcome::Created(list) => list,
            other => panic!("unexpected outcome: {:?}", other),
        };
        service
            .add_link(&list.id, "https://example.com/a", None)
            .await
            .unwrap();
        service
            .add_link(&list.id, "https://example.com/b", None)
            .await
            .unwrap();

        let stored = store.get_list(&list.id).await.unwrap().unwrap();
        let ids: Vec<String> = stored.links.iter().rev().map(|l| l.id.clone()).collect();
        service.reorder_links(&list.id, &ids).await.unwrap();

        let stored = store.get_list(&list.id).await.unwrap().unwrap();
        let after: Vec<String> = stored.links.iter().map(|l| l.id.clone()).collect();
        assert_eq!(after, ids);
        for (position, link) in stored.links.iter().enumerate() {
            assert_eq!(link.order, position as u32);
        }
    }

    #[tokio::test]
    async fn identity_changes_apply_to_the_next_operation() {
        let store = MemoryListStore::new();
        let (tx, service) = guest_service(&store);

        service.create_list("Starters", None).await.unwrap();

        // Adoption re-keys stored data, then the snapshot flips to the
        // canonical user; the service follows without being rebuilt.
        store.adopt_owner("anon_1_abc", "user-1").await.unwrap();
        tx.send_replace(snapshot(
            AuthStatus::Authenticated,
            Some(pro_user()),
            None,
        ));

        let lists = service.my_lists().await.unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].owner_user_id, "user-1");
    }
}
