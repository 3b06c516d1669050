//! List data model.
//!
//! Players inside a list are kept in a dense order: after any mutation the
//! `order` fields read exactly 0..n-1 in vector position. Every mutation is
//! a whole-record read-modify-write, so the invariant is re-established
//! locally and persisted atomically by the store.

use serde::{Deserialize, Serialize};

/// A player entry in a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPlayer {
    /// Stable id of the tracked player.
    pub player_id: String,
    /// Dense position within the list (0-based).
    pub order: u32,
    /// When the player was added (unix millis).
    pub added_at: i64,
}

/// A shared link attached to a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListLink {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Dense position within the list (0-based).
    pub order: u32,
}

/// Result of adding a player: duplicates are reported, never duplicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddPlayerOutcome {
    Added,
    AlreadyExists,
}

/// A user-owned list of tracked players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerList {
    pub id: String,
    /// Owning identity: an anonymous id or a canonical user id.
    pub owner_user_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub players: Vec<ListPlayer>,
    #[serde(default)]
    pub links: Vec<ListLink>,
    pub created_at: i64,
    pub updated_at: i64,
    /// Soft-delete marker; deleted lists are retained but never listed.
    #[serde(default)]
    pub deleted_at: Option<i64>,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl PlayerList {
    /// Create an empty list.
    pub fn new(
        id: impl Into<String>,
        owner_user_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            owner_user_id: owner_user_id.into(),
            name: name.into(),
            description: None,
            players: Vec::new(),
            links: Vec::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Whether the list has been soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Soft-delete the list.
    pub fn mark_deleted(&mut self) {
        let now = now_millis();
        self.deleted_at = Some(now);
        self.updated_at = now;
    }

    /// Add a player at the end of the list. Adding a player that is already
    /// present reports [`AddPlayerOutcome::AlreadyExists`] and changes
    /// nothing.
    pub fn add_player(&mut self, player_id: &str) -> AddPlayerOutcome {
        if self.players.iter().any(|p| p.player_id == player_id) {
            return AddPlayerOutcome::AlreadyExists;
        }
        self.players.push(ListPlayer {
            player_id: player_id.to_string(),
            order: self.players.len() as u32,
            added_at: now_millis(),
        });
        self.updated_at = now_millis();
        AddPlayerOutcome::Added
    }

    /// Remove a player and close the gap in the order. Returns false when
    /// the player was not in the list.
    pub fn remove_player(&mut self, player_id: &str) -> bool {
        let before = self.players.len();
        self.players.retain(|p| p.player_id != player_id);
        if self.players.len() == before {
            return false;
        }
        self.renumber_players();
        self.updated_at = now_millis();
        true
    }

    /// Rearrange players to match `player_ids` exactly. The input must be a
    /// permutation of the current players; otherwise nothing changes and
    /// false is returned.
    pub fn reorder_players(&mut self, player_ids: &[String]) -> bool {
        if player_ids.len() != self.players.len() {
            return false;
        }
        let mut reordered = Vec::with_capacity(self.players.len());
        for id in player_ids {
            match self.players.iter().find(|p| p.player_id == *id) {
                Some(player) => reordered.push(player.clone()),
                None => return false,
            }
        }
        // Equal lengths and every id found: reject repeats.
        let mut seen: Vec<&str> = player_ids.iter().map(String::as_str).collect();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != player_ids.len() {
            return false;
        }
        self.players = reordered;
        self.renumber_players();
        self.updated_at = now_millis();
        true
    }

    /// Append a link and return its generated id.
    pub fn add_link(&mut self, url: &str, title: Option<&str>) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.links.push(ListLink {
            id: id.clone(),
            url: url.to_string(),
            title: title.map(str::to_string),
            order: self.links.len() as u32,
        });
        self.updated_at = now_millis();
        id
    }

    /// Rearrange links to match `link_ids` exactly. Same permutation rules
    /// as [`reorder_players`](Self::reorder_players).
    pub fn reorder_links(&mut self, link_ids: &[String]) -> bool {
        if link_ids.len() != self.links.len() {
            return false;
        }
        let mut reordered = Vec::with_capacity(self.links.len());
        for id in link_ids {
            match self.links.iter().find(|l| l.id == *id) {
                Some(link) => reordered.push(link.clone()),
                None => return false,
            }
        }
        let mut seen: Vec<&str> = link_ids.iter().map(String::as_str).collect();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != link_ids.len() {
            return false;
        }
        self.links = reordered;
        for (position, link) in self.links.iter_mut().enumerate() {
            link.order = position as u32;
        }
        self.updated_at = now_millis();
        true
    }

    /// Remove a link and close the gap in the order.
    pub fn remove_link(&mut self, link_id: &str) -> bool {
        let before = self.links.len();
        self.links.retain(|l| l.id != link_id);
        if self.links.len() == before {
            return false;
        }
        for (position, link) in self.links.iter_mut().enumerate() {
            link.order = position as u32;
        }
        self.updated_at = now_millis();
        true
    }

    fn renumber_players(&mut self) {
        for (position, player) in self.players.iter_mut().enumerate() {
            player.order = position as u32;
        }
    }

    /// Player ids in list order.
    pub fn player_ids(&self) -> Vec<&str> {
        self.players.iter().map(|p| p.player_id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_contiguous(list: &PlayerList) {
        for (position, player) in list.players.iter().enumerate() {
            assert_eq!(player.order, position as u32);
        }
        for (position, link) in list.links.iter().enumerate() {
            assert_eq!(link.order, position as u32);
        }
    }

    fn list_with_players(ids: &[&str]) -> PlayerList {
        let mut list = PlayerList::new("list-1", "anon_1_abc", "Starters");
        for id in ids {
            assert_eq!(list.add_player(id), AddPlayerOutcome::Added);
        }
        list
    }

    #[test]
    fn players_append_in_order() {
        let list = list_with_players(&["p1", "p2", "p3"]);
        assert_eq!(list.player_ids(), vec!["p1", "p2", "p3"]);
        assert_contiguous(&list);
    }

    #[test]
    fn duplicate_add_is_reported_and_changes_nothing() {
        let mut list = list_with_players(&["p1", "p2"]);
        assert_eq!(list.add_player("p1"), AddPlayerOutcome::AlreadyExists);
        assert_eq!(list.player_ids(), vec!["p1", "p2"]);
        assert_contiguous(&list);
    }

    #[test]
    fn remove_closes_the_gap() {
        let mut list = list_with_players(&["p1", "p2", "p3", "p4"]);

        assert!(list.remove_player("p2"));
        assert_eq!(list.player_ids(), vec!["p1", "p3", "p4"]);
        assert_contiguous(&list);

        // Removing the first entry renumbers everything behind it.
        assert!(list.remove_player("p1"));
        assert_eq!(list.player_ids(), vec!["p3", "p4"]);
        assert_contiguous(&list);
    }

    #[test]
    fn remove_missing_player_is_a_noop() {
        let mut list = list_with_players(&["p1"]);
        assert!(!list.remove_player("p9"));
        assert_eq!(list.player_ids(), vec!["p1"]);
    }

    #[test]
    fn reorder_applies_the_permutation() {
        let mut list = list_with_players(&["p1", "p2", "p3"]);
        let order = vec!["p3".to_string(), "p1".to_string(), "p2".to_string()];

        assert!(list.reorder_players(&order));
        assert_eq!(list.player_ids(), vec!["p3", "p1", "p2"]);
        assert_contiguous(&list);
    }

    #[test]
    fn reorder_rejects_non_permutations() {
        let mut list = list_with_players(&["p1", "p2", "p3"]);

        // Wrong length.
        assert!(!list.reorder_players(&["p1".to_string(), "p2".to_string()]));
        // Unknown id.
        assert!(!list.reorder_players(&[
            "p1".to_string(),
            "p2".to_string(),
            "p9".to_string()
        ]));
        // Repeated id.
        assert!(!list.reorder_players(&[
            "p1".to_string(),
            "p2".to_string(),
            "p2".to_string()
        ]));

        // Untouched on every rejection.
        assert_eq!(list.player_ids(), vec!["p1", "p2", "p3"]);
        assert_contiguous(&list);
    }

    #[test]
    fn links_get_unique_ids_and_dense_orders() {
        let mut list = PlayerList::new("list-1", "anon_1_abc", "Starters");
        let a = list.add_link("https://example.com/a", Some("A"));
        let b = list.add_link("https://example.com/b", None);
        assert_ne!(a, b);
        assert_contiguous(&list);

        assert!(list.remove_link(&a));
        assert_eq!(list.links.len(), 1);
        assert_eq!(list.links[0].id, b);
        assert_contiguous(&list);

        assert!(!list.remove_link("nope"));
    }

    #[test]
    fn reorder_links_applies_the_permutation() {
        let mut list = PlayerList::new("list-1", "anon_1_abc", "Starters");
        let a = list.add_link("https://example.com/a", None);
        let b = list.add_link("https://example.com/b", None);
        let c = list.add_link("https://example.com/c", None);

        assert!(list.reorder_links(&[c.clone(), a.clone(), b.clone()]));
        let ids: Vec<&str> = list.links.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec![c.as_str(), a.as_str(), b.as_str()]);
        assert_contiguous(&list);

        // Not a permutation: rejected, untouched.
        assert!(!list.reorder_links(&[a.clone(), a.clone(), b.clone()]));
        assert!(!list.reorder_links(&[a, b]));
    }

    #[test]
    fn soft_delete_keeps_the_record() {
        let mut list = list_with_players(&["p1"]);
        assert!(!list.is_deleted());

        list.mark_deleted();
        assert!(list.is_deleted());
        assert_eq!(list.player_ids(), vec!["p1"]);
    }
}
