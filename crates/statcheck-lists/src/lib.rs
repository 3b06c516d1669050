//! Player lists: the user-owned collections of tracked players.
//!
//! A list belongs to exactly one identity (anonymous id or canonical user
//! id), keeps its players in a contiguous order, and carries shared links.
//! Creation of lists and links passes through the resource quota gate, which
//! turns free-tier limits into upgrade prompts rather than errors.

mod error;
mod quota;
mod service;
mod store;
mod types;

pub use error::{ListError, ListResult};
pub use quota::{can_create, ResourceKind, Tier, FREE_LINK_LIMIT, FREE_LIST_LIMIT};
pub use service::{AddLinkOutcome, CreateOutcome, ListService};
pub use store::{ListStore, MemoryListStore};
pub use types::{AddPlayerOutcome, ListLink, ListPlayer, PlayerList};
