//! Resource quota gate.
//!
//! Free-tier limits are product policy, not failures: the gate answers a
//! yes/no that callers turn into either the creation itself or an upgrade
//! prompt. Counts are always taken from the authoritative store at decision
//! time, never from cached UI state.

use statcheck_auth::CanonicalUser;

/// Lists a free-tier identity may own.
pub const FREE_LIST_LIMIT: usize = 1;

/// Links a free-tier identity may attach to a list.
pub const FREE_LINK_LIMIT: usize = 3;

/// Billing tier the quota gate keys off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Free,
    Pro,
}

impl Tier {
    /// Tier for the current identity. Anonymous and guest identities have
    /// no canonical user and are always free tier.
    pub fn for_user(user: Option<&CanonicalUser>) -> Tier {
        match user {
            Some(user) if user.pro => Tier::Pro,
            _ => Tier::Free,
        }
    }
}

/// Quota-limited resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    List,
    Link,
}

impl ResourceKind {
    /// The free-tier ceiling for this resource.
    fn free_limit(&self) -> usize {
        match self {
            ResourceKind::List => FREE_LIST_LIMIT,
            ResourceKind::Link => FREE_LINK_LIMIT,
        }
    }
}

/// Whether an identity on `tier` that already owns `current_count` of
/// `kind` may create one more.
pub fn can_create(tier: Tier, kind: ResourceKind, current_count: usize) -> bool {
    match tier {
        Tier::Pro => true,
        Tier::Free => current_count < kind.free_limit(),
    }
}
