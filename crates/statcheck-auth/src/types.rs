//! Core identity types.

use serde::{Deserialize, Serialize};

/// The authoritative session status. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    /// Inputs are still settling (cold start, backend validation in flight).
    Loading,
    /// First run; the onboarding marker has not been persisted yet.
    Onboarding,
    /// No accepted credential; data is keyed by the anonymous id.
    Unauthenticated,
    /// Provider credential accepted by the backend.
    Authenticated,
    /// Explicitly chosen "continue as guest" mode. Sticky until the user
    /// signs in or signs up.
    Guest,
}

/// OAuth providers supported by this build.
///
/// A closed enum so adding or removing a provider is a compile-time-checked
/// change rather than string dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Apple,
    Google,
    Discord,
}

impl OAuthProvider {
    /// Wire tag used in provider authorize URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Apple => "apple",
            OAuthProvider::Google => "google",
            OAuthProvider::Discord => "discord",
        }
    }

    /// All providers this build knows about.
    pub fn all() -> [OAuthProvider; 3] {
        [
            OAuthProvider::Apple,
            OAuthProvider::Google,
            OAuthProvider::Discord,
        ]
    }
}

impl std::fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized result of a sign-in/sign-up attempt.
///
/// Expected failures (wrong credentials, cancelled OAuth, incomplete
/// multi-step flow) and transport failures both land here, so callers never
/// need a second error-handling path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    /// Whether the attempt succeeded.
    pub success: bool,
    /// Human-readable error message (if failed).
    pub error: Option<String>,
}

impl AuthOutcome {
    /// Create a successful outcome.
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    /// Create a failed outcome with a message.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Identity asserted by the external provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    /// The provider's stable subject identifier.
    pub subject: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

/// A credential currently held from the provider, plus who it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSession {
    /// Bearer token presented to the backend for validation.
    pub access_token: String,
    /// Identity asserted by the provider.
    pub identity: ProviderIdentity,
}

/// Canonical user record maintained by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalUser {
    /// Canonical user id (the provider subject, reused as the data key).
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Sparse; set only by the explicit username claim, never by sync.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    /// Paid tier flag; feeds the resource quota gate.
    #[serde(default)]
    pub pro: bool,
}

/// Reactive backend validation signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendSignal {
    /// Whether the held provider credential is accepted by the backend.
    pub validated: bool,
    /// Validation is in flight; status transitions are suppressed while set.
    pub is_loading: bool,
}

impl Default for BackendSignal {
    fn default() -> Self {
        // Cold start: nothing validated yet, treat as in flight so the
        // machine holds its current state instead of flapping.
        Self {
            validated: false,
            is_loading: true,
        }
    }
}

/// The latest identity state, published on a watch channel.
///
/// Single writer (the session manager), many readers. Readers must take a
/// fresh snapshot at the point of use — `user_id` can change between a UI
/// handler firing and its async continuation running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySnapshot {
    pub status: AuthStatus,
    /// Canonical user record; present only once authenticated and synced.
    pub user: Option<CanonicalUser>,
    /// Anonymous pseudo-identity; present once generated.
    pub anonymous_id: Option<String>,
}

impl Default for IdentitySnapshot {
    fn default() -> Self {
        Self {
            status: AuthStatus::Loading,
            user: None,
            anonymous_id: None,
        }
    }
}

impl IdentitySnapshot {
    /// The identity all data queries are keyed by.
    ///
    /// While authenticated but not yet synced (sync in flight or failed),
    /// data keeps flowing under the anonymous id until the next successful
    /// retry swaps in the canonical id.
    pub fn user_id(&self) -> Option<&str> {
        match self.status {
            AuthStatus::Authenticated => self
                .user
                .as_ref()
                .map(|u| u.id.as_str())
                .or(self.anonymous_id.as_deref()),
            AuthStatus::Guest | AuthStatus::Unauthenticated => self.anonymous_id.as_deref(),
            AuthStatus::Loading | AuthStatus::Onboarding => None,
        }
    }

    /// True once the status has settled on its final identity: the canonical
    /// user when authenticated, the anonymous id otherwise.
    pub fn is_ready(&self) -> bool {
        match self.status {
            AuthStatus::Loading | AuthStatus::Onboarding => false,
            AuthStatus::Authenticated => self.user.is_some(),
            AuthStatus::Guest | AuthStatus::Unauthenticated => self.anonymous_id.is_some(),
        }
    }

    /// True when authenticated but no username has been claimed yet.
    pub fn needs_username(&self) -> bool {
        self.status == AuthStatus::Authenticated
            && self
                .user
                .as_ref()
                .map(|u| u.username.is_none())
                .unwrap_or(false)
    }
}
