//! Identity and authorization core for the Statcheck clients.
//!
//! This crate reconciles three mutually exclusive identity modes
//! (first-run onboarding, anonymous guest, fully authenticated account)
//! into one authoritative session status, and derives the `user_id` every
//! data query is keyed by. It provides:
//! - The identity provider adapter (password + OAuth via local callback)
//! - The backend session validation signal
//! - The session status machine and identity snapshot
//! - Canonical-user sync with anonymous-data adoption
//! - The auth-gated action helper
//!
//! Platforms supply three adapters: durable storage
//! ([`statcheck_storage::DeviceStorage`]), an [`IdentityProvider`], and a
//! [`UserDirectory`] + [`CredentialValidator`] pair for the backend.

mod backend_session;
mod directory;
mod error;
mod machine;
mod oauth;
mod provider;
mod session;
mod types;

pub use backend_session::{CredentialValidator, SessionValidator};
pub use directory::{validate_username, UserDirectory};
pub use error::{AuthError, AuthResult};
pub use machine::{next_status, StatusInputs};
pub use oauth::{CallbackOutcome, CallbackServer, DEFAULT_OAUTH_PORT, DEFAULT_OAUTH_TIMEOUT_SECS};
pub use provider::{IdentityProvider, ProviderClient};
pub use session::SessionManager;
pub use types::{
    AuthOutcome, AuthStatus, BackendSignal, CanonicalUser, IdentitySnapshot, OAuthProvider,
    ProviderIdentity, ProviderSession,
};
