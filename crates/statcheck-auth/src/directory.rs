//! Backend user directory seam.
//!
//! The directory owns the canonical user table: idempotent get-or-create
//! keyed by provider subject, the explicit username claim, and adoption of
//! anonymous data after the first sign-in.

use crate::types::{AuthOutcome, CanonicalUser, ProviderIdentity};
use crate::AuthResult;

/// Username shape rules enforced before any backend call.
pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 20;

/// Backend operations on the canonical user table.
#[allow(async_fn_in_trait)]
pub trait UserDirectory {
    /// Ensure a canonical user exists for this provider identity and return
    /// it. Must be idempotent: repeat calls for the same subject return the
    /// same record and never duplicate it. Profile fields from the provider
    /// are refreshed on every call, but never the username.
    async fn get_or_create_user(&self, identity: &ProviderIdentity) -> AuthResult<CanonicalUser>;

    /// Claim a unique username for a user. A taken name is an expected
    /// failure, not an error.
    async fn claim_username(&self, user_id: &str, username: &str) -> AuthResult<AuthOutcome>;

    /// Re-key data created under an anonymous id to the canonical user.
    async fn adopt_anonymous_data(&self, anonymous_id: &str, user_id: &str) -> AuthResult<()>;
}

/// Check username shape: 3-20 characters, letters, digits and underscore.
///
/// Returns a failed outcome with the reason, or success when the shape is
/// acceptable (uniqueness is still decided by the backend).
pub fn validate_username(username: &str) -> AuthOutcome {
    let len = username.chars().count();
    if len < USERNAME_MIN_LEN {
        return AuthOutcome::failure(format!(
            "Username must be at least {} characters",
            USERNAME_MIN_LEN
        ));
    }
    if len > USERNAME_MAX_LEN {
        return AuthOutcome::failure(format!(
            "Username must be at most {} characters",
            USERNAME_MAX_LEN
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return AuthOutcome::failure(
            "Username may only contain letters, numbers and underscores",
        );
    }
    AuthOutcome::success()
}
