//! Storage key constants.

/// Storage keys used by the identity core.
pub struct StorageKeys;

impl StorageKeys {
    /// Anonymous identity used for guest and unauthenticated data.
    pub const ANONYMOUS_ID: &'static str = "statcheck_anonymous_id";

    /// One-time "first run completed" marker.
    pub const ONBOARDING_COMPLETE: &'static str = "statcheck_onboarding_complete";
}
