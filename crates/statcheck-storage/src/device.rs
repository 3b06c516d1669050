//! High-level API for the per-device identity records.

use crate::{DeviceStorage, FileStorage, StorageKeys, StorageResult};
use rand::distributions::Alphanumeric;
use rand::Rng;
use statcheck_core::Paths;

/// Number of random characters appended to a generated anonymous id.
const ANONYMOUS_ID_SUFFIX_LEN: usize = 10;

/// Typed facade over device storage for the identity core.
///
/// Owns the anonymous pseudo-identity and the one-time onboarding marker.
/// Both are read at startup; storage failures here are surfaced as fatal
/// because the core cannot establish identity without them.
pub struct DeviceStore {
    storage: Box<dyn DeviceStorage>,
}

impl DeviceStore {
    /// Create a device store with the given storage backend.
    pub fn new(storage: Box<dyn DeviceStorage>) -> Self {
        Self { storage }
    }

    /// Open the default file-backed device store under the client paths.
    pub fn open(paths: &Paths) -> Self {
        Self::new(Box::new(FileStorage::new(paths.device_file())))
    }

    // ==========================================
    // Anonymous identity
    // ==========================================

    /// Get the persisted anonymous id, generating and persisting one on the
    /// first call. Subsequent calls (including after restart) return the same
    /// value unchanged.
    pub fn get_or_create_anonymous_id(&self) -> StorageResult<String> {
        if let Some(existing) = self.storage.get(StorageKeys::ANONYMOUS_ID)? {
            return Ok(existing);
        }

        let id = generate_anonymous_id();
        self.storage.set(StorageKeys::ANONYMOUS_ID, &id)?;
        tracing::info!(anonymous_id = %id, "generated anonymous identity");
        Ok(id)
    }

    /// Get the current anonymous id without creating one.
    pub fn anonymous_id(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::ANONYMOUS_ID)
    }

    /// Remove the persisted anonymous id (account upgrade, testing).
    pub fn clear_anonymous_id(&self) -> StorageResult<bool> {
        self.storage.delete(StorageKeys::ANONYMOUS_ID)
    }

    // ==========================================
    // Onboarding marker
    // ==========================================

    /// Check whether onboarding has been completed on this install.
    pub fn onboarding_complete(&self) -> StorageResult<bool> {
        Ok(self
            .storage
            .get(StorageKeys::ONBOARDING_COMPLETE)?
            .as_deref()
            == Some("true"))
    }

    /// Mark onboarding as complete. Once this succeeds the flag stays set
    /// for the lifetime of the install.
    pub fn mark_onboarding_complete(&self) -> StorageResult<()> {
        self.storage.set(StorageKeys::ONBOARDING_COMPLETE, "true")
    }

    /// Reset the onboarding marker (testing only).
    pub fn reset_onboarding(&self) -> StorageResult<bool> {
        self.storage.delete(StorageKeys::ONBOARDING_COMPLETE)
    }
}

/// Generate a fresh anonymous id: a monotonic timestamp plus random suffix.
fn generate_anonymous_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ANONYMOUS_ID_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!("anon_{}_{}", millis, suffix)
}
