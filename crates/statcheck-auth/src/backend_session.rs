//! Backend credential validation.
//!
//! The provider's word is not enough: a credential only counts once the
//! backend has accepted it. [`SessionValidator`] watches the provider
//! session and publishes a [`BackendSignal`] that the status machine
//! consumes. While a check is in flight the signal reads `is_loading`, which
//! holds the status machine in place instead of flapping through
//! unauthenticated.

use crate::types::{BackendSignal, ProviderSession};
use crate::AuthResult;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Backend-side check of a provider credential.
#[allow(async_fn_in_trait)]
pub trait CredentialValidator {
    /// Ask the backend whether it accepts this access token.
    ///
    /// `Ok(false)` means the backend rejected the credential; `Err` means
    /// the answer is unknown (network trouble, backend down).
    async fn validate_credential(&self, access_token: &str) -> AuthResult<bool>;
}

/// Worker that keeps a [`BackendSignal`] in sync with the provider session.
pub struct SessionValidator<V> {
    validator: V,
    provider_session: watch::Receiver<Option<ProviderSession>>,
    signal_tx: watch::Sender<BackendSignal>,
}

impl<V: CredentialValidator> SessionValidator<V> {
    pub fn new(validator: V, provider_session: watch::Receiver<Option<ProviderSession>>) -> Self {
        let (signal_tx, _) = watch::channel(BackendSignal::default());
        Self {
            validator,
            provider_session,
            signal_tx,
        }
    }

    /// Subscribe to the validation signal.
    pub fn subscribe(&self) -> watch::Receiver<BackendSignal> {
        self.signal_tx.subscribe()
    }

    /// Validate the provider session as it currently stands.
    pub async fn revalidate(&self) {
        let token = self
            .provider_session
            .borrow()
            .as_ref()
            .map(|s| s.access_token.clone());

        let token = match token {
            Some(token) => token,
            None => {
                self.signal_tx.send_replace(BackendSignal {
                    validated: false,
                    is_loading: false,
                });
                return;
            }
        };

        self.signal_tx.send_modify(|signal| signal.is_loading = true);

        let result = self.validator.validate_credential(&token).await;

        // The session may have changed while the check was in flight; a
        // response for a token we no longer hold is discarded and the next
        // loop iteration validates the current one.
        let still_current = self
            .provider_session
            .borrow()
            .as_ref()
            .map(|s| s.access_token == token)
            .unwrap_or(false);
        if !still_current {
            debug!("discarding validation response for a superseded credential");
            return;
        }

        match result {
            Ok(validated) => {
                debug!(validated, "backend credential check settled");
                self.signal_tx.send_replace(BackendSignal {
                    validated,
                    is_loading: false,
                });
            }
            Err(e) => {
                // Unknown answer: keep the last known validated value rather
                // than kicking an authenticated session out over a blip.
                warn!(error = %e, "backend credential check failed");
                self.signal_tx.send_modify(|signal| signal.is_loading = false);
            }
        }
    }

    /// Run until the provider session channel closes.
    pub async fn run(mut self) {
        loop {
            self.revalidate().await;
            if self.provider_session.changed().await.is_err() {
                break;
            }
        }
    }
}
