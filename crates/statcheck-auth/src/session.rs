//! The session manager: single writer of the identity snapshot.
//!
//! Reconciles the onboarding marker, the provider session, and the backend
//! validation signal into one [`IdentitySnapshot`] published on a watch
//! channel. It also owns the side effects that hang off status transitions:
//! canonical-user sync (once per sign-in), anonymous-data adoption, and the
//! sign-in prompt raised by auth-gated actions.

use crate::directory::{validate_username, UserDirectory};
use crate::machine::{next_status, StatusInputs};
use crate::provider::IdentityProvider;
use crate::types::{
    AuthOutcome, AuthStatus, BackendSignal, CanonicalUser, IdentitySnapshot, OAuthProvider,
};
use crate::AuthResult;
use statcheck_storage::DeviceStore;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// Tracks which provider subject the canonical user has been synced for, so
/// the sync runs once per sign-in rather than on every recomputation.
#[derive(Default)]
struct SyncState {
    last_subject: Option<String>,
}

/// Owns the identity snapshot and every transition into and out of it.
///
/// All mutation goes through this type; readers subscribe via
/// [`subscribe`](SessionManager::subscribe) and treat each snapshot as
/// immutable.
pub struct SessionManager<P, D> {
    provider: P,
    directory: D,
    device: DeviceStore,
    backend: watch::Receiver<BackendSignal>,
    snapshot_tx: watch::Sender<IdentitySnapshot>,
    auth_prompt_tx: watch::Sender<bool>,
    onboarding_complete: AtomicBool,
    sync_state: Mutex<SyncState>,
}

impl<P: IdentityProvider, D: UserDirectory> SessionManager<P, D> {
    /// Bootstrap the manager from durable device state.
    ///
    /// Storage failures here are fatal: without the onboarding marker and
    /// the anonymous id the core cannot establish an identity at all.
    pub fn new(
        provider: P,
        directory: D,
        device: DeviceStore,
        backend: watch::Receiver<BackendSignal>,
    ) -> AuthResult<Self> {
        let onboarding_complete = device.onboarding_complete()?;
        let anonymous_id = if onboarding_complete {
            Some(device.get_or_create_anonymous_id()?)
        } else {
            device.anonymous_id()?
        };
        let status = if onboarding_complete {
            AuthStatus::Loading
        } else {
            AuthStatus::Onboarding
        };

        info!(?status, onboarding_complete, "session manager bootstrapped");

        let (snapshot_tx, _) = watch::channel(IdentitySnapshot {
            status,
            user: None,
            anonymous_id,
        });
        let (auth_prompt_tx, _) = watch::channel(false);

        Ok(Self {
            provider,
            directory,
            device,
            backend,
            snapshot_tx,
            auth_prompt_tx,
            onboarding_complete: AtomicBool::new(onboarding_complete),
            sync_state: Mutex::new(SyncState::default()),
        })
    }

    /// Subscribe to identity snapshots.
    pub fn subscribe(&self) -> watch::Receiver<IdentitySnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> IdentitySnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Subscribe to the sign-in prompt flag raised by gated actions.
    pub fn auth_prompt(&self) -> watch::Receiver<bool> {
        self.auth_prompt_tx.subscribe()
    }

    /// Dismiss the sign-in prompt.
    pub fn dismiss_auth_prompt(&self) {
        self.auth_prompt_tx.send_replace(false);
    }

    /// React to upstream changes until either input channel closes.
    pub async fn run(&self) -> AuthResult<()> {
        let mut backend = self.backend.clone();
        let mut provider_session = self.provider.session();
        loop {
            self.recompute()?;
            if let Err(e) = self.maybe_sync().await {
                // Sync is retried on the next upstream change; the subject
                // is only marked synced after success.
                warn!(error = %e, "canonical user sync failed");
            }
            tokio::select! {
                changed = backend.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = provider_session.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Re-derive the status from the latest inputs and publish the snapshot
    /// if anything changed. Safe to call any number of times.
    pub fn recompute(&self) -> AuthResult<()> {
        let inputs = StatusInputs {
            onboarding_complete: self.onboarding_complete.load(Ordering::SeqCst),
            backend: *self.backend.borrow(),
        };
        let current = self.snapshot_tx.borrow().status;
        let next = next_status(current, &inputs);

        // Guest and unauthenticated modes always need an anonymous id; it is
        // regenerated here if an account upgrade consumed the previous one.
        let anonymous_id = if matches!(next, AuthStatus::Guest | AuthStatus::Unauthenticated) {
            Some(self.device.get_or_create_anonymous_id()?)
        } else {
            self.device.anonymous_id()?
        };

        self.snapshot_tx.send_if_modified(|snapshot| {
            let mut changed = false;
            if snapshot.status != next {
                debug!(from = ?snapshot.status, to = ?next, "session status changed");
                snapshot.status = next;
                changed = true;
            }
            if snapshot.anonymous_id != anonymous_id {
                snapshot.anonymous_id = anonymous_id.clone();
                changed = true;
            }
            let keep_user = matches!(next, AuthStatus::Authenticated | AuthStatus::Loading);
            if !keep_user && snapshot.user.is_some() {
                snapshot.user = None;
                changed = true;
            }
            changed
        });
        Ok(())
    }

    /// Sync the canonical user once per sign-in.
    ///
    /// Runs only when authenticated, and only when the provider subject
    /// differs from the last successfully synced one. The first sync after
    /// a sign-in also adopts any data created under the anonymous id, then
    /// retires that id.
    pub async fn maybe_sync(&self) -> AuthResult<()> {
        if self.snapshot_tx.borrow().status != AuthStatus::Authenticated {
            return Ok(());
        }
        let session = {
            let rx = self.provider.session();
            let session = rx.borrow().clone();
            match session {
                Some(session) => session,
                None => return Ok(()),
            }
        };

        let mut sync = self.sync_state.lock().await;
        if sync.last_subject.as_deref() == Some(session.identity.subject.as_str()) {
            return Ok(());
        }

        info!(subject = %session.identity.subject, "syncing canonical user");
        let user = self.directory.get_or_create_user(&session.identity).await?;

        // The session may have rotated while the call was in flight; a
        // result for a subject we no longer hold must not touch the snapshot.
        let still_current = {
            let rx = self.provider.session();
            let current = rx.borrow();
            current
                .as_ref()
                .map(|s| s.identity.subject == session.identity.subject)
                .unwrap_or(false)
        };
        if !still_current {
            debug!("discarding sync result for a superseded session");
            return Ok(());
        }

        if let Some(anonymous_id) = self.device.anonymous_id()? {
            self.directory
                .adopt_anonymous_data(&anonymous_id, &user.id)
                .await?;
            self.device.clear_anonymous_id()?;
            info!(%anonymous_id, user_id = %user.id, "adopted anonymous data");
        }

        sync.last_subject = Some(session.identity.subject.clone());
        let anonymous_id = self.device.anonymous_id()?;
        self.snapshot_tx.send_modify(|snapshot| {
            snapshot.user = Some(user);
            snapshot.anonymous_id = anonymous_id.clone();
        });
        Ok(())
    }

    /// Persist the one-time onboarding marker and leave the onboarding state.
    pub fn mark_onboarding_complete(&self) -> AuthResult<()> {
        self.device.mark_onboarding_complete()?;
        self.onboarding_complete.store(true, Ordering::SeqCst);
        self.recompute()
    }

    /// Enter guest mode. Also completes onboarding when chosen from the
    /// first-run flow. Guest is sticky until an explicit sign-in or sign-up.
    pub fn continue_as_guest(&self) -> AuthResult<()> {
        if !self.onboarding_complete.load(Ordering::SeqCst) {
            self.device.mark_onboarding_complete()?;
            self.onboarding_complete.store(true, Ordering::SeqCst);
        }
        let anonymous_id = self.device.get_or_create_anonymous_id()?;
        info!(%anonymous_id, "continuing as guest");
        self.snapshot_tx.send_modify(|snapshot| {
            snapshot.status = AuthStatus::Guest;
            snapshot.user = None;
            snapshot.anonymous_id = Some(anonymous_id.clone());
        });
        Ok(())
    }

    /// Sign in with email and password.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<AuthOutcome> {
        let outcome = self.provider.sign_in_with_password(email, password).await?;
        self.complete_sign_in(outcome).await
    }

    /// Create an account with email and password.
    pub async fn sign_up_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<AuthOutcome> {
        let outcome = self.provider.sign_up_with_password(email, password).await?;
        self.complete_sign_in(outcome).await
    }

    /// Sign in through a browser OAuth flow.
    pub async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> AuthResult<AuthOutcome> {
        let outcome = self.provider.sign_in_with_oauth(provider).await?;
        self.complete_sign_in(outcome).await
    }

    /// Shared tail of every sign-in path: an explicit successful sign-in is
    /// the one thing that leaves guest mode.
    ///
    /// The status is held at `Loading` rather than recomputed here: the
    /// backend signal still describes the previous credential at this point,
    /// and deriving from it would flash `Unauthenticated` until the
    /// validator's first answer for the new one arrives.
    async fn complete_sign_in(&self, outcome: AuthOutcome) -> AuthResult<AuthOutcome> {
        if outcome.success {
            self.snapshot_tx.send_if_modified(|snapshot| {
                if matches!(
                    snapshot.status,
                    AuthStatus::Guest | AuthStatus::Unauthenticated
                ) {
                    snapshot.status = AuthStatus::Loading;
                    true
                } else {
                    false
                }
            });
            self.maybe_sync().await?;
            self.auth_prompt_tx.send_replace(false);
        }
        Ok(outcome)
    }

    /// Sign out: drop the provider credential and settle to unauthenticated
    /// immediately, without waiting for the backend signal to catch up.
    pub async fn sign_out(&self) -> AuthResult<()> {
        self.provider.sign_out().await?;
        self.sync_state.lock().await.last_subject = None;

        let anonymous_id = self.device.get_or_create_anonymous_id()?;
        info!("signed out");
        self.snapshot_tx.send_modify(|snapshot| {
            snapshot.status = AuthStatus::Unauthenticated;
            snapshot.user = None;
            snapshot.anonymous_id = Some(anonymous_id.clone());
        });
        Ok(())
    }

    /// Run an action only when authenticated; otherwise raise the sign-in
    /// prompt and return `None`. Guest mode does not count as authenticated.
    pub fn require_auth<T>(&self, action: impl FnOnce(&CanonicalUser) -> T) -> Option<T> {
        let snapshot = self.snapshot_tx.borrow().clone();
        match (snapshot.status, snapshot.user.as_ref()) {
            (AuthStatus::Authenticated, Some(user)) => Some(action(user)),
            _ => {
                debug!(status = ?snapshot.status, "gated action requires sign-in");
                self.auth_prompt_tx.send_replace(true);
                None
            }
        }
    }

    /// Claim a unique username. Shape violations and taken names come back
    /// as failed outcomes; only infrastructure trouble is an `Err`.
    pub async fn claim_username(&self, username: &str) -> AuthResult<AuthOutcome> {
        let shape = validate_username(username);
        if !shape.success {
            return Ok(shape);
        }

        let user_id = {
            let snapshot = self.snapshot_tx.borrow();
            match (snapshot.status, snapshot.user.as_ref()) {
                (AuthStatus::Authenticated, Some(user)) => user.id.clone(),
                _ => return Ok(AuthOutcome::failure("Sign in to claim a username")),
            }
        };

        let outcome = self.directory.claim_username(&user_id, username).await?;
        if outcome.success {
            self.snapshot_tx.send_modify(|snapshot| {
                if let Some(user) = snapshot.user.as_mut() {
                    user.username = Some(username.to_string());
                }
            });
        }
        Ok(outcome)
    }
}
