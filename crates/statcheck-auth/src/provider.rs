//! Identity provider adapter.
//!
//! Wraps the hosted identity provider's REST API behind a narrow trait and
//! normalizes every expected sign-in failure (wrong credentials, cancelled
//! OAuth, unconfirmed email, network trouble) into an [`AuthOutcome`] so
//! callers have a single result shape. Only configuration mistakes surface
//! as [`AuthError`].

use crate::oauth::CallbackServer;
use crate::types::{AuthOutcome, OAuthProvider, ProviderIdentity, ProviderSession};
use crate::{AuthError, AuthResult};
use serde::Deserialize;
use statcheck_core::Config;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Seam between the session manager and the external identity provider.
///
/// The provider owns the raw credential; consumers observe it through the
/// watch channel returned by [`session`](IdentityProvider::session) and are
/// notified on every sign-in and sign-out.
#[allow(async_fn_in_trait)]
pub trait IdentityProvider {
    /// Subscribe to the current provider session (None when signed out).
    fn session(&self) -> watch::Receiver<Option<ProviderSession>>;

    /// Sign in with email and password.
    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<AuthOutcome>;

    /// Create an account with email and password.
    async fn sign_up_with_password(&self, email: &str, password: &str) -> AuthResult<AuthOutcome>;

    /// Sign in through a browser OAuth flow.
    async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> AuthResult<AuthOutcome>;

    /// Drop the current credential.
    async fn sign_out(&self) -> AuthResult<()>;
}

/// HTTP client for the hosted identity provider.
pub struct ProviderClient {
    http: reqwest::Client,
    base_url: String,
    publishable_key: String,
    enabled_providers: Vec<OAuthProvider>,
    session_tx: watch::Sender<Option<ProviderSession>>,
}

/// Token grant response from the provider.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: ProviderUser,
}

/// Sign-up response; tokens are absent when email confirmation is pending.
#[derive(Debug, Deserialize)]
struct SignupResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<ProviderUser>,
}

/// User object as the provider returns it.
#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: ProviderUserMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderUserMetadata {
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

impl From<ProviderUser> for ProviderIdentity {
    fn from(user: ProviderUser) -> Self {
        ProviderIdentity {
            subject: user.id,
            email: user.email,
            name: user.user_metadata.full_name,
            image: user.user_metadata.avatar_url,
        }
    }
}

impl ProviderClient {
    /// Create a client from configuration, with all providers enabled.
    pub fn new(config: &Config) -> Self {
        Self::with_providers(
            &config.provider_url,
            &config.provider_publishable_key,
            OAuthProvider::all().to_vec(),
        )
    }

    /// Create a client with an explicit set of enabled OAuth providers.
    pub fn with_providers(
        base_url: &str,
        publishable_key: &str,
        enabled_providers: Vec<OAuthProvider>,
    ) -> Self {
        let (session_tx, _) = watch::channel(None);
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            publishable_key: publishable_key.to_string(),
            enabled_providers,
            session_tx,
        }
    }

    /// Build a full URL for an auth API path.
    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn publish_session(&self, session: ProviderSession) {
        debug!(subject = %session.identity.subject, "provider session established");
        self.session_tx.send_replace(Some(session));
    }

    /// Fetch the identity behind an access token (used after OAuth, where
    /// the redirect carries only tokens).
    async fn fetch_identity(&self, access_token: &str) -> AuthResult<ProviderIdentity> {
        let response = self
            .http
            .get(self.auth_url("user"))
            .header("apikey", &self.publishable_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Provider(format!(
                "user lookup failed ({}): {}",
                status,
                provider_error_message(&body)
            )));
        }

        let user: ProviderUser = response.json().await?;
        Ok(user.into())
    }
}

impl IdentityProvider for ProviderClient {
    fn session(&self) -> watch::Receiver<Option<ProviderSession>> {
        self.session_tx.subscribe()
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> AuthResult<AuthOutcome> {
        let url = format!("{}?grant_type=password", self.auth_url("token"));
        let response = match self
            .http
            .post(&url)
            .header("apikey", &self.publishable_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "password sign-in request failed");
                return Ok(AuthOutcome::failure(format!("Network error: {}", e)));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = provider_error_message(&body);
            info!(%status, "password sign-in rejected");
            return Ok(AuthOutcome::failure(message));
        }

        let token: TokenResponse = response.json().await?;
        self.publish_session(ProviderSession {
            access_token: token.access_token,
            identity: token.user.into(),
        });
        Ok(AuthOutcome::success())
    }

    async fn sign_up_with_password(&self, email: &str, password: &str) -> AuthResult<AuthOutcome> {
        let response = match self
            .http
            .post(self.auth_url("signup"))
            .header("apikey", &self.publishable_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "sign-up request failed");
                return Ok(AuthOutcome::failure(format!("Network error: {}", e)));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = provider_error_message(&body);
            info!(%status, "sign-up rejected");
            return Ok(AuthOutcome::failure(message));
        }

        let signup: SignupResponse = response.json().await?;
        match (signup.access_token, signup.user) {
            (Some(access_token), Some(user)) => {
                self.publish_session(ProviderSession {
                    access_token,
                    identity: user.into(),
                });
                Ok(AuthOutcome::success())
            }
            // Email confirmation pending; the account exists but no
            // credential was issued yet.
            _ => Ok(AuthOutcome::failure(
                "Check your email to confirm your account, then sign in",
            )),
        }
    }

    async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> AuthResult<AuthOutcome> {
        if !self.enabled_providers.contains(&provider) {
            return Err(AuthError::Config(format!(
                "OAuth provider '{}' is not configured for this build",
                provider
            )));
        }

        let server = CallbackServer::with_defaults();
        let authorize_url = server.authorize_url(&self.base_url, provider);
        info!(url = %authorize_url, %provider, "open this URL in a browser to continue sign-in");

        let callback = server.wait_for_callback().await?;
        let access_token = match callback.access_token {
            Some(token) => token,
            None => {
                let message = callback
                    .error
                    .unwrap_or_else(|| "OAuth sign-in failed".to_string());
                info!(%provider, error = %message, "OAuth sign-in did not complete");
                return Ok(AuthOutcome::failure(message));
            }
        };

        let identity = match self.fetch_identity(&access_token).await {
            Ok(identity) => identity,
            Err(AuthError::Network(e)) => {
                warn!(error = %e, "identity lookup after OAuth failed");
                return Ok(AuthOutcome::failure(format!("Network error: {}", e)));
            }
            Err(e) => return Err(e),
        };

        self.publish_session(ProviderSession {
            access_token,
            identity,
        });
        Ok(AuthOutcome::success())
    }

    async fn sign_out(&self) -> AuthResult<()> {
        let access_token = self
            .session_tx
            .borrow()
            .as_ref()
            .map(|s| s.access_token.clone());

        // Best-effort revocation; the local credential is dropped regardless.
        if let Some(token) = access_token {
            let result = self
                .http
                .post(self.auth_url("logout"))
                .header("apikey", &self.publishable_key)
                .bearer_auth(&token)
                .send()
                .await;
            if let Err(e) = result {
                warn!(error = %e, "provider logout request failed");
            }
        }

        self.session_tx.send_replace(None);
        Ok(())
    }
}

/// Pull a human-readable message out of a provider error body.
fn provider_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error_description", "msg", "message", "error"] {
            if let Some(message) = value.get(key).and_then(|v| v.as_str()) {
                return message.to_string();
            }
        }
    }
    if body.trim().is_empty() {
        "Sign-in failed".to_string()
    } else {
        body.trim().to_string()
    }
}
