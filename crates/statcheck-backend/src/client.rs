//! HTTP client for the backend's REST and RPC surface.

use serde::Deserialize;
use statcheck_auth::{
    AuthError, AuthOutcome, AuthResult, CanonicalUser, CredentialValidator, ProviderIdentity,
    ProviderSession, UserDirectory,
};
use statcheck_core::Config;
use statcheck_lists::{ListError, ListResult, ListStore, PlayerList};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tokio::sync::watch;

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// REST client for the backend deployment.
///
/// Requests run as the current provider session when one is held, and as
/// the anonymous role otherwise; guest and unauthenticated list traffic is
/// authorized by row-level policy on the owner id.
#[derive(Clone)]
pub struct BackendClient {
    http_client: reqwest::Client,
    api_url: String,
    publishable_key: String,
    session: watch::Receiver<Option<ProviderSession>>,
}

/// Canonical user row as the backend returns it.
#[derive(Debug, Deserialize)]
struct UserRecord {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    pro: bool,
}

impl From<UserRecord> for CanonicalUser {
    fn from(record: UserRecord) -> Self {
        CanonicalUser {
            id: record.id,
            email: record.email,
            name: record.name,
            username: record.username,
            image: record.image,
            pro: record.pro,
        }
    }
}

impl BackendClient {
    /// Create a client for the configured backend deployment.
    pub fn new(config: &Config, session: watch::Receiver<Option<ProviderSession>>) -> Self {
        Self::with_url(&config.backend_url, &config.provider_publishable_key, session)
    }

    /// Create a client against an explicit URL (tests, staging).
    pub fn with_url(
        api_url: &str,
        publishable_key: &str,
        session: watch::Receiver<Option<ProviderSession>>,
    ) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            publishable_key: publishable_key.to_string(),
            session,
        }
    }

    /// Build the REST API URL for a table.
    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, table)
    }

    /// Build the RPC URL for a named function.
    fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.api_url, function)
    }

    /// Bearer token for the current request: the held provider credential,
    /// or the publishable key for anonymous traffic.
    fn bearer(&self) -> String {
        self.session
            .borrow()
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.publishable_key.clone())
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.publishable_key)
            .header("Authorization", format!("Bearer {}", self.bearer()))
    }

    async fn backend_error(context: &str, response: reqwest::Response) -> AuthError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let body_summary = summarize_response_body(&body);
        tracing::error!(status = %status, body_summary = %body_summary, "{} failed", context);
        AuthError::Backend(format!("{}: {} ({})", context, status, body_summary))
    }

    async fn store_error(context: &str, response: reqwest::Response) -> ListError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let body_summary = summarize_response_body(&body);
        tracing::error!(status = %status, body_summary = %body_summary, "{} failed", context);
        ListError::Store(format!("{}: {} ({})", context, status, body_summary))
    }
}

impl CredentialValidator for BackendClient {
    /// Ask the backend whether it accepts this provider credential.
    async fn validate_credential(&self, access_token: &str) -> AuthResult<bool> {
        let url = self.rpc_url("validate_session");

        tracing::debug!("Validating provider credential with backend");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.publishable_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(true)
        } else if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            tracing::debug!(%status, "backend rejected credential");
            Ok(false)
        } else {
            Err(Self::backend_error("credential validation", response).await)
        }
    }
}

impl UserDirectory for BackendClient {
    /// Upsert the canonical user keyed by the provider subject.
    ///
    /// The body never carries `username`, so the merge cannot clobber a
    /// claimed name; profile fields from the provider are refreshed.
    async fn get_or_create_user(&self, identity: &ProviderIdentity) -> AuthResult<CanonicalUser> {
        let url = self.rest_url("users");

        let body = serde_json::json!({
            "id": identity.subject,
            "email": identity.email,
            "name": identity.name,
            "image": identity.image,
        });

        tracing::debug!(subject = %identity.subject, "upserting canonical user");

        let response = self
            .request(self.http_client.post(&url))
            .header("Content-Type", "application/json")
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::backend_error("user upsert", response).await);
        }

        let mut records: Vec<UserRecord> = response.json().await?;
        match records.pop() {
            Some(record) => Ok(record.into()),
            None => Err(AuthError::Backend(
                "user upsert returned no representation".to_string(),
            )),
        }
    }

    /// Claim a unique username. A conflict is an expected failure.
    async fn claim_username(&self, user_id: &str, username: &str) -> AuthResult<AuthOutcome> {
        let url = self.rpc_url("claim_username");

        tracing::debug!(%user_id, %username, "claiming username");

        let response = self
            .request(self.http_client.post(&url))
            .json(&serde_json::json!({ "user_id": user_id, "username": username }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(AuthOutcome::success())
        } else if status == reqwest::StatusCode::CONFLICT {
            Ok(AuthOutcome::failure("Username is already taken"))
        } else {
            Err(Self::backend_error("username claim", response).await)
        }
    }

    /// Re-key all data owned by an anonymous id to the canonical user.
    async fn adopt_anonymous_data(&self, anonymous_id: &str, user_id: &str) -> AuthResult<()> {
        let url = self.rpc_url("adopt_anonymous_data");

        tracing::debug!(%anonymous_id, %user_id, "adopting anonymous data");

        let response = self
            .request(self.http_client.post(&url))
            .json(&serde_json::json!({
                "anonymous_id": anonymous_id,
                "user_id": user_id,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::backend_error("anonymous data adoption", response).await);
        }

        tracing::info!(%anonymous_id, %user_id, "anonymous data adopted");
        Ok(())
    }
}

impl ListStore for BackendClient {
    async fn lists_for_owner(&self, owner_user_id: &str) -> ListResult<Vec<PlayerList>> {
        let url = format!(
            "{}?owner_user_id=eq.{}&deleted_at=is.null&select=*&order=created_at.asc",
            self.rest_url("player_lists"),
            owner_user_id
        );

        let response = self
            .request(self.http_client.get(&url))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ListError::Store(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::store_error("list fetch", response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ListError::Store(e.to_string()))
    }

    async fn get_list(&self, list_id: &str) -> ListResult<Option<PlayerList>> {
        let url = format!(
            "{}?id=eq.{}&select=*&limit=1",
            self.rest_url("player_lists"),
            list_id
        );

        let response = self
            .request(self.http_client.get(&url))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ListError::Store(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::store_error("list fetch by id", response).await);
        }

        let lists: Vec<PlayerList> = response
            .json()
            .await
            .map_err(|e| ListError::Store(e.to_string()))?;
        Ok(lists.into_iter().next())
    }

    /// Whole-record upsert: players and links are written exactly as the
    /// model computed them, dense orders included.
    async fn put_list(&self, list: &PlayerList) -> ListResult<()> {
        let url = self.rest_url("player_lists");

        tracing::debug!(list_id = %list.id, "upserting list");

        let response = self
            .request(self.http_client.post(&url))
            .header("Content-Type", "application/json")
            .header("Prefer", "resolution=merge-duplicates")
            .json(list)
            .send()
            .await
            .map_err(|e| ListError::Store(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::store_error("list upsert", response).await);
        }

        Ok(())
    }

    async fn adopt_owner(&self, anonymous_id: &str, user_id: &str) -> ListResult<()> {
        let url = format!(
            "{}?owner_user_id=eq.{}",
            self.rest_url("player_lists"),
            anonymous_id
        );

        tracing::debug!(%anonymous_id, %user_id, "re-keying lists to canonical user");

        let response = self
            .request(self.http_client.patch(&url))
            .header("Content-Type", "application/json")
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({ "owner_user_id": user_id }))
            .send()
            .await
            .map_err(|e| ListError::Store(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::store_error("list owner adoption", response).await);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statcheck_auth::ProviderIdentity;

    fn client() -> BackendClient {
        let (_tx, rx) = watch::channel(None);
        BackendClient::with_url("https://backend.statcheck.app/", "test-key", rx)
    }

    #[test]
    fn rest_and_rpc_urls() {
        let client = client();
        assert_eq!(
            client.rest_url("player_lists"),
            "https://backend.statcheck.app/rest/v1/player_lists"
        );
        assert_eq!(
            client.rpc_url("claim_username"),
            "https://backend.statcheck.app/rest/v1/rpc/claim_username"
        );
    }

    #[test]
    fn bearer_falls_back_to_publishable_key_when_signed_out() {
        let client = client();
        assert_eq!(client.bearer(), "test-key");
    }

    #[test]
    fn bearer_uses_the_held_credential() {
        let (tx, rx) = watch::channel(None);
        let client = BackendClient::with_url("https://backend.statcheck.app", "test-key", rx);

        tx.send_replace(Some(ProviderSession {
            access_token: "tok-1".to_string(),
            identity: ProviderIdentity {
                subject: "sub-1".to_string(),
                email: None,
                name: None,
                image: None,
            },
        }));

        assert_eq!(client.bearer(), "tok-1");
    }

    #[test]
    fn user_record_maps_to_canonical_user() {
        let record: UserRecord = serde_json::from_str(
            r#"{"id": "sub-1", "email": "fan@example.com", "username": "statking", "pro": true}"#,
        )
        .unwrap();
        let user: CanonicalUser = record.into();

        assert_eq!(user.id, "sub-1");
        assert_eq!(user.username.as_deref(), Some("statking"));
        assert!(user.pro);
        assert!(user.name.is_none());
    }

    #[test]
    fn user_record_defaults_missing_fields() {
        let record: UserRecord = serde_json::from_str(r#"{"id": "sub-1"}"#).unwrap();
        let user: CanonicalUser = record.into();
        assert!(!user.pro);
        assert!(user.username.is_none());
    }

    #[test]
    fn response_body_summary_is_stable_and_opaque() {
        let a = summarize_response_body("some body");
        let b = summarize_response_body("some body");
        assert_eq!(a, b);
        assert!(a.starts_with("len=9,digest="));
        assert!(!a.contains("some body"));
    }

    #[test]
    fn list_record_round_trips_through_json() {
        let mut list = PlayerList::new("l1", "anon_1_abc", "Starters");
        list.add_player("p1");
        list.add_link("https://example.com", Some("Highlights"));

        let json = serde_json::to_string(&list).unwrap();
        let parsed: PlayerList = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, list);
    }
}
