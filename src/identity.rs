//! Hosted identity provider integration.
//!
//! User identity, password hashing, and session issuance are owned by an
//! external auth service; this module only verifies the session JWTs it
//! mints and reads user profiles from its admin API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::IdentityConfig;
use crate::error::{GoalcastError, Result};

/// Claims inside a session JWT issued by the hosted auth provider.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionClaims {
    /// User ID.
    pub sub: String,
    /// User's email, if the provider includes it.
    pub email: Option<String>,
    /// Expiration time (unix timestamp).
    pub exp: u64,
}

/// A user profile as held by the identity provider.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    /// Account creation time; the trial window is measured from this.
    pub created_at: DateTime<Utc>,
}

/// Seam to the hosted identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify a bearer session token and return its claims.
    async fn verify_session(&self, token: &str) -> Result<SessionClaims>;

    /// Fetch a user profile by ID from the provider's admin API.
    async fn get_user(&self, user_id: &str) -> Result<UserProfile>;
}

/// Live client for the hosted identity provider.
///
/// Session tokens are verified locally against the provider's shared
/// signing secret; profile reads go to the admin API with the service-role
/// key.
pub struct HostedIdentityClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl HostedIdentityClient {
    pub fn new(config: &IdentityConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // Providers differ on which registered claims they set; sub and exp
        // are the only ones we rely on.
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            decoding_key: DecodingKey::from_secret(
                config.session_secret.expose_secret().as_bytes(),
            ),
            validation,
        }
    }
}

/// Admin API user payload.
#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    email: String,
    created_at: DateTime<Utc>,
}

#[async_trait]
impl IdentityProvider for HostedIdentityClient {
    async fn verify_session(&self, token: &str) -> Result<SessionClaims> {
        decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| GoalcastError::unauthorized(format!("Invalid session token: {}", e)))
    }

    async fn get_user(&self, user_id: &str) -> Result<UserProfile> {
        let url = format!("{}/admin/users/{}", self.base_url, user_id);

        let response = self
            .http
            .get(&url)
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GoalcastError::not_found(format!("User {}", user_id)));
        }
        let response = response.error_for_status()?;

        let user: UserResponse = response
            .json()
            .await
            .map_err(|e| GoalcastError::internal(format!("Malformed user profile: {}", e)))?;

        Ok(UserProfile {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
        })
    }
}

impl std::fmt::Debug for HostedIdentityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedIdentityClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Mock identity provider for tests.
pub mod test {
    use super::*;
    use std::collections::HashMap;
    use std::sync::RwLock;

    /// In-memory identity provider.
    ///
    /// Session tokens are opaque strings registered up front; no real JWT
    /// verification happens.
    #[derive(Default)]
    pub struct MockIdentityProvider {
        users: RwLock<HashMap<String, UserProfile>>,
        sessions: RwLock<HashMap<String, SessionClaims>>,
    }

    impl MockIdentityProvider {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a user created `account_age_days` days ago and return a
        /// session token for them.
        pub fn add_user(&self, user_id: &str, email: &str, account_age_days: i64) -> String {
            let created_at = Utc::now() - chrono::Duration::days(account_age_days);
            self.users.write().unwrap().insert(
                user_id.to_string(),
                UserProfile {
                    id: user_id.to_string(),
                    email: email.to_string(),
                    created_at,
                },
            );

            let token = format!("session-{}", user_id);
            self.sessions.write().unwrap().insert(
                token.clone(),
                SessionClaims {
                    sub: user_id.to_string(),
                    email: Some(email.to_string()),
                    exp: u64::MAX,
                },
            );
            token
        }
    }

    #[async_trait]
    impl IdentityProvider for MockIdentityProvider {
        async fn verify_session(&self, token: &str) -> Result<SessionClaims> {
            self.sessions
                .read()
                .unwrap()
                .get(token)
                .cloned()
                .ok_or_else(|| GoalcastError::unauthorized("Unknown session token"))
        }

        async fn get_user(&self, user_id: &str) -> Result<UserProfile> {
            self.users
                .read()
                .unwrap()
                .get(user_id)
                .cloned()
                .ok_or_else(|| GoalcastError::not_found(format!("User {}", user_id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test::MockIdentityProvider;
    use super::*;

    #[tokio::test]
    async fn mock_session_roundtrip() {
        let identity = MockIdentityProvider::new();
        let token = identity.add_user("user-1", "fan@example.com", 3);

        let claims = identity.verify_session(&token).await.unwrap();
        assert_eq!(claims.sub, "user-1");

        let user = identity.get_user("user-1").await.unwrap();
        assert_eq!(user.email, "fan@example.com");
        let age = Utc::now() - user.created_at;
        assert_eq!(age.num_days(), 3);
    }

    #[tokio::test]
    async fn unknown_session_rejected() {
        let identity = MockIdentityProvider::new();
        assert!(identity.verify_session("nope").await.is_err());
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let identity = MockIdentityProvider::new();
        let err = identity.get_user("missing").await.unwrap_err();
        assert!(matches!(err, GoalcastError::NotFound(_)));
    }
}
