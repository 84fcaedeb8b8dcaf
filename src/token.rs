//! Access token issuance and verification.
//!
//! Subscribers receive a signed, time-limited token that the external
//! analytics application accepts as a query parameter. The token encodes
//! only the user ID and an expiry; it deliberately does not re-check
//! subscription state on verification. Staleness is bounded by the webhook
//! handler clearing the stored token when a subscription leaves the active
//! states, plus the token's own expiry.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::TokenConfig;
use crate::error::{GoalcastError, Result};

/// Claims carried by an analytics access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID).
    pub sub: String,
    /// Issuer.
    pub iss: String,
    /// Issued at (unix timestamp).
    pub iat: u64,
    /// Expiration time (unix timestamp).
    pub exp: u64,
    /// Unique token identifier.
    pub jti: String,
}

/// Issues and verifies HS256 access tokens.
#[derive(Clone)]
pub struct AccessTokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl: Duration,
}

impl AccessTokenIssuer {
    /// Create an issuer from configuration.
    pub fn new(config: &TokenConfig) -> Self {
        Self::with_secret(config.secret.clone(), &config.issuer, config.ttl_days)
    }

    /// Create an issuer from raw parts.
    pub fn with_secret(secret: SecretString, issuer: &str, ttl_days: u64) -> Self {
        let secret_bytes = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_issuer(&[issuer]);

        Self {
            encoding_key: EncodingKey::from_secret(secret_bytes),
            decoding_key: DecodingKey::from_secret(secret_bytes),
            validation,
            issuer: issuer.to_string(),
            ttl: Duration::from_secs(ttl_days * 86_400),
        }
    }

    /// Issue a token for a user with the configured expiry.
    pub fn issue(&self, user_id: &str) -> Result<String> {
        let now = current_timestamp();

        let claims = AccessTokenClaims {
            sub: user_id.to_string(),
            iss: self.issuer.clone(),
            iat: now,
            exp: now + self.ttl.as_secs(),
            jti: generate_jti(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| GoalcastError::internal(format!("Failed to encode access token: {}", e)))
    }

    /// Verify a token's signature, issuer, and expiry.
    ///
    /// Subscription state is intentionally not consulted here.
    pub fn verify(&self, token: &str) -> Result<AccessTokenClaims> {
        decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| GoalcastError::unauthorized(format!("Invalid access token: {}", e)))
    }

    /// The configured token lifetime.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn generate_jti() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
