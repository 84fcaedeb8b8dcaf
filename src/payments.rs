//! Payment provider client.
//!
//! Checkout sessions are created against the provider's hosted checkout
//! REST API. The live client keeps the API key in [`SecretString`], retries
//! transient failures with exponential backoff, and sends an idempotency
//! key with every mutating call.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use crate::error::{GoalcastError, Result};

const API_BASE: &str = "https://api.stripe.com/v1";

/// Request to create a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CreateCheckoutSession {
    /// Provider price ID for the selected plan.
    pub price_id: String,
    /// Email the checkout is scoped to.
    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Carried through to webhook events so they can be correlated back to
    /// a user.
    pub metadata: CheckoutMetadata,
}

/// Metadata attached to checkout sessions and echoed in webhook events.
#[derive(Debug, Clone)]
pub struct CheckoutMetadata {
    pub user_id: String,
    pub plan_id: String,
}

/// A created checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutSessionData {
    /// Provider session ID (`cs_...`).
    pub id: String,
    /// Hosted checkout URL to redirect the browser to.
    pub url: String,
}

/// Seam to the payment provider.
#[async_trait]
pub trait PaymentClient: Send + Sync {
    /// Create a subscription checkout session.
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutSession,
    ) -> Result<CheckoutSessionData>;
}

/// Configuration for the live payment client.
#[derive(Debug, Clone)]
pub struct LivePaymentClientConfig {
    /// Maximum retry attempts for transient failures.
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for LivePaymentClientConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            timeout_seconds: 30,
        }
    }
}

/// Error returned when API key validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidApiKeyError {
    pub reason: String,
}

impl std::fmt::Display for InvalidApiKeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid payment API key: {}", self.reason)
    }
}

impl std::error::Error for InvalidApiKeyError {}

/// Validate a payment provider API key format.
///
/// Accepts secret keys (`sk_test_`, `sk_live_`) and restricted keys
/// (`rk_test_`, `rk_live_`).
fn validate_api_key(key: &str) -> std::result::Result<(), InvalidApiKeyError> {
    const MIN_KEY_LENGTH: usize = 20;

    if key.is_empty() {
        return Err(InvalidApiKeyError {
            reason: "API key cannot be empty".to_string(),
        });
    }

    if key.len() < MIN_KEY_LENGTH {
        return Err(InvalidApiKeyError {
            reason: format!("API key too short (minimum {} characters)", MIN_KEY_LENGTH),
        });
    }

    let valid_prefixes = ["sk_test_", "sk_live_", "rk_test_", "rk_live_"];
    if !valid_prefixes.iter().any(|prefix| key.starts_with(prefix)) {
        return Err(InvalidApiKeyError {
            reason: "API key must start with sk_test_, sk_live_, rk_test_, or rk_live_"
                .to_string(),
        });
    }

    Ok(())
}

/// Wire shape of the provider's checkout session resource.
#[derive(Debug, Deserialize)]
struct CheckoutSessionResponse {
    id: String,
    url: String,
}

/// Live payment client.
#[derive(Clone)]
pub struct LivePaymentClient {
    http: reqwest::Client,
    api_key: SecretString,
    config: LivePaymentClientConfig,
}

impl LivePaymentClient {
    /// Create a live client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key format is invalid.
    pub fn new(
        api_key: SecretString,
        config: LivePaymentClientConfig,
    ) -> std::result::Result<Self, InvalidApiKeyError> {
        validate_api_key(api_key.expose_secret())?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();

        Ok(Self {
            http,
            api_key,
            config,
        })
    }

    /// Create a client with default configuration.
    pub fn with_default_config(
        api_key: SecretString,
    ) -> std::result::Result<Self, InvalidApiKeyError> {
        Self::new(api_key, LivePaymentClientConfig::default())
    }

    /// Whether the configured key is a test mode key.
    #[must_use]
    pub fn is_test_mode(&self) -> bool {
        let key = self.api_key.expose_secret();
        key.starts_with("sk_test_") || key.starts_with("rk_test_")
    }

    /// POST a form-encoded request with retry on transient failures.
    async fn post_form(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", API_BASE, path);
        let idempotency_key = format!("goalcast_{}", uuid::Uuid::new_v4());

        let mut attempt = 0u32;
        loop {
            let result = self
                .http
                .post(&url)
                .bearer_auth(self.api_key.expose_secret())
                .header("Idempotency-Key", &idempotency_key)
                .form(params)
                .send()
                .await;

            let retryable = match &result {
                Ok(response) => {
                    let status = response.status();
                    status.as_u16() == 429 || status.is_server_error()
                }
                Err(e) => e.is_timeout() || e.is_connect(),
            };

            if !retryable || attempt >= self.config.max_retries {
                return Ok(result?.error_for_status()?);
            }

            attempt += 1;
            let delay = self.config.base_delay_ms * 2u64.saturating_pow(attempt - 1);
            tracing::warn!(
                target: "goalcast::payments",
                path,
                attempt,
                delay_ms = delay,
                "Transient payment API failure, retrying"
            );
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

#[async_trait]
impl PaymentClient for LivePaymentClient {
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutSession,
    ) -> Result<CheckoutSessionData> {
        let params = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("customer_email".to_string(), request.customer_email),
            ("line_items[0][price]".to_string(), request.price_id),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), request.success_url),
            ("cancel_url".to_string(), request.cancel_url),
            (
                "metadata[user_id]".to_string(),
                request.metadata.user_id.clone(),
            ),
            (
                "metadata[plan_id]".to_string(),
                request.metadata.plan_id.clone(),
            ),
            (
                "subscription_data[metadata][user_id]".to_string(),
                request.metadata.user_id,
            ),
            (
                "subscription_data[metadata][plan_id]".to_string(),
                request.metadata.plan_id,
            ),
        ];

        let response = self.post_form("/checkout/sessions", &params).await?;

        let session: CheckoutSessionResponse = response
            .json()
            .await
            .map_err(|e| GoalcastError::internal(format!("Malformed checkout session: {}", e)))?;

        Ok(CheckoutSessionData {
            id: session.id,
            url: session.url,
        })
    }
}

impl std::fmt::Debug for LivePaymentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivePaymentClient")
            .field("config", &self.config)
            .field("is_test_mode", &self.is_test_mode())
            .finish_non_exhaustive()
    }
}

/// Mock payment client for tests.
pub mod test {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Mutex;

    /// Records checkout requests and returns synthetic sessions.
    #[derive(Default)]
    pub struct MockPaymentClient {
        counter: AtomicU64,
        fail_next: AtomicBool,
        requests: Mutex<Vec<CreateCheckoutSession>>,
    }

    impl MockPaymentClient {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Make the next call fail with an upstream error.
        pub fn fail_next(&self) {
            self.fail_next.store(true, Ordering::SeqCst);
        }

        /// All checkout requests seen so far.
        pub fn requests(&self) -> Vec<CreateCheckoutSession> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PaymentClient for MockPaymentClient {
        async fn create_checkout_session(
            &self,
            request: CreateCheckoutSession,
        ) -> Result<CheckoutSessionData> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(GoalcastError::service_unavailable(
                    "payment provider unavailable",
                ));
            }

            self.requests.lock().unwrap().push(request);
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(CheckoutSessionData {
                id: format!("cs_test_{}", n),
                url: format!("https://checkout.example.com/c/cs_test_{}", n),
            })
        }
    }
}
