//! Payment provider webhook handling.
//!
//! Verifies webhook signatures, deduplicates deliveries, and reconciles
//! provider events into the local subscription record, issuing or clearing
//! the analytics access token as the status changes.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

use crate::error::{GoalcastError, Result};
use crate::plans::Plans;
use crate::token::AccessTokenIssuer;

use super::store::{SubscriptionRecord, SubscriptionStatus, SubscriptionStore};

/// Maximum accepted age of a webhook signature timestamp, in seconds.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Webhook handler for payment provider events.
///
/// The webhook secret is stored in [`SecretString`] so it never leaks into
/// logs or debug output.
pub struct WebhookHandler {
    store: Arc<dyn SubscriptionStore>,
    tokens: AccessTokenIssuer,
    plans: Plans,
    webhook_secret: SecretString,
}

impl WebhookHandler {
    #[must_use]
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        tokens: AccessTokenIssuer,
        plans: Plans,
        webhook_secret: SecretString,
    ) -> Self {
        Self {
            store,
            tokens,
            plans,
            webhook_secret,
        }
    }

    /// Verify the webhook signature and parse the event.
    ///
    /// # Arguments
    /// * `payload` - The raw, unparsed request body
    /// * `signature` - The provider's signature header value (`t=..,v1=..`)
    ///
    /// # Errors
    /// Returns a bad-request error if the signature is invalid, stale, or
    /// the payload is malformed. No state is changed on failure.
    pub fn verify_signature(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent> {
        let sig_parts = parse_signature_header(signature)?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0) as i64;

        if (now - sig_parts.timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
            return Err(GoalcastError::bad_request("Webhook timestamp too old"));
        }

        let signed_payload = format!(
            "{}.{}",
            sig_parts.timestamp,
            String::from_utf8_lossy(payload)
        );
        let expected_sig =
            compute_signature(self.webhook_secret.expose_secret(), signed_payload.as_bytes())?;

        let expected_bytes = hex::decode(&expected_sig)
            .map_err(|_| GoalcastError::internal("Hex decode error"))?;
        let provided_bytes = hex::decode(&sig_parts.signature)
            .map_err(|_| GoalcastError::bad_request("Invalid signature format"))?;

        if expected_bytes.ct_eq(&provided_bytes).unwrap_u8() != 1 {
            return Err(GoalcastError::bad_request("Invalid webhook signature"));
        }

        // Detailed parse errors are logged server-side only.
        let event: WebhookEvent = serde_json::from_slice(payload).map_err(|e| {
            tracing::warn!(
                target: "goalcast::webhook",
                error = %e,
                "Failed to parse webhook payload"
            );
            GoalcastError::bad_request("Malformed webhook payload")
        })?;

        Ok(event)
    }

    /// Process a verified webhook event.
    ///
    /// Deduplicates by event ID before dispatching; a redelivered event is
    /// acknowledged without touching the subscription record again.
    pub async fn handle_event(&self, event: WebhookEvent) -> Result<WebhookOutcome> {
        if self.store.is_event_processed(&event.id).await? {
            tracing::debug!(
                target: "goalcast::webhook",
                event_id = %event.id,
                "Duplicate webhook delivery ignored"
            );
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        let outcome = match event.event_type.as_str() {
            "checkout.session.completed" => self.handle_checkout_completed(&event).await?,
            "customer.subscription.created" | "customer.subscription.updated" => {
                self.handle_subscription_updated(&event).await?
            }
            "customer.subscription.deleted" => self.handle_subscription_deleted(&event).await?,
            _ => WebhookOutcome::Ignored,
        };

        if !matches!(outcome, WebhookOutcome::Ignored) {
            self.store.mark_event_processed(&event.id).await?;
        }

        Ok(outcome)
    }

    /// Handle `checkout.session.completed`: the user has paid.
    async fn handle_checkout_completed(&self, event: &WebhookEvent) -> Result<WebhookOutcome> {
        let session_id = event
            .data
            .object
            .get("id")
            .and_then(|v| v.as_str())
            .map(String::from);

        // Attribute the checkout: metadata first, then the pending record
        // written at session creation, keyed by session ID.
        let (user_id, pending_plan) = match metadata_field(&event.data.object, "user_id") {
            Some(id) => (id, None),
            None => {
                let correlated = match &session_id {
                    Some(sid) => self.store.find_by_session(sid).await?,
                    None => None,
                };
                match correlated {
                    Some((user_id, record)) => {
                        tracing::debug!(
                            target: "goalcast::webhook",
                            event_id = %event.id,
                            user_id = %user_id,
                            "Checkout correlated via session ID"
                        );
                        (user_id, Some(record.plan_id))
                    }
                    None => {
                        // The provider does not retry 2xx responses; a
                        // completed checkout we cannot attribute is logged
                        // and dropped.
                        tracing::warn!(
                            target: "goalcast::webhook",
                            event_id = %event.id,
                            "Checkout completed with no user_id metadata or known session"
                        );
                        return Ok(WebhookOutcome::Ignored);
                    }
                }
            }
        };

        let plan_id = match metadata_field(&event.data.object, "plan_id") {
            Some(id) => self.resolve_plan(Some(id)),
            None => pending_plan.unwrap_or_else(|| self.plans.default_plan().id.clone()),
        };

        let token = self.tokens.issue(&user_id)?;
        self.store
            .upsert(
                &user_id,
                &SubscriptionRecord {
                    plan_id: plan_id.clone(),
                    status: SubscriptionStatus::Active,
                    access_token: Some(token),
                    checkout_session_id: session_id,
                    updated_at: now_secs(),
                },
            )
            .await?;

        tracing::info!(
            target: "goalcast::webhook",
            user_id = %user_id,
            plan = %plan_id,
            "Subscription activated"
        );

        Ok(WebhookOutcome::Processed)
    }

    /// Handle subscription created/updated: sync the provider's status.
    async fn handle_subscription_updated(&self, event: &WebhookEvent) -> Result<WebhookOutcome> {
        let Some(user_id) = metadata_field(&event.data.object, "user_id") else {
            tracing::warn!(
                target: "goalcast::webhook",
                event_id = %event.id,
                "Subscription event without user_id metadata"
            );
            return Ok(WebhookOutcome::Ignored);
        };

        let provider_status = event
            .data
            .object
            .get("status")
            .and_then(|v| v.as_str())
            .ok_or_else(|| GoalcastError::bad_request("Missing subscription status"))?;
        let cancel_at_period_end = event
            .data
            .object
            .get("cancel_at_period_end")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let status = SubscriptionStatus::from_provider(provider_status, cancel_at_period_end);

        let existing = self.store.get(&user_id).await?;
        let plan_id = match metadata_field(&event.data.object, "plan_id") {
            Some(id) => self.resolve_plan(Some(id)),
            None => existing
                .as_ref()
                .map(|r| r.plan_id.clone())
                .unwrap_or_else(|| self.plans.default_plan().id.clone()),
        };

        // A token is only valid while access is granted; otherwise the
        // stored one is cleared so the analytics app locks out at most one
        // token-lifetime late.
        let token = if status.grants_access() {
            Some(self.tokens.issue(&user_id)?)
        } else {
            None
        };

        self.store
            .upsert(
                &user_id,
                &SubscriptionRecord {
                    plan_id,
                    status,
                    access_token: token,
                    checkout_session_id: existing.and_then(|r| r.checkout_session_id),
                    updated_at: now_secs(),
                },
            )
            .await?;

        tracing::info!(
            target: "goalcast::webhook",
            user_id = %user_id,
            status = %status,
            "Subscription synced"
        );

        Ok(WebhookOutcome::Processed)
    }

    /// Handle `customer.subscription.deleted`: the subscription ended.
    async fn handle_subscription_deleted(&self, event: &WebhookEvent) -> Result<WebhookOutcome> {
        let Some(user_id) = metadata_field(&event.data.object, "user_id") else {
            tracing::warn!(
                target: "goalcast::webhook",
                event_id = %event.id,
                "Subscription deleted without user_id metadata"
            );
            return Ok(WebhookOutcome::Ignored);
        };

        let existing = self.store.get(&user_id).await?;
        let plan_id = existing
            .as_ref()
            .map(|r| r.plan_id.clone())
            .unwrap_or_else(|| self.plans.default_plan().id.clone());

        self.store
            .upsert(
                &user_id,
                &SubscriptionRecord {
                    plan_id,
                    status: SubscriptionStatus::Canceled,
                    access_token: None,
                    checkout_session_id: existing.and_then(|r| r.checkout_session_id),
                    updated_at: now_secs(),
                },
            )
            .await?;

        tracing::info!(
            target: "goalcast::webhook",
            user_id = %user_id,
            "Subscription canceled"
        );

        Ok(WebhookOutcome::Processed)
    }

    /// Resolve a plan from metadata, falling back to the default plan.
    fn resolve_plan(&self, plan_id: Option<String>) -> String {
        match plan_id {
            Some(id) if self.plans.contains(&id) => id,
            Some(id) => {
                tracing::warn!(
                    target: "goalcast::webhook",
                    plan = %id,
                    "Unknown plan in event metadata, using default"
                );
                self.plans.default_plan().id.clone()
            }
            None => self.plans.default_plan().id.clone(),
        }
    }
}

/// Read a string field from the event object's metadata.
fn metadata_field(object: &serde_json::Value, field: &str) -> Option<String> {
    object
        .get("metadata")
        .and_then(|m| m.get(field))
        .and_then(|v| v.as_str())
        .map(String::from)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Parsed webhook event.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct WebhookEvent {
    /// Event ID.
    pub id: String,
    /// Event type (e.g. "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data.
    pub data: WebhookEventData,
    /// Timestamp when the event was created.
    pub created: u64,
}

/// Webhook event data.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct WebhookEventData {
    /// The object that triggered the event.
    pub object: serde_json::Value,
}

/// Outcome of webhook processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Event was processed successfully.
    Processed,
    /// Event was ignored (unrecognized kind or missing metadata).
    Ignored,
    /// Event was already processed (idempotency).
    AlreadyProcessed,
}

/// Parsed signature header parts.
struct SignatureParts {
    timestamp: i64,
    signature: String,
}

/// Parse the provider's signature header (`t=<ts>,v1=<hex>`).
fn parse_signature_header(header: &str) -> Result<SignatureParts> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| GoalcastError::bad_request("Invalid signature header format"))?;

        match key.trim() {
            "t" => timestamp = value.parse().ok(),
            "v1" => signature = Some(value.to_string()),
            _ => {} // Ignore other versions
        }
    }

    Ok(SignatureParts {
        timestamp: timestamp
            .ok_or_else(|| GoalcastError::bad_request("Missing timestamp in signature"))?,
        signature: signature
            .ok_or_else(|| GoalcastError::bad_request("Missing v1 signature"))?,
    })
}

/// Compute HMAC-SHA256 signature over the payload.
fn compute_signature(secret: &str, payload: &[u8]) -> Result<String> {
    type HmacSha256 = Hmac<Sha256>;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| GoalcastError::internal("HMAC error"))?;

    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}
