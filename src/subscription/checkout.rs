//! Checkout session creation.
//!
//! Validates the selected plan, asks the payment provider for a hosted
//! checkout session scoped to the user's email, and records a `pending`
//! subscription row. A token is issued up front; if the user abandons
//! checkout, the pending row (and its token) is overwritten the next time
//! reconciliation touches the user.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{GoalcastError, Result};
use crate::identity::UserProfile;
use crate::payments::{
    CheckoutMetadata, CheckoutSessionData, CreateCheckoutSession, PaymentClient,
};
use crate::plans::Plans;
use crate::token::AccessTokenIssuer;

use super::store::{SubscriptionRecord, SubscriptionStatus, SubscriptionStore};

/// Creates checkout sessions and the pending records that track them.
pub struct CheckoutManager {
    store: Arc<dyn SubscriptionStore>,
    payments: Arc<dyn PaymentClient>,
    plans: Plans,
    tokens: AccessTokenIssuer,
    success_url: String,
    cancel_url: String,
}

impl CheckoutManager {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        payments: Arc<dyn PaymentClient>,
        plans: Plans,
        tokens: AccessTokenIssuer,
        success_url: impl Into<String>,
        cancel_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            payments,
            plans,
            tokens,
            success_url: success_url.into(),
            cancel_url: cancel_url.into(),
        }
    }

    /// Create a checkout session for the given user and price ID.
    ///
    /// # Errors
    ///
    /// Returns a bad-request error when the price ID is not in the plan
    /// allow-list, and propagates provider/store failures.
    pub async fn create_session(
        &self,
        user: &UserProfile,
        price_id: &str,
    ) -> Result<CheckoutSessionData> {
        let plan = self.plans.find_by_price(price_id).ok_or_else(|| {
            GoalcastError::bad_request(format!("Unknown price ID: {}", price_id))
        })?;

        let session = self
            .payments
            .create_checkout_session(CreateCheckoutSession {
                price_id: price_id.to_string(),
                customer_email: user.email.clone(),
                success_url: self.success_url.clone(),
                cancel_url: self.cancel_url.clone(),
                metadata: CheckoutMetadata {
                    user_id: user.id.clone(),
                    plan_id: plan.id.clone(),
                },
            })
            .await?;

        let token = self.tokens.issue(&user.id)?;
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        self.store
            .upsert(
                &user.id,
                &SubscriptionRecord {
                    plan_id: plan.id.clone(),
                    status: SubscriptionStatus::Pending,
                    access_token: Some(token),
                    checkout_session_id: Some(session.id.clone()),
                    updated_at: now,
                },
            )
            .await?;

        tracing::info!(
            target: "goalcast::checkout",
            user_id = %user.id,
            plan = %plan.id,
            session_id = %session.id,
            "Checkout session created"
        );

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlanPrices;
    use crate::identity::UserProfile;
    use crate::payments::test::MockPaymentClient;
    use crate::subscription::store::memory::InMemorySubscriptionStore;

    fn test_manager() -> (CheckoutManager, InMemorySubscriptionStore, Arc<MockPaymentClient>) {
        let store = InMemorySubscriptionStore::new();
        let payments = Arc::new(MockPaymentClient::new());
        let plans = Plans::standard(&PlanPrices {
            monthly: "price_m".to_string(),
            quarterly: "price_q".to_string(),
            yearly: "price_y".to_string(),
        });
        let tokens = AccessTokenIssuer::with_secret(
            "test-secret-key-32-bytes-long!!".to_string().into(),
            "goalcast-test",
            30,
        );

        let manager = CheckoutManager::new(
            Arc::new(store.clone()),
            payments.clone(),
            plans,
            tokens,
            "https://goalcast.example.com/success",
            "https://goalcast.example.com/pricing",
        );
        (manager, store, payments)
    }

    fn test_user() -> UserProfile {
        UserProfile {
            id: "user-1".to_string(),
            email: "fan@example.com".to_string(),
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn creates_session_and_pending_record() {
        let (manager, store, payments) = test_manager();

        let session = manager.create_session(&test_user(), "price_m").await.unwrap();
        assert!(!session.url.is_empty());

        let record = store.get("user-1").await.unwrap().unwrap();
        assert_eq!(record.status, SubscriptionStatus::Pending);
        assert_eq!(record.plan_id, "monthly");
        assert_eq!(record.checkout_session_id, Some(session.id));
        assert!(record.access_token.is_some());

        let requests = payments.requests();
        assert_eq!(requests[0].customer_email, "fan@example.com");
        assert_eq!(requests[0].metadata.plan_id, "monthly");
    }

    #[tokio::test]
    async fn unknown_price_rejected_without_side_effects() {
        let (manager, store, payments) = test_manager();

        let err = manager
            .create_session(&test_user(), "price_unknown")
            .await
            .unwrap_err();
        assert!(matches!(err, GoalcastError::BadRequest(_)));
        assert!(store.get("user-1").await.unwrap().is_none());
        assert!(payments.requests().is_empty());
    }

    #[tokio::test]
    async fn provider_failure_leaves_no_record() {
        let (manager, store, payments) = test_manager();
        payments.fail_next();

        assert!(manager.create_session(&test_user(), "price_m").await.is_err());
        assert!(store.get("user-1").await.unwrap().is_none());
    }
}
