//! Premium access checks.
//!
//! New accounts get a free trial window measured from the identity
//! provider's account creation time; after that, access requires a
//! subscription record in a granting state.

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::error::Result;
use crate::identity::IdentityProvider;
use crate::subscription::SubscriptionStore;

/// Result of an access check.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AccessDecision {
    /// Whether the user may use premium features right now.
    pub granted: bool,
    /// Human-readable explanation, shown to the user as-is.
    pub message: String,
}

impl AccessDecision {
    fn granted(message: impl Into<String>) -> Self {
        Self {
            granted: true,
            message: message.into(),
        }
    }

    fn denied(message: impl Into<String>) -> Self {
        Self {
            granted: false,
            message: message.into(),
        }
    }
}

/// Decides whether a user currently has premium access.
pub struct AccessChecker {
    store: Arc<dyn SubscriptionStore>,
    identity: Arc<dyn IdentityProvider>,
    trial: Duration,
}

impl AccessChecker {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        identity: Arc<dyn IdentityProvider>,
        trial_days: u64,
    ) -> Self {
        Self {
            store,
            identity,
            trial: Duration::days(trial_days as i64),
        }
    }

    /// Check whether the user has premium access.
    ///
    /// Trial eligibility is checked first so a new user is never blocked by
    /// an abandoned checkout row. Unknown users fail the identity lookup
    /// and the error propagates.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity provider or the store fails.
    pub async fn check(&self, user_id: &str) -> Result<AccessDecision> {
        let user = self.identity.get_user(user_id).await?;

        let age = Utc::now() - user.created_at;
        if age < self.trial {
            let remaining = (self.trial - age).num_days() + 1;
            return Ok(AccessDecision::granted(format!(
                "Free trial, {} day(s) remaining",
                remaining
            )));
        }

        let Some(record) = self.store.get(user_id).await? else {
            return Ok(AccessDecision::denied(
                "Trial expired, subscription required",
            ));
        };

        if record.grants_access() {
            Ok(AccessDecision::granted(format!(
                "Subscription {} ({} plan)",
                record.status, record.plan_id
            )))
        } else {
            Ok(AccessDecision::denied(format!(
                "Subscription {}, renewal required",
                record.status
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::test::MockIdentityProvider;
    use crate::subscription::store::memory::InMemorySubscriptionStore;
    use crate::subscription::{SubscriptionRecord, SubscriptionStatus};

    async fn checker_with(
        account_age_days: i64,
        record: Option<SubscriptionStatus>,
    ) -> AccessChecker {
        let identity = MockIdentityProvider::new();
        identity.add_user("user-1", "fan@example.com", account_age_days);

        let store = InMemorySubscriptionStore::new();
        if let Some(status) = record {
            store
                .upsert(
                    "user-1",
                    &SubscriptionRecord {
                        plan_id: "monthly".to_string(),
                        status,
                        access_token: None,
                        checkout_session_id: None,
                        updated_at: 0,
                    },
                )
                .await
                .unwrap();
        }

        AccessChecker::new(Arc::new(store), Arc::new(identity), 7)
    }

    #[tokio::test]
    async fn new_account_gets_trial() {
        let checker = checker_with(2, None).await;
        let decision = checker.check("user-1").await.unwrap();
        assert!(decision.granted);
        assert!(decision.message.contains("trial"));
    }

    #[tokio::test]
    async fn expired_trial_without_subscription_denied() {
        let checker = checker_with(30, None).await;
        let decision = checker.check("user-1").await.unwrap();
        assert!(!decision.granted);
    }

    #[tokio::test]
    async fn active_subscription_granted() {
        let checker = checker_with(30, Some(SubscriptionStatus::Active)).await;
        assert!(checker.check("user-1").await.unwrap().granted);
    }

    #[tokio::test]
    async fn cancel_pending_still_granted() {
        let checker = checker_with(30, Some(SubscriptionStatus::CancelPending)).await;
        assert!(checker.check("user-1").await.unwrap().granted);
    }

    #[tokio::test]
    async fn canceled_subscription_denied() {
        let checker = checker_with(30, Some(SubscriptionStatus::Canceled)).await;
        assert!(!checker.check("user-1").await.unwrap().granted);
    }

    #[tokio::test]
    async fn pending_checkout_does_not_grant() {
        let checker = checker_with(30, Some(SubscriptionStatus::Pending)).await;
        assert!(!checker.check("user-1").await.unwrap().granted);
    }

    #[tokio::test]
    async fn trial_wins_over_stale_record() {
        // A day-old account with an abandoned checkout still gets the trial.
        let checker = checker_with(1, Some(SubscriptionStatus::Pending)).await;
        assert!(checker.check("user-1").await.unwrap().granted);
    }

    #[tokio::test]
    async fn unknown_user_errors() {
        let checker = checker_with(30, None).await;
        assert!(checker.check("nobody").await.is_err());
    }
}
