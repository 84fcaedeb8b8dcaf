//! Storage trait for subscription records.
//!
//! One record per user, mutated only by the checkout manager and the
//! webhook handler. Implement [`SubscriptionStore`] against your database;
//! an in-memory implementation is provided for development and tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A user's subscription record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionRecord {
    /// Internal plan identifier.
    pub plan_id: String,
    /// Current subscription state.
    pub status: SubscriptionStatus,
    /// Signed analytics access token; present only while the status grants
    /// access (or while a checkout is pending).
    pub access_token: Option<String>,
    /// Checkout session that created this record; correlates webhook events
    /// back to the user when event metadata is missing.
    pub checkout_session_id: Option<String>,
    /// Last mutation time (unix timestamp). Plan expiry is this plus the
    /// plan's period length.
    pub updated_at: u64,
}

impl SubscriptionRecord {
    /// Whether this record grants access to paid features.
    #[must_use]
    pub fn grants_access(&self) -> bool {
        self.status.grants_access()
    }
}

/// Subscription state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Checkout session created, payment not yet confirmed.
    Pending,
    /// Paid and active.
    Active,
    /// User canceled; remains active until the period ends.
    CancelPending,
    /// Canceled or lapsed.
    Canceled,
}

impl SubscriptionStatus {
    /// Map a provider subscription status into the local state.
    ///
    /// The provider reports a cancellation scheduled for period end as
    /// `active` with `cancel_at_period_end` set; that combination becomes
    /// [`CancelPending`](Self::CancelPending) here.
    #[must_use]
    pub fn from_provider(status: &str, cancel_at_period_end: bool) -> Self {
        match status {
            "active" | "trialing" if cancel_at_period_end => Self::CancelPending,
            "active" | "trialing" => Self::Active,
            "incomplete" => Self::Pending,
            _ => Self::Canceled,
        }
    }

    /// Whether this status grants access to paid features.
    #[must_use]
    pub fn grants_access(&self) -> bool {
        matches!(self, Self::Active | Self::CancelPending)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::CancelPending => "cancel_pending",
            Self::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trait for persisting subscription state.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Get the subscription record for a user.
    async fn get(&self, user_id: &str) -> Result<Option<SubscriptionRecord>>;

    /// Insert or replace the subscription record for a user.
    ///
    /// Keyed by user ID, so there is at most one record per user.
    async fn upsert(&self, user_id: &str, record: &SubscriptionRecord) -> Result<()>;

    /// Find a record by the checkout session that created it.
    async fn find_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<(String, SubscriptionRecord)>>;

    // Webhook idempotency

    /// Check whether a webhook event has already been processed.
    async fn is_event_processed(&self, event_id: &str) -> Result<bool>;

    /// Record a webhook event as processed.
    async fn mark_event_processed(&self, event_id: &str) -> Result<()>;

    /// Clean up old processed events (default: no-op).
    async fn cleanup_old_events(&self, _older_than_days: u32) -> Result<usize> {
        Ok(0)
    }
}

/// In-memory store, for development and tests.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, RwLock};

    /// In-memory subscription store.
    ///
    /// Wraps its data in `Arc` so clones share state.
    #[derive(Default, Clone)]
    pub struct InMemorySubscriptionStore {
        inner: Arc<Inner>,
    }

    #[derive(Default)]
    struct Inner {
        records: RwLock<HashMap<String, SubscriptionRecord>>,
        processed_events: RwLock<HashMap<String, u64>>,
    }

    impl InMemorySubscriptionStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Snapshot of all records (for tests).
        pub fn all_records(&self) -> HashMap<String, SubscriptionRecord> {
            self.inner.records.read().unwrap().clone()
        }
    }

    #[async_trait]
    impl SubscriptionStore for InMemorySubscriptionStore {
        async fn get(&self, user_id: &str) -> Result<Option<SubscriptionRecord>> {
            Ok(self.inner.records.read().unwrap().get(user_id).cloned())
        }

        async fn upsert(&self, user_id: &str, record: &SubscriptionRecord) -> Result<()> {
            self.inner
                .records
                .write()
                .unwrap()
                .insert(user_id.to_string(), record.clone());
            Ok(())
        }

        async fn find_by_session(
            &self,
            session_id: &str,
        ) -> Result<Option<(String, SubscriptionRecord)>> {
            let records = self.inner.records.read().unwrap();
            for (user_id, record) in records.iter() {
                if record.checkout_session_id.as_deref() == Some(session_id) {
                    return Ok(Some((user_id.clone(), record.clone())));
                }
            }
            Ok(None)
        }

        async fn is_event_processed(&self, event_id: &str) -> Result<bool> {
            Ok(self
                .inner
                .processed_events
                .read()
                .unwrap()
                .contains_key(event_id))
        }

        async fn mark_event_processed(&self, event_id: &str) -> Result<()> {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);

            self.inner
                .processed_events
                .write()
                .unwrap()
                .insert(event_id.to_string(), now);
            Ok(())
        }

        async fn cleanup_old_events(&self, older_than_days: u32) -> Result<usize> {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);

            let cutoff = now.saturating_sub(u64::from(older_than_days) * 86_400);
            let mut events = self.inner.processed_events.write().unwrap();
            let initial_len = events.len();
            events.retain(|_, &mut timestamp| timestamp >= cutoff);
            Ok(initial_len - events.len())
        }
    }
}
