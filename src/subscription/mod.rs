//! Subscription lifecycle.
//!
//! Checkout creates a `pending` record; webhook reconciliation moves it
//! through `active`, `cancel_pending`, and `canceled` as the payment
//! provider reports changes.

pub mod checkout;
pub mod store;
pub mod webhook;

pub use checkout::CheckoutManager;
pub use store::{SubscriptionRecord, SubscriptionStatus, SubscriptionStore};
pub use webhook::{WebhookEvent, WebhookHandler, WebhookOutcome};
