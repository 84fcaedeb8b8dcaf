//! Goalcast backend.
//!
//! Subscription-gated backend for a football prediction service. Users
//! authenticate against a hosted identity provider, pay through a hosted
//! checkout, and unlock an external analytics app with a signed access
//! token. The payment provider's webhooks are the single source of truth
//! for subscription state.
//!
//! # Architecture
//!
//! - [`plans`] - the plan catalogue and price allow-list
//! - [`subscription`] - checkout, storage, and webhook reconciliation
//! - [`token`] - signed analytics access tokens
//! - [`identity`] - hosted identity provider integration
//! - [`access`] - trial and subscription access checks
//! - [`email`] - marketing campaign dispatch
//! - [`http`] - the axum routing layer
//!
//! External seams (identity, payments, storage, mail) are traits; the
//! [`app::AppContext`] builder takes `Arc<dyn ...>` handles so tests and
//! deployments choose their own implementations.

pub mod access;
pub mod app;
pub mod config;
pub mod email;
pub mod error;
pub mod health;
pub mod http;
pub mod identity;
pub mod payments;
pub mod plans;
pub mod subscription;
pub mod token;

pub use app::AppContext;
pub use config::{Config, ConfigBuilder};
pub use error::{GoalcastError, Result};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set, otherwise from the
/// configured level. `json` switches the output format for log
/// collectors.
pub fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("goalcast={}", level)));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
