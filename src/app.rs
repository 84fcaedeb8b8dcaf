//! Application wiring.
//!
//! [`AppContext`] owns every collaborator the handlers need. All external
//! seams (identity, payments, storage, mail) are trait objects injected at
//! construction time, so tests swap in mocks without touching globals.

use std::sync::Arc;

use secrecy::SecretString;

use crate::access::AccessChecker;
use crate::config::Config;
use crate::email::{CampaignSender, Mailer};
use crate::identity::IdentityProvider;
use crate::payments::PaymentClient;
use crate::plans::Plans;
use crate::subscription::{CheckoutManager, SubscriptionStore, WebhookHandler};
use crate::token::AccessTokenIssuer;

/// Shared application state.
///
/// Cheap to clone; all fields live behind one `Arc`.
#[derive(Clone)]
pub struct AppContext {
    inner: Arc<AppInner>,
}

struct AppInner {
    checkout: CheckoutManager,
    webhooks: WebhookHandler,
    access: AccessChecker,
    campaigns: CampaignSender,
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn SubscriptionStore>,
    mailer: Arc<dyn Mailer>,
    plans: Plans,
    admin_key: SecretString,
}

impl AppContext {
    #[must_use]
    pub fn builder() -> AppContextBuilder {
        AppContextBuilder::default()
    }

    pub fn checkout(&self) -> &CheckoutManager {
        &self.inner.checkout
    }

    pub fn webhooks(&self) -> &WebhookHandler {
        &self.inner.webhooks
    }

    pub fn access(&self) -> &AccessChecker {
        &self.inner.access
    }

    pub fn campaigns(&self) -> &CampaignSender {
        &self.inner.campaigns
    }

    pub fn identity(&self) -> &dyn IdentityProvider {
        self.inner.identity.as_ref()
    }

    pub fn store(&self) -> &dyn SubscriptionStore {
        self.inner.store.as_ref()
    }

    pub fn mailer(&self) -> Arc<dyn Mailer> {
        self.inner.mailer.clone()
    }

    pub fn plans(&self) -> &Plans {
        &self.inner.plans
    }

    pub(crate) fn admin_key(&self) -> &SecretString {
        &self.inner.admin_key
    }
}

/// Builder for [`AppContext`].
#[derive(Default)]
pub struct AppContextBuilder {
    store: Option<Arc<dyn SubscriptionStore>>,
    identity: Option<Arc<dyn IdentityProvider>>,
    payments: Option<Arc<dyn PaymentClient>>,
    mailer: Option<Arc<dyn Mailer>>,
    plans: Option<Plans>,
    config: Option<Config>,
}

impl AppContextBuilder {
    #[must_use]
    pub fn store(mut self, store: Arc<dyn SubscriptionStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    #[must_use]
    pub fn payments(mut self, payments: Arc<dyn PaymentClient>) -> Self {
        self.payments = Some(payments);
        self
    }

    #[must_use]
    pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    #[must_use]
    pub fn plans(mut self, plans: Plans) -> Self {
        self.plans = Some(plans);
        self
    }

    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Wire everything together.
    ///
    /// # Panics
    ///
    /// Panics if any collaborator is missing. Wiring happens once at
    /// startup (or test setup); a missing piece is a programming error.
    #[must_use]
    pub fn build(self) -> AppContext {
        let store = self.store.expect("AppContext requires a subscription store");
        let identity = self.identity.expect("AppContext requires an identity provider");
        let payments = self.payments.expect("AppContext requires a payment client");
        let mailer = self.mailer.expect("AppContext requires a mailer");
        let config = self.config.expect("AppContext requires a config");
        let plans = self
            .plans
            .unwrap_or_else(|| Plans::standard(&config.plans));

        let tokens = AccessTokenIssuer::new(&config.tokens);

        let checkout = CheckoutManager::new(
            store.clone(),
            payments,
            plans.clone(),
            tokens.clone(),
            config.payments.success_url.clone(),
            config.payments.cancel_url.clone(),
        );

        let webhooks = WebhookHandler::new(
            store.clone(),
            tokens,
            plans.clone(),
            config.payments.webhook_secret.clone(),
        );

        let access = AccessChecker::new(store.clone(), identity.clone(), config.access.trial_days);

        let campaigns = CampaignSender::new(mailer.clone(), config.mail.from_address.clone());

        AppContext {
            inner: Arc::new(AppInner {
                checkout,
                webhooks,
                access,
                campaigns,
                identity,
                store,
                mailer,
                plans,
                admin_key: config.mail.admin_key.clone(),
            }),
        }
    }
}
