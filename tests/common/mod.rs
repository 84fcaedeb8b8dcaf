//! Shared test harness: a fully wired router over in-memory fakes.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use sha2::Sha256;
use tower::ServiceExt;

use goalcast::app::AppContext;
use goalcast::config::{
    ConfigBuilder, IdentityConfig, MailConfig, PaymentsConfig, PlanPrices, TokenConfig,
};
use goalcast::email::test::MockMailer;
use goalcast::identity::test::MockIdentityProvider;
use goalcast::payments::test::MockPaymentClient;
use goalcast::subscription::store::memory::InMemorySubscriptionStore;
use goalcast::token::AccessTokenIssuer;

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const TOKEN_SECRET: &str = "test-token-secret-32-bytes-long!";
pub const ADMIN_KEY: &str = "admin-key-for-tests-123";

pub struct TestApp {
    pub router: Router,
    pub store: InMemorySubscriptionStore,
    pub identity: Arc<MockIdentityProvider>,
    pub payments: Arc<MockPaymentClient>,
    pub mailer: Arc<MockMailer>,
}

impl TestApp {
    pub fn new() -> Self {
        let store = InMemorySubscriptionStore::new();
        let identity = Arc::new(MockIdentityProvider::new());
        let payments = Arc::new(MockPaymentClient::new());
        let mailer = Arc::new(MockMailer::new());

        let config = ConfigBuilder::new()
            .with_identity(IdentityConfig {
                base_url: "https://auth.example.com".to_string(),
                api_key: "identity-admin-key".to_string().into(),
                session_secret: "session-signing-secret-32-bytes!".to_string().into(),
            })
            .with_payments(PaymentsConfig {
                api_key: "sk_test_abcdefghijklmnop".to_string().into(),
                webhook_secret: WEBHOOK_SECRET.to_string().into(),
                success_url: "https://goalcast.example.com/success".to_string(),
                cancel_url: "https://goalcast.example.com/pricing".to_string(),
            })
            .with_tokens(TokenConfig {
                secret: TOKEN_SECRET.to_string().into(),
                issuer: "goalcast".to_string(),
                ttl_days: 30,
            })
            .with_plan_prices(PlanPrices {
                monthly: "price_m".to_string(),
                quarterly: "price_q".to_string(),
                yearly: "price_y".to_string(),
            })
            .with_mail(MailConfig {
                from_address: "news@goalcast.example.com".to_string(),
                admin_key: ADMIN_KEY.to_string().into(),
            })
            .build()
            .expect("test config");

        let ctx = AppContext::builder()
            .store(Arc::new(store.clone()))
            .identity(identity.clone())
            .payments(payments.clone())
            .mailer(mailer.clone())
            .config(config)
            .build();

        Self {
            router: goalcast::http::router(ctx),
            store,
            identity,
            payments,
            mailer,
        }
    }

    /// Issue a request and return the status and parsed JSON body.
    pub async fn request(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router never fails");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body collects")
            .to_bytes();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("JSON body")
        };
        (status, json)
    }

    /// Token issuer matching the app's token config.
    pub fn token_issuer(&self) -> AccessTokenIssuer {
        AccessTokenIssuer::with_secret(TOKEN_SECRET.to_string().into(), "goalcast", 30)
    }
}

/// Sign a webhook payload the way the payment provider does.
pub fn sign_webhook(payload: &[u8]) -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();

    type HmacSha256 = Hmac<Sha256>;
    let mut mac =
        HmacSha256::new_from_slice(WEBHOOK_SECRET.as_bytes()).expect("hmac accepts any key");
    mac.update(format!("{}.{}", timestamp, String::from_utf8_lossy(payload)).as_bytes());
    let sig = hex::encode(mac.finalize().into_bytes());

    format!("t={},v1={}", timestamp, sig)
}

/// Build a signed webhook delivery request.
pub fn webhook_request(payload: &serde_json::Value) -> Request<Body> {
    let body = serde_json::to_vec(payload).unwrap();
    let signature = sign_webhook(&body);

    Request::builder()
        .method("POST")
        .uri("/webhooks/payments")
        .header("content-type", "application/json")
        .header("Webhook-Signature", signature)
        .body(Body::from(body))
        .unwrap()
}
