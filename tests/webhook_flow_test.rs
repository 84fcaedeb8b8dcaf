//! End-to-end webhook reconciliation through the HTTP surface.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

use common::{webhook_request, TestApp};
use goalcast::subscription::SubscriptionStatus;

fn checkout_completed(event_id: &str, user_id: &str, plan_id: &str) -> serde_json::Value {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "created": 1_700_000_000,
        "data": {
            "object": {
                "id": "cs_test_live",
                "metadata": { "user_id": user_id, "plan_id": plan_id }
            }
        }
    })
}

fn subscription_updated(
    event_id: &str,
    user_id: &str,
    status: &str,
    cancel_at_period_end: bool,
) -> serde_json::Value {
    json!({
        "id": event_id,
        "type": "customer.subscription.updated",
        "created": 1_700_000_000,
        "data": {
            "object": {
                "id": "sub_1",
                "status": status,
                "cancel_at_period_end": cancel_at_period_end,
                "metadata": { "user_id": user_id, "plan_id": "yearly" }
            }
        }
    })
}

#[tokio::test]
async fn signed_checkout_event_activates_subscription() {
    let app = TestApp::new();

    let (status, body) = app
        .request(webhook_request(&checkout_completed("evt_1", "user-1", "yearly")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let record = app.store.all_records().remove("user-1").unwrap();
    assert_eq!(record.status, SubscriptionStatus::Active);
    assert_eq!(record.plan_id, "yearly");

    // Stored token verifies against the app's signing config.
    let claims = app
        .token_issuer()
        .verify(record.access_token.as_deref().unwrap())
        .unwrap();
    assert_eq!(claims.sub, "user-1");
}

#[tokio::test]
async fn invalid_signature_is_rejected_without_side_effects() {
    let app = TestApp::new();

    let body = serde_json::to_vec(&checkout_completed("evt_1", "user-1", "monthly")).unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/payments")
        .header("content-type", "application/json")
        .header("Webhook-Signature", "t=1700000000,v1=deadbeef")
        .body(Body::from(body))
        .unwrap();

    let (status, _) = app.request(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.store.all_records().is_empty());
}

#[tokio::test]
async fn missing_signature_header_is_rejected() {
    let app = TestApp::new();

    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/payments")
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();

    let (status, _) = app.request(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn redelivered_event_does_not_rewrite_the_record() {
    let app = TestApp::new();
    let event = checkout_completed("evt_dup", "user-1", "monthly");

    let (status, _) = app.request(webhook_request(&event)).await;
    assert_eq!(status, StatusCode::OK);
    let first = app.store.all_records().remove("user-1").unwrap();

    let (status, _) = app.request(webhook_request(&event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.store.all_records().remove("user-1").unwrap(), first);
}

#[tokio::test]
async fn cancellation_at_period_end_keeps_access() {
    let app = TestApp::new();

    app.request(webhook_request(&checkout_completed("evt_1", "user-1", "yearly")))
        .await;
    app.request(webhook_request(&subscription_updated(
        "evt_2", "user-1", "active", true,
    )))
    .await;

    let record = app.store.all_records().remove("user-1").unwrap();
    assert_eq!(record.status, SubscriptionStatus::CancelPending);
    assert!(record.access_token.is_some());
}

#[tokio::test]
async fn deleted_subscription_clears_the_token() {
    let app = TestApp::new();

    app.request(webhook_request(&checkout_completed("evt_1", "user-1", "yearly")))
        .await;

    let deletion = json!({
        "id": "evt_2",
        "type": "customer.subscription.deleted",
        "created": 1_700_000_000,
        "data": {
            "object": {
                "id": "sub_1",
                "status": "canceled",
                "metadata": { "user_id": "user-1" }
            }
        }
    });
    app.request(webhook_request(&deletion)).await;

    let record = app.store.all_records().remove("user-1").unwrap();
    assert_eq!(record.status, SubscriptionStatus::Canceled);
    assert!(record.access_token.is_none());
}

#[tokio::test]
async fn checkout_without_metadata_is_correlated_by_session_id() {
    let app = TestApp::new();
    let session = app.identity.add_user("user-1", "fan@example.com", 3);

    // Checkout writes the pending row carrying the provider session ID
    // (the mock provider numbers sessions from zero).
    let checkout = axum::http::Request::builder()
        .method("POST")
        .uri("/api/checkout")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", session))
        .body(Body::from(
            serde_json::to_vec(&json!({ "price_id": "price_q" })).unwrap(),
        ))
        .unwrap();
    let (status, _) = app.request(checkout).await;
    assert_eq!(status, StatusCode::OK);

    // The provider stripped the metadata; only the session ID links back.
    let event = json!({
        "id": "evt_bare",
        "type": "checkout.session.completed",
        "created": 1_700_000_000,
        "data": {
            "object": { "id": "cs_test_0", "metadata": {} }
        }
    });
    let (status, _) = app.request(webhook_request(&event)).await;
    assert_eq!(status, StatusCode::OK);

    let record = app.store.all_records().remove("user-1").unwrap();
    assert_eq!(record.status, SubscriptionStatus::Active);
    assert_eq!(record.plan_id, "quarterly");
}

#[tokio::test]
async fn unrecognized_event_kind_is_acknowledged() {
    let app = TestApp::new();

    let event = json!({
        "id": "evt_noise",
        "type": "invoice.payment_succeeded",
        "created": 1_700_000_000,
        "data": { "object": {} }
    });

    let (status, _) = app.request(webhook_request(&event)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.store.all_records().is_empty());
}
