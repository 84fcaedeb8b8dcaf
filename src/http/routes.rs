//! HTTP surface.
//!
//! Routes:
//! - `GET  /health` - liveness probe
//! - `POST /webhooks/payments` - payment provider event delivery
//! - `POST /api/checkout` - create a hosted checkout session (bearer session)
//! - `POST /api/access/check` - premium access check for a user
//! - `GET  /api/access/token` - analytics token retrieval (bearer session)
//! - `POST /api/marketing/send` - campaign dispatch (admin key)

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::app::AppContext;
use crate::email::{Campaign, CampaignReport};
use crate::error::{GoalcastError, Result};
use crate::health::{HealthChecker, MailerHealthCheck};

use super::extract::{bearer_token, require_admin_key};
use super::response::ApiResponse;

/// Build the application router.
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhooks/payments", post(payment_webhook))
        .route("/api/checkout", post(create_checkout))
        .route("/api/access/check", post(check_access))
        .route("/api/access/token", get(get_access_token))
        .route("/api/marketing/send", post(send_campaign))
        .with_state(ctx)
}

async fn health(State(ctx): State<AppContext>) -> impl IntoResponse {
    HealthChecker::new()
        .with_check(Arc::new(MailerHealthCheck::new(ctx.mailer())))
        .check_health()
        .await
}

#[derive(Debug, Serialize)]
struct WebhookAck {
    received: bool,
}

/// Payment provider webhook delivery.
///
/// The body must stay raw bytes; the signature covers the exact payload
/// the provider sent.
async fn payment_webhook(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let signature = headers
        .get("Webhook-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| GoalcastError::bad_request("Missing Webhook-Signature header"))?;

    let event = ctx.webhooks().verify_signature(&body, signature)?;
    let outcome = ctx.webhooks().handle_event(event).await?;

    tracing::debug!(target: "goalcast::webhook", ?outcome, "Webhook acknowledged");
    Ok(ApiResponse::success(WebhookAck { received: true }))
}

#[derive(Debug, Deserialize)]
struct CheckoutRequest {
    price_id: String,
}

#[derive(Debug, Serialize)]
struct CheckoutResponse {
    session_id: String,
    checkout_url: String,
}

/// Create a hosted checkout session for the authenticated user.
async fn create_checkout(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Json(request): Json<CheckoutRequest>,
) -> Result<impl IntoResponse> {
    let session_token = bearer_token(&headers)?;
    let claims = ctx.identity().verify_session(session_token).await?;
    let user = ctx.identity().get_user(&claims.sub).await?;

    let session = ctx.checkout().create_session(&user, &request.price_id).await?;

    Ok(ApiResponse::success(CheckoutResponse {
        session_id: session.id,
        checkout_url: session.url,
    }))
}

#[derive(Debug, Deserialize)]
struct AccessCheckRequest {
    user_id: String,
}

#[derive(Debug, Serialize)]
struct AccessCheckResponse {
    success: bool,
    message: String,
}

/// Premium access check.
///
/// Always answers 200; the grant/deny outcome is in the body so the
/// analytics app can show the message verbatim.
async fn check_access(
    State(ctx): State<AppContext>,
    Json(request): Json<AccessCheckRequest>,
) -> Result<Json<AccessCheckResponse>> {
    let decision = match ctx.access().check(&request.user_id).await {
        Ok(decision) => decision,
        Err(GoalcastError::NotFound(_)) => {
            return Ok(Json(AccessCheckResponse {
                success: false,
                message: "Unknown user".to_string(),
            }));
        }
        Err(e) => return Err(e),
    };

    Ok(Json(AccessCheckResponse {
        success: decision.granted,
        message: decision.message,
    }))
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    access_token: String,
}

/// Hand the stored analytics token to a premium subscriber.
async fn get_access_token(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let session_token = bearer_token(&headers)?;
    let claims = ctx.identity().verify_session(session_token).await?;

    let record = ctx
        .store()
        .get(&claims.sub)
        .await?
        .ok_or_else(|| GoalcastError::forbidden("No subscription on file"))?;

    if !record.grants_access() {
        return Err(GoalcastError::forbidden("Subscription is not active"));
    }

    let plan = ctx
        .plans()
        .get(&record.plan_id)
        .ok_or_else(|| GoalcastError::internal("Subscription references unknown plan"))?;
    if !plan.premium {
        return Err(GoalcastError::forbidden(
            "Analytics access requires a premium plan",
        ));
    }

    let access_token = record
        .access_token
        .ok_or_else(|| GoalcastError::internal("Active subscription has no access token"))?;

    Ok(ApiResponse::success(TokenResponse { access_token }))
}

/// Dispatch a marketing campaign. Admin only.
async fn send_campaign(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Json(campaign): Json<Campaign>,
) -> Result<impl IntoResponse> {
    require_admin_key(&headers, ctx.admin_key())?;

    if campaign.recipients.is_empty() {
        return Err(GoalcastError::bad_request("Campaign has no recipients"));
    }

    let report: CampaignReport = ctx.campaigns().send(&campaign).await;
    Ok(ApiResponse::success(report))
}
