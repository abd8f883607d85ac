//! HTTP handler for payment gateway webhooks

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;

use crate::external::payments::{sign_payload, WebhookEvent, SIGNATURE_HEADER};
use crate::services::purchase::WebhookOutcome;
use crate::services::PurchaseService;
use crate::AppState;

// ============================================================================
// Response Types
// ============================================================================

/// Response for webhook processing
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Handle payment gateway charge events
/// POST /webhook/payments
///
/// This endpoint receives charge settlement events from the payment
/// gateway (or, in sandbox mode, from our own loopback). It verifies the
/// signature and applies the status transition idempotently.
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, (StatusCode, Json<WebhookResponse>)> {
    // Verify webhook signature
    if let Err(e) = verify_signature(&state, &headers, &body) {
        tracing::warn!("Payment webhook signature verification failed: {}", e);
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(WebhookResponse {
                success: false,
                message: "Invalid signature".to_string(),
            }),
        ));
    }

    // Parse webhook event
    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to parse payment webhook: {}", e);
            return Err((
                StatusCode::BAD_REQUEST,
                Json(WebhookResponse {
                    success: false,
                    message: format!("Invalid request body: {}", e),
                }),
            ));
        }
    };

    let succeeded = match event.event_type.as_str() {
        "charge.succeeded" => true,
        "charge.failed" | "charge.cancelled" => false,
        other => {
            // Unrelated event types are acknowledged so the gateway stops
            // resending them
            tracing::debug!("Ignoring payment webhook event type '{}'", other);
            return Ok(Json(WebhookResponse {
                success: true,
                message: format!("Event type '{}' ignored", other),
            }));
        }
    };

    let service = PurchaseService::new(state.db.clone());
    let outcome = match service
        .apply_charge_event(&event.transaction.id, succeeded)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            // A transient failure: let the gateway retry the delivery
            tracing::error!("Failed to process payment webhook: {}", e);
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WebhookResponse {
                    success: false,
                    message: "Processing error".to_string(),
                }),
            ));
        }
    };

    let message = match outcome {
        WebhookOutcome::Applied(status) => {
            format!("Charge {} settled as {}", event.transaction.id, status.as_str())
        }
        WebhookOutcome::AlreadySettled => {
            tracing::debug!(
                "Replayed webhook for already-settled charge {}",
                event.transaction.id
            );
            "Charge already settled".to_string()
        }
        WebhookOutcome::UnknownCharge => {
            tracing::warn!("Webhook for unknown charge {}", event.transaction.id);
            "Unknown charge".to_string()
        }
    };

    Ok(Json(WebhookResponse {
        success: true,
        message,
    }))
}

/// Verify the webhook HMAC signature against the configured secret
fn verify_signature(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<(), String> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| format!("Missing {} header", SIGNATURE_HEADER))?;

    let expected = sign_payload(&state.config.payments.webhook_secret, body)?;

    if signature != expected {
        return Err("Signature mismatch".to_string());
    }

    Ok(())
}
