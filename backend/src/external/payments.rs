//! Payment gateway client for purchase charges
//!
//! Integrates with an Openpay-style REST API. In sandbox mode charges are
//! simulated locally and settled through a signed loopback webhook, so the
//! webhook endpoint is exercised the same way the live gateway would.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use uuid::Uuid;

use crate::config::PaymentsConfig;
use crate::error::{AppError, AppResult};

/// Header carrying the webhook HMAC signature
pub const SIGNATURE_HEADER: &str = "x-payment-signature";

/// Delay before the sandbox loopback webhook fires
const SANDBOX_SETTLEMENT_DELAY: Duration = Duration::from_secs(2);

/// Payment gateway client
#[derive(Clone)]
pub struct PaymentGatewayClient {
    client: Client,
    merchant_id: String,
    private_key: String,
    base_url: String,
    sandbox: bool,
    webhook_secret: String,
    webhook_url: String,
    public_url: String,
}

/// Settlement state of a gateway charge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeStatus {
    Pending,
    Completed,
    Failed,
}

impl ChargeStatus {
    /// Parse a gateway status string
    pub fn from_gateway(s: &str) -> Option<Self> {
        match s {
            "charge_pending" | "in_progress" => Some(ChargeStatus::Pending),
            "completed" => Some(ChargeStatus::Completed),
            "failed" | "cancelled" | "expired" => Some(ChargeStatus::Failed),
            _ => None,
        }
    }
}

/// Input for creating a charge
#[derive(Debug, Clone)]
pub struct CreateChargeInput {
    pub amount: Decimal,
    pub description: String,
    pub customer_name: String,
    pub customer_email: String,
    pub order_id: Uuid,
}

/// A created gateway charge
#[derive(Debug, Clone)]
pub struct Charge {
    pub id: String,
    pub amount: Decimal,
    pub status: ChargeStatus,
    /// Redirect URL where the buyer completes the payment
    pub payment_url: Option<String>,
    pub order_id: String,
}

/// Webhook event posted by the gateway
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub transaction: WebhookTransaction,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookTransaction {
    pub id: String,
    pub order_id: String,
    pub amount: Decimal,
    pub status: String,
}

/// Gateway API request for creating a charge
#[derive(Debug, Serialize)]
struct GatewayChargeRequest {
    method: &'static str,
    amount: Decimal,
    description: String,
    order_id: String,
    customer: GatewayCustomer,
    confirm: bool,
    redirect_url: String,
}

#[derive(Debug, Serialize)]
struct GatewayCustomer {
    name: String,
    email: String,
}

/// Gateway API response for a charge
#[derive(Debug, Deserialize)]
struct GatewayChargeResponse {
    id: String,
    amount: Decimal,
    status: String,
    order_id: Option<String>,
    payment_method: Option<GatewayPaymentMethod>,
}

#[derive(Debug, Deserialize)]
struct GatewayPaymentMethod {
    url: Option<String>,
}

impl PaymentGatewayClient {
    /// Create a new PaymentGatewayClient instance
    pub fn new(config: &PaymentsConfig, public_url: &str) -> Self {
        Self {
            client: Client::new(),
            merchant_id: config.merchant_id.clone(),
            private_key: config.private_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            sandbox: config.sandbox,
            webhook_secret: config.webhook_secret.clone(),
            webhook_url: config.webhook_url.clone(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a charge for a purchase
    pub async fn create_charge(&self, input: CreateChargeInput) -> AppResult<Charge> {
        if self.sandbox {
            return Ok(self.create_sandbox_charge(input));
        }

        let request = GatewayChargeRequest {
            method: "card",
            amount: input.amount,
            description: input.description,
            order_id: input.order_id.to_string(),
            customer: GatewayCustomer {
                name: input.customer_name,
                email: input.customer_email,
            },
            confirm: false,
            redirect_url: format!("{}/payment/result", self.public_url),
        };

        let url = format!("{}/{}/charges", self.base_url, self.merchant_id);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.private_key, Some(""))
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::PaymentGatewayError(format!("charge request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::PaymentGatewayError(format!(
                "charge rejected with {}: {}",
                status, body
            )));
        }

        let charge: GatewayChargeResponse = response
            .json()
            .await
            .map_err(|e| AppError::PaymentGatewayError(format!("invalid charge response: {}", e)))?;

        let status = ChargeStatus::from_gateway(&charge.status).ok_or_else(|| {
            AppError::PaymentGatewayError(format!("unknown charge status '{}'", charge.status))
        })?;

        Ok(Charge {
            id: charge.id,
            amount: charge.amount,
            status,
            payment_url: charge.payment_method.and_then(|m| m.url),
            order_id: charge.order_id.unwrap_or_else(|| input.order_id.to_string()),
        })
    }

    /// Look up the settlement state of a charge. Used by reconciliation.
    pub async fn get_charge(&self, charge_id: &str) -> AppResult<ChargeStatus> {
        if self.sandbox {
            // The simulated gateway settles everything
            return Ok(ChargeStatus::Completed);
        }

        let url = format!("{}/{}/charges/{}", self.base_url, self.merchant_id, charge_id);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.private_key, Some(""))
            .send()
            .await
            .map_err(|e| AppError::PaymentGatewayError(format!("charge lookup failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::PaymentGatewayError(format!(
                "charge lookup rejected with {}",
                response.status()
            )));
        }

        let charge: GatewayChargeResponse = response
            .json()
            .await
            .map_err(|e| AppError::PaymentGatewayError(format!("invalid charge response: {}", e)))?;

        ChargeStatus::from_gateway(&charge.status).ok_or_else(|| {
            AppError::PaymentGatewayError(format!("unknown charge status '{}'", charge.status))
        })
    }

    /// Build a simulated charge and schedule its loopback settlement
    fn create_sandbox_charge(&self, input: CreateChargeInput) -> Charge {
        let charge_id = format!("ch_{}", Uuid::new_v4().simple());

        let event = WebhookEvent {
            event_type: "charge.succeeded".to_string(),
            transaction: WebhookTransaction {
                id: charge_id.clone(),
                order_id: input.order_id.to_string(),
                amount: input.amount,
                status: "completed".to_string(),
            },
        };
        self.schedule_sandbox_settlement(event);

        Charge {
            id: charge_id.clone(),
            amount: input.amount,
            status: ChargeStatus::Pending,
            payment_url: Some(format!("{}/payment/checkout/{}", self.public_url, charge_id)),
            order_id: input.order_id.to_string(),
        }
    }

    /// Post a signed webhook event back to our own endpoint after a short
    /// delay, standing in for the live gateway's confirmation call.
    fn schedule_sandbox_settlement(&self, event: WebhookEvent) {
        let client = self.client.clone();
        let webhook_url = self.webhook_url.clone();
        let secret = self.webhook_secret.clone();

        tokio::spawn(async move {
            tokio::time::sleep(SANDBOX_SETTLEMENT_DELAY).await;

            let body = match serde_json::to_vec(&event) {
                Ok(b) => b,
                Err(e) => {
                    tracing::error!("Failed to serialize sandbox webhook event: {}", e);
                    return;
                }
            };
            let signature = match sign_payload(&secret, &body) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("Failed to sign sandbox webhook event: {}", e);
                    return;
                }
            };

            match client
                .post(&webhook_url)
                .header(SIGNATURE_HEADER, signature)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(
                        "Sandbox settlement delivered for charge {}",
                        event.transaction.id
                    );
                }
                Ok(response) => {
                    tracing::warn!(
                        "Sandbox settlement for charge {} rejected with {}",
                        event.transaction.id,
                        response.status()
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Sandbox settlement for charge {} failed: {}",
                        event.transaction.id,
                        e
                    );
                }
            }
        });
    }
}

/// Compute the base64 HMAC-SHA256 signature of a webhook payload
pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String, String> {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| "Failed to create HMAC".to_string())?;
    mac.update(body);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_payload_is_deterministic() {
        let a = sign_payload("secret", b"{\"type\":\"charge.succeeded\"}").unwrap();
        let b = sign_payload("secret", b"{\"type\":\"charge.succeeded\"}").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_sign_payload_detects_tampering() {
        let original = sign_payload("secret", b"amount=100").unwrap();
        assert_ne!(original, sign_payload("secret", b"amount=900").unwrap());
        assert_ne!(original, sign_payload("other-secret", b"amount=100").unwrap());
    }

    #[test]
    fn test_charge_status_parsing() {
        assert_eq!(
            ChargeStatus::from_gateway("charge_pending"),
            Some(ChargeStatus::Pending)
        );
        assert_eq!(
            ChargeStatus::from_gateway("completed"),
            Some(ChargeStatus::Completed)
        );
        assert_eq!(
            ChargeStatus::from_gateway("cancelled"),
            Some(ChargeStatus::Failed)
        );
        assert_eq!(ChargeStatus::from_gateway("refunded"), None);
    }
}
