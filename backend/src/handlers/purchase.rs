//! HTTP handlers for purchase endpoints

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::external::payments::CreateChargeInput;
use crate::external::PaymentGatewayClient;
use crate::middleware::CurrentUser;
use crate::services::purchase::{CreatePurchaseInput, PurchaseDetail, PurchaseListItem};
use crate::services::PurchaseService;
use crate::AppState;
use shared::Purchase;

// ============================================================================
// Response Types
// ============================================================================

/// Response for a created purchase: the record plus where to pay
#[derive(Debug, Serialize)]
pub struct CreatePurchaseResponse {
    pub purchase: Purchase,
    pub payment_url: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a purchase: reserve the material, then open a gateway charge
/// POST /purchases
pub async fn create_purchase(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreatePurchaseInput>,
) -> AppResult<(StatusCode, Json<CreatePurchaseResponse>)> {
    current_user.0.require_company()?;

    let customer_name = input.customer_name.clone();
    let customer_email = input.customer_email.clone();

    let service = PurchaseService::new(state.db.clone());
    let created = service
        .create_purchase(current_user.0.user_id, input)
        .await?;

    let gateway =
        PaymentGatewayClient::new(&state.config.payments, &state.config.server.public_url);

    let charge = gateway
        .create_charge(CreateChargeInput {
            amount: created.purchase.total_amount,
            description: format!(
                "Compra de material reciclable - {}",
                created.material_title
            ),
            customer_name,
            customer_email,
            order_id: created.purchase.id,
        })
        .await;

    let charge = match charge {
        Ok(charge) => charge,
        Err(e) => {
            // The gateway refused the charge: settle as failed and put the
            // material back on the shelf
            service.fail_purchase(created.purchase.id).await?;
            return Err(e);
        }
    };

    service
        .attach_charge(created.purchase.id, &charge.id)
        .await?;

    let mut purchase = created.purchase;
    purchase.charge_id = Some(charge.id);

    Ok((
        StatusCode::CREATED,
        Json(CreatePurchaseResponse {
            purchase,
            payment_url: charge.payment_url,
        }),
    ))
}

/// The current company's purchases
/// GET /purchases
pub async fn list_own_purchases(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<PurchaseListItem>>> {
    current_user.0.require_company()?;

    let service = PurchaseService::new(state.db.clone());
    let purchases = service.list_for_user(current_user.0.user_id).await?;
    Ok(Json(purchases))
}

/// Purchases of a given company (admin view)
/// GET /purchases/user/:user_id
pub async fn list_user_purchases(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<PurchaseListItem>>> {
    current_user.0.require_admin()?;

    let service = PurchaseService::new(state.db.clone());
    let purchases = service.list_for_user(user_id).await?;
    Ok(Json(purchases))
}

/// Purchase detail; visible to the buyer, the selling school, and admins
/// GET /purchases/:purchase_id
pub async fn get_purchase(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(purchase_id): Path<Uuid>,
) -> AppResult<Json<PurchaseDetail>> {
    let service = PurchaseService::new(state.db.clone());
    let detail = service.get_purchase(purchase_id).await?;

    if current_user.0.user_id != detail.material_owner_id {
        current_user.0.require_owner(detail.purchase.user_id)?;
    }

    Ok(Json(detail))
}

/// Plain-text receipt download for a settled purchase
/// GET /purchases/:purchase_id/receipt
pub async fn get_receipt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(purchase_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let service = PurchaseService::new(state.db.clone());

    let detail = service.get_purchase(purchase_id).await?;
    if current_user.0.user_id != detail.material_owner_id {
        current_user.0.require_owner(detail.purchase.user_id)?;
    }

    let (folio, body) = service.receipt(purchase_id).await?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "text/plain; charset=utf-8".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"comprobante-{}.txt\"", folio),
            ),
        ],
        body,
    ))
}
