//! HTTP handlers for administrator endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::payments::ChargeStatus;
use crate::external::{PaymentGatewayClient, StorageClient};
use crate::handlers::material::{material_list_response, MaterialListResponse};
use crate::middleware::CurrentUser;
use crate::services::purchase::WebhookOutcome;
use crate::services::user::{
    RegisterAdminInput, RegisterResponse, RegisterUserInput, UserSummary,
};
use crate::services::{MaterialService, PurchaseService, UserService};
use crate::AppState;
use shared::MaterialStatus;

// ============================================================================
// Account Management
// ============================================================================

/// Register a school or company account
/// POST /admin/users
pub async fn register_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RegisterUserInput>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    current_user.0.require_admin()?;

    let service = UserService::new(state.db.clone());
    let response = service.register_user(input).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Register an administrator account; requires the out-of-band admin code
/// POST /admin/admins
pub async fn register_admin(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RegisterAdminInput>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    current_user.0.require_admin()?;

    let service = UserService::new(state.db.clone());
    let response = service
        .register_admin(input, &state.config.admin.secret_code)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// All accounts with profile summary
/// GET /admin/users
pub async fn list_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<UserSummary>>> {
    current_user.0.require_admin()?;

    let service = UserService::new(state.db.clone());
    let users = service.list_users().await?;
    Ok(Json(users))
}

/// Deactivate an account
/// DELETE /admin/users/:user_id
pub async fn deactivate_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<()>> {
    current_user.0.require_admin()?;

    let service = UserService::new(state.db.clone());
    service.deactivate_user(user_id).await?;
    Ok(Json(()))
}

// ============================================================================
// Marketplace Oversight
// ============================================================================

/// Query parameters for the admin material list
#[derive(Debug, Deserialize)]
pub struct ListMaterialsQuery {
    pub status: Option<String>,
}

/// All listings, optionally filtered by status
/// GET /admin/materials
pub async fn list_materials(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListMaterialsQuery>,
) -> AppResult<Json<Vec<MaterialListResponse>>> {
    current_user.0.require_admin()?;

    let status = query
        .status
        .as_deref()
        .map(|s| {
            MaterialStatus::from_str(s).ok_or_else(|| AppError::Validation {
                field: "status".to_string(),
                message: "Unknown material status".to_string(),
                message_es: "Estado de material desconocido".to_string(),
            })
        })
        .transpose()?;

    let service = MaterialService::new(state.db.clone());
    let items = service.list_all(status).await?;

    let storage = StorageClient::new(&state.config.storage);
    Ok(Json(
        items
            .into_iter()
            .map(|item| material_list_response(&storage, item))
            .collect(),
    ))
}

// ============================================================================
// Payment Reconciliation
// ============================================================================

/// Report for a reconciliation sweep
#[derive(Debug, Serialize)]
pub struct ReconcileReport {
    pub examined: usize,
    pub completed: usize,
    pub failed: usize,
    pub still_pending: usize,
}

/// Settle purchases stuck in PENDING by asking the gateway for their
/// charge status
/// POST /admin/reconcile
pub async fn reconcile_purchases(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<ReconcileReport>> {
    current_user.0.require_admin()?;

    let cutoff = Utc::now() - Duration::minutes(state.config.payments.pending_timeout_minutes);

    let service = PurchaseService::new(state.db.clone());
    let stale = service.list_stale_pending(cutoff).await?;

    let gateway =
        PaymentGatewayClient::new(&state.config.payments, &state.config.server.public_url);

    let mut report = ReconcileReport {
        examined: stale.len(),
        completed: 0,
        failed: 0,
        still_pending: 0,
    };

    for purchase in stale {
        let status = match gateway.get_charge(&purchase.charge_id).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(
                    "Reconciliation lookup failed for charge {}: {}",
                    purchase.charge_id,
                    e
                );
                report.still_pending += 1;
                continue;
            }
        };

        match status {
            ChargeStatus::Pending => report.still_pending += 1,
            ChargeStatus::Completed | ChargeStatus::Failed => {
                let succeeded = status == ChargeStatus::Completed;
                let outcome = service
                    .apply_charge_event(&purchase.charge_id, succeeded)
                    .await?;
                if matches!(outcome, WebhookOutcome::Applied(_)) {
                    if succeeded {
                        report.completed += 1;
                    } else {
                        report.failed += 1;
                    }
                }
            }
        }
    }

    tracing::info!(
        "Reconciliation sweep: {} examined, {} completed, {} failed, {} still pending",
        report.examined,
        report.completed,
        report.failed,
        report.still_pending
    );

    Ok(Json(report))
}
