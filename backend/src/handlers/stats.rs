//! HTTP handlers for dashboard statistics

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::stats::SchoolStats;
use crate::services::StatsService;
use crate::AppState;

/// Published-material count and recent listings for the school dashboard
/// GET /stats/school
pub async fn school_stats(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<SchoolStats>> {
    current_user.0.require_school()?;

    let service = StatsService::new(state.db.clone());
    let stats = service.school_stats(current_user.0.user_id).await?;
    Ok(Json(stats))
}
