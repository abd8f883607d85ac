//! Dashboard statistics service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;

/// Statistics service
#[derive(Clone)]
pub struct StatsService {
    db: PgPool,
}

/// Summary row for a recently published listing
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct RecentMaterial {
    pub id: Uuid,
    pub title: String,
    pub material_type: String,
    pub quantity_kg: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// School dashboard numbers
#[derive(Debug, Serialize)]
pub struct SchoolStats {
    pub materials_count: i64,
    pub recent_materials: Vec<RecentMaterial>,
}

impl StatsService {
    /// Create a new StatsService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Published-material count and the five most recent listings
    pub async fn school_stats(&self, user_id: Uuid) -> AppResult<SchoolStats> {
        let materials_count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM recyclable_materials WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        let recent_materials = sqlx::query_as::<_, RecentMaterial>(
            r#"
            SELECT id, title, material_type, quantity_kg, status, created_at
            FROM recyclable_materials
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT 5
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(SchoolStats {
            materials_count,
            recent_materials,
        })
    }
}
