//! Material listing service for schools and the admin back office

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::{
    validate_coordinates, validate_image_count, validate_mexican_state, validate_postal_code,
    validate_quantity, validate_title, MaterialImage, MaterialStatus, MaterialType,
    PaginatedResponse, PaginationMeta, RecyclableMaterial,
};

/// Material listing service
#[derive(Clone)]
pub struct MaterialService {
    db: PgPool,
}

/// Database row for a material listing
#[derive(Debug, sqlx::FromRow)]
struct MaterialRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    material_type: String,
    quantity_kg: Decimal,
    city: String,
    state: String,
    postal_code: String,
    address: String,
    latitude: Decimal,
    longitude: Decimal,
    schedule: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const MATERIAL_COLUMNS: &str = "id, user_id, title, material_type, quantity_kg, city, state, \
     postal_code, address, latitude, longitude, schedule, status, created_at, updated_at";

impl MaterialRow {
    fn into_material(self) -> AppResult<RecyclableMaterial> {
        Ok(RecyclableMaterial {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            material_type: parse_material_type(&self.material_type)?,
            quantity_kg: self.quantity_kg,
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
            address: self.address,
            latitude: self.latitude,
            longitude: self.longitude,
            schedule: self.schedule,
            status: parse_material_status(&self.status)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Database row for a listing image
#[derive(Debug, sqlx::FromRow)]
struct ImageRow {
    id: Uuid,
    material_id: Uuid,
    storage_key: String,
    display_order: i32,
    created_at: DateTime<Utc>,
}

impl From<ImageRow> for MaterialImage {
    fn from(row: ImageRow) -> Self {
        MaterialImage {
            id: row.id,
            material_id: row.material_id,
            storage_key: row.storage_key,
            display_order: row.display_order,
            created_at: row.created_at,
        }
    }
}

/// A listing with its images
#[derive(Debug, Serialize)]
pub struct MaterialWithImages {
    #[serde(flatten)]
    pub material: RecyclableMaterial,
    pub images: Vec<MaterialImage>,
}

/// A listing with its publisher's name, for browse views
#[derive(Debug, Serialize)]
pub struct MaterialListItem {
    #[serde(flatten)]
    pub material: RecyclableMaterial,
    pub publisher_name: String,
    pub images: Vec<MaterialImage>,
}

/// Input for publishing a material listing
#[derive(Debug, Deserialize)]
pub struct CreateMaterialInput {
    pub title: String,
    pub material_type: MaterialType,
    pub quantity_kg: Decimal,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub address: String,
    pub latitude: Decimal,
    pub longitude: Decimal,
    pub schedule: String,
}

/// Input for updating a listing; absent fields are left unchanged
#[derive(Debug, Default, Deserialize)]
pub struct UpdateMaterialInput {
    pub title: Option<String>,
    pub material_type: Option<MaterialType>,
    pub quantity_kg: Option<Decimal>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub schedule: Option<String>,
}

/// Query parameters for a school's own listings
#[derive(Debug, Deserialize)]
pub struct ListMaterialsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub material_type: Option<MaterialType>,
    pub search: Option<String>,
}

impl MaterialService {
    /// Create a new MaterialService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Publish a material listing with its already-uploaded images
    pub async fn create_material(
        &self,
        user_id: Uuid,
        input: CreateMaterialInput,
        image_keys: &[String],
    ) -> AppResult<MaterialWithImages> {
        Self::validate_create(&input)?;

        if let Err(msg) = validate_image_count(image_keys.len()) {
            return Err(AppError::Validation {
                field: "images".to_string(),
                message: msg.to_string(),
                message_es: "Se deben subir entre 1 y 3 imágenes".to_string(),
            });
        }

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, MaterialRow>(&format!(
            r#"
            INSERT INTO recyclable_materials
                (user_id, title, material_type, quantity_kg, city, state, postal_code,
                 address, latitude, longitude, schedule, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {MATERIAL_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(input.title.trim())
        .bind(input.material_type.as_str())
        .bind(input.quantity_kg)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.address)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(&input.schedule)
        .bind(MaterialStatus::Available.as_str())
        .fetch_one(&mut *tx)
        .await?;

        let mut images = Vec::with_capacity(image_keys.len());
        for (order, key) in image_keys.iter().enumerate() {
            let image = sqlx::query_as::<_, ImageRow>(
                r#"
                INSERT INTO recyclable_material_images (material_id, storage_key, display_order)
                VALUES ($1, $2, $3)
                RETURNING id, material_id, storage_key, display_order, created_at
                "#,
            )
            .bind(row.id)
            .bind(key)
            .bind(order as i32)
            .fetch_one(&mut *tx)
            .await?;
            images.push(image.into());
        }

        tx.commit().await?;

        Ok(MaterialWithImages {
            material: row.into_material()?,
            images,
        })
    }

    /// Get a listing with its images
    pub async fn get_material(&self, material_id: Uuid) -> AppResult<MaterialWithImages> {
        let row = sqlx::query_as::<_, MaterialRow>(&format!(
            "SELECT {MATERIAL_COLUMNS} FROM recyclable_materials WHERE id = $1"
        ))
        .bind(material_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Material".to_string()))?;

        let images = self.images_for(&[material_id]).await?;
        let images = images.into_values().next().unwrap_or_default();

        Ok(MaterialWithImages {
            material: row.into_material()?,
            images,
        })
    }

    /// A school's own listings, paginated, with optional type filter and
    /// title search
    pub async fn list_own(
        &self,
        user_id: Uuid,
        query: ListMaterialsQuery,
    ) -> AppResult<PaginatedResponse<MaterialWithImages>> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(9).clamp(1, 50);
        let offset = (page - 1) as i64 * limit as i64;

        let type_filter = query.material_type.map(|t| t.as_str().to_string());
        let search = query
            .search
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| format!("%{}%", s.trim()));

        let rows = sqlx::query_as::<_, MaterialRow>(&format!(
            r#"
            SELECT {MATERIAL_COLUMNS}
            FROM recyclable_materials
            WHERE user_id = $1
              AND ($2::text IS NULL OR material_type = $2)
              AND ($3::text IS NULL OR title ILIKE $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(user_id)
        .bind(&type_filter)
        .bind(&search)
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM recyclable_materials
            WHERE user_id = $1
              AND ($2::text IS NULL OR material_type = $2)
              AND ($3::text IS NULL OR title ILIKE $3)
            "#,
        )
        .bind(user_id)
        .bind(&type_filter)
        .bind(&search)
        .fetch_one(&self.db)
        .await?;

        let data = self.attach_images(rows).await?;

        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(page, limit, total as u64),
        })
    }

    /// All AVAILABLE listings, newest first, for the company browse view
    pub async fn list_available(&self) -> AppResult<Vec<MaterialListItem>> {
        self.list_with_publisher(Some(MaterialStatus::Available))
            .await
    }

    /// All listings, optionally filtered by status, for the admin views
    pub async fn list_all(
        &self,
        status: Option<MaterialStatus>,
    ) -> AppResult<Vec<MaterialListItem>> {
        self.list_with_publisher(status).await
    }

    /// Listings of one school, with images
    pub async fn list_by_user(&self, user_id: Uuid) -> AppResult<Vec<MaterialWithImages>> {
        let rows = sqlx::query_as::<_, MaterialRow>(&format!(
            r#"
            SELECT {MATERIAL_COLUMNS}
            FROM recyclable_materials
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        self.attach_images(rows).await
    }

    /// Update a listing. Only AVAILABLE listings may change.
    pub async fn update_material(
        &self,
        material_id: Uuid,
        input: UpdateMaterialInput,
    ) -> AppResult<MaterialWithImages> {
        Self::validate_update(&input)?;

        let status = self.current_status(material_id).await?;
        if status != MaterialStatus::Available {
            return Err(AppError::InvalidStateTransition(format!(
                "Only available listings can be edited, current status: {}",
                status.as_str()
            )));
        }

        let row = sqlx::query_as::<_, MaterialRow>(&format!(
            r#"
            UPDATE recyclable_materials
            SET title = COALESCE($1, title),
                material_type = COALESCE($2, material_type),
                quantity_kg = COALESCE($3, quantity_kg),
                city = COALESCE($4, city),
                state = COALESCE($5, state),
                postal_code = COALESCE($6, postal_code),
                address = COALESCE($7, address),
                latitude = COALESCE($8, latitude),
                longitude = COALESCE($9, longitude),
                schedule = COALESCE($10, schedule)
            WHERE id = $11
            RETURNING {MATERIAL_COLUMNS}
            "#
        ))
        .bind(input.title.as_deref().map(str::trim))
        .bind(input.material_type.map(|t| t.as_str()))
        .bind(input.quantity_kg)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.address)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(&input.schedule)
        .bind(material_id)
        .fetch_one(&self.db)
        .await?;

        let images = self.images_for(&[material_id]).await?;
        let images = images.into_values().next().unwrap_or_default();

        Ok(MaterialWithImages {
            material: row.into_material()?,
            images,
        })
    }

    /// Delete a listing and return its image storage keys for cleanup.
    /// Listings with an active or settled purchase cannot be deleted.
    pub async fn delete_material(&self, material_id: Uuid) -> AppResult<Vec<String>> {
        let status = self.current_status(material_id).await?;
        if status != MaterialStatus::Available {
            return Err(AppError::InvalidStateTransition(format!(
                "Only available listings can be deleted, current status: {}",
                status.as_str()
            )));
        }

        let keys = sqlx::query_scalar::<_, String>(
            "SELECT storage_key FROM recyclable_material_images WHERE material_id = $1",
        )
        .bind(material_id)
        .fetch_all(&self.db)
        .await?;

        // Image rows go with the listing via ON DELETE CASCADE
        sqlx::query("DELETE FROM recyclable_materials WHERE id = $1")
            .bind(material_id)
            .execute(&self.db)
            .await?;

        Ok(keys)
    }

    /// Owner of a listing, for permission checks
    pub async fn owner_of(&self, material_id: Uuid) -> AppResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM recyclable_materials WHERE id = $1")
            .bind(material_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Material".to_string()))
    }

    async fn current_status(&self, material_id: Uuid) -> AppResult<MaterialStatus> {
        let status =
            sqlx::query_scalar::<_, String>("SELECT status FROM recyclable_materials WHERE id = $1")
                .bind(material_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| AppError::NotFound("Material".to_string()))?;

        parse_material_status(&status)
    }

    async fn list_with_publisher(
        &self,
        status: Option<MaterialStatus>,
    ) -> AppResult<Vec<MaterialListItem>> {
        #[derive(sqlx::FromRow)]
        struct RowWithName {
            #[sqlx(flatten)]
            material: MaterialRow,
            publisher_name: String,
        }

        let status_filter = status.map(|s| s.as_str().to_string());

        let rows = sqlx::query_as::<_, RowWithName>(
            r#"
            SELECT m.id, m.user_id, m.title, m.material_type, m.quantity_kg, m.city, m.state,
                   m.postal_code, m.address, m.latitude, m.longitude, m.schedule, m.status,
                   m.created_at, m.updated_at, u.name AS publisher_name
            FROM recyclable_materials m
            JOIN users u ON u.id = m.user_id
            WHERE ($1::text IS NULL OR m.status = $1)
            ORDER BY m.created_at DESC
            "#,
        )
        .bind(&status_filter)
        .fetch_all(&self.db)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.material.id).collect();
        let mut images = self.images_for(&ids).await?;

        rows.into_iter()
            .map(|r| {
                let id = r.material.id;
                Ok(MaterialListItem {
                    material: r.material.into_material()?,
                    publisher_name: r.publisher_name,
                    images: images.remove(&id).unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn attach_images(&self, rows: Vec<MaterialRow>) -> AppResult<Vec<MaterialWithImages>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut images = self.images_for(&ids).await?;

        rows.into_iter()
            .map(|r| {
                let id = r.id;
                Ok(MaterialWithImages {
                    material: r.into_material()?,
                    images: images.remove(&id).unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Fetch images for a set of listings, grouped by listing
    async fn images_for(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<MaterialImage>>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, ImageRow>(
            r#"
            SELECT id, material_id, storage_key, display_order, created_at
            FROM recyclable_material_images
            WHERE material_id = ANY($1)
            ORDER BY display_order ASC
            "#,
        )
        .bind(ids)
        .fetch_all(&self.db)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<MaterialImage>> = HashMap::new();
        for row in rows {
            grouped.entry(row.material_id).or_default().push(row.into());
        }
        Ok(grouped)
    }

    fn validate_create(input: &CreateMaterialInput) -> AppResult<()> {
        if let Err(msg) = validate_title(&input.title) {
            return Err(field_error("title", msg, "El título debe tener entre 20 y 200 caracteres"));
        }
        if let Err(msg) = validate_quantity(input.quantity_kg) {
            return Err(field_error("quantity_kg", msg, "La cantidad debe estar entre 50 y 2000 kg"));
        }
        if input.city.trim().is_empty() {
            return Err(field_error("city", "City is required", "La ciudad es requerida"));
        }
        if let Err(msg) = validate_mexican_state(&input.state) {
            return Err(field_error("state", msg, "Selecciona un estado válido"));
        }
        if let Err(msg) = validate_postal_code(&input.postal_code) {
            return Err(field_error("postal_code", msg, "El código postal debe tener 5 dígitos"));
        }
        if input.address.trim().is_empty() {
            return Err(field_error("address", "Address is required", "La dirección es requerida"));
        }
        if let Err(msg) = validate_coordinates(input.latitude, input.longitude) {
            return Err(field_error("coordinates", msg, "Coordenadas inválidas"));
        }
        if input.schedule.trim().is_empty() {
            return Err(field_error(
                "schedule",
                "Schedule is required",
                "El horario de atención es requerido",
            ));
        }
        Ok(())
    }

    fn validate_update(input: &UpdateMaterialInput) -> AppResult<()> {
        if let Some(title) = input.title.as_deref() {
            if let Err(msg) = validate_title(title) {
                return Err(field_error("title", msg, "El título debe tener entre 20 y 200 caracteres"));
            }
        }
        if let Some(quantity) = input.quantity_kg {
            if let Err(msg) = validate_quantity(quantity) {
                return Err(field_error("quantity_kg", msg, "La cantidad debe estar entre 50 y 2000 kg"));
            }
        }
        if let Some(state) = input.state.as_deref() {
            if let Err(msg) = validate_mexican_state(state) {
                return Err(field_error("state", msg, "Selecciona un estado válido"));
            }
        }
        if let Some(postal_code) = input.postal_code.as_deref() {
            if let Err(msg) = validate_postal_code(postal_code) {
                return Err(field_error("postal_code", msg, "El código postal debe tener 5 dígitos"));
            }
        }
        if input.latitude.is_some() || input.longitude.is_some() {
            let lat = input.latitude.unwrap_or(Decimal::ZERO);
            let lon = input.longitude.unwrap_or(Decimal::ZERO);
            if let Err(msg) = validate_coordinates(lat, lon) {
                return Err(field_error("coordinates", msg, "Coordenadas inválidas"));
            }
        }
        Ok(())
    }
}

fn field_error(field: &str, message_en: &str, message_es: &str) -> AppError {
    AppError::Validation {
        field: field.to_string(),
        message: message_en.to_string(),
        message_es: message_es.to_string(),
    }
}

/// Parse a stored material type, surfacing corruption as an internal error
pub fn parse_material_type(s: &str) -> AppResult<MaterialType> {
    MaterialType::from_str(s)
        .ok_or_else(|| AppError::Internal(format!("Unknown material type in database: {}", s)))
}

/// Parse a stored material status, surfacing corruption as an internal error
pub fn parse_material_status(s: &str) -> AppResult<MaterialStatus> {
    MaterialStatus::from_str(s)
        .ok_or_else(|| AppError::Internal(format!("Unknown material status in database: {}", s)))
}
