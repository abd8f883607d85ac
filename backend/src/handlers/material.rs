//! HTTP handlers for material listing endpoints

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::StorageClient;
use crate::handlers::forms::MultipartForm;
use crate::middleware::CurrentUser;
use crate::services::material::{
    CreateMaterialInput, ListMaterialsQuery, MaterialListItem, MaterialService,
    MaterialWithImages, UpdateMaterialInput,
};
use crate::services::profile::UserProfile;
use crate::services::ProfileService;
use crate::AppState;
use shared::{
    validate_image_count, validate_image_file, MaterialImage, MaterialType, PaginatedResponse,
    RecyclableMaterial,
};

// ============================================================================
// Response Types
// ============================================================================

/// Image with its resolved public URL
#[derive(Debug, Serialize)]
pub struct ImageView {
    pub id: Uuid,
    pub url: String,
    pub display_order: i32,
}

/// A listing as served to clients
#[derive(Debug, Serialize)]
pub struct MaterialResponse {
    #[serde(flatten)]
    pub material: RecyclableMaterial,
    pub images: Vec<ImageView>,
}

/// A listing in a browse view, with publisher name
#[derive(Debug, Serialize)]
pub struct MaterialListResponse {
    #[serde(flatten)]
    pub material: RecyclableMaterial,
    pub publisher_name: String,
    pub images: Vec<ImageView>,
}

/// A school with all of its listings (admin view)
#[derive(Debug, Serialize)]
pub struct UserMaterialsResponse {
    pub user: UserProfile,
    pub materials: Vec<MaterialResponse>,
}

pub(crate) fn image_views(storage: &StorageClient, images: Vec<MaterialImage>) -> Vec<ImageView> {
    images
        .into_iter()
        .map(|img| ImageView {
            id: img.id,
            url: storage.public_url(&img.storage_key),
            display_order: img.display_order,
        })
        .collect()
}

pub(crate) fn material_response(
    storage: &StorageClient,
    item: MaterialWithImages,
) -> MaterialResponse {
    MaterialResponse {
        material: item.material,
        images: image_views(storage, item.images),
    }
}

pub(crate) fn material_list_response(
    storage: &StorageClient,
    item: MaterialListItem,
) -> MaterialListResponse {
    MaterialListResponse {
        material: item.material,
        publisher_name: item.publisher_name,
        images: image_views(storage, item.images),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Publish a material listing with 1-3 images
/// POST /materials (multipart)
pub async fn create_material(
    State(state): State<AppState>,
    current_user: CurrentUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<MaterialResponse>)> {
    current_user.0.require_school()?;

    let form = MultipartForm::collect(multipart).await?;

    let material_type = form.required("material_type").and_then(|raw| {
        MaterialType::from_str(raw).ok_or_else(|| AppError::Validation {
            field: "material_type".to_string(),
            message: "Unknown material type".to_string(),
            message_es: "Selecciona un tipo de material válido".to_string(),
        })
    })?;

    let input = CreateMaterialInput {
        title: form.required("title")?.to_string(),
        material_type,
        quantity_kg: form.required_decimal("quantity_kg")?,
        city: form.required("city")?.to_string(),
        state: form.required("state")?.to_string(),
        postal_code: form.required("postal_code")?.to_string(),
        address: form.required("address")?.to_string(),
        latitude: form.required_decimal("latitude")?,
        longitude: form.required_decimal("longitude")?,
        schedule: form.required("schedule")?.to_string(),
    };

    let images: Vec<_> = form
        .files
        .iter()
        .filter(|f| f.field_name.starts_with("images"))
        .collect();

    if let Err(msg) = validate_image_count(images.len()) {
        return Err(AppError::Validation {
            field: "images".to_string(),
            message: msg.to_string(),
            message_es: "Se deben subir entre 1 y 3 imágenes".to_string(),
        });
    }
    for file in &images {
        if let Err(msg) = validate_image_file(&file.content_type, file.bytes.len()) {
            return Err(AppError::Validation {
                field: "images".to_string(),
                message: format!("{}: {}", file.file_name, msg),
                message_es: "Solo se permiten archivos JPG, JPEG, PNG o WEBP de hasta 5MB"
                    .to_string(),
            });
        }
    }

    // Key prefix comes from the publisher's profile
    let profile_service = ProfileService::new(state.db.clone());
    let publisher = profile_service.get_profile(current_user.0.user_id).await?;
    let (prefix_state, prefix_city) = publisher
        .profile
        .as_ref()
        .map(|p| {
            (
                p.state.clone().unwrap_or_default(),
                p.city.clone().unwrap_or_default(),
            )
        })
        .unwrap_or_default();

    let storage = StorageClient::new(&state.config.storage);
    let mut uploaded_keys = Vec::with_capacity(images.len());
    for file in &images {
        let key = storage.material_image_key(
            &publisher.user_type,
            &prefix_state,
            &prefix_city,
            &publisher.identifier,
            &input.title,
            &file.file_name,
        );
        if let Err(e) = storage
            .upload(&key, file.bytes.clone(), &file.content_type)
            .await
        {
            // Roll back what already landed in storage
            for key in &uploaded_keys {
                storage.delete_best_effort(key).await;
            }
            return Err(e);
        }
        uploaded_keys.push(key);
    }

    let service = MaterialService::new(state.db.clone());
    match service
        .create_material(current_user.0.user_id, input, &uploaded_keys)
        .await
    {
        Ok(created) => Ok((
            StatusCode::CREATED,
            Json(material_response(&storage, created)),
        )),
        Err(e) => {
            for key in &uploaded_keys {
                storage.delete_best_effort(key).await;
            }
            Err(e)
        }
    }
}

/// A school's own listings, paginated
/// GET /materials
pub async fn list_own_materials(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListMaterialsQuery>,
) -> AppResult<Json<PaginatedResponse<MaterialResponse>>> {
    current_user.0.require_school()?;

    let service = MaterialService::new(state.db.clone());
    let page = service.list_own(current_user.0.user_id, query).await?;

    let storage = StorageClient::new(&state.config.storage);
    let data = page
        .data
        .into_iter()
        .map(|item| material_response(&storage, item))
        .collect();

    Ok(Json(PaginatedResponse {
        data,
        pagination: page.pagination,
    }))
}

/// All available listings, for the company browse view
/// GET /materials/available
pub async fn list_available_materials(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<MaterialListResponse>>> {
    let service = MaterialService::new(state.db.clone());
    let items = service.list_available().await?;

    let storage = StorageClient::new(&state.config.storage);
    Ok(Json(
        items
            .into_iter()
            .map(|item| material_list_response(&storage, item))
            .collect(),
    ))
}

/// Listing detail
/// GET /materials/:material_id
pub async fn get_material(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(material_id): Path<Uuid>,
) -> AppResult<Json<MaterialResponse>> {
    let service = MaterialService::new(state.db.clone());
    let item = service.get_material(material_id).await?;

    let storage = StorageClient::new(&state.config.storage);
    Ok(Json(material_response(&storage, item)))
}

/// Update a listing (owner or admin)
/// PUT /materials/:material_id
pub async fn update_material(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(material_id): Path<Uuid>,
    Json(input): Json<UpdateMaterialInput>,
) -> AppResult<Json<MaterialResponse>> {
    let service = MaterialService::new(state.db.clone());
    let owner = service.owner_of(material_id).await?;
    current_user.0.require_owner(owner)?;

    let item = service.update_material(material_id, input).await?;

    let storage = StorageClient::new(&state.config.storage);
    Ok(Json(material_response(&storage, item)))
}

/// Delete a listing and its stored images (owner or admin)
/// DELETE /materials/:material_id
pub async fn delete_material(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(material_id): Path<Uuid>,
) -> AppResult<Json<DeleteResponse>> {
    let service = MaterialService::new(state.db.clone());
    let owner = service.owner_of(material_id).await?;
    current_user.0.require_owner(owner)?;

    let keys = service.delete_material(material_id).await?;

    let storage = StorageClient::new(&state.config.storage);
    for key in &keys {
        storage.delete_best_effort(key).await;
    }

    Ok(Json(DeleteResponse {
        message: "Material eliminado exitosamente".to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

/// One school's listings with account context (admin view)
/// GET /materials/user/:user_id
pub async fn list_user_materials(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserMaterialsResponse>> {
    current_user.0.require_admin()?;

    let profile_service = ProfileService::new(state.db.clone());
    let user = profile_service.get_profile(user_id).await?;

    let service = MaterialService::new(state.db.clone());
    let items = service.list_by_user(user_id).await?;

    let storage = StorageClient::new(&state.config.storage);
    let materials = items
        .into_iter()
        .map(|item| material_response(&storage, item))
        .collect();

    Ok(Json(UserMaterialsResponse { user, materials }))
}
