//! HTTP handlers for the own-profile endpoints

use axum::{
    extract::{Multipart, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::StorageClient;
use crate::handlers::forms::MultipartForm;
use crate::middleware::CurrentUser;
use crate::services::profile::{AvatarUpdate, UpdateProfileInput, UserProfile};
use crate::services::ProfileService;
use crate::AppState;
use shared::{validate_image_file, Profile};

// ============================================================================
// Response Types
// ============================================================================

/// Profile with the avatar key resolved to a public URL
#[derive(Debug, Serialize)]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: Profile,
    pub public_avatar_url: Option<String>,
}

/// The account as served by GET /profile
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub identifier: String,
    pub name: String,
    pub role: String,
    pub user_type: String,
    pub created_at: DateTime<Utc>,
    pub profile: Option<ProfileView>,
}

fn profile_response(storage: &StorageClient, user: UserProfile) -> ProfileResponse {
    let profile = user.profile.map(|p| {
        let public_avatar_url = p.avatar_key.as_deref().map(|k| storage.public_url(k));
        ProfileView {
            profile: p,
            public_avatar_url,
        }
    });

    ProfileResponse {
        id: user.id,
        identifier: user.identifier,
        name: user.name,
        role: user.role,
        user_type: user.user_type,
        created_at: user.created_at,
        profile,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Current user's account and profile
/// GET /profile
pub async fn get_profile(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<ProfileResponse>> {
    let service = ProfileService::new(state.db.clone());
    let user = service.get_profile(current_user.0.user_id).await?;

    let storage = StorageClient::new(&state.config.storage);
    Ok(Json(profile_response(&storage, user)))
}

/// Update the current user's profile, optionally replacing or removing
/// the avatar
/// PUT /profile (multipart)
pub async fn update_profile(
    State(state): State<AppState>,
    current_user: CurrentUser,
    multipart: Multipart,
) -> AppResult<Json<ProfileResponse>> {
    let form = MultipartForm::collect(multipart).await?;

    let input = UpdateProfileInput {
        name: form.required("name")?.to_string(),
        email: form.required("email")?.to_string(),
        bio: form.optional("bio"),
        city: form.required("city")?.to_string(),
        state: form.required("state")?.to_string(),
        postal_code: form.required("postal_code")?.to_string(),
        phone: form.optional("phone"),
        address: form.required("address")?.to_string(),
        rfc: form.optional("rfc"),
        cct: form.optional("cct"),
    };

    let avatar_file = form.files.iter().find(|f| f.field_name == "avatar");
    let delete_avatar = form.flag("delete_avatar");

    let storage = StorageClient::new(&state.config.storage);
    let service = ProfileService::new(state.db.clone());
    let account = service.get_profile(current_user.0.user_id).await?;

    let avatar = if delete_avatar {
        AvatarUpdate::Delete
    } else if let Some(file) = avatar_file {
        if let Err(msg) = validate_image_file(&file.content_type, file.bytes.len()) {
            return Err(AppError::Validation {
                field: "avatar".to_string(),
                message: msg.to_string(),
                message_es: "Archivo de avatar inválido".to_string(),
            });
        }

        let key = storage.avatar_key(
            &account.user_type,
            &input.state,
            &input.city,
            &account.identifier,
            &file.file_name,
        );
        storage
            .upload(&key, file.bytes.clone(), &file.content_type)
            .await?;
        AvatarUpdate::Replace(key)
    } else {
        AvatarUpdate::Keep
    };

    let result = service
        .update_profile(current_user.0.user_id, input, avatar.clone())
        .await;

    match result {
        Ok((user, replaced_key)) => {
            // The previous avatar is unreachable now; drop the object
            if let Some(old_key) = replaced_key {
                storage.delete_best_effort(&old_key).await;
            }
            Ok(Json(profile_response(&storage, user)))
        }
        Err(e) => {
            // The freshly uploaded avatar never made it into the profile
            if let AvatarUpdate::Replace(key) = &avatar {
                storage.delete_best_effort(key).await;
            }
            Err(e)
        }
    }
}
