//! Profile management service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::{
    validate_cct, validate_email, validate_mexican_phone, validate_mexican_state,
    validate_postal_code, validate_rfc, Profile,
};

/// Profile service
#[derive(Clone)]
pub struct ProfileService {
    db: PgPool,
}

/// Database row for a profile
#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    user_id: Uuid,
    email: String,
    bio: Option<String>,
    city: Option<String>,
    state: Option<String>,
    postal_code: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    avatar_key: Option<String>,
    rfc: Option<String>,
    cct: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Profile {
            id: row.id,
            user_id: row.user_id,
            email: row.email,
            bio: row.bio,
            city: row.city,
            state: row.state,
            postal_code: row.postal_code,
            phone: row.phone,
            address: row.address,
            avatar_key: row.avatar_key,
            rfc: row.rfc,
            cct: row.cct,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A user account with its profile
#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub identifier: String,
    pub name: String,
    pub role: String,
    pub user_type: String,
    pub created_at: DateTime<Utc>,
    pub profile: Option<Profile>,
}

/// How an update treats the stored avatar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvatarUpdate {
    Keep,
    Replace(String),
    Delete,
}

/// Input for updating the profile
#[derive(Debug, Deserialize)]
pub struct UpdateProfileInput {
    pub name: String,
    pub email: String,
    pub bio: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub phone: Option<String>,
    pub address: String,
    pub rfc: Option<String>,
    pub cct: Option<String>,
}

impl ProfileService {
    /// Create a new ProfileService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get a user account with its profile
    pub async fn get_profile(&self, user_id: Uuid) -> AppResult<UserProfile> {
        let user = sqlx::query_as::<_, (Uuid, String, String, String, String, DateTime<Utc>)>(
            r#"
            SELECT id, identifier, name, role, user_type, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        let profile = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT id, user_id, email, bio, city, state, postal_code, phone, address,
                   avatar_key, rfc, cct, created_at, updated_at
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(UserProfile {
            id: user.0,
            identifier: user.1,
            name: user.2,
            role: user.3,
            user_type: user.4,
            created_at: user.5,
            profile: profile.map(Into::into),
        })
    }

    /// Update the user's name and profile details.
    ///
    /// Returns the updated profile and, when the avatar was replaced or
    /// removed, the previous storage key for the caller to clean up.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        input: UpdateProfileInput,
        avatar: AvatarUpdate,
    ) -> AppResult<(UserProfile, Option<String>)> {
        Self::validate_input(&input)?;

        let current = sqlx::query_as::<_, (Option<String>,)>(
            "SELECT avatar_key FROM profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile".to_string()))?;
        let current_avatar = current.0;

        // The email must not belong to another user
        let email_taken = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM profiles WHERE email = $1 AND user_id != $2",
        )
        .bind(&input.email)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        if email_taken > 0 {
            return Err(AppError::DuplicateEntry("email".to_string()));
        }

        let (new_avatar_key, replaced_key) = match &avatar {
            AvatarUpdate::Keep => (current_avatar.clone(), None),
            AvatarUpdate::Replace(key) => (Some(key.clone()), current_avatar.clone()),
            AvatarUpdate::Delete => (None, current_avatar.clone()),
        };

        let mut tx = self.db.begin().await?;

        sqlx::query("UPDATE users SET name = $1 WHERE id = $2")
            .bind(&input.name)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE profiles
            SET email = $1, bio = $2, city = $3, state = $4, postal_code = $5,
                phone = $6, address = $7, rfc = $8, cct = $9, avatar_key = $10
            WHERE user_id = $11
            "#,
        )
        .bind(&input.email)
        .bind(&input.bio)
        .bind(&input.city)
        .bind(&input.state)
        .bind(&input.postal_code)
        .bind(&input.phone)
        .bind(&input.address)
        .bind(&input.rfc)
        .bind(&input.cct)
        .bind(&new_avatar_key)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let updated = self.get_profile(user_id).await?;
        Ok((updated, replaced_key))
    }

    fn validate_input(input: &UpdateProfileInput) -> AppResult<()> {
        if input.name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "name".to_string(),
                message: "Name is required".to_string(),
                message_es: "El nombre es requerido".to_string(),
            });
        }
        if let Err(msg) = validate_email(&input.email) {
            return Err(AppError::Validation {
                field: "email".to_string(),
                message: msg.to_string(),
                message_es: "Correo electrónico inválido".to_string(),
            });
        }
        if let Err(msg) = validate_mexican_state(&input.state) {
            return Err(AppError::Validation {
                field: "state".to_string(),
                message: msg.to_string(),
                message_es: "El estado es requerido".to_string(),
            });
        }
        if input.city.trim().is_empty() {
            return Err(AppError::Validation {
                field: "city".to_string(),
                message: "City is required".to_string(),
                message_es: "La ciudad es requerida".to_string(),
            });
        }
        if let Err(msg) = validate_postal_code(&input.postal_code) {
            return Err(AppError::Validation {
                field: "postal_code".to_string(),
                message: msg.to_string(),
                message_es: "El código postal debe tener 5 dígitos".to_string(),
            });
        }
        if input.address.trim().is_empty() {
            return Err(AppError::Validation {
                field: "address".to_string(),
                message: "Address is required".to_string(),
                message_es: "La dirección es requerida".to_string(),
            });
        }
        if let Some(phone) = input.phone.as_deref() {
            if let Err(msg) = validate_mexican_phone(phone) {
                return Err(AppError::Validation {
                    field: "phone".to_string(),
                    message: msg.to_string(),
                    message_es: "Teléfono inválido".to_string(),
                });
            }
        }
        if let Some(rfc) = input.rfc.as_deref() {
            if let Err(msg) = validate_rfc(rfc) {
                return Err(AppError::Validation {
                    field: "rfc".to_string(),
                    message: msg.to_string(),
                    message_es: "RFC inválido".to_string(),
                });
            }
        }
        if let Some(cct) = input.cct.as_deref() {
            if let Err(msg) = validate_cct(cct) {
                return Err(AppError::Validation {
                    field: "cct".to_string(),
                    message: msg.to_string(),
                    message_es: "CCT inválida".to_string(),
                });
            }
        }
        Ok(())
    }
}
