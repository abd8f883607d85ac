//! Account management service for administrator operations

use bcrypt::{hash, DEFAULT_COST};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::{validate_identifier, validate_password, UserRole, UserType};

/// User management service
#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

/// Input for registering a school or company account
#[derive(Debug, Deserialize)]
pub struct RegisterUserInput {
    pub name: String,
    pub identifier: String,
    pub password: String,
    pub user_type: Option<UserType>,
}

/// Input for registering an administrator account
#[derive(Debug, Deserialize)]
pub struct RegisterAdminInput {
    pub name: String,
    pub identifier: String,
    pub password: String,
    pub admin_code: String,
}

/// Response after successful registration
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub message: String,
}

/// Account summary for the administrator user list
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub identifier: String,
    pub name: String,
    pub role: String,
    pub user_type: String,
    pub is_active: bool,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserService {
    /// Create a new UserService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Register a new school or company account with a placeholder profile
    pub async fn register_user(&self, input: RegisterUserInput) -> AppResult<RegisterResponse> {
        let user_type = input.user_type.unwrap_or(UserType::School);
        if user_type == UserType::Admin {
            return Err(AppError::Validation {
                field: "user_type".to_string(),
                message: "Administrators are registered through the admin endpoint".to_string(),
                message_es: "Los administradores se registran por el endpoint de administración"
                    .to_string(),
            });
        }

        self.create_account(
            &input.name,
            &input.identifier,
            &input.password,
            UserRole::User,
            user_type,
            "Añade una descripción personal",
        )
        .await
        .map(|user_id| RegisterResponse {
            user_id,
            message: "Usuario registrado exitosamente".to_string(),
        })
    }

    /// Register a new administrator account. The caller must present the
    /// out-of-band admin code.
    pub async fn register_admin(
        &self,
        input: RegisterAdminInput,
        expected_admin_code: &str,
    ) -> AppResult<RegisterResponse> {
        if input.admin_code != expected_admin_code {
            return Err(AppError::InsufficientPermissions);
        }

        self.create_account(
            &input.name,
            &input.identifier,
            &input.password,
            UserRole::Admin,
            UserType::Admin,
            "Administrador de la plataforma",
        )
        .await
        .map(|user_id| RegisterResponse {
            user_id,
            message: "Administrador registrado exitosamente".to_string(),
        })
    }

    /// List all accounts with their profile email
    pub async fn list_users(&self) -> AppResult<Vec<UserSummary>> {
        let users = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT u.id, u.identifier, u.name, u.role, u.user_type, u.is_active,
                   p.email, u.created_at
            FROM users u
            LEFT JOIN profiles p ON p.user_id = u.id
            ORDER BY u.created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(users)
    }

    /// Deactivate an account; its listings stay but the user can no longer
    /// sign in.
    pub async fn deactivate_user(&self, user_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET is_active = false WHERE id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User".to_string()));
        }

        // Revoke outstanding refresh tokens so open sessions expire
        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// Create a user row and its placeholder profile in one transaction
    async fn create_account(
        &self,
        name: &str,
        identifier: &str,
        password: &str,
        role: UserRole,
        user_type: UserType,
        placeholder_bio: &str,
    ) -> AppResult<Uuid> {
        if name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "name".to_string(),
                message: "Name is required".to_string(),
                message_es: "El nombre es requerido".to_string(),
            });
        }
        if let Err(msg) = validate_identifier(identifier) {
            return Err(AppError::Validation {
                field: "identifier".to_string(),
                message: msg.to_string(),
                message_es: "Identificador de sesión inválido".to_string(),
            });
        }
        if let Err(msg) = validate_password(password) {
            return Err(AppError::Validation {
                field: "password".to_string(),
                message: msg.to_string(),
                message_es: "La contraseña debe tener al menos 6 caracteres".to_string(),
            });
        }

        // Check if the login identifier is taken
        let existing =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE identifier = $1")
                .bind(identifier)
                .fetch_one(&self.db)
                .await?;

        if existing > 0 {
            return Err(AppError::DuplicateEntry("identifier".to_string()));
        }

        // Hash password
        let password_hash = hash(password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))?;

        // Start transaction
        let mut tx = self.db.begin().await?;

        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO users (name, identifier, password_hash, role, user_type)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(identifier)
        .bind(&password_hash)
        .bind(role.as_str())
        .bind(user_type.as_str())
        .fetch_one(&mut *tx)
        .await?;

        // Placeholder profile; the user replaces the email on first update
        let placeholder_email = format!(
            "cambiarestecorreo@{}.com",
            &user_id.simple().to_string()[..10]
        );
        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, email, bio)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(&placeholder_email)
        .bind(placeholder_bio)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(user_id)
    }
}
