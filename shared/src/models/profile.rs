//! User profile model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Contact and billing details attached to a user account.
///
/// `avatar_key` holds the object-storage key, not a URL; the backend
/// resolves it to a public URL when serving the profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub avatar_key: Option<String>,
    /// Federal taxpayer registry code, companies only
    pub rfc: Option<String>,
    /// Work-center key, schools only
    pub cct: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
