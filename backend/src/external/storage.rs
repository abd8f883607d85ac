//! Object storage client for listing images and profile avatars
//!
//! Talks to a Supabase-Storage-compatible REST API. Keys are laid out
//! hierarchically: `<user_type>/<state>/<city>/<identifier>/<folder>/...`
//! so one prefix holds everything a user ever uploaded.

use reqwest::Client;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{AppError, AppResult};

/// Folder for listing images, relative to the user prefix
const MATERIAL_IMAGES_FOLDER: &str = "recyclable-material-images";
/// Folder for profile avatars, relative to the user prefix
const AVATAR_FOLDER: &str = "image-profile";

/// Maximum length of a sanitized key segment
const MAX_SEGMENT_LEN: usize = 50;

/// Object storage client
#[derive(Clone)]
pub struct StorageClient {
    client: Client,
    base_url: String,
    bucket: String,
    service_key: String,
}

impl StorageClient {
    /// Create a new StorageClient instance
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            service_key: config.service_key.clone(),
        }
    }

    /// Upload an object. Fails if the key already exists.
    pub async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<()> {
        let url = format!("{}/object/{}/{}", self.base_url, self.bucket, key);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.service_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::StorageError(format!("upload request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StorageError(format!(
                "upload of '{}' rejected with {}: {}",
                key, status, body
            )));
        }

        tracing::debug!("Uploaded object to storage: {}", key);
        Ok(())
    }

    /// Delete an object
    pub async fn delete(&self, key: &str) -> AppResult<()> {
        let url = format!("{}/object/{}/{}", self.base_url, self.bucket, key);

        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.service_key)
            .send()
            .await
            .map_err(|e| AppError::StorageError(format!("delete request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::StorageError(format!(
                "delete of '{}' rejected with {}",
                key,
                response.status()
            )));
        }

        tracing::debug!("Deleted object from storage: {}", key);
        Ok(())
    }

    /// Delete an object, logging failures instead of propagating them.
    /// Used during cleanup paths where the primary operation already succeeded.
    pub async fn delete_best_effort(&self, key: &str) {
        if let Err(e) = self.delete(key).await {
            tracing::warn!("Failed to delete storage object '{}': {}", key, e);
        }
    }

    /// Public URL for an object key
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/object/public/{}/{}", self.base_url, self.bucket, key)
    }

    /// Key for a listing image
    pub fn material_image_key(
        &self,
        user_type: &str,
        state: &str,
        city: &str,
        identifier: &str,
        title: &str,
        original_file_name: &str,
    ) -> String {
        format!(
            "{}/{}/{}/{}/{}/{}/{}",
            sanitize_key_segment(user_type),
            sanitize_key_segment(state),
            sanitize_key_segment(city),
            sanitize_key_segment(identifier),
            MATERIAL_IMAGES_FOLDER,
            sanitize_key_segment(title),
            unique_file_name(original_file_name),
        )
    }

    /// Key for a profile avatar
    pub fn avatar_key(
        &self,
        user_type: &str,
        state: &str,
        city: &str,
        identifier: &str,
        original_file_name: &str,
    ) -> String {
        format!(
            "{}/{}/{}/{}/{}/{}",
            sanitize_key_segment(user_type),
            sanitize_key_segment(state),
            sanitize_key_segment(city),
            sanitize_key_segment(identifier),
            AVATAR_FOLDER,
            unique_file_name(original_file_name),
        )
    }
}

/// Generate a collision-free file name, preserving the original extension
pub fn unique_file_name(original_name: &str) -> String {
    match original_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            format!("{}.{}", Uuid::new_v4(), ext.to_lowercase())
        }
        _ => Uuid::new_v4().to_string(),
    }
}

/// Sanitize free text into a storage key segment: lowercase ASCII,
/// accents folded, runs of other characters collapsed to single hyphens.
pub fn sanitize_key_segment(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_hyphen = true; // suppress leading hyphen

    for c in text.to_lowercase().chars() {
        let folded = fold_accent(c);
        if folded.is_ascii_alphanumeric() {
            out.push(folded);
            last_hyphen = false;
        } else if !last_hyphen {
            out.push('-');
            last_hyphen = true;
        }
        if out.len() >= MAX_SEGMENT_LEN {
            break;
        }
    }

    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Fold Spanish accented characters to their ASCII base
fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_folds_accents() {
        assert_eq!(sanitize_key_segment("Plástico PET"), "plastico-pet");
        assert_eq!(sanitize_key_segment("Ciudad de México"), "ciudad-de-mexico");
        assert_eq!(sanitize_key_segment("Año Nuevo"), "ano-nuevo");
    }

    #[test]
    fn test_sanitize_collapses_and_trims() {
        assert_eq!(sanitize_key_segment("  --hola!!  mundo--  "), "hola-mundo");
        assert_eq!(sanitize_key_segment("a///b"), "a-b");
        assert_eq!(sanitize_key_segment(""), "");
    }

    #[test]
    fn test_sanitize_limits_length() {
        let long = "x".repeat(120);
        assert!(sanitize_key_segment(&long).len() <= 50);
    }

    #[test]
    fn test_unique_file_name_keeps_extension() {
        let name = unique_file_name("Foto de Evidencia.JPG");
        assert!(name.ends_with(".jpg"));
        assert_eq!(name.len(), 36 + 4); // uuid + ".jpg"
    }

    #[test]
    fn test_unique_file_name_without_extension() {
        let name = unique_file_name("archivo");
        assert_eq!(name.len(), 36);
    }

    #[test]
    fn test_material_image_key_layout() {
        let client = StorageClient::new(&crate::config::StorageConfig {
            base_url: "https://storage.example.com/storage/v1".to_string(),
            bucket: "marketplace".to_string(),
            service_key: "key".to_string(),
        });

        let key = client.material_image_key(
            "SCHOOL",
            "Nuevo León",
            "Monterrey",
            "esc-01",
            "Papel de oficina limpio",
            "foto.png",
        );

        assert!(key.starts_with(
            "school/nuevo-leon/monterrey/esc-01/recyclable-material-images/papel-de-oficina-limpio/"
        ));
        assert!(key.ends_with(".png"));
    }

    #[test]
    fn test_public_url_layout() {
        let client = StorageClient::new(&crate::config::StorageConfig {
            base_url: "https://storage.example.com/storage/v1/".to_string(),
            bucket: "marketplace".to_string(),
            service_key: "key".to_string(),
        });

        assert_eq!(
            client.public_url("school/foo/bar.jpg"),
            "https://storage.example.com/storage/v1/object/public/marketplace/school/foo/bar.jpg"
        );
    }
}
