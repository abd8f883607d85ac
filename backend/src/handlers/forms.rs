//! Multipart form helpers shared by the upload-accepting handlers

use axum::extract::Multipart;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// A file received through a multipart form
#[derive(Debug)]
pub struct UploadedFile {
    /// Name of the form field that carried the file
    pub field_name: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Collected multipart form: text fields plus uploaded files
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<UploadedFile>,
}

impl MultipartForm {
    /// Drain a multipart request into memory
    pub async fn collect(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::ValidationError(format!("Invalid multipart body: {}", e)))?
        {
            let field_name = field.name().unwrap_or_default().to_string();

            if let Some(file_name) = field.file_name() {
                let file_name = file_name.to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| {
                        AppError::ValidationError(format!("Failed to read upload: {}", e))
                    })?
                    .to_vec();

                // Browsers send empty file parts for untouched inputs
                if !bytes.is_empty() {
                    form.files.push(UploadedFile {
                        field_name,
                        file_name,
                        content_type,
                        bytes,
                    });
                }
            } else {
                let value = field.text().await.map_err(|e| {
                    AppError::ValidationError(format!("Failed to read field: {}", e))
                })?;
                form.fields.insert(field_name, value);
            }
        }

        Ok(form)
    }

    /// A required text field
    pub fn required(&self, name: &str) -> AppResult<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AppError::Validation {
                field: name.to_string(),
                message: format!("{} is required", name),
                message_es: format!("El campo {} es requerido", name),
            })
    }

    /// An optional text field; empty strings count as absent
    pub fn optional(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// A required decimal field
    pub fn required_decimal(&self, name: &str) -> AppResult<Decimal> {
        let raw = self.required(name)?;
        Decimal::from_str(raw).map_err(|_| AppError::Validation {
            field: name.to_string(),
            message: format!("{} must be a number", name),
            message_es: format!("El campo {} debe ser numérico", name),
        })
    }

    /// Whether a boolean flag field was set
    pub fn flag(&self, name: &str) -> bool {
        self.fields.get(name).map(String::as_str) == Some("true")
    }
}
