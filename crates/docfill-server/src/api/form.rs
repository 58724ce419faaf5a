//! Multipart form handling for the upload endpoints.

use std::collections::HashMap;
use std::str::FromStr;

use axum::body::Bytes;
use axum::extract::Multipart;
use serde_json::Value;

use crate::error::AppError;

/// The `file` part of an upload form
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

/// A parsed multipart form: one optional `file` plus text fields
#[derive(Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await?;
                form.file = Some(UploadedFile { file_name, bytes });
            } else {
                let text = field.text().await?;
                form.fields.insert(name, text);
            }
        }

        Ok(form)
    }

    /// A text field, `None` when absent or blank
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }

    /// A field as a JSON string value, `Null` when absent
    pub fn value(&self, name: &str) -> Value {
        self.fields
            .get(name)
            .map_or(Value::Null, |v| Value::String(v.clone()))
    }

    /// A numeric text field
    pub fn number<T: FromStr>(&self, name: &str) -> Result<Option<T>, AppError> {
        match self.text(name) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| {
                    AppError::BadRequest(format!("{name} must be a non-negative integer"))
                }),
        }
    }

    pub fn take_file(&mut self, message: &str) -> Result<UploadedFile, AppError> {
        self.file
            .take()
            .ok_or_else(|| AppError::BadRequest(message.to_string()))
    }
}
