use std::path::{Path, PathBuf};

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::form::UploadForm;
use super::{blocking, ok, required, ApiJson, Envelope};
use crate::error::AppError;
use crate::storage::{default_output_path, ensure_parent, resolve_path};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplaceRequest {
    pub template_path: Option<String>,
    pub output_path: Option<String>,
    pub replacements: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceResponse {
    pub output_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_url: Option<String>,
}

/// Render `template` into `output` (or next to the template)
fn render_to_file(
    template: &Path,
    output: Option<&str>,
    replacements: &Map<String, Value>,
) -> Result<PathBuf, AppError> {
    if !template.is_file() {
        return Err(AppError::template_not_found(template));
    }
    let destination = match output {
        Some(path) => resolve_path(path)?,
        None => default_output_path(template),
    };

    let archive = std::fs::read(template)?;
    let rendered = docfill_template::render_template(&archive, replacements)?;
    ensure_parent(&destination)?;
    std::fs::write(&destination, rendered)?;

    tracing::info!(
        template = %template.display(),
        output = %destination.display(),
        keys = replacements.len(),
        "rendered template"
    );
    Ok(destination)
}

/// Fill a docx template on disk
async fn replace(
    ApiJson(req): ApiJson<ReplaceRequest>,
) -> Result<Json<Envelope<ReplaceResponse>>, AppError> {
    let template_path = required(req.template_path, "templatePath is required")?;
    let template = resolve_path(&template_path)?;
    tracing::debug!(path = %template.display(), "resolved template path");
    let output = req.output_path.filter(|p| !p.trim().is_empty());
    let replacements = req.replacements.unwrap_or_default();

    let written =
        blocking(move || render_to_file(&template, output.as_deref(), &replacements)).await?;
    Ok(ok(ReplaceResponse {
        output_path: written.display().to_string(),
        uploaded: None,
        template_url: None,
    }))
}

/// Parse the multipart `replacements` field; absent means no replacements
fn parse_replacements(raw: Option<String>) -> Result<Map<String, Value>, AppError> {
    match raw {
        None => Ok(Map::new()),
        Some(text) => serde_json::from_str(&text)
            .map_err(|_| AppError::BadRequest("Invalid JSON in replacements".to_string())),
    }
}

/// Upload a docx template and fill it
async fn replace_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Envelope<ReplaceResponse>>, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let file = form.take_file("file is required")?;
    let replacements = parse_replacements(form.text("replacements"))?;
    let output = form.text("outputPath");

    let stored = state.uploads.save(&file.file_name, &file.bytes).await?;
    let template = stored.path.clone();

    let written =
        blocking(move || render_to_file(&template, output.as_deref(), &replacements)).await?;
    Ok(ok(ReplaceResponse {
        output_path: written.display().to_string(),
        uploaded: Some(true),
        template_url: Some(stored.url()),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/word/replace", post(replace))
        .route("/word/replace-upload", post(replace_upload))
}
