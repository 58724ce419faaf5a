use std::path::{Path, PathBuf};

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use docfill_core::{
    BulkWriteResult, CellWrite, NamedRange, Preview, SheetError, Workbook, WorkbookStore,
    WriteResult,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::form::UploadForm;
use super::{blocking, ok, required, ApiJson, Envelope};
use crate::error::AppError;
use crate::storage::{resolve_path, XlsxStore};
use crate::AppState;

const DEFAULT_PREVIEW_SIZE: usize = 10;
const MAX_PREVIEW_SIZE: usize = 1000;

/// Write one value into one cell
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WriteCellRequest {
    pub file_path: Option<String>,
    pub sheet_name: Option<String>,
    pub cell: Option<String>,
    pub value: Value,
    pub output_path: Option<String>,
}

/// Write many values into one sheet
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BulkWriteRequest {
    pub file_path: Option<String>,
    pub sheet_name: Option<String>,
    pub writes: Vec<CellWrite>,
    pub respect_merges: bool,
    pub output_path: Option<String>,
}

/// Write one value through a defined name
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NamedWriteRequest {
    pub file_path: Option<String>,
    pub name: Option<String>,
    pub value: Value,
    pub output_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreviewRequest {
    pub file_path: Option<String>,
    pub sheet_name: Option<String>,
    pub max_rows: Option<usize>,
    pub max_cols: Option<usize>,
}

/// Request naming only a workbook
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkbookRequest {
    pub file_path: Option<String>,
}

/// Set on responses of the multipart endpoints
#[derive(Debug, Serialize)]
pub struct UploadInfo {
    pub uploaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteCellResponse {
    pub file_path: String,
    #[serde(flatten)]
    pub result: WriteResult,
    #[serde(flatten)]
    pub upload: Option<UploadInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkWriteResponse {
    pub file_path: String,
    #[serde(flatten)]
    pub result: BulkWriteResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedWriteResponse {
    pub file_path: String,
    pub name: String,
    #[serde(flatten)]
    pub result: WriteResult,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    #[serde(flatten)]
    pub preview: Preview,
    #[serde(flatten)]
    pub upload: Option<UploadInfo>,
}

#[derive(Debug, Serialize)]
pub struct SheetsResponse {
    pub sheets: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct NamesResponse {
    pub names: Vec<NamedRange>,
}

/// Load `source`, apply `mutate`, and save to `output` (or back to `source`).
/// Returns the mutation's result and the written path.
fn apply_and_save<T>(
    store: XlsxStore,
    source: &Path,
    output: Option<&str>,
    mutate: impl FnOnce(&mut Workbook) -> Result<T, SheetError>,
) -> Result<(T, PathBuf), AppError> {
    let mut workbook = store.load(source)?;
    let result = mutate(&mut workbook)?;

    let destination = match output {
        Some(path) => resolve_path(path)?,
        None => source.to_path_buf(),
    };
    store.save(&workbook, source, &destination)?;
    Ok((result, destination))
}

fn source_path(file_path: Option<String>) -> Result<PathBuf, AppError> {
    let file_path = required(file_path, "filePath is required")?;
    let path = resolve_path(&file_path)?;
    tracing::debug!(path = %path.display(), "resolved workbook path");
    Ok(path)
}

fn preview_size(requested: Option<usize>) -> usize {
    requested.unwrap_or(DEFAULT_PREVIEW_SIZE).min(MAX_PREVIEW_SIZE)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn write_cell_at(
    store: XlsxStore,
    source: PathBuf,
    sheet_name: Option<String>,
    cell: String,
    value: Value,
    output: Option<String>,
) -> Result<WriteCellResponse, AppError> {
    let (result, written) = apply_and_save(store, &source, output.as_deref(), |workbook| {
        workbook.write_cell(sheet_name.as_deref(), &cell, &value)
    })?;
    tracing::info!(
        path = %written.display(),
        sheet = %result.sheet_name,
        cell = %result.cell,
        "wrote cell"
    );
    Ok(WriteCellResponse {
        file_path: written.display().to_string(),
        result,
        upload: None,
    })
}

/// Write a single cell in a workbook on disk
async fn write_cell(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<WriteCellRequest>,
) -> Result<Json<Envelope<WriteCellResponse>>, AppError> {
    let source = source_path(req.file_path)?;
    let cell = required(req.cell, "cell is required")?;
    let store = state.store;
    let sheet_name = non_blank(req.sheet_name);
    let value = req.value;
    let output = non_blank(req.output_path);

    let response =
        blocking(move || write_cell_at(store, source, sheet_name, cell, value, output)).await?;
    Ok(ok(response))
}

/// Upload a workbook, then write a single cell into it
async fn write_cell_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Envelope<WriteCellResponse>>, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let file = form.take_file("file is required")?;
    let cell = required(form.text("cell"), "cell is required")?;

    let stored = state.uploads.save(&file.file_name, &file.bytes).await?;
    let store = state.store;
    let source = stored.path.clone();
    let sheet_name = form.text("sheetName");
    let output = form.text("outputPath");
    let value = form.value("value");

    let mut response =
        blocking(move || write_cell_at(store, source, sheet_name, cell, value, output)).await?;
    response.upload = Some(UploadInfo {
        uploaded: true,
        url: Some(stored.url()),
    });
    Ok(ok(response))
}

/// Write many cells of one sheet in a single load/save cycle
async fn write_bulk(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<BulkWriteRequest>,
) -> Result<Json<Envelope<BulkWriteResponse>>, AppError> {
    let source = source_path(req.file_path)?;
    let store = state.store;
    let sheet_name = non_blank(req.sheet_name);
    let output = non_blank(req.output_path);
    let writes = req.writes;
    let respect_merges = req.respect_merges;

    let response = blocking(move || {
        let (result, written) = apply_and_save(store, &source, output.as_deref(), |workbook| {
            workbook.write_cells_bulk(sheet_name.as_deref(), &writes, respect_merges)
        })?;
        for skipped in &result.skipped {
            tracing::warn!(
                index = skipped.index,
                cell = %skipped.cell,
                "skipped bulk write: {}",
                skipped.reason
            );
        }
        tracing::info!(
            path = %written.display(),
            sheet = %result.sheet_name,
            applied = result.applied.len(),
            skipped = result.skipped.len(),
            "wrote cells"
        );
        Ok(BulkWriteResponse {
            file_path: written.display().to_string(),
            result,
        })
    })
    .await?;
    Ok(ok(response))
}

/// Write a value through a defined name
async fn write_named(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NamedWriteRequest>,
) -> Result<Json<Envelope<NamedWriteResponse>>, AppError> {
    let source = source_path(req.file_path)?;
    let name = required(req.name, "name is required")?;
    let store = state.store;
    let value = req.value;
    let output = non_blank(req.output_path);

    let response = blocking(move || {
        let (result, written) = apply_and_save(store, &source, output.as_deref(), |workbook| {
            workbook.write_named_value(name.trim(), &value)
        })?;
        tracing::info!(
            path = %written.display(),
            name = %name,
            cell = %result.cell,
            "wrote named cell"
        );
        Ok(NamedWriteResponse {
            file_path: written.display().to_string(),
            name,
            result,
        })
    })
    .await?;
    Ok(ok(response))
}

fn preview_at(
    store: XlsxStore,
    source: &Path,
    sheet_name: Option<&str>,
    max_rows: usize,
    max_cols: usize,
) -> Result<Preview, AppError> {
    let workbook = store.load(source)?;
    Ok(workbook.read_preview(sheet_name, max_rows, max_cols)?)
}

/// Preview the top-left corner of a sheet
async fn preview(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PreviewRequest>,
) -> Result<Json<Envelope<PreviewResponse>>, AppError> {
    let source = source_path(req.file_path)?;
    let store = state.store;
    let sheet_name = non_blank(req.sheet_name);
    let rows = preview_size(req.max_rows);
    let cols = preview_size(req.max_cols);

    let preview =
        blocking(move || preview_at(store, &source, sheet_name.as_deref(), rows, cols)).await?;
    Ok(ok(PreviewResponse {
        preview,
        upload: None,
    }))
}

/// Upload a workbook and preview it
async fn preview_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Envelope<PreviewResponse>>, AppError> {
    let mut form = UploadForm::read(multipart).await?;
    let file = form.take_file("file is required")?;
    let rows = preview_size(form.number("maxRows")?);
    let cols = preview_size(form.number("maxCols")?);
    let sheet_name = form.text("sheetName");

    let stored = state.uploads.save(&file.file_name, &file.bytes).await?;
    let store = state.store;
    let source = stored.path.clone();

    let preview =
        blocking(move || preview_at(store, &source, sheet_name.as_deref(), rows, cols)).await?;
    Ok(ok(PreviewResponse {
        preview,
        upload: Some(UploadInfo {
            uploaded: true,
            url: Some(stored.url()),
        }),
    }))
}

/// List sheet names in order
async fn list_sheets(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<WorkbookRequest>,
) -> Result<Json<Envelope<SheetsResponse>>, AppError> {
    let source = source_path(req.file_path)?;
    let store = state.store;

    let sheets: Vec<String> = blocking(move || {
        let workbook = store.load(&source)?;
        Ok(workbook
            .sheet_names()
            .into_iter()
            .map(str::to_string)
            .collect())
    })
    .await?;
    Ok(ok(SheetsResponse { sheets }))
}

/// List defined names and their references
async fn list_names(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<WorkbookRequest>,
) -> Result<Json<Envelope<NamesResponse>>, AppError> {
    let source = source_path(req.file_path)?;
    let store = state.store;

    let names: Vec<NamedRange> = blocking(move || {
        let workbook = store.load(&source)?;
        Ok(workbook.named_ranges().into_iter().cloned().collect())
    })
    .await?;
    Ok(ok(NamesResponse { names }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/excel/write", post(write_cell))
        .route("/excel/write-upload", post(write_cell_upload))
        .route("/excel/write-bulk", post(write_bulk))
        .route("/excel/write-named", post(write_named))
        .route("/excel/preview", post(preview))
        .route("/excel/preview-upload", post(preview_upload))
        .route("/excel/sheets", post(list_sheets))
        .route("/excel/names", post(list_names))
}
