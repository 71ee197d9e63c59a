use axum::{
    extract::{Multipart, Path, Query, State},
    Extension, Json,
};
use bytes::Bytes;

use crate::error::{AppError, Result};
use crate::models::{
    DownloadUrlResponse, FileListResponse, FileResponse, ListFilesQuery, MessageResponse,
    Principal,
};
use crate::AppState;

/// Upload a file
/// POST /files/upload (multipart, single part named "file")
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    mut multipart: Multipart,
) -> Result<Json<FileResponse>> {
    let mut file_data: Option<Bytes> = None;
    let mut file_name: Option<String> = None;
    let mut content_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to process multipart: {}", e)))?
    {
        if field.name() == Some("file") {
            file_name = field.file_name().map(|s| s.to_string());
            content_type = field.content_type().map(|s| s.to_string());
            file_data = Some(field.bytes().await.map_err(|e| {
                AppError::BadRequest(format!("Failed to read file: {}", e))
            })?);
        }
    }

    let data = file_data.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;
    let file_name =
        file_name.ok_or_else(|| AppError::BadRequest("No file name provided".to_string()))?;
    let content_type =
        content_type.unwrap_or_else(|| "application/octet-stream".to_string());

    let declared_size = data.len() as u64;
    let record = state
        .files
        .upload(&principal, data, &file_name, &content_type, declared_size)
        .await?;

    Ok(Json(FileResponse::new(record)))
}

/// List the caller's files
/// GET /files?search=&type=&sortBy=&sortOrder=
pub async fn list_files(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<FileListResponse>> {
    let files = state.files.list(&principal, query).await?;
    Ok(Json(FileListResponse::new(files)))
}

/// Get a single file record
/// GET /files/:id
pub async fn get_file(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<FileResponse>> {
    let record = state.files.get(&principal, &id).await?;
    Ok(Json(FileResponse::new(record)))
}

/// Delete a file
/// DELETE /files/:id
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    state.files.delete(&principal, &id).await?;
    Ok(Json(MessageResponse::new("File deleted successfully")))
}

/// Issue a fresh signed download URL
/// GET /files/:id/download
pub async fn download_file(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> Result<Json<DownloadUrlResponse>> {
    let (download_url, file_name) = state.files.issue_download_url(&principal, &id).await?;
    Ok(Json(DownloadUrlResponse {
        success: true,
        download_url,
        file_name,
    }))
}
