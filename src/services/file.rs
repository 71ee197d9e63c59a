use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::metadata::{DeleteOutcome, MetadataStore, RecordQuery, SortSpec};
use crate::models::{FileRecord, ListFilesQuery, NewFileRecord, Principal, SortField};

/// Validity window of signed download URLs
const DOWNLOAD_URL_TTL: Duration = Duration::from_secs(15 * 60);

/// Accepted non-image MIME types; any image/* is accepted as well.
const ALLOWED_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/zip",
    "application/x-zip-compressed",
    "video/mp4",
    "video/avi",
    "video/mov",
    "text/plain",
    "application/json",
];

fn is_allowed_type(mime_type: &str) -> bool {
    mime_type.starts_with("image/") || ALLOWED_TYPES.contains(&mime_type)
}

/// Orchestrates uploads, listings and deletes across the object store and
/// the metadata store. Blob and metadata writes are two sequential steps,
/// not a transaction; the partial-failure states are surfaced, not patched.
pub struct FileService {
    metadata: Arc<dyn MetadataStore>,
    objects: Arc<dyn crate::storage::ObjectStore>,
    max_file_size: u64,
}

impl FileService {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        objects: Arc<dyn crate::storage::ObjectStore>,
        max_file_size: u64,
    ) -> Self {
        Self {
            metadata,
            objects,
            max_file_size,
        }
    }

    /// Upload a file: validate, write the blob, then insert the metadata
    /// record. A metadata failure after the blob write leaves an orphaned
    /// blob and surfaces as `PartialUpload`.
    pub async fn upload(
        &self,
        principal: &Principal,
        data: Bytes,
        original_name: &str,
        mime_type: &str,
        declared_size: u64,
    ) -> Result<FileRecord> {
        // All validation happens before any external write
        if declared_size > self.max_file_size {
            return Err(AppError::BadRequest(format!(
                "File exceeds the {} byte limit",
                self.max_file_size
            )));
        }
        if !is_allowed_type(mime_type) {
            return Err(AppError::UnsupportedMediaType(
                "File type not allowed".to_string(),
            ));
        }

        let now = Utc::now();
        // Millisecond timestamp plus a random suffix: two uploads of the
        // same name in the same millisecond must not share a key
        let suffix = Uuid::new_v4().simple().to_string();
        let file_name = format!(
            "{}_{}_{}_{}",
            principal.uid,
            now.timestamp_millis(),
            &suffix[..8],
            original_name
        );

        let download_url = self
            .objects
            .put(&file_name, data, mime_type)
            .await?;

        let record = NewFileRecord {
            user_id: principal.uid.clone(),
            file_name: file_name.clone(),
            original_name: original_name.to_string(),
            file_type: mime_type.to_string(),
            file_size: declared_size,
            download_url,
            upload_date: now,
            last_modified: now,
        };

        match self.metadata.insert(&record).await {
            Ok(inserted) => {
                tracing::info!("Uploaded file {} for {}", inserted.id, principal.uid);
                Ok(inserted)
            }
            Err(e) => Err(AppError::PartialUpload(format!(
                "Metadata insert failed after blob write, orphaned blob key '{}': {}",
                file_name, e
            ))),
        }
    }

    /// List the caller's files. The owner predicate is mandatory; search is
    /// a prefix-range approximation on the original name; a type filter of
    /// "all" means no filter.
    pub async fn list(
        &self,
        principal: &Principal,
        query: ListFilesQuery,
    ) -> Result<Vec<FileRecord>> {
        let file_type = query
            .file_type
            .filter(|t| !t.is_empty() && t != "all");
        let name_prefix = query.search.filter(|s| !s.is_empty());

        // The store cannot order a range-filtered query by a different
        // field; fail instead of silently dropping the sort
        if name_prefix.is_some() && query.sort_by != SortField::OriginalName {
            return Err(AppError::UnsupportedQuery(
                "Search results can only be sorted by originalName".to_string(),
            ));
        }

        let record_query = RecordQuery {
            owner_id: principal.uid.clone(),
            name_prefix,
            file_type,
            sort: SortSpec {
                field: query.sort_by,
                order: query.sort_order,
            },
        };

        self.metadata.query(&record_query).await
    }

    /// Get one record, failing closed on ownership mismatch. NotFound and
    /// Forbidden stay distinct for observability.
    pub async fn get(&self, principal: &Principal, id: &str) -> Result<FileRecord> {
        let record = self
            .metadata
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".to_string()))?;

        if record.user_id != principal.uid {
            return Err(AppError::Forbidden("Access denied".to_string()));
        }

        Ok(record)
    }

    /// Delete blob then record. A blob failure aborts with both intact; a
    /// missing record on the metadata step means a concurrent delete won the
    /// race and counts as success.
    pub async fn delete(&self, principal: &Principal, id: &str) -> Result<()> {
        let record = self.get(principal, id).await?;

        self.objects
            .delete(&record.file_name)
            .await
            .map_err(|e| AppError::DeleteFailed(format!("Blob delete failed: {}", e)))?;

        match self.metadata.delete_by_id(id).await {
            Ok(DeleteOutcome::Deleted) => {
                tracing::info!("Deleted file {} for {}", id, principal.uid);
                Ok(())
            }
            Ok(DeleteOutcome::Missing) => {
                // Lost the race against a concurrent delete of the same id
                tracing::debug!("Record {} already removed", id);
                Ok(())
            }
            Err(e) => {
                // Blob is gone but the record remains: a dangling reference.
                // Known consistency gap, no reconciliation in scope.
                tracing::error!(
                    "Record {} now dangles, blob '{}' deleted but metadata delete failed: {}",
                    id,
                    record.file_name,
                    e
                );
                Err(e)
            }
        }
    }

    /// Mint a fresh 15-minute signed URL for the blob; bytes are never
    /// streamed through this service.
    pub async fn issue_download_url(
        &self,
        principal: &Principal,
        id: &str,
    ) -> Result<(String, String)> {
        let record = self.get(principal, id).await?;
        let url = self.objects.signed_url(&record.file_name, DOWNLOAD_URL_TTL)?;
        Ok((url, record.original_name))
    }
}
