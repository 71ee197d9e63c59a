use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File metadata record as stored in Firestore and returned on the wire.
///
/// `file_name` is the blob key in the storage bucket; `download_url` is the
/// public URL captured at upload time (signed URLs are minted separately).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Assigned by the metadata store on creation, immutable.
    pub id: String,
    pub user_id: String,
    pub file_name: String,
    pub original_name: String,
    pub file_type: String,
    pub file_size: u64,
    pub download_url: String,
    pub upload_date: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// A record as handed to the metadata store, before an id exists.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub user_id: String,
    pub file_name: String,
    pub original_name: String,
    pub file_type: String,
    pub file_size: u64,
    pub download_url: String,
    pub upload_date: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// Sortable fields for file listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum SortField {
    #[default]
    #[serde(rename = "uploadDate")]
    UploadDate,
    #[serde(rename = "originalName")]
    OriginalName,
    #[serde(rename = "fileSize")]
    FileSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum SortOrder {
    #[serde(rename = "asc")]
    Asc,
    #[default]
    #[serde(rename = "desc")]
    Desc,
}

/// Query parameters for GET /files
#[derive(Debug, Deserialize, Default)]
pub struct ListFilesQuery {
    /// Prefix match on the original filename (range approximation, not a
    /// substring search).
    pub search: Option<String>,
    /// Exact MIME type, or "all" for no filter.
    #[serde(rename = "type")]
    pub file_type: Option<String>,
    #[serde(rename = "sortBy", default)]
    pub sort_by: SortField,
    #[serde(rename = "sortOrder", default)]
    pub sort_order: SortOrder,
}

/// Response for POST /files/upload and GET /files/:id
#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub success: bool,
    pub file: FileRecord,
}

impl FileResponse {
    pub fn new(file: FileRecord) -> Self {
        Self {
            success: true,
            file,
        }
    }
}

/// Response for GET /files
#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub success: bool,
    pub files: Vec<FileRecord>,
}

impl FileListResponse {
    pub fn new(files: Vec<FileRecord>) -> Self {
        Self {
            success: true,
            files,
        }
    }
}

/// Response for DELETE /files/:id
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }
}

/// Response for GET /files/:id/download
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadUrlResponse {
    pub success: bool,
    pub download_url: String,
    pub file_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> FileRecord {
        FileRecord {
            id: "abc123".to_string(),
            user_id: "uid-1".to_string(),
            file_name: "uid-1_1700000000000_deadbeef_x.png".to_string(),
            original_name: "x.png".to_string(),
            file_type: "image/png".to_string(),
            file_size: 512,
            download_url: "https://storage.googleapis.com/b/k".to_string(),
            upload_date: "2024-01-01T00:00:00Z".parse().unwrap(),
            last_modified: "2024-01-01T00:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn test_record_wire_format_is_camel_case() {
        let json = serde_json::to_value(sample_record()).unwrap();
        assert!(json.get("userId").is_some());
        assert!(json.get("originalName").is_some());
        assert!(json.get("fileSize").is_some());
        assert!(json.get("uploadDate").is_some());
        assert!(json.get("lastModified").is_some());
        assert!(json.get("user_id").is_none());
    }

    #[test]
    fn test_list_query_parsing() {
        let query: ListFilesQuery = serde_json::from_str(
            r#"{"search":"rep","type":"image/png","sortBy":"fileSize","sortOrder":"asc"}"#,
        )
        .unwrap();
        assert_eq!(query.search.as_deref(), Some("rep"));
        assert_eq!(query.file_type.as_deref(), Some("image/png"));
        assert_eq!(query.sort_by, SortField::FileSize);
        assert_eq!(query.sort_order, SortOrder::Asc);
    }

    #[test]
    fn test_list_query_defaults() {
        let query: ListFilesQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.sort_by, SortField::UploadDate);
        assert_eq!(query.sort_order, SortOrder::Desc);
        assert!(query.search.is_none());
    }

    #[test]
    fn test_download_response_field_names() {
        let resp = DownloadUrlResponse {
            success: true,
            download_url: "https://example.com/signed".to_string(),
            file_name: "x.png".to_string(),
        };
        let json = serde_json::to_value(resp).unwrap();
        assert!(json.get("downloadUrl").is_some());
        assert!(json.get("fileName").is_some());
    }
}
