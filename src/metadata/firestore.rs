//! Firestore-backed metadata store.
//!
//! Talks to the Firestore REST v1 API directly: documents are created and
//! deleted under the `files` collection, listings go through
//! `documents:runQuery` with a structured query. Requests are authenticated
//! with self-signed service-account JWTs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::credentials::ServiceAccount;
use crate::error::{AppError, Result};
use crate::metadata::{DeleteOutcome, MetadataStore, RecordQuery, PREFIX_SENTINEL};
use crate::models::{FileRecord, NewFileRecord, SortField, SortOrder};

const FIRESTORE_AUDIENCE: &str = "https://firestore.googleapis.com/";
const COLLECTION: &str = "files";

pub struct FirestoreStore {
    endpoint: String,
    project_id: String,
    account: ServiceAccount,
    client: reqwest::Client,
}

impl FirestoreStore {
    pub fn new(
        endpoint: &str,
        project_id: &str,
        account: ServiceAccount,
        client: reqwest::Client,
    ) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
            account,
            client,
        }
    }

    /// Root of the document tree: .../databases/(default)/documents
    fn documents_root(&self) -> String {
        format!(
            "{}/v1/projects/{}/databases/(default)/documents",
            self.endpoint, self.project_id
        )
    }

    fn bearer(&self) -> Result<String> {
        self.account.bearer_for(FIRESTORE_AUDIENCE)
    }

    async fn upstream_error(resp: reqwest::Response, what: &str) -> AppError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        AppError::Upstream(format!("Firestore {} failed: {} {}", what, status, body))
    }
}

#[async_trait]
impl MetadataStore for FirestoreStore {
    async fn insert(&self, record: &NewFileRecord) -> Result<FileRecord> {
        let url = format!("{}/{}", self.documents_root(), COLLECTION);
        let body = json!({ "fields": encode_fields(record) });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(self.bearer()?)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::upstream_error(resp, "insert").await);
        }

        let doc: Value = resp.json().await?;
        decode_document(&doc)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<FileRecord>> {
        let url = format!("{}/{}/{}", self.documents_root(), COLLECTION, id);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(self.bearer()?)
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Self::upstream_error(resp, "get").await);
        }

        let doc: Value = resp.json().await?;
        Ok(Some(decode_document(&doc)?))
    }

    async fn query(&self, query: &RecordQuery) -> Result<Vec<FileRecord>> {
        let url = format!("{}:runQuery", self.documents_root());
        let body = json!({ "structuredQuery": build_structured_query(query) });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(self.bearer()?)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::upstream_error(resp, "query").await);
        }

        // runQuery streams one JSON object per result; the final element may
        // carry only a readTime and no document.
        let results: Vec<Value> = resp.json().await?;
        let mut records = Vec::new();
        for item in &results {
            if let Some(doc) = item.get("document") {
                records.push(decode_document(doc)?);
            }
        }
        Ok(records)
    }

    async fn delete_by_id(&self, id: &str) -> Result<DeleteOutcome> {
        // Firestore deletes are blind by default; the exists precondition
        // makes a missing document observable as a failed precondition.
        let url = format!(
            "{}/{}/{}?currentDocument.exists=true",
            self.documents_root(),
            COLLECTION,
            id
        );

        let resp = self
            .client
            .delete(&url)
            .bearer_auth(self.bearer()?)
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(DeleteOutcome::Deleted),
            StatusCode::NOT_FOUND | StatusCode::CONFLICT => Ok(DeleteOutcome::Missing),
            _ => Err(Self::upstream_error(resp, "delete").await),
        }
    }
}

/// Encode a record into Firestore document fields
fn encode_fields(record: &NewFileRecord) -> Value {
    json!({
        "userId": { "stringValue": record.user_id },
        "fileName": { "stringValue": record.file_name },
        "originalName": { "stringValue": record.original_name },
        "fileType": { "stringValue": record.file_type },
        "fileSize": { "integerValue": record.file_size.to_string() },
        "downloadUrl": { "stringValue": record.download_url },
        "uploadDate": { "timestampValue": record.upload_date.to_rfc3339() },
        "lastModified": { "timestampValue": record.last_modified.to_rfc3339() },
    })
}

/// Decode a Firestore document into a FileRecord
fn decode_document(doc: &Value) -> Result<FileRecord> {
    let name = doc
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Upstream("Firestore document missing name".to_string()))?;
    let id = name
        .rsplit('/')
        .next()
        .unwrap_or(name)
        .to_string();

    let fields = doc
        .get("fields")
        .ok_or_else(|| AppError::Upstream("Firestore document missing fields".to_string()))?;

    Ok(FileRecord {
        id,
        user_id: string_field(fields, "userId")?,
        file_name: string_field(fields, "fileName")?,
        original_name: string_field(fields, "originalName")?,
        file_type: string_field(fields, "fileType")?,
        file_size: integer_field(fields, "fileSize")?,
        download_url: string_field(fields, "downloadUrl")?,
        upload_date: timestamp_field(fields, "uploadDate")?,
        last_modified: timestamp_field(fields, "lastModified")?,
    })
}

fn string_field(fields: &Value, key: &str) -> Result<String> {
    fields
        .get(key)
        .and_then(|v| v.get("stringValue"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::Upstream(format!("Firestore field '{}' missing", key)))
}

fn integer_field(fields: &Value, key: &str) -> Result<u64> {
    fields
        .get(key)
        .and_then(|v| v.get("integerValue"))
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| AppError::Upstream(format!("Firestore field '{}' missing", key)))
}

fn timestamp_field(fields: &Value, key: &str) -> Result<DateTime<Utc>> {
    fields
        .get(key)
        .and_then(|v| v.get("timestampValue"))
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| AppError::Upstream(format!("Firestore field '{}' missing", key)))
}

fn field_filter(field: &str, op: &str, value: Value) -> Value {
    json!({
        "fieldFilter": {
            "field": { "fieldPath": field },
            "op": op,
            "value": value,
        }
    })
}

/// Translate a RecordQuery into a Firestore structured query.
///
/// The owner equality filter is always first; the optional name predicate is
/// the prefix-range approximation on `originalName`; the optional type
/// predicate is exact equality. One orderBy clause.
fn build_structured_query(query: &RecordQuery) -> Value {
    let mut filters = vec![field_filter(
        "userId",
        "EQUAL",
        json!({ "stringValue": query.owner_id }),
    )];

    if let Some(prefix) = &query.name_prefix {
        let upper = format!("{}{}", prefix, PREFIX_SENTINEL);
        filters.push(field_filter(
            "originalName",
            "GREATER_THAN_OR_EQUAL",
            json!({ "stringValue": prefix }),
        ));
        filters.push(field_filter(
            "originalName",
            "LESS_THAN_OR_EQUAL",
            json!({ "stringValue": upper }),
        ));
    }

    if let Some(file_type) = &query.file_type {
        filters.push(field_filter(
            "fileType",
            "EQUAL",
            json!({ "stringValue": file_type }),
        ));
    }

    let filter = if filters.len() == 1 {
        filters.into_iter().next().unwrap()
    } else {
        json!({
            "compositeFilter": {
                "op": "AND",
                "filters": filters,
            }
        })
    };

    let sort_field = match query.sort.field {
        SortField::UploadDate => "uploadDate",
        SortField::OriginalName => "originalName",
        SortField::FileSize => "fileSize",
    };
    let direction = match query.sort.order {
        SortOrder::Asc => "ASCENDING",
        SortOrder::Desc => "DESCENDING",
    };

    json!({
        "from": [{ "collectionId": COLLECTION }],
        "where": filter,
        "orderBy": [{
            "field": { "fieldPath": sort_field },
            "direction": direction,
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::SortSpec;

    fn query(prefix: Option<&str>, file_type: Option<&str>) -> RecordQuery {
        RecordQuery {
            owner_id: "uid-1".to_string(),
            name_prefix: prefix.map(str::to_string),
            file_type: file_type.map(str::to_string),
            sort: SortSpec {
                field: SortField::UploadDate,
                order: SortOrder::Desc,
            },
        }
    }

    #[test]
    fn test_owner_only_query_has_single_filter() {
        let q = build_structured_query(&query(None, None));
        // No composite wrapper when the owner predicate stands alone
        assert!(q["where"]["fieldFilter"].is_object());
        assert_eq!(q["where"]["fieldFilter"]["field"]["fieldPath"], "userId");
        assert_eq!(q["orderBy"][0]["direction"], "DESCENDING");
    }

    #[test]
    fn test_prefix_becomes_sentinel_closed_range() {
        let q = build_structured_query(&query(Some("rep"), None));
        let filters = q["where"]["compositeFilter"]["filters"].as_array().unwrap();
        assert_eq!(filters.len(), 3);
        assert_eq!(filters[1]["fieldFilter"]["op"], "GREATER_THAN_OR_EQUAL");
        assert_eq!(filters[1]["fieldFilter"]["value"]["stringValue"], "rep");
        assert_eq!(filters[2]["fieldFilter"]["op"], "LESS_THAN_OR_EQUAL");
        // Range closed with the highest-codepoint sentinel; this emulates
        // prefix match, it does not find substrings
        assert_eq!(
            filters[2]["fieldFilter"]["value"]["stringValue"],
            format!("rep{}", PREFIX_SENTINEL)
        );
    }

    #[test]
    fn test_type_filter_is_exact_equality() {
        let q = build_structured_query(&query(None, Some("image/png")));
        let filters = q["where"]["compositeFilter"]["filters"].as_array().unwrap();
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[1]["fieldFilter"]["field"]["fieldPath"], "fileType");
        assert_eq!(filters[1]["fieldFilter"]["op"], "EQUAL");
        // A grouped category like "image" would be compared verbatim here,
        // never expanded to image/* (documented limitation)
        assert_eq!(filters[1]["fieldFilter"]["value"]["stringValue"], "image/png");
    }

    #[test]
    fn test_document_decode() {
        let doc = json!({
            "name": "projects/p/databases/(default)/documents/files/abc123",
            "fields": {
                "userId": { "stringValue": "uid-1" },
                "fileName": { "stringValue": "uid-1_1700000000000_dead_x.png" },
                "originalName": { "stringValue": "x.png" },
                "fileType": { "stringValue": "image/png" },
                "fileSize": { "integerValue": "512" },
                "downloadUrl": { "stringValue": "https://storage.googleapis.com/b/k" },
                "uploadDate": { "timestampValue": "2024-01-01T00:00:00Z" },
                "lastModified": { "timestampValue": "2024-01-01T00:00:00Z" },
            }
        });
        let record = decode_document(&doc).unwrap();
        assert_eq!(record.id, "abc123");
        assert_eq!(record.original_name, "x.png");
        assert_eq!(record.file_size, 512);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let new_record = NewFileRecord {
            user_id: "uid-1".to_string(),
            file_name: "key".to_string(),
            original_name: "notes.txt".to_string(),
            file_type: "text/plain".to_string(),
            file_size: 42,
            download_url: "https://storage.googleapis.com/b/key".to_string(),
            upload_date: "2024-06-01T12:00:00Z".parse().unwrap(),
            last_modified: "2024-06-01T12:00:00Z".parse().unwrap(),
        };
        let doc = json!({
            "name": "projects/p/databases/(default)/documents/files/id1",
            "fields": encode_fields(&new_record),
        });
        let decoded = decode_document(&doc).unwrap();
        assert_eq!(decoded.user_id, new_record.user_id);
        assert_eq!(decoded.original_name, new_record.original_name);
        assert_eq!(decoded.file_size, new_record.file_size);
        assert_eq!(decoded.upload_date, new_record.upload_date);
    }
}
