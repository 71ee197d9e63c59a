//! Cloud Storage object adapter.
//!
//! Uses the JSON API for uploads and deletes (media upload with a public
//! ACL, matching the original's make-public behavior) and the local V4
//! signer for download URLs.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use std::time::Duration;

use crate::credentials::ServiceAccount;
use crate::error::{AppError, Result};
use crate::storage::signer::UrlSigner;
use crate::storage::ObjectStore;

const STORAGE_AUDIENCE: &str = "https://storage.googleapis.com/";

pub struct GcsStore {
    endpoint: String,
    bucket: String,
    account: ServiceAccount,
    signer: Option<UrlSigner>,
    client: reqwest::Client,
}

impl GcsStore {
    pub fn new(
        endpoint: &str,
        bucket: &str,
        account: ServiceAccount,
        signer: Option<UrlSigner>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            account,
            signer,
            client,
        }
    }

    fn bearer(&self) -> Result<String> {
        self.account.bearer_for(STORAGE_AUDIENCE)
    }

    /// Public URL of an uploaded object
    fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, urlencoding::encode(key))
    }

    async fn upstream_error(resp: reqwest::Response, what: &str) -> AppError {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        AppError::Upstream(format!("Storage {} failed: {} {}", what, status, body))
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<String> {
        let url = format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}&predefinedAcl=publicRead",
            self.endpoint,
            self.bucket,
            urlencoding::encode(key)
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(self.bearer()?)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::upstream_error(resp, "upload").await);
        }

        tracing::info!("Uploaded object: {}", key);
        Ok(self.public_url(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let url = format!(
            "{}/storage/v1/b/{}/o/{}",
            self.endpoint,
            self.bucket,
            urlencoding::encode(key)
        );

        let resp = self
            .client
            .delete(&url)
            .bearer_auth(self.bearer()?)
            .send()
            .await?;

        // An object that is already gone counts as deleted; this is what
        // keeps a concurrent double delete clean
        if resp.status() == StatusCode::NOT_FOUND {
            tracing::debug!("Object already absent: {}", key);
            return Ok(());
        }
        if !resp.status().is_success() {
            return Err(Self::upstream_error(resp, "delete").await);
        }

        tracing::debug!("Deleted object: {}", key);
        Ok(())
    }

    fn signed_url(&self, key: &str, ttl: Duration) -> Result<String> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            AppError::Upstream(
                "Signed URLs require google.hmac_access_id and google.hmac_secret".to_string(),
            )
        })?;
        Ok(signer.signed_url(&self.bucket, key, ttl.as_secs().max(1)))
    }
}
