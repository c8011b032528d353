use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::StoredFile;

#[derive(Debug)]
pub struct BlobError(pub String);

impl std::fmt::Display for BlobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External blob-upload provider. Files are fully buffered before the
/// upload; a failure aborts the whole request with a distinct error class.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(
        &self,
        bytes: Bytes,
        filename: &str,
        mime: &str,
        field_hint: &str,
    ) -> Result<StoredFile, BlobError>;
}

/// Posts each file as multipart form-data to the configured upload
/// service and expects `{url}` (or `{secureUrl}`) back.
pub struct HttpBlobStore {
    client: reqwest::Client,
    upload_url: String,
}

impl HttpBlobStore {
    pub fn new(upload_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            upload_url,
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn upload(
        &self,
        bytes: Bytes,
        filename: &str,
        mime: &str,
        field_hint: &str,
    ) -> Result<StoredFile, BlobError> {
        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name(filename.to_string())
            .mime_str(mime)
            .map_err(|e| BlobError(format!("Invalid mime type: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("field", field_hint.to_string());

        let resp = self
            .client
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| BlobError(format!("Upload request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(BlobError(format!(
                "Upload service returned {}",
                resp.status()
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| BlobError(format!("Bad upload response: {e}")))?;

        let url = body
            .get("secureUrl")
            .or_else(|| body.get("url"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| BlobError("Upload response missing url".to_string()))?;

        Ok(StoredFile {
            field_name: field_hint.to_string(),
            url: url.to_string(),
        })
    }
}

/// Fabricates deterministic URLs and remembers sizes. Used by the tests
/// and by deployments without an upload provider configured.
#[derive(Default)]
pub struct MemoryBlobStore {
    sizes: DashMap<String, usize>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored_bytes(&self) -> usize {
        self.sizes.iter().map(|e| *e.value()).sum()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        bytes: Bytes,
        filename: &str,
        _mime: &str,
        field_hint: &str,
    ) -> Result<StoredFile, BlobError> {
        let url = format!("memory://{field_hint}/{}/{filename}", Uuid::now_v7());
        self.sizes.insert(url.clone(), bytes.len());
        Ok(StoredFile {
            field_name: field_hint.to_string(),
            url,
        })
    }
}
