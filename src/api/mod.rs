//! Typed calls to the ImageDrive backend.
//!
//! Every call goes through the session's [`ApiClient`], so the bearer token
//! is attached and a 401 invalidates the session exactly as for the auth
//! endpoints.
//!
//! # Endpoints
//!
//! - `GET  /health` - Runtime diagnostics (public)
//! - `POST /files/upload` - Multipart image upload
//! - `POST /search/text` - Text-to-image embedding search
//! - `POST /search/ocr` - Substring search over OCR text
//! - `GET  /search/image/{id}/similar` - Image-to-image similarity

mod types;

pub use types::{
    Envelope, HealthReport, OcrHit, OcrResults, SimilarityHit, SimilarityResults, UploadedImage,
};

use std::path::Path;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::client::{ApiClient, ApiRequest, ApiResponse, MultipartFile};
use crate::error::{ApiError, UploadError};
use types::{OcrQuery, TextQuery};

pub const HEALTH_PATH: &str = "/health";
pub const UPLOAD_PATH: &str = "/files/upload";
pub const TEXT_SEARCH_PATH: &str = "/search/text";
pub const OCR_SEARCH_PATH: &str = "/search/ocr";

/// Default number of text/similarity results.
pub const DEFAULT_K: u32 = 10;

/// Default number of OCR matches.
pub const DEFAULT_OCR_TOP_K: u32 = 20;

/// Multipart field the backend reads the file from.
const UPLOAD_FIELD: &str = "file";

/// Client for the search and file endpoints.
#[derive(Clone)]
pub struct ImageDriveApi {
    client: ApiClient,
}

impl ImageDriveApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Backend diagnostics. The only endpoint that answers without an envelope.
    pub async fn health(&self) -> Result<HealthReport, ApiError> {
        self.client.get(HEALTH_PATH).await?.json()
    }

    /// Upload a file from disk.
    ///
    /// With `verify_checksum`, the SHA-256 reported by the backend must match
    /// the bytes that were read locally.
    pub async fn upload_file(
        &self,
        path: &Path,
        verify_checksum: bool,
    ) -> Result<UploadedImage, UploadError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| UploadError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        self.upload_bytes(&file_name, Bytes::from(bytes), verify_checksum)
            .await
    }

    /// Upload in-memory bytes under `file_name`.
    pub async fn upload_bytes(
        &self,
        file_name: &str,
        bytes: Bytes,
        verify_checksum: bool,
    ) -> Result<UploadedImage, UploadError> {
        let local = sha256_hex(&bytes);
        let mime_type = guess_mime_type(file_name);
        debug!(file_name, mime_type, size = bytes.len(), "Uploading file");

        let request = ApiRequest::post(UPLOAD_PATH).multipart(MultipartFile {
            field: UPLOAD_FIELD.to_string(),
            file_name: file_name.to_string(),
            mime_type: mime_type.to_string(),
            bytes,
        });
        let image: UploadedImage = unwrap_envelope(self.client.execute(request).await?)?;

        let mismatch = !image.checksum.is_empty() && !image.checksum.eq_ignore_ascii_case(&local);
        if verify_checksum && mismatch {
            return Err(UploadError::ChecksumMismatch {
                local,
                server: image.checksum,
            });
        }

        info!(image_id = image.image_id, file_name, "Uploaded file");
        Ok(image)
    }

    /// Rank the user's images against a text query.
    pub async fn search_text(&self, query: &str, k: u32) -> Result<SimilarityResults, ApiError> {
        let query = non_blank(query)?;
        let response = self
            .client
            .post(TEXT_SEARCH_PATH, &TextQuery { query, k })
            .await?;
        unwrap_envelope(response)
    }

    /// Find the user's images whose OCR text contains `query`.
    pub async fn search_ocr(&self, query: &str, top_k: u32) -> Result<OcrResults, ApiError> {
        let query = non_blank(query)?;
        let response = self
            .client
            .post(OCR_SEARCH_PATH, &OcrQuery { query, top_k })
            .await?;
        unwrap_envelope(response)
    }

    /// Images most similar to `image_id`, excluding itself.
    pub async fn similar(&self, image_id: i64, k: u32) -> Result<SimilarityResults, ApiError> {
        let request = ApiRequest::get(similar_path(image_id)).query("k", k);
        unwrap_envelope(self.client.execute(request).await?)
    }
}

/// Path of the similarity endpoint for one image.
pub fn similar_path(image_id: i64) -> String {
    format!("/search/image/{}/similar", image_id)
}

/// MIME type from the file extension; the backend filters on it.
pub fn guess_mime_type(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// Lowercase hex SHA-256.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn non_blank(query: &str) -> Result<&str, ApiError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidRequest("query must not be empty".to_string()));
    }
    Ok(trimmed)
}

fn unwrap_envelope<T: DeserializeOwned>(response: ApiResponse) -> Result<T, ApiError> {
    response
        .json::<Envelope<T>>()?
        .data
        .ok_or_else(|| ApiError::Decode("response has no data".to_string()))
}
