use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Success envelope used by every endpoint except `/health`.
///
/// ```text
/// {"status": "ok", "data": {...}}
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub status: String,

    pub data: Option<T>,
}

/// Runtime diagnostics from `GET /health`.
///
/// Only `status` is guaranteed; every other key the backend reports lands in
/// `details`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_dim: Option<u32>,

    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy" || self.status == "ok"
    }
}

/// Image record returned by `POST /files/upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub image_id: i64,
    pub original_filename: String,
    #[serde(default)]
    pub storage_uri: String,
    #[serde(default)]
    pub mime_type: String,
    /// Hex SHA-256 of the stored bytes
    #[serde(default)]
    pub checksum: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub visibility: String,
    #[serde(default)]
    pub has_embedding: bool,
    #[serde(default)]
    pub has_ocr_text: bool,
}

/// One hit from text or similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityHit {
    pub image_id: i64,
    pub similarity: f64,
    #[serde(default)]
    pub rank: u32,
}

/// Ranked results of `POST /search/text` and `GET /search/image/{id}/similar`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimilarityResults {
    #[serde(default)]
    pub results: Vec<SimilarityHit>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,

    /// Set when the user has nothing indexed yet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// One match from OCR text search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrHit {
    pub image_id: i64,
    #[serde(default)]
    pub snippet: String,
}

/// Results of `POST /search/ocr`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OcrResults {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub items: Vec<OcrHit>,
    #[serde(default)]
    pub count: usize,
}

#[derive(Serialize)]
pub(crate) struct TextQuery<'a> {
    pub query: &'a str,
    pub k: u32,
}

#[derive(Serialize)]
pub(crate) struct OcrQuery<'a> {
    pub query: &'a str,
    pub top_k: u32,
}
