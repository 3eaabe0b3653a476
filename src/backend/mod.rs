//! The backend seam: one trait method per HTTP endpoint.
//!
//! Every remote effect of the workflow goes through [`Backend`]. The
//! production implementation is [`http::HttpBackend`]; tests substitute an
//! in-memory fake to count calls and script responses.
//!
//! ## Endpoints
//!
//! ```text
//! POST   /api/upload                      multipart `file`
//! GET    /api/status
//! POST   /api/process-ocr                 OcrRequest
//! POST   /api/enhance-with-gemini         EnhanceRequest
//! POST   /api/generate-markdown           RenderRequest
//! GET    /api/download/{id}/{fmt}?filename=
//! DELETE /api/cleanup/{id}
//! ```
//!
//! Implementations only translate transport; they never touch the session.
//! Error envelopes (`success: false`, `detail`) are mapped to
//! [`BackendError::Rejected`] here so callers see a single error shape.

pub mod http;

use crate::error::BackendError;
use crate::metadata::Metadata;
use crate::output::OutputFormat;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use http::HttpBackend;

/// Content sent to `POST /api/upload`.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    pub filename: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// `GET /api/status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub ocr_available: Option<bool>,
    /// Whether the AI enhancement model is configured server-side.
    #[serde(default)]
    pub gemini_available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrRequest {
    pub file_id: String,
    pub language: String,
    pub use_textline_orientation: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrResponse {
    pub success: bool,
    #[serde(default)]
    pub raw_text: Option<String>,
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhanceRequest {
    pub text: String,
    pub prompt_type: String,
    pub custom_prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnhanceResponse {
    pub success: bool,
    #[serde(default)]
    pub processed_text: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderRequest {
    pub file_id: String,
    pub content: String,
    pub include_metadata: bool,
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderResponse {
    pub success: bool,
    #[serde(default)]
    pub markdown_content: Option<String>,
    #[serde(default)]
    pub txt_content: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Remote operations offered by the OCR backend.
///
/// Implementations must be `Send + Sync`: the OCR liveness probe and the
/// fire-and-forget cleanup run on spawned tasks sharing the same backend.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn upload(&self, payload: UploadPayload) -> Result<UploadResponse, BackendError>;

    async fn status(&self) -> Result<StatusResponse, BackendError>;

    async fn process_ocr(&self, request: &OcrRequest) -> Result<OcrResponse, BackendError>;

    async fn enhance(&self, request: &EnhanceRequest) -> Result<EnhanceResponse, BackendError>;

    async fn generate_markdown(
        &self,
        request: &RenderRequest,
    ) -> Result<RenderResponse, BackendError>;

    async fn download(
        &self,
        file_id: &str,
        format: OutputFormat,
        filename: &str,
    ) -> Result<Vec<u8>, BackendError>;

    async fn cleanup(&self, file_id: &str) -> Result<(), BackendError>;
}

/// Turn a `success: false` envelope into [`BackendError::Rejected`].
///
/// Servers that signal failure in the body usually still answer 200, so the
/// status is carried through for the message only.
pub(crate) fn reject_unless_success(
    success: bool,
    detail: Option<&str>,
    fallback: &str,
    status: u16,
) -> Result<(), BackendError> {
    if success {
        return Ok(());
    }
    Err(BackendError::Rejected {
        status,
        detail: detail.unwrap_or(fallback).to_string(),
    })
}

/// A required field missing from a successful envelope.
pub(crate) fn missing_field(endpoint: &str, field: &str) -> BackendError {
    BackendError::Decode {
        endpoint: endpoint.to_string(),
        reason: format!("response has no '{field}'"),
    }
}
