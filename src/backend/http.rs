//! `reqwest` implementation of [`Backend`].
//!
//! The client carries only a connect timeout. Request deadlines belong to the
//! gateway: the OCR cap is enforced by dropping the in-flight future, which
//! aborts the underlying request.

use super::{
    missing_field, reject_unless_success, Backend, EnhanceRequest, EnhanceResponse, OcrRequest,
    OcrResponse, RenderRequest, RenderResponse, StatusResponse, UploadPayload, UploadResponse,
};
use crate::config::ClientConfig;
use crate::error::{BackendError, WorkflowError};
use crate::output::OutputFormat;
use async_trait::async_trait;
use reqwest::{multipart, Client, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// HTTP client for the OCR backend.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, WorkflowError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| WorkflowError::InvalidConfig(format!("base URL: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(WorkflowError::InvalidConfig(format!(
                "base URL '{}' cannot carry a path",
                config.base_url
            )));
        }
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| WorkflowError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self { client, base })
    }

    /// `base` + `/api/<segments…>`, each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("api").extend(segments);
        }
        url
    }

    fn unreachable(&self, err: reqwest::Error) -> BackendError {
        BackendError::Unreachable {
            url: self.base.to_string(),
            reason: err.to_string(),
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, BackendError> {
        let response = request.send().await.map_err(|e| self.unreachable(e))?;
        debug!("{} → HTTP {}", response.url().path(), response.status());
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(rejection(response).await)
        }
    }

    async fn json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<(u16, T), BackendError> {
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        let body = response.json::<T>().await.map_err(|e| BackendError::Decode {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        Ok((status, body))
    }
}

/// Build [`BackendError::Rejected`] from a non-2xx response.
///
/// The backend answers errors as `{"detail": "..."}`; validation errors carry
/// a structured `detail`, which is passed through as compact JSON.
async fn rejection(response: Response) -> BackendError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| match v.get("detail") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        })
        .unwrap_or_else(|| {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                trimmed.chars().take(200).collect()
            }
        });
    BackendError::Rejected {
        status: status.as_u16(),
        detail,
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn upload(&self, payload: UploadPayload) -> Result<UploadResponse, BackendError> {
        let part = multipart::Part::bytes(payload.bytes)
            .file_name(payload.filename)
            .mime_str(payload.mime_type)
            .map_err(|e| BackendError::Decode {
                endpoint: "upload".into(),
                reason: e.to_string(),
            })?;
        let form = multipart::Form::new().part("file", part);
        let (status, body): (u16, UploadResponse) = self
            .json("upload", self.client.post(self.url(&["upload"])).multipart(form))
            .await?;
        reject_unless_success(body.success, body.detail.as_deref(), "upload failed", status)?;
        if body.file_id.is_none() {
            return Err(missing_field("upload", "file_id"));
        }
        Ok(body)
    }

    async fn status(&self) -> Result<StatusResponse, BackendError> {
        let (_, body) = self
            .json("status", self.client.get(self.url(&["status"])))
            .await?;
        Ok(body)
    }

    async fn process_ocr(&self, request: &OcrRequest) -> Result<OcrResponse, BackendError> {
        let (status, body): (u16, OcrResponse) = self
            .json(
                "process-ocr",
                self.client.post(self.url(&["process-ocr"])).json(request),
            )
            .await?;
        reject_unless_success(body.success, body.detail.as_deref(), "OCR failed", status)?;
        if body.raw_text.is_none() {
            return Err(missing_field("process-ocr", "raw_text"));
        }
        Ok(body)
    }

    async fn enhance(&self, request: &EnhanceRequest) -> Result<EnhanceResponse, BackendError> {
        let (status, body): (u16, EnhanceResponse) = self
            .json(
                "enhance-with-gemini",
                self.client
                    .post(self.url(&["enhance-with-gemini"]))
                    .json(request),
            )
            .await?;
        reject_unless_success(
            body.success,
            body.detail.as_deref(),
            "AI processing failed",
            status,
        )?;
        if body.processed_text.is_none() {
            return Err(missing_field("enhance-with-gemini", "processed_text"));
        }
        Ok(body)
    }

    async fn generate_markdown(
        &self,
        request: &RenderRequest,
    ) -> Result<RenderResponse, BackendError> {
        let (status, body): (u16, RenderResponse) = self
            .json(
                "generate-markdown",
                self.client
                    .post(self.url(&["generate-markdown"]))
                    .json(request),
            )
            .await?;
        reject_unless_success(
            body.success,
            body.detail.as_deref(),
            "generating Markdown failed",
            status,
        )?;
        if body.markdown_content.is_none() {
            return Err(missing_field("generate-markdown", "markdown_content"));
        }
        Ok(body)
    }

    async fn download(
        &self,
        file_id: &str,
        format: OutputFormat,
        filename: &str,
    ) -> Result<Vec<u8>, BackendError> {
        let request = self
            .client
            .get(self.url(&["download", file_id, format.extension()]))
            .query(&[("filename", filename)]);
        let response = self.send(request).await?;
        let bytes = response.bytes().await.map_err(|e| BackendError::Decode {
            endpoint: "download".into(),
            reason: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    async fn cleanup(&self, file_id: &str) -> Result<(), BackendError> {
        self.send(self.client.delete(self.url(&["cleanup", file_id])))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base: &str) -> HttpBackend {
        let config = ClientConfig::builder().base_url(base).build().unwrap();
        HttpBackend::new(&config).unwrap()
    }

    #[test]
    fn url_building() {
        let b = backend("http://localhost:8000");
        assert_eq!(b.url(&["status"]).as_str(), "http://localhost:8000/api/status");
        assert_eq!(
            b.url(&["download", "abc123", "md"]).as_str(),
            "http://localhost:8000/api/download/abc123/md"
        );
    }

    #[test]
    fn url_building_keeps_base_prefix() {
        let b = backend("https://example.com/ocr/");
        assert_eq!(
            b.url(&["cleanup", "abc"]).as_str(),
            "https://example.com/ocr/api/cleanup/abc"
        );
    }

    #[test]
    fn url_segments_are_encoded() {
        let b = backend("http://localhost:8000");
        assert_eq!(
            b.url(&["cleanup", "a/b"]).as_str(),
            "http://localhost:8000/api/cleanup/a%2Fb"
        );
    }
}
