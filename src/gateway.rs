//! Remote operation gateway: one method per backend operation.
//!
//! The gateway turns raw [`Backend`] exchanges into workflow results:
//!
//! * local pre-flight checks run first and never touch the network
//!   (file type/size, missing custom prompt);
//! * OCR runs under a hard timeout, alongside the cosmetic progress timer
//!   and a diagnostic liveness probe, both torn down on every exit path;
//! * every failure is normalised into a [`WorkflowError`].
//!
//! It holds no session state; [`crate::controller::StageController`]
//! decides when each operation is allowed and what it changes.

use crate::backend::{
    Backend, EnhanceRequest, HttpBackend, OcrRequest, RenderRequest, StatusResponse, UploadPayload,
};
use crate::config::ClientConfig;
use crate::error::{BackendError, WorkflowError};
use crate::metadata::Metadata;
use crate::output::{OutputFormat, RenderedOutputs};
use crate::progress::{ProgressCallback, ProgressOutcome, ProgressReporter};
use crate::prompts::{PromptKind, PromptRequest};
use crate::upload::{format_file_size, UploadFile};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Result of a successful OCR call.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrOutput {
    pub raw_text: String,
    /// Server-reported processing time in seconds, if given.
    pub processing_seconds: Option<f64>,
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Executes backend operations with validation, deadlines and error mapping.
#[derive(Clone)]
pub struct Gateway {
    backend: Arc<dyn Backend>,
    config: ClientConfig,
}

impl Gateway {
    pub fn new(backend: Arc<dyn Backend>, config: ClientConfig) -> Self {
        let usable = config.clone().with_usable_timers();
        if usable != config {
            warn!("Zero OCR timer settings raised to their minimum");
        }
        Self {
            backend,
            config: usable,
        }
    }

    /// Gateway talking HTTP to `config.base_url`.
    pub fn http(config: ClientConfig) -> Result<Self, WorkflowError> {
        let backend = HttpBackend::new(&config)?;
        Ok(Self::new(Arc::new(backend), config))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Query `GET /api/status`.
    ///
    /// An AI backend that reports itself unavailable is only a warning: OCR
    /// and downloads still work without it.
    pub async fn check_status(&self) -> Result<StatusResponse, WorkflowError> {
        let status = self
            .backend
            .status()
            .await
            .map_err(WorkflowError::StatusUnavailable)?;
        debug!("Backend status: {:?}", status);
        if !status.gemini_available {
            warn!("AI enhancement is not available on the backend; only raw OCR text can be used");
        }
        Ok(status)
    }

    /// Validate and upload a document; returns the backend's file id.
    pub async fn submit_upload(&self, file: &UploadFile) -> Result<String, WorkflowError> {
        let kind = file.validate(self.config.max_upload_bytes)?;
        info!(
            "Uploading {} ({}, {})",
            file.name(),
            kind,
            format_file_size(file.size())
        );

        let payload = UploadPayload {
            filename: file.name().to_string(),
            mime_type: kind.mime_type(),
            bytes: file.bytes().to_vec(),
        };
        let response = self
            .backend
            .upload(payload)
            .await
            .map_err(WorkflowError::UploadFailed)?;
        let file_id = response.file_id.ok_or_else(|| {
            WorkflowError::UploadFailed(crate::backend::missing_field("upload", "file_id"))
        })?;
        info!("Upload accepted: file_id={}", file_id);
        Ok(file_id)
    }

    /// Run OCR on an uploaded file under the configured hard timeout.
    ///
    /// While the request is in flight a progress timer ticks `progress` and
    /// a liveness probe polls `/api/status`. The probe only logs; it never
    /// aborts or retries the OCR call.
    pub async fn run_ocr(
        &self,
        file_id: &str,
        language: &str,
        use_textline_orientation: bool,
        progress: &ProgressCallback,
    ) -> Result<OcrOutput, WorkflowError> {
        let request = OcrRequest {
            file_id: file_id.to_string(),
            language: language.to_string(),
            use_textline_orientation,
        };
        info!(
            "Starting OCR: file_id={} language={} orientation={}",
            file_id, language, use_textline_orientation
        );

        let started = Instant::now();
        let reporter = ProgressReporter::start(&self.config, Arc::clone(progress));
        let probe = self.spawn_probe();

        let deadline = self.config.ocr_timeout();
        let result = tokio::time::timeout(deadline, self.backend.process_ocr(&request)).await;
        drop(probe);

        let outcome = match result {
            Err(_) => {
                warn!("OCR exceeded {}s; request cancelled", deadline.as_secs());
                Err(WorkflowError::OcrTimeout {
                    secs: deadline.as_secs(),
                })
            }
            Ok(Err(e)) if e.is_unreachable() => Err(WorkflowError::BackendUnreachable {
                reason: e.to_string(),
            }),
            Ok(Err(e)) => Err(WorkflowError::OcrFailed(e)),
            Ok(Ok(response)) => match response.raw_text {
                Some(raw_text) => Ok(OcrOutput {
                    raw_text,
                    processing_seconds: response.processing_time,
                }),
                None => Err(WorkflowError::OcrFailed(crate::backend::missing_field(
                    "process-ocr",
                    "raw_text",
                ))),
            },
        };

        match &outcome {
            Ok(out) => {
                reporter.finish(ProgressOutcome::Completed);
                info!(
                    "OCR finished: {} chars in {:.2?} (server {:.2}s)",
                    out.raw_text.chars().count(),
                    started.elapsed(),
                    out.processing_seconds.unwrap_or_default()
                );
            }
            Err(e) => {
                reporter.finish(ProgressOutcome::Failed);
                warn!("OCR failed after {:.2?}: {}", started.elapsed(), e);
            }
        }
        outcome
    }

    /// Poll `/api/status` every probe interval and log the result.
    fn spawn_probe(&self) -> AbortOnDrop {
        let backend = Arc::clone(&self.backend);
        let every = self.config.probe_interval();
        AbortOnDrop(tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            loop {
                ticks.tick().await;
                match backend.status().await {
                    Ok(_) => debug!("Liveness probe: backend is responding"),
                    Err(e) if e.is_unreachable() => error!("Liveness probe: {}", e),
                    Err(e) => warn!("Liveness probe: backend status abnormal: {}", e),
                }
            }
        }))
    }

    /// Send raw text through the AI enhancement endpoint.
    ///
    /// `PromptKind::None` returns the text unchanged without a request.
    pub async fn enhance(
        &self,
        raw_text: &str,
        prompt: &PromptRequest,
    ) -> Result<String, WorkflowError> {
        prompt.validate()?;
        if prompt.kind == PromptKind::None {
            return Ok(raw_text.to_string());
        }

        let request = EnhanceRequest {
            text: raw_text.to_string(),
            prompt_type: prompt.kind.as_str().to_string(),
            custom_prompt: prompt
                .custom_prompt
                .clone()
                .filter(|p| !p.trim().is_empty()),
        };
        info!(
            "Enhancing {} chars with prompt '{}'{}",
            raw_text.chars().count(),
            prompt.kind,
            if request.custom_prompt.is_some() {
                " (override)"
            } else {
                ""
            }
        );

        let response = self
            .backend
            .enhance(&request)
            .await
            .map_err(WorkflowError::EnhanceFailed)?;
        response.processed_text.ok_or_else(|| {
            WorkflowError::EnhanceFailed(crate::backend::missing_field(
                "enhance-with-gemini",
                "processed_text",
            ))
        })
    }

    /// Ask the backend to assemble the final Markdown and plain text.
    ///
    /// Empty metadata is treated like no metadata: no front-matter is
    /// requested.
    pub async fn render(
        &self,
        file_id: &str,
        processed_text: &str,
        metadata: Option<&Metadata>,
    ) -> Result<RenderedOutputs, WorkflowError> {
        let metadata = metadata.filter(|m| !m.is_empty()).cloned();
        let request = RenderRequest {
            file_id: file_id.to_string(),
            content: processed_text.to_string(),
            include_metadata: metadata.is_some(),
            metadata,
        };
        debug!(
            "Rendering file_id={} (metadata: {})",
            file_id, request.include_metadata
        );

        let response = self
            .backend
            .generate_markdown(&request)
            .await
            .map_err(WorkflowError::RenderFailed)?;
        let markdown = response.markdown_content.ok_or_else(|| {
            WorkflowError::RenderFailed(crate::backend::missing_field(
                "generate-markdown",
                "markdown_content",
            ))
        })?;
        let plain_text = response
            .txt_content
            .unwrap_or_else(|| processed_text.to_string());
        Ok(RenderedOutputs {
            markdown,
            plain_text,
        })
    }

    /// Fetch a rendered artifact.
    pub async fn download(
        &self,
        file_id: &str,
        format: OutputFormat,
        filename: &str,
    ) -> Result<Vec<u8>, WorkflowError> {
        let bytes = self
            .backend
            .download(file_id, format, filename)
            .await
            .map_err(WorkflowError::DownloadFailed)?;
        if bytes.is_empty() {
            return Err(WorkflowError::DownloadFailed(BackendError::Decode {
                endpoint: "download".into(),
                reason: "empty body".into(),
            }));
        }
        Ok(bytes)
    }

    /// Release server-side resources; failures are logged, never returned.
    pub async fn cleanup(&self, file_id: &str) {
        match self.backend.cleanup(file_id).await {
            Ok(()) => info!("Released server resources for file_id={}", file_id),
            Err(e) => warn!("Cleanup of file_id={} failed: {}", file_id, e),
        }
    }

    /// Run [`Gateway::cleanup`] on a background task.
    ///
    /// Returns `None` outside a Tokio runtime, where nothing can be spawned.
    pub fn spawn_cleanup(&self, file_id: String) -> Option<JoinHandle<()>> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime; skipping cleanup of file_id={}", file_id);
            return None;
        };
        let gateway = self.clone();
        Some(runtime.spawn(async move { gateway.cleanup(&file_id).await }))
    }
}
