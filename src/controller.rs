//! The stage controller: command handlers over one [`Session`].
//!
//! Each public `async fn` is one user action (upload, run OCR, enhance,
//! skip, render, download). A handler:
//!
//! 1. checks the session holds the artifact it needs, failing with
//!    [`WorkflowError::StageViolation`] before any request is sent;
//! 2. calls the [`Gateway`];
//! 3. on success, updates the session and advances the stage;
//! 4. reports the outcome to the [`crate::events::WorkflowObserver`] as a notice.
//!
//! Handlers take `&mut self`, so a session never has two operations in
//! flight. Failures leave the session exactly as it was.
//!
//! ```rust,no_run
//! use ocr_workbench::{ClientConfig, OutputFormat, StageController, UploadFile};
//!
//! # async fn run() -> Result<(), ocr_workbench::WorkflowError> {
//! let config = ClientConfig::default();
//! let mut ctl = StageController::with_http(config.clone())?;
//! let file = UploadFile::load("report.pdf", config.max_upload_bytes).await?;
//! ctl.submit_upload(&file).await?;
//! ctl.run_ocr().await?;
//! ctl.skip_enhance()?;
//! ctl.render_outputs(None).await?;
//! ctl.download(OutputFormat::Md, None, std::path::Path::new(".")).await?;
//! if let Some(cleanup) = ctl.reset() {
//!     let _ = cleanup.await;
//! }
//! # Ok(())
//! # }
//! ```

use crate::backend::{Backend, StatusResponse};
use crate::config::ClientConfig;
use crate::error::WorkflowError;
use crate::events::{NoopObserver, NoticeLevel, SharedObserver};
use crate::gateway::Gateway;
use crate::metadata::Metadata;
use crate::output::{
    default_download_name, sanitize_filename, save_download, OutputFormat, RenderedOutputs,
    SavedFile,
};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::prompts::{PromptKind, PromptRequest};
use crate::session::{Session, Stage};
use crate::upload::{format_file_size, UploadFile};
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Clone a required session field or fail with a stage violation.
fn required(
    field: &Option<String>,
    operation: &'static str,
    missing: &'static str,
) -> Result<String, WorkflowError> {
    field
        .clone()
        .ok_or(WorkflowError::StageViolation { operation, missing })
}

/// Drives one document through upload → OCR → review → download.
pub struct StageController {
    session: Session,
    gateway: Gateway,
    observer: SharedObserver,
    progress: ProgressCallback,
}

impl StageController {
    pub fn new(config: ClientConfig, backend: Arc<dyn Backend>) -> Self {
        Self::from_gateway(Gateway::new(backend, config))
    }

    /// Controller talking HTTP to `config.base_url`.
    pub fn with_http(config: ClientConfig) -> Result<Self, WorkflowError> {
        Ok(Self::from_gateway(Gateway::http(config)?))
    }

    fn from_gateway(gateway: Gateway) -> Self {
        Self {
            session: Session::new(),
            gateway,
            observer: Arc::new(NoopObserver),
            progress: Arc::new(NoopProgressCallback),
        }
    }

    /// Receive stage changes and notices.
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Receive cosmetic OCR progress.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn stage(&self) -> Stage {
        self.session.stage
    }

    pub fn config(&self) -> &ClientConfig {
        self.gateway.config()
    }

    /// Move to `stage` explicitly, e.g. when a UI navigates between regions.
    ///
    /// Forward moves need the target's artifact: an uploaded file for
    /// [`Stage::Ocr`], OCR text for [`Stage::Review`], a render for
    /// [`Stage::Download`]. Backward moves are refused when the session
    /// holds something the lower stage cannot; [`StageController::reset`]
    /// is the way back to the start.
    pub fn advance_to(&mut self, stage: Stage) -> Result<(), WorkflowError> {
        let missing = match stage {
            Stage::Upload => None,
            Stage::Ocr => self.session.file_id.is_none().then_some("an uploaded file"),
            Stage::Review => self.session.raw_text.is_none().then_some("OCR text"),
            Stage::Download => self
                .session
                .rendered_markdown
                .is_none()
                .then_some("rendered output"),
        };
        if let Some(missing) = missing {
            return Err(self.fail(WorkflowError::StageViolation {
                operation: "advance",
                missing,
            }));
        }

        let from = self.session.stage;
        self.session.stage = stage;
        if let Err(reason) = self.session.check_invariants() {
            self.session.stage = from;
            return Err(self.fail(WorkflowError::StageRegression {
                from,
                to: stage,
                reason,
            }));
        }
        self.session.stage = from;
        self.enter(stage);
        Ok(())
    }

    /// Set the stage and tell the observer which regions to show.
    fn enter(&mut self, stage: Stage) {
        if self.session.stage != stage {
            debug!("Stage {} → {}", self.session.stage, stage);
        }
        self.session.stage = stage;
        self.observer
            .on_stage_changed(stage, self.session.visibility());
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        self.observer.on_notice(level, message);
    }

    fn fail(&self, err: WorkflowError) -> WorkflowError {
        self.notify(NoticeLevel::Error, &err.to_string());
        err
    }

    /// Probe the backend; see [`Gateway::check_status`].
    pub async fn check_status(&self) -> Result<StatusResponse, WorkflowError> {
        let status = self
            .gateway
            .check_status()
            .await
            .map_err(|e| self.fail(e))?;
        if !status.gemini_available {
            self.notify(
                NoticeLevel::Info,
                "AI enhancement is unavailable; raw OCR text can still be downloaded",
            );
        }
        Ok(status)
    }

    /// Validate and upload `file`; returns the new `file_id`.
    ///
    /// Type and size are checked locally first, so an invalid file never
    /// reaches the network. Uploading over an existing session replaces it
    /// and releases the previous upload on the server.
    pub async fn submit_upload(&mut self, file: &UploadFile) -> Result<String, WorkflowError> {
        let file_id = self
            .gateway
            .submit_upload(file)
            .await
            .map_err(|e| self.fail(e))?;

        let previous = self.session.file_id.take();
        self.session = Session {
            file_id: Some(file_id.clone()),
            filename: Some(file.name().to_string()),
            ..Session::default()
        };
        if let Some(old) = previous.filter(|old| *old != file_id) {
            let _ = self.gateway.spawn_cleanup(old);
        }

        self.enter(Stage::Ocr);
        self.notify(
            NoticeLevel::Success,
            &format!(
                "Uploaded {} ({})",
                file.name(),
                format_file_size(file.size())
            ),
        );
        Ok(file_id)
    }

    /// Run OCR with the configured language and orientation setting.
    pub async fn run_ocr(&mut self) -> Result<String, WorkflowError> {
        let language = self.config().language.clone();
        let orientation = self.config().use_textline_orientation;
        self.run_ocr_with(&language, orientation).await
    }

    /// Run OCR on the uploaded file; returns the raw text.
    ///
    /// On success any earlier processed text and renders are discarded and
    /// the session moves to [`Stage::Review`]. On failure, including the
    /// hard timeout, the session is untouched.
    pub async fn run_ocr_with(
        &mut self,
        language: &str,
        use_textline_orientation: bool,
    ) -> Result<String, WorkflowError> {
        let file_id = required(&self.session.file_id, "run OCR", "an uploaded file")
            .map_err(|e| self.fail(e))?;

        self.notify(NoticeLevel::Info, "Running OCR…");
        let output = self
            .gateway
            .run_ocr(&file_id, language, use_textline_orientation, &self.progress)
            .await
            .map_err(|e| self.fail(e))?;

        self.session.clear_text();
        self.session.raw_text = Some(output.raw_text.clone());
        self.session.ocr_seconds = output.processing_seconds;
        self.enter(Stage::Review);

        let message = match output.processing_seconds {
            Some(secs) => format!("OCR complete ({secs:.2}s)"),
            None => "OCR complete".to_string(),
        };
        self.notify(NoticeLevel::Success, &message);
        Ok(output.raw_text)
    }

    /// Enhance the raw text with a prompt kind and optional prompt text.
    ///
    /// [`PromptKind::None`] is the same as [`StageController::skip_enhance`].
    pub async fn enhance_with_ai(
        &mut self,
        kind: PromptKind,
        custom_prompt: Option<&str>,
    ) -> Result<String, WorkflowError> {
        self.enhance_with_prompt(&PromptRequest::new(kind, custom_prompt))
            .await
    }

    /// Enhance the raw text with a prepared request, e.g. from
    /// [`crate::prompts::PromptEditor::request`].
    pub async fn enhance_with_prompt(
        &mut self,
        prompt: &PromptRequest,
    ) -> Result<String, WorkflowError> {
        if prompt.kind == PromptKind::None {
            return self.skip_enhance();
        }
        let raw_text = required(&self.session.raw_text, "enhance", "OCR text")
            .map_err(|e| self.fail(e))?;
        prompt.validate().map_err(|e| self.fail(e))?;

        self.notify(NoticeLevel::Info, "Sending text to the AI backend…");
        let processed = self
            .gateway
            .enhance(&raw_text, prompt)
            .await
            .map_err(|e| self.fail(e))?;

        self.set_processed(processed.clone());
        self.notify(NoticeLevel::Success, "AI enhancement complete");
        Ok(processed)
    }

    /// Use the raw OCR text as-is. Never touches the network.
    pub fn skip_enhance(&mut self) -> Result<String, WorkflowError> {
        let raw_text = required(&self.session.raw_text, "skip enhancement", "OCR text")
            .map_err(|e| self.fail(e))?;
        self.set_processed(raw_text.clone());
        self.notify(NoticeLevel::Info, "AI enhancement skipped; using raw OCR text");
        Ok(raw_text)
    }

    /// Store a new processed text; renders made from the old one are stale.
    fn set_processed(&mut self, text: String) {
        self.session.processed_text = Some(text);
        self.session.clear_renders();
        if self.session.stage == Stage::Download {
            self.enter(Stage::Review);
        }
    }

    /// Build the final Markdown and plain text from the processed text.
    ///
    /// `metadata` that is absent or empty produces no front-matter. Calling
    /// this again with identical inputs yields identical renders.
    pub async fn render_outputs(
        &mut self,
        metadata: Option<&Metadata>,
    ) -> Result<RenderedOutputs, WorkflowError> {
        let file_id = required(&self.session.file_id, "render outputs", "an uploaded file")
            .map_err(|e| self.fail(e))?;
        let processed = required(
            &self.session.processed_text,
            "render outputs",
            "processed text",
        )
        .map_err(|e| self.fail(e))?;

        let outputs = self
            .gateway
            .render(&file_id, &processed, metadata)
            .await
            .map_err(|e| self.fail(e))?;

        self.session.rendered_markdown = Some(outputs.markdown.clone());
        self.session.rendered_plain_text = Some(outputs.plain_text.clone());
        self.enter(Stage::Download);
        self.notify(NoticeLevel::Success, "Markdown generated");
        Ok(outputs)
    }

    /// Download one format and save it as `<filename>.<ext>` in `dest_dir`.
    ///
    /// Without `filename` the uploaded file's stem is used, falling back to
    /// `document`.
    pub async fn download(
        &mut self,
        format: OutputFormat,
        filename: Option<&str>,
        dest_dir: &Path,
    ) -> Result<SavedFile, WorkflowError> {
        let file_id = required(&self.session.file_id, "download", "an uploaded file")
            .map_err(|e| self.fail(e))?;
        let name = match filename {
            Some(name) => sanitize_filename(name),
            None => default_download_name(self.session.filename.as_deref()),
        };

        let bytes = self
            .gateway
            .download(&file_id, format, &name)
            .await
            .map_err(|e| self.fail(e))?;
        let saved =
            save_download(dest_dir, &name, format, &bytes).map_err(|e| self.fail(e))?;

        self.notify(
            NoticeLevel::Success,
            &format!("Saved {}", saved.path.display()),
        );
        Ok(saved)
    }

    /// Start over: clear the session and return to [`Stage::Upload`].
    ///
    /// Server-side cleanup of the uploaded file runs in the background and
    /// its failure is only logged. The returned handle lets a caller that is
    /// about to exit wait for it.
    pub fn reset(&mut self) -> Option<JoinHandle<()>> {
        let previous = self.session.file_id.take();
        self.session = Session::default();
        self.enter(Stage::Upload);
        info!("Session reset");
        self.notify(NoticeLevel::Info, "Session reset");
        previous.and_then(|file_id| self.gateway.spawn_cleanup(file_id))
    }
}

impl std::fmt::Debug for StageController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageController")
            .field("session", &self.session)
            .field("base_url", &self.config().base_url)
            .finish_non_exhaustive()
    }
}
