//! # ocr-workbench
//!
//! Client for a document OCR / AI-enhancement backend: upload a PDF or image,
//! run server-side OCR, optionally rewrite the text with an AI prompt, then
//! download the result as Markdown or plain text.
//!
//! ## Why this crate?
//!
//! The backend does the heavy lifting (OCR inference, model calls, Markdown
//! assembly). What remains on the client is the sequencing: which step may
//! run when, what a timeout or a failed call does to the session, and when
//! server resources are released. This crate owns that state machine so a
//! UI (or the bundled `ocrwb` CLI) only has to render it.
//!
//! ## Workflow
//!
//! ```text
//! file
//!  │
//!  ├─ 1. Upload    type/size checked locally, POST /api/upload → file_id
//!  ├─ 2. OCR       POST /api/process-ocr, 5 min hard cap, 30 s liveness probe
//!  ├─ 3. Review    enhance via POST /api/enhance-with-gemini, or skip
//!  │               then POST /api/generate-markdown (optional metadata)
//!  └─ 4. Download  GET /api/download/{id}/{md|txt} → local file
//!
//! reset → DELETE /api/cleanup/{id} in the background, back to 1
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr_workbench::{ClientConfig, OutputFormat, PromptKind, StageController, UploadFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .base_url("http://localhost:8000")
//!         .language("en")
//!         .build()?;
//!     let mut ctl = StageController::with_http(config.clone())?;
//!
//!     let file = UploadFile::load("report.pdf", config.max_upload_bytes).await?;
//!     ctl.submit_upload(&file).await?;
//!     ctl.run_ocr().await?;
//!     ctl.enhance_with_ai(PromptKind::Structure, None).await?;
//!     ctl.render_outputs(None).await?;
//!     let saved = ctl.download(OutputFormat::Md, None, ".".as_ref()).await?;
//!     println!("wrote {}", saved.path.display());
//!
//!     if let Some(cleanup) = ctl.reset() {
//!         cleanup.await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocrwb` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! ocr-workbench = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod gateway;
pub mod metadata;
pub mod output;
pub mod progress;
pub mod prompts;
pub mod session;
pub mod upload;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{Backend, HttpBackend, StatusResponse};
pub use config::{ClientConfig, ClientConfigBuilder, DEFAULT_MAX_UPLOAD_BYTES};
pub use controller::StageController;
pub use error::{BackendError, ErrorKind, WorkflowError};
pub use events::{NoopObserver, NoticeLevel, SharedObserver, WorkflowObserver};
pub use gateway::{Gateway, OcrOutput};
pub use metadata::Metadata;
pub use output::{OutputFormat, RenderedOutputs, SavedFile};
pub use progress::{
    NoopProgressCallback, OcrProgressCallback, ProgressCallback, ProgressOutcome,
    ProgressSnapshot,
};
pub use prompts::{PromptEditor, PromptKind, PromptRequest};
pub use session::{RegionVisibility, Session, Stage};
pub use upload::{FileKind, UploadFile};
