//! Error types for the ocr-workbench library.
//!
//! Two distinct error types reflect two distinct layers:
//!
//! * [`BackendError`]: what went wrong during **one HTTP exchange** with the
//!   backend: the server could not be reached, it answered with a non-2xx
//!   status or `success: false`, or the body could not be decoded. Produced
//!   by [`crate::backend::Backend`] implementations.
//!
//! * [`WorkflowError`]: what went wrong with **a workflow operation** as the
//!   user sees it (upload, OCR, enhance, render, download). Local pre-flight
//!   failures (bad file type, oversized file, missing prompt, stage
//!   violations) never touch the network; remote failures wrap the
//!   underlying [`BackendError`].
//!
//! Every [`WorkflowError`] maps onto a coarse [`ErrorKind`] so a UI layer can
//! pick an icon or colour without matching on every variant, and its
//! `Display` output is the normalised, human-readable notice text.

use crate::session::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification used by the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Local, pre-flight rejection (file type/size, missing prompt).
    Validation,
    /// The operation's prerequisite state is absent.
    Precondition,
    /// Connection-level failure: the backend could not be reached.
    NetworkUnreachable,
    /// The OCR hard timeout elapsed.
    Timeout,
    /// The backend answered but rejected the request.
    Backend,
    /// Writing a downloaded file locally failed.
    Io,
}

/// Failure of a single request/response exchange with the backend.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Connection refused, DNS failure, TLS failure, reset…
    #[error("cannot reach the backend at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    /// Non-2xx status or a `success: false` envelope.
    #[error("{detail} (HTTP {status})")]
    Rejected { status: u16, detail: String },

    /// The response body was not the JSON shape we expected.
    #[error("unexpected response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
}

impl BackendError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BackendError::Unreachable { .. } => ErrorKind::NetworkUnreachable,
            BackendError::Rejected { .. } | BackendError::Decode { .. } => ErrorKind::Backend,
        }
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, BackendError::Unreachable { .. })
    }
}

/// All errors surfaced by workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    // ── Pre-flight validation ─────────────────────────────────────────────
    /// The file is not a PDF, PNG or JPEG.
    #[error("Unsupported file type for '{name}' (accepted: PDF, PNG, JPEG)")]
    InvalidFileType { name: String },

    /// The file exceeds the configured upload limit.
    #[error("File '{name}' is too large: {size} (maximum {limit})")]
    FileTooLarge {
        name: String,
        size: String,
        limit: String,
    },

    /// Custom prompt kind selected without any prompt text.
    #[error("A custom prompt was selected but no prompt text was given")]
    MissingPrompt,

    /// The session lacks the artifact this operation needs.
    #[error("Cannot {operation}: {missing} is not available yet")]
    StageViolation {
        operation: &'static str,
        missing: &'static str,
    },

    /// Moving back would leave an artifact the lower stage cannot hold.
    #[error("Cannot go back from stage {from} to {to}: {reason}; reset instead")]
    StageRegression {
        from: Stage,
        to: Stage,
        reason: &'static str,
    },

    /// Could not read the local input file.
    #[error("Cannot read '{path}': {source}")]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Remote operations ─────────────────────────────────────────────────
    #[error("Upload failed: {0}")]
    UploadFailed(#[source] BackendError),

    /// OCR exceeded its hard timeout and the request was cancelled.
    #[error("OCR timed out after {secs}s; try a smaller file or retry later")]
    OcrTimeout { secs: u64 },

    #[error("OCR failed: {0}")]
    OcrFailed(#[source] BackendError),

    /// Connection-level failure while running OCR.
    #[error("OCR failed: cannot reach the backend ({reason})")]
    BackendUnreachable { reason: String },

    #[error("AI enhancement failed: {0}")]
    EnhanceFailed(#[source] BackendError),

    #[error("Generating Markdown failed: {0}")]
    RenderFailed(#[source] BackendError),

    #[error("Download failed: {0}")]
    DownloadFailed(#[source] BackendError),

    #[error("Status check failed: {0}")]
    StatusUnavailable(#[source] BackendError),

    // ── Local output ──────────────────────────────────────────────────────
    #[error("Failed to write '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl WorkflowError {
    /// Classify the error for presentation.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::InvalidFileType { .. }
            | WorkflowError::FileTooLarge { .. }
            | WorkflowError::MissingPrompt
            | WorkflowError::InvalidConfig(_) => ErrorKind::Validation,
            WorkflowError::StageViolation { .. } | WorkflowError::StageRegression { .. } => {
                ErrorKind::Precondition
            }
            WorkflowError::InputUnreadable { .. } | WorkflowError::OutputWriteFailed { .. } => {
                ErrorKind::Io
            }
            WorkflowError::OcrTimeout { .. } => ErrorKind::Timeout,
            WorkflowError::BackendUnreachable { .. } => ErrorKind::NetworkUnreachable,
            WorkflowError::UploadFailed(e)
            | WorkflowError::OcrFailed(e)
            | WorkflowError::EnhanceFailed(e)
            | WorkflowError::RenderFailed(e)
            | WorkflowError::DownloadFailed(e)
            | WorkflowError::StatusUnavailable(e) => e.kind(),
        }
    }

    /// True when the failure happened before any request was sent.
    pub fn is_local(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::Precondition
        ) || matches!(self, WorkflowError::InputUnreadable { .. })
    }
}
