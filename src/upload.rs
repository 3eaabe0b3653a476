//! Upload input: load a local document and validate it before any request.
//!
//! The backend re-validates everything; these checks only spare a round
//! trip for files it would reject anyway. A file is accepted when
//!
//! 1. its extension names a PDF, PNG or JPEG,
//! 2. its leading bytes agree with that extension (`%PDF` within the first
//!    KiB, PNG or JPEG signature), and
//! 3. its size does not exceed the configured limit (50 MiB by default).
//!
//! The size check runs on file metadata first, so an oversized file is
//! rejected without being read into memory.

use crate::error::WorkflowError;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

const PDF_MAGIC: &[u8] = b"%PDF";

/// How far into a file the PDF header may start.
pub const PDF_HEADER_WINDOW: usize = 1024;

/// Document types the backend can OCR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Pdf,
    Png,
    Jpeg,
}

impl FileKind {
    /// Kind implied by the file name's extension (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(FileKind::Pdf),
            "png" => Some(FileKind::Png),
            "jpg" | "jpeg" => Some(FileKind::Jpeg),
            _ => None,
        }
    }

    /// Kind implied by the leading bytes of the content.
    ///
    /// PDF readers accept the `%PDF` header anywhere in the first
    /// [`PDF_HEADER_WINDOW`] bytes, so a BOM or other prefix is tolerated.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match image::guess_format(bytes) {
            Ok(ImageFormat::Png) => return Some(FileKind::Png),
            Ok(ImageFormat::Jpeg) => return Some(FileKind::Jpeg),
            _ => {}
        }
        let head = &bytes[..bytes.len().min(PDF_HEADER_WINDOW)];
        head.windows(PDF_MAGIC.len())
            .any(|w| w == PDF_MAGIC)
            .then_some(FileKind::Pdf)
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            FileKind::Pdf => "application/pdf",
            FileKind::Png => "image/png",
            FileKind::Jpeg => "image/jpeg",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileKind::Pdf => "PDF",
            FileKind::Png => "PNG",
            FileKind::Jpeg => "JPEG",
        })
    }
}

/// A document ready to be uploaded.
#[derive(Clone)]
pub struct UploadFile {
    name: String,
    size: u64,
    bytes: Vec<u8>,
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl UploadFile {
    /// Wrap in-memory content under a display name.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            bytes,
        }
    }

    /// Read a local file, rejecting it on size before reading its content.
    pub async fn load(path: impl AsRef<Path>, max_bytes: u64) -> Result<Self, WorkflowError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|source| WorkflowError::InputUnreadable {
                path: path.to_path_buf(),
                source,
            })?;
        check_size(&name, meta.len(), max_bytes)?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| WorkflowError::InputUnreadable {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("Loaded {} ({})", name, format_file_size(bytes.len() as u64));
        Ok(Self::from_bytes(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Validate type and size; returns the detected kind.
    pub fn validate(&self, max_bytes: u64) -> Result<FileKind, WorkflowError> {
        let invalid = || WorkflowError::InvalidFileType {
            name: self.name.clone(),
        };
        let declared = FileKind::from_name(&self.name).ok_or_else(invalid)?;
        if FileKind::sniff(&self.bytes) != Some(declared) {
            return Err(invalid());
        }
        check_size(&self.name, self.size, max_bytes)?;
        Ok(declared)
    }
}

fn check_size(name: &str, size: u64, max_bytes: u64) -> Result<(), WorkflowError> {
    if size > max_bytes {
        return Err(WorkflowError::FileTooLarge {
            name: name.to_string(),
            size: format_file_size(size),
            limit: format_file_size(max_bytes),
        });
    }
    Ok(())
}

/// Human-readable size: `0 Bytes`, `1.5 KB`, `2 MB`, …
///
/// Values are rounded to two decimals with trailing zeros dropped.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
