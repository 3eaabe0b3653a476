//! Output types: download formats, rendered artifacts and local saving.

use crate::error::WorkflowError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Download formats offered by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Md,
    Txt,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 2] = [OutputFormat::Md, OutputFormat::Txt];

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Md => "md",
            OutputFormat::Txt => "txt",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "md" | "markdown" => Ok(OutputFormat::Md),
            "txt" | "text" => Ok(OutputFormat::Txt),
            other => Err(format!("unsupported format '{other}' (expected md or txt)")),
        }
    }
}

/// The two artifacts produced by the render step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedOutputs {
    pub markdown: String,
    pub plain_text: String,
}

/// A file written by a download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedFile {
    pub path: PathBuf,
    pub format: OutputFormat,
    pub bytes: usize,
}

static RE_EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.[^/.]+$").unwrap());
static RE_UNSAFE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f]+"#).unwrap());

/// Fallback download name when nothing better is known.
pub const DEFAULT_DOWNLOAD_NAME: &str = "document";

/// Default download name: the uploaded file name without its extension.
///
/// `report.pdf` → `report`, `archive.tar.gz` → `archive.tar`.
pub fn default_download_name(uploaded: Option<&str>) -> String {
    let stem = uploaded
        .map(|name| RE_EXTENSION.replace(name, "").into_owned())
        .unwrap_or_default();
    sanitize_filename(&stem)
}

/// Strip path separators and control characters; never returns an empty name.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned = RE_UNSAFE.replace_all(name.trim(), "_");
    let cleaned = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if cleaned.is_empty() {
        DEFAULT_DOWNLOAD_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Write `bytes` to `dir/<name>.<ext>` atomically.
///
/// The content lands in a temp file inside `dir` first and is renamed into
/// place, so an interrupted download never leaves a truncated file behind.
pub fn save_download(
    dir: &Path,
    name: &str,
    format: OutputFormat,
    bytes: &[u8],
) -> Result<SavedFile, WorkflowError> {
    let path = dir.join(format!("{}.{}", sanitize_filename(name), format.extension()));
    let write_err = |source| WorkflowError::OutputWriteFailed {
        path: path.clone(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(write_err)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.persist(&path).map_err(|e| write_err(e.error))?;

    info!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(SavedFile {
        path,
        format,
        bytes: bytes.len(),
    })
}
