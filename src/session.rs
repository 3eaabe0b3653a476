//! Session state: one document's journey through the four stages.
//!
//! ```text
//! Upload ──▶ Ocr ──▶ Review ──▶ Download
//!   1         2        3           4
//! ```
//!
//! The session is plain data. Only [`crate::controller::StageController`]
//! mutates it, so the invariants below hold after every command:
//!
//! * `file_id` set ⇒ stage ≥ [`Stage::Ocr`]
//! * `raw_text` set ⇒ stage ≥ [`Stage::Review`]
//! * `rendered_markdown` set ⇒ stage = [`Stage::Download`]

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four sequential workflow phases.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Stage {
    /// Waiting for a file.
    #[default]
    Upload = 1,
    /// File uploaded; OCR may run.
    Ocr = 2,
    /// Raw text available; review, enhance or skip.
    Review = 3,
    /// Rendered artifacts available for download.
    Download = 4,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Upload, Stage::Ocr, Stage::Review, Stage::Download];

    /// 1-based position of the stage.
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Upload => "upload",
            Stage::Ocr => "OCR",
            Stage::Review => "review",
            Stage::Download => "download",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.label())
    }
}

/// Which stage regions a UI should show/enable.
///
/// Monotonic: every region up to and including the current stage is
/// visible, every later one hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionVisibility {
    current: Stage,
}

impl RegionVisibility {
    pub fn for_stage(current: Stage) -> Self {
        Self { current }
    }

    pub fn is_visible(&self, region: Stage) -> bool {
        region <= self.current
    }

    /// `[upload, ocr, review, download]` visibility flags.
    pub fn flags(&self) -> [bool; 4] {
        Stage::ALL.map(|s| self.is_visible(s))
    }
}

/// Mutable state of the current document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub file_id: Option<String>,
    pub filename: Option<String>,
    pub raw_text: Option<String>,
    pub processed_text: Option<String>,
    pub rendered_markdown: Option<String>,
    pub rendered_plain_text: Option<String>,
    /// Server-reported OCR processing time of the last run, in seconds.
    pub ocr_seconds: Option<f64>,
    pub stage: Stage,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when nothing has been uploaded yet (or after a reset).
    pub fn is_pristine(&self) -> bool {
        *self == Self::default()
    }

    pub fn visibility(&self) -> RegionVisibility {
        RegionVisibility::for_stage(self.stage)
    }

    /// Drop OCR output and everything derived from it.
    pub(crate) fn clear_text(&mut self) {
        self.raw_text = None;
        self.ocr_seconds = None;
        self.clear_processed();
    }

    /// Drop the processed text and the renders derived from it.
    pub(crate) fn clear_processed(&mut self) {
        self.processed_text = None;
        self.clear_renders();
    }

    pub(crate) fn clear_renders(&mut self) {
        self.rendered_markdown = None;
        self.rendered_plain_text = None;
    }

    /// Check the stage invariants; returns the first one violated.
    pub fn check_invariants(&self) -> Result<(), &'static str> {
        if self.file_id.is_some() && self.stage < Stage::Ocr {
            return Err("file_id set before the OCR stage");
        }
        if self.raw_text.is_some() && self.stage < Stage::Review {
            return Err("raw_text set before the review stage");
        }
        if self.processed_text.is_some() && self.raw_text.is_none() {
            return Err("processed_text set without raw_text");
        }
        if self.rendered_markdown.is_some() && self.stage != Stage::Download {
            return Err("rendered_markdown set outside the download stage");
        }
        Ok(())
    }
}
