//! Prompt templates for the AI enhancement step.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: the preview shown to the user and the
//!    override sent to the backend come from the same constants.
//!
//! 2. **Testability**: unit tests can inspect templates and the editor's
//!    effective request without a backend.
//!
//! The backend owns its own copy of the built-in templates, so a built-in
//! kind is sent *without* prompt text unless the user unlocked the preview
//! and edited it.

use crate::error::WorkflowError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Turn raw OCR text into well-structured Markdown.
pub const STRUCTURE_PROMPT: &str = r#"You are a professional document formatting assistant. Convert the following raw OCR text into a well-structured, easy-to-read Markdown document.

Requirements:
1. Keep all original content; do not drop any information
2. Identify headings accurately and use the right levels (# ## ###)
3. Identify and format lists (ordered or unordered)
4. Identify and format tables
5. Wrap source code in fenced code blocks
6. Split the text into paragraphs for readability
7. Keep technical terminology accurate
8. Write mathematical formulas in LaTeX ($...$)

Output the formatted Markdown directly, without any additional commentary."#;

/// Produce a concise bullet-point summary.
pub const SUMMARIZE_PROMPT: &str = r#"You are a professional summarisation assistant. Provide a concise, accurate, bullet-point summary of the following OCR-extracted content.

Requirements:
1. Extract the main points and key information
2. Present them as a list (using - or numbers)
3. Stay objective; do not add personal opinions
4. Make sure the summary is complete and accurate
5. Use clear, plain language
6. Use Markdown emphasis (bold, italic) where it helps

Output the summary directly."#;

/// Structured reading guide for an academic paper.
pub const ACADEMIC_PROMPT: &str = r#"You are a professional academic paper analysis assistant. Analyse the following paper and produce a structured reading guide.

Organise the content using this outline:

## Paper-to-Outline

### 1. Basic information
* **Title**: [paper title]
* **Translated title**: [translation, if applicable]
* **Authors**: [author list]
* **Journal / conference**: [venue]
* **Year**: [year]
* **Core theory**: [central theory]

### 2. Motivation and research problem
[background, gap and core question]

### 3. Theoretical framework
[theoretical basis, main constructs, hypotheses]

### 4. Method
[sample, design, analysis tools, reliability and validity]

### 5. Main findings
[key results]

### 6. Theoretical and practical contributions
[contributions on both sides]

### 7. Limitations and future work
[limitations and suggestions]

### 8. One-sentence conclusion
> [the core contribution in one sentence]

Fill in the outline as completely as the text allows. Mark anything that cannot be extracted from the text as [insufficient information]."#;

/// Preview text shown when the AI step is disabled.
pub const NO_AI_PREVIEW: &str = "No AI processing: the raw OCR text is used as-is.";

/// Which prompt the enhancement step uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    /// Reformat into structured Markdown. (default)
    #[default]
    Structure,
    Summarize,
    Academic,
    /// User-supplied prompt text.
    Custom,
    /// Skip the AI step entirely.
    None,
}

impl PromptKind {
    /// Wire name sent as `prompt_type`.
    pub fn as_str(self) -> &'static str {
        match self {
            PromptKind::Structure => "structure",
            PromptKind::Summarize => "summarize",
            PromptKind::Academic => "academic",
            PromptKind::Custom => "custom",
            PromptKind::None => "none",
        }
    }

    /// Built-in template, if this kind has one.
    pub fn template(self) -> Option<&'static str> {
        match self {
            PromptKind::Structure => Some(STRUCTURE_PROMPT),
            PromptKind::Summarize => Some(SUMMARIZE_PROMPT),
            PromptKind::Academic => Some(ACADEMIC_PROMPT),
            PromptKind::Custom | PromptKind::None => None,
        }
    }

    /// Whether choosing this kind results in a backend call.
    pub fn calls_backend(self) -> bool {
        self != PromptKind::None
    }
}

impl fmt::Display for PromptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "structure" => Ok(PromptKind::Structure),
            "summarize" | "summarise" => Ok(PromptKind::Summarize),
            "academic" => Ok(PromptKind::Academic),
            "custom" => Ok(PromptKind::Custom),
            "none" => Ok(PromptKind::None),
            other => Err(format!(
                "unknown prompt kind '{other}' (expected structure, summarize, academic, custom or none)"
            )),
        }
    }
}

/// What the enhancement call actually sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub kind: PromptKind,
    /// Prompt text overriding the backend's template.
    pub custom_prompt: Option<String>,
}

impl PromptRequest {
    pub fn new(kind: PromptKind, custom_prompt: Option<&str>) -> Self {
        Self {
            kind,
            custom_prompt: custom_prompt.map(str::to_string),
        }
    }

    /// Reject a `Custom` request without prompt text.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        let empty = self
            .custom_prompt
            .as_deref()
            .is_none_or(|p| p.trim().is_empty());
        if self.kind == PromptKind::Custom && empty {
            return Err(WorkflowError::MissingPrompt);
        }
        Ok(())
    }
}

/// Prompt selector with an editable preview.
///
/// Selecting a kind fills the preview with its template. The preview can be
/// edited only while `allow_edit` is on; an edited built-in preview becomes
/// the override sent to the backend.
#[derive(Debug, Clone)]
pub struct PromptEditor {
    kind: PromptKind,
    preview: String,
    allow_edit: bool,
    custom_text: String,
}

impl Default for PromptEditor {
    fn default() -> Self {
        Self::new(PromptKind::default())
    }
}

impl PromptEditor {
    pub fn new(kind: PromptKind) -> Self {
        let mut editor = Self {
            kind,
            preview: String::new(),
            allow_edit: false,
            custom_text: String::new(),
        };
        editor.select(kind);
        editor
    }

    pub fn kind(&self) -> PromptKind {
        self.kind
    }

    pub fn preview(&self) -> &str {
        &self.preview
    }

    pub fn allow_edit(&self) -> bool {
        self.allow_edit
    }

    /// Switch kind and refresh the preview.
    pub fn select(&mut self, kind: PromptKind) {
        self.kind = kind;
        self.preview = match kind {
            PromptKind::Custom => String::new(),
            PromptKind::None => NO_AI_PREVIEW.to_string(),
            builtin => builtin.template().unwrap_or_default().to_string(),
        };
    }

    pub fn set_allow_edit(&mut self, allow: bool) {
        self.allow_edit = allow;
    }

    /// Replace the preview text; refused while editing is locked.
    pub fn edit_preview(&mut self, text: impl Into<String>) -> Result<(), WorkflowError> {
        if !self.allow_edit {
            return Err(WorkflowError::InvalidConfig(
                "the prompt preview is read-only; enable editing first".into(),
            ));
        }
        self.preview = text.into();
        Ok(())
    }

    pub fn set_custom_text(&mut self, text: impl Into<String>) {
        self.custom_text = text.into();
    }

    /// The request the enhancement step should send.
    pub fn request(&self) -> PromptRequest {
        let custom_prompt = match self.kind {
            PromptKind::Custom => Some(self.custom_text.clone()),
            PromptKind::None => None,
            _ if self.allow_edit => Some(self.preview.clone()),
            _ => None,
        };
        PromptRequest {
            kind: self.kind,
            custom_prompt,
        }
    }
}
