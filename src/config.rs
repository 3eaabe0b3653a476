//! Client configuration.
//!
//! All client behaviour is controlled through [`ClientConfig`], built via its
//! [`ClientConfigBuilder`]. The defaults reproduce the behaviour the backend
//! was designed around: a 50 MiB upload limit, a five-minute OCR cap, a
//! 30-second liveness probe and a progress tick every two seconds.

use crate::error::WorkflowError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upload size limit enforced before any network call (50 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Configuration for a workflow client.
///
/// # Example
/// ```rust
/// use ocr_workbench::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://ocr.internal:8000")
///     .language("ch_tra")
///     .build()
///     .unwrap();
/// assert_eq!(config.ocr_timeout_secs, 300);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend root, without the `/api` suffix. Default: `http://localhost:8000`.
    pub base_url: String,

    /// Hard cap on the OCR request in seconds. Default: 300.
    ///
    /// When it elapses the in-flight request is dropped and the operation
    /// fails with [`WorkflowError::OcrTimeout`]. No other operation is
    /// cancellable.
    pub ocr_timeout_secs: u64,

    /// Interval of the diagnostic status probe during OCR. Default: 30.
    ///
    /// The probe never affects the OCR call; it only logs.
    pub probe_interval_secs: u64,

    /// Interval of the cosmetic progress timer in milliseconds. Default: 2000.
    pub progress_tick_ms: u64,

    /// Percentage added per progress tick. Default: 15.
    pub progress_step: u8,

    /// The displayed percentage never exceeds this until OCR returns. Default: 90.
    pub progress_ceiling: u8,

    /// Largest accepted upload in bytes. Default: 50 MiB.
    pub max_upload_bytes: u64,

    /// TCP connect timeout in seconds. Default: 10.
    ///
    /// Only bounds connection establishment so an absent backend is reported
    /// promptly; it never cancels an operation that is already running.
    pub connect_timeout_secs: u64,

    /// OCR language passed to the backend. Default: `en`.
    pub language: String,

    /// Ask the backend to run its text-line orientation classifier. Default: true.
    pub use_textline_orientation: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            ocr_timeout_secs: 300,
            probe_interval_secs: 30,
            progress_tick_ms: 2000,
            progress_step: 15,
            progress_ceiling: 90,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            connect_timeout_secs: 10,
            language: "en".to_string(),
            use_textline_orientation: true,
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr_timeout_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn progress_tick(&self) -> Duration {
        Duration::from_millis(self.progress_tick_ms)
    }

    /// Raise zero timers to their minimum so the OCR deadline, probe and
    /// progress intervals stay usable. `build()` rejects these values; this
    /// covers configs made as struct literals or deserialised.
    pub fn with_usable_timers(mut self) -> Self {
        self.ocr_timeout_secs = self.ocr_timeout_secs.max(1);
        self.probe_interval_secs = self.probe_interval_secs.max(1);
        self.progress_tick_ms = self.progress_tick_ms.max(1);
        self.progress_step = self.progress_step.clamp(1, 100);
        self.progress_ceiling = self.progress_ceiling.min(99);
        self
    }

    /// Join an `/api/...` path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn probe_interval_secs(mut self, secs: u64) -> Self {
        self.config.probe_interval_secs = secs;
        self
    }

    pub fn progress_tick_ms(mut self, ms: u64) -> Self {
        self.config.progress_tick_ms = ms;
        self
    }

    pub fn progress_step(mut self, step: u8) -> Self {
        self.config.progress_step = step.clamp(1, 100);
        self
    }

    pub fn progress_ceiling(mut self, pct: u8) -> Self {
        self.config.progress_ceiling = pct.min(99);
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn use_textline_orientation(mut self, v: bool) -> Self {
        self.config.use_textline_orientation = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, WorkflowError> {
        let c = &self.config;
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(WorkflowError::InvalidConfig(format!(
                "base URL must start with http:// or https://, got '{}'",
                c.base_url
            )));
        }
        if c.ocr_timeout_secs == 0 {
            return Err(WorkflowError::InvalidConfig(
                "OCR timeout must be ≥ 1 second".into(),
            ));
        }
        if c.probe_interval_secs == 0 || c.progress_tick_ms == 0 {
            return Err(WorkflowError::InvalidConfig(
                "probe and progress intervals must be non-zero".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(WorkflowError::InvalidConfig(
                "upload limit must be non-zero".into(),
            ));
        }
        if c.language.trim().is_empty() {
            return Err(WorkflowError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
