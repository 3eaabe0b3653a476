//! Observer trait through which the controller talks to a UI layer.
//!
//! The controller never renders anything itself. It reports stage changes
//! (with the region visibility a UI should apply) and short user-facing
//! notices, the equivalent of a transient toast. All methods have no-op
//! defaults so implementations override only what they display.

use crate::session::{RegionVisibility, Stage};
use std::sync::Arc;

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

pub trait WorkflowObserver: Send + Sync {
    /// The session moved to `stage`; show/hide regions accordingly.
    fn on_stage_changed(&self, stage: Stage, regions: RegionVisibility) {
        let _ = (stage, regions);
    }

    /// A transient message for the user.
    fn on_notice(&self, level: NoticeLevel, message: &str) {
        let _ = (level, message);
    }
}

/// Observer used when none is configured.
pub struct NoopObserver;

impl WorkflowObserver for NoopObserver {}

pub type SharedObserver = Arc<dyn WorkflowObserver>;
