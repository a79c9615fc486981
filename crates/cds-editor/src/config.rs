//! Designer settings.

use serde::{Deserialize, Serialize};

/// Configuration for the stack designer.
///
/// Hosts may load it from JSON; missing fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Commands kept on the undo stack. Default: **200**.
    pub max_undo_depth: usize,

    /// Arrow-key nudge distance in points. Default: **1**.
    pub nudge_step: f64,

    /// Nudge distance with Shift held. Default: **10**.
    pub nudge_step_shift: f64,

    /// Nudge distance with Alt held. Default: **5**.
    pub nudge_step_alt: f64,

    /// Side of the square resize handle at a view's bottom-right corner.
    /// Default: **8**.
    pub resize_handle: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_undo_depth: 200,
            nudge_step: 1.0,
            nudge_step_shift: 10.0,
            nudge_step_alt: 5.0,
            resize_handle: 8.0,
        }
    }
}

impl EditorConfig {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Nudge distance for the held modifiers. Shift wins over Alt.
    pub fn nudge_for(&self, shift: bool, alt: bool) -> f64 {
        if shift {
            self.nudge_step_shift
        } else if alt {
            self.nudge_step_alt
        } else {
            self.nudge_step
        }
    }
}
