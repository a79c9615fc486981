//! Runtime settings.

use cds_editor::config::EditorConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for running stacks.
///
/// Hosts may load it from JSON; missing fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Milliseconds between `OnPeriodic` dispatches. Default: **33**.
    pub periodic_interval_ms: u64,

    /// Sleep between queue polls while waiting for scripts. Default: **1**.
    pub idle_poll_ms: u64,

    /// Settings for each frame's stack manager.
    pub editor: EditorConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            periodic_interval_ms: 33,
            idle_poll_ms: 1,
            editor: EditorConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn periodic_interval(&self) -> Duration {
        Duration::from_millis(self.periodic_interval_ms.max(1))
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_editor_settings_load() {
        let config =
            RuntimeConfig::from_json(r#"{"periodic_interval_ms": 100, "editor": {"max_undo_depth": 3}}"#)
                .unwrap();
        assert_eq!(config.periodic_interval(), Duration::from_millis(100));
        assert_eq!(config.editor.max_undo_depth, 3);
        assert_eq!(config.idle_poll_ms, 1);
    }

    #[test]
    fn zero_interval_is_clamped() {
        let config = RuntimeConfig {
            periodic_interval_ms: 0,
            ..RuntimeConfig::default()
        };
        assert_eq!(config.periodic_interval(), Duration::from_millis(1));
    }
}
