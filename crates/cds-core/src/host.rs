//! Collaborators supplied by the host application.
//!
//! Rendering and script interpretation live outside this workspace. The
//! editor and runtime talk to them only through these traits.

use crate::geometry::Rect;
use crate::id::NodeId;

/// Values passed into and out of scripts.
pub type ScriptValue = serde_json::Value;

/// Runs a node's handler for an event.
///
/// Callers look the handler up first; `source` is the script text bound to
/// `(target, event)`.
pub trait HandlerRunner {
    /// Returns whether the handler was accepted for execution.
    fn run_handler(
        &mut self,
        target: NodeId,
        event: &str,
        source: &str,
        payload: Option<&ScriptValue>,
    ) -> bool;
}

/// Receives repaint requests after the document or selection changes.
pub trait RepaintSink {
    /// `None` asks for a full repaint.
    fn needs_repaint(&mut self, area: Option<Rect>);
}
