//! Keyboard shortcut mapping.
//!
//! Maps key + modifier combos to semantic `ShortcutAction`s, shared by every
//! host. Arrow keys nudge the selection; their step depends on the
//! modifiers and is resolved against `EditorConfig` by the manager.

use crate::input::Modifiers;
use crate::tools::ToolKind;
use cds_core::model::{NodeKind, ShapeKind};

/// Which nudge distance an arrow key uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NudgeStep {
    Normal,
    Shift,
    Alt,
}

/// Actions that keyboard shortcuts can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    // ── Tools ──
    Tool(ToolKind),

    // ── Edit ──
    Undo,
    Redo,
    Delete,
    SelectAll,
    Duplicate,
    Copy,
    Cut,
    Paste,
    Group,
    Ungroup,
    Nudge { dx: i8, dy: i8, step: NudgeStep },

    // ── Cards ──
    NewCard,
    NextCard,
    PrevCard,

    // ── Z-order ──
    SendBackward,
    BringForward,
    SendToBack,
    BringToFront,

    // ── Mode ──
    Deselect,
    ToggleEditing,
}

/// Resolves key events into shortcut actions.
///
/// On macOS `meta` is ⌘, on other platforms `ctrl` serves the same role.
pub struct ShortcutMap;

impl ShortcutMap {
    /// Resolve a key event to an action. Returns `None` if the combo has no
    /// binding.
    pub fn resolve(key: &str, modifiers: Modifiers) -> Option<ShortcutAction> {
        let cmd = modifiers.command();
        let shift = modifiers.shift;

        if let Some((dx, dy)) = arrow(key)
            && !cmd
        {
            let step = if shift {
                NudgeStep::Shift
            } else if modifiers.alt {
                NudgeStep::Alt
            } else {
                NudgeStep::Normal
            };
            return Some(ShortcutAction::Nudge { dx, dy, step });
        }

        // ── Modifier combos first (most specific) ──
        if cmd && shift {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Redo),
                "g" | "G" => Some(ShortcutAction::Ungroup),
                "[" => Some(ShortcutAction::SendToBack),
                "]" => Some(ShortcutAction::BringToFront),
                _ => None,
            };
        }

        if cmd {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Undo),
                "y" | "Y" => Some(ShortcutAction::Redo),
                "a" | "A" => Some(ShortcutAction::SelectAll),
                "d" | "D" => Some(ShortcutAction::Duplicate),
                "c" | "C" => Some(ShortcutAction::Copy),
                "x" | "X" => Some(ShortcutAction::Cut),
                "v" | "V" => Some(ShortcutAction::Paste),
                "g" | "G" => Some(ShortcutAction::Group),
                "n" | "N" => Some(ShortcutAction::NewCard),
                "e" | "E" => Some(ShortcutAction::ToggleEditing),
                "[" => Some(ShortcutAction::SendBackward),
                "]" => Some(ShortcutAction::BringForward),
                "ArrowRight" | "PageDown" => Some(ShortcutAction::NextCard),
                "ArrowLeft" | "PageUp" => Some(ShortcutAction::PrevCard),
                _ => None,
            };
        }

        if shift {
            return None;
        }

        // ── Single keys (no modifiers) ──
        let tool = |kind| Some(ShortcutAction::Tool(kind));
        match key {
            "h" | "H" => tool(ToolKind::Hand),
            "b" | "B" => tool(ToolKind::Create(NodeKind::Button)),
            "f" | "F" => tool(ToolKind::Create(NodeKind::Field)),
            "t" | "T" => tool(ToolKind::Create(NodeKind::Label)),
            "i" | "I" => tool(ToolKind::Create(NodeKind::Image)),
            "p" | "P" => tool(ToolKind::Create(NodeKind::Shape(ShapeKind::Pen))),
            "l" | "L" => tool(ToolKind::Create(NodeKind::Shape(ShapeKind::Line))),
            "o" | "O" => tool(ToolKind::Create(NodeKind::Shape(ShapeKind::Oval))),
            "r" | "R" => tool(ToolKind::Create(NodeKind::Shape(ShapeKind::Rect))),
            "d" | "D" => tool(ToolKind::Create(NodeKind::Shape(ShapeKind::RoundRect))),
            "Delete" | "Backspace" => Some(ShortcutAction::Delete),
            "Escape" => Some(ShortcutAction::Deselect),
            _ => None,
        }
    }
}

fn arrow(key: &str) -> Option<(i8, i8)> {
    match key {
        "ArrowLeft" => Some((-1, 0)),
        "ArrowRight" => Some((1, 0)),
        "ArrowUp" => Some((0, -1)),
        "ArrowDown" => Some((0, 1)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd() -> Modifiers {
        Modifiers {
            meta: true,
            ..Modifiers::NONE
        }
    }

    fn cmd_shift() -> Modifiers {
        Modifiers {
            meta: true,
            shift: true,
            ..Modifiers::NONE
        }
    }

    #[test]
    fn resolve_tool_shortcuts() {
        assert_eq!(
            ShortcutMap::resolve("h", Modifiers::NONE),
            Some(ShortcutAction::Tool(ToolKind::Hand))
        );
        assert_eq!(
            ShortcutMap::resolve("b", Modifiers::NONE),
            Some(ShortcutAction::Tool(ToolKind::Create(NodeKind::Button)))
        );
        assert_eq!(
            ShortcutMap::resolve("o", Modifiers::NONE),
            Some(ShortcutAction::Tool(ToolKind::Create(NodeKind::Shape(
                ShapeKind::Oval
            ))))
        );
    }

    #[test]
    fn resolve_undo_redo() {
        assert_eq!(ShortcutMap::resolve("z", cmd()), Some(ShortcutAction::Undo));
        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::NONE
        };
        assert_eq!(ShortcutMap::resolve("z", ctrl), Some(ShortcutAction::Undo));
        assert_eq!(
            ShortcutMap::resolve("z", cmd_shift()),
            Some(ShortcutAction::Redo)
        );
        assert_eq!(ShortcutMap::resolve("y", cmd()), Some(ShortcutAction::Redo));
    }

    #[test]
    fn resolve_grouping_and_z_order() {
        assert_eq!(ShortcutMap::resolve("g", cmd()), Some(ShortcutAction::Group));
        assert_eq!(
            ShortcutMap::resolve("g", cmd_shift()),
            Some(ShortcutAction::Ungroup)
        );
        assert_eq!(
            ShortcutMap::resolve("[", cmd()),
            Some(ShortcutAction::SendBackward)
        );
        assert_eq!(
            ShortcutMap::resolve("]", cmd_shift()),
            Some(ShortcutAction::BringToFront)
        );
    }

    #[test]
    fn arrows_nudge_with_modifier_steps() {
        assert_eq!(
            ShortcutMap::resolve("ArrowLeft", Modifiers::NONE),
            Some(ShortcutAction::Nudge {
                dx: -1,
                dy: 0,
                step: NudgeStep::Normal
            })
        );
        assert_eq!(
            ShortcutMap::resolve("ArrowDown", Modifiers::shift()),
            Some(ShortcutAction::Nudge {
                dx: 0,
                dy: 1,
                step: NudgeStep::Shift
            })
        );
        assert_eq!(
            ShortcutMap::resolve("ArrowRight", cmd()),
            Some(ShortcutAction::NextCard)
        );
    }

    #[test]
    fn resolve_unknown_key() {
        assert_eq!(ShortcutMap::resolve("q", Modifiers::NONE), None);
        assert_eq!(ShortcutMap::resolve("z", Modifiers::NONE), None);
        assert_eq!(ShortcutMap::resolve("b", Modifiers::shift()), None);
    }
}
