pub mod commands;
pub mod config;
pub mod input;
pub mod manager;
pub mod selection;
pub mod shortcuts;
pub mod tools;

pub use commands::{Command, Edit, History, Insertion, ViewState};
pub use config::EditorConfig;
pub use input::{InputEvent, Modifiers};
pub use manager::{ReorderDirection, StackManager};
pub use selection::Selection;
pub use shortcuts::{ShortcutAction, ShortcutMap};
pub use tools::{Tool, ToolKind, ToolState};
