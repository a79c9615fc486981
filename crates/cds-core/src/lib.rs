pub mod document;
pub mod error;
pub mod geometry;
pub mod host;
pub mod id;
pub mod migrate;
pub mod model;
pub mod resolve;
pub mod search;
pub mod value;

pub use document::{CURRENT_FORMAT, STACK_VERSION};
pub use error::{Error, Result};
pub use geometry::{Point, Rect, Size};
pub use host::{HandlerRunner, RepaintSink, ScriptValue};
pub use id::NodeId;
pub use model::*;
pub use resolve::{FsLoader, MemoryLoader, StackLoader, resolve_relative};
pub use search::{Finder, SearchOptions};
pub use value::{PropType, PropValue};

// Re-export petgraph types so downstream crates don't need a direct dependency
pub use petgraph::graph::NodeIndex;
