//! Stack file resolution and loading.
//!
//! The model never touches the filesystem on its own: hosts hand a
//! `StackLoader` to whoever needs to open another stack (nested calls, the
//! CLI). Relative targets resolve against the directory of the document
//! that names them.

use crate::document;
use crate::error::{Error, Result};
use crate::model::StackGraph;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

// ─── Loader trait ────────────────────────────────────────────────────────

/// Reads stack documents by path.
///
/// Implemented per host:
/// - desktop / CLI: reads from disk ([`FsLoader`])
/// - tests and embedders: serves documents from memory ([`MemoryLoader`])
pub trait StackLoader: Send + Sync {
    /// Raw bytes of the document at `path`.
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Read and decode (migrating if needed) the document at `path`.
    fn load(&self, path: &Path) -> Result<StackGraph> {
        let bytes = self.read(path)?;
        document::from_slice(&bytes)
    }
}

/// Resolve `target` against the document at `base`.
///
/// Absolute targets are returned unchanged. Relative targets are joined to
/// the directory containing `base`; without a base they stay relative.
pub fn resolve_relative(base: Option<&Path>, target: &str) -> PathBuf {
    let target = Path::new(target);
    if target.is_absolute() {
        return target.to_path_buf();
    }
    match base.and_then(Path::parent) {
        Some(dir) => dir.join(target),
        None => target.to_path_buf(),
    }
}

// ─── Loaders ─────────────────────────────────────────────────────────────

/// Loads documents from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLoader;

impl StackLoader for FsLoader {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(std::fs::read(path)?)
    }
}

/// Serves documents from an in-memory map. Clones share the same map.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    files: Arc<RwLock<HashMap<PathBuf, Vec<u8>>>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(path.into(), contents.into());
        }
    }

    /// Store `graph` serialized at `path`.
    pub fn insert_stack(&self, path: impl Into<PathBuf>, graph: &StackGraph) -> Result<()> {
        self.insert(path, document::to_string(graph)?);
        Ok(())
    }
}

impl StackLoader for MemoryLoader {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let files = self
            .files
            .read()
            .map_err(|_| Error::invalid("memory loader lock poisoned"))?;
        files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("stack file {}", path.display())))
    }
}
