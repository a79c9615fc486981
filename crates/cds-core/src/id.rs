use lasso::{Spur, ThreadedRodeo};
use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide interner backing every `NodeId`.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// Monotonic counter for freshly minted ids.
static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a node inside a stack document.
///
/// Names are user-facing and may change; a `NodeId` never does. Commands
/// address nodes by id so a node removed and later restored by undo is the
/// same node. Ids are not part of the saved document: every load mints new
/// ones.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Spur);

impl NodeId {
    /// Mint a new id tagged with the node's type, e.g. `button#42`.
    pub fn fresh(tag: &str) -> Self {
        let n = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        NodeId(INTERNER.get_or_intern(format!("{tag}#{n}")))
    }

    /// Look up (or create) an id from its textual form.
    pub fn intern(s: &str) -> Self {
        NodeId(INTERNER.get_or_intern(s))
    }

    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.as_str())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
