//! Selection and focus tracking.
//!
//! The selection is ordered: the first entry anchors z-order moves. A
//! selection never mixes a card with views, and never mixes a group's
//! children with anything outside that group; extending across those scopes
//! starts a new single selection instead.

use cds_core::id::NodeId;
use cds_core::model::{NodeKind, StackGraph};
use smallvec::SmallVec;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    ids: SmallVec<[NodeId; 4]>,
    /// Last text field that had keyboard focus.
    focused_field: Option<NodeId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &[NodeId] {
        &self.ids
    }

    pub fn first(&self) -> Option<NodeId> {
        self.ids.first().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.ids.contains(&id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Select `id`, or with `extend` toggle it within the current selection.
    /// `None` with `extend == false` clears the selection.
    pub fn select(&mut self, graph: &StackGraph, id: Option<NodeId>, extend: bool) {
        let mut extend = extend;
        let in_group = |n: NodeId| {
            graph
                .parent_of(n)
                .and_then(|p| graph.kind(p))
                .is_some_and(|k| k == NodeKind::Group)
        };
        let is_card = |n: NodeId| graph.kind(n) == Some(NodeKind::Card);

        if extend && id.is_some_and(in_group) {
            extend = false;
        }
        if extend && self.first().is_some_and(in_group) {
            extend = false;
        }
        if extend
            && let Some(id) = id
            && is_card(id) != self.first().is_some_and(is_card)
        {
            extend = false;
        }
        if !extend {
            self.ids.clear();
        }
        if let Some(id) = id {
            if extend && self.contains(id) {
                self.ids.retain(|s| *s != id);
            } else {
                self.ids.push(id);
            }
        }
    }

    /// Replace the selection wholesale, e.g. when restoring after undo.
    /// Ids no longer in `graph` are dropped.
    pub fn restore(&mut self, graph: &StackGraph, ids: &[NodeId]) {
        self.ids = ids.iter().copied().filter(|id| graph.contains(*id)).collect();
    }

    /// Deselect `id` and anything below it; clears focus if it pointed there.
    /// Returns whether anything was deselected.
    pub fn forget_subtree(&mut self, graph: &StackGraph, id: NodeId) -> bool {
        let doomed: SmallVec<[NodeId; 8]> = std::iter::once(id)
            .chain(
                graph
                    .index_of(id)
                    .map(|idx| graph.descendants(idx))
                    .unwrap_or_default()
                    .into_iter()
                    .map(|idx| graph.node(idx).id),
            )
            .collect();
        let before = self.ids.len();
        self.ids.retain(|s| !doomed.contains(s));
        if self.focused_field.is_some_and(|f| doomed.contains(&f)) {
            self.focused_field = None;
        }
        before != self.ids.len()
    }

    pub fn focused_field(&self) -> Option<NodeId> {
        self.focused_field
    }

    /// Record keyboard focus. Only text fields can hold focus.
    pub fn set_focused_field(&mut self, graph: &StackGraph, id: Option<NodeId>) {
        self.focused_field = id.filter(|&f| graph.kind(f) == Some(NodeKind::Field));
    }

    pub fn clear_focus(&mut self) {
        self.focused_field = None;
    }

    pub fn snapshot(&self) -> SmallVec<[NodeId; 4]> {
        self.ids.clone()
    }
}
