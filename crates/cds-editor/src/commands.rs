//! Reversible edits and the undo/redo history.
//!
//! Every mutation is an `Edit`. Applying an edit returns its exact inverse,
//! computed from state captured before the mutation. Commands pair the
//! forward edit with that inverse; undo applies the inverse, redo re-applies
//! the forward edit.
//!
//! Drag gestures are batched: every edit applied between `begin_batch()`
//! and `end_batch()` is applied live and recorded as one command.

use cds_core::error::{Error, Result};
use cds_core::geometry::{Point, Rect};
use cds_core::id::NodeId;
use cds_core::model::{Node, NodeKind, StackGraph, Subtree};
use cds_core::value::PropValue;
use smallvec::SmallVec;

/// Where a subtree goes: `index`-th child of `parent`.
#[derive(Debug, Clone, PartialEq)]
pub struct Insertion {
    pub parent: NodeId,
    pub index: usize,
    pub subtree: Subtree,
}

/// A reversible document mutation. Edits naming several nodes apply to all
/// of them or to none.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// Insert subtrees in order.
    InsertNodes(Vec<Insertion>),
    /// Remove nodes (and their subtrees) in order.
    RemoveNodes(Vec<NodeId>),
    /// Translate views by a delta.
    MoveViews { ids: Vec<NodeId>, dx: f64, dy: f64 },
    /// Set each view's frame (position and size).
    ResizeViews(Vec<(NodeId, Rect)>),
    SetProperties(Vec<(NodeId, String, PropValue)>),
    /// Set handler sources; an empty source removes the handler.
    SetHandlers(Vec<(NodeId, String, String)>),
    ReorderChildren { parent: NodeId, order: Vec<NodeId> },
    /// Wrap sibling views in a new group named `name` with id `group`.
    GroupViews {
        parent: NodeId,
        ids: Vec<NodeId>,
        group: NodeId,
        name: String,
    },
    /// Replace a group by its children, keeping their card positions.
    UngroupViews { group: NodeId },
    Batch(Vec<Edit>),
}

impl Edit {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::InsertNodes(v) => v.is_empty(),
            Self::RemoveNodes(v) => v.is_empty(),
            Self::MoveViews { ids, dx, dy } => ids.is_empty() || (*dx == 0.0 && *dy == 0.0),
            Self::ResizeViews(v) => v.is_empty(),
            Self::SetProperties(v) => v.is_empty(),
            Self::SetHandlers(v) => v.is_empty(),
            Self::Batch(v) => v.iter().all(Edit::is_empty),
            Self::ReorderChildren { .. } | Self::GroupViews { .. } | Self::UngroupViews { .. } => {
                false
            }
        }
    }
}

// ─── Apply ───────────────────────────────────────────────────────────────

/// Apply `edit` to `graph`, returning the edit that undoes it.
///
/// On error the document is left as it was before the call.
pub fn apply(graph: &mut StackGraph, edit: &Edit) -> Result<Edit> {
    match edit {
        Edit::InsertNodes(items) => {
            let mut done = Vec::with_capacity(items.len());
            for item in items {
                match graph.insert_child(item.parent, item.subtree.clone(), item.index) {
                    Ok(_) => done.push(item.subtree.id()),
                    Err(e) => {
                        rollback(graph, vec![Edit::RemoveNodes(done)]);
                        return Err(e);
                    }
                }
            }
            done.reverse();
            Ok(Edit::RemoveNodes(done))
        }
        Edit::RemoveNodes(ids) => {
            let mut undo = Vec::with_capacity(ids.len());
            for &id in ids {
                match graph.remove(id) {
                    Ok((parent, index, subtree)) => undo.push(Insertion {
                        parent,
                        index,
                        subtree,
                    }),
                    Err(e) => {
                        undo.reverse();
                        rollback(graph, vec![Edit::InsertNodes(undo)]);
                        return Err(e);
                    }
                }
            }
            undo.reverse();
            Ok(Edit::InsertNodes(undo))
        }
        Edit::MoveViews { ids, dx, dy } => {
            // Undo restores the captured absolute positions.
            let moves = ids
                .iter()
                .map(|&id| {
                    view_position(graph, id).map(|p| {
                        (id, "position".to_string(), PropValue::Point(p.offset(*dx, *dy)))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            apply(graph, &Edit::SetProperties(moves))
        }
        Edit::ResizeViews(frames) => {
            let mut old = Vec::with_capacity(frames.len());
            for (id, frame) in frames {
                if frame.width < 0.0 || frame.height < 0.0 {
                    return Err(Error::invalid("size must not be negative"));
                }
                let node = graph
                    .get(*id)
                    .filter(|n| n.kind.has_geometry())
                    .ok_or_else(|| Error::not_found(format!("view {id}")))?;
                old.push((*id, node.frame()));
            }
            for (id, frame) in frames {
                graph.set_property(*id, "position", PropValue::Point(frame.origin()))?;
                graph.set_property(*id, "size", PropValue::Size(frame.size()))?;
            }
            old.reverse();
            Ok(Edit::ResizeViews(old))
        }
        Edit::SetProperties(changes) => {
            let mut old = Vec::with_capacity(changes.len());
            for (id, key, value) in changes {
                match graph.set_property(*id, key, value.clone()) {
                    Ok(prev) => old.push((*id, key.clone(), prev)),
                    Err(e) => {
                        old.reverse();
                        rollback(graph, vec![Edit::SetProperties(old)]);
                        return Err(e);
                    }
                }
            }
            old.reverse();
            Ok(Edit::SetProperties(old))
        }
        Edit::SetHandlers(changes) => {
            let mut old = Vec::with_capacity(changes.len());
            for (id, event, source) in changes {
                match graph.set_handler(*id, event, source) {
                    Ok(prev) => old.push((*id, event.clone(), prev.unwrap_or_default())),
                    Err(e) => {
                        old.reverse();
                        rollback(graph, vec![Edit::SetHandlers(old)]);
                        return Err(e);
                    }
                }
            }
            old.reverse();
            Ok(Edit::SetHandlers(old))
        }
        Edit::ReorderChildren { parent, order } => {
            let old = graph.reorder_children(*parent, order)?;
            Ok(Edit::ReorderChildren {
                parent: *parent,
                order: old,
            })
        }
        Edit::GroupViews {
            parent,
            ids,
            group,
            name,
        } => group_views(graph, *parent, ids, *group, name),
        Edit::UngroupViews { group } => ungroup_view(graph, *group),
        Edit::Batch(edits) => {
            let mut inverses = Vec::with_capacity(edits.len());
            for edit in edits {
                match apply(graph, edit) {
                    Ok(inverse) => inverses.push(inverse),
                    Err(e) => {
                        inverses.reverse();
                        rollback(graph, inverses);
                        return Err(e);
                    }
                }
            }
            inverses.reverse();
            Ok(Edit::Batch(inverses))
        }
    }
}

/// Undo partially applied work. Inverses of edits that just succeeded
/// cannot fail, so errors here are only logged.
fn rollback(graph: &mut StackGraph, inverses: Vec<Edit>) {
    for inverse in inverses {
        if let Err(e) = apply(graph, &inverse) {
            log::warn!("rollback failed: {e}");
        }
    }
}

fn view_position(graph: &StackGraph, id: NodeId) -> Result<Point> {
    graph
        .get(id)
        .filter(|n| n.kind.has_geometry())
        .map(Node::position)
        .ok_or_else(|| Error::not_found(format!("view {id}")))
}

fn group_views(
    graph: &mut StackGraph,
    parent: NodeId,
    ids: &[NodeId],
    group: NodeId,
    name: &str,
) -> Result<Edit> {
    if ids.len() < 2 {
        return Err(Error::invalid("grouping needs at least two views"));
    }
    let siblings = graph.child_ids(parent);
    let mut members: SmallVec<[(usize, NodeId); 8]> = SmallVec::new();
    for &id in ids {
        let index = siblings
            .iter()
            .position(|&s| s == id)
            .ok_or_else(|| Error::not_found(format!("{id} is not a child of {parent}")))?;
        if members.iter().any(|&(_, m)| m == id) {
            return Err(Error::invalid(format!("{id} listed twice")));
        }
        members.push((index, id));
    }
    members.sort_by_key(|&(index, _)| index);
    let insert_at = members[0].0;

    let mut removed = Vec::with_capacity(members.len());
    for &(_, id) in members.iter().rev() {
        removed.push(graph.remove_child(parent, id)?);
    }
    removed.reverse();

    let mut node = Node::named(NodeKind::Group, name);
    node.id = group;
    let mut subtree = Subtree::leaf(node);
    subtree.children = removed.clone();

    let originals: Vec<Insertion> = members
        .iter()
        .zip(removed)
        .map(|(&(index, _), subtree)| Insertion {
            parent,
            index,
            subtree,
        })
        .collect();

    if let Err(e) = graph.insert_child(parent, subtree, insert_at) {
        rollback(graph, vec![Edit::InsertNodes(originals)]);
        return Err(e);
    }
    graph.fit_group_to_children(group)?;
    Ok(Edit::Batch(vec![
        Edit::RemoveNodes(vec![group]),
        Edit::InsertNodes(originals),
    ]))
}

fn ungroup_view(graph: &mut StackGraph, group: NodeId) -> Result<Edit> {
    if graph.kind(group) != Some(NodeKind::Group) {
        return Err(Error::invalid(format!("{group} is not a group")));
    }
    let (parent, index, snapshot) = graph.remove(group)?;
    let origin = snapshot.node.position();

    let sibling_names = graph.sibling_names(parent);
    let mut clashes = snapshot
        .children
        .iter()
        .filter(|c| sibling_names.iter().any(|n| n == c.name()));
    if let Some(clash) = clashes.next() {
        let name = clash.name().to_string();
        rollback(
            graph,
            vec![Edit::InsertNodes(vec![Insertion {
                parent,
                index,
                subtree: snapshot,
            }])],
        );
        return Err(Error::invalid(format!(
            "ungrouping would duplicate the name '{name}'"
        )));
    }

    let mut children_ids = Vec::with_capacity(snapshot.children.len());
    for (offset, child) in snapshot.children.iter().enumerate() {
        let mut child = child.clone();
        let pos = child.node.position().offset(origin.x, origin.y);
        child.node.set("position", PropValue::Point(pos))?;
        children_ids.push(child.id());
        graph.insert_child(parent, child, index + offset)?;
    }
    children_ids.reverse();
    Ok(Edit::Batch(vec![
        Edit::RemoveNodes(children_ids),
        Edit::InsertNodes(vec![Insertion {
            parent,
            index,
            subtree: snapshot,
        }]),
    ]))
}

// ─── History ─────────────────────────────────────────────────────────────

/// Selection and active card, recorded on each side of a command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub selection: SmallVec<[NodeId; 4]>,
    pub card_index: usize,
}

/// Identifies the document state reached through the history: the newest
/// applied command, or the newest one dropped off the bottom.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Revision(Option<u64>);

/// A recorded edit with its inverse.
#[derive(Debug, Clone)]
pub struct Command {
    pub forward: Edit,
    pub inverse: Edit,
    pub description: String,
    pub before: ViewState,
    pub after: ViewState,
    seq: u64,
}

struct PendingBatch {
    description: String,
    before: ViewState,
    forwards: Vec<Edit>,
    inverses: Vec<Edit>,
}

/// Linear undo/redo history with batch grouping for gestures.
pub struct History {
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
    /// Maximum undo depth; the oldest command is dropped beyond it.
    max_depth: usize,
    /// Batch nesting depth (0 = not batching).
    batch_depth: usize,
    batch: Option<PendingBatch>,
    next_seq: u64,
    /// Sequence number of the newest command dropped for depth.
    dropped: Option<u64>,
}

impl History {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::with_capacity(max_depth.min(64)),
            redo_stack: Vec::new(),
            max_depth: max_depth.max(1),
            batch_depth: 0,
            batch: None,
            next_seq: 1,
            dropped: None,
        }
    }

    /// Apply `edit` and record it. Any redo branch is discarded.
    ///
    /// Inside a batch the edit is applied live and folded into the batch.
    pub fn submit(
        &mut self,
        graph: &mut StackGraph,
        edit: Edit,
        description: &str,
        before: ViewState,
        after: ViewState,
    ) -> Result<()> {
        let inverse = apply(graph, &edit)?;
        if let Some(batch) = self.batch.as_mut() {
            batch.forwards.push(edit);
            batch.inverses.push(inverse);
            return Ok(());
        }
        log::debug!("submit: {description}");
        self.push(Command {
            forward: edit,
            inverse,
            description: description.to_string(),
            before,
            after,
            seq: 0,
        });
        Ok(())
    }

    /// Apply `edit` once without recording it.
    pub fn submit_unrecorded(&mut self, graph: &mut StackGraph, edit: &Edit) -> Result<()> {
        apply(graph, edit).map(|_| ())
    }

    fn push(&mut self, mut cmd: Command) {
        cmd.seq = self.next_seq;
        self.next_seq += 1;
        self.undo_stack.push(cmd);
        if self.undo_stack.len() > self.max_depth {
            let oldest = self.undo_stack.remove(0);
            self.dropped = Some(oldest.seq);
        }
        self.redo_stack.clear();
    }

    /// Start a batch group. Nested calls join the outermost batch.
    pub fn begin_batch(&mut self, description: &str, before: ViewState) {
        if self.batch_depth == 0 {
            self.batch = Some(PendingBatch {
                description: description.to_string(),
                before,
                forwards: Vec::new(),
                inverses: Vec::new(),
            });
        }
        self.batch_depth += 1;
    }

    /// End a batch group. When the outermost batch closes and anything was
    /// applied, one command is recorded.
    pub fn end_batch(&mut self, after: ViewState) {
        if self.batch_depth == 0 {
            return;
        }
        self.batch_depth -= 1;
        if self.batch_depth > 0 {
            return;
        }
        let Some(mut batch) = self.batch.take() else {
            return;
        };
        if batch.forwards.is_empty() {
            return;
        }
        batch.inverses.reverse();
        log::debug!("submit batch: {}", batch.description);
        self.push(Command {
            forward: Edit::Batch(batch.forwards),
            inverse: Edit::Batch(batch.inverses),
            description: batch.description,
            before: batch.before,
            after,
            seq: 0,
        });
    }

    pub fn in_batch(&self) -> bool {
        self.batch_depth > 0
    }

    /// A batch is open and has applied at least one edit.
    pub fn has_pending(&self) -> bool {
        self.batch.as_ref().is_some_and(|b| !b.forwards.is_empty())
    }

    /// Undo the last command. Returns the view state to restore, or `None`
    /// when there is nothing to undo.
    pub fn undo(&mut self, graph: &mut StackGraph) -> Result<Option<ViewState>> {
        if self.in_batch() {
            log::warn!("undo ignored while a gesture is in progress");
            return Ok(None);
        }
        let Some(mut cmd) = self.undo_stack.pop() else {
            return Ok(None);
        };
        match apply(graph, &cmd.inverse) {
            Ok(forward) => {
                log::debug!("undo: {}", cmd.description);
                cmd.forward = forward;
                let state = cmd.before.clone();
                self.redo_stack.push(cmd);
                Ok(Some(state))
            }
            Err(e) => {
                self.undo_stack.push(cmd);
                Err(e)
            }
        }
    }

    /// Redo the last undone command. Returns the view state to restore.
    pub fn redo(&mut self, graph: &mut StackGraph) -> Result<Option<ViewState>> {
        if self.in_batch() {
            log::warn!("redo ignored while a gesture is in progress");
            return Ok(None);
        }
        let Some(mut cmd) = self.redo_stack.pop() else {
            return Ok(None);
        };
        match apply(graph, &cmd.forward) {
            Ok(inverse) => {
                log::debug!("redo: {}", cmd.description);
                cmd.inverse = inverse;
                let state = cmd.after.clone();
                self.undo_stack.push(cmd);
                Ok(Some(state))
            }
            Err(e) => {
                self.redo_stack.push(cmd);
                Err(e)
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.last().map(|c| c.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|c| c.description.as_str())
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    /// The state the document is in, as far as this history knows. Equal
    /// revisions mean equal documents.
    pub fn revision(&self) -> Revision {
        Revision(self.undo_stack.last().map(|c| c.seq).or(self.dropped))
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.batch_depth = 0;
        self.batch = None;
        self.dropped = None;
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(crate::config::EditorConfig::default().max_undo_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cds_core::document::to_value;
    use cds_core::geometry::Size;
    use pretty_assertions::assert_eq;

    fn button(name: &str, x: f64, y: f64) -> Subtree {
        let mut node = Node::named(NodeKind::Button, name);
        node.set("position", PropValue::Point(Point::new(x, y))).unwrap();
        Subtree::leaf(node)
    }

    fn card_with_buttons(names: &[&str]) -> (StackGraph, NodeId, Vec<NodeId>) {
        let mut graph = StackGraph::new();
        let card = graph.card_at(0).unwrap();
        let mut ids = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let b = button(name, 10.0 * i as f64, 10.0 * i as f64);
            ids.push(b.id());
            graph.insert_child(card, b, i).unwrap();
        }
        (graph, card, ids)
    }

    fn submit(history: &mut History, graph: &mut StackGraph, edit: Edit) {
        history
            .submit(graph, edit, "test", ViewState::default(), ViewState::default())
            .unwrap();
    }

    #[test]
    fn insert_inverse_removes() {
        let (mut graph, card, _) = card_with_buttons(&[]);
        let before = to_value(&graph);
        let b = button("go", 0.0, 0.0);
        let id = b.id();
        let inverse = apply(
            &mut graph,
            &Edit::InsertNodes(vec![Insertion {
                parent: card,
                index: 0,
                subtree: b,
            }]),
        )
        .unwrap();
        assert_eq!(inverse, Edit::RemoveNodes(vec![id]));
        apply(&mut graph, &inverse).unwrap();
        assert_eq!(to_value(&graph), before);
    }

    #[test]
    fn failing_batch_rolls_back() {
        let (mut graph, _, ids) = card_with_buttons(&["a", "b"]);
        let before = to_value(&graph);
        let edit = Edit::Batch(vec![
            Edit::MoveViews {
                ids: vec![ids[0]],
                dx: 5.0,
                dy: 5.0,
            },
            Edit::SetProperties(vec![(ids[1], "name".into(), PropValue::text("a"))]),
        ]);
        assert!(apply(&mut graph, &edit).is_err());
        assert_eq!(to_value(&graph), before);
    }

    #[test]
    fn fractional_move_undoes_to_identical_positions() {
        let (mut graph, _, ids) = card_with_buttons(&["a"]);
        graph
            .set_property(ids[0], "position", PropValue::Point(Point::new(0.1, 0.7)))
            .unwrap();
        let before = to_value(&graph);
        let edit = Edit::MoveViews {
            ids: ids.clone(),
            dx: 0.2,
            dy: 0.1,
        };
        let inverse = apply(&mut graph, &edit).unwrap();
        let moved = to_value(&graph);

        apply(&mut graph, &inverse).unwrap();
        assert_eq!(to_value(&graph), before);
        assert_eq!(graph.get(ids[0]).unwrap().position(), Point::new(0.1, 0.7));

        apply(&mut graph, &edit).unwrap();
        assert_eq!(to_value(&graph), moved);
    }

    #[test]
    fn remove_nodes_failure_leaves_document_untouched() {
        let (mut graph, _, ids) = card_with_buttons(&["a", "b"]);
        let before = to_value(&graph);
        let missing = NodeId::intern("no_such_node");
        let err = apply(&mut graph, &Edit::RemoveNodes(vec![ids[0], missing])).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert_eq!(to_value(&graph), before);
    }

    #[test]
    fn group_then_undo_restores_original_views() {
        let (mut graph, card, ids) = card_with_buttons(&["a", "b", "c"]);
        let before = to_value(&graph);
        let group = NodeId::fresh("group");
        let inverse = apply(
            &mut graph,
            &Edit::GroupViews {
                parent: card,
                ids: vec![ids[2], ids[0]],
                group,
                name: "group_1".into(),
            },
        )
        .unwrap();
        assert_eq!(graph.child_ids(card), vec![group, ids[1]]);
        assert_eq!(graph.child_ids(group), vec![ids[0], ids[2]]);
        assert_eq!(graph.get(group).unwrap().size(), Size::new(120.0, 44.0));
        assert_eq!(
            graph.absolute_frame(ids[2]).unwrap().origin(),
            Point::new(20.0, 20.0)
        );

        apply(&mut graph, &inverse).unwrap();
        assert_eq!(to_value(&graph), before);
        assert_eq!(graph.child_ids(card), ids);
    }

    #[test]
    fn ungroup_then_undo_restores_group() {
        let (mut graph, card, ids) = card_with_buttons(&["a", "b"]);
        let group = NodeId::fresh("group");
        apply(
            &mut graph,
            &Edit::GroupViews {
                parent: card,
                ids: ids.clone(),
                group,
                name: "group_1".into(),
            },
        )
        .unwrap();
        let grouped = to_value(&graph);

        let inverse = apply(&mut graph, &Edit::UngroupViews { group }).unwrap();
        assert_eq!(graph.child_ids(card), ids);
        assert_eq!(
            graph.get(ids[1]).unwrap().position(),
            Point::new(10.0, 10.0)
        );
        apply(&mut graph, &inverse).unwrap();
        assert_eq!(to_value(&graph), grouped);
    }

    #[test]
    fn undo_all_restores_initial_snapshot() {
        let (mut graph, card, ids) = card_with_buttons(&["a", "b"]);
        let initial = to_value(&graph);
        let mut history = History::new(100);

        submit(
            &mut history,
            &mut graph,
            Edit::MoveViews {
                ids: ids.clone(),
                dx: 3.0,
                dy: 4.0,
            },
        );
        submit(
            &mut history,
            &mut graph,
            Edit::ReorderChildren {
                parent: card,
                order: vec![ids[1], ids[0]],
            },
        );
        submit(
            &mut history,
            &mut graph,
            Edit::SetHandlers(vec![(ids[0], "OnClick".into(), "beep()".into())]),
        );
        submit(&mut history, &mut graph, Edit::RemoveNodes(vec![ids[1]]));
        let final_state = to_value(&graph);

        while history.can_undo() {
            history.undo(&mut graph).unwrap();
        }
        assert_eq!(to_value(&graph), initial);
        assert_eq!(history.undo(&mut graph).unwrap(), None);

        while history.can_redo() {
            history.redo(&mut graph).unwrap();
        }
        assert_eq!(to_value(&graph), final_state);
    }

    #[test]
    fn submit_after_undo_discards_redo() {
        let (mut graph, _, ids) = card_with_buttons(&["a"]);
        let mut history = History::new(100);
        let nudge = |dx| Edit::MoveViews {
            ids: ids.clone(),
            dx,
            dy: 0.0,
        };
        submit(&mut history, &mut graph, nudge(1.0));
        submit(&mut history, &mut graph, nudge(2.0));
        history.undo(&mut graph).unwrap();
        assert!(history.can_redo());
        submit(&mut history, &mut graph, nudge(5.0));
        assert!(!history.can_redo());
        assert_eq!(graph.get(ids[0]).unwrap().position(), Point::new(6.0, 0.0));
    }

    #[test]
    fn max_depth_drops_oldest() {
        let (mut graph, _, ids) = card_with_buttons(&["a"]);
        let mut history = History::new(2);
        for _ in 0..3 {
            submit(
                &mut history,
                &mut graph,
                Edit::MoveViews {
                    ids: ids.clone(),
                    dx: 1.0,
                    dy: 0.0,
                },
            );
        }
        assert_eq!(history.undo_len(), 2);
        while history.can_undo() {
            history.undo(&mut graph).unwrap();
        }
        assert_eq!(graph.get(ids[0]).unwrap().position(), Point::new(1.0, 0.0));
    }

    #[test]
    fn batch_records_one_command() {
        let (mut graph, _, ids) = card_with_buttons(&["a"]);
        let mut history = History::new(100);
        history.begin_batch("drag", ViewState::default());
        for _ in 0..5 {
            submit(
                &mut history,
                &mut graph,
                Edit::MoveViews {
                    ids: ids.clone(),
                    dx: 2.0,
                    dy: 1.0,
                },
            );
        }
        history.end_batch(ViewState::default());
        assert_eq!(history.undo_len(), 1);
        assert_eq!(graph.get(ids[0]).unwrap().position(), Point::new(10.0, 5.0));
        history.undo(&mut graph).unwrap();
        assert_eq!(graph.get(ids[0]).unwrap().position(), Point::new(0.0, 0.0));
    }

    #[test]
    fn revision_tracks_the_applied_command() {
        let (mut graph, _, ids) = card_with_buttons(&["a"]);
        let mut history = History::new(2);
        let start = history.revision();
        let nudge = || Edit::MoveViews {
            ids: ids.clone(),
            dx: 1.0,
            dy: 0.0,
        };
        submit(&mut history, &mut graph, nudge());
        let first = history.revision();
        assert_ne!(first, start);

        history.undo(&mut graph).unwrap();
        assert_eq!(history.revision(), start);
        history.redo(&mut graph).unwrap();
        assert_eq!(history.revision(), first);

        history.undo(&mut graph).unwrap();
        submit(&mut history, &mut graph, nudge());
        assert_ne!(history.revision(), first);

        submit(&mut history, &mut graph, nudge());
        submit(&mut history, &mut graph, nudge());
        while history.can_undo() {
            history.undo(&mut graph).unwrap();
        }
        assert_ne!(history.revision(), start);
    }

    #[test]
    fn unrecorded_submit_leaves_history_alone() {
        let (mut graph, card, _) = card_with_buttons(&[]);
        let mut history = History::new(100);
        history
            .submit_unrecorded(
                &mut graph,
                &Edit::InsertNodes(vec![Insertion {
                    parent: card,
                    index: 0,
                    subtree: button("x", 0.0, 0.0),
                }]),
            )
            .unwrap();
        assert!(!history.can_undo());
        assert_eq!(graph.child_ids(card).len(), 1);
    }
}
