//! The edit surface of one open stack.
//!
//! `StackManager` owns a document together with its undo history, the
//! selection, the active card and an in-process clipboard. Every user-level
//! operation becomes one `Edit` submitted through the history, so each is
//! undoable in a single step.

use crate::commands::{Edit, History, Insertion, Revision, ViewState};
use crate::config::EditorConfig;
use crate::selection::Selection;
use crate::shortcuts::{NudgeStep, ShortcutAction};
use cds_core::document;
use cds_core::error::{Error, Result};
use cds_core::geometry::{Point, Rect};
use cds_core::host::{HandlerRunner, RepaintSink, ScriptValue};
use cds_core::id::NodeId;
use cds_core::model::{
    Node, NodeKind, StackGraph, Subtree, dedup_name, next_available_name,
};
use cds_core::resolve::StackLoader;
use cds_core::search::{Finder, MatchSite, SearchMatch, SearchOptions};
use cds_core::value::PropValue;
use serde_json::Value;
use smallvec::{SmallVec, smallvec};
use std::path::{Path, PathBuf};

/// Offset applied to duplicated views.
const DUPLICATE_OFFSET: f64 = 10.0;

/// Z-order moves for the selected views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderDirection {
    /// Behind every other view.
    Back,
    Backward,
    Forward,
    /// In front of every other view.
    Front,
}

pub struct StackManager {
    graph: StackGraph,
    selection: Selection,
    card_index: usize,
    history: History,
    config: EditorConfig,
    /// History revision last written to disk; `None` once an unrecorded
    /// edit makes the saved state unreachable.
    saved: Option<Revision>,
    editing: bool,
    path: Option<PathBuf>,
    clipboard: Option<Value>,
    runner: Option<Box<dyn HandlerRunner>>,
    repaint: Option<Box<dyn RepaintSink>>,
}

impl Default for StackManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StackManager {
    /// A manager for a new, empty stack.
    pub fn new() -> Self {
        Self::from_graph(StackGraph::new(), EditorConfig::default())
    }

    pub fn from_graph(graph: StackGraph, config: EditorConfig) -> Self {
        let mut manager = Self {
            graph,
            selection: Selection::new(),
            card_index: 0,
            history: History::new(config.max_undo_depth),
            config,
            saved: Some(Revision::default()),
            editing: true,
            path: None,
            clipboard: None,
            runner: None,
            repaint: None,
        };
        manager.select_current_card();
        manager
    }

    /// Open the stack at `path` through `loader`.
    pub fn open(path: &Path, loader: &dyn StackLoader, config: EditorConfig) -> Result<Self> {
        let graph = loader.load(path)?;
        let mut manager = Self::from_graph(graph, config);
        manager.path = Some(path.to_path_buf());
        Ok(manager)
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn graph(&self) -> &StackGraph {
        &self.graph
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn card_index(&self) -> usize {
        self.card_index
    }

    /// The active card.
    pub fn current_card(&self) -> NodeId {
        self.graph
            .card_at(self.card_index)
            .or_else(|| self.graph.card_at(0))
            .unwrap_or_else(|| self.graph.root_id())
    }

    /// The document differs from the last save (or from how it was opened).
    pub fn is_dirty(&self) -> bool {
        self.history.has_pending() || self.saved != Some(self.history.revision())
    }

    pub fn mark_saved(&mut self) {
        self.saved = Some(self.history.revision());
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: Option<PathBuf>) {
        self.path = path;
    }

    /// Designing (`true`) or running (`false`). Card events only fire while
    /// running.
    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn set_editing(&mut self, editing: bool) {
        self.editing = editing;
    }

    pub fn set_runner(&mut self, runner: Option<Box<dyn HandlerRunner>>) {
        self.runner = runner;
    }

    pub fn take_runner(&mut self) -> Option<Box<dyn HandlerRunner>> {
        self.runner.take()
    }

    pub fn set_repaint_sink(&mut self, sink: Option<Box<dyn RepaintSink>>) {
        self.repaint = sink;
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    fn view_state(&self) -> ViewState {
        ViewState {
            selection: self.selection.snapshot(),
            card_index: self.card_index,
        }
    }

    fn state_with(&self, card_index: usize, selection: &[NodeId]) -> ViewState {
        ViewState {
            selection: selection.iter().copied().collect(),
            card_index,
        }
    }

    fn restore_view(&mut self, state: &ViewState) {
        self.card_index = state.card_index.min(self.graph.card_count().saturating_sub(1));
        self.selection.restore(&self.graph, &state.selection);
        if self.selection.is_empty() {
            self.select_current_card();
        }
        if let Some(field) = self.selection.focused_field()
            && !self.graph.contains(field)
        {
            self.selection.clear_focus();
        }
    }

    fn select_current_card(&mut self) {
        let card = self.current_card();
        self.selection.select(&self.graph, Some(card), false);
    }

    fn repaint(&mut self, area: Option<Rect>) {
        if let Some(sink) = self.repaint.as_mut() {
            sink.needs_repaint(area);
        }
    }

    // ─── Submit / undo ───────────────────────────────────────────────────

    fn commit(&mut self, edit: Edit, description: &str, after: ViewState) -> Result<()> {
        let before = self.view_state();
        self.commit_with(edit, description, before, after)
    }

    /// Commit with an explicit `before` state, for operations that adjust
    /// the selection ahead of the edit.
    fn commit_with(
        &mut self,
        edit: Edit,
        description: &str,
        before: ViewState,
        after: ViewState,
    ) -> Result<()> {
        if let Err(e) = self
            .history
            .submit(&mut self.graph, edit, description, before, after.clone())
        {
            log::warn!("{description} rejected: {e}");
            return Err(e);
        }
        self.restore_view(&after);
        self.repaint(None);
        Ok(())
    }

    /// Submit an arbitrary edit as one undoable command. The selection keeps
    /// whatever still exists afterwards.
    pub fn submit(&mut self, edit: Edit, description: &str) -> Result<()> {
        let after = self.view_state();
        self.commit(edit, description, after)
    }

    /// Apply an edit once without recording it.
    pub fn submit_unrecorded(&mut self, edit: &Edit) -> Result<()> {
        self.history.submit_unrecorded(&mut self.graph, edit)?;
        let state = self.view_state();
        self.restore_view(&state);
        self.saved = None;
        self.repaint(None);
        Ok(())
    }

    /// Undo the last command. Returns whether anything was undone.
    pub fn undo(&mut self) -> Result<bool> {
        let Some(state) = self.history.undo(&mut self.graph)? else {
            return Ok(false);
        };
        self.restore_view(&state);
        self.repaint(None);
        Ok(true)
    }

    /// Redo the last undone command. Returns whether anything was redone.
    pub fn redo(&mut self) -> Result<bool> {
        let Some(state) = self.history.redo(&mut self.graph)? else {
            return Ok(false);
        };
        self.restore_view(&state);
        self.repaint(None);
        Ok(true)
    }

    /// Start a gesture (drag, resize). Edits until `end_gesture` undo as one.
    pub fn begin_gesture(&mut self, description: &str) {
        let before = self.view_state();
        self.history.begin_batch(description, before);
    }

    pub fn end_gesture(&mut self) {
        let after = self.view_state();
        self.history.end_batch(after);
    }

    // ─── Cards ───────────────────────────────────────────────────────────

    fn card_names(&self) -> Vec<String> {
        self.graph.sibling_names(self.graph.root_id())
    }

    /// Insert `card` at `index`, renaming it if the name is taken, and make
    /// it current.
    pub fn insert_card(&mut self, mut card: Subtree, index: usize, description: &str) -> Result<NodeId> {
        let name = dedup_name(card.name(), &self.card_names());
        card.node.set("name", PropValue::text(name))?;
        let id = card.id();
        let edit = Edit::InsertNodes(vec![Insertion {
            parent: self.graph.root_id(),
            index,
            subtree: card,
        }]);
        let after = self.state_with(index, &[id]);
        self.commit(edit, description, after)?;
        Ok(id)
    }

    /// Add a blank card after the current one and show it.
    pub fn add_card(&mut self) -> Result<NodeId> {
        let card = Subtree::leaf(Node::named(NodeKind::Card, "card_1"));
        self.insert_card(card, self.card_index + 1, "Add Card")
    }

    /// Copy the current card (with fresh ids) right after it.
    pub fn duplicate_card(&mut self) -> Result<NodeId> {
        let card = self
            .graph
            .subtree(self.current_card())
            .ok_or_else(|| Error::not_found("current card"))?
            .with_fresh_ids();
        self.insert_card(card, self.card_index + 1, "Duplicate Card")
    }

    /// Remove the current card. The last card cannot be removed.
    pub fn remove_card(&mut self) -> Result<()> {
        let count = self.graph.card_count();
        if count <= 1 {
            return Err(Error::invalid("a stack must keep at least one card"));
        }
        let card = self.current_card();
        let next_index = self.card_index.min(count - 2);
        let survivor = if self.card_index + 1 < count {
            self.graph.card_at(self.card_index + 1)
        } else {
            self.graph.card_at(self.card_index.saturating_sub(1))
        };
        let before = self.view_state();
        let saved = self.selection.clone();
        self.selection.forget_subtree(&self.graph, card);
        let after = self.state_with(next_index, survivor.as_slice());
        if let Err(e) = self.commit_with(Edit::RemoveNodes(vec![card]), "Remove Card", before, after) {
            self.selection = saved;
            return Err(e);
        }
        Ok(())
    }

    /// Move the current card one step forward (`true`) or back.
    pub fn reorder_current_card(&mut self, forward: bool) -> Result<()> {
        let count = self.graph.card_count();
        let to = if forward {
            (self.card_index + 1).min(count - 1)
        } else {
            self.card_index.saturating_sub(1)
        };
        self.move_card(self.card_index, to)
    }

    /// Move the card at `from` to position `to`.
    pub fn move_card(&mut self, from: usize, to: usize) -> Result<()> {
        let mut order = self.graph.card_ids();
        let len = order.len();
        for index in [from, to] {
            if index >= len {
                return Err(Error::InvalidIndex { index, len });
            }
        }
        if from == to {
            return Ok(());
        }
        let card = order.remove(from);
        order.insert(to, card);
        let edit = Edit::ReorderChildren {
            parent: self.graph.root_id(),
            order,
        };
        let after = self.state_with(to, &[card]);
        self.commit(edit, "Reorder Card", after)
    }

    /// Show the card at `index`.
    ///
    /// Navigating to the active index is a no-op unless `reload` is set.
    /// While running, `OnHideCard` fires on the old card and `OnShowCard` on
    /// the new one, once each. Selection resets to the new card and focus is
    /// cleared.
    pub fn load_card_at_index(&mut self, index: usize, reload: bool) -> Result<()> {
        let len = self.graph.card_count();
        if index >= len {
            return Err(Error::InvalidIndex { index, len });
        }
        if index == self.card_index && !reload {
            return Ok(());
        }
        self.leave_card();
        self.card_index = index;
        self.show_card();
        Ok(())
    }

    /// Activate a card when a stack starts running. Out-of-range indexes
    /// fall back to the first card. Fires only `OnShowCard`.
    pub fn enter_card(&mut self, index: usize) {
        self.card_index = if index < self.graph.card_count() { index } else { 0 };
        self.show_card();
    }

    /// Fire `OnHideCard` on the active card (when running).
    pub fn leave_card(&mut self) {
        if !self.editing {
            let card = self.current_card();
            self.run_handler(card, "OnHideCard", None);
        }
    }

    fn show_card(&mut self) {
        self.selection.clear_focus();
        self.select_current_card();
        self.repaint(None);
        log::debug!("showing card {}", self.card_index);
        if !self.editing {
            let card = self.current_card();
            self.run_handler(card, "OnShowCard", None);
        }
    }

    /// Forward an event to the attached handler runner. Nodes without a
    /// handler for `event` are skipped. Returns whether a handler ran.
    pub fn run_handler(&mut self, target: NodeId, event: &str, payload: Option<&ScriptValue>) -> bool {
        let Some(source) = self.graph.get(target).and_then(|n| n.handler(event)) else {
            return false;
        };
        match self.runner.as_mut() {
            Some(runner) => runner.run_handler(target, event, source, payload),
            None => false,
        }
    }

    // ─── Views ───────────────────────────────────────────────────────────

    /// Rename `sub` and everything in it so no name clashes with `taken`.
    fn dedup_into(sub: &mut Subtree, taken: &mut Vec<String>) -> Result<()> {
        let name = dedup_name(sub.name(), taken);
        if name != sub.name() {
            sub.node.set("name", PropValue::text(name.clone()))?;
        }
        taken.push(name);
        for child in &mut sub.children {
            Self::dedup_into(child, taken)?;
        }
        Ok(())
    }

    /// Add views on top of the current card, deduplicating names against
    /// every name on the card. The new views become the selection.
    pub fn add_views(&mut self, views: Vec<Subtree>, description: &str) -> Result<Vec<NodeId>> {
        let card = self.current_card();
        let mut taken = self.graph.names_in_card(card);
        let start = self.graph.child_ids(card).len();
        let mut items = Vec::with_capacity(views.len());
        for (offset, mut view) in views.into_iter().enumerate() {
            if !view.node.kind.is_view() {
                return Err(Error::invalid(format!(
                    "a {} cannot be placed on a card",
                    view.node.kind.tag()
                )));
            }
            Self::dedup_into(&mut view, &mut taken)?;
            items.push(Insertion {
                parent: card,
                index: start + offset,
                subtree: view,
            });
        }
        let ids: Vec<NodeId> = items.iter().map(|i| i.subtree.id()).collect();
        let after = self.state_with(self.card_index, &ids);
        self.commit(Edit::InsertNodes(items), description, after)?;
        Ok(ids)
    }

    /// Create a new view of `kind` with `frame` on the current card.
    pub fn add_view(&mut self, kind: NodeKind, frame: Option<Rect>) -> Result<NodeId> {
        if !kind.is_view() {
            return Err(Error::invalid(format!("{} is not a view", kind.tag())));
        }
        let taken = self.graph.names_in_card(self.current_card());
        let mut node = Node::named(kind, &next_available_name(kind.name_prefix(), &taken));
        if let Some(frame) = frame {
            node.set("position", PropValue::Point(frame.origin()))?;
            node.set("size", PropValue::Size(frame.size()))?;
        }
        let ids = self.add_views(vec![Subtree::leaf(node)], "Add View")?;
        ids.first()
            .copied()
            .ok_or_else(|| Error::invalid("no view added"))
    }

    /// Top-level views among `ids`: nodes whose ancestor is also listed and
    /// children of groups are skipped.
    fn top_level_views(&self, ids: &[NodeId]) -> Vec<NodeId> {
        let card = self.current_card();
        ids.iter()
            .copied()
            .filter(|&id| {
                self.graph.parent_of(id) == Some(card)
                    && self.graph.kind(id).is_some_and(NodeKind::is_view)
            })
            .collect()
    }

    /// Remove views. Each is deselected before it is removed; a failed
    /// removal restores the selection.
    pub fn remove_views(&mut self, ids: &[NodeId]) -> Result<()> {
        let views = self.top_level_views(ids);
        if views.is_empty() {
            return Ok(());
        }
        let before = self.view_state();
        let saved = self.selection.clone();
        for &id in &views {
            self.selection.forget_subtree(&self.graph, id);
        }
        let remaining = self.selection.snapshot();
        let after = self.state_with(self.card_index, &remaining);
        if let Err(e) = self.commit_with(Edit::RemoveNodes(views), "Remove Views", before, after) {
            self.selection = saved;
            return Err(e);
        }
        Ok(())
    }

    /// Remove the selection: views, or the card itself when it is selected.
    pub fn remove_selected(&mut self) -> Result<()> {
        let ids = self.selection.snapshot();
        if ids.first() == Some(&self.current_card()) {
            return self.remove_card();
        }
        self.remove_views(&ids)
    }

    pub fn move_views(&mut self, ids: &[NodeId], dx: f64, dy: f64) -> Result<()> {
        let edit = Edit::MoveViews {
            ids: ids.to_vec(),
            dx,
            dy,
        };
        if edit.is_empty() {
            return Ok(());
        }
        self.submit(edit, "Move")
    }

    fn selected_views(&self) -> Vec<NodeId> {
        self.selection
            .ids()
            .iter()
            .copied()
            .filter(|&id| self.graph.kind(id).is_some_and(NodeKind::is_view))
            .collect()
    }

    /// Arrow-key nudge of the selected views.
    pub fn nudge(&mut self, dx: i8, dy: i8, step: NudgeStep) -> Result<()> {
        let distance = self.config.nudge_for(step == NudgeStep::Shift, step == NudgeStep::Alt);
        let ids = self.selected_views();
        self.move_views(&ids, f64::from(dx) * distance, f64::from(dy) * distance)
    }

    /// Set a view's frame.
    pub fn resize_view(&mut self, id: NodeId, frame: Rect) -> Result<()> {
        self.submit(Edit::ResizeViews(vec![(id, frame)]), "Resize")
    }

    /// Move the selected views in z-order, keeping them adjacent. The first
    /// (lowest) selected index anchors the move; moves past either end are
    /// ignored.
    pub fn reorder_selected(&mut self, direction: ReorderDirection) -> Result<()> {
        let card = self.current_card();
        let children = self.graph.child_ids(card);
        let mut indexes = Vec::new();
        for &id in self.selection.ids() {
            match children.iter().position(|&c| c == id) {
                Some(i) => indexes.push(i),
                None => return Ok(()),
            }
        }
        if indexes.is_empty() {
            return Ok(());
        }
        indexes.sort_unstable();
        let first = indexes[0];
        let count = indexes.len();
        let target = match direction {
            ReorderDirection::Back => Some(0),
            ReorderDirection::Backward => first.checked_sub(1),
            ReorderDirection::Forward => Some(first + 1),
            ReorderDirection::Front => Some(children.len() - count),
        };
        let Some(target) = target.filter(|t| t + count <= children.len()) else {
            return Ok(());
        };
        let moving: Vec<NodeId> = indexes.iter().map(|&i| children[i]).collect();
        let mut order: Vec<NodeId> = children
            .iter()
            .copied()
            .filter(|c| !moving.contains(c))
            .collect();
        for (offset, &id) in moving.iter().enumerate() {
            order.insert(target + offset, id);
        }
        if order == children {
            return Ok(());
        }
        self.submit(
            Edit::ReorderChildren {
                parent: card,
                order,
            },
            "Reorder Views",
        )
    }

    /// Group the selected top-level views. Needs at least two.
    pub fn group_selected(&mut self) -> Result<Option<NodeId>> {
        let ids = self.top_level_views(self.selection.ids());
        if ids.len() < 2 {
            return Ok(None);
        }
        let card = self.current_card();
        let group = NodeId::fresh("group");
        let name = next_available_name("group_", &self.graph.names_in_card(card));
        let edit = Edit::GroupViews {
            parent: card,
            ids,
            group,
            name,
        };
        let after = self.state_with(self.card_index, &[group]);
        self.commit(edit, "Group Views", after)?;
        Ok(Some(group))
    }

    /// Dissolve every selected group; their children become the selection.
    pub fn ungroup_selected(&mut self) -> Result<()> {
        let groups: Vec<NodeId> = self
            .top_level_views(self.selection.ids())
            .into_iter()
            .filter(|&id| self.graph.kind(id) == Some(NodeKind::Group))
            .collect();
        if groups.is_empty() {
            return Ok(());
        }
        let children: Vec<NodeId> = groups
            .iter()
            .flat_map(|&g| self.graph.child_ids(g))
            .collect();
        let edit = Edit::Batch(
            groups
                .into_iter()
                .map(|group| Edit::UngroupViews { group })
                .collect(),
        );
        let after = self.state_with(self.card_index, &children);
        self.commit(edit, "Ungroup Views", after)
    }

    // ─── Selection & focus ───────────────────────────────────────────────

    pub fn select(&mut self, id: Option<NodeId>, extend: bool) {
        self.selection.select(&self.graph, id, extend);
        if self.selection.is_empty() {
            self.select_current_card();
        }
        self.repaint(None);
    }

    pub fn select_all(&mut self) {
        let card = self.current_card();
        self.selection.clear();
        for id in self.graph.child_ids(card) {
            self.selection.select(&self.graph, Some(id), true);
        }
        if self.selection.is_empty() {
            self.select_current_card();
        }
        self.repaint(None);
    }

    pub fn set_focused_field(&mut self, id: Option<NodeId>) {
        self.selection.set_focused_field(&self.graph, id);
    }

    pub fn focused_field(&self) -> Option<NodeId> {
        self.selection.focused_field()
    }

    // ─── Clipboard ───────────────────────────────────────────────────────

    /// Copy the selection (views, or the current card) to the clipboard.
    pub fn copy(&mut self) -> bool {
        let ids = self.selection.snapshot();
        let payload: Vec<Value> = ids
            .iter()
            .filter_map(|&id| self.graph.subtree(id))
            .map(|sub| document::subtree_to_value(&sub))
            .collect();
        if payload.is_empty() {
            return false;
        }
        self.clipboard = Some(Value::Array(payload));
        true
    }

    pub fn cut(&mut self) -> Result<()> {
        if self.copy() {
            self.remove_selected()?;
        }
        Ok(())
    }

    /// Paste the clipboard. A single card is inserted after the current card;
    /// views land on the current card. Pasted nodes get fresh ids and
    /// deduplicated names.
    pub fn paste(&mut self) -> Result<Vec<NodeId>> {
        let Some(Value::Array(items)) = self.clipboard.clone() else {
            return Ok(Vec::new());
        };
        let subtrees = items
            .iter()
            .map(|v| document::subtree_from_value(v).map(|s| s.with_fresh_ids()))
            .collect::<Result<Vec<_>>>()?;
        if let [card] = subtrees.as_slice()
            && card.node.kind == NodeKind::Card
        {
            let id = self.insert_card(card.clone(), self.card_index + 1, "Paste Card")?;
            return Ok(vec![id]);
        }
        self.add_views(subtrees, "Paste")
    }

    /// Duplicate the selected views, offset slightly. The clipboard is left
    /// alone. A selected card is duplicated as a card.
    pub fn duplicate_selected(&mut self) -> Result<Vec<NodeId>> {
        if self.selection.first() == Some(self.current_card()) {
            return self.duplicate_card().map(|id| vec![id]);
        }
        let mut copies = Vec::new();
        for id in self.top_level_views(self.selection.ids()) {
            if let Some(sub) = self.graph.subtree(id) {
                let mut copy = sub.with_fresh_ids();
                let pos = copy.node.position().offset(DUPLICATE_OFFSET, DUPLICATE_OFFSET);
                copy.node.set("position", PropValue::Point(pos))?;
                copies.push(copy);
            }
        }
        if copies.is_empty() {
            return Ok(Vec::new());
        }
        self.add_views(copies, "Duplicate")
    }

    pub fn clipboard(&self) -> Option<&Value> {
        self.clipboard.as_ref()
    }

    // ─── Properties & handlers ───────────────────────────────────────────

    pub fn property(&self, id: NodeId, key: &str) -> Option<&PropValue> {
        self.graph.property(id, key)
    }

    pub fn set_property(&mut self, id: NodeId, key: &str, value: PropValue) -> Result<()> {
        if self.graph.property(id, key) == Some(&value) {
            return Ok(());
        }
        self.submit(
            Edit::SetProperties(vec![(id, key.to_string(), value)]),
            &format!("Set {key}"),
        )
    }

    pub fn handler(&self, id: NodeId, event: &str) -> Option<&str> {
        self.graph.get(id).and_then(|n| n.handler(event))
    }

    pub fn set_handler(&mut self, id: NodeId, event: &str, source: &str) -> Result<()> {
        if self.handler(id, event).unwrap_or("") == source {
            return Ok(());
        }
        self.submit(
            Edit::SetHandlers(vec![(id, event.to_string(), source.to_string())]),
            "Edit Handler",
        )
    }

    // ─── Find & replace ──────────────────────────────────────────────────

    pub fn find(&self, needle: &str, options: SearchOptions) -> Result<Vec<SearchMatch>> {
        Ok(Finder::new(needle, options)?.find_all(&self.graph))
    }

    /// Replace every match in one undoable step. Returns how many texts
    /// changed.
    pub fn replace_all(&mut self, needle: &str, replacement: &str, options: SearchOptions) -> Result<usize> {
        let finder = Finder::new(needle, options)?;
        let rewrites = finder.replacements(&self.graph, replacement);
        if rewrites.is_empty() {
            return Ok(0);
        }
        let count = rewrites.len();
        let edits = rewrites
            .into_iter()
            .map(|r| match r.site {
                MatchSite::Handler(event) => Edit::SetHandlers(vec![(r.node, event, r.new)]),
                MatchSite::Property(key) => {
                    Edit::SetProperties(vec![(r.node, key, PropValue::text(r.new))])
                }
            })
            .collect();
        self.submit(Edit::Batch(edits), "Replace All")?;
        Ok(count)
    }

    // ─── Serialization ───────────────────────────────────────────────────

    pub fn to_value(&self) -> Value {
        document::to_value(&self.graph)
    }

    /// Replace the whole document. History is cleared and the first card
    /// becomes active. Nothing changes if the value fails to load.
    pub fn load_value(&mut self, value: Value) -> Result<()> {
        let graph = document::from_value(value)?;
        self.graph = graph;
        self.history.clear();
        self.card_index = 0;
        self.selection = Selection::new();
        self.select_current_card();
        self.mark_saved();
        self.repaint(None);
        Ok(())
    }

    /// Write the document to `path` (or the path it was opened from).
    pub fn save(&mut self, path: Option<&Path>) -> Result<()> {
        let target = path
            .map(Path::to_path_buf)
            .or_else(|| self.path.clone())
            .ok_or_else(|| Error::invalid("no path to save to"))?;
        document::write_file(&self.graph, &target)?;
        self.path = Some(target);
        self.mark_saved();
        Ok(())
    }

    // ─── Shortcuts ───────────────────────────────────────────────────────

    /// Perform a keyboard shortcut. Returns whether the manager handled it;
    /// tool switching is left to the host.
    pub fn handle_shortcut(&mut self, action: ShortcutAction) -> Result<bool> {
        match action {
            ShortcutAction::Undo => {
                self.undo()?;
            }
            ShortcutAction::Redo => {
                self.redo()?;
            }
            ShortcutAction::Delete => self.remove_selected()?,
            ShortcutAction::SelectAll => self.select_all(),
            ShortcutAction::Duplicate => {
                self.duplicate_selected()?;
            }
            ShortcutAction::Copy => {
                self.copy();
            }
            ShortcutAction::Cut => self.cut()?,
            ShortcutAction::Paste => {
                self.paste()?;
            }
            ShortcutAction::Group => {
                self.group_selected()?;
            }
            ShortcutAction::Ungroup => self.ungroup_selected()?,
            ShortcutAction::Nudge { dx, dy, step } => self.nudge(dx, dy, step)?,
            ShortcutAction::NewCard => {
                self.add_card()?;
            }
            ShortcutAction::NextCard => {
                let next = self.card_index + 1;
                if next < self.graph.card_count() {
                    self.load_card_at_index(next, false)?;
                }
            }
            ShortcutAction::PrevCard => {
                if let Some(prev) = self.card_index.checked_sub(1) {
                    self.load_card_at_index(prev, false)?;
                }
            }
            ShortcutAction::SendBackward => self.reorder_selected(ReorderDirection::Backward)?,
            ShortcutAction::BringForward => self.reorder_selected(ReorderDirection::Forward)?,
            ShortcutAction::SendToBack => self.reorder_selected(ReorderDirection::Back)?,
            ShortcutAction::BringToFront => self.reorder_selected(ReorderDirection::Front)?,
            ShortcutAction::Deselect => self.select(None, false),
            ShortcutAction::ToggleEditing => self.editing = !self.editing,
            ShortcutAction::Tool(_) => return Ok(false),
        }
        Ok(true)
    }

    /// Topmost view under `point` on the current card.
    pub fn hit_test(&self, point: Point) -> Option<NodeId> {
        self.graph.hit_test(self.current_card(), point)
    }

    /// Frame of `id` in card coordinates.
    pub fn frame_of(&self, id: NodeId) -> Option<Rect> {
        self.graph.absolute_frame(id)
    }

    /// Selection ids as a small vector, for callers building edits.
    pub fn selected_ids(&self) -> SmallVec<[NodeId; 4]> {
        let mut ids: SmallVec<[NodeId; 4]> = smallvec![];
        ids.extend(self.selection.ids().iter().copied());
        ids
    }
}
