//! Core stack document model.
//!
//! A document is a tree: one stack holding an ordered list of cards, each
//! card holding an ordered list of views, where a group view holds further
//! views. The tree lives in a per-document arena (`StableDiGraph`) whose
//! edges point parent → child; a node's parent is its single incoming edge,
//! so parent links and child lists cannot disagree. Child order is kept
//! explicitly per container.

use crate::error::{Error, Result};
use crate::geometry::{Point, Rect, Size};
use crate::id::NodeId;
use crate::value::{PropType, PropValue};
use petgraph::Direction;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use std::collections::{BTreeMap, HashMap, HashSet};

// ─── Node kinds ──────────────────────────────────────────────────────────

/// The drawing primitive of a shape view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Pen,
    Line,
    Oval,
    Rect,
    RoundRect,
}

impl ShapeKind {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Pen => "pen",
            Self::Line => "line",
            Self::Oval => "oval",
            Self::Rect => "rect",
            Self::RoundRect => "roundrect",
        }
    }
}

/// Every kind of node a stack document can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Stack,
    Card,
    Group,
    Button,
    Field,
    Label,
    Image,
    Shape(ShapeKind),
}

impl NodeKind {
    /// The `type` tag used in the document format.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Stack => "stack",
            Self::Card => "card",
            Self::Group => "group",
            Self::Button => "button",
            Self::Field => "field",
            Self::Label => "label",
            Self::Image => "image",
            Self::Shape(shape) => shape.tag(),
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "stack" => Self::Stack,
            "card" => Self::Card,
            "group" => Self::Group,
            "button" => Self::Button,
            "field" => Self::Field,
            "label" => Self::Label,
            "image" => Self::Image,
            "pen" => Self::Shape(ShapeKind::Pen),
            "line" => Self::Shape(ShapeKind::Line),
            "oval" => Self::Shape(ShapeKind::Oval),
            "rect" => Self::Shape(ShapeKind::Rect),
            "roundrect" => Self::Shape(ShapeKind::RoundRect),
            _ => return None,
        })
    }

    /// Stack, card and group own ordered children.
    pub fn is_container(self) -> bool {
        matches!(self, Self::Stack | Self::Card | Self::Group)
    }

    /// Anything placed on a card.
    pub fn is_view(self) -> bool {
        !matches!(self, Self::Stack | Self::Card)
    }

    /// Views carry a position and size relative to their container.
    pub fn has_geometry(self) -> bool {
        self.is_view()
    }

    /// Every node kind can carry script handlers.
    pub fn has_handlers(self) -> bool {
        true
    }

    pub fn accepts_child(self, child: NodeKind) -> bool {
        match self {
            Self::Stack => child == Self::Card,
            Self::Card | Self::Group => child.is_view(),
            _ => false,
        }
    }

    pub fn schema(self) -> &'static [PropSpec] {
        match self {
            Self::Stack => STACK_PROPS,
            Self::Card => CARD_PROPS,
            Self::Group => GROUP_PROPS,
            Self::Button => BUTTON_PROPS,
            Self::Field => FIELD_PROPS,
            Self::Label => LABEL_PROPS,
            Self::Image => IMAGE_PROPS,
            Self::Shape(_) => SHAPE_PROPS,
        }
    }

    pub fn prop_type(self, key: &str) -> Option<PropType> {
        self.schema().iter().find(|s| s.key == key).map(|s| s.ty)
    }

    /// Prefix for generated names, e.g. `button_` → `button_1`.
    pub fn name_prefix(self) -> &'static str {
        match self {
            Self::Stack => "stack",
            Self::Card => "card_",
            Self::Group => "group_",
            Self::Button => "button_",
            Self::Field => "field_",
            Self::Label => "label_",
            Self::Image => "image_",
            Self::Shape(_) => "shape_",
        }
    }
}

// ─── Property schemas ────────────────────────────────────────────────────

/// Default value of a schema entry, convertible to a `PropValue` of the
/// entry's declared type.
#[derive(Debug, Clone, Copy)]
pub enum PropDefault {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(&'static str),
    Point(f64, f64),
    Size(f64, f64),
    Empty,
}

#[derive(Debug, Clone, Copy)]
pub struct PropSpec {
    pub key: &'static str,
    pub ty: PropType,
    pub default: PropDefault,
}

impl PropSpec {
    pub fn default_value(&self) -> PropValue {
        match (self.ty, self.default) {
            (_, PropDefault::Bool(b)) => PropValue::Bool(b),
            (_, PropDefault::Int(i)) => PropValue::Int(i),
            (_, PropDefault::Float(f)) => PropValue::Float(f),
            (PropType::Color, PropDefault::Str(s)) => PropValue::color(s),
            (PropType::Choice(_), PropDefault::Str(s)) => PropValue::choice(s),
            (_, PropDefault::Str(s)) => PropValue::text(s),
            (_, PropDefault::Point(x, y)) => PropValue::Point(Point::new(x, y)),
            (_, PropDefault::Size(w, h)) => PropValue::Size(Size::new(w, h)),
            (_, PropDefault::Empty) => PropValue::Points(Vec::new()),
        }
    }
}

const fn spec(key: &'static str, ty: PropType, default: PropDefault) -> PropSpec {
    PropSpec { key, ty, default }
}

pub const ALIGNMENTS: &[&str] = &["left", "center", "right"];
pub const IMAGE_FITS: &[&str] = &["center", "stretch", "contain", "fill"];

const NAME: PropSpec = spec("name", PropType::Text, PropDefault::Str(""));
const POSITION: PropSpec = spec("position", PropType::Point, PropDefault::Point(0.0, 0.0));
const HIDDEN: PropSpec = spec("hidden", PropType::Bool, PropDefault::Bool(false));

const STACK_PROPS: &[PropSpec] = &[
    NAME,
    POSITION,
    spec("size", PropType::Size, PropDefault::Size(500.0, 500.0)),
    spec("can_save", PropType::Bool, PropDefault::Bool(false)),
    spec("can_resize", PropType::Bool, PropDefault::Bool(false)),
];

const CARD_PROPS: &[PropSpec] = &[
    NAME,
    spec("bg_color", PropType::Color, PropDefault::Str("white")),
];

const GROUP_PROPS: &[PropSpec] = &[
    NAME,
    POSITION,
    spec("size", PropType::Size, PropDefault::Size(0.0, 0.0)),
    HIDDEN,
];

const BUTTON_PROPS: &[PropSpec] = &[
    NAME,
    POSITION,
    spec("size", PropType::Size, PropDefault::Size(100.0, 24.0)),
    HIDDEN,
    spec("title", PropType::Text, PropDefault::Str("Button")),
    spec("border", PropType::Bool, PropDefault::Bool(true)),
];

const FIELD_PROPS: &[PropSpec] = &[
    NAME,
    POSITION,
    spec("size", PropType::Size, PropDefault::Size(100.0, 24.0)),
    HIDDEN,
    spec("text", PropType::Text, PropDefault::Str("")),
    spec("alignment", PropType::Choice(ALIGNMENTS), PropDefault::Str("left")),
    spec("editable", PropType::Bool, PropDefault::Bool(true)),
    spec("multiline", PropType::Bool, PropDefault::Bool(false)),
    spec("font_size", PropType::Int, PropDefault::Int(12)),
];

const LABEL_PROPS: &[PropSpec] = &[
    NAME,
    POSITION,
    spec("size", PropType::Size, PropDefault::Size(100.0, 24.0)),
    HIDDEN,
    spec("text", PropType::Text, PropDefault::Str("Label")),
    spec("alignment", PropType::Choice(ALIGNMENTS), PropDefault::Str("left")),
    spec("text_color", PropType::Color, PropDefault::Str("black")),
    spec("font_size", PropType::Int, PropDefault::Int(18)),
];

const IMAGE_PROPS: &[PropSpec] = &[
    NAME,
    POSITION,
    spec("size", PropType::Size, PropDefault::Size(80.0, 80.0)),
    HIDDEN,
    spec("file", PropType::Text, PropDefault::Str("")),
    spec("fit", PropType::Choice(IMAGE_FITS), PropDefault::Str("center")),
    spec("rotation", PropType::Float, PropDefault::Float(0.0)),
];

const SHAPE_PROPS: &[PropSpec] = &[
    NAME,
    POSITION,
    spec("size", PropType::Size, PropDefault::Size(0.0, 0.0)),
    HIDDEN,
    spec("pen_color", PropType::Color, PropDefault::Str("black")),
    spec("pen_thickness", PropType::Int, PropDefault::Int(2)),
    spec("fill_color", PropType::Color, PropDefault::Str("white")),
    spec("corner_radius", PropType::Int, PropDefault::Int(8)),
    spec("points", PropType::Points, PropDefault::Empty),
];

// ─── Nodes ───────────────────────────────────────────────────────────────

/// A single node: kind, typed properties and script handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    properties: BTreeMap<String, PropValue>,
    handlers: BTreeMap<String, String>,
}

impl Node {
    /// A node with a fresh id and every property at its default.
    pub fn new(kind: NodeKind) -> Self {
        let properties = kind
            .schema()
            .iter()
            .map(|s| (s.key.to_string(), s.default_value()))
            .collect();
        Self {
            id: NodeId::fresh(kind.tag()),
            kind,
            properties,
            handlers: BTreeMap::new(),
        }
    }

    pub fn named(kind: NodeKind, name: &str) -> Self {
        let mut node = Self::new(kind);
        node.properties
            .insert("name".to_string(), PropValue::text(name));
        node
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.properties.get(key)
    }

    /// Set a schema property, returning the previous value.
    ///
    /// Does not check sibling name uniqueness; use
    /// [`StackGraph::set_property`] for nodes that live in a document.
    pub fn set(&mut self, key: &str, value: PropValue) -> Result<PropValue> {
        let ty = self.kind.prop_type(key).ok_or_else(|| {
            Error::invalid(format!("{} has no property '{key}'", self.kind.tag()))
        })?;
        let value = value.conform(ty, key)?;
        if key == "name" && value.as_str().is_none_or(str::is_empty) {
            return Err(Error::invalid("name must not be empty"));
        }
        Ok(self
            .properties
            .insert(key.to_string(), value)
            .unwrap_or_else(|| PropValue::text("")))
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn name(&self) -> &str {
        self.get("name").and_then(PropValue::as_str).unwrap_or("")
    }

    pub fn position(&self) -> Point {
        self.get("position")
            .and_then(PropValue::as_point)
            .unwrap_or_default()
    }

    pub fn size(&self) -> Size {
        self.get("size").and_then(PropValue::as_size).unwrap_or_default()
    }

    pub fn hidden(&self) -> bool {
        self.get("hidden")
            .and_then(PropValue::as_bool)
            .unwrap_or(false)
    }

    /// Frame relative to the containing card or group.
    pub fn frame(&self) -> Rect {
        Rect::from_origin_size(self.position(), self.size())
    }

    pub fn handler(&self, event: &str) -> Option<&str> {
        self.handlers.get(event).map(String::as_str)
    }

    pub fn handlers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.handlers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Set (or with an empty source, clear) a handler. Returns the old source.
    pub fn set_handler(&mut self, event: &str, source: &str) -> Option<String> {
        if source.is_empty() {
            self.handlers.remove(event)
        } else {
            self.handlers.insert(event.to_string(), source.to_string())
        }
    }
}

/// An owned, detached node tree. Produced by removal, consumed by insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct Subtree {
    pub node: Node,
    pub children: Vec<Subtree>,
}

impl Subtree {
    pub fn leaf(node: Node) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.node.id
    }

    pub fn name(&self) -> &str {
        self.node.name()
    }

    /// Deep copy with newly minted ids (paste, duplicate).
    pub fn with_fresh_ids(&self) -> Subtree {
        let mut node = self.node.clone();
        node.id = NodeId::fresh(node.kind.tag());
        Subtree {
            node,
            children: self.children.iter().map(Subtree::with_fresh_ids).collect(),
        }
    }

    /// Every name in this tree, root first.
    pub fn names(&self) -> Vec<String> {
        let mut out = vec![self.name().to_string()];
        for child in &self.children {
            out.extend(child.names());
        }
        out
    }
}

// ─── Names ───────────────────────────────────────────────────────────────

/// Make `proposed` unique among `existing`.
///
/// A free name is returned unchanged. Otherwise trailing digits are stripped
/// and the smallest integer suffix ≥ 1 not in use is appended, so
/// `dedup_name("card", ["card", "card1"])` is `"card2"`.
pub fn dedup_name<S: AsRef<str>>(proposed: &str, existing: &[S]) -> String {
    let taken = |candidate: &str| existing.iter().any(|e| e.as_ref() == candidate);
    if !taken(proposed) {
        return proposed.to_string();
    }
    let base = proposed.trim_end_matches(|c: char| c.is_ascii_digit());
    next_available_name(base, existing)
}

/// `prefix` followed by the smallest integer ≥ 1 giving an unused name.
pub fn next_available_name<S: AsRef<str>>(prefix: &str, existing: &[S]) -> String {
    (1..)
        .map(|i| format!("{prefix}{i}"))
        .find(|candidate| !existing.iter().any(|e| e.as_ref() == candidate))
        .unwrap_or_else(|| prefix.to_string())
}

// ─── Stack graph ─────────────────────────────────────────────────────────

/// The complete stack document.
#[derive(Debug, Clone)]
pub struct StackGraph {
    graph: StableDiGraph<Node, ()>,
    root: NodeIndex,
    id_index: HashMap<NodeId, NodeIndex>,
    order: HashMap<NodeIndex, Vec<NodeIndex>>,
}

impl StackGraph {
    /// A new document: default stack with a single card named `card_1`.
    #[must_use]
    pub fn new() -> Self {
        let mut sg = Self::with_stack(Node::named(NodeKind::Stack, "stack"));
        let root = sg.root_id();
        let card = Subtree::leaf(Node::named(NodeKind::Card, "card_1"));
        // A bare stack always accepts its first card.
        let _ = sg.insert_child(root, card, 0);
        sg
    }

    /// A document holding only `stack` and no cards. Callers must add at
    /// least one card before handing the graph out.
    pub(crate) fn with_stack(stack: Node) -> Self {
        let mut graph = StableDiGraph::new();
        let id = stack.id;
        let root = graph.add_node(stack);
        let mut id_index = HashMap::new();
        id_index.insert(id, root);
        Self {
            graph,
            root,
            id_index,
            order: HashMap::new(),
        }
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn root_id(&self) -> NodeId {
        self.graph[self.root].id
    }

    pub fn stack(&self) -> &Node {
        &self.graph[self.root]
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.graph[idx]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.index_of(id).map(|idx| &self.graph[idx])
    }

    pub fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        self.id_index.get(&id).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.id_index.contains_key(&id)
    }

    fn require(&self, id: NodeId) -> Result<NodeIndex> {
        self.index_of(id)
            .ok_or_else(|| Error::not_found(format!("node {id}")))
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.get(id).map(|n| n.kind)
    }

    pub fn parent(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph.neighbors_directed(idx, Direction::Incoming).next()
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.index_of(id)
            .and_then(|idx| self.parent(idx))
            .map(|p| self.graph[p].id)
    }

    /// Children in document order (back to front for views).
    pub fn children(&self, idx: NodeIndex) -> &[NodeIndex] {
        self.order.get(&idx).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn child_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.index_of(id)
            .map(|idx| self.children(idx).iter().map(|&c| self.graph[c].id).collect())
            .unwrap_or_default()
    }

    /// Position of `id` among its parent's children.
    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let idx = self.index_of(id)?;
        let parent = self.parent(idx)?;
        self.children(parent).iter().position(|&c| c == idx)
    }

    pub fn card_count(&self) -> usize {
        self.children(self.root).len()
    }

    pub fn card_at(&self, index: usize) -> Option<NodeId> {
        self.children(self.root)
            .get(index)
            .map(|&idx| self.graph[idx].id)
    }

    pub fn card_ids(&self) -> Vec<NodeId> {
        self.child_ids(self.root_id())
    }

    /// Index of a card among the stack's cards.
    pub fn card_index_of(&self, card: NodeId) -> Option<usize> {
        let idx = self.index_of(card)?;
        self.children(self.root).iter().position(|&c| c == idx)
    }

    /// The card a node lives on (a card is its own card).
    pub fn card_of(&self, id: NodeId) -> Option<NodeId> {
        let mut idx = self.index_of(id)?;
        loop {
            let node = &self.graph[idx];
            match node.kind {
                NodeKind::Card => return Some(node.id),
                NodeKind::Stack => return None,
                _ => idx = self.parent(idx)?,
            }
        }
    }

    /// Nodes below `idx` in pre-order, excluding `idx` itself.
    pub fn descendants(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeIndex> = self.children(idx).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    pub fn sibling_names(&self, parent: NodeId) -> Vec<String> {
        self.index_of(parent)
            .map(|idx| {
                self.children(idx)
                    .iter()
                    .map(|&c| self.graph[c].name().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every view name on a card, including views nested in groups.
    pub fn names_in_card(&self, card: NodeId) -> Vec<String> {
        let Some(idx) = self.index_of(card) else {
            return Vec::new();
        };
        let mut names = vec![self.graph[idx].name().to_string()];
        names.extend(
            self.descendants(idx)
                .into_iter()
                .map(|d| self.graph[d].name().to_string()),
        );
        names
    }

    /// Snapshot of the subtree rooted at `id` (the document keeps it).
    pub fn subtree(&self, id: NodeId) -> Option<Subtree> {
        self.index_of(id).map(|idx| self.snapshot(idx))
    }

    fn snapshot(&self, idx: NodeIndex) -> Subtree {
        Subtree {
            node: self.graph[idx].clone(),
            children: self
                .children(idx)
                .iter()
                .map(|&c| self.snapshot(c))
                .collect(),
        }
    }

    // ─── Structural mutation ─────────────────────────────────────────────

    /// Insert `subtree` as the `index`-th child of `parent`.
    ///
    /// Fails without touching the document when the index is outside
    /// `0..=len`, the parent cannot hold the child's kind, the child's name
    /// is already used by a sibling, or any id in the subtree is already in
    /// the document. Names are never changed here; callers deduplicate.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        subtree: Subtree,
        index: usize,
    ) -> Result<NodeIndex> {
        let parent_idx = self.require(parent)?;
        let len = self.children(parent_idx).len();
        if index > len {
            return Err(Error::InvalidIndex { index, len });
        }
        let parent_kind = self.graph[parent_idx].kind;
        let mut seen = HashSet::new();
        self.validate_subtree(parent_kind, &subtree, &mut seen)?;
        if self
            .sibling_names(parent)
            .iter()
            .any(|n| n == subtree.name())
        {
            return Err(Error::invalid(format!(
                "name '{}' is already used in {}",
                subtree.name(),
                self.graph[parent_idx].name()
            )));
        }
        Ok(self.attach(parent_idx, subtree, index))
    }

    fn validate_subtree(
        &self,
        parent_kind: NodeKind,
        sub: &Subtree,
        seen: &mut HashSet<NodeId>,
    ) -> Result<()> {
        if !parent_kind.accepts_child(sub.node.kind) {
            return Err(Error::invalid(format!(
                "a {} cannot contain a {}",
                parent_kind.tag(),
                sub.node.kind.tag()
            )));
        }
        if sub.name().is_empty() {
            return Err(Error::invalid("name must not be empty"));
        }
        if self.contains(sub.id()) || !seen.insert(sub.id()) {
            return Err(Error::invalid(format!("node {} is already attached", sub.id())));
        }
        let mut names = HashSet::new();
        for child in &sub.children {
            if !names.insert(child.name()) {
                return Err(Error::invalid(format!(
                    "duplicate name '{}' inside {}",
                    child.name(),
                    sub.name()
                )));
            }
            self.validate_subtree(sub.node.kind, child, seen)?;
        }
        Ok(())
    }

    fn attach(&mut self, parent: NodeIndex, sub: Subtree, index: usize) -> NodeIndex {
        let Subtree { node, children } = sub;
        let id = node.id;
        let idx = self.graph.add_node(node);
        self.graph.add_edge(parent, idx, ());
        self.id_index.insert(id, idx);
        self.order.entry(parent).or_default().insert(index, idx);
        for (i, child) in children.into_iter().enumerate() {
            self.attach(idx, child, i);
        }
        idx
    }

    /// Detach `child` (and everything below it) from `parent`.
    ///
    /// The returned subtree keeps its ids so it can be re-inserted later.
    /// A stack's last card cannot be removed.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<Subtree> {
        let parent_idx = self.require(parent)?;
        let child_idx = self.index_of(child).filter(|&c| self.parent(c) == Some(parent_idx));
        let Some(child_idx) = child_idx else {
            return Err(Error::not_found(format!(
                "{child} is not a child of {}",
                self.graph[parent_idx].name()
            )));
        };
        if parent_idx == self.root && self.card_count() == 1 {
            return Err(Error::invalid("a stack must keep at least one card"));
        }
        if let Some(order) = self.order.get_mut(&parent_idx) {
            order.retain(|&c| c != child_idx);
        }
        self.detach(child_idx)
            .ok_or_else(|| Error::not_found(format!("node {child}")))
    }

    /// Remove `id` from wherever it lives. Returns its former parent, index
    /// and the detached subtree.
    pub fn remove(&mut self, id: NodeId) -> Result<(NodeId, usize, Subtree)> {
        let parent = self
            .parent_of(id)
            .ok_or_else(|| Error::invalid("the stack itself cannot be removed"))?;
        let index = self
            .index_in_parent(id)
            .ok_or_else(|| Error::not_found(format!("node {id}")))?;
        let subtree = self.remove_child(parent, id)?;
        Ok((parent, index, subtree))
    }

    fn detach(&mut self, idx: NodeIndex) -> Option<Subtree> {
        let child_idxs = self.order.remove(&idx).unwrap_or_default();
        let node = self.graph.remove_node(idx)?;
        self.id_index.remove(&node.id);
        let children = child_idxs
            .into_iter()
            .filter_map(|c| self.detach(c))
            .collect();
        Some(Subtree { node, children })
    }

    /// Replace the child order of `parent` with `new_order`, which must be a
    /// permutation of its current children. Returns the previous order.
    pub fn reorder_children(&mut self, parent: NodeId, new_order: &[NodeId]) -> Result<Vec<NodeId>> {
        let parent_idx = self.require(parent)?;
        let current = self.child_ids(parent);
        let mut sorted_current = current.clone();
        sorted_current.sort();
        let mut sorted_new = new_order.to_vec();
        sorted_new.sort();
        if sorted_current != sorted_new {
            return Err(Error::invalid(
                "new order must be a permutation of the current children",
            ));
        }
        let idxs: Vec<NodeIndex> = new_order
            .iter()
            .filter_map(|id| self.index_of(*id))
            .collect();
        self.order.insert(parent_idx, idxs);
        Ok(current)
    }

    // ─── Properties & handlers ───────────────────────────────────────────

    pub fn property(&self, id: NodeId, key: &str) -> Option<&PropValue> {
        self.get(id).and_then(|n| n.get(key))
    }

    /// Set a property on a node in the document, returning the old value.
    /// Renames are refused when a sibling already has the name.
    pub fn set_property(&mut self, id: NodeId, key: &str, value: PropValue) -> Result<PropValue> {
        let idx = self.require(id)?;
        if key == "name"
            && let (Some(name), Some(parent)) = (value.as_str(), self.parent(idx))
        {
            let clash = self
                .children(parent)
                .iter()
                .any(|&s| s != idx && self.graph[s].name() == name);
            if clash {
                return Err(Error::invalid(format!("name '{name}' is already used")));
            }
        }
        self.graph[idx].set(key, value)
    }

    /// Set or clear a handler; returns the previous source.
    pub fn set_handler(&mut self, id: NodeId, event: &str, source: &str) -> Result<Option<String>> {
        let idx = self.require(id)?;
        if event.is_empty() {
            return Err(Error::invalid("handler name must not be empty"));
        }
        Ok(self.graph[idx].set_handler(event, source))
    }

    // ─── Lookup ──────────────────────────────────────────────────────────

    /// Resolve a `.`-separated path of names starting at the stack.
    ///
    /// The first segment may also be a card index, so `"1.button1"` is the
    /// view `button1` on the second card.
    pub fn find_by_path(&self, path: &str) -> Option<NodeId> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self
            .child_named(self.root, first)
            .or_else(|| first.parse::<usize>().ok().and_then(|i| {
                self.children(self.root).get(i).copied()
            }))?;
        for segment in segments {
            current = self.child_named(current, segment)?;
        }
        Some(self.graph[current].id)
    }

    /// Resolve a path of names starting below `start`.
    pub fn find_by_path_from(&self, start: NodeId, path: &str) -> Option<NodeId> {
        let mut current = self.index_of(start)?;
        for segment in path.split('.') {
            current = self.child_named(current, segment)?;
        }
        Some(self.graph[current].id)
    }

    fn child_named(&self, parent: NodeIndex, name: &str) -> Option<NodeIndex> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&c| self.graph[c].name() == name)
    }

    // ─── Geometry ────────────────────────────────────────────────────────

    /// Frame of a view in card coordinates (group offsets applied).
    pub fn absolute_frame(&self, id: NodeId) -> Option<Rect> {
        let idx = self.index_of(id)?;
        let node = &self.graph[idx];
        if !node.kind.has_geometry() {
            return None;
        }
        let mut frame = node.frame();
        let mut cursor = self.parent(idx);
        while let Some(p) = cursor {
            let parent = &self.graph[p];
            if parent.kind != NodeKind::Group {
                break;
            }
            let origin = parent.position();
            frame = frame.translated(origin.x, origin.y);
            cursor = self.parent(p);
        }
        Some(frame)
    }

    /// Union of a group's children frames, in the group's coordinates.
    pub fn children_bounds(&self, group: NodeId) -> Option<Rect> {
        let idx = self.index_of(group)?;
        self.children(idx)
            .iter()
            .map(|&c| self.graph[c].frame())
            .reduce(|a, b| a.union(&b))
    }

    /// Refit a group to its children: the group moves to the children's
    /// top-left and children are shifted so the union starts at (0, 0).
    pub fn fit_group_to_children(&mut self, group: NodeId) -> Result<()> {
        let idx = self.require(group)?;
        if self.graph[idx].kind != NodeKind::Group {
            return Err(Error::invalid(format!("{group} is not a group")));
        }
        let Some(bounds) = self.children_bounds(group) else {
            return Ok(());
        };
        for child in self.children(idx).to_vec() {
            let pos = self.graph[child].position().offset(-bounds.x, -bounds.y);
            self.graph[child].set("position", PropValue::Point(pos))?;
        }
        let origin = self.graph[idx].position().offset(bounds.x, bounds.y);
        self.graph[idx].set("position", PropValue::Point(origin))?;
        self.graph[idx].set("size", PropValue::Size(bounds.size()))?;
        Ok(())
    }

    /// Topmost visible view on `card` containing `point`. A hit on a
    /// group's child reports the group.
    pub fn hit_test(&self, card: NodeId, point: Point) -> Option<NodeId> {
        let card_idx = self.index_of(card)?;
        self.children(card_idx)
            .iter()
            .rev()
            .copied()
            .find(|&c| self.hits(c, point))
            .map(|c| self.graph[c].id)
    }

    fn hits(&self, idx: NodeIndex, point: Point) -> bool {
        let node = &self.graph[idx];
        if node.hidden() {
            return false;
        }
        if node.kind == NodeKind::Group {
            let origin = node.position();
            let local = point.offset(-origin.x, -origin.y);
            return self.children(idx).iter().any(|&c| self.hits(c, local));
        }
        node.frame().contains(point)
    }
}

impl Default for StackGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn button(name: &str, x: f64, y: f64) -> Subtree {
        let mut node = Node::named(NodeKind::Button, name);
        node.set("position", PropValue::Point(Point::new(x, y))).unwrap();
        Subtree::leaf(node)
    }

    #[test]
    fn new_document_has_one_card() {
        let sg = StackGraph::new();
        assert_eq!(sg.card_count(), 1);
        let card = sg.card_at(0).unwrap();
        assert_eq!(sg.get(card).unwrap().name(), "card_1");
        assert_eq!(sg.parent_of(card), Some(sg.root_id()));
    }

    #[test]
    fn dedup_appends_smallest_free_suffix() {
        assert_eq!(dedup_name("card", &["card", "card1"]), "card2");
        assert_eq!(dedup_name("fresh", &["card"]), "fresh");
        assert_eq!(dedup_name("button_3", &["button_3"]), "button_1");
        assert_eq!(dedup_name("card", &["card", "card1"]), "card2");
        assert_eq!(next_available_name("group_", &["group_1"]), "group_2");
    }

    #[test]
    fn insert_rejects_bad_index_and_kind() {
        let mut sg = StackGraph::new();
        let card = sg.card_at(0).unwrap();
        let err = sg.insert_child(card, button("b", 0.0, 0.0), 3).unwrap_err();
        assert!(matches!(err, Error::InvalidIndex { index: 3, len: 0 }));

        let root = sg.root_id();
        let err = sg.insert_child(root, button("b", 0.0, 0.0), 0).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert_eq!(sg.card_count(), 1);
    }

    #[test]
    fn insert_rejects_sibling_name_clash() {
        let mut sg = StackGraph::new();
        let card = sg.card_at(0).unwrap();
        sg.insert_child(card, button("go", 0.0, 0.0), 0).unwrap();
        assert!(sg.insert_child(card, button("go", 5.0, 0.0), 1).is_err());
        assert_eq!(sg.child_ids(card).len(), 1);
    }

    #[test]
    fn remove_returns_detached_subtree() {
        let mut sg = StackGraph::new();
        let card = sg.card_at(0).unwrap();
        let b = button("go", 1.0, 2.0);
        let id = b.id();
        sg.insert_child(card, b.clone(), 0).unwrap();

        let removed = sg.remove_child(card, id).unwrap();
        assert_eq!(removed, b);
        assert!(!sg.contains(id));
        assert!(sg.parent_of(id).is_none());

        let err = sg.remove_child(card, id).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));

        sg.insert_child(card, removed, 0).unwrap();
        assert_eq!(sg.parent_of(id), Some(card));
    }

    #[test]
    fn last_card_cannot_be_removed() {
        let mut sg = StackGraph::new();
        let root = sg.root_id();
        let card = sg.card_at(0).unwrap();
        assert!(sg.remove_child(root, card).is_err());
    }

    #[test]
    fn find_by_path_uses_names_or_card_index() {
        let mut sg = StackGraph::new();
        let root = sg.root_id();
        for name in ["card_2", "card_3"] {
            let n = sg.card_count();
            sg.insert_child(root, Subtree::leaf(Node::named(NodeKind::Card, name)), n)
                .unwrap();
        }
        let second = sg.card_at(1).unwrap();
        let b = button("button1", 0.0, 0.0);
        let bid = b.id();
        sg.insert_child(second, b, 0).unwrap();

        assert_eq!(sg.find_by_path("1.button1"), Some(bid));
        assert_eq!(sg.find_by_path("card_2.button1"), Some(bid));
        assert_eq!(sg.find_by_path("5.x"), None);
        assert_eq!(sg.find_by_path("0.button1"), None);
    }

    #[test]
    fn rename_checks_siblings() {
        let mut sg = StackGraph::new();
        let card = sg.card_at(0).unwrap();
        let a = button("a", 0.0, 0.0);
        let aid = a.id();
        sg.insert_child(card, a, 0).unwrap();
        sg.insert_child(card, button("b", 0.0, 0.0), 1).unwrap();
        assert!(sg.set_property(aid, "name", PropValue::text("b")).is_err());
        let old = sg.set_property(aid, "name", PropValue::text("c")).unwrap();
        assert_eq!(old, PropValue::text("a"));
    }

    #[test]
    fn group_fit_and_hit_test() {
        let mut sg = StackGraph::new();
        let card = sg.card_at(0).unwrap();
        let mut group = Subtree::leaf(Node::named(NodeKind::Group, "group_1"));
        group.children.push(button("a", 10.0, 20.0));
        group.children.push(button("b", 50.0, 60.0));
        let gid = group.id();
        sg.insert_child(card, group, 0).unwrap();
        sg.fit_group_to_children(gid).unwrap();

        let g = sg.get(gid).unwrap();
        assert_eq!(g.position(), Point::new(10.0, 20.0));
        assert_eq!(g.size(), Size::new(140.0, 64.0));
        let b = sg.find_by_path("0.group_1.b").unwrap();
        assert_eq!(sg.absolute_frame(b).unwrap().origin(), Point::new(50.0, 60.0));

        assert_eq!(sg.hit_test(card, Point::new(55.0, 65.0)), Some(gid));
        assert_eq!(sg.hit_test(card, Point::new(300.0, 300.0)), None);
    }

    #[test]
    fn reorder_requires_permutation() {
        let mut sg = StackGraph::new();
        let card = sg.card_at(0).unwrap();
        let a = button("a", 0.0, 0.0);
        let b = button("b", 0.0, 0.0);
        let (aid, bid) = (a.id(), b.id());
        sg.insert_child(card, a, 0).unwrap();
        sg.insert_child(card, b, 1).unwrap();
        assert!(sg.reorder_children(card, &[aid]).is_err());
        let old = sg.reorder_children(card, &[bid, aid]).unwrap();
        assert_eq!(old, vec![aid, bid]);
        assert_eq!(sg.child_ids(card), vec![bid, aid]);
    }
}
