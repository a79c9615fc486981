//! Tool system for designer interactions.
//!
//! Each tool translates input events into `StackManager` operations. Drags
//! run inside a gesture so a whole drag undoes in one step.
//!
//! ## Modifier behaviors
//!
//! | Modifier | Hand Tool | View Tools |
//! |----------|-----------|------------|
//! | **Shift** | Extend selection / axis-constrain drag | Square frame |

use crate::input::InputEvent;
use crate::manager::StackManager;
use crate::shortcuts::{ShortcutAction, ShortcutMap};
use cds_core::error::Result;
use cds_core::geometry::{Point, Rect};
use cds_core::id::NodeId;
use cds_core::model::{Node, NodeKind, ShapeKind, Subtree};
use cds_core::value::PropValue;

/// Drags shorter than this on both axes create a default-sized view.
const MIN_DRAG: f64 = 3.0;

/// The active tool determines how input events are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Select, move and resize views.
    Hand,
    /// Drag out a new view of the given kind.
    Create(NodeKind),
}

/// Trait for tools that turn input into edits.
pub trait Tool {
    fn kind(&self) -> ToolKind;

    /// Handle a pointer event. Returns `true` once the tool has finished
    /// its job and the host should return to the hand tool.
    fn handle(&mut self, event: &InputEvent, manager: &mut StackManager) -> Result<bool>;
}

pub fn make_tool(kind: ToolKind) -> Box<dyn Tool> {
    match kind {
        ToolKind::Hand => Box::new(HandTool::new()),
        ToolKind::Create(kind) => Box::new(ViewTool::new(kind)),
    }
}

// ─── Hand Tool ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Drag {
    Move { last: Point },
    Resize { id: NodeId, frame: Rect, start: Point },
}

#[derive(Debug, Default)]
pub struct HandTool {
    drag: Option<Drag>,
}

impl HandTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// The single selected top-level view whose resize handle is under `p`.
    fn resize_target(manager: &StackManager, p: Point) -> Option<(NodeId, Rect)> {
        let [id] = manager.selection().ids() else {
            return None;
        };
        if manager.graph().parent_of(*id) != Some(manager.current_card()) {
            return None;
        }
        let frame = manager.frame_of(*id)?;
        let h = manager.config().resize_handle;
        let handle = Rect::new(frame.right() - h, frame.bottom() - h, h, h);
        handle.contains(p).then_some((*id, frame))
    }
}

impl Tool for HandTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Hand
    }

    fn handle(&mut self, event: &InputEvent, manager: &mut StackManager) -> Result<bool> {
        match event {
            InputEvent::PointerDown { x, y, modifiers } => {
                let p = Point::new(*x, *y);
                if let Some((id, frame)) = Self::resize_target(manager, p) {
                    manager.begin_gesture("Resize");
                    self.drag = Some(Drag::Resize {
                        id,
                        frame,
                        start: p,
                    });
                    return Ok(false);
                }
                match manager.hit_test(p) {
                    Some(hit) => {
                        if modifiers.shift {
                            manager.select(Some(hit), true);
                        } else if !manager.selection().contains(hit) {
                            manager.select(Some(hit), false);
                        }
                        if manager.selection().contains(hit) {
                            manager.begin_gesture("Move");
                            self.drag = Some(Drag::Move { last: p });
                        }
                    }
                    None => manager.select(None, false),
                }
                Ok(false)
            }
            InputEvent::PointerMove { x, y, modifiers } => {
                let p = Point::new(*x, *y);
                match self.drag {
                    Some(Drag::Move { last }) => {
                        let mut dx = p.x - last.x;
                        let mut dy = p.y - last.y;
                        if modifiers.shift {
                            if dx.abs() > dy.abs() {
                                dy = 0.0;
                            } else {
                                dx = 0.0;
                            }
                        }
                        let ids: Vec<NodeId> = manager
                            .selection()
                            .ids()
                            .iter()
                            .copied()
                            .filter(|&id| manager.graph().kind(id).is_some_and(NodeKind::is_view))
                            .collect();
                        manager.move_views(&ids, dx, dy)?;
                        self.drag = Some(Drag::Move {
                            last: Point::new(last.x + dx, last.y + dy),
                        });
                    }
                    Some(Drag::Resize { id, frame, start }) => {
                        let width = (frame.width + p.x - start.x).max(0.0);
                        let height = (frame.height + p.y - start.y).max(0.0);
                        manager.resize_view(id, Rect::new(frame.x, frame.y, width, height))?;
                    }
                    None => {}
                }
                Ok(false)
            }
            InputEvent::PointerUp { .. } => {
                if self.drag.take().is_some() {
                    manager.end_gesture();
                }
                Ok(false)
            }
            InputEvent::Key { .. } => Ok(false),
        }
    }
}

// ─── View Tool ───────────────────────────────────────────────────────────

/// Drags out a new view. Pen shapes record the pointer path; lines record
/// their two end points.
pub struct ViewTool {
    kind: NodeKind,
    start: Option<Point>,
    points: Vec<Point>,
}

impl ViewTool {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            start: None,
            points: Vec::new(),
        }
    }

    fn frame_for(&self, start: Point, end: Point, square: bool) -> Rect {
        if self.kind == NodeKind::Shape(ShapeKind::Pen) {
            return self
                .points
                .iter()
                .map(|&p| Rect::from_origin_size(p, Default::default()))
                .reduce(|a, b| a.union(&b))
                .unwrap_or_else(|| Rect::from_corners(start, end));
        }
        let mut end = end;
        if square {
            let side = (end.x - start.x).abs().max((end.y - start.y).abs());
            end = Point::new(
                start.x + side.copysign(end.x - start.x),
                start.y + side.copysign(end.y - start.y),
            );
        }
        let rect = Rect::from_corners(start, end);
        if rect.width < MIN_DRAG && rect.height < MIN_DRAG && !matches!(self.kind, NodeKind::Shape(_)) {
            return Rect::from_origin_size(start, Node::new(self.kind).size());
        }
        rect
    }

    fn build(&self, frame: Rect, start: Point, end: Point) -> Result<Subtree> {
        let mut node = Node::named(self.kind, &format!("{}1", self.kind.name_prefix()));
        node.set("position", PropValue::Point(frame.origin()))?;
        node.set("size", PropValue::Size(frame.size()))?;
        let local = |p: Point| p.offset(-frame.x, -frame.y);
        match self.kind {
            NodeKind::Shape(ShapeKind::Pen) => {
                let points = self.points.iter().map(|&p| local(p)).collect();
                node.set("points", PropValue::Points(points))?;
            }
            NodeKind::Shape(ShapeKind::Line) => {
                node.set("points", PropValue::Points(vec![local(start), local(end)]))?;
            }
            _ => {}
        }
        Ok(Subtree::leaf(node))
    }
}

impl Tool for ViewTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Create(self.kind)
    }

    fn handle(&mut self, event: &InputEvent, manager: &mut StackManager) -> Result<bool> {
        match event {
            InputEvent::PointerDown { x, y, .. } => {
                let p = Point::new(*x, *y);
                self.start = Some(p);
                self.points = vec![p];
                Ok(false)
            }
            InputEvent::PointerMove { x, y, .. } => {
                if self.start.is_some() {
                    self.points.push(Point::new(*x, *y));
                }
                Ok(false)
            }
            InputEvent::PointerUp { x, y, modifiers } => {
                let Some(start) = self.start.take() else {
                    return Ok(false);
                };
                let end = Point::new(*x, *y);
                self.points.push(end);
                let frame = self.frame_for(start, end, modifiers.shift);
                let view = self.build(frame, start, end)?;
                self.points.clear();
                manager.add_views(vec![view], "Add View")?;
                Ok(true)
            }
            InputEvent::Key { .. } => Ok(false),
        }
    }
}

// ─── Tool state ──────────────────────────────────────────────────────────

/// The active tool plus keyboard routing.
pub struct ToolState {
    current: Box<dyn Tool>,
}

impl Default for ToolState {
    fn default() -> Self {
        Self {
            current: make_tool(ToolKind::Hand),
        }
    }
}

impl ToolState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(&self) -> ToolKind {
        self.current.kind()
    }

    pub fn set_tool(&mut self, kind: ToolKind) {
        if kind != self.current.kind() {
            log::debug!("tool: {kind:?}");
            self.current = make_tool(kind);
        }
    }

    /// Route an event: keys go through the shortcut map, pointer events to
    /// the active tool. A view tool hands back to the hand tool once its
    /// view is placed.
    pub fn handle(&mut self, event: &InputEvent, manager: &mut StackManager) -> Result<()> {
        if let InputEvent::Key { key, modifiers } = event {
            match ShortcutMap::resolve(key, *modifiers) {
                Some(ShortcutAction::Tool(kind)) => self.set_tool(kind),
                Some(action) => {
                    manager.handle_shortcut(action)?;
                }
                None => {}
            }
            return Ok(());
        }
        if self.current.handle(event, manager)? {
            self.set_tool(ToolKind::Hand);
        }
        Ok(())
    }
}
