//! One running stack on the call stack.

use crate::timers::TimerSet;
use crate::worker::ScriptWorker;
use cds_core::host::ScriptValue;
use cds_editor::manager::StackManager;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Identifies a frame for as long as it lives. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub(crate) u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A loaded stack with its own undo history, script worker and timers.
pub struct ExecutionFrame {
    id: FrameId,
    manager: StackManager,
    path: Option<PathBuf>,
    /// Card index recorded when the frame was suspended.
    saved_card: usize,
    /// Showing its card: started or resumed and not suspended since.
    active: bool,
    worker: ScriptWorker,
    timers: TimerSet,
    setup_value: Option<ScriptValue>,
}

impl ExecutionFrame {
    pub(crate) fn new(
        id: FrameId,
        manager: StackManager,
        path: Option<PathBuf>,
        worker: ScriptWorker,
        timers: TimerSet,
        setup_value: Option<ScriptValue>,
    ) -> Self {
        Self {
            id,
            manager,
            path,
            saved_card: 0,
            active: false,
            worker,
            timers,
            setup_value,
        }
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn manager(&self) -> &StackManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut StackManager {
        &mut self.manager
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn setup_value(&self) -> Option<&ScriptValue> {
        self.setup_value.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn saved_card(&self) -> usize {
        self.saved_card
    }

    pub fn worker(&self) -> &ScriptWorker {
        &self.worker
    }

    pub fn timers(&self) -> &TimerSet {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut TimerSet {
        &mut self.timers
    }

    /// Run `OnSetup` on the stack and then on every card and view in
    /// document order. Returns how many handlers were queued.
    pub(crate) fn run_setup(&mut self) -> usize {
        let graph = self.manager.graph();
        let root = graph.root();
        let mut order = vec![graph.root_id()];
        order.extend(graph.descendants(root).into_iter().map(|idx| graph.node(idx).id));
        order
            .into_iter()
            .filter(|&id| self.manager.run_handler(id, "OnSetup", None))
            .count()
    }

    /// Show the starting card and start the cadence.
    pub(crate) fn start(&mut self, card_index: usize, now: Instant) {
        self.manager.enter_card(card_index);
        self.timers.start_cadence(now);
        self.active = true;
    }

    /// Record the active card, hide it and stop every timer.
    pub(crate) fn suspend(&mut self) {
        self.saved_card = self.manager.card_index();
        self.manager.leave_card();
        self.active = false;
        let cancelled = self.timers.stop();
        if cancelled > 0 {
            log::debug!("frame {}: cancelled {cancelled} pending timers", self.id);
        }
    }

    /// Show the saved card again and restart the cadence. Cancelled sends
    /// stay cancelled.
    pub(crate) fn resume(&mut self, now: Instant) {
        self.manager.enter_card(self.saved_card);
        self.timers.start_cadence(now);
        self.active = true;
    }

    /// Hide the card (unless already hidden by a suspend), stop timers and
    /// terminate the worker.
    pub(crate) fn teardown(&mut self) {
        if self.active {
            self.manager.leave_card();
            self.active = false;
        }
        self.timers.stop();
        self.worker.terminate();
    }

    /// Send `OnPeriodic` to the current card and everything on it.
    pub(crate) fn dispatch_periodic(&mut self) -> usize {
        let card = self.manager.current_card();
        let graph = self.manager.graph();
        let Some(idx) = graph.index_of(card) else {
            return 0;
        };
        let mut targets = vec![card];
        targets.extend(graph.descendants(idx).into_iter().map(|i| graph.node(i).id));
        targets
            .into_iter()
            .filter(|&id| self.manager.run_handler(id, "OnPeriodic", None))
            .count()
    }
}
