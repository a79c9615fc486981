//! The nested-stack call stack.
//!
//! `ExecutionController` lives on the main context and owns every running
//! frame. The top frame is current; frames below it are suspended with their
//! card index saved and their timers stopped. Scripts reach the controller
//! only through requests marshalled by their `ScriptContext`, which the host
//! drains with `pump`, `tick` or `run_until_idle`.

use crate::config::RuntimeConfig;
use crate::engine::{EngineFactory, ScriptContext};
use crate::error::{Result, RuntimeError};
use crate::frame::{ExecutionFrame, FrameId};
use crate::marshal::{CancelToken, MainHandle, MainQueue, run_jobs};
use crate::timers::{TimerEvent, TimerSet};
use crate::worker::ScriptWorker;
use cds_core::host::ScriptValue;
use cds_core::model::StackGraph;
use cds_core::resolve::{StackLoader, resolve_relative};
use cds_editor::manager::StackManager;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub struct ExecutionController {
    frames: Vec<ExecutionFrame>,
    queue: MainQueue<ExecutionController>,
    factory: Box<dyn EngineFactory>,
    loader: Arc<dyn StackLoader>,
    config: RuntimeConfig,
    next_id: u64,
}

impl ExecutionController {
    pub fn new(
        factory: impl EngineFactory + 'static,
        loader: Arc<dyn StackLoader>,
        config: RuntimeConfig,
    ) -> Self {
        Self {
            frames: Vec::new(),
            queue: MainQueue::new(),
            factory: Box::new(factory),
            loader,
            config,
            next_id: 1,
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    /// Sender for requests from other threads.
    pub fn handle(&self) -> MainHandle<Self> {
        self.queue.handle()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Number of frames on the call stack.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn current(&self) -> Option<&ExecutionFrame> {
        self.frames.last()
    }

    pub fn current_mut(&mut self) -> Option<&mut ExecutionFrame> {
        self.frames.last_mut()
    }

    pub fn current_id(&self) -> Option<FrameId> {
        self.current().map(ExecutionFrame::id)
    }

    /// The current frame's stack.
    pub fn manager(&self) -> Option<&StackManager> {
        self.current().map(ExecutionFrame::manager)
    }

    pub fn manager_mut(&mut self) -> Option<&mut StackManager> {
        self.current_mut().map(ExecutionFrame::manager_mut)
    }

    pub fn frame(&self, id: FrameId) -> Option<&ExecutionFrame> {
        self.frames.iter().find(|f| f.id() == id)
    }

    pub fn frame_mut(&mut self, id: FrameId) -> Option<&mut ExecutionFrame> {
        self.frames.iter_mut().find(|f| f.id() == id)
    }

    pub fn frames(&self) -> &[ExecutionFrame] {
        &self.frames
    }

    /// Frame `id` if it is the current one. Scripts only ever mutate the
    /// frame on top.
    pub fn active_frame_mut(&mut self, id: FrameId) -> Result<&mut ExecutionFrame> {
        let Some(index) = self.frames.iter().position(|f| f.id() == id) else {
            return Err(RuntimeError::Terminated);
        };
        if index + 1 != self.frames.len() {
            return Err(RuntimeError::Suspended);
        }
        Ok(&mut self.frames[index])
    }

    // ─── Call stack ──────────────────────────────────────────────────────

    /// Run `graph` as the root stack.
    pub fn start(&mut self, graph: StackGraph, path: Option<PathBuf>, card_index: usize) -> Result<FrameId> {
        if !self.frames.is_empty() {
            return Err(RuntimeError::AlreadyRunning);
        }
        self.push_frame(graph, path, card_index, None)
    }

    /// Load the stack at `path` and run it as the root stack.
    pub fn open(&mut self, path: &Path, card_index: usize) -> Result<FrameId> {
        let graph = self.loader.load(path)?;
        self.start(graph, Some(path.to_path_buf()), card_index)
    }

    /// Call the stack at `target`, resolved against the current stack's
    /// file. Nothing changes if the target cannot be loaded.
    pub fn call(&mut self, target: &str, card_index: usize, value: ScriptValue) -> Result<FrameId> {
        let current = self.current().ok_or(RuntimeError::NotRunning)?;
        let path = resolve_relative(current.path(), target);
        let graph = self.loader.load(&path)?;
        self.push_frame(graph, Some(path), card_index, Some(value))
    }

    /// Push a new frame for `graph`.
    ///
    /// The caller's active card is recorded, its card hidden and its timers
    /// stopped. The new frame runs `OnSetup`, then shows `card_index` (the
    /// first card when out of range).
    pub fn push_frame(
        &mut self,
        graph: StackGraph,
        path: Option<PathBuf>,
        card_index: usize,
        setup_value: Option<ScriptValue>,
    ) -> Result<FrameId> {
        let id = FrameId(self.next_id);
        let token = CancelToken::new();
        let cx = ScriptContext::new(
            id,
            self.queue.handle(),
            token.clone(),
            Arc::clone(&self.loader),
            path.clone(),
            setup_value.clone(),
        );
        let worker = ScriptWorker::spawn(format!("cds-script-{}", id.0), token, self.factory.create(), cx)?;
        self.next_id += 1;

        let mut manager = StackManager::from_graph(graph, self.config.editor);
        manager.set_path(path.clone());
        manager.set_editing(false);
        manager.set_runner(Some(Box::new(worker.runner())));
        let timers = TimerSet::new(self.config.periodic_interval());
        let mut frame = ExecutionFrame::new(id, manager, path, worker, timers, setup_value);

        if let Some(caller) = self.frames.last_mut() {
            caller.suspend();
        }
        frame.run_setup();
        frame.start(card_index, Instant::now());
        log::info!(
            "pushed frame {id} ({}), depth {}",
            frame.path().map_or_else(|| "untitled".into(), |p| p.display().to_string()),
            self.frames.len() + 1
        );
        self.frames.push(frame);
        Ok(id)
    }

    /// Pop the current frame and hand `value` to the frame below, which
    /// resumes at the card it was on when it made the call.
    pub fn return_from(&mut self, value: ScriptValue) -> Result<()> {
        match self.frames.len() {
            0 => return Err(RuntimeError::NotRunning),
            1 => return Err(RuntimeError::CannotReturnFromRoot),
            _ => {}
        }
        if let Some(mut popped) = self.frames.pop() {
            popped.teardown();
            log::info!("popped frame {}, depth {}", popped.id(), self.frames.len());
        }
        if let Some(caller) = self.frames.last_mut() {
            caller.resume(Instant::now());
            caller.worker().deliver_return(value);
        }
        Ok(())
    }

    /// Tear down every nested frame without return values and terminate the
    /// root stack's worker. The root frame stays inspectable.
    pub fn shutdown(&mut self) {
        while self.frames.len() > 1 {
            if let Some(mut frame) = self.frames.pop() {
                frame.teardown();
            }
        }
        if let Some(root) = self.frames.last_mut() {
            root.teardown();
        }
        // Requests still queued came from terminated workers.
        self.pump();
        log::info!("runtime shut down");
    }

    // ─── Main-context loop ───────────────────────────────────────────────

    /// Run every request marshalled so far. Returns how many ran.
    pub fn pump(&mut self) -> usize {
        let mut ran = 0;
        loop {
            let jobs = self.queue.drain();
            if jobs.is_empty() {
                return ran;
            }
            ran += run_jobs(jobs, self);
        }
    }

    /// Pump requests, then fire the current frame's due timers. Returns how
    /// many handlers were dispatched.
    pub fn tick(&mut self, now: Instant) -> usize {
        self.pump();
        let Some(frame) = self.frames.last_mut() else {
            return 0;
        };
        let mut dispatched = 0;
        for event in frame.timers_mut().due(now) {
            match event {
                TimerEvent::Periodic => dispatched += frame.dispatch_periodic(),
                TimerEvent::Send(send) => {
                    if frame
                        .manager_mut()
                        .run_handler(send.target, &send.event, send.payload.as_ref())
                    {
                        dispatched += 1;
                    }
                }
            }
        }
        dispatched
    }

    /// No worker has a job queued or running.
    pub fn is_idle(&self) -> bool {
        self.frames.iter().all(|f| f.worker().is_idle())
    }

    /// Pump requests until every worker is idle and nothing is queued, or
    /// `timeout` passes. Returns whether it went idle.
    pub fn run_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let idle = self.is_idle();
            let ran = self.pump();
            if idle && ran == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                log::warn!("scripts still busy after {timeout:?}");
                return false;
            }
            if ran == 0 {
                thread::sleep(self.config.idle_poll());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Invocation, ScriptEngine};
    use cds_core::resolve::MemoryLoader;

    struct Silent;

    impl ScriptEngine for Silent {
        fn run(&mut self, _cx: &ScriptContext, _invocation: &Invocation) -> Result<()> {
            Ok(())
        }

        fn on_stack_return(&mut self, _cx: &ScriptContext, _value: ScriptValue) {}
    }

    fn controller(loader: MemoryLoader) -> ExecutionController {
        let factory = || Box::new(Silent) as Box<dyn ScriptEngine>;
        ExecutionController::new(factory, Arc::new(loader), RuntimeConfig::default())
    }

    fn three_cards() -> StackGraph {
        let mut m = StackManager::new();
        m.add_card().unwrap();
        m.add_card().unwrap();
        m.graph().clone()
    }

    #[test]
    fn start_twice_fails() {
        let mut ctl = controller(MemoryLoader::new());
        ctl.start(StackGraph::new(), None, 0).unwrap();
        assert!(matches!(
            ctl.start(StackGraph::new(), None, 0),
            Err(RuntimeError::AlreadyRunning)
        ));
        assert_eq!(ctl.depth(), 1);
    }

    #[test]
    fn out_of_range_card_falls_back_to_first() {
        let mut ctl = controller(MemoryLoader::new());
        ctl.start(three_cards(), None, 7).unwrap();
        assert_eq!(ctl.manager().unwrap().card_index(), 0);
    }

    #[test]
    fn call_and_return_restore_card_index() {
        let loader = MemoryLoader::new();
        loader.insert_stack("stacks/sub.cds", &StackGraph::new()).unwrap();
        let mut ctl = controller(loader);
        ctl.start(three_cards(), Some("stacks/main.cds".into()), 2).unwrap();

        ctl.call("sub.cds", 0, ScriptValue::from(42)).unwrap();
        assert_eq!(ctl.depth(), 2);
        assert_eq!(ctl.current().unwrap().setup_value(), Some(&ScriptValue::from(42)));
        assert_eq!(ctl.frames()[0].saved_card(), 2);
        assert!(!ctl.frames()[0].timers().is_running());

        ctl.return_from(ScriptValue::from(7)).unwrap();
        assert_eq!(ctl.depth(), 1);
        assert_eq!(ctl.manager().unwrap().card_index(), 2);
        assert!(ctl.current().unwrap().timers().is_running());
        ctl.shutdown();
    }

    #[test]
    fn return_from_root_fails() {
        let mut ctl = controller(MemoryLoader::new());
        assert!(matches!(
            ctl.return_from(ScriptValue::Null),
            Err(RuntimeError::NotRunning)
        ));
        ctl.start(StackGraph::new(), None, 0).unwrap();
        assert!(matches!(
            ctl.return_from(ScriptValue::Null),
            Err(RuntimeError::CannotReturnFromRoot)
        ));
        assert_eq!(ctl.depth(), 1);
    }
}
