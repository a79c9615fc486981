//! The script interpreter seam.
//!
//! Script languages live outside this workspace. A `ScriptEngine` runs on
//! its frame's worker thread and reaches the running stack only through the
//! `ScriptContext` it is handed, which marshals every request onto the main
//! context.

use crate::controller::ExecutionController;
use crate::error::{Result, RuntimeError};
use crate::frame::FrameId;
use crate::marshal::{CancelToken, MainHandle};
use cds_core::host::ScriptValue;
use cds_core::id::NodeId;
use cds_core::resolve::{StackLoader, resolve_relative};
use cds_editor::manager::StackManager;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One handler execution request.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub target: NodeId,
    pub event: String,
    /// Script text of the handler.
    pub source: String,
    pub payload: Option<ScriptValue>,
}

/// A script interpreter bound to one frame.
pub trait ScriptEngine: Send {
    /// Execute a handler. Long-running scripts should call
    /// [`ScriptContext::check_terminated`] regularly.
    fn run(&mut self, cx: &ScriptContext, invocation: &Invocation) -> Result<()>;

    /// A stack called by this frame returned `value`.
    fn on_stack_return(&mut self, cx: &ScriptContext, value: ScriptValue);
}

/// Creates one engine per frame.
pub trait EngineFactory {
    fn create(&self) -> Box<dyn ScriptEngine>;
}

impl<F> EngineFactory for F
where
    F: Fn() -> Box<dyn ScriptEngine>,
{
    fn create(&self) -> Box<dyn ScriptEngine> {
        self()
    }
}

/// What a script may do with the stack it runs in.
pub struct ScriptContext {
    frame: FrameId,
    main: MainHandle<ExecutionController>,
    token: CancelToken,
    loader: Arc<dyn StackLoader>,
    path: Option<PathBuf>,
    setup_value: Option<ScriptValue>,
    return_value: Option<ScriptValue>,
}

impl ScriptContext {
    pub(crate) fn new(
        frame: FrameId,
        main: MainHandle<ExecutionController>,
        token: CancelToken,
        loader: Arc<dyn StackLoader>,
        path: Option<PathBuf>,
        setup_value: Option<ScriptValue>,
    ) -> Self {
        Self {
            frame,
            main,
            token,
            loader,
            path,
            setup_value,
            return_value: None,
        }
    }

    pub fn frame(&self) -> FrameId {
        self.frame
    }

    /// Value passed by the caller when this stack was called.
    pub fn setup_value(&self) -> Option<&ScriptValue> {
        self.setup_value.as_ref()
    }

    /// Value returned by the most recent stack this frame called.
    pub fn return_value(&self) -> Option<&ScriptValue> {
        self.return_value.as_ref()
    }

    pub(crate) fn set_return_value(&mut self, value: ScriptValue) {
        self.return_value = Some(value);
    }

    pub fn is_terminated(&self) -> bool {
        self.token.is_cancelled()
    }

    /// `Err(Terminated)` once the frame has been asked to stop.
    pub fn check_terminated(&self) -> Result<()> {
        if self.is_terminated() {
            Err(RuntimeError::Terminated)
        } else {
            Ok(())
        }
    }

    /// Run `f` against this frame's stack on the main context and wait for
    /// the result. Fails with `Suspended` while a called stack is on top.
    pub fn with_manager<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut StackManager) -> R + Send + 'static,
    {
        let frame = self.frame;
        self.main.run_sync(&self.token, move |ctl| {
            ctl.active_frame_mut(frame).map(|fr| f(fr.manager_mut()))
        })?
    }

    /// Queue `f` against this frame's stack without waiting. Dropped if the
    /// frame is not on top when the main context gets to it.
    pub fn post_to_manager<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut StackManager) + Send + 'static,
    {
        let frame = self.frame;
        self.main.post(&self.token, move |ctl| match ctl.active_frame_mut(frame) {
            Ok(fr) => f(fr.manager_mut()),
            Err(e) => log::debug!("frame {frame}: dropped request: {e}"),
        })
    }

    pub fn current_card_index(&self) -> Result<usize> {
        self.with_manager(|m| m.card_index())
    }

    /// Show another card of this stack. Returns `false` for a bad index.
    pub fn goto_card(&self, index: usize) -> Result<bool> {
        self.with_manager(move |m| m.load_card_at_index(index, false).is_ok())
    }

    /// Call the stack at `target`, resolved against this stack's file.
    ///
    /// The file is read and parsed here, on the worker. On success the push
    /// is queued for the main context and `true` returned; the called stack
    /// starts once the main context gets to it. A missing or malformed
    /// target returns `false` and changes nothing.
    pub fn call_stack(&self, target: &str, card_index: usize, value: ScriptValue) -> Result<bool> {
        self.check_terminated()?;
        let path = resolve_relative(self.path.as_deref(), target);
        let graph = match self.loader.load(&path) {
            Ok(graph) => graph,
            Err(e) => {
                log::warn!("cannot call {}: {e}", path.display());
                return Ok(false);
            }
        };
        let frame = self.frame;
        self.main.post(&self.token, move |ctl| {
            let pushed = ctl
                .active_frame_mut(frame)
                .map(|_| ())
                .and_then(|()| ctl.push_frame(graph, Some(path), card_index, Some(value)));
            if let Err(e) = pushed {
                log::warn!("stack call failed: {e}");
            }
        })?;
        Ok(true)
    }

    /// Return `value` to the stack that called this one, ending this frame.
    /// Returns `false` when this is the root stack or no longer on top.
    pub fn return_from_stack(&self, value: ScriptValue) -> Result<bool> {
        let frame = self.frame;
        self.main.run_sync(&self.token, move |ctl| {
            ctl.current_id() == Some(frame) && ctl.return_from(value).is_ok()
        })
    }

    /// Run `target`'s `event` handler after `delay`. Pending timers are
    /// cancelled when this frame is suspended.
    pub fn send_later(
        &self,
        delay: Duration,
        target: NodeId,
        event: &str,
        payload: Option<ScriptValue>,
    ) -> Result<()> {
        let due = Instant::now()
            .checked_add(delay)
            .ok_or_else(|| cds_core::Error::invalid(format!("delay {delay:?} is out of range")))?;
        let frame = self.frame;
        let event = event.to_string();
        self.main.post(&self.token, move |ctl| match ctl.active_frame_mut(frame) {
            Ok(fr) => fr.timers_mut().schedule(due, target, event, payload),
            Err(e) => log::debug!("frame {frame}: dropped timer: {e}"),
        })
    }
}
