//! One script thread per frame.
//!
//! Handler jobs are queued to the worker and executed in order by the
//! frame's `ScriptEngine`, so a long or looping script never blocks the main
//! context. Termination raises the frame's cancel flag; the engine observes
//! it through `ScriptContext::check_terminated` and any request it still
//! sends to the main context is dropped unstarted.

use crate::engine::{Invocation, ScriptContext, ScriptEngine};
use crate::error::Result;
use crate::marshal::CancelToken;
use cds_core::host::{HandlerRunner, ScriptValue};
use cds_core::id::NodeId;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;

enum WorkerJob {
    Run(Invocation),
    Returned(ScriptValue),
    Stop,
}

/// Sending side of a worker plus its bookkeeping.
#[derive(Clone)]
struct WorkerQueue {
    tx: mpsc::UnboundedSender<WorkerJob>,
    pending: Arc<AtomicUsize>,
}

impl WorkerQueue {
    fn send(&self, job: WorkerJob) -> bool {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(job).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return false;
        }
        true
    }
}

pub struct ScriptWorker {
    queue: WorkerQueue,
    token: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl ScriptWorker {
    /// Start a worker thread running `engine` with `cx`.
    pub fn spawn(
        name: String,
        token: CancelToken,
        engine: Box<dyn ScriptEngine>,
        cx: ScriptContext,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let thread_pending = Arc::clone(&pending);
        let handle = thread::Builder::new()
            .name(name)
            .spawn(move || run_jobs(engine, cx, rx, thread_pending))
            .map_err(cds_core::Error::from)?;
        Ok(Self {
            queue: WorkerQueue { tx, pending },
            token,
            handle: Some(handle),
        })
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// A handler runner feeding this worker, for the frame's stack manager.
    pub fn runner(&self) -> WorkerRunner {
        WorkerRunner {
            queue: self.queue.clone(),
        }
    }

    /// Deliver a called stack's return value.
    pub fn deliver_return(&self, value: ScriptValue) -> bool {
        self.queue.send(WorkerJob::Returned(value))
    }

    /// No job queued or running.
    pub fn is_idle(&self) -> bool {
        self.queue.pending.load(Ordering::SeqCst) == 0
            || self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    pub fn is_terminated(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Raise the terminate flag and stop once the queued jobs are done.
    /// Does not wait for the thread.
    pub fn terminate(&mut self) {
        if self.token.is_cancelled() {
            return;
        }
        self.token.cancel();
        self.queue.send(WorkerJob::Stop);
        // Detached; the thread exits when it reaches `Stop`.
        drop(self.handle.take());
    }
}

impl Drop for ScriptWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn run_jobs(
    mut engine: Box<dyn ScriptEngine>,
    mut cx: ScriptContext,
    mut rx: mpsc::UnboundedReceiver<WorkerJob>,
    pending: Arc<AtomicUsize>,
) {
    while let Some(job) = rx.blocking_recv() {
        let keep_going = match job {
            WorkerJob::Run(invocation) => {
                match engine.run(&cx, &invocation) {
                    Ok(()) => {}
                    Err(e) if e.is_termination() => {
                        log::debug!("{} on {} stopped: {e}", invocation.event, invocation.target);
                    }
                    Err(e) => {
                        log::warn!("{} on {} failed: {e}", invocation.event, invocation.target);
                    }
                }
                true
            }
            WorkerJob::Returned(value) => {
                cx.set_return_value(value.clone());
                engine.on_stack_return(&cx, value);
                true
            }
            WorkerJob::Stop => false,
        };
        pending.fetch_sub(1, Ordering::SeqCst);
        if !keep_going {
            break;
        }
    }
    log::debug!("script worker for frame {} exited", cx.frame());
}

/// `HandlerRunner` that queues handlers on a script worker.
pub struct WorkerRunner {
    queue: WorkerQueue,
}

impl HandlerRunner for WorkerRunner {
    fn run_handler(
        &mut self,
        target: NodeId,
        event: &str,
        source: &str,
        payload: Option<&ScriptValue>,
    ) -> bool {
        self.queue.send(WorkerJob::Run(Invocation {
            target,
            event: event.to_string(),
            source: source.to_string(),
            payload: payload.cloned(),
        }))
    }
}
