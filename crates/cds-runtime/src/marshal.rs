//! Marshalling work onto the main context.
//!
//! The main context owns every document. Script workers never touch a
//! document directly: they send closures over a channel and the main context
//! runs them between events with `MainQueue::pump`. `run_sync` blocks the
//! worker until the closure has run and hands back its result; `post` only
//! enqueues.
//!
//! Every request carries the `CancelToken` of the script that sent it. A
//! request whose origin was terminated is dropped before it starts, so it
//! either runs to completion on the main context or not at all.

use crate::error::{Result, RuntimeError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot};

/// A unit of main-context work.
pub type Job<T> = Box<dyn FnOnce(&mut T) + Send>;

struct Request<T> {
    origin: CancelToken,
    job: Job<T>,
}

/// Shared terminate flag for one script worker.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Receiving end, owned by the main context. `T` is the state jobs run
/// against.
pub struct MainQueue<T> {
    tx: mpsc::UnboundedSender<Request<T>>,
    rx: mpsc::UnboundedReceiver<Request<T>>,
}

impl<T> Default for MainQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MainQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// A sender for workers.
    pub fn handle(&self) -> MainHandle<T> {
        MainHandle {
            tx: self.tx.clone(),
        }
    }

    /// Take every request queued so far, dropping those whose origin was
    /// terminated. Run the returned jobs with [`run_jobs`].
    pub fn drain(&mut self) -> Vec<Job<T>> {
        let mut jobs = Vec::new();
        while let Ok(request) = self.rx.try_recv() {
            if request.origin.is_cancelled() {
                log::trace!("dropping request from a terminated script");
                continue;
            }
            jobs.push(request.job);
        }
        jobs
    }

    /// Run queued requests against `state` until the queue is empty,
    /// including requests queued by the jobs themselves. Returns how many
    /// ran.
    pub fn pump(&mut self, state: &mut T) -> usize {
        let mut ran = 0;
        loop {
            let jobs = self.drain();
            if jobs.is_empty() {
                return ran;
            }
            ran += run_jobs(jobs, state);
        }
    }
}

/// Run drained jobs in order.
pub fn run_jobs<T>(jobs: Vec<Job<T>>, state: &mut T) -> usize {
    let count = jobs.len();
    for job in jobs {
        job(state);
    }
    count
}

/// Sending end, cloned into every worker.
pub struct MainHandle<T> {
    tx: mpsc::UnboundedSender<Request<T>>,
}

impl<T> Clone for MainHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: 'static> MainHandle<T> {
    /// Run `f` on the main context and wait for its result.
    ///
    /// Fails with `Terminated` if `origin` is cancelled before the job
    /// starts, and with `Disconnected` if the main queue is gone. Must not
    /// be called from the main context itself.
    pub fn run_sync<R, F>(&self, origin: &CancelToken, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut T) -> R + Send + 'static,
    {
        if origin.is_cancelled() {
            return Err(RuntimeError::Terminated);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job<T> = Box::new(move |state| {
            // The worker may have given up waiting.
            let _ = reply_tx.send(f(state));
        });
        self.send(origin, job)?;
        reply_rx.blocking_recv().map_err(|_| {
            if origin.is_cancelled() {
                RuntimeError::Terminated
            } else {
                RuntimeError::Disconnected
            }
        })
    }

    /// Queue `f` for the main context without waiting.
    pub fn post<F>(&self, origin: &CancelToken, f: F) -> Result<()>
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        if origin.is_cancelled() {
            return Err(RuntimeError::Terminated);
        }
        self.send(origin, Box::new(f))
    }

    fn send(&self, origin: &CancelToken, job: Job<T>) -> Result<()> {
        log::trace!("marshalling request to main");
        self.tx
            .send(Request {
                origin: origin.clone(),
                job,
            })
            .map_err(|_| RuntimeError::Disconnected)
    }
}
