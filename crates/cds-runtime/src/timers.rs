//! Per-frame timers: the periodic cadence and delayed handler sends.
//!
//! Timers never fire on their own. The controller calls `due` with the
//! current instant and dispatches whatever came due.

use cds_core::host::ScriptValue;
use cds_core::id::NodeId;
use std::time::{Duration, Instant};

/// A handler send scheduled by a script.
#[derive(Debug, Clone, PartialEq)]
pub struct DelayedSend {
    pub due: Instant,
    pub target: NodeId,
    pub event: String,
    pub payload: Option<ScriptValue>,
}

/// Something that came due.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerEvent {
    /// Time to send `OnPeriodic`.
    Periodic,
    Send(DelayedSend),
}

#[derive(Debug)]
pub struct TimerSet {
    interval: Duration,
    next_periodic: Option<Instant>,
    pending: Vec<DelayedSend>,
}

impl TimerSet {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_periodic: None,
            pending: Vec::new(),
        }
    }

    /// Start (or restart) the periodic cadence; the first tick is one
    /// interval after `now`.
    pub fn start_cadence(&mut self, now: Instant) {
        self.next_periodic = Some(now + self.interval);
    }

    pub fn is_running(&self) -> bool {
        self.next_periodic.is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn schedule(&mut self, due: Instant, target: NodeId, event: String, payload: Option<ScriptValue>) {
        self.pending.push(DelayedSend {
            due,
            target,
            event,
            payload,
        });
    }

    /// Stop the cadence and cancel every pending send. Returns how many
    /// sends were cancelled.
    pub fn stop(&mut self) -> usize {
        self.next_periodic = None;
        let cancelled = self.pending.len();
        self.pending.clear();
        cancelled
    }

    /// Everything due at `now`, sends in due order. A late cadence fires
    /// once and realigns to `now`.
    pub fn due(&mut self, now: Instant) -> Vec<TimerEvent> {
        let mut fired = Vec::new();
        if let Some(next) = self.next_periodic
            && next <= now
        {
            fired.push(TimerEvent::Periodic);
            let mut following = next + self.interval;
            if following <= now {
                following = now + self.interval;
            }
            self.next_periodic = Some(following);
        }
        let (mut ready, waiting): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|t| t.due <= now);
        self.pending = waiting;
        ready.sort_by_key(|t| t.due);
        fired.extend(ready.into_iter().map(TimerEvent::Send));
        fired
    }
}
