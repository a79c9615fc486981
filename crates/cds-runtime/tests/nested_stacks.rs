//! Integration tests: nested stack call/return, timers and termination.
//!
//! Handlers are written in a tiny line language understood by `Scripted`:
//! `log <word>`, `setup`, `card`, `call <file> <card> <json>`,
//! `return <json>`, `later <ms> <event>` and `spin`.

use cds_core::host::ScriptValue;
use cds_core::resolve::MemoryLoader;
use cds_runtime::{
    ExecutionController, Invocation, Result, RuntimeConfig, RuntimeError, ScriptContext,
    ScriptEngine,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

type Log = Arc<Mutex<Vec<String>>>;

struct Scripted {
    log: Log,
}

impl Scripted {
    fn note(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

impl ScriptEngine for Scripted {
    fn run(&mut self, cx: &ScriptContext, invocation: &Invocation) -> Result<()> {
        for line in invocation.source.lines() {
            let words: Vec<&str> = line.split_whitespace().collect();
            match words.as_slice() {
                ["log", word] => self.note((*word).to_string()),
                ["setup"] => {
                    let value = cx.setup_value().map_or("none".to_string(), |v| v.to_string());
                    self.note(format!("setup={value}"));
                }
                ["card"] => {
                    let index = cx.current_card_index()?;
                    self.note(format!("card={index}"));
                }
                ["call", file, card, value] => {
                    let value: ScriptValue = serde_json::from_str(value).unwrap();
                    let ok = cx.call_stack(file, card.parse().unwrap(), value)?;
                    self.note(format!("call={ok}"));
                }
                ["return", value] => {
                    let ok = cx.return_from_stack(serde_json::from_str(value).unwrap())?;
                    self.note(format!("return={ok}"));
                }
                ["later", "forever", event] => {
                    let outcome = match cx.send_later(Duration::MAX, invocation.target, event, None) {
                        Err(RuntimeError::Core(cds_core::Error::InvalidArgument { .. })) => "rejected",
                        Err(_) => "failed",
                        Ok(()) => "scheduled",
                    };
                    self.note(format!("later={outcome}"));
                }
                ["later", ms, event] => {
                    let delay = Duration::from_millis(ms.parse().unwrap());
                    cx.send_later(delay, invocation.target, event, None)?;
                }
                ["wait-suspended"] => {
                    let deadline = Instant::now() + WAIT;
                    while !matches!(cx.current_card_index(), Err(RuntimeError::Suspended)) {
                        assert!(Instant::now() < deadline, "caller never suspended");
                        thread::sleep(Duration::from_millis(1));
                    }
                }
                ["edit"] => {
                    let outcome = match cx.with_manager(|m| m.add_card().is_ok()) {
                        Ok(added) => added.to_string(),
                        Err(e) => e.to_string(),
                    };
                    self.note(format!("edit={outcome}"));
                }
                ["spin"] => loop {
                    if let Err(e) = cx.check_terminated() {
                        self.note("stopped".to_string());
                        return Err(e);
                    }
                    thread::sleep(Duration::from_millis(1));
                },
                _ => panic!("unknown script line {line:?}"),
            }
        }
        Ok(())
    }

    fn on_stack_return(&mut self, _cx: &ScriptContext, value: ScriptValue) {
        self.note(format!("returned={value}"));
    }
}

fn runtime() -> (ExecutionController, Log) {
    let loader = MemoryLoader::new();
    loader.insert("stacks/main.json", include_str!("fixtures/main.json"));
    loader.insert("stacks/sub.json", include_str!("fixtures/sub.json"));
    loader.insert("stacks/spinner.json", include_str!("fixtures/spinner.json"));
    let log: Log = Arc::default();
    let engine_log = Arc::clone(&log);
    let factory = move || {
        Box::new(Scripted {
            log: Arc::clone(&engine_log),
        }) as Box<dyn ScriptEngine>
    };
    let mut ctl = ExecutionController::new(factory, Arc::new(loader), RuntimeConfig::default());
    ctl.open(Path::new("stacks/main.json"), 1).unwrap();
    assert!(ctl.run_until_idle(WAIT));
    (ctl, log)
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn position(log: &[String], entry: &str) -> usize {
    log.iter()
        .position(|e| e == entry)
        .unwrap_or_else(|| panic!("{entry} missing from {log:?}"))
}

/// Fire `event` on the root stack's view at `path`, then wait for scripts.
fn fire(ctl: &mut ExecutionController, path: &str, event: &str) {
    let manager = ctl.manager_mut().unwrap();
    let target = manager.graph().find_by_path(path).unwrap();
    assert!(manager.run_handler(target, event, None));
    assert!(ctl.run_until_idle(WAIT));
}

// ─── Call / return ───────────────────────────────────────────────────────

#[test]
fn root_stack_runs_setup_then_shows_requested_card() {
    let (ctl, log) = runtime();
    assert_eq!(entries(&log), vec!["setup-main", "show-main"]);
    assert_eq!(ctl.depth(), 1);
    assert_eq!(ctl.manager().unwrap().card_index(), 1);
}

#[test]
fn called_stack_sees_setup_value_and_caller_sees_return_value() {
    let (mut ctl, log) = runtime();
    fire(&mut ctl, "card_2.go", "OnClick");

    let log = entries(&log);
    assert!(log.contains(&"call=true".to_string()));
    assert!(position(&log, "setup=42") < position(&log, "card=1"));
    assert!(position(&log, "card=1") < position(&log, "returned=7"));

    assert_eq!(ctl.depth(), 1);
    let manager = ctl.manager().unwrap();
    assert_eq!(manager.card_index(), 1);
    assert!(!manager.can_undo());
}

#[test]
fn setup_runs_only_for_a_fresh_frame() {
    let (mut ctl, log) = runtime();
    fire(&mut ctl, "card_2.go", "OnClick");
    let log = entries(&log);
    assert_eq!(log.iter().filter(|e| *e == "setup-main").count(), 1);
    assert_eq!(log.iter().filter(|e| *e == "show-main").count(), 2);
}

#[test]
fn call_to_missing_stack_fails_without_side_effects() {
    let (mut ctl, log) = runtime();
    fire(&mut ctl, "card_2.missing", "OnClick");
    assert!(entries(&log).contains(&"call=false".to_string()));
    assert_eq!(ctl.depth(), 1);
    assert_eq!(ctl.manager().unwrap().card_index(), 1);
    assert!(!ctl.manager().unwrap().can_undo());
    assert!(ctl.current().unwrap().timers().is_running());

    let err = ctl.call("nowhere.json", 0, json!(1)).unwrap_err();
    assert!(matches!(err, RuntimeError::Core(cds_core::Error::NotFound { .. })));
    assert_eq!(ctl.depth(), 1);
    assert_eq!(ctl.manager().unwrap().card_index(), 1);
}

#[test]
fn return_from_root_script_reports_failure() {
    let (mut ctl, log) = runtime();
    fire(&mut ctl, "card_2.home", "OnClick");
    assert!(entries(&log).contains(&"return=false".to_string()));
    assert_eq!(ctl.depth(), 1);
    assert!(matches!(
        ctl.return_from(json!(0)),
        Err(RuntimeError::CannotReturnFromRoot)
    ));
}

#[test]
fn frames_keep_separate_histories() {
    let (mut ctl, _log) = runtime();
    let root = ctl.current_id().unwrap();
    ctl.call("sub.json", 0, json!(null)).unwrap();
    assert!(ctl.run_until_idle(WAIT));
    assert_ne!(ctl.current_id(), Some(root));

    ctl.manager_mut().unwrap().add_card().unwrap();
    assert!(ctl.manager().unwrap().can_undo());
    ctl.return_from(json!(null)).unwrap();
    assert_eq!(ctl.current_id(), Some(root));
    assert!(!ctl.manager().unwrap().can_undo());
}

#[test]
fn suspended_stack_rejects_script_edits() {
    let (mut ctl, log) = runtime();
    let root = ctl.current_id().unwrap();
    let manager = ctl.manager_mut().unwrap();
    let target = manager.graph().find_by_path("card_2.busy").unwrap();
    assert!(manager.run_handler(target, "OnClick", None));

    let deadline = Instant::now() + WAIT;
    while !entries(&log).contains(&"busy-done".to_string()) {
        assert!(Instant::now() < deadline, "caller script never finished");
        ctl.pump();
        thread::sleep(Duration::from_millis(1));
    }
    ctl.pump();

    assert!(entries(&log).contains(&"edit=stack is suspended".to_string()));
    assert_eq!(ctl.depth(), 2);
    let caller = ctl.frame(root).unwrap();
    assert_eq!(caller.manager().graph().card_count(), 3);
    assert!(!caller.manager().can_undo());
    assert_eq!(caller.saved_card(), 1);
    assert_eq!(caller.timers().pending_len(), 0);
    ctl.shutdown();
}

// ─── Timers ──────────────────────────────────────────────────────────────

#[test]
fn periodic_and_delayed_sends_fire_from_tick() {
    let (mut ctl, log) = runtime();
    fire(&mut ctl, "card_2.home", "OnMouseEnter");
    assert_eq!(ctl.current().unwrap().timers().pending_len(), 1);

    let dispatched = ctl.tick(Instant::now() + Duration::from_secs(60));
    assert_eq!(dispatched, 2);
    assert!(ctl.run_until_idle(WAIT));
    let log = entries(&log);
    assert!(log.contains(&"tick-main".to_string()));
    assert!(log.contains(&"later-main".to_string()));
}

#[test]
fn out_of_range_delay_is_rejected() {
    let (mut ctl, log) = runtime();
    fire(&mut ctl, "card_2.forever", "OnClick");
    assert!(entries(&log).contains(&"later=rejected".to_string()));
    assert_eq!(ctl.current().unwrap().timers().pending_len(), 0);
}

#[test]
fn suspended_timers_are_cancelled_and_only_the_cadence_resumes() {
    let (mut ctl, log) = runtime();
    fire(&mut ctl, "card_2.home", "OnMouseEnter");
    assert_eq!(ctl.current().unwrap().timers().pending_len(), 1);

    ctl.call("sub.json", 0, json!(1)).unwrap();
    let root = &ctl.frames()[0];
    assert!(!root.timers().is_running());
    assert_eq!(root.timers().pending_len(), 0);

    ctl.return_from(json!(null)).unwrap();
    assert!(ctl.current().unwrap().timers().is_running());
    assert_eq!(ctl.tick(Instant::now() + Duration::from_secs(60)), 1);
    assert!(ctl.run_until_idle(WAIT));
    let log = entries(&log);
    assert!(log.contains(&"tick-main".to_string()));
    assert!(!log.contains(&"later-main".to_string()));
}

// ─── Termination ─────────────────────────────────────────────────────────

#[test]
fn shutdown_terminates_running_scripts() {
    let (mut ctl, log) = runtime();
    ctl.call("spinner.json", 0, json!(null)).unwrap();
    assert_eq!(ctl.depth(), 2);
    ctl.shutdown();
    assert_eq!(ctl.depth(), 1);

    let deadline = Instant::now() + WAIT;
    while !entries(&log).contains(&"stopped".to_string()) {
        assert!(Instant::now() < deadline, "spinning script never stopped");
        thread::sleep(Duration::from_millis(1));
    }
    assert!(ctl.current().unwrap().worker().is_terminated());
    assert!(!ctl.current().unwrap().timers().is_running());
}
