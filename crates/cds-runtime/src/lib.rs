pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod frame;
pub mod marshal;
pub mod timers;
pub mod worker;

pub use config::RuntimeConfig;
pub use controller::ExecutionController;
pub use engine::{EngineFactory, Invocation, ScriptContext, ScriptEngine};
pub use error::{Result, RuntimeError};
pub use frame::{ExecutionFrame, FrameId};
pub use marshal::{CancelToken, MainHandle, MainQueue};
pub use timers::{TimerEvent, TimerSet};
pub use worker::{ScriptWorker, WorkerRunner};
