use thiserror::Error;

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Failures raised while running stacks.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Core(#[from] cds_core::Error),

    #[error("cannot return from the root stack")]
    CannotReturnFromRoot,

    #[error("no stack is running")]
    NotRunning,

    #[error("a stack is already running")]
    AlreadyRunning,

    /// The requesting frame is waiting on a called stack.
    #[error("stack is suspended")]
    Suspended,

    /// The main context went away while a request was in flight.
    #[error("main context disconnected")]
    Disconnected,

    /// The requesting script was terminated; the request never started.
    #[error("script terminated")]
    Terminated,
}

impl RuntimeError {
    /// Errors that just mean the calling script should stop.
    #[must_use]
    pub fn is_termination(&self) -> bool {
        matches!(self, Self::Terminated | Self::Disconnected)
    }
}
