/// Which workflow the keyboard is driving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellMode {
    Collect,
    Infer,
}

/// Operator commands issued from the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellCommand {
    ToggleCapture,
    NextMode,
    NextClass,
    PrevClass,
    ResetMode,
    ShowStatus,
    Quit,
}

/// Proof of a successful login; only `Workflow::open_session` hands these out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    username: String,
}

impl Session {
    pub(crate) fn new(username: String) -> Self {
        Self { username }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

/// Why an interactive workflow ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal(String),
    UserRequest,
    PipelineEnded(String),
}
