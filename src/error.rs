use std::time::Duration;

use crate::directory::DirectoryError;
use crate::environment::EnvironmentClass;

/// Errors returned by lock, port and isolation operations.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    /// A live owner holds the session. Retry after backoff or owner exit.
    #[error("session {session:?} is locked by pid {owner_pid} (held for {}s)", .held_for.as_secs())]
    LockHeld {
        session: String,
        owner_pid: u32,
        held_for: Duration,
    },

    /// The caller tried to release a lock it does not own.
    #[error("pid {caller_pid} does not own the lock on session {session:?} (owner is pid {owner_pid})")]
    NotOwner {
        session: String,
        owner_pid: u32,
        caller_pid: u32,
    },

    /// An existing session belongs to the other environment.
    #[error("{mode} caller may not access {class} session {session:?}")]
    CrossEnvironmentAccess {
        session: String,
        class: EnvironmentClass,
        mode: EnvironmentClass,
    },

    /// The port is reserved by the other environment.
    #[error("port {port} is reserved by the {held_by} environment")]
    PortConflict { port: u16, held_by: EnvironmentClass },

    /// Environment validation failed; fatal to a test run until fixed.
    #[error("isolation misconfigured: {0}")]
    IsolationMisconfigured(String),

    /// The session directory or session manager failed.
    #[error(transparent)]
    Collaborator(#[from] DirectoryError),
}

impl GuardError {
    /// Returns a machine-readable error code string.
    pub fn code(&self) -> &'static str {
        match self {
            GuardError::LockHeld { .. } => "lock_held",
            GuardError::NotOwner { .. } => "not_owner",
            GuardError::CrossEnvironmentAccess { .. } => "cross_environment_access",
            GuardError::PortConflict { .. } => "port_conflict",
            GuardError::IsolationMisconfigured(_) => "isolation_misconfigured",
            GuardError::Collaborator(_) => "collaborator_failure",
        }
    }

    /// True if the same call may succeed later without any config change.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GuardError::LockHeld { .. } | GuardError::PortConflict { .. }
        )
    }
}
