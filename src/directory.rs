//! Seams to the terminal multiplexer.
//!
//! The guard never talks to the multiplexer directly. It asks a
//! [`SessionDirectory`] what exists, and the isolation validator uses a
//! [`SessionManagerFactory`] to reach a specific transport.

use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("failed to run multiplexer: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("multiplexer command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("multiplexer unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of the sessions visible through one transport.
pub trait SessionDirectory: Send + Sync {
    fn session_exists(&self, name: &str) -> Result<bool, DirectoryError>;

    /// Names of all sessions starting with `prefix`. The empty prefix lists every session.
    fn list_sessions(&self, prefix: &str) -> Result<Vec<String>, DirectoryError>;
}

/// Session lifecycle operations bound to one transport.
pub trait SessionManager: Send + Sync {
    fn create_session(&self, name: &str) -> Result<(), DirectoryError>;
    fn kill_session(&self, name: &str) -> Result<(), DirectoryError>;
}

/// Builds a [`SessionManager`] bound to a specific transport endpoint.
pub trait SessionManagerFactory: Send + Sync {
    fn bind(&self, transport: &Path) -> Result<Box<dyn SessionManager>, DirectoryError>;
}
