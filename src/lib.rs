//! Arbitration of terminal-multiplexer sessions and ports between test and
//! production callers on one host.
//!
//! [`detector::ConflictDetector`] owns session locks and port reservations;
//! [`isolation::IsolationValidator`] checks that a test run's isolation
//! settings actually isolate it. Both reach the multiplexer only through the
//! traits in [`directory`].

pub mod config;
pub mod detector;
pub mod directory;
pub mod environment;
pub mod error;
pub mod isolation;
pub mod liveness;
pub mod locks;
pub mod ports;
pub mod tmux;

pub use config::{EnvSource, IsolationConfig, ProcessEnv};
pub use detector::{ConflictDetector, ConsistencyReport};
pub use directory::{DirectoryError, SessionDirectory, SessionManager, SessionManagerFactory};
pub use environment::{EnvironmentClass, NamingConvention};
pub use error::GuardError;
pub use isolation::IsolationValidator;
pub use liveness::{ProbeError, ProcessLivenessProbe, SignalProbe};
pub use locks::{CleanupReport, SessionLock};
