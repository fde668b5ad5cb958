use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::config::{EnvSource, IsolationConfig, ProcessEnv};
use crate::directory::SessionDirectory;
use crate::environment::{EnvironmentClass, NamingConvention};
use crate::error::GuardError;
use crate::liveness::{ProcessLivenessProbe, SignalProbe};
use crate::locks::{Acquired, CleanupReport, LockTable, SessionLock};
use crate::ports::PortPools;

struct GuardState {
    locks: LockTable,
    ports: PortPools,
}

/// Outcome of [`ConflictDetector::validate_environment_consistency`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    pub test_mode: bool,
    pub transport_path: Option<PathBuf>,
    /// Non-fatal findings. Already logged when the report is returned.
    pub warnings: Vec<String>,
}

/// Arbitrates session names and ports between test and production callers.
///
/// The lock table and both port pools sit behind one `RwLock`: queries share
/// it, every mutation takes it exclusively.
///
/// `check_session_conflict` followed by `lock_session` is not atomic with
/// respect to the session directory. Two processes may both pass the check
/// before either locks; the lock table is only authoritative within one
/// process.
pub struct ConflictDetector {
    state: RwLock<GuardState>,
    directory: Arc<dyn SessionDirectory>,
    probe: Arc<dyn ProcessLivenessProbe>,
    env: Arc<dyn EnvSource>,
    naming: NamingConvention,
    owner_pid: u32,
}

impl ConflictDetector {
    /// Create a detector that probes real processes, reads the process
    /// environment, and acts as the current process.
    pub fn new(directory: Arc<dyn SessionDirectory>) -> Self {
        Self {
            state: RwLock::new(GuardState {
                locks: LockTable::new(),
                ports: PortPools::new(),
            }),
            directory,
            probe: Arc::new(SignalProbe),
            env: Arc::new(ProcessEnv),
            naming: NamingConvention::default(),
            owner_pid: std::process::id(),
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn ProcessLivenessProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_env(mut self, env: Arc<dyn EnvSource>) -> Self {
        self.env = env;
        self
    }

    pub fn with_naming(mut self, naming: NamingConvention) -> Self {
        self.naming = naming;
        self
    }

    /// Act as `pid` in the calls that don't take an explicit owner.
    pub fn with_owner_pid(mut self, pid: u32) -> Self {
        self.owner_pid = pid;
        self
    }

    pub fn owner_pid(&self) -> u32 {
        self.owner_pid
    }

    pub fn classify(&self, name: &str) -> EnvironmentClass {
        self.naming.classify(name)
    }

    /// Current isolation settings. Re-read on every call.
    pub fn isolation_config(&self) -> IsolationConfig {
        IsolationConfig::from_env(self.env.as_ref())
    }

    // ── Sessions ───────────────────────────────────────────────────

    pub fn check_session_conflict(&self, name: &str) -> Result<(), GuardError> {
        self.check_session_conflict_as(name, self.owner_pid)
    }

    /// Fail if `name` is locked by someone other than `pid`, or if it exists
    /// and belongs to the other environment. Has no side effects.
    pub fn check_session_conflict_as(&self, name: &str, pid: u32) -> Result<(), GuardError> {
        // Guard dropped before the directory round-trip.
        self.state.read().locks.check(name, pid)?;

        if !self.directory.session_exists(name)? {
            return Ok(());
        }

        let test_mode = self.isolation_config().test_mode;
        let class = self.classify(name);
        if class.conflicts_with_mode(test_mode) {
            return Err(GuardError::CrossEnvironmentAccess {
                session: name.to_string(),
                class,
                mode: EnvironmentClass::for_mode(test_mode),
            });
        }
        Ok(())
    }

    pub fn lock_session(&self, name: &str) -> Result<(), GuardError> {
        self.lock_session_as(name, self.owner_pid)
    }

    /// Lock `name` for `pid`. Re-locking by the same owner is a no-op.
    pub fn lock_session_as(&self, name: &str, pid: u32) -> Result<(), GuardError> {
        let is_test = self.naming.is_test(name);
        let acquired = self.state.write().locks.acquire(name, pid, is_test)?;
        if acquired == Acquired::New {
            tracing::debug!(session = %name, pid, is_test, "session locked");
        }
        Ok(())
    }

    pub fn unlock_session(&self, name: &str) -> Result<(), GuardError> {
        self.unlock_session_as(name, self.owner_pid)
    }

    /// Release `pid`'s lock on `name`. Unlocking an unlocked session succeeds.
    pub fn unlock_session_as(&self, name: &str, pid: u32) -> Result<(), GuardError> {
        if self.state.write().locks.release(name, pid)?.is_some() {
            tracing::debug!(session = %name, pid, "session unlocked");
        }
        Ok(())
    }

    /// Remove every lock whose owner is dead or cannot be probed.
    pub fn cleanup_stale_locks(&self) -> CleanupReport {
        let report = self.state.write().locks.reclaim_stale(self.probe.as_ref());
        if !report.reclaimed.is_empty() {
            tracing::info!(
                scanned = report.scanned,
                reclaimed = report.reclaimed.len(),
                probe_failures = report.probe_failures,
                "reclaimed stale session locks"
            );
        }
        report
    }

    pub fn lock_holder(&self, name: &str) -> Option<SessionLock> {
        self.state.read().locks.get(name).cloned()
    }

    /// Snapshot of all locks, sorted by session name.
    pub fn locks(&self) -> Vec<SessionLock> {
        let mut locks: Vec<SessionLock> = self.state.read().locks.iter().cloned().collect();
        locks.sort_by(|a, b| a.session_name.cmp(&b.session_name));
        locks
    }

    // ── Ports ──────────────────────────────────────────────────────

    /// Fail iff the other environment has reserved `port`.
    pub fn check_port_conflict(&self, port: u16, is_test: bool) -> Result<(), GuardError> {
        self.state.read().ports.check(port, is_test)
    }

    pub fn reserve_port(&self, port: u16, is_test: bool) -> Result<(), GuardError> {
        if self.state.write().ports.reserve(port, is_test)? {
            tracing::debug!(port, is_test, "port reserved");
        }
        Ok(())
    }

    pub fn release_port(&self, port: u16, is_test: bool) {
        if self.state.write().ports.release(port, is_test) {
            tracing::debug!(port, is_test, "port released");
        }
    }

    pub fn reserved_ports(&self, is_test: bool) -> Vec<u16> {
        self.state.read().ports.reserved(is_test)
    }

    // ── Environment ────────────────────────────────────────────────

    /// Check that the current mode can run safely alongside the sessions
    /// that already exist.
    ///
    /// In test mode, missing isolation is an error. The session prefix is
    /// only required when no dedicated transport is configured; a transport
    /// alone isolates the run. In production mode, leftover test sessions
    /// are reported as warnings only.
    pub fn validate_environment_consistency(&self) -> Result<ConsistencyReport, GuardError> {
        let config = self.isolation_config();
        let mut report = ConsistencyReport {
            test_mode: config.test_mode,
            transport_path: config.transport_path.clone(),
            warnings: Vec::new(),
        };

        if config.test_mode {
            if !config.has_dedicated_transport() && config.session_prefix.is_none() {
                return Err(GuardError::IsolationMisconfigured(format!(
                    "test mode requires {} or {} to be set",
                    crate::config::ENV_TEST_SOCKET,
                    crate::config::ENV_SESSION_PREFIX,
                )));
            }

            let production = self.list_class(EnvironmentClass::Production)?;
            if !production.is_empty() {
                if !config.has_dedicated_transport() {
                    return Err(GuardError::IsolationMisconfigured(format!(
                        "{} production session(s) share the default transport with test mode: {}",
                        production.len(),
                        production.join(", ")
                    )));
                }
                tracing::debug!(
                    count = production.len(),
                    "production sessions visible on default transport; test runs use a dedicated one"
                );
            }
        } else {
            let leftover = self.list_class(EnvironmentClass::Test)?;
            if !leftover.is_empty() {
                let warning = format!(
                    "{} test session(s) left on the production transport: {}",
                    leftover.len(),
                    leftover.join(", ")
                );
                tracing::warn!("{}", warning);
                report.warnings.push(warning);
            }
        }

        Ok(report)
    }

    /// Sessions of `class` according to the directory, re-filtered through the classifier.
    fn list_class(&self, class: EnvironmentClass) -> Result<Vec<String>, GuardError> {
        let mut names = self.directory.list_sessions(self.naming.prefix_for(class))?;
        names.retain(|name| self.classify(name) == class);
        names.sort();
        Ok(names)
    }
}
