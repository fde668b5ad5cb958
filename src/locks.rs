use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::error::GuardError;
use crate::liveness::ProcessLivenessProbe;

/// An exclusive claim on a session name by one process.
///
/// Never edited after creation; a lock is only ever removed and replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionLock {
    pub session_name: String,
    pub locked_at: SystemTime,
    pub owner_pid: u32,
    pub is_test: bool,
}

impl SessionLock {
    pub fn held_for(&self) -> Duration {
        self.locked_at.elapsed().unwrap_or_default()
    }

    fn held_error(&self) -> GuardError {
        GuardError::LockHeld {
            session: self.session_name.clone(),
            owner_pid: self.owner_pid,
            held_for: self.held_for(),
        }
    }
}

/// Result of a successful [`LockTable::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquired {
    /// A new lock record was created.
    New,
    /// The caller already held the lock; nothing changed.
    Reentered,
}

/// Summary of one stale-lock scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub scanned: usize,
    /// Sessions whose locks were removed.
    pub reclaimed: Vec<String>,
    /// Owners whose probe errored; their locks are among `reclaimed`.
    pub probe_failures: usize,
}

/// Session name -> lock record, at most one per name.
///
/// Not synchronized; the caller holds it behind a lock.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: HashMap<String, SessionLock>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&SessionLock> {
        self.locks.get(name)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionLock> {
        self.locks.values()
    }

    /// Fails if `name` is locked by anyone other than `pid`.
    pub fn check(&self, name: &str, pid: u32) -> Result<(), GuardError> {
        match self.locks.get(name) {
            Some(lock) if lock.owner_pid != pid => Err(lock.held_error()),
            _ => Ok(()),
        }
    }

    pub fn acquire(
        &mut self,
        name: &str,
        pid: u32,
        is_test: bool,
    ) -> Result<Acquired, GuardError> {
        if let Some(lock) = self.locks.get(name) {
            if lock.owner_pid == pid {
                return Ok(Acquired::Reentered);
            }
            return Err(lock.held_error());
        }
        self.locks.insert(
            name.to_string(),
            SessionLock {
                session_name: name.to_string(),
                locked_at: SystemTime::now(),
                owner_pid: pid,
                is_test,
            },
        );
        Ok(Acquired::New)
    }

    /// Remove `pid`'s lock on `name`. Returns the removed record, or `None`
    /// if the session was not locked.
    pub fn release(&mut self, name: &str, pid: u32) -> Result<Option<SessionLock>, GuardError> {
        match self.locks.get(name) {
            None => Ok(None),
            Some(lock) if lock.owner_pid != pid => Err(GuardError::NotOwner {
                session: name.to_string(),
                owner_pid: lock.owner_pid,
                caller_pid: pid,
            }),
            Some(_) => Ok(self.locks.remove(name)),
        }
    }

    /// Drop every lock whose owner is not confirmed alive.
    ///
    /// A probe error counts as dead so a broken probe cannot leak locks forever.
    pub fn reclaim_stale(&mut self, probe: &dyn ProcessLivenessProbe) -> CleanupReport {
        let mut report = CleanupReport {
            scanned: self.locks.len(),
            ..Default::default()
        };
        self.locks.retain(|name, lock| {
            let alive = match probe.is_alive(lock.owner_pid) {
                Ok(alive) => alive,
                Err(e) => {
                    tracing::warn!(session = %name, pid = lock.owner_pid, error = %e, "liveness probe failed, reclaiming lock");
                    report.probe_failures += 1;
                    false
                }
            };
            if !alive {
                report.reclaimed.push(name.clone());
            }
            alive
        });
        report.reclaimed.sort();
        report
    }
}
