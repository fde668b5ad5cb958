#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use muxguard::config::{ENV_SESSION_PREFIX, ENV_TEST_MODE, ENV_TEST_SOCKET};
use muxguard::{
    ConflictDetector, DirectoryError, EnvSource, IsolationValidator, ProbeError, ProcessLivenessProbe,
    SessionDirectory, SessionManager, SessionManagerFactory,
};
use parking_lot::{Mutex, RwLock};

/// In-memory environment, mutable through a shared reference.
#[derive(Default)]
pub struct MapEnv {
    vars: RwLock<HashMap<String, String>>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: &str, value: &str) {
        self.vars.write().insert(key.to_string(), value.to_string());
    }
}

impl EnvSource for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.read().get(key).cloned()
    }
}

/// In-memory session directory.
#[derive(Default)]
pub struct FakeDirectory {
    sessions: RwLock<BTreeSet<String>>,
    failing: std::sync::atomic::AtomicBool,
    pub list_calls: AtomicUsize,
}

impl FakeDirectory {
    pub fn with_sessions(names: &[&str]) -> Arc<Self> {
        let dir = Self::default();
        for name in names {
            dir.add(name);
        }
        Arc::new(dir)
    }

    pub fn add(&self, name: &str) {
        self.sessions.write().insert(name.to_string());
    }

    pub fn remove(&self, name: &str) {
        self.sessions.write().remove(name);
    }

    /// Make every subsequent call fail.
    pub fn fail(&self) {
        self.failing.store(true, Ordering::Release);
    }

    fn check(&self) -> Result<(), DirectoryError> {
        if self.failing.load(Ordering::Acquire) {
            return Err(DirectoryError::Unavailable("fake directory down".into()));
        }
        Ok(())
    }
}

impl SessionDirectory for FakeDirectory {
    fn session_exists(&self, name: &str) -> Result<bool, DirectoryError> {
        self.check()?;
        Ok(self.sessions.read().contains(name))
    }

    fn list_sessions(&self, prefix: &str) -> Result<Vec<String>, DirectoryError> {
        self.list_calls.fetch_add(1, Ordering::Relaxed);
        self.check()?;
        Ok(self
            .sessions
            .read()
            .iter()
            .filter(|s| s.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Liveness probe with scripted answers. Unknown pids are dead.
#[derive(Default)]
pub struct FakeProbe {
    alive: RwLock<HashSet<u32>>,
    broken: RwLock<HashSet<u32>>,
    pub calls: AtomicUsize,
}

impl FakeProbe {
    pub fn alive(pids: &[u32]) -> Arc<Self> {
        let probe = Self::default();
        probe.alive.write().extend(pids.iter().copied());
        Arc::new(probe)
    }

    pub fn kill(&self, pid: u32) {
        self.alive.write().remove(&pid);
    }

    /// Probing `pid` returns an error.
    pub fn break_pid(&self, pid: u32) {
        self.broken.write().insert(pid);
    }
}

impl ProcessLivenessProbe for FakeProbe {
    fn is_alive(&self, pid: u32) -> Result<bool, ProbeError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.broken.read().contains(&pid) {
            return Err(ProbeError::Os {
                pid,
                source: std::io::Error::other("scripted failure"),
            });
        }
        Ok(self.alive.read().contains(&pid))
    }
}

/// Where a [`FakeFactory`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailAt {
    #[default]
    Never,
    Bind,
    Create,
    Kill,
}

/// Records every session created and killed through bound managers.
#[derive(Default)]
pub struct FakeFactory {
    pub fail_at: Mutex<FailAt>,
    pub bound: Mutex<Vec<PathBuf>>,
    pub created: Arc<Mutex<Vec<String>>>,
    pub killed: Arc<Mutex<Vec<String>>>,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_at(at: FailAt) -> Arc<Self> {
        let factory = Self::default();
        *factory.fail_at.lock() = at;
        Arc::new(factory)
    }
}

struct FakeManager {
    fail_at: FailAt,
    created: Arc<Mutex<Vec<String>>>,
    killed: Arc<Mutex<Vec<String>>>,
}

impl SessionManager for FakeManager {
    fn create_session(&self, name: &str) -> Result<(), DirectoryError> {
        if self.fail_at == FailAt::Create {
            return Err(DirectoryError::CommandFailed {
                command: format!("new-session {name}"),
                stderr: "error connecting to socket".into(),
            });
        }
        self.created.lock().push(name.to_string());
        Ok(())
    }

    fn kill_session(&self, name: &str) -> Result<(), DirectoryError> {
        if self.fail_at == FailAt::Kill {
            return Err(DirectoryError::CommandFailed {
                command: format!("kill-session {name}"),
                stderr: "can't find session".into(),
            });
        }
        self.killed.lock().push(name.to_string());
        Ok(())
    }
}

impl SessionManagerFactory for FakeFactory {
    fn bind(&self, transport: &Path) -> Result<Box<dyn SessionManager>, DirectoryError> {
        let fail_at = *self.fail_at.lock();
        if fail_at == FailAt::Bind {
            return Err(DirectoryError::Unavailable(format!(
                "{} unreachable",
                transport.display()
            )));
        }
        self.bound.lock().push(transport.to_path_buf());
        Ok(Box::new(FakeManager {
            fail_at,
            created: Arc::clone(&self.created),
            killed: Arc::clone(&self.killed),
        }))
    }
}

/// Environment in test mode with optional transport and prefix.
pub fn test_env(transport: Option<&str>, prefix: Option<&str>) -> Arc<MapEnv> {
    let env = MapEnv::new().with(ENV_TEST_MODE, "1");
    if let Some(transport) = transport {
        env.set(ENV_TEST_SOCKET, transport);
    }
    if let Some(prefix) = prefix {
        env.set(ENV_SESSION_PREFIX, prefix);
    }
    Arc::new(env)
}

pub fn production_env() -> Arc<MapEnv> {
    Arc::new(MapEnv::new())
}

pub fn detector(
    directory: Arc<FakeDirectory>,
    probe: Arc<FakeProbe>,
    env: Arc<MapEnv>,
) -> ConflictDetector {
    ConflictDetector::new(directory)
        .with_probe(probe)
        .with_env(env)
}

pub fn validator(
    directory: Arc<FakeDirectory>,
    factory: Arc<FakeFactory>,
    env: Arc<MapEnv>,
) -> IsolationValidator {
    IsolationValidator::new(directory, factory).with_env(env)
}
