use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::environment::NamingConvention;

/// Enables test mode when set to a truthy value.
pub const ENV_TEST_MODE: &str = "MUXGUARD_TEST_MODE";
/// Path of a dedicated multiplexer socket for test runs.
pub const ENV_TEST_SOCKET: &str = "MUXGUARD_TEST_SOCKET";
/// Session-name prefix every test session must carry.
pub const ENV_SESSION_PREFIX: &str = "MUXGUARD_SESSION_PREFIX";

/// Source of environment variables.
///
/// Isolation settings are looked up through this on every call, so a
/// consumer never sees a stale snapshot.
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory environment, mutable through a shared reference.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MapEnv {
    vars: parking_lot::RwLock<std::collections::HashMap<String, String>>,
}

#[cfg(test)]
impl MapEnv {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    pub(crate) fn set(&self, key: &str, value: &str) {
        self.vars.write().insert(key.to_string(), value.to_string());
    }

    pub(crate) fn remove(&self, key: &str) {
        self.vars.write().remove(key);
    }
}

#[cfg(test)]
impl EnvSource for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.read().get(key).cloned()
    }
}

/// Isolation settings for the current call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IsolationConfig {
    pub test_mode: bool,
    /// Dedicated multiplexer socket that sandboxes test sessions.
    pub transport_path: Option<PathBuf>,
    /// Prefix test sessions are required to carry.
    pub session_prefix: Option<String>,
}

impl IsolationConfig {
    pub fn from_env(env: &dyn EnvSource) -> Self {
        Self {
            test_mode: env.var(ENV_TEST_MODE).is_some_and(|v| parse_bool(&v)),
            transport_path: non_empty(env.var(ENV_TEST_SOCKET)).map(PathBuf::from),
            session_prefix: non_empty(env.var(ENV_SESSION_PREFIX)),
        }
    }

    pub fn has_dedicated_transport(&self) -> bool {
        self.transport_path.is_some()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Optional on-disk settings, loaded from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardConfig {
    #[serde(default)]
    pub naming: NamingConvention,
}

impl GuardConfig {
    /// Load config from a TOML file path. Returns defaults if the file doesn't exist.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        check_config_permissions(path);

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?;
        config
            .naming
            .validate()
            .map_err(|reason| ConfigError::Invalid(path.to_path_buf(), reason))?;
        Ok(config)
    }
}

/// Errors that can occur when loading config.
#[derive(Debug)]
pub enum ConfigError {
    ReadFailed(PathBuf, std::io::Error),
    ParseFailed(PathBuf, toml::de::Error),
    Invalid(PathBuf, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFailed(path, e) => {
                write!(f, "Failed to read config {}: {}", path.display(), e)
            }
            Self::ParseFailed(path, e) => {
                write!(f, "Failed to parse config {}: {}", path.display(), e)
            }
            Self::Invalid(path, reason) => {
                write!(f, "Invalid config {}: {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Warn if a config file is writable by other users.
///
/// A world-writable naming file lets any local user reclassify production
/// sessions as test sessions.
#[cfg(unix)]
pub fn check_config_permissions(path: &std::path::Path) {
    use std::os::unix::fs::PermissionsExt;

    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(_) => return,
    };

    let mode = metadata.permissions().mode();
    if is_world_writable(mode) {
        tracing::warn!(
            "Config file {} is world-writable (mode {:o}). \
             Consider restricting permissions to 644.",
            path.display(),
            mode & 0o7777,
        );
    }
}

#[cfg(not(unix))]
pub fn check_config_permissions(_path: &std::path::Path) {}

/// Pure helper for testing; does NOT read the filesystem.
pub fn is_world_writable(mode: u32) -> bool {
    mode & 0o002 != 0
}
