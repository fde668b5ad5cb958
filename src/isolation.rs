use std::path::Path;
use std::sync::Arc;

use crate::config::{EnvSource, IsolationConfig, ProcessEnv, ENV_SESSION_PREFIX};
use crate::directory::{DirectoryError, SessionDirectory, SessionManagerFactory};
use crate::environment::NamingConvention;
use crate::error::GuardError;

/// Confirms that the configured isolation mechanism actually keeps a test
/// run away from production sessions.
///
/// Outside test mode every check is a no-op.
pub struct IsolationValidator {
    directory: Arc<dyn SessionDirectory>,
    factory: Arc<dyn SessionManagerFactory>,
    env: Arc<dyn EnvSource>,
    naming: NamingConvention,
}

impl IsolationValidator {
    pub fn new(
        directory: Arc<dyn SessionDirectory>,
        factory: Arc<dyn SessionManagerFactory>,
    ) -> Self {
        Self {
            directory,
            factory,
            env: Arc::new(ProcessEnv),
            naming: NamingConvention::default(),
        }
    }

    pub fn with_env(mut self, env: Arc<dyn EnvSource>) -> Self {
        self.env = env;
        self
    }

    pub fn with_naming(mut self, naming: NamingConvention) -> Self {
        self.naming = naming;
        self
    }

    pub fn isolation_config(&self) -> IsolationConfig {
        IsolationConfig::from_env(self.env.as_ref())
    }

    /// In test mode, prove the dedicated transport is reachable, or fall back
    /// to checking the naming-prefix convention when none is configured.
    pub fn validate_isolation(&self) -> Result<(), GuardError> {
        let config = self.isolation_config();
        if !config.test_mode {
            return Ok(());
        }

        if let Some(transport) = &config.transport_path {
            return self.round_trip(transport);
        }

        let prefix = config.session_prefix.as_deref().ok_or_else(|| {
            GuardError::IsolationMisconfigured(format!(
                "no dedicated transport configured and {ENV_SESSION_PREFIX} is unset"
            ))
        })?;
        if !prefix.starts_with(&self.naming.test_prefix) {
            return Err(GuardError::IsolationMisconfigured(format!(
                "session prefix {:?} must start with {:?}",
                prefix, self.naming.test_prefix
            )));
        }
        Ok(())
    }

    /// Create and destroy a throwaway session through `transport`.
    fn round_trip(&self, transport: &Path) -> Result<(), GuardError> {
        let unusable = |e: DirectoryError| {
            GuardError::IsolationMisconfigured(format!(
                "transport {} is not usable: {}",
                transport.display(),
                e
            ))
        };

        let manager = self.factory.bind(transport).map_err(unusable)?;
        let probe = format!(
            "{}isolation-probe-{}",
            self.naming.test_prefix,
            uuid::Uuid::new_v4().simple()
        );
        manager.create_session(&probe).map_err(unusable)?;
        if let Err(e) = manager.kill_session(&probe) {
            tracing::warn!(session = %probe, error = %e, "failed to remove isolation probe session");
            return Err(GuardError::IsolationMisconfigured(format!(
                "probe session {} on {} could not be removed: {}",
                probe,
                transport.display(),
                e
            )));
        }
        tracing::debug!(transport = %transport.display(), "isolation transport verified");
        Ok(())
    }

    /// In test mode, fail if any production session is visible, unless a
    /// dedicated transport makes the default one irrelevant.
    pub fn validate_no_production_access(&self) -> Result<(), GuardError> {
        let config = self.isolation_config();
        if !config.test_mode || config.has_dedicated_transport() {
            return Ok(());
        }

        let mut visible: Vec<String> = self
            .directory
            .list_sessions("")?
            .into_iter()
            .filter(|name| self.naming.is_production(name))
            .collect();
        if visible.is_empty() {
            return Ok(());
        }
        visible.sort();
        Err(GuardError::IsolationMisconfigured(format!(
            "test run can see production session(s): {}",
            visible.join(", ")
        )))
    }
}
