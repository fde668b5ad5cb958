use std::collections::HashSet;

use crate::environment::EnvironmentClass;
use crate::error::GuardError;

/// Test and production port reservations.
///
/// Every insert checks the opposite pool first, so as long as the caller
/// serializes mutations the two pools never share a port.
#[derive(Debug, Default)]
pub struct PortPools {
    test: HashSet<u16>,
    production: HashSet<u16>,
}

impl PortPools {
    pub fn new() -> Self {
        Self::default()
    }

    fn pool_mut(&mut self, is_test: bool) -> &mut HashSet<u16> {
        if is_test {
            &mut self.test
        } else {
            &mut self.production
        }
    }

    fn pool(&self, is_test: bool) -> &HashSet<u16> {
        if is_test {
            &self.test
        } else {
            &self.production
        }
    }

    /// Fails iff the other environment holds `port`.
    pub fn check(&self, port: u16, is_test: bool) -> Result<(), GuardError> {
        if self.pool(!is_test).contains(&port) {
            return Err(GuardError::PortConflict {
                port,
                held_by: EnvironmentClass::for_mode(!is_test),
            });
        }
        Ok(())
    }

    /// Returns true if the port was newly inserted.
    pub fn reserve(&mut self, port: u16, is_test: bool) -> Result<bool, GuardError> {
        self.check(port, is_test)?;
        Ok(self.pool_mut(is_test).insert(port))
    }

    /// Returns true if the port was present.
    pub fn release(&mut self, port: u16, is_test: bool) -> bool {
        self.pool_mut(is_test).remove(&port)
    }

    pub fn is_reserved(&self, port: u16, is_test: bool) -> bool {
        self.pool(is_test).contains(&port)
    }

    /// Sorted reservations of one pool.
    pub fn reserved(&self, is_test: bool) -> Vec<u16> {
        let mut ports: Vec<u16> = self.pool(is_test).iter().copied().collect();
        ports.sort_unstable();
        ports
    }
}
