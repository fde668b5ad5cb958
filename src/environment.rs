use serde::{Deserialize, Serialize};

/// Which side of the test/production split a session name belongs to.
///
/// Derived from the name on every call via [`NamingConvention::classify`];
/// nothing stores it except the `is_test` flag on a lock record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentClass {
    Test,
    Production,
    Unclassified,
}

impl EnvironmentClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentClass::Test => "test",
            EnvironmentClass::Production => "production",
            EnvironmentClass::Unclassified => "unclassified",
        }
    }

    /// The class a caller in the given mode is allowed to touch.
    pub fn for_mode(test_mode: bool) -> Self {
        if test_mode {
            EnvironmentClass::Test
        } else {
            EnvironmentClass::Production
        }
    }

    /// True if a caller in `test_mode` must not touch a session of this class.
    ///
    /// Unclassified sessions belong to neither side and never conflict.
    pub fn conflicts_with_mode(&self, test_mode: bool) -> bool {
        matches!(
            (self, test_mode),
            (EnvironmentClass::Production, true) | (EnvironmentClass::Test, false)
        )
    }
}

impl std::fmt::Display for EnvironmentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reserved session-name prefixes that mark a session as test or production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConvention {
    pub test_prefix: String,
    pub production_prefix: String,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            test_prefix: Self::DEFAULT_TEST_PREFIX.to_string(),
            production_prefix: Self::DEFAULT_PRODUCTION_PREFIX.to_string(),
        }
    }
}

impl NamingConvention {
    pub const DEFAULT_TEST_PREFIX: &'static str = "test-";
    pub const DEFAULT_PRODUCTION_PREFIX: &'static str = "prod-";

    /// Classify a session name by its prefix.
    pub fn classify(&self, name: &str) -> EnvironmentClass {
        if name.starts_with(&self.test_prefix) {
            EnvironmentClass::Test
        } else if name.starts_with(&self.production_prefix) {
            EnvironmentClass::Production
        } else {
            EnvironmentClass::Unclassified
        }
    }

    pub fn is_test(&self, name: &str) -> bool {
        self.classify(name) == EnvironmentClass::Test
    }

    pub fn is_production(&self, name: &str) -> bool {
        self.classify(name) == EnvironmentClass::Production
    }

    /// The prefix used when listing sessions of `class` through a directory.
    ///
    /// Unclassified sessions have no prefix of their own, so the empty
    /// prefix (every session) is returned.
    pub fn prefix_for(&self, class: EnvironmentClass) -> &str {
        match class {
            EnvironmentClass::Test => &self.test_prefix,
            EnvironmentClass::Production => &self.production_prefix,
            EnvironmentClass::Unclassified => "",
        }
    }

    /// Reject conventions that would make classification ambiguous.
    pub fn validate(&self) -> Result<(), String> {
        if self.test_prefix.is_empty() {
            return Err("test prefix must not be empty".into());
        }
        if self.production_prefix.is_empty() {
            return Err("production prefix must not be empty".into());
        }
        if self.test_prefix.starts_with(&self.production_prefix)
            || self.production_prefix.starts_with(&self.test_prefix)
        {
            return Err(format!(
                "prefixes overlap: test={:?} production={:?}",
                self.test_prefix, self.production_prefix
            ));
        }
        Ok(())
    }
}
