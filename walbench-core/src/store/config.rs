//! Store configuration and its option fold

use crate::txn::RetryPolicy;
use crate::{BenchError, Pragma, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Store configuration, fixed once the store is open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Upper bound on concurrent write transactions
    pub max_writers: usize,
    /// Pragmas applied to every session, in order
    pub pragmas: Vec<Pragma>,
    /// Busy-retry policy for write transactions
    pub retry: RetryPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_writers: crate::config::DEFAULT_MAX_WRITERS,
            pragmas: Vec::new(),
            retry: RetryPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Start a builder from the defaults
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Fold `options` over the defaults, dropping invalid ones
    pub fn from_options(options: impl IntoIterator<Item = ConfigOption>) -> Self {
        options
            .into_iter()
            .fold(ConfigBuilder::default(), ConfigBuilder::with)
            .build()
    }
}

/// One configuration mutator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOption {
    /// Set the writer cap; zero or negative is invalid
    MaxWriters(i64),
    /// Append one pragma
    Pragma(Pragma),
    /// Replace the whole pragma list
    Pragmas(Vec<Pragma>),
    /// Replace the retry policy
    Retry(RetryPolicy),
}

impl ConfigOption {
    pub fn max_writers(n: i64) -> Self {
        ConfigOption::MaxWriters(n)
    }

    pub fn pragma(setting: impl Into<String>, value: impl Into<String>) -> Self {
        ConfigOption::Pragma(Pragma::new(setting, value))
    }

    /// Apply to `config`, leaving it untouched if the option is invalid
    fn apply(self, config: &mut StoreConfig) -> Result<()> {
        match self {
            ConfigOption::MaxWriters(n) => {
                if n <= 0 {
                    return Err(BenchError::Config(format!(
                        "max_writers must be positive, got {}",
                        n
                    )));
                }
                config.max_writers = usize::try_from(n)
                    .map_err(|_| BenchError::Config(format!("max_writers out of range: {}", n)))?;
            }
            ConfigOption::Pragma(pragma) => {
                pragma.validate()?;
                config.pragmas.push(pragma);
            }
            ConfigOption::Pragmas(pragmas) => {
                for pragma in &pragmas {
                    pragma.validate()?;
                }
                config.pragmas = pragmas;
            }
            ConfigOption::Retry(policy) => {
                if policy.max_attempts == 0 {
                    return Err(BenchError::Config(
                        "retry policy needs at least one attempt".to_string(),
                    ));
                }
                config.retry = policy;
            }
        }
        Ok(())
    }
}

/// Ordered list of options applied left to right over [`StoreConfig::default`]
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    options: Vec<ConfigOption>,
}

impl ConfigBuilder {
    /// Queue an option
    pub fn with(mut self, option: ConfigOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn max_writers(self, n: i64) -> Self {
        self.with(ConfigOption::MaxWriters(n))
    }

    pub fn pragma(self, setting: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(ConfigOption::pragma(setting, value))
    }

    pub fn pragmas(self, pragmas: Vec<Pragma>) -> Self {
        self.with(ConfigOption::Pragmas(pragmas))
    }

    pub fn retry(self, policy: RetryPolicy) -> Self {
        self.with(ConfigOption::Retry(policy))
    }

    /// Apply every option, logging and skipping the invalid ones
    pub fn build(self) -> StoreConfig {
        let mut config = StoreConfig::default();
        for option in self.options {
            if let Err(e) = option.apply(&mut config) {
                warn!("Ignoring configuration option: {}", e);
            }
        }
        config
    }

    /// Apply every option, failing on the first invalid one
    pub fn try_build(self) -> Result<StoreConfig> {
        let mut config = StoreConfig::default();
        for option in self.options {
            option.apply(&mut config)?;
        }
        Ok(config)
    }
}
