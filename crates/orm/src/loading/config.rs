//! Executor configuration

use std::env;

use crate::error::{OrmError, OrmResult};

/// Configuration for plan execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Skip a relation fetch when the parent records yield no keys
    pub skip_empty_batches: bool,
    /// Log a warning when a batched relation lookup has no supporting index
    pub warn_unindexed: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            skip_empty_batches: false,
            warn_unindexed: true,
        }
    }
}

impl ExecutorConfig {
    /// Read overrides from `ORM_PLANNER_SKIP_EMPTY_BATCHES` and
    /// `ORM_PLANNER_WARN_UNINDEXED`, falling back to the defaults
    pub fn from_env() -> OrmResult<Self> {
        let defaults = Self::default();
        Ok(Self {
            skip_empty_batches: env_bool("ORM_PLANNER_SKIP_EMPTY_BATCHES", defaults.skip_empty_batches)?,
            warn_unindexed: env_bool("ORM_PLANNER_WARN_UNINDEXED", defaults.warn_unindexed)?,
        })
    }
}

fn env_bool(key: &str, default: bool) -> OrmResult<bool> {
    match env::var(key) {
        Ok(value) => parse_bool(&value).ok_or_else(|| {
            OrmError::Configuration(format!("{} must be a boolean, got '{}'", key, value))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_executor_config_default() {
        let config = ExecutorConfig::default();
        assert!(!config.skip_empty_batches);
        assert!(config.warn_unindexed);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_from_env() {
        env::set_var("ORM_PLANNER_SKIP_EMPTY_BATCHES", "yes");
        let config = ExecutorConfig::from_env().unwrap();
        assert!(config.skip_empty_batches);

        env::set_var("ORM_PLANNER_SKIP_EMPTY_BATCHES", "sometimes");
        assert!(matches!(
            ExecutorConfig::from_env(),
            Err(OrmError::Configuration(_))
        ));

        env::remove_var("ORM_PLANNER_SKIP_EMPTY_BATCHES");
        assert_eq!(ExecutorConfig::from_env().unwrap(), ExecutorConfig::default());
    }
}
