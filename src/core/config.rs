/*!
 * Session Configuration
 * Environment-driven settings for the CLI harness and embedding applications
 *
 * Environment variables:
 * - GUARDED_MEMORY_CAPACITY: backing buffer size in bytes (default: 2000)
 * - GUARDED_MEMORY_LOG_FILE: optional path for a file logger
 * - GUARDED_MEMORY_LOG_LEVEL: minimum level for dispatcher loggers (default: debug)
 * - GUARDED_MEMORY_ON_CORRUPTION: `poison` or `abort` (default: poison)
 */

use super::limits::DEFAULT_ARENA_CAPACITY;
use crate::memory::{CorruptionAction, MemoryError, MemoryResult};
use crate::monitoring::LogLevel;
use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_CAPACITY: &str = "GUARDED_MEMORY_CAPACITY";
pub const ENV_LOG_FILE: &str = "GUARDED_MEMORY_LOG_FILE";
pub const ENV_LOG_LEVEL: &str = "GUARDED_MEMORY_LOG_LEVEL";
pub const ENV_ON_CORRUPTION: &str = "GUARDED_MEMORY_ON_CORRUPTION";

/// Settings for one memory session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub capacity: usize,
    pub log_file: Option<PathBuf>,
    pub log_level: LogLevel,
    pub on_corruption: CorruptionAction,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_ARENA_CAPACITY,
            log_file: None,
            log_level: LogLevel::Debug,
            on_corruption: CorruptionAction::Poison,
        }
    }
}

impl SessionConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> MemoryResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Missing keys fall back to defaults; present but malformed values are
    /// rejected rather than silently ignored.
    pub fn from_lookup<F>(lookup: F) -> MemoryResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_CAPACITY) {
            config.capacity = parse_setting(ENV_CAPACITY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_LOG_FILE) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                config.log_file = Some(PathBuf::from(trimmed));
            }
        }
        if let Some(raw) = lookup(ENV_LOG_LEVEL) {
            config.log_level = parse_setting(ENV_LOG_LEVEL, &raw)?;
        }
        if let Some(raw) = lookup(ENV_ON_CORRUPTION) {
            config.on_corruption = parse_setting(ENV_ON_CORRUPTION, &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants that parsing alone cannot express
    pub fn validate(&self) -> MemoryResult<()> {
        if self.capacity == 0 {
            return Err(MemoryError::InvalidConfig(format!(
                "{} must be greater than zero",
                ENV_CAPACITY
            )));
        }
        Ok(())
    }
}

fn parse_setting<T>(key: &str, raw: &str) -> MemoryResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| MemoryError::InvalidConfig(format!("{}={:?}: {}", key, raw, e)))
}
