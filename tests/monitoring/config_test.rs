/*!
 * Configuration Tests
 * Session settings read from the process environment
 */

use guarded_memory::core::config::{
    ENV_CAPACITY, ENV_LOG_FILE, ENV_LOG_LEVEL, ENV_ON_CORRUPTION,
};
use guarded_memory::memory::{CorruptionAction, MemoryError};
use guarded_memory::monitoring::LogLevel;
use guarded_memory::SessionConfig;
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::env;
use std::path::PathBuf;

const ALL_KEYS: [&str; 4] = [ENV_CAPACITY, ENV_LOG_FILE, ENV_LOG_LEVEL, ENV_ON_CORRUPTION];

fn clear_env() {
    for key in ALL_KEYS {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();

    let config = SessionConfig::from_env().unwrap();

    assert_eq!(config, SessionConfig::default());
    assert_eq!(config.capacity, 2000);
    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(config.on_corruption, CorruptionAction::Poison);
}

#[test]
#[serial]
fn test_from_env_overrides() {
    clear_env();
    env::set_var(ENV_CAPACITY, " 8192 ");
    env::set_var(ENV_LOG_FILE, "/var/tmp/guarded.log");
    env::set_var(ENV_LOG_LEVEL, "ERROR");
    env::set_var(ENV_ON_CORRUPTION, "panic");

    let config = SessionConfig::from_env();
    clear_env();
    let config = config.unwrap();

    assert_eq!(config.capacity, 8192);
    assert_eq!(config.log_file, Some(PathBuf::from("/var/tmp/guarded.log")));
    assert_eq!(config.log_level, LogLevel::Error);
    assert_eq!(config.on_corruption, CorruptionAction::Abort);
}

#[test]
#[serial]
fn test_from_env_rejects_zero_capacity() {
    clear_env();
    env::set_var(ENV_CAPACITY, "0");

    let result = SessionConfig::from_env();
    clear_env();

    assert!(matches!(result, Err(MemoryError::InvalidConfig(_))));
}

#[test]
#[serial]
fn test_from_env_rejects_unknown_action() {
    clear_env();
    env::set_var(ENV_ON_CORRUPTION, "shrug");

    let result = SessionConfig::from_env();
    clear_env();

    match result {
        Err(MemoryError::InvalidConfig(message)) => {
            assert!(message.contains(ENV_ON_CORRUPTION));
        }
        other => panic!("expected InvalidConfig, got {:?}", other),
    }
}
