/*!
 * Core Module
 * Fundamental types, limits and configuration
 */

pub mod config;
pub mod limits;
pub mod types;

// Re-export for convenience
pub use config::SessionConfig;
pub use types::*;
