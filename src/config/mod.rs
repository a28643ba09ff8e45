//! Configuration module
//!
//! - types/mod.rs: Top-level `Config` and logging settings
//! - types/storage.rs: Storage backend and embedding configuration
//! - types/provider.rs: LLM provider configuration
//! - types/engine.rs: Engine thresholds and timeouts
//! - io.rs: Configuration loading and saving
//! - validation.rs: Configuration validation
//! - paths.rs: Configuration file paths

mod io;
mod paths;
mod types;
mod validation;

// Re-export core config types
pub use types::{Config, LogConfig, LogFormat};

// Re-export storage types
pub use types::storage::{EmbeddingConfig, PostgresConfig, StorageBackendType, StorageConfig};

// Re-export provider types
pub use types::provider::{OpenRouterConfig, ProviderConfig};

// Re-export engine types
pub use types::engine::EngineConfig;

// Re-export IO and utilities
pub use io::{apply_env_overrides, apply_overrides_from, load_config, load_config_from_path};
pub use paths::{config_dir, config_path};
pub use validation::{validate_config, ConfigValidationResult, ValidationIssue};
