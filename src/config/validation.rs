//! Configuration validation
//!
//! Validates configuration and reports issues.

use secrecy::ExposeSecret;

use super::types::storage::StorageBackendType;
use super::types::Config;
use crate::core::types::MAX_SEARCH_LIMIT;

/// Result of configuration validation
#[derive(Debug, Clone)]
pub struct ConfigValidationResult {
    /// Whether the config is valid
    pub valid: bool,
    /// Validation errors (critical)
    pub errors: Vec<ValidationIssue>,
    /// Validation warnings (non-critical)
    pub warnings: Vec<ValidationIssue>,
}

impl ConfigValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        ConfigValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an error
    pub fn with_error(mut self, issue: ValidationIssue) -> Self {
        self.valid = false;
        self.errors.push(issue);
        self
    }

    /// Add a warning
    pub fn with_warning(mut self, issue: ValidationIssue) -> Self {
        self.warnings.push(issue);
        self
    }

    /// First error as a single message, if any
    pub fn first_error(&self) -> Option<String> {
        self.errors.first().map(|issue| issue.to_string())
    }
}

/// A validation issue
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the config field
    pub path: String,
    /// Issue message
    pub message: String,
    /// Suggested fix
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Create a new issue
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Add a suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> ConfigValidationResult {
    let mut result = ConfigValidationResult::valid();

    result = validate_storage_config(config, result);
    result = validate_provider_config(config, result);
    result = validate_engine_config(config, result);

    result
}

fn validate_storage_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    let pg_configured = config
        .storage
        .postgres
        .as_ref()
        .map_or(false, |pg| !pg.url.expose_secret().is_empty());

    if config.storage.backend == StorageBackendType::Postgres && !pg_configured {
        result = result.with_error(
            ValidationIssue::new(
                "storage.postgres",
                "PostgreSQL backend selected but not configured",
            )
            .with_suggestion("Set DATABASE_URL or MEMORIA_STORAGE=memory"),
        );
    }

    if config.storage.backend == StorageBackendType::Memory {
        result = result.with_warning(ValidationIssue::new(
            "storage.backend",
            "In-memory storage selected. Memories are lost when the process exits.",
        ));
    }

    if config.storage.embedding.dimensions == 0 {
        result = result.with_error(ValidationIssue::new(
            "storage.embedding.dimensions",
            "Embedding dimensions must be positive",
        ));
    }

    result
}

fn validate_provider_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    let has_llm = config
        .provider
        .openrouter
        .as_ref()
        .map_or(false, |or| !or.api_key.expose_secret().is_empty());

    if !has_llm {
        result = result.with_warning(
            ValidationIssue::new(
                "provider.openrouter",
                "No LLM provider configured. Statements are not expanded and close matches are never treated as updates.",
            )
            .with_suggestion("Set OPENROUTER_API_KEY"),
        );
    }

    result
}

fn validate_engine_config(config: &Config, mut result: ConfigValidationResult) -> ConfigValidationResult {
    let engine = &config.engine;

    for (path, value) in [
        ("engine.similarity_threshold", engine.similarity_threshold),
        ("engine.search_threshold", engine.search_threshold),
    ] {
        if !(value > 0.0 && value <= 2.0) {
            result = result.with_error(
                ValidationIssue::new(path, format!("Cosine distance threshold out of range: {}", value))
                    .with_suggestion("Use a value in (0, 2]"),
            );
        }
    }

    if !(1..=MAX_SEARCH_LIMIT).contains(&engine.default_search_limit) {
        result = result.with_error(ValidationIssue::new(
            "engine.default_search_limit",
            format!("Must be between 1 and {}", MAX_SEARCH_LIMIT),
        ));
    }

    if engine.background_queue_capacity == 0 {
        result = result.with_error(ValidationIssue::new(
            "engine.background_queue_capacity",
            "Queue capacity must be positive",
        ));
    }

    result
}
