//! Error types for configuration resolution

use thiserror::Error;

use crate::config::RuntimeGeneration;

/// Result type alias for resolution operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Fatal errors produced while resolving an engine configuration
///
/// Anything recoverable is reported as a [`Notice`](crate::notice::Notice)
/// instead; an error here means no configuration is returned at all.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Two or more explicit settings contradict each other
    #[error("conflicting configuration: {0}")]
    Conflict(String),

    /// A single field or field combination violates a constraint
    #[error("invalid configuration: {0}")]
    Validation(String),

    /// A requested feature cannot run on the runtime the caller forced
    #[error("{feature} is not supported on the {runtime} runtime")]
    UnsupportedOnRuntime {
        /// The offending option or feature
        feature: String,

        /// The runtime generation that was forced
        runtime: RuntimeGeneration,
    },

    /// Serialization of a resolved configuration failed
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        ConfigError::Conflict(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        ConfigError::Validation(msg.into())
    }

    /// Create an unsupported-on-runtime error
    pub fn unsupported(feature: impl Into<String>, runtime: RuntimeGeneration) -> Self {
        ConfigError::UnsupportedOnRuntime {
            feature: feature.into(),
            runtime,
        }
    }

    /// Whether this error reports contradictory explicit settings
    ///
    /// Forcing a runtime that cannot serve a requested feature is treated as
    /// a contradiction between the override and the feature flag, so
    /// [`ConfigError::UnsupportedOnRuntime`] answers true here as well.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            ConfigError::Conflict(_) | ConfigError::UnsupportedOnRuntime { .. }
        )
    }

    /// Whether this error reports a single-constraint violation
    pub fn is_validation(&self) -> bool {
        matches!(self, ConfigError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::conflict("chunked prefill requires pipeline_parallel_size == 1");
        assert_eq!(
            err.to_string(),
            "conflicting configuration: chunked prefill requires pipeline_parallel_size == 1"
        );

        let err = ConfigError::validation("max_lora_rank must be one of 8, 16, 32, 64, 128, 256");
        assert!(err.to_string().starts_with("invalid configuration:"));
    }

    #[test]
    fn test_unsupported_display_names_runtime() {
        let err = ConfigError::unsupported("preemption_mode", RuntimeGeneration::NextGen);
        assert_eq!(
            err.to_string(),
            "preemption_mode is not supported on the next-generation runtime"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(ConfigError::conflict("x").is_conflict());
        assert!(!ConfigError::conflict("x").is_validation());
        assert!(ConfigError::validation("x").is_validation());
        assert!(ConfigError::unsupported("x", RuntimeGeneration::NextGen).is_conflict());
    }
}
