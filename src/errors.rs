//! # Error Handling Module
//!
//! ## Purpose
//! Centralized error handling for the region pricing engine, providing structured
//! error types and conversion utilities for all system components.
//!
//! ## Input/Output Specification
//! - **Input**: Error conditions from sources, caches, aggregation, and the API
//! - **Output**: Structured error types with context and error chains
//! - **Error Categories**: Validation, Source, Store, Configuration, Internal
//!
//! ## Propagation Policy
//! Failures below the region level are absorbed where they occur (a SKU without a
//! price only affects counters, a failed region is recorded and omitted). Failures
//! at or above the whole-request level (invalid parameters, both sources dead)
//! propagate to the caller as one of the variants below.

use thiserror::Error;

/// Result type used throughout the application
pub type Result<T> = std::result::Result<T, PricingError>;

/// Error types for the region pricing engine
#[derive(Debug, Error)]
pub enum PricingError {
    /// Network-related errors against the retail prices API
    #[error("Network error: {details}")]
    Network { details: String },

    /// Rate limiting by an upstream API
    #[error("Rate limit exceeded for {source_name}")]
    RateLimitExceeded {
        source_name: String,
        retry_after_seconds: Option<u64>,
    },

    /// A whole-region fetch failed; absorbed by the selector, never fatal on its own
    #[error("Price fetch failed for region '{region_id}': {reason}")]
    RegionFetch { region_id: String, reason: String },

    /// Every source failed for every region in the request scope
    #[error("No pricing source available: {details}")]
    SourceUnavailable { details: String },

    /// Failed to parse data returned by an upstream API
    #[error("Failed to parse data from {source_name}: {details}")]
    DataParsing { source_name: String, details: String },

    /// Request-validation failures (invalid currency, unknown group-by, ...)
    #[error("Validation failed for '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Local price store errors
    #[error("Store error: {0}")]
    Store(#[from] sled::Error),

    /// Binary serialization errors (store entries)
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal system errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl PricingError {
    /// Check if the error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PricingError::Network { .. }
                | PricingError::RateLimitExceeded { .. }
                | PricingError::RegionFetch { .. }
                | PricingError::SourceUnavailable { .. }
        )
    }

    /// Get error category for metrics, logging, and HTTP status mapping
    pub fn category(&self) -> &'static str {
        match self {
            PricingError::Validation { .. } => "validation",
            PricingError::Config { .. } | PricingError::Toml(_) => "configuration",
            PricingError::Network { .. }
            | PricingError::RateLimitExceeded { .. }
            | PricingError::RegionFetch { .. }
            | PricingError::SourceUnavailable { .. }
            | PricingError::DataParsing { .. } => "source",
            PricingError::Store(_) | PricingError::Serialization(_) => "store",
            PricingError::Json(_) | PricingError::Io(_) | PricingError::Internal { .. } => {
                "internal"
            }
        }
    }
}

impl From<reqwest::Error> for PricingError {
    fn from(err: reqwest::Error) -> Self {
        PricingError::Network {
            details: err.to_string(),
        }
    }
}

/// Helper for request-validation errors
#[macro_export]
macro_rules! validation_error {
    ($field:expr, $reason:expr) => {
        $crate::errors::PricingError::Validation {
            field: $field.to_string(),
            reason: $reason.to_string(),
        }
    };
}
