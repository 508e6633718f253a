//! Error types for locsync
//!
//! This module defines the common error type used throughout the system.

use crate::types::{ObjectKey, ResourceType, TenantName};
use thiserror::Error;

/// Common result type for locsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for locsync
#[derive(Debug, Error)]
pub enum Error {
    // Cache errors
    #[error("namespace not found: {tenant}|{name}")]
    NamespaceNotFound { tenant: TenantName, name: String },

    #[error(
        "error reconciling resource {tenant}|{namespace}/{name}: error getting namespace: {source}"
    )]
    NamespaceLookup {
        tenant: TenantName,
        namespace: String,
        name: String,
        source: Box<Error>,
    },

    #[error("informer for {0} is not synced; re-enqueueing")]
    TypeNotSynced(ResourceType),

    // Store errors
    #[error("object not found: {resource} {key}")]
    ObjectNotFound { resource: ResourceType, key: ObjectKey },

    #[error("invalid merge patch: {0}")]
    InvalidPatch(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("operation cancelled")]
    Cancelled,

    // Internal errors
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Check if this is a retryable error
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::NamespaceLookup { .. } | Self::TypeNotSynced(_) | Self::Store(_)
        )
    }

    /// Check if this is a not found error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NamespaceNotFound { .. } | Self::ObjectNotFound { .. }
        )
    }
}
