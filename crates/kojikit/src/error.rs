//! Error types for tag reconciliation.
//!
//! Errors are categorized so the front end can tell a bad declaration
//! apart from a failed remote call. Every error aborts the remainder of
//! the reconciliation; nothing is aggregated or retried.

use thiserror::Error;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The declared state is inconsistent with itself or with the hub
    Declaration,
    /// A call to the hub failed
    Remote,
    /// Local plumbing failed (snapshot file, serialization)
    Backend,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Declaration => "Invalid declaration",
            Self::Remote => "Remote call failed",
            Self::Backend => "Backend error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Declaration => "Fix the manifest and run again",
            Self::Remote => {
                "Changes issued before the failure were kept; run again once the hub is healthy"
            }
            Self::Backend => "Check the hub snapshot path and its permissions",
        }
    }
}

/// Errors that can occur while reconciling tags and access grants.
#[derive(Debug, Error)]
pub enum Error {
    /// A declared inheritance parent does not exist on the hub
    #[error("parent tag '{parent}' of '{tag}' not found")]
    UnresolvedParent {
        /// Tag whose inheritance was being set
        tag: String,
        /// Parent name that could not be resolved
        parent: String,
    },

    /// A declared permission label is missing from the hub's catalog
    #[error("unknown permission: {0}")]
    UnknownPermission(String),

    /// A hub call failed
    #[error("{operation} failed: {message}")]
    Remote {
        /// Name of the hub operation
        operation: &'static str,
        /// Fault message reported by the hub
        message: String,
    },

    /// Target state is neither `present` nor `absent`
    #[error("state must be 'present' or 'absent', got '{0}'")]
    InvalidTargetState(String),

    /// A package is declared under more than one owner
    #[error("package '{package}' is declared for several owners: {}", .owners.join(", "))]
    ConflictingOwners {
        /// Package name
        package: String,
        /// Every owner claiming the package
        owners: Vec<String>,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a remote call failure.
    pub fn remote(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Remote {
            operation,
            message: message.into(),
        }
    }

    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnresolvedParent { .. }
            | Error::UnknownPermission(_)
            | Error::InvalidTargetState(_)
            | Error::ConflictingOwners { .. } => ErrorCategory::Declaration,
            Error::Remote { .. } => ErrorCategory::Remote,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Backend,
        }
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;
