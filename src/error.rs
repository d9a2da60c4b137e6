//! Error types for eventgate.
//!
//! Errors are strongly typed using thiserror and split the same way callers
//! act on them: validation errors reject a schema or registration input,
//! execution errors come out of evaluation and dispatch.

use std::fmt;

use thiserror::Error;

/// Lifecycle state of a filter or event filter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterState {
    /// Rows may be added; evaluation is not allowed yet.
    Open,
    /// Rows are frozen; evaluation is allowed, registration is not.
    Sealed,
}

impl fmt::Display for FilterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Sealed => write!(f, "sealed"),
        }
    }
}

/// Validation errors raised while declaring schemas or registering triggers.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Unknown filter kind '{kind}'")]
    UnknownFilterKind {
        kind: String,
    },

    #[error("Attribute '{attribute}' is declared twice on event '{event}'")]
    DuplicateAttribute {
        event: String,
        attribute: String,
    },

    #[error("Attribute '{attribute}' is not declared on event '{event}'")]
    UnknownAttribute {
        event: String,
        attribute: String,
    },

    #[error("Attribute '{attribute}' on event '{event}' expects a {expected} constraint, got {actual}")]
    ConstraintMismatch {
        event: String,
        attribute: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid constraint: {reason}")]
    InvalidConstraint {
        reason: String,
    },

    #[error("Malformed {what}: {reason}")]
    Malformed {
        what: &'static str,
        reason: String,
    },

    #[error("Trigger '{trigger}' is already registered on event '{event}'")]
    DuplicateTrigger {
        event: String,
        trigger: String,
    },

    #[error("The {item} '{name}' is already defined")]
    AlreadyDefined {
        item: &'static str,
        name: String,
    },
}

/// Execution errors raised while evaluating records or dispatching them.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("Record for event '{event}' has no value for attribute '{attribute}'")]
    MissingAttribute {
        event: String,
        attribute: String,
    },

    #[error("Attribute '{attribute}' expects {expected}, got {value}")]
    TypeCoercion {
        attribute: String,
        expected: &'static str,
        value: String,
    },

    #[error("Cannot {operation} while {target} is {state}")]
    SealedStateViolation {
        target: String,
        operation: &'static str,
        state: FilterState,
    },

    #[error("Event '{name}' is not defined")]
    EventNotFound {
        name: String,
    },

    #[error("No handler is defined for trigger '{trigger}'")]
    HandlerNotFound {
        trigger: String,
    },

    #[error("Dispatch queue is full (capacity {capacity})")]
    QueueFull {
        capacity: usize,
    },

    #[error("Channel disconnected: {path}")]
    Disconnected {
        path: String,
    },
}

/// Top-level error type for eventgate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GateError {
    /// Schema or registration input was rejected.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Evaluation or dispatch failed.
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// An invariant inside the crate did not hold.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the broken invariant.
        message: String,
    },
}

impl GateError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub(crate) fn sealed_state(target: impl Into<String>, operation: &'static str, state: FilterState) -> Self {
        Self::Execution(ExecutionError::SealedStateViolation {
            target: target.into(),
            operation,
            state,
        })
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true for the recoverable path: a record that lacks a declared
    /// attribute is unmatched, not broken.
    #[must_use]
    pub const fn is_soft(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::MissingAttribute { .. }))
    }

    /// Returns true if resubmitting the same input may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Execution(ExecutionError::QueueFull { .. }))
    }
}

/// Result type alias for eventgate operations.
pub type GateResult<T> = Result<T, GateError>;
