//! Error types for value tree operations

use thiserror::Error;

use crate::value::ValueType;

/// Main error type for value tree operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    /// A required argument was empty or otherwise unusable
    #[error("Invalid operand: {0}")]
    InvalidOperand(String),

    /// The value is no longer registered with any controller
    #[error("Value accessed after being detached")]
    Detached,

    /// Mutation attempted through a read-only handle
    #[error("Mutation attempted on read-only value")]
    ReadOnly,

    /// A thread-confined controller was accessed from another thread
    #[error("Controller accessed from incorrect thread")]
    ThreadViolation,

    /// No entry exists for the key or index
    #[error("No entry for {0}")]
    NotFound(String),

    /// The entry exists but holds a different kind of value
    #[error("Type error: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type
        expected: ValueType,
        /// Actual type found
        got: ValueType,
    },

    /// The operation has no meaning for this kind of value
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Nesting went past the configured limit
    #[error("Nesting depth exceeded (max {max})")]
    DepthExceeded {
        /// The configured limit
        max: usize,
    },

    /// Controller bookkeeping rejected the request
    #[error(transparent)]
    Controller(#[from] ControllerError),
}

/// Bookkeeping errors raised by a [`ValueController`](crate::ValueController).
///
/// These are programmer errors: they only happen when a caller breaks the
/// registration contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// `set_owner` on a controller that already has one
    #[error("Controller already has an owner")]
    DuplicateOwner,

    /// `add_reference` before any owner was registered
    #[error("Controller has no owner to reference")]
    MissingOwner,

    /// `add_reference` for the owner's own node
    #[error("The owner cannot also be registered as a reference")]
    OwnerAsReference,

    /// `add_reference` for a node that already has a live wrapper
    #[error("Node {0} is already registered")]
    AlreadyRegistered(u64),
}

/// Result type alias for value tree operations
pub type Result<T> = std::result::Result<T, ValueError>;

impl ValueError {
    /// Shorthand for an [`ValueError::InvalidOperand`]
    pub fn invalid(msg: impl Into<String>) -> Self {
        ValueError::InvalidOperand(msg.into())
    }

    /// Shorthand for a [`ValueError::TypeMismatch`]
    pub fn type_mismatch(expected: ValueType, got: ValueType) -> Self {
        ValueError::TypeMismatch { expected, got }
    }

    /// True for errors that indicate a broken caller contract rather than
    /// a state the caller is expected to check for.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            ValueError::InvalidOperand(_)
                | ValueError::ThreadViolation
                | ValueError::Controller(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch_message() {
        let err = ValueError::type_mismatch(ValueType::Int, ValueType::String);
        assert_eq!(err.to_string(), "Type error: expected int, got string");
    }

    #[test]
    fn test_controller_error_converts() {
        let err: ValueError = ControllerError::DuplicateOwner.into();
        assert!(err.is_contract_violation());
        assert_eq!(err.to_string(), "Controller already has an owner");
    }

    #[test]
    fn test_detached_is_recoverable() {
        assert!(!ValueError::Detached.is_contract_violation());
        assert!(!ValueError::ReadOnly.is_contract_violation());
    }
}
