//! Error types for the compliance domain

/// Errors raised by domain invariants
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComplianceError {
    #[error("Invalid status transition for {entity}: {from} -> {to}")]
    InvalidTransition {
        entity: String,
        from: String,
        to: String,
    },

    #[error("Completion metadata of {0} cannot be rewritten")]
    CompletionRewrite(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for domain operations
pub type ComplianceResult<T> = Result<T, ComplianceError>;
