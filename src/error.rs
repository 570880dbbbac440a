//! Error taxonomy for the IFS core.
//!
//! Every fallible operation returns [`IfsError`]. Each variant reports one
//! of five [`ErrorKind`]s so transport layers (the REST façade, tests) can
//! react to the category without matching every variant.
//!
//! Errors are raised synchronously at the offending call and the call leaves
//! prior state untouched.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parts::PartId;

/// Coarse error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A scalar outside its declared range, or otherwise malformed input.
    Validation,
    /// An unknown Part, edge, or session was referenced.
    NotFound,
    /// The requested transition is not adjacent to the current state.
    IllegalStateTransition,
    /// The call is legal in shape but its preconditions do not hold.
    PreconditionFailed,
    /// The unburdening pipeline for this Exile has already finished.
    PipelineAlreadyComplete,
}

/// Errors produced by the IFS core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IfsError {
    /// A field failed range or shape validation.
    #[error("Validation error: {field}: {reason}")]
    Validation { field: String, reason: String },

    /// A blend request was rejected.
    #[error("Invalid blend for part {part_id}: {reason}")]
    InvalidBlend { part_id: PartId, reason: String },

    /// Unknown Part id.
    #[error("Part not found: {0}")]
    PartNotFound(PartId),

    /// Unknown edge.
    #[error("Edge not found: {source_id} -> {target_id}")]
    EdgeNotFound { source_id: PartId, target_id: PartId },

    /// The Part exists but is the wrong kind for this operation.
    #[error("Part {part_id} is a {actual}, expected {expected}")]
    WrongPartKind {
        part_id: PartId,
        expected: String,
        actual: String,
    },

    /// The requested state is not adjacent to the current one.
    #[error("Illegal state transition for part {part_id}: {from} -> {to}")]
    IllegalStateTransition {
        part_id: PartId,
        from: String,
        to: String,
    },

    /// A precondition of the call does not hold.
    #[error("Precondition failed in {operation}: {reason}")]
    PreconditionFailed { operation: String, reason: String },

    /// Purge was called on an Exile that carries no burden.
    #[error("Exile {0} has no burden to release")]
    NoBurdenToRelease(PartId),

    /// The unburdening pipeline for this Exile is already complete.
    #[error("Unburdening pipeline already complete for exile {0}")]
    PipelineAlreadyComplete(PartId),

    /// A dialogue call was made without a bound provider.
    #[error("No dialogue provider configured")]
    DialogueUnavailable,

    /// The bound dialogue provider failed.
    #[error("Dialogue provider error: {0}")]
    Dialogue(String),

    /// Policy file parsing failed.
    #[error("Config error: {0}")]
    Config(String),
}

impl IfsError {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            IfsError::Validation { .. } | IfsError::InvalidBlend { .. } | IfsError::Config(_) => {
                ErrorKind::Validation
            }
            IfsError::PartNotFound(_) | IfsError::EdgeNotFound { .. } => ErrorKind::NotFound,
            IfsError::IllegalStateTransition { .. } => ErrorKind::IllegalStateTransition,
            IfsError::WrongPartKind { .. }
            | IfsError::PreconditionFailed { .. }
            | IfsError::NoBurdenToRelease(_)
            | IfsError::DialogueUnavailable
            | IfsError::Dialogue(_) => ErrorKind::PreconditionFailed,
            IfsError::PipelineAlreadyComplete(_) => ErrorKind::PipelineAlreadyComplete,
        }
    }

    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        IfsError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn precondition(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        IfsError::PreconditionFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, IfsError>;

/// Check that `value` lies in the closed unit interval.
pub(crate) fn ensure_unit(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(IfsError::validation(
            field,
            format!("{} is outside [0.0, 1.0]", value),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let id = PartId::new();
        assert_eq!(IfsError::PartNotFound(id).kind(), ErrorKind::NotFound);
        assert_eq!(
            IfsError::NoBurdenToRelease(id).kind(),
            ErrorKind::PreconditionFailed
        );
        assert_eq!(
            IfsError::InvalidBlend {
                part_id: id,
                reason: "x".into()
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            IfsError::PipelineAlreadyComplete(id).kind(),
            ErrorKind::PipelineAlreadyComplete
        );
    }

    #[test]
    fn test_ensure_unit() {
        assert!(ensure_unit("x", 0.0).is_ok());
        assert!(ensure_unit("x", 1.0).is_ok());
        assert!(ensure_unit("x", 1.01).is_err());
        assert!(ensure_unit("x", -0.1).is_err());
        assert!(ensure_unit("x", f64::NAN).is_err());
    }

    #[test]
    fn test_display() {
        let err = IfsError::IllegalStateTransition {
            part_id: PartId::new(),
            from: "blocking".into(),
            to: "scanning".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("blocking -> scanning"));
    }
}
