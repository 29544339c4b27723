//! # Error Handling
//!
//! The error kinds used throughout the environment generation engine.
//!
//! Every fallible operation in this crate returns [`ThatchResult`]. The
//! variants below follow the failure semantics in the specification: most
//! are terminal for the operation that raised them, a few (`PlacementConflict`
//! during snapshot loading) are collected and reported non-fatally by the
//! caller instead.

/// Core error type for the environment generation engine.
#[derive(thiserror::Error, Debug)]
pub enum ThatchError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A generation request violated a §6 constraint (room count out of
    /// range, unsupported generation type, ...).
    #[error("invalid generation config: {0}")]
    InvalidConfig(String),

    /// A cube coordinate failed the `x + y + z = 0` invariant.
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// A shape's boundary or connection points failed validation.
    #[error("shape validation failed: {0}")]
    ShapeValidation(String),

    /// The wall-pattern repair loop could not satisfy navigability and
    /// emergency fallback was disabled.
    #[error("unsatisfiable safety requirements: {0}")]
    UnsatisfiableSafety(String),

    /// Attempted to place a movement-blocking entity where another already
    /// blocks.
    #[error("placement conflict at {0}")]
    PlacementConflict(String),

    /// A room/connection/entity id lookup missed.
    #[error("not found: {0}")]
    NotFound(String),

    /// Cooperative cancellation was observed; no partial output is returned.
    #[error("operation cancelled")]
    Cancelled,

    /// A `RoomBuilder` was built more than once.
    #[error("builder already used")]
    BuilderAlreadyUsed,

    /// A generation stage failed; the stage name is attached for
    /// diagnostics (`room-graph generation`, `spatial placement`,
    /// `connection creation`, ...).
    #[error("generation failed during {stage}: {reason}")]
    GenerationFailed {
        /// The pipeline stage that failed.
        stage: String,
        /// The underlying reason.
        reason: String,
    },
}

impl ThatchError {
    /// Wraps an error with the stage name it failed during, per §7's
    /// propagation policy ("the graph generator wraps any subordinate
    /// failure with the stage name").
    pub fn in_stage(stage: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        ThatchError::GenerationFailed {
            stage: stage.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type used throughout the engine.
pub type ThatchResult<T> = Result<T, ThatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_stage_wraps_reason_and_stage() {
        let err = ThatchError::in_stage("room-graph generation", "room_count too large");
        match err {
            ThatchError::GenerationFailed { stage, reason } => {
                assert_eq!(stage, "room-graph generation");
                assert_eq!(reason, "room_count too large");
            }
            _ => panic!("expected GenerationFailed"),
        }
    }

    #[test]
    fn error_messages_are_human_readable() {
        let err = ThatchError::NotFound("room-7".to_string());
        assert_eq!(err.to_string(), "not found: room-7");
    }
}
