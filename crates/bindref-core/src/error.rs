//! Error types for looking up and converting object references.

use thiserror::Error;

/// Errors raised when a reference is fetched across the engine boundary.
///
/// The reference type itself never fails; it reports its state through
/// `is_null`/`is_valid`/`is_shared`. These errors come from the table and
/// marshaling layers, where a caller asks for something the state can't give.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    /// The engine handle is reset or refers to a freed slot
    #[error("stale engine handle: slot {index} has been released")]
    StaleHandle { index: u32 },

    /// The stored reference is for a different native type
    #[error("reference type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// The reference holds no instance
    #[error("null reference to {type_name}")]
    NullReference { type_name: &'static str },

    /// A borrowed instance can't be handed out as shared ownership
    #[error("reference to {type_name} does not own its instance and cannot be shared")]
    NotShareable { type_name: &'static str },
}
