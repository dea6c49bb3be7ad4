//! Unified error type for manual execution and compilation.
//!
//! Every fatal condition in either pass maps to one [`ManualError`] variant.
//! There is no retry or partial-result policy at this layer: a fatal error
//! aborts the whole execute/compile call and the owning pipeline decides
//! whether to drop the manual or the larger job.

use thiserror::Error;

/// Errors raised while decoding, executing, or compiling a manual.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ManualError {
    /// A variable name was read or written without being bound first.
    #[error("cannot access variable '{0}': it does not exist")]
    VarNotExists(String),

    /// Assignment or join between structurally incompatible types.
    #[error("cannot use type {found} as type {expected}: types are incompatible")]
    IncompatibleTypes { expected: String, found: String },

    /// A tag was looked up in a register that has no entry for it.
    ///
    /// Signals a payload authored against a newer or different registry set.
    #[error("'{key}' is not registered in register '{register}'")]
    NotRegistered { key: String, register: String },

    /// The authoring JSON did not have the expected shape.
    #[error("invalid manual payload: {0}")]
    InvalidPayload(String),

    /// Integer division or remainder by zero during execution or folding.
    #[error("integer division by zero")]
    DivisionByZero,

    /// A value of the wrong shape reached an operator or accessor.
    #[error("expected a {expected} value, found {found}")]
    WrongValueKind { expected: &'static str, found: String },
}

impl ManualError {
    /// Build an [`ManualError::InvalidPayload`] from any message.
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        ManualError::InvalidPayload(message.into())
    }

    /// Build a [`ManualError::WrongValueKind`] for a value rendered with `Debug`.
    pub fn wrong_kind(expected: &'static str, found: impl std::fmt::Debug) -> Self {
        ManualError::WrongValueKind {
            expected,
            found: format!("{found:?}"),
        }
    }
}

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, ManualError>;
