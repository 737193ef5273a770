//! Domain error types shared across modules.

use thiserror::Error;

/// A stored or transmitted value did not name a known variant.
///
/// Raised when decoding status and payment-method columns, so a corrupt row
/// surfaces as an error instead of being coerced into a default.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}
