use thiserror::Error;

use crate::resolve::ResolveError;

/// A bound field could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum BindError {
    #[error("field '{field}' belongs to {expected}, but the target object has another type")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
    },

    #[error("cannot write '{value}' into {owner}::{field} ({ty}): {reason}")]
    Coerce {
        owner: &'static str,
        field: &'static str,
        ty: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to resolve value for key '{key}': {source}")]
    Resolve { key: String, source: ResolveError },
}
