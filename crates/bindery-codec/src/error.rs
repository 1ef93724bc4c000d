// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Codec error taxonomy.
use bindery_model::QName;
use thiserror::Error;

use crate::binding::BindingError;

/// Errors raised while translating between typed and generic representations.
///
/// `Clone` so a single construction failure can be handed to every caller
/// waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    /// A typed class or path is not part of the current schema.
    #[error("[SCHEMA_MISMATCH] {0}")]
    SchemaMismatch(String),
    /// A leaf value violates its range, length or pattern restriction.
    #[error("[CONSTRAINT_VIOLATION] {leaf}: {reason}")]
    ConstraintViolation {
        /// Offending leaf.
        leaf: QName,
        /// Which restriction failed.
        reason: String,
    },
    /// A generic subtree cannot be mapped onto the requested class.
    #[error("[DESERIALIZATION] {0}")]
    Deserialization(String),
    /// Building a node codec failed; not cached, a later lookup retries.
    #[error("[CODEC_CONSTRUCTION_FAILURE] {location}: {reason}")]
    ConstructionFailure {
        /// Schema location the codec was built for.
        location: String,
        /// What went wrong.
        reason: String,
    },
}

impl From<BindingError> for CodecError {
    fn from(err: BindingError) -> Self {
        CodecError::Deserialization(err.to_string())
    }
}
