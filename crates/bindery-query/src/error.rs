// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Query construction and predicate decoding errors.
use bindery_codec::CodecError;
use bindery_model::wire::WireError;
use thiserror::Error;

/// Errors raised while building a query or decoding its predicates.
///
/// Failures while *running* a query are per-candidate [`CodecError`]s; see
/// [`QueryResult`](crate::QueryResult).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    /// The extraction chain or a predicate path does not fit the schema.
    #[error("[QUERY_INVALID_PATH] {0}")]
    InvalidPath(String),
    /// A predicate names something other than a leaf of its class.
    #[error("[QUERY_NOT_A_LEAF] {class}: `{leaf}` is not a leaf")]
    NotALeaf {
        /// Class the predicate was attached to.
        class: String,
        /// Requested leaf name.
        leaf: String,
    },
    /// A `matches` pattern does not compile.
    #[error("[QUERY_INVALID_PATTERN] {pattern}: {reason}")]
    InvalidPattern {
        /// Pattern source.
        pattern: String,
        /// Compiler message.
        reason: String,
    },
    /// A predicate operand could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Malformed predicate bytes.
    #[error(transparent)]
    Wire(#[from] WireError),
    /// A decoded `not` did not hold exactly one matcher.
    #[error("[QUERY_NOT_ARITY] not expects one matcher, found {0}")]
    NotArity(usize),
    /// Bytes were left over after the last predicate.
    #[error("[QUERY_TRAILING_BYTES] {0} bytes after the last predicate")]
    TrailingBytes(usize),
}
