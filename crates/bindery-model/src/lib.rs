// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! bindery-model: the schema-agnostic half of Bindery.
//!
//! Everything in this crate is independent of any typed class set. It defines
//! how data looks once it has left the typed world: qualified names, scalar
//! values, generic trees addressed by [`DataPath`], the read-only
//! [`SchemaIndex`] that describes which trees are valid, and the before/after
//! [`CandidateNode`] trees a data store hands out on change.
//!
//! The [`wire`] module carries the compact little-endian encoding used to ship
//! values and generic paths between processes.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::redundant_pub_crate,
    clippy::many_single_char_names,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod candidate;
mod ident;
mod node;
mod path;
/// Schema index, builder and leaf type definitions.
pub mod schema;
mod value;
/// Compact binary encoding for values and generic paths.
pub mod wire;

pub use candidate::{CandidateNode, ModificationType, TreeCandidate};
pub use ident::{ClassId, QName, QNameModule};
pub use node::{
    AnydataNode, DataContainerNode, LeafNode, LeafSetNode, MapNode, NormalizedNode, OpaqueBody,
    OpaquePayload, UnkeyedListNode,
};
pub use path::{DataPath, NodeIdentifierWithPredicates, PathArgument};
pub use schema::{
    IntegerKind, Pattern, SchemaBuilder, SchemaDigest, SchemaError, SchemaIndex, SchemaKind,
    SchemaNode, SchemaNodeId, TypeDefinition,
};
pub use value::Value;
