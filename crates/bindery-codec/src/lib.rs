// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! bindery-codec: typed objects on one side, generic trees on the other.
//!
//! Typed classes implement [`BindingClass`] and are registered in a
//! [`ClassRegistry`]. A [`BindingCodecContext`] pairs the registry with one
//! [`SchemaIndex`](bindery_model::SchemaIndex) and translates in both
//! directions:
//! - objects to and from [`NormalizedNode`](bindery_model::NormalizedNode)
//!   through per-location [`NodeCodec`]s, built lazily and cached;
//! - [`InstancePath`]s to and from [`DataPath`](bindery_model::DataPath)s;
//! - change candidates into [`DataObjectModification`] views.
//!
//! [`BindingRuntime`] holds the context for the current schema and swaps it
//! out whole when the schema changes.
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

mod binding;
mod cache;
/// Codec configuration.
pub mod config;
mod context;
mod error;
mod identifier;
mod modification;
mod node_codec;
mod registry;
mod runtime;
mod value_codec;

pub use binding::{
    downcast_object, Augmentations, BindingClass, BindingError, ClassKind, Comparable, DataObject,
    Empty, FieldSet, FieldValue, Identifiable, ItemKey, LeafRef, LeafValue, ObjectEq, TypedValue,
};
pub use cache::CodecCache;
pub use config::{CodecConfig, ConfigError};
pub use context::BindingCodecContext;
pub use error::CodecError;
pub use identifier::{InstancePath, PathStep};
pub use modification::{BindingStructuralType, DataObjectModification, ModificationKind};
pub use node_codec::{ChildAddressability, CodecKind, NodeCodec};
pub use registry::{ClassRegistry, ErasedClass, RegistryError};
pub use runtime::BindingRuntime;
pub use value_codec::{KeyCodec, ValueCodec};
