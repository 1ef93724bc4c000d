// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! bindery-query: typed queries over generic trees.
//!
//! A [`QueryFactory`] builds a [`QueryExpression`] from typed steps and leaf
//! accessors. Building resolves every step against the schema and turns
//! each leaf test into a [`QueryPredicate`] on generic values, so running a
//! query only deserializes the objects that match. Predicates have a
//! compact wire form ([`encode_predicates`] / [`decode_predicates`]) for
//! shipping them to a remote executor.
//!
//! ```ignore
//! let query = QueryFactory::new(ctx)
//!     .query_subtree::<Top>(InstancePath::new().child::<Top>())
//!     .extract_child::<System>()
//!     .extract_child::<Alarm>()
//!     .matching()
//!     .leaf(Alarm::CRITICAL)
//!     .non_null()
//!     .build()?;
//! let critical = executor.execute_query(&query)?.values()?;
//! ```
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

mod builder;
mod error;
mod executor;
mod predicate;

pub use builder::{
    DescendantQueryBuilder, MatchBuilderPath, QueryExpression, QueryFactory, ValueMatch,
    ValueMatchBuilder,
};
pub use error::QueryError;
pub use executor::{QueryExecutor, QueryResult, QueryResultItem, TreeQueryExecutor};
pub use predicate::{decode_predicates, encode_predicates, LeafMatch, MatchPattern, QueryPredicate};
