// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared fixtures for Bindery tests.
//!
//! Three small schema modules with hand-written typed classes ([`alarms`],
//! [`shapes`], [`settings`]) and a counting change candidate. [`context`]
//! wires all three modules into one codec context.
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

use std::sync::Arc;

use bindery_codec::{BindingCodecContext, ClassRegistry, CodecConfig, RegistryError};
use bindery_model::{SchemaBuilder, SchemaError, SchemaIndex};
use thiserror::Error;

pub mod alarms;
mod candidate;
pub mod settings;
pub mod shapes;

pub use candidate::CountingCandidate;

/// Failure assembling a fixture.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// The fixture schema is invalid.
    #[error("[FIXTURE_SCHEMA] {0}")]
    Schema(#[from] SchemaError),
    /// A fixture class could not be registered.
    #[error("[FIXTURE_REGISTRY] {0}")]
    Registry(#[from] RegistryError),
}

/// Schema holding the alarms, shapes and settings modules.
pub fn schema() -> Result<SchemaIndex, FixtureError> {
    let mut b = SchemaBuilder::new();
    alarms::declare(&mut b);
    shapes::declare(&mut b);
    settings::declare(&mut b);
    Ok(b.build()?)
}

/// Registry holding every fixture class.
pub fn registry() -> Result<ClassRegistry, FixtureError> {
    let mut r = ClassRegistry::new();
    alarms::register(&mut r)?;
    shapes::register(&mut r)?;
    settings::register(&mut r)?;
    Ok(r)
}

/// Codec context over [`schema`] and [`registry`] with default config.
pub fn context() -> Result<Arc<BindingCodecContext>, FixtureError> {
    context_with(CodecConfig::default())
}

/// Codec context over [`schema`] and [`registry`].
pub fn context_with(config: CodecConfig) -> Result<Arc<BindingCodecContext>, FixtureError> {
    Ok(Arc::new(BindingCodecContext::with_config(
        Arc::new(schema()?),
        Arc::new(registry()?),
        config,
    )))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use bindery_codec::BindingClass;

    #[test]
    fn fixture_schema_builds() {
        let schema = schema().unwrap();
        let top = schema.data_child(schema.root(), &alarms::q("top")).unwrap();
        assert_eq!(schema.canonical_class(top), Some(alarms::Top::CLASS));
        assert_eq!(schema.locations(shapes::Dimensions::CLASS).len(), 2);
    }

    #[test]
    fn every_bound_class_is_registered() {
        let registry = registry().unwrap();
        for class in [
            alarms::Top::CLASS,
            alarms::SystemAugment::CLASS,
            shapes::ModernBox::CLASS,
            settings::ResetOutput::CLASS,
        ] {
            assert!(registry.contains(class), "{class} missing");
        }
    }
}
