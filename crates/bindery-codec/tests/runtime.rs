// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]
use std::sync::{Arc, Barrier};
use std::thread;

use bindery_codec::{BindingClass, BindingRuntime, CodecConfig, CodecError};
use bindery_dry_tests::alarms::{self, Alarm, System, Top};
use bindery_dry_tests::shapes::Shapes;
use bindery_model::SchemaBuilder;

#[test]
fn codecs_are_built_once_per_location() {
    let ctx = bindery_dry_tests::context().unwrap();
    assert_eq!(ctx.codec_constructions(), 0);

    let first = ctx.codec(Alarm::CLASS).unwrap();
    let built = ctx.codec_constructions();
    assert_eq!(built, 1);
    let again = ctx.codec(Alarm::CLASS).unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(ctx.codec_constructions(), built);

    // Child codecs are resolved lazily, on first use.
    ctx.serialize(&alarms::query_dataset()).unwrap();
    let after_serialize = ctx.codec_constructions();
    assert!(after_serialize > built);
    ctx.serialize(&alarms::query_dataset()).unwrap();
    assert_eq!(ctx.codec_constructions(), after_serialize);
}

#[test]
fn concurrent_lookups_share_one_codec() {
    let ctx = bindery_dry_tests::context().unwrap();
    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                ctx.codec(System::CLASS).unwrap()
            })
        })
        .collect();
    let codecs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(codecs.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(ctx.codec_constructions(), 1);
}

#[test]
fn runtime_swaps_contexts_on_update() {
    let config = CodecConfig::from_json_slice(br#"{"max_predicate_depth": 8}"#).unwrap();
    let runtime = BindingRuntime::new(
        Arc::new(bindery_dry_tests::schema().unwrap()),
        Arc::new(bindery_dry_tests::registry().unwrap()),
        config.clone(),
    );
    assert_eq!(runtime.generation(), 0);
    let old = runtime.context();
    old.codec(Shapes::CLASS).unwrap();

    // New schema without the shapes module.
    let mut b = SchemaBuilder::new();
    alarms::declare(&mut b);
    let generation = runtime.update(Arc::new(b.build().unwrap()));
    assert_eq!(generation, 1);
    assert_eq!(runtime.generation(), 1);

    let new = runtime.context();
    assert!(!Arc::ptr_eq(&old, &new));
    assert_ne!(old.schema().digest(), new.schema().digest());
    assert_eq!(new.codec_constructions(), 0);
    assert_eq!(new.config(), &config);
    assert!(matches!(
        new.codec(Shapes::CLASS),
        Err(CodecError::SchemaMismatch(_))
    ));
    new.serialize(&Top::default()).unwrap();

    // Snapshots taken before the update keep working.
    assert!(old.codec(Shapes::CLASS).is_ok());
}

#[test]
fn config_reaches_the_context() {
    let config = CodecConfig {
        query_fail_fast: true,
        ..CodecConfig::default()
    };
    let ctx = bindery_dry_tests::context_with(config.clone()).unwrap();
    assert_eq!(ctx.config(), &config);
}
