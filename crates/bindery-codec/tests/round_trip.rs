// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]
use std::sync::Arc;

use bindery_codec::{Augmentations, BindingClass, CodecError, DataObject, TypedValue};
use bindery_dry_tests::alarms::{self, Alarm, LegacySystemAugment, Severity, System, SystemAugment, Top};
use bindery_dry_tests::settings::{self, Entry, LogLine, ResetInput, Settings};
use bindery_dry_tests::shapes::{self, BoxFinish, Circle, Dimensions, ModernBox, ShapeKind, Shapes};
use bindery_model::{
    ClassId, DataContainerNode, NormalizedNode, OpaquePayload, PathArgument, Value,
};
use bytes::Bytes;
use proptest::prelude::*;

type AlarmFields = (bool, Option<String>, Option<Severity>, Vec<String>);

fn alarm_strategy() -> impl Strategy<Value = AlarmFields> {
    (
        any::<bool>(),
        prop::option::of("[a-z ]{0,64}"),
        prop::option::of(prop_oneof![
            Just(Severity::Minor),
            Just(Severity::Major),
            Just(Severity::Critical)
        ]),
        prop::collection::btree_set("[a-z]{1,6}", 0..4),
    )
        .prop_map(|(critical, description, severity, tags)| {
            (critical, description, severity, tags.into_iter().collect())
        })
}

fn top_strategy() -> impl Strategy<Value = Top> {
    prop::collection::btree_map(
        "[a-z]{1,8}",
        prop::collection::btree_map(any::<u64>(), alarm_strategy(), 0..5),
        0..4,
    )
    .prop_map(|systems| Top {
        system: systems
            .into_iter()
            .map(|(name, alarms)| {
                System::new(&name).with_alarms(alarms.into_iter().map(
                    |(id, (critical, description, severity, tags))| Alarm {
                        id,
                        critical,
                        description,
                        severity,
                        tags,
                    },
                ))
            })
            .collect(),
    })
}

proptest! {
    #[test]
    fn alarm_trees_survive_a_round_trip(top in top_strategy()) {
        let ctx = bindery_dry_tests::context().unwrap();
        let node = ctx.serialize(&top).unwrap();
        let back: Top = ctx.deserialize_as(&node).unwrap();
        prop_assert_eq!(back, top);
    }
}

#[test]
fn top_serializes_to_a_keyed_map() {
    let ctx = bindery_dry_tests::context().unwrap();
    let node = ctx.serialize(&alarms::query_dataset()).unwrap();
    let NormalizedNode::Container(body) = &node else {
        unreachable!("top is a container");
    };
    let Some(NormalizedNode::Map(systems)) = body.child_named(&alarms::q("system")) else {
        unreachable!("system is a keyed list");
    };
    assert_eq!(systems.len(), 2);
    let names: Vec<_> = systems
        .entries()
        .map(|(key, _)| key.key(&alarms::q("name")).cloned())
        .collect();
    assert_eq!(
        names,
        vec![Some(Value::from("first")), Some(Value::from("second"))]
    );
}

#[test]
fn augmentation_alias_serializes_like_the_canonical_class() {
    let ctx = bindery_dry_tests::context().unwrap();
    let mut canonical = System::new("a");
    canonical.augmentations = Augmentations::new().with(SystemAugment {
        owner: Some("ops".to_owned()),
        contact: None,
    });
    let mut aliased = System::new("a");
    aliased.augmentations.insert(Arc::new(LegacySystemAugment {
        owner: Some("ops".to_owned()),
        contact: None,
    }));

    let expected = ctx.serialize(&canonical).unwrap();
    assert_eq!(ctx.serialize(&aliased).unwrap(), expected);

    let back: System = ctx.deserialize_as(&expected).unwrap();
    assert_eq!(back.augmentations.get::<SystemAugment>(), canonical.augmentations.get::<SystemAugment>());
}

#[test]
fn alias_and_canonical_class_share_one_codec() {
    let ctx = bindery_dry_tests::context().unwrap();
    let canonical = ctx.codec(SystemAugment::CLASS).unwrap();
    let alias = ctx.codec(alarms::SYSTEM_AUGMENT_ALIAS).unwrap();
    assert!(Arc::ptr_eq(&canonical, &alias));
    assert_eq!(canonical.class(), SystemAugment::CLASS);
    assert_eq!(
        ctx.schema().canonical_class(canonical.location()),
        Some(SystemAugment::CLASS)
    );
}

#[test]
fn choice_cases_round_trip() {
    let ctx = bindery_dry_tests::context().unwrap();
    let dims = Dimensions { width: 3, height: 4 };
    for kind in [
        ShapeKind::Circle(Circle { radius: 7 }),
        ShapeKind::LegacyBox(shapes::LegacyBox::new(dims)),
        ShapeKind::ModernBox(ModernBox::new(dims)),
    ] {
        let value = Shapes { kind: Some(kind) };
        let node = ctx.serialize(&value).unwrap();
        let choice = node
            .child(&PathArgument::NodeId(shapes::q("kind")))
            .unwrap();
        assert!(matches!(choice, NormalizedNode::Choice(_)));
        assert_eq!(ctx.deserialize_as::<Shapes>(&node).unwrap(), value);
    }
}

#[test]
fn case_holding_only_an_augmentation_round_trips() {
    let ctx = bindery_dry_tests::context().unwrap();
    let finished = shapes::LegacyBox {
        dimensions: None,
        augmentations: Augmentations::new().with(BoxFinish {
            finish: Some("matte".to_owned()),
        }),
    };
    let value = Shapes {
        kind: Some(ShapeKind::LegacyBox(finished)),
    };
    let node = ctx.serialize(&value).unwrap();
    let Some(NormalizedNode::Choice(body)) = node.child(&PathArgument::NodeId(shapes::q("kind"))) else {
        panic!("kind should serialize as a choice");
    };
    assert_eq!(body.children().len(), 1);
    assert!(body.children().keys().all(|arg| arg.node_type().is_none()));
    assert_eq!(ctx.deserialize_as::<Shapes>(&node).unwrap(), value);
}

#[test]
fn restrictions_are_enforced_on_write() {
    let ctx = bindery_dry_tests::context().unwrap();
    let err = ctx
        .serialize(&Shapes {
            kind: Some(ShapeKind::Circle(Circle { radius: 0 })),
        })
        .unwrap_err();
    assert!(matches!(err, CodecError::ConstraintViolation { ref leaf, .. } if leaf == &shapes::q("radius")));

    let long = Alarm {
        description: Some("x".repeat(65)),
        ..Alarm::new(1, false)
    };
    let err = ctx
        .serialize(&Top {
            system: vec![System::new("a").with_alarms([long])],
        })
        .unwrap_err();
    assert!(matches!(err, CodecError::ConstraintViolation { .. }));
}

#[test]
fn union_picks_the_first_accepting_member() {
    let ctx = bindery_dry_tests::context().unwrap();

    let number = Settings {
        threshold: Some(TypedValue::Uint8(50)),
        ..Settings::default()
    };
    let node = ctx.serialize(&number).unwrap();
    let leaf = node.child(&PathArgument::NodeId(settings::q("threshold"))).unwrap();
    assert_eq!(leaf.value(), Some(&Value::Uint8(50)));
    let back: Settings = ctx.deserialize_as(&node).unwrap();
    assert_eq!(
        back.threshold,
        Some(TypedValue::Union {
            member: 0,
            value: Box::new(TypedValue::Uint8(50)),
        })
    );

    let text = Settings {
        threshold: Some(TypedValue::String("high".to_owned())),
        ..Settings::default()
    };
    let node = ctx.serialize(&text).unwrap();
    let back: Settings = ctx.deserialize_as(&node).unwrap();
    assert_eq!(
        back.threshold,
        Some(TypedValue::Union {
            member: 1,
            value: Box::new(TypedValue::String("high".to_owned())),
        })
    );

    let out_of_range = Settings {
        threshold: Some(TypedValue::Uint8(150)),
        ..Settings::default()
    };
    assert!(ctx.serialize(&out_of_range).is_err());
}

#[test]
fn leafref_uses_the_referenced_leaf_type() {
    let ctx = bindery_dry_tests::context().unwrap();
    let ok = Settings {
        level: Some(-20),
        target_level: Some(40),
        ..Settings::default()
    };
    let node = ctx.serialize(&ok).unwrap();
    let leaf = node.child(&PathArgument::NodeId(settings::q("target-level"))).unwrap();
    assert_eq!(leaf.value(), Some(&Value::Int16(40)));
    assert_eq!(ctx.deserialize_as::<Settings>(&node).unwrap(), ok);

    let err = ctx
        .serialize(&Settings {
            target_level: Some(200),
            ..Settings::default()
        })
        .unwrap_err();
    assert!(matches!(err, CodecError::ConstraintViolation { ref leaf, .. } if leaf == &settings::q("target-level")));
}

#[test]
fn identityref_checks_derivation() {
    let ctx = bindery_dry_tests::context().unwrap();
    let fast = Settings {
        mode: Some(settings::FAST),
        ..Settings::default()
    };
    let node = ctx.serialize(&fast).unwrap();
    let leaf = node.child(&PathArgument::NodeId(settings::q("mode"))).unwrap();
    assert_eq!(leaf.value(), Some(&Value::QName(settings::q("fast"))));
    assert_eq!(ctx.deserialize_as::<Settings>(&node).unwrap(), fast);

    let unknown = Settings {
        mode: Some(ClassId("settings.Unknown")),
        ..Settings::default()
    };
    assert!(matches!(
        ctx.serialize(&unknown),
        Err(CodecError::SchemaMismatch(_))
    ));
}

#[test]
fn binary_keys_lists_and_anydata_round_trip() {
    let ctx = bindery_dry_tests::context().unwrap();
    let value = Settings {
        blob: Some(Bytes::from_static(b"\x00\x01")),
        extra: Some(OpaquePayload::raw("xml", Bytes::from_static(b"<a/>"))),
        entries: vec![
            Entry {
                note: Some("first".to_owned()),
                ..Entry::new(Bytes::from_static(&[0x00, 0xff]))
            },
            Entry::new(Bytes::from_static(&[0x10])),
        ],
        log: vec![
            LogLine { message: "b".to_owned() },
            LogLine { message: "a".to_owned() },
        ],
        ..Settings::default()
    };
    let node = ctx.serialize(&value).unwrap();
    assert!(matches!(
        node.child(&PathArgument::NodeId(settings::q("extra"))),
        Some(NormalizedNode::Anydata(_))
    ));
    assert!(matches!(
        node.child(&PathArgument::NodeId(settings::q("log"))),
        Some(NormalizedNode::UnkeyedList(_))
    ));
    assert_eq!(ctx.deserialize_as::<Settings>(&node).unwrap(), value);
}

#[test]
fn action_input_serializes_as_a_container() {
    let ctx = bindery_dry_tests::context().unwrap();
    let input = ResetInput { delay: Some(5) };
    let node = ctx.serialize(&input).unwrap();
    assert!(matches!(node, NormalizedNode::Container(_)));
    assert_eq!(ctx.deserialize_as::<ResetInput>(&node).unwrap(), input);
}

#[test]
fn unknown_children_fail_deserialization() {
    let ctx = bindery_dry_tests::context().unwrap();
    let node = NormalizedNode::Container(
        DataContainerNode::new(alarms::q("top"))
            .with_child(NormalizedNode::leaf(alarms::q("bogus"), 1u32)),
    );
    assert!(matches!(
        ctx.deserialize(&node, Top::CLASS),
        Err(CodecError::Deserialization(_))
    ));
}

#[test]
fn unbound_classes_are_schema_mismatches() {
    let ctx = bindery_dry_tests::context().unwrap();
    assert!(matches!(
        ctx.codec(ClassId("nowhere.Thing")),
        Err(CodecError::SchemaMismatch(_))
    ));
    let obj: &dyn DataObject = &LegacySystemAugment::default();
    assert!(ctx.serialize(obj).is_ok());
}
