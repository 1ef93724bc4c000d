// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]
use bindery_codec::{BindingClass, CodecError, InstancePath, ItemKey, PathStep};
use bindery_dry_tests::alarms::{self, Alarm, AlarmKey, System, SystemAugment, SystemKey, Top};
use bindery_dry_tests::settings::{self, LogLine, Settings};
use bindery_dry_tests::shapes::{self, Dimensions, LegacyBox, ModernBox, Shapes};
use bindery_model::{DataPath, NodeIdentifierWithPredicates, PathArgument, QName, Value};

fn id(q: QName) -> PathArgument {
    PathArgument::NodeId(q)
}

fn system_entry(name: &str) -> PathArgument {
    PathArgument::NodeWithPredicates(NodeIdentifierWithPredicates::single(
        alarms::q("system"),
        alarms::q("name"),
        name,
    ))
}

fn alarm_entry(alarm: u64) -> PathArgument {
    PathArgument::NodeWithPredicates(NodeIdentifierWithPredicates::single(
        alarms::q("alarms"),
        alarms::q("id"),
        alarm,
    ))
}

fn alarm_path(system: &str, alarm: u64) -> InstancePath {
    InstancePath::new()
        .child::<Top>()
        .keyed::<System>(SystemKey {
            name: system.to_owned(),
        })
        .keyed::<Alarm>(AlarmKey { id: alarm })
}

#[test]
fn keyed_path_round_trips() {
    let ctx = bindery_dry_tests::context().unwrap();
    let typed = alarm_path("first", 2);
    let generic = ctx.to_generic(&typed).unwrap();
    let expected: DataPath = vec![
        id(alarms::q("top")),
        id(alarms::q("system")),
        system_entry("first"),
        id(alarms::q("alarms")),
        alarm_entry(2),
    ]
    .into();
    assert_eq!(generic, expected);
    assert_eq!(ctx.from_generic(&generic).unwrap(), Some(typed));
}

#[test]
fn entry_without_list_node_still_resolves() {
    let ctx = bindery_dry_tests::context().unwrap();
    let generic: DataPath = vec![id(alarms::q("top")), system_entry("first")].into();
    let typed = ctx.from_generic(&generic).unwrap().unwrap();
    assert_eq!(
        typed,
        InstancePath::new().child::<Top>().keyed::<System>(SystemKey {
            name: "first".to_owned()
        })
    );
}

#[test]
fn augmentation_steps_use_augmentation_identifiers() {
    let ctx = bindery_dry_tests::context().unwrap();
    let system = InstancePath::new().child::<Top>().keyed::<System>(SystemKey {
        name: "a".to_owned(),
    });
    let typed = system.clone().child::<SystemAugment>();
    let generic = ctx.to_generic(&typed).unwrap();
    assert_eq!(
        generic.last(),
        Some(&PathArgument::augmentation([
            alarms::owner_q("owner"),
            alarms::owner_q("contact"),
        ]))
    );
    assert_eq!(ctx.from_generic(&generic).unwrap(), Some(typed));

    let mut aliased = system;
    aliased.push(PathStep::new(alarms::SYSTEM_AUGMENT_ALIAS));
    assert_eq!(ctx.to_generic(&aliased).unwrap(), generic);
}

#[test]
fn ambiguous_step_takes_the_lowest_case() {
    let ctx = bindery_dry_tests::context().unwrap();
    let bare = InstancePath::new().child::<Shapes>().child::<Dimensions>();
    let legacy = InstancePath::new()
        .child::<Shapes>()
        .case_child::<LegacyBox, Dimensions>();
    let modern = InstancePath::new()
        .child::<Shapes>()
        .case_child::<ModernBox, Dimensions>();

    let generic = ctx.to_generic(&bare).unwrap();
    assert_eq!(
        generic,
        DataPath::from(vec![
            id(shapes::q("shapes")),
            id(shapes::q("kind")),
            id(shapes::q("dimensions")),
        ])
    );
    assert_eq!(ctx.to_generic(&legacy).unwrap(), generic);
    assert_eq!(ctx.from_generic(&generic).unwrap(), Some(legacy));

    let modern_generic = ctx.to_generic(&modern).unwrap();
    assert_eq!(modern_generic.last(), Some(&id(shapes::aug_q("dimensions"))));
    assert_eq!(ctx.from_generic(&modern_generic).unwrap(), Some(modern));
}

#[test]
fn paths_without_a_typed_form_yield_none() {
    let ctx = bindery_dry_tests::context().unwrap();
    let alarm: Vec<PathArgument> = ctx.to_generic(&alarm_path("first", 0)).unwrap().args().to_vec();

    let cases: Vec<DataPath> = vec![
        DataPath::root(),
        // leaf
        alarm.iter().cloned().chain([id(alarms::q("critical"))]).collect(),
        // leaf-set entry
        alarm
            .iter()
            .cloned()
            .chain([
                id(alarms::q("tags")),
                PathArgument::NodeWithValue(alarms::q("tags"), Value::from("x")),
            ])
            .collect(),
        // whole keyed list
        vec![id(alarms::q("top")), id(alarms::q("system"))].into(),
        // bare choice
        vec![id(shapes::q("shapes")), id(shapes::q("kind"))].into(),
        // unkeyed list
        vec![id(settings::q("settings")), id(settings::q("log"))].into(),
        // anydata
        vec![id(settings::q("settings")), id(settings::q("extra"))].into(),
    ];
    for path in cases {
        assert_eq!(ctx.from_generic(&path).unwrap(), None, "{path}");
    }
}

#[test]
fn unknown_or_non_data_children_are_errors() {
    let ctx = bindery_dry_tests::context().unwrap();
    for path in [
        DataPath::from(vec![id(alarms::q("top")), id(alarms::q("bogus"))]),
        DataPath::from(vec![id(settings::q("settings")), id(settings::q("reset"))]),
        DataPath::from(vec![id(QName::new("urn:nowhere", "top"))]),
    ] {
        assert!(
            matches!(ctx.from_generic(&path), Err(CodecError::SchemaMismatch(_))),
            "{path}"
        );
    }
}

#[test]
fn malformed_typed_paths_are_rejected() {
    let ctx = bindery_dry_tests::context().unwrap();

    let wildcard_then_more = InstancePath::new()
        .child::<Top>()
        .child::<System>()
        .keyed::<Alarm>(AlarmKey { id: 1 });
    assert!(ctx.to_generic(&wildcard_then_more).is_err());

    let mut keyed_unkeyed = InstancePath::new().child::<Settings>();
    keyed_unkeyed.push(PathStep::of::<LogLine>().with_key(ItemKey::new().with("message", "x".to_owned())));
    assert!(ctx.to_generic(&keyed_unkeyed).is_err());

    let mut keyed_container = InstancePath::new();
    keyed_container.push(PathStep::of::<Top>().with_key(ItemKey::new().with("id", 1u64)));
    assert!(ctx.to_generic(&keyed_container).is_err());

    let misplaced = InstancePath::new().child::<Settings>().child::<Dimensions>();
    assert!(matches!(
        ctx.to_generic(&misplaced),
        Err(CodecError::SchemaMismatch(_))
    ));
}

#[test]
fn wildcard_may_end_a_path() {
    let ctx = bindery_dry_tests::context().unwrap();
    let wildcard = InstancePath::new().child::<Top>().child::<System>();
    assert_eq!(
        ctx.to_generic(&wildcard).unwrap(),
        DataPath::from(vec![id(alarms::q("top")), id(alarms::q("system"))])
    );
}

#[test]
fn serialize_at_completes_wildcards_and_checks_keys() {
    let ctx = bindery_dry_tests::context().unwrap();
    let system = System::new("x");

    let wildcard = InstancePath::new().child::<Top>().child::<System>();
    let (generic, node) = ctx.serialize_at(&wildcard, &system).unwrap();
    assert_eq!(generic.last(), Some(&system_entry("x")));
    assert_eq!(node.identifier(), system_entry("x"));

    let keyed = InstancePath::new().child::<Top>().keyed::<System>(SystemKey {
        name: "x".to_owned(),
    });
    let (same, _) = ctx.serialize_at(&keyed, &system).unwrap();
    assert_eq!(same, generic);

    let other = InstancePath::new().child::<Top>().keyed::<System>(SystemKey {
        name: "y".to_owned(),
    });
    assert!(matches!(
        ctx.serialize_at(&other, &system),
        Err(CodecError::SchemaMismatch(_))
    ));
    assert!(ctx.serialize_at(&InstancePath::new(), &system).is_err());
    assert!(ctx
        .serialize_at(&InstancePath::new().child::<Top>(), &system)
        .is_err());
}

#[test]
fn from_normalized_pairs_path_and_object() {
    let ctx = bindery_dry_tests::context().unwrap();
    let alarm = Alarm::new(4, true);
    let (generic, node) = ctx.serialize_at(&alarm_path("first", 4), &alarm).unwrap();
    let (typed, obj) = ctx.from_normalized(&generic, &node).unwrap().unwrap();
    assert_eq!(typed, alarm_path("first", 4));
    assert_eq!(obj.implemented_class(), Alarm::CLASS);
    assert_eq!(obj.downcast_ref::<Alarm>(), Some(&alarm));
}
