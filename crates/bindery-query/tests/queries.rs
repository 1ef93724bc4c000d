// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]
use std::sync::Arc;

use bindery_codec::{Augmentations, BindingCodecContext, CodecConfig, CodecError, InstancePath};
use bindery_dry_tests::alarms::{self, Alarm, AlarmKey, System, SystemAugment, SystemKey, Top};
use bindery_dry_tests::settings::{LogLine, Settings};
use bindery_dry_tests::shapes::{Dimensions, LegacyBox, ModernBox, ShapeKind, Shapes};
use bindery_model::{
    DataContainerNode, MapNode, NodeIdentifierWithPredicates, NormalizedNode, SchemaBuilder, Value,
};
use bindery_query::{
    decode_predicates, DescendantQueryBuilder, QueryError, QueryExecutor, QueryExpression,
    QueryFactory, TreeQueryExecutor,
};

fn setup(data: &Top) -> (QueryFactory, TreeQueryExecutor) {
    let ctx = bindery_dry_tests::context().unwrap();
    let mut executor = TreeQueryExecutor::new(Arc::clone(&ctx));
    executor.add(data).unwrap();
    (QueryFactory::new(ctx), executor)
}

fn all_alarms(factory: &QueryFactory) -> DescendantQueryBuilder<Alarm> {
    factory
        .query_subtree::<Top>(InstancePath::new().child::<Top>())
        .extract_child::<System>()
        .extract_child::<Alarm>()
}

fn alarm_path(system: &str, id: u64) -> InstancePath {
    InstancePath::new()
        .child::<Top>()
        .keyed::<System>(SystemKey {
            name: system.to_owned(),
        })
        .keyed::<Alarm>(AlarmKey { id })
}

#[test]
fn presence_tests_split_the_dataset() {
    let (factory, executor) = setup(&alarms::query_dataset());

    let critical = all_alarms(&factory).matching().leaf(Alarm::CRITICAL).non_null().build().unwrap();
    let result = executor.execute_query(&critical).unwrap();
    let paths: Vec<InstancePath> = result.items().unwrap().into_iter().map(|i| i.path().clone()).collect();
    assert_eq!(
        paths,
        vec![alarm_path("first", 0), alarm_path("first", 2), alarm_path("second", 0)]
    );

    let calm = all_alarms(&factory).matching().leaf(Alarm::CRITICAL).is_null().build().unwrap();
    assert_eq!(
        executor.execute_query(&calm).unwrap().values().unwrap(),
        vec![Alarm::new(1, false)]
    );
}

#[test]
fn comparisons_follow_the_leaf_type() {
    let (factory, executor) = setup(&alarms::query_dataset());
    let count = |query: QueryExpression<Alarm>| executor.execute_query(&query).unwrap().items().unwrap().len();

    assert_eq!(count(all_alarms(&factory).matching().leaf(Alarm::ID).value_equals(0).build().unwrap()), 2);
    assert_eq!(count(all_alarms(&factory).matching().leaf(Alarm::ID).greater_than(1).build().unwrap()), 1);
    assert_eq!(
        count(all_alarms(&factory).matching().leaf(Alarm::ID).less_than_or_equal(1).build().unwrap()),
        3
    );
    assert_eq!(
        count(all_alarms(&factory).matching().leaf(Alarm::ID).greater_than_or_equal(1).build().unwrap()),
        2
    );
    assert_eq!(count(all_alarms(&factory).matching().leaf(Alarm::ID).less_than(0).build().unwrap()), 0);
}

#[test]
fn unsigned_leaves_compare_as_unsigned() {
    let data = Top {
        system: vec![System::new("big").with_alarms([Alarm::new(u64::MAX, false), Alarm::new(1, false)])],
    };
    let (factory, executor) = setup(&data);
    let query = all_alarms(&factory).matching().leaf(Alarm::ID).greater_than(1).build().unwrap();
    let ids: Vec<u64> = executor
        .execute_query(&query)
        .unwrap()
        .values()
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(ids, vec![u64::MAX]);
}

#[test]
fn keyed_extraction_intersects_with_predicates() {
    let (factory, executor) = setup(&alarms::query_dataset());
    let first = || {
        factory
            .query_subtree::<Top>(InstancePath::new().child::<Top>())
            .extract_child_keyed::<System>(SystemKey {
                name: "first".to_owned(),
            })
            .extract_child::<Alarm>()
    };

    let low = first().matching().leaf(Alarm::ID).less_than_or_equal(1).build().unwrap();
    assert_eq!(executor.execute_query(&low).unwrap().items().unwrap().len(), 2);

    let low_critical = first()
        .matching()
        .leaf(Alarm::ID)
        .less_than_or_equal(1)
        .and()
        .leaf(Alarm::CRITICAL)
        .non_null()
        .build()
        .unwrap();
    let items = executor.execute_query(&low_critical).unwrap().items().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].path(), &alarm_path("first", 0));
    assert_eq!(items[0].value(), &Alarm::new(0, true));

    let missing = factory
        .query_subtree::<Top>(InstancePath::new().child::<Top>())
        .extract_child_keyed::<System>(SystemKey {
            name: "nope".to_owned(),
        })
        .extract_child::<Alarm>()
        .build()
        .unwrap();
    assert!(executor.execute_query(&missing).unwrap().items().unwrap().is_empty());
}

#[test]
fn results_are_restartable() {
    let (factory, executor) = setup(&alarms::query_dataset());
    let query = all_alarms(&factory).build().unwrap();
    let result = executor.execute_query(&query).unwrap();
    let once: Vec<_> = result.iter().collect();
    let twice: Vec<_> = result.iter().collect();
    assert_eq!(once.len(), 4);
    assert_eq!(once, twice);
}

#[test]
fn predicates_reach_into_augmentations() {
    let owned = |name: &str, owner: Option<&str>| {
        let mut system = System::new(name);
        if let Some(owner) = owner {
            system.augmentations = Augmentations::new().with(SystemAugment {
                owner: Some(owner.to_owned()),
                contact: None,
            });
        }
        system
    };
    let data = Top {
        system: vec![owned("a", Some("ops")), owned("b", Some("dev")), owned("c", None)],
    };
    let (factory, executor) = setup(&data);
    let systems = || {
        factory
            .query_subtree::<Top>(InstancePath::new().child::<Top>())
            .extract_child::<System>()
            .matching()
            .child_object::<SystemAugment>()
            .leaf(SystemAugment::OWNER)
    };
    let names = |query: QueryExpression<System>| -> Vec<String> {
        executor
            .execute_query(&query)
            .unwrap()
            .values()
        .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect()
    };

    assert_eq!(names(systems().value_equals("ops".to_owned()).build().unwrap()), vec!["a"]);
    assert_eq!(names(systems().starts_with("d").build().unwrap()), vec!["b"]);
    assert_eq!(names(systems().matches_pattern("[a-z]{3}").build().unwrap()), vec!["a", "b"]);
    assert_eq!(names(systems().is_null().build().unwrap()), vec!["c"]);
}

#[test]
fn unkeyed_lists_expand_to_every_entry() {
    let ctx = bindery_dry_tests::context().unwrap();
    let mut executor = TreeQueryExecutor::new(Arc::clone(&ctx));
    executor
        .add(&Settings {
            level: Some(-5),
            log: vec![
                LogLine { message: "boot".to_owned() },
                LogLine { message: "halt".to_owned() },
                LogLine { message: "bye".to_owned() },
            ],
            ..Settings::default()
        })
        .unwrap();
    let factory = QueryFactory::new(ctx);
    let settings = || factory.query_subtree::<Settings>(InstancePath::new().child::<Settings>());

    let query = settings()
        .extract_child::<LogLine>()
        .matching()
        .leaf(LogLine::MESSAGE)
        .starts_with("b")
        .build()
        .unwrap();
    let result = executor.execute_query(&query).unwrap();
    let messages: Vec<String> = result.values().unwrap().into_iter().map(|l| l.message).collect();
    assert_eq!(messages, vec!["boot", "bye"]);
    assert!(result
        .items()
        .unwrap()
        .iter()
        .all(|i| i.path() == &InstancePath::new().child::<Settings>().child::<LogLine>()));

    // Signed leaves compare as signed.
    let negative = settings().matching().leaf(Settings::LEVEL).less_than(0).build().unwrap();
    assert_eq!(executor.execute_query(&negative).unwrap().items().unwrap().len(), 1);
    let positive = settings().matching().leaf(Settings::LEVEL).greater_than(0).build().unwrap();
    assert!(executor.execute_query(&positive).unwrap().items().unwrap().is_empty());
}

#[test]
fn case_children_are_extracted_through_the_choice() {
    let ctx = bindery_dry_tests::context().unwrap();
    let dims = Dimensions { width: 2, height: 3 };
    let mut executor = TreeQueryExecutor::new(Arc::clone(&ctx));
    executor
        .add(&Shapes {
            kind: Some(ShapeKind::ModernBox(ModernBox::new(dims))),
        })
        .unwrap();
    let factory = QueryFactory::new(ctx);
    let shapes = || factory.query_subtree::<Shapes>(InstancePath::new().child::<Shapes>());

    let modern = shapes().extract_case_child::<ModernBox, Dimensions>().build().unwrap();
    assert_eq!(executor.execute_query(&modern).unwrap().values().unwrap(), vec![dims]);
    let legacy = shapes().extract_case_child::<LegacyBox, Dimensions>().build().unwrap();
    assert!(executor.execute_query(&legacy).unwrap().values().unwrap().is_empty());
}

fn alarm_entry(id: u64, bogus: bool) -> (NodeIdentifierWithPredicates, DataContainerNode) {
    let key = NodeIdentifierWithPredicates::single(alarms::q("alarms"), alarms::q("id"), id);
    let mut body = DataContainerNode::new(key.clone())
        .with_child(NormalizedNode::leaf(alarms::q("id"), id))
        .with_child(NormalizedNode::leaf(alarms::q("critical"), Value::Empty));
    if bogus {
        body.insert(NormalizedNode::leaf(alarms::q("bogus"), 1u32));
    }
    (key, body)
}

fn damaged_top() -> NormalizedNode {
    let mut list = MapNode::new(alarms::q("alarms"), false);
    for (id, bogus) in [(0, false), (1, true), (2, false)] {
        let (key, body) = alarm_entry(id, bogus);
        list = list.with_entry(key, body);
    }
    let system_key = NodeIdentifierWithPredicates::single(alarms::q("system"), alarms::q("name"), "s");
    let system = DataContainerNode::new(system_key.clone())
        .with_child(NormalizedNode::leaf(alarms::q("name"), "s"))
        .with_child(NormalizedNode::Map(list));
    let systems = MapNode::new(alarms::q("system"), false).with_entry(system_key, system);
    NormalizedNode::Container(DataContainerNode::new(alarms::q("top")).with_child(NormalizedNode::Map(systems)))
}

#[test]
fn malformed_candidates_are_skipped_or_fail_fast() {
    let ctx = bindery_dry_tests::context().unwrap();
    let executor = TreeQueryExecutor::new(Arc::clone(&ctx)).with_root(damaged_top());
    let factory = QueryFactory::new(ctx);
    let query = all_alarms(&factory).matching().leaf(Alarm::CRITICAL).non_null().build().unwrap();
    let result = executor.execute_query(&query).unwrap();

    let ids: Vec<u64> = result.values().unwrap().into_iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![0, 2]);

    let strict: Vec<_> = result.try_iter().collect();
    assert_eq!(strict.len(), 2);
    assert!(strict[0].is_ok());
    assert!(matches!(strict[1], Err(CodecError::Deserialization(_))));

    let fail_fast = bindery_dry_tests::context_with(CodecConfig {
        query_fail_fast: true,
        ..CodecConfig::default()
    })
    .unwrap();
    let executor = TreeQueryExecutor::new(fail_fast).with_root(damaged_top());
    let result = executor.execute_query(&query).unwrap();
    assert!(matches!(result.values(), Err(CodecError::Deserialization(_))));
    assert!(matches!(result.items(), Err(CodecError::Deserialization(_))));
    // Plain iteration still skips; only the collecting calls honor fail-fast.
    assert_eq!(result.iter().count(), 2);

    let unfiltered = all_alarms(&factory).build().unwrap();
    let result = executor.execute_query(&unfiltered).unwrap();
    let seen: Vec<_> = result.try_iter().collect();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].as_ref().unwrap().value().id, 0);
    assert!(seen[1].is_err());
    assert!(result.values().is_err());
}

#[test]
fn invalid_chains_fail_the_build() {
    let (factory, _) = setup(&Top::default());
    let top = || factory.query_subtree::<Top>(InstancePath::new().child::<Top>());

    // Alarm is not a child of Top.
    assert!(matches!(top().extract_child::<Alarm>().build(), Err(QueryError::InvalidPath(_))));
    // The root path does not end at the declared class.
    assert!(matches!(
        factory.query_subtree::<System>(InstancePath::new().child::<Top>()).build(),
        Err(QueryError::InvalidPath(_))
    ));
    // Predicates stay on the selected object, not below lists.
    assert!(matches!(
        top()
            .matching()
            .child_object::<System>()
            .leaf(System::NAME)
            .non_null()
            .build(),
        Err(QueryError::InvalidPath(_))
    ));
}

#[test]
fn queries_are_bound_to_their_schema_generation() {
    let (factory, _) = setup(&Top::default());
    let query = all_alarms(&factory).build().unwrap();

    let mut b = SchemaBuilder::new();
    alarms::declare(&mut b);
    let other = Arc::new(BindingCodecContext::new(
        Arc::new(b.build().unwrap()),
        Arc::new(bindery_dry_tests::registry().unwrap()),
    ));
    let executor = TreeQueryExecutor::new(other);
    assert!(matches!(
        executor.execute_query(&query),
        Err(QueryError::Codec(CodecError::SchemaMismatch(_)))
    ));
}

#[test]
fn compiled_predicates_ship_over_the_wire() {
    let (factory, executor) = setup(&alarms::query_dataset());
    let query = all_alarms(&factory)
        .matching()
        .leaf(Alarm::ID)
        .greater_than(0)
        .and()
        .leaf(Alarm::DESCRIPTION)
        .contains("disk")
        .build()
        .unwrap();
    let bytes = query.encode_predicates().unwrap();
    let decoded = decode_predicates(&bytes, executor.context().config()).unwrap();
    assert_eq!(decoded, query.predicates());
    let rendered: Vec<String> = decoded.iter().map(|p| p.matcher().to_string()).collect();
    assert_eq!(rendered, vec!["gt(0)".to_owned(), "contains(disk)".to_owned()]);
}
