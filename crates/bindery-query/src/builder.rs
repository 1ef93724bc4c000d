// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed query builder.
//!
//! ```text
//! factory.query_subtree::<Top>(path)      DescendantQueryBuilder<Top>
//!     .extract_child::<System>()          DescendantQueryBuilder<System>
//!     .extract_child::<Alarm>()           DescendantQueryBuilder<Alarm>
//!     .matching()                         MatchBuilderPath<Alarm, Alarm>
//!     .leaf(Alarm::ID)                    ValueMatchBuilder<Alarm, u64>
//!     .greater_than(1)                    ValueMatch<Alarm>
//!     .build()                            QueryExpression<Alarm>
//! ```
//!
//! Building is pure: nothing is checked against the schema until
//! [`ValueMatch::build`] (or [`DescendantQueryBuilder::build`]) resolves the
//! whole chain at once.
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use bindery_codec::{
    BindingClass, BindingCodecContext, Comparable, Identifiable, InstancePath, LeafRef, LeafValue,
    PathStep, TypedValue, ValueCodec,
};
use bindery_model::wire::WireError;
use bindery_model::{DataPath, PathArgument, SchemaDigest, SchemaKind, SchemaNodeId};
use tracing::debug;

use crate::error::QueryError;
use crate::predicate::{encode_predicates, LeafMatch, MatchPattern, QueryPredicate};

/// Entry point for typed queries against one codec context.
#[derive(Clone, Debug)]
pub struct QueryFactory {
    ctx: Arc<BindingCodecContext>,
}

impl QueryFactory {
    /// Factory building queries against `ctx`.
    pub fn new(ctx: Arc<BindingCodecContext>) -> Self {
        Self { ctx }
    }

    /// Starts a query rooted at `root`, whose last step is a `T`.
    pub fn query_subtree<T: BindingClass>(&self, root: InstancePath) -> DescendantQueryBuilder<T> {
        DescendantQueryBuilder {
            ctx: Arc::clone(&self.ctx),
            select: root,
            _target: PhantomData,
        }
    }
}

/// Query under construction, currently selecting `T` objects.
pub struct DescendantQueryBuilder<T> {
    ctx: Arc<BindingCodecContext>,
    select: InstancePath,
    _target: PhantomData<fn() -> T>,
}

impl<T: BindingClass> DescendantQueryBuilder<T> {
    /// Narrows the selection to child `C`; for lists, every entry.
    pub fn extract_child<C: BindingClass>(mut self) -> DescendantQueryBuilder<C> {
        self.select.push(PathStep::of::<C>());
        self.retarget()
    }

    /// Narrows the selection to the one entry of list `C` with `key`.
    pub fn extract_child_keyed<C: Identifiable>(mut self, key: C::Key) -> DescendantQueryBuilder<C> {
        self.select.push(PathStep::keyed::<C>(key));
        self.retarget()
    }

    /// Narrows the selection to child `C` inside case `K`.
    pub fn extract_case_child<K: BindingClass, C: BindingClass>(mut self) -> DescendantQueryBuilder<C> {
        self.select.push(PathStep::of::<C>().in_case(K::CLASS));
        self.retarget()
    }

    /// Opens a conjunction of leaf predicates on the selected objects.
    pub fn matching(self) -> MatchBuilderPath<T, T> {
        MatchBuilderPath {
            query: self,
            done: Vec::new(),
            relative: Vec::new(),
            _current: PhantomData,
        }
    }

    /// Query selecting every `T` without further filtering.
    pub fn build(self) -> Result<QueryExpression<T>, QueryError> {
        compile(self, Vec::new())
    }

    fn retarget<C>(self) -> DescendantQueryBuilder<C> {
        DescendantQueryBuilder {
            ctx: self.ctx,
            select: self.select,
            _target: PhantomData,
        }
    }
}

impl<T> fmt::Debug for DescendantQueryBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescendantQueryBuilder")
            .field("select", &self.select)
            .finish_non_exhaustive()
    }
}

/// Predicate path being navigated; currently positioned at a `C` below the
/// selected `T`.
pub struct MatchBuilderPath<T, C> {
    query: DescendantQueryBuilder<T>,
    done: Vec<PendingPredicate>,
    relative: Vec<PathStep>,
    _current: PhantomData<fn() -> C>,
}

impl<T: BindingClass, C: BindingClass> MatchBuilderPath<T, C> {
    /// Descends into child container or augmentation `N`.
    pub fn child_object<N: BindingClass>(mut self) -> MatchBuilderPath<T, N> {
        self.relative.push(PathStep::of::<N>());
        MatchBuilderPath {
            query: self.query,
            done: self.done,
            relative: self.relative,
            _current: PhantomData,
        }
    }

    /// Descends into child `N` inside case `K`.
    pub fn case_child_object<K: BindingClass, N: BindingClass>(mut self) -> MatchBuilderPath<T, N> {
        self.relative.push(PathStep::of::<N>().in_case(K::CLASS));
        MatchBuilderPath {
            query: self.query,
            done: self.done,
            relative: self.relative,
            _current: PhantomData,
        }
    }

    /// Selects the leaf the next test applies to.
    pub fn leaf<V>(self, leaf: LeafRef<C, V>) -> ValueMatchBuilder<T, V> {
        ValueMatchBuilder {
            query: self.query,
            done: self.done,
            relative: self.relative,
            leaf: leaf.name(),
            _value: PhantomData,
        }
    }
}

impl<T, C> fmt::Debug for MatchBuilderPath<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchBuilderPath")
            .field("select", &self.query.select)
            .field("relative", &self.relative)
            .finish_non_exhaustive()
    }
}

/// A leaf has been chosen; pick the test.
pub struct ValueMatchBuilder<T, V> {
    query: DescendantQueryBuilder<T>,
    done: Vec<PendingPredicate>,
    relative: Vec<PathStep>,
    leaf: &'static str,
    _value: PhantomData<fn() -> V>,
}

impl<T, V> ValueMatchBuilder<T, V> {
    /// The leaf is absent.
    pub fn is_null(self) -> ValueMatch<T> {
        self.finish(PendingTest::Absent)
    }

    /// The leaf is present.
    pub fn non_null(self) -> ValueMatch<T> {
        self.finish(PendingTest::Present)
    }

    fn finish(self, test: PendingTest) -> ValueMatch<T> {
        let mut done = self.done;
        done.push(PendingPredicate {
            relative: self.relative,
            leaf: self.leaf,
            test,
        });
        ValueMatch {
            query: self.query,
            done,
        }
    }

    fn compare(self, op: Comparison, operand: TypedValue) -> ValueMatch<T> {
        self.finish(PendingTest::Compare(op, operand))
    }
}

impl<T, V: LeafValue> ValueMatchBuilder<T, V> {
    /// The leaf equals `value`.
    pub fn value_equals(self, value: V) -> ValueMatch<T> {
        self.compare(Comparison::Equal, value.into_typed())
    }
}

impl<T, V: Comparable> ValueMatchBuilder<T, V> {
    /// The leaf is greater than `value`.
    pub fn greater_than(self, value: V) -> ValueMatch<T> {
        self.compare(Comparison::Greater, value.into_typed())
    }

    /// The leaf is greater than or equal to `value`.
    pub fn greater_than_or_equal(self, value: V) -> ValueMatch<T> {
        self.compare(Comparison::GreaterOrEqual, value.into_typed())
    }

    /// The leaf is less than `value`.
    pub fn less_than(self, value: V) -> ValueMatch<T> {
        self.compare(Comparison::Less, value.into_typed())
    }

    /// The leaf is less than or equal to `value`.
    pub fn less_than_or_equal(self, value: V) -> ValueMatch<T> {
        self.compare(Comparison::LessOrEqual, value.into_typed())
    }
}

impl<T> ValueMatchBuilder<T, String> {
    /// The leaf contains `needle`.
    pub fn contains(self, needle: impl Into<String>) -> ValueMatch<T> {
        self.finish(PendingTest::Text(TextTest::Contains, needle.into()))
    }

    /// The leaf starts with `prefix`.
    pub fn starts_with(self, prefix: impl Into<String>) -> ValueMatch<T> {
        self.finish(PendingTest::Text(TextTest::StartsWith, prefix.into()))
    }

    /// The leaf ends with `suffix`.
    pub fn ends_with(self, suffix: impl Into<String>) -> ValueMatch<T> {
        self.finish(PendingTest::Text(TextTest::EndsWith, suffix.into()))
    }

    /// The whole leaf matches regular expression `pattern`.
    pub fn matches_pattern(self, pattern: impl Into<String>) -> ValueMatch<T> {
        self.finish(PendingTest::Pattern(pattern.into()))
    }
}

impl<T, V> fmt::Debug for ValueMatchBuilder<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueMatchBuilder")
            .field("select", &self.query.select)
            .field("leaf", &self.leaf)
            .finish_non_exhaustive()
    }
}

/// At least one complete predicate; chain another or build.
pub struct ValueMatch<T> {
    query: DescendantQueryBuilder<T>,
    done: Vec<PendingPredicate>,
}

impl<T: BindingClass> ValueMatch<T> {
    /// Starts another predicate, back at the selected object.
    pub fn and(self) -> MatchBuilderPath<T, T> {
        MatchBuilderPath {
            query: self.query,
            done: self.done,
            relative: Vec::new(),
            _current: PhantomData,
        }
    }

    /// Resolves the query against the schema.
    pub fn build(self) -> Result<QueryExpression<T>, QueryError> {
        compile(self.query, self.done)
    }
}

impl<T> fmt::Debug for ValueMatch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueMatch")
            .field("select", &self.query.select)
            .field("predicates", &self.done.len())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug)]
enum Comparison {
    Equal,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

#[derive(Clone, Copy, Debug)]
enum TextTest {
    Contains,
    StartsWith,
    EndsWith,
}

#[derive(Debug)]
enum PendingTest {
    Present,
    Absent,
    Compare(Comparison, TypedValue),
    Text(TextTest, String),
    Pattern(String),
}

impl PendingTest {
    fn compile(self, codec: &ValueCodec) -> Result<LeafMatch, QueryError> {
        Ok(match self {
            PendingTest::Present => LeafMatch::Exists,
            PendingTest::Absent => LeafMatch::Exists.negate(),
            PendingTest::Compare(op, operand) => {
                // Operands may sit outside the leaf's range; only the type matters.
                let value = codec.serialize_unchecked(&operand)?;
                match op {
                    Comparison::Equal => LeafMatch::Equal(value),
                    Comparison::Greater => LeafMatch::Greater(value),
                    Comparison::GreaterOrEqual => LeafMatch::GreaterOrEqual(value),
                    Comparison::Less => LeafMatch::Less(value),
                    Comparison::LessOrEqual => LeafMatch::LessOrEqual(value),
                }
            }
            PendingTest::Text(TextTest::Contains, s) => LeafMatch::Contains(s),
            PendingTest::Text(TextTest::StartsWith, s) => LeafMatch::StartsWith(s),
            PendingTest::Text(TextTest::EndsWith, s) => LeafMatch::EndsWith(s),
            PendingTest::Pattern(p) => LeafMatch::Matches(MatchPattern::new(&p)?),
        })
    }
}

#[derive(Debug)]
struct PendingPredicate {
    relative: Vec<PathStep>,
    leaf: &'static str,
    test: PendingTest,
}

/// One step of the extraction chain, resolved to generic arguments.
#[derive(Clone, Debug)]
pub(crate) struct SelectHop {
    pub(crate) step: PathStep,
    pub(crate) location: SchemaNodeId,
    pub(crate) args: Vec<PathArgument>,
    /// A list step without a key: every entry is a candidate.
    pub(crate) expand: bool,
}

/// Immutable, schema-resolved query selecting `T` objects.
pub struct QueryExpression<T> {
    select: InstancePath,
    hops: Vec<SelectHop>,
    target: SchemaNodeId,
    schema: SchemaDigest,
    predicates: Vec<QueryPredicate>,
    _target: PhantomData<fn() -> T>,
}

impl<T> QueryExpression<T> {
    /// Typed path of the selection; list steps without a key stand for
    /// every entry.
    pub fn select(&self) -> &InstancePath {
        &self.select
    }

    /// Compiled predicates, all of which must pass.
    pub fn predicates(&self) -> &[QueryPredicate] {
        &self.predicates
    }

    /// Schema generation the query was resolved against.
    pub fn schema_digest(&self) -> SchemaDigest {
        self.schema
    }

    /// Wire form of the predicate group.
    pub fn encode_predicates(&self) -> Result<Vec<u8>, WireError> {
        encode_predicates(&self.predicates)
    }

    pub(crate) fn hops(&self) -> &[SelectHop] {
        &self.hops
    }

    pub(crate) fn target(&self) -> SchemaNodeId {
        self.target
    }
}

impl<T> Clone for QueryExpression<T> {
    fn clone(&self) -> Self {
        Self {
            select: self.select.clone(),
            hops: self.hops.clone(),
            target: self.target,
            schema: self.schema,
            predicates: self.predicates.clone(),
            _target: PhantomData,
        }
    }
}

impl<T> fmt::Debug for QueryExpression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryExpression")
            .field("select", &self.select)
            .field("predicates", &self.predicates)
            .finish_non_exhaustive()
    }
}

impl<T> fmt::Display for QueryExpression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.select)?;
        for (i, p) in self.predicates.iter().enumerate() {
            f.write_str(if i == 0 { " where " } else { " and " })?;
            write!(f, "{p}")?;
        }
        Ok(())
    }
}

fn compile<T: BindingClass>(
    query: DescendantQueryBuilder<T>,
    pending: Vec<PendingPredicate>,
) -> Result<QueryExpression<T>, QueryError> {
    let DescendantQueryBuilder { ctx, select, .. } = query;
    let schema = ctx.schema();
    if select.is_empty() {
        return Err(QueryError::InvalidPath("a query must select something below the root".to_owned()));
    }

    let mut parent = schema.root();
    let mut hops = Vec::with_capacity(select.len());
    for step in select.steps() {
        let (location, args) = ctx
            .step_to_generic(parent, step)
            .map_err(|err| QueryError::InvalidPath(format!("{select}: {err}")))?;
        let expand = matches!(schema.kind(location), SchemaKind::List { .. }) && step.key().is_none();
        hops.push(SelectHop {
            step: step.clone(),
            location,
            args,
            expand,
        });
        parent = location;
    }
    let target = parent;
    if !schema.is_bound(target, T::CLASS) {
        return Err(QueryError::InvalidPath(format!(
            "{select} selects {}, not {}",
            schema.describe(target),
            T::CLASS
        )));
    }

    let mut predicates = Vec::with_capacity(pending.len());
    for p in pending {
        let mut location = target;
        let mut class = T::CLASS;
        let mut path = DataPath::root();
        for step in &p.relative {
            let (next, args) = ctx
                .step_to_generic(location, step)
                .map_err(|err| QueryError::InvalidPath(format!("{select} -> {step}: {err}")))?;
            if matches!(schema.kind(next), SchemaKind::List { .. }) {
                return Err(QueryError::InvalidPath(format!(
                    "{select} -> {step}: predicates cannot descend into lists"
                )));
            }
            for arg in args {
                path.push(arg);
            }
            location = next;
            class = step.class();
        }
        let codec = ctx.codec_at(location)?;
        let leaf = codec.leaf(p.leaf).ok_or_else(|| QueryError::NotALeaf {
            class: class.to_string(),
            leaf: p.leaf.to_owned(),
        })?;
        path.push(PathArgument::NodeId(leaf.leaf().clone()));
        predicates.push(QueryPredicate::new(path, p.test.compile(leaf)?));
    }

    debug!(select = %select, predicates = predicates.len(), "query built");
    Ok(QueryExpression {
        select,
        hops,
        target,
        schema: schema.digest(),
        predicates,
        _target: PhantomData,
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use bindery_codec::{BindingError, ClassKind, ClassRegistry, DataObject, FieldSet, FieldValue};
    use bindery_model::{ClassId, IntegerKind, QName, SchemaBuilder, TypeDefinition};

    const NS: &str = "urn:bindery:query-test";

    fn q(local: &str) -> QName {
        QName::new(NS, local)
    }

    #[derive(Clone, Debug, PartialEq, Default)]
    struct Gauge {
        level: Option<u8>,
        label: Option<String>,
    }

    impl Gauge {
        const LEVEL: LeafRef<Gauge, u8> = LeafRef::new("level");
        const LABEL: LeafRef<Gauge, String> = LeafRef::new("label");
        const MISSING: LeafRef<Gauge, u8> = LeafRef::new("missing");
    }

    impl DataObject for Gauge {
        fn implemented_class(&self) -> ClassId {
            Self::CLASS
        }

        fn field(&self, name: &str) -> Option<FieldValue> {
            match name {
                "level" => self.level.map(FieldValue::leaf),
                "label" => self.label.clone().map(FieldValue::leaf),
                _ => None,
            }
        }
    }

    impl BindingClass for Gauge {
        const CLASS: ClassId = ClassId("test.Gauge");
        const KIND: ClassKind = ClassKind::Container;

        fn from_fields(fields: &mut FieldSet) -> Result<Self, BindingError> {
            Ok(Self {
                level: fields.leaf("level")?,
                label: fields.leaf("label")?,
            })
        }
    }

    fn factory() -> QueryFactory {
        let mut b = SchemaBuilder::new();
        let root = b.root();
        let gauge = b.container(root, q("gauge"));
        b.leaf(
            gauge,
            q("level"),
            TypeDefinition::integer(IntegerKind::Uint8).with_range(1..=10),
        );
        b.leaf(gauge, q("label"), TypeDefinition::string());
        b.bind(gauge, Gauge::CLASS);
        let mut r = ClassRegistry::new();
        r.register::<Gauge>().unwrap();
        let ctx = BindingCodecContext::new(Arc::new(b.build().unwrap()), Arc::new(r));
        QueryFactory::new(Arc::new(ctx))
    }

    fn gauge_query() -> DescendantQueryBuilder<Gauge> {
        factory().query_subtree::<Gauge>(InstancePath::new().child::<Gauge>())
    }

    #[test]
    fn operands_outside_the_range_still_compile() {
        let query = gauge_query()
            .matching()
            .leaf(Gauge::LEVEL)
            .greater_than(200)
            .and()
            .leaf(Gauge::LABEL)
            .starts_with("x")
            .build()
            .unwrap();
        let rendered: Vec<String> = query.predicates().iter().map(|p| p.matcher().to_string()).collect();
        assert_eq!(rendered, vec!["gt(200)".to_owned(), "startsWith(x)".to_owned()]);
        assert_eq!(
            query.predicates()[0].path(),
            &DataPath::from(vec![PathArgument::NodeId(q("level"))])
        );
    }

    #[test]
    fn unknown_leaves_and_bad_patterns_fail_the_build() {
        assert_eq!(
            gauge_query().matching().leaf(Gauge::MISSING).non_null().build().unwrap_err(),
            QueryError::NotALeaf {
                class: Gauge::CLASS.to_string(),
                leaf: "missing".to_owned()
            }
        );
        assert!(matches!(
            gauge_query().matching().leaf(Gauge::LABEL).matches_pattern("(").build(),
            Err(QueryError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn empty_selection_is_rejected() {
        let result = factory().query_subtree::<Gauge>(InstancePath::new()).build();
        assert!(matches!(result, Err(QueryError::InvalidPath(_))));
    }

    #[test]
    fn null_tests_compile_to_presence() {
        let query = gauge_query().matching().leaf(Gauge::LEVEL).is_null().build().unwrap();
        assert_eq!(query.predicates()[0].matcher(), &LeafMatch::Exists.negate());
        assert!(query.to_string().ends_with("not(exists())"));
    }
}
