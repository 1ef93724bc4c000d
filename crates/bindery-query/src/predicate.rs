// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Compiled leaf predicates and their wire form.
//!
//! A [`QueryPredicate`] pairs a path relative to a query candidate with a
//! [`LeafMatch`] applied to the generic value found there. Encoding is a
//! one-byte kind tag followed by the kind's payload:
//!
//! | tag | kind | payload |
//! |-----|------|---------|
//! | 0 | `exists` | none |
//! | 1..=5 | `eq` `gt` `gte` `lt` `lte` | operand value |
//! | 6..=9 | `contains` `startsWith` `endsWith` `matches` | string |
//! | 10, 11 | `allOf` `anyOf` | u32 count, then nested matchers |
//! | 12 | `not` | u32 count (always 1), then the nested matcher |
use std::cmp::Ordering;
use std::fmt;
use std::slice;

use bindery_codec::CodecConfig;
use bindery_model::wire::{Reader, WireError, Writer};
use bindery_model::{DataPath, NormalizedNode, Value};
use regex::Regex;

use crate::error::QueryError;

mod tag {
    pub(super) const EXISTS: u8 = 0;
    pub(super) const EQUAL: u8 = 1;
    pub(super) const GREATER: u8 = 2;
    pub(super) const GREATER_OR_EQUAL: u8 = 3;
    pub(super) const LESS: u8 = 4;
    pub(super) const LESS_OR_EQUAL: u8 = 5;
    pub(super) const CONTAINS: u8 = 6;
    pub(super) const STARTS_WITH: u8 = 7;
    pub(super) const ENDS_WITH: u8 = 8;
    pub(super) const MATCHES: u8 = 9;
    pub(super) const ALL_OF: u8 = 10;
    pub(super) const ANY_OF: u8 = 11;
    pub(super) const NOT: u8 = 12;
}

/// Regular expression matched against the whole string value.
#[derive(Clone, Debug)]
pub struct MatchPattern {
    source: String,
    regex: Regex,
}

impl MatchPattern {
    /// Compiles `pattern`, anchored at both ends.
    pub fn new(pattern: &str) -> Result<Self, QueryError> {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|err| {
            QueryError::InvalidPattern {
                pattern: pattern.to_owned(),
                reason: err.to_string(),
            }
        })?;
        Ok(Self {
            source: pattern.to_owned(),
            regex,
        })
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// True when the whole of `text` matches.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for MatchPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for MatchPattern {}

/// Test applied to a leaf value, or to its absence.
///
/// Ordering tests use [`Value::compare_natural`]: operands of a different
/// kind never match, and unsigned leaves compare as unsigned. String tests
/// never match non-string values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LeafMatch {
    /// The leaf is present.
    Exists,
    /// Equal to the operand.
    Equal(Value),
    /// Greater than the operand.
    Greater(Value),
    /// Greater than or equal to the operand.
    GreaterOrEqual(Value),
    /// Less than the operand.
    Less(Value),
    /// Less than or equal to the operand.
    LessOrEqual(Value),
    /// String containing the operand.
    Contains(String),
    /// String starting with the operand.
    StartsWith(String),
    /// String ending with the operand.
    EndsWith(String),
    /// String matching a pattern.
    Matches(MatchPattern),
    /// Every nested matcher passes; vacuously true when empty.
    AllOf(Vec<LeafMatch>),
    /// At least one nested matcher passes.
    AnyOf(Vec<LeafMatch>),
    /// The nested matcher fails.
    Not(Box<LeafMatch>),
}

impl LeafMatch {
    /// Evaluates against a leaf value; `None` means the leaf is absent.
    pub fn test(&self, value: Option<&Value>) -> bool {
        match self {
            LeafMatch::Exists => value.is_some(),
            LeafMatch::Equal(operand) => value == Some(operand),
            LeafMatch::Greater(operand) => ordering(value, operand) == Some(Ordering::Greater),
            LeafMatch::GreaterOrEqual(operand) => matches!(
                ordering(value, operand),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            LeafMatch::Less(operand) => ordering(value, operand) == Some(Ordering::Less),
            LeafMatch::LessOrEqual(operand) => matches!(
                ordering(value, operand),
                Some(Ordering::Less | Ordering::Equal)
            ),
            LeafMatch::Contains(needle) => text(value).is_some_and(|s| s.contains(needle.as_str())),
            LeafMatch::StartsWith(prefix) => text(value).is_some_and(|s| s.starts_with(prefix.as_str())),
            LeafMatch::EndsWith(suffix) => text(value).is_some_and(|s| s.ends_with(suffix.as_str())),
            LeafMatch::Matches(pattern) => text(value).is_some_and(|s| pattern.is_match(s)),
            LeafMatch::AllOf(all) => all.iter().all(|m| m.test(value)),
            LeafMatch::AnyOf(any) => any.iter().any(|m| m.test(value)),
            LeafMatch::Not(inner) => !inner.test(value),
        }
    }

    /// The opposite test; negating a negation unwraps it.
    pub fn negate(self) -> LeafMatch {
        match self {
            LeafMatch::Not(inner) => *inner,
            other => LeafMatch::Not(Box::new(other)),
        }
    }

    /// Conjunction, flattened into an existing `allOf`.
    pub fn and(self, other: LeafMatch) -> LeafMatch {
        match self {
            LeafMatch::AllOf(mut all) => {
                all.push(other);
                LeafMatch::AllOf(all)
            }
            first => LeafMatch::AllOf(vec![first, other]),
        }
    }

    /// Disjunction, flattened into an existing `anyOf`.
    pub fn or(self, other: LeafMatch) -> LeafMatch {
        match self {
            LeafMatch::AnyOf(mut any) => {
                any.push(other);
                LeafMatch::AnyOf(any)
            }
            first => LeafMatch::AnyOf(vec![first, other]),
        }
    }

    /// Appends the tagged encoding.
    pub fn write_to(&self, w: &mut Writer) -> Result<(), WireError> {
        match self {
            LeafMatch::Exists => w.write_u8(tag::EXISTS),
            LeafMatch::Equal(v) => write_operand(w, tag::EQUAL, v)?,
            LeafMatch::Greater(v) => write_operand(w, tag::GREATER, v)?,
            LeafMatch::GreaterOrEqual(v) => write_operand(w, tag::GREATER_OR_EQUAL, v)?,
            LeafMatch::Less(v) => write_operand(w, tag::LESS, v)?,
            LeafMatch::LessOrEqual(v) => write_operand(w, tag::LESS_OR_EQUAL, v)?,
            LeafMatch::Contains(s) => write_text(w, tag::CONTAINS, s)?,
            LeafMatch::StartsWith(s) => write_text(w, tag::STARTS_WITH, s)?,
            LeafMatch::EndsWith(s) => write_text(w, tag::ENDS_WITH, s)?,
            LeafMatch::Matches(p) => write_text(w, tag::MATCHES, p.as_str())?,
            LeafMatch::AllOf(all) => write_group(w, tag::ALL_OF, all)?,
            LeafMatch::AnyOf(any) => write_group(w, tag::ANY_OF, any)?,
            LeafMatch::Not(inner) => write_group(w, tag::NOT, slice::from_ref(&**inner))?,
        }
        Ok(())
    }

    /// Reads one matcher, allowing at most `max_depth` nested composites.
    pub fn read_from(r: &mut Reader<'_>, max_depth: usize) -> Result<Self, QueryError> {
        read_matcher(r, 0, max_depth)
    }
}

fn ordering(value: Option<&Value>, operand: &Value) -> Option<Ordering> {
    value?.compare_natural(operand)
}

fn text(value: Option<&Value>) -> Option<&str> {
    value?.as_str()
}

fn write_operand(w: &mut Writer, tag: u8, value: &Value) -> Result<(), WireError> {
    w.write_u8(tag);
    w.write_value(value)
}

fn write_text(w: &mut Writer, tag: u8, value: &str) -> Result<(), WireError> {
    w.write_u8(tag);
    w.write_string(value)
}

fn write_group(w: &mut Writer, tag: u8, members: &[LeafMatch]) -> Result<(), WireError> {
    w.write_u8(tag);
    w.write_len(members.len())?;
    members.iter().try_for_each(|m| m.write_to(w))
}

fn read_matcher(r: &mut Reader<'_>, depth: usize, max_depth: usize) -> Result<LeafMatch, QueryError> {
    let matcher = match r.read_u8()? {
        tag::EXISTS => LeafMatch::Exists,
        tag::EQUAL => LeafMatch::Equal(r.read_value()?),
        tag::GREATER => LeafMatch::Greater(r.read_value()?),
        tag::GREATER_OR_EQUAL => LeafMatch::GreaterOrEqual(r.read_value()?),
        tag::LESS => LeafMatch::Less(r.read_value()?),
        tag::LESS_OR_EQUAL => LeafMatch::LessOrEqual(r.read_value()?),
        tag::CONTAINS => LeafMatch::Contains(r.read_string()?),
        tag::STARTS_WITH => LeafMatch::StartsWith(r.read_string()?),
        tag::ENDS_WITH => LeafMatch::EndsWith(r.read_string()?),
        tag::MATCHES => LeafMatch::Matches(MatchPattern::new(&r.read_string()?)?),
        t @ (tag::ALL_OF | tag::ANY_OF) => {
            let depth = nest(depth, max_depth)?;
            let count = r.read_len()?;
            // Every member takes at least one byte.
            let mut members = Vec::with_capacity(count.min(r.remaining()));
            for _ in 0..count {
                members.push(read_matcher(r, depth, max_depth)?);
            }
            if t == tag::ALL_OF {
                LeafMatch::AllOf(members)
            } else {
                LeafMatch::AnyOf(members)
            }
        }
        tag::NOT => {
            let depth = nest(depth, max_depth)?;
            match r.read_len()? {
                1 => LeafMatch::Not(Box::new(read_matcher(r, depth, max_depth)?)),
                count => return Err(QueryError::NotArity(count)),
            }
        }
        other => {
            return Err(WireError::UnknownTag {
                what: "predicate",
                tag: other,
            }
            .into())
        }
    };
    Ok(matcher)
}

fn nest(depth: usize, max_depth: usize) -> Result<usize, WireError> {
    if depth >= max_depth {
        Err(WireError::TooDeep(max_depth))
    } else {
        Ok(depth + 1)
    }
}

impl fmt::Display for LeafMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeafMatch::Exists => f.write_str("exists()"),
            LeafMatch::Equal(v) => write!(f, "eq({v})"),
            LeafMatch::Greater(v) => write!(f, "gt({v})"),
            LeafMatch::GreaterOrEqual(v) => write!(f, "gte({v})"),
            LeafMatch::Less(v) => write!(f, "lt({v})"),
            LeafMatch::LessOrEqual(v) => write!(f, "lte({v})"),
            LeafMatch::Contains(s) => write!(f, "contains({s})"),
            LeafMatch::StartsWith(s) => write!(f, "startsWith({s})"),
            LeafMatch::EndsWith(s) => write!(f, "endsWith({s})"),
            LeafMatch::Matches(p) => write!(f, "matches({})", p.as_str()),
            LeafMatch::AllOf(all) => write_list(f, "allOf", all),
            LeafMatch::AnyOf(any) => write_list(f, "anyOf", any),
            LeafMatch::Not(inner) => write!(f, "not({inner})"),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, name: &str, members: &[LeafMatch]) -> fmt::Result {
    write!(f, "{name}(")?;
    for (i, m) in members.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{m}")?;
    }
    f.write_str(")")
}

/// A [`LeafMatch`] applied to the leaf at `path` below a query candidate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryPredicate {
    path: DataPath,
    matcher: LeafMatch,
}

impl QueryPredicate {
    /// Predicate on the leaf at `path`, relative to the candidate.
    pub fn new(path: DataPath, matcher: LeafMatch) -> Self {
        Self { path, matcher }
    }

    /// Path from the candidate to the leaf.
    pub fn path(&self) -> &DataPath {
        &self.path
    }

    /// The test.
    pub fn matcher(&self) -> &LeafMatch {
        &self.matcher
    }

    /// Evaluates against a candidate subtree.
    ///
    /// A leaf-list passes when any of its values does.
    pub fn test(&self, candidate: &NormalizedNode) -> bool {
        match candidate.find(self.path.args()) {
            Some(NormalizedNode::LeafSet(set)) => set.values().any(|v| self.matcher.test(Some(v))),
            Some(node) => self.matcher.test(node.value()),
            None => self.matcher.test(None),
        }
    }

    /// Appends the relative path, then the matcher.
    pub fn write_to(&self, w: &mut Writer) -> Result<(), WireError> {
        w.write_path(&self.path)?;
        self.matcher.write_to(w)
    }

    /// Reads a predicate written by [`QueryPredicate::write_to`].
    pub fn read_from(r: &mut Reader<'_>, max_depth: usize) -> Result<Self, QueryError> {
        let path = r.read_path()?;
        let matcher = LeafMatch::read_from(r, max_depth)?;
        Ok(Self { path, matcher })
    }
}

impl fmt::Display for QueryPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.matcher)
    }
}

/// Encodes a predicate group: a count, then each predicate.
pub fn encode_predicates(predicates: &[QueryPredicate]) -> Result<Vec<u8>, WireError> {
    let mut w = Writer::default();
    w.write_len(predicates.len())?;
    for predicate in predicates {
        predicate.write_to(&mut w)?;
    }
    Ok(w.into_vec())
}

/// Decodes a predicate group written by [`encode_predicates`], bounded by
/// the wire limits in `config`.
pub fn decode_predicates(bytes: &[u8], config: &CodecConfig) -> Result<Vec<QueryPredicate>, QueryError> {
    let mut r = Reader::with_max_len(bytes, config.max_wire_string_len);
    let count = r.read_len()?;
    let mut out = Vec::with_capacity(count.min(r.remaining()));
    for _ in 0..count {
        out.push(QueryPredicate::read_from(&mut r, config.max_predicate_depth)?);
    }
    match r.remaining() {
        0 => Ok(out),
        left => Err(QueryError::TrailingBytes(left)),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use bindery_model::{PathArgument, QName};

    fn round_trip(m: &LeafMatch) -> LeafMatch {
        let mut w = Writer::default();
        m.write_to(&mut w).unwrap();
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        let back = LeafMatch::read_from(&mut r, 8).unwrap();
        assert_eq!(r.remaining(), 0);
        back
    }

    #[test]
    fn display_forms() {
        let all = LeafMatch::Greater(Value::Uint64(1))
            .and(LeafMatch::GreaterOrEqual(Value::Uint64(2)))
            .and(LeafMatch::Less(Value::Uint64(10)))
            .and(LeafMatch::LessOrEqual(Value::Uint64(0)))
            .and(LeafMatch::Exists);
        assert_eq!(all.to_string(), "allOf(gt(1), gte(2), lt(10), lte(0), exists())");

        let any = LeafMatch::Matches(MatchPattern::new("AA").unwrap())
            .or(LeafMatch::Contains("BB".to_owned()))
            .or(LeafMatch::Equal(Value::Int32(1)));
        assert_eq!(any.to_string(), "anyOf(matches(AA), contains(BB), eq(1))");
        assert_eq!(LeafMatch::Exists.negate().to_string(), "not(exists())");
    }

    #[test]
    fn ordering_is_natural_and_kind_strict() {
        let big = Value::Uint64(u64::MAX);
        assert!(LeafMatch::Greater(Value::Uint64(1)).test(Some(&big)));
        assert!(!LeafMatch::Less(Value::Uint64(1)).test(Some(&big)));
        assert!(LeafMatch::LessOrEqual(Value::Int8(-1)).test(Some(&Value::Int8(-1))));
        // Different kinds never compare.
        assert!(!LeafMatch::Greater(Value::Uint32(0)).test(Some(&Value::Uint64(5))));
        assert!(!LeafMatch::Less(Value::Uint32(9)).test(Some(&Value::Uint64(5))));
        assert!(!LeafMatch::Greater(Value::Uint64(0)).test(None));
    }

    #[test]
    fn string_tests() {
        let v = Value::from("disk full");
        assert!(LeafMatch::Contains("k f".to_owned()).test(Some(&v)));
        assert!(LeafMatch::StartsWith("disk".to_owned()).test(Some(&v)));
        assert!(LeafMatch::EndsWith("full".to_owned()).test(Some(&v)));
        assert!(LeafMatch::Matches(MatchPattern::new("disk.*").unwrap()).test(Some(&v)));
        // Patterns match the whole value.
        assert!(!LeafMatch::Matches(MatchPattern::new("disk").unwrap()).test(Some(&v)));
        assert!(!LeafMatch::Contains("1".to_owned()).test(Some(&Value::Uint8(1))));
    }

    #[test]
    fn presence_and_negation() {
        let absent = LeafMatch::Exists.negate();
        assert!(absent.test(None));
        assert!(!absent.test(Some(&Value::Empty)));
        assert_eq!(absent.negate(), LeafMatch::Exists);
        assert!(LeafMatch::AllOf(Vec::new()).test(None));
        assert!(!LeafMatch::AnyOf(Vec::new()).test(None));
    }

    #[test]
    fn nested_matchers_survive_the_wire() {
        let m = LeafMatch::Not(Box::new(
            LeafMatch::StartsWith("a".to_owned())
                .or(LeafMatch::Matches(MatchPattern::new("[0-9]+").unwrap()))
                .and(LeafMatch::Equal(Value::QName(QName::new("urn:x", "id")))),
        ));
        assert_eq!(round_trip(&m), m);
    }

    #[test]
    fn negation_carries_a_count_of_one() {
        let mut w = Writer::default();
        LeafMatch::Exists.negate().write_to(&mut w).unwrap();
        assert_eq!(w.into_vec(), vec![tag::NOT, 1, 0, 0, 0, tag::EXISTS]);

        let two = [tag::NOT, 2, 0, 0, 0, tag::EXISTS, tag::EXISTS];
        assert_eq!(
            LeafMatch::read_from(&mut Reader::new(&two), 4),
            Err(QueryError::NotArity(2))
        );
        let none = [tag::NOT, 0, 0, 0, 0];
        assert_eq!(
            LeafMatch::read_from(&mut Reader::new(&none), 4),
            Err(QueryError::NotArity(0))
        );
    }

    #[test]
    fn decoding_is_bounded() {
        let mut deep = LeafMatch::Exists;
        for _ in 0..4 {
            deep = LeafMatch::Not(Box::new(deep));
        }
        let mut w = Writer::default();
        deep.write_to(&mut w).unwrap();
        let bytes = w.into_vec();
        assert!(LeafMatch::read_from(&mut Reader::new(&bytes), 4).is_ok());
        assert_eq!(
            LeafMatch::read_from(&mut Reader::new(&bytes), 3),
            Err(QueryError::Wire(WireError::TooDeep(3)))
        );

        assert_eq!(
            LeafMatch::read_from(&mut Reader::new(&[0xee]), 4),
            Err(QueryError::Wire(WireError::UnknownTag {
                what: "predicate",
                tag: 0xee
            }))
        );
    }

    #[test]
    fn predicate_groups_reject_trailing_bytes() {
        let path: DataPath = vec![PathArgument::NodeId(QName::new("urn:x", "leaf"))].into();
        let group = vec![QueryPredicate::new(path, LeafMatch::Exists)];
        let mut bytes = encode_predicates(&group).unwrap();
        let config = CodecConfig::default();
        assert_eq!(decode_predicates(&bytes, &config).unwrap(), group);

        bytes.push(0);
        assert_eq!(
            decode_predicates(&bytes, &config),
            Err(QueryError::TrailingBytes(1))
        );
    }

    #[test]
    fn long_operands_are_refused() {
        let m = LeafMatch::Contains("x".repeat(32));
        let mut w = Writer::default();
        m.write_to(&mut w).unwrap();
        let bytes = w.into_vec();
        let mut r = Reader::with_max_len(&bytes, 16);
        assert!(matches!(
            LeafMatch::read_from(&mut r, 4),
            Err(QueryError::Wire(WireError::LengthTooLarge { len: 32, max: 16 }))
        ));
    }
}
