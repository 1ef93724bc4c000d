// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Leaf type definitions and their restrictions.
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::Arc;

use regex::Regex;

use super::SchemaError;
use crate::ident::QName;
use crate::value::Value;

/// Built-in integer types.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum IntegerKind {
    /// `int8`
    Int8,
    /// `int16`
    Int16,
    /// `int32`
    Int32,
    /// `int64`
    Int64,
    /// `uint8`
    Uint8,
    /// `uint16`
    Uint16,
    /// `uint32`
    Uint32,
    /// `uint64`
    Uint64,
}

impl IntegerKind {
    /// Full value space of the type.
    pub fn bounds(self) -> RangeInclusive<i128> {
        match self {
            IntegerKind::Int8 => i128::from(i8::MIN)..=i128::from(i8::MAX),
            IntegerKind::Int16 => i128::from(i16::MIN)..=i128::from(i16::MAX),
            IntegerKind::Int32 => i128::from(i32::MIN)..=i128::from(i32::MAX),
            IntegerKind::Int64 => i128::from(i64::MIN)..=i128::from(i64::MAX),
            IntegerKind::Uint8 => 0..=i128::from(u8::MAX),
            IntegerKind::Uint16 => 0..=i128::from(u16::MAX),
            IntegerKind::Uint32 => 0..=i128::from(u32::MAX),
            IntegerKind::Uint64 => 0..=i128::from(u64::MAX),
        }
    }

    /// Builds a value of this kind; `None` when `v` is out of the value space.
    pub fn value_of(self, v: i128) -> Option<Value> {
        Some(match self {
            IntegerKind::Int8 => Value::Int8(i8::try_from(v).ok()?),
            IntegerKind::Int16 => Value::Int16(i16::try_from(v).ok()?),
            IntegerKind::Int32 => Value::Int32(i32::try_from(v).ok()?),
            IntegerKind::Int64 => Value::Int64(i64::try_from(v).ok()?),
            IntegerKind::Uint8 => Value::Uint8(u8::try_from(v).ok()?),
            IntegerKind::Uint16 => Value::Uint16(u16::try_from(v).ok()?),
            IntegerKind::Uint32 => Value::Uint32(u32::try_from(v).ok()?),
            IntegerKind::Uint64 => Value::Uint64(u64::try_from(v).ok()?),
        })
    }

    /// True when `value` has exactly this integer kind.
    pub fn matches(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (IntegerKind::Int8, Value::Int8(_))
                | (IntegerKind::Int16, Value::Int16(_))
                | (IntegerKind::Int32, Value::Int32(_))
                | (IntegerKind::Int64, Value::Int64(_))
                | (IntegerKind::Uint8, Value::Uint8(_))
                | (IntegerKind::Uint16, Value::Uint16(_))
                | (IntegerKind::Uint32, Value::Uint32(_))
                | (IntegerKind::Uint64, Value::Uint64(_))
        )
    }

    /// YANG name of the type.
    pub fn name(self) -> &'static str {
        match self {
            IntegerKind::Int8 => "int8",
            IntegerKind::Int16 => "int16",
            IntegerKind::Int32 => "int32",
            IntegerKind::Int64 => "int64",
            IntegerKind::Uint8 => "uint8",
            IntegerKind::Uint16 => "uint16",
            IntegerKind::Uint32 => "uint32",
            IntegerKind::Uint64 => "uint64",
        }
    }
}

/// A compiled `pattern` restriction. The whole value must match.
#[derive(Clone)]
pub struct Pattern {
    source: Arc<str>,
    regex: Regex,
}

impl Pattern {
    /// Compiles a pattern.
    pub fn new(source: &str) -> Result<Self, SchemaError> {
        let regex = Regex::new(&format!("^(?:{source})$")).map_err(|e| {
            SchemaError::InvalidPattern {
                pattern: source.to_owned(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            source: Arc::from(source),
            regex,
        })
    }

    /// The pattern as written in the schema.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// True when the whole of `value` matches.
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

/// One enumeration member.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct EnumPair {
    /// Name as it appears in generic data.
    pub name: String,
    /// Assigned value, used by typed code.
    pub value: i32,
}

/// Type of a leaf or leaf-list.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum TypeDefinition {
    /// `boolean`
    Boolean,
    /// `empty`
    Empty,
    /// Integer types with optional `range` restrictions (any may match).
    Integer {
        /// Base integer type.
        kind: IntegerKind,
        /// Allowed ranges; empty means the whole value space.
        ranges: Vec<RangeInclusive<i128>>,
    },
    /// `string` with optional `length` and `pattern` restrictions.
    String {
        /// Allowed lengths in characters; empty means unrestricted.
        lengths: Vec<RangeInclusive<u64>>,
        /// Patterns that must all match.
        patterns: Vec<Pattern>,
    },
    /// `binary` with optional `length` restriction.
    Binary {
        /// Allowed lengths in bytes; empty means unrestricted.
        lengths: Vec<RangeInclusive<u64>>,
    },
    /// `enumeration`
    Enumeration(Vec<EnumPair>),
    /// `identityref` restricted to identities derived from `base`.
    IdentityRef {
        /// Base identity.
        base: QName,
    },
    /// `union`; members are tried in declaration order.
    Union(Vec<TypeDefinition>),
    /// `leafref` to an absolute data-node path.
    Leafref {
        /// Data node names from the root to the referenced leaf.
        path: Vec<QName>,
    },
}

impl TypeDefinition {
    /// Unrestricted integer type.
    pub fn integer(kind: IntegerKind) -> Self {
        TypeDefinition::Integer {
            kind,
            ranges: Vec::new(),
        }
    }

    /// Unrestricted string type.
    pub fn string() -> Self {
        TypeDefinition::String {
            lengths: Vec::new(),
            patterns: Vec::new(),
        }
    }

    /// Unrestricted binary type.
    pub fn binary() -> Self {
        TypeDefinition::Binary {
            lengths: Vec::new(),
        }
    }

    /// Enumeration from `(name, value)` pairs.
    pub fn enumeration(pairs: &[(&str, i32)]) -> Self {
        TypeDefinition::Enumeration(
            pairs
                .iter()
                .map(|(name, value)| EnumPair {
                    name: (*name).to_owned(),
                    value: *value,
                })
                .collect(),
        )
    }

    /// Identity reference.
    pub fn identityref(base: QName) -> Self {
        TypeDefinition::IdentityRef { base }
    }

    /// Union of `members`.
    pub fn union(members: Vec<TypeDefinition>) -> Self {
        TypeDefinition::Union(members)
    }

    /// Leaf reference along an absolute path.
    pub fn leafref(path: Vec<QName>) -> Self {
        TypeDefinition::Leafref { path }
    }

    /// Adds a `range` alternative to an integer type; other types are unchanged.
    pub fn with_range(mut self, range: RangeInclusive<i128>) -> Self {
        if let TypeDefinition::Integer { ranges, .. } = &mut self {
            ranges.push(range);
        }
        self
    }

    /// Adds a `length` alternative to a string or binary type.
    pub fn with_length(mut self, range: RangeInclusive<u64>) -> Self {
        match &mut self {
            TypeDefinition::String { lengths, .. } | TypeDefinition::Binary { lengths } => {
                lengths.push(range);
            }
            _ => {}
        }
        self
    }

    /// Adds a `pattern` to a string type.
    pub fn with_pattern(mut self, pattern: Pattern) -> Self {
        if let TypeDefinition::String { patterns, .. } = &mut self {
            patterns.push(pattern);
        }
        self
    }

    /// Short YANG name of the type.
    pub fn name(&self) -> &'static str {
        match self {
            TypeDefinition::Boolean => "boolean",
            TypeDefinition::Empty => "empty",
            TypeDefinition::Integer { kind, .. } => kind.name(),
            TypeDefinition::String { .. } => "string",
            TypeDefinition::Binary { .. } => "binary",
            TypeDefinition::Enumeration(_) => "enumeration",
            TypeDefinition::IdentityRef { .. } => "identityref",
            TypeDefinition::Union(_) => "union",
            TypeDefinition::Leafref { .. } => "leafref",
        }
    }

    /// Checks range, length and pattern restrictions of a primitive value.
    ///
    /// Only the value's shape for this type is inspected; enumeration,
    /// identity and union membership are resolved by the leaf codecs.
    pub fn check_restrictions(&self, value: &Value) -> Result<(), String> {
        match (self, value) {
            (TypeDefinition::Integer { kind, ranges }, v) => {
                let n = v
                    .as_i128()
                    .filter(|_| kind.matches(v))
                    .ok_or_else(|| format!("expected {}, found {}", kind.name(), v.kind_name()))?;
                if ranges.is_empty() || ranges.iter().any(|r| r.contains(&n)) {
                    Ok(())
                } else {
                    Err(format!("{n} is outside {}", describe_ranges(ranges)))
                }
            }
            (TypeDefinition::String { lengths, patterns }, Value::String(s)) => {
                let len = s.chars().count() as u64;
                if !lengths.is_empty() && !lengths.iter().any(|r| r.contains(&len)) {
                    return Err(format!("length {len} is outside {}", describe_ranges(lengths)));
                }
                match patterns.iter().find(|p| !p.is_match(s)) {
                    Some(p) => Err(format!("\"{s}\" does not match pattern {}", p.source())),
                    None => Ok(()),
                }
            }
            (TypeDefinition::Binary { lengths }, Value::Binary(b)) => {
                let len = b.len() as u64;
                if lengths.is_empty() || lengths.iter().any(|r| r.contains(&len)) {
                    Ok(())
                } else {
                    Err(format!("length {len} is outside {}", describe_ranges(lengths)))
                }
            }
            (TypeDefinition::Boolean, Value::Boolean(_))
            | (TypeDefinition::Empty, Value::Empty)
            | (TypeDefinition::Enumeration(_), Value::String(_))
            | (TypeDefinition::IdentityRef { .. }, Value::QName(_)) => Ok(()),
            (ty, v) => Err(format!("expected {}, found {}", ty.name(), v.kind_name())),
        }
    }
}

fn describe_ranges<T: fmt::Display>(ranges: &[RangeInclusive<T>]) -> String {
    ranges
        .iter()
        .map(|r| format!("{}..{}", r.start(), r.end()))
        .collect::<Vec<_>>()
        .join("|")
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn integer_ranges_are_alternatives() {
        let ty = TypeDefinition::integer(IntegerKind::Uint32)
            .with_range(1..=10)
            .with_range(100..=200);
        assert!(ty.check_restrictions(&Value::Uint32(5)).is_ok());
        assert!(ty.check_restrictions(&Value::Uint32(150)).is_ok());
        let err = ty.check_restrictions(&Value::Uint32(50)).unwrap_err();
        assert_eq!(err, "50 is outside 1..10|100..200");
    }

    #[test]
    fn integer_kind_must_match_exactly() {
        let ty = TypeDefinition::integer(IntegerKind::Uint32);
        assert!(ty.check_restrictions(&Value::Uint64(5)).is_err());
    }

    #[test]
    fn patterns_match_the_whole_value() {
        let ty = TypeDefinition::string().with_pattern(Pattern::new("[a-z]+").unwrap());
        assert!(ty.check_restrictions(&Value::from("abc")).is_ok());
        assert!(ty.check_restrictions(&Value::from("abc1")).is_err());
    }

    #[test]
    fn string_length_counts_characters() {
        let ty = TypeDefinition::string().with_length(0..=2);
        assert!(ty.check_restrictions(&Value::from("éé")).is_ok());
        assert!(ty.check_restrictions(&Value::from("abc")).is_err());
    }

    #[test]
    fn binary_length_counts_bytes() {
        let ty = TypeDefinition::binary().with_length(2..=2);
        assert!(ty.check_restrictions(&Value::Binary(Bytes::from_static(&[1, 2]))).is_ok());
        assert!(ty.check_restrictions(&Value::Binary(Bytes::from_static(&[1]))).is_err());
    }

    #[test]
    fn invalid_pattern_is_a_schema_error() {
        assert!(matches!(
            Pattern::new("[a-"),
            Err(SchemaError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn value_of_rejects_out_of_space() {
        assert_eq!(IntegerKind::Uint8.value_of(255), Some(Value::Uint8(255)));
        assert_eq!(IntegerKind::Uint8.value_of(256), None);
        assert_eq!(IntegerKind::Int8.value_of(-128), Some(Value::Int8(-128)));
    }
}
