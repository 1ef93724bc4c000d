// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scalar leaf values carried by generic trees.
use std::cmp::Ordering;
use std::fmt;
use std::mem;

use bytes::Bytes;

use crate::ident::QName;

/// A scalar stored in a leaf, leaf-set entry or list key.
///
/// Enumeration leaves carry their name as [`Value::String`]; identityref
/// leaves carry the identity's [`QName`]. Binary values compare and hash by
/// content.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Value {
    /// YANG `boolean`.
    Boolean(bool),
    /// YANG `int8`.
    Int8(i8),
    /// YANG `int16`.
    Int16(i16),
    /// YANG `int32`.
    Int32(i32),
    /// YANG `int64`.
    Int64(i64),
    /// YANG `uint8`.
    Uint8(u8),
    /// YANG `uint16`.
    Uint16(u16),
    /// YANG `uint32`.
    Uint32(u32),
    /// YANG `uint64`.
    Uint64(u64),
    /// YANG `string` and enumeration names.
    String(String),
    /// YANG `binary`.
    Binary(Bytes),
    /// YANG `empty`.
    Empty,
    /// Identity reference.
    QName(QName),
}

impl Value {
    /// Compares two values of the same kind by their natural order.
    ///
    /// Values of different kinds are incomparable and yield `None`. Unsigned
    /// kinds compare as unsigned.
    pub fn compare_natural(&self, other: &Value) -> Option<Ordering> {
        if mem::discriminant(self) == mem::discriminant(other) {
            Some(self.cmp(other))
        } else {
            None
        }
    }

    /// Returns the integer payload widened to `i128`.
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Value::Int8(v) => Some(i128::from(v)),
            Value::Int16(v) => Some(i128::from(v)),
            Value::Int32(v) => Some(i128::from(v)),
            Value::Int64(v) => Some(i128::from(v)),
            Value::Uint8(v) => Some(i128::from(v)),
            Value::Uint16(v) => Some(i128::from(v)),
            Value::Uint32(v) => Some(i128::from(v)),
            Value::Uint64(v) => Some(i128::from(v)),
            _ => None,
        }
    }

    /// Returns the string payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Short kind name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Int8(_) => "int8",
            Value::Int16(_) => "int16",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Uint8(_) => "uint8",
            Value::Uint16(_) => "uint16",
            Value::Uint32(_) => "uint32",
            Value::Uint64(_) => "uint64",
            Value::String(_) => "string",
            Value::Binary(_) => "binary",
            Value::Empty => "empty",
            Value::QName(_) => "identityref",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{v}"),
            Value::Int8(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Uint8(v) => write!(f, "{v}"),
            Value::Uint16(v) => write!(f, "{v}"),
            Value::Uint32(v) => write!(f, "{v}"),
            Value::Uint64(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
            Value::Binary(v) => f.write_str(&hex::encode(v)),
            Value::Empty => f.write_str("empty"),
            Value::QName(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Binary(v)
    }
}

macro_rules! value_from_int {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from_int!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
);
