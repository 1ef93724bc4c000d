// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Compact deterministic encoding (length-prefixed, LE scalars).
//!
//! Values are written as a one-byte tag followed by the payload; zero
//! integers, empty strings, empty binaries and booleans fit in the tag alone.
//! Qualified names are written once per stream and back-referenced by index
//! afterwards.
use std::collections::BTreeSet;
use std::str;

use bytes::Bytes;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::ident::QName;
use crate::path::{DataPath, NodeIdentifierWithPredicates, PathArgument};
use crate::value::Value;

/// Default bound on strings and byte blobs read from a stream.
pub const DEFAULT_MAX_LEN: usize = 1 << 20;

/// Errors produced by wire readers and writers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WireError {
    /// Attempted to read beyond the end of the buffer.
    #[error("[WIRE_OUT_OF_BOUNDS] buffer too short")]
    OutOfBounds,
    /// UTF-8 decoding failed.
    #[error("[WIRE_INVALID_UTF8] invalid utf-8")]
    InvalidUtf8,
    /// A length exceeded its bound.
    #[error("[WIRE_LENGTH_TOO_LARGE] length {len} exceeds {max}")]
    LengthTooLarge {
        /// Declared length.
        len: usize,
        /// Allowed maximum.
        max: usize,
    },
    /// A tag byte was not recognized.
    #[error("[WIRE_UNKNOWN_TAG] unknown {what} tag {tag:#04x}")]
    UnknownTag {
        /// What was being decoded.
        what: &'static str,
        /// The offending tag.
        tag: u8,
    },
    /// A qualified-name back-reference pointed past the dictionary.
    #[error("[WIRE_DANGLING_REFERENCE] qname reference {0} is not defined")]
    DanglingReference(u32),
    /// Nested structures exceeded the permitted depth.
    #[error("[WIRE_TOO_DEEP] nesting exceeds {0}")]
    TooDeep(usize),
}

mod tag {
    pub(super) const EMPTY: u8 = 0x00;
    pub(super) const BOOLEAN_FALSE: u8 = 0x01;
    pub(super) const BOOLEAN_TRUE: u8 = 0x02;
    pub(super) const INT8: u8 = 0x03;
    pub(super) const INT8_0: u8 = 0x04;
    pub(super) const INT16: u8 = 0x05;
    pub(super) const INT16_0: u8 = 0x06;
    pub(super) const INT32: u8 = 0x07;
    pub(super) const INT32_0: u8 = 0x08;
    pub(super) const INT64: u8 = 0x09;
    pub(super) const INT64_0: u8 = 0x0a;
    pub(super) const UINT8: u8 = 0x0b;
    pub(super) const UINT8_0: u8 = 0x0c;
    pub(super) const UINT16: u8 = 0x0d;
    pub(super) const UINT16_0: u8 = 0x0e;
    pub(super) const UINT32: u8 = 0x0f;
    pub(super) const UINT32_0: u8 = 0x10;
    pub(super) const UINT64: u8 = 0x11;
    pub(super) const UINT64_0: u8 = 0x12;
    pub(super) const STRING_EMPTY: u8 = 0x13;
    pub(super) const STRING: u8 = 0x14;
    pub(super) const BINARY_EMPTY: u8 = 0x15;
    pub(super) const BINARY: u8 = 0x16;
    pub(super) const QNAME: u8 = 0x17;

    pub(super) const QNAME_DEFINE: u8 = 0x00;
    pub(super) const QNAME_DEFINE_REVISION: u8 = 0x01;
    pub(super) const QNAME_REF: u8 = 0x02;

    pub(super) const ARG_NODE_ID: u8 = 0x00;
    pub(super) const ARG_PREDICATES: u8 = 0x01;
    pub(super) const ARG_AUGMENTATION: u8 = 0x02;
    pub(super) const ARG_VALUE: u8 = 0x03;
}

/// Deterministic writer for little-endian scalars, values and paths.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
    qnames: FxHashMap<QName, u32>,
}

impl Writer {
    /// Create a new writer with a pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            qnames: FxHashMap::default(),
        }
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Write a little-endian u16.
    pub fn write_u16_le(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a little-endian u32.
    pub fn write_u32_le(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a little-endian u64.
    pub fn write_u64_le(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a collection length as a little-endian u32.
    pub fn write_len(&mut self, len: usize) -> Result<(), WireError> {
        let len32 = u32::try_from(len).map_err(|_| WireError::LengthTooLarge {
            len,
            max: u32::MAX as usize,
        })?;
        self.write_u32_le(len32);
        Ok(())
    }

    /// Write length-prefixed bytes (u32 LE length).
    pub fn write_len_prefixed_bytes(&mut self, bytes: &[u8]) -> Result<(), WireError> {
        self.write_len(bytes.len())?;
        self.write_bytes(bytes);
        Ok(())
    }

    /// Write a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, value: &str) -> Result<(), WireError> {
        self.write_len_prefixed_bytes(value.as_bytes())
    }

    /// Write a qualified name, defining it on first use.
    pub fn write_qname(&mut self, qname: &QName) -> Result<(), WireError> {
        if let Some(index) = self.qnames.get(qname) {
            let index = *index;
            self.write_u8(tag::QNAME_REF);
            self.write_u32_le(index);
            return Ok(());
        }
        match qname.revision() {
            Some(rev) => {
                self.write_u8(tag::QNAME_DEFINE_REVISION);
                self.write_string(qname.namespace())?;
                self.write_string(rev)?;
            }
            None => {
                self.write_u8(tag::QNAME_DEFINE);
                self.write_string(qname.namespace())?;
            }
        }
        self.write_string(qname.local_name())?;
        let next = u32::try_from(self.qnames.len()).map_err(|_| WireError::LengthTooLarge {
            len: self.qnames.len(),
            max: u32::MAX as usize,
        })?;
        self.qnames.insert(qname.clone(), next);
        Ok(())
    }

    /// Write a tagged value.
    pub fn write_value(&mut self, value: &Value) -> Result<(), WireError> {
        match value {
            Value::Empty => self.write_u8(tag::EMPTY),
            Value::Boolean(false) => self.write_u8(tag::BOOLEAN_FALSE),
            Value::Boolean(true) => self.write_u8(tag::BOOLEAN_TRUE),
            Value::Int8(0) => self.write_u8(tag::INT8_0),
            Value::Int8(v) => {
                self.write_u8(tag::INT8);
                self.write_bytes(&v.to_le_bytes());
            }
            Value::Int16(0) => self.write_u8(tag::INT16_0),
            Value::Int16(v) => {
                self.write_u8(tag::INT16);
                self.write_bytes(&v.to_le_bytes());
            }
            Value::Int32(0) => self.write_u8(tag::INT32_0),
            Value::Int32(v) => {
                self.write_u8(tag::INT32);
                self.write_bytes(&v.to_le_bytes());
            }
            Value::Int64(0) => self.write_u8(tag::INT64_0),
            Value::Int64(v) => {
                self.write_u8(tag::INT64);
                self.write_bytes(&v.to_le_bytes());
            }
            Value::Uint8(0) => self.write_u8(tag::UINT8_0),
            Value::Uint8(v) => {
                self.write_u8(tag::UINT8);
                self.write_u8(*v);
            }
            Value::Uint16(0) => self.write_u8(tag::UINT16_0),
            Value::Uint16(v) => {
                self.write_u8(tag::UINT16);
                self.write_u16_le(*v);
            }
            Value::Uint32(0) => self.write_u8(tag::UINT32_0),
            Value::Uint32(v) => {
                self.write_u8(tag::UINT32);
                self.write_u32_le(*v);
            }
            Value::Uint64(0) => self.write_u8(tag::UINT64_0),
            Value::Uint64(v) => {
                self.write_u8(tag::UINT64);
                self.write_u64_le(*v);
            }
            Value::String(s) if s.is_empty() => self.write_u8(tag::STRING_EMPTY),
            Value::String(s) => {
                self.write_u8(tag::STRING);
                self.write_string(s)?;
            }
            Value::Binary(b) if b.is_empty() => self.write_u8(tag::BINARY_EMPTY),
            Value::Binary(b) => {
                self.write_u8(tag::BINARY);
                self.write_len_prefixed_bytes(b)?;
            }
            Value::QName(q) => {
                self.write_u8(tag::QNAME);
                self.write_qname(q)?;
            }
        }
        Ok(())
    }

    /// Write one generic path argument.
    pub fn write_path_argument(&mut self, arg: &PathArgument) -> Result<(), WireError> {
        match arg {
            PathArgument::NodeId(q) => {
                self.write_u8(tag::ARG_NODE_ID);
                self.write_qname(q)
            }
            PathArgument::NodeWithPredicates(p) => {
                self.write_u8(tag::ARG_PREDICATES);
                self.write_qname(p.name())?;
                self.write_len(p.keys().len())?;
                for (k, v) in p.keys() {
                    self.write_qname(k)?;
                    self.write_value(v)?;
                }
                Ok(())
            }
            PathArgument::AugmentationId(names) => {
                self.write_u8(tag::ARG_AUGMENTATION);
                self.write_len(names.len())?;
                names.iter().try_for_each(|q| self.write_qname(q))
            }
            PathArgument::NodeWithValue(q, v) => {
                self.write_u8(tag::ARG_VALUE);
                self.write_qname(q)?;
                self.write_value(v)
            }
        }
    }

    /// Write a generic path as a count followed by its arguments.
    pub fn write_path(&mut self, path: &DataPath) -> Result<(), WireError> {
        self.write_len(path.len())?;
        path.iter().try_for_each(|arg| self.write_path_argument(arg))
    }

    /// Consume the writer and return the buffer.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

/// Deterministic reader matching [`Writer`].
#[derive(Debug)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
    max_len: usize,
    qnames: Vec<QName>,
}

impl<'a> Reader<'a> {
    /// Create a reader bounded by [`DEFAULT_MAX_LEN`].
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self::with_max_len(bytes, DEFAULT_MAX_LEN)
    }

    /// Create a reader with an explicit bound on strings, blobs and collections.
    #[must_use]
    pub fn with_max_len(bytes: &'a [u8], max_len: usize) -> Self {
        Self {
            bytes,
            offset: 0,
            max_len,
            qnames: Vec::new(),
        }
    }

    /// Bytes not consumed yet.
    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.offset)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let end = self
            .offset
            .checked_add(len)
            .ok_or(WireError::OutOfBounds)?;
        if end > self.bytes.len() {
            return Err(WireError::OutOfBounds);
        }
        let out = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(out)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let chunk = self.take(N)?;
        chunk.try_into().map_err(|_| WireError::OutOfBounds)
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        let [b] = self.take_array::<1>()?;
        Ok(b)
    }

    /// Read a little-endian u16.
    pub fn read_u16_le(&mut self) -> Result<u16, WireError> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    /// Read a little-endian u32.
    pub fn read_u32_le(&mut self) -> Result<u32, WireError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    /// Read a little-endian u64.
    pub fn read_u64_le(&mut self) -> Result<u64, WireError> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    /// Read a collection length, bounded by the reader's maximum.
    pub fn read_len(&mut self) -> Result<usize, WireError> {
        let len = self.read_u32_le()? as usize;
        if len > self.max_len {
            return Err(WireError::LengthTooLarge {
                len,
                max: self.max_len,
            });
        }
        Ok(len)
    }

    /// Read a length-prefixed byte slice.
    pub fn read_len_prefixed_bytes(&mut self) -> Result<&'a [u8], WireError> {
        let len = self.read_len()?;
        self.take(len)
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, WireError> {
        let bytes = self.read_len_prefixed_bytes()?;
        str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| WireError::InvalidUtf8)
    }

    /// Read a qualified name written by [`Writer::write_qname`].
    pub fn read_qname(&mut self) -> Result<QName, WireError> {
        let qname = match self.read_u8()? {
            tag::QNAME_REF => {
                let index = self.read_u32_le()?;
                return self
                    .qnames
                    .get(index as usize)
                    .cloned()
                    .ok_or(WireError::DanglingReference(index));
            }
            tag::QNAME_DEFINE => {
                let ns = self.read_string()?;
                let local = self.read_string()?;
                QName::new(&ns, &local)
            }
            tag::QNAME_DEFINE_REVISION => {
                let ns = self.read_string()?;
                let rev = self.read_string()?;
                let local = self.read_string()?;
                QName::with_revision(&ns, &rev, &local)
            }
            other => {
                return Err(WireError::UnknownTag {
                    what: "qname",
                    tag: other,
                })
            }
        };
        self.qnames.push(qname.clone());
        Ok(qname)
    }

    /// Read a tagged value written by [`Writer::write_value`].
    pub fn read_value(&mut self) -> Result<Value, WireError> {
        Ok(match self.read_u8()? {
            tag::EMPTY => Value::Empty,
            tag::BOOLEAN_FALSE => Value::Boolean(false),
            tag::BOOLEAN_TRUE => Value::Boolean(true),
            tag::INT8 => Value::Int8(i8::from_le_bytes(self.take_array()?)),
            tag::INT8_0 => Value::Int8(0),
            tag::INT16 => Value::Int16(i16::from_le_bytes(self.take_array()?)),
            tag::INT16_0 => Value::Int16(0),
            tag::INT32 => Value::Int32(i32::from_le_bytes(self.take_array()?)),
            tag::INT32_0 => Value::Int32(0),
            tag::INT64 => Value::Int64(i64::from_le_bytes(self.take_array()?)),
            tag::INT64_0 => Value::Int64(0),
            tag::UINT8 => Value::Uint8(self.read_u8()?),
            tag::UINT8_0 => Value::Uint8(0),
            tag::UINT16 => Value::Uint16(self.read_u16_le()?),
            tag::UINT16_0 => Value::Uint16(0),
            tag::UINT32 => Value::Uint32(self.read_u32_le()?),
            tag::UINT32_0 => Value::Uint32(0),
            tag::UINT64 => Value::Uint64(self.read_u64_le()?),
            tag::UINT64_0 => Value::Uint64(0),
            tag::STRING_EMPTY => Value::String(String::new()),
            tag::STRING => Value::String(self.read_string()?),
            tag::BINARY_EMPTY => Value::Binary(Bytes::new()),
            tag::BINARY => Value::Binary(Bytes::copy_from_slice(self.read_len_prefixed_bytes()?)),
            tag::QNAME => Value::QName(self.read_qname()?),
            other => {
                return Err(WireError::UnknownTag {
                    what: "value",
                    tag: other,
                })
            }
        })
    }

    /// Read one generic path argument.
    pub fn read_path_argument(&mut self) -> Result<PathArgument, WireError> {
        match self.read_u8()? {
            tag::ARG_NODE_ID => Ok(PathArgument::NodeId(self.read_qname()?)),
            tag::ARG_PREDICATES => {
                let name = self.read_qname()?;
                let count = self.read_len()?;
                let mut keys = std::collections::BTreeMap::new();
                for _ in 0..count {
                    let k = self.read_qname()?;
                    let v = self.read_value()?;
                    keys.insert(k, v);
                }
                Ok(PathArgument::NodeWithPredicates(
                    NodeIdentifierWithPredicates::new(name, keys),
                ))
            }
            tag::ARG_AUGMENTATION => {
                let count = self.read_len()?;
                let names = (0..count)
                    .map(|_| self.read_qname())
                    .collect::<Result<BTreeSet<_>, _>>()?;
                Ok(PathArgument::AugmentationId(names))
            }
            tag::ARG_VALUE => {
                let q = self.read_qname()?;
                let v = self.read_value()?;
                Ok(PathArgument::NodeWithValue(q, v))
            }
            other => Err(WireError::UnknownTag {
                what: "path argument",
                tag: other,
            }),
        }
    }

    /// Read a generic path written by [`Writer::write_path`].
    pub fn read_path(&mut self) -> Result<DataPath, WireError> {
        let count = self.read_len()?;
        (0..count).map(|_| self.read_path_argument()).collect()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn zero_values_fit_in_the_tag() {
        let mut w = Writer::default();
        w.write_value(&Value::Uint64(0)).unwrap();
        w.write_value(&Value::String(String::new())).unwrap();
        w.write_value(&Value::Boolean(true)).unwrap();
        assert_eq!(w.into_vec(), vec![0x12, 0x13, 0x02]);
    }

    #[test]
    fn repeated_qnames_are_back_referenced() {
        let q = QName::new("urn:test", "leaf");
        let mut w = Writer::default();
        w.write_qname(&q).unwrap();
        let first = w.buf.len();
        w.write_qname(&q).unwrap();
        assert_eq!(w.buf.len() - first, 5);
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_qname().unwrap(), q);
        assert_eq!(r.read_qname().unwrap(), q);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn dangling_reference_is_rejected() {
        let bytes = [0x02, 7, 0, 0, 0];
        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_qname(), Err(WireError::DanglingReference(7)));
    }

    #[test]
    fn truncated_input_is_out_of_bounds() {
        let bytes = [0x11, 1, 2];
        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_value(), Err(WireError::OutOfBounds));
    }

    #[test]
    fn string_bound_is_enforced() {
        let mut w = Writer::default();
        w.write_value(&Value::from("abcdef")).unwrap();
        let bytes = w.into_vec();
        let mut r = Reader::with_max_len(&bytes, 3);
        assert_eq!(
            r.read_value(),
            Err(WireError::LengthTooLarge { len: 6, max: 3 })
        );
    }

    #[test]
    fn paths_round_trip() {
        let q = |l: &str| QName::with_revision("urn:test", "2024-01-01", l);
        let path = DataPath::root()
            .child(q("top"))
            .child(NodeIdentifierWithPredicates::single(
                q("item"),
                q("id"),
                Bytes::from_static(b"\x00\x01"),
            ))
            .child(PathArgument::augmentation([q("a"), q("b")]))
            .child(PathArgument::NodeWithValue(q("tags"), Value::from("x")));
        let mut w = Writer::default();
        w.write_path(&path).unwrap();
        let bytes = w.into_vec();
        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_path().unwrap(), path);
    }
}
