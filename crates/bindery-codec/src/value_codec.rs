// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Leaf value codecs and list key codecs.
use std::sync::Arc;

use bindery_model::schema::IntegerKind;
use bindery_model::{NodeIdentifierWithPredicates, QName, SchemaIndex, TypeDefinition, Value};

use crate::binding::{ItemKey, TypedValue};
use crate::error::CodecError;

/// Converts one leaf between [`TypedValue`] and [`Value`].
///
/// Leafrefs never reach this codec: the schema index has already replaced
/// them with the referenced leaf's effective type.
#[derive(Clone, Debug)]
pub struct ValueCodec {
    leaf: QName,
    ty: Arc<TypeDefinition>,
    schema: Arc<SchemaIndex>,
}

impl ValueCodec {
    /// Codec for `leaf` of effective type `ty`.
    pub fn new(leaf: QName, ty: Arc<TypeDefinition>, schema: Arc<SchemaIndex>) -> Self {
        Self { leaf, ty, schema }
    }

    /// Leaf name.
    pub fn leaf(&self) -> &QName {
        &self.leaf
    }

    /// Effective type.
    pub fn type_definition(&self) -> &TypeDefinition {
        &self.ty
    }

    /// Serializes a value, enforcing restrictions.
    pub fn serialize(&self, value: &TypedValue) -> Result<Value, CodecError> {
        self.to_generic(&self.ty, value, true)
    }

    /// Serializes a value without checking restrictions.
    ///
    /// Used for query operands, which may legitimately lie outside a leaf's
    /// range (`lt(0)` on a `uint32 1..10` leaf is simply never true).
    pub fn serialize_unchecked(&self, value: &TypedValue) -> Result<Value, CodecError> {
        self.to_generic(&self.ty, value, false)
    }

    /// Deserializes a generic value.
    pub fn deserialize(&self, value: &Value) -> Result<TypedValue, CodecError> {
        self.from_generic(&self.ty, value)
    }

    fn mismatch(&self, ty: &TypeDefinition, found: &str) -> CodecError {
        CodecError::SchemaMismatch(format!(
            "{}: expected {}, found {found}",
            self.leaf,
            ty.name()
        ))
    }

    fn violation(&self, reason: String) -> CodecError {
        CodecError::ConstraintViolation {
            leaf: self.leaf.clone(),
            reason,
        }
    }

    fn to_generic(
        &self,
        ty: &TypeDefinition,
        value: &TypedValue,
        check: bool,
    ) -> Result<Value, CodecError> {
        if let TypeDefinition::Union(members) = ty {
            return self.union_to_generic(members, value, check);
        }
        let out = match (ty, value) {
            (TypeDefinition::Boolean, TypedValue::Boolean(b)) => Value::Boolean(*b),
            (TypeDefinition::Empty, TypedValue::Empty) => Value::Empty,
            (TypeDefinition::Integer { kind, .. }, v) if v.as_i128().is_some() => {
                let n = v.as_i128().unwrap_or_default();
                kind.value_of(n).ok_or_else(|| {
                    self.violation(format!("{n} does not fit {}", kind.name()))
                })?
            }
            (TypeDefinition::String { .. }, TypedValue::String(s)) => Value::String(s.clone()),
            (TypeDefinition::Binary { .. }, TypedValue::Binary(b)) => Value::Binary(b.clone()),
            (TypeDefinition::Enumeration(pairs), TypedValue::Enumeration(v)) => pairs
                .iter()
                .find(|p| p.value == *v)
                .map(|p| Value::String(p.name.clone()))
                .ok_or_else(|| self.violation(format!("{v} is not an enumeration member")))?,
            (TypeDefinition::IdentityRef { base }, TypedValue::Identity(class)) => {
                let qname = self.schema.identity_by_class(*class).ok_or_else(|| {
                    CodecError::SchemaMismatch(format!("identity class {class} is not in the schema"))
                })?;
                if !self.schema.is_derived_from(qname, base) {
                    return Err(self.violation(format!("{qname} is not derived from {base}")));
                }
                Value::QName(qname.clone())
            }
            (ty, v) => return Err(self.mismatch(ty, v.kind_name())),
        };
        if check {
            ty.check_restrictions(&out).map_err(|reason| self.violation(reason))?;
        }
        Ok(out)
    }

    fn union_to_generic(
        &self,
        members: &[TypeDefinition],
        value: &TypedValue,
        check: bool,
    ) -> Result<Value, CodecError> {
        if let TypedValue::Union { member, value } = value {
            let ty = members.get(*member).ok_or_else(|| {
                CodecError::SchemaMismatch(format!(
                    "{}: union has no member {member}",
                    self.leaf
                ))
            })?;
            return self.to_generic(ty, value, check);
        }
        let mut last = None;
        for ty in members {
            match self.to_generic(ty, value, check) {
                Ok(v) => return Ok(v),
                Err(e) => last = Some(e),
            }
        }
        Err(last.unwrap_or_else(|| self.mismatch(&TypeDefinition::Union(Vec::new()), value.kind_name())))
    }

    fn from_generic(&self, ty: &TypeDefinition, value: &Value) -> Result<TypedValue, CodecError> {
        let malformed = || {
            CodecError::Deserialization(format!(
                "{}: {} is not a valid {}",
                self.leaf,
                value.kind_name(),
                ty.name()
            ))
        };
        match (ty, value) {
            (TypeDefinition::Boolean, Value::Boolean(b)) => Ok(TypedValue::Boolean(*b)),
            (TypeDefinition::Empty, Value::Empty) => Ok(TypedValue::Empty),
            (TypeDefinition::Integer { kind, .. }, v) if kind.matches(v) => {
                integer_to_typed(*kind, v).ok_or_else(malformed)
            }
            (TypeDefinition::String { .. }, Value::String(s)) => Ok(TypedValue::String(s.clone())),
            (TypeDefinition::Binary { .. }, Value::Binary(b)) => Ok(TypedValue::Binary(b.clone())),
            (TypeDefinition::Enumeration(pairs), Value::String(name)) => pairs
                .iter()
                .find(|p| &p.name == name)
                .map(|p| TypedValue::Enumeration(p.value))
                .ok_or_else(|| {
                    CodecError::Deserialization(format!(
                        "{}: \"{name}\" is not an enumeration member",
                        self.leaf
                    ))
                }),
            (TypeDefinition::IdentityRef { .. }, Value::QName(q)) => self
                .schema
                .identity(q)
                .map(|i| TypedValue::Identity(i.class))
                .ok_or_else(|| {
                    CodecError::Deserialization(format!("{}: unknown identity {q}", self.leaf))
                }),
            (TypeDefinition::Union(members), v) => members
                .iter()
                .enumerate()
                .find_map(|(i, member)| {
                    let typed = self.from_generic(member, v).ok()?;
                    self.member_accepts(member, v).then(|| TypedValue::Union {
                        member: i,
                        value: Box::new(typed),
                    })
                })
                .ok_or_else(|| {
                    CodecError::Deserialization(format!(
                        "{}: no union member accepts {v}",
                        self.leaf
                    ))
                }),
            _ => Err(malformed()),
        }
    }

    fn member_accepts(&self, member: &TypeDefinition, value: &Value) -> bool {
        match member {
            TypeDefinition::Union(_) => true,
            other => other.check_restrictions(value).is_ok(),
        }
    }
}

fn integer_to_typed(kind: IntegerKind, value: &Value) -> Option<TypedValue> {
    Some(match (kind, value) {
        (IntegerKind::Int8, Value::Int8(v)) => TypedValue::Int8(*v),
        (IntegerKind::Int16, Value::Int16(v)) => TypedValue::Int16(*v),
        (IntegerKind::Int32, Value::Int32(v)) => TypedValue::Int32(*v),
        (IntegerKind::Int64, Value::Int64(v)) => TypedValue::Int64(*v),
        (IntegerKind::Uint8, Value::Uint8(v)) => TypedValue::Uint8(*v),
        (IntegerKind::Uint16, Value::Uint16(v)) => TypedValue::Uint16(*v),
        (IntegerKind::Uint32, Value::Uint32(v)) => TypedValue::Uint32(*v),
        (IntegerKind::Uint64, Value::Uint64(v)) => TypedValue::Uint64(*v),
        _ => return None,
    })
}

/// Converts list keys between [`ItemKey`] and generic predicates.
#[derive(Clone, Debug)]
pub struct KeyCodec {
    list: QName,
    leaves: Vec<ValueCodec>,
}

impl KeyCodec {
    /// Key codec for `list` with key leaf codecs in declaration order.
    pub fn new(list: QName, leaves: Vec<ValueCodec>) -> Self {
        Self { list, leaves }
    }

    /// Key leaf names in declaration order.
    pub fn leaf_names(&self) -> impl Iterator<Item = &QName> + '_ {
        self.leaves.iter().map(ValueCodec::leaf)
    }

    /// Serializes a typed key.
    pub fn to_predicates(&self, key: &ItemKey) -> Result<NodeIdentifierWithPredicates, CodecError> {
        let mut keys = std::collections::BTreeMap::new();
        for codec in &self.leaves {
            let component = key.get(codec.leaf().local_name()).ok_or_else(|| {
                CodecError::SchemaMismatch(format!(
                    "key {key} of {} lacks component {}",
                    self.list,
                    codec.leaf().local_name()
                ))
            })?;
            keys.insert(codec.leaf().clone(), codec.serialize(component)?);
        }
        Ok(NodeIdentifierWithPredicates::new(self.list.clone(), keys))
    }

    /// Deserializes generic predicates into a typed key.
    pub fn from_predicates(&self, predicates: &NodeIdentifierWithPredicates) -> Result<ItemKey, CodecError> {
        let mut key = ItemKey::new();
        for codec in &self.leaves {
            let value = predicates.key(codec.leaf()).ok_or_else(|| {
                CodecError::Deserialization(format!(
                    "{predicates} lacks key leaf {}",
                    codec.leaf()
                ))
            })?;
            key = key.with(codec.leaf().local_name(), codec.deserialize(value)?);
        }
        Ok(key)
    }
}
