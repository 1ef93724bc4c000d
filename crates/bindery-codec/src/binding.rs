// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed-object contract.
//!
//! Typed classes are ordinary Rust structs. They expose their children
//! through a name-keyed accessor table ([`DataObject::field`]) and are rebuilt
//! from a [`FieldSet`] by [`BindingClass::from_fields`]. Field names are the
//! local names of the schema children.
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use bindery_model::{ClassId, OpaquePayload};
use bytes::Bytes;
use thiserror::Error;

/// Structural equality across type-erased objects.
///
/// Implemented for every `PartialEq` type; two objects are equal only when
/// they have the same concrete type.
pub trait ObjectEq {
    /// Compares `self` against a type-erased value.
    fn eq_object(&self, other: &dyn Any) -> bool;
}

impl<T: Any + PartialEq> ObjectEq for T {
    fn eq_object(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<T>().is_some_and(|o| self == o)
    }
}

/// An immutable typed node: a container, list entry, case or augmentation.
pub trait DataObject: ObjectEq + Any + fmt::Debug + Send + Sync {
    /// Class this object implements.
    fn implemented_class(&self) -> ClassId;

    /// Value of the child named `name`, or `None` when absent.
    fn field(&self, name: &str) -> Option<FieldValue>;

    /// Augmentations present on this object.
    fn augmentations(&self) -> Vec<Arc<dyn DataObject>> {
        Vec::new()
    }
}

impl PartialEq for dyn DataObject {
    fn eq(&self, other: &Self) -> bool {
        self.eq_object(as_any(other))
    }
}

impl dyn DataObject {
    /// Downcasts to a concrete class.
    pub fn downcast_ref<T: DataObject>(&self) -> Option<&T> {
        as_any(self).downcast_ref::<T>()
    }
}

pub(crate) fn as_any(obj: &dyn DataObject) -> &dyn Any {
    obj
}

/// Clones a type-erased object into its concrete class.
pub fn downcast_object<T: BindingClass>(obj: &dyn DataObject) -> Result<T, BindingError> {
    obj.downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| BindingError::UnexpectedClass {
            expected: T::CLASS,
            found: obj.implemented_class(),
        })
}

/// Structural role of a typed class.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ClassKind {
    /// A `container`.
    Container,
    /// One entry of a `list`.
    ListEntry,
    /// A `case` of a choice.
    Case,
    /// The interface shared by the cases of a choice; never instantiated.
    Choice,
    /// An `augment`.
    Augmentation,
    /// Operation input.
    Input,
    /// Operation output.
    Output,
}

/// A concrete typed class with a static identity.
pub trait BindingClass: DataObject + Clone + PartialEq + Sized {
    /// Class identity, as bound in the schema.
    const CLASS: ClassId;
    /// Structural role.
    const KIND: ClassKind;

    /// Rebuilds an instance from deserialized children.
    fn from_fields(fields: &mut FieldSet) -> Result<Self, BindingError>;
}

/// List entries addressed by a key.
pub trait Identifiable: BindingClass {
    /// Typed key.
    type Key: Into<ItemKey> + Clone;

    /// Key of this entry.
    fn key(&self) -> Self::Key;
}

/// A typed scalar.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypedValue {
    /// `boolean`
    Boolean(bool),
    /// `int8`
    Int8(i8),
    /// `int16`
    Int16(i16),
    /// `int32`
    Int32(i32),
    /// `int64`
    Int64(i64),
    /// `uint8`
    Uint8(u8),
    /// `uint16`
    Uint16(u16),
    /// `uint32`
    Uint32(u32),
    /// `uint64`
    Uint64(u64),
    /// `string`
    String(String),
    /// `binary`
    Binary(Bytes),
    /// `empty`
    Empty,
    /// Enumeration member by assigned value.
    Enumeration(i32),
    /// Identity by class.
    Identity(ClassId),
    /// A union value tagged with the member type that carries it.
    Union {
        /// Index of the member type in declaration order.
        member: usize,
        /// The member value.
        value: Box<TypedValue>,
    },
}

impl TypedValue {
    /// Integer payload widened to `i128`.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            TypedValue::Int8(v) => Some(i128::from(*v)),
            TypedValue::Int16(v) => Some(i128::from(*v)),
            TypedValue::Int32(v) => Some(i128::from(*v)),
            TypedValue::Int64(v) => Some(i128::from(*v)),
            TypedValue::Uint8(v) => Some(i128::from(*v)),
            TypedValue::Uint16(v) => Some(i128::from(*v)),
            TypedValue::Uint32(v) => Some(i128::from(*v)),
            TypedValue::Uint64(v) => Some(i128::from(*v)),
            _ => None,
        }
    }

    /// Short name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            TypedValue::Boolean(_) => "boolean",
            TypedValue::Int8(_) => "int8",
            TypedValue::Int16(_) => "int16",
            TypedValue::Int32(_) => "int32",
            TypedValue::Int64(_) => "int64",
            TypedValue::Uint8(_) => "uint8",
            TypedValue::Uint16(_) => "uint16",
            TypedValue::Uint32(_) => "uint32",
            TypedValue::Uint64(_) => "uint64",
            TypedValue::String(_) => "string",
            TypedValue::Binary(_) => "binary",
            TypedValue::Empty => "empty",
            TypedValue::Enumeration(_) => "enumeration",
            TypedValue::Identity(_) => "identity",
            TypedValue::Union { .. } => "union",
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Boolean(v) => write!(f, "{v}"),
            TypedValue::String(v) => f.write_str(v),
            TypedValue::Binary(v) => f.write_str(&hex::encode(v)),
            TypedValue::Empty => f.write_str("empty"),
            TypedValue::Enumeration(v) => write!(f, "enum({v})"),
            TypedValue::Identity(c) => write!(f, "{c}"),
            TypedValue::Union { value, .. } => write!(f, "{value}"),
            other => match other.as_i128() {
                Some(n) => write!(f, "{n}"),
                None => f.write_str(other.kind_name()),
            },
        }
    }
}

/// Conversion between a Rust leaf type and [`TypedValue`].
pub trait LeafValue: Sized {
    /// Wraps the value.
    fn into_typed(self) -> TypedValue;
    /// Unwraps a value of the matching variant.
    fn from_typed(value: TypedValue) -> Option<Self>;
}

/// Leaf types with a total natural order (integers).
pub trait Comparable: LeafValue {}

macro_rules! leaf_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl LeafValue for $ty {
            fn into_typed(self) -> TypedValue {
                TypedValue::$variant(self)
            }

            fn from_typed(value: TypedValue) -> Option<Self> {
                match value {
                    TypedValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    )*};
}

leaf_value!(
    bool => Boolean,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => Uint8,
    u16 => Uint16,
    u32 => Uint32,
    u64 => Uint64,
    String => String,
    Bytes => Binary,
    ClassId => Identity,
);

impl Comparable for i8 {}
impl Comparable for i16 {}
impl Comparable for i32 {}
impl Comparable for i64 {}
impl Comparable for u8 {}
impl Comparable for u16 {}
impl Comparable for u32 {}
impl Comparable for u64 {}

/// Value of a YANG `empty` leaf.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Empty;

impl LeafValue for Empty {
    fn into_typed(self) -> TypedValue {
        TypedValue::Empty
    }

    fn from_typed(value: TypedValue) -> Option<Self> {
        matches!(value, TypedValue::Empty).then_some(Empty)
    }
}

impl LeafValue for TypedValue {
    fn into_typed(self) -> TypedValue {
        self
    }

    fn from_typed(value: TypedValue) -> Option<Self> {
        Some(value)
    }
}

/// Value of one child, as exposed by [`DataObject::field`].
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// A leaf.
    Leaf(TypedValue),
    /// A leaf-list, in order.
    LeafList(Vec<TypedValue>),
    /// A container, or the populated case of a choice.
    Object(Arc<dyn DataObject>),
    /// The entries of a list, in order.
    List(Vec<Arc<dyn DataObject>>),
    /// An anydata or anyxml payload.
    Opaque(OpaquePayload),
}

impl FieldValue {
    /// Wraps a leaf value.
    pub fn leaf(value: impl LeafValue) -> Self {
        FieldValue::Leaf(value.into_typed())
    }

    /// Wraps leaf-list values.
    pub fn leaf_list<V: LeafValue>(values: impl IntoIterator<Item = V>) -> Self {
        FieldValue::LeafList(values.into_iter().map(LeafValue::into_typed).collect())
    }

    /// Wraps a child object.
    pub fn object(value: impl DataObject) -> Self {
        FieldValue::Object(Arc::new(value))
    }

    /// Wraps list entries.
    pub fn list<T: DataObject + Clone>(entries: &[T]) -> Self {
        FieldValue::List(
            entries
                .iter()
                .map(|e| Arc::new(e.clone()) as Arc<dyn DataObject>)
                .collect(),
        )
    }

    pub(crate) fn shape(&self) -> &'static str {
        match self {
            FieldValue::Leaf(_) => "leaf",
            FieldValue::LeafList(_) => "leaf-list",
            FieldValue::Object(_) => "object",
            FieldValue::List(_) => "list",
            FieldValue::Opaque(_) => "opaque",
        }
    }
}

/// Deserialized children handed to [`BindingClass::from_fields`].
#[derive(Debug)]
pub struct FieldSet {
    class: ClassId,
    fields: BTreeMap<String, FieldValue>,
    augmentations: Vec<Arc<dyn DataObject>>,
}

impl FieldSet {
    /// Empty set for `class`.
    pub fn new(class: ClassId) -> Self {
        Self {
            class,
            fields: BTreeMap::new(),
            augmentations: Vec::new(),
        }
    }

    /// Class being constructed.
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Adds a field, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(name.into(), value)
    }

    /// True when the field is present.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Adds an augmentation.
    pub fn push_augmentation(&mut self, augmentation: Arc<dyn DataObject>) {
        self.augmentations.push(augmentation);
    }

    /// Removes and returns a raw field.
    pub fn take(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    fn shape_error(&self, field: &str, expected: &'static str, found: &'static str) -> BindingError {
        BindingError::FieldShape {
            class: self.class,
            field: field.to_owned(),
            expected,
            found,
        }
    }

    fn missing(&self, field: &str) -> BindingError {
        BindingError::MissingField {
            class: self.class,
            field: field.to_owned(),
        }
    }

    /// Takes an optional leaf.
    pub fn leaf<V: LeafValue>(&mut self, name: &str) -> Result<Option<V>, BindingError> {
        match self.fields.remove(name) {
            None => Ok(None),
            Some(FieldValue::Leaf(v)) => {
                let found = v.kind_name();
                V::from_typed(v)
                    .map(Some)
                    .ok_or_else(|| self.shape_error(name, "a different leaf type", found))
            }
            Some(other) => Err(self.shape_error(name, "leaf", other.shape())),
        }
    }

    /// Takes a leaf that must be present.
    pub fn required_leaf<V: LeafValue>(&mut self, name: &str) -> Result<V, BindingError> {
        self.leaf(name)?.ok_or_else(|| self.missing(name))
    }

    /// Takes a leaf-list; absent means empty.
    pub fn leaf_list<V: LeafValue>(&mut self, name: &str) -> Result<Vec<V>, BindingError> {
        match self.fields.remove(name) {
            None => Ok(Vec::new()),
            Some(FieldValue::LeafList(values)) => values
                .into_iter()
                .map(|v| {
                    let found = v.kind_name();
                    V::from_typed(v).ok_or_else(|| self.shape_error(name, "a different leaf type", found))
                })
                .collect(),
            Some(other) => Err(self.shape_error(name, "leaf-list", other.shape())),
        }
    }

    /// Takes a child object of any class.
    pub fn dyn_object(&mut self, name: &str) -> Result<Option<Arc<dyn DataObject>>, BindingError> {
        match self.fields.remove(name) {
            None => Ok(None),
            Some(FieldValue::Object(obj)) => Ok(Some(obj)),
            Some(other) => Err(self.shape_error(name, "object", other.shape())),
        }
    }

    /// Takes a child object of class `T`.
    pub fn object<T: BindingClass>(&mut self, name: &str) -> Result<Option<T>, BindingError> {
        self.dyn_object(name)?
            .map(|obj| downcast_object::<T>(obj.as_ref()))
            .transpose()
    }

    /// Takes list entries of class `T`; absent means empty.
    pub fn list<T: BindingClass>(&mut self, name: &str) -> Result<Vec<T>, BindingError> {
        match self.fields.remove(name) {
            None => Ok(Vec::new()),
            Some(FieldValue::List(entries)) => entries
                .iter()
                .map(|e| downcast_object::<T>(e.as_ref()))
                .collect(),
            Some(other) => Err(self.shape_error(name, "list", other.shape())),
        }
    }

    /// Takes an opaque payload.
    pub fn opaque(&mut self, name: &str) -> Result<Option<OpaquePayload>, BindingError> {
        match self.fields.remove(name) {
            None => Ok(None),
            Some(FieldValue::Opaque(p)) => Ok(Some(p)),
            Some(other) => Err(self.shape_error(name, "opaque", other.shape())),
        }
    }

    /// Takes the augmentations.
    pub fn augmentations(&mut self) -> Augmentations {
        let mut out = Augmentations::new();
        for aug in self.augmentations.drain(..) {
            out.insert(aug);
        }
        out
    }
}

/// Augmentations carried by an augmentable object, keyed by class.
///
/// Equality does not depend on insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Augmentations(BTreeMap<ClassId, Arc<dyn DataObject>>);

impl Augmentations {
    /// No augmentations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an augmentation, replacing one of the same class.
    pub fn insert(&mut self, augmentation: Arc<dyn DataObject>) -> Option<Arc<dyn DataObject>> {
        self.0.insert(augmentation.implemented_class(), augmentation)
    }

    /// Builder-style [`Augmentations::insert`].
    pub fn with<A: BindingClass>(mut self, augmentation: A) -> Self {
        self.insert(Arc::new(augmentation));
        self
    }

    /// Augmentation of class `A`.
    pub fn get<A: BindingClass>(&self) -> Option<&A> {
        self.0.get(&A::CLASS).and_then(|a| a.downcast_ref::<A>())
    }

    /// All augmentations, ordered by class.
    pub fn to_vec(&self) -> Vec<Arc<dyn DataObject>> {
        self.0.values().cloned().collect()
    }

    /// Number of augmentations.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when none are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A list-entry key: key leaf local names to typed values.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ItemKey(BTreeMap<String, TypedValue>);

impl ItemKey {
    /// Empty key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key component.
    pub fn with(mut self, leaf: &str, value: impl LeafValue) -> Self {
        self.0.insert(leaf.to_owned(), value.into_typed());
        self
    }

    /// Key component for `leaf`.
    pub fn get(&self, leaf: &str) -> Option<&TypedValue> {
        self.0.get(leaf)
    }

    /// Components ordered by leaf name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypedValue)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("]")
    }
}

/// Typed accessor for leaf `name` of class `T`, carrying value type `V`.
pub struct LeafRef<T, V> {
    name: &'static str,
    _marker: PhantomData<fn(&T) -> V>,
}

impl<T, V> LeafRef<T, V> {
    /// Accessor for the leaf with local name `name`.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Local name of the leaf.
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T, V> Clone for LeafRef<T, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, V> Copy for LeafRef<T, V> {}

impl<T, V> fmt::Debug for LeafRef<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LeafRef").field(&self.name).finish()
    }
}

/// Errors raised by typed-class constructors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BindingError {
    /// A required child was absent.
    #[error("[BINDING_MISSING_FIELD] {class}: required field `{field}` is absent")]
    MissingField {
        /// Class under construction.
        class: ClassId,
        /// Field name.
        field: String,
    },
    /// A child had the wrong shape or type.
    #[error("[BINDING_FIELD_SHAPE] {class}: field `{field}` expected {expected}, found {found}")]
    FieldShape {
        /// Class under construction.
        class: ClassId,
        /// Field name.
        field: String,
        /// Expected shape.
        expected: &'static str,
        /// Found shape.
        found: &'static str,
    },
    /// An object was not of the expected class.
    #[error("[BINDING_UNEXPECTED_CLASS] expected {expected}, found {found}")]
    UnexpectedClass {
        /// Expected class.
        expected: ClassId,
        /// Actual class.
        found: ClassId,
    },
}
