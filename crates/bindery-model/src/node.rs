// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Generic nodes: the schema-agnostic tree every typed object maps onto.
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use indexmap::{IndexMap, IndexSet};

use crate::ident::QName;
use crate::path::{NodeIdentifierWithPredicates, PathArgument};
use crate::value::Value;

/// A node of a generic tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NormalizedNode {
    /// Single scalar.
    Leaf(LeafNode),
    /// Set of scalars (leaf-list).
    LeafSet(LeafSetNode),
    /// Container.
    Container(DataContainerNode),
    /// Choice wrapper; holds the children of the one populated case.
    Choice(DataContainerNode),
    /// Augmentation wrapper, identified by its child names.
    Augmentation(DataContainerNode),
    /// Keyed list.
    Map(MapNode),
    /// One keyed list entry.
    MapEntry(DataContainerNode),
    /// List without keys.
    UnkeyedList(UnkeyedListNode),
    /// One entry of a list without keys.
    UnkeyedListEntry(DataContainerNode),
    /// Opaque anydata/anyxml payload.
    Anydata(AnydataNode),
}

impl NormalizedNode {
    /// Shorthand for a leaf node.
    pub fn leaf(name: QName, value: impl Into<Value>) -> Self {
        NormalizedNode::Leaf(LeafNode::new(name, value))
    }

    /// The argument addressing this node from its parent.
    pub fn identifier(&self) -> PathArgument {
        match self {
            NormalizedNode::Leaf(n) => PathArgument::NodeId(n.name.clone()),
            NormalizedNode::LeafSet(n) => PathArgument::NodeId(n.name.clone()),
            NormalizedNode::Container(n)
            | NormalizedNode::Choice(n)
            | NormalizedNode::Augmentation(n)
            | NormalizedNode::MapEntry(n)
            | NormalizedNode::UnkeyedListEntry(n) => n.id.clone(),
            NormalizedNode::Map(n) => PathArgument::NodeId(n.name.clone()),
            NormalizedNode::UnkeyedList(n) => PathArgument::NodeId(n.name.clone()),
            NormalizedNode::Anydata(n) => PathArgument::NodeId(n.name.clone()),
        }
    }

    /// The container-like body of this node, if it has one.
    pub fn as_container(&self) -> Option<&DataContainerNode> {
        match self {
            NormalizedNode::Container(n)
            | NormalizedNode::Choice(n)
            | NormalizedNode::Augmentation(n)
            | NormalizedNode::MapEntry(n)
            | NormalizedNode::UnkeyedListEntry(n) => Some(n),
            _ => None,
        }
    }

    /// The leaf value, for leaf nodes.
    pub fn value(&self) -> Option<&Value> {
        match self {
            NormalizedNode::Leaf(n) => Some(&n.value),
            _ => None,
        }
    }

    /// Direct child addressed by `arg`.
    pub fn child(&self, arg: &PathArgument) -> Option<&NormalizedNode> {
        match (self, arg) {
            (NormalizedNode::Map(map), PathArgument::NodeWithPredicates(key)) => {
                map.entries.get(key)
            }
            (NormalizedNode::Map(_), _) => None,
            _ => self.as_container()?.children.get(arg),
        }
    }

    /// Descendant addressed by a relative sequence of arguments.
    pub fn find(&self, path: &[PathArgument]) -> Option<&NormalizedNode> {
        path.iter().try_fold(self, |node, arg| node.child(arg))
    }
}

/// A single scalar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafNode {
    name: QName,
    value: Value,
}

impl LeafNode {
    /// Creates a leaf.
    pub fn new(name: QName, value: impl Into<Value>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }

    /// Leaf name.
    pub fn name(&self) -> &QName {
        &self.name
    }

    /// Leaf value.
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// A leaf-list. User-ordered sets compare in order, others as sets.
#[derive(Clone, Debug)]
pub struct LeafSetNode {
    name: QName,
    ordered: bool,
    values: IndexSet<Value>,
}

impl LeafSetNode {
    /// Creates an empty leaf-set.
    pub fn new(name: QName, ordered: bool) -> Self {
        Self {
            name,
            ordered,
            values: IndexSet::new(),
        }
    }

    /// Adds a value, keeping insertion order; duplicates are ignored.
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.values.insert(value.into());
        self
    }

    /// Leaf-list name.
    pub fn name(&self) -> &QName {
        &self.name
    }

    /// True for `ordered-by user`.
    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// Values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &Value> + '_ {
        self.values.iter()
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the set has no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl PartialEq for LeafSetNode {
    fn eq(&self, other: &Self) -> bool {
        if self.name != other.name || self.ordered != other.ordered {
            return false;
        }
        if self.ordered {
            self.values.iter().eq(other.values.iter())
        } else {
            self.values == other.values
        }
    }
}

impl Eq for LeafSetNode {}

/// Body shared by containers, choices, augmentations and list entries.
///
/// Children are keyed by their path argument; equality does not depend on
/// insertion order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataContainerNode {
    id: PathArgument,
    children: BTreeMap<PathArgument, NormalizedNode>,
}

impl DataContainerNode {
    /// Creates an empty body with the given identifier.
    pub fn new(id: impl Into<PathArgument>) -> Self {
        Self {
            id: id.into(),
            children: BTreeMap::new(),
        }
    }

    /// Creates a body from a prepared child map.
    pub fn from_children(
        id: impl Into<PathArgument>,
        children: BTreeMap<PathArgument, NormalizedNode>,
    ) -> Self {
        Self {
            id: id.into(),
            children,
        }
    }

    /// Adds a child, replacing any child with the same identifier.
    pub fn with_child(mut self, child: NormalizedNode) -> Self {
        self.insert(child);
        self
    }

    /// Adds a child and returns the one it replaced.
    pub fn insert(&mut self, child: NormalizedNode) -> Option<NormalizedNode> {
        self.children.insert(child.identifier(), child)
    }

    /// Identifier of this node.
    pub fn id(&self) -> &PathArgument {
        &self.id
    }

    /// Children keyed by identifier.
    pub fn children(&self) -> &BTreeMap<PathArgument, NormalizedNode> {
        &self.children
    }

    /// Consumes the body and returns its children.
    pub fn into_children(self) -> BTreeMap<PathArgument, NormalizedNode> {
        self.children
    }

    /// Child addressed by `arg`.
    pub fn child(&self, arg: &PathArgument) -> Option<&NormalizedNode> {
        self.children.get(arg)
    }

    /// Child addressed by a plain node identifier.
    pub fn child_named(&self, name: &QName) -> Option<&NormalizedNode> {
        self.children.get(&PathArgument::NodeId(name.clone()))
    }

    /// Number of children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// True when there are no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// A keyed list. User-ordered lists compare in order, others as maps.
#[derive(Clone, Debug)]
pub struct MapNode {
    name: QName,
    ordered: bool,
    entries: IndexMap<NodeIdentifierWithPredicates, NormalizedNode>,
}

impl MapNode {
    /// Creates an empty list.
    pub fn new(name: QName, ordered: bool) -> Self {
        Self {
            name,
            ordered,
            entries: IndexMap::new(),
        }
    }

    /// Adds an entry; see [`MapNode::insert`].
    pub fn with_entry(mut self, key: NodeIdentifierWithPredicates, entry: DataContainerNode) -> Self {
        self.insert(key, entry);
        self
    }

    /// Adds an entry under `key`, replacing an entry with an equal key in place.
    ///
    /// The entry body is re-identified by `key`.
    pub fn insert(
        &mut self,
        key: NodeIdentifierWithPredicates,
        entry: DataContainerNode,
    ) -> Option<NormalizedNode> {
        let body = DataContainerNode {
            id: PathArgument::NodeWithPredicates(key.clone()),
            children: entry.children,
        };
        self.entries.insert(key, NormalizedNode::MapEntry(body))
    }

    /// List name.
    pub fn name(&self) -> &QName {
        &self.name
    }

    /// True for `ordered-by user`.
    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// Entry addressed by `key`.
    pub fn entry(&self, key: &NodeIdentifierWithPredicates) -> Option<&DataContainerNode> {
        self.entries.get(key).and_then(NormalizedNode::as_container)
    }

    /// Entries in insertion order, as generic nodes.
    pub fn entry_nodes(&self) -> impl Iterator<Item = (&NodeIdentifierWithPredicates, &NormalizedNode)> + '_ {
        self.entries.iter()
    }

    /// Entry bodies in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&NodeIdentifierWithPredicates, &DataContainerNode)> + '_ {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.as_container().map(|body| (k, body)))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for MapNode {
    fn eq(&self, other: &Self) -> bool {
        if self.name != other.name || self.ordered != other.ordered {
            return false;
        }
        if self.ordered {
            self.entries.iter().eq(other.entries.iter())
        } else {
            self.entries == other.entries
        }
    }
}

impl Eq for MapNode {}

/// A list without keys; entries are positional.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnkeyedListNode {
    name: QName,
    entries: Vec<NormalizedNode>,
}

impl UnkeyedListNode {
    /// Creates an empty list.
    pub fn new(name: QName) -> Self {
        Self {
            name,
            entries: Vec::new(),
        }
    }

    /// Appends an entry; see [`UnkeyedListNode::push`].
    pub fn with_entry(mut self, entry: DataContainerNode) -> Self {
        self.push(entry);
        self
    }

    /// Appends an entry, re-identified by the list name.
    pub fn push(&mut self, entry: DataContainerNode) {
        let body = DataContainerNode {
            id: PathArgument::NodeId(self.name.clone()),
            children: entry.children,
        };
        self.entries.push(NormalizedNode::UnkeyedListEntry(body));
    }

    /// List name.
    pub fn name(&self) -> &QName {
        &self.name
    }

    /// Entries in order, as generic nodes.
    pub fn entry_nodes(&self) -> impl Iterator<Item = &NormalizedNode> + '_ {
        self.entries.iter()
    }

    /// Entry bodies in order.
    pub fn entries(&self) -> impl Iterator<Item = &DataContainerNode> + '_ {
        self.entries.iter().filter_map(NormalizedNode::as_container)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An anydata or anyxml node carrying an opaque payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnydataNode {
    name: QName,
    payload: OpaquePayload,
}

impl AnydataNode {
    /// Creates the node.
    pub fn new(name: QName, payload: OpaquePayload) -> Self {
        Self { name, payload }
    }

    /// Node name.
    pub fn name(&self) -> &QName {
        &self.name
    }

    /// The payload, untouched.
    pub fn payload(&self) -> &OpaquePayload {
        &self.payload
    }
}

/// Body of an opaque payload, owned by its own object model.
///
/// Bindery never looks inside; equality and round-trips are delegated to the
/// implementation.
pub trait OpaqueBody: Any + Send + Sync + fmt::Debug {
    /// Identifier of the object model this body belongs to.
    fn object_model(&self) -> &'static str;
    /// Model-defined equality against another body of the same model.
    fn eq_body(&self, other: &dyn OpaqueBody) -> bool;
    /// Upcast for downcasting by callers that know the model.
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to an [`OpaqueBody`] tagged with its object model.
#[derive(Clone, Debug)]
pub struct OpaquePayload(Arc<dyn OpaqueBody>);

impl OpaquePayload {
    /// Wraps a model-specific body.
    pub fn new(body: impl OpaqueBody) -> Self {
        Self(Arc::new(body))
    }

    /// Wraps raw bytes under a named object model; equality is byte equality.
    pub fn raw(object_model: &'static str, bytes: impl Into<Bytes>) -> Self {
        Self::new(RawBody {
            object_model,
            bytes: bytes.into(),
        })
    }

    /// The object model identifier.
    pub fn object_model(&self) -> &'static str {
        self.0.object_model()
    }

    /// The body.
    pub fn body(&self) -> &dyn OpaqueBody {
        &*self.0
    }

    /// Downcasts the body to a concrete model type.
    pub fn downcast_ref<T: OpaqueBody>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Raw bytes, when the payload was created through [`OpaquePayload::raw`].
    pub fn raw_bytes(&self) -> Option<&Bytes> {
        self.downcast_ref::<RawBody>().map(|b| &b.bytes)
    }
}

impl PartialEq for OpaquePayload {
    fn eq(&self, other: &Self) -> bool {
        self.object_model() == other.object_model() && self.0.eq_body(&*other.0)
    }
}

impl Eq for OpaquePayload {}

#[derive(Debug)]
struct RawBody {
    object_model: &'static str,
    bytes: Bytes,
}

impl OpaqueBody for RawBody {
    fn object_model(&self) -> &'static str {
        self.object_model
    }

    fn eq_body(&self, other: &dyn OpaqueBody) -> bool {
        other
            .as_any()
            .downcast_ref::<RawBody>()
            .is_some_and(|o| o.bytes == self.bytes)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
