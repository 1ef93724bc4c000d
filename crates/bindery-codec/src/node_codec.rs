// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Node codecs: one per bound schema location.
//!
//! A [`NodeCodec`] knows how the children of one container, list entry,
//! case or augmentation map onto fields of its typed class. Child codecs are
//! resolved through the context's cache on first use, so building a codec
//! never builds its whole subtree.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

use bindery_model::{
    AnydataNode, ClassId, DataContainerNode, LeafSetNode, MapNode, NodeIdentifierWithPredicates,
    NormalizedNode, PathArgument, QName, SchemaIndex, SchemaKind, SchemaNodeId, UnkeyedListNode,
};
use tracing::debug;

use crate::binding::{ClassKind, DataObject, FieldSet, FieldValue, ItemKey};
use crate::context::BindingCodecContext;
use crate::error::CodecError;
use crate::identifier::PathStep;
use crate::registry::ErasedClass;
use crate::value_codec::{KeyCodec, ValueCodec};

/// Structural role of a node codec, and therefore of the generic node it
/// produces.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CodecKind {
    /// Produces a container node.
    Container,
    /// Produces a keyed list entry.
    KeyedEntry,
    /// Produces an unkeyed list entry.
    UnkeyedEntry,
    /// Produces the choice node holding the case's children.
    Case,
    /// Produces an augmentation node.
    Augmentation,
    /// Produces an operation input container.
    Input,
    /// Produces an operation output container.
    Output,
}

/// How the children of a codec can be reached by typed paths.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ChildAddressability {
    /// Every child is a container, keyed list or augmentation.
    Addressable,
    /// No child is addressable.
    Unaddressable,
    /// Both kinds are present.
    Mixed,
}

/// Lazily resolved reference to the codec of another location.
pub(crate) struct ChildCodec {
    location: SchemaNodeId,
    resolved: OnceLock<Arc<NodeCodec>>,
}

impl ChildCodec {
    fn new(location: SchemaNodeId) -> Self {
        Self {
            location,
            resolved: OnceLock::new(),
        }
    }

    pub(crate) fn location(&self) -> SchemaNodeId {
        self.location
    }

    pub(crate) fn get(&self, ctx: &BindingCodecContext) -> Result<Arc<NodeCodec>, CodecError> {
        if let Some(codec) = self.resolved.get() {
            return Ok(Arc::clone(codec));
        }
        let codec = ctx.codec_at(self.location)?;
        Ok(Arc::clone(self.resolved.get_or_init(|| codec)))
    }
}

impl fmt::Debug for ChildCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildCodec")
            .field("location", &self.location)
            .field("resolved", &self.resolved.get().is_some())
            .finish()
    }
}

#[derive(Debug)]
enum ChildShape {
    Leaf(ValueCodec),
    LeafList { codec: ValueCodec, ordered: bool },
    Container(ChildCodec),
    List { codec: ChildCodec, keyed: bool, ordered: bool },
    Choice { location: SchemaNodeId, cases: Vec<ChildCodec> },
    Opaque,
}

impl ChildShape {
    fn name(&self) -> &'static str {
        match self {
            ChildShape::Leaf(_) => "leaf",
            ChildShape::LeafList { .. } => "leaf-list",
            ChildShape::Container(_) => "container",
            ChildShape::List { .. } => "list",
            ChildShape::Choice { .. } => "choice",
            ChildShape::Opaque => "opaque",
        }
    }
}

#[derive(Debug)]
struct ChildBinding {
    name: String,
    qname: QName,
    shape: ChildShape,
}

#[derive(Debug)]
struct AugmentationBinding {
    names: BTreeSet<QName>,
    codec: ChildCodec,
}

/// Codec for one bound schema location.
pub struct NodeCodec {
    location: SchemaNodeId,
    kind: CodecKind,
    identifier: PathArgument,
    class: ClassId,
    constructor: Arc<dyn ErasedClass>,
    children: Vec<ChildBinding>,
    augmentations: Vec<AugmentationBinding>,
    key: Option<KeyCodec>,
    addressability: ChildAddressability,
}

impl NodeCodec {
    pub(crate) fn build(ctx: &BindingCodecContext, location: SchemaNodeId) -> Result<Self, CodecError> {
        let schema = ctx.schema();
        let fail = |reason: String| CodecError::ConstructionFailure {
            location: schema.describe(location),
            reason,
        };
        let (kind, expected) = match schema.kind(location) {
            SchemaKind::Container => (CodecKind::Container, ClassKind::Container),
            SchemaKind::List { keys, .. } if keys.is_empty() => {
                (CodecKind::UnkeyedEntry, ClassKind::ListEntry)
            }
            SchemaKind::List { .. } => (CodecKind::KeyedEntry, ClassKind::ListEntry),
            SchemaKind::Case => (CodecKind::Case, ClassKind::Case),
            SchemaKind::Augmentation { .. } => (CodecKind::Augmentation, ClassKind::Augmentation),
            SchemaKind::Input => (CodecKind::Input, ClassKind::Input),
            SchemaKind::Output => (CodecKind::Output, ClassKind::Output),
            other => {
                return Err(fail(format!("a {} has no typed representation", other.name())));
            }
        };
        let class = schema
            .canonical_class(location)
            .ok_or_else(|| fail("no class is bound here".to_owned()))?;
        let constructor = ctx
            .classes()
            .get(class)
            .cloned()
            .ok_or_else(|| fail(format!("class {class} is not registered")))?;
        if constructor.kind() != expected {
            return Err(fail(format!(
                "class {class} is registered as {:?}, expected {expected:?}",
                constructor.kind()
            )));
        }

        let identifier = match kind {
            CodecKind::Augmentation => {
                PathArgument::AugmentationId(schema.augmentation_child_names(location))
            }
            CodecKind::Case => schema
                .parent(location)
                .and_then(|choice| schema.qname(choice))
                .cloned()
                .map(PathArgument::NodeId)
                .ok_or_else(|| fail("case outside a choice".to_owned()))?,
            _ => schema
                .qname(location)
                .cloned()
                .map(PathArgument::NodeId)
                .ok_or_else(|| fail("unnamed node".to_owned()))?,
        };

        let children: Vec<ChildBinding> = schema
            .children(location)
            .iter()
            .filter_map(|c| child_binding(schema, *c))
            .collect();

        let key = match schema.kind(location) {
            SchemaKind::List { keys, .. } if !keys.is_empty() => {
                let mut leaves = Vec::with_capacity(keys.len());
                for k in keys {
                    let codec = children.iter().find_map(|b| match &b.shape {
                        ChildShape::Leaf(codec) if &b.qname == k => Some(codec.clone()),
                        _ => None,
                    });
                    leaves.push(codec.ok_or_else(|| fail(format!("key leaf {k} is missing")))?);
                }
                let list = schema.qname(location).cloned().ok_or_else(|| fail("unnamed list".to_owned()))?;
                Some(KeyCodec::new(list, leaves))
            }
            _ => None,
        };

        let augmentations = schema
            .augmentations(location)
            .map(|aug| AugmentationBinding {
                names: schema.augmentation_child_names(aug),
                codec: ChildCodec::new(aug),
            })
            .collect();

        let addressability = summarize(schema, location);
        debug!(
            class = %class,
            location = %schema.describe(location),
            children = children.len(),
            "built node codec"
        );
        Ok(Self {
            location,
            kind,
            identifier,
            class,
            constructor,
            children,
            augmentations,
            key,
            addressability,
        })
    }

    /// Schema location this codec serves.
    pub fn location(&self) -> SchemaNodeId {
        self.location
    }

    /// Structural role.
    pub fn kind(&self) -> CodecKind {
        self.kind
    }

    /// Canonical class produced by deserialization.
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Addressability of the children, used to classify subtree changes.
    pub fn child_addressability(&self) -> ChildAddressability {
        self.addressability
    }

    /// Key codec of a keyed list entry.
    pub fn key_codec(&self) -> Option<&KeyCodec> {
        self.key.as_ref()
    }

    /// Codec of the direct leaf or leaf-list child with local name `name`.
    pub fn leaf(&self, name: &str) -> Option<&ValueCodec> {
        self.children.iter().find_map(|b| match &b.shape {
            ChildShape::Leaf(codec) | ChildShape::LeafList { codec, .. } if b.name == name => {
                Some(codec)
            }
            _ => None,
        })
    }

    fn check_class(&self, ctx: &BindingCodecContext, obj: &dyn DataObject) -> Result<(), CodecError> {
        let class = obj.implemented_class();
        if ctx.schema().is_bound(self.location, class) {
            Ok(())
        } else {
            Err(CodecError::SchemaMismatch(format!(
                "{class} cannot be stored at {}",
                ctx.schema().describe(self.location)
            )))
        }
    }

    /// Serializes `obj` into the generic node this codec produces.
    pub fn serialize(&self, ctx: &BindingCodecContext, obj: &dyn DataObject) -> Result<NormalizedNode, CodecError> {
        self.check_class(ctx, obj)?;
        let children = self.serialize_children(ctx, obj)?;
        Ok(match self.kind {
            CodecKind::Container | CodecKind::Input | CodecKind::Output => NormalizedNode::Container(
                DataContainerNode::from_children(self.identifier.clone(), children),
            ),
            CodecKind::KeyedEntry => {
                let key = self.entry_key(&children)?;
                NormalizedNode::MapEntry(DataContainerNode::from_children(key, children))
            }
            CodecKind::UnkeyedEntry => NormalizedNode::UnkeyedListEntry(
                DataContainerNode::from_children(self.identifier.clone(), children),
            ),
            CodecKind::Case => NormalizedNode::Choice(DataContainerNode::from_children(
                self.identifier.clone(),
                children,
            )),
            CodecKind::Augmentation => NormalizedNode::Augmentation(
                DataContainerNode::from_children(self.identifier.clone(), children),
            ),
        })
    }

    fn serialize_keyed_entry(
        &self,
        ctx: &BindingCodecContext,
        obj: &dyn DataObject,
    ) -> Result<(NodeIdentifierWithPredicates, DataContainerNode), CodecError> {
        self.check_class(ctx, obj)?;
        let children = self.serialize_children(ctx, obj)?;
        let key = self.entry_key(&children)?;
        Ok((key.clone(), DataContainerNode::from_children(key, children)))
    }

    fn serialize_unkeyed_entry(
        &self,
        ctx: &BindingCodecContext,
        obj: &dyn DataObject,
    ) -> Result<DataContainerNode, CodecError> {
        self.check_class(ctx, obj)?;
        let children = self.serialize_children(ctx, obj)?;
        Ok(DataContainerNode::from_children(self.identifier.clone(), children))
    }

    fn serialize_children(
        &self,
        ctx: &BindingCodecContext,
        obj: &dyn DataObject,
    ) -> Result<BTreeMap<PathArgument, NormalizedNode>, CodecError> {
        let mut out = BTreeMap::new();
        for binding in &self.children {
            let Some(value) = obj.field(&binding.name) else {
                continue;
            };
            if let Some(node) = binding.serialize(ctx, self.class, value)? {
                out.insert(node.identifier(), node);
            }
        }
        for aug in obj.augmentations() {
            let codec = self.augmentation_codec(ctx, aug.implemented_class())?;
            let node = codec.serialize(ctx, aug.as_ref())?;
            out.insert(node.identifier(), node);
        }
        Ok(out)
    }

    fn augmentation_codec(&self, ctx: &BindingCodecContext, class: ClassId) -> Result<Arc<NodeCodec>, CodecError> {
        self.augmentations
            .iter()
            .find(|a| ctx.schema().is_bound(a.codec.location(), class))
            .ok_or_else(|| {
                CodecError::SchemaMismatch(format!(
                    "{class} does not augment {}",
                    ctx.schema().describe(self.location)
                ))
            })?
            .codec
            .get(ctx)
    }

    fn entry_key(
        &self,
        children: &BTreeMap<PathArgument, NormalizedNode>,
    ) -> Result<NodeIdentifierWithPredicates, CodecError> {
        let (Some(key), PathArgument::NodeId(list)) = (&self.key, &self.identifier) else {
            return Err(CodecError::SchemaMismatch(format!("{} is not a keyed list entry", self.class)));
        };
        let mut keys = BTreeMap::new();
        for leaf in key.leaf_names() {
            let value = children
                .get(&PathArgument::NodeId(leaf.clone()))
                .and_then(NormalizedNode::value)
                .ok_or_else(|| {
                    CodecError::SchemaMismatch(format!("{}: key leaf {leaf} is absent", self.class))
                })?;
            keys.insert(leaf.clone(), value.clone());
        }
        Ok(NodeIdentifierWithPredicates::new(list.clone(), keys))
    }

    /// Deserializes a generic node of the shape this codec produces.
    pub fn deserialize(&self, ctx: &BindingCodecContext, node: &NormalizedNode) -> Result<Arc<dyn DataObject>, CodecError> {
        let body = match (self.kind, node) {
            (
                CodecKind::Container | CodecKind::Input | CodecKind::Output,
                NormalizedNode::Container(body),
            )
            | (CodecKind::KeyedEntry, NormalizedNode::MapEntry(body))
            | (CodecKind::UnkeyedEntry, NormalizedNode::UnkeyedListEntry(body))
            | (CodecKind::Case, NormalizedNode::Choice(body))
            | (CodecKind::Augmentation, NormalizedNode::Augmentation(body)) => body,
            _ => {
                return Err(CodecError::Deserialization(format!(
                    "{} cannot be read from node {}",
                    self.class,
                    node.identifier()
                )));
            }
        };
        self.deserialize_body(ctx, body)
    }

    pub(crate) fn deserialize_body(
        &self,
        ctx: &BindingCodecContext,
        body: &DataContainerNode,
    ) -> Result<Arc<dyn DataObject>, CodecError> {
        let mut fields = FieldSet::new(self.class);
        for (arg, child) in body.children() {
            if let PathArgument::AugmentationId(names) = arg {
                let aug = self
                    .augmentations
                    .iter()
                    .find(|a| &a.names == names)
                    .ok_or_else(|| {
                        CodecError::Deserialization(format!(
                            "{arg} is not a known augmentation of {}",
                            self.class
                        ))
                    })?;
                fields.push_augmentation(aug.codec.get(ctx)?.deserialize(ctx, child)?);
                continue;
            }
            let binding = arg
                .node_type()
                .and_then(|q| self.children.iter().find(|b| &b.qname == q))
                .ok_or_else(|| {
                    CodecError::Deserialization(format!("{arg} is not a child of {}", self.class))
                })?;
            if let Some(value) = binding.deserialize(ctx, self.class, child)? {
                fields.insert(binding.name.clone(), value);
            }
        }
        if let (Some(key), PathArgument::NodeWithPredicates(predicates)) = (&self.key, body.id()) {
            self.fill_key_leaves(key, predicates, &mut fields)?;
        }
        Ok(self.constructor.construct(&mut fields)?)
    }

    fn fill_key_leaves(
        &self,
        key: &KeyCodec,
        predicates: &NodeIdentifierWithPredicates,
        fields: &mut FieldSet,
    ) -> Result<(), CodecError> {
        for leaf in key.leaf_names() {
            let Some(binding) = self.children.iter().find(|b| &b.qname == leaf) else {
                continue;
            };
            if fields.contains(&binding.name) {
                continue;
            }
            if let (ChildShape::Leaf(codec), Some(value)) = (&binding.shape, predicates.key(leaf)) {
                fields.insert(binding.name.clone(), FieldValue::Leaf(codec.deserialize(value)?));
            }
        }
        Ok(())
    }

    /// Codec and typed step for a generic child argument.
    ///
    /// Looks through choices into their cases. Returns `None` for children
    /// without a typed projection (leaves, leaf-lists, opaque nodes, unkeyed
    /// lists) and for unknown arguments.
    pub(crate) fn resolve_child(
        &self,
        ctx: &BindingCodecContext,
        arg: &PathArgument,
    ) -> Result<Option<(Arc<NodeCodec>, PathStep)>, CodecError> {
        let name = match arg {
            PathArgument::AugmentationId(names) => {
                return match self.augmentations.iter().find(|a| &a.names == names) {
                    Some(aug) => {
                        let codec = aug.codec.get(ctx)?;
                        let step = ctx.path_step(codec.location, codec.class, None);
                        Ok(Some((codec, step)))
                    }
                    None => Ok(None),
                };
            }
            PathArgument::NodeWithValue(..) => return Ok(None),
            PathArgument::NodeId(q) => q,
            PathArgument::NodeWithPredicates(p) => p.name(),
        };
        for binding in &self.children {
            match (&binding.shape, arg) {
                (ChildShape::Container(cc), PathArgument::NodeId(_)) if &binding.qname == name => {
                    let codec = cc.get(ctx)?;
                    let step = ctx.path_step(codec.location, codec.class, None);
                    return Ok(Some((codec, step)));
                }
                (
                    ChildShape::List {
                        codec: cc,
                        keyed: true,
                        ..
                    },
                    PathArgument::NodeWithPredicates(predicates),
                ) if &binding.qname == name => {
                    let codec = cc.get(ctx)?;
                    let key = codec.item_key(predicates)?;
                    let step = ctx.path_step(codec.location, codec.class, Some(key));
                    return Ok(Some((codec, step)));
                }
                (ChildShape::Choice { cases, .. }, _) => {
                    for case in cases {
                        if let Some(found) = case.get(ctx)?.resolve_child(ctx, arg)? {
                            return Ok(Some(found));
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(None)
    }

    pub(crate) fn item_key(&self, predicates: &NodeIdentifierWithPredicates) -> Result<ItemKey, CodecError> {
        self.key
            .as_ref()
            .ok_or_else(|| CodecError::SchemaMismatch(format!("{} has no key", self.class)))?
            .from_predicates(predicates)
    }
}

impl fmt::Debug for NodeCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCodec")
            .field("location", &self.location)
            .field("class", &self.class)
            .field("kind", &self.kind)
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

impl ChildBinding {
    fn mismatch(&self, owner: ClassId, found: &str) -> CodecError {
        CodecError::SchemaMismatch(format!(
            "{owner}: field `{}` is a {}, found {found}",
            self.name,
            self.shape.name()
        ))
    }

    fn serialize(
        &self,
        ctx: &BindingCodecContext,
        owner: ClassId,
        value: FieldValue,
    ) -> Result<Option<NormalizedNode>, CodecError> {
        let node = match (&self.shape, value) {
            (ChildShape::Leaf(codec), FieldValue::Leaf(v)) => {
                NormalizedNode::leaf(self.qname.clone(), codec.serialize(&v)?)
            }
            (ChildShape::LeafList { codec, ordered }, FieldValue::LeafList(values)) => {
                if values.is_empty() {
                    return Ok(None);
                }
                let mut set = LeafSetNode::new(self.qname.clone(), *ordered);
                for v in &values {
                    set = set.with_value(codec.serialize(v)?);
                }
                NormalizedNode::LeafSet(set)
            }
            (ChildShape::Container(cc), FieldValue::Object(obj)) => cc.get(ctx)?.serialize(ctx, obj.as_ref())?,
            (
                ChildShape::List {
                    codec,
                    keyed: true,
                    ordered,
                },
                FieldValue::List(entries),
            ) => {
                if entries.is_empty() {
                    return Ok(None);
                }
                let codec = codec.get(ctx)?;
                let mut map = MapNode::new(self.qname.clone(), *ordered);
                for entry in &entries {
                    let (key, body) = codec.serialize_keyed_entry(ctx, entry.as_ref())?;
                    map.insert(key, body);
                }
                NormalizedNode::Map(map)
            }
            (
                ChildShape::List {
                    codec, keyed: false, ..
                },
                FieldValue::List(entries),
            ) => {
                if entries.is_empty() {
                    return Ok(None);
                }
                let codec = codec.get(ctx)?;
                let mut list = UnkeyedListNode::new(self.qname.clone());
                for entry in &entries {
                    list.push(codec.serialize_unkeyed_entry(ctx, entry.as_ref())?);
                }
                NormalizedNode::UnkeyedList(list)
            }
            (ChildShape::Choice { cases, .. }, FieldValue::Object(obj)) => {
                let class = obj.implemented_class();
                let case = cases
                    .iter()
                    .find(|c| ctx.schema().is_bound(c.location(), class))
                    .ok_or_else(|| {
                        CodecError::SchemaMismatch(format!(
                            "{class} is not a case of choice {}",
                            self.qname
                        ))
                    })?;
                case.get(ctx)?.serialize(ctx, obj.as_ref())?
            }
            (ChildShape::Opaque, FieldValue::Opaque(payload)) => {
                NormalizedNode::Anydata(AnydataNode::new(self.qname.clone(), payload))
            }
            (_, other) => return Err(self.mismatch(owner, other.shape())),
        };
        Ok(Some(node))
    }

    fn deserialize(
        &self,
        ctx: &BindingCodecContext,
        owner: ClassId,
        node: &NormalizedNode,
    ) -> Result<Option<FieldValue>, CodecError> {
        let value = match (&self.shape, node) {
            (ChildShape::Leaf(codec), NormalizedNode::Leaf(leaf)) => {
                FieldValue::Leaf(codec.deserialize(leaf.value())?)
            }
            (ChildShape::LeafList { codec, .. }, NormalizedNode::LeafSet(set)) => FieldValue::LeafList(
                set.values()
                    .map(|v| codec.deserialize(v))
                    .collect::<Result<_, _>>()?,
            ),
            (ChildShape::Container(cc), NormalizedNode::Container(_)) => {
                FieldValue::Object(cc.get(ctx)?.deserialize(ctx, node)?)
            }
            (ChildShape::List { codec, keyed: true, .. }, NormalizedNode::Map(map)) => {
                let codec = codec.get(ctx)?;
                FieldValue::List(
                    map.entry_nodes()
                        .map(|(_, entry)| codec.deserialize(ctx, entry))
                        .collect::<Result<_, _>>()?,
                )
            }
            (ChildShape::List { codec, keyed: false, .. }, NormalizedNode::UnkeyedList(list)) => {
                let codec = codec.get(ctx)?;
                FieldValue::List(
                    list.entries()
                        .map(|entry| codec.deserialize_body(ctx, entry))
                        .collect::<Result<_, _>>()?,
                )
            }
            (ChildShape::Choice { location, cases }, NormalizedNode::Choice(body)) => {
                let Some(case_location) = self.case_of(ctx, *location, cases, body)? else {
                    return Ok(None);
                };
                let case = cases
                    .iter()
                    .find(|c| c.location() == case_location)
                    .ok_or_else(|| {
                        CodecError::Deserialization(format!(
                            "case {} of choice {} has no codec",
                            ctx.schema().describe(case_location),
                            self.qname
                        ))
                    })?;
                FieldValue::Object(case.get(ctx)?.deserialize_body(ctx, body)?)
            }
            (ChildShape::Opaque, NormalizedNode::Anydata(anydata)) => {
                FieldValue::Opaque(anydata.payload().clone())
            }
            _ => {
                return Err(CodecError::Deserialization(format!(
                    "{owner}: child {} is not a {}",
                    self.qname,
                    self.shape.name()
                )));
            }
        };
        Ok(Some(value))
    }

    /// Case of a choice whose data `body` carries.
    ///
    /// A plain child names its case directly. A body holding only
    /// augmentations is matched against the augmentations of each case.
    fn case_of(
        &self,
        ctx: &BindingCodecContext,
        choice: SchemaNodeId,
        cases: &[ChildCodec],
        body: &DataContainerNode,
    ) -> Result<Option<SchemaNodeId>, CodecError> {
        let schema = ctx.schema();
        if let Some(first) = body.children().keys().find_map(PathArgument::node_type) {
            return schema.case_for_child(choice, first).map(Some).ok_or_else(|| {
                CodecError::Deserialization(format!(
                    "{first} does not belong to any case of choice {}",
                    self.qname
                ))
            });
        }
        let Some(names) = body.children().keys().find_map(|arg| match arg {
            PathArgument::AugmentationId(names) => Some(names),
            _ => None,
        }) else {
            return Ok(None);
        };
        cases
            .iter()
            .map(ChildCodec::location)
            .find(|case| schema.augmentation_by_names(*case, names).is_some())
            .map(Some)
            .ok_or_else(|| {
                CodecError::Deserialization(format!(
                    "augmentation {} does not belong to any case of choice {}",
                    PathArgument::AugmentationId(names.clone()),
                    self.qname
                ))
            })
    }
}

fn child_binding(schema: &Arc<SchemaIndex>, child: SchemaNodeId) -> Option<ChildBinding> {
    let node = schema.node(child);
    let qname = node.qname()?.clone();
    let shape = match node.kind() {
        SchemaKind::Leaf { effective, .. } => ChildShape::Leaf(ValueCodec::new(
            qname.clone(),
            Arc::clone(effective),
            Arc::clone(schema),
        )),
        SchemaKind::LeafList {
            effective, ordered, ..
        } => ChildShape::LeafList {
            codec: ValueCodec::new(qname.clone(), Arc::clone(effective), Arc::clone(schema)),
            ordered: *ordered,
        },
        SchemaKind::Container => ChildShape::Container(ChildCodec::new(child)),
        SchemaKind::List { keys, ordered } => ChildShape::List {
            codec: ChildCodec::new(child),
            keyed: !keys.is_empty(),
            ordered: *ordered,
        },
        SchemaKind::Choice => ChildShape::Choice {
            location: child,
            cases: schema
                .children(child)
                .iter()
                .copied()
                .filter(|c| matches!(schema.kind(*c), SchemaKind::Case))
                .map(ChildCodec::new)
                .collect(),
        },
        SchemaKind::Anydata | SchemaKind::Anyxml => ChildShape::Opaque,
        _ => return None,
    };
    Some(ChildBinding {
        name: qname.local_name().to_owned(),
        qname,
        shape,
    })
}

fn summarize(schema: &SchemaIndex, location: SchemaNodeId) -> ChildAddressability {
    fn visit(schema: &SchemaIndex, node: SchemaNodeId, addressable: &mut bool, unaddressable: &mut bool) {
        for child in schema.children(node) {
            match schema.kind(*child) {
                SchemaKind::Container | SchemaKind::Augmentation { .. } => *addressable = true,
                SchemaKind::List { keys, .. } if !keys.is_empty() => *addressable = true,
                SchemaKind::List { .. }
                | SchemaKind::Leaf { .. }
                | SchemaKind::LeafList { .. }
                | SchemaKind::Anydata
                | SchemaKind::Anyxml => *unaddressable = true,
                SchemaKind::Choice | SchemaKind::Case => visit(schema, *child, addressable, unaddressable),
                _ => {}
            }
        }
    }
    let (mut addressable, mut unaddressable) = (false, false);
    visit(schema, location, &mut addressable, &mut unaddressable);
    match (addressable, unaddressable) {
        (true, false) => ChildAddressability::Addressable,
        (true, true) => ChildAddressability::Mixed,
        (false, _) => ChildAddressability::Unaddressable,
    }
}
