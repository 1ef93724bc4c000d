// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Read-only schema index.
//!
//! A [`SchemaIndex`] describes every structural node reachable from the data
//! root and the typed classes bound to them. It is produced once per model
//! generation by [`SchemaBuilder::build`], which validates the structure and
//! resolves leafrefs, and is immutable afterwards; concurrent readers need no
//! synchronization.
//!
//! Nodes live in an arena and are addressed by [`SchemaNodeId`]. Each node has
//! exactly one parent. Schema fragments reused through groupings appear as
//! distinct nodes that may share a typed class, so one class can be bound at
//! several locations.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::ident::{ClassId, QName};

mod builder;
mod types;

pub use builder::{ActionNodes, SchemaBuilder};
pub use types::{EnumPair, IntegerKind, Pattern, TypeDefinition};

/// Arena index of a schema node.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SchemaNodeId(u32);

impl SchemaNodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SchemaNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Structural kind of a schema node.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SchemaKind {
    /// The conceptual data root.
    Root,
    /// `container`
    Container,
    /// `list`; `keys` is empty for lists without keys.
    List {
        /// Key leaf names in declaration order.
        keys: Vec<QName>,
        /// True for `ordered-by user`.
        ordered: bool,
    },
    /// `leaf`
    Leaf {
        /// Type as declared.
        declared: TypeDefinition,
        /// Type with leafrefs substituted by their targets' types.
        effective: Arc<TypeDefinition>,
    },
    /// `leaf-list`
    LeafList {
        /// Type as declared.
        declared: TypeDefinition,
        /// Type with leafrefs substituted by their targets' types.
        effective: Arc<TypeDefinition>,
        /// True for `ordered-by user`.
        ordered: bool,
    },
    /// `choice`
    Choice,
    /// `case`
    Case,
    /// `augment` applied to `target`; identified by its child names.
    Augmentation {
        /// The augmented node.
        target: SchemaNodeId,
    },
    /// `anydata`
    Anydata,
    /// `anyxml`
    Anyxml,
    /// `action` or `rpc`
    Action {
        /// The `input` node.
        input: SchemaNodeId,
        /// The `output` node.
        output: SchemaNodeId,
    },
    /// Operation `input`.
    Input,
    /// Operation `output`.
    Output,
}

impl SchemaKind {
    /// Short name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            SchemaKind::Root => "root",
            SchemaKind::Container => "container",
            SchemaKind::List { .. } => "list",
            SchemaKind::Leaf { .. } => "leaf",
            SchemaKind::LeafList { .. } => "leaf-list",
            SchemaKind::Choice => "choice",
            SchemaKind::Case => "case",
            SchemaKind::Augmentation { .. } => "augmentation",
            SchemaKind::Anydata => "anydata",
            SchemaKind::Anyxml => "anyxml",
            SchemaKind::Action { .. } => "action",
            SchemaKind::Input => "input",
            SchemaKind::Output => "output",
        }
    }

    /// True for nodes that appear by name in generic data.
    pub fn is_data_node(&self) -> bool {
        matches!(
            self,
            SchemaKind::Container
                | SchemaKind::List { .. }
                | SchemaKind::Leaf { .. }
                | SchemaKind::LeafList { .. }
                | SchemaKind::Choice
                | SchemaKind::Anydata
                | SchemaKind::Anyxml
        )
    }

    /// True for nodes skipped by typed addressing: typed paths step over them.
    pub fn is_transparent(&self) -> bool {
        matches!(self, SchemaKind::Choice | SchemaKind::Case)
    }
}

/// One node of the schema arena.
#[derive(Clone, Debug)]
pub struct SchemaNode {
    id: SchemaNodeId,
    qname: Option<QName>,
    parent: Option<SchemaNodeId>,
    kind: SchemaKind,
    children: Vec<SchemaNodeId>,
}

impl SchemaNode {
    /// Arena id.
    pub fn id(&self) -> SchemaNodeId {
        self.id
    }

    /// Node name; the root and augmentations have none.
    pub fn qname(&self) -> Option<&QName> {
        self.qname.as_ref()
    }

    /// Parent node; `None` for the root.
    pub fn parent(&self) -> Option<SchemaNodeId> {
        self.parent
    }

    /// Structural kind.
    pub fn kind(&self) -> &SchemaKind {
        &self.kind
    }

    /// Children in declaration order.
    pub fn children(&self) -> &[SchemaNodeId] {
        &self.children
    }

    /// Effective type of a leaf or leaf-list.
    pub fn leaf_type(&self) -> Option<&Arc<TypeDefinition>> {
        match &self.kind {
            SchemaKind::Leaf { effective, .. } | SchemaKind::LeafList { effective, .. } => {
                Some(effective)
            }
            _ => None,
        }
    }
}

/// An `identity` statement and the class generated for it.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct IdentitySchema {
    /// Identity name.
    pub qname: QName,
    /// Typed class representing the identity.
    pub class: ClassId,
    /// Base identity, if any.
    pub base: Option<QName>,
}

/// BLAKE3 digest identifying one schema generation.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct SchemaDigest(pub [u8; 32]);

impl fmt::Display for SchemaDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Errors detected while building a schema index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Two data children of one parent share a name.
    #[error("[SCHEMA_DUPLICATE_CHILD] {child} is defined twice under {parent}")]
    DuplicateChild {
        /// Description of the parent.
        parent: String,
        /// Offending name.
        child: QName,
    },
    /// A list key does not name a leaf child of the list.
    #[error("[SCHEMA_MISSING_KEY] list {list} declares key {key} which is not a child leaf")]
    MissingKey {
        /// The list.
        list: QName,
        /// The key leaf name.
        key: QName,
    },
    /// A node was attached to a parent of the wrong kind.
    #[error("[SCHEMA_INVALID_PARENT] {node} cannot be placed under {parent}")]
    InvalidParent {
        /// Description of the node.
        node: String,
        /// Description of the parent.
        parent: String,
    },
    /// An identity or identityref names an identity that is not defined.
    #[error("[SCHEMA_UNKNOWN_IDENTITY] identity {0} is not defined")]
    UnknownIdentity(QName),
    /// An identity was defined twice.
    #[error("[SCHEMA_DUPLICATE_IDENTITY] identity {0} is defined twice")]
    DuplicateIdentity(QName),
    /// A leafref path does not lead to a leaf.
    #[error("[SCHEMA_UNRESOLVED_LEAFREF] leafref at {leaf} points to {path}, which is not a leaf")]
    UnresolvedLeafref {
        /// The referencing leaf.
        leaf: QName,
        /// The path as written.
        path: String,
    },
    /// A leafref refers to itself, directly or through other leafrefs.
    #[error("[SCHEMA_CIRCULAR_LEAFREF] leafref at {leaf} refers back to itself")]
    CircularLeafref {
        /// The referencing leaf.
        leaf: QName,
    },
    /// A pattern failed to compile.
    #[error("[SCHEMA_INVALID_PATTERN] {pattern}: {reason}")]
    InvalidPattern {
        /// The pattern as written.
        pattern: String,
        /// Compiler message.
        reason: String,
    },
    /// A class was bound to a node that has no typed representation.
    #[error("[SCHEMA_INVALID_BINDING] {class} cannot be bound to {node}")]
    InvalidBinding {
        /// The class.
        class: ClassId,
        /// Description of the node.
        node: String,
    },
}

/// Immutable, queryable schema.
#[derive(Debug)]
pub struct SchemaIndex {
    nodes: Vec<SchemaNode>,
    by_class: BTreeMap<ClassId, Vec<SchemaNodeId>>,
    node_classes: BTreeMap<SchemaNodeId, Vec<ClassId>>,
    identities: BTreeMap<QName, IdentitySchema>,
    identity_classes: BTreeMap<ClassId, QName>,
    digest: SchemaDigest,
}

impl SchemaIndex {
    /// The data root.
    pub fn root(&self) -> SchemaNodeId {
        SchemaNodeId(0)
    }

    /// Node by id. Ids are only ever minted by the index that owns them.
    pub fn node(&self, id: SchemaNodeId) -> &SchemaNode {
        &self.nodes[id.index()]
    }

    /// Structural kind of a node.
    pub fn kind(&self, id: SchemaNodeId) -> &SchemaKind {
        &self.node(id).kind
    }

    /// Name of a node.
    pub fn qname(&self, id: SchemaNodeId) -> Option<&QName> {
        self.node(id).qname.as_ref()
    }

    /// Parent of a node.
    pub fn parent(&self, id: SchemaNodeId) -> Option<SchemaNodeId> {
        self.node(id).parent
    }

    /// Children of a node in declaration order.
    pub fn children(&self, id: SchemaNodeId) -> &[SchemaNodeId] {
        &self.node(id).children
    }

    /// Ancestors of a node, root first, excluding the node itself.
    pub fn ancestors(&self, id: SchemaNodeId) -> Vec<SchemaNodeId> {
        let mut chain = Vec::new();
        let mut cursor = self.parent(id);
        while let Some(p) = cursor {
            chain.push(p);
            cursor = self.parent(p);
        }
        chain.reverse();
        chain
    }

    /// Data child named `qname` as it appears in generic data under `parent`.
    ///
    /// Under a choice this looks through its cases. Augmentation children
    /// are not found here; they sit below their augmentation node.
    pub fn data_child(&self, parent: SchemaNodeId, qname: &QName) -> Option<SchemaNodeId> {
        if matches!(self.kind(parent), SchemaKind::Choice) {
            return self
                .children(parent)
                .iter()
                .find_map(|case| self.data_child(*case, qname));
        }
        self.children(parent).iter().copied().find(|c| {
            let node = self.node(*c);
            node.kind.is_data_node() && node.qname.as_ref() == Some(qname)
        })
    }

    /// Any named child of `parent`, including operations and their input/output.
    pub fn named_child(&self, parent: SchemaNodeId, qname: &QName) -> Option<SchemaNodeId> {
        self.data_child(parent, qname).or_else(|| {
            self.children(parent)
                .iter()
                .copied()
                .find(|c| self.node(*c).qname.as_ref() == Some(qname))
        })
    }

    /// The case of `choice` whose data children include `qname`.
    pub fn case_for_child(&self, choice: SchemaNodeId, qname: &QName) -> Option<SchemaNodeId> {
        self.children(choice)
            .iter()
            .copied()
            .find(|case| self.data_child(*case, qname).is_some())
    }

    /// Data children of a node: everything except augmentations and operations.
    pub fn data_children(&self, id: SchemaNodeId) -> impl Iterator<Item = SchemaNodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.kind(*c).is_data_node() || matches!(self.kind(*c), SchemaKind::Case))
    }

    /// Augmentations applied to `target`.
    pub fn augmentations(&self, target: SchemaNodeId) -> impl Iterator<Item = SchemaNodeId> + '_ {
        self.children(target)
            .iter()
            .copied()
            .filter(|c| matches!(self.kind(*c), SchemaKind::Augmentation { .. }))
    }

    /// Names an augmentation may introduce into its target.
    pub fn augmentation_child_names(&self, augmentation: SchemaNodeId) -> BTreeSet<QName> {
        self.children(augmentation)
            .iter()
            .filter_map(|c| self.qname(*c).cloned())
            .collect()
    }

    /// Augmentation of `target` identified by exactly `names`.
    pub fn augmentation_by_names(
        &self,
        target: SchemaNodeId,
        names: &BTreeSet<QName>,
    ) -> Option<SchemaNodeId> {
        self.augmentations(target)
            .find(|aug| &self.augmentation_child_names(*aug) == names)
    }

    /// Nearest ancestor that typed paths can address.
    ///
    /// Choices and cases are stepped over; the root counts as addressable.
    pub fn addressable_parent(&self, id: SchemaNodeId) -> Option<SchemaNodeId> {
        let mut cursor = self.parent(id)?;
        while self.kind(cursor).is_transparent() {
            cursor = self.parent(cursor)?;
        }
        Some(cursor)
    }

    /// Nearest enclosing case below the addressable parent, if any.
    pub fn enclosing_case(&self, id: SchemaNodeId) -> Option<SchemaNodeId> {
        let mut cursor = self.parent(id)?;
        while self.kind(cursor).is_transparent() {
            if matches!(self.kind(cursor), SchemaKind::Case) {
                return Some(cursor);
            }
            cursor = self.parent(cursor)?;
        }
        None
    }

    /// Locations a typed class is bound to, in declaration order.
    pub fn locations(&self, class: ClassId) -> &[SchemaNodeId] {
        self.by_class.get(&class).map_or(&[], Vec::as_slice)
    }

    /// Classes bound to a location, in binding order.
    pub fn classes(&self, id: SchemaNodeId) -> &[ClassId] {
        self.node_classes.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Canonical class bound to a location: the lexicographically lowest
    /// of its classes, so aliases resolve the same way on every run.
    pub fn canonical_class(&self, id: SchemaNodeId) -> Option<ClassId> {
        self.classes(id).iter().min().copied()
    }

    /// True when `class` is bound to `id`, canonically or as an alias.
    pub fn is_bound(&self, id: SchemaNodeId, class: ClassId) -> bool {
        self.classes(id).contains(&class)
    }

    /// Identity by name.
    pub fn identity(&self, qname: &QName) -> Option<&IdentitySchema> {
        self.identities.get(qname)
    }

    /// Identity name for a typed identity class.
    pub fn identity_by_class(&self, class: ClassId) -> Option<&QName> {
        self.identity_classes.get(&class)
    }

    /// True when `identity` equals `base` or derives from it.
    pub fn is_derived_from(&self, identity: &QName, base: &QName) -> bool {
        let mut cursor = Some(identity);
        let mut hops = 0;
        while let Some(current) = cursor {
            if current == base {
                return true;
            }
            hops += 1;
            if hops > self.identities.len() {
                return false;
            }
            cursor = self.identities.get(current).and_then(|i| i.base.as_ref());
        }
        false
    }

    /// Digest identifying this schema generation.
    pub fn digest(&self) -> SchemaDigest {
        self.digest
    }

    /// Human-readable description of a node for diagnostics.
    pub fn describe(&self, id: SchemaNodeId) -> String {
        let node = self.node(id);
        match &node.qname {
            Some(q) => format!("{} {q}", node.kind.name()),
            None => match node.kind {
                SchemaKind::Augmentation { target } => {
                    format!("augmentation of {}", self.describe(target))
                }
                _ => node.kind.name().to_owned(),
            },
        }
    }

    /// Number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when only the root exists.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }
}
