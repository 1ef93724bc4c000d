// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Construction and validation of a [`SchemaIndex`].
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use blake3::Hasher;
use tracing::debug;

use super::{
    IdentitySchema, SchemaDigest, SchemaError, SchemaIndex, SchemaKind, SchemaNode, SchemaNodeId,
    TypeDefinition,
};
use crate::ident::{ClassId, QName};

/// Ids created by [`SchemaBuilder::action`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ActionNodes {
    /// The action itself.
    pub action: SchemaNodeId,
    /// Its `input`.
    pub input: SchemaNodeId,
    /// Its `output`.
    pub output: SchemaNodeId,
}

/// Incrementally describes a schema, then validates it in [`SchemaBuilder::build`].
///
/// Node-adding methods never fail; structural mistakes are reported by
/// `build`, once, so a model loader can describe the whole model first.
#[derive(Debug)]
pub struct SchemaBuilder {
    nodes: Vec<SchemaNode>,
    by_class: BTreeMap<ClassId, Vec<SchemaNodeId>>,
    node_classes: BTreeMap<SchemaNodeId, Vec<ClassId>>,
    identities: BTreeMap<QName, IdentitySchema>,
    pending: Vec<SchemaError>,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBuilder {
    /// Creates a builder holding only the data root.
    pub fn new() -> Self {
        Self {
            nodes: vec![SchemaNode {
                id: SchemaNodeId(0),
                qname: None,
                parent: None,
                kind: SchemaKind::Root,
                children: Vec::new(),
            }],
            by_class: BTreeMap::new(),
            node_classes: BTreeMap::new(),
            identities: BTreeMap::new(),
            pending: Vec::new(),
        }
    }

    /// The data root.
    pub fn root(&self) -> SchemaNodeId {
        SchemaNodeId(0)
    }

    fn add(&mut self, parent: SchemaNodeId, qname: Option<QName>, kind: SchemaKind) -> SchemaNodeId {
        let raw = u32::try_from(self.nodes.len()).unwrap_or(u32::MAX);
        let id = SchemaNodeId(raw);
        self.nodes.push(SchemaNode {
            id,
            qname,
            parent: Some(parent),
            kind,
            children: Vec::new(),
        });
        self.nodes[parent.index()].children.push(id);
        id
    }

    /// Adds a `container`.
    pub fn container(&mut self, parent: SchemaNodeId, qname: QName) -> SchemaNodeId {
        self.add(parent, Some(qname), SchemaKind::Container)
    }

    /// Adds a keyed `list`.
    pub fn list(
        &mut self,
        parent: SchemaNodeId,
        qname: QName,
        keys: &[QName],
        ordered: bool,
    ) -> SchemaNodeId {
        self.add(
            parent,
            Some(qname),
            SchemaKind::List {
                keys: keys.to_vec(),
                ordered,
            },
        )
    }

    /// Adds a `list` without keys.
    pub fn unkeyed_list(&mut self, parent: SchemaNodeId, qname: QName) -> SchemaNodeId {
        self.add(
            parent,
            Some(qname),
            SchemaKind::List {
                keys: Vec::new(),
                ordered: true,
            },
        )
    }

    /// Adds a `leaf`.
    pub fn leaf(&mut self, parent: SchemaNodeId, qname: QName, ty: TypeDefinition) -> SchemaNodeId {
        let effective = Arc::new(ty.clone());
        self.add(
            parent,
            Some(qname),
            SchemaKind::Leaf {
                declared: ty,
                effective,
            },
        )
    }

    /// Adds a `leaf-list`.
    pub fn leaf_list(
        &mut self,
        parent: SchemaNodeId,
        qname: QName,
        ty: TypeDefinition,
        ordered: bool,
    ) -> SchemaNodeId {
        let effective = Arc::new(ty.clone());
        self.add(
            parent,
            Some(qname),
            SchemaKind::LeafList {
                declared: ty,
                effective,
                ordered,
            },
        )
    }

    /// Adds a `choice`.
    pub fn choice(&mut self, parent: SchemaNodeId, qname: QName) -> SchemaNodeId {
        self.add(parent, Some(qname), SchemaKind::Choice)
    }

    /// Adds a `case` to a choice.
    pub fn case(&mut self, choice: SchemaNodeId, qname: QName) -> SchemaNodeId {
        self.add(choice, Some(qname), SchemaKind::Case)
    }

    /// Adds an `augment` of `target`. Its children are added to the returned node.
    pub fn augmentation(&mut self, target: SchemaNodeId) -> SchemaNodeId {
        self.add(target, None, SchemaKind::Augmentation { target })
    }

    /// Adds an `anydata`.
    pub fn anydata(&mut self, parent: SchemaNodeId, qname: QName) -> SchemaNodeId {
        self.add(parent, Some(qname), SchemaKind::Anydata)
    }

    /// Adds an `anyxml`.
    pub fn anyxml(&mut self, parent: SchemaNodeId, qname: QName) -> SchemaNodeId {
        self.add(parent, Some(qname), SchemaKind::Anyxml)
    }

    /// Adds an `action` (or, under the root, an `rpc`) with its input and output.
    pub fn action(&mut self, parent: SchemaNodeId, qname: QName) -> ActionNodes {
        let input_name = qname.sibling("input");
        let output_name = qname.sibling("output");
        let placeholder = SchemaKind::Action {
            input: SchemaNodeId(0),
            output: SchemaNodeId(0),
        };
        let action = self.add(parent, Some(qname), placeholder);
        let input = self.add(action, Some(input_name), SchemaKind::Input);
        let output = self.add(action, Some(output_name), SchemaKind::Output);
        self.nodes[action.index()].kind = SchemaKind::Action { input, output };
        ActionNodes {
            action,
            input,
            output,
        }
    }

    /// Binds a typed class to a node. Several classes bound to one node are
    /// aliases for the same location.
    pub fn bind(&mut self, node: SchemaNodeId, class: ClassId) -> &mut Self {
        let classes = self.node_classes.entry(node).or_default();
        if !classes.contains(&class) {
            classes.push(class);
            self.by_class.entry(class).or_default().push(node);
        }
        self
    }

    /// Declares an identity and its typed class.
    pub fn identity(&mut self, qname: QName, class: ClassId, base: Option<QName>) -> &mut Self {
        if self.identities.contains_key(&qname) {
            self.pending.push(SchemaError::DuplicateIdentity(qname));
            return self;
        }
        self.identities.insert(
            qname.clone(),
            IdentitySchema { qname, class, base },
        );
        self
    }

    /// Validates the description and produces the immutable index.
    pub fn build(mut self) -> Result<SchemaIndex, SchemaError> {
        if let Some(err) = self.pending.drain(..).next() {
            return Err(err);
        }
        for node in &self.nodes {
            self.check_parent(node)?;
            self.check_children(node)?;
            if let SchemaKind::List { keys, .. } = &node.kind {
                self.check_keys(node, keys)?;
            }
        }
        for (node, classes) in &self.node_classes {
            let kind = &self.nodes[node.index()].kind;
            let bindable = matches!(
                kind,
                SchemaKind::Container
                    | SchemaKind::List { .. }
                    | SchemaKind::Choice
                    | SchemaKind::Case
                    | SchemaKind::Augmentation { .. }
                    | SchemaKind::Input
                    | SchemaKind::Output
            );
            if let (false, Some(class)) = (bindable, classes.first()) {
                return Err(SchemaError::InvalidBinding {
                    class: *class,
                    node: self.describe(*node),
                });
            }
        }
        self.check_identities()?;
        self.resolve_leafrefs()?;

        let digest = self.digest();
        let identity_classes = self
            .identities
            .values()
            .map(|i| (i.class, i.qname.clone()))
            .collect();
        debug!(nodes = self.nodes.len(), %digest, "schema index built");
        Ok(SchemaIndex {
            nodes: self.nodes,
            by_class: self.by_class,
            node_classes: self.node_classes,
            identities: self.identities,
            identity_classes,
            digest,
        })
    }

    fn describe(&self, id: SchemaNodeId) -> String {
        let node = &self.nodes[id.index()];
        match &node.qname {
            Some(q) => format!("{} {q}", node.kind.name()),
            None => node.kind.name().to_owned(),
        }
    }

    fn check_parent(&self, node: &SchemaNode) -> Result<(), SchemaError> {
        let Some(parent) = node.parent else {
            return Ok(());
        };
        let parent_kind = &self.nodes[parent.index()].kind;
        let allowed = match &node.kind {
            SchemaKind::Root => false,
            SchemaKind::Case => matches!(parent_kind, SchemaKind::Choice),
            SchemaKind::Augmentation { .. } => matches!(
                parent_kind,
                SchemaKind::Container
                    | SchemaKind::List { .. }
                    | SchemaKind::Case
                    | SchemaKind::Input
                    | SchemaKind::Output
            ),
            SchemaKind::Action { .. } => matches!(
                parent_kind,
                SchemaKind::Root | SchemaKind::Container | SchemaKind::List { .. }
            ),
            SchemaKind::Input | SchemaKind::Output => {
                matches!(parent_kind, SchemaKind::Action { .. })
            }
            _ => matches!(
                parent_kind,
                SchemaKind::Root
                    | SchemaKind::Container
                    | SchemaKind::List { .. }
                    | SchemaKind::Case
                    | SchemaKind::Augmentation { .. }
                    | SchemaKind::Input
                    | SchemaKind::Output
            ),
        };
        if allowed {
            Ok(())
        } else {
            Err(SchemaError::InvalidParent {
                node: self.describe(node.id),
                parent: self.describe(parent),
            })
        }
    }

    fn check_children(&self, node: &SchemaNode) -> Result<(), SchemaError> {
        let mut seen = BTreeSet::new();
        let mut own = Vec::new();
        for child in &node.children {
            let child_node = &self.nodes[child.index()];
            match (&child_node.kind, &child_node.qname) {
                (SchemaKind::Augmentation { .. }, _) => {
                    own.extend(child_node.children.iter().copied());
                }
                (_, Some(_)) => own.push(*child),
                (_, None) => {}
            }
        }
        for child in own {
            if let Some(q) = &self.nodes[child.index()].qname {
                if !seen.insert(q.clone()) {
                    return Err(SchemaError::DuplicateChild {
                        parent: self.describe(node.id),
                        child: q.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_keys(&self, list: &SchemaNode, keys: &[QName]) -> Result<(), SchemaError> {
        for key in keys {
            let is_leaf = list.children.iter().any(|c| {
                let child = &self.nodes[c.index()];
                child.qname.as_ref() == Some(key) && matches!(child.kind, SchemaKind::Leaf { .. })
            });
            if !is_leaf {
                return Err(SchemaError::MissingKey {
                    list: list.qname.clone().unwrap_or_else(QName::data_root),
                    key: key.clone(),
                });
            }
        }
        Ok(())
    }

    fn check_identities(&self) -> Result<(), SchemaError> {
        for identity in self.identities.values() {
            if let Some(base) = &identity.base {
                if !self.identities.contains_key(base) {
                    return Err(SchemaError::UnknownIdentity(base.clone()));
                }
            }
        }
        for node in &self.nodes {
            match &node.kind {
                SchemaKind::Leaf { declared, .. } | SchemaKind::LeafList { declared, .. } => {
                    self.check_identity_bases(declared)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn check_identity_bases(&self, ty: &TypeDefinition) -> Result<(), SchemaError> {
        match ty {
            TypeDefinition::IdentityRef { base } if !self.identities.contains_key(base) => {
                Err(SchemaError::UnknownIdentity(base.clone()))
            }
            TypeDefinition::Union(members) => members
                .iter()
                .try_for_each(|m| self.check_identity_bases(m)),
            _ => Ok(()),
        }
    }

    fn resolve_leafrefs(&mut self) -> Result<(), SchemaError> {
        let mut resolved = Vec::new();
        for node in &self.nodes {
            let declared = match &node.kind {
                SchemaKind::Leaf { declared, .. } | SchemaKind::LeafList { declared, .. } => declared,
                _ => continue,
            };
            if contains_leafref(declared) {
                let mut stack = vec![node.id];
                let effective = self.resolve_type(declared, node.id, &mut stack)?;
                resolved.push((node.id, Arc::new(effective)));
            }
        }
        for (id, ty) in resolved {
            match &mut self.nodes[id.index()].kind {
                SchemaKind::Leaf { effective, .. } | SchemaKind::LeafList { effective, .. } => {
                    *effective = ty;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn resolve_type(
        &self,
        ty: &TypeDefinition,
        origin: SchemaNodeId,
        stack: &mut Vec<SchemaNodeId>,
    ) -> Result<TypeDefinition, SchemaError> {
        match ty {
            TypeDefinition::Leafref { path } => {
                let origin_name = self.nodes[origin.index()]
                    .qname
                    .clone()
                    .unwrap_or_else(QName::data_root);
                let target = self.walk(path).ok_or_else(|| SchemaError::UnresolvedLeafref {
                    leaf: origin_name.clone(),
                    path: path
                        .iter()
                        .map(|q| format!("/{}", q.local_name()))
                        .collect::<String>(),
                })?;
                if stack.contains(&target) {
                    return Err(SchemaError::CircularLeafref { leaf: origin_name });
                }
                let declared = match &self.nodes[target.index()].kind {
                    SchemaKind::Leaf { declared, .. } | SchemaKind::LeafList { declared, .. } => {
                        declared
                    }
                    _ => {
                        return Err(SchemaError::UnresolvedLeafref {
                            leaf: origin_name,
                            path: self.describe(target),
                        })
                    }
                };
                stack.push(target);
                let out = self.resolve_type(declared, target, stack);
                stack.pop();
                out
            }
            TypeDefinition::Union(members) => members
                .iter()
                .map(|m| self.resolve_type(m, origin, stack))
                .collect::<Result<Vec<_>, _>>()
                .map(TypeDefinition::Union),
            other => Ok(other.clone()),
        }
    }

    fn walk(&self, path: &[QName]) -> Option<SchemaNodeId> {
        let mut cursor = SchemaNodeId(0);
        for name in path {
            cursor = self.data_child(cursor, name)?;
        }
        Some(cursor)
    }

    fn data_child(&self, parent: SchemaNodeId, qname: &QName) -> Option<SchemaNodeId> {
        let node = &self.nodes[parent.index()];
        node.children.iter().copied().find_map(|c| {
            let child = &self.nodes[c.index()];
            match &child.kind {
                SchemaKind::Case | SchemaKind::Choice | SchemaKind::Augmentation { .. }
                    if child.qname.as_ref() != Some(qname) =>
                {
                    self.data_child(c, qname)
                }
                kind if kind.is_data_node() && child.qname.as_ref() == Some(qname) => Some(c),
                _ => None,
            }
        })
    }

    fn digest(&self) -> SchemaDigest {
        let mut hasher = Hasher::new();
        hasher.update(b"bindery-schema:");
        for node in &self.nodes {
            hasher.update(&node.id.0.to_le_bytes());
            hasher.update(node.kind.name().as_bytes());
            if let Some(q) = &node.qname {
                hasher.update(q.to_string().as_bytes());
            }
            let parent = node.parent.map_or(u32::MAX, |p| p.0);
            hasher.update(&parent.to_le_bytes());
            match &node.kind {
                SchemaKind::List { keys, ordered } => {
                    for key in keys {
                        hasher.update(key.to_string().as_bytes());
                    }
                    hasher.update(&[u8::from(*ordered)]);
                }
                SchemaKind::Leaf { declared, .. } | SchemaKind::LeafList { declared, .. } => {
                    hasher.update(format!("{declared:?}").as_bytes());
                }
                _ => {}
            }
            for class in self.node_classes.get(&node.id).into_iter().flatten() {
                hasher.update(class.0.as_bytes());
            }
        }
        for identity in self.identities.values() {
            hasher.update(identity.qname.to_string().as_bytes());
            hasher.update(identity.class.0.as_bytes());
        }
        SchemaDigest(hasher.finalize().into())
    }
}

fn contains_leafref(ty: &TypeDefinition) -> bool {
    match ty {
        TypeDefinition::Leafref { .. } => true,
        TypeDefinition::Union(members) => members.iter().any(contains_leafref),
        _ => false,
    }
}
