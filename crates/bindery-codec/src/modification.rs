// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed view over a generic change tree.
//!
//! [`DataObjectModification`] wraps one candidate node and translates it on
//! demand: before/after objects are deserialized on first access and the
//! list of modified typed children is computed once. Candidate children
//! that have no typed projection are skipped, never fatal.
use std::fmt;
use std::sync::{Arc, OnceLock};

use bindery_model::{CandidateNode, ModificationType, NormalizedNode, PathArgument};
use tracing::debug;

use crate::binding::{BindingClass, DataObject, Identifiable};
use crate::context::BindingCodecContext;
use crate::error::CodecError;
use crate::identifier::{InstancePath, PathStep};
use crate::node_codec::{ChildAddressability, NodeCodec};

/// How a generic node relates to the typed tree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BindingStructuralType {
    /// Leaves, leaf-sets, unkeyed lists and opaque nodes.
    NotAddressable,
    /// A choice: present in generic data, absent from typed paths.
    InvisibleContainer,
    /// A keyed list as a whole; its entries are addressable.
    InvisibleList,
    /// Containers, list entries and augmentations.
    VisibleContainer,
    /// Not classifiable from the available data.
    Unknown,
}

impl BindingStructuralType {
    /// Classifies a generic node.
    pub fn from_node(node: &NormalizedNode) -> Self {
        match node {
            NormalizedNode::Leaf(_)
            | NormalizedNode::LeafSet(_)
            | NormalizedNode::UnkeyedList(_)
            | NormalizedNode::UnkeyedListEntry(_)
            | NormalizedNode::Anydata(_) => Self::NotAddressable,
            NormalizedNode::Map(_) => Self::InvisibleList,
            NormalizedNode::Choice(_) => Self::InvisibleContainer,
            NormalizedNode::Container(_) | NormalizedNode::MapEntry(_) | NormalizedNode::Augmentation(_) => {
                Self::VisibleContainer
            }
        }
    }

    /// Classifies a candidate by its after state, else its before state,
    /// else its identifier.
    pub fn from_candidate(candidate: &dyn CandidateNode) -> Self {
        if let Some(node) = candidate.data_after().or_else(|| candidate.data_before()) {
            return Self::from_node(node);
        }
        match candidate.identifier() {
            PathArgument::NodeWithPredicates(_) => Self::VisibleContainer,
            PathArgument::NodeWithValue(..) => Self::NotAddressable,
            _ => Self::Unknown,
        }
    }

    /// Like [`from_candidate`](Self::from_candidate), but an invisible node
    /// takes the type of its first child. A nested invisible node, or an
    /// invisible node without children, is not addressable.
    pub fn recursive_from(candidate: &dyn CandidateNode) -> Self {
        match Self::from_candidate(candidate) {
            Self::InvisibleContainer | Self::InvisibleList => {
                match candidate.child_nodes().first() {
                    Some(child) => match Self::recursive_from(child.as_ref()) {
                        Self::InvisibleContainer | Self::InvisibleList => Self::NotAddressable,
                        other => other,
                    },
                    None => Self::NotAddressable,
                }
            }
            other => other,
        }
    }
}

/// Typed modification kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ModificationKind {
    /// The object was written as a whole; its children are not itemized.
    Write,
    /// Only some addressable children changed.
    SubtreeModified,
    /// The object was removed.
    Delete,
}

/// Lazily translated modification of one typed object.
pub struct DataObjectModification {
    ctx: Arc<BindingCodecContext>,
    codec: Arc<NodeCodec>,
    step: PathStep,
    candidate: Arc<dyn CandidateNode>,
    kind: OnceLock<ModificationKind>,
    before: OnceLock<Result<Option<Arc<dyn DataObject>>, CodecError>>,
    after: OnceLock<Result<Option<Arc<dyn DataObject>>, CodecError>>,
    flattened: OnceLock<Flattened>,
    children: OnceLock<Vec<Arc<DataObjectModification>>>,
}

/// Candidate children seen through invisible wrappers, enumerated once per
/// view and shared by [`DataObjectModification::modification_type`] and
/// [`DataObjectModification::modified_children`].
#[derive(Default)]
struct Flattened {
    /// Changed children that may map to a typed object.
    visible: Vec<(Arc<dyn CandidateNode>, BindingStructuralType)>,
    /// Whether any change lands on something typed listeners cannot address.
    hidden: bool,
}

impl Flattened {
    fn collect(children: &[Arc<dyn CandidateNode>], nested: bool, out: &mut Self) {
        for child in children {
            let kind = BindingStructuralType::from_candidate(child.as_ref());
            match kind {
                BindingStructuralType::NotAddressable => out.hidden = true,
                BindingStructuralType::InvisibleList | BindingStructuralType::InvisibleContainer => {
                    let inner = child.child_nodes();
                    if nested || inner.is_empty() {
                        out.hidden = true;
                    }
                    if child.modification_type() != ModificationType::Unmodified {
                        Self::collect(&inner, true, out);
                    }
                }
                BindingStructuralType::VisibleContainer | BindingStructuralType::Unknown => {
                    if child.modification_type() != ModificationType::Unmodified {
                        out.visible.push((Arc::clone(child), kind));
                    }
                }
            }
        }
    }
}

impl DataObjectModification {
    fn new(
        ctx: Arc<BindingCodecContext>,
        codec: Arc<NodeCodec>,
        step: PathStep,
        candidate: Arc<dyn CandidateNode>,
    ) -> Self {
        Self {
            ctx,
            codec,
            step,
            candidate,
            kind: OnceLock::new(),
            before: OnceLock::new(),
            after: OnceLock::new(),
            flattened: OnceLock::new(),
            children: OnceLock::new(),
        }
    }

    /// View of `candidate`, the change rooted at typed `path`.
    ///
    /// `Ok(None)` when nothing changed there.
    pub fn from_candidate(
        ctx: &Arc<BindingCodecContext>,
        path: &InstancePath,
        candidate: Arc<dyn CandidateNode>,
    ) -> Result<Option<Arc<Self>>, CodecError> {
        if candidate.modification_type() == ModificationType::Unmodified {
            return Ok(None);
        }
        let step = path
            .last()
            .cloned()
            .ok_or_else(|| CodecError::SchemaMismatch("the root has no typed modification".to_owned()))?;
        let codec = ctx.codec_at(ctx.resolve_path(path)?)?;
        Ok(Some(Arc::new(Self::new(Arc::clone(ctx), codec, step, candidate))))
    }

    /// Typed step addressing this object from its parent.
    pub fn step(&self) -> &PathStep {
        &self.step
    }

    /// Class of the modified object.
    pub fn data_type(&self) -> bindery_model::ClassId {
        self.codec.class()
    }

    /// Generic argument of the underlying candidate.
    pub fn identifier(&self) -> &PathArgument {
        self.candidate.identifier()
    }

    /// Typed modification kind.
    ///
    /// A subtree change is reported as a write when it touches children that
    /// typed listeners cannot observe individually.
    pub fn modification_type(&self) -> ModificationKind {
        *self.kind.get_or_init(|| match self.candidate.modification_type() {
            ModificationType::Write | ModificationType::Appeared => ModificationKind::Write,
            ModificationType::Delete | ModificationType::Disappeared => ModificationKind::Delete,
            ModificationType::SubtreeModified | ModificationType::Unmodified => self.resolve_subtree(),
        })
    }

    fn resolve_subtree(&self) -> ModificationKind {
        match self.codec.child_addressability() {
            ChildAddressability::Addressable => ModificationKind::SubtreeModified,
            ChildAddressability::Unaddressable => ModificationKind::Write,
            ChildAddressability::Mixed => {
                if self.flattened().hidden {
                    ModificationKind::Write
                } else {
                    ModificationKind::SubtreeModified
                }
            }
        }
    }

    fn flattened(&self) -> &Flattened {
        self.flattened.get_or_init(|| {
            let mut out = Flattened::default();
            Flattened::collect(&self.candidate.child_nodes(), false, &mut out);
            out
        })
    }

    /// Object before the change.
    pub fn data_before(&self) -> Result<Option<Arc<dyn DataObject>>, CodecError> {
        self.before
            .get_or_init(|| self.deserialize(self.candidate.data_before()))
            .clone()
    }

    /// Object after the change.
    pub fn data_after(&self) -> Result<Option<Arc<dyn DataObject>>, CodecError> {
        self.after
            .get_or_init(|| self.deserialize(self.candidate.data_after()))
            .clone()
    }

    fn deserialize(&self, node: Option<&NormalizedNode>) -> Result<Option<Arc<dyn DataObject>>, CodecError> {
        node.map(|n| self.codec.deserialize(&self.ctx, n)).transpose()
    }

    /// Modifications of direct typed children, computed once.
    pub fn modified_children(&self) -> &[Arc<DataObjectModification>] {
        self.children.get_or_init(|| {
            self.flattened()
                .visible
                .iter()
                .filter_map(|(child, kind)| match self.codec.resolve_child(&self.ctx, child.identifier()) {
                    Ok(Some((codec, step))) => Some(Arc::new(Self::new(
                        Arc::clone(&self.ctx),
                        codec,
                        step,
                        Arc::clone(child),
                    ))),
                    Ok(None) => {
                        debug!(node = %child.identifier(), kind = ?kind, "no typed representation for changed node");
                        None
                    }
                    Err(err) => {
                        debug!(node = %child.identifier(), error = %err, "skipping changed node");
                        None
                    }
                })
                .collect()
        })
    }

    /// Modified children bound to `class`.
    pub fn modified_children_of(&self, class: bindery_model::ClassId) -> Vec<Arc<DataObjectModification>> {
        self.modified_children()
            .iter()
            .filter(|m| self.ctx.schema().is_bound(m.codec.location(), class))
            .cloned()
            .collect()
    }

    /// Modification of the child addressed by `step`, if it changed.
    ///
    /// Only the candidate nodes along the step are visited.
    pub fn modified_child(&self, step: &PathStep) -> Result<Option<Arc<DataObjectModification>>, CodecError> {
        let (location, args) = self.ctx.step_to_generic(self.codec.location(), step)?;
        let codec = self.ctx.codec_at(location)?;
        if codec.key_codec().is_some() && step.key().is_none() {
            return Err(CodecError::SchemaMismatch(format!(
                "{step} needs a key to address a single entry"
            )));
        }
        let mut current = Arc::clone(&self.candidate);
        for arg in &args {
            match current.modified_child(arg) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        if current.modification_type() == ModificationType::Unmodified {
            return Ok(None);
        }
        let step = self.ctx.path_step(location, codec.class(), step.key().cloned());
        Ok(Some(Arc::new(Self::new(Arc::clone(&self.ctx), codec, step, current))))
    }

    /// Modification of child container `C`.
    pub fn modified_child_container<C: BindingClass>(&self) -> Result<Option<Arc<DataObjectModification>>, CodecError> {
        self.modified_child(&PathStep::of::<C>())
    }

    /// Modification of list entry `C` with `key`.
    pub fn modified_child_list_item<C: Identifiable>(
        &self,
        key: C::Key,
    ) -> Result<Option<Arc<DataObjectModification>>, CodecError> {
        self.modified_child(&PathStep::keyed::<C>(key))
    }

    /// Modification of augmentation `A`.
    pub fn modified_augmentation<A: BindingClass>(&self) -> Result<Option<Arc<DataObjectModification>>, CodecError> {
        self.modified_child(&PathStep::of::<A>())
    }
}

impl fmt::Debug for DataObjectModification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataObjectModification")
            .field("step", &self.step)
            .field("candidate", &self.candidate.identifier())
            .field("type", &self.candidate.modification_type())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use bindery_model::{DataContainerNode, MapNode, NodeIdentifierWithPredicates, QName, TreeCandidate};

    fn q(local: &str) -> QName {
        QName::new("urn:test", local)
    }

    #[test]
    fn classifies_generic_nodes() {
        assert_eq!(
            BindingStructuralType::from_node(&NormalizedNode::leaf(q("a"), 1u8)),
            BindingStructuralType::NotAddressable
        );
        assert_eq!(
            BindingStructuralType::from_node(&NormalizedNode::Map(MapNode::new(q("l"), false))),
            BindingStructuralType::InvisibleList
        );
        assert_eq!(
            BindingStructuralType::from_node(&NormalizedNode::Choice(DataContainerNode::new(q("c")))),
            BindingStructuralType::InvisibleContainer
        );
        assert_eq!(
            BindingStructuralType::from_node(&NormalizedNode::Container(DataContainerNode::new(q("t")))),
            BindingStructuralType::VisibleContainer
        );
    }

    #[test]
    fn identifier_fallback_without_data() {
        let entry = TreeCandidate::new(
            PathArgument::NodeWithPredicates(NodeIdentifierWithPredicates::single(q("l"), q("k"), 1u8)),
            ModificationType::Unmodified,
            None,
            None,
            Vec::new(),
        );
        assert_eq!(
            BindingStructuralType::from_candidate(&entry),
            BindingStructuralType::VisibleContainer
        );
        let plain = TreeCandidate::new(PathArgument::NodeId(q("x")), ModificationType::Unmodified, None, None, Vec::new());
        assert_eq!(BindingStructuralType::from_candidate(&plain), BindingStructuralType::Unknown);
    }

    #[test]
    fn nested_invisible_nodes_are_not_addressable() {
        let inner = TreeCandidate::from_diff(
            PathArgument::NodeId(q("inner")),
            None,
            Some(&NormalizedNode::Choice(
                DataContainerNode::new(q("inner")).with_child(NormalizedNode::leaf(q("v"), 1u8)),
            )),
        );
        let outer = TreeCandidate::new(
            PathArgument::NodeId(q("outer")),
            ModificationType::Write,
            None,
            Some(NormalizedNode::Choice(DataContainerNode::new(q("outer")))),
            vec![Arc::new(inner)],
        );
        assert_eq!(
            BindingStructuralType::recursive_from(&outer),
            BindingStructuralType::NotAddressable
        );
        let empty = TreeCandidate::new(
            PathArgument::NodeId(q("outer")),
            ModificationType::Write,
            None,
            Some(NormalizedNode::Map(MapNode::new(q("outer"), false))),
            Vec::new(),
        );
        assert_eq!(
            BindingStructuralType::recursive_from(&empty),
            BindingStructuralType::NotAddressable
        );
    }
}
