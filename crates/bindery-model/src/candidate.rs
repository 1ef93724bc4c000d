// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Change candidates: before/after pairs of generic subtrees.
//!
//! A data store hands out [`CandidateNode`] trees when it commits a change.
//! [`TreeCandidate`] is the in-memory implementation, computed by diffing two
//! generic trees.
use std::fmt;
use std::sync::Arc;

use crate::node::NormalizedNode;
use crate::path::PathArgument;

/// What happened to a node between `before` and `after`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ModificationType {
    /// The node was written (created or replaced as a whole).
    Write,
    /// Only some descendants changed.
    SubtreeModified,
    /// The node was removed.
    Delete,
    /// Nothing changed.
    Unmodified,
    /// A structural wrapper came into existence as a side effect of a child write.
    Appeared,
    /// A structural wrapper vanished as a side effect of a child delete.
    Disappeared,
}

/// One node of a change tree, as supplied by the data store.
pub trait CandidateNode: Send + Sync + fmt::Debug {
    /// Argument addressing this node from its parent.
    fn identifier(&self) -> &PathArgument;
    /// Kind of change at this node.
    fn modification_type(&self) -> ModificationType;
    /// Node state before the change.
    fn data_before(&self) -> Option<&NormalizedNode>;
    /// Node state after the change.
    fn data_after(&self) -> Option<&NormalizedNode>;
    /// Changed children. Unmodified children may be omitted.
    fn child_nodes(&self) -> Vec<Arc<dyn CandidateNode>>;
    /// A single changed child, without enumerating the others.
    fn modified_child(&self, arg: &PathArgument) -> Option<Arc<dyn CandidateNode>>;
}

/// In-memory candidate produced by [`TreeCandidate::from_diff`].
#[derive(Debug)]
pub struct TreeCandidate {
    id: PathArgument,
    kind: ModificationType,
    before: Option<NormalizedNode>,
    after: Option<NormalizedNode>,
    children: Vec<Arc<TreeCandidate>>,
}

impl TreeCandidate {
    /// Creates a candidate node with explicit contents.
    pub fn new(
        id: PathArgument,
        kind: ModificationType,
        before: Option<NormalizedNode>,
        after: Option<NormalizedNode>,
        children: Vec<Arc<TreeCandidate>>,
    ) -> Self {
        Self {
            id,
            kind,
            before,
            after,
            children,
        }
    }

    /// Diffs two states of the node addressed by `id`.
    ///
    /// Changed children of containers, choices, augmentations and keyed lists
    /// are diffed recursively; leaves, leaf-sets, unkeyed lists and opaque
    /// nodes change as a unit. Unmodified children are omitted.
    pub fn from_diff(
        id: PathArgument,
        before: Option<&NormalizedNode>,
        after: Option<&NormalizedNode>,
    ) -> Self {
        let kind = match (before, after) {
            (None, None) => ModificationType::Unmodified,
            (None, Some(_)) => ModificationType::Write,
            (Some(_), None) => ModificationType::Delete,
            (Some(b), Some(a)) if b == a => ModificationType::Unmodified,
            (Some(b), Some(a)) if same_structure(b, a) => ModificationType::SubtreeModified,
            (Some(_), Some(_)) => ModificationType::Write,
        };
        let children = if kind == ModificationType::Unmodified {
            Vec::new()
        } else {
            diff_children(before, after)
        };
        Self {
            id,
            kind,
            before: before.cloned(),
            after: after.cloned(),
            children,
        }
    }
}

fn same_structure(before: &NormalizedNode, after: &NormalizedNode) -> bool {
    matches!(
        (before, after),
        (NormalizedNode::Container(_), NormalizedNode::Container(_))
            | (NormalizedNode::Choice(_), NormalizedNode::Choice(_))
            | (NormalizedNode::Augmentation(_), NormalizedNode::Augmentation(_))
            | (NormalizedNode::MapEntry(_), NormalizedNode::MapEntry(_))
            | (NormalizedNode::Map(_), NormalizedNode::Map(_))
    )
}

fn child_list(node: Option<&NormalizedNode>) -> Vec<(PathArgument, &NormalizedNode)> {
    match node {
        Some(NormalizedNode::Map(map)) => map
            .entry_nodes()
            .map(|(k, v)| (PathArgument::NodeWithPredicates(k.clone()), v))
            .collect(),
        Some(other) => other
            .as_container()
            .filter(|_| !matches!(other, NormalizedNode::UnkeyedListEntry(_)))
            .map(|body| body.children().iter().map(|(k, v)| (k.clone(), v)).collect())
            .unwrap_or_default(),
        None => Vec::new(),
    }
}

fn lookup<'a>(
    list: &[(PathArgument, &'a NormalizedNode)],
    arg: &PathArgument,
) -> Option<&'a NormalizedNode> {
    list.iter().find(|(k, _)| k == arg).map(|(_, v)| *v)
}

fn diff_children(
    before: Option<&NormalizedNode>,
    after: Option<&NormalizedNode>,
) -> Vec<Arc<TreeCandidate>> {
    let before_children = child_list(before);
    let after_children = child_list(after);
    let mut out = Vec::new();
    for (arg, node) in &after_children {
        let previous = lookup(&before_children, arg);
        let child = TreeCandidate::from_diff(arg.clone(), previous, Some(*node));
        if child.kind != ModificationType::Unmodified {
            out.push(Arc::new(child));
        }
    }
    for (arg, node) in &before_children {
        if lookup(&after_children, arg).is_none() {
            out.push(Arc::new(TreeCandidate::from_diff(arg.clone(), Some(*node), None)));
        }
    }
    out
}

impl CandidateNode for TreeCandidate {
    fn identifier(&self) -> &PathArgument {
        &self.id
    }

    fn modification_type(&self) -> ModificationType {
        self.kind
    }

    fn data_before(&self) -> Option<&NormalizedNode> {
        self.before.as_ref()
    }

    fn data_after(&self) -> Option<&NormalizedNode> {
        self.after.as_ref()
    }

    fn child_nodes(&self) -> Vec<Arc<dyn CandidateNode>> {
        self.children
            .iter()
            .map(|c| Arc::clone(c) as Arc<dyn CandidateNode>)
            .collect()
    }

    fn modified_child(&self, arg: &PathArgument) -> Option<Arc<dyn CandidateNode>> {
        self.children
            .iter()
            .find(|c| &c.id == arg)
            .map(|c| Arc::clone(c) as Arc<dyn CandidateNode>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::QName;
    use crate::node::DataContainerNode;

    fn q(local: &str) -> QName {
        QName::new("urn:test", local)
    }

    fn top(value: u32, extra: bool) -> NormalizedNode {
        let mut body = DataContainerNode::new(q("top")).with_child(NormalizedNode::leaf(q("a"), value));
        if extra {
            body.insert(NormalizedNode::leaf(q("b"), "x"));
        }
        NormalizedNode::Container(body)
    }

    #[test]
    fn leaf_change_is_subtree_modification() {
        let before = top(1, true);
        let after = top(2, true);
        let c = TreeCandidate::from_diff(q("top").into(), Some(&before), Some(&after));
        assert_eq!(c.modification_type(), ModificationType::SubtreeModified);
        let children = c.child_nodes();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].identifier(), &PathArgument::NodeId(q("a")));
        assert_eq!(children[0].modification_type(), ModificationType::Write);
    }

    #[test]
    fn removed_child_is_reported_as_delete() {
        let before = top(1, true);
        let after = top(1, false);
        let c = TreeCandidate::from_diff(q("top").into(), Some(&before), Some(&after));
        let deleted = c.modified_child(&PathArgument::NodeId(q("b")));
        assert_eq!(
            deleted.map(|d| d.modification_type()),
            Some(ModificationType::Delete)
        );
        assert!(c.modified_child(&PathArgument::NodeId(q("a"))).is_none());
    }

    #[test]
    fn equal_states_are_unmodified() {
        let node = top(1, true);
        let c = TreeCandidate::from_diff(q("top").into(), Some(&node), Some(&node));
        assert_eq!(c.modification_type(), ModificationType::Unmodified);
        assert!(c.child_nodes().is_empty());
    }
}
