// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Generic paths: sequences of path arguments addressing generic tree nodes.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::ident::QName;
use crate::value::Value;

/// Identifies one entry of a keyed list: the list name plus its key values.
///
/// Key equality is structural over the key mapping, so binary key components
/// match by content.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeIdentifierWithPredicates {
    name: QName,
    keys: BTreeMap<QName, Value>,
}

impl NodeIdentifierWithPredicates {
    /// Creates an entry identifier from a key mapping.
    pub fn new(name: QName, keys: BTreeMap<QName, Value>) -> Self {
        Self { name, keys }
    }

    /// Creates an entry identifier for a single-leaf key.
    pub fn single(name: QName, key: QName, value: impl Into<Value>) -> Self {
        let mut keys = BTreeMap::new();
        keys.insert(key, value.into());
        Self { name, keys }
    }

    /// The list name.
    pub fn name(&self) -> &QName {
        &self.name
    }

    /// The key mapping.
    pub fn keys(&self) -> &BTreeMap<QName, Value> {
        &self.keys
    }

    /// Value of one key leaf.
    pub fn key(&self, leaf: &QName) -> Option<&Value> {
        self.keys.get(leaf)
    }
}

impl fmt::Display for NodeIdentifierWithPredicates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.name)?;
        for (i, (k, v)) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={v}", k.local_name())?;
        }
        f.write_str("]")
    }
}

/// One step of a [`DataPath`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum PathArgument {
    /// A container, choice, leaf, whole list or unkeyed list entry.
    NodeId(QName),
    /// One keyed list entry.
    NodeWithPredicates(NodeIdentifierWithPredicates),
    /// An augmentation, named by the set of children it may introduce.
    AugmentationId(BTreeSet<QName>),
    /// One leaf-set entry.
    NodeWithValue(QName, Value),
}

impl PathArgument {
    /// Builds an augmentation identifier from its child names.
    pub fn augmentation<I>(names: I) -> Self
    where
        I: IntoIterator<Item = QName>,
    {
        PathArgument::AugmentationId(names.into_iter().collect())
    }

    /// The node name this argument addresses; augmentations have none.
    pub fn node_type(&self) -> Option<&QName> {
        match self {
            PathArgument::NodeId(q) | PathArgument::NodeWithValue(q, _) => Some(q),
            PathArgument::NodeWithPredicates(p) => Some(p.name()),
            PathArgument::AugmentationId(_) => None,
        }
    }
}

impl From<QName> for PathArgument {
    fn from(q: QName) -> Self {
        PathArgument::NodeId(q)
    }
}

impl From<NodeIdentifierWithPredicates> for PathArgument {
    fn from(p: NodeIdentifierWithPredicates) -> Self {
        PathArgument::NodeWithPredicates(p)
    }
}

impl fmt::Display for PathArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathArgument::NodeId(q) => write!(f, "{q}"),
            PathArgument::NodeWithPredicates(p) => write!(f, "{p}"),
            PathArgument::AugmentationId(names) => {
                f.write_str("augmentation{")?;
                for (i, q) in names.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{q}")?;
                }
                f.write_str("}")
            }
            PathArgument::NodeWithValue(q, v) => write!(f, "{q}[{v}]"),
        }
    }
}

/// Generic path: the schema-agnostic address of a node in a generic tree.
///
/// The empty path addresses the data root.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct DataPath(Vec<PathArgument>);

impl DataPath {
    /// The path to the data root.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns a new path with `arg` appended.
    pub fn child(&self, arg: impl Into<PathArgument>) -> Self {
        let mut args = self.0.clone();
        args.push(arg.into());
        Self(args)
    }

    /// Appends `arg` in place.
    pub fn push(&mut self, arg: impl Into<PathArgument>) {
        self.0.push(arg.into());
    }

    /// The path without its last argument; `None` for the root.
    pub fn parent(&self) -> Option<DataPath> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }

    /// The last argument.
    pub fn last(&self) -> Option<&PathArgument> {
        self.0.last()
    }

    /// All arguments, root first.
    pub fn args(&self) -> &[PathArgument] {
        &self.0
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the root path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when `self` is an ancestor of, or equal to, `other`.
    pub fn is_prefix_of(&self, other: &DataPath) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Iterates arguments root first.
    pub fn iter(&self) -> std::slice::Iter<'_, PathArgument> {
        self.0.iter()
    }
}

impl From<Vec<PathArgument>> for DataPath {
    fn from(args: Vec<PathArgument>) -> Self {
        Self(args)
    }
}

impl FromIterator<PathArgument> for DataPath {
    fn from_iter<I: IntoIterator<Item = PathArgument>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a DataPath {
    type Item = &'a PathArgument;
    type IntoIter = std::slice::Iter<'a, PathArgument>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for arg in &self.0 {
            write!(f, "/{arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn q(local: &str) -> QName {
        QName::new("urn:test", local)
    }

    #[test]
    fn binary_keys_identify_the_same_entry() {
        let a = NodeIdentifierWithPredicates::single(
            q("list"),
            q("key"),
            Bytes::from(vec![0xde_u8, 0xad]),
        );
        let b =
            NodeIdentifierWithPredicates::single(q("list"), q("key"), Bytes::from_static(&[0xde, 0xad]));
        assert_eq!(a, b);
        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn prefix_and_parent() {
        let top = DataPath::root().child(q("top"));
        let leaf = top.child(q("leaf"));
        assert!(top.is_prefix_of(&leaf));
        assert!(!leaf.is_prefix_of(&top));
        assert_eq!(leaf.parent(), Some(top));
        assert_eq!(DataPath::root().parent(), None);
    }

    #[test]
    fn display_renders_predicates_and_augmentations() {
        let path = DataPath::root()
            .child(NodeIdentifierWithPredicates::single(q("system"), q("name"), "first"))
            .child(PathArgument::augmentation([q("owner")]));
        assert_eq!(
            path.to_string(),
            "/(urn:test)system[name=first]/augmentation{(urn:test)owner}"
        );
    }
}
