// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Typed paths and their translation to and from generic paths.
use std::fmt;

use bindery_model::{ClassId, DataPath, PathArgument, SchemaKind, SchemaNodeId};
use tracing::debug;

use crate::binding::{BindingClass, Identifiable, ItemKey};
use crate::context::BindingCodecContext;
use crate::error::CodecError;

/// One step of an [`InstancePath`]: a class, optionally the case it sits in,
/// and for keyed lists the entry key.
///
/// A keyed-list step without a key is a wildcard.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct PathStep {
    class: ClassId,
    case: Option<ClassId>,
    key: Option<ItemKey>,
}

impl PathStep {
    /// Step to the location bound to `class`.
    pub fn new(class: ClassId) -> Self {
        Self {
            class,
            case: None,
            key: None,
        }
    }

    /// Step to `T`.
    pub fn of<T: BindingClass>() -> Self {
        Self::new(T::CLASS)
    }

    /// Step to one entry of keyed list `T`.
    pub fn keyed<T: Identifiable>(key: T::Key) -> Self {
        Self::new(T::CLASS).with_key(key.into())
    }

    /// Sets the entry key.
    #[must_use]
    pub fn with_key(mut self, key: ItemKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Pins the step to the location inside case `case`.
    #[must_use]
    pub fn in_case(mut self, case: ClassId) -> Self {
        self.case = Some(case);
        self
    }

    /// Target class.
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Enclosing case, when the class is bound in several cases.
    pub fn case(&self) -> Option<ClassId> {
        self.case
    }

    /// Entry key for keyed lists.
    pub fn key(&self) -> Option<&ItemKey> {
        self.key.as_ref()
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(case) = self.case {
            write!(f, "{case}:")?;
        }
        write!(f, "{}", self.class)?;
        if let Some(key) = &self.key {
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

/// Typed path: a sequence of class steps from the data root.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct InstancePath(Vec<PathStep>);

impl InstancePath {
    /// The empty path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a step to `T`.
    #[must_use]
    pub fn child<T: BindingClass>(mut self) -> Self {
        self.0.push(PathStep::of::<T>());
        self
    }

    /// Appends a step to the entry of keyed list `T` with `key`.
    #[must_use]
    pub fn keyed<T: Identifiable>(mut self, key: T::Key) -> Self {
        self.0.push(PathStep::keyed::<T>(key));
        self
    }

    /// Appends a step to `T` inside case `C`.
    #[must_use]
    pub fn case_child<C: BindingClass, T: BindingClass>(mut self) -> Self {
        self.0.push(PathStep::of::<T>().in_case(C::CLASS));
        self
    }

    /// Appends a step.
    pub fn push(&mut self, step: PathStep) {
        self.0.push(step);
    }

    /// Steps from the root.
    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    /// Final step.
    pub fn last(&self) -> Option<&PathStep> {
        self.0.last()
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the root path.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Path without its final step.
    pub fn parent(&self) -> Option<InstancePath> {
        let (_, init) = self.0.split_last()?;
        Some(Self(init.to_vec()))
    }
}

impl fmt::Display for InstancePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for step in &self.0 {
            write!(f, "/{step}")?;
        }
        Ok(())
    }
}

impl FromIterator<PathStep> for InstancePath {
    fn from_iter<I: IntoIterator<Item = PathStep>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl BindingCodecContext {
    /// Schema location `step` addresses below addressable node `parent`.
    pub(crate) fn resolve_step(
        &self,
        parent: SchemaNodeId,
        step: &PathStep,
    ) -> Result<SchemaNodeId, CodecError> {
        let schema = self.schema();
        let mut candidates: Vec<SchemaNodeId> = schema
            .locations(step.class)
            .iter()
            .copied()
            .filter(|loc| schema.addressable_parent(*loc) == Some(parent))
            .filter(|loc| match step.case {
                Some(case) => schema
                    .enclosing_case(*loc)
                    .is_some_and(|c| schema.is_bound(c, case)),
                None => true,
            })
            .collect();
        let location = match candidates.len() {
            0 => {
                return Err(CodecError::SchemaMismatch(format!(
                    "{step} is not a child of {}",
                    schema.describe(parent)
                )));
            }
            1 => candidates[0],
            _ if candidates.iter().all(|c| schema.enclosing_case(*c).is_some()) => {
                candidates.sort_by_key(|c| {
                    (schema.enclosing_case(*c).and_then(|case| schema.canonical_class(case)), *c)
                });
                let chosen = candidates[0];
                debug!(
                    step = %step,
                    chosen = %schema.describe(chosen),
                    candidates = candidates.len(),
                    "step matches several cases; using the lowest case class"
                );
                chosen
            }
            _ => {
                return Err(CodecError::SchemaMismatch(format!(
                    "{step} is ambiguous below {}",
                    schema.describe(parent)
                )));
            }
        };
        match schema.kind(location) {
            SchemaKind::Container | SchemaKind::List { .. } | SchemaKind::Augmentation { .. } => {
                Ok(location)
            }
            other => Err(CodecError::SchemaMismatch(format!(
                "{step} addresses a {}, which has no typed path",
                other.name()
            ))),
        }
    }

    /// Generic arguments for one typed step, with the location reached.
    ///
    /// Choices between `parent` and the target contribute their own
    /// argument; cases contribute none.
    pub fn step_to_generic(
        &self,
        parent: SchemaNodeId,
        step: &PathStep,
    ) -> Result<(SchemaNodeId, Vec<PathArgument>), CodecError> {
        let location = self.resolve_step(parent, step)?;
        let schema = self.schema();

        let mut args = Vec::new();
        let mut cursor = schema.parent(location);
        while let Some(node) = cursor {
            if node == parent {
                break;
            }
            if let (SchemaKind::Choice, Some(q)) = (schema.kind(node), schema.qname(node)) {
                args.push(PathArgument::NodeId(q.clone()));
            }
            cursor = schema.parent(node);
        }
        args.reverse();

        match schema.kind(location) {
            SchemaKind::Augmentation { .. } => {
                if step.key.is_some() {
                    return Err(CodecError::SchemaMismatch(format!("{step}: augmentations have no key")));
                }
                args.push(PathArgument::AugmentationId(schema.augmentation_child_names(location)));
            }
            kind => {
                let q = schema.qname(location).cloned().ok_or_else(|| {
                    CodecError::SchemaMismatch(format!("{step}: unnamed location"))
                })?;
                args.push(PathArgument::NodeId(q));
                match (kind, &step.key) {
                    (SchemaKind::List { keys, .. }, Some(key)) if !keys.is_empty() => {
                        let codec = self.codec_at(location)?;
                        let key_codec = codec.key_codec().ok_or_else(|| {
                            CodecError::SchemaMismatch(format!("{step}: list has no key codec"))
                        })?;
                        args.push(PathArgument::NodeWithPredicates(key_codec.to_predicates(key)?));
                    }
                    (_, Some(_)) => {
                        return Err(CodecError::SchemaMismatch(format!(
                            "{step}: {} is not a keyed list",
                            schema.describe(location)
                        )));
                    }
                    (_, None) => {}
                }
            }
        }
        Ok((location, args))
    }

    /// Translates a typed path into the equivalent generic path.
    ///
    /// A wildcard step (a list step without a key) may only come last.
    pub fn to_generic(&self, path: &InstancePath) -> Result<DataPath, CodecError> {
        let mut parent = self.schema().root();
        let mut out = DataPath::root();
        let mut wildcard: Option<&PathStep> = None;
        for step in path.steps() {
            if let Some(previous) = wildcard {
                return Err(CodecError::SchemaMismatch(format!(
                    "wildcard step {previous} must be the last step of {path}"
                )));
            }
            let (location, args) = self.step_to_generic(parent, step)?;
            for arg in args {
                out.push(arg);
            }
            if matches!(self.schema().kind(location), SchemaKind::List { .. }) && step.key.is_none() {
                wildcard = Some(step);
            }
            parent = location;
        }
        Ok(out)
    }

    /// Translates a generic path into a typed path.
    ///
    /// Returns `None` when the path has no typed equivalent: the root,
    /// leaves and leaf-set entries, opaque nodes, wildcard or unkeyed lists,
    /// a bare choice, or an unbound node. Paths the schema does not know
    /// are errors.
    pub fn from_generic(&self, path: &DataPath) -> Result<Option<InstancePath>, CodecError> {
        if path.is_empty() {
            return Ok(None);
        }
        let schema = self.schema();
        let mut node = schema.root();
        let mut steps = InstancePath::new();
        let mut args = path.iter().peekable();
        while let Some(arg) = args.next() {
            let name = match arg {
                PathArgument::AugmentationId(names) => {
                    let aug = schema.augmentation_by_names(node, names).ok_or_else(|| {
                        CodecError::SchemaMismatch(format!(
                            "{arg} is not an augmentation of {}",
                            schema.describe(node)
                        ))
                    })?;
                    let Some(class) = schema.canonical_class(aug) else {
                        return Ok(None);
                    };
                    steps.push(self.path_step(aug, class, None));
                    node = aug;
                    continue;
                }
                PathArgument::NodeWithValue(..) => return Ok(None),
                PathArgument::NodeId(q) => q,
                PathArgument::NodeWithPredicates(p) => p.name(),
            };
            let child = schema.data_child(node, name).ok_or_else(|| {
                CodecError::SchemaMismatch(format!(
                    "{name} is not valid data tree child of {}",
                    schema.describe(node)
                ))
            })?;
            match schema.kind(child) {
                SchemaKind::Choice => {
                    if args.peek().is_none() {
                        return Ok(None);
                    }
                    node = child;
                    continue;
                }
                SchemaKind::Leaf { .. }
                | SchemaKind::LeafList { .. }
                | SchemaKind::Anydata
                | SchemaKind::Anyxml => return Ok(None),
                SchemaKind::Container => {
                    let Some(class) = schema.canonical_class(child) else {
                        return Ok(None);
                    };
                    steps.push(self.path_step(child, class, None));
                }
                SchemaKind::List { keys, .. } => {
                    if keys.is_empty() {
                        return Ok(None);
                    }
                    let entry = match arg {
                        PathArgument::NodeWithPredicates(p) => p,
                        _ => match args.next_if(|next| {
                            matches!(next, PathArgument::NodeWithPredicates(p) if p.name() == name)
                        }) {
                            Some(PathArgument::NodeWithPredicates(p)) => p,
                            _ => return Ok(None),
                        },
                    };
                    let Some(class) = schema.canonical_class(child) else {
                        return Ok(None);
                    };
                    let key = self.codec_at(child)?.item_key(entry)?;
                    steps.push(self.path_step(child, class, Some(key)));
                }
                other => {
                    return Err(CodecError::SchemaMismatch(format!(
                        "{name} is not valid data tree child of {}: found {}",
                        schema.describe(node),
                        other.name()
                    )));
                }
            }
            node = child;
        }
        Ok(Some(steps))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn display_marks_case_and_key() {
        let step = PathStep::new(ClassId("shapes.Dimensions")).in_case(ClassId("shapes.ModernBox"));
        assert_eq!(step.to_string(), "shapes.ModernBox:shapes.Dimensions");

        let path: InstancePath = [
            PathStep::new(ClassId("alarms.Top")),
            PathStep::new(ClassId("alarms.System")).with_key(ItemKey::new().with("name", String::from("a"))),
        ]
        .into_iter()
        .collect();
        assert_eq!(path.to_string(), "/alarms.Top/alarms.System[name=a]");
        assert_eq!(InstancePath::new().to_string(), "/");
    }

    #[test]
    fn parent_drops_last_step() {
        let path: InstancePath = [PathStep::new(ClassId("a.A")), PathStep::new(ClassId("a.B"))]
            .into_iter()
            .collect();
        let parent = path.parent().expect("parent");
        assert_eq!(parent.len(), 1);
        assert_eq!(parent.last().map(PathStep::class), Some(ClassId("a.A")));
        assert!(InstancePath::new().parent().is_none());
    }
}
