// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Codec context: one schema generation, its class registry and codec cache.
use std::fmt;
use std::sync::Arc;

use bindery_model::{ClassId, DataPath, NormalizedNode, PathArgument, SchemaIndex, SchemaNodeId};
use tracing::debug;

use crate::binding::{downcast_object, BindingClass, DataObject, ItemKey};
use crate::cache::CodecCache;
use crate::config::CodecConfig;
use crate::error::CodecError;
use crate::identifier::{InstancePath, PathStep};
use crate::node_codec::NodeCodec;
use crate::registry::ClassRegistry;

/// Translates between typed objects and generic nodes for one schema.
///
/// Node codecs are built on first use and shared for the lifetime of the
/// context. A schema change means a new context; see
/// [`BindingRuntime`](crate::BindingRuntime).
pub struct BindingCodecContext {
    schema: Arc<SchemaIndex>,
    classes: Arc<ClassRegistry>,
    cache: CodecCache<SchemaNodeId, NodeCodec>,
    config: CodecConfig,
}

impl BindingCodecContext {
    /// Context with default configuration.
    pub fn new(schema: Arc<SchemaIndex>, classes: Arc<ClassRegistry>) -> Self {
        Self::with_config(schema, classes, CodecConfig::default())
    }

    /// Context with explicit configuration.
    pub fn with_config(schema: Arc<SchemaIndex>, classes: Arc<ClassRegistry>, config: CodecConfig) -> Self {
        Self {
            schema,
            classes,
            cache: CodecCache::new(),
            config,
        }
    }

    /// Schema this context serves.
    pub fn schema(&self) -> &Arc<SchemaIndex> {
        &self.schema
    }

    /// Registered typed classes.
    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    /// Configuration.
    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Number of node codec constructions started so far.
    pub fn codec_constructions(&self) -> usize {
        self.cache.construction_count()
    }

    /// Codec for a schema location, built on first use.
    pub fn codec_at(&self, location: SchemaNodeId) -> Result<Arc<NodeCodec>, CodecError> {
        self.cache
            .get_or_build(location, || NodeCodec::build(self, location))
    }

    /// Canonical location of `class`.
    ///
    /// A class bound at several places resolves to the one outside any case,
    /// else to the one whose case has the lowest class name.
    pub fn location_of(&self, class: ClassId) -> Result<SchemaNodeId, CodecError> {
        let locations = self.schema.locations(class);
        match locations {
            [] => Err(CodecError::SchemaMismatch(format!(
                "{class} is not bound in the current schema"
            ))),
            [only] => Ok(*only),
            _ => {
                let chosen = locations
                    .iter()
                    .copied()
                    .min_by_key(|loc| {
                        let case = self
                            .schema
                            .enclosing_case(*loc)
                            .and_then(|c| self.schema.canonical_class(c));
                        (case, *loc)
                    })
                    .ok_or_else(|| CodecError::SchemaMismatch(format!("{class} has no location")))?;
                debug!(
                    class = %class,
                    chosen = %self.schema.describe(chosen),
                    candidates = locations.len(),
                    "class bound at several locations"
                );
                Ok(chosen)
            }
        }
    }

    /// Codec for the canonical location of `class`.
    pub fn codec(&self, class: ClassId) -> Result<Arc<NodeCodec>, CodecError> {
        self.codec_at(self.location_of(class)?)
    }

    /// Serializes an object at its class's canonical location.
    pub fn serialize(&self, obj: &dyn DataObject) -> Result<NormalizedNode, CodecError> {
        self.codec(obj.implemented_class())?.serialize(self, obj)
    }

    /// Serializes an object stored at `path`, returning the concrete generic
    /// path and node.
    ///
    /// A wildcard list step is completed with the entry's own key; a keyed
    /// step must agree with it.
    pub fn serialize_at(
        &self,
        path: &InstancePath,
        obj: &dyn DataObject,
    ) -> Result<(DataPath, NormalizedNode), CodecError> {
        let last = path
            .last()
            .ok_or_else(|| CodecError::SchemaMismatch("cannot store an object at the root".to_owned()))?;
        let location = self.resolve_path(path)?;
        if !self.schema.is_bound(location, obj.implemented_class()) {
            return Err(CodecError::SchemaMismatch(format!(
                "{} cannot be stored at {path}",
                obj.implemented_class()
            )));
        }
        let mut generic = self.to_generic(path)?;
        let node = self.codec_at(location)?.serialize(self, obj)?;
        if let PathArgument::NodeWithPredicates(entry) = node.identifier() {
            let agrees = matches!(
                generic.last(),
                Some(PathArgument::NodeWithPredicates(expected)) if expected == &entry
            );
            match last.key() {
                None => generic.push(entry),
                Some(_) if agrees => {}
                Some(key) => {
                    return Err(CodecError::SchemaMismatch(format!(
                        "entry {entry} does not match path key {key}"
                    )));
                }
            }
        }
        Ok((generic, node))
    }

    /// Deserializes a generic node as `class`.
    pub fn deserialize(&self, node: &NormalizedNode, class: ClassId) -> Result<Arc<dyn DataObject>, CodecError> {
        self.codec(class)?.deserialize(self, node)
    }

    /// Deserializes a generic node as the concrete class `T`.
    pub fn deserialize_as<T: BindingClass>(&self, node: &NormalizedNode) -> Result<T, CodecError> {
        let obj = self.deserialize(node, T::CLASS)?;
        Ok(downcast_object::<T>(obj.as_ref())?)
    }

    /// Typed path and object for a generic path and node.
    ///
    /// `Ok(None)` when the path has no typed equivalent.
    pub fn from_normalized(
        &self,
        path: &DataPath,
        node: &NormalizedNode,
    ) -> Result<Option<(InstancePath, Arc<dyn DataObject>)>, CodecError> {
        let Some(typed) = self.from_generic(path)? else {
            return Ok(None);
        };
        let location = self.resolve_path(&typed)?;
        let obj = self.codec_at(location)?.deserialize(self, node)?;
        Ok(Some((typed, obj)))
    }

    /// Location addressed by a typed path.
    pub(crate) fn resolve_path(&self, path: &InstancePath) -> Result<SchemaNodeId, CodecError> {
        path.steps()
            .iter()
            .try_fold(self.schema.root(), |parent, step| self.resolve_step(parent, step))
    }

    /// Typed step for `location`, naming its case when the class alone is
    /// ambiguous below the addressable parent.
    pub(crate) fn path_step(&self, location: SchemaNodeId, class: ClassId, key: Option<ItemKey>) -> PathStep {
        let parent = self.schema.addressable_parent(location);
        let ambiguous = self
            .schema
            .locations(class)
            .iter()
            .filter(|loc| self.schema.addressable_parent(**loc) == parent)
            .count()
            > 1;
        let mut step = PathStep::new(class);
        if ambiguous {
            if let Some(case) = self
                .schema
                .enclosing_case(location)
                .and_then(|c| self.schema.canonical_class(c))
            {
                step = step.in_case(case);
            }
        }
        match key {
            Some(key) => step.with_key(key),
            None => step,
        }
    }
}

impl fmt::Debug for BindingCodecContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingCodecContext")
            .field("schema", &self.schema.digest())
            .field("classes", &self.classes.len())
            .field("cache", &self.cache)
            .field("config", &self.config)
            .finish()
    }
}
