// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Query execution over generic trees.
use std::collections::BTreeMap;
use std::fmt;
use std::iter;
use std::sync::Arc;

use bindery_codec::{
    downcast_object, BindingClass, BindingCodecContext, CodecError, DataObject, InstancePath, PathStep,
};
use bindery_model::{NodeIdentifierWithPredicates, NormalizedNode, PathArgument};
use tracing::warn;

use crate::builder::{QueryExpression, SelectHop};
use crate::error::QueryError;

/// Runs compiled queries.
pub trait QueryExecutor {
    /// Evaluates `query`; results are produced lazily by the returned
    /// [`QueryResult`].
    fn execute_query<'a, T: BindingClass>(
        &'a self,
        query: &'a QueryExpression<T>,
    ) -> Result<QueryResult<'a, T>, QueryError>;
}

/// Executor over in-memory generic trees, one per top-level node.
pub struct TreeQueryExecutor {
    ctx: Arc<BindingCodecContext>,
    roots: BTreeMap<PathArgument, NormalizedNode>,
}

impl TreeQueryExecutor {
    /// Executor with no data.
    pub fn new(ctx: Arc<BindingCodecContext>) -> Self {
        Self {
            ctx,
            roots: BTreeMap::new(),
        }
    }

    /// Adds a top-level generic node.
    pub fn with_root(mut self, node: NormalizedNode) -> Self {
        self.insert_root(node);
        self
    }

    /// Adds or replaces a top-level generic node, returning the old one.
    pub fn insert_root(&mut self, node: NormalizedNode) -> Option<NormalizedNode> {
        self.roots.insert(node.identifier(), node)
    }

    /// Serializes a top-level object and adds it.
    pub fn add(&mut self, obj: &dyn DataObject) -> Result<(), CodecError> {
        let node = self.ctx.serialize(obj)?;
        self.insert_root(node);
        Ok(())
    }

    /// Context used to deserialize results.
    pub fn context(&self) -> &Arc<BindingCodecContext> {
        &self.ctx
    }
}

impl QueryExecutor for TreeQueryExecutor {
    fn execute_query<'a, T: BindingClass>(
        &'a self,
        query: &'a QueryExpression<T>,
    ) -> Result<QueryResult<'a, T>, QueryError> {
        let current = self.ctx.schema().digest();
        if query.schema_digest() != current {
            return Err(CodecError::SchemaMismatch(format!(
                "query {query} was built against another schema generation"
            ))
            .into());
        }
        Ok(QueryResult {
            ctx: self.ctx.as_ref(),
            roots: &self.roots,
            query,
        })
    }
}

impl fmt::Debug for TreeQueryExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeQueryExecutor")
            .field("roots", &self.roots.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// One matched object and where it was found.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryResultItem<T> {
    path: InstancePath,
    value: T,
}

impl<T> QueryResultItem<T> {
    /// Typed path of the object, with list keys filled in.
    pub fn path(&self) -> &InstancePath {
        &self.path
    }

    /// The object.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// The object, dropping the path.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Path and object.
    pub fn into_parts(self) -> (InstancePath, T) {
        (self.path, self.value)
    }
}

/// Lazily evaluated query results.
///
/// Each iteration walks the trees again, so a result can be iterated any
/// number of times. Enumeration follows the generic trees: insertion order
/// for list entries.
pub struct QueryResult<'a, T> {
    ctx: &'a BindingCodecContext,
    roots: &'a BTreeMap<PathArgument, NormalizedNode>,
    query: &'a QueryExpression<T>,
}

struct Malformed {
    path: InstancePath,
    error: CodecError,
}

type Candidate<'a> = Result<(InstancePath, &'a NormalizedNode), Malformed>;

impl<'a, T: BindingClass> QueryResult<'a, T> {
    /// Matching objects; malformed candidates are logged and skipped.
    pub fn iter(&self) -> impl Iterator<Item = QueryResultItem<T>> + '_ {
        self.evaluated().filter_map(|item| match item {
            Ok(item) => Some(item),
            Err(bad) => {
                warn!(path = %bad.path, error = %bad.error, "skipping malformed query candidate");
                None
            }
        })
    }

    /// Matching objects; the first malformed candidate is yielded as an
    /// error and ends the iteration.
    pub fn try_iter(&self) -> impl Iterator<Item = Result<QueryResultItem<T>, CodecError>> + '_ {
        self.evaluated().scan(false, |failed, item| {
            if *failed {
                return None;
            }
            *failed = item.is_err();
            Some(item.map_err(|bad| {
                warn!(path = %bad.path, error = %bad.error, "query stopped at malformed candidate");
                bad.error
            }))
        })
    }

    /// Collects every matching object.
    ///
    /// Malformed candidates are skipped through [`QueryResult::iter`], unless
    /// the context is configured to fail fast, in which case the first one
    /// is returned as the error.
    pub fn items(&self) -> Result<Vec<QueryResultItem<T>>, CodecError> {
        if self.ctx.config().query_fail_fast {
            self.try_iter().collect()
        } else {
            Ok(self.iter().collect())
        }
    }

    /// The objects of [`QueryResult::items`].
    pub fn values(&self) -> Result<Vec<T>, CodecError> {
        Ok(self.items()?.into_iter().map(QueryResultItem::into_value).collect())
    }

    fn evaluated(&self) -> impl Iterator<Item = Result<QueryResultItem<T>, Malformed>> + '_ {
        self.walk(0, InstancePath::new(), None).filter_map(move |candidate| {
            let (path, node) = match candidate {
                Ok(found) => found,
                Err(bad) => return Some(Err(bad)),
            };
            if !self.query.predicates().iter().all(|p| p.test(node)) {
                return None;
            }
            Some(match self.materialize(node) {
                Ok(value) => Ok(QueryResultItem { path, value }),
                Err(error) => Err(Malformed { path, error }),
            })
        })
    }

    fn materialize(&self, node: &NormalizedNode) -> Result<T, CodecError> {
        let obj = self.ctx.codec_at(self.query.target())?.deserialize(self.ctx, node)?;
        Ok(downcast_object::<T>(obj.as_ref())?)
    }

    /// Lazily walks the extraction chain from hop `depth` on, depth first,
    /// yielding every subtree the last hop reaches.
    fn walk(
        &self,
        depth: usize,
        path: InstancePath,
        node: Option<&'a NormalizedNode>,
    ) -> Box<dyn Iterator<Item = Candidate<'a>> + '_> {
        let Some(hop) = self.query.hops().get(depth) else {
            return Box::new(node.map(|node| Ok((path, node))).into_iter());
        };
        let Some(found) = self.descend(node, &hop.args) else {
            return Box::new(iter::empty());
        };
        if !hop.expand {
            return self.walk(depth + 1, extend(&path, hop.step.clone()), Some(found));
        }
        match found {
            NormalizedNode::Map(map) => Box::new(map.entry_nodes().flat_map(move |(key, entry)| {
                match self.keyed_step(hop, key) {
                    Ok(step) => self.walk(depth + 1, extend(&path, step), Some(entry)),
                    Err(error) => Box::new(iter::once(Err(Malformed {
                        path: extend(&path, hop.step.clone()),
                        error,
                    }))),
                }
            })),
            NormalizedNode::UnkeyedList(list) => Box::new(list.entry_nodes().flat_map(move |entry| {
                self.walk(depth + 1, extend(&path, hop.step.clone()), Some(entry))
            })),
            other => Box::new(iter::once(Err(Malformed {
                path: extend(&path, hop.step.clone()),
                error: CodecError::Deserialization(format!(
                    "expected a list, found node {}",
                    other.identifier()
                )),
            }))),
        }
    }

    fn descend(&self, from: Option<&'a NormalizedNode>, args: &[PathArgument]) -> Option<&'a NormalizedNode> {
        match from {
            Some(node) => node.find(args),
            None => {
                let (first, rest) = args.split_first()?;
                self.roots.get(first)?.find(rest)
            }
        }
    }

    fn keyed_step(
        &self,
        hop: &SelectHop,
        key: &NodeIdentifierWithPredicates,
    ) -> Result<PathStep, CodecError> {
        let codec = self.ctx.codec_at(hop.location)?;
        let key_codec = codec
            .key_codec()
            .ok_or_else(|| CodecError::SchemaMismatch(format!("{} has no key", hop.step)))?;
        Ok(hop.step.clone().with_key(key_codec.from_predicates(key)?))
    }
}

fn extend(path: &InstancePath, step: PathStep) -> InstancePath {
    let mut path = path.clone();
    path.push(step);
    path
}

impl<T> fmt::Debug for QueryResult<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResult")
            .field("query", &self.query.select())
            .finish_non_exhaustive()
    }
}
