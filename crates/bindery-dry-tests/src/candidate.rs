// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Change candidate wrapper that counts child enumerations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bindery_model::{CandidateNode, ModificationType, NormalizedNode, PathArgument};

/// Delegates to an inner candidate and counts every `child_nodes` call in the
/// whole wrapped subtree.
///
/// Used to check that modification views enumerate children at most once per
/// node no matter how often they are asked.
#[derive(Debug, Clone)]
pub struct CountingCandidate {
    inner: Arc<dyn CandidateNode>,
    enumerations: Arc<AtomicUsize>,
}

impl CountingCandidate {
    /// Wraps `inner` with a fresh counter.
    pub fn new(inner: Arc<dyn CandidateNode>) -> Self {
        Self {
            inner,
            enumerations: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn wrap(&self, child: Arc<dyn CandidateNode>) -> Arc<dyn CandidateNode> {
        Arc::new(Self {
            inner: child,
            enumerations: Arc::clone(&self.enumerations),
        })
    }

    /// `child_nodes` calls so far, across the subtree.
    pub fn enumerations(&self) -> usize {
        self.enumerations.load(Ordering::SeqCst)
    }
}

impl CandidateNode for CountingCandidate {
    fn identifier(&self) -> &PathArgument {
        self.inner.identifier()
    }

    fn modification_type(&self) -> ModificationType {
        self.inner.modification_type()
    }

    fn data_before(&self) -> Option<&NormalizedNode> {
        self.inner.data_before()
    }

    fn data_after(&self) -> Option<&NormalizedNode> {
        self.inner.data_after()
    }

    fn child_nodes(&self) -> Vec<Arc<dyn CandidateNode>> {
        self.enumerations.fetch_add(1, Ordering::SeqCst);
        self.inner
            .child_nodes()
            .into_iter()
            .map(|c| self.wrap(c))
            .collect()
    }

    fn modified_child(&self, arg: &PathArgument) -> Option<Arc<dyn CandidateNode>> {
        self.inner.modified_child(arg).map(|c| self.wrap(c))
    }
}
