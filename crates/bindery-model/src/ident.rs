// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Qualified names and typed-class identifiers.
use std::fmt;
use std::sync::Arc;

/// Namespace plus optional revision shared by every name a module defines.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct QNameModule {
    namespace: Arc<str>,
    revision: Option<Arc<str>>,
}

impl QNameModule {
    /// Creates a module without a revision.
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: Arc::from(namespace),
            revision: None,
        }
    }

    /// Creates a module pinned to a revision date (`YYYY-MM-DD`).
    pub fn with_revision(namespace: &str, revision: &str) -> Self {
        Self {
            namespace: Arc::from(namespace),
            revision: Some(Arc::from(revision)),
        }
    }

    /// Namespace URI of the module.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Revision of the module, if pinned.
    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    /// Binds a local name into this module.
    pub fn qname(&self, local_name: &str) -> QName {
        QName {
            namespace: Arc::clone(&self.namespace),
            local_name: Arc::from(local_name),
            revision: self.revision.clone(),
        }
    }
}

/// Qualified name: the identity of every schema node and generic tree label.
///
/// Ordering is namespace first, then local name, then revision. Cloning is
/// cheap; all three parts are reference counted.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QName {
    namespace: Arc<str>,
    local_name: Arc<str>,
    revision: Option<Arc<str>>,
}

impl QName {
    /// Creates a name without a revision.
    pub fn new(namespace: &str, local_name: &str) -> Self {
        QNameModule::new(namespace).qname(local_name)
    }

    /// Creates a name pinned to a module revision.
    pub fn with_revision(namespace: &str, revision: &str, local_name: &str) -> Self {
        QNameModule::with_revision(namespace, revision).qname(local_name)
    }

    /// Name of the conceptual root that holds every top-level data node.
    pub fn data_root() -> Self {
        Self::new("urn:ietf:params:xml:ns:netconf:base:1.0", "data")
    }

    /// Namespace URI.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Local name within the namespace.
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Revision, if pinned.
    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    /// The module this name belongs to.
    pub fn module(&self) -> QNameModule {
        QNameModule {
            namespace: Arc::clone(&self.namespace),
            revision: self.revision.clone(),
        }
    }

    /// A sibling name in the same module.
    pub fn sibling(&self, local_name: &str) -> QName {
        self.module().qname(local_name)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.revision {
            Some(rev) => write!(f, "({}?revision={}){}", self.namespace, rev, self.local_name),
            None => write!(f, "({}){}", self.namespace, self.local_name),
        }
    }
}

impl fmt::Debug for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Identity of a typed class: its fully-qualified type name.
///
/// Ordering is lexicographic over the name, which is what ambiguous-location
/// tie-breaks rely on, so it is stable across runs and builds.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ClassId(pub &'static str);

impl ClassId {
    /// Returns the fully-qualified type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.0
    }

    /// Returns the trailing segment of the type name.
    pub fn simple_name(&self) -> &'static str {
        self.0.rsplit(['.', ':']).next().unwrap_or(self.0)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}
