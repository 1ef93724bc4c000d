// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Class registry: class identity to type-erased constructor.
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use bindery_model::ClassId;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::binding::{BindingClass, BindingError, ClassKind, DataObject, FieldSet};

/// Type-erased constructor for one typed class.
pub trait ErasedClass: Send + Sync {
    /// Class handled by this entry.
    fn class(&self) -> ClassId;
    /// Structural role of the class.
    fn kind(&self) -> ClassKind;
    /// Builds an instance from deserialized children.
    fn construct(&self, fields: &mut FieldSet) -> Result<Arc<dyn DataObject>, BindingError>;
}

struct ErasedClassImpl<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: BindingClass> ErasedClass for ErasedClassImpl<T> {
    fn class(&self) -> ClassId {
        T::CLASS
    }

    fn kind(&self) -> ClassKind {
        T::KIND
    }

    fn construct(&self, fields: &mut FieldSet) -> Result<Arc<dyn DataObject>, BindingError> {
        Ok(Arc::new(T::from_fields(fields)?))
    }
}

/// Errors returned when registering classes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Attempted to register the same class twice.
    #[error("[REGISTRY_DUPLICATE_CLASS] duplicate registration for class {0}")]
    DuplicateClass(ClassId),
}

/// Registry of typed classes known to a codec context.
#[derive(Default)]
pub struct ClassRegistry {
    classes: FxHashMap<ClassId, Arc<dyn ErasedClass>>,
}

impl ClassRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers class `T`.
    ///
    /// # Errors
    /// Returns [`RegistryError::DuplicateClass`] if `T::CLASS` is already
    /// registered.
    pub fn register<T: BindingClass>(&mut self) -> Result<(), RegistryError> {
        if self.classes.contains_key(&T::CLASS) {
            return Err(RegistryError::DuplicateClass(T::CLASS));
        }
        self.classes.insert(
            T::CLASS,
            Arc::new(ErasedClassImpl::<T> {
                _marker: PhantomData,
            }),
        );
        Ok(())
    }

    /// Constructor registered for `class` (if any).
    #[must_use]
    pub fn get(&self, class: ClassId) -> Option<&Arc<dyn ErasedClass>> {
        self.classes.get(&class)
    }

    /// True when `class` is registered.
    pub fn contains(&self, class: ClassId) -> bool {
        self.classes.contains_key(&class)
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.classes.keys().collect();
        names.sort();
        f.debug_struct("ClassRegistry").field("classes", &names).finish()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::binding::FieldValue;

    #[derive(Clone, Debug, PartialEq)]
    struct Marker;

    impl DataObject for Marker {
        fn implemented_class(&self) -> ClassId {
            Self::CLASS
        }

        fn field(&self, _name: &str) -> Option<FieldValue> {
            None
        }
    }

    impl BindingClass for Marker {
        const CLASS: ClassId = ClassId("test.Marker");
        const KIND: ClassKind = ClassKind::Container;

        fn from_fields(_fields: &mut FieldSet) -> Result<Self, BindingError> {
            Ok(Marker)
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut reg = ClassRegistry::new();
        reg.register::<Marker>().unwrap();
        assert_eq!(
            reg.register::<Marker>(),
            Err(RegistryError::DuplicateClass(Marker::CLASS))
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn erased_constructor_builds_the_class() {
        let mut reg = ClassRegistry::new();
        reg.register::<Marker>().unwrap();
        let erased = reg.get(Marker::CLASS).unwrap();
        assert_eq!(erased.kind(), ClassKind::Container);
        let obj = erased.construct(&mut FieldSet::new(Marker::CLASS)).unwrap();
        assert_eq!(obj.implemented_class(), Marker::CLASS);
    }
}
