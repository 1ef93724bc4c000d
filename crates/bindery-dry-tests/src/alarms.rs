// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Alarm inventory fixture: `top > system[name] > alarms[id]`.
//!
//! `system` carries an augmentation from a second module (`owner`,
//! `contact`) bound under two class names; [`SystemAugment`] is canonical,
//! [`SYSTEM_AUGMENT_ALIAS`] is the other name.

use std::sync::Arc;

use bindery_codec::{
    Augmentations, BindingClass, BindingError, ClassKind, ClassRegistry, DataObject, Empty,
    FieldSet, FieldValue, Identifiable, ItemKey, LeafRef, LeafValue, RegistryError, TypedValue,
};
use bindery_model::{ClassId, IntegerKind, QName, SchemaBuilder, TypeDefinition};

/// Namespace of the alarms module.
pub const NS: &str = "urn:bindery:alarms";
/// Namespace of the module augmenting `system`.
pub const OWNER_NS: &str = "urn:bindery:alarms-owner";
/// Second class name bound to the `system` augmentation.
pub const SYSTEM_AUGMENT_ALIAS: ClassId = ClassId("alarms.SystemOwnerAugment");

/// Name in the alarms module.
pub fn q(local: &str) -> QName {
    QName::new(NS, local)
}

/// Name in the augmenting module.
pub fn owner_q(local: &str) -> QName {
    QName::new(OWNER_NS, local)
}

/// Adds the alarms model to `b`.
pub fn declare(b: &mut SchemaBuilder) {
    let root = b.root();
    let top = b.container(root, q("top"));
    let system = b.list(top, q("system"), &[q("name")], false);
    b.leaf(system, q("name"), TypeDefinition::string());
    let alarms = b.list(system, q("alarms"), &[q("id")], false);
    b.leaf(alarms, q("id"), TypeDefinition::integer(IntegerKind::Uint64));
    b.leaf(alarms, q("critical"), TypeDefinition::Empty);
    b.leaf(alarms, q("description"), TypeDefinition::string().with_length(0..=64));
    b.leaf(
        alarms,
        q("severity"),
        TypeDefinition::enumeration(&[("minor", 1), ("major", 2), ("critical", 3)]),
    );
    b.leaf_list(alarms, q("tags"), TypeDefinition::string(), true);

    let owner = b.augmentation(system);
    b.leaf(owner, owner_q("owner"), TypeDefinition::string());
    b.leaf(owner, owner_q("contact"), TypeDefinition::string());

    b.bind(top, Top::CLASS)
        .bind(system, System::CLASS)
        .bind(alarms, Alarm::CLASS)
        // Alias first: the canonical name must not depend on binding order.
        .bind(owner, SYSTEM_AUGMENT_ALIAS)
        .bind(owner, SystemAugment::CLASS);
}

/// Registers the alarms classes.
pub fn register(r: &mut ClassRegistry) -> Result<(), RegistryError> {
    r.register::<Top>()?;
    r.register::<System>()?;
    r.register::<Alarm>()?;
    r.register::<SystemAugment>()
}

/// `container top`
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Top {
    /// `list system`
    pub system: Vec<System>,
}

impl DataObject for Top {
    fn implemented_class(&self) -> ClassId {
        Self::CLASS
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "system" if !self.system.is_empty() => Some(FieldValue::list(&self.system)),
            _ => None,
        }
    }
}

impl BindingClass for Top {
    const CLASS: ClassId = ClassId("alarms.Top");
    const KIND: ClassKind = ClassKind::Container;

    fn from_fields(fields: &mut FieldSet) -> Result<Self, BindingError> {
        Ok(Self {
            system: fields.list("system")?,
        })
    }
}

/// `list system`, keyed by `name`.
#[derive(Clone, Debug, PartialEq)]
pub struct System {
    /// Key leaf.
    pub name: String,
    /// `list alarms`
    pub alarms: Vec<Alarm>,
    /// Augmentations.
    pub augmentations: Augmentations,
}

impl System {
    /// Accessor for `name`.
    pub const NAME: LeafRef<System, String> = LeafRef::new("name");

    /// System without alarms.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            alarms: Vec::new(),
            augmentations: Augmentations::new(),
        }
    }

    /// Adds alarms.
    #[must_use]
    pub fn with_alarms(mut self, alarms: impl IntoIterator<Item = Alarm>) -> Self {
        self.alarms.extend(alarms);
        self
    }
}

/// Key of [`System`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SystemKey {
    /// `name`
    pub name: String,
}

impl From<SystemKey> for ItemKey {
    fn from(key: SystemKey) -> Self {
        ItemKey::new().with("name", key.name)
    }
}

impl DataObject for System {
    fn implemented_class(&self) -> ClassId {
        Self::CLASS
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "name" => Some(FieldValue::leaf(self.name.clone())),
            "alarms" if !self.alarms.is_empty() => Some(FieldValue::list(&self.alarms)),
            _ => None,
        }
    }

    fn augmentations(&self) -> Vec<Arc<dyn DataObject>> {
        self.augmentations.to_vec()
    }
}

impl BindingClass for System {
    const CLASS: ClassId = ClassId("alarms.System");
    const KIND: ClassKind = ClassKind::ListEntry;

    fn from_fields(fields: &mut FieldSet) -> Result<Self, BindingError> {
        Ok(Self {
            name: fields.required_leaf("name")?,
            alarms: fields.list("alarms")?,
            augmentations: fields.augmentations(),
        })
    }
}

impl Identifiable for System {
    type Key = SystemKey;

    fn key(&self) -> SystemKey {
        SystemKey {
            name: self.name.clone(),
        }
    }
}

/// `leaf severity`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    /// `minor` (1)
    Minor,
    /// `major` (2)
    Major,
    /// `critical` (3)
    Critical,
}

impl LeafValue for Severity {
    fn into_typed(self) -> TypedValue {
        TypedValue::Enumeration(match self {
            Severity::Minor => 1,
            Severity::Major => 2,
            Severity::Critical => 3,
        })
    }

    fn from_typed(value: TypedValue) -> Option<Self> {
        match value {
            TypedValue::Enumeration(1) => Some(Severity::Minor),
            TypedValue::Enumeration(2) => Some(Severity::Major),
            TypedValue::Enumeration(3) => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// `list alarms`, keyed by `id`.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Alarm {
    /// Key leaf.
    pub id: u64,
    /// `leaf critical { type empty; }`
    pub critical: bool,
    /// Free text, at most 64 characters.
    pub description: Option<String>,
    /// Severity.
    pub severity: Option<Severity>,
    /// User-ordered tags.
    pub tags: Vec<String>,
}

impl Alarm {
    /// Accessor for `id`.
    pub const ID: LeafRef<Alarm, u64> = LeafRef::new("id");
    /// Accessor for `critical`.
    pub const CRITICAL: LeafRef<Alarm, Empty> = LeafRef::new("critical");
    /// Accessor for `description`.
    pub const DESCRIPTION: LeafRef<Alarm, String> = LeafRef::new("description");
    /// Accessor for `severity`.
    pub const SEVERITY: LeafRef<Alarm, Severity> = LeafRef::new("severity");

    /// Alarm `id`, flagged critical or not.
    pub fn new(id: u64, critical: bool) -> Self {
        Self {
            id,
            critical,
            ..Self::default()
        }
    }
}

/// Key of [`Alarm`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AlarmKey {
    /// `id`
    pub id: u64,
}

impl From<AlarmKey> for ItemKey {
    fn from(key: AlarmKey) -> Self {
        ItemKey::new().with("id", key.id)
    }
}

impl DataObject for Alarm {
    fn implemented_class(&self) -> ClassId {
        Self::CLASS
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(FieldValue::leaf(self.id)),
            "critical" => self.critical.then(|| FieldValue::leaf(Empty)),
            "description" => self.description.clone().map(FieldValue::leaf),
            "severity" => self.severity.map(FieldValue::leaf),
            "tags" if !self.tags.is_empty() => Some(FieldValue::leaf_list(self.tags.iter().cloned())),
            _ => None,
        }
    }
}

impl BindingClass for Alarm {
    const CLASS: ClassId = ClassId("alarms.Alarm");
    const KIND: ClassKind = ClassKind::ListEntry;

    fn from_fields(fields: &mut FieldSet) -> Result<Self, BindingError> {
        Ok(Self {
            id: fields.required_leaf("id")?,
            critical: fields.leaf::<Empty>("critical")?.is_some(),
            description: fields.leaf("description")?,
            severity: fields.leaf("severity")?,
            tags: fields.leaf_list("tags")?,
        })
    }
}

impl Identifiable for Alarm {
    type Key = AlarmKey;

    fn key(&self) -> AlarmKey {
        AlarmKey { id: self.id }
    }
}

/// Augmentation of `system` from the owner module.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct SystemAugment {
    /// `owner`
    pub owner: Option<String>,
    /// `contact`
    pub contact: Option<String>,
}

impl SystemAugment {
    /// Accessor for `owner`.
    pub const OWNER: LeafRef<SystemAugment, String> = LeafRef::new("owner");
}

fn owner_field(owner: Option<&str>, contact: Option<&str>, name: &str) -> Option<FieldValue> {
    match name {
        "owner" => owner.map(|s| FieldValue::leaf(s.to_owned())),
        "contact" => contact.map(|s| FieldValue::leaf(s.to_owned())),
        _ => None,
    }
}

impl DataObject for SystemAugment {
    fn implemented_class(&self) -> ClassId {
        Self::CLASS
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        owner_field(self.owner.as_deref(), self.contact.as_deref(), name)
    }
}

impl BindingClass for SystemAugment {
    const CLASS: ClassId = ClassId("alarms.SystemAugment");
    const KIND: ClassKind = ClassKind::Augmentation;

    fn from_fields(fields: &mut FieldSet) -> Result<Self, BindingError> {
        Ok(Self {
            owner: fields.leaf("owner")?,
            contact: fields.leaf("contact")?,
        })
    }
}

/// The same augmentation, implemented under [`SYSTEM_AUGMENT_ALIAS`].
#[derive(Clone, Debug, PartialEq, Default)]
pub struct LegacySystemAugment {
    /// `owner`
    pub owner: Option<String>,
    /// `contact`
    pub contact: Option<String>,
}

impl DataObject for LegacySystemAugment {
    fn implemented_class(&self) -> ClassId {
        SYSTEM_AUGMENT_ALIAS
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        owner_field(self.owner.as_deref(), self.contact.as_deref(), name)
    }
}

/// Query fixture: `first` holds alarms 0 (critical), 1 and 2 (critical);
/// `second` holds alarm 0 (critical).
pub fn query_dataset() -> Top {
    Top {
        system: vec![
            System::new("first").with_alarms([
                Alarm::new(0, true),
                Alarm::new(1, false),
                Alarm::new(2, true),
            ]),
            System::new("second").with_alarms([Alarm::new(0, true)]),
        ],
    }
}
