// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Settings fixture covering the leaf types that need schema help to encode:
//! unions, leafrefs, identityrefs, binary keys, plus an unkeyed list, an
//! anydata child and an action.

use bindery_codec::{
    BindingClass, BindingError, ClassKind, ClassRegistry, DataObject, FieldSet, FieldValue,
    Identifiable, ItemKey, LeafRef, RegistryError, TypedValue,
};
use bindery_model::{ClassId, IntegerKind, OpaquePayload, QName, SchemaBuilder, TypeDefinition};
use bytes::Bytes;

/// Namespace of the settings module.
pub const NS: &str = "urn:bindery:settings";
/// Class of identity `mode`.
pub const MODE: ClassId = ClassId("settings.Mode");
/// Class of identity `fast`, derived from `mode`.
pub const FAST: ClassId = ClassId("settings.Fast");
/// Class of identity `slow`, derived from `mode`.
pub const SLOW: ClassId = ClassId("settings.Slow");

/// Name in the settings module.
pub fn q(local: &str) -> QName {
    QName::new(NS, local)
}

/// Adds the settings model to `b`.
pub fn declare(b: &mut SchemaBuilder) {
    b.identity(q("mode"), MODE, None)
        .identity(q("fast"), FAST, Some(q("mode")))
        .identity(q("slow"), SLOW, Some(q("mode")));

    let root = b.root();
    let settings = b.container(root, q("settings"));
    b.leaf(
        settings,
        q("threshold"),
        TypeDefinition::union(vec![
            TypeDefinition::integer(IntegerKind::Uint8).with_range(0..=100),
            TypeDefinition::string(),
        ]),
    );
    b.leaf(
        settings,
        q("level"),
        TypeDefinition::integer(IntegerKind::Int16).with_range(-100..=100),
    );
    b.leaf(
        settings,
        q("target-level"),
        TypeDefinition::leafref(vec![q("settings"), q("level")]),
    );
    b.leaf(settings, q("mode"), TypeDefinition::identityref(q("mode")));
    b.leaf(settings, q("blob"), TypeDefinition::binary());
    b.anydata(settings, q("extra"));

    let entries = b.list(settings, q("entries"), &[q("blob-id")], false);
    b.leaf(entries, q("blob-id"), TypeDefinition::binary());
    b.leaf(entries, q("note"), TypeDefinition::string());

    let log = b.unkeyed_list(settings, q("log"));
    b.leaf(log, q("message"), TypeDefinition::string());

    let reset = b.action(settings, q("reset"));
    b.leaf(reset.input, q("delay"), TypeDefinition::integer(IntegerKind::Uint32));
    b.leaf(reset.output, q("ok"), TypeDefinition::Boolean);

    b.bind(settings, Settings::CLASS)
        .bind(entries, Entry::CLASS)
        .bind(log, LogLine::CLASS)
        .bind(reset.input, ResetInput::CLASS)
        .bind(reset.output, ResetOutput::CLASS);
}

/// Registers the settings classes.
pub fn register(r: &mut ClassRegistry) -> Result<(), RegistryError> {
    r.register::<Settings>()?;
    r.register::<Entry>()?;
    r.register::<LogLine>()?;
    r.register::<ResetInput>()?;
    r.register::<ResetOutput>()
}

/// `container settings`
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Settings {
    /// `union { uint8 0..100; string }`
    pub threshold: Option<TypedValue>,
    /// `int16 -100..100`
    pub level: Option<i16>,
    /// Leafref to `level`.
    pub target_level: Option<i16>,
    /// Identityref based on `mode`.
    pub mode: Option<ClassId>,
    /// `binary`
    pub blob: Option<Bytes>,
    /// `anydata extra`
    pub extra: Option<OpaquePayload>,
    /// `list entries`, keyed by `blob-id`.
    pub entries: Vec<Entry>,
    /// `list log`, unkeyed.
    pub log: Vec<LogLine>,
}

impl Settings {
    /// Accessor for `level`.
    pub const LEVEL: LeafRef<Settings, i16> = LeafRef::new("level");
    /// Accessor for `threshold`.
    pub const THRESHOLD: LeafRef<Settings, TypedValue> = LeafRef::new("threshold");
}

impl DataObject for Settings {
    fn implemented_class(&self) -> ClassId {
        Self::CLASS
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "threshold" => self.threshold.clone().map(FieldValue::leaf),
            "level" => self.level.map(FieldValue::leaf),
            "target-level" => self.target_level.map(FieldValue::leaf),
            "mode" => self.mode.map(FieldValue::leaf),
            "blob" => self.blob.clone().map(FieldValue::leaf),
            "extra" => self.extra.clone().map(FieldValue::Opaque),
            "entries" if !self.entries.is_empty() => Some(FieldValue::list(&self.entries)),
            "log" if !self.log.is_empty() => Some(FieldValue::list(&self.log)),
            _ => None,
        }
    }
}

impl BindingClass for Settings {
    const CLASS: ClassId = ClassId("settings.Settings");
    const KIND: ClassKind = ClassKind::Container;

    fn from_fields(fields: &mut FieldSet) -> Result<Self, BindingError> {
        Ok(Self {
            threshold: fields.leaf("threshold")?,
            level: fields.leaf("level")?,
            target_level: fields.leaf("target-level")?,
            mode: fields.leaf("mode")?,
            blob: fields.leaf("blob")?,
            extra: fields.opaque("extra")?,
            entries: fields.list("entries")?,
            log: fields.list("log")?,
        })
    }
}

/// `list entries`, keyed by a binary `blob-id`.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    /// Key leaf.
    pub blob_id: Bytes,
    /// `note`
    pub note: Option<String>,
}

impl Entry {
    /// Entry with no note.
    pub fn new(blob_id: impl Into<Bytes>) -> Self {
        Self {
            blob_id: blob_id.into(),
            note: None,
        }
    }
}

/// Key of [`Entry`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntryKey {
    /// `blob-id`
    pub blob_id: Bytes,
}

impl From<EntryKey> for ItemKey {
    fn from(key: EntryKey) -> Self {
        ItemKey::new().with("blob-id", key.blob_id)
    }
}

impl DataObject for Entry {
    fn implemented_class(&self) -> ClassId {
        Self::CLASS
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "blob-id" => Some(FieldValue::leaf(self.blob_id.clone())),
            "note" => self.note.clone().map(FieldValue::leaf),
            _ => None,
        }
    }
}

impl BindingClass for Entry {
    const CLASS: ClassId = ClassId("settings.Entry");
    const KIND: ClassKind = ClassKind::ListEntry;

    fn from_fields(fields: &mut FieldSet) -> Result<Self, BindingError> {
        Ok(Self {
            blob_id: fields.required_leaf("blob-id")?,
            note: fields.leaf("note")?,
        })
    }
}

impl Identifiable for Entry {
    type Key = EntryKey;

    fn key(&self) -> EntryKey {
        EntryKey {
            blob_id: self.blob_id.clone(),
        }
    }
}

/// `list log`, no key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    /// `message`
    pub message: String,
}

impl LogLine {
    /// Accessor for `message`.
    pub const MESSAGE: LeafRef<LogLine, String> = LeafRef::new("message");
}

impl DataObject for LogLine {
    fn implemented_class(&self) -> ClassId {
        Self::CLASS
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        (name == "message").then(|| FieldValue::leaf(self.message.clone()))
    }
}

impl BindingClass for LogLine {
    const CLASS: ClassId = ClassId("settings.LogLine");
    const KIND: ClassKind = ClassKind::ListEntry;

    fn from_fields(fields: &mut FieldSet) -> Result<Self, BindingError> {
        Ok(Self {
            message: fields.required_leaf("message")?,
        })
    }
}

/// Input of action `reset`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ResetInput {
    /// Seconds to wait.
    pub delay: Option<u32>,
}

impl DataObject for ResetInput {
    fn implemented_class(&self) -> ClassId {
        Self::CLASS
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "delay" => self.delay.map(FieldValue::leaf),
            _ => None,
        }
    }
}

impl BindingClass for ResetInput {
    const CLASS: ClassId = ClassId("settings.ResetInput");
    const KIND: ClassKind = ClassKind::Input;

    fn from_fields(fields: &mut FieldSet) -> Result<Self, BindingError> {
        Ok(Self {
            delay: fields.leaf("delay")?,
        })
    }
}

/// Output of action `reset`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ResetOutput {
    /// Whether the reset happened.
    pub ok: bool,
}

impl DataObject for ResetOutput {
    fn implemented_class(&self) -> ClassId {
        Self::CLASS
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        (name == "ok").then(|| FieldValue::leaf(self.ok))
    }
}

impl BindingClass for ResetOutput {
    const CLASS: ClassId = ClassId("settings.ResetOutput");
    const KIND: ClassKind = ClassKind::Output;

    fn from_fields(fields: &mut FieldSet) -> Result<Self, BindingError> {
        Ok(Self {
            ok: fields.required_leaf("ok")?,
        })
    }
}
