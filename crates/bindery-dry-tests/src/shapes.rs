// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shapes fixture: one choice, three cases, one class reused in two of them.
//!
//! `modern-box` comes from a second module and reuses the [`Dimensions`]
//! class of `legacy-box`, so a bare `Dimensions` step below `shapes` matches
//! two locations. The same module also augments `legacy-box` with a
//! `finish` leaf ([`BoxFinish`]), so a legacy box may carry nothing but
//! that augmentation.

use std::sync::Arc;

use bindery_codec::{
    downcast_object, Augmentations, BindingClass, BindingError, ClassKind, ClassRegistry,
    DataObject, FieldSet, FieldValue, RegistryError,
};
use bindery_model::{ClassId, IntegerKind, QName, SchemaBuilder, SchemaNodeId, TypeDefinition};

/// Namespace of the shapes module.
pub const NS: &str = "urn:bindery:shapes";
/// Namespace of the module adding `modern-box`.
pub const AUG_NS: &str = "urn:bindery:shapes-aug";

/// Name in the shapes module.
pub fn q(local: &str) -> QName {
    QName::new(NS, local)
}

/// Name in the augmenting module.
pub fn aug_q(local: &str) -> QName {
    QName::new(AUG_NS, local)
}

fn dimensions(b: &mut SchemaBuilder, case: SchemaNodeId, name: fn(&str) -> QName) -> SchemaNodeId {
    let dims = b.container(case, name("dimensions"));
    b.leaf(dims, name("width"), TypeDefinition::integer(IntegerKind::Uint32));
    b.leaf(dims, name("height"), TypeDefinition::integer(IntegerKind::Uint32));
    dims
}

/// Adds the shapes model to `b`.
pub fn declare(b: &mut SchemaBuilder) {
    let root = b.root();
    let shapes = b.container(root, q("shapes"));
    let kind = b.choice(shapes, q("kind"));

    let circle = b.case(kind, q("circle"));
    b.leaf(
        circle,
        q("radius"),
        TypeDefinition::integer(IntegerKind::Uint32).with_range(1..=1000),
    );
    let legacy = b.case(kind, q("legacy-box"));
    let legacy_dims = dimensions(b, legacy, q);
    let modern = b.case(kind, aug_q("modern-box"));
    let modern_dims = dimensions(b, modern, aug_q);
    let finish = b.augmentation(legacy);
    b.leaf(finish, aug_q("finish"), TypeDefinition::string());

    b.bind(shapes, Shapes::CLASS)
        .bind(circle, Circle::CLASS)
        .bind(legacy, LegacyBox::CLASS)
        .bind(modern, ModernBox::CLASS)
        .bind(modern_dims, Dimensions::CLASS)
        .bind(legacy_dims, Dimensions::CLASS)
        .bind(finish, BoxFinish::CLASS);
}

/// Registers the shapes classes.
pub fn register(r: &mut ClassRegistry) -> Result<(), RegistryError> {
    r.register::<Shapes>()?;
    r.register::<Circle>()?;
    r.register::<LegacyBox>()?;
    r.register::<ModernBox>()?;
    r.register::<Dimensions>()?;
    r.register::<BoxFinish>()
}

/// The populated case of `choice kind`.
#[derive(Clone, Debug, PartialEq)]
pub enum ShapeKind {
    /// `case circle`
    Circle(Circle),
    /// `case legacy-box`
    LegacyBox(LegacyBox),
    /// `case modern-box`
    ModernBox(ModernBox),
}

impl ShapeKind {
    fn to_object(&self) -> Arc<dyn DataObject> {
        match self {
            ShapeKind::Circle(c) => Arc::new(c.clone()),
            ShapeKind::LegacyBox(b) => Arc::new(b.clone()),
            ShapeKind::ModernBox(b) => Arc::new(b.clone()),
        }
    }

    fn from_object(obj: &dyn DataObject) -> Result<Self, BindingError> {
        let class = obj.implemented_class();
        if class == Circle::CLASS {
            Ok(ShapeKind::Circle(downcast_object(obj)?))
        } else if class == LegacyBox::CLASS {
            Ok(ShapeKind::LegacyBox(downcast_object(obj)?))
        } else {
            Ok(ShapeKind::ModernBox(downcast_object(obj)?))
        }
    }
}

/// `container shapes`
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Shapes {
    /// `choice kind`
    pub kind: Option<ShapeKind>,
}

impl DataObject for Shapes {
    fn implemented_class(&self) -> ClassId {
        Self::CLASS
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "kind" => self.kind.as_ref().map(|k| FieldValue::Object(k.to_object())),
            _ => None,
        }
    }
}

impl BindingClass for Shapes {
    const CLASS: ClassId = ClassId("shapes.Shapes");
    const KIND: ClassKind = ClassKind::Container;

    fn from_fields(fields: &mut FieldSet) -> Result<Self, BindingError> {
        let kind = fields
            .dyn_object("kind")?
            .map(|obj| ShapeKind::from_object(obj.as_ref()))
            .transpose()?;
        Ok(Self { kind })
    }
}

/// `case circle`
#[derive(Clone, Debug, PartialEq)]
pub struct Circle {
    /// Radius, 1 to 1000.
    pub radius: u32,
}

impl DataObject for Circle {
    fn implemented_class(&self) -> ClassId {
        Self::CLASS
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        (name == "radius").then(|| FieldValue::leaf(self.radius))
    }
}

impl BindingClass for Circle {
    const CLASS: ClassId = ClassId("shapes.Circle");
    const KIND: ClassKind = ClassKind::Case;

    fn from_fields(fields: &mut FieldSet) -> Result<Self, BindingError> {
        Ok(Self {
            radius: fields.required_leaf("radius")?,
        })
    }
}

/// `container dimensions`, used by both box cases.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimensions {
    /// `width`
    pub width: u32,
    /// `height`
    pub height: u32,
}

impl DataObject for Dimensions {
    fn implemented_class(&self) -> ClassId {
        Self::CLASS
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "width" => Some(FieldValue::leaf(self.width)),
            "height" => Some(FieldValue::leaf(self.height)),
            _ => None,
        }
    }
}

impl BindingClass for Dimensions {
    const CLASS: ClassId = ClassId("shapes.Dimensions");
    const KIND: ClassKind = ClassKind::Container;

    fn from_fields(fields: &mut FieldSet) -> Result<Self, BindingError> {
        Ok(Self {
            width: fields.required_leaf("width")?,
            height: fields.required_leaf("height")?,
        })
    }
}

macro_rules! box_case {
    ($name:ident, $class:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Debug, PartialEq, Default)]
        pub struct $name {
            /// `container dimensions`
            pub dimensions: Option<Dimensions>,
            /// Augmentations.
            pub augmentations: Augmentations,
        }

        impl $name {
            /// Box with the given dimensions.
            pub fn new(dimensions: Dimensions) -> Self {
                Self {
                    dimensions: Some(dimensions),
                    augmentations: Augmentations::new(),
                }
            }
        }

        impl DataObject for $name {
            fn implemented_class(&self) -> ClassId {
                Self::CLASS
            }

            fn field(&self, name: &str) -> Option<FieldValue> {
                match name {
                    "dimensions" => self.dimensions.map(FieldValue::object),
                    _ => None,
                }
            }

            fn augmentations(&self) -> Vec<Arc<dyn DataObject>> {
                self.augmentations.to_vec()
            }
        }

        impl BindingClass for $name {
            const CLASS: ClassId = ClassId($class);
            const KIND: ClassKind = ClassKind::Case;

            fn from_fields(fields: &mut FieldSet) -> Result<Self, BindingError> {
                Ok(Self {
                    dimensions: fields.object("dimensions")?,
                    augmentations: fields.augmentations(),
                })
            }
        }
    };
}

box_case!(LegacyBox, "shapes.LegacyBox", "`case legacy-box`");
box_case!(ModernBox, "shapes.ModernBox", "`case modern-box` from the augmenting module");

/// Augmentation of `case legacy-box` from the augmenting module.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct BoxFinish {
    /// `finish`
    pub finish: Option<String>,
}

impl DataObject for BoxFinish {
    fn implemented_class(&self) -> ClassId {
        Self::CLASS
    }

    fn field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "finish" => self.finish.clone().map(FieldValue::leaf),
            _ => None,
        }
    }
}

impl BindingClass for BoxFinish {
    const CLASS: ClassId = ClassId("shapes.BoxFinish");
    const KIND: ClassKind = ClassKind::Augmentation;

    fn from_fields(fields: &mut FieldSet) -> Result<Self, BindingError> {
        Ok(Self {
            finish: fields.leaf("finish")?,
        })
    }
}
