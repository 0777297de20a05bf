use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::schema_catalog::{EcClass, EcClassId, RelatedDirection, ANY_CLASS_NAME};

/// A resolved reference to a catalog class.
///
/// Equality is class identity; the class itself belongs to the catalog.
#[derive(Debug, Clone)]
pub struct ClassSpecifier(Arc<EcClass>);

impl ClassSpecifier {
    pub fn new(class: Arc<EcClass>) -> Self {
        ClassSpecifier(class)
    }

    pub fn id(&self) -> EcClassId {
        self.0.id
    }

    pub fn class(&self) -> &Arc<EcClass> {
        &self.0
    }
}

impl Deref for ClassSpecifier {
    type Target = EcClass;

    fn deref(&self) -> &EcClass {
        &self.0
    }
}

impl PartialEq for ClassSpecifier {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for ClassSpecifier {}

impl fmt::Display for ClassSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0.schema_name, self.0.name)
    }
}

/// The class a hop arrives at; `AnyClass` is an unconstrained wildcard that
/// contributes no join of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelatedClass {
    Class(ClassSpecifier),
    AnyClass,
}

impl RelatedClass {
    pub fn as_class(&self) -> Option<&ClassSpecifier> {
        match self {
            RelatedClass::Class(c) => Some(c),
            RelatedClass::AnyClass => None,
        }
    }

    pub fn class_id(&self) -> Option<EcClassId> {
        self.as_class().map(|c| c.id())
    }

    pub fn is_any_class(&self) -> bool {
        matches!(self, RelatedClass::AnyClass)
    }
}

impl From<Option<ClassSpecifier>> for RelatedClass {
    fn from(class: Option<ClassSpecifier>) -> Self {
        match class {
            Some(c) => RelatedClass::Class(c),
            None => RelatedClass::AnyClass,
        }
    }
}

impl fmt::Display for RelatedClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelatedClass::Class(c) => c.fmt(f),
            RelatedClass::AnyClass => f.write_str(ANY_CLASS_NAME),
        }
    }
}

/// One hop: `[Schema:]RelationshipClass:{0|1}:[Schema:]RelatedClass`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedClassSpecifier {
    pub relationship: ClassSpecifier,
    pub related: RelatedClass,
    pub direction: RelatedDirection,
}

impl fmt::Display for RelatedClassSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.relationship,
            self.direction.marker(),
            self.related
        )
    }
}
