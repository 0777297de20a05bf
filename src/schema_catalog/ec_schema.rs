use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Name of the wildcard constraint class accepting every class.
pub const ANY_CLASS_NAME: &str = "AnyClass";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EcClassId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EcPropertyId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EcInstanceId(pub u64);

impl fmt::Display for EcClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl fmt::Display for EcInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    Entity,
    Struct,
    Relationship,
    CustomAttribute,
}

/// Direction of a hop through a relationship class.
///
/// Forward walks from the relationship's source end to its target end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelatedDirection {
    Forward,
    Backward,
}

impl RelatedDirection {
    pub fn reversed(self) -> Self {
        match self {
            RelatedDirection::Forward => RelatedDirection::Backward,
            RelatedDirection::Backward => RelatedDirection::Forward,
        }
    }

    /// Constraint end holding the class the hop starts from.
    pub fn from_end(self) -> ConstraintEnd {
        match self {
            RelatedDirection::Forward => ConstraintEnd::Source,
            RelatedDirection::Backward => ConstraintEnd::Target,
        }
    }

    /// Constraint end holding the class the hop arrives at.
    pub fn to_end(self) -> ConstraintEnd {
        self.from_end().opposite()
    }

    /// Marker used in the textual path grammar (`0` forward, `1` backward).
    pub fn marker(self) -> char {
        match self {
            RelatedDirection::Forward => '0',
            RelatedDirection::Backward => '1',
        }
    }
}

impl fmt::Display for RelatedDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelatedDirection::Forward => f.write_str("forward"),
            RelatedDirection::Backward => f.write_str("backward"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintEnd {
    Source,
    Target,
}

impl ConstraintEnd {
    pub fn opposite(self) -> Self {
        match self {
            ConstraintEnd::Source => ConstraintEnd::Target,
            ConstraintEnd::Target => ConstraintEnd::Source,
        }
    }

    /// Prefix of the relationship's system properties for this end,
    /// e.g. `SourceECInstanceId`.
    pub fn system_prefix(self) -> &'static str {
        match self {
            ConstraintEnd::Source => "Source",
            ConstraintEnd::Target => "Target",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    Binary,
    Boolean,
    DateTime,
    Double,
    Integer,
    Long,
    Point2d,
    Point3d,
    String,
    IGeometry,
}

impl PrimitiveType {
    pub fn parse(type_name: &str) -> Option<Self> {
        let ty = match type_name.to_ascii_lowercase().as_str() {
            "binary" => PrimitiveType::Binary,
            "boolean" | "bool" => PrimitiveType::Boolean,
            "datetime" => PrimitiveType::DateTime,
            "double" => PrimitiveType::Double,
            "int" | "integer" => PrimitiveType::Integer,
            "long" => PrimitiveType::Long,
            "point2d" => PrimitiveType::Point2d,
            "point3d" => PrimitiveType::Point3d,
            "string" => PrimitiveType::String,
            "igeometry" | "bentley.geometry.common.igeometry" => PrimitiveType::IGeometry,
            _ => return None,
        };
        Some(ty)
    }

    pub fn is_point(self) -> bool {
        matches!(self, PrimitiveType::Point2d | PrimitiveType::Point3d)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropertyKind {
    Primitive { primitive_type: PrimitiveType },
    PrimitiveArray { primitive_type: PrimitiveType },
    Struct { struct_class: String },
    StructArray { struct_class: String },
    Navigation {
        relationship: String,
        direction: RelatedDirection,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Collation {
    #[default]
    Unset,
    Binary,
    NoCase,
    RTrim,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EcProperty {
    pub id: EcPropertyId,
    pub name: String,
    pub kind: PropertyKind,
    /// Explicit column name from the property's mapping custom attribute.
    pub column_name: Option<String>,
    pub category: Option<String>,
    pub display_label: Option<String>,
    pub not_null: bool,
    pub unique: bool,
    pub collation: Collation,
}

impl EcProperty {
    pub fn display_label(&self) -> &str {
        self.display_label.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipConstraint {
    /// Qualified names (`Schema:Class`) of the classes this end accepts.
    pub classes: Vec<String>,
    #[serde(default = "default_polymorphic")]
    pub polymorphic: bool,
}

fn default_polymorphic() -> bool {
    true
}

impl RelationshipConstraint {
    pub fn is_any_class(&self) -> bool {
        self.classes.iter().any(|c| is_any_class_name(c))
    }
}

/// How a relationship is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RelationshipMapping {
    LinkTable,
    ForeignKey {
        /// End whose table carries the foreign key column.
        fk_end: ConstraintEnd,
        /// Foreign key column name; derived from the relationship name if absent.
        #[serde(default)]
        column: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipInfo {
    pub source: RelationshipConstraint,
    pub target: RelationshipConstraint,
    pub mapping: RelationshipMapping,
}

impl RelationshipInfo {
    pub fn constraint(&self, end: ConstraintEnd) -> &RelationshipConstraint {
        match end {
            ConstraintEnd::Source => &self.source,
            ConstraintEnd::Target => &self.target,
        }
    }
}

/// Table mapping strategy declared on a root class and inherited by subclasses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MapStrategy {
    #[default]
    OwnTable,
    TablePerHierarchy {
        #[serde(default)]
        shared_columns: bool,
        #[serde(default)]
        joined_table: bool,
    },
    NotMapped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomAttributeInstance {
    /// Custom attribute class name, optionally schema-qualified.
    pub class_name: String,
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl CustomAttributeInstance {
    /// Unqualified class name of the attribute.
    pub fn short_name(&self) -> &str {
        self.class_name
            .rsplit([':', '.'])
            .next()
            .unwrap_or(&self.class_name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EcClass {
    pub id: EcClassId,
    pub schema_name: String,
    pub schema_alias: String,
    pub name: String,
    pub kind: ClassKind,
    pub is_abstract: bool,
    pub base_class_ids: Vec<EcClassId>,
    /// Properties declared on this class only.
    pub properties: Vec<Arc<EcProperty>>,
    pub relationship: Option<RelationshipInfo>,
    pub map_strategy: Option<MapStrategy>,
    pub custom_attributes: Vec<CustomAttributeInstance>,
    pub display_label: Option<String>,
}

impl EcClass {
    /// Name in path grammar form: `Schema:Class`.
    pub fn full_name(&self) -> String {
        format!("{}:{}", self.schema_name, self.name)
    }

    /// Name in ECSQL / JSON form: `Schema.Class`.
    pub fn ecsql_name(&self) -> String {
        format!("{}.{}", self.schema_name, self.name)
    }

    pub fn is_relationship(&self) -> bool {
        self.kind == ClassKind::Relationship
    }

    pub fn is_struct(&self) -> bool {
        self.kind == ClassKind::Struct
    }

    pub fn display_label(&self) -> &str {
        self.display_label.as_deref().unwrap_or(&self.name)
    }

    pub fn own_property(&self, name: &str) -> Option<&Arc<EcProperty>> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

pub fn is_any_class_name(name: &str) -> bool {
    let short = name.rsplit([':', '.']).next().unwrap_or(name);
    short.eq_ignore_ascii_case(ANY_CLASS_NAME)
}

/// Schema-level metadata; classes live in the catalog and are referenced by id.
#[derive(Debug, Clone, PartialEq)]
pub struct EcSchema {
    pub name: String,
    pub alias: String,
    pub class_ids: Vec<EcClassId>,
    pub custom_attributes: Vec<CustomAttributeInstance>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_ends() {
        assert_eq!(RelatedDirection::Forward.from_end(), ConstraintEnd::Source);
        assert_eq!(RelatedDirection::Forward.to_end(), ConstraintEnd::Target);
        assert_eq!(RelatedDirection::Backward.from_end(), ConstraintEnd::Target);
        assert_eq!(RelatedDirection::Backward.reversed(), RelatedDirection::Forward);
        assert_eq!(RelatedDirection::Backward.marker(), '1');
    }

    #[test]
    fn test_primitive_type_parse() {
        assert_eq!(PrimitiveType::parse("Point3d"), Some(PrimitiveType::Point3d));
        assert_eq!(PrimitiveType::parse("int"), Some(PrimitiveType::Integer));
        assert_eq!(PrimitiveType::parse("decimal"), None);
        assert!(PrimitiveType::Point2d.is_point());
        assert!(!PrimitiveType::Long.is_point());
    }

    #[test]
    fn test_any_class_names() {
        assert!(is_any_class_name("AnyClass"));
        assert!(is_any_class_name("ECDbMeta:AnyClass"));
        assert!(!is_any_class_name("TestSchema:Foo"));
    }

    #[test]
    fn test_custom_attribute_short_name() {
        let ca = CustomAttributeInstance {
            class_name: "Bentley_Standard_CustomAttributes:RelatedItemsDisplaySpecifications"
                .to_string(),
            properties: serde_json::Value::Null,
        };
        assert_eq!(ca.short_name(), "RelatedItemsDisplaySpecifications");
    }

    #[test]
    fn test_ids_render_as_hex() {
        assert_eq!(EcInstanceId(31).to_string(), "0x1f");
        assert_eq!(EcClassId(255).to_string(), "0xff");
    }
}
