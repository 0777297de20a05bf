use super::catalog::SchemaCatalog;
use super::ec_schema::{
    ClassKind, Collation, CustomAttributeInstance, MapStrategy, PrimitiveType, PropertyKind,
    RelatedDirection, RelationshipConstraint, RelationshipMapping,
};
use super::errors::CatalogError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Schema catalogs are defined in YAML (or JSON) with the following structure:
///
/// ```yaml
/// schemas:
///   - name: TestSchema
///     alias: ts
///     classes:
///       - name: Foo
///         map_strategy: { type: table_per_hierarchy, shared_columns: true }
///         properties:
///           - { name: Name, type: string }
///           - { name: Origin, type: point3d }
///           - { name: Tags, type: string, array: true }
///           - { name: Address, struct: "TestSchema:Address" }
///       - name: Address
///         kind: struct
///         properties:
///           - { name: City, type: string }
///       - name: FooHasGoo
///         kind: relationship
///         source: { classes: ["TestSchema:Foo"] }
///         target: { classes: ["TestSchema:Goo"] }
///         mapping: { strategy: foreign_key, fk_end: target }
/// ```
///
/// Class references may be written `Schema:Class`, `Schema.Class`, use the
/// schema alias, or be left unqualified when they live in the same schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub schemas: Vec<SchemaDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub classes: Vec<ClassDefinition>,
    #[serde(default)]
    pub custom_attributes: Vec<CustomAttributeInstance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDefinition {
    pub name: String,
    #[serde(default = "default_class_kind")]
    pub kind: ClassKind,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub base_classes: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDefinition>,
    #[serde(default)]
    pub source: Option<RelationshipConstraint>,
    #[serde(default)]
    pub target: Option<RelationshipConstraint>,
    #[serde(default)]
    pub mapping: Option<RelationshipMapping>,
    #[serde(default)]
    pub map_strategy: Option<MapStrategy>,
    #[serde(default)]
    pub display_label: Option<String>,
    #[serde(default)]
    pub custom_attributes: Vec<CustomAttributeInstance>,
}

fn default_class_kind() -> ClassKind {
    ClassKind::Entity
}

/// A property declaration; exactly one of `type`, `struct`, or `navigation`
/// must be present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDefinition {
    pub name: String,
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,
    #[serde(default, rename = "struct")]
    pub struct_class: Option<String>,
    #[serde(default)]
    pub navigation: Option<String>,
    #[serde(default)]
    pub direction: Option<RelatedDirection>,
    #[serde(default)]
    pub array: bool,
    #[serde(default)]
    pub column_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub display_label: Option<String>,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub collation: Collation,
}

impl PropertyDefinition {
    pub fn to_property_kind(&self) -> Result<PropertyKind, CatalogError> {
        let declared = [
            self.type_name.is_some(),
            self.struct_class.is_some(),
            self.navigation.is_some(),
        ]
        .iter()
        .filter(|b| **b)
        .count();
        if declared != 1 {
            return Err(CatalogError::invalid(format!(
                "property '{}' must declare exactly one of type, struct, navigation",
                self.name
            )));
        }

        if let Some(type_name) = &self.type_name {
            let primitive_type = PrimitiveType::parse(type_name).ok_or_else(|| {
                CatalogError::invalid(format!(
                    "property '{}' has unknown primitive type '{}'",
                    self.name, type_name
                ))
            })?;
            return Ok(if self.array {
                PropertyKind::PrimitiveArray { primitive_type }
            } else {
                PropertyKind::Primitive { primitive_type }
            });
        }

        if let Some(struct_class) = &self.struct_class {
            let struct_class = struct_class.clone();
            return Ok(if self.array {
                PropertyKind::StructArray { struct_class }
            } else {
                PropertyKind::Struct { struct_class }
            });
        }

        if self.array {
            return Err(CatalogError::invalid(format!(
                "navigation property '{}' cannot be an array",
                self.name
            )));
        }
        let relationship = self.navigation.clone().unwrap_or_default();
        Ok(PropertyKind::Navigation {
            relationship,
            direction: self.direction.unwrap_or(RelatedDirection::Forward),
        })
    }
}

impl CatalogConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, CatalogError> {
        serde_yaml::from_str(content).map_err(|e| CatalogError::ConfigParseError {
            error: e.to_string(),
        })
    }

    pub fn from_json_str(content: &str) -> Result<Self, CatalogError> {
        serde_json::from_str(content).map_err(|e| CatalogError::ConfigParseError {
            error: e.to_string(),
        })
    }

    /// Load a catalog definition from a `.yaml`/`.yml` or `.json` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| CatalogError::ConfigReadError {
            error: format!("{}: {}", path.display(), e),
        })?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    pub fn to_catalog(&self) -> Result<SchemaCatalog, CatalogError> {
        SchemaCatalog::build(self)
    }
}
