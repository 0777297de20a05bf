pub mod catalog;
pub mod config;
pub mod ec_schema;
pub mod errors;

pub use catalog::{split_qualified_name, SchemaCatalog};
pub use config::{CatalogConfig, ClassDefinition, PropertyDefinition, SchemaDefinition};
pub use ec_schema::{
    ClassKind, Collation, ConstraintEnd, CustomAttributeInstance, EcClass, EcClassId,
    EcInstanceId, EcProperty, EcPropertyId, EcSchema, MapStrategy, PrimitiveType, PropertyKind,
    RelatedDirection, RelationshipConstraint, RelationshipInfo, RelationshipMapping,
    ANY_CLASS_NAME,
};
pub use errors::CatalogError;
