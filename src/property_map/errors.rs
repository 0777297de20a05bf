//! Errors raised while mapping properties onto columns, while finishing
//! navigation properties, and while saving or loading the mapping table.

use thiserror::Error;

use crate::schema_catalog::CatalogError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PropertyMapError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Expected {expected} mapped column(s) for `{access_string}` on class {class_name}, found {found}")]
    ColumnCountMismatch {
        class_name: String,
        access_string: String,
        expected: usize,
        found: usize,
    },

    #[error("Column {column_id} bound to `{access_string}` does not exist")]
    UnknownColumn {
        access_string: String,
        column_id: u64,
    },

    #[error("Column {column_id} bound to `{access_string}` is not in a table of class {class_name}")]
    ColumnOutsideClassTables {
        class_name: String,
        access_string: String,
        column_id: u64,
    },

    #[error("Columns of `{access_string}` must all belong to one table")]
    ColumnsSpanTables { access_string: String },

    #[error("Navigation property `{access_string}` uses relationship `{relationship}`, which is mapped to a link table")]
    NavigationOnLinkTable {
        access_string: String,
        relationship: String,
    },

    #[error("No foreign key column `{column}` for navigation property `{access_string}` on class {class_name}")]
    MissingForeignKeyColumn {
        class_name: String,
        access_string: String,
        column: String,
    },

    #[error("Navigation property `{access_string}` was not finished before saving")]
    UnresolvedNavigation { access_string: String },

    #[error("Relationship `{relationship}` has not been mapped")]
    RelationshipNotMapped { relationship: String },

    #[error("Struct `{struct_class}` cannot contain navigation property `{property}`")]
    NavigationInStruct {
        struct_class: String,
        property: String,
    },

    #[error("Struct nesting under `{access_string}` is too deep")]
    StructNestingTooDeep { access_string: String },

    #[error("Column factory failure: {message}")]
    ColumnFactory { message: String },

    #[error("Class {class_name} has not been mapped")]
    ClassNotMapped { class_name: String },
}

impl PropertyMapError {
    pub fn column_factory(message: impl Into<String>) -> Self {
        PropertyMapError::ColumnFactory {
            message: message.into(),
        }
    }
}
