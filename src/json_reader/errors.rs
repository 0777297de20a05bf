use thiserror::Error;

use crate::property_map::PropertyMapError;
use crate::relationship_path::PathError;
use crate::schema_catalog::CatalogError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReaderError {
    #[error("Failed to prepare `{ecsql}`: {message}")]
    Prepare { ecsql: String, message: String },

    #[error("Failed to execute `{ecsql}`: {message}")]
    Execute { ecsql: String, message: String },

    #[error(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Mapping(#[from] PropertyMapError),

    #[error("Class {class_name} has no class map")]
    UnmappedClass { class_name: String },

    #[error("Malformed row for {class_name}: {message}")]
    MalformedRow { class_name: String, message: String },
}

impl ReaderError {
    pub fn malformed(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        ReaderError::MalformedRow {
            class_name: class_name.into(),
            message: message.into(),
        }
    }
}
