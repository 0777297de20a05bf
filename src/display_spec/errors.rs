use thiserror::Error;

use crate::relationship_path::PathError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DisplaySpecError {
    #[error("Malformed RelatedItemsDisplaySpecifications attribute in schema {schema}: {message}")]
    MalformedAttribute { schema: String, message: String },

    #[error("Invalid related items path `{path}`: {source}")]
    InvalidPath { path: String, source: PathError },

    #[error("Derived class `{class_name}` cannot end path `{path}`: {reason}")]
    InvalidDerivedClass {
        class_name: String,
        path: String,
        reason: String,
    },

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("{skipped} related items display specification(s) were skipped")]
    Incomplete { skipped: usize },
}
