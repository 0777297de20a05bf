use thiserror::Error;

use crate::schema_catalog::CatalogError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PathError {
    #[error("Relationship path is empty.")]
    EmptyPath,

    #[error("Malformed relationship path segment `{segment}`: {reason}")]
    MalformedSegment { segment: String, reason: String },

    #[error("Invalid name `{name}` in relationship path")]
    InvalidName { name: String },

    #[error("Cannot resolve `{name}` in relationship path: {source}")]
    Unresolved { name: String, source: CatalogError },

    #[error("`{class_name}` is not a relationship class")]
    NotARelationship { class_name: String },

    #[error("Hop {hop} via `{relationship}`: {end} constraint does not accept `{class_name}`")]
    ConstraintViolation {
        hop: usize,
        relationship: String,
        end: String,
        class_name: String,
    },

    #[error("Cannot combine `{left}` with `{right}`: the leaf class of the first path does not occur in the second")]
    NoCommonClass { left: String, right: String },

    #[error("Path end is not an AnyClass wildcard")]
    EndIsNotAnyClass,
}
