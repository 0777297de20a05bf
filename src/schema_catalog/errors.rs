//! # Schema Catalog Error Types
//!
//! Errors raised while building the in-memory schema catalog from its YAML/JSON
//! definition and while resolving class or property names against it.
//!
//! ## Error Categories
//!
//! - **Resolution Errors**: unknown schema, class, or property names
//! - **Definition Errors**: a catalog definition that is internally inconsistent
//! - **Configuration Errors**: file I/O and parsing issues during catalog loading

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("No schema found for `{schema}`")]
    UnknownSchema { schema: String },
    #[error("No class found for `{class_name}`")]
    UnknownClass { class_name: String },
    #[error("Class name `{class_name}` is ambiguous; qualify it with a schema name")]
    AmbiguousClass { class_name: String },
    #[error("No property `{property}` found on class `{class_name}`")]
    UnknownProperty { class_name: String, property: String },
    #[error("Invalid catalog definition: {message}")]
    InvalidDefinition { message: String },
    #[error("Failed to read catalog file: {error}")]
    ConfigReadError { error: String },
    #[error("Failed to parse catalog: {error}")]
    ConfigParseError { error: String },
}

impl CatalogError {
    /// Create an UnknownClass error with context information
    ///
    /// # Example
    /// ```ignore
    /// CatalogError::class_error_with_context(
    ///     "TestSchema:Foo",
    ///     "Resolving root of relationship path"
    /// )
    /// ```
    pub fn class_error_with_context(
        class_name: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        CatalogError::UnknownClass {
            class_name: format!("{}\n  Context: {}", class_name.into(), context.into()),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        CatalogError::InvalidDefinition {
            message: message.into(),
        }
    }
}
