//! Typed relationship paths between catalog classes: parsing, reversal,
//! combination, validation, and compilation to ECSQL joins.

pub mod ecsql;
pub mod errors;
pub mod path;
pub mod specifier;

pub use ecsql::{EcSqlOptions, GeneratedEndInfo, GeneratedPathSql, HopAliases, PathAliases};
pub use errors::PathError;
pub use path::{PathEnd, RelationshipPath};
pub use specifier::{ClassSpecifier, RelatedClass, RelatedClassSpecifier};
