//! Property-to-column mapping.
//!
//! Every mapped class owns a [`ClassMap`] whose [`PropertyMapCollection`]
//! binds each property access string to physical columns handed out by a
//! [`ColumnFactory`]. The [`SchemaMapper`] drives a mapping session over a
//! whole catalog; [`MappingTable`] persists the result.

pub mod class_map;
pub mod collection;
pub mod column_factory;
pub mod errors;
pub mod factory;
pub mod mapper;
pub mod maps;
pub mod navigation;
pub mod persistence;

pub use class_map::ClassMap;
pub use collection::{PropertyMapCollection, TraversalFeedback};
pub use column_factory::{
    ColumnFactory, ColumnId, ColumnKind, ColumnRequest, ColumnType, DbColumn, DbSchema, DbTable,
    TableId, TableKind,
};
pub use errors::PropertyMapError;
pub use factory::{clone_property_map, create_property_map, find_or_create_columns, ColumnContext};
pub use mapper::{table_name, SchemaMapper};
pub use maps::{NavigationState, PropertyMap, PropertyMapData, PropertyMapKind};
pub use navigation::{LoadContext, PendingNavigation};
pub use persistence::{MappingTable, PropertyMappingRow};
