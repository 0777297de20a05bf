//! ecdbmap - relationship paths and property-to-column mapping for EC schemas
//!
//! This crate provides:
//! - An in-memory catalog of EC schemas, classes and properties
//! - Relationship path parsing, reversal, combination and ECSQL generation
//! - Property maps binding property access strings to physical columns
//! - Related-items display specifications cached per connection
//! - JSON reading of instances through the mapped schema

pub mod config;
pub mod connection;
pub mod display_spec;
pub mod json_reader;
pub mod property_map;
pub mod relationship_path;
pub mod schema_catalog;

#[cfg(test)]
pub(crate) mod testing;
