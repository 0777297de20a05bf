use std::collections::HashSet;
use std::sync::Arc;

use super::collection::PropertyMapCollection;
use super::column_factory::{ColumnId, TableId};
use crate::schema_catalog::{EcClass, MapStrategy};

/// Mapping of one class: its tables and the tree of property maps.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMap {
    class: Arc<EcClass>,
    strategy: MapStrategy,
    primary_table: TableId,
    /// Table holding properties introduced below the hierarchy root when
    /// the hierarchy uses joined tables.
    joined_table: Option<TableId>,
    property_maps: PropertyMapCollection,
}

impl ClassMap {
    pub fn new(
        class: Arc<EcClass>,
        strategy: MapStrategy,
        primary_table: TableId,
        joined_table: Option<TableId>,
    ) -> Self {
        ClassMap {
            class,
            strategy,
            primary_table,
            joined_table,
            property_maps: PropertyMapCollection::new(),
        }
    }

    pub fn class(&self) -> &Arc<EcClass> {
        &self.class
    }

    pub fn strategy(&self) -> MapStrategy {
        self.strategy
    }

    pub fn primary_table(&self) -> TableId {
        self.primary_table
    }

    pub fn joined_table(&self) -> Option<TableId> {
        self.joined_table
    }

    /// Primary table first, then the joined table if any.
    pub fn tables(&self) -> Vec<TableId> {
        std::iter::once(self.primary_table)
            .chain(self.joined_table)
            .collect()
    }

    pub fn uses_shared_columns(&self) -> bool {
        matches!(
            self.strategy,
            MapStrategy::TablePerHierarchy {
                shared_columns: true,
                ..
            }
        )
    }

    pub fn property_maps(&self) -> &PropertyMapCollection {
        &self.property_maps
    }

    pub fn property_maps_mut(&mut self) -> &mut PropertyMapCollection {
        &mut self.property_maps
    }

    /// Every column bound by this class's property maps.
    pub fn columns_in_use(&self) -> HashSet<ColumnId> {
        self.property_maps
            .iter()
            .flat_map(|m| m.columns())
            .collect()
    }
}
