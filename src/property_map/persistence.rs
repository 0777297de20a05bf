//! The persisted mapping table: one row per physical column a property map
//! is bound to. Loading is the exact inverse of saving.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::class_map::ClassMap;
use super::column_factory::{ColumnFactory, ColumnId};
use super::errors::PropertyMapError;
use super::maps::PropertyMap;
use crate::schema_catalog::{EcClassId, EcPropertyId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyMappingRow {
    pub class_id: EcClassId,
    /// Id of the top-level property the access string starts with.
    pub root_property_id: EcPropertyId,
    /// Access string; point components carry `.X`/`.Y`/`.Z`.
    pub access_string: String,
    pub column_id: ColumnId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingTable {
    pub rows: Vec<PropertyMappingRow>,
}

impl MappingTable {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn rows_for(&self, class_id: EcClassId) -> impl Iterator<Item = &PropertyMappingRow> {
        self.rows.iter().filter(move |r| r.class_id == class_id)
    }

    /// Append rows for every persisted column of `class_map`. Virtual
    /// columns are skipped; a navigation map that was never finished fails.
    pub fn save_class_map(
        &mut self,
        class_map: &ClassMap,
        factory: &dyn ColumnFactory,
    ) -> Result<usize, PropertyMapError> {
        let mut saved = 0;
        for root in class_map.property_maps().iter() {
            let root_property_id = root.property().id;
            for leaf in leaves_of(root) {
                if leaf.is_pending_navigation() {
                    return Err(PropertyMapError::UnresolvedNavigation {
                        access_string: leaf.access_string().to_string(),
                    });
                }
                for (access_string, column_id) in
                    leaf.column_access_strings().into_iter().zip(leaf.columns())
                {
                    let persisted = factory
                        .column(column_id)
                        .map(|c| !c.is_virtual())
                        .unwrap_or(false);
                    if !persisted {
                        continue;
                    }
                    self.rows.push(PropertyMappingRow {
                        class_id: class_map.class().id,
                        root_property_id,
                        access_string,
                        column_id,
                    });
                    saved += 1;
                }
            }
        }
        Ok(saved)
    }

    /// Bind every leaf of `class_map` from the saved rows. Each leaf must find
    /// exactly as many rows as it has columns, and every column must exist in
    /// one of the class map's tables.
    pub fn load_class_map(
        &self,
        class_map: &mut ClassMap,
        factory: &dyn ColumnFactory,
    ) -> Result<(), PropertyMapError> {
        let class_id = class_map.class().id;
        let class_name = class_map.class().full_name();
        let class_tables = class_map.tables();
        let by_access: HashMap<String, ColumnId> = self
            .rows_for(class_id)
            .map(|r| (r.access_string.to_ascii_lowercase(), r.column_id))
            .collect();

        for leaf in class_map.property_maps_mut().leaves_mut() {
            let expected = leaf.column_access_strings();
            let columns: Vec<ColumnId> = expected
                .iter()
                .filter_map(|a| by_access.get(&a.to_ascii_lowercase()).copied())
                .collect();
            if columns.len() != expected.len() {
                return Err(PropertyMapError::ColumnCountMismatch {
                    class_name,
                    access_string: leaf.access_string().to_string(),
                    expected: expected.len(),
                    found: columns.len(),
                });
            }
            let outside = columns.iter().find(|id| {
                factory
                    .column(**id)
                    .is_some_and(|c| !class_tables.contains(&c.table))
            });
            if let Some(id) = outside {
                return Err(PropertyMapError::ColumnOutsideClassTables {
                    class_name,
                    access_string: leaf.access_string().to_string(),
                    column_id: id.0,
                });
            }
            leaf.set_columns(columns, factory)?;
        }
        Ok(())
    }
}

fn leaves_of(map: &PropertyMap) -> Vec<&PropertyMap> {
    match map.members() {
        Some(members) => members.leaves(),
        None => vec![map],
    }
}
