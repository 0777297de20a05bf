//! Maps every class of a catalog onto tables and columns.
//!
//! Classes are mapped base classes first. A subclass starts from clones of
//! its bases' property maps, then adds maps for the properties it declares.
//! Relationships are mapped after all other classes so that foreign key
//! columns land in tables that already exist; navigation maps are finished
//! last.

use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;

use super::class_map::ClassMap;
use super::column_factory::{ColumnFactory, ColumnRequest, ColumnType, DbSchema, TableId, TableKind};
use super::errors::PropertyMapError;
use super::factory::{clone_property_map, create_property_map, find_or_create_columns, ColumnContext};
use super::navigation::{foreign_key_column_name, postprocess_navigation, LoadContext};
use super::persistence::MappingTable;
use crate::schema_catalog::{
    Collation, ConstraintEnd, EcClass, EcClassId, MapStrategy, RelationshipMapping, SchemaCatalog,
};

const LINK_TABLE_COLUMNS: [&str; 4] = [
    "SourceECInstanceId",
    "SourceECClassId",
    "TargetECInstanceId",
    "TargetECClassId",
];

/// A mapping session over one catalog.
pub struct SchemaMapper<'c, F: ColumnFactory = DbSchema> {
    catalog: &'c SchemaCatalog,
    factory: F,
    class_maps: IndexMap<EcClassId, ClassMap>,
    context: LoadContext,
}

impl<'c, F: ColumnFactory> SchemaMapper<'c, F> {
    pub fn new(catalog: &'c SchemaCatalog, factory: F) -> Self {
        SchemaMapper {
            catalog,
            factory,
            class_maps: IndexMap::new(),
            context: LoadContext::default(),
        }
    }

    pub fn catalog(&self) -> &'c SchemaCatalog {
        self.catalog
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn into_factory(self) -> F {
        self.factory
    }

    pub fn class_map(&self, id: EcClassId) -> Option<&ClassMap> {
        self.class_maps.get(&id)
    }

    pub fn class_maps(&self) -> impl Iterator<Item = &ClassMap> {
        self.class_maps.values()
    }

    /// Map every class, creating tables and columns as needed.
    pub fn map_all(&mut self) -> Result<(), PropertyMapError> {
        self.map_classes(None)?;
        postprocess_navigation(
            &mut self.context,
            self.catalog,
            &mut self.class_maps,
            &self.factory,
        )?;
        log::debug!("Mapped {} classes", self.class_maps.len());
        Ok(())
    }

    /// Rebuild every class map against existing tables, binding columns from
    /// a previously saved mapping table.
    pub fn load_all(&mut self, saved: &MappingTable) -> Result<(), PropertyMapError> {
        self.map_classes(Some(saved))?;
        // Navigation columns come straight from the saved rows.
        self.context.take_pending();
        Ok(())
    }

    /// Rows for every mapped class, in mapping order.
    pub fn save(&self) -> Result<MappingTable, PropertyMapError> {
        let mut table = MappingTable::default();
        for class_map in self.class_maps.values() {
            table.save_class_map(class_map, &self.factory)?;
        }
        Ok(table)
    }

    fn map_classes(&mut self, saved: Option<&MappingTable>) -> Result<(), PropertyMapError> {
        let catalog = self.catalog;
        let (relationships, others): (Vec<_>, Vec<_>) = catalog
            .classes()
            .iter()
            .partition(|c| c.is_relationship());
        for class in others.into_iter().chain(relationships) {
            self.map_class(class, saved)?;
        }
        Ok(())
    }

    fn map_class(
        &mut self,
        class: &Arc<EcClass>,
        saved: Option<&MappingTable>,
    ) -> Result<(), PropertyMapError> {
        if self.class_maps.contains_key(&class.id) {
            return Ok(());
        }
        for base_id in &class.base_class_ids {
            let base = self.catalog.get_class(*base_id)?.clone();
            self.map_class(&base, saved)?;
        }

        let strategy = self.catalog.effective_map_strategy(class);
        let (primary_table, joined_table) = self.tables_for(class, strategy)?;
        let mut class_map = ClassMap::new(class.clone(), strategy, primary_table, joined_table);
        let loading = saved.is_some();

        // Inherited maps keep their columns when the subclass shares the table.
        for base_id in &class.base_class_ids {
            let Some(base_map) = self.class_maps.get(base_id) else {
                continue;
            };
            let keep_columns = !loading && base_map.primary_table() == primary_table;
            for proto in base_map.property_maps().iter() {
                let clone = clone_property_map(&mut self.context, proto, class.id, keep_columns);
                class_map.property_maps_mut().insert(clone);
            }
        }

        let mut own = HashSet::new();
        for property in &class.properties {
            if class_map.property_maps().get(&property.name).is_some() {
                continue;
            }
            let map = create_property_map(
                &mut self.context,
                self.catalog,
                class,
                property,
                &property.name,
                None,
            )?;
            own.insert(property.name.to_ascii_lowercase());
            class_map.property_maps_mut().insert(map);
        }

        let is_virtual = self
            .factory
            .table(primary_table)
            .map(|t| t.kind == TableKind::Virtual)
            .unwrap_or(false);
        match saved {
            Some(saved) if !is_virtual => saved.load_class_map(&mut class_map, &self.factory)?,
            _ => self.bind_columns(&mut class_map, &own)?,
        }

        if let Some(info) = &class.relationship {
            if let RelationshipMapping::ForeignKey { fk_end, .. } = &info.mapping {
                self.create_foreign_key_columns(class, *fk_end)?;
            }
        }

        log::trace!(
            "Mapped class {} ({:?}, {} property maps)",
            class.full_name(),
            strategy,
            class_map.property_maps().len()
        );
        self.class_maps.insert(class.id, class_map);
        Ok(())
    }

    fn bind_columns(
        &mut self,
        class_map: &mut ClassMap,
        own: &HashSet<String>,
    ) -> Result<(), PropertyMapError> {
        let shared = class_map.uses_shared_columns();
        let primary = class_map.primary_table();
        let joined = class_map.joined_table();
        let in_use = class_map.columns_in_use();
        let mut context = ColumnContext {
            factory: &mut self.factory,
            table: primary,
            shared,
            in_use,
        };
        for map in class_map.property_maps_mut().iter_mut() {
            let declared_here = own.contains(&map.property().name.to_ascii_lowercase());
            context.table = match joined {
                Some(joined) if declared_here => joined,
                _ => primary,
            };
            find_or_create_columns(map, &mut context)?;
        }
        Ok(())
    }

    /// Primary and joined table for a class.
    fn tables_for(
        &mut self,
        class: &Arc<EcClass>,
        strategy: MapStrategy,
    ) -> Result<(TableId, Option<TableId>), PropertyMapError> {
        if strategy == MapStrategy::NotMapped {
            let table = self
                .factory
                .create_or_find_table(&table_name(class), TableKind::Virtual);
            return Ok((table, None));
        }

        if let Some(info) = &class.relationship {
            return match &info.mapping {
                RelationshipMapping::LinkTable => {
                    let table = self
                        .factory
                        .create_or_find_table(&table_name(class), TableKind::Link);
                    self.create_system_columns(table)?;
                    for name in LINK_TABLE_COLUMNS {
                        self.factory
                            .create_system_column(table, name, ColumnType::Integer)?;
                    }
                    Ok((table, None))
                }
                RelationshipMapping::ForeignKey { fk_end, .. } => {
                    let end_class = self.first_mapped_class(info.constraint(*fk_end).classes.iter())?;
                    Ok((end_class.primary_table(), None))
                }
            };
        }

        let root = self.catalog.table_root(class);
        let primary = self
            .factory
            .create_or_find_table(&table_name(&root), TableKind::Primary);
        self.create_system_columns(primary)?;

        let joined = match strategy {
            MapStrategy::TablePerHierarchy {
                joined_table: true, ..
            } if root.id != class.id => {
                let hierarchy = self.catalog.class_hierarchy(class);
                let owner = hierarchy
                    .iter()
                    .position(|c| c.id == root.id)
                    .and_then(|pos| hierarchy.get(pos + 1))
                    .cloned()
                    .unwrap_or_else(|| class.clone());
                let table = self
                    .factory
                    .create_or_find_table(&table_name(&owner), TableKind::Joined);
                self.factory
                    .create_system_column(table, "ECInstanceId", ColumnType::Integer)?;
                Some(table)
            }
            _ => None,
        };
        Ok((primary, joined))
    }

    fn create_system_columns(&mut self, table: TableId) -> Result<(), PropertyMapError> {
        for name in ["ECInstanceId", "ECClassId"] {
            self.factory
                .create_system_column(table, name, ColumnType::Integer)?;
        }
        Ok(())
    }

    fn first_mapped_class<'n>(
        &self,
        mut names: impl Iterator<Item = &'n String>,
    ) -> Result<&ClassMap, PropertyMapError> {
        names
            .find_map(|name| {
                self.catalog
                    .resolve_class(name, None)
                    .ok()
                    .and_then(|c| self.class_maps.get(&c.id))
            })
            .ok_or_else(|| PropertyMapError::ClassNotMapped {
                class_name: "foreign key end".to_string(),
            })
    }

    /// Create the foreign key column in the table of every mapped class the
    /// relationship's foreign key end accepts.
    fn create_foreign_key_columns(
        &mut self,
        relationship: &EcClass,
        fk_end: ConstraintEnd,
    ) -> Result<(), PropertyMapError> {
        let (Some(info), Some(column_name)) = (
            relationship.relationship.as_ref(),
            foreign_key_column_name(relationship),
        ) else {
            return Ok(());
        };
        let constraint = info.constraint(fk_end);
        let tables: Vec<TableId> = self
            .class_maps
            .values()
            .filter(|m| !m.class().is_relationship() && !m.class().is_struct())
            .filter(|m| self.catalog.constraint_accepts(constraint, m.class()))
            .map(|m| m.primary_table())
            .collect();

        let none = HashSet::new();
        for table in tables {
            let request = ColumnRequest {
                name: column_name.clone(),
                column_type: ColumnType::Integer,
                not_null: false,
                unique: false,
                collation: Collation::Unset,
                shared: false,
                in_use: &none,
            };
            self.factory.create_or_find_column(table, &request)?;
        }
        Ok(())
    }
}

/// Physical table name for a class: `<alias>_<Class>`.
pub fn table_name(class: &EcClass) -> String {
    format!("{}_{}", class.schema_alias, class.name)
}
