//! Deferred finishing of navigation property maps.
//!
//! A navigation map can only find its foreign key column once the
//! relationship it points through has been mapped. Maps are therefore
//! created pending, queued on the [`LoadContext`], and resolved by
//! [`postprocess_navigation`] after every relationship class map exists.

use indexmap::IndexMap;

use super::class_map::ClassMap;
use super::column_factory::ColumnFactory;
use super::errors::PropertyMapError;
use crate::schema_catalog::{EcClass, EcClassId, RelationshipMapping, SchemaCatalog};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNavigation {
    pub class_id: EcClassId,
    pub access_string: String,
}

/// State carried through one mapping session.
#[derive(Debug, Clone, Default)]
pub struct LoadContext {
    pending: Vec<PendingNavigation>,
}

impl LoadContext {
    pub fn defer_navigation(&mut self, class_id: EcClassId, access_string: &str) {
        self.pending.push(PendingNavigation {
            class_id,
            access_string: access_string.to_string(),
        });
    }

    pub fn pending(&self) -> &[PendingNavigation] {
        &self.pending
    }

    pub fn take_pending(&mut self) -> Vec<PendingNavigation> {
        std::mem::take(&mut self.pending)
    }
}

/// Name of the foreign key column a relationship maps to, or `None` for a
/// link-table relationship.
pub fn foreign_key_column_name(relationship: &EcClass) -> Option<String> {
    match relationship.relationship.as_ref().map(|info| &info.mapping) {
        Some(RelationshipMapping::ForeignKey { column, .. }) => Some(
            column
                .clone()
                .unwrap_or_else(|| format!("{}Id", relationship.name)),
        ),
        _ => None,
    }
}

pub fn postprocess_navigation(
    context: &mut LoadContext,
    catalog: &SchemaCatalog,
    class_maps: &mut IndexMap<EcClassId, ClassMap>,
    factory: &dyn ColumnFactory,
) -> Result<(), PropertyMapError> {
    for pending in context.take_pending() {
        if let Err(e) = finish_navigation(&pending, catalog, class_maps, factory) {
            log::warn!(
                "Failed to finish navigation property {} on class {}: {}",
                pending.access_string,
                pending.class_id,
                e
            );
            return Err(e);
        }
    }
    Ok(())
}

fn finish_navigation(
    pending: &PendingNavigation,
    catalog: &SchemaCatalog,
    class_maps: &mut IndexMap<EcClassId, ClassMap>,
    factory: &dyn ColumnFactory,
) -> Result<(), PropertyMapError> {
    let class_map = class_maps
        .get(&pending.class_id)
        .ok_or_else(|| PropertyMapError::ClassNotMapped {
            class_name: pending.class_id.to_string(),
        })?;
    let map = class_map
        .property_maps()
        .find(&pending.access_string)
        .ok_or_else(|| PropertyMapError::ClassNotMapped {
            class_name: class_map.class().full_name(),
        })?;
    let relationship_name = map.navigation_relationship().unwrap_or_default();
    let relationship = catalog.resolve_class(relationship_name, None)?;
    if !class_maps.contains_key(&relationship.id) {
        return Err(PropertyMapError::RelationshipNotMapped {
            relationship: relationship.full_name(),
        });
    }

    let column_name = foreign_key_column_name(&relationship).ok_or_else(|| {
        PropertyMapError::NavigationOnLinkTable {
            access_string: pending.access_string.clone(),
            relationship: relationship.full_name(),
        }
    })?;

    let column = class_map
        .tables()
        .into_iter()
        .find_map(|table| factory.find_column(table, &column_name))
        .map(|c| c.id)
        .ok_or_else(|| PropertyMapError::MissingForeignKeyColumn {
            class_name: class_map.class().full_name(),
            access_string: pending.access_string.clone(),
            column: column_name.clone(),
        })?;

    let map = class_maps
        .get_mut(&pending.class_id)
        .and_then(|cm| cm.property_maps_mut().find_mut(&pending.access_string))
        .ok_or_else(|| PropertyMapError::ClassNotMapped {
            class_name: pending.class_id.to_string(),
        })?;
    map.set_columns(vec![column], factory)
}
