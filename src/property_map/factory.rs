//! Creation, cloning, and column binding of property maps.

use std::collections::HashSet;
use std::sync::Arc;

use super::collection::PropertyMapCollection;
use super::column_factory::{ColumnFactory, ColumnId, ColumnRequest, ColumnType, TableId};
use super::errors::PropertyMapError;
use super::maps::{NavigationState, PropertyMap, PropertyMapData, POINT_COMPONENTS};
use super::navigation::LoadContext;
use crate::schema_catalog::{
    CatalogError, Collation, EcClass, EcClassId, EcProperty, PrimitiveType, PropertyKind,
    SchemaCatalog,
};

const MAX_STRUCT_DEPTH: usize = 8;

/// Build the map for `property` of `class`, dispatching on the property's
/// kind. Struct maps recurse into every member; navigation maps start out
/// pending and are queued on `context`.
pub fn create_property_map(
    context: &mut LoadContext,
    catalog: &SchemaCatalog,
    class: &EcClass,
    property: &Arc<EcProperty>,
    access_string: &str,
    parent: Option<&str>,
) -> Result<PropertyMap, PropertyMapError> {
    let data = match &property.kind {
        PropertyKind::Primitive { primitive_type } if primitive_type.is_point() => {
            PropertyMapData::Point {
                is_3d: *primitive_type == PrimitiveType::Point3d,
                columns: Vec::new(),
            }
        }
        PropertyKind::Primitive { .. } => PropertyMapData::Primitive { column: None },
        PropertyKind::PrimitiveArray { .. } => PropertyMapData::PrimitiveArray { column: None },
        PropertyKind::StructArray { .. } => PropertyMapData::StructArrayJson { column: None },
        PropertyKind::Struct { struct_class } => {
            if access_string.split('.').count() > MAX_STRUCT_DEPTH {
                return Err(PropertyMapError::StructNestingTooDeep {
                    access_string: access_string.to_string(),
                });
            }
            let struct_class = catalog.resolve_class(struct_class, None).map_err(|_| {
                CatalogError::class_error_with_context(
                    struct_class.as_str(),
                    format!("Mapping struct property {}.{}", class.full_name(), access_string),
                )
            })?;
            let mut members = PropertyMapCollection::new();
            for member in catalog.all_properties(&struct_class) {
                if matches!(member.kind, PropertyKind::Navigation { .. }) {
                    return Err(PropertyMapError::NavigationInStruct {
                        struct_class: struct_class.full_name(),
                        property: member.name.clone(),
                    });
                }
                let member_access = format!("{}.{}", access_string, member.name);
                members.insert(create_property_map(
                    context,
                    catalog,
                    class,
                    &member,
                    &member_access,
                    Some(access_string),
                )?);
            }
            PropertyMapData::Struct { members }
        }
        PropertyKind::Navigation { .. } => {
            context.defer_navigation(class.id, access_string);
            PropertyMapData::Navigation {
                state: NavigationState::Pending,
            }
        }
    };

    Ok(PropertyMap::new(
        property.clone(),
        access_string.to_string(),
        class.id,
        parent.map(str::to_string),
        data,
    ))
}

/// Structurally identical copy of `proto` bound to `target_class`. Columns
/// are carried over only when `keep_columns` is set, i.e. when the target
/// class maps into the same table. Navigation clones are always pending.
pub fn clone_property_map(
    context: &mut LoadContext,
    proto: &PropertyMap,
    target_class: EcClassId,
    keep_columns: bool,
) -> PropertyMap {
    let kept = |column: &Option<ColumnId>| if keep_columns { *column } else { None };
    let data = match proto.data() {
        PropertyMapData::Primitive { column } => PropertyMapData::Primitive {
            column: kept(column),
        },
        PropertyMapData::Point { is_3d, columns } => PropertyMapData::Point {
            is_3d: *is_3d,
            columns: if keep_columns {
                columns.clone()
            } else {
                Vec::new()
            },
        },
        PropertyMapData::PrimitiveArray { column } => PropertyMapData::PrimitiveArray {
            column: kept(column),
        },
        PropertyMapData::StructArrayJson { column } => PropertyMapData::StructArrayJson {
            column: kept(column),
        },
        PropertyMapData::Struct { members } => {
            let mut cloned = PropertyMapCollection::new();
            for member in members.iter() {
                cloned.insert(clone_property_map(context, member, target_class, keep_columns));
            }
            PropertyMapData::Struct { members: cloned }
        }
        PropertyMapData::Navigation { .. } => {
            context.defer_navigation(target_class, proto.access_string());
            PropertyMapData::Navigation {
                state: NavigationState::Pending,
            }
        }
    };
    PropertyMap::new(
        proto.property().clone(),
        proto.access_string().to_string(),
        target_class,
        proto.parent_access_string().map(str::to_string),
        data,
    )
}

/// Where new columns for one class map go.
pub struct ColumnContext<'f> {
    pub factory: &'f mut dyn ColumnFactory,
    pub table: TableId,
    pub shared: bool,
    /// Columns already bound for the class; grows as maps are finished.
    pub in_use: HashSet<ColumnId>,
}

/// Column name for a leaf: the explicit name if the property carries one,
/// else the access string with `.` replaced by `_`.
pub fn column_name(map: &PropertyMap) -> String {
    map.property()
        .column_name
        .clone()
        .unwrap_or_else(|| map.access_string().replace('.', "_"))
}

/// Request the columns of every unbound leaf under `map`. Navigation maps
/// are finished later by the navigation postprocess.
pub fn find_or_create_columns(
    map: &mut PropertyMap,
    context: &mut ColumnContext<'_>,
) -> Result<(), PropertyMapError> {
    if let Some(members) = map.members_mut() {
        for member in members.iter_mut() {
            find_or_create_columns(member, context)?;
        }
        return Ok(());
    }
    if matches!(map.data(), PropertyMapData::Navigation { .. }) {
        return Ok(());
    }

    let bound = map.columns();
    if bound.len() == map.expected_column_count() {
        context.in_use.extend(bound);
        return Ok(());
    }

    let base_name = column_name(map);
    let property = map.property().clone();
    let (names, column_type, constrained) = match map.data() {
        PropertyMapData::Point { is_3d, .. } => {
            let count = if *is_3d { 3 } else { 2 };
            let names = POINT_COMPONENTS[..count]
                .iter()
                .map(|c| format!("{}_{}", base_name, c))
                .collect();
            (names, ColumnType::Real, false)
        }
        PropertyMapData::PrimitiveArray { .. } | PropertyMapData::StructArrayJson { .. } => {
            (vec![base_name], ColumnType::Text, false)
        }
        _ => {
            let column_type = match property.kind {
                PropertyKind::Primitive { primitive_type } => {
                    context.factory.column_type_for(primitive_type)
                }
                _ => ColumnType::Any,
            };
            (vec![base_name], column_type, true)
        }
    };

    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let request = ColumnRequest {
            name,
            column_type,
            not_null: constrained && property.not_null,
            unique: constrained && property.unique,
            collation: if constrained {
                property.collation
            } else {
                Collation::Unset
            },
            shared: context.shared,
            in_use: &context.in_use,
        };
        let id = context.factory.create_or_find_column(context.table, &request)?;
        context.in_use.insert(id);
        columns.push(id);
    }
    map.set_columns(columns, &*context.factory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property_map::column_factory::{DbSchema, TableKind};
    use crate::property_map::maps::PropertyMapKind;
    use crate::testing::test_catalog;

    fn map_for(class: &str, property: &str) -> (PropertyMap, LoadContext) {
        let catalog = test_catalog();
        let class = catalog.resolve_class(class, Some("TestSchema")).unwrap();
        let property = catalog.find_property(&class, property).unwrap();
        let mut context = LoadContext::default();
        let map = create_property_map(
            &mut context,
            &catalog,
            &class,
            &property,
            &property.name,
            None,
        )
        .unwrap();
        (map, context)
    }

    fn bind(map: &mut PropertyMap, shared: bool) -> DbSchema {
        let mut db = DbSchema::new();
        let table = db.create_or_find_table("ts_Test", TableKind::Primary);
        let mut context = ColumnContext {
            factory: &mut db,
            table,
            shared,
            in_use: HashSet::new(),
        };
        find_or_create_columns(map, &mut context).unwrap();
        db
    }

    #[test]
    fn test_kind_dispatch() {
        assert_eq!(map_for("Foo", "Name").0.kind(), PropertyMapKind::Primitive);
        assert_eq!(map_for("Foo", "Location").0.kind(), PropertyMapKind::Point);
        assert_eq!(map_for("Foo", "Tags").0.kind(), PropertyMapKind::PrimitiveArray);
        assert_eq!(map_for("Foo", "History").0.kind(), PropertyMapKind::StructArrayJson);
        assert_eq!(map_for("Foo", "Address").0.kind(), PropertyMapKind::Struct);

        let (nav, context) = map_for("Element", "Model");
        assert_eq!(nav.kind(), PropertyMapKind::Navigation);
        assert!(nav.is_pending_navigation());
        assert_eq!(context.pending().len(), 1);
    }

    #[test]
    fn test_struct_members_get_prefixed_columns() {
        let (mut map, _) = map_for("Foo", "Address");
        let db = bind(&mut map, false);
        let names: Vec<_> = map
            .columns()
            .iter()
            .map(|id| db.column(*id).unwrap().name.clone())
            .collect();
        assert_eq!(names, vec!["Address_Street", "Address_City", "Address_Geo_X", "Address_Geo_Y"]);
        assert_eq!(
            map.members().unwrap().find("Geo").unwrap().parent_access_string(),
            Some("Address")
        );
        assert_eq!(map.tables(&db).len(), 1);
    }

    #[test]
    fn test_point_column_counts() {
        let (mut point2d, _) = map_for("Foo", "Location");
        bind(&mut point2d, false);
        assert_eq!(point2d.columns().len(), 2);

        let (mut point3d, _) = map_for("PhysicalElement", "Origin");
        let db = bind(&mut point3d, true);
        assert_eq!(point3d.columns().len(), 3);
        assert_eq!(point3d.tables(&db).len(), 1);
        assert_eq!(
            point3d.column_access_strings(),
            vec!["Origin.X", "Origin.Y", "Origin.Z"]
        );
    }

    #[test]
    fn test_explicit_column_name_wins() {
        let (mut map, _) = map_for("SubGoo", "Note");
        let db = bind(&mut map, false);
        assert_eq!(db.column(map.columns()[0]).unwrap().name, "SubGooNote");
    }

    #[test]
    fn test_clone_keeps_shape() {
        let (mut map, mut context) = map_for("Foo", "Address");
        bind(&mut map, false);

        let kept = clone_property_map(&mut context, &map, EcClassId(99), true);
        assert_eq!(kept.class_id(), EcClassId(99));
        assert_eq!(kept.columns(), map.columns());

        let fresh = clone_property_map(&mut context, &map, EcClassId(99), false);
        assert_eq!(fresh.kind(), PropertyMapKind::Struct);
        assert!(fresh.columns().is_empty());
        assert_eq!(fresh.members().unwrap().len(), 3);
    }

    #[test]
    fn test_navigation_clone_is_queued() {
        let (nav, mut context) = map_for("Element", "Model");
        let clone = clone_property_map(&mut context, &nav, EcClassId(42), true);
        assert!(clone.is_pending_navigation());
        assert_eq!(context.pending().len(), 2);
        assert_eq!(context.pending()[1].class_id, EcClassId(42));
    }
}
