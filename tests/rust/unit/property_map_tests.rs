//! Unit tests for property map collections and the persisted mapping table

#[cfg(test)]
mod property_map_tests {
    use ecdbmap::property_map::{
        ColumnFactory, DbSchema, MappingTable, PropertyMapKind, SchemaMapper, TraversalFeedback,
    };
    use ecdbmap::schema_catalog::{CatalogConfig, SchemaCatalog};
    use std::io::Write;

    fn catalog() -> SchemaCatalog {
        CatalogConfig::from_yaml_str(include_str!("../../fixtures/test_catalog.yaml"))
            .unwrap()
            .to_catalog()
            .unwrap()
    }

    #[test]
    fn test_struct_members_are_reachable_by_access_string() {
        let catalog = catalog();
        let mut mapper = SchemaMapper::new(&catalog, DbSchema::new());
        mapper.map_all().unwrap();
        let foo = catalog.resolve_class("ts:Foo", None).unwrap();
        let maps = mapper.class_map(foo.id).unwrap().property_maps();

        let geo = maps.find("address.geo").unwrap();
        assert_eq!(geo.access_string(), "Address.Geo");
        assert_eq!(geo.kind(), PropertyMapKind::Point);
        assert_eq!(geo.parent_access_string(), Some("Address"));
        assert!(maps.find("Address.Nope").is_none());
    }

    #[test]
    fn test_traversal_can_skip_struct_members() {
        let catalog = catalog();
        let mut mapper = SchemaMapper::new(&catalog, DbSchema::new());
        mapper.map_all().unwrap();
        let foo = catalog.resolve_class("ts:Foo", None).unwrap();
        let maps = mapper.class_map(foo.id).unwrap().property_maps();

        let mut all = Vec::new();
        maps.traverse(&mut |m| {
            all.push(m.access_string().to_string());
            TraversalFeedback::Next
        });
        assert!(all.contains(&"Address.City".to_string()));

        let mut top_level = Vec::new();
        maps.traverse(&mut |m| {
            top_level.push(m.access_string().to_string());
            TraversalFeedback::NextSibling
        });
        assert_eq!(top_level.len(), maps.len());

        let mut visited = 0;
        let completed = maps.traverse(&mut |_| {
            visited += 1;
            TraversalFeedback::Cancel
        });
        assert!(!completed);
        assert_eq!(visited, 1);
    }

    #[test]
    fn test_mapping_table_file_round_trip() {
        let catalog = catalog();
        let mut mapper = SchemaMapper::new(&catalog, DbSchema::new());
        mapper.map_all().unwrap();
        let saved = mapper.save().unwrap();
        assert!(!saved.rows.is_empty());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(saved.to_json().unwrap().as_bytes()).unwrap();
        let json = std::fs::read_to_string(file.path()).unwrap();
        let restored = MappingTable::from_json(&json).unwrap();
        assert_eq!(restored, saved);

        // Every saved column exists and is persisted
        for row in &restored.rows {
            let column = mapper.factory().column(row.column_id).unwrap();
            assert!(!column.is_virtual(), "{}", row.access_string);
        }
    }
}
