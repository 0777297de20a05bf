// Integration test for catalog loading, mapping and mapping-table reload
use ecdbmap::property_map::{DbSchema, SchemaMapper, TableKind};
use ecdbmap::schema_catalog::{CatalogConfig, CatalogError, SchemaCatalog};
use std::path::PathBuf;

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/test_catalog.yaml")
}

fn load_catalog() -> SchemaCatalog {
    CatalogConfig::from_file(fixture_path())
        .unwrap()
        .to_catalog()
        .unwrap()
}

#[test]
fn test_catalog_from_yaml_and_json_files_match() {
    let catalog = load_catalog();

    let config = CatalogConfig::from_file(fixture_path()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let json_path = dir.path().join("catalog.json");
    std::fs::write(&json_path, serde_json::to_string(&config).unwrap()).unwrap();
    let from_json = CatalogConfig::from_file(&json_path)
        .unwrap()
        .to_catalog()
        .unwrap();

    let names = |c: &SchemaCatalog| -> Vec<String> {
        c.classes().iter().map(|class| class.full_name()).collect()
    };
    assert_eq!(names(&from_json), names(&catalog));
}

#[test]
fn test_missing_catalog_file() {
    let result = CatalogConfig::from_file("/nonexistent/catalog.yaml");
    assert!(matches!(result, Err(CatalogError::ConfigReadError { .. })));
}

#[test]
fn test_mapping_survives_reload() {
    let catalog = load_catalog();
    let mut mapper = SchemaMapper::new(&catalog, DbSchema::new());
    mapper.map_all().unwrap();

    // Persist both the database schema and the mapping rows
    let db_json = serde_json::to_string(mapper.factory()).unwrap();
    let rows_json = mapper.save().unwrap().to_json().unwrap();

    let db: DbSchema = serde_json::from_str(&db_json).unwrap();
    let rows = ecdbmap::property_map::MappingTable::from_json(&rows_json).unwrap();
    let mut reloaded = SchemaMapper::new(&catalog, db);
    reloaded.load_all(&rows).unwrap();

    for original in mapper.class_maps() {
        let restored = reloaded.class_map(original.class().id).unwrap();
        let leaves = |maps: &ecdbmap::property_map::ClassMap| -> Vec<(String, Vec<_>)> {
            maps.property_maps()
                .leaves()
                .iter()
                .map(|leaf| (leaf.access_string().to_string(), leaf.columns()))
                .collect()
        };
        assert_eq!(leaves(restored), leaves(original));
    }
    // Reload creates no tables of its own
    assert_eq!(reloaded.factory().tables().len(), mapper.factory().tables().len());
}

#[test]
fn test_table_layout() {
    let catalog = load_catalog();
    let mut mapper = SchemaMapper::new(&catalog, DbSchema::new());
    mapper.map_all().unwrap();
    let db = mapper.factory();

    assert_eq!(db.find_table("ts_Element").unwrap().kind, TableKind::Primary);
    assert_eq!(db.find_table("ts_SubGoo").unwrap().kind, TableKind::Joined);
    assert_eq!(db.find_table("ts_FooHasGoo").unwrap().kind, TableKind::Link);
    // TablePerHierarchy subclasses live in the root's table
    assert!(db.find_table("ts_PhysicalElement").is_none());
}
