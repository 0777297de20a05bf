// Integration test for JSON reads with related-items expansion
use ecdbmap::config::ReaderConfig;
use ecdbmap::connection::{get_cache, Connection};
use ecdbmap::json_reader::{
    Int64Format, JsonReader, MemberNameCasing, PreparedStatement, ReadState, ReaderError, Row,
    StatementExecutor, DEFAULT_CATEGORY,
};
use ecdbmap::property_map::{DbSchema, SchemaMapper};
use ecdbmap::schema_catalog::{CatalogConfig, EcClassId, EcInstanceId, SchemaCatalog};
use mockall::mock;
use serde_json::json;
use std::sync::Arc;

mock! {
    pub Executor {}

    impl StatementExecutor for Executor {
        fn prepare(&self, ecsql: &str) -> Result<PreparedStatement, ReaderError>;
        fn execute(
            &self,
            statement: &PreparedStatement,
            instance_id: EcInstanceId,
        ) -> Result<Vec<Row>, ReaderError>;
    }
}

fn catalog() -> SchemaCatalog {
    CatalogConfig::from_yaml_str(include_str!("../../fixtures/test_catalog.yaml"))
        .unwrap()
        .to_catalog()
        .unwrap()
}

fn class_id(catalog: &SchemaCatalog, name: &str) -> u64 {
    catalog.resolve_class(name, Some("TestSchema")).unwrap().id.0
}

/// Executor answering the Foo read and both FooHasGoo expansions.
fn foo_executor(catalog: &SchemaCatalog) -> MockExecutor {
    let foo = class_id(catalog, "Foo");
    let goo = class_id(catalog, "Goo");
    let sub_goo = class_id(catalog, "SubGoo");

    let mut executor = MockExecutor::new();
    executor
        .expect_prepare()
        .returning(|ecsql| {
            Ok(PreparedStatement {
                ecsql: ecsql.to_string(),
                handle: ecsql.len() as u64,
            })
        });
    executor.expect_execute().returning(move |statement, id| {
        assert_eq!(id, EcInstanceId(1));
        let ecsql = &statement.ecsql;
        if ecsql.contains("AS SubGoo") {
            assert!(ecsql.ends_with("WHERE Foo.ECInstanceId = ?"));
            Ok(vec![vec![json!(30), json!(sub_goo), json!("sub"), json!("note")]])
        } else if ecsql.contains("JOIN") {
            Ok(vec![
                vec![json!(30), json!(sub_goo), json!("sub")],
                vec![json!(31), json!(goo), json!("plain")],
            ])
        } else {
            Ok(vec![vec![
                json!(1),
                json!(foo),
                json!("first"),
                json!(7),
                json!(null),
                json!(null),
                json!(null),
                json!(null),
                json!(null),
            ]])
        }
    });
    executor
}

#[test]
fn test_read_with_related_items() {
    let connection = Connection::new(Arc::new(catalog()));
    let catalog = connection.catalog().clone();
    let mut mapper = SchemaMapper::new(&catalog, DbSchema::new());
    mapper.map_all().unwrap();

    let config = ReaderConfig {
        expand_related_items: true,
        ..Default::default()
    };
    let executor = foo_executor(&catalog);
    let mut reader = JsonReader::new(&connection, &mapper, executor, &config);
    let foo = catalog.resolve_class("ts:Foo", None).unwrap();
    let document = reader.read(foo.id, EcInstanceId(1)).unwrap();
    assert_eq!(reader.state(), ReadState::Done);

    assert_eq!(
        document.instances[0],
        json!({"id": "0x1", "className": "TestSchema.Foo", "Name": "first", "Size": 7})
    );
    let classes: Vec<&str> = document.instances[1..]
        .iter()
        .map(|i| i["className"].as_str().unwrap())
        .collect();
    assert_eq!(classes, vec!["TestSchema.SubGoo", "TestSchema.SubGoo", "TestSchema.Goo"]);
    assert_eq!(document.instances[1]["Note"], json!("note"));

    let info = &document.display_info;
    let category_names: Vec<&str> = info
        .categories
        .iter()
        .map(|c| c.category_name.as_str())
        .collect();
    assert_eq!(category_names, vec!["Identity", DEFAULT_CATEGORY]);
    assert!(info.category(DEFAULT_CATEGORY).unwrap().properties.iter().any(|p| p.instance_index == 3));
    assert_eq!(
        info.classes["TestSchema.SubGoo"].relationship_path,
        "TestSchema:Foo.TestSchema:FooHasGoo:0:TestSchema:SubGoo"
    );
    assert_eq!(info.classes["TestSchema.Foo"].display_label, "Foo Item");
}

#[test]
fn test_read_without_expansion_runs_one_statement() {
    let connection = Connection::new(Arc::new(catalog()));
    let catalog = connection.catalog().clone();
    let mut mapper = SchemaMapper::new(&catalog, DbSchema::new());
    mapper.map_all().unwrap();

    let config = ReaderConfig {
        member_name_casing: MemberNameCasing::LowerFirstChar,
        int64_format: Int64Format::AsDecimalString,
        ..Default::default()
    };
    let executor = foo_executor(&catalog);
    let mut reader = JsonReader::new(&connection, &mapper, executor, &config);
    let foo = catalog.resolve_class("ts:Foo", None).unwrap();
    let document = reader.read(foo.id, EcInstanceId(1)).unwrap();

    assert_eq!(
        document.instances,
        vec![json!({"id": "1", "className": "TestSchema.Foo", "name": "first", "size": 7})]
    );
    assert_eq!(reader.statement_cache().metrics().size, 1);
}

#[test]
fn test_instance_not_found_yields_empty_document() {
    let connection = Connection::new(Arc::new(catalog()));
    let catalog = connection.catalog().clone();
    let mut mapper = SchemaMapper::new(&catalog, DbSchema::new());
    mapper.map_all().unwrap();

    let mut executor = MockExecutor::new();
    executor.expect_prepare().times(1).returning(|ecsql| {
        Ok(PreparedStatement {
            ecsql: ecsql.to_string(),
            handle: 1,
        })
    });
    executor.expect_execute().times(1).returning(|_, _| Ok(Vec::new()));

    let config = ReaderConfig {
        expand_related_items: true,
        ..Default::default()
    };
    let mut reader = JsonReader::new(&connection, &mapper, executor, &config);
    let foo = catalog.resolve_class("ts:Foo", None).unwrap();
    let document = reader.read(foo.id, EcInstanceId(404)).unwrap();
    assert!(document.instances.is_empty());
    assert!(document.display_info.categories.is_empty());
}

#[test]
fn test_execute_failure_discards_partial_results() {
    let connection = Connection::new(Arc::new(catalog()));
    let catalog = connection.catalog().clone();
    let mut mapper = SchemaMapper::new(&catalog, DbSchema::new());
    mapper.map_all().unwrap();
    let foo = class_id(&catalog, "Foo");

    let mut executor = MockExecutor::new();
    executor.expect_prepare().returning(|ecsql| {
        Ok(PreparedStatement {
            ecsql: ecsql.to_string(),
            handle: 1,
        })
    });
    executor.expect_execute().returning(move |statement, _| {
        if statement.ecsql.contains("JOIN") {
            Err(ReaderError::Execute {
                ecsql: statement.ecsql.clone(),
                message: "disk I/O error".to_string(),
            })
        } else {
            let mut row: Row = vec![json!(1), json!(foo)];
            row.extend(std::iter::repeat(json!(null)).take(7));
            Ok(vec![row])
        }
    });

    let config = ReaderConfig {
        expand_related_items: true,
        ..Default::default()
    };
    let mut reader = JsonReader::new(&connection, &mapper, executor, &config);
    let result = reader.read(EcClassId(foo), EcInstanceId(1));
    assert!(matches!(result, Err(ReaderError::Execute { .. })));
    assert_eq!(reader.state(), ReadState::Failed);
}

#[test]
fn test_display_spec_cache_is_shared_per_connection() {
    let connection = Arc::new(Connection::new(Arc::new(catalog())));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let connection = Arc::clone(&connection);
            std::thread::spawn(move || get_cache(&connection))
        })
        .collect();
    let caches: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for cache in &caches[1..] {
        assert!(Arc::ptr_eq(cache, &caches[0]));
    }

    let other = Connection::new(Arc::clone(connection.catalog()));
    assert!(!Arc::ptr_eq(&get_cache(&other), &caches[0]));
}
