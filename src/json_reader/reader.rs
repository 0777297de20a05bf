//! Reads one instance, optionally with its related items, as a JSON document.
//!
//! A read walks `Idle -> PreparingTrivialPath -> PreparingStatement ->
//! Executing -> ConsolidatingRows` for the instance itself, then repeats
//! the statement steps from `ExpandingRelatedItems` for every related-items
//! path declared for its class. It ends in `Done`, or in `Failed` with no
//! document at all.

use std::fmt;
use std::sync::Arc;

use super::display_info::{DisplayInfo, JsonDocument, RowConsolidator};
use super::errors::ReaderError;
use super::executor::{PreparedStatement, StatementExecutor};
use super::format::{FormatOptions, InstanceFormatter};
use super::statement_cache::StatementCache;
use crate::config::ReaderConfig;
use crate::connection::Connection;
use crate::property_map::{ColumnFactory, DbSchema, SchemaMapper};
use crate::relationship_path::{ClassSpecifier, EcSqlOptions, PathEnd, RelationshipPath};
use crate::schema_catalog::{EcClass, EcClassId, EcInstanceId, SchemaCatalog, ANY_CLASS_NAME};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    Idle,
    PreparingTrivialPath,
    PreparingStatement,
    Executing,
    ConsolidatingRows,
    ExpandingRelatedItems,
    Done,
    Failed,
}

impl fmt::Display for ReadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderOptions {
    pub ecsql: EcSqlOptions,
    pub format: FormatOptions,
    pub expand_related_items: bool,
}

impl From<&ReaderConfig> for ReaderOptions {
    fn from(config: &ReaderConfig) -> Self {
        ReaderOptions {
            ecsql: config.ecsql_options(),
            format: config.format_options(),
            expand_related_items: config.expand_related_items,
        }
    }
}

pub struct JsonReader<'a, 'c, E: StatementExecutor, F: ColumnFactory = DbSchema> {
    connection: &'a Connection,
    mapper: &'a SchemaMapper<'c, F>,
    executor: E,
    statements: StatementCache,
    options: ReaderOptions,
    state: ReadState,
}

impl<'a, 'c, E: StatementExecutor, F: ColumnFactory> JsonReader<'a, 'c, E, F> {
    pub fn new(
        connection: &'a Connection,
        mapper: &'a SchemaMapper<'c, F>,
        executor: E,
        config: &ReaderConfig,
    ) -> Self {
        JsonReader {
            connection,
            mapper,
            executor,
            statements: StatementCache::new(config.statement_cache_max_entries),
            options: ReaderOptions::from(config),
            state: ReadState::Idle,
        }
    }

    pub fn state(&self) -> ReadState {
        self.state
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    pub fn statement_cache(&self) -> &StatementCache {
        &self.statements
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    fn transition(&mut self, next: ReadState) {
        log::trace!("JSON reader: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Read instance `instance_id` of class `class_id`.
    pub fn read(
        &mut self,
        class_id: EcClassId,
        instance_id: EcInstanceId,
    ) -> Result<JsonDocument, ReaderError> {
        self.transition(ReadState::Idle);
        match self.read_instance(class_id, instance_id) {
            Ok(document) => {
                self.transition(ReadState::Done);
                log::debug!(
                    "Read {} instance(s) for instance {}",
                    document.instances.len(),
                    instance_id.0
                );
                Ok(document)
            }
            Err(e) => {
                self.transition(ReadState::Failed);
                log::debug!("JSON read of instance {} failed: {}", instance_id.0, e);
                Err(e)
            }
        }
    }

    fn read_instance(
        &mut self,
        class_id: EcClassId,
        instance_id: EcInstanceId,
    ) -> Result<JsonDocument, ReaderError> {
        self.transition(ReadState::PreparingTrivialPath);
        let catalog = Arc::clone(self.connection.catalog());
        let class = catalog.get_class(class_id)?.clone();
        let trivial = RelationshipPath::trivial(ClassSpecifier::new(class.clone()));

        let mut consolidator = RowConsolidator::new();
        self.read_path(&catalog, &trivial, PathEnd::Leaf, instance_id, &mut consolidator)?;

        if self.options.expand_related_items && !consolidator.is_empty() {
            self.transition(ReadState::ExpandingRelatedItems);
            for path in self.related_item_paths(&catalog, &class)? {
                self.read_path(&catalog, &path, PathEnd::Root, instance_id, &mut consolidator)?;
            }
        }
        Ok(consolidator.finish())
    }

    /// Paths from the instance's class, and then each of its bases, to the
    /// items declared as related to them.
    fn related_item_paths(
        &self,
        catalog: &SchemaCatalog,
        class: &EcClass,
    ) -> Result<Vec<RelationshipPath>, ReaderError> {
        let specs = self.connection.display_specifications();
        let mut paths = Vec::new();
        for ancestor in catalog.class_hierarchy(class).into_iter().rev() {
            let Some(declared) = specs.related_paths_from_class(ancestor.id) else {
                continue;
            };
            let from_instance = RelationshipPath::trivial(ClassSpecifier::new(ancestor)).reversed();
            for declared_path in declared {
                let mut path = from_instance.clone();
                path.combine(declared_path)?;
                if path.end_class(PathEnd::Leaf).is_none() {
                    log::debug!("Skipping related items path '{}' ending in AnyClass", path);
                    continue;
                }
                paths.push(path);
            }
        }
        Ok(paths)
    }

    fn read_path(
        &mut self,
        catalog: &SchemaCatalog,
        path: &RelationshipPath,
        filter_end: PathEnd,
        instance_id: EcInstanceId,
        consolidator: &mut RowConsolidator,
    ) -> Result<(), ReaderError> {
        self.transition(ReadState::PreparingStatement);
        let leaf = path
            .end_class(PathEnd::Leaf)
            .map(|c| c.class().clone())
            .ok_or_else(|| ReaderError::UnmappedClass {
                class_name: ANY_CLASS_NAME.to_string(),
            })?;
        let mapper = self.mapper;
        let class_map = mapper
            .class_map(leaf.id)
            .ok_or_else(|| ReaderError::UnmappedClass {
                class_name: leaf.full_name(),
            })?;
        let maps = class_map.property_maps();

        let sql = path.generate_ecsql(&self.options.ecsql)?;
        let alias = &sql.leaf.alias;
        let columns: Vec<String> = [
            sql.leaf.instance_id_expression.clone(),
            sql.leaf.class_id_expression.clone(),
        ]
        .into_iter()
        .chain(maps.iter().map(|m| format!("{}.{}", alias, m.access_string())))
        .collect();
        let ecsql = sql.to_select(&columns, filter_end);
        let statement = self.prepare(&ecsql)?;

        self.transition(ReadState::Executing);
        let rows = self.executor.execute(&statement, instance_id)?;

        self.transition(ReadState::ConsolidatingRows);
        let formatter = InstanceFormatter::new(catalog, &self.options.format);
        let path_text = path.to_string();
        for row in rows {
            let instance = formatter.format_row(&row, &leaf, maps)?;
            let row_class = catalog.get_class(formatter.row_class(&row, &leaf))?;
            consolidator.add(instance, DisplayInfo::for_class(row_class, maps, &path_text));
        }
        Ok(())
    }

    fn prepare(&self, ecsql: &str) -> Result<PreparedStatement, ReaderError> {
        if let Some(statement) = self.statements.get(ecsql) {
            return Ok(statement);
        }
        let statement = self.executor.prepare(ecsql)?;
        self.statements.insert(statement.clone());
        Ok(statement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_reader::display_info::DEFAULT_CATEGORY;
    use crate::json_reader::Int64Format;
    use crate::testing::{test_catalog, MockExecutor};
    use serde_json::json;

    fn statement(ecsql: &str) -> PreparedStatement {
        PreparedStatement {
            ecsql: ecsql.to_string(),
            handle: 1,
        }
    }

    #[test]
    fn test_read_single_instance() {
        let connection = Connection::new(Arc::new(test_catalog()));
        let catalog = connection.catalog().clone();
        let mut mapper = SchemaMapper::new(&catalog, DbSchema::new());
        mapper.map_all().unwrap();
        let bar = catalog.resolve_class("ts:Bar", None).unwrap();

        let mut executor = MockExecutor::new();
        executor
            .expect_prepare()
            .withf(|ecsql: &str| {
                ecsql
                    == "SELECT Bar.ECInstanceId, Bar.ECClassId, Bar.Title FROM TestSchema.Bar AS Bar \
                        WHERE Bar.ECInstanceId = ?"
            })
            .times(1)
            .returning(|ecsql| Ok(statement(ecsql)));
        let bar_id = bar.id.0;
        executor
            .expect_execute()
            .withf(|_, id| *id == EcInstanceId(5))
            .times(2)
            .returning(move |_, _| Ok(vec![vec![json!(5), json!(bar_id), json!("Hello")]]));

        let mut reader = JsonReader::new(&connection, &mapper, executor, &ReaderConfig::default());
        let document = reader.read(bar.id, EcInstanceId(5)).unwrap();
        assert_eq!(reader.state(), ReadState::Done);
        assert_eq!(
            document.instances,
            vec![json!({"id": "0x5", "className": "TestSchema.Bar", "Title": "Hello"})]
        );
        let general = document.display_info.category(DEFAULT_CATEGORY).unwrap();
        assert_eq!(general.properties[0].access_string, "Title");

        // Second read reuses the prepared statement
        reader.read(bar.id, EcInstanceId(5)).unwrap();
        assert_eq!(reader.statement_cache().metrics().hits, 1);
    }

    #[test]
    fn test_prepare_failure_yields_no_document() {
        let connection = Connection::new(Arc::new(test_catalog()));
        let catalog = connection.catalog().clone();
        let mut mapper = SchemaMapper::new(&catalog, DbSchema::new());
        mapper.map_all().unwrap();
        let bar = catalog.resolve_class("ts:Bar", None).unwrap();

        let mut executor = MockExecutor::new();
        executor.expect_prepare().returning(|ecsql| {
            Err(ReaderError::Prepare {
                ecsql: ecsql.to_string(),
                message: "no such table".to_string(),
            })
        });
        executor.expect_execute().never();

        let mut reader = JsonReader::new(&connection, &mapper, executor, &ReaderConfig::default());
        let result = reader.read(bar.id, EcInstanceId(1));
        assert!(matches!(result, Err(ReaderError::Prepare { .. })));
        assert_eq!(reader.state(), ReadState::Failed);
    }

    #[test]
    fn test_unmapped_and_unknown_classes() {
        let connection = Connection::new(Arc::new(test_catalog()));
        let catalog = connection.catalog().clone();
        let mapper = SchemaMapper::new(&catalog, DbSchema::new());
        let bar = catalog.resolve_class("ts:Bar", None).unwrap();

        let mut reader = JsonReader::new(
            &connection,
            &mapper,
            MockExecutor::new(),
            &ReaderConfig::default(),
        );
        assert!(matches!(
            reader.read(bar.id, EcInstanceId(1)),
            Err(ReaderError::UnmappedClass { .. })
        ));
        assert!(matches!(
            reader.read(EcClassId(9999), EcInstanceId(1)),
            Err(ReaderError::Catalog(_))
        ));
    }

    #[test]
    fn test_malformed_row_fails_whole_read() {
        let connection = Connection::new(Arc::new(test_catalog()));
        let catalog = connection.catalog().clone();
        let mut mapper = SchemaMapper::new(&catalog, DbSchema::new());
        mapper.map_all().unwrap();
        let bar = catalog.resolve_class("ts:Bar", None).unwrap();

        let mut executor = MockExecutor::new();
        executor
            .expect_prepare()
            .returning(|ecsql| Ok(statement(ecsql)));
        executor
            .expect_execute()
            .returning(|_, _| Ok(vec![vec![json!(1)]]));

        let mut reader = JsonReader::new(&connection, &mapper, executor, &ReaderConfig::default());
        assert!(matches!(
            reader.read(bar.id, EcInstanceId(1)),
            Err(ReaderError::MalformedRow { .. })
        ));
        assert_eq!(reader.state(), ReadState::Failed);
    }

    #[test]
    fn test_expand_related_items() {
        let connection = Connection::new(Arc::new(test_catalog()));
        let catalog = connection.catalog().clone();
        let mut mapper = SchemaMapper::new(&catalog, DbSchema::new());
        mapper.map_all().unwrap();
        let goo = catalog.resolve_class("ts:Goo", None).unwrap();
        let bar = catalog.resolve_class("ts:Bar", None).unwrap();
        let (goo_id, bar_id) = (goo.id.0, bar.id.0);

        let mut executor = MockExecutor::new();
        executor
            .expect_prepare()
            .times(2)
            .returning(|ecsql| Ok(statement(ecsql)));
        executor.expect_execute().times(2).returning(move |stmt, _| {
            if stmt.ecsql.contains("JOIN") {
                assert!(stmt.ecsql.ends_with("WHERE Goo.ECInstanceId = ?"));
                Ok(vec![
                    vec![json!(20), json!(bar_id), json!("first")],
                    vec![json!(21), json!(bar_id), json!("second")],
                ])
            } else {
                Ok(vec![vec![json!(10), json!(goo_id), json!("goo")]])
            }
        });

        let config = ReaderConfig {
            expand_related_items: true,
            int64_format: Int64Format::AsNumber,
            ..Default::default()
        };
        let mut reader = JsonReader::new(&connection, &mapper, executor, &config);
        let document = reader.read(goo.id, EcInstanceId(10)).unwrap();

        let ids: Vec<_> = document.instances.iter().map(|i| i["id"].clone()).collect();
        assert_eq!(ids, vec![json!(10), json!(20), json!(21)]);

        let general = document.display_info.category(DEFAULT_CATEGORY).unwrap();
        let indexes: Vec<usize> = general.properties.iter().map(|p| p.instance_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert_eq!(
            document.display_info.classes["TestSchema.Bar"].relationship_path,
            "TestSchema:Goo.TestSchema:GooHasBar:0:TestSchema:Bar"
        );
        assert_eq!(
            document.display_info.classes["TestSchema.Goo"].relationship_path,
            "TestSchema:Goo"
        );
    }
}
