//! Fixtures shared by the in-crate unit tests.

use mockall::mock;

use crate::json_reader::{PreparedStatement, ReaderError, Row, StatementExecutor};
use crate::schema_catalog::{CatalogConfig, EcInstanceId, SchemaCatalog};

pub const TEST_CATALOG_YAML: &str = include_str!("../tests/fixtures/test_catalog.yaml");

pub fn test_catalog() -> SchemaCatalog {
    CatalogConfig::from_yaml_str(TEST_CATALOG_YAML)
        .expect("test catalog parses")
        .to_catalog()
        .expect("test catalog builds")
}

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
