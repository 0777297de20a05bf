//! The statement execution engine the reader runs its ECSQL against.

use crate::schema_catalog::EcInstanceId;

use super::errors::ReaderError;

/// One result row: `ECInstanceId`, `ECClassId`, then one value per selected
/// property.
pub type Row = Vec<serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedStatement {
    pub ecsql: String,
    /// Engine-specific statement handle.
    pub handle: u64,
}

pub trait StatementExecutor {
    fn prepare(&self, ecsql: &str) -> Result<PreparedStatement, ReaderError>;

    /// Run a prepared statement with its single parameter bound to
    /// `instance_id`.
    fn execute(
        &self,
        statement: &PreparedStatement,
        instance_id: EcInstanceId,
    ) -> Result<Vec<Row>, ReaderError>;
}

impl<T: StatementExecutor + ?Sized> StatementExecutor for &T {
    fn prepare(&self, ecsql: &str) -> Result<PreparedStatement, ReaderError> {
        (**self).prepare(ecsql)
    }

    fn execute(
        &self,
        statement: &PreparedStatement,
        instance_id: EcInstanceId,
    ) -> Result<Vec<Row>, ReaderError> {
        (**self).execute(statement, instance_id)
    }
}
