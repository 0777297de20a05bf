//! Physical tables and columns, and the factory that allocates them.
//!
//! `DbSchema` is the in-memory factory used by the mapper. Columns are looked
//! up by name within a table, so repeated requests for the same property in
//! a table-per-hierarchy table return the existing column. Shared columns
//! (`ps1..psN`) are handed out to whichever class does not already use them.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::errors::PropertyMapError;
use crate::schema_catalog::{Collation, PrimitiveType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Primary,
    Joined,
    Link,
    /// Exists for mapping purposes only; never persisted.
    Virtual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Any,
    Blob,
    Boolean,
    DateTime,
    Integer,
    Real,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// ECInstanceId, ECClassId, and the relationship end columns.
    System,
    Regular,
    Shared,
    Virtual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbTable {
    pub id: TableId,
    pub name: String,
    pub kind: TableKind,
    pub columns: Vec<ColumnId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbColumn {
    pub id: ColumnId,
    pub table: TableId,
    pub name: String,
    pub column_type: ColumnType,
    pub not_null: bool,
    pub unique: bool,
    pub collation: Collation,
    pub kind: ColumnKind,
}

impl DbColumn {
    pub fn is_virtual(&self) -> bool {
        self.kind == ColumnKind::Virtual
    }
}

/// What a property map asks of the factory for one physical column.
#[derive(Debug, Clone)]
pub struct ColumnRequest<'a> {
    pub name: String,
    pub column_type: ColumnType,
    pub not_null: bool,
    pub unique: bool,
    pub collation: Collation,
    /// Allocate from the table's shared `psN` columns instead of by name.
    pub shared: bool,
    /// Columns the requesting class already uses; never handed out again.
    pub in_use: &'a HashSet<ColumnId>,
}

pub trait ColumnFactory {
    /// Table with `name`, created if it does not exist yet.
    fn create_or_find_table(&mut self, name: &str, kind: TableKind) -> TableId;

    fn create_or_find_column(
        &mut self,
        table: TableId,
        request: &ColumnRequest<'_>,
    ) -> Result<ColumnId, PropertyMapError>;

    /// Create (or return) a system column such as `ECInstanceId`.
    fn create_system_column(
        &mut self,
        table: TableId,
        name: &str,
        column_type: ColumnType,
    ) -> Result<ColumnId, PropertyMapError>;

    fn column_type_for(&self, primitive_type: PrimitiveType) -> ColumnType;

    fn table(&self, id: TableId) -> Option<&DbTable>;

    fn column(&self, id: ColumnId) -> Option<&DbColumn>;

    fn find_column(&self, table: TableId, name: &str) -> Option<&DbColumn>;
}

/// In-memory column factory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DbSchema {
    tables: Vec<DbTable>,
    columns: Vec<DbColumn>,
}

impl DbSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tables(&self) -> &[DbTable] {
        &self.tables
    }

    pub fn find_table(&self, name: &str) -> Option<&DbTable> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    fn table_mut(&mut self, id: TableId) -> Result<&mut DbTable, PropertyMapError> {
        self.tables
            .get_mut((id.0 as usize).wrapping_sub(1))
            .ok_or_else(|| PropertyMapError::column_factory(format!("unknown table id {}", id.0)))
    }

    fn push_column(&mut self, mut column: DbColumn) -> Result<ColumnId, PropertyMapError> {
        let id = ColumnId(self.columns.len() as u64 + 1);
        column.id = id;
        self.table_mut(column.table)?.columns.push(id);
        self.columns.push(column);
        Ok(id)
    }

    fn columns_of(&self, table: TableId) -> impl Iterator<Item = &DbColumn> {
        self.columns.iter().filter(move |c| c.table == table)
    }
}

impl ColumnFactory for DbSchema {
    fn create_or_find_table(&mut self, name: &str, kind: TableKind) -> TableId {
        if let Some(table) = self.find_table(name) {
            return table.id;
        }
        let id = TableId(self.tables.len() as u64 + 1);
        log::debug!("Creating {:?} table '{}'", kind, name);
        self.tables.push(DbTable {
            id,
            name: name.to_string(),
            kind,
            columns: Vec::new(),
        });
        id
    }

    fn create_or_find_column(
        &mut self,
        table: TableId,
        request: &ColumnRequest<'_>,
    ) -> Result<ColumnId, PropertyMapError> {
        let table_kind = self
            .table(table)
            .map(|t| t.kind)
            .ok_or_else(|| PropertyMapError::column_factory(format!("unknown table id {}", table.0)))?;

        if request.shared && table_kind != TableKind::Virtual {
            if let Some(free) = self
                .columns_of(table)
                .find(|c| c.kind == ColumnKind::Shared && !request.in_use.contains(&c.id))
            {
                return Ok(free.id);
            }
            let ordinal = self
                .columns_of(table)
                .filter(|c| c.kind == ColumnKind::Shared)
                .count()
                + 1;
            return self.push_column(DbColumn {
                id: ColumnId(0),
                table,
                name: format!("ps{}", ordinal),
                column_type: ColumnType::Any,
                not_null: false,
                unique: false,
                collation: Collation::Unset,
                kind: ColumnKind::Shared,
            });
        }

        if request.name.is_empty() {
            return Err(PropertyMapError::column_factory("column name is empty"));
        }
        if let Some(existing) = self.find_column(table, &request.name) {
            if request.in_use.contains(&existing.id) {
                return Err(PropertyMapError::column_factory(format!(
                    "column '{}' is already used by another property of the class",
                    request.name
                )));
            }
            if existing.column_type != request.column_type {
                return Err(PropertyMapError::column_factory(format!(
                    "column '{}' exists with type {:?}, requested {:?}",
                    request.name, existing.column_type, request.column_type
                )));
            }
            return Ok(existing.id);
        }

        let kind = if table_kind == TableKind::Virtual {
            ColumnKind::Virtual
        } else {
            ColumnKind::Regular
        };
        self.push_column(DbColumn {
            id: ColumnId(0),
            table,
            name: request.name.clone(),
            column_type: request.column_type,
            not_null: request.not_null,
            unique: request.unique,
            collation: request.collation,
            kind,
        })
    }

    fn create_system_column(
        &mut self,
        table: TableId,
        name: &str,
        column_type: ColumnType,
    ) -> Result<ColumnId, PropertyMapError> {
        if let Some(existing) = self.find_column(table, name) {
            return Ok(existing.id);
        }
        self.push_column(DbColumn {
            id: ColumnId(0),
            table,
            name: name.to_string(),
            column_type,
            not_null: true,
            unique: false,
            collation: Collation::Unset,
            kind: ColumnKind::System,
        })
    }

    fn column_type_for(&self, primitive_type: PrimitiveType) -> ColumnType {
        match primitive_type {
            PrimitiveType::Binary | PrimitiveType::IGeometry => ColumnType::Blob,
            PrimitiveType::Boolean => ColumnType::Boolean,
            PrimitiveType::DateTime => ColumnType::DateTime,
            PrimitiveType::Double | PrimitiveType::Point2d | PrimitiveType::Point3d => {
                ColumnType::Real
            }
            PrimitiveType::Integer | PrimitiveType::Long => ColumnType::Integer,
            PrimitiveType::String => ColumnType::Text,
        }
    }

    fn table(&self, id: TableId) -> Option<&DbTable> {
        self.tables.get((id.0 as usize).wrapping_sub(1))
    }

    fn column(&self, id: ColumnId) -> Option<&DbColumn> {
        self.columns.get((id.0 as usize).wrapping_sub(1))
    }

    fn find_column(&self, table: TableId, name: &str) -> Option<&DbColumn> {
        self.columns_of(table)
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(name: &str, shared: bool, in_use: &'a HashSet<ColumnId>) -> ColumnRequest<'a> {
        ColumnRequest {
            name: name.to_string(),
            column_type: ColumnType::Text,
            not_null: false,
            unique: false,
            collation: Collation::Unset,
            shared,
            in_use,
        }
    }

    #[test]
    fn test_named_columns_are_reused() {
        let mut db = DbSchema::new();
        let table = db.create_or_find_table("ts_Foo", TableKind::Primary);
        assert_eq!(db.create_or_find_table("TS_FOO", TableKind::Primary), table);

        let none = HashSet::new();
        let first = db.create_or_find_column(table, &request("Name", false, &none)).unwrap();
        let again = db.create_or_find_column(table, &request("name", false, &none)).unwrap();
        assert_eq!(first, again);

        let used: HashSet<ColumnId> = [first].into_iter().collect();
        assert!(db
            .create_or_find_column(table, &request("Name", false, &used))
            .is_err());
    }

    #[test]
    fn test_type_conflict_is_rejected() {
        let mut db = DbSchema::new();
        let table = db.create_or_find_table("ts_Foo", TableKind::Primary);
        let none = HashSet::new();
        db.create_or_find_column(table, &request("Size", false, &none))
            .unwrap();
        let mut conflicting = request("Size", false, &none);
        conflicting.column_type = ColumnType::Integer;
        assert!(matches!(
            db.create_or_find_column(table, &conflicting),
            Err(PropertyMapError::ColumnFactory { .. })
        ));
    }

    #[test]
    fn test_shared_columns_skip_those_in_use() {
        let mut db = DbSchema::new();
        let table = db.create_or_find_table("ts_Element", TableKind::Primary);
        let mut in_use = HashSet::new();
        let ps1 = db.create_or_find_column(table, &request("A", true, &in_use)).unwrap();
        in_use.insert(ps1);
        let ps2 = db.create_or_find_column(table, &request("B", true, &in_use)).unwrap();
        assert_eq!(db.column(ps2).unwrap().name, "ps2");

        // A sibling that only uses ps1 gets ps2 back.
        let sibling: HashSet<ColumnId> = [ps1].into_iter().collect();
        let reused = db.create_or_find_column(table, &request("C", true, &sibling)).unwrap();
        assert_eq!(reused, ps2);
    }

    #[test]
    fn test_virtual_table_gets_virtual_columns() {
        let mut db = DbSchema::new();
        let table = db.create_or_find_table("ts_Address", TableKind::Virtual);
        let none = HashSet::new();
        let id = db.create_or_find_column(table, &request("City", true, &none)).unwrap();
        let column = db.column(id).unwrap();
        assert!(column.is_virtual());
        assert_eq!(column.name, "City");
    }
}
