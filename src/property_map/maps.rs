use std::collections::BTreeSet;
use std::sync::Arc;

use super::collection::PropertyMapCollection;
use super::column_factory::{ColumnFactory, ColumnId, TableId};
use super::errors::PropertyMapError;
use crate::schema_catalog::{EcClassId, EcProperty, PropertyKind};

/// Discriminant over the fixed set of property map variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyMapKind {
    Primitive,
    Point,
    PrimitiveArray,
    StructArrayJson,
    Struct,
    Navigation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationState {
    /// Waiting for the relationship's class map.
    Pending,
    Resolved { column: ColumnId },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyMapData {
    Primitive { column: Option<ColumnId> },
    /// X, Y and, for 3d points, Z; all in one table.
    Point { is_3d: bool, columns: Vec<ColumnId> },
    PrimitiveArray { column: Option<ColumnId> },
    /// Struct array serialized as one JSON document.
    StructArrayJson { column: Option<ColumnId> },
    Struct { members: PropertyMapCollection },
    Navigation { state: NavigationState },
}

/// Binds one property access string of a class to its physical columns.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyMap {
    property: Arc<EcProperty>,
    access_string: String,
    class_id: EcClassId,
    /// Access string of the enclosing struct map. Points back into the tree
    /// without owning anything.
    parent: Option<String>,
    data: PropertyMapData,
}

pub const POINT_COMPONENTS: [&str; 3] = ["X", "Y", "Z"];

impl PropertyMap {
    pub fn new(
        property: Arc<EcProperty>,
        access_string: String,
        class_id: EcClassId,
        parent: Option<String>,
        data: PropertyMapData,
    ) -> Self {
        PropertyMap {
            property,
            access_string,
            class_id,
            parent,
            data,
        }
    }

    pub fn property(&self) -> &Arc<EcProperty> {
        &self.property
    }

    pub fn access_string(&self) -> &str {
        &self.access_string
    }

    pub fn class_id(&self) -> EcClassId {
        self.class_id
    }

    pub fn parent_access_string(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn data(&self) -> &PropertyMapData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut PropertyMapData {
        &mut self.data
    }

    pub fn kind(&self) -> PropertyMapKind {
        match &self.data {
            PropertyMapData::Primitive { .. } => PropertyMapKind::Primitive,
            PropertyMapData::Point { .. } => PropertyMapKind::Point,
            PropertyMapData::PrimitiveArray { .. } => PropertyMapKind::PrimitiveArray,
            PropertyMapData::StructArrayJson { .. } => PropertyMapKind::StructArrayJson,
            PropertyMapData::Struct { .. } => PropertyMapKind::Struct,
            PropertyMapData::Navigation { .. } => PropertyMapKind::Navigation,
        }
    }

    pub fn members(&self) -> Option<&PropertyMapCollection> {
        match &self.data {
            PropertyMapData::Struct { members } => Some(members),
            _ => None,
        }
    }

    pub(crate) fn members_mut(&mut self) -> Option<&mut PropertyMapCollection> {
        match &mut self.data {
            PropertyMapData::Struct { members } => Some(members),
            _ => None,
        }
    }

    /// Number of columns a leaf of this kind is bound to once finished.
    pub fn expected_column_count(&self) -> usize {
        match &self.data {
            PropertyMapData::Point { is_3d: true, .. } => 3,
            PropertyMapData::Point { is_3d: false, .. } => 2,
            PropertyMapData::Struct { .. } => 0,
            _ => 1,
        }
    }

    /// Columns of this map; a struct map returns its members' columns.
    pub fn columns(&self) -> Vec<ColumnId> {
        match &self.data {
            PropertyMapData::Primitive { column }
            | PropertyMapData::PrimitiveArray { column }
            | PropertyMapData::StructArrayJson { column } => column.iter().copied().collect(),
            PropertyMapData::Point { columns, .. } => columns.clone(),
            PropertyMapData::Struct { members } => {
                members.iter().flat_map(|m| m.columns()).collect()
            }
            PropertyMapData::Navigation { state } => match state {
                NavigationState::Resolved { column } => vec![*column],
                NavigationState::Pending => Vec::new(),
            },
        }
    }

    /// Per-column access strings for persistence: point components get a
    /// `.X`/`.Y`/`.Z` suffix.
    pub fn column_access_strings(&self) -> Vec<String> {
        match &self.data {
            PropertyMapData::Point { is_3d, .. } => {
                let count = if *is_3d { 3 } else { 2 };
                POINT_COMPONENTS[..count]
                    .iter()
                    .map(|c| format!("{}.{}", self.access_string, c))
                    .collect()
            }
            PropertyMapData::Struct { .. } => Vec::new(),
            _ => vec![self.access_string.clone()],
        }
    }

    /// Tables holding this map's columns; for a struct the union of its
    /// members' tables.
    pub fn tables(&self, factory: &dyn ColumnFactory) -> BTreeSet<TableId> {
        self.columns()
            .into_iter()
            .filter_map(|id| factory.column(id).map(|c| c.table))
            .collect()
    }

    /// Bind leaf columns, checking count and that they share one table.
    pub fn set_columns(
        &mut self,
        columns: Vec<ColumnId>,
        factory: &dyn ColumnFactory,
    ) -> Result<(), PropertyMapError> {
        let expected = self.expected_column_count();
        if columns.len() != expected {
            return Err(PropertyMapError::ColumnCountMismatch {
                class_name: self.class_id.to_string(),
                access_string: self.access_string.clone(),
                expected,
                found: columns.len(),
            });
        }
        let mut tables = BTreeSet::new();
        for id in &columns {
            let column = factory
                .column(*id)
                .ok_or_else(|| PropertyMapError::UnknownColumn {
                    access_string: self.access_string.clone(),
                    column_id: id.0,
                })?;
            tables.insert(column.table);
        }
        if tables.len() > 1 {
            return Err(PropertyMapError::ColumnsSpanTables {
                access_string: self.access_string.clone(),
            });
        }

        let mut columns = columns.into_iter();
        match &mut self.data {
            PropertyMapData::Primitive { column }
            | PropertyMapData::PrimitiveArray { column }
            | PropertyMapData::StructArrayJson { column } => *column = columns.next(),
            PropertyMapData::Point { columns: bound, .. } => *bound = columns.collect(),
            PropertyMapData::Navigation { state } => {
                if let Some(column) = columns.next() {
                    *state = NavigationState::Resolved { column };
                }
            }
            PropertyMapData::Struct { .. } => {}
        }
        Ok(())
    }

    /// Name of the relationship behind a navigation map.
    pub fn navigation_relationship(&self) -> Option<&str> {
        match &self.property.kind {
            PropertyKind::Navigation { relationship, .. } => Some(relationship),
            _ => None,
        }
    }

    pub fn is_pending_navigation(&self) -> bool {
        matches!(
            self.data,
            PropertyMapData::Navigation {
                state: NavigationState::Pending
            }
        )
    }
}
