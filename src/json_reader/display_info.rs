//! Display metadata attached to a JSON read: property categories and the
//! classes the instances came from.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::property_map::PropertyMapCollection;
use crate::schema_catalog::EcClass;

/// Category for properties that declare none.
pub const DEFAULT_CATEGORY: &str = "General";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DisplayInfo {
    pub categories: Vec<CategoryInfo>,
    /// Keyed by `Schema.Class`.
    pub classes: IndexMap<String, ClassInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CategoryInfo {
    pub category_name: String,
    pub display_label: String,
    pub properties: Vec<PropertyInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PropertyInfo {
    pub access_string: String,
    pub display_label: String,
    /// Index of the instance in the consolidated result.
    pub instance_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ClassInfo {
    pub name: String,
    pub display_label: String,
    pub relationship_path: String,
}

impl DisplayInfo {
    /// Display info for one instance of `class` read through `relationship_path`.
    pub fn for_class(class: &EcClass, maps: &PropertyMapCollection, relationship_path: &str) -> Self {
        let mut categories: IndexMap<String, CategoryInfo> = IndexMap::new();
        for map in maps.iter() {
            let property = map.property();
            let name = property
                .category
                .clone()
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
            categories
                .entry(name.clone())
                .or_insert_with(|| CategoryInfo {
                    display_label: name.clone(),
                    category_name: name,
                    properties: Vec::new(),
                })
                .properties
                .push(PropertyInfo {
                    access_string: map.access_string().to_string(),
                    display_label: property.display_label().to_string(),
                    instance_index: 0,
                });
        }

        let mut classes = IndexMap::new();
        classes.insert(
            class.ecsql_name(),
            ClassInfo {
                name: class.ecsql_name(),
                display_label: class.display_label().to_string(),
                relationship_path: relationship_path.to_string(),
            },
        );

        DisplayInfo {
            categories: categories.into_values().collect(),
            classes,
        }
    }

    /// Point every property entry at instance `index`.
    pub fn stamp(&mut self, index: usize) {
        for property in self.categories.iter_mut().flat_map(|c| c.properties.iter_mut()) {
            property.instance_index = index;
        }
    }

    /// Fold `other` in: categories merge by name with properties appended,
    /// and the first entry for a class wins.
    pub fn merge(&mut self, other: DisplayInfo) {
        for category in other.categories {
            match self
                .categories
                .iter_mut()
                .find(|c| c.category_name == category.category_name)
            {
                Some(existing) => existing.properties.extend(category.properties),
                None => self.categories.push(category),
            }
        }
        for (name, class) in other.classes {
            self.classes.entry(name).or_insert(class);
        }
    }

    pub fn category(&self, name: &str) -> Option<&CategoryInfo> {
        self.categories.iter().find(|c| c.category_name == name)
    }
}

/// Result of a JSON read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonDocument {
    pub instances: Vec<Value>,
    pub display_info: DisplayInfo,
}

/// Accumulates formatted rows into one [`JsonDocument`].
#[derive(Debug, Default)]
pub struct RowConsolidator {
    document: JsonDocument,
}

impl RowConsolidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, instance: Value, mut info: DisplayInfo) {
        let index = self.document.instances.len();
        info.stamp(index);
        self.document.instances.push(instance);
        if index == 0 {
            self.document.display_info = info;
        } else {
            self.document.display_info.merge(info);
        }
    }

    pub fn len(&self) -> usize {
        self.document.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document.instances.is_empty()
    }

    pub fn finish(self) -> JsonDocument {
        self.document
    }
}
