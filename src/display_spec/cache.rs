use indexmap::IndexMap;
use serde::Deserialize;

use super::errors::DisplaySpecError;
use crate::relationship_path::{ClassSpecifier, PathEnd, RelationshipPath};
use crate::schema_catalog::{CustomAttributeInstance, EcClassId, EcSchema, SchemaCatalog};

pub const RELATED_ITEMS_DISPLAY_SPECIFICATIONS: &str = "RelatedItemsDisplaySpecifications";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SpecificationsPayload {
    #[serde(default)]
    specifications: Vec<SpecificationPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SpecificationPayload {
    parent_class: String,
    relationship_path: String,
    #[serde(default)]
    derived_classes: Vec<String>,
}

/// Related-item paths declared through `RelatedItemsDisplaySpecifications`
/// custom attributes, keyed by parent class.
#[derive(Debug, Clone, Default)]
pub struct RelatedItemsDisplaySpecificationsCache {
    paths: IndexMap<EcClassId, Vec<RelationshipPath>>,
    skipped: Vec<DisplaySpecError>,
}

impl RelatedItemsDisplaySpecificationsCache {
    /// Build the cache from every schema of `catalog`. Entries that fail to
    /// parse or validate are skipped and kept in [`Self::skipped`].
    pub fn build(catalog: &SchemaCatalog) -> Self {
        let mut cache = Self::default();
        if let Err(e) = cache.initialize(catalog) {
            log::warn!("Related items display specifications: {}", e);
        }
        cache
    }

    /// Scan every schema once. Every specification is attempted; the result
    /// is `Incomplete` if any of them had to be skipped.
    pub fn initialize(&mut self, catalog: &SchemaCatalog) -> Result<(), DisplaySpecError> {
        self.paths.clear();
        self.skipped.clear();

        let mut results = Vec::new();
        for schema in catalog.schemas() {
            for attribute in schema_attributes(catalog, schema) {
                results.extend(paths_from_attribute(catalog, schema, attribute));
            }
        }

        for result in results {
            match result {
                Ok(path) => self.insert(path),
                Err(e) => {
                    log::warn!("Skipping related items display specification: {}", e);
                    self.skipped.push(e);
                }
            }
        }

        log::info!(
            "Related items display specifications cached: {} parent classes, {} paths, {} skipped",
            self.paths.len(),
            self.paths.values().map(Vec::len).sum::<usize>(),
            self.skipped.len()
        );

        if self.skipped.is_empty() {
            Ok(())
        } else {
            Err(DisplaySpecError::Incomplete {
                skipped: self.skipped.len(),
            })
        }
    }

    fn insert(&mut self, path: RelationshipPath) {
        let Some(root) = path.root().map(|r| r.id()) else {
            return;
        };
        let entries = self.paths.entry(root).or_default();
        let text = path.to_string();
        if !entries.iter().any(|p| p.to_string() == text) {
            entries.push(path);
        }
    }

    /// Paths registered for `class`, or `None` when it has none.
    pub fn related_paths_from_class(&self, class: EcClassId) -> Option<&[RelationshipPath]> {
        self.paths
            .get(&class)
            .map(Vec::as_slice)
            .filter(|p| !p.is_empty())
    }

    pub fn parent_classes(&self) -> impl Iterator<Item = EcClassId> + '_ {
        self.paths.keys().copied()
    }

    pub fn skipped(&self) -> &[DisplaySpecError] {
        &self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Attributes on the schema itself and on each of its classes.
fn schema_attributes<'a>(
    catalog: &'a SchemaCatalog,
    schema: &'a EcSchema,
) -> Vec<&'a CustomAttributeInstance> {
    let class_attributes = schema
        .class_ids
        .iter()
        .filter_map(|id| catalog.get_class(*id).ok())
        .flat_map(|c| c.custom_attributes.iter());
    schema
        .custom_attributes
        .iter()
        .chain(class_attributes)
        .filter(|ca| ca.short_name() == RELATED_ITEMS_DISPLAY_SPECIFICATIONS)
        .collect()
}

fn paths_from_attribute(
    catalog: &SchemaCatalog,
    schema: &EcSchema,
    attribute: &CustomAttributeInstance,
) -> Vec<Result<RelationshipPath, DisplaySpecError>> {
    let payload: SpecificationsPayload = match serde_json::from_value(attribute.properties.clone()) {
        Ok(payload) => payload,
        Err(e) => {
            return vec![Err(DisplaySpecError::MalformedAttribute {
                schema: schema.name.clone(),
                message: e.to_string(),
            })]
        }
    };

    let mut results = Vec::new();
    for spec in payload.specifications {
        let text = format!("{}.{}", spec.parent_class, spec.relationship_path);
        let base = match parse_valid(&text, catalog, &schema.name) {
            Ok(path) => path,
            Err(e) => {
                results.push(Err(e));
                continue;
            }
        };
        for derived in &spec.derived_classes {
            results.push(derived_variant(&base, derived, catalog, &schema.name));
        }
        results.push(Ok(base));
    }
    results
}

fn parse_valid(
    text: &str,
    catalog: &SchemaCatalog,
    default_schema: &str,
) -> Result<RelationshipPath, DisplaySpecError> {
    let invalid = |source| DisplaySpecError::InvalidPath {
        path: text.to_string(),
        source,
    };
    let path = RelationshipPath::parse(text, catalog, Some(default_schema)).map_err(invalid)?;
    path.validate(catalog).map_err(invalid)?;
    Ok(path)
}

/// Copy of `base` whose leaf is replaced by a class derived from it.
fn derived_variant(
    base: &RelationshipPath,
    derived: &str,
    catalog: &SchemaCatalog,
    default_schema: &str,
) -> Result<RelationshipPath, DisplaySpecError> {
    let invalid = |reason: String| DisplaySpecError::InvalidDerivedClass {
        class_name: derived.to_string(),
        path: base.to_string(),
        reason,
    };
    let class = catalog
        .resolve_class(derived, Some(default_schema))
        .map_err(|e| invalid(e.to_string()))?;
    if let Some(leaf) = base.end_class(PathEnd::Leaf) {
        if !catalog.is_derived_from(&class, leaf) {
            return Err(invalid(format!("it does not derive from {}", leaf)));
        }
    }

    let mut path = base.clone();
    path.replace_end_class(ClassSpecifier::new(class), PathEnd::Leaf)?;
    path.validate(catalog)?;
    Ok(path)
}
