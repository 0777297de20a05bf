use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::config::CatalogConfig;
use super::ec_schema::{
    is_any_class_name, ClassKind, EcClass, EcClassId, EcProperty, EcPropertyId, EcSchema,
    MapStrategy, PropertyKind, RelationshipConstraint, RelationshipInfo, ANY_CLASS_NAME,
};
use super::errors::CatalogError;

/// Read-only catalog of schemas, classes, and properties.
///
/// Classes are shared as `Arc<EcClass>` so that resolved path specifiers and
/// property maps can hold them without borrowing the catalog. The catalog
/// outlives every mapping session that reads from it.
#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    schemas: Vec<EcSchema>,
    classes: Vec<Arc<EcClass>>,
    /// lower-case schema name -> lower-case class name -> id
    index: HashMap<String, HashMap<String, EcClassId>>,
    /// lower-case alias -> lower-case schema name
    aliases: HashMap<String, String>,
}

/// Case-insensitive class name index shared by catalog building and lookup.
struct NameIndex<'a> {
    index: &'a HashMap<String, HashMap<String, EcClassId>>,
    aliases: &'a HashMap<String, String>,
}

impl NameIndex<'_> {
    fn lookup(&self, name: &str, default_schema: Option<&str>) -> Result<EcClassId, CatalogError> {
        match split_qualified_name(name) {
            (Some(schema), class_name) => {
                let schema_key = self.schema_key(schema).ok_or_else(|| {
                    CatalogError::UnknownSchema {
                        schema: schema.to_string(),
                    }
                })?;
                self.index
                    .get(&schema_key)
                    .and_then(|classes| classes.get(&class_name.to_ascii_lowercase()))
                    .copied()
                    .ok_or_else(|| CatalogError::UnknownClass {
                        class_name: name.to_string(),
                    })
            }
            (None, class_name) => {
                let class_key = class_name.to_ascii_lowercase();
                if let Some(schema) = default_schema {
                    if let Some(id) = self
                        .schema_key(schema)
                        .and_then(|key| self.index.get(&key))
                        .and_then(|classes| classes.get(&class_key))
                    {
                        return Ok(*id);
                    }
                }
                let mut matches = self
                    .index
                    .values()
                    .filter_map(|classes| classes.get(&class_key).copied());
                match (matches.next(), matches.next()) {
                    (Some(id), None) => Ok(id),
                    (Some(_), Some(_)) => Err(CatalogError::AmbiguousClass {
                        class_name: name.to_string(),
                    }),
                    _ => Err(CatalogError::UnknownClass {
                        class_name: name.to_string(),
                    }),
                }
            }
        }
    }

    fn schema_key(&self, schema: &str) -> Option<String> {
        let key = schema.to_ascii_lowercase();
        if self.index.contains_key(&key) {
            Some(key)
        } else {
            self.aliases.get(&key).cloned()
        }
    }

    /// Canonical `Schema:Class` form of a class reference.
    fn canonical(
        &self,
        name: &str,
        default_schema: &str,
        full_names: &[String],
    ) -> Result<String, CatalogError> {
        if is_any_class_name(name) {
            return Ok(ANY_CLASS_NAME.to_string());
        }
        let id = self.lookup(name, Some(default_schema))?;
        Ok(full_names[(id.0 - 1) as usize].clone())
    }
}

/// Split `Schema:Class` or `Schema.Class` into its parts.
pub fn split_qualified_name(name: &str) -> (Option<&str>, &str) {
    match name.find([':', '.']) {
        Some(pos) => (Some(&name[..pos]), &name[pos + 1..]),
        None => (None, name),
    }
}

impl SchemaCatalog {
    pub fn build(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let mut index: HashMap<String, HashMap<String, EcClassId>> = HashMap::new();
        let mut aliases = HashMap::new();
        let mut full_names = Vec::new();

        // Pass 1: assign ids in declaration order.
        for schema in &config.schemas {
            let schema_key = schema.name.to_ascii_lowercase();
            if index.contains_key(&schema_key) {
                return Err(CatalogError::invalid(format!(
                    "schema '{}' is defined twice",
                    schema.name
                )));
            }
            if let Some(alias) = &schema.alias {
                aliases.insert(alias.to_ascii_lowercase(), schema_key.clone());
            }
            let classes = index.entry(schema_key).or_default();
            for class in &schema.classes {
                let id = EcClassId(full_names.len() as u64 + 1);
                if classes
                    .insert(class.name.to_ascii_lowercase(), id)
                    .is_some()
                {
                    return Err(CatalogError::invalid(format!(
                        "class '{}:{}' is defined twice",
                        schema.name, class.name
                    )));
                }
                full_names.push(format!("{}:{}", schema.name, class.name));
            }
        }

        let names = NameIndex {
            index: &index,
            aliases: &aliases,
        };

        // Pass 2: resolve references and materialize classes.
        let mut schemas = Vec::new();
        let mut classes = Vec::new();
        let mut next_property_id = 1u64;
        for schema in &config.schemas {
            let alias = schema.alias.clone().unwrap_or_else(|| schema.name.clone());
            let mut class_ids = Vec::new();
            for def in &schema.classes {
                let id = EcClassId(classes.len() as u64 + 1);
                class_ids.push(id);

                let base_class_ids = def
                    .base_classes
                    .iter()
                    .map(|base| names.lookup(base, Some(&schema.name)))
                    .collect::<Result<Vec<_>, _>>()?;

                let mut properties = Vec::new();
                for prop in &def.properties {
                    let kind = match prop.to_property_kind()? {
                        PropertyKind::Struct { struct_class } => PropertyKind::Struct {
                            struct_class: names.canonical(&struct_class, &schema.name, &full_names)?,
                        },
                        PropertyKind::StructArray { struct_class } => PropertyKind::StructArray {
                            struct_class: names.canonical(&struct_class, &schema.name, &full_names)?,
                        },
                        PropertyKind::Navigation {
                            relationship,
                            direction,
                        } => PropertyKind::Navigation {
                            relationship: names.canonical(&relationship, &schema.name, &full_names)?,
                            direction,
                        },
                        other => other,
                    };
                    properties.push(Arc::new(EcProperty {
                        id: EcPropertyId(next_property_id),
                        name: prop.name.clone(),
                        kind,
                        column_name: prop.column_name.clone(),
                        category: prop.category.clone(),
                        display_label: prop.display_label.clone(),
                        not_null: prop.not_null,
                        unique: prop.unique,
                        collation: prop.collation,
                    }));
                    next_property_id += 1;
                }

                let relationship = if def.kind == ClassKind::Relationship {
                    let (Some(source), Some(target)) = (&def.source, &def.target) else {
                        return Err(CatalogError::invalid(format!(
                            "relationship '{}:{}' must declare source and target constraints",
                            schema.name, def.name
                        )));
                    };
                    let canonical_constraint = |c: &RelationshipConstraint| {
                        c.classes
                            .iter()
                            .map(|name| names.canonical(name, &schema.name, &full_names))
                            .collect::<Result<Vec<_>, _>>()
                            .map(|classes| RelationshipConstraint {
                                classes,
                                polymorphic: c.polymorphic,
                            })
                    };
                    Some(RelationshipInfo {
                        source: canonical_constraint(source)?,
                        target: canonical_constraint(target)?,
                        mapping: def
                            .mapping
                            .clone()
                            .unwrap_or(super::ec_schema::RelationshipMapping::LinkTable),
                    })
                } else {
                    None
                };

                classes.push(Arc::new(EcClass {
                    id,
                    schema_name: schema.name.clone(),
                    schema_alias: alias.clone(),
                    name: def.name.clone(),
                    kind: def.kind,
                    is_abstract: def.is_abstract,
                    base_class_ids,
                    properties,
                    relationship,
                    map_strategy: def.map_strategy,
                    custom_attributes: def.custom_attributes.clone(),
                    display_label: def.display_label.clone(),
                }));
            }
            schemas.push(EcSchema {
                name: schema.name.clone(),
                alias,
                class_ids,
                custom_attributes: schema.custom_attributes.clone(),
            });
        }

        let catalog = SchemaCatalog {
            schemas,
            classes,
            index,
            aliases,
        };
        catalog.check_struct_references()?;
        catalog.check_hierarchy_is_acyclic()?;
        log::debug!(
            "Built schema catalog: {} schemas, {} classes",
            catalog.schemas.len(),
            catalog.classes.len()
        );
        Ok(catalog)
    }

    fn check_struct_references(&self) -> Result<(), CatalogError> {
        for class in &self.classes {
            for prop in &class.properties {
                let target = match &prop.kind {
                    PropertyKind::Struct { struct_class }
                    | PropertyKind::StructArray { struct_class } => struct_class,
                    PropertyKind::Navigation { relationship, .. } => {
                        if !self.resolve_class(relationship, None)?.is_relationship() {
                            return Err(CatalogError::invalid(format!(
                                "navigation property '{}.{}' must reference a relationship class",
                                class.full_name(),
                                prop.name
                            )));
                        }
                        continue;
                    }
                    _ => continue,
                };
                if !self.resolve_class(target, None)?.is_struct() {
                    return Err(CatalogError::invalid(format!(
                        "struct property '{}.{}' references non-struct class '{}'",
                        class.full_name(),
                        prop.name,
                        target
                    )));
                }
            }
        }
        Ok(())
    }

    fn check_hierarchy_is_acyclic(&self) -> Result<(), CatalogError> {
        for class in &self.classes {
            let mut seen = HashSet::new();
            let mut stack = class.base_class_ids.clone();
            while let Some(id) = stack.pop() {
                if id == class.id {
                    return Err(CatalogError::invalid(format!(
                        "class '{}' derives from itself",
                        class.full_name()
                    )));
                }
                if seen.insert(id) {
                    stack.extend(self.class_by_index(id).base_class_ids.iter().copied());
                }
            }
        }
        Ok(())
    }

    fn class_by_index(&self, id: EcClassId) -> &Arc<EcClass> {
        &self.classes[(id.0 - 1) as usize]
    }

    pub fn schemas(&self) -> &[EcSchema] {
        &self.schemas
    }

    pub fn classes(&self) -> &[Arc<EcClass>] {
        &self.classes
    }

    pub fn get_class(&self, id: EcClassId) -> Result<&Arc<EcClass>, CatalogError> {
        if id.0 == 0 || id.0 as usize > self.classes.len() {
            return Err(CatalogError::UnknownClass {
                class_name: id.to_string(),
            });
        }
        Ok(self.class_by_index(id))
    }

    pub fn find_schema(&self, name: &str) -> Option<&EcSchema> {
        self.schemas.iter().find(|s| {
            s.name.eq_ignore_ascii_case(name) || s.alias.eq_ignore_ascii_case(name)
        })
    }

    /// Resolve a qualified (`Schema:Class`, `Schema.Class`, `alias:Class`) or
    /// simple class name. Simple names are looked up in `default_schema` first
    /// and must otherwise be unique across all schemas.
    pub fn resolve_class(
        &self,
        name: &str,
        default_schema: Option<&str>,
    ) -> Result<Arc<EcClass>, CatalogError> {
        let names = NameIndex {
            index: &self.index,
            aliases: &self.aliases,
        };
        let id = names.lookup(name.trim(), default_schema)?;
        Ok(self.class_by_index(id).clone())
    }

    /// True if `class` is `base` or derives from it, directly or transitively.
    pub fn is_derived_from(&self, class: &EcClass, base: &EcClass) -> bool {
        if class.id == base.id {
            return true;
        }
        let mut seen = HashSet::new();
        let mut stack = class.base_class_ids.clone();
        while let Some(id) = stack.pop() {
            if id == base.id {
                return true;
            }
            if seen.insert(id) {
                stack.extend(self.class_by_index(id).base_class_ids.iter().copied());
            }
        }
        false
    }

    pub fn derived_classes(&self, base: &EcClass) -> Vec<Arc<EcClass>> {
        self.classes
            .iter()
            .filter(|c| c.base_class_ids.contains(&base.id))
            .cloned()
            .collect()
    }

    /// Base classes (transitively) followed by the class itself, topmost first.
    pub fn class_hierarchy(&self, class: &EcClass) -> Vec<Arc<EcClass>> {
        let mut ordered: IndexMap<EcClassId, Arc<EcClass>> = IndexMap::new();
        self.collect_hierarchy(class.id, &mut ordered);
        ordered.into_values().collect()
    }

    fn collect_hierarchy(&self, id: EcClassId, out: &mut IndexMap<EcClassId, Arc<EcClass>>) {
        if out.contains_key(&id) {
            return;
        }
        let class = self.class_by_index(id);
        for base in &class.base_class_ids {
            self.collect_hierarchy(*base, out);
        }
        out.insert(id, class.clone());
    }

    /// Inherited properties first, then own ones; an own property with the
    /// same name as an inherited one overrides it in place.
    pub fn all_properties(&self, class: &EcClass) -> Vec<Arc<EcProperty>> {
        let mut props: IndexMap<String, Arc<EcProperty>> = IndexMap::new();
        for c in self.class_hierarchy(class) {
            for p in &c.properties {
                props.insert(p.name.to_ascii_lowercase(), p.clone());
            }
        }
        props.into_values().collect()
    }

    pub fn find_property(
        &self,
        class: &EcClass,
        name: &str,
    ) -> Result<Arc<EcProperty>, CatalogError> {
        self.all_properties(class)
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| CatalogError::UnknownProperty {
                class_name: class.full_name(),
                property: name.to_string(),
            })
    }

    /// Strategy declared on the class or inherited from the nearest base that
    /// declares one.
    pub fn effective_map_strategy(&self, class: &EcClass) -> MapStrategy {
        if class.is_struct() || class.kind == ClassKind::CustomAttribute {
            return MapStrategy::NotMapped;
        }
        self.class_hierarchy(class)
            .iter()
            .rev()
            .find_map(|c| c.map_strategy)
            .unwrap_or_default()
    }

    /// Class owning the table that `class` maps into: the topmost class
    /// declaring a table-per-hierarchy strategy, or the class itself.
    pub fn table_root(&self, class: &Arc<EcClass>) -> Arc<EcClass> {
        match self.effective_map_strategy(class) {
            MapStrategy::TablePerHierarchy { .. } => self
                .class_hierarchy(class)
                .into_iter()
                .find(|c| {
                    matches!(
                        c.map_strategy,
                        Some(MapStrategy::TablePerHierarchy { .. })
                    )
                })
                .unwrap_or_else(|| class.clone()),
            _ => class.clone(),
        }
    }

    /// Whether a relationship constraint accepts `class`, polymorphically or
    /// exactly depending on the constraint's polymorphic flag.
    pub fn constraint_accepts(&self, constraint: &RelationshipConstraint, class: &EcClass) -> bool {
        constraint.classes.iter().any(|name| {
            if is_any_class_name(name) {
                return true;
            }
            match self.resolve_class(name, None) {
                Ok(constraint_class) if constraint.polymorphic => {
                    self.is_derived_from(class, &constraint_class)
                }
                Ok(constraint_class) => constraint_class.id == class.id,
                Err(_) => false,
            }
        })
    }
}
