use std::collections::HashSet;

use super::errors::PathError;
use super::path::{PathEnd, RelationshipPath};
use super::specifier::ClassSpecifier;

/// Expressions addressing one end of a compiled path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedEndInfo {
    pub alias: String,
    pub class_id_expression: String,
    pub instance_id_expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPathSql {
    pub from_clause: String,
    pub join_clause: String,
    pub root: GeneratedEndInfo,
    pub leaf: GeneratedEndInfo,
}

impl GeneratedPathSql {
    /// Full statement selecting `columns` with one positional parameter bound
    /// to the instance id at `filter_end`.
    pub fn to_select(&self, columns: &[String], filter_end: PathEnd) -> String {
        let filter = match filter_end {
            PathEnd::Root => &self.root.instance_id_expression,
            PathEnd::Leaf => &self.leaf.instance_id_expression,
        };
        let mut sql = format!("SELECT {} {}", columns.join(", "), self.from_clause);
        if !self.join_clause.is_empty() {
            sql.push(' ');
            sql.push_str(&self.join_clause);
        }
        sql.push_str(&format!(" WHERE {} = ?", filter));
        sql
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcSqlOptions {
    /// Without polymorphism the root is selected with `ONLY`.
    pub polymorphic: bool,
    /// Reference classes as `Schema.Class` instead of the bare class name.
    pub qualify_class_names: bool,
}

impl Default for EcSqlOptions {
    fn default() -> Self {
        EcSqlOptions {
            polymorphic: true,
            qualify_class_names: true,
        }
    }
}

/// Aliases for every class a path touches, in path order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathAliases {
    pub root: Option<String>,
    pub hops: Vec<HopAliases>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopAliases {
    pub relationship: String,
    /// `None` for an AnyClass wildcard.
    pub related: Option<String>,
}

impl PathAliases {
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.root.iter().chain(
            self.hops
                .iter()
                .flat_map(|h| std::iter::once(&h.relationship).chain(h.related.iter())),
        )
    }
}

struct AliasAllocator {
    used: HashSet<String>,
}

impl AliasAllocator {
    /// Class name, suffixed with the first free number when already taken.
    fn allocate(&mut self, class: &ClassSpecifier) -> String {
        let mut alias = class.name.clone();
        let mut suffix = 1;
        while !self.used.insert(alias.to_ascii_lowercase()) {
            alias = format!("{}{}", class.name, suffix);
            suffix += 1;
        }
        alias
    }
}

fn class_reference(class: &ClassSpecifier, options: &EcSqlOptions) -> String {
    if options.qualify_class_names {
        class.ecsql_name()
    } else {
        class.name.clone()
    }
}

fn table_expression(class: &ClassSpecifier, alias: &str, options: &EcSqlOptions) -> String {
    let reference = class_reference(class, options);
    if reference == alias {
        reference
    } else {
        format!("{} AS {}", reference, alias)
    }
}

fn end_info(alias: &str, prefix: &str) -> GeneratedEndInfo {
    GeneratedEndInfo {
        alias: alias.to_string(),
        class_id_expression: format!("{}.{}ECClassId", alias, prefix),
        instance_id_expression: format!("{}.{}ECInstanceId", alias, prefix),
    }
}

impl RelationshipPath {
    /// Assign pairwise distinct aliases; a class met twice (self-join) gets a
    /// numeric suffix on its second occurrence.
    pub fn setup_aliases(&self) -> PathAliases {
        let mut allocator = AliasAllocator {
            used: HashSet::new(),
        };
        let root = self.root().map(|r| allocator.allocate(r));
        let hops = self
            .hops()
            .iter()
            .map(|hop| HopAliases {
                relationship: allocator.allocate(&hop.relationship),
                related: hop.related.as_class().map(|c| allocator.allocate(c)),
            })
            .collect();
        PathAliases { root, hops }
    }

    /// Compile the path to a FROM clause, a JOIN clause, and the expressions
    /// addressing both ends.
    pub fn generate_ecsql(&self, options: &EcSqlOptions) -> Result<GeneratedPathSql, PathError> {
        if self.is_empty() {
            return Err(PathError::EmptyPath);
        }
        let aliases = self.setup_aliases();
        let only = if options.polymorphic { "" } else { "ONLY " };
        let mut joins: Vec<String> = Vec::new();

        let (from_clause, root_info, first_hop) = match (self.root(), &aliases.root) {
            (Some(root), Some(alias)) => (
                format!("FROM {}{}", only, table_expression(root, alias, options)),
                end_info(alias, ""),
                0,
            ),
            _ => {
                let hop = self.hops().first().ok_or(PathError::EmptyPath)?;
                let hop_aliases = aliases.hops.first().ok_or(PathError::EmptyPath)?;
                let rel_alias = &hop_aliases.relationship;
                let from_prefix = hop.direction.from_end().system_prefix();
                (
                    format!(
                        "FROM {}{}",
                        only,
                        table_expression(&hop.relationship, rel_alias, options)
                    ),
                    end_info(rel_alias, from_prefix),
                    1,
                )
            }
        };

        let mut current = root_info.clone();
        for (index, (hop, hop_aliases)) in self.hops().iter().zip(&aliases.hops).enumerate() {
            let rel_alias = &hop_aliases.relationship;
            let from_prefix = hop.direction.from_end().system_prefix();
            let to_prefix = hop.direction.to_end().system_prefix();

            if index >= first_hop {
                joins.push(format!(
                    "JOIN {} ON {} = {}.{}ECInstanceId",
                    table_expression(&hop.relationship, rel_alias, options),
                    current.instance_id_expression,
                    rel_alias,
                    from_prefix
                ));
            }

            current = match (hop.related.as_class(), &hop_aliases.related) {
                (Some(related), Some(related_alias)) => {
                    joins.push(format!(
                        "JOIN {} ON {}.{}ECInstanceId = {}.ECInstanceId",
                        table_expression(related, related_alias, options),
                        rel_alias,
                        to_prefix,
                        related_alias
                    ));
                    end_info(related_alias, "")
                }
                _ => end_info(rel_alias, to_prefix),
            };
        }

        Ok(GeneratedPathSql {
            from_clause,
            join_clause: joins.join(" "),
            root: root_info,
            leaf: current,
        })
    }
}
