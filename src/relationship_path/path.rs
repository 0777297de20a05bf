use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

use super::errors::PathError;
use super::specifier::{ClassSpecifier, RelatedClass, RelatedClassSpecifier};
use crate::schema_catalog::{
    ec_schema::is_any_class_name, split_qualified_name, EcClassId, RelatedDirection,
    SchemaCatalog,
};

lazy_static! {
    /// `Rel:0:Class`, each name optionally schema-qualified.
    static ref HOP_SEGMENT: Regex = Regex::new(
        r"^(?P<rel>[^:]+(?::[^:]+)?)\s*:\s*(?P<dir>[01])\s*:\s*(?P<related>[^:]+(?::[^:]+)?)$"
    )
    .expect("hop segment pattern is valid");
    static ref IDENTIFIER: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathEnd {
    Root,
    Leaf,
}

/// A chain of typed relationship hops starting at a root class.
///
/// The root may be absent when the path starts at a relationship; in that
/// case the first hop's relationship table is the starting point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipPath {
    root: Option<ClassSpecifier>,
    hops: Vec<RelatedClassSpecifier>,
}

impl RelationshipPath {
    pub fn new(root: Option<ClassSpecifier>, hops: Vec<RelatedClassSpecifier>) -> Self {
        RelationshipPath { root, hops }
    }

    /// Zero-hop path to a single class.
    pub fn trivial(root: ClassSpecifier) -> Self {
        RelationshipPath {
            root: Some(root),
            hops: Vec::new(),
        }
    }

    /// Parse the dotted path grammar:
    /// `[Schema:]Root[.[Schema:]Relationship:{0|1}:[Schema:]Related]*`
    pub fn parse(
        text: &str,
        catalog: &SchemaCatalog,
        default_schema: Option<&str>,
    ) -> Result<Self, PathError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(RelationshipPath::default());
        }

        let mut segments = text.split('.').map(str::trim);
        let root_segment = segments.next().unwrap_or_default();
        let root = if root_segment.is_empty() {
            None
        } else {
            Some(resolve(root_segment, catalog, default_schema)?)
        };

        let mut hops = Vec::new();
        for segment in segments {
            hops.push(parse_hop(segment, catalog, default_schema)?);
        }

        if root.is_none() && hops.is_empty() {
            return Err(PathError::MalformedSegment {
                segment: text.to_string(),
                reason: "path has neither a root class nor a hop".to_string(),
            });
        }
        Ok(RelationshipPath { root, hops })
    }

    /// Clear this path and repopulate it from `text`. On failure the path is
    /// left empty.
    pub fn init_from_string(
        &mut self,
        text: &str,
        catalog: &SchemaCatalog,
        default_schema: Option<&str>,
    ) -> Result<(), PathError> {
        self.clear();
        match Self::parse(text, catalog, default_schema) {
            Ok(path) => {
                *self = path;
                Ok(())
            }
            Err(e) => {
                log::debug!("Invalid relationship path '{}': {}", text, e);
                Err(e)
            }
        }
    }

    pub fn clear(&mut self) {
        self.root = None;
        self.hops.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none() && self.hops.is_empty()
    }

    pub fn root(&self) -> Option<&ClassSpecifier> {
        self.root.as_ref()
    }

    pub fn hops(&self) -> &[RelatedClassSpecifier] {
        &self.hops
    }

    pub fn hop_count(&self) -> usize {
        self.hops.len()
    }

    /// Class at an end. Without hops the leaf is the root; a wildcard end
    /// yields `None`.
    pub fn end_class(&self, end: PathEnd) -> Option<&ClassSpecifier> {
        match end {
            PathEnd::Root => self.root.as_ref(),
            PathEnd::Leaf => match self.hops.last() {
                Some(hop) => hop.related.as_class(),
                None => self.root.as_ref(),
            },
        }
    }

    pub fn is_any_class_at_end(&self, end: PathEnd) -> bool {
        match end {
            PathEnd::Root => self.root.is_none() && !self.hops.is_empty(),
            PathEnd::Leaf => self
                .hops
                .last()
                .map(|hop| hop.related.is_any_class())
                .unwrap_or(false),
        }
    }

    /// Replace a wildcard end with a concrete class. Fails if the end is not
    /// currently a wildcard.
    pub fn replace_any_class_at_end(
        &mut self,
        class: ClassSpecifier,
        end: PathEnd,
    ) -> Result<(), PathError> {
        if !self.is_any_class_at_end(end) {
            return Err(PathError::EndIsNotAnyClass);
        }
        self.replace_end_class(class, end)
    }

    /// Replace the class at an end, wildcard or not.
    pub fn replace_end_class(
        &mut self,
        class: ClassSpecifier,
        end: PathEnd,
    ) -> Result<(), PathError> {
        match end {
            PathEnd::Root => self.root = Some(class),
            PathEnd::Leaf => match self.hops.last_mut() {
                Some(hop) => hop.related = RelatedClass::Class(class),
                None if self.root.is_some() => self.root = Some(class),
                None => return Err(PathError::EmptyPath),
            },
        }
        Ok(())
    }

    /// Classes along the path: the root followed by every hop's related
    /// class. Wildcards are `None`.
    fn class_sequence(&self) -> Vec<Option<EcClassId>> {
        std::iter::once(self.root.as_ref().map(|r| r.id()))
            .chain(self.hops.iter().map(|hop| hop.related.class_id()))
            .collect()
    }

    /// Path with hop order and directions flipped.
    pub fn reversed(&self) -> RelationshipPath {
        if self.hops.is_empty() {
            return self.clone();
        }
        let mut classes: Vec<RelatedClass> = std::iter::once(self.root.clone().into())
            .chain(self.hops.iter().map(|hop| hop.related.clone()))
            .collect();
        let root = classes.pop().and_then(|c| c.as_class().cloned());
        let hops = self
            .hops
            .iter()
            .zip(classes)
            .rev()
            .map(|(hop, preceding)| RelatedClassSpecifier {
                relationship: hop.relationship.clone(),
                related: preceding,
                direction: hop.direction.reversed(),
            })
            .collect();
        RelationshipPath { root, hops }
    }

    pub fn reverse(&mut self) {
        *self = self.reversed();
    }

    /// Stitch `other` onto this path.
    ///
    /// The leaf class of this path must occur in `other`. This path is
    /// scanned forward from its root for the first class that also occurs in
    /// `other` (looked up root first, then hop by hop). Everything this path
    /// routes before or after that shared class is dropped in favour of
    /// `other`'s route from it, so a path ending where `other` starts becomes
    /// `other` and a loop back to an earlier class collapses.
    pub fn combine(&mut self, other: &RelationshipPath) -> Result<(), PathError> {
        if other.is_empty() {
            return Ok(());
        }
        if self.is_empty() {
            *self = other.clone();
            return Ok(());
        }

        let no_common_class = || PathError::NoCommonClass {
            left: self.to_string(),
            right: other.to_string(),
        };
        let other_classes = other.class_sequence();
        let position_in_other =
            |id: EcClassId| other_classes.iter().position(|c| *c == Some(id));

        let leaf_id = self
            .end_class(PathEnd::Leaf)
            .map(|c| c.id())
            .ok_or_else(no_common_class)?;
        if position_in_other(leaf_id).is_none() {
            return Err(no_common_class());
        }

        let (cut, resume) = self
            .class_sequence()
            .iter()
            .enumerate()
            .find_map(|(p, id)| id.and_then(|id| position_in_other(id).map(|q| (p, q))))
            .ok_or_else(no_common_class)?;

        log::trace!(
            "Combining '{}' with '{}': dropping {} leading hop(s), resuming at {}",
            self,
            other,
            cut,
            resume
        );
        let shared = match resume {
            0 => other.root.clone(),
            q => other.hops[q - 1].related.as_class().cloned(),
        };
        *self = RelationshipPath {
            root: shared,
            hops: other.hops[resume..].to_vec(),
        };
        Ok(())
    }

    /// Check every hop against its relationship's constraints: the
    /// constraint on the hop's starting end must accept the preceding class
    /// and the opposite one must accept the related class.
    pub fn validate(&self, catalog: &SchemaCatalog) -> Result<(), PathError> {
        let mut preceding = self.root.clone();
        for (index, hop) in self.hops.iter().enumerate() {
            let info = hop.relationship.relationship.as_ref().ok_or_else(|| {
                PathError::NotARelationship {
                    class_name: hop.relationship.to_string(),
                }
            })?;

            let checks = [
                (hop.direction.from_end(), preceding.as_ref()),
                (hop.direction.to_end(), hop.related.as_class()),
            ];
            for (end, class) in checks {
                let Some(class) = class else { continue };
                if !catalog.constraint_accepts(info.constraint(end), class) {
                    log::debug!(
                        "Relationship path '{}' fails validation at hop {}",
                        self,
                        index
                    );
                    return Err(PathError::ConstraintViolation {
                        hop: index,
                        relationship: hop.relationship.to_string(),
                        end: end.system_prefix().to_string(),
                        class_name: class.to_string(),
                    });
                }
            }
            preceding = hop.related.as_class().cloned();
        }
        Ok(())
    }

    pub fn is_valid(&self, catalog: &SchemaCatalog) -> bool {
        self.validate(catalog).is_ok()
    }
}

impl fmt::Display for RelationshipPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(root) = &self.root {
            write!(f, "{}", root)?;
        }
        for hop in &self.hops {
            write!(f, ".{}", hop)?;
        }
        Ok(())
    }
}

fn check_name(name: &str) -> Result<(), PathError> {
    let (schema, class_name) = split_qualified_name(name);
    let valid = IDENTIFIER.is_match(class_name)
        && schema.map(|s| IDENTIFIER.is_match(s)).unwrap_or(true);
    if valid {
        Ok(())
    } else {
        Err(PathError::InvalidName {
            name: name.to_string(),
        })
    }
}

/// `Schema : Class` -> `Schema:Class`.
fn normalize_name(name: &str) -> String {
    name.split(':').map(str::trim).collect::<Vec<_>>().join(":")
}

fn resolve(
    name: &str,
    catalog: &SchemaCatalog,
    default_schema: Option<&str>,
) -> Result<ClassSpecifier, PathError> {
    let name = normalize_name(name);
    let name = name.as_str();
    check_name(name)?;
    catalog
        .resolve_class(name, default_schema)
        .map(ClassSpecifier::new)
        .map_err(|source| PathError::Unresolved {
            name: name.to_string(),
            source,
        })
}

fn parse_hop(
    segment: &str,
    catalog: &SchemaCatalog,
    default_schema: Option<&str>,
) -> Result<RelatedClassSpecifier, PathError> {
    let captures = HOP_SEGMENT
        .captures(segment)
        .ok_or_else(|| PathError::MalformedSegment {
            segment: segment.to_string(),
            reason: "expected `Relationship:{0|1}:Class`".to_string(),
        })?;

    let relationship = resolve(&captures["rel"], catalog, default_schema)?;
    if !relationship.is_relationship() {
        return Err(PathError::NotARelationship {
            class_name: relationship.to_string(),
        });
    }

    let direction = match &captures["dir"] {
        "0" => RelatedDirection::Forward,
        _ => RelatedDirection::Backward,
    };

    let related_name = captures["related"].trim();
    let related = if is_any_class_name(related_name) {
        RelatedClass::AnyClass
    } else {
        RelatedClass::Class(resolve(related_name, catalog, default_schema)?)
    };

    Ok(RelatedClassSpecifier {
        relationship,
        related,
        direction,
    })
}
