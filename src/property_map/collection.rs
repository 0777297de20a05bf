use indexmap::IndexMap;

use super::maps::PropertyMap;

/// Returned by a traversal visitor to steer the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalFeedback {
    /// Continue, descending into struct members.
    Next,
    /// Continue with the next sibling; skip this node's members.
    NextSibling,
    Cancel,
}

/// Property maps keyed by their last access-string token, in insertion
/// order. Keys are matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMapCollection {
    maps: IndexMap<String, PropertyMap>,
}

impl PropertyMapCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under the map's property name; an existing entry with the same
    /// name is replaced in place.
    pub fn insert(&mut self, map: PropertyMap) {
        let key = map.property().name.to_ascii_lowercase();
        self.maps.insert(key, map);
    }

    pub fn get(&self, token: &str) -> Option<&PropertyMap> {
        self.maps.get(&token.to_ascii_lowercase())
    }

    pub fn get_mut(&mut self, token: &str) -> Option<&mut PropertyMap> {
        self.maps.get_mut(&token.to_ascii_lowercase())
    }

    /// Look up a dotted access string relative to this collection, e.g.
    /// `Address.Geo`.
    pub fn find(&self, access_string: &str) -> Option<&PropertyMap> {
        let (head, rest) = match access_string.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (access_string, None),
        };
        let map = self.get(head)?;
        match rest {
            None => Some(map),
            Some(rest) => map.members()?.find(rest),
        }
    }

    pub fn find_mut(&mut self, access_string: &str) -> Option<&mut PropertyMap> {
        let (head, rest) = match access_string.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (access_string, None),
        };
        let map = self.get_mut(head)?;
        match rest {
            None => Some(map),
            Some(rest) => map.members_mut()?.find_mut(rest),
        }
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyMap> {
        self.maps.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PropertyMap> {
        self.maps.values_mut()
    }

    /// Depth-first walk. Returns false if the visitor cancelled.
    pub fn traverse<F>(&self, visitor: &mut F) -> bool
    where
        F: FnMut(&PropertyMap) -> TraversalFeedback,
    {
        for map in self.maps.values() {
            match visitor(map) {
                TraversalFeedback::Cancel => return false,
                TraversalFeedback::NextSibling => continue,
                TraversalFeedback::Next => {
                    if let Some(members) = map.members() {
                        if !members.traverse(visitor) {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    /// Every non-struct map, depth first.
    pub fn leaves(&self) -> Vec<&PropertyMap> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a PropertyMap>) {
        for map in self.maps.values() {
            match map.members() {
                Some(members) => members.collect_leaves(out),
                None => out.push(map),
            }
        }
    }

    /// Every non-struct map, mutably, depth first.
    pub fn leaves_mut(&mut self) -> Vec<&mut PropertyMap> {
        let mut out = Vec::new();
        for map in self.maps.values_mut() {
            if map.members().is_some() {
                if let Some(members) = map.members_mut() {
                    out.extend(members.leaves_mut());
                }
            } else {
                out.push(map);
            }
        }
        out
    }
}
