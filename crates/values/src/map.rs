//! Sass maps
//!
//! A map from Value to Value that preserves insertion order for rendering
//! but compares as an unordered set of pairs.

use crate::Value;
use indexmap::IndexMap;
use std::hash::{Hash, Hasher};

/// An ordered Sass map with Value keys.
#[derive(Debug, Clone, Default)]
pub struct SassMap {
    entries: IndexMap<Value, Value>,
}

impl SassMap {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Insert a pair. Re-inserting an existing key replaces the value but
    /// keeps the key's original position.
    pub fn insert(&mut self, key: Value, value: Value) {
        self.entries.insert(key, value);
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pairs in insertion order.
    pub fn iter(&self) -> indexmap::map::Iter<'_, Value, Value> {
        self.entries.iter()
    }
}

impl FromIterator<(Value, Value)> for SassMap {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a SassMap {
    type Item = (&'a Value, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, Value, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// IndexMap equality already ignores order
impl PartialEq for SassMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for SassMap {}

impl Hash for SassMap {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Order-independent: combine per-pair hashes commutatively
        let mut combined: u64 = 0;
        for (key, value) in &self.entries {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            key.hash(&mut hasher);
            value.hash(&mut hasher);
            combined = combined.wrapping_add(hasher.finish());
        }
        self.entries.len().hash(state);
        combined.hash(state);
    }
}
