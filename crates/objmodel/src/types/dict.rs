//! Ordered value store backing class namespaces and instance `__dict__`s.

use ahash::RandomState;
use indexmap::IndexMap;

use crate::{heap::HeapId, value::Value};

/// Insertion-ordered mapping from attribute names to values.
///
/// Deletion keeps the relative order of the remaining entries, matching
/// Python dict semantics.
#[derive(Debug, Clone, Default)]
pub(crate) struct Dict {
    map: IndexMap<String, Value, RandomState>,
}

impl Dict {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.map.get(name)
    }

    /// Inserts or replaces `name`, returning the previous value.
    ///
    /// Replacing keeps the original insertion position.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.map.insert(name.into(), value)
    }

    /// Removes `name`, returning the removed value.
    pub fn delete(&mut self, name: &str) -> Option<Value> {
        self.map.shift_remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Pushes every heap reference held by this store onto `work_list`.
    pub fn collect_ref_ids(&self, work_list: &mut Vec<HeapId>) {
        work_list.extend(self.map.values().filter_map(Value::ref_id));
    }
}

impl FromIterator<(String, Value)> for Dict {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}
