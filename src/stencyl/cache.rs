//! Per-call back-reference cache.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// Ordered, append-only table of first-seen values.
///
/// Indices are assigned in first-occurrence order starting at 0 and never
/// reused. One cache lives for exactly one encode or decode call; sharing a
/// cache across calls would desynchronize back-reference indices between
/// encoder and decoder.
///
/// The format only caches strings today, but the table is generic so a
/// composite-caching variant of the format would not touch codec control
/// flow.
#[derive(Debug)]
pub struct RefCache<T> {
    entries: Vec<T>,
    indices: HashMap<T, usize>,
}

impl<T> Default for RefCache<T> {
    fn default() -> Self {
        RefCache {
            entries: Vec::new(),
            indices: HashMap::new(),
        }
    }
}

impl<T: Clone + Eq + Hash> RefCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries recorded so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encoder-side lookup. Returns `(index, is_new)`: on a hit the caller
    /// emits a back-reference to `index`; on a miss the value has been
    /// recorded at `index` and the caller emits the literal payload.
    ///
    /// Equality is by value content. Ordering is identical to a linear
    /// first-occurrence scan; the index map is only a lookup accelerator.
    pub fn lookup_or_insert<Q>(&mut self, value: &Q) -> (usize, bool)
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = T> + ?Sized,
    {
        if let Some(&index) = self.indices.get(value) {
            return (index, false);
        }
        let index = self.entries.len();
        let owned = value.to_owned();
        self.entries.push(owned.clone());
        self.indices.insert(owned, index);
        (index, true)
    }

    /// Decoder-side append, called exactly once per literal token parsed.
    /// Always assigns the next index, mirroring the encoder's miss path.
    pub fn insert(&mut self, value: T) -> usize {
        let index = self.entries.len();
        self.indices.entry(value.clone()).or_insert(index);
        self.entries.push(value);
        index
    }

    /// Decoder-side resolution of a back-reference index.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_follow_first_occurrence_order() {
        let mut cache = RefCache::new();
        assert_eq!(cache.lookup_or_insert("a"), (0, true));
        assert_eq!(cache.lookup_or_insert("b"), (1, true));
        assert_eq!(cache.lookup_or_insert("a"), (0, false));
        assert_eq!(cache.lookup_or_insert("c"), (2, true));
        assert_eq!(cache.len(), 3);
        let _: &String = cache.get(1).unwrap();
    }

    #[test]
    fn insert_always_appends() {
        let mut cache = RefCache::new();
        assert_eq!(cache.insert("x".to_owned()), 0);
        assert_eq!(cache.insert("y".to_owned()), 1);
        assert_eq!(cache.get(0).map(String::as_str), Some("x"));
        assert_eq!(cache.get(2), None);
    }

    #[test]
    fn generic_over_non_string_values() {
        let mut cache: RefCache<i64> = RefCache::new();
        assert_eq!(cache.lookup_or_insert(&42), (0, true));
        assert_eq!(cache.lookup_or_insert(&42), (0, false));
    }
}
