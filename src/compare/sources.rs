// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Source and target record maps.

use std::collections::{BTreeMap, BTreeSet};

/// Records of two environments along with the union of their keys.
///
/// # Invariant
///
/// - After [`DualSource::union_keys`], the key union is exactly the set union
///   of source keys and target keys.
/// - Key union iterates in key order, so slicing it is stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DualSource<K, V>
where
    K: Ord,
{
    source: BTreeMap<K, V>,
    target: BTreeMap<K, V>,
    keys: BTreeSet<K>,
}

impl<K, V> Default for DualSource<K, V>
where
    K: Ord,
{
    fn default() -> Self {
        Self {
            source: BTreeMap::new(),
            target: BTreeMap::new(),
            keys: BTreeSet::new(),
        }
    }
}

impl<K, V> DualSource<K, V>
where
    K: Ord + Clone,
{
    #[cfg(test)]
    pub(crate) fn new(
        source: impl IntoIterator<Item = (K, V)>,
        target: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        let mut dual = Self::default();
        dual.set_source(source);
        dual.set_target(target);
        dual.union_keys();
        dual
    }

    pub(crate) fn set_source(&mut self, records: impl IntoIterator<Item = (K, V)>) {
        self.source = records.into_iter().collect();
    }

    pub(crate) fn set_target(&mut self, records: impl IntoIterator<Item = (K, V)>) {
        self.target = records.into_iter().collect();
    }

    pub(crate) fn union_keys(&mut self) {
        self.keys = self
            .source
            .keys()
            .chain(self.target.keys())
            .cloned()
            .collect();
    }
}

impl<K, V> DualSource<K, V>
where
    K: Ord,
{
    /// Records fetched from the source environment.
    pub fn source(&self) -> &BTreeMap<K, V> {
        &self.source
    }

    /// Records fetched from the target environment.
    pub fn target(&self) -> &BTreeMap<K, V> {
        &self.target
    }

    /// Union of source and target keys.
    pub fn keys(&self) -> &BTreeSet<K> {
        &self.keys
    }

    /// Look up source and target values of a key, either of which may be absent.
    pub fn get(&self, key: &K) -> (Option<&V>, Option<&V>) {
        (self.source.get(key), self.target.get(key))
    }

    /// Slice of key union by offset and length.
    pub fn slice(&self, skip: usize, take: usize) -> impl Iterator<Item = &K> {
        self.keys.iter().skip(skip).take(take)
    }
}
