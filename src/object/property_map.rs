//! Insertion-ordered property storage
//!
//! Keys are indexed through a SipHash table with a per-map random seed, so key sets
//! crafted to collide under a fixed string hash cannot degrade lookups. Entries live in
//! a dense vector in insertion order; deletion leaves a tombstone that is squeezed out
//! once tombstones outnumber live entries, keeping every operation amortized O(1).

use std::hash::RandomState;

use hashbrown::HashMap;

use crate::value::{CheapClone, Property, PropertyKey};

/// Tombstones tolerated before a compaction is considered
const COMPACT_MIN_TOMBSTONES: usize = 8;

#[derive(Clone)]
pub struct PropertyMap {
    index: HashMap<PropertyKey, usize, RandomState>,
    entries: Vec<Option<(PropertyKey, Property)>>,
    tombstones: usize,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self {
            index: HashMap::with_hasher(RandomState::new()),
            entries: Vec::new(),
            tombstones: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity_and_hasher(capacity, RandomState::new()),
            entries: Vec::with_capacity(capacity),
            tombstones: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains_key(&self, key: &PropertyKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &PropertyKey) -> Option<&Property> {
        let slot = *self.index.get(key)?;
        self.entries
            .get(slot)
            .and_then(|entry| entry.as_ref())
            .map(|(_, prop)| prop)
    }

    pub fn get_mut(&mut self, key: &PropertyKey) -> Option<&mut Property> {
        let slot = *self.index.get(key)?;
        self.entries
            .get_mut(slot)
            .and_then(|entry| entry.as_mut())
            .map(|(_, prop)| prop)
    }

    /// Insert or replace. A replaced property keeps its original position.
    pub fn insert(&mut self, key: PropertyKey, property: Property) -> Option<Property> {
        if let Some(&slot) = self.index.get(&key) {
            if let Some(Some((_, existing))) = self.entries.get_mut(slot) {
                return Some(std::mem::replace(existing, property));
            }
        }
        let slot = self.entries.len();
        self.index.insert(key.cheap_clone(), slot);
        self.entries.push(Some((key, property)));
        None
    }

    pub fn remove(&mut self, key: &PropertyKey) -> Option<Property> {
        let slot = self.index.remove(key)?;
        let removed = self.entries.get_mut(slot).and_then(Option::take);
        if removed.is_some() {
            self.tombstones += 1;
            self.maybe_compact();
        }
        removed.map(|(_, prop)| prop)
    }

    fn maybe_compact(&mut self) {
        if self.tombstones < COMPACT_MIN_TOMBSTONES || self.tombstones <= self.index.len() {
            return;
        }
        self.entries.retain(Option::is_some);
        self.tombstones = 0;
        for (slot, entry) in self.entries.iter().enumerate() {
            if let Some((key, _)) = entry {
                if let Some(position) = self.index.get_mut(key) {
                    *position = slot;
                }
            }
        }
    }

    /// Live entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&PropertyKey, &Property)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.as_ref().map(|(key, prop)| (key, prop)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&PropertyKey, &mut Property)> {
        self.entries
            .iter_mut()
            .filter_map(|entry| entry.as_mut().map(|(key, prop)| (&*key, prop)))
    }

    /// Own keys in enumeration order: integer keys ascending, then string keys in
    /// insertion order, then symbols in insertion order.
    pub fn ordered_keys(&self) -> Vec<PropertyKey> {
        let mut indices: Vec<u32> = Vec::new();
        let mut strings = Vec::new();
        let mut symbols = Vec::new();
        for (key, _) in self.iter() {
            match key {
                PropertyKey::Index(i) => indices.push(*i),
                PropertyKey::String(_) => strings.push(key.cheap_clone()),
                PropertyKey::Symbol(_) => symbols.push(key.cheap_clone()),
            }
        }
        indices.sort_unstable();
        let mut keys = Vec::with_capacity(self.len());
        keys.extend(indices.into_iter().map(PropertyKey::Index));
        keys.extend(strings);
        keys.extend(symbols);
        keys
    }

    /// Integer keys in storage order
    pub fn index_keys(&self) -> Vec<u32> {
        self.iter().filter_map(|(key, _)| key.as_index()).collect()
    }
}

impl Default for PropertyMap {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PropertyMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(k, v)| (k, &v.kind)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{JsString, JsSymbol, JsValue};

    fn key(s: &str) -> PropertyKey {
        PropertyKey::from(s)
    }

    #[test]
    fn preserves_insertion_order_and_sorts_indices_first() {
        let mut map = PropertyMap::new();
        map.insert(key("b"), Property::data(JsValue::from(1)));
        map.insert(key("10"), Property::data(JsValue::from(2)));
        map.insert(key("a"), Property::data(JsValue::from(3)));
        map.insert(key("2"), Property::data(JsValue::from(4)));
        let sym = PropertyKey::Symbol(JsSymbol::new(None));
        map.insert(sym.cheap_clone(), Property::data(JsValue::from(5)));

        let keys: Vec<String> = map.ordered_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["2", "10", "b", "a", "Symbol()"]);
    }

    #[test]
    fn replacing_keeps_position() {
        let mut map = PropertyMap::new();
        map.insert(key("x"), Property::data(JsValue::from(1)));
        map.insert(key("y"), Property::data(JsValue::from(2)));
        map.insert(key("x"), Property::data(JsValue::from(3)));
        let keys: Vec<String> = map.ordered_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["x", "y"]);
        assert_eq!(map.get(&key("x")).map(Property::value), Some(JsValue::from(3)));
    }

    #[test]
    fn delete_then_reinsert_moves_to_end() {
        let mut map = PropertyMap::new();
        for name in ["a", "b", "c"] {
            map.insert(key(name), Property::data(JsValue::Undefined));
        }
        map.remove(&key("a"));
        map.insert(key("a"), Property::data(JsValue::Undefined));
        let keys: Vec<String> = map.ordered_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["b", "c", "a"]);
    }

    #[test]
    fn compaction_keeps_lookups_valid() {
        let mut map = PropertyMap::new();
        for i in 0..100 {
            map.insert(
                PropertyKey::String(JsString::from(format!("k{i}"))),
                Property::data(JsValue::from(i)),
            );
        }
        for i in 0..90 {
            map.remove(&PropertyKey::String(JsString::from(format!("k{i}"))));
        }
        assert_eq!(map.len(), 10);
        for i in 90..100 {
            let k = PropertyKey::String(JsString::from(format!("k{i}")));
            assert_eq!(map.get(&k).map(Property::value), Some(JsValue::from(i)));
        }
        assert!(map.entries.len() < 100);
    }

    #[test]
    fn colliding_java_style_keys_stay_distinct() {
        // "Aa" and "BB" share a 31-multiplier string hash; blocks of them collide en masse
        let blocks = ["Aa", "BB"];
        let mut map = PropertyMap::new();
        let mut count = 0;
        for a in blocks {
            for b in blocks {
                for c in blocks {
                    for d in blocks {
                        let name = format!("{a}{b}{c}{d}");
                        map.insert(key(&name), Property::data(JsValue::from(count)));
                        count += 1;
                    }
                }
            }
        }
        assert_eq!(map.len(), 16);
        assert_eq!(map.get(&key("AaAaAaAa")).map(Property::value), Some(JsValue::from(0)));
        assert_eq!(map.get(&key("BBBBBBBB")).map(Property::value), Some(JsValue::from(15)));
    }

    /// The `n`-th of 2^14 keys built from "Aa"/"BB" blocks, all sharing one 31-multiplier hash
    fn colliding_key(n: u32) -> PropertyKey {
        let name: String = (0..14)
            .map(|bit| if n & (1 << bit) == 0 { "Aa" } else { "BB" })
            .collect();
        key(&name)
    }

    #[test]
    fn sixteen_thousand_colliding_keys() {
        const COUNT: u32 = 1 << 14;
        let mut map = PropertyMap::new();
        for n in 0..COUNT {
            map.insert(colliding_key(n), Property::data(JsValue::from(n)));
        }
        assert_eq!(map.len(), COUNT as usize);
        for n in (0..COUNT).step_by(97) {
            assert_eq!(map.get(&colliding_key(n)).map(Property::value), Some(JsValue::from(n)));
        }

        // Keep every fourth key; enough deletes to force compaction
        for n in (0..COUNT).filter(|n| n % 4 != 3) {
            assert!(map.remove(&colliding_key(n)).is_some());
        }
        assert_eq!(map.len(), (COUNT / 4) as usize);
        assert!(map.entries.len() < COUNT as usize);
        assert!(map.get(&colliding_key(0)).is_none());
        for n in (3..COUNT).step_by(4) {
            assert_eq!(map.get(&colliding_key(n)).map(Property::value), Some(JsValue::from(n)));
        }

        let survivors: Vec<PropertyKey> = (3..COUNT).step_by(4).map(colliding_key).collect();
        assert_eq!(map.ordered_keys(), survivors);
    }

    #[test]
    fn interleaved_deletes_keep_order() {
        let mut map = PropertyMap::new();
        for n in 0..64 {
            map.insert(colliding_key(n), Property::data(JsValue::from(n)));
        }
        for n in (0..64).step_by(2) {
            map.remove(&colliding_key(n));
        }
        for n in (0..64).step_by(4) {
            map.insert(colliding_key(n), Property::data(JsValue::from(n)));
        }
        let expected: Vec<PropertyKey> = (1..64)
            .step_by(2)
            .chain((0..64).step_by(4))
            .map(colliding_key)
            .collect();
        assert_eq!(map.ordered_keys(), expected);
        assert_eq!(map.len(), 48);
    }
}
