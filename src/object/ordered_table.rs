//! Insertion-ordered hash table behind `Map` and `Set`
//!
//! Keys compare with SameValueZero. Like [`PropertyMap`](super::PropertyMap), entries
//! live in a dense vector and deletion leaves a hole, but a table can be mutated while
//! iterators walk it: each iterator owns a cursor registered with the table, and when
//! holes are squeezed out every live cursor is moved to the same logical position.
//! Iterators therefore see entries added behind them and skip entries deleted ahead
//! of them, even across `clear()`.

use std::cell::Cell;
use std::hash::RandomState;
use std::rc::{Rc, Weak};

use hashbrown::HashMap;

use crate::value::{CheapClone, JsString, JsSymbol, JsValue};

/// Holes tolerated before a compaction is considered
const COMPACT_MIN_HOLES: usize = 16;

/// Identity of a key under SameValueZero
#[derive(Clone, PartialEq, Eq, Hash)]
enum TableKey {
    Undefined,
    Null,
    Boolean(bool),
    /// Number bits with NaN made canonical and -0 folded into +0
    Number(u64),
    String(JsString),
    Symbol(JsSymbol),
    /// Address of the object; the stored key keeps it alive
    Object(usize),
}

impl TableKey {
    fn of(value: &JsValue) -> Self {
        match value {
            JsValue::Undefined => TableKey::Undefined,
            JsValue::Null => TableKey::Null,
            JsValue::Boolean(b) => TableKey::Boolean(*b),
            JsValue::Number(n) if n.is_nan() => TableKey::Number(f64::NAN.to_bits()),
            JsValue::Number(n) if *n == 0.0 => TableKey::Number(0),
            JsValue::Number(n) => TableKey::Number(n.to_bits()),
            JsValue::String(s) => TableKey::String(s.cheap_clone()),
            JsValue::Symbol(s) => TableKey::Symbol(s.cheap_clone()),
            JsValue::Object(obj) => TableKey::Object(Rc::as_ptr(obj) as usize),
        }
    }
}

/// Shared position of an iterator; the table rewrites it on compaction
pub type TableCursor = Rc<Cell<usize>>;

pub struct OrderedTable {
    index: HashMap<TableKey, usize, RandomState>,
    entries: Vec<Option<(JsValue, JsValue)>>,
    cursors: Vec<Weak<Cell<usize>>>,
}

impl Default for OrderedTable {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderedTable {
    pub fn new() -> Self {
        Self {
            index: HashMap::with_hasher(RandomState::new()),
            entries: Vec::new(),
            cursors: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, key: &JsValue) -> bool {
        self.index.contains_key(&TableKey::of(key))
    }

    pub fn get(&self, key: &JsValue) -> Option<&JsValue> {
        let slot = *self.index.get(&TableKey::of(key))?;
        self.entries
            .get(slot)
            .and_then(|entry| entry.as_ref())
            .map(|(_, value)| value)
    }

    /// Insert or replace; a replaced entry keeps its position. A `-0` key is stored
    /// as `+0`.
    pub fn insert(&mut self, key: JsValue, value: JsValue) {
        let key = match key {
            JsValue::Number(n) if n == 0.0 => JsValue::Number(0.0),
            other => other,
        };
        let table_key = TableKey::of(&key);
        if let Some(&slot) = self.index.get(&table_key) {
            if let Some(Some((_, existing))) = self.entries.get_mut(slot) {
                *existing = value;
                return;
            }
        }
        self.index.insert(table_key, self.entries.len());
        self.entries.push(Some((key, value)));
    }

    pub fn remove(&mut self, key: &JsValue) -> bool {
        let Some(slot) = self.index.remove(&TableKey::of(key)) else {
            return false;
        };
        if let Some(entry) = self.entries.get_mut(slot) {
            *entry = None;
        }
        self.maybe_compact();
        true
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.entries.iter_mut().for_each(|entry| *entry = None);
        self.maybe_compact();
    }

    /// A cursor positioned before the first entry
    pub fn cursor(&mut self) -> TableCursor {
        self.cursors.retain(|cursor| cursor.strong_count() > 0);
        let cursor = Rc::new(Cell::new(0));
        self.cursors.push(Rc::downgrade(&cursor));
        cursor
    }

    /// The next live entry at or after `cursor`, moving the cursor past it
    pub fn next_entry(&self, cursor: &Cell<usize>) -> Option<(JsValue, JsValue)> {
        let mut position = cursor.get();
        while let Some(slot) = self.entries.get(position) {
            position += 1;
            if let Some((key, value)) = slot {
                cursor.set(position);
                return Some((key.cheap_clone(), value.cheap_clone()));
            }
        }
        cursor.set(position);
        None
    }

    /// Live entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&JsValue, &JsValue)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.as_ref().map(|(key, value)| (key, value)))
    }

    fn maybe_compact(&mut self) {
        let live = self.index.len();
        let holes = self.entries.len() - live;
        if live > 0 && (holes < COMPACT_MIN_HOLES || holes <= live) {
            return;
        }
        // remap[p] is the number of live entries before old position p
        let mut remap = Vec::with_capacity(self.entries.len() + 1);
        let mut seen = 0;
        for entry in &self.entries {
            remap.push(seen);
            if entry.is_some() {
                seen += 1;
            }
        }
        remap.push(seen);
        self.cursors.retain(|weak| match weak.upgrade() {
            Some(cursor) => {
                cursor.set(remap.get(cursor.get()).copied().unwrap_or(seen));
                true
            }
            None => false,
        });
        self.entries.retain(Option::is_some);
        for (slot, entry) in self.entries.iter().enumerate() {
            if let Some((key, _)) = entry {
                self.index.insert(TableKey::of(key), slot);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(value: f64) -> JsValue {
        JsValue::Number(value)
    }

    fn keys(table: &OrderedTable) -> Vec<JsValue> {
        table.iter().map(|(key, _)| key.clone()).collect()
    }

    #[test]
    fn same_value_zero_keys() {
        let mut table = OrderedTable::new();
        table.insert(n(f64::NAN), JsValue::from("nan"));
        table.insert(n(-0.0), JsValue::from("zero"));
        assert_eq!(table.get(&n(f64::NAN)), Some(&JsValue::from("nan")));
        assert_eq!(table.get(&n(0.0)), Some(&JsValue::from("zero")));
        assert!(table.contains(&n(-0.0)));
        assert!(!table.contains(&JsValue::from("0")));
        // -0 is stored as +0
        assert!(matches!(keys(&table).get(1), Some(JsValue::Number(z)) if z.is_sign_positive()));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn replacing_keeps_position() {
        let mut table = OrderedTable::new();
        table.insert(n(1.0), n(10.0));
        table.insert(n(2.0), n(20.0));
        table.insert(n(1.0), n(11.0));
        assert_eq!(keys(&table), vec![n(1.0), n(2.0)]);
        assert_eq!(table.get(&n(1.0)), Some(&n(11.0)));
    }

    #[test]
    fn cursor_survives_deletes_and_compaction() {
        let mut table = OrderedTable::new();
        for i in 0..100 {
            table.insert(n(f64::from(i)), JsValue::Undefined);
        }
        let cursor = table.cursor();
        for expected in 0..10 {
            assert_eq!(table.next_entry(&cursor).map(|(k, _)| k), Some(n(f64::from(expected))));
        }
        // Delete everything behind the cursor and most of what lies ahead
        for i in 0..95 {
            table.remove(&n(f64::from(i)));
        }
        assert!(table.entries.len() < 100, "compaction happened");
        let rest: Vec<JsValue> = std::iter::from_fn(|| table.next_entry(&cursor).map(|(k, _)| k)).collect();
        assert_eq!(rest, (95..100).map(|i| n(f64::from(i))).collect::<Vec<_>>());
    }

    #[test]
    fn cursor_sees_entries_added_after_clear() {
        let mut table = OrderedTable::new();
        table.insert(n(1.0), JsValue::Undefined);
        table.insert(n(2.0), JsValue::Undefined);
        let cursor = table.cursor();
        assert!(table.next_entry(&cursor).is_some());
        table.clear();
        assert!(table.is_empty());
        table.insert(n(3.0), JsValue::Undefined);
        assert_eq!(table.next_entry(&cursor).map(|(k, _)| k), Some(n(3.0)));
        assert_eq!(table.next_entry(&cursor), None);
    }
}
