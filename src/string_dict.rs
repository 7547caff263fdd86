//! String dictionary for deduplicating JsString instances.
//!
//! Identifiers and literal strings seen by the lexer go through one dictionary per
//! runtime, so every occurrence of `length` in every script shares one `Rc<str>`.

use crate::prelude::FxHashMap;
use crate::value::{CheapClone, JsString};

/// Interns strings so identical text shares one allocation
pub struct StringDict {
    strings: FxHashMap<Box<str>, JsString>,
}

impl StringDict {
    pub fn new() -> Self {
        Self {
            strings: FxHashMap::default(),
        }
    }

    /// Create a dictionary pre-populated with the names the standard library uses.
    pub fn with_common_strings() -> Self {
        let mut dict = Self::new();
        for s in COMMON_STRINGS {
            dict.get_or_insert(s);
        }
        dict
    }

    /// Get an existing string or insert a new one.
    pub fn get_or_insert(&mut self, s: &str) -> JsString {
        if let Some(existing) = self.strings.get(s) {
            return existing.cheap_clone();
        }
        let js_str = JsString::from(s);
        self.strings.insert(s.into(), js_str.cheap_clone());
        js_str
    }

    pub fn get(&self, s: &str) -> Option<JsString> {
        self.strings.get(s).map(|s| s.cheap_clone())
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for StringDict {
    fn default() -> Self {
        Self::new()
    }
}

const COMMON_STRINGS: &[&str] = &[
    "length",
    "prototype",
    "constructor",
    "name",
    "message",
    "value",
    "writable",
    "enumerable",
    "configurable",
    "get",
    "set",
    "toString",
    "valueOf",
    "next",
    "done",
    "return",
    "throw",
    "raw",
    "arguments",
    "undefined",
    "call",
    "apply",
    "bind",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_dict_deduplication() {
        let mut dict = StringDict::new();
        let s1 = dict.get_or_insert("hello");
        let s2 = dict.get_or_insert("hello");
        assert_eq!(s1, s2);
        assert!(std::ptr::eq(s1.as_str(), s2.as_str()));
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn test_common_strings_preloaded() {
        let dict = StringDict::with_common_strings();
        assert!(dict.get("prototype").is_some());
        assert!(dict.get("raw").is_some());
        assert!(dict.get("not-there").is_none());
    }
}
