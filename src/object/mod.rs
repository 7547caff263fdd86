//! Object model
//!
//! Objects are `Rc<RefCell<JsObject>>`: shared, reference-counted, and linked to their
//! prototype through a plain reference used only for lookup. Property storage lives in
//! [`PropertyMap`]; exotic behaviour (array `length`, string indices, callables) is
//! selected by [`ObjectKind`].

mod ordered_table;
mod property_map;

pub use ordered_table::{OrderedTable, TableCursor};
pub use property_map::PropertyMap;

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::JsError;
use crate::interop::HostFunction;
use crate::interpreter::Interpreter;
use crate::interpreter::generator::GeneratorObject;
use crate::interpreter::scope::ScopeRef;
use crate::interpreter::Realm;
use crate::ir::FunctionTemplate;
use crate::value::{
    CheapClone, JsString, JsSymbol, JsValue, Property, PropertyDescriptor, PropertyKey,
    PropertyKind,
};

pub type JsObjectRef = Rc<RefCell<JsObject>>;

/// Upper bound on prototype chain walks; chains are acyclic by construction so this
/// only trips on pathological depth
pub const MAX_PROTOTYPE_DEPTH: usize = 10_000;

/// Native function: `(interpreter, this, arguments)`
pub type NativeFn = fn(&mut Interpreter, JsValue, &[JsValue]) -> Result<JsValue, JsError>;

/// Native constructor: `(interpreter, arguments, new_target)`
pub type NativeConstructFn =
    fn(&mut Interpreter, &[JsValue], &JsObjectRef) -> Result<JsValue, JsError>;

pub struct JsObject {
    pub prototype: Option<JsObjectRef>,
    pub extensible: bool,
    pub properties: PropertyMap,
    pub kind: ObjectKind,
}

/// Internal class of an object
pub enum ObjectKind {
    Ordinary,
    Array {
        length: u32,
        length_writable: bool,
    },
    Function(Callable),
    Arguments,
    Error,
    Boolean(bool),
    Number(f64),
    String(JsString),
    Symbol(JsSymbol),
    Generator(Box<GeneratorObject>),
    ArrayIterator {
        target: JsValue,
        index: u32,
        kind: IterationKind,
        done: bool,
    },
    StringIterator {
        chars: Vec<char>,
        position: usize,
    },
    /// Iterator plus cached `next` method, used by destructuring, spread and for-of
    IteratorRecord {
        iterator: JsValue,
        next: JsValue,
        done: bool,
    },
    /// Snapshot of enumerable keys for `for-in`
    ForInIterator {
        object: JsValue,
        keys: Vec<PropertyKey>,
        position: usize,
    },
    RegExp(Box<RegExpData>),
    Map(Box<OrderedTable>),
    Set(Box<OrderedTable>),
    MapIterator(Box<CollectionIterator>),
    SetIterator(Box<CollectionIterator>),
    /// Time value in milliseconds since the epoch; NaN is an invalid date
    Date(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationKind {
    Keys,
    Values,
    Entries,
}

/// Position of a `Map` or `Set` iterator in its collection
pub struct CollectionIterator {
    pub collection: JsObjectRef,
    pub cursor: TableCursor,
    pub kind: IterationKind,
    pub done: bool,
}

pub struct RegExpData {
    pub source: JsString,
    pub flags: JsString,
    #[cfg(feature = "regex")]
    pub regex: Rc<fancy_regex::Regex>,
}

/// The callable part of a function object
pub enum Callable {
    Script(ScriptFunction),
    Native(NativeFunction),
    Bound(BoundFunction),
    Host(Rc<HostFunction>),
}

/// A closure over lowered IR
pub struct ScriptFunction {
    pub template: Rc<FunctionTemplate>,
    pub scope: ScopeRef,
    pub realm: Realm,
    /// Object whose prototype `super` resolves against
    pub home_object: Option<JsObjectRef>,
}

pub struct NativeFunction {
    pub name: JsString,
    pub call: NativeFn,
    pub construct: Option<NativeConstructFn>,
    pub arity: u32,
}

pub struct BoundFunction {
    pub target: JsObjectRef,
    pub this_arg: JsValue,
    pub args: Vec<JsValue>,
}

impl Callable {
    pub fn debug_name(&self) -> String {
        match self {
            Callable::Script(f) => f.template.name.to_string(),
            Callable::Native(f) => f.name.to_string(),
            Callable::Bound(_) => "bound".to_string(),
            Callable::Host(f) => f.name().to_string(),
        }
    }
}

impl ObjectKind {
    /// `[[Class]]`-style tag used by `Object.prototype.toString`
    pub fn class_name(&self) -> &'static str {
        match self {
            ObjectKind::Ordinary => "Object",
            ObjectKind::Array { .. } => "Array",
            ObjectKind::Function(_) => "Function",
            ObjectKind::Arguments => "Arguments",
            ObjectKind::Error => "Error",
            ObjectKind::Boolean(_) => "Boolean",
            ObjectKind::Number(_) => "Number",
            ObjectKind::String(_) => "String",
            ObjectKind::Symbol(_) => "Symbol",
            ObjectKind::Generator(_) => "Generator",
            ObjectKind::ArrayIterator { .. } => "Array Iterator",
            ObjectKind::StringIterator { .. } => "String Iterator",
            ObjectKind::IteratorRecord { .. } | ObjectKind::ForInIterator { .. } => "Object",
            ObjectKind::RegExp(_) => "RegExp",
            ObjectKind::Map(_) => "Map",
            ObjectKind::Set(_) => "Set",
            ObjectKind::MapIterator(_) => "Map Iterator",
            ObjectKind::SetIterator(_) => "Set Iterator",
            ObjectKind::Date(_) => "Date",
        }
    }
}

impl std::fmt::Debug for JsObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsObject")
            .field("class", &self.kind.class_name())
            .field("properties", &self.properties.len())
            .field("extensible", &self.extensible)
            .finish()
    }
}

impl JsObject {
    pub fn new(prototype: Option<JsObjectRef>, kind: ObjectKind) -> Self {
        Self {
            prototype,
            extensible: true,
            properties: PropertyMap::new(),
            kind,
        }
    }

    pub fn into_ref(self) -> JsObjectRef {
        Rc::new(RefCell::new(self))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Function(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, ObjectKind::Array { .. })
    }

    pub fn callable(&self) -> Option<&Callable> {
        match &self.kind {
            ObjectKind::Function(callable) => Some(callable),
            _ => None,
        }
    }

    /// Own property, including the virtual ones exotic objects expose
    pub fn get_own_property(&self, key: &PropertyKey) -> Option<Property> {
        if let Some(prop) = self.properties.get(key) {
            return Some(prop.clone());
        }
        match (&self.kind, key) {
            (
                ObjectKind::Array {
                    length,
                    length_writable,
                },
                PropertyKey::String(name),
            ) if name.as_str() == "length" => Some(Property::with_attributes(
                JsValue::from(*length),
                *length_writable,
                false,
                false,
            )),
            (ObjectKind::String(s), PropertyKey::String(name)) if name.as_str() == "length" => {
                Some(Property::with_attributes(
                    JsValue::Number(s.utf16_len() as f64),
                    false,
                    false,
                    false,
                ))
            }
            (ObjectKind::String(s), PropertyKey::Index(i)) => {
                let units = s.to_utf16();
                let unit = *units.get(*i as usize)?;
                Some(Property::with_attributes(
                    JsValue::String(JsString::from_utf16(&[unit])),
                    false,
                    true,
                    false,
                ))
            }
            _ => None,
        }
    }

    pub fn has_own_property(&self, key: &PropertyKey) -> bool {
        self.get_own_property(key).is_some()
    }

    /// Own keys in enumeration order, virtual keys included
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        match &self.kind {
            ObjectKind::String(s) => {
                let mut keys: Vec<PropertyKey> =
                    (0..s.utf16_len() as u32).map(PropertyKey::Index).collect();
                keys.push(PropertyKey::from("length"));
                keys.extend(self.properties.ordered_keys());
                keys
            }
            ObjectKind::Array { .. } => {
                let mut keys = self.properties.ordered_keys();
                let first_non_index = keys
                    .iter()
                    .position(|k| k.as_index().is_none())
                    .unwrap_or(keys.len());
                keys.insert(first_non_index, PropertyKey::from("length"));
                keys
            }
            _ => self.properties.ordered_keys(),
        }
    }

    /// Plain data write that bypasses attribute checks; used while building objects
    pub fn set_property(&mut self, key: PropertyKey, value: JsValue) {
        if let Some(index) = key.as_index() {
            self.note_index_written(index);
        }
        match self.properties.get_mut(&key) {
            Some(Property {
                kind: PropertyKind::Data { value: slot, .. },
                ..
            }) => *slot = value,
            _ => {
                self.properties.insert(key, Property::data(value));
            }
        }
    }

    /// Install a property with explicit attributes, bypassing checks
    pub fn define_raw(&mut self, key: PropertyKey, property: Property) {
        if let Some(index) = key.as_index() {
            self.note_index_written(index);
        }
        self.properties.insert(key, property);
    }

    fn note_index_written(&mut self, index: u32) {
        if let ObjectKind::Array { length, .. } = &mut self.kind {
            if index >= *length {
                *length = index + 1;
            }
        }
    }

    pub fn array_length(&self) -> Option<u32> {
        match &self.kind {
            ObjectKind::Array { length, .. } => Some(*length),
            _ => None,
        }
    }

    /// Shrink or grow an array. Returns false when a non-configurable element blocks
    /// the truncation or `length` is read-only.
    pub fn set_array_length(&mut self, new_length: u32) -> bool {
        let (current, writable) = match &self.kind {
            ObjectKind::Array {
                length,
                length_writable,
            } => (*length, *length_writable),
            _ => return false,
        };
        if new_length == current {
            return true;
        }
        if !writable {
            return false;
        }
        let mut final_length = new_length;
        if new_length < current {
            let mut doomed: Vec<u32> = self
                .properties
                .index_keys()
                .into_iter()
                .filter(|i| *i >= new_length)
                .collect();
            doomed.sort_unstable_by(|a, b| b.cmp(a));
            for index in doomed {
                let key = PropertyKey::Index(index);
                let configurable = self.properties.get(&key).is_none_or(|p| p.configurable);
                if !configurable {
                    final_length = index + 1;
                    break;
                }
                self.properties.remove(&key);
            }
        }
        if let ObjectKind::Array { length, .. } = &mut self.kind {
            *length = final_length;
        }
        final_length == new_length
    }

    /// Dense element values of an array (holes read as undefined)
    pub fn array_elements(&self) -> Option<Vec<JsValue>> {
        let length = self.array_length()?;
        Some(
            (0..length)
                .map(|i| {
                    self.properties
                        .get(&PropertyKey::Index(i))
                        .map(Property::value)
                        .unwrap_or_default()
                })
                .collect(),
        )
    }

    /// ValidateAndApplyPropertyDescriptor. Returns false when the change is not allowed.
    pub fn define_own_property(&mut self, key: PropertyKey, desc: PropertyDescriptor) -> bool {
        if self.is_array() && matches!(&key, PropertyKey::String(s) if s.as_str() == "length") {
            return self.define_array_length(desc);
        }
        if let (ObjectKind::Array { length, length_writable }, Some(index)) =
            (&self.kind, key.as_index())
        {
            if index >= *length && !*length_writable {
                return false;
            }
        }

        let Some(current) = self.get_own_property(&key) else {
            if !self.extensible {
                return false;
            }
            let property = if desc.is_accessor() {
                Property::accessor(
                    desc.get.flatten(),
                    desc.set.flatten(),
                    desc.enumerable.unwrap_or(false),
                    desc.configurable.unwrap_or(false),
                )
            } else {
                Property::with_attributes(
                    desc.value.unwrap_or_default(),
                    desc.writable.unwrap_or(false),
                    desc.enumerable.unwrap_or(false),
                    desc.configurable.unwrap_or(false),
                )
            };
            self.define_raw(key, property);
            return true;
        };

        if !current.configurable {
            if desc.configurable == Some(true) {
                return false;
            }
            if desc.enumerable.is_some_and(|e| e != current.enumerable) {
                return false;
            }
            match &current.kind {
                PropertyKind::Data { value, writable } => {
                    if desc.is_accessor() {
                        return false;
                    }
                    if !*writable {
                        if desc.writable == Some(true) {
                            return false;
                        }
                        if desc.value.as_ref().is_some_and(|v| !v.same_value(value)) {
                            return false;
                        }
                    }
                }
                PropertyKind::Accessor { getter, setter } => {
                    if desc.is_data() {
                        return false;
                    }
                    if let Some(new_get) = &desc.get {
                        if !same_function(new_get, getter) {
                            return false;
                        }
                    }
                    if let Some(new_set) = &desc.set {
                        if !same_function(new_set, setter) {
                            return false;
                        }
                    }
                }
            }
        }

        let enumerable = desc.enumerable.unwrap_or(current.enumerable);
        let configurable = desc.configurable.unwrap_or(current.configurable);
        let kind = match current.kind {
            PropertyKind::Data { value, writable } if !desc.is_accessor() => PropertyKind::Data {
                value: desc.value.unwrap_or(value),
                writable: desc.writable.unwrap_or(writable),
            },
            PropertyKind::Data { .. } => PropertyKind::Accessor {
                getter: desc.get.flatten(),
                setter: desc.set.flatten(),
            },
            PropertyKind::Accessor { getter, setter } if !desc.is_data() => {
                PropertyKind::Accessor {
                    getter: desc.get.unwrap_or(getter),
                    setter: desc.set.unwrap_or(setter),
                }
            }
            PropertyKind::Accessor { .. } => PropertyKind::Data {
                value: desc.value.unwrap_or_default(),
                writable: desc.writable.unwrap_or(false),
            },
        };
        // Virtual string properties are immutable and never stored
        if matches!(self.kind, ObjectKind::String(_)) && !self.properties.contains_key(&key) {
            return true;
        }
        self.define_raw(
            key,
            Property {
                kind,
                enumerable,
                configurable,
            },
        );
        true
    }

    fn define_array_length(&mut self, desc: PropertyDescriptor) -> bool {
        if desc.is_accessor()
            || desc.configurable == Some(true)
            || desc.enumerable == Some(true)
        {
            return false;
        }
        let writable_now = matches!(
            self.kind,
            ObjectKind::Array {
                length_writable: true,
                ..
            }
        );
        if !writable_now && desc.writable == Some(true) {
            return false;
        }
        let mut ok = true;
        if let Some(value) = &desc.value {
            let JsValue::Number(n) = value else {
                return false;
            };
            ok = self.set_array_length(*n as u32);
        }
        if desc.writable == Some(false) {
            if let ObjectKind::Array {
                length_writable, ..
            } = &mut self.kind
            {
                *length_writable = false;
            }
        }
        ok
    }

    /// `[[Delete]]`: false when the property exists and is non-configurable
    pub fn delete(&mut self, key: &PropertyKey) -> bool {
        match self.get_own_property(key) {
            None => true,
            Some(prop) if prop.configurable => {
                self.properties.remove(key);
                true
            }
            Some(_) => false,
        }
    }

    pub fn prevent_extensions(&mut self) {
        self.extensible = false;
    }

    /// Make every own property non-configurable (and non-writable when `freeze`) and
    /// forbid new properties. Idempotent.
    pub fn set_integrity(&mut self, freeze: bool) {
        self.extensible = false;
        for (_, prop) in self.properties.iter_mut() {
            prop.configurable = false;
            if freeze {
                if let PropertyKind::Data { writable, .. } = &mut prop.kind {
                    *writable = false;
                }
            }
        }
        if freeze {
            if let ObjectKind::Array {
                length_writable, ..
            } = &mut self.kind
            {
                *length_writable = false;
            }
        }
    }

    pub fn freeze(&mut self) {
        self.set_integrity(true);
    }

    pub fn seal(&mut self) {
        self.set_integrity(false);
    }

    /// True iff not extensible and every own property is non-configurable, data
    /// properties also non-writable
    pub fn is_frozen(&self) -> bool {
        if self.extensible {
            return false;
        }
        if let ObjectKind::Array {
            length_writable: true,
            ..
        } = self.kind
        {
            return false;
        }
        self.properties.iter().all(|(_, prop)| prop.is_frozen())
    }

    pub fn is_sealed(&self) -> bool {
        !self.extensible && self.properties.iter().all(|(_, prop)| !prop.configurable)
    }
}

fn same_function(a: &Option<JsObjectRef>, b: &Option<JsObjectRef>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Rc::ptr_eq(a, b),
        _ => false,
    }
}

/// Find a property along the prototype chain, returning it with its holder
pub fn find_property(obj: &JsObjectRef, key: &PropertyKey) -> Option<(Property, JsObjectRef)> {
    let mut current = obj.cheap_clone();
    for _ in 0..MAX_PROTOTYPE_DEPTH {
        let next = {
            let borrowed = current.borrow();
            if let Some(prop) = borrowed.get_own_property(key) {
                drop(borrowed);
                return Some((prop, current));
            }
            borrowed.prototype.clone()
        };
        current = next?;
    }
    None
}

/// Change an object's prototype. Refuses to create a cycle, and refuses any change on
/// a non-extensible object.
pub fn set_prototype_of(obj: &JsObjectRef, proto: Option<JsObjectRef>) -> bool {
    {
        let borrowed = obj.borrow();
        let unchanged = match (&borrowed.prototype, &proto) {
            (None, None) => true,
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        };
        if unchanged {
            return true;
        }
        if !borrowed.extensible {
            return false;
        }
    }
    let mut cursor = proto.clone();
    let mut depth = 0;
    while let Some(p) = cursor {
        if Rc::ptr_eq(&p, obj) {
            return false;
        }
        depth += 1;
        if depth > MAX_PROTOTYPE_DEPTH {
            return false;
        }
        cursor = p.borrow().prototype.clone();
    }
    obj.borrow_mut().prototype = proto;
    true
}

/// Whether `proto` appears on `obj`'s prototype chain
pub fn is_prototype_of(proto: &JsObjectRef, obj: &JsObjectRef) -> bool {
    let mut cursor = obj.borrow().prototype.clone();
    let mut depth = 0;
    while let Some(p) = cursor {
        if Rc::ptr_eq(&p, proto) {
            return true;
        }
        depth += 1;
        if depth > MAX_PROTOTYPE_DEPTH {
            return false;
        }
        cursor = p.borrow().prototype.clone();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> JsObjectRef {
        JsObject::new(None, ObjectKind::Ordinary).into_ref()
    }

    #[test]
    fn prototype_cycles_are_rejected() {
        let a = plain();
        let b = plain();
        assert!(set_prototype_of(&b, Some(a.cheap_clone())));
        assert!(!set_prototype_of(&a, Some(b.cheap_clone())));
        assert!(!set_prototype_of(&a, Some(a.cheap_clone())));
        assert!(is_prototype_of(&a, &b));
    }

    #[test]
    fn lookup_walks_the_chain() {
        let base = plain();
        base.borrow_mut()
            .set_property(PropertyKey::from("x"), JsValue::from(1));
        let child = JsObject::new(Some(base.cheap_clone()), ObjectKind::Ordinary).into_ref();
        let (prop, holder) = find_property(&child, &PropertyKey::from("x")).unwrap_or_else(|| {
            (Property::data(JsValue::Undefined), child.cheap_clone())
        });
        assert_eq!(prop.value(), JsValue::from(1));
        assert!(Rc::ptr_eq(&holder, &base));
    }

    #[test]
    fn freeze_is_idempotent() {
        let obj = plain();
        obj.borrow_mut()
            .set_property(PropertyKey::from("a"), JsValue::from(1));
        obj.borrow_mut().freeze();
        assert!(obj.borrow().is_frozen());
        obj.borrow_mut().freeze();
        assert!(obj.borrow().is_frozen());
        assert!(!obj.borrow_mut().define_own_property(
            PropertyKey::from("b"),
            PropertyDescriptor {
                value: Some(JsValue::from(2)),
                ..Default::default()
            }
        ));
    }

    #[test]
    fn accessors_only_need_to_be_non_configurable() {
        let obj = plain();
        obj.borrow_mut().define_raw(
            PropertyKey::from("g"),
            Property::accessor(None, None, true, false),
        );
        obj.borrow_mut().prevent_extensions();
        assert!(obj.borrow().is_frozen());
    }

    #[test]
    fn array_length_tracks_writes_and_truncates() {
        let arr = JsObject::new(
            None,
            ObjectKind::Array {
                length: 0,
                length_writable: true,
            },
        )
        .into_ref();
        arr.borrow_mut()
            .set_property(PropertyKey::Index(4), JsValue::from(1));
        assert_eq!(arr.borrow().array_length(), Some(5));
        assert!(arr.borrow_mut().set_array_length(2));
        assert!(!arr.borrow().has_own_property(&PropertyKey::Index(4)));
    }
}
