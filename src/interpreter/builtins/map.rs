//! Map built-in constructor, prototype and iterator
//!
//! Entries live in an [`OrderedTable`] inside the object; iterators and `forEach` walk
//! it through a cursor so the collection can change while they run.

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::object::{CollectionIterator, IterationKind, JsObject, JsObjectRef, ObjectKind, OrderedTable};
use crate::value::{CheapClone, JsValue, Property, PropertyKey, WellKnownSymbol};

use super::arg;

/// Which keyed collection a shared helper works on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Collection {
    Map,
    Set,
}

impl Collection {
    fn name(self) -> &'static str {
        match self {
            Collection::Map => "Map",
            Collection::Set => "Set",
        }
    }
}

/// Initialize Map.prototype and %MapIteratorPrototype%
pub fn init_map_prototype(interp: &mut Interpreter) {
    let proto = interp.intrinsics().map_prototype.cheap_clone();

    interp.register_method(&proto, "get", map_get, 1);
    interp.register_method(&proto, "set", map_set, 2);
    interp.register_method(&proto, "has", map_has, 1);
    interp.register_method(&proto, "delete", map_delete, 1);
    interp.register_method(&proto, "clear", map_clear, 0);
    interp.register_method(&proto, "forEach", map_for_each, 1);
    interp.register_method(&proto, "keys", map_keys, 0);
    interp.register_method(&proto, "values", map_values, 0);
    interp.register_method(&proto, "entries", map_entries, 0);
    let size = interp.key("size");
    interp.register_getter(&proto, size, map_size);
    alias_iterator(interp, &proto, "entries");
    define_tag(&proto, "Map");

    let iterator_proto = interp.intrinsics().map_iterator_prototype.cheap_clone();
    interp.register_method(&iterator_proto, "next", map_iterator_next, 0);
    define_tag(&iterator_proto, "Map Iterator");
}

/// Create the Map constructor with Map.groupBy
pub fn create_map_constructor(interp: &mut Interpreter) -> JsObjectRef {
    let proto = interp.intrinsics().map_prototype.cheap_clone();
    let ctor = interp.create_native_constructor("Map", map_call, map_construct, 0, &proto);
    interp.register_method(&ctor, "groupBy", map_group_by, 2);
    ctor
}

/// `proto[Symbol.iterator]` is the very same function as `proto[name]`
pub(super) fn alias_iterator(interp: &mut Interpreter, proto: &JsObjectRef, name: &str) {
    let key = interp.key(name);
    let method = proto.borrow().get_own_property(&key).map(|p| p.value());
    if let Some(method) = method {
        proto
            .borrow_mut()
            .define_raw(WellKnownSymbol::Iterator.key(), Property::hidden(method));
    }
}

pub(super) fn define_tag(obj: &JsObjectRef, tag: &str) {
    obj.borrow_mut().define_raw(
        WellKnownSymbol::ToStringTag.key(),
        Property::with_attributes(JsValue::from(tag), false, false, true),
    );
}

/// Run `f` on the table of `this`, which must be a `collection`
pub(super) fn with_table<T>(
    this: &JsValue,
    collection: Collection,
    method: &str,
    f: impl FnOnce(&mut OrderedTable) -> T,
) -> Result<T, JsError> {
    let incompatible = || {
        JsError::type_error(format!(
            "Method {}.prototype.{} called on incompatible receiver",
            collection.name(),
            method
        ))
    };
    let JsValue::Object(obj) = this else {
        return Err(incompatible());
    };
    let mut borrowed = obj.borrow_mut();
    match (&mut borrowed.kind, collection) {
        (ObjectKind::Map(table), Collection::Map) | (ObjectKind::Set(table), Collection::Set) => {
            Ok(f(table))
        }
        _ => Err(incompatible()),
    }
}

/// Feed every value of `iterable` to `add`, closing the iterator if `add` throws
pub(super) fn add_from_iterable(
    interp: &mut Interpreter,
    iterable: &JsValue,
    mut add: impl FnMut(&mut Interpreter, JsValue) -> Result<(), JsError>,
) -> Result<(), JsError> {
    let record = interp.get_iterator(iterable)?;
    loop {
        let item = interp.iterator_step(&record)?;
        if interp.iterator_done(&record) {
            return Ok(());
        }
        if let Err(err) = add(interp, item) {
            let _ = interp.iterator_close(&record);
            return Err(err);
        }
    }
}

/// Map() without `new`
fn map_call(_interp: &mut Interpreter, _this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Err(JsError::type_error("Constructor Map requires 'new'"))
}

/// new Map(iterable): entries are added through the `set` method
fn map_construct(interp: &mut Interpreter, args: &[JsValue], new_target: &JsObjectRef) -> Result<JsValue, JsError> {
    let proto = interp.prototype_from_constructor(new_target, |i| &i.map_prototype)?;
    let map = JsValue::Object(JsObject::new(Some(proto), ObjectKind::Map(Box::default())).into_ref());
    let iterable = arg(args, 0);
    if iterable.is_null_or_undefined() {
        return Ok(map);
    }
    let adder = interp.get_named(&map, "set")?;
    if !adder.is_callable() {
        return Err(JsError::type_error("'set' of the new Map is not a function"));
    }
    add_from_iterable(interp, &iterable, |interp, item| {
        if !item.is_object() {
            return Err(JsError::type_error(format!(
                "Iterator value {} is not an entry object",
                interp.display_value(&item)
            )));
        }
        let key = interp.get(&item, &PropertyKey::Index(0))?;
        let value = interp.get(&item, &PropertyKey::Index(1))?;
        interp.call_function(&adder, map.cheap_clone(), &[key, value])?;
        Ok(())
    })?;
    Ok(map)
}

/// Map.groupBy(items, callback): arrays of items keyed by the callback's result
fn map_group_by(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let callback = arg(args, 1);
    if !callback.is_callable() {
        return Err(JsError::type_error(format!(
            "{} is not a function",
            interp.display_value(&callback)
        )));
    }
    let mut slots = OrderedTable::new();
    let mut groups: Vec<Vec<JsValue>> = Vec::new();
    let mut index = 0.0;
    add_from_iterable(interp, &arg(args, 0), |interp, item| {
        let key = interp.call_function(&callback, JsValue::Undefined, &[item.cheap_clone(), JsValue::Number(index)])?;
        index += 1.0;
        match slots.get(&key) {
            Some(JsValue::Number(slot)) => {
                if let Some(group) = groups.get_mut(*slot as usize) {
                    group.push(item);
                }
            }
            _ => {
                slots.insert(key, JsValue::Number(groups.len() as f64));
                groups.push(vec![item]);
            }
        }
        Ok(())
    })?;

    let mut table = OrderedTable::new();
    let mut groups = groups.into_iter();
    for (key, _) in slots.iter() {
        let items = groups.next().unwrap_or_default();
        table.insert(key.cheap_clone(), JsValue::Object(interp.create_array(items)));
    }
    let proto = interp.intrinsics().map_prototype.cheap_clone();
    Ok(JsValue::Object(
        JsObject::new(Some(proto), ObjectKind::Map(Box::new(table))).into_ref(),
    ))
}

pub fn map_get(_interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let key = arg(args, 0);
    with_table(&this, Collection::Map, "get", |table| table.get(&key).cloned().unwrap_or_default())
}

/// Map.prototype.set returns the map for chaining
pub fn map_set(_interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    with_table(&this, Collection::Map, "set", |table| table.insert(arg(args, 0), arg(args, 1)))?;
    Ok(this)
}

pub fn map_has(_interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let key = arg(args, 0);
    with_table(&this, Collection::Map, "has", |table| JsValue::Boolean(table.contains(&key)))
}

pub fn map_delete(_interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let key = arg(args, 0);
    with_table(&this, Collection::Map, "delete", |table| JsValue::Boolean(table.remove(&key)))
}

pub fn map_clear(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    with_table(&this, Collection::Map, "clear", OrderedTable::clear)?;
    Ok(JsValue::Undefined)
}

fn map_size(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    with_table(&this, Collection::Map, "size", |table| JsValue::Number(table.len() as f64))
}

/// Map.prototype.forEach: `callback(value, key, map)`, visiting entries added during the walk
pub fn map_for_each(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    for_each_entry(interp, &this, Collection::Map, args)
}

/// Shared by Map and Set; a Set passes its value as both leading arguments
pub(super) fn for_each_entry(
    interp: &mut Interpreter,
    this: &JsValue,
    collection: Collection,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let cursor = with_table(this, collection, "forEach", OrderedTable::cursor)?;
    let callback = arg(args, 0);
    if !callback.is_callable() {
        return Err(JsError::type_error(format!(
            "{} is not a function",
            interp.display_value(&callback)
        )));
    }
    let this_arg = arg(args, 1);
    while let Some((key, value)) = with_table(this, collection, "forEach", |table| table.next_entry(&cursor))? {
        let value = match collection {
            Collection::Map => value,
            Collection::Set => key.cheap_clone(),
        };
        interp.call_function(&callback, this_arg.cheap_clone(), &[value, key, this.cheap_clone()])?;
    }
    Ok(JsValue::Undefined)
}

pub fn map_keys(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    create_collection_iterator(interp, &this, Collection::Map, "keys", IterationKind::Keys)
}

pub fn map_values(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    create_collection_iterator(interp, &this, Collection::Map, "values", IterationKind::Values)
}

pub fn map_entries(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    create_collection_iterator(interp, &this, Collection::Map, "entries", IterationKind::Entries)
}

// ============ ITERATORS ============

/// A `%MapIteratorPrototype%` or `%SetIteratorPrototype%` object over `this`
pub(super) fn create_collection_iterator(
    interp: &mut Interpreter,
    this: &JsValue,
    collection: Collection,
    method: &str,
    kind: IterationKind,
) -> Result<JsValue, JsError> {
    let cursor = with_table(this, collection, method, OrderedTable::cursor)?;
    let Some(target) = this.as_object() else {
        return Err(JsError::internal_error("collection receiver is not an object"));
    };
    let state = Box::new(CollectionIterator {
        collection: target.cheap_clone(),
        cursor,
        kind,
        done: false,
    });
    let (proto, kind) = match collection {
        Collection::Map => (interp.intrinsics().map_iterator_prototype.cheap_clone(), ObjectKind::MapIterator(state)),
        Collection::Set => (interp.intrinsics().set_iterator_prototype.cheap_clone(), ObjectKind::SetIterator(state)),
    };
    Ok(JsValue::Object(JsObject::new(Some(proto), kind).into_ref()))
}

/// %MapIteratorPrototype%.next
fn map_iterator_next(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    collection_iterator_next(interp, &this, Collection::Map)
}

pub(super) fn collection_iterator_next(
    interp: &mut Interpreter,
    this: &JsValue,
    collection: Collection,
) -> Result<JsValue, JsError> {
    let incompatible = || {
        JsError::type_error(format!(
            "next method called on incompatible receiver (expected {} Iterator)",
            collection.name()
        ))
    };
    let obj = this.as_object().ok_or_else(incompatible)?;
    let step = {
        let mut borrowed = obj.borrow_mut();
        let state = match (&mut borrowed.kind, collection) {
            (ObjectKind::MapIterator(state), Collection::Map)
            | (ObjectKind::SetIterator(state), Collection::Set) => state,
            _ => return Err(incompatible()),
        };
        if state.done {
            None
        } else {
            let entry = match &state.collection.borrow().kind {
                ObjectKind::Map(table) | ObjectKind::Set(table) => table.next_entry(&state.cursor),
                _ => None,
            };
            if entry.is_none() {
                state.done = true;
            }
            entry.map(|entry| (entry, state.kind))
        }
    };
    let Some(((key, value), kind)) = step else {
        return Ok(interp.create_generator_result(JsValue::Undefined, true));
    };
    let value = match collection {
        Collection::Map => value,
        Collection::Set => key.cheap_clone(),
    };
    let result = match kind {
        IterationKind::Keys => key,
        IterationKind::Values => value,
        IterationKind::Entries => JsValue::Object(interp.create_array(vec![key, value])),
    };
    Ok(interp.create_generator_result(result, false))
}
