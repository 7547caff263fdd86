//! Set built-in constructor, prototype and iterator

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::object::{IterationKind, JsObject, JsObjectRef, ObjectKind, OrderedTable};
use crate::value::{CheapClone, JsValue};

use super::arg;
use super::map::{
    add_from_iterable, alias_iterator, collection_iterator_next, create_collection_iterator, define_tag,
    for_each_entry, with_table, Collection,
};

/// Initialize Set.prototype and %SetIteratorPrototype%
pub fn init_set_prototype(interp: &mut Interpreter) {
    let proto = interp.intrinsics().set_prototype.cheap_clone();

    interp.register_method(&proto, "add", set_add, 1);
    interp.register_method(&proto, "has", set_has, 1);
    interp.register_method(&proto, "delete", set_delete, 1);
    interp.register_method(&proto, "clear", set_clear, 0);
    interp.register_method(&proto, "forEach", set_for_each, 1);
    interp.register_method(&proto, "entries", set_entries, 0);
    interp.register_method(&proto, "values", set_values, 0);
    let size = interp.key("size");
    interp.register_getter(&proto, size, set_size);
    // keys and Symbol.iterator are the very same function as values
    let values_key = interp.key("values");
    let values = proto.borrow().get_own_property(&values_key).map(|p| p.value());
    if let Some(values) = values {
        interp.define_hidden(&proto, "keys", values);
    }
    alias_iterator(interp, &proto, "values");
    define_tag(&proto, "Set");

    let iterator_proto = interp.intrinsics().set_iterator_prototype.cheap_clone();
    interp.register_method(&iterator_proto, "next", set_iterator_next, 0);
    define_tag(&iterator_proto, "Set Iterator");
}

pub fn create_set_constructor(interp: &mut Interpreter) -> JsObjectRef {
    let proto = interp.intrinsics().set_prototype.cheap_clone();
    interp.create_native_constructor("Set", set_call, set_construct, 0, &proto)
}

fn set_call(_interp: &mut Interpreter, _this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Err(JsError::type_error("Constructor Set requires 'new'"))
}

/// new Set(iterable): values are added through the `add` method
fn set_construct(interp: &mut Interpreter, args: &[JsValue], new_target: &JsObjectRef) -> Result<JsValue, JsError> {
    let proto = interp.prototype_from_constructor(new_target, |i| &i.set_prototype)?;
    let set = JsValue::Object(JsObject::new(Some(proto), ObjectKind::Set(Box::default())).into_ref());
    let iterable = arg(args, 0);
    if iterable.is_null_or_undefined() {
        return Ok(set);
    }
    let adder = interp.get_named(&set, "add")?;
    if !adder.is_callable() {
        return Err(JsError::type_error("'add' of the new Set is not a function"));
    }
    add_from_iterable(interp, &iterable, |interp, item| {
        interp.call_function(&adder, set.cheap_clone(), &[item])?;
        Ok(())
    })?;
    Ok(set)
}

/// Set.prototype.add returns the set for chaining
pub fn set_add(_interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    with_table(&this, Collection::Set, "add", |table| table.insert(arg(args, 0), JsValue::Undefined))?;
    Ok(this)
}

pub fn set_has(_interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let value = arg(args, 0);
    with_table(&this, Collection::Set, "has", |table| JsValue::Boolean(table.contains(&value)))
}

pub fn set_delete(_interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let value = arg(args, 0);
    with_table(&this, Collection::Set, "delete", |table| JsValue::Boolean(table.remove(&value)))
}

pub fn set_clear(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    with_table(&this, Collection::Set, "clear", OrderedTable::clear)?;
    Ok(JsValue::Undefined)
}

fn set_size(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    with_table(&this, Collection::Set, "size", |table| JsValue::Number(table.len() as f64))
}

/// Set.prototype.forEach: `callback(value, value, set)`
pub fn set_for_each(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    for_each_entry(interp, &this, Collection::Set, args)
}

pub fn set_values(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    create_collection_iterator(interp, &this, Collection::Set, "values", IterationKind::Values)
}

/// Set.prototype.entries yields `[value, value]`
pub fn set_entries(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    create_collection_iterator(interp, &this, Collection::Set, "entries", IterationKind::Entries)
}

/// %SetIteratorPrototype%.next
fn set_iterator_next(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    collection_iterator_next(interp, &this, Collection::Set)
}
