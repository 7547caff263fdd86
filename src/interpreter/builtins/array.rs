//! Array built-in methods
//!
//! Methods are generic over array-likes: they read `length` and indices through
//! `[[Get]]`, so they work on `arguments` objects and plain objects as well, and skip
//! holes the way the iteration methods require.

use std::cmp::Ordering;

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::object::{IterationKind, JsObject, JsObjectRef, ObjectKind};
use crate::value::{CheapClone, JsString, JsValue, PropertyKey, WellKnownSymbol};

use super::arg;

/// Initialize Array.prototype with all array methods.
pub fn init_array_prototype(interp: &mut Interpreter) {
    let proto = interp.intrinsics().array_prototype.cheap_clone();

    // Mutating methods
    interp.register_method(&proto, "push", array_push, 1);
    interp.register_method(&proto, "pop", array_pop, 0);
    interp.register_method(&proto, "shift", array_shift, 0);
    interp.register_method(&proto, "unshift", array_unshift, 1);
    interp.register_method(&proto, "splice", array_splice, 2);
    interp.register_method(&proto, "reverse", array_reverse, 0);
    interp.register_method(&proto, "sort", array_sort, 1);
    interp.register_method(&proto, "fill", array_fill, 1);

    // Accessor methods
    interp.register_method(&proto, "at", array_at, 1);
    interp.register_method(&proto, "concat", array_concat, 1);
    interp.register_method(&proto, "slice", array_slice, 2);
    interp.register_method(&proto, "join", array_join, 1);
    interp.register_method(&proto, "toString", array_to_string, 0);
    interp.register_method(&proto, "indexOf", array_index_of, 1);
    interp.register_method(&proto, "lastIndexOf", array_last_index_of, 1);
    interp.register_method(&proto, "includes", array_includes, 1);

    // Iteration methods
    interp.register_method(&proto, "forEach", array_foreach, 1);
    interp.register_method(&proto, "map", array_map, 1);
    interp.register_method(&proto, "filter", array_filter, 1);
    interp.register_method(&proto, "reduce", array_reduce, 1);
    interp.register_method(&proto, "reduceRight", array_reduce_right, 1);
    interp.register_method(&proto, "find", array_find, 1);
    interp.register_method(&proto, "findIndex", array_find_index, 1);
    interp.register_method(&proto, "findLast", array_find_last, 1);
    interp.register_method(&proto, "findLastIndex", array_find_last_index, 1);
    interp.register_method(&proto, "every", array_every, 1);
    interp.register_method(&proto, "some", array_some, 1);
    interp.register_method(&proto, "flat", array_flat, 0);
    interp.register_method(&proto, "flatMap", array_flat_map, 1);

    // Iterator methods
    interp.register_method(&proto, "keys", array_keys, 0);
    interp.register_method(&proto, "values", array_values, 0);
    interp.register_method(&proto, "entries", array_entries, 0);

    // Array.prototype[Symbol.iterator] is the very same function as values
    let values_key = interp.key("values");
    let values = proto.borrow().get_own_property(&values_key).map(|p| p.value());
    if let Some(values) = values {
        proto.borrow_mut().define_raw(
            WellKnownSymbol::Iterator.key(),
            crate::value::Property::hidden(values),
        );
    }

    let iterator_proto = interp.intrinsics().array_iterator_prototype.cheap_clone();
    interp.register_method(&iterator_proto, "next", array_iterator_next, 0);
    iterator_proto.borrow_mut().define_raw(
        WellKnownSymbol::ToStringTag.key(),
        crate::value::Property::with_attributes(JsValue::from("Array Iterator"), false, false, true),
    );
}

/// Create Array constructor with static methods (isArray, of, from)
pub fn create_array_constructor(interp: &mut Interpreter) -> JsObjectRef {
    let proto = interp.intrinsics().array_prototype.cheap_clone();
    let constructor =
        interp.create_native_constructor("Array", array_constructor_fn, array_construct, 1, &proto);

    interp.register_method(&constructor, "isArray", array_is_array, 1);
    interp.register_method(&constructor, "of", array_of, 0);
    interp.register_method(&constructor, "from", array_from, 1);

    constructor
}

// ============ HELPERS ============

fn index_key(index: usize) -> PropertyKey {
    PropertyKey::from_number(index as f64)
}

/// ToObject(this) plus its length
fn this_array_like(interp: &mut Interpreter, this: &JsValue) -> Result<(JsObjectRef, JsValue, usize), JsError> {
    let obj = interp.to_object(this)?;
    let target = JsValue::Object(obj.cheap_clone());
    let length = length_of(interp, &target)?;
    Ok((obj, target, length))
}

fn length_of(interp: &mut Interpreter, target: &JsValue) -> Result<usize, JsError> {
    let length = interp.get_named(target, "length")?;
    interp.to_length(&length)
}

fn set_length(interp: &mut Interpreter, target: &JsValue, length: usize) -> Result<(), JsError> {
    let key = interp.key("length");
    interp.set(target, key, JsValue::Number(length as f64), true)
}

fn get_index(interp: &mut Interpreter, target: &JsValue, index: usize) -> Result<JsValue, JsError> {
    interp.get(target, &index_key(index))
}

fn set_index(interp: &mut Interpreter, target: &JsValue, index: usize, value: JsValue) -> Result<(), JsError> {
    interp.set(target, index_key(index), value, true)
}

fn delete_index(interp: &mut Interpreter, target: &JsValue, index: usize) -> Result<(), JsError> {
    interp.delete_property(target, &index_key(index), true).map(|_| ())
}

fn has_index(interp: &Interpreter, obj: &JsObjectRef, index: usize) -> bool {
    interp.has_property(obj, &index_key(index))
}

fn callback_arg(interp: &Interpreter, args: &[JsValue]) -> Result<JsValue, JsError> {
    let callback = arg(args, 0);
    if !callback.is_callable() {
        return Err(JsError::type_error(format!(
            "{} is not a function",
            interp.display_value(&callback)
        )));
    }
    Ok(callback)
}

/// Relative index argument (`slice`, `splice`, `fill`, `at`) clamped into `0..=len`
fn relative_index(interp: &mut Interpreter, value: &JsValue, len: usize, default: usize) -> Result<usize, JsError> {
    if value.is_undefined() {
        return Ok(default);
    }
    let n = interp.to_integer(value)?;
    let len = len as f64;
    Ok(if n < 0.0 {
        (len + n).max(0.0) as usize
    } else {
        n.min(len) as usize
    })
}

/// An empty array with `length` preset, for results that may contain holes
fn array_with_length(interp: &mut Interpreter, length: usize) -> JsObjectRef {
    let result = interp.create_array(Vec::new());
    result.borrow_mut().set_array_length(length as u32);
    result
}

fn value_of(obj: JsObjectRef) -> JsValue {
    JsValue::Object(obj)
}

// ============ CONSTRUCTOR ============

/// Array(len) / Array(...items), with or without `new`
pub fn array_constructor_fn(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let array = match args {
        [JsValue::Number(n)] => {
            let length = crate::value::to_uint32(*n);
            if f64::from(length) != *n {
                return Err(JsError::range_error("Invalid array length"));
            }
            array_with_length(interp, length as usize)
        }
        _ => interp.create_array(args.to_vec()),
    };
    Ok(value_of(array))
}

fn array_construct(
    interp: &mut Interpreter,
    args: &[JsValue],
    new_target: &JsObjectRef,
) -> Result<JsValue, JsError> {
    let proto = interp.prototype_from_constructor(new_target, |i| &i.array_prototype)?;
    let array = array_constructor_fn(interp, JsValue::Undefined, args)?;
    if let JsValue::Object(obj) = &array {
        obj.borrow_mut().prototype = Some(proto);
    }
    Ok(array)
}

pub fn array_is_array(_interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let is_array = match arg(args, 0) {
        JsValue::Object(obj) => obj.borrow().is_array(),
        _ => false,
    };
    Ok(JsValue::Boolean(is_array))
}

pub fn array_of(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(value_of(interp.create_array(args.to_vec())))
}

/// Array.from(items, mapFn?, thisArg?): iterables first, then array-likes
pub fn array_from(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let items = arg(args, 0);
    let map_fn = arg(args, 1);
    let this_arg = arg(args, 2);
    if !map_fn.is_undefined() && !map_fn.is_callable() {
        return Err(JsError::type_error(format!(
            "{} is not a function",
            interp.display_value(&map_fn)
        )));
    }
    if items.is_null_or_undefined() {
        return Err(JsError::type_error(format!(
            "{} is not iterable",
            interp.display_value(&items)
        )));
    }

    let iterator = interp.get(&items, &WellKnownSymbol::Iterator.key())?;
    let values = if iterator.is_null_or_undefined() {
        let source = JsValue::Object(interp.to_object(&items)?);
        let length = length_of(interp, &source)?;
        let mut values = Vec::with_capacity(length.min(1024));
        for i in 0..length {
            values.push(get_index(interp, &source, i)?);
        }
        values
    } else {
        interp.iterate_to_vec(&items)?
    };

    let values = if map_fn.is_undefined() {
        values
    } else {
        let mut mapped = Vec::with_capacity(values.len());
        for (i, value) in values.into_iter().enumerate() {
            mapped.push(interp.call_function(
                &map_fn,
                this_arg.cheap_clone(),
                &[value, JsValue::Number(i as f64)],
            )?);
        }
        mapped
    };
    Ok(value_of(interp.create_array(values)))
}

// ============ MUTATING METHODS ============

pub fn array_push(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (_, target, length) = this_array_like(interp, &this)?;
    for (i, value) in args.iter().enumerate() {
        set_index(interp, &target, length + i, value.cheap_clone())?;
    }
    let new_length = length + args.len();
    set_length(interp, &target, new_length)?;
    Ok(JsValue::Number(new_length as f64))
}

pub fn array_pop(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (_, target, length) = this_array_like(interp, &this)?;
    if length == 0 {
        set_length(interp, &target, 0)?;
        return Ok(JsValue::Undefined);
    }
    let last = get_index(interp, &target, length - 1)?;
    delete_index(interp, &target, length - 1)?;
    set_length(interp, &target, length - 1)?;
    Ok(last)
}

pub fn array_shift(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (obj, target, length) = this_array_like(interp, &this)?;
    if length == 0 {
        set_length(interp, &target, 0)?;
        return Ok(JsValue::Undefined);
    }
    let first = get_index(interp, &target, 0)?;
    for i in 1..length {
        if has_index(interp, &obj, i) {
            let value = get_index(interp, &target, i)?;
            set_index(interp, &target, i - 1, value)?;
        } else {
            delete_index(interp, &target, i - 1)?;
        }
    }
    delete_index(interp, &target, length - 1)?;
    set_length(interp, &target, length - 1)?;
    Ok(first)
}

pub fn array_unshift(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (obj, target, length) = this_array_like(interp, &this)?;
    let count = args.len();
    if count > 0 {
        for i in (0..length).rev() {
            if has_index(interp, &obj, i) {
                let value = get_index(interp, &target, i)?;
                set_index(interp, &target, i + count, value)?;
            } else {
                delete_index(interp, &target, i + count)?;
            }
        }
        for (i, value) in args.iter().enumerate() {
            set_index(interp, &target, i, value.cheap_clone())?;
        }
    }
    set_length(interp, &target, length + count)?;
    Ok(JsValue::Number((length + count) as f64))
}

pub fn array_splice(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (obj, target, length) = this_array_like(interp, &this)?;
    let start = relative_index(interp, &arg(args, 0), length, 0)?;
    let delete_count = match args.len() {
        0 => 0,
        1 => length - start,
        _ => {
            let n = interp.to_integer(&arg(args, 1))?;
            (n.max(0.0) as usize).min(length - start)
        }
    };
    let items = args.get(2..).unwrap_or_default();

    let removed = array_with_length(interp, delete_count);
    for i in 0..delete_count {
        if has_index(interp, &obj, start + i) {
            let value = get_index(interp, &target, start + i)?;
            interp.create_data_property(&removed, index_key(i), value);
        }
    }

    let item_count = items.len();
    if item_count < delete_count {
        for i in start..length - delete_count {
            let from = i + delete_count;
            let to = i + item_count;
            if has_index(interp, &obj, from) {
                let value = get_index(interp, &target, from)?;
                set_index(interp, &target, to, value)?;
            } else {
                delete_index(interp, &target, to)?;
            }
        }
        for i in (length - delete_count + item_count..length).rev() {
            delete_index(interp, &target, i)?;
        }
    } else if item_count > delete_count {
        for i in (start..length - delete_count).rev() {
            let from = i + delete_count;
            let to = i + item_count;
            if has_index(interp, &obj, from) {
                let value = get_index(interp, &target, from)?;
                set_index(interp, &target, to, value)?;
            } else {
                delete_index(interp, &target, to)?;
            }
        }
    }
    for (i, item) in items.iter().enumerate() {
        set_index(interp, &target, start + i, item.cheap_clone())?;
    }
    set_length(interp, &target, length - delete_count + item_count)?;
    Ok(value_of(removed))
}

pub fn array_reverse(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (obj, target, length) = this_array_like(interp, &this)?;
    let mut lower = 0;
    while lower < length / 2 {
        let upper = length - 1 - lower;
        let lower_exists = has_index(interp, &obj, lower);
        let upper_exists = has_index(interp, &obj, upper);
        let lower_value = get_index(interp, &target, lower)?;
        let upper_value = get_index(interp, &target, upper)?;
        match (lower_exists, upper_exists) {
            (true, true) => {
                set_index(interp, &target, lower, upper_value)?;
                set_index(interp, &target, upper, lower_value)?;
            }
            (false, true) => {
                set_index(interp, &target, lower, upper_value)?;
                delete_index(interp, &target, upper)?;
            }
            (true, false) => {
                delete_index(interp, &target, lower)?;
                set_index(interp, &target, upper, lower_value)?;
            }
            (false, false) => {}
        }
        lower += 1;
    }
    Ok(target)
}

/// SortCompare: comparator result, or UTF-16 code unit order of the string forms
fn sort_compare(
    interp: &mut Interpreter,
    comparator: &JsValue,
    a: &JsValue,
    b: &JsValue,
) -> Result<Ordering, JsError> {
    if comparator.is_undefined() {
        let a = interp.to_js_string(a)?;
        let b = interp.to_js_string(b)?;
        return Ok(a.to_utf16().cmp(&b.to_utf16()));
    }
    let result = interp.call_function(comparator, JsValue::Undefined, &[a.cheap_clone(), b.cheap_clone()])?;
    let n = interp.to_number(&result)?;
    Ok(if n < 0.0 {
        Ordering::Less
    } else if n > 0.0 {
        Ordering::Greater
    } else {
        Ordering::Equal
    })
}

/// Stable merge sort with a fallible comparator
fn merge_sort(
    interp: &mut Interpreter,
    comparator: &JsValue,
    values: Vec<JsValue>,
) -> Result<Vec<JsValue>, JsError> {
    if values.len() <= 1 {
        return Ok(values);
    }
    let mut right = values;
    let left = right.drain(..right.len() / 2).collect::<Vec<_>>();
    let left = merge_sort(interp, comparator, left)?;
    let right = merge_sort(interp, comparator, right)?;

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    loop {
        let take_right = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => sort_compare(interp, comparator, l, r)? == Ordering::Greater,
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };
        let next = if take_right { right.next() } else { left.next() };
        merged.extend(next);
    }
    Ok(merged)
}

pub fn array_sort(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let comparator = arg(args, 0);
    if !comparator.is_undefined() && !comparator.is_callable() {
        return Err(JsError::type_error(
            "The comparison function must be either a function or undefined",
        ));
    }
    let (obj, target, length) = this_array_like(interp, &this)?;
    let mut values = Vec::new();
    let mut undefined_count = 0;
    for i in 0..length {
        if !has_index(interp, &obj, i) {
            continue;
        }
        match get_index(interp, &target, i)? {
            JsValue::Undefined => undefined_count += 1,
            value => values.push(value),
        }
    }
    let sorted = merge_sort(interp, &comparator, values)?;
    let present = sorted.len() + undefined_count;
    for (i, value) in sorted.into_iter().enumerate() {
        set_index(interp, &target, i, value)?;
    }
    for i in present - undefined_count..present {
        set_index(interp, &target, i, JsValue::Undefined)?;
    }
    for i in present..length {
        delete_index(interp, &target, i)?;
    }
    Ok(target)
}

pub fn array_fill(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (_, target, length) = this_array_like(interp, &this)?;
    let value = arg(args, 0);
    let start = relative_index(interp, &arg(args, 1), length, 0)?;
    let end = relative_index(interp, &arg(args, 2), length, length)?;
    for i in start..end {
        set_index(interp, &target, i, value.cheap_clone())?;
    }
    Ok(target)
}

// ============ ACCESSOR METHODS ============

pub fn array_at(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (_, target, length) = this_array_like(interp, &this)?;
    let n = interp.to_integer(&arg(args, 0))?;
    let index = if n < 0.0 { length as f64 + n } else { n };
    if index < 0.0 || index >= length as f64 {
        return Ok(JsValue::Undefined);
    }
    get_index(interp, &target, index as usize)
}

fn is_concat_spreadable(interp: &mut Interpreter, value: &JsValue) -> Result<bool, JsError> {
    let JsValue::Object(obj) = value else {
        return Ok(false);
    };
    let spreadable = interp.get(value, &WellKnownSymbol::IsConcatSpreadable.key())?;
    if !spreadable.is_undefined() {
        return Ok(spreadable.to_boolean());
    }
    Ok(obj.borrow().is_array())
}

pub fn array_concat(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let first = JsValue::Object(interp.to_object(&this)?);
    let result = interp.create_array(Vec::new());
    let mut n = 0;
    for item in std::iter::once(&first).chain(args.iter()) {
        if is_concat_spreadable(interp, item)? {
            let Some(source) = item.as_object().cloned() else {
                continue;
            };
            let length = length_of(interp, item)?;
            for i in 0..length {
                if has_index(interp, &source, i) {
                    let value = get_index(interp, item, i)?;
                    interp.create_data_property(&result, index_key(n + i), value);
                }
            }
            n += length;
        } else {
            interp.create_data_property(&result, index_key(n), item.cheap_clone());
            n += 1;
        }
    }
    result.borrow_mut().set_array_length(n as u32);
    Ok(value_of(result))
}

pub fn array_slice(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (obj, target, length) = this_array_like(interp, &this)?;
    let start = relative_index(interp, &arg(args, 0), length, 0)?;
    let end = relative_index(interp, &arg(args, 1), length, length)?;
    let count = end.saturating_sub(start);
    let result = array_with_length(interp, count);
    for i in 0..count {
        if has_index(interp, &obj, start + i) {
            let value = get_index(interp, &target, start + i)?;
            interp.create_data_property(&result, index_key(i), value);
        }
    }
    Ok(value_of(result))
}

pub fn array_join(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (_, target, length) = this_array_like(interp, &this)?;
    let separator = match arg(args, 0) {
        JsValue::Undefined => JsString::from(","),
        other => interp.to_js_string(&other)?,
    };
    let mut result = String::new();
    for i in 0..length {
        if i > 0 {
            result.push_str(separator.as_str());
        }
        let element = get_index(interp, &target, i)?;
        if !element.is_null_or_undefined() {
            result.push_str(interp.to_js_string(&element)?.as_str());
        }
    }
    Ok(JsValue::from(result))
}

pub fn array_to_string(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let target = JsValue::Object(interp.to_object(&this)?);
    let join = interp.get_named(&target, "join")?;
    if join.is_callable() {
        return interp.call_function(&join, target, &[]);
    }
    super::object::object_to_string(interp, target, &[])
}

pub fn array_index_of(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (obj, target, length) = this_array_like(interp, &this)?;
    let search = arg(args, 0);
    let start = relative_index(interp, &arg(args, 1), length, 0)?;
    for i in start..length {
        if has_index(interp, &obj, i) && get_index(interp, &target, i)?.strict_equals(&search) {
            return Ok(JsValue::Number(i as f64));
        }
    }
    Ok(JsValue::Number(-1.0))
}

pub fn array_last_index_of(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (obj, target, length) = this_array_like(interp, &this)?;
    if length == 0 {
        return Ok(JsValue::Number(-1.0));
    }
    let search = arg(args, 0);
    let from = if args.len() > 1 {
        let n = interp.to_integer(&arg(args, 1))?;
        if n < 0.0 {
            length as f64 + n
        } else {
            n.min(length as f64 - 1.0)
        }
    } else {
        length as f64 - 1.0
    };
    if from < 0.0 {
        return Ok(JsValue::Number(-1.0));
    }
    for i in (0..=from as usize).rev() {
        if has_index(interp, &obj, i) && get_index(interp, &target, i)?.strict_equals(&search) {
            return Ok(JsValue::Number(i as f64));
        }
    }
    Ok(JsValue::Number(-1.0))
}

pub fn array_includes(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (_, target, length) = this_array_like(interp, &this)?;
    let search = arg(args, 0);
    let start = relative_index(interp, &arg(args, 1), length, 0)?;
    for i in start..length {
        if get_index(interp, &target, i)?.same_value_zero(&search) {
            return Ok(JsValue::Boolean(true));
        }
    }
    Ok(JsValue::Boolean(false))
}

// ============ ITERATION METHODS ============

/// Call `callback(element, index, array)` for every present element in order;
/// `visit` decides whether to stop early
fn for_each_present(
    interp: &mut Interpreter,
    this: &JsValue,
    args: &[JsValue],
    mut visit: impl FnMut(&mut Interpreter, usize, JsValue, JsValue) -> Result<bool, JsError>,
) -> Result<(), JsError> {
    let (obj, target, length) = this_array_like(interp, this)?;
    let callback = callback_arg(interp, args)?;
    let this_arg = arg(args, 1);
    for i in 0..length {
        if !has_index(interp, &obj, i) {
            continue;
        }
        let element = get_index(interp, &target, i)?;
        let result = interp.call_function(
            &callback,
            this_arg.cheap_clone(),
            &[element.cheap_clone(), JsValue::Number(i as f64), target.cheap_clone()],
        )?;
        if !visit(interp, i, element, result)? {
            break;
        }
    }
    Ok(())
}

pub fn array_foreach(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    for_each_present(interp, &this, args, |_, _, _, _| Ok(true))?;
    Ok(JsValue::Undefined)
}

pub fn array_map(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (_, _, length) = this_array_like(interp, &this)?;
    let result = array_with_length(interp, length);
    for_each_present(interp, &this, args, |interp, i, _, mapped| {
        interp.create_data_property(&result, index_key(i), mapped);
        Ok(true)
    })?;
    Ok(value_of(result))
}

pub fn array_filter(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let mut kept = Vec::new();
    for_each_present(interp, &this, args, |_, _, element, keep| {
        if keep.to_boolean() {
            kept.push(element);
        }
        Ok(true)
    })?;
    Ok(value_of(interp.create_array(kept)))
}

pub fn array_every(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let mut all = true;
    for_each_present(interp, &this, args, |_, _, _, result| {
        all = result.to_boolean();
        Ok(all)
    })?;
    Ok(JsValue::Boolean(all))
}

pub fn array_some(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let mut any = false;
    for_each_present(interp, &this, args, |_, _, _, result| {
        any = result.to_boolean();
        Ok(!any)
    })?;
    Ok(JsValue::Boolean(any))
}

fn reduce(interp: &mut Interpreter, this: JsValue, args: &[JsValue], from_right: bool) -> Result<JsValue, JsError> {
    let (obj, target, length) = this_array_like(interp, &this)?;
    let callback = callback_arg(interp, args)?;
    let order = |step: usize| if from_right { length - 1 - step } else { step };
    let mut step = 0;
    let mut accumulator = match args.get(1) {
        Some(initial) => initial.cheap_clone(),
        None => loop {
            if step >= length {
                return Err(JsError::type_error("Reduce of empty array with no initial value"));
            }
            let i = order(step);
            step += 1;
            if has_index(interp, &obj, i) {
                break get_index(interp, &target, i)?;
            }
        },
    };
    while step < length {
        let i = order(step);
        step += 1;
        if !has_index(interp, &obj, i) {
            continue;
        }
        let element = get_index(interp, &target, i)?;
        accumulator = interp.call_function(
            &callback,
            JsValue::Undefined,
            &[accumulator, element, JsValue::Number(i as f64), target.cheap_clone()],
        )?;
    }
    Ok(accumulator)
}

pub fn array_reduce(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    reduce(interp, this, args, false)
}

pub fn array_reduce_right(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    reduce(interp, this, args, true)
}

/// find/findIndex/findLast/findLastIndex: visit every index, holes included
fn find(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
    from_right: bool,
) -> Result<Option<(usize, JsValue)>, JsError> {
    let (_, target, length) = this_array_like(interp, &this)?;
    let predicate = callback_arg(interp, args)?;
    let this_arg = arg(args, 1);
    for step in 0..length {
        let i = if from_right { length - 1 - step } else { step };
        let element = get_index(interp, &target, i)?;
        let found = interp.call_function(
            &predicate,
            this_arg.cheap_clone(),
            &[element.cheap_clone(), JsValue::Number(i as f64), target.cheap_clone()],
        )?;
        if found.to_boolean() {
            return Ok(Some((i, element)));
        }
    }
    Ok(None)
}

pub fn array_find(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(find(interp, this, args, false)?.map_or(JsValue::Undefined, |(_, v)| v))
}

pub fn array_find_index(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Number(
        find(interp, this, args, false)?.map_or(-1.0, |(i, _)| i as f64),
    ))
}

pub fn array_find_last(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(find(interp, this, args, true)?.map_or(JsValue::Undefined, |(_, v)| v))
}

pub fn array_find_last_index(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Number(
        find(interp, this, args, true)?.map_or(-1.0, |(i, _)| i as f64),
    ))
}

fn flatten_into(
    interp: &mut Interpreter,
    out: &mut Vec<JsValue>,
    source: &JsValue,
    depth: f64,
) -> Result<(), JsError> {
    let Some(obj) = source.as_object().cloned() else {
        return Ok(());
    };
    let length = length_of(interp, source)?;
    for i in 0..length {
        if !has_index(interp, &obj, i) {
            continue;
        }
        let element = get_index(interp, source, i)?;
        let nested = depth > 0.0 && element.as_object().is_some_and(|o| o.borrow().is_array());
        if nested {
            flatten_into(interp, out, &element, depth - 1.0)?;
        } else {
            out.push(element);
        }
    }
    Ok(())
}

pub fn array_flat(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let target = JsValue::Object(interp.to_object(&this)?);
    let depth = match arg(args, 0) {
        JsValue::Undefined => 1.0,
        other => interp.to_integer(&other)?,
    };
    let mut out = Vec::new();
    flatten_into(interp, &mut out, &target, depth)?;
    Ok(value_of(interp.create_array(out)))
}

pub fn array_flat_map(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let mut out = Vec::new();
    for_each_present(interp, &this, args, |interp, _, _, mapped| {
        let is_array = mapped.as_object().is_some_and(|o| o.borrow().is_array());
        if is_array {
            flatten_into(interp, &mut out, &mapped, 0.0)?;
        } else {
            out.push(mapped);
        }
        Ok(true)
    })?;
    Ok(value_of(interp.create_array(out)))
}

// ============ ITERATORS ============

/// A `%ArrayIteratorPrototype%` object over `target`
pub fn create_array_iterator(interp: &mut Interpreter, target: JsValue, kind: IterationKind) -> JsValue {
    let proto = interp.intrinsics().array_iterator_prototype.cheap_clone();
    JsValue::Object(
        JsObject::new(
            Some(proto),
            ObjectKind::ArrayIterator {
                target,
                index: 0,
                kind,
                done: false,
            },
        )
        .into_ref(),
    )
}

pub fn array_keys(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let target = JsValue::Object(interp.to_object(&this)?);
    Ok(create_array_iterator(interp, target, IterationKind::Keys))
}

pub fn array_values(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let target = JsValue::Object(interp.to_object(&this)?);
    Ok(create_array_iterator(interp, target, IterationKind::Values))
}

pub fn array_entries(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let target = JsValue::Object(interp.to_object(&this)?);
    Ok(create_array_iterator(interp, target, IterationKind::Entries))
}

/// %ArrayIteratorPrototype%.next
pub fn array_iterator_next(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let incompatible = || JsError::type_error("next method called on incompatible receiver");
    let obj = this.as_object().cloned().ok_or_else(incompatible)?;
    let (target, index, kind, done) = match &obj.borrow().kind {
        ObjectKind::ArrayIterator {
            target,
            index,
            kind,
            done,
        } => (target.cheap_clone(), *index, *kind, *done),
        _ => return Err(incompatible()),
    };
    if done {
        return Ok(interp.create_generator_result(JsValue::Undefined, true));
    }
    let length = length_of(interp, &target)?;
    let mut borrowed = obj.borrow_mut();
    let ObjectKind::ArrayIterator {
        index: position,
        done: finished,
        ..
    } = &mut borrowed.kind
    else {
        return Err(incompatible());
    };
    if index as usize >= length {
        *finished = true;
        drop(borrowed);
        return Ok(interp.create_generator_result(JsValue::Undefined, true));
    }
    *position = index + 1;
    drop(borrowed);

    let i = index as usize;
    let value = match kind {
        IterationKind::Keys => JsValue::Number(i as f64),
        IterationKind::Values => get_index(interp, &target, i)?,
        IterationKind::Entries => {
            let value = get_index(interp, &target, i)?;
            value_of(interp.create_array(vec![JsValue::Number(i as f64), value]))
        }
    };
    Ok(interp.create_generator_result(value, false))
}
