//! Object constructor, its static methods and Object.prototype

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::object::{is_prototype_of, set_prototype_of, JsObjectRef, ObjectKind};
use crate::value::{
    CheapClone, JsString, JsValue, Property, PropertyDescriptor, PropertyKey, PropertyKind,
    WellKnownSymbol,
};

use super::arg;

/// Initialize Object.prototype with hasOwnProperty, toString, valueOf, isPrototypeOf methods.
pub fn init_object_prototype(interp: &mut Interpreter) {
    let proto = interp.intrinsics().object_prototype.cheap_clone();

    interp.register_method(&proto, "hasOwnProperty", object_has_own_property, 1);
    interp.register_method(&proto, "isPrototypeOf", object_is_prototype_of, 1);
    interp.register_method(&proto, "propertyIsEnumerable", object_property_is_enumerable, 1);
    interp.register_method(&proto, "toString", object_to_string, 0);
    interp.register_method(&proto, "toLocaleString", object_to_locale_string, 0);
    interp.register_method(&proto, "valueOf", object_value_of, 0);
}

/// Create Object constructor with static methods (keys, values, entries, assign, etc.)
pub fn create_object_constructor(interp: &mut Interpreter) -> JsObjectRef {
    let proto = interp.intrinsics().object_prototype.cheap_clone();
    let constructor =
        interp.create_native_constructor("Object", object_call, object_construct, 1, &proto);

    // Property enumeration
    interp.register_method(&constructor, "keys", object_keys, 1);
    interp.register_method(&constructor, "values", object_values, 1);
    interp.register_method(&constructor, "entries", object_entries, 1);

    // Object manipulation
    interp.register_method(&constructor, "assign", object_assign, 2);
    interp.register_method(&constructor, "fromEntries", object_from_entries, 1);
    interp.register_method(&constructor, "create", object_create, 2);
    interp.register_method(&constructor, "hasOwn", object_has_own, 2);
    interp.register_method(&constructor, "is", object_is, 2);

    // Freezing/sealing/extensibility
    interp.register_method(&constructor, "freeze", object_freeze, 1);
    interp.register_method(&constructor, "isFrozen", object_is_frozen, 1);
    interp.register_method(&constructor, "seal", object_seal, 1);
    interp.register_method(&constructor, "isSealed", object_is_sealed, 1);
    interp.register_method(&constructor, "preventExtensions", object_prevent_extensions, 1);
    interp.register_method(&constructor, "isExtensible", object_is_extensible, 1);

    // Property descriptors
    interp.register_method(
        &constructor,
        "getOwnPropertyDescriptor",
        object_get_own_property_descriptor,
        2,
    );
    interp.register_method(
        &constructor,
        "getOwnPropertyDescriptors",
        object_get_own_property_descriptors,
        1,
    );
    interp.register_method(&constructor, "getOwnPropertyNames", object_get_own_property_names, 1);
    interp.register_method(
        &constructor,
        "getOwnPropertySymbols",
        object_get_own_property_symbols,
        1,
    );
    interp.register_method(&constructor, "defineProperty", object_define_property, 3);
    interp.register_method(&constructor, "defineProperties", object_define_properties, 2);

    // Prototype manipulation
    interp.register_method(&constructor, "getPrototypeOf", object_get_prototype_of, 1);
    interp.register_method(&constructor, "setPrototypeOf", object_set_prototype_of, 2);

    constructor
}

/// `Object(value)`: wraps primitives, returns objects unchanged
fn object_call(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    match arg(args, 0) {
        JsValue::Null | JsValue::Undefined => Ok(JsValue::Object(interp.create_object())),
        value => interp.to_object(&value).map(JsValue::Object),
    }
}

/// `new Object(value)`; subclasses get an ordinary object inheriting from `new.target`
fn object_construct(
    interp: &mut Interpreter,
    args: &[JsValue],
    new_target: &JsObjectRef,
) -> Result<JsValue, JsError> {
    let proto = interp.prototype_from_constructor(new_target, |i| &i.object_prototype)?;
    if !std::rc::Rc::ptr_eq(&proto, &interp.intrinsics().object_prototype) {
        let obj = interp.create_object();
        obj.borrow_mut().prototype = Some(proto);
        return Ok(JsValue::Object(obj));
    }
    object_call(interp, JsValue::Undefined, args)
}

/// Object argument of a static method, TypeError otherwise
fn require_object(value: &JsValue, method: &str) -> Result<JsObjectRef, JsError> {
    match value {
        JsValue::Object(obj) => Ok(obj.cheap_clone()),
        _ => Err(JsError::type_error(format!(
            "Object.{} called on non-object",
            method
        ))),
    }
}

/// Own enumerable string keys in enumeration order
pub(crate) fn enumerable_own_keys(obj: &JsObjectRef) -> Vec<PropertyKey> {
    let borrowed = obj.borrow();
    borrowed
        .own_keys()
        .into_iter()
        .filter(|key| {
            !key.is_symbol()
                && borrowed
                    .get_own_property(key)
                    .is_some_and(|p| p.enumerable)
        })
        .collect()
}

pub fn object_keys(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&arg(args, 0))?;
    let keys = enumerable_own_keys(&obj)
        .iter()
        .map(PropertyKey::to_value)
        .collect();
    Ok(JsValue::Object(interp.create_array(keys)))
}

pub fn object_values(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&arg(args, 0))?;
    let receiver = JsValue::Object(obj.cheap_clone());
    let mut values = Vec::new();
    for key in enumerable_own_keys(&obj) {
        values.push(interp.get_with_receiver(&obj, &key, &receiver)?);
    }
    Ok(JsValue::Object(interp.create_array(values)))
}

pub fn object_entries(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&arg(args, 0))?;
    let receiver = JsValue::Object(obj.cheap_clone());
    let mut entries = Vec::new();
    for key in enumerable_own_keys(&obj) {
        let value = interp.get_with_receiver(&obj, &key, &receiver)?;
        let pair = interp.create_array(vec![key.to_value(), value]);
        entries.push(JsValue::Object(pair));
    }
    Ok(JsValue::Object(interp.create_array(entries)))
}

/// Object.assign: copies own enumerable properties through `[[Set]]`
pub fn object_assign(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let target = JsValue::Object(interp.to_object(&arg(args, 0))?);
    for source in args.iter().skip(1) {
        if source.is_null_or_undefined() {
            continue;
        }
        let source = interp.to_object(source)?;
        let receiver = JsValue::Object(source.cheap_clone());
        let keys = source.borrow().own_keys();
        for key in keys {
            let enumerable = source
                .borrow()
                .get_own_property(&key)
                .is_some_and(|p| p.enumerable);
            if !enumerable {
                continue;
            }
            let value = interp.get_with_receiver(&source, &key, &receiver)?;
            interp.set(&target, key, value, true)?;
        }
    }
    Ok(target)
}

pub fn object_from_entries(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let iterable = arg(args, 0);
    if iterable.is_null_or_undefined() {
        return Err(JsError::type_error(format!(
            "{} is not iterable",
            interp.display_value(&iterable)
        )));
    }
    let result = interp.create_object();
    for entry in interp.iterate_to_vec(&iterable)? {
        if !entry.is_object() {
            return Err(JsError::type_error(format!(
                "Iterator value {} is not an entry object",
                interp.display_value(&entry)
            )));
        }
        let key = interp.get(&entry, &PropertyKey::Index(0))?;
        let value = interp.get(&entry, &PropertyKey::Index(1))?;
        let key = interp.to_property_key(&key)?;
        interp.create_data_property(&result, key, value);
    }
    Ok(JsValue::Object(result))
}

pub fn object_create(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let proto = match arg(args, 0) {
        JsValue::Object(p) => Some(p),
        JsValue::Null => None,
        other => {
            return Err(JsError::type_error(format!(
                "Object prototype may only be an Object or null: {}",
                interp.display_value(&other)
            )));
        }
    };
    let result = interp.create_object();
    result.borrow_mut().prototype = proto;
    let properties = arg(args, 1);
    if !properties.is_undefined() {
        define_properties(interp, &result, &properties)?;
    }
    Ok(JsValue::Object(result))
}

pub fn object_has_own(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&arg(args, 0))?;
    let key = interp.to_property_key(&arg(args, 1))?;
    let has = obj.borrow().has_own_property(&key);
    Ok(JsValue::Boolean(has))
}

pub fn object_is(_interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Boolean(arg(args, 0).same_value(&arg(args, 1))))
}

// ============ INTEGRITY LEVELS ============

pub fn object_freeze(_interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let value = arg(args, 0);
    if let JsValue::Object(obj) = &value {
        obj.borrow_mut().freeze();
    }
    Ok(value)
}

pub fn object_is_frozen(_interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Boolean(match arg(args, 0) {
        JsValue::Object(obj) => obj.borrow().is_frozen(),
        _ => true,
    }))
}

pub fn object_seal(_interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let value = arg(args, 0);
    if let JsValue::Object(obj) = &value {
        obj.borrow_mut().seal();
    }
    Ok(value)
}

pub fn object_is_sealed(_interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Boolean(match arg(args, 0) {
        JsValue::Object(obj) => obj.borrow().is_sealed(),
        _ => true,
    }))
}

pub fn object_prevent_extensions(
    _interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let value = arg(args, 0);
    if let JsValue::Object(obj) = &value {
        obj.borrow_mut().prevent_extensions();
    }
    Ok(value)
}

pub fn object_is_extensible(_interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(JsValue::Boolean(match arg(args, 0) {
        JsValue::Object(obj) => obj.borrow().extensible,
        _ => false,
    }))
}

// ============ PROPERTY DESCRIPTORS ============

/// ToPropertyDescriptor
pub(crate) fn to_property_descriptor(
    interp: &mut Interpreter,
    value: &JsValue,
) -> Result<PropertyDescriptor, JsError> {
    let Some(obj) = value.as_object().cloned() else {
        return Err(JsError::type_error(format!(
            "Property description must be an object: {}",
            interp.display_value(value)
        )));
    };
    let mut desc = PropertyDescriptor::default();
    let field = |interp: &mut Interpreter, name: &str| -> Result<Option<JsValue>, JsError> {
        let key = interp.key(name);
        if interp.has_property(&obj, &key) {
            Ok(Some(interp.get(value, &key)?))
        } else {
            Ok(None)
        }
    };
    desc.enumerable = field(interp, "enumerable")?.map(|v| v.to_boolean());
    desc.configurable = field(interp, "configurable")?.map(|v| v.to_boolean());
    desc.value = field(interp, "value")?;
    desc.writable = field(interp, "writable")?.map(|v| v.to_boolean());
    let accessor = |interp: &Interpreter, kind: &str, v: JsValue| -> Result<Option<JsObjectRef>, JsError> {
        match v {
            JsValue::Undefined => Ok(None),
            JsValue::Object(f) if f.borrow().is_callable() => Ok(Some(f)),
            other => Err(JsError::type_error(format!(
                "{} must be a function: {}",
                kind,
                interp.display_value(&other)
            ))),
        }
    };
    if let Some(getter) = field(interp, "get")? {
        desc.get = Some(accessor(&*interp, "Getter", getter)?);
    }
    if let Some(setter) = field(interp, "set")? {
        desc.set = Some(accessor(&*interp, "Setter", setter)?);
    }
    if desc.is_accessor() && desc.is_data() {
        return Err(JsError::type_error(
            "Invalid property descriptor. Cannot both specify accessors and a value or writable attribute",
        ));
    }
    Ok(desc)
}

/// FromPropertyDescriptor
fn from_property(interp: &mut Interpreter, prop: Property) -> JsValue {
    let obj = interp.create_object();
    match prop.kind {
        PropertyKind::Data { value, writable } => {
            let value_key = interp.key("value");
            let writable_key = interp.key("writable");
            interp.create_data_property(&obj, value_key, value);
            interp.create_data_property(&obj, writable_key, JsValue::Boolean(writable));
        }
        PropertyKind::Accessor { getter, setter } => {
            let get_key = interp.key("get");
            let set_key = interp.key("set");
            let as_value = |f: Option<JsObjectRef>| f.map_or(JsValue::Undefined, JsValue::Object);
            interp.create_data_property(&obj, get_key, as_value(getter));
            interp.create_data_property(&obj, set_key, as_value(setter));
        }
    }
    let enumerable_key = interp.key("enumerable");
    let configurable_key = interp.key("configurable");
    interp.create_data_property(&obj, enumerable_key, JsValue::Boolean(prop.enumerable));
    interp.create_data_property(&obj, configurable_key, JsValue::Boolean(prop.configurable));
    JsValue::Object(obj)
}

fn define_own(
    interp: &mut Interpreter,
    obj: &JsObjectRef,
    key: PropertyKey,
    mut desc: PropertyDescriptor,
) -> Result<(), JsError> {
    let array_length =
        obj.borrow().is_array() && matches!(&key, PropertyKey::String(s) if s.as_str() == "length");
    if array_length {
        if let Some(value) = &desc.value {
            let length = interp.array_length_from(value)?;
            desc.value = Some(JsValue::Number(f64::from(length)));
        }
    }
    if !obj.borrow_mut().define_own_property(key.cheap_clone(), desc) {
        return Err(JsError::type_error(format!("Cannot redefine property: {}", key)));
    }
    Ok(())
}

fn define_properties(
    interp: &mut Interpreter,
    target: &JsObjectRef,
    properties: &JsValue,
) -> Result<(), JsError> {
    let props = interp.to_object(properties)?;
    let receiver = JsValue::Object(props.cheap_clone());
    let keys = props.borrow().own_keys();
    let mut descriptors = Vec::new();
    for key in keys {
        let enumerable = props
            .borrow()
            .get_own_property(&key)
            .is_some_and(|p| p.enumerable);
        if !enumerable {
            continue;
        }
        let value = interp.get_with_receiver(&props, &key, &receiver)?;
        descriptors.push((key, to_property_descriptor(interp, &value)?));
    }
    for (key, desc) in descriptors {
        define_own(interp, target, key, desc)?;
    }
    Ok(())
}

pub fn object_define_property(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let target = arg(args, 0);
    let obj = require_object(&target, "defineProperty")?;
    let key = interp.to_property_key(&arg(args, 1))?;
    let desc = to_property_descriptor(interp, &arg(args, 2))?;
    define_own(interp, &obj, key, desc)?;
    Ok(target)
}

pub fn object_define_properties(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let target = arg(args, 0);
    let obj = require_object(&target, "defineProperties")?;
    define_properties(interp, &obj, &arg(args, 1))?;
    Ok(target)
}

pub fn object_get_own_property_descriptor(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&arg(args, 0))?;
    let key = interp.to_property_key(&arg(args, 1))?;
    let prop = obj.borrow().get_own_property(&key);
    Ok(match prop {
        Some(prop) => from_property(interp, prop),
        None => JsValue::Undefined,
    })
}

pub fn object_get_own_property_descriptors(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&arg(args, 0))?;
    let result = interp.create_object();
    let keys = obj.borrow().own_keys();
    for key in keys {
        let prop = obj.borrow().get_own_property(&key);
        if let Some(prop) = prop {
            let desc = from_property(interp, prop);
            interp.create_data_property(&result, key, desc);
        }
    }
    Ok(JsValue::Object(result))
}

pub fn object_get_own_property_names(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&arg(args, 0))?;
    let names = obj
        .borrow()
        .own_keys()
        .iter()
        .filter(|k| !k.is_symbol())
        .map(PropertyKey::to_value)
        .collect();
    Ok(JsValue::Object(interp.create_array(names)))
}

pub fn object_get_own_property_symbols(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&arg(args, 0))?;
    let symbols = obj
        .borrow()
        .own_keys()
        .iter()
        .filter(|k| k.is_symbol())
        .map(PropertyKey::to_value)
        .collect();
    Ok(JsValue::Object(interp.create_array(symbols)))
}

// ============ PROTOTYPES ============

pub fn object_get_prototype_of(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let obj = interp.to_object(&arg(args, 0))?;
    let proto = obj.borrow().prototype.clone();
    Ok(proto.map_or(JsValue::Null, JsValue::Object))
}

pub fn object_set_prototype_of(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let target = interp.require_object_coercible(arg(args, 0))?;
    let proto = match arg(args, 1) {
        JsValue::Object(p) => Some(p),
        JsValue::Null => None,
        other => {
            return Err(JsError::type_error(format!(
                "Object prototype may only be an Object or null: {}",
                interp.display_value(&other)
            )));
        }
    };
    if let JsValue::Object(obj) = &target {
        if !set_prototype_of(obj, proto) {
            if !obj.borrow().extensible {
                return Err(JsError::type_error(format!(
                    "{} is not extensible",
                    interp.display_value(&target)
                )));
            }
            return Err(JsError::type_error("Cyclic __proto__ value"));
        }
    }
    Ok(target)
}

// ============ OBJECT.PROTOTYPE ============

pub fn object_has_own_property(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let key = interp.to_property_key(&arg(args, 0))?;
    let obj = interp.to_object(&this)?;
    let has = obj.borrow().has_own_property(&key);
    Ok(JsValue::Boolean(has))
}

pub fn object_is_prototype_of(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let JsValue::Object(value) = arg(args, 0) else {
        return Ok(JsValue::Boolean(false));
    };
    let proto = interp.to_object(&this)?;
    Ok(JsValue::Boolean(is_prototype_of(&proto, &value)))
}

pub fn object_property_is_enumerable(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let key = interp.to_property_key(&arg(args, 0))?;
    let obj = interp.to_object(&this)?;
    let enumerable = obj
        .borrow()
        .get_own_property(&key)
        .is_some_and(|p| p.enumerable);
    Ok(JsValue::Boolean(enumerable))
}

/// Tag for objects with a built-in class; everything else reads as "Object"
fn builtin_tag(kind: &ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Array { .. }
        | ObjectKind::Function(_)
        | ObjectKind::Arguments
        | ObjectKind::Error
        | ObjectKind::Boolean(_)
        | ObjectKind::Number(_)
        | ObjectKind::String(_)
        | ObjectKind::RegExp(_)
        | ObjectKind::Date(_) => kind.class_name(),
        _ => "Object",
    }
}

/// Object.prototype.toString: `[object Tag]`, honouring `Symbol.toStringTag`
pub fn object_to_string(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let obj = match &this {
        JsValue::Undefined => return Ok(JsValue::from("[object Undefined]")),
        JsValue::Null => return Ok(JsValue::from("[object Null]")),
        other => interp.to_object(other)?,
    };
    let builtin = builtin_tag(&obj.borrow().kind);
    let tag = interp.get(&JsValue::Object(obj), &WellKnownSymbol::ToStringTag.key())?;
    let tag = match tag {
        JsValue::String(s) => s,
        _ => JsString::from(builtin),
    };
    Ok(JsValue::from(format!("[object {}]", tag)))
}

pub fn object_to_locale_string(
    interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    let method = interp.get_named(&this, "toString")?;
    interp.call_function(&method, this, &[])
}

pub fn object_value_of(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    interp.to_object(&this).map(JsValue::Object)
}
