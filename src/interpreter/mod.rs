//! Interpreter core
//!
//! Everything both execution tiers share lives here: realms and their intrinsics, call
//! frames, the call/construct protocol, property access, global bindings, closures,
//! classes and the iteration protocol. The tree-walking tier is in [`exec`], the
//! bytecode tier in [`bytecode_vm`], and generator resumption in [`generator`].

pub mod builtins;
pub mod bytecode_vm;
mod exec;
pub mod generator;
mod operators;
pub mod scope;

pub(crate) use exec::describe_expr;
pub use operators::PreferredType;

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::compiler::BytecodeChunk;
use crate::config::{OptimizationTier, RuntimeConfig};
use crate::error::JsError;
use crate::interop::HostFunction;
use crate::ir::{Binding, ClassDef, FunctionKind, FunctionTemplate, MethodKind, TemplateSite, WriteMode};
use crate::object::{
    find_property, BoundFunction, Callable, JsObject, JsObjectRef, NativeConstructFn, NativeFn,
    NativeFunction, ObjectKind, ScriptFunction,
};
use crate::prelude::{grow_stack, FxHashMap};
use crate::string_dict::StringDict;
use crate::value::{
    CheapClone, JsString, JsSymbol, JsValue, Property, PropertyKey, PropertyKind,
    WellKnownSymbol,
};
use scope::{Scope, ScopeRef};

/// Completion record of a statement in the tree-walking tier
#[derive(Debug)]
pub enum Completion {
    Normal,
    Return(JsValue),
    Break(crate::ir::LabelId),
    Continue(crate::ir::LabelId),
}

/// The native error constructors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    TypeError,
    RangeError,
    ReferenceError,
    SyntaxError,
    EvalError,
    UriError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::Error,
        ErrorKind::TypeError,
        ErrorKind::RangeError,
        ErrorKind::ReferenceError,
        ErrorKind::SyntaxError,
        ErrorKind::EvalError,
        ErrorKind::UriError,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::EvalError => "EvalError",
            ErrorKind::UriError => "URIError",
        }
    }
}

// ============ REALM ============

/// Objects every realm creates once and builtins refer back to
pub struct Intrinsics {
    pub object_prototype: JsObjectRef,
    pub function_prototype: JsObjectRef,
    pub array_prototype: JsObjectRef,
    pub string_prototype: JsObjectRef,
    pub number_prototype: JsObjectRef,
    pub boolean_prototype: JsObjectRef,
    pub symbol_prototype: JsObjectRef,
    pub error_prototypes: [JsObjectRef; 7],
    pub iterator_prototype: JsObjectRef,
    pub array_iterator_prototype: JsObjectRef,
    pub string_iterator_prototype: JsObjectRef,
    /// `%GeneratorPrototype%`, inherited by every generator function's `prototype`
    pub generator_prototype: JsObjectRef,
    /// `%GeneratorFunction.prototype%`, the prototype of generator functions
    pub generator_function_prototype: JsObjectRef,
    pub regexp_prototype: JsObjectRef,
    pub map_prototype: JsObjectRef,
    pub set_prototype: JsObjectRef,
    pub map_iterator_prototype: JsObjectRef,
    pub set_iterator_prototype: JsObjectRef,
    pub date_prototype: JsObjectRef,
}

impl Intrinsics {
    fn new() -> Self {
        let object_prototype = JsObject::new(None, ObjectKind::Ordinary).into_ref();
        let child = |kind: ObjectKind| {
            JsObject::new(Some(object_prototype.cheap_clone()), kind).into_ref()
        };
        let function_prototype = child(ObjectKind::Function(Callable::Native(NativeFunction {
            name: JsString::from(""),
            call: |_, _, _| Ok(JsValue::Undefined),
            construct: None,
            arity: 0,
        })));
        let array_prototype = child(ObjectKind::Array {
            length: 0,
            length_writable: true,
        });
        let string_prototype = child(ObjectKind::String(JsString::from("")));
        let number_prototype = child(ObjectKind::Number(0.0));
        let boolean_prototype = child(ObjectKind::Boolean(false));
        let symbol_prototype = child(ObjectKind::Ordinary);
        let error_prototype = child(ObjectKind::Ordinary);
        let derived_error = || {
            JsObject::new(Some(error_prototype.cheap_clone()), ObjectKind::Ordinary).into_ref()
        };
        let error_prototypes = [
            error_prototype.cheap_clone(),
            derived_error(),
            derived_error(),
            derived_error(),
            derived_error(),
            derived_error(),
            derived_error(),
        ];
        let iterator_prototype = child(ObjectKind::Ordinary);
        let inherit_iterator = || {
            JsObject::new(Some(iterator_prototype.cheap_clone()), ObjectKind::Ordinary).into_ref()
        };
        let array_iterator_prototype = inherit_iterator();
        let string_iterator_prototype = inherit_iterator();
        let generator_prototype = inherit_iterator();
        let generator_function_prototype =
            JsObject::new(Some(function_prototype.cheap_clone()), ObjectKind::Ordinary).into_ref();
        let regexp_prototype = child(ObjectKind::Ordinary);
        let map_prototype = child(ObjectKind::Ordinary);
        let set_prototype = child(ObjectKind::Ordinary);
        let map_iterator_prototype = inherit_iterator();
        let set_iterator_prototype = inherit_iterator();
        let date_prototype = child(ObjectKind::Ordinary);
        Self {
            object_prototype,
            function_prototype,
            array_prototype,
            string_prototype,
            number_prototype,
            boolean_prototype,
            symbol_prototype,
            error_prototypes,
            iterator_prototype,
            array_iterator_prototype,
            string_iterator_prototype,
            generator_prototype,
            generator_function_prototype,
            regexp_prototype,
            map_prototype,
            set_prototype,
            map_iterator_prototype,
            set_iterator_prototype,
            date_prototype,
        }
    }

    pub fn error_prototype(&self, kind: ErrorKind) -> &JsObjectRef {
        let index = ErrorKind::ALL.iter().position(|k| *k == kind).unwrap_or(0);
        self.error_prototypes
            .get(index)
            .unwrap_or(&self.object_prototype)
    }
}

struct GlobalLexical {
    value: Option<JsValue>,
    constant: bool,
}

struct RealmInner {
    global: JsObjectRef,
    intrinsics: Intrinsics,
    lexicals: RefCell<FxHashMap<JsString, GlobalLexical>>,
    template_sites: RefCell<FxHashMap<u64, JsObjectRef>>,
}

/// A global scope: a global object, its own set of intrinsics and the top-level
/// lexical bindings of every script evaluated in it
#[derive(Clone)]
pub struct Realm(Rc<RealmInner>);

impl CheapClone for Realm {}

impl Realm {
    fn new() -> Self {
        let intrinsics = Intrinsics::new();
        let global =
            JsObject::new(Some(intrinsics.object_prototype.cheap_clone()), ObjectKind::Ordinary)
                .into_ref();
        Realm(Rc::new(RealmInner {
            global,
            intrinsics,
            lexicals: RefCell::new(FxHashMap::default()),
            template_sites: RefCell::new(FxHashMap::default()),
        }))
    }

    pub fn global(&self) -> &JsObjectRef {
        &self.0.global
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.0.intrinsics
    }

    pub fn ptr_eq(&self, other: &Realm) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn has_lexical(&self, name: &str) -> bool {
        self.0.lexicals.borrow().contains_key(name)
    }
}

impl std::fmt::Debug for Realm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Realm({:p})", Rc::as_ptr(&self.0))
    }
}

// ============ FRAMES ============

/// One activation of a script function (or of a script's top level)
pub(crate) struct Frame {
    pub scope: ScopeRef,
    /// The function's own scope; blocks temporarily replace `scope`
    pub function_scope: ScopeRef,
    pub this: JsValue,
    pub args: Vec<JsValue>,
    pub new_target: JsValue,
    pub callee: JsValue,
    pub home_object: Option<JsObjectRef>,
    pub template: Rc<FunctionTemplate>,
    pub realm: Realm,
    pub temps: Vec<JsValue>,
}

impl Frame {
    pub(crate) fn new(
        template: Rc<FunctionTemplate>,
        parent: Option<ScopeRef>,
        realm: Realm,
    ) -> Self {
        let scope = Scope::new(parent, template.slot_count);
        let registers = template
            .chunk
            .get()
            .map(|chunk| chunk.register_count)
            .unwrap_or(0)
            .max(template.temp_count);
        Self {
            function_scope: scope.cheap_clone(),
            scope,
            this: JsValue::Undefined,
            args: Vec::new(),
            new_target: JsValue::Undefined,
            callee: JsValue::Undefined,
            home_object: None,
            template,
            realm,
            temps: vec![JsValue::Undefined; registers as usize],
        }
    }

    pub(crate) fn temp(&self, index: u32) -> JsValue {
        self.temps
            .get(index as usize)
            .cloned()
            .unwrap_or(JsValue::Undefined)
    }

    pub(crate) fn set_temp(&mut self, index: u32, value: JsValue) {
        if let Some(slot) = self.temps.get_mut(index as usize) {
            *slot = value;
        }
    }

    pub(crate) fn strict(&self) -> bool {
        self.template.strict
    }
}

enum CallTarget {
    Script {
        template: Rc<FunctionTemplate>,
        scope: ScopeRef,
        realm: Realm,
        home: Option<JsObjectRef>,
    },
    Native {
        name: JsString,
        call: NativeFn,
        construct: Option<NativeConstructFn>,
    },
    Bound {
        target: JsObjectRef,
        this_arg: JsValue,
        args: Vec<JsValue>,
    },
    Host(Rc<HostFunction>),
}

fn call_target(obj: &JsObjectRef) -> Option<CallTarget> {
    let borrowed = obj.borrow();
    Some(match borrowed.callable()? {
        Callable::Script(f) => CallTarget::Script {
            template: f.template.cheap_clone(),
            scope: f.scope.cheap_clone(),
            realm: f.realm.cheap_clone(),
            home: f.home_object.clone(),
        },
        Callable::Native(f) => CallTarget::Native {
            name: f.name.cheap_clone(),
            call: f.call,
            construct: f.construct,
        },
        Callable::Bound(f) => CallTarget::Bound {
            target: f.target.cheap_clone(),
            this_arg: f.this_arg.cheap_clone(),
            args: f.args.clone(),
        },
        Callable::Host(f) => CallTarget::Host(f.cheap_clone()),
    })
}

// ============ INTERPRETER ============

/// The interpreter state
pub struct Interpreter {
    config: RuntimeConfig,
    /// Realm of the running code
    realm: Realm,
    /// String dictionary shared by the lexer and the builtins
    pub string_dict: StringDict,
    call_depth: usize,
    interrupt: Arc<AtomicBool>,
    warnings: Vec<String>,
    /// `Symbol.for` registry
    symbol_registry: FxHashMap<JsString, JsSymbol>,
}

impl Interpreter {
    /// Create an interpreter with one initialized realm
    pub fn new(config: RuntimeConfig) -> Self {
        let mut interp = Self {
            config,
            realm: Realm::new(),
            string_dict: StringDict::with_common_strings(),
            call_depth: 0,
            interrupt: Arc::new(AtomicBool::new(false)),
            warnings: Vec::new(),
            symbol_registry: FxHashMap::default(),
        };
        let realm = interp.realm.cheap_clone();
        interp.init_realm(&realm);
        interp
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Realm of the running code
    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        self.realm.intrinsics()
    }

    pub fn global(&self) -> JsObjectRef {
        self.realm.global().cheap_clone()
    }

    /// A fresh realm with its own global object and standard library
    pub fn create_realm(&mut self) -> Realm {
        let realm = Realm::new();
        self.init_realm(&realm);
        realm
    }

    fn init_realm(&mut self, realm: &Realm) {
        let saved = std::mem::replace(&mut self.realm, realm.cheap_clone());
        builtins::init_standard_library(self);
        self.realm = saved;
    }

    /// Run `f` with `realm` as the current realm
    pub fn with_realm<T>(&mut self, realm: &Realm, f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = std::mem::replace(&mut self.realm, realm.cheap_clone());
        let result = f(self);
        self.realm = saved;
        result
    }

    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    #[inline]
    pub(crate) fn check_interrupt(&self) -> Result<(), JsError> {
        if self.interrupt.load(Ordering::Relaxed) {
            Err(JsError::Interrupted)
        } else {
            Ok(())
        }
    }

    fn enter_call(&mut self) -> Result<(), JsError> {
        self.check_interrupt()?;
        if self.call_depth >= self.config.max_call_depth {
            return Err(JsError::range_error("Maximum call stack size exceeded"));
        }
        self.call_depth += 1;
        Ok(())
    }

    fn exit_call(&mut self) {
        self.call_depth = self.call_depth.saturating_sub(1);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Record a strict diagnostic, or raise it when warnings are errors
    pub(crate) fn diagnostic(&mut self, message: String) -> Result<(), JsError> {
        if self.config.warnings_as_errors {
            return Err(JsError::reference_error_with_message(message));
        }
        log::warn!("{}", message);
        self.warnings.push(message);
        Ok(())
    }

    pub(crate) fn registered_symbol(&mut self, key: JsString) -> JsSymbol {
        self.symbol_registry
            .entry(key.cheap_clone())
            .or_insert_with(|| JsSymbol::new(Some(key)))
            .cheap_clone()
    }

    pub(crate) fn symbol_key_for(&self, symbol: &JsSymbol) -> Option<JsString> {
        self.symbol_registry
            .iter()
            .find(|(_, s)| **s == *symbol)
            .map(|(k, _)| k.cheap_clone())
    }

    // ============ OBJECT CREATION ============

    /// Intern a string in the dictionary, returning a shared JsString.
    #[inline]
    pub fn intern(&mut self, s: &str) -> JsString {
        self.string_dict.get_or_insert(s)
    }

    /// Create a PropertyKey from an interned string.
    #[inline]
    pub fn key(&mut self, s: &str) -> PropertyKey {
        PropertyKey::from_string(self.string_dict.get_or_insert(s))
    }

    /// Create a plain object with the proper prototype
    pub fn create_object(&mut self) -> JsObjectRef {
        let proto = self.intrinsics().object_prototype.cheap_clone();
        JsObject::new(Some(proto), ObjectKind::Ordinary).into_ref()
    }

    /// Create an array with the proper prototype
    pub fn create_array(&mut self, elements: Vec<JsValue>) -> JsObjectRef {
        let proto = self.intrinsics().array_prototype.cheap_clone();
        let mut arr = JsObject::new(
            Some(proto),
            ObjectKind::Array {
                length: 0,
                length_writable: true,
            },
        );
        for (i, value) in elements.into_iter().enumerate() {
            arr.set_property(PropertyKey::Index(i as u32), value);
        }
        arr.into_ref()
    }

    /// Create an array where `None` entries are holes
    pub fn create_sparse_array(&mut self, elements: Vec<Option<JsValue>>) -> JsObjectRef {
        let length = elements.len() as u32;
        let arr = self.create_array(Vec::new());
        {
            let mut a = arr.borrow_mut();
            for (i, value) in elements.into_iter().enumerate() {
                if let Some(value) = value {
                    a.set_property(PropertyKey::Index(i as u32), value);
                }
            }
            a.set_array_length(length);
        }
        arr
    }

    fn function_object(&mut self, callable: Callable, proto: JsObjectRef) -> JsObjectRef {
        JsObject::new(Some(proto), ObjectKind::Function(callable)).into_ref()
    }

    fn define_name_and_length(&mut self, f: &JsObjectRef, name: JsString, length: u32) {
        let length_key = self.key("length");
        let name_key = self.key("name");
        let mut obj = f.borrow_mut();
        obj.define_raw(
            length_key,
            Property::with_attributes(JsValue::from(length), false, false, true),
        );
        obj.define_raw(
            name_key,
            Property::with_attributes(JsValue::String(name), false, false, true),
        );
    }

    /// Create a native function object with `name` and `length`
    pub fn create_native_function(&mut self, name: &str, func: NativeFn, arity: u32) -> JsObjectRef {
        let name = self.intern(name);
        let proto = self.intrinsics().function_prototype.cheap_clone();
        let f = self.function_object(
            Callable::Native(NativeFunction {
                name: name.cheap_clone(),
                call: func,
                construct: None,
                arity,
            }),
            proto,
        );
        self.define_name_and_length(&f, name, arity);
        f
    }

    /// Wrap a host function in a function object of the current realm
    pub fn create_host_function(&mut self, host: HostFunction) -> JsObjectRef {
        let name = self.intern(host.name());
        let arity = host.arity();
        let proto = self.intrinsics().function_prototype.cheap_clone();
        let f = self.function_object(Callable::Host(Rc::new(host)), proto);
        self.define_name_and_length(&f, name, arity);
        f
    }

    /// Create a native constructor wired to `prototype` in both directions
    pub fn create_native_constructor(
        &mut self,
        name: &str,
        call: NativeFn,
        construct: NativeConstructFn,
        arity: u32,
        prototype: &JsObjectRef,
    ) -> JsObjectRef {
        let name = self.intern(name);
        let proto = self.intrinsics().function_prototype.cheap_clone();
        let ctor = self.function_object(
            Callable::Native(NativeFunction {
                name: name.cheap_clone(),
                call,
                construct: Some(construct),
                arity,
            }),
            proto,
        );
        self.define_name_and_length(&ctor, name, arity);
        let prototype_key = self.key("prototype");
        let constructor_key = self.key("constructor");
        ctor.borrow_mut().define_raw(
            prototype_key,
            Property::with_attributes(JsValue::Object(prototype.cheap_clone()), false, false, false),
        );
        prototype
            .borrow_mut()
            .define_raw(constructor_key, Property::hidden(JsValue::Object(ctor.cheap_clone())));
        ctor
    }

    /// Register a native method on a prototype object
    pub fn register_method(&mut self, obj: &JsObjectRef, name: &str, func: NativeFn, arity: u32) {
        let f = self.create_native_function(name, func, arity);
        let key = self.key(name);
        obj.borrow_mut().define_raw(key, Property::hidden(JsValue::Object(f)));
    }

    /// Register a native method under a well-known symbol
    pub fn register_symbol_method(
        &mut self,
        obj: &JsObjectRef,
        symbol: WellKnownSymbol,
        func: NativeFn,
        arity: u32,
    ) {
        let name = format!("[{}]", symbol.description());
        let f = self.create_native_function(&name, func, arity);
        obj.borrow_mut()
            .define_raw(symbol.key(), Property::hidden(JsValue::Object(f)));
    }

    /// Register a native getter (non-enumerable, configurable)
    pub fn register_getter(&mut self, obj: &JsObjectRef, key: PropertyKey, func: NativeFn) {
        let name = format!("get {}", key.function_name());
        let getter = self.create_native_function(&name, func, 0);
        obj.borrow_mut()
            .define_raw(key, Property::accessor(Some(getter), None, false, true));
    }

    /// Install a non-enumerable value on an object
    pub fn define_hidden(&mut self, obj: &JsObjectRef, name: &str, value: JsValue) {
        let key = self.key(name);
        obj.borrow_mut().define_raw(key, Property::hidden(value));
    }

    /// Install a non-enumerable global binding in the current realm
    pub fn define_global(&mut self, name: &str, value: JsValue) {
        let global = self.global();
        self.define_hidden(&global, name, value);
    }

    /// Create an iterator result object { value, done }
    pub fn create_generator_result(&mut self, value: JsValue, done: bool) -> JsValue {
        let value_key = self.key("value");
        let done_key = self.key("done");
        let obj = self.create_object();
        {
            let mut o = obj.borrow_mut();
            o.set_property(value_key, value);
            o.set_property(done_key, JsValue::Boolean(done));
        }
        JsValue::Object(obj)
    }

    /// Create an error object of the given kind in the current realm
    pub fn create_error(&mut self, kind: ErrorKind, message: &str) -> JsObjectRef {
        let proto = self.intrinsics().error_prototype(kind).cheap_clone();
        self.create_error_with_proto(proto, kind.name(), message)
    }

    pub(crate) fn create_error_with_proto(
        &mut self,
        proto: JsObjectRef,
        name: &str,
        message: &str,
    ) -> JsObjectRef {
        let obj = JsObject::new(Some(proto), ObjectKind::Error).into_ref();
        let message_key = self.key("message");
        let stack_key = self.key("stack");
        let stack = if message.is_empty() {
            name.to_string()
        } else {
            format!("{}: {}", name, message)
        };
        let mut o = obj.borrow_mut();
        if !message.is_empty() {
            o.define_raw(message_key, Property::hidden(JsValue::from(message)));
        }
        o.define_raw(stack_key, Property::hidden(JsValue::from(stack)));
        drop(o);
        obj
    }

    // ============ ERRORS ============

    /// The script value a `catch` clause observes for an error
    pub fn error_to_value(&mut self, err: JsError) -> JsValue {
        let (kind, message) = match err {
            JsError::Thrown { value, .. } => return value,
            JsError::TypeError { message, .. } => (ErrorKind::TypeError, message),
            JsError::ReferenceError { message } => (ErrorKind::ReferenceError, message),
            JsError::RangeError { message } => (ErrorKind::RangeError, message),
            JsError::SyntaxError { message, .. } => (ErrorKind::SyntaxError, message),
            JsError::Evaluator { message } => (ErrorKind::Error, message),
            JsError::Internal(message) => (ErrorKind::Error, message),
            JsError::Interrupted => (ErrorKind::Error, "interrupted".to_string()),
        };
        JsValue::Object(self.create_error(kind, &message))
    }

    /// Wrap a thrown script value so it can unwind through Rust frames
    pub fn throw_value(&mut self, value: JsValue) -> JsError {
        let message = self.describe_thrown(&value);
        JsError::thrown(value, message)
    }

    /// `Name: message` for error-like objects, the plain rendering otherwise
    fn describe_thrown(&mut self, value: &JsValue) -> String {
        if let JsValue::Object(obj) = value {
            let name_key = self.key("name");
            let message_key = self.key("message");
            let name = data_value(obj, &name_key);
            let message = data_value(obj, &message_key);
            if name.is_some() || message.is_some() {
                let name = name.map(|v| self.display_value(&v)).unwrap_or_default();
                let message = message.map(|v| self.display_value(&v)).unwrap_or_default();
                return match (name.is_empty(), message.is_empty()) {
                    (false, false) => format!("{}: {}", name, message),
                    (false, true) => name,
                    _ => message,
                };
            }
        }
        self.display_value(value)
    }

    // ============ CALL PROTOCOL ============

    /// Call `callee` with an explicit `this` and arguments
    pub fn call_function(
        &mut self,
        callee: &JsValue,
        this: JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        match callee {
            JsValue::Object(obj) => self.call_object(obj, this, args),
            other => Err(JsError::type_error(format!(
                "{} is not a function",
                self.display_value(other)
            ))),
        }
    }

    /// Like [`call_function`](Self::call_function), naming the callee expression in the
    /// error when it is not callable
    pub(crate) fn call_named(
        &mut self,
        callee: &JsValue,
        this: JsValue,
        args: &[JsValue],
        describe: impl FnOnce() -> String,
    ) -> Result<JsValue, JsError> {
        if !callee.is_callable() {
            return Err(JsError::type_error(format!("{} is not a function", describe())));
        }
        self.call_function(callee, this, args)
    }

    fn call_object(
        &mut self,
        obj: &JsObjectRef,
        this: JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        grow_stack(|| self.call_object_unchecked(obj, this, args))
    }

    fn call_object_unchecked(
        &mut self,
        obj: &JsObjectRef,
        this: JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        let Some(target) = call_target(obj) else {
            return Err(JsError::type_error(format!(
                "{} is not a function",
                self.display_value(&JsValue::Object(obj.cheap_clone()))
            )));
        };
        self.enter_call()?;
        let result = match target {
            CallTarget::Native { call, .. } => call(self, this, args),
            CallTarget::Script {
                template,
                scope,
                realm,
                home,
            } => self.call_script(obj, template, scope, realm, home, this, args),
            CallTarget::Bound {
                target,
                this_arg,
                args: bound_args,
            } => {
                let mut full = bound_args;
                full.extend_from_slice(args);
                self.call_object(&target, this_arg, &full)
            }
            CallTarget::Host(host) => host.invoke(self, this, args),
        };
        self.exit_call();
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn call_script(
        &mut self,
        callee: &JsObjectRef,
        template: Rc<FunctionTemplate>,
        scope: ScopeRef,
        realm: Realm,
        home: Option<JsObjectRef>,
        this: JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        if template.kind.is_class_constructor() {
            return Err(JsError::type_error(format!(
                "Class constructor {} cannot be invoked without 'new'",
                template.name
            )));
        }
        log::trace!("call {}", template.name);
        let this = self.call_this(&template, &realm, this)?;
        let mut frame = Frame::new(template.cheap_clone(), Some(scope), realm.cheap_clone());
        frame.this = this;
        frame.args = args.to_vec();
        frame.callee = JsValue::Object(callee.cheap_clone());
        frame.home_object = home;
        self.with_realm(&realm, |interp| {
            if template.generator {
                interp.start_generator(frame, callee)
            } else {
                interp.run_function(&mut frame)
            }
        })
    }

    /// `this` as seen by the callee: sloppy functions box primitives and replace
    /// null/undefined with the global object
    fn call_this(
        &mut self,
        template: &FunctionTemplate,
        realm: &Realm,
        this: JsValue,
    ) -> Result<JsValue, JsError> {
        Ok(if template.is_arrow() {
            JsValue::Undefined
        } else if template.strict {
            this
        } else {
            match this {
                JsValue::Undefined | JsValue::Null => JsValue::Object(realm.global().cheap_clone()),
                JsValue::Object(_) => this,
                primitive => JsValue::Object(self.to_object(&primitive)?),
            }
        })
    }

    /// Set up a call the bytecode VM can run on its own frame stack
    ///
    /// Only plain script functions with compiled bytecode qualify; everything else
    /// (natives, bound and host functions, generators, class constructors) returns
    /// `None` and goes through [`call_function`](Self::call_function). On success the
    /// call depth has been entered; [`leave_inline_call`](Self::leave_inline_call)
    /// undoes it.
    pub(crate) fn inline_call(
        &mut self,
        callee: &JsValue,
        this: &JsValue,
        args: &[JsValue],
    ) -> Result<Option<(Frame, Rc<BytecodeChunk>)>, JsError> {
        let JsValue::Object(obj) = callee else {
            return Ok(None);
        };
        let Some(CallTarget::Script {
            template,
            scope,
            realm,
            home,
        }) = call_target(obj)
        else {
            return Ok(None);
        };
        if template.generator || template.kind.is_class_constructor() {
            return Ok(None);
        }
        let Some(chunk) = template.chunk.get().cloned() else {
            return Ok(None);
        };
        self.enter_call()?;
        log::trace!("call {}", template.name);
        let this = match self.call_this(&template, &realm, this.cheap_clone()) {
            Ok(this) => this,
            Err(err) => {
                self.exit_call();
                return Err(err);
            }
        };
        let mut frame = Frame::new(template, Some(scope), realm);
        frame.this = this;
        frame.args = args.to_vec();
        frame.callee = callee.cheap_clone();
        frame.home_object = home;
        Ok(Some((frame, chunk)))
    }

    /// Make `realm` current for an inline call, returning the caller's realm
    pub(crate) fn enter_inline_call(&mut self, realm: &Realm) -> Realm {
        std::mem::replace(&mut self.realm, realm.cheap_clone())
    }

    /// Finish an inline call started by [`inline_call`](Self::inline_call)
    pub(crate) fn leave_inline_call(&mut self, caller_realm: Realm) {
        self.realm = caller_realm;
        self.exit_call();
    }

    /// Run prologue and body of a non-generator frame
    pub(crate) fn run_function(&mut self, frame: &mut Frame) -> Result<JsValue, JsError> {
        match frame.template.chunk.get().cloned() {
            Some(chunk) => self.run_chunk(frame, &chunk, 0),
            None => self.walk_function(frame),
        }
    }

    /// Whether `value` can be used with `new`
    pub fn is_constructor(&self, value: &JsValue) -> bool {
        let JsValue::Object(obj) = value else {
            return false;
        };
        let borrowed = obj.borrow();
        match borrowed.callable() {
            Some(Callable::Script(f)) => f.template.is_constructor(),
            Some(Callable::Native(f)) => f.construct.is_some(),
            Some(Callable::Bound(f)) => {
                let target = JsValue::Object(f.target.cheap_clone());
                drop(borrowed);
                self.is_constructor(&target)
            }
            Some(Callable::Host(_)) | None => false,
        }
    }

    /// `new callee(...args)`; `new_target` defaults to the callee
    pub fn construct(
        &mut self,
        callee: &JsValue,
        args: &[JsValue],
        new_target: Option<&JsObjectRef>,
    ) -> Result<JsValue, JsError> {
        grow_stack(|| self.construct_unchecked(callee, args, new_target))
    }

    fn construct_unchecked(
        &mut self,
        callee: &JsValue,
        args: &[JsValue],
        new_target: Option<&JsObjectRef>,
    ) -> Result<JsValue, JsError> {
        let JsValue::Object(obj) = callee else {
            return Err(JsError::type_error(format!(
                "{} is not a constructor",
                self.display_value(callee)
            )));
        };
        let new_target = new_target.unwrap_or(obj).cheap_clone();
        let not_constructor = |interp: &mut Self| {
            let name = obj
                .borrow()
                .callable()
                .map(Callable::debug_name)
                .unwrap_or_default();
            let name = if name.is_empty() {
                interp.display_value(callee)
            } else {
                name
            };
            JsError::type_error(format!("{} is not a constructor", name))
        };
        let Some(target) = call_target(obj) else {
            return Err(not_constructor(self));
        };
        self.enter_call()?;
        let result = match target {
            CallTarget::Script {
                template,
                scope,
                realm,
                home,
            } if template.is_constructor() => {
                self.construct_script(obj, template, scope, realm, home, args, &new_target)
            }
            CallTarget::Native {
                construct: Some(construct),
                ..
            } => construct(self, args, &new_target),
            CallTarget::Bound {
                target,
                args: bound_args,
                ..
            } => {
                let mut full = bound_args;
                full.extend_from_slice(args);
                let new_target = if Rc::ptr_eq(&new_target, obj) {
                    target.cheap_clone()
                } else {
                    new_target
                };
                self.construct(&JsValue::Object(target), &full, Some(&new_target))
            }
            _ => Err(not_constructor(self)),
        };
        self.exit_call();
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn construct_script(
        &mut self,
        callee: &JsObjectRef,
        template: Rc<FunctionTemplate>,
        scope: ScopeRef,
        realm: Realm,
        home: Option<JsObjectRef>,
        args: &[JsValue],
        new_target: &JsObjectRef,
    ) -> Result<JsValue, JsError> {
        log::trace!("construct {}", template.name);
        let derived = template.kind == FunctionKind::DerivedConstructor;
        let this = if derived {
            JsValue::Undefined
        } else {
            let proto = self.prototype_from_constructor(new_target, |i| &i.object_prototype)?;
            JsValue::Object(JsObject::new(Some(proto), ObjectKind::Ordinary).into_ref())
        };
        let mut frame = Frame::new(template.cheap_clone(), Some(scope), realm.cheap_clone());
        frame.this = this.cheap_clone();
        frame.args = args.to_vec();
        frame.callee = JsValue::Object(callee.cheap_clone());
        frame.new_target = JsValue::Object(new_target.cheap_clone());
        frame.home_object = home;
        let result = self.with_realm(&realm, |interp| interp.run_function(&mut frame))?;
        if result.is_object() {
            return Ok(result);
        }
        if !derived {
            return Ok(this);
        }
        if !result.is_undefined() {
            return Err(JsError::type_error(
                "Derived constructors may only return object or undefined",
            ));
        }
        let slot = template.this_slot.unwrap_or(0);
        let binding = Binding {
            name: JsString::from("this"),
            hops: 0,
            slot,
        };
        frame.function_scope.get(&binding).map_err(|_| {
            JsError::reference_error_with_message(
                "Must call super constructor in derived class before accessing 'this' or returning from derived constructor",
            )
        })
    }

    /// `prototype` of a constructor, or the named intrinsic of its realm when that is
    /// not an object
    pub fn prototype_from_constructor(
        &mut self,
        constructor: &JsObjectRef,
        fallback: fn(&Intrinsics) -> &JsObjectRef,
    ) -> Result<JsObjectRef, JsError> {
        let key = self.key("prototype");
        let proto = self.get_with_receiver(constructor, &key, &JsValue::Object(constructor.cheap_clone()))?;
        Ok(match proto {
            JsValue::Object(p) => p,
            _ => fallback(self.intrinsics()).cheap_clone(),
        })
    }

    /// `super(...args)` from a derived constructor
    pub(crate) fn super_call(
        &mut self,
        active_function: &JsValue,
        new_target: &JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        let parent = active_function
            .as_object()
            .and_then(|f| f.borrow().prototype.clone());
        let parent = match parent {
            Some(p) if self.is_constructor(&JsValue::Object(p.cheap_clone())) => p,
            _ => return Err(JsError::type_error("Super constructor is not a constructor")),
        };
        let Some(new_target) = new_target.as_object() else {
            return Err(JsError::reference_error_with_message(
                "'super' keyword unexpected here",
            ));
        };
        self.construct(&JsValue::Object(parent), args, Some(new_target))
    }

    /// Bind `this` after `super()` returned
    pub(crate) fn bind_this(
        &mut self,
        scope: &ScopeRef,
        binding: &Binding,
        value: JsValue,
    ) -> Result<(), JsError> {
        if scope.is_initialized(binding)? {
            return Err(JsError::reference_error_with_message(
                "Super constructor may only be called once",
            ));
        }
        scope.set(binding, value, WriteMode::Init)
    }

    // ============ PROPERTY ACCESS ============

    fn primitive_prototype(&self, value: &JsValue) -> Option<JsObjectRef> {
        let intrinsics = self.intrinsics();
        Some(
            match value {
                JsValue::String(_) => &intrinsics.string_prototype,
                JsValue::Number(_) => &intrinsics.number_prototype,
                JsValue::Boolean(_) => &intrinsics.boolean_prototype,
                JsValue::Symbol(_) => &intrinsics.symbol_prototype,
                _ => return None,
            }
            .cheap_clone(),
        )
    }

    /// Own property of a primitive string (`length` and indices)
    fn string_own(s: &JsString, key: &PropertyKey) -> Option<JsValue> {
        match key {
            PropertyKey::String(name) if name.as_str() == "length" => {
                Some(JsValue::Number(s.utf16_len() as f64))
            }
            PropertyKey::Index(i) => {
                let units = s.to_utf16();
                units
                    .get(*i as usize)
                    .map(|unit| JsValue::String(JsString::from_utf16(&[*unit])))
            }
            _ => None,
        }
    }

    /// `[[Get]]` on any value; primitives read through their prototype
    pub fn get(&mut self, target: &JsValue, key: &PropertyKey) -> Result<JsValue, JsError> {
        match target {
            JsValue::Object(obj) => self.get_with_receiver(obj, key, target),
            JsValue::Undefined | JsValue::Null => Err(JsError::type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                self.display_value(target),
                key
            ))),
            JsValue::String(s) => match Self::string_own(s, key) {
                Some(value) => Ok(value),
                None => self.get_from_prototype(target, key),
            },
            _ => self.get_from_prototype(target, key),
        }
    }

    fn get_from_prototype(&mut self, target: &JsValue, key: &PropertyKey) -> Result<JsValue, JsError> {
        match self.primitive_prototype(target) {
            Some(proto) => self.get_with_receiver(&proto, key, target),
            None => Ok(JsValue::Undefined),
        }
    }

    /// Convenience wrapper for string keys
    pub fn get_named(&mut self, target: &JsValue, name: &str) -> Result<JsValue, JsError> {
        let key = self.key(name);
        self.get(target, &key)
    }

    pub fn get_with_receiver(
        &mut self,
        obj: &JsObjectRef,
        key: &PropertyKey,
        receiver: &JsValue,
    ) -> Result<JsValue, JsError> {
        match find_property(obj, key) {
            Some((prop, _)) => self.property_value(prop, receiver),
            None => Ok(JsValue::Undefined),
        }
    }

    fn property_value(&mut self, prop: Property, receiver: &JsValue) -> Result<JsValue, JsError> {
        match prop.kind {
            PropertyKind::Data { value, .. } => Ok(value),
            PropertyKind::Accessor {
                getter: Some(getter),
                ..
            } => self.call_object(&getter, receiver.cheap_clone(), &[]),
            PropertyKind::Accessor { getter: None, .. } => Ok(JsValue::Undefined),
        }
    }

    /// Property read from script code: records a strict diagnostic when a named
    /// property exists nowhere on the chain
    pub(crate) fn get_property(&mut self, target: &JsValue, key: &PropertyKey) -> Result<JsValue, JsError> {
        if !self.config.strict_diagnostics || !matches!(key, PropertyKey::String(_)) {
            return self.get(target, key);
        }
        let holder = match target {
            JsValue::Object(obj) => Some(obj.cheap_clone()),
            JsValue::Undefined | JsValue::Null => return self.get(target, key),
            JsValue::String(s) if Self::string_own(s, key).is_some() => return self.get(target, key),
            other => self.primitive_prototype(other),
        };
        match holder.and_then(|h| find_property(&h, key)) {
            Some((prop, _)) => self.property_value(prop, target),
            None => {
                self.diagnostic(format!("Reference to undefined property \"{}\"", key))?;
                Ok(JsValue::Undefined)
            }
        }
    }

    /// Method lookup: `undefined`/`null` become `None`, non-callables a TypeError
    pub fn get_method(&mut self, target: &JsValue, key: &PropertyKey) -> Result<Option<JsValue>, JsError> {
        let method = self.get(target, key)?;
        if method.is_null_or_undefined() {
            return Ok(None);
        }
        if !method.is_callable() {
            return Err(JsError::type_error(format!("{} is not a function", key)));
        }
        Ok(Some(method))
    }

    /// `[[Set]]` on any value. Failures throw in strict code and are ignored otherwise.
    pub fn set(
        &mut self,
        target: &JsValue,
        key: PropertyKey,
        value: JsValue,
        strict: bool,
    ) -> Result<(), JsError> {
        match target {
            JsValue::Object(obj) => {
                if !self.set_with_receiver(obj, key.cheap_clone(), value, target)? && strict {
                    return Err(self.set_failure(obj, &key));
                }
                Ok(())
            }
            JsValue::Undefined | JsValue::Null => Err(JsError::type_error(format!(
                "Cannot set properties of {} (setting '{}')",
                self.display_value(target),
                key
            ))),
            primitive => {
                if strict {
                    return Err(JsError::type_error(format!(
                        "Cannot create property '{}' on {} '{}'",
                        key,
                        primitive.type_of(),
                        self.display_value(primitive)
                    )));
                }
                Ok(())
            }
        }
    }

    fn set_failure(&self, obj: &JsObjectRef, key: &PropertyKey) -> JsError {
        match find_property(obj, key) {
            Some((prop, _)) if prop.is_accessor() => JsError::type_error(format!(
                "Cannot set property {} of #<Object> which has only a getter",
                key
            )),
            Some(_) => JsError::type_error(format!(
                "Cannot assign to read only property '{}' of object",
                key
            )),
            None => JsError::type_error(format!(
                "Cannot add property {}, object is not extensible",
                key
            )),
        }
    }

    /// OrdinarySet. Returns false when the assignment is not allowed.
    pub fn set_with_receiver(
        &mut self,
        obj: &JsObjectRef,
        key: PropertyKey,
        value: JsValue,
        receiver: &JsValue,
    ) -> Result<bool, JsError> {
        if let Some((prop, _)) = find_property(obj, &key) {
            match prop.kind {
                PropertyKind::Accessor {
                    setter: Some(setter),
                    ..
                } => {
                    self.call_object(&setter, receiver.cheap_clone(), &[value])?;
                    return Ok(true);
                }
                PropertyKind::Accessor { setter: None, .. } => return Ok(false),
                PropertyKind::Data { writable: false, .. } => return Ok(false),
                PropertyKind::Data { writable: true, .. } => {}
            }
        }
        let JsValue::Object(receiver) = receiver else {
            return Ok(false);
        };
        let existing = receiver.borrow().get_own_property(&key);
        match existing {
            Some(own) => {
                if own.is_accessor() || !own.writable() {
                    return Ok(false);
                }
                let is_length = receiver.borrow().is_array()
                    && matches!(&key, PropertyKey::String(s) if s.as_str() == "length");
                if is_length {
                    let length = self.array_length_from(&value)?;
                    return Ok(receiver.borrow_mut().set_array_length(length));
                }
                receiver.borrow_mut().set_property(key, value);
                Ok(true)
            }
            None => {
                let mut target = receiver.borrow_mut();
                if !target.extensible {
                    return Ok(false);
                }
                if let (
                    ObjectKind::Array {
                        length,
                        length_writable: false,
                    },
                    Some(index),
                ) = (&target.kind, key.as_index())
                {
                    if index >= *length {
                        return Ok(false);
                    }
                }
                target.set_property(key, value);
                Ok(true)
            }
        }
    }

    /// Validate a value assigned to an array's `length`
    pub(crate) fn array_length_from(&mut self, value: &JsValue) -> Result<u32, JsError> {
        let number = self.to_number(value)?;
        let length = crate::value::to_uint32(number);
        if f64::from(length) != number {
            return Err(JsError::range_error("Invalid array length"));
        }
        Ok(length)
    }

    /// `delete target[key]`
    pub fn delete_property(
        &mut self,
        target: &JsValue,
        key: &PropertyKey,
        strict: bool,
    ) -> Result<bool, JsError> {
        match target {
            JsValue::Object(obj) => {
                let deleted = obj.borrow_mut().delete(key);
                if !deleted && strict {
                    return Err(JsError::type_error(format!(
                        "Cannot delete property '{}' of {}",
                        key,
                        self.display_value(target)
                    )));
                }
                Ok(deleted)
            }
            JsValue::Undefined | JsValue::Null => Err(JsError::type_error(format!(
                "Cannot convert undefined or null to object (deleting '{}')",
                key
            ))),
            JsValue::String(s) => {
                let deleted = Self::string_own(s, key).is_none();
                if !deleted && strict {
                    return Err(JsError::type_error(format!(
                        "Cannot delete property '{}' of [object String]",
                        key
                    )));
                }
                Ok(deleted)
            }
            _ => Ok(true),
        }
    }

    /// `key in obj` along the prototype chain
    pub fn has_property(&self, obj: &JsObjectRef, key: &PropertyKey) -> bool {
        find_property(obj, key).is_some()
    }

    /// Define an enumerable, writable, configurable data property (CreateDataProperty)
    pub fn create_data_property(&mut self, obj: &JsObjectRef, key: PropertyKey, value: JsValue) -> bool {
        obj.borrow_mut().define_own_property(
            key,
            crate::value::PropertyDescriptor {
                value: Some(value),
                writable: Some(true),
                enumerable: Some(true),
                configurable: Some(true),
                ..Default::default()
            },
        )
    }

    /// Copy own enumerable properties of `source` onto `target`, minus `excluded`
    pub fn copy_data_properties(
        &mut self,
        target: &JsObjectRef,
        source: &JsValue,
        excluded: &[PropertyKey],
    ) -> Result<(), JsError> {
        let source_obj = match source {
            JsValue::Undefined | JsValue::Null => return Ok(()),
            JsValue::Object(obj) => obj.cheap_clone(),
            primitive => self.to_object(primitive)?,
        };
        let keys = source_obj.borrow().own_keys();
        for key in keys {
            if excluded.contains(&key) {
                continue;
            }
            let enumerable = source_obj
                .borrow()
                .get_own_property(&key)
                .is_some_and(|p| p.enumerable);
            if !enumerable {
                continue;
            }
            let value = self.get_with_receiver(&source_obj, &key, &JsValue::Object(source_obj.cheap_clone()))?;
            self.create_data_property(target, key, value);
        }
        Ok(())
    }

    /// Give an anonymous function the name derived from a property key
    pub(crate) fn name_function(&mut self, value: &JsValue, key: &PropertyKey, prefix: &str) {
        let Some(f) = value.as_object() else {
            return;
        };
        let anonymous = match f.borrow().callable() {
            Some(Callable::Script(s)) => s.template.name.is_empty(),
            _ => false,
        };
        if !anonymous {
            return;
        }
        let name = key.function_name();
        let name = if prefix.is_empty() {
            name
        } else {
            JsString::from(format!("{} {}", prefix, name))
        };
        let name_key = self.key("name");
        let own_name_is_string = matches!(
            f.borrow().get_own_property(&name_key).map(|p| p.value()),
            Some(JsValue::String(ref s)) if !s.is_empty()
        );
        if own_name_is_string {
            return;
        }
        f.borrow_mut().define_raw(
            name_key,
            Property::with_attributes(JsValue::String(name), false, false, true),
        );
    }

    // ============ SUPER ============

    fn super_base(&self, home: Option<&JsObjectRef>) -> Result<Option<JsObjectRef>, JsError> {
        let home = home.ok_or_else(|| {
            JsError::syntax_error("'super' keyword unexpected here", 0, 0)
        })?;
        Ok(home.borrow().prototype.clone())
    }

    pub(crate) fn super_get(
        &mut self,
        home: Option<&JsObjectRef>,
        key: &PropertyKey,
        this: &JsValue,
    ) -> Result<JsValue, JsError> {
        match self.super_base(home)? {
            Some(proto) => self.get_with_receiver(&proto, key, this),
            None => Ok(JsValue::Undefined),
        }
    }

    pub(crate) fn super_set(
        &mut self,
        home: Option<&JsObjectRef>,
        key: PropertyKey,
        value: JsValue,
        this: &JsValue,
        strict: bool,
    ) -> Result<(), JsError> {
        let Some(proto) = self.super_base(home)? else {
            return Err(JsError::type_error(format!(
                "Cannot set property '{}' of null prototype",
                key
            )));
        };
        if !self.set_with_receiver(&proto, key.cheap_clone(), value, this)? && strict {
            return Err(JsError::type_error(format!(
                "Cannot assign to read only property '{}' of object",
                key
            )));
        }
        Ok(())
    }

    // ============ GLOBAL BINDINGS ============

    fn global_lexical(&self, name: &str) -> Option<Result<JsValue, JsError>> {
        let lexicals = self.realm.0.lexicals.borrow();
        let entry = lexicals.get(name)?;
        Some(match &entry.value {
            Some(value) => Ok(value.cheap_clone()),
            None => Err(JsError::reference_error_with_message(format!(
                "Cannot access '{}' before initialization",
                name
            ))),
        })
    }

    pub(crate) fn read_global(&mut self, name: &JsString) -> Result<JsValue, JsError> {
        if let Some(result) = self.global_lexical(name.as_str()) {
            return result;
        }
        let global = self.global();
        let key = PropertyKey::from_string(name.cheap_clone());
        match find_property(&global, &key) {
            Some((prop, _)) => self.property_value(prop, &JsValue::Object(global)),
            None => Err(JsError::reference_error(name)),
        }
    }

    pub(crate) fn typeof_global(&mut self, name: &JsString) -> Result<JsValue, JsError> {
        let global = self.global();
        let key = PropertyKey::from_string(name.cheap_clone());
        if self.global_lexical(name.as_str()).is_none() && !self.has_property(&global, &key) {
            return Ok(JsValue::from("undefined"));
        }
        let value = self.read_global(name)?;
        Ok(JsValue::from(value.type_of()))
    }

    pub(crate) fn write_global(&mut self, name: &JsString, value: JsValue, strict: bool) -> Result<(), JsError> {
        {
            let mut lexicals = self.realm.0.lexicals.borrow_mut();
            if let Some(entry) = lexicals.get_mut(name.as_str()) {
                return match (&mut entry.value, entry.constant) {
                    (None, _) => Err(JsError::reference_error_with_message(format!(
                        "Cannot access '{}' before initialization",
                        name
                    ))),
                    (Some(_), true) => Err(JsError::type_error("Assignment to constant variable.")),
                    (Some(slot), false) => {
                        *slot = value;
                        Ok(())
                    }
                };
            }
        }
        let global = self.global();
        let key = PropertyKey::from_string(name.cheap_clone());
        if self.has_property(&global, &key) {
            return self.set(&JsValue::Object(global), key, value, strict);
        }
        if strict {
            return Err(JsError::reference_error(name));
        }
        if self.config.strict_diagnostics {
            self.diagnostic(format!("Assignment to undeclared variable {}", name))?;
        }
        global.borrow_mut().set_property(key, value);
        Ok(())
    }

    pub(crate) fn init_global_lexical(&mut self, name: &JsString, value: JsValue) {
        let mut lexicals = self.realm.0.lexicals.borrow_mut();
        match lexicals.get_mut(name.as_str()) {
            Some(entry) => entry.value = Some(value),
            None => {
                lexicals.insert(
                    name.cheap_clone(),
                    GlobalLexical {
                        value: Some(value),
                        constant: false,
                    },
                );
            }
        }
    }

    pub(crate) fn delete_global(&mut self, name: &JsString) -> Result<bool, JsError> {
        if self.realm.has_lexical(name.as_str()) {
            return Ok(false);
        }
        let global = self.global();
        let key = PropertyKey::from_string(name.cheap_clone());
        Ok(global.borrow_mut().delete(&key))
    }

    /// GlobalDeclarationInstantiation for one script
    pub(crate) fn declare_globals(
        &mut self,
        vars: &[JsString],
        lexicals: &[(JsString, bool)],
    ) -> Result<(), JsError> {
        let global = self.global();
        let redeclared =
            |name: &JsString| JsError::syntax_error(format!("Identifier '{}' has already been declared", name), 0, 0);
        for (name, _) in lexicals {
            let key = PropertyKey::from_string(name.cheap_clone());
            let var_exists = global
                .borrow()
                .get_own_property(&key)
                .is_some_and(|p| !p.configurable);
            if self.realm.has_lexical(name.as_str()) || var_exists {
                return Err(redeclared(name));
            }
        }
        for name in vars {
            if self.realm.has_lexical(name.as_str()) {
                return Err(redeclared(name));
            }
        }
        for name in vars {
            let key = PropertyKey::from_string(name.cheap_clone());
            let exists = global.borrow().has_own_property(&key);
            if !exists {
                global.borrow_mut().define_raw(
                    key,
                    Property::with_attributes(JsValue::Undefined, true, true, false),
                );
            }
        }
        let mut table = self.realm.0.lexicals.borrow_mut();
        for (name, constant) in lexicals {
            table.insert(
                name.cheap_clone(),
                GlobalLexical {
                    value: None,
                    constant: *constant,
                },
            );
        }
        Ok(())
    }

    // ============ SCRIPTS ============

    /// Run a lowered script template in `realm`
    pub fn run_script(&mut self, template: &Rc<FunctionTemplate>, realm: &Realm) -> Result<JsValue, JsError> {
        let mut frame = Frame::new(template.cheap_clone(), None, realm.cheap_clone());
        frame.this = JsValue::Object(realm.global().cheap_clone());
        self.with_realm(realm, |interp| interp.run_function(&mut frame))
    }

    /// Parse and lower `source` into a script template
    pub fn compile_source(
        &mut self,
        source: &str,
        source_name: &str,
        line: u32,
    ) -> Result<Rc<FunctionTemplate>, JsError> {
        let options = self.config.parse_options();
        let program = crate::parser::Parser::starting_at_line(
            source,
            &mut self.string_dict,
            options,
            line,
        )
        .parse_program()
        .map_err(|e| e.with_source_name(source_name))?;
        let template = crate::ir::lower_program(&program, source)
            .map_err(|e| e.with_source_name(source_name))?;
        self.prepare_template(&template);
        Ok(template)
    }

    /// Translate templates to bytecode when the compiled tier is selected
    pub(crate) fn prepare_template(&self, template: &Rc<FunctionTemplate>) {
        if self.config.tier == OptimizationTier::Compiled {
            crate::compiler::compile_tree(template);
        }
    }

    // ============ CLOSURES AND CLASSES ============

    /// Instantiate a function template over `scope`
    pub(crate) fn create_closure(
        &mut self,
        template: &Rc<FunctionTemplate>,
        scope: ScopeRef,
        home_object: Option<JsObjectRef>,
    ) -> JsObjectRef {
        let intrinsics = self.intrinsics();
        let proto = if template.generator {
            intrinsics.generator_function_prototype.cheap_clone()
        } else {
            intrinsics.function_prototype.cheap_clone()
        };
        let generator_prototype = intrinsics.generator_prototype.cheap_clone();
        let f = self.function_object(
            Callable::Script(ScriptFunction {
                template: template.cheap_clone(),
                scope,
                realm: self.realm.cheap_clone(),
                home_object,
            }),
            proto,
        );
        self.define_name_and_length(&f, template.name.cheap_clone(), template.length);
        let prototype_key = self.key("prototype");
        if template.generator {
            let prototype = JsObject::new(Some(generator_prototype), ObjectKind::Ordinary).into_ref();
            f.borrow_mut().define_raw(
                prototype_key,
                Property::with_attributes(JsValue::Object(prototype), true, false, false),
            );
        } else if template.kind == FunctionKind::Normal {
            let prototype = self.create_object();
            self.define_hidden(&prototype, "constructor", JsValue::Object(f.cheap_clone()));
            f.borrow_mut().define_raw(
                prototype_key,
                Property::with_attributes(JsValue::Object(prototype), true, false, false),
            );
        }
        f
    }

    /// Define a method, getter or setter closure on `target`
    pub(crate) fn define_method(
        &mut self,
        target: &JsObjectRef,
        key: PropertyKey,
        template: &Rc<FunctionTemplate>,
        kind: MethodKind,
        scope: &ScopeRef,
        enumerable: bool,
    ) {
        let f = self.create_closure(template, scope.cheap_clone(), Some(target.cheap_clone()));
        let value = JsValue::Object(f.cheap_clone());
        let prefix = match kind {
            MethodKind::Method => "",
            MethodKind::Getter => "get",
            MethodKind::Setter => "set",
        };
        self.name_function(&value, &key, prefix);
        let mut obj = target.borrow_mut();
        match kind {
            MethodKind::Method => {
                obj.define_raw(key, Property::with_attributes(value, true, enumerable, true));
            }
            MethodKind::Getter | MethodKind::Setter => {
                let (mut getter, mut setter) = match obj.get_own_property(&key).map(|p| p.kind) {
                    Some(PropertyKind::Accessor { getter, setter }) => (getter, setter),
                    _ => (None, None),
                };
                if kind == MethodKind::Getter {
                    getter = Some(f);
                } else {
                    setter = Some(f);
                }
                obj.define_raw(key, Property::accessor(getter, setter, enumerable, true));
            }
        }
    }

    /// ClassDefinitionEvaluation. `keys` holds the evaluated key of every member.
    pub(crate) fn define_class(
        &mut self,
        def: &ClassDef,
        heritage: Option<JsValue>,
        keys: Vec<PropertyKey>,
        scope: &ScopeRef,
    ) -> Result<JsObjectRef, JsError> {
        let intrinsics = self.intrinsics();
        let (proto_parent, constructor_parent) = match heritage {
            None => (
                Some(intrinsics.object_prototype.cheap_clone()),
                intrinsics.function_prototype.cheap_clone(),
            ),
            Some(JsValue::Null) => (None, intrinsics.function_prototype.cheap_clone()),
            Some(parent) => {
                if !self.is_constructor(&parent) {
                    return Err(JsError::type_error(format!(
                        "Class extends value {} is not a constructor or null",
                        self.display_value(&parent)
                    )));
                }
                let proto = self.get_named(&parent, "prototype")?;
                let proto_parent = match proto {
                    JsValue::Object(p) => Some(p),
                    JsValue::Null => None,
                    other => {
                        return Err(JsError::type_error(format!(
                            "Class extends value does not have valid prototype property {}",
                            self.display_value(&other)
                        )));
                    }
                };
                let Some(parent) = parent.as_object().cloned() else {
                    return Err(JsError::internal_error("class heritage is not an object"));
                };
                (proto_parent, parent)
            }
        };
        let prototype = JsObject::new(proto_parent, ObjectKind::Ordinary).into_ref();
        let constructor =
            self.create_closure(&def.constructor, scope.cheap_clone(), Some(prototype.cheap_clone()));
        constructor.borrow_mut().prototype = Some(constructor_parent);
        let prototype_key = self.key("prototype");
        constructor.borrow_mut().define_raw(
            prototype_key,
            Property::with_attributes(JsValue::Object(prototype.cheap_clone()), false, false, false),
        );
        self.define_hidden(&prototype, "constructor", JsValue::Object(constructor.cheap_clone()));

        for (member, key) in def.members.iter().zip(keys) {
            let target = if member.is_static {
                &constructor
            } else {
                &prototype
            };
            self.define_method(target, key, &member.function, member.kind, scope, false);
        }
        if let Some(binding) = &def.binding {
            scope.set(binding, JsValue::Object(constructor.cheap_clone()), WriteMode::Init)?;
        }
        Ok(constructor)
    }

    /// `arguments` for the running frame: an unmapped array-like
    pub(crate) fn create_arguments_object(&mut self, frame: &Frame) -> JsValue {
        let proto = self.intrinsics().object_prototype.cheap_clone();
        let mut obj = JsObject::new(Some(proto), ObjectKind::Arguments);
        for (i, value) in frame.args.iter().enumerate() {
            obj.set_property(PropertyKey::Index(i as u32), value.cheap_clone());
        }
        let length_key = self.key("length");
        obj.define_raw(length_key, Property::hidden(JsValue::from(frame.args.len() as u32)));
        let values_key = self.key("values");
        let values = data_value(&self.intrinsics().array_prototype, &values_key);
        if let Some(values) = values {
            obj.define_raw(WellKnownSymbol::Iterator.key(), Property::hidden(values));
        }
        if !frame.strict() {
            let callee_key = self.key("callee");
            obj.define_raw(callee_key, Property::hidden(frame.callee.cheap_clone()));
        }
        JsValue::Object(obj.into_ref())
    }

    /// Frozen call-site object of a tagged template, created once per realm
    pub(crate) fn template_object(&mut self, site: &TemplateSite) -> JsObjectRef {
        if let Some(cached) = self.realm.0.template_sites.borrow().get(&site.id) {
            return cached.cheap_clone();
        }
        let cooked = site
            .cooked
            .iter()
            .map(|s| s.as_ref().map_or(JsValue::Undefined, |s| JsValue::String(s.cheap_clone())))
            .collect();
        let raw = site.raw.iter().map(|s| JsValue::String(s.cheap_clone())).collect();
        let site_object = self.create_array(cooked);
        let raw_object = self.create_array(raw);
        raw_object.borrow_mut().freeze();
        let raw_key = self.key("raw");
        site_object.borrow_mut().define_raw(
            raw_key,
            Property::with_attributes(JsValue::Object(raw_object), false, false, false),
        );
        site_object.borrow_mut().freeze();
        self.realm
            .0
            .template_sites
            .borrow_mut()
            .insert(site.id, site_object.cheap_clone());
        site_object
    }

    /// Object for a regular expression literal
    pub(crate) fn regexp_literal(&mut self, pattern: &JsString, flags: &JsString) -> Result<JsValue, JsError> {
        builtins::regexp::create_regexp(self, pattern.as_str(), flags.as_str()).map(JsValue::Object)
    }

    // ============ ITERATION ============

    /// GetIterator: an iterator record over `value`
    pub fn get_iterator(&mut self, value: &JsValue) -> Result<JsValue, JsError> {
        let method = self.get(value, &WellKnownSymbol::Iterator.key())?;
        if !method.is_callable() {
            return Err(JsError::type_error(format!(
                "{} is not iterable",
                self.display_value(value)
            )));
        }
        let iterator = self.call_function(&method, value.cheap_clone(), &[])?;
        if !iterator.is_object() {
            return Err(JsError::type_error(
                "Result of the Symbol.iterator method is not an object",
            ));
        }
        let next = self.get_named(&iterator, "next")?;
        Ok(JsValue::Object(
            JsObject::new(
                None,
                ObjectKind::IteratorRecord {
                    iterator,
                    next,
                    done: false,
                },
            )
            .into_ref(),
        ))
    }

    /// Snapshot of the enumerable string keys `for-in` visits
    pub fn for_in_iterator(&mut self, value: &JsValue) -> Result<JsValue, JsError> {
        let (object, keys) = match value {
            JsValue::Undefined | JsValue::Null => (JsValue::Undefined, Vec::new()),
            other => {
                let obj = self.to_object(other)?;
                let keys = enumerable_keys(&obj);
                (JsValue::Object(obj), keys)
            }
        };
        Ok(JsValue::Object(
            JsObject::new(
                None,
                ObjectKind::ForInIterator {
                    object,
                    keys,
                    position: 0,
                },
            )
            .into_ref(),
        ))
    }

    fn record_parts(record: &JsValue) -> Result<(JsObjectRef, JsValue, JsValue, bool), JsError> {
        let obj = record
            .as_object()
            .ok_or_else(|| JsError::internal_error("iterator record expected"))?;
        let borrowed = obj.borrow();
        match &borrowed.kind {
            ObjectKind::IteratorRecord {
                iterator,
                next,
                done,
            } => Ok((obj.cheap_clone(), iterator.cheap_clone(), next.cheap_clone(), *done)),
            _ => Err(JsError::internal_error("iterator record expected")),
        }
    }

    fn mark_done(record: &JsObjectRef) {
        if let ObjectKind::IteratorRecord { done, .. } = &mut record.borrow_mut().kind {
            *done = true;
        }
    }

    /// Next value of an iterator record, `undefined` once it is exhausted
    pub fn iterator_step(&mut self, record: &JsValue) -> Result<JsValue, JsError> {
        if let Some(key) = self.for_in_step(record) {
            return Ok(key);
        }
        let (obj, iterator, next, done) = match Self::record_parts(record) {
            Ok(parts) => parts,
            Err(_) => return Ok(JsValue::Undefined),
        };
        if done {
            return Ok(JsValue::Undefined);
        }
        let step = (|| {
            let result = self.call_function(&next, iterator, &[])?;
            if !result.is_object() {
                return Err(JsError::type_error(format!(
                    "Iterator result {} is not an object",
                    self.display_value(&result)
                )));
            }
            let finished = self.get_named(&result, "done")?.to_boolean();
            if finished {
                return Ok(None);
            }
            self.get_named(&result, "value").map(Some)
        })();
        match step {
            Ok(Some(value)) => Ok(value),
            Ok(None) => {
                Self::mark_done(&obj);
                Ok(JsValue::Undefined)
            }
            Err(e) => {
                Self::mark_done(&obj);
                Err(e)
            }
        }
    }

    fn for_in_step(&mut self, record: &JsValue) -> Option<JsValue> {
        let obj = record.as_object()?;
        loop {
            let (object, key) = {
                let mut borrowed = obj.borrow_mut();
                let ObjectKind::ForInIterator {
                    object,
                    keys,
                    position,
                } = &mut borrowed.kind
                else {
                    return None;
                };
                let Some(key) = keys.get(*position).cloned() else {
                    *position = usize::MAX;
                    return Some(JsValue::Undefined);
                };
                *position += 1;
                (object.cheap_clone(), key)
            };
            let present = object
                .as_object()
                .is_some_and(|o| find_property(o, &key).is_some());
            if present {
                return Some(key.to_value());
            }
        }
    }

    /// Whether the last step exhausted the iterator record
    pub fn iterator_done(&self, record: &JsValue) -> bool {
        let Some(obj) = record.as_object() else {
            return true;
        };
        match &obj.borrow().kind {
            ObjectKind::IteratorRecord { done, .. } => *done,
            ObjectKind::ForInIterator { position, .. } => *position == usize::MAX,
            _ => true,
        }
    }

    /// Remaining values as an array
    pub fn iterator_rest(&mut self, record: &JsValue) -> Result<JsValue, JsError> {
        let mut values = Vec::new();
        loop {
            let value = self.iterator_step(record)?;
            if self.iterator_done(record) {
                break;
            }
            values.push(value);
        }
        Ok(JsValue::Object(self.create_array(values)))
    }

    /// IteratorClose unless the record is already exhausted
    pub fn iterator_close(&mut self, record: &JsValue) -> Result<(), JsError> {
        let Ok((obj, iterator, _, done)) = Self::record_parts(record) else {
            return Ok(());
        };
        if done {
            return Ok(());
        }
        Self::mark_done(&obj);
        let return_key = self.key("return");
        let Some(method) = self.get_method(&iterator, &return_key)? else {
            return Ok(());
        };
        let result = self.call_function(&method, iterator, &[])?;
        if !result.is_object() {
            return Err(JsError::type_error(format!(
                "Iterator result {} is not an object",
                self.display_value(&result)
            )));
        }
        Ok(())
    }

    /// Collect every value of an iterable (spread, `Array.from`)
    pub fn iterate_to_vec(&mut self, iterable: &JsValue) -> Result<Vec<JsValue>, JsError> {
        let record = self.get_iterator(iterable)?;
        let mut values = Vec::new();
        loop {
            let value = self.iterator_step(&record)?;
            if self.iterator_done(&record) {
                return Ok(values);
            }
            values.push(value);
        }
    }

    /// Copy of the own enumerable properties of `source` without `excluded`
    pub(crate) fn object_rest(&mut self, source: &JsValue, excluded: &[PropertyKey]) -> Result<JsValue, JsError> {
        let target = self.create_object();
        self.copy_data_properties(&target, source, excluded)?;
        Ok(JsValue::Object(target))
    }

    pub(crate) fn require_object_coercible(&self, value: JsValue) -> Result<JsValue, JsError> {
        if value.is_null_or_undefined() {
            return Err(JsError::type_error(format!(
                "Cannot destructure '{}' as it is {}.",
                self.display_value(&value),
                if value.is_undefined() { "undefined" } else { "null" }
            )));
        }
        Ok(value)
    }
}

/// Data value of an own or inherited property, without running getters
pub(crate) fn data_value(obj: &JsObjectRef, key: &PropertyKey) -> Option<JsValue> {
    match find_property(obj, key)?.0.kind {
        PropertyKind::Data { value, .. } => Some(value),
        PropertyKind::Accessor { .. } => None,
    }
}

/// Enumerable string keys along the prototype chain, shadowed keys removed
fn enumerable_keys(obj: &JsObjectRef) -> Vec<PropertyKey> {
    let mut seen = crate::prelude::FxHashSet::default();
    let mut keys = Vec::new();
    let mut current = Some(obj.cheap_clone());
    let mut depth = 0;
    while let Some(o) = current {
        let borrowed = o.borrow();
        for key in borrowed.own_keys() {
            if key.is_symbol() || !seen.insert(key.cheap_clone()) {
                continue;
            }
            if borrowed.get_own_property(&key).is_some_and(|p| p.enumerable) {
                keys.push(key);
            }
        }
        current = borrowed.prototype.clone();
        depth += 1;
        if depth > crate::object::MAX_PROTOTYPE_DEPTH {
            break;
        }
    }
    keys
}

/// Create a bound function object (`Function.prototype.bind`)
pub(crate) fn create_bound_function(
    target: JsObjectRef,
    this_arg: JsValue,
    args: Vec<JsValue>,
) -> JsObjectRef {
    let proto = target.borrow().prototype.clone();
    JsObject::new(
        proto,
        ObjectKind::Function(Callable::Bound(BoundFunction {
            target,
            this_arg,
            args,
        })),
    )
    .into_ref()
}
