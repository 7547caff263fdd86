//! Bytecode Virtual Machine
//!
//! Executes chunks produced by [`crate::compiler`] against the same [`Frame`] the
//! tree walker uses: registers are the frame's temps, scopes are the frame's scope
//! chain, and every operation defers to the shared runtime helpers, so both tiers
//! observe identical semantics.

use rustc_hash::FxHashMap;
use std::rc::Rc;

use crate::compiler::{BytecodeChunk, Constant, ConstantIndex, Op, Register};
use crate::error::JsError;
use crate::ir::{Binding, ClassDef, FunctionTemplate, TemplateSite};
use crate::object::set_prototype_of;
use crate::value::{CheapClone, JsString, JsValue, PropertyKey};

use super::scope::Scope;
use super::{Frame, Interpreter, Realm};

/// Exception handler pushed by `PushHandler`
#[derive(Clone)]
struct TryHandler {
    target: usize,
    exception: Register,
    finally: bool,
    /// Scope to restore before entering the handler
    scope: super::scope::ScopeRef,
}

/// Outcome of a single instruction
enum OpResult {
    Continue,
    Return(JsValue),
    /// Script-to-script call the driver runs on its own frame stack
    Call(Box<InlineCall>),
}

/// A callee frame ready to run, and the caller register that receives its result
struct InlineCall {
    dst: Register,
    frame: Frame,
    chunk: Rc<BytecodeChunk>,
}

/// Why [`Vm::run`] stopped
enum Step {
    Return(JsValue),
    Call(Box<InlineCall>),
    Throw(JsError),
}

/// Execution state of one chunk activation
struct Vm {
    chunk: Rc<BytecodeChunk>,
    ip: usize,
    try_stack: Vec<TryHandler>,
    /// Errors parked by finally handlers, resumed by `Rethrow`
    parked: FxHashMap<Register, JsError>,
}

/// An inlined callee suspended above its caller
struct Activation {
    vm: Vm,
    frame: Frame,
    dst: Register,
    caller_realm: Realm,
}

impl Interpreter {
    /// Run `chunk` in `frame` from instruction `start` until `Return` or `EndBlock`
    ///
    /// Calls between compiled script functions push an [`Activation`] instead of
    /// recursing, so script recursion depth costs heap rather than native stack.
    pub(crate) fn run_chunk(
        &mut self,
        frame: &mut Frame,
        chunk: &Rc<BytecodeChunk>,
        start: usize,
    ) -> Result<JsValue, JsError> {
        let mut base = Vm::new(Rc::clone(chunk), start);
        let mut calls: Vec<Activation> = Vec::new();
        loop {
            let step = match calls.last_mut() {
                Some(top) => top.vm.run(self, &mut top.frame),
                None => base.run(self, frame),
            };
            match step {
                Step::Call(call) => {
                    let InlineCall { dst, frame: callee, chunk } = *call;
                    let caller_realm = self.enter_inline_call(&callee.realm);
                    calls.push(Activation {
                        vm: Vm::new(chunk, 0),
                        frame: callee,
                        dst,
                        caller_realm,
                    });
                }
                Step::Return(value) => {
                    let Some(done) = calls.pop() else {
                        return Ok(value);
                    };
                    self.leave_inline_call(done.caller_realm);
                    match calls.last_mut() {
                        Some(top) => set_reg(&mut top.frame, done.dst, value),
                        None => set_reg(frame, done.dst, value),
                    }
                }
                Step::Throw(mut err) => loop {
                    let Some(done) = calls.pop() else {
                        return Err(err);
                    };
                    self.leave_inline_call(done.caller_realm);
                    let caught = match calls.last_mut() {
                        Some(top) => top.vm.catch(self, &mut top.frame, err),
                        None => base.catch(self, frame, err),
                    };
                    match caught {
                        Ok(()) => break,
                        Err(rethrown) => err = rethrown,
                    }
                },
            }
        }
    }
}

impl Vm {
    fn new(chunk: Rc<BytecodeChunk>, ip: usize) -> Self {
        Self {
            chunk,
            ip,
            try_stack: Vec::new(),
            parked: FxHashMap::default(),
        }
    }

    fn run(&mut self, interp: &mut Interpreter, frame: &mut Frame) -> Step {
        loop {
            let Some(op) = self.fetch() else {
                return Step::Return(JsValue::Undefined);
            };
            if matches!(op, Op::EndBlock) {
                return Step::Return(JsValue::Undefined);
            }
            match self.execute_op(interp, frame, op) {
                Ok(OpResult::Continue) => {}
                Ok(OpResult::Return(value)) => return Step::Return(value),
                Ok(OpResult::Call(call)) => return Step::Call(call),
                Err(err) => {
                    if let Err(err) = self.catch(interp, frame, err) {
                        return Step::Throw(err);
                    }
                }
            }
        }
    }

    /// Route `err` to the innermost handler, or hand it back when there is none
    fn catch(
        &mut self,
        interp: &mut Interpreter,
        frame: &mut Frame,
        err: JsError,
    ) -> Result<(), JsError> {
        if !err.is_catchable() {
            return Err(err);
        }
        let Some(handler) = self.try_stack.pop() else {
            return Err(err);
        };
        frame.scope = handler.scope;
        if handler.finally {
            self.parked.insert(handler.exception, err);
        } else {
            let value = interp.error_to_value(err);
            set_reg(frame, handler.exception, value);
        }
        self.ip = handler.target;
        Ok(())
    }

    fn fetch(&mut self) -> Option<Op> {
        let op = self.chunk.get(self.ip).cloned();
        self.ip += 1;
        op
    }

    fn jump(&mut self, target: u32) {
        self.ip = target as usize;
    }

    // ============ CONSTANTS ============

    fn constant(&self, idx: ConstantIndex) -> Result<&Constant, JsError> {
        self.chunk
            .get_constant(idx)
            .ok_or_else(|| JsError::internal_error("Invalid constant index"))
    }

    fn string(&self, idx: ConstantIndex) -> Result<JsString, JsError> {
        match self.constant(idx)? {
            Constant::String(s) => Ok(s.cheap_clone()),
            _ => Err(JsError::internal_error("Expected string constant")),
        }
    }

    fn key(&self, idx: ConstantIndex) -> Result<PropertyKey, JsError> {
        match self.constant(idx)? {
            Constant::Key(k) => Ok(k.cheap_clone()),
            _ => Err(JsError::internal_error("Expected key constant")),
        }
    }

    fn binding(&self, idx: ConstantIndex) -> Result<&Binding, JsError> {
        match self.constant(idx)? {
            Constant::Binding(b) => Ok(b),
            _ => Err(JsError::internal_error("Expected binding constant")),
        }
    }

    fn template(&self, idx: ConstantIndex) -> Result<&Rc<FunctionTemplate>, JsError> {
        match self.constant(idx)? {
            Constant::Template(t) => Ok(t),
            _ => Err(JsError::internal_error("Expected function constant")),
        }
    }

    fn class(&self, idx: ConstantIndex) -> Result<&Rc<ClassDef>, JsError> {
        match self.constant(idx)? {
            Constant::Class(c) => Ok(c),
            _ => Err(JsError::internal_error("Expected class constant")),
        }
    }

    fn site(&self, idx: ConstantIndex) -> Result<&Rc<TemplateSite>, JsError> {
        match self.constant(idx)? {
            Constant::Site(s) => Ok(s),
            _ => Err(JsError::internal_error("Expected template site constant")),
        }
    }

    /// Callee description for "is not a function" errors
    fn describe_callee(
        &self,
        interp: &mut Interpreter,
        frame: &Frame,
        name: ConstantIndex,
        key: Option<Register>,
    ) -> Result<String, JsError> {
        let name = self.string(name)?;
        Ok(match key {
            Some(r) => {
                let key = interp.to_property_key(&get_reg(frame, r))?;
                format!("{}.{}", name, key)
            }
            None => name.to_string(),
        })
    }

    /// Execute a single instruction
    fn execute_op(
        &mut self,
        interp: &mut Interpreter,
        frame: &mut Frame,
        op: Op,
    ) -> Result<OpResult, JsError> {
        match op {
            // ═══════════════════════════════════════════════════════════════════════════
            // Constants & Register Operations
            // ═══════════════════════════════════════════════════════════════════════════
            Op::LoadConst { dst, idx } => {
                let value = match self.constant(idx)? {
                    Constant::String(s) => JsValue::String(s.cheap_clone()),
                    Constant::Number(n) => JsValue::Number(*n),
                    Constant::Key(k) => k.to_value(),
                    _ => return Err(JsError::internal_error("Constant is not a value")),
                };
                set_reg(frame, dst, value);
            }
            Op::LoadUndefined { dst } => set_reg(frame, dst, JsValue::Undefined),
            Op::LoadNull { dst } => set_reg(frame, dst, JsValue::Null),
            Op::LoadBool { dst, value } => set_reg(frame, dst, JsValue::Boolean(value)),
            Op::LoadInt { dst, value } => set_reg(frame, dst, JsValue::Number(f64::from(value))),
            Op::Move { dst, src } => {
                let value = get_reg(frame, src);
                set_reg(frame, dst, value);
            }

            // ═══════════════════════════════════════════════════════════════════════════
            // Variables
            // ═══════════════════════════════════════════════════════════════════════════
            Op::GetLocal { dst, binding } => {
                let value = frame.scope.get(self.binding(binding)?)?;
                set_reg(frame, dst, value);
            }
            Op::SetLocal { src, binding, mode } => {
                let value = get_reg(frame, src);
                frame.scope.set(self.binding(binding)?, value, mode)?;
            }
            Op::GetGlobal { dst, name } => {
                let value = interp.read_global(&self.string(name)?)?;
                set_reg(frame, dst, value);
            }
            Op::SetGlobal { src, name } => {
                let value = get_reg(frame, src);
                interp.write_global(&self.string(name)?, value, frame.strict())?;
            }
            Op::InitGlobalLexical { src, name } => {
                let value = get_reg(frame, src);
                interp.init_global_lexical(&self.string(name)?, value);
            }
            Op::TypeofGlobal { dst, name } => {
                let value = interp.typeof_global(&self.string(name)?)?;
                set_reg(frame, dst, value);
            }
            Op::DeleteGlobal { dst, name } => {
                let deleted = interp.delete_global(&self.string(name)?)?;
                set_reg(frame, dst, JsValue::Boolean(deleted));
            }
            Op::DeclareGlobals { idx } => match self.constant(idx)? {
                Constant::Globals { vars, lexicals } => interp.declare_globals(vars, lexicals)?,
                _ => return Err(JsError::internal_error("Expected global declarations")),
            },

            // ═══════════════════════════════════════════════════════════════════════════
            // Frame Values
            // ═══════════════════════════════════════════════════════════════════════════
            Op::LoadThis { dst } => {
                let value = frame.this.cheap_clone();
                set_reg(frame, dst, value);
            }
            Op::LoadNewTarget { dst } => {
                let value = frame.new_target.cheap_clone();
                set_reg(frame, dst, value);
            }
            Op::LoadArg { dst, index } => {
                let value = frame.args.get(index as usize).cloned().unwrap_or_default();
                set_reg(frame, dst, value);
            }
            Op::RestArgs { dst, from } => {
                let rest = frame
                    .args
                    .get(from as usize..)
                    .map(<[JsValue]>::to_vec)
                    .unwrap_or_default();
                let array = interp.create_array(rest);
                set_reg(frame, dst, JsValue::Object(array));
            }
            Op::ArgumentsObject { dst } => {
                let value = interp.create_arguments_object(frame);
                set_reg(frame, dst, value);
            }
            Op::LoadCallee { dst } => {
                let value = frame.callee.cheap_clone();
                set_reg(frame, dst, value);
            }

            // ═══════════════════════════════════════════════════════════════════════════
            // Functions, Classes & Literals
            // ═══════════════════════════════════════════════════════════════════════════
            Op::Closure { dst, template } => {
                let template = self.template(template)?;
                let home = if template.is_arrow() {
                    frame.home_object.clone()
                } else {
                    None
                };
                let f = interp.create_closure(template, frame.scope.cheap_clone(), home);
                set_reg(frame, dst, JsValue::Object(f));
            }
            Op::DefineClass {
                dst,
                class,
                heritage,
                keys,
            } => {
                let def = self.class(class)?;
                let heritage = heritage.map(|r| get_reg(frame, r));
                let mut member_keys = Vec::with_capacity(def.members.len());
                for i in 0..def.members.len() {
                    let value = get_reg(frame, keys + i as Register);
                    member_keys.push(interp.to_property_key(&value)?);
                }
                let scope = frame.scope.cheap_clone();
                let constructor = interp.define_class(def, heritage, member_keys, &scope)?;
                set_reg(frame, dst, JsValue::Object(constructor));
            }
            Op::NewArray { dst } => {
                let array = interp.create_array(Vec::new());
                set_reg(frame, dst, JsValue::Object(array));
            }
            Op::ArrayPush { array, value } => {
                let value = get_reg(frame, value);
                push_element(&get_reg(frame, array), Some(value))?;
            }
            Op::ArrayHole { array } => push_element(&get_reg(frame, array), None)?,
            Op::ArraySpread { array, iterable } => {
                let target = get_reg(frame, array);
                for value in interp.iterate_to_vec(&get_reg(frame, iterable))? {
                    push_element(&target, Some(value))?;
                }
            }
            Op::NewObject { dst } => {
                let obj = interp.create_object();
                set_reg(frame, dst, JsValue::Object(obj));
            }
            Op::DefineField { object, key, value } => {
                let obj = object_reg(frame, object)?;
                let key = interp.to_property_key(&get_reg(frame, key))?;
                interp.create_data_property(&obj, key, get_reg(frame, value));
            }
            Op::DefineMethod {
                object,
                key,
                template,
                kind,
            } => {
                let obj = object_reg(frame, object)?;
                let key = interp.to_property_key(&get_reg(frame, key))?;
                let scope = frame.scope.cheap_clone();
                interp.define_method(&obj, key, self.template(template)?, kind, &scope, true);
            }
            Op::ObjectSpread { object, source } => {
                let obj = object_reg(frame, object)?;
                interp.copy_data_properties(&obj, &get_reg(frame, source), &[])?;
            }
            Op::SetProto { object, value } => {
                let obj = object_reg(frame, object)?;
                match get_reg(frame, value) {
                    JsValue::Object(proto) => {
                        set_prototype_of(&obj, Some(proto));
                    }
                    JsValue::Null => {
                        set_prototype_of(&obj, None);
                    }
                    _ => {}
                }
            }
            Op::NameFunction { value, key } => {
                let key = interp.to_property_key(&get_reg(frame, key))?;
                interp.name_function(&get_reg(frame, value), &key, "");
            }
            Op::ToStringAppend { dst, value } => {
                let head = interp.to_js_string(&get_reg(frame, dst))?;
                let tail = interp.to_js_string(&get_reg(frame, value))?;
                let joined = format!("{}{}", head, tail);
                set_reg(frame, dst, JsValue::from(joined));
            }
            Op::GetTemplateObject { dst, site } => {
                let obj = interp.template_object(self.site(site)?);
                set_reg(frame, dst, JsValue::Object(obj));
            }
            Op::RegExp {
                dst,
                pattern,
                flags,
            } => {
                let value = interp.regexp_literal(&self.string(pattern)?, &self.string(flags)?)?;
                set_reg(frame, dst, value);
            }

            // ═══════════════════════════════════════════════════════════════════════════
            // Operators
            // ═══════════════════════════════════════════════════════════════════════════
            Op::Unary { dst, op, src } => {
                let value = interp.unary_op(op, &get_reg(frame, src))?;
                set_reg(frame, dst, value);
            }
            Op::Typeof { dst, src } => {
                let value = JsValue::from(get_reg(frame, src).type_of());
                set_reg(frame, dst, value);
            }
            Op::Binary {
                dst,
                op,
                left,
                right,
            } => {
                let value = interp.binary_op(op, &get_reg(frame, left), &get_reg(frame, right))?;
                set_reg(frame, dst, value);
            }
            Op::Update {
                old,
                new,
                src,
                increment,
            } => {
                let (before, after) = interp.update_value(&get_reg(frame, src), increment)?;
                set_reg(frame, old, before);
                set_reg(frame, new, after);
            }

            // ═══════════════════════════════════════════════════════════════════════════
            // Control Flow
            // ═══════════════════════════════════════════════════════════════════════════
            Op::Jump { target } => self.jump(target),
            Op::JumpIfTrue { cond, target } => {
                if get_reg(frame, cond).to_boolean() {
                    self.jump(target);
                }
            }
            Op::JumpIfFalse { cond, target } => {
                if !get_reg(frame, cond).to_boolean() {
                    self.jump(target);
                }
            }
            Op::JumpIfNotNullish { cond, target } => {
                if !get_reg(frame, cond).is_null_or_undefined() {
                    self.jump(target);
                }
            }
            Op::JumpIfInt { src, value, target } => {
                if matches!(get_reg(frame, src), JsValue::Number(n) if n == f64::from(value)) {
                    self.jump(target);
                }
            }
            Op::LoopHint => interp.check_interrupt()?,

            // ═══════════════════════════════════════════════════════════════════════════
            // Property Access
            // ═══════════════════════════════════════════════════════════════════════════
            Op::GetProp { dst, object, key } => {
                let key = interp.to_property_key(&get_reg(frame, key))?;
                let value = interp.get_property(&get_reg(frame, object), &key)?;
                set_reg(frame, dst, value);
            }
            Op::GetNamed { dst, object, key } => {
                let value = interp.get_property(&get_reg(frame, object), &self.key(key)?)?;
                set_reg(frame, dst, value);
            }
            Op::SetProp { object, key, value } => {
                let key = interp.to_property_key(&get_reg(frame, key))?;
                interp.set(&get_reg(frame, object), key, get_reg(frame, value), frame.strict())?;
            }
            Op::SetNamed { object, key, value } => {
                interp.set(
                    &get_reg(frame, object),
                    self.key(key)?,
                    get_reg(frame, value),
                    frame.strict(),
                )?;
            }
            Op::DeleteProp { dst, object, key } => {
                let key = interp.to_property_key(&get_reg(frame, key))?;
                let deleted = interp.delete_property(&get_reg(frame, object), &key, frame.strict())?;
                set_reg(frame, dst, JsValue::Boolean(deleted));
            }
            Op::ToPropertyKey { dst, src } => {
                let key = interp.to_property_key(&get_reg(frame, src))?;
                set_reg(frame, dst, key.to_value());
            }
            Op::SuperGet { dst, key, this } => {
                let key = interp.to_property_key(&get_reg(frame, key))?;
                let value = interp.super_get(frame.home_object.as_ref(), &key, &get_reg(frame, this))?;
                set_reg(frame, dst, value);
            }
            Op::SuperSet { key, this, value } => {
                let key = interp.to_property_key(&get_reg(frame, key))?;
                let home = frame.home_object.clone();
                interp.super_set(
                    home.as_ref(),
                    key,
                    get_reg(frame, value),
                    &get_reg(frame, this),
                    frame.strict(),
                )?;
            }

            // ═══════════════════════════════════════════════════════════════════════════
            // Calls
            // ═══════════════════════════════════════════════════════════════════════════
            Op::Call {
                dst,
                callee,
                this,
                args,
                argc,
                name,
                key,
            } => {
                let values = reg_range(frame, args, argc);
                let function = get_reg(frame, callee);
                if !function.is_callable() {
                    let describe = self.describe_callee(interp, frame, name, key)?;
                    return Err(JsError::type_error(format!("{} is not a function", describe)));
                }
                let this = get_reg(frame, this);
                return self.call(interp, frame, dst, &function, this, &values);
            }
            Op::CallSpread {
                dst,
                callee,
                this,
                args,
                name,
                key,
            } => {
                let values = array_values(&get_reg(frame, args))?;
                let function = get_reg(frame, callee);
                if !function.is_callable() {
                    let describe = self.describe_callee(interp, frame, name, key)?;
                    return Err(JsError::type_error(format!("{} is not a function", describe)));
                }
                let this = get_reg(frame, this);
                return self.call(interp, frame, dst, &function, this, &values);
            }
            Op::New {
                dst,
                callee,
                args,
                argc,
                name,
            } => {
                let values = reg_range(frame, args, argc);
                let result = self.construct(interp, &get_reg(frame, callee), &values, name)?;
                set_reg(frame, dst, result);
            }
            Op::NewSpread {
                dst,
                callee,
                args,
                name,
            } => {
                let values = array_values(&get_reg(frame, args))?;
                let result = self.construct(interp, &get_reg(frame, callee), &values, name)?;
                set_reg(frame, dst, result);
            }
            Op::SuperCall {
                dst,
                args,
                new_target,
                active,
                binding,
            } => {
                let values = array_values(&get_reg(frame, args))?;
                let this = interp.super_call(&get_reg(frame, active), &get_reg(frame, new_target), &values)?;
                let scope = frame.scope.cheap_clone();
                interp.bind_this(&scope, self.binding(binding)?, this.cheap_clone())?;
                set_reg(frame, dst, this);
            }

            // ═══════════════════════════════════════════════════════════════════════════
            // Iteration
            // ═══════════════════════════════════════════════════════════════════════════
            Op::GetIterator { dst, src } => {
                let record = interp.get_iterator(&get_reg(frame, src))?;
                set_reg(frame, dst, record);
            }
            Op::ForInIterator { dst, src } => {
                let record = interp.for_in_iterator(&get_reg(frame, src))?;
                set_reg(frame, dst, record);
            }
            Op::IteratorStep { dst, record } => {
                let value = interp.iterator_step(&get_reg(frame, record))?;
                set_reg(frame, dst, value);
            }
            Op::IteratorRest { dst, record } => {
                let value = interp.iterator_rest(&get_reg(frame, record))?;
                set_reg(frame, dst, value);
            }
            Op::IteratorDone { dst, record } => {
                let done = interp.iterator_done(&get_reg(frame, record));
                set_reg(frame, dst, JsValue::Boolean(done));
            }
            Op::IteratorClose { record } => interp.iterator_close(&get_reg(frame, record))?,
            Op::IteratorCloseQuiet { record } => {
                let _ = interp.iterator_close(&get_reg(frame, record));
            }
            Op::ObjectRest {
                dst,
                source,
                excluded,
            } => {
                let mut keys = Vec::new();
                for value in array_values(&get_reg(frame, excluded))? {
                    keys.push(interp.to_property_key(&value)?);
                }
                let rest = interp.object_rest(&get_reg(frame, source), &keys)?;
                set_reg(frame, dst, rest);
            }
            Op::RequireObjectCoercible { dst, src } => {
                let value = interp.require_object_coercible(get_reg(frame, src))?;
                set_reg(frame, dst, value);
            }

            // ═══════════════════════════════════════════════════════════════════════════
            // Scopes
            // ═══════════════════════════════════════════════════════════════════════════
            Op::PushScope { slots } => {
                frame.scope = Scope::new(Some(frame.scope.cheap_clone()), slots);
            }
            Op::PopScope => {
                let parent = frame
                    .scope
                    .parent()
                    .cloned()
                    .ok_or_else(|| JsError::internal_error("PopScope at the function scope"))?;
                frame.scope = parent;
            }
            Op::CopyScope => frame.scope = frame.scope.copy(),
            Op::Uninitialize { slots } => match self.constant(slots)? {
                Constant::Slots(slots) => frame.scope.uninitialize(slots),
                _ => return Err(JsError::internal_error("Expected slot list")),
            },

            // ═══════════════════════════════════════════════════════════════════════════
            // Exceptions & Completion
            // ═══════════════════════════════════════════════════════════════════════════
            Op::PushHandler {
                target,
                exception,
                finally,
            } => self.try_stack.push(TryHandler {
                target: target as usize,
                exception,
                finally,
                scope: frame.scope.cheap_clone(),
            }),
            Op::PopHandler => {
                self.try_stack.pop();
            }
            Op::Throw { src } => return Err(interp.throw_value(get_reg(frame, src))),
            Op::Rethrow { src } => {
                return Err(match self.parked.remove(&src) {
                    Some(err) => err,
                    None => interp.throw_value(get_reg(frame, src)),
                });
            }
            Op::Return { src } => return Ok(OpResult::Return(get_reg(frame, src))),
            Op::EndBlock => return Ok(OpResult::Return(JsValue::Undefined)),
        }
        Ok(OpResult::Continue)
    }

    /// Call `function`, inlining script callees onto the driver's frame stack
    fn call(
        &self,
        interp: &mut Interpreter,
        frame: &mut Frame,
        dst: Register,
        function: &JsValue,
        this: JsValue,
        args: &[JsValue],
    ) -> Result<OpResult, JsError> {
        if let Some((callee, chunk)) = interp.inline_call(function, &this, args)? {
            return Ok(OpResult::Call(Box::new(InlineCall {
                dst,
                frame: callee,
                chunk,
            })));
        }
        let result = interp.call_function(function, this, args)?;
        set_reg(frame, dst, result);
        Ok(OpResult::Continue)
    }

    fn construct(
        &self,
        interp: &mut Interpreter,
        callee: &JsValue,
        args: &[JsValue],
        name: ConstantIndex,
    ) -> Result<JsValue, JsError> {
        if !interp.is_constructor(callee) {
            return Err(JsError::type_error(format!(
                "{} is not a constructor",
                self.string(name)?
            )));
        }
        interp.construct(callee, args, None)
    }
}

// ============ REGISTERS ============

fn get_reg(frame: &Frame, r: Register) -> JsValue {
    frame.temp(u32::from(r))
}

fn set_reg(frame: &mut Frame, r: Register, value: JsValue) {
    frame.set_temp(u32::from(r), value);
}

fn reg_range(frame: &Frame, start: Register, count: u16) -> Vec<JsValue> {
    (0..count).map(|i| get_reg(frame, start + i)).collect()
}

fn object_reg(frame: &Frame, r: Register) -> Result<crate::object::JsObjectRef, JsError> {
    match get_reg(frame, r) {
        JsValue::Object(obj) => Ok(obj),
        _ => Err(JsError::internal_error("Expected object in register")),
    }
}

/// Append to an array under construction; `None` leaves a hole
fn push_element(array: &JsValue, value: Option<JsValue>) -> Result<(), JsError> {
    let JsValue::Object(obj) = array else {
        return Err(JsError::internal_error("Expected array in register"));
    };
    let mut obj = obj.borrow_mut();
    let length = obj
        .array_length()
        .ok_or_else(|| JsError::internal_error("Expected array in register"))?;
    match value {
        Some(value) => obj.set_property(PropertyKey::from(length), value),
        None => {
            obj.set_array_length(length + 1);
        }
    }
    Ok(())
}

fn array_values(array: &JsValue) -> Result<Vec<JsValue>, JsError> {
    match array {
        JsValue::Object(obj) => obj
            .borrow()
            .array_elements()
            .ok_or_else(|| JsError::internal_error("Expected array in register")),
        _ => Err(JsError::internal_error("Expected array in register")),
    }
}
