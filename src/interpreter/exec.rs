//! Interpreted tier: walks the lowered IR directly

use crate::ast::LogicalOp;
use crate::error::JsError;
use crate::ir::{
    Arg, ArrayItem, Body, Callee, Expr, ForEachStmt, Key, LoopStmt, ObjectItem, Stmt, SwitchCase,
    Target, WriteMode, Binding,
};
use crate::object::set_prototype_of;
use crate::prelude::grow_stack;
use crate::value::{CheapClone, JsString, JsValue, PropertyKey};

use super::scope::Scope;
use super::{Completion, Frame, Interpreter};

/// A resolved assignment target
enum Place {
    Local(Binding, WriteMode),
    Global(JsString),
    GlobalLexicalInit(JsString),
    Member(JsValue, PropertyKey),
    SuperMember(PropertyKey, JsValue),
    Temp(u32),
}

impl Interpreter {
    /// Run prologue and statement body of a frame
    pub(crate) fn walk_function(&mut self, frame: &mut Frame) -> Result<JsValue, JsError> {
        let template = frame.template.cheap_clone();
        self.exec_block(frame, &template.prologue)?;
        let Body::Statements(body) = &template.body else {
            return Err(JsError::internal_error("state machine body outside a generator"));
        };
        match self.exec_block(frame, body)? {
            Completion::Return(value) => Ok(value),
            _ => Ok(JsValue::Undefined),
        }
    }

    pub(crate) fn exec_block(&mut self, frame: &mut Frame, stmts: &[Stmt]) -> Result<Completion, JsError> {
        for stmt in stmts {
            match self.exec_stmt(frame, stmt)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_stmt(&mut self, frame: &mut Frame, stmt: &Stmt) -> Result<Completion, JsError> {
        grow_stack(|| self.exec_stmt_unchecked(frame, stmt))
    }

    fn exec_stmt_unchecked(&mut self, frame: &mut Frame, stmt: &Stmt) -> Result<Completion, JsError> {
        match stmt {
            Stmt::Expr(expr) => {
                self.eval(frame, expr)?;
                Ok(Completion::Normal)
            }
            Stmt::Scoped { slots, body } => {
                let saved = frame.scope.cheap_clone();
                frame.scope = Scope::new(Some(saved.cheap_clone()), *slots);
                let result = self.exec_block(frame, body);
                frame.scope = saved;
                result
            }
            Stmt::Uninitialize(slots) => {
                frame.scope.uninitialize(slots);
                Ok(Completion::Normal)
            }
            Stmt::DeclareGlobals { vars, lexicals } => {
                self.declare_globals(vars, lexicals)?;
                Ok(Completion::Normal)
            }
            Stmt::If {
                test,
                then,
                otherwise,
            } => {
                if self.eval(frame, test)?.to_boolean() {
                    self.exec_block(frame, then)
                } else {
                    self.exec_block(frame, otherwise)
                }
            }
            Stmt::Loop(l) => self.exec_loop(frame, l),
            Stmt::ForIn(f) => self.exec_for_each(frame, f, false),
            Stmt::ForOf(f) => self.exec_for_each(frame, f, true),
            Stmt::Switch {
                label,
                discriminant,
                cases,
            } => {
                let value = self.eval(frame, discriminant)?;
                match self.exec_switch(frame, &value, cases)? {
                    Completion::Break(l) if l == *label => Ok(Completion::Normal),
                    other => Ok(other),
                }
            }
            Stmt::Labeled { label, body } => match self.exec_block(frame, body)? {
                Completion::Break(l) if l == *label => Ok(Completion::Normal),
                other => Ok(other),
            },
            Stmt::Try {
                block,
                catch,
                finally,
            } => {
                let mut result = self.exec_block(frame, block);
                if let Some(handler) = catch {
                    if let Err(err) = result {
                        result = if err.is_catchable() {
                            let value = self.error_to_value(err);
                            frame.set_temp(handler.temp, value);
                            self.exec_block(frame, &handler.body)
                        } else {
                            Err(err)
                        };
                    }
                }
                let Some(finally) = finally else {
                    return result;
                };
                if matches!(&result, Err(e) if !e.is_catchable()) {
                    return result;
                }
                match self.exec_block(frame, finally)? {
                    Completion::Normal => result,
                    abrupt => Ok(abrupt),
                }
            }
            Stmt::Return(expr) => {
                let value = match expr {
                    Some(e) => self.eval(frame, e)?,
                    None => JsValue::Undefined,
                };
                Ok(Completion::Return(value))
            }
            Stmt::Break(label) => Ok(Completion::Break(*label)),
            Stmt::Continue(label) => Ok(Completion::Continue(*label)),
            Stmt::Throw(expr) => {
                let value = self.eval(frame, expr)?;
                Err(self.throw_value(value))
            }
        }
    }

    fn exec_loop(&mut self, frame: &mut Frame, l: &LoopStmt) -> Result<Completion, JsError> {
        if l.test_first {
            if let Some(test) = &l.test {
                if !self.eval(frame, test)?.to_boolean() {
                    return Ok(Completion::Normal);
                }
            }
        }
        loop {
            self.check_interrupt()?;
            match self.exec_block(frame, &l.body)? {
                Completion::Normal => {}
                Completion::Continue(label) if label == l.label => {}
                Completion::Break(label) if label == l.label => return Ok(Completion::Normal),
                abrupt => return Ok(abrupt),
            }
            if l.fresh_scope {
                frame.scope = frame.scope.copy();
            }
            if let Some(update) = &l.update {
                self.eval(frame, update)?;
            }
            if let Some(test) = &l.test {
                if !self.eval(frame, test)?.to_boolean() {
                    return Ok(Completion::Normal);
                }
            }
        }
    }

    fn exec_for_each(&mut self, frame: &mut Frame, f: &ForEachStmt, of: bool) -> Result<Completion, JsError> {
        let source = self.eval(frame, &f.source)?;
        let record = if of {
            self.get_iterator(&source)?
        } else {
            self.for_in_iterator(&source)?
        };
        loop {
            self.check_interrupt()?;
            let value = self.iterator_step(&record)?;
            if self.iterator_done(&record) {
                return Ok(Completion::Normal);
            }
            frame.set_temp(f.value_temp, value);
            let saved = frame.scope.cheap_clone();
            if let Some(slots) = f.iteration_slots {
                frame.scope = Scope::new(Some(saved.cheap_clone()), slots);
            }
            let mut result = self.exec_block(frame, &f.bind);
            if matches!(result, Ok(Completion::Normal)) {
                result = self.exec_block(frame, &f.body);
            }
            frame.scope = saved;
            match result {
                Ok(Completion::Normal) => {}
                Ok(Completion::Continue(label)) if label == f.label => {}
                Ok(Completion::Break(label)) if label == f.label => {
                    if of {
                        self.iterator_close(&record)?;
                    }
                    return Ok(Completion::Normal);
                }
                Ok(abrupt) => {
                    if of {
                        self.iterator_close(&record)?;
                    }
                    return Ok(abrupt);
                }
                Err(err) => {
                    if of && err.is_catchable() {
                        let _ = self.iterator_close(&record);
                    }
                    return Err(err);
                }
            }
        }
    }

    fn exec_switch(&mut self, frame: &mut Frame, value: &JsValue, cases: &[SwitchCase]) -> Result<Completion, JsError> {
        let mut start = None;
        for (i, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                if self.eval(frame, test)?.strict_equals(value) {
                    start = Some(i);
                    break;
                }
            }
        }
        let start = match start.or_else(|| cases.iter().position(|c| c.test.is_none())) {
            Some(i) => i,
            None => return Ok(Completion::Normal),
        };
        for case in cases.iter().skip(start) {
            match self.exec_block(frame, &case.body)? {
                Completion::Normal => {}
                abrupt => return Ok(abrupt),
            }
        }
        Ok(Completion::Normal)
    }

    // ============ EXPRESSIONS ============

    fn eval_key(&mut self, frame: &mut Frame, key: &Key) -> Result<PropertyKey, JsError> {
        match key {
            Key::Static(k) => Ok(k.cheap_clone()),
            Key::Computed(expr) => {
                let value = self.eval(frame, expr)?;
                self.to_property_key(&value)
            }
        }
    }

    fn eval_args(&mut self, frame: &mut Frame, args: &[Arg]) -> Result<Vec<JsValue>, JsError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Arg::Value(e) => values.push(self.eval(frame, e)?),
                Arg::Spread(e) => {
                    let iterable = self.eval(frame, e)?;
                    values.extend(self.iterate_to_vec(&iterable)?);
                }
            }
        }
        Ok(values)
    }

    pub(crate) fn eval(&mut self, frame: &mut Frame, expr: &Expr) -> Result<JsValue, JsError> {
        grow_stack(|| self.eval_unchecked(frame, expr))
    }

    fn eval_unchecked(&mut self, frame: &mut Frame, expr: &Expr) -> Result<JsValue, JsError> {
        Ok(match expr {
            Expr::Undefined => JsValue::Undefined,
            Expr::Null => JsValue::Null,
            Expr::Bool(b) => JsValue::Boolean(*b),
            Expr::Number(n) => JsValue::Number(*n),
            Expr::String(s) => JsValue::String(s.cheap_clone()),
            Expr::RegExp { pattern, flags } => self.regexp_literal(pattern, flags)?,

            Expr::Local(binding) => frame.scope.get(binding)?,
            Expr::Global(name) => self.read_global(name)?,
            Expr::TypeofGlobal(name) => self.typeof_global(name)?,
            Expr::Temp(t) => frame.temp(*t),
            Expr::SetTemp(t, e) => {
                let value = self.eval(frame, e)?;
                frame.set_temp(*t, value.cheap_clone());
                value
            }

            Expr::This => frame.this.cheap_clone(),
            Expr::NewTarget => frame.new_target.cheap_clone(),
            Expr::Arg(i) => frame.args.get(*i as usize).cloned().unwrap_or_default(),
            Expr::RestArgs(i) => {
                let rest = frame.args.get(*i as usize..).map(<[JsValue]>::to_vec).unwrap_or_default();
                JsValue::Object(self.create_array(rest))
            }
            Expr::ArgumentsObject => self.create_arguments_object(frame),
            Expr::Callee => frame.callee.cheap_clone(),

            Expr::Function(template) => {
                let home = if template.is_arrow() {
                    frame.home_object.clone()
                } else {
                    None
                };
                JsValue::Object(self.create_closure(template, frame.scope.cheap_clone(), home))
            }
            Expr::Class(def) => {
                let heritage = match &def.heritage {
                    Some(h) => Some(self.eval(frame, h)?),
                    None => None,
                };
                let mut keys = Vec::with_capacity(def.members.len());
                for member in &def.members {
                    keys.push(self.eval_key(frame, &member.key)?);
                }
                let scope = frame.scope.cheap_clone();
                JsValue::Object(self.define_class(def, heritage, keys, &scope)?)
            }
            Expr::Array(items) => {
                let mut elements = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        ArrayItem::Value(e) => elements.push(Some(self.eval(frame, e)?)),
                        ArrayItem::Spread(e) => {
                            let iterable = self.eval(frame, e)?;
                            elements.extend(self.iterate_to_vec(&iterable)?.into_iter().map(Some));
                        }
                        ArrayItem::Hole => elements.push(None),
                    }
                }
                JsValue::Object(self.create_sparse_array(elements))
            }
            Expr::Object(items) => self.eval_object_literal(frame, items)?,
            Expr::TemplateConcat { quasis, exprs } => {
                let mut out = String::new();
                for (i, quasi) in quasis.iter().enumerate() {
                    out.push_str(quasi.as_str());
                    if let Some(e) = exprs.get(i) {
                        let value = self.eval(frame, e)?;
                        out.push_str(self.to_js_string(&value)?.as_str());
                    }
                }
                JsValue::from(out)
            }
            Expr::TaggedTemplate { callee, site, args } => {
                let (function, this, describe) = self.eval_callee(frame, callee)?;
                let mut values = Vec::with_capacity(args.len() + 1);
                values.push(JsValue::Object(self.template_object(site)));
                for arg in args {
                    values.push(self.eval(frame, arg)?);
                }
                self.call_named(&function, this, &values, || describe)?
            }

            Expr::Unary(op, e) => {
                let value = self.eval(frame, e)?;
                self.unary_op(*op, &value)?
            }
            Expr::Typeof(e) => {
                let value = self.eval(frame, e)?;
                JsValue::from(value.type_of())
            }
            Expr::Binary(op, left, right) => {
                let l = self.eval(frame, left)?;
                let r = self.eval(frame, right)?;
                self.binary_op(*op, &l, &r)?
            }
            Expr::Logical(op, left, right) => {
                let l = self.eval(frame, left)?;
                let short_circuit = match op {
                    LogicalOp::And => !l.to_boolean(),
                    LogicalOp::Or => l.to_boolean(),
                    LogicalOp::NullishCoalescing => !l.is_null_or_undefined(),
                };
                if short_circuit {
                    l
                } else {
                    self.eval(frame, right)?
                }
            }
            Expr::Conditional(test, then, otherwise) => {
                if self.eval(frame, test)?.to_boolean() {
                    self.eval(frame, then)?
                } else {
                    self.eval(frame, otherwise)?
                }
            }
            Expr::Sequence(items) => {
                let mut last = JsValue::Undefined;
                for item in items {
                    last = self.eval(frame, item)?;
                }
                last
            }
            Expr::StmtExpr { stmts, result } => {
                match self.exec_block(frame, stmts)? {
                    Completion::Normal => {}
                    _ => return Err(JsError::internal_error("abrupt completion inside an expression")),
                }
                self.eval(frame, result)?
            }

            Expr::Get { object, key } => {
                let target = self.eval(frame, object)?;
                let key = self.eval_key(frame, key)?;
                self.get_property(&target, &key)?
            }
            Expr::SuperGet { key, this } => {
                let key = self.eval_key(frame, key)?;
                let this = self.eval(frame, this)?;
                self.super_get(frame.home_object.as_ref(), &key, &this)?
            }
            Expr::Assign { target, value } => {
                let place = self.resolve_place(frame, target)?;
                let value = self.eval(frame, value)?;
                self.write_place(frame, &place, value.cheap_clone())?;
                value
            }
            Expr::Compound { target, op, value } => {
                let place = self.resolve_place(frame, target)?;
                let current = self.read_place(frame, &place)?;
                let rhs = self.eval(frame, value)?;
                let result = self.binary_op(*op, &current, &rhs)?;
                self.write_place(frame, &place, result.cheap_clone())?;
                result
            }
            Expr::LogicalAssign { target, op, value } => {
                let place = self.resolve_place(frame, target)?;
                let current = self.read_place(frame, &place)?;
                let keep = match op {
                    LogicalOp::And => !current.to_boolean(),
                    LogicalOp::Or => current.to_boolean(),
                    LogicalOp::NullishCoalescing => !current.is_null_or_undefined(),
                };
                if keep {
                    current
                } else {
                    let result = self.eval(frame, value)?;
                    self.write_place(frame, &place, result.cheap_clone())?;
                    result
                }
            }
            Expr::Update {
                target,
                increment,
                prefix,
            } => {
                let place = self.resolve_place(frame, target)?;
                let current = self.read_place(frame, &place)?;
                let (old, new) = self.update_value(&current, *increment)?;
                self.write_place(frame, &place, new.cheap_clone())?;
                if *prefix {
                    new
                } else {
                    old
                }
            }
            Expr::Delete { object, key } => {
                let target = self.eval(frame, object)?;
                let key = self.eval_key(frame, key)?;
                JsValue::Boolean(self.delete_property(&target, &key, frame.strict())?)
            }
            Expr::DeleteGlobal(name) => JsValue::Boolean(self.delete_global(name)?),

            Expr::Call { callee, args } => {
                let (function, this, describe) = self.eval_callee(frame, callee)?;
                let args = self.eval_args(frame, args)?;
                self.call_named(&function, this, &args, || describe)?
            }
            Expr::New { callee, args } => {
                let constructor = self.eval(frame, callee)?;
                let args = self.eval_args(frame, args)?;
                if !self.is_constructor(&constructor) {
                    return Err(JsError::type_error(format!(
                        "{} is not a constructor",
                        describe_expr(callee)
                    )));
                }
                self.construct(&constructor, &args, None)?
            }
            Expr::SuperCall {
                args,
                this_binding,
                new_target,
                active_function,
            } => {
                let args = self.eval_args(frame, args)?;
                let new_target = self.eval(frame, new_target)?;
                let active = self.eval(frame, active_function)?;
                let this = self.super_call(&active, &new_target, &args)?;
                let scope = frame.scope.cheap_clone();
                self.bind_this(&scope, this_binding, this.cheap_clone())?;
                this
            }

            Expr::GetIterator(e) => {
                let value = self.eval(frame, e)?;
                self.get_iterator(&value)?
            }
            Expr::IteratorStep(t) => self.iterator_step(&frame.temp(*t))?,
            Expr::IteratorRest(t) => self.iterator_rest(&frame.temp(*t))?,
            Expr::IteratorDone(t) => JsValue::Boolean(self.iterator_done(&frame.temp(*t))),
            Expr::IteratorClose(t) => {
                self.iterator_close(&frame.temp(*t))?;
                JsValue::Undefined
            }
            Expr::ForInIterator(e) => {
                let value = self.eval(frame, e)?;
                self.for_in_iterator(&value)?
            }
            Expr::ObjectRest { source, excluded } => {
                let source = self.eval(frame, source)?;
                let mut keys = Vec::with_capacity(excluded.len());
                for e in excluded {
                    let value = self.eval(frame, e)?;
                    keys.push(self.to_property_key(&value)?);
                }
                self.object_rest(&source, &keys)?
            }
            Expr::RequireObjectCoercible(e) => {
                let value = self.eval(frame, e)?;
                self.require_object_coercible(value)?
            }
            Expr::ToPropertyKey(e) => {
                let value = self.eval(frame, e)?;
                self.to_property_key(&value)?.to_value()
            }
        })
    }

    fn eval_callee(&mut self, frame: &mut Frame, callee: &Callee) -> Result<(JsValue, JsValue, String), JsError> {
        Ok(match callee {
            Callee::Value(e) => {
                let function = self.eval(frame, e)?;
                (function, JsValue::Undefined, describe_expr(e))
            }
            Callee::Member { object, key } => {
                let this = self.eval(frame, object)?;
                let key = self.eval_key(frame, key)?;
                let function = self.get_property(&this, &key)?;
                let describe = format!("{}.{}", describe_expr(object), key);
                (function, this, describe)
            }
            Callee::WithThis { function, this } => {
                let f = self.eval(frame, function)?;
                let this = self.eval(frame, this)?;
                (f, this, describe_expr(function))
            }
        })
    }

    fn eval_object_literal(&mut self, frame: &mut Frame, items: &[ObjectItem]) -> Result<JsValue, JsError> {
        let obj = self.create_object();
        for item in items {
            match item {
                ObjectItem::Property {
                    key,
                    value,
                    name_function,
                } => {
                    let key = self.eval_key(frame, key)?;
                    let value = self.eval(frame, value)?;
                    if *name_function {
                        self.name_function(&value, &key, "");
                    }
                    self.create_data_property(&obj, key, value);
                }
                ObjectItem::Method {
                    key,
                    function,
                    kind,
                } => {
                    let key = self.eval_key(frame, key)?;
                    let scope = frame.scope.cheap_clone();
                    self.define_method(&obj, key, function, *kind, &scope, true);
                }
                ObjectItem::Spread(e) => {
                    let source = self.eval(frame, e)?;
                    self.copy_data_properties(&obj, &source, &[])?;
                }
                ObjectItem::Proto(e) => {
                    let proto = self.eval(frame, e)?;
                    match proto {
                        JsValue::Object(p) => {
                            set_prototype_of(&obj, Some(p));
                        }
                        JsValue::Null => {
                            set_prototype_of(&obj, None);
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(JsValue::Object(obj))
    }

    // ============ ASSIGNMENT TARGETS ============

    fn resolve_place(&mut self, frame: &mut Frame, target: &Target) -> Result<Place, JsError> {
        Ok(match target {
            Target::Local { binding, mode } => Place::Local(binding.clone(), *mode),
            Target::Global(name) => Place::Global(name.cheap_clone()),
            Target::GlobalLexicalInit(name) => Place::GlobalLexicalInit(name.cheap_clone()),
            Target::Member { object, key } => {
                let object = self.eval(frame, object)?;
                let key = self.eval_key(frame, key)?;
                Place::Member(object, key)
            }
            Target::SuperMember { key, this } => {
                let key = self.eval_key(frame, key)?;
                let this = self.eval(frame, this)?;
                Place::SuperMember(key, this)
            }
            Target::Temp(t) => Place::Temp(*t),
        })
    }

    fn read_place(&mut self, frame: &mut Frame, place: &Place) -> Result<JsValue, JsError> {
        match place {
            Place::Local(binding, _) => frame.scope.get(binding),
            Place::Global(name) | Place::GlobalLexicalInit(name) => self.read_global(name),
            Place::Member(object, key) => self.get_property(object, key),
            Place::SuperMember(key, this) => self.super_get(frame.home_object.as_ref(), key, this),
            Place::Temp(t) => Ok(frame.temp(*t)),
        }
    }

    fn write_place(&mut self, frame: &mut Frame, place: &Place, value: JsValue) -> Result<(), JsError> {
        let strict = frame.strict();
        match place {
            Place::Local(binding, mode) => frame.scope.set(binding, value, *mode),
            Place::Global(name) => self.write_global(name, value, strict),
            Place::GlobalLexicalInit(name) => {
                self.init_global_lexical(name, value);
                Ok(())
            }
            Place::Member(object, key) => self.set(object, key.cheap_clone(), value, strict),
            Place::SuperMember(key, this) => {
                let home = frame.home_object.clone();
                self.super_set(home.as_ref(), key.cheap_clone(), value, this, strict)
            }
            Place::Temp(t) => {
                frame.set_temp(*t, value);
                Ok(())
            }
        }
    }
}

/// Source-like rendering of a callee for "is not a function" messages
pub(crate) fn describe_expr(expr: &Expr) -> String {
    match expr {
        Expr::Local(binding) => binding.name.to_string(),
        Expr::Global(name) => name.to_string(),
        Expr::This => "this".to_string(),
        Expr::Get {
            object,
            key: Key::Static(key),
        } => format!("{}.{}", describe_expr(object), key),
        Expr::Get { object, .. } => format!("{}[...]", describe_expr(object)),
        Expr::SuperGet {
            key: Key::Static(key),
            ..
        } => format!("super.{}", key),
        Expr::Temp(_) | Expr::SetTemp(..) => "value".to_string(),
        Expr::Undefined => "undefined".to_string(),
        Expr::Null => "null".to_string(),
        Expr::Number(n) => crate::value::number_to_string(*n),
        Expr::String(s) => format!("\"{}\"", s),
        _ => "expression".to_string(),
    }
}
