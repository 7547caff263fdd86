//! Expression compilation
//!
//! `compile_expr` always writes into a scratch register owned by the caller. Frame
//! temps are only written through explicit moves, so an expression may read a temp
//! it is also assigning.

use std::rc::Rc;

use super::bytecode::{Constant, ConstantIndex, Op, Register};
use super::{Compiler, JumpPlaceholder};
use crate::ast::LogicalOp;
use crate::error::JsError;
use crate::interpreter::describe_expr;
use crate::ir::{Arg, ArrayItem, Callee, Expr, Key, ObjectItem, Target, WriteMode};
use crate::prelude::grow_stack;
use crate::value::{CheapClone, JsString, PropertyKey};

/// A compiled assignment target; registers hold the evaluated parts
enum Place {
    Local(ConstantIndex, WriteMode),
    Global(ConstantIndex),
    GlobalLexicalInit(ConstantIndex),
    Named(Register, ConstantIndex),
    Keyed(Register, Register),
    Super { key: Register, this: Register },
    Temp(Register),
}

impl Compiler {
    fn key_constant(&mut self, key: &PropertyKey) -> Result<ConstantIndex, JsError> {
        self.builder.add_constant(Constant::Key(key.cheap_clone()))
    }

    fn name_constant(&mut self, name: String) -> Result<ConstantIndex, JsError> {
        self.builder.add_string(JsString::from(name))
    }

    /// Evaluate a key into `dst` as a string or symbol
    fn compile_key(&mut self, key: &Key, dst: Register) -> Result<(), JsError> {
        match key {
            Key::Static(k) => {
                let idx = self.key_constant(k)?;
                self.builder.emit(Op::LoadConst { dst, idx });
            }
            Key::Computed(expr) => {
                self.compile_expr(expr, dst)?;
                self.builder.emit(Op::ToPropertyKey { dst, src: dst });
            }
        }
        Ok(())
    }

    /// Build an array of call arguments, spreading iterables
    fn compile_arg_array(&mut self, args: &[Arg], dst: Register) -> Result<(), JsError> {
        self.builder.emit(Op::NewArray { dst });
        self.builder.registers().save();
        let value = self.builder.alloc_register()?;
        for arg in args {
            match arg {
                Arg::Value(e) => {
                    self.compile_expr(e, value)?;
                    self.builder.emit(Op::ArrayPush { array: dst, value });
                }
                Arg::Spread(e) => {
                    self.compile_expr(e, value)?;
                    self.builder.emit(Op::ArraySpread {
                        array: dst,
                        iterable: value,
                    });
                }
            }
        }
        self.builder.registers().restore();
        Ok(())
    }

    /// Arguments without spreads, in consecutive registers
    fn compile_arg_range(&mut self, args: &[Expr]) -> Result<(Register, u16), JsError> {
        let argc =
            u16::try_from(args.len()).map_err(|_| JsError::internal_error("too many arguments"))?;
        let start = self.builder.reserve_registers(u32::from(argc))?;
        for (i, arg) in args.iter().enumerate() {
            self.compile_expr(arg, start + i as Register)?;
        }
        Ok((start, argc))
    }

    fn plain_args(args: &[Arg]) -> Option<Vec<Expr>> {
        args.iter()
            .map(|arg| match arg {
                Arg::Value(e) => Some(e.clone()),
                Arg::Spread(_) => None,
            })
            .collect()
    }

    pub(super) fn compile_expr(&mut self, expr: &Expr, dst: Register) -> Result<(), JsError> {
        grow_stack(|| self.compile_expr_unchecked(expr, dst))
    }

    fn compile_expr_unchecked(&mut self, expr: &Expr, dst: Register) -> Result<(), JsError> {
        match expr {
            Expr::Undefined => {
                self.builder.emit(Op::LoadUndefined { dst });
            }
            Expr::Null => {
                self.builder.emit(Op::LoadNull { dst });
            }
            Expr::Bool(value) => {
                self.builder.emit(Op::LoadBool { dst, value: *value });
            }
            Expr::Number(n) => self.builder.emit_load_number(dst, *n)?,
            Expr::String(s) => self.builder.emit_load_string(dst, s.cheap_clone())?,
            Expr::RegExp { pattern, flags } => {
                let pattern = self.builder.add_string(pattern.cheap_clone())?;
                let flags = self.builder.add_string(flags.cheap_clone())?;
                self.builder.emit(Op::RegExp {
                    dst,
                    pattern,
                    flags,
                });
            }

            Expr::Local(binding) => {
                let binding = self.builder.add_constant(Constant::Binding(binding.clone()))?;
                self.builder.emit(Op::GetLocal { dst, binding });
            }
            Expr::Global(name) => {
                let name = self.builder.add_string(name.cheap_clone())?;
                self.builder.emit(Op::GetGlobal { dst, name });
            }
            Expr::TypeofGlobal(name) => {
                let name = self.builder.add_string(name.cheap_clone())?;
                self.builder.emit(Op::TypeofGlobal { dst, name });
            }
            Expr::Temp(t) => {
                let src = self.temp_register(*t)?;
                self.builder.emit(Op::Move { dst, src });
            }
            Expr::SetTemp(t, e) => {
                let temp = self.temp_register(*t)?;
                self.compile_expr(e, dst)?;
                self.builder.emit(Op::Move { dst: temp, src: dst });
            }

            Expr::This => {
                self.builder.emit(Op::LoadThis { dst });
            }
            Expr::NewTarget => {
                self.builder.emit(Op::LoadNewTarget { dst });
            }
            Expr::Arg(index) => {
                self.builder.emit(Op::LoadArg { dst, index: *index });
            }
            Expr::RestArgs(from) => {
                self.builder.emit(Op::RestArgs { dst, from: *from });
            }
            Expr::ArgumentsObject => {
                self.builder.emit(Op::ArgumentsObject { dst });
            }
            Expr::Callee => {
                self.builder.emit(Op::LoadCallee { dst });
            }

            Expr::Function(template) => {
                let template = self.builder.add_constant(Constant::Template(template.cheap_clone()))?;
                self.builder.emit(Op::Closure { dst, template });
            }
            Expr::Class(def) => {
                self.builder.registers().save();
                let heritage = match &def.heritage {
                    Some(h) => {
                        let r = self.builder.alloc_register()?;
                        self.compile_expr(h, r)?;
                        Some(r)
                    }
                    None => None,
                };
                let count = u32::try_from(def.members.len())
                    .map_err(|_| JsError::internal_error("too many class members"))?;
                let keys = self.builder.reserve_registers(count)?;
                for (i, member) in def.members.iter().enumerate() {
                    self.compile_key(&member.key, keys + i as Register)?;
                }
                let class = self.builder.add_constant(Constant::Class(Rc::new((**def).clone())))?;
                self.builder.emit(Op::DefineClass {
                    dst,
                    class,
                    heritage,
                    keys,
                });
                self.builder.registers().restore();
            }
            Expr::Array(items) => {
                self.builder.emit(Op::NewArray { dst });
                self.builder.registers().save();
                let value = self.builder.alloc_register()?;
                for item in items {
                    match item {
                        ArrayItem::Value(e) => {
                            self.compile_expr(e, value)?;
                            self.builder.emit(Op::ArrayPush { array: dst, value });
                        }
                        ArrayItem::Spread(e) => {
                            self.compile_expr(e, value)?;
                            self.builder.emit(Op::ArraySpread {
                                array: dst,
                                iterable: value,
                            });
                        }
                        ArrayItem::Hole => {
                            self.builder.emit(Op::ArrayHole { array: dst });
                        }
                    }
                }
                self.builder.registers().restore();
            }
            Expr::Object(items) => self.compile_object_literal(items, dst)?,
            Expr::TemplateConcat { quasis, exprs } => {
                let first = quasis.first().cloned().unwrap_or_else(|| JsString::from(""));
                self.builder.emit_load_string(dst, first)?;
                self.builder.registers().save();
                let part = self.builder.alloc_register()?;
                for (i, quasi) in quasis.iter().enumerate() {
                    if i > 0 && !quasi.as_str().is_empty() {
                        self.builder.emit_load_string(part, quasi.cheap_clone())?;
                        self.builder.emit(Op::ToStringAppend { dst, value: part });
                    }
                    if let Some(e) = exprs.get(i) {
                        self.compile_expr(e, part)?;
                        self.builder.emit(Op::ToStringAppend { dst, value: part });
                    }
                }
                self.builder.registers().restore();
            }
            Expr::TaggedTemplate { callee, site, args } => {
                self.builder.registers().save();
                let (function, this, name, key) = self.compile_callee(callee)?;
                let argc = u16::try_from(args.len() + 1)
                    .map_err(|_| JsError::internal_error("too many arguments"))?;
                let start = self.builder.reserve_registers(u32::from(argc))?;
                let site = self.builder.add_constant(Constant::Site(site.cheap_clone()))?;
                self.builder.emit(Op::GetTemplateObject { dst: start, site });
                for (i, arg) in args.iter().enumerate() {
                    self.compile_expr(arg, start + 1 + i as Register)?;
                }
                self.builder.emit(Op::Call {
                    dst,
                    callee: function,
                    this,
                    args: start,
                    argc,
                    name,
                    key,
                });
                self.builder.registers().restore();
            }

            Expr::Unary(op, e) => {
                self.compile_expr(e, dst)?;
                self.builder.emit(Op::Unary {
                    dst,
                    op: *op,
                    src: dst,
                });
            }
            Expr::Typeof(e) => {
                self.compile_expr(e, dst)?;
                self.builder.emit(Op::Typeof { dst, src: dst });
            }
            Expr::Binary(op, left, right) => {
                self.compile_expr(left, dst)?;
                self.builder.registers().save();
                let rhs = self.builder.alloc_register()?;
                self.compile_expr(right, rhs)?;
                self.builder.emit(Op::Binary {
                    dst,
                    op: *op,
                    left: dst,
                    right: rhs,
                });
                self.builder.registers().restore();
            }
            Expr::Logical(op, left, right) => {
                self.compile_expr(left, dst)?;
                let end = self.emit_short_circuit(*op, dst);
                self.compile_expr(right, dst)?;
                self.builder.patch_jump(end);
            }
            Expr::Conditional(test, then, otherwise) => {
                self.builder.registers().save();
                let cond = self.builder.alloc_register()?;
                self.compile_expr(test, cond)?;
                let else_jump = self.builder.emit_jump_if_false(cond);
                self.builder.registers().restore();
                self.compile_expr(then, dst)?;
                let end = self.builder.emit_jump();
                self.builder.patch_jump(else_jump);
                self.compile_expr(otherwise, dst)?;
                self.builder.patch_jump(end);
            }
            Expr::Sequence(items) => {
                if items.is_empty() {
                    self.builder.emit(Op::LoadUndefined { dst });
                }
                for item in items {
                    self.compile_expr(item, dst)?;
                }
            }
            Expr::StmtExpr { stmts, result } => {
                self.compile_statements(stmts)?;
                self.compile_expr(result, dst)?;
            }

            Expr::Get { object, key } => {
                self.compile_expr(object, dst)?;
                match key {
                    Key::Static(k) => {
                        let key = self.key_constant(k)?;
                        self.builder.emit(Op::GetNamed {
                            dst,
                            object: dst,
                            key,
                        });
                    }
                    Key::Computed(_) => {
                        self.builder.registers().save();
                        let key_reg = self.builder.alloc_register()?;
                        self.compile_key(key, key_reg)?;
                        self.builder.emit(Op::GetProp {
                            dst,
                            object: dst,
                            key: key_reg,
                        });
                        self.builder.registers().restore();
                    }
                }
            }
            Expr::SuperGet { key, this } => {
                self.builder.registers().save();
                let key_reg = self.builder.alloc_register()?;
                let this_reg = self.builder.alloc_register()?;
                self.compile_key(key, key_reg)?;
                self.compile_expr(this, this_reg)?;
                self.builder.emit(Op::SuperGet {
                    dst,
                    key: key_reg,
                    this: this_reg,
                });
                self.builder.registers().restore();
            }
            Expr::Assign { target, value } => {
                self.builder.registers().save();
                let place = self.compile_place(target)?;
                self.compile_expr(value, dst)?;
                self.write_place(&place, dst);
                self.builder.registers().restore();
            }
            Expr::Compound { target, op, value } => {
                self.builder.registers().save();
                let place = self.compile_place(target)?;
                self.read_place(&place, dst);
                let rhs = self.builder.alloc_register()?;
                self.compile_expr(value, rhs)?;
                self.builder.emit(Op::Binary {
                    dst,
                    op: *op,
                    left: dst,
                    right: rhs,
                });
                self.write_place(&place, dst);
                self.builder.registers().restore();
            }
            Expr::LogicalAssign { target, op, value } => {
                self.builder.registers().save();
                let place = self.compile_place(target)?;
                self.read_place(&place, dst);
                let end = self.emit_short_circuit(*op, dst);
                self.compile_expr(value, dst)?;
                self.write_place(&place, dst);
                self.builder.patch_jump(end);
                self.builder.registers().restore();
            }
            Expr::Update {
                target,
                increment,
                prefix,
            } => {
                self.builder.registers().save();
                let place = self.compile_place(target)?;
                let current = self.builder.alloc_register()?;
                let old = self.builder.alloc_register()?;
                let new = self.builder.alloc_register()?;
                self.read_place(&place, current);
                self.builder.emit(Op::Update {
                    old,
                    new,
                    src: current,
                    increment: *increment,
                });
                self.write_place(&place, new);
                self.builder.emit(Op::Move {
                    dst,
                    src: if *prefix { new } else { old },
                });
                self.builder.registers().restore();
            }
            Expr::Delete { object, key } => {
                self.builder.registers().save();
                let object_reg = self.builder.alloc_register()?;
                let key_reg = self.builder.alloc_register()?;
                self.compile_expr(object, object_reg)?;
                self.compile_key(key, key_reg)?;
                self.builder.emit(Op::DeleteProp {
                    dst,
                    object: object_reg,
                    key: key_reg,
                });
                self.builder.registers().restore();
            }
            Expr::DeleteGlobal(name) => {
                let name = self.builder.add_string(name.cheap_clone())?;
                self.builder.emit(Op::DeleteGlobal { dst, name });
            }

            Expr::Call { callee, args } => {
                self.builder.registers().save();
                let (function, this, name, key) = self.compile_callee(callee)?;
                match Self::plain_args(args) {
                    Some(values) => {
                        let (start, argc) = self.compile_arg_range(&values)?;
                        self.builder.emit(Op::Call {
                            dst,
                            callee: function,
                            this,
                            args: start,
                            argc,
                            name,
                            key,
                        });
                    }
                    None => {
                        let array = self.builder.alloc_register()?;
                        self.compile_arg_array(args, array)?;
                        self.builder.emit(Op::CallSpread {
                            dst,
                            callee: function,
                            this,
                            args: array,
                            name,
                            key,
                        });
                    }
                }
                self.builder.registers().restore();
            }
            Expr::New { callee, args } => {
                self.builder.registers().save();
                let function = self.builder.alloc_register()?;
                self.compile_expr(callee, function)?;
                let name = self.name_constant(describe_expr(callee))?;
                match Self::plain_args(args) {
                    Some(values) => {
                        let (start, argc) = self.compile_arg_range(&values)?;
                        self.builder.emit(Op::New {
                            dst,
                            callee: function,
                            args: start,
                            argc,
                            name,
                        });
                    }
                    None => {
                        let array = self.builder.alloc_register()?;
                        self.compile_arg_array(args, array)?;
                        self.builder.emit(Op::NewSpread {
                            dst,
                            callee: function,
                            args: array,
                            name,
                        });
                    }
                }
                self.builder.registers().restore();
            }
            Expr::SuperCall {
                args,
                this_binding,
                new_target,
                active_function,
            } => {
                self.builder.registers().save();
                let array = self.builder.alloc_register()?;
                let target = self.builder.alloc_register()?;
                let active = self.builder.alloc_register()?;
                self.compile_arg_array(args, array)?;
                self.compile_expr(new_target, target)?;
                self.compile_expr(active_function, active)?;
                let binding = self.builder.add_constant(Constant::Binding(this_binding.clone()))?;
                self.builder.emit(Op::SuperCall {
                    dst,
                    args: array,
                    new_target: target,
                    active,
                    binding,
                });
                self.builder.registers().restore();
            }

            Expr::GetIterator(e) => {
                self.compile_expr(e, dst)?;
                self.builder.emit(Op::GetIterator { dst, src: dst });
            }
            Expr::IteratorStep(t) => {
                let record = self.temp_register(*t)?;
                self.builder.emit(Op::IteratorStep { dst, record });
            }
            Expr::IteratorRest(t) => {
                let record = self.temp_register(*t)?;
                self.builder.emit(Op::IteratorRest { dst, record });
            }
            Expr::IteratorDone(t) => {
                let record = self.temp_register(*t)?;
                self.builder.emit(Op::IteratorDone { dst, record });
            }
            Expr::IteratorClose(t) => {
                let record = self.temp_register(*t)?;
                self.builder.emit(Op::IteratorClose { record });
                self.builder.emit(Op::LoadUndefined { dst });
            }
            Expr::ForInIterator(e) => {
                self.compile_expr(e, dst)?;
                self.builder.emit(Op::ForInIterator { dst, src: dst });
            }
            Expr::ObjectRest { source, excluded } => {
                self.builder.registers().save();
                let source_reg = self.builder.alloc_register()?;
                let keys = self.builder.alloc_register()?;
                let key = self.builder.alloc_register()?;
                self.compile_expr(source, source_reg)?;
                self.builder.emit(Op::NewArray { dst: keys });
                for e in excluded {
                    self.compile_expr(e, key)?;
                    self.builder.emit(Op::ToPropertyKey { dst: key, src: key });
                    self.builder.emit(Op::ArrayPush {
                        array: keys,
                        value: key,
                    });
                }
                self.builder.emit(Op::ObjectRest {
                    dst,
                    source: source_reg,
                    excluded: keys,
                });
                self.builder.registers().restore();
            }
            Expr::RequireObjectCoercible(e) => {
                self.compile_expr(e, dst)?;
                self.builder.emit(Op::RequireObjectCoercible { dst, src: dst });
            }
            Expr::ToPropertyKey(e) => {
                self.compile_expr(e, dst)?;
                self.builder.emit(Op::ToPropertyKey { dst, src: dst });
            }
        }
        Ok(())
    }

    /// Jump over the right operand when `value` already decides the result
    fn emit_short_circuit(&mut self, op: LogicalOp, value: Register) -> JumpPlaceholder {
        match op {
            LogicalOp::And => self.builder.emit_jump_if_false(value),
            LogicalOp::Or => self.builder.emit_jump_if_true(value),
            LogicalOp::NullishCoalescing => self.builder.emit_jump_if_not_nullish(value),
        }
    }

    /// Evaluate a callee into fresh registers: (function, this, name, computed key)
    fn compile_callee(
        &mut self,
        callee: &Callee,
    ) -> Result<(Register, Register, ConstantIndex, Option<Register>), JsError> {
        let function = self.builder.alloc_register()?;
        let this = self.builder.alloc_register()?;
        let (name, key) = match callee {
            Callee::Value(e) => {
                self.compile_expr(e, function)?;
                self.builder.emit(Op::LoadUndefined { dst: this });
                (describe_expr(e), None)
            }
            Callee::Member { object, key } => {
                self.compile_expr(object, this)?;
                match key {
                    Key::Static(k) => {
                        let idx = self.key_constant(k)?;
                        self.builder.emit(Op::GetNamed {
                            dst: function,
                            object: this,
                            key: idx,
                        });
                        (format!("{}.{}", describe_expr(object), k), None)
                    }
                    Key::Computed(_) => {
                        let key_reg = self.builder.alloc_register()?;
                        self.compile_key(key, key_reg)?;
                        self.builder.emit(Op::GetProp {
                            dst: function,
                            object: this,
                            key: key_reg,
                        });
                        (describe_expr(object), Some(key_reg))
                    }
                }
            }
            Callee::WithThis {
                function: f,
                this: t,
            } => {
                self.compile_expr(f, function)?;
                self.compile_expr(t, this)?;
                (describe_expr(f), None)
            }
        };
        let name = self.name_constant(name)?;
        Ok((function, this, name, key))
    }

    fn compile_object_literal(&mut self, items: &[ObjectItem], dst: Register) -> Result<(), JsError> {
        self.builder.emit(Op::NewObject { dst });
        self.builder.registers().save();
        let key = self.builder.alloc_register()?;
        let value = self.builder.alloc_register()?;
        for item in items {
            match item {
                ObjectItem::Property {
                    key: k,
                    value: v,
                    name_function,
                } => {
                    self.compile_key(k, key)?;
                    self.compile_expr(v, value)?;
                    if *name_function {
                        self.builder.emit(Op::NameFunction { value, key });
                    }
                    self.builder.emit(Op::DefineField {
                        object: dst,
                        key,
                        value,
                    });
                }
                ObjectItem::Method {
                    key: k,
                    function,
                    kind,
                } => {
                    self.compile_key(k, key)?;
                    let template =
                        self.builder.add_constant(Constant::Template(function.cheap_clone()))?;
                    self.builder.emit(Op::DefineMethod {
                        object: dst,
                        key,
                        template,
                        kind: *kind,
                    });
                }
                ObjectItem::Spread(e) => {
                    self.compile_expr(e, value)?;
                    self.builder.emit(Op::ObjectSpread {
                        object: dst,
                        source: value,
                    });
                }
                ObjectItem::Proto(e) => {
                    self.compile_expr(e, value)?;
                    self.builder.emit(Op::SetProto { object: dst, value });
                }
            }
        }
        self.builder.registers().restore();
        Ok(())
    }

    // ============ ASSIGNMENT TARGETS ============

    fn compile_place(&mut self, target: &Target) -> Result<Place, JsError> {
        Ok(match target {
            Target::Local { binding, mode } => {
                let idx = self.builder.add_constant(Constant::Binding(binding.clone()))?;
                Place::Local(idx, *mode)
            }
            Target::Global(name) => Place::Global(self.builder.add_string(name.cheap_clone())?),
            Target::GlobalLexicalInit(name) => {
                Place::GlobalLexicalInit(self.builder.add_string(name.cheap_clone())?)
            }
            Target::Member { object, key } => {
                let object_reg = self.builder.alloc_register()?;
                self.compile_expr(object, object_reg)?;
                match key {
                    Key::Static(k) => Place::Named(object_reg, self.key_constant(k)?),
                    Key::Computed(_) => {
                        let key_reg = self.builder.alloc_register()?;
                        self.compile_key(key, key_reg)?;
                        Place::Keyed(object_reg, key_reg)
                    }
                }
            }
            Target::SuperMember { key, this } => {
                let key_reg = self.builder.alloc_register()?;
                let this_reg = self.builder.alloc_register()?;
                self.compile_key(key, key_reg)?;
                self.compile_expr(this, this_reg)?;
                Place::Super {
                    key: key_reg,
                    this: this_reg,
                }
            }
            Target::Temp(t) => Place::Temp(self.temp_register(*t)?),
        })
    }

    fn read_place(&mut self, place: &Place, dst: Register) {
        let op = match *place {
            Place::Local(binding, _) => Op::GetLocal { dst, binding },
            Place::Global(name) | Place::GlobalLexicalInit(name) => Op::GetGlobal { dst, name },
            Place::Named(object, key) => Op::GetNamed { dst, object, key },
            Place::Keyed(object, key) => Op::GetProp { dst, object, key },
            Place::Super { key, this } => Op::SuperGet { dst, key, this },
            Place::Temp(src) => Op::Move { dst, src },
        };
        self.builder.emit(op);
    }

    fn write_place(&mut self, place: &Place, src: Register) {
        let op = match *place {
            Place::Local(binding, mode) => Op::SetLocal { src, binding, mode },
            Place::Global(name) => Op::SetGlobal { src, name },
            Place::GlobalLexicalInit(name) => Op::InitGlobalLexical { src, name },
            Place::Named(object, key) => Op::SetNamed {
                object,
                key,
                value: src,
            },
            Place::Keyed(object, key) => Op::SetProp {
                object,
                key,
                value: src,
            },
            Place::Super { key, this } => Op::SuperSet {
                key,
                this,
                value: src,
            },
            Place::Temp(dst) => Op::Move { dst, src },
        };
        self.builder.emit(op);
    }
}
