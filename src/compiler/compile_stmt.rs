//! Statement compilation

use super::bytecode::{Constant, JumpTarget, Op, Register};
use super::{
    Cleanup, Compiler, FinallyContext, COMPLETION_JUMP, COMPLETION_NORMAL, COMPLETION_RETURN,
    COMPLETION_THROW,
};
use crate::ast::BinaryOp;
use crate::error::JsError;
use crate::ir::{CatchBlock, Expr, ForEachStmt, LabelId, LoopStmt, Stmt, SwitchCase};
use crate::prelude::grow_stack;

impl Compiler {
    /// Compile a sequence of statements
    pub(super) fn compile_statements(&mut self, statements: &[Stmt]) -> Result<(), JsError> {
        for stmt in statements {
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    /// Compile `expr` into a scratch register released afterwards
    fn compile_discarded(&mut self, expr: &Expr) -> Result<(), JsError> {
        self.builder.registers().save();
        let dst = self.builder.alloc_register()?;
        let result = self.compile_expr(expr, dst);
        self.builder.registers().restore();
        result
    }

    fn compile_statement(&mut self, stmt: &Stmt) -> Result<(), JsError> {
        grow_stack(|| self.compile_statement_unchecked(stmt))
    }

    fn compile_statement_unchecked(&mut self, stmt: &Stmt) -> Result<(), JsError> {
        match stmt {
            Stmt::Expr(expr) => self.compile_discarded(expr),
            Stmt::Scoped { slots, body } => {
                self.builder.emit(Op::PushScope { slots: *slots });
                self.scope_depth += 1;
                self.compile_statements(body)?;
                self.builder.emit(Op::PopScope);
                self.scope_depth -= 1;
                Ok(())
            }
            Stmt::Uninitialize(slots) => {
                let slots = self.builder.add_constant(Constant::Slots(slots.clone()))?;
                self.builder.emit(Op::Uninitialize { slots });
                Ok(())
            }
            Stmt::DeclareGlobals { vars, lexicals } => {
                let idx = self.builder.add_constant(Constant::Globals {
                    vars: vars.clone(),
                    lexicals: lexicals.clone(),
                })?;
                self.builder.emit(Op::DeclareGlobals { idx });
                Ok(())
            }
            Stmt::If {
                test,
                then,
                otherwise,
            } => {
                self.builder.registers().save();
                let cond = self.builder.alloc_register()?;
                self.compile_expr(test, cond)?;
                let else_jump = self.builder.emit_jump_if_false(cond);
                self.builder.registers().restore();

                self.compile_statements(then)?;
                if otherwise.is_empty() {
                    self.builder.patch_jump(else_jump);
                } else {
                    let end_jump = self.builder.emit_jump();
                    self.builder.patch_jump(else_jump);
                    self.compile_statements(otherwise)?;
                    self.builder.patch_jump(end_jump);
                }
                Ok(())
            }
            Stmt::Loop(l) => self.compile_loop(l),
            Stmt::ForIn(f) => self.compile_for_each(f, false),
            Stmt::ForOf(f) => self.compile_for_each(f, true),
            Stmt::Switch {
                label,
                discriminant,
                cases,
            } => self.compile_switch(*label, discriminant, cases),
            Stmt::Labeled { label, body } => {
                self.push_label(*label);
                self.compile_statements(body)?;
                for jump in self.pop_label(None)? {
                    self.builder.patch_jump(jump);
                }
                Ok(())
            }
            Stmt::Try {
                block,
                catch,
                finally,
            } => match finally {
                Some(finally) => self.compile_try_finally(block, catch.as_ref(), finally),
                None => self.compile_try_catch(block, catch.as_ref()),
            },
            Stmt::Return(expr) => {
                self.builder.registers().save();
                let value = self.builder.alloc_register()?;
                match expr {
                    Some(e) => self.compile_expr(e, value)?,
                    None => {
                        self.builder.emit(Op::LoadUndefined { dst: value });
                    }
                }
                self.emit_return(value)?;
                self.builder.registers().restore();
                Ok(())
            }
            Stmt::Break(label) => self.emit_label_jump(*label, false),
            Stmt::Continue(label) => self.emit_label_jump(*label, true),
            Stmt::Throw(expr) => {
                self.builder.registers().save();
                let value = self.builder.alloc_register()?;
                self.compile_expr(expr, value)?;
                self.builder.emit(Op::Throw { src: value });
                self.builder.registers().restore();
                Ok(())
            }
        }
    }

    fn compile_loop(&mut self, l: &LoopStmt) -> Result<(), JsError> {
        let mut exit_jumps = Vec::new();
        if l.test_first {
            if let Some(test) = &l.test {
                self.builder.registers().save();
                let cond = self.builder.alloc_register()?;
                self.compile_expr(test, cond)?;
                exit_jumps.push(self.builder.emit_jump_if_false(cond));
                self.builder.registers().restore();
            }
        }

        let top = self.builder.current_offset();
        self.builder.emit(Op::LoopHint);
        self.push_label(l.label);
        self.compile_statements(&l.body)?;
        let continue_target = self.builder.current_offset();
        let break_jumps = self.pop_label(Some(continue_target))?;

        if l.fresh_scope {
            self.builder.emit(Op::CopyScope);
        }
        if let Some(update) = &l.update {
            self.compile_discarded(update)?;
        }
        match &l.test {
            Some(test) => {
                self.builder.registers().save();
                let cond = self.builder.alloc_register()?;
                self.compile_expr(test, cond)?;
                self.builder.emit(Op::JumpIfTrue {
                    cond,
                    target: top as JumpTarget,
                });
                self.builder.registers().restore();
            }
            None => self.builder.emit_jump_to(top),
        }

        for jump in exit_jumps.into_iter().chain(break_jumps) {
            self.builder.patch_jump(jump);
        }
        Ok(())
    }

    /// for-in / for-of. For-of registers its iterator as a cleanup, so early exits
    /// close it, and guards the body with a handler that closes it on throw.
    fn compile_for_each(&mut self, f: &ForEachStmt, of: bool) -> Result<(), JsError> {
        self.builder.registers().save();
        let record = self.builder.alloc_register()?;
        self.builder.registers().save();
        let source = self.builder.alloc_register()?;
        self.compile_expr(&f.source, source)?;
        if of {
            self.builder.emit(Op::GetIterator { dst: record, src: source });
        } else {
            self.builder.emit(Op::ForInIterator { dst: record, src: source });
        }
        self.builder.registers().restore();

        let close_handler = if of {
            let exception = self.builder.alloc_register()?;
            let handler = self.builder.emit_push_handler(exception, true);
            self.handler_depth += 1;
            self.cleanups.push(Cleanup::IteratorClose { record });
            Some((handler, exception))
        } else {
            None
        };

        let top = self.builder.current_offset();
        self.builder.emit(Op::LoopHint);
        let value = self.temp_register(f.value_temp)?;
        self.builder.emit(Op::IteratorStep { dst: value, record });
        self.builder.registers().save();
        let done = self.builder.alloc_register()?;
        self.builder.emit(Op::IteratorDone { dst: done, record });
        let exit_jump = self.builder.emit_jump_if_true(done);
        self.builder.registers().restore();

        if let Some(slots) = f.iteration_slots {
            self.builder.emit(Op::PushScope { slots });
            self.scope_depth += 1;
        }
        self.push_label(f.label);
        self.compile_statements(&f.bind)?;
        self.compile_statements(&f.body)?;
        let continue_target = self.builder.current_offset();
        let break_jumps = self.pop_label(Some(continue_target))?;
        if f.iteration_slots.is_some() {
            self.builder.emit(Op::PopScope);
        }
        self.builder.emit_jump_to(top);

        // break: leave the iteration scope, then close the iterator
        for jump in break_jumps {
            self.builder.patch_jump(jump);
        }
        if f.iteration_slots.is_some() {
            self.builder.emit(Op::PopScope);
            self.scope_depth -= 1;
        }
        if of {
            self.builder.emit(Op::PopHandler);
            self.builder.emit(Op::IteratorClose { record });
        }
        let break_exit = self.builder.emit_jump();

        self.builder.patch_jump(exit_jump);
        if let Some((handler, exception)) = close_handler {
            self.builder.emit(Op::PopHandler);
            let skip = self.builder.emit_jump();
            self.builder.patch_jump(handler);
            self.builder.emit(Op::IteratorCloseQuiet { record });
            self.builder.emit(Op::Rethrow { src: exception });
            self.builder.patch_jump(skip);
            self.cleanups.pop();
            self.handler_depth -= 1;
        }
        self.builder.patch_jump(break_exit);
        self.builder.registers().restore();
        Ok(())
    }

    fn compile_switch(
        &mut self,
        label: LabelId,
        discriminant: &Expr,
        cases: &[SwitchCase],
    ) -> Result<(), JsError> {
        self.builder.registers().save();
        let value = self.builder.alloc_register()?;
        self.compile_expr(discriminant, value)?;
        let test = self.builder.alloc_register()?;
        let mut case_jumps = Vec::new();
        for (i, case) in cases.iter().enumerate() {
            if let Some(expr) = &case.test {
                self.compile_expr(expr, test)?;
                self.builder.emit(Op::Binary {
                    dst: test,
                    op: BinaryOp::StrictEq,
                    left: test,
                    right: value,
                });
                case_jumps.push((i, self.builder.emit_jump_if_true(test)));
            }
        }
        let default_jump = self.builder.emit_jump();
        let default_case = cases.iter().position(|c| c.test.is_none());
        self.builder.registers().restore();

        self.push_label(label);
        for (i, case) in cases.iter().enumerate() {
            for (_, jump) in case_jumps.iter().filter(|(index, _)| *index == i) {
                self.builder.patch_jump(*jump);
            }
            if default_case == Some(i) {
                self.builder.patch_jump(default_jump);
            }
            self.compile_statements(&case.body)?;
        }
        for jump in self.pop_label(None)? {
            self.builder.patch_jump(jump);
        }
        if default_case.is_none() {
            self.builder.patch_jump(default_jump);
        }
        Ok(())
    }

    fn compile_try_catch(&mut self, block: &[Stmt], catch: Option<&CatchBlock>) -> Result<(), JsError> {
        let Some(catch) = catch else {
            return self.compile_statements(block);
        };
        let exception = self.temp_register(catch.temp)?;
        let handler = self.builder.emit_push_handler(exception, false);
        self.handler_depth += 1;
        self.compile_statements(block)?;
        self.builder.emit(Op::PopHandler);
        self.handler_depth -= 1;
        let end_jump = self.builder.emit_jump();
        self.builder.patch_jump(handler);
        self.compile_statements(&catch.body)?;
        self.builder.patch_jump(end_jump);
        Ok(())
    }

    /// try/finally. Every way out of the protected part records a completion in
    /// `kind`/`value` and enters the finally body, which then dispatches on it.
    fn compile_try_finally(
        &mut self,
        block: &[Stmt],
        catch: Option<&CatchBlock>,
        finally: &[Stmt],
    ) -> Result<(), JsError> {
        self.builder.registers().save();
        let kind = self.builder.alloc_register()?;
        let value = self.builder.alloc_register()?;
        let handler = self.builder.emit_push_handler(value, true);
        self.cleanups.push(Cleanup::Finally(FinallyContext {
            kind,
            value,
            entry_jumps: Vec::new(),
            routes: Vec::new(),
            scope_depth: self.scope_depth,
            handler_depth: self.handler_depth,
        }));
        self.handler_depth += 1;

        self.compile_try_catch(block, catch)?;
        self.builder.emit(Op::PopHandler);
        self.builder.emit(Op::LoadInt {
            dst: kind,
            value: COMPLETION_NORMAL,
        });
        let normal_jump = self.builder.emit_jump();

        self.handler_depth -= 1;
        let Some(Cleanup::Finally(context)) = self.cleanups.pop() else {
            return Err(JsError::internal_error("finally context vanished"));
        };

        self.builder.patch_jump(handler);
        self.builder.emit(Op::LoadInt {
            dst: kind,
            value: COMPLETION_THROW,
        });
        self.builder.patch_jump(normal_jump);
        for jump in context.entry_jumps {
            self.builder.patch_jump(jump);
        }
        self.compile_statements(finally)?;

        let after = self.builder.emit_jump_if_int(kind, COMPLETION_NORMAL);
        let rethrow = self.builder.emit_jump_if_int(kind, COMPLETION_THROW);
        let ret = self.builder.emit_jump_if_int(kind, COMPLETION_RETURN);
        let mut route_jumps = Vec::with_capacity(context.routes.len());
        for (offset, _) in context.routes.iter().enumerate() {
            route_jumps.push(self.builder.emit_jump_if_int(kind, COMPLETION_JUMP + offset as i32));
        }
        let fallthrough = self.builder.emit_jump();

        self.builder.patch_jump(rethrow);
        self.builder.emit(Op::Rethrow { src: value });
        self.builder.patch_jump(ret);
        self.emit_return(value)?;
        for (jump, (label, is_continue)) in route_jumps.into_iter().zip(context.routes) {
            self.builder.patch_jump(jump);
            self.emit_label_jump(label, is_continue)?;
        }
        self.builder.patch_jump(after);
        self.builder.patch_jump(fallthrough);
        self.builder.registers().restore();
        Ok(())
    }

    /// Register aliasing a frame temp
    pub(super) fn temp_register(&self, temp: u32) -> Result<Register, JsError> {
        Register::try_from(temp).map_err(|_| JsError::internal_error("too many temporaries"))
    }
}
