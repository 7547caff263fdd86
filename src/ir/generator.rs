//! Generator bodies as state machines
//!
//! A generator can only suspend between blocks, so every construct that may contain
//! a `yield` is broken into basic blocks here. Exceptions route through each block's
//! handler; `finally` regions keep a pending completion that `EndFinally` resumes.
//!
//! Block-scoped bindings inside generator bodies always share the function scope, so
//! closures created in different loop iterations observe the same binding.

use crate::ast::{self, Expression, Statement, VariableKind};
use crate::error::JsError;
use crate::ir::lower::{BindMode, CfgTargets, LabelEntry, LabelKind, Lowerer, lexical_declarations, syntax_error};
use crate::ir::scope::DeclKind;
use crate::prelude::grow_stack;
use crate::ir::{
    Body, Expr, FinallyTarget, Handler, SmBlock, StateMachine, Stmt, Terminator,
};
use crate::value::JsString;

#[derive(Debug)]
struct PendingBlock {
    body: Vec<Stmt>,
    term: Option<Terminator>,
    handler: Option<Handler>,
}

/// Builds the blocks of one generator body
#[derive(Debug)]
pub(crate) struct SmBuilder {
    blocks: Vec<PendingBlock>,
    current: usize,
    /// Handler given to blocks created from now on
    handler: Option<Handler>,
    /// Enclosing `finally` regions, innermost last
    finally_stack: Vec<FinallyTarget>,
    finally_count: u32,
    /// Temp never written, read by implicit `return undefined`
    undefined_temp: u32,
}

impl SmBuilder {
    pub(crate) fn new(undefined_temp: u32) -> Self {
        Self {
            blocks: vec![PendingBlock {
                body: Vec::new(),
                term: None,
                handler: None,
            }],
            current: 0,
            handler: None,
            finally_stack: Vec::new(),
            finally_count: 0,
            undefined_temp,
        }
    }

    pub(crate) fn emit(&mut self, stmt: Stmt) {
        if let Some(block) = self.blocks.get_mut(self.current) {
            block.body.push(stmt);
        }
    }

    fn new_block(&mut self) -> usize {
        self.blocks.push(PendingBlock {
            body: Vec::new(),
            term: None,
            handler: self.handler,
        });
        self.blocks.len() - 1
    }

    fn switch_to(&mut self, block: usize) {
        self.current = block;
    }

    /// End the current block. Code lowered afterwards is unreachable and lands in a
    /// fresh block.
    fn terminate(&mut self, term: Terminator) {
        if let Some(block) = self.blocks.get_mut(self.current) {
            if block.term.is_none() {
                block.term = Some(term);
            }
        }
        self.current = self.new_block();
    }

    fn new_finally(&mut self) -> FinallyTarget {
        let fin = self.finally_count;
        self.finally_count += 1;
        FinallyTarget {
            fin,
            block: self.new_block(),
        }
    }

    fn innermost_finally(&self) -> Option<FinallyTarget> {
        self.finally_stack.last().copied()
    }

    fn finish(self) -> StateMachine {
        let undefined_temp = self.undefined_temp;
        StateMachine {
            blocks: self
                .blocks
                .into_iter()
                .map(|b| SmBlock {
                    body: b.body,
                    term: b.term.unwrap_or(Terminator::Return {
                        value: undefined_temp,
                        via: None,
                    }),
                    handler: b.handler,
                })
                .collect(),
            finally_count: self.finally_count,
        }
    }
}

impl Lowerer<'_> {
    // ============ BUILDER ACCESS ============

    fn new_block(&mut self) -> usize {
        self.fs.sm.as_mut().map(SmBuilder::new_block).unwrap_or_default()
    }

    fn switch_to(&mut self, block: usize) {
        if let Some(sm) = self.fs.sm.as_mut() {
            sm.switch_to(block);
        }
    }

    fn terminate(&mut self, term: Terminator) {
        if let Some(sm) = self.fs.sm.as_mut() {
            sm.terminate(term);
        }
    }

    fn handler(&self) -> Option<Handler> {
        self.fs.sm.as_ref().and_then(|sm| sm.handler)
    }

    fn set_handler(&mut self, handler: Option<Handler>) {
        if let Some(sm) = self.fs.sm.as_mut() {
            sm.handler = handler;
        }
    }

    fn finally_depth(&self) -> usize {
        self.fs.sm.as_ref().map_or(0, |sm| sm.finally_stack.len())
    }

    fn innermost_finally(&self) -> Option<FinallyTarget> {
        self.fs.sm.as_ref().and_then(SmBuilder::innermost_finally)
    }

    fn new_finally(&mut self) -> FinallyTarget {
        match self.fs.sm.as_mut() {
            Some(sm) => sm.new_finally(),
            None => FinallyTarget { fin: 0, block: 0 },
        }
    }

    fn push_finally(&mut self, target: FinallyTarget) {
        if let Some(sm) = self.fs.sm.as_mut() {
            sm.finally_stack.push(target);
        }
    }

    fn pop_finally(&mut self) {
        if let Some(sm) = self.fs.sm.as_mut() {
            sm.finally_stack.pop();
        }
    }

    /// Move the value of `expr` into a temp the terminator can name
    fn value_temp(&mut self, expr: Expr) -> u32 {
        match expr {
            Expr::Temp(t) => t,
            other => {
                let t = self.temp();
                self.emit(Stmt::Expr(Expr::SetTemp(t, Box::new(other))));
                t
            }
        }
    }

    fn branch(&mut self, test: Expr, then: usize, otherwise: usize) {
        let test = self.value_temp(test);
        self.terminate(Terminator::Branch {
            test,
            then,
            otherwise,
        });
    }

    /// Jump to `target`, running every `finally` between here and `depth` on the way
    fn jump_out(&mut self, target: usize, depth: usize) {
        let crossed: Vec<FinallyTarget> = self
            .fs
            .sm
            .as_ref()
            .map(|sm| sm.finally_stack.iter().skip(depth).copied().collect())
            .unwrap_or_default();
        let mut dest = target;
        for finally in crossed {
            let trampoline = self.new_block();
            let resume = self.fs.sm.as_ref().map_or(0, |sm| sm.current);
            self.switch_to(trampoline);
            self.terminate(Terminator::EnterFinally {
                finally,
                then: dest,
            });
            self.switch_to(resume);
            dest = trampoline;
        }
        self.terminate(Terminator::Goto(dest));
    }

    // ============ BODY ============

    pub(super) fn lower_generator_body(&mut self, body: &[Statement]) -> Result<Body, JsError> {
        let undefined_temp = self.temp();
        self.fs.sm = Some(SmBuilder::new(undefined_temp));
        let result = self.lower_statements(body);
        let sm = self.fs.sm.take();
        result?;
        let machine = sm.map(SmBuilder::finish).unwrap_or(StateMachine {
            blocks: Vec::new(),
            finally_count: 0,
        });
        log::trace!("generator state machine: {} blocks", machine.blocks.len());
        Ok(Body::StateMachine(machine))
    }

    // ============ STATEMENTS ============

    pub(super) fn lower_control_cfg(&mut self, stmt: &Statement) -> Result<(), JsError> {
        grow_stack(|| self.lower_control_cfg_unchecked(stmt))
    }

    fn lower_control_cfg_unchecked(&mut self, stmt: &Statement) -> Result<(), JsError> {
        match stmt {
            Statement::If(s) => {
                let test = self.lower_expr(&s.test)?;
                let then = self.new_block();
                let otherwise = self.new_block();
                let after = self.new_block();
                self.branch(test, then, otherwise);
                self.switch_to(then);
                self.lower_statement(&s.consequent)?;
                self.terminate(Terminator::Goto(after));
                self.switch_to(otherwise);
                if let Some(alt) = &s.alternate {
                    self.lower_statement(alt)?;
                }
                self.terminate(Terminator::Goto(after));
                self.switch_to(after);
                Ok(())
            }
            Statement::Switch(s) => self.lower_switch_cfg(s),
            Statement::For(_)
            | Statement::ForIn(_)
            | Statement::ForOf(_)
            | Statement::While(_)
            | Statement::DoWhile(_) => self.lower_loop_cfg(stmt, Vec::new()),
            Statement::Try(s) => self.lower_try_cfg(s),
            Statement::Return(s) => {
                let value = match &s.argument {
                    Some(arg) => self.lower_expr(arg)?,
                    None => Expr::Undefined,
                };
                let t = self.temp();
                self.emit(Stmt::Expr(Expr::SetTemp(t, Box::new(value))));
                let via = self.innermost_finally();
                self.terminate(Terminator::Return { value: t, via });
                Ok(())
            }
            Statement::Break(s) => {
                let targets = self
                    .find_break_entry(s.label.as_ref(), s.span)?
                    .targets
                    .ok_or_else(|| syntax_error(s.span, "Illegal break statement"))?;
                self.jump_out(targets.break_block, targets.break_depth);
                Ok(())
            }
            Statement::Continue(s) => {
                let targets = self
                    .find_continue_entry(s.label.as_ref(), s.span)?
                    .targets
                    .ok_or_else(|| syntax_error(s.span, "Illegal continue statement"))?;
                self.jump_out(targets.continue_block, targets.continue_depth);
                Ok(())
            }
            other => Err(syntax_error(other.span(), "Unexpected statement in generator")),
        }
    }

    pub(super) fn lower_labeled_cfg(&mut self, body: &Statement, names: Vec<JsString>) -> Result<(), JsError> {
        let after = self.new_block();
        let depth = self.finally_depth();
        let id = self.label_id();
        self.fs.labels.push(LabelEntry {
            names,
            id,
            kind: LabelKind::Statement,
            targets: Some(CfgTargets {
                break_block: after,
                break_depth: depth,
                continue_block: after,
                continue_depth: depth,
            }),
        });
        let result = self.lower_statement(body);
        self.fs.labels.pop();
        result?;
        self.terminate(Terminator::Goto(after));
        self.switch_to(after);
        Ok(())
    }

    fn push_loop_label(&mut self, names: Vec<JsString>, break_block: usize, continue_block: usize, continue_depth: usize) {
        let id = self.label_id();
        let break_depth = self.finally_depth();
        self.fs.labels.push(LabelEntry {
            names,
            id,
            kind: LabelKind::Loop,
            targets: Some(CfgTargets {
                break_block,
                break_depth,
                continue_block,
                continue_depth,
            }),
        });
    }

    pub(super) fn lower_loop_cfg(&mut self, stmt: &Statement, names: Vec<JsString>) -> Result<(), JsError> {
        match stmt {
            Statement::While(s) => {
                let head = self.new_block();
                let body = self.new_block();
                let after = self.new_block();
                self.terminate(Terminator::Goto(head));
                self.switch_to(head);
                let test = self.lower_expr(&s.test)?;
                self.branch(test, body, after);
                self.switch_to(body);
                let depth = self.finally_depth();
                self.push_loop_label(names, after, head, depth);
                let result = self.lower_statement(&s.body);
                self.fs.labels.pop();
                result?;
                self.terminate(Terminator::Goto(head));
                self.switch_to(after);
                Ok(())
            }
            Statement::DoWhile(s) => {
                let body = self.new_block();
                let test_block = self.new_block();
                let after = self.new_block();
                self.terminate(Terminator::Goto(body));
                self.switch_to(body);
                let depth = self.finally_depth();
                self.push_loop_label(names, after, test_block, depth);
                let result = self.lower_statement(&s.body);
                self.fs.labels.pop();
                result?;
                self.terminate(Terminator::Goto(test_block));
                self.switch_to(test_block);
                let test = self.lower_expr(&s.test)?;
                self.branch(test, body, after);
                self.switch_to(after);
                Ok(())
            }
            Statement::For(s) => self.lower_for_cfg(s, names),
            Statement::ForIn(s) => self.lower_for_each_cfg(&s.left, &s.right, &s.body, names, false),
            Statement::ForOf(s) => self.lower_for_each_cfg(&s.left, &s.right, &s.body, names, true),
            other => Err(syntax_error(other.span(), "Expected a loop")),
        }
    }

    fn lower_for_cfg(&mut self, s: &ast::ForStatement, names: Vec<JsString>) -> Result<(), JsError> {
        self.scopes.push(false);
        let result = self.lower_for_cfg_inner(s, names);
        self.scopes.pop();
        result
    }

    fn lower_for_cfg_inner(&mut self, s: &ast::ForStatement, names: Vec<JsString>) -> Result<(), JsError> {
        match &s.init {
            Some(ast::ForInit::Variable(decl)) => {
                if decl.kind != VariableKind::Var {
                    let kind = if decl.kind == VariableKind::Const {
                        DeclKind::Const
                    } else {
                        DeclKind::Let
                    };
                    let mut bound = Vec::new();
                    for declarator in &decl.declarations {
                        declarator.id.bound_names(&mut bound);
                    }
                    let lexicals: Vec<_> = bound.into_iter().map(|id| (id, kind)).collect();
                    let slots = self.declare_lexicals(&lexicals)?;
                    if !slots.is_empty() {
                        self.emit(Stmt::Uninitialize(slots));
                    }
                }
                self.lower_variable_declaration(decl)?;
            }
            Some(ast::ForInit::Expression(e)) => {
                let value = self.lower_expr(e)?;
                self.emit(Stmt::Expr(value));
            }
            None => {}
        }
        let head = self.new_block();
        let body = self.new_block();
        let update = self.new_block();
        let after = self.new_block();
        self.terminate(Terminator::Goto(head));
        self.switch_to(head);
        match &s.test {
            Some(test) => {
                let test = self.lower_expr(test)?;
                self.branch(test, body, after);
            }
            None => self.terminate(Terminator::Goto(body)),
        }
        self.switch_to(body);
        let depth = self.finally_depth();
        self.push_loop_label(names, after, update, depth);
        let result = self.lower_statement(&s.body);
        self.fs.labels.pop();
        result?;
        self.terminate(Terminator::Goto(update));
        self.switch_to(update);
        if let Some(u) = &s.update {
            let value = self.lower_expr(u)?;
            self.emit(Stmt::Expr(value));
        }
        self.terminate(Terminator::Goto(head));
        self.switch_to(after);
        Ok(())
    }

    fn lower_for_each_cfg(
        &mut self,
        left: &ast::ForInOfLeft,
        right: &Expression,
        body: &Statement,
        names: Vec<JsString>,
        of: bool,
    ) -> Result<(), JsError> {
        let source = self.lower_expr(right)?;
        let iterator = self.temp();
        let value = self.temp();
        let init = if of {
            Expr::GetIterator(Box::new(source))
        } else {
            Expr::ForInIterator(Box::new(source))
        };
        self.emit(Stmt::Expr(Expr::SetTemp(iterator, Box::new(init))));

        let outer_handler = self.handler();
        let after = self.new_block();
        let break_depth = self.finally_depth();
        // for-of closes the iterator when the loop is left early
        let close = of.then(|| self.new_finally());
        if let Some(finally) = close {
            self.set_handler(Some(Handler::Finally(finally)));
            self.push_finally(finally);
        }
        let head = self.new_block();
        let body_block = self.new_block();
        self.terminate(Terminator::Goto(head));
        self.switch_to(head);
        self.emit(Stmt::Expr(Expr::SetTemp(
            value,
            Box::new(Expr::IteratorStep(iterator)),
        )));
        self.branch(Expr::IteratorDone(iterator), after, body_block);
        self.switch_to(body_block);

        let id = self.label_id();
        let continue_depth = self.finally_depth();
        self.fs.labels.push(LabelEntry {
            names,
            id,
            kind: LabelKind::Loop,
            targets: Some(CfgTargets {
                break_block: after,
                break_depth,
                continue_block: head,
                continue_depth,
            }),
        });
        self.scopes.push(false);
        let result = self.bind_for_each_left(left, value).and_then(|_| self.lower_statement(body));
        self.scopes.pop();
        self.fs.labels.pop();
        result?;
        self.terminate(Terminator::Goto(head));

        if let Some(finally) = close {
            self.pop_finally();
            self.set_handler(outer_handler);
            self.switch_to(finally.block);
            self.emit(Stmt::Expr(Expr::IteratorClose(iterator)));
            let outer = self.innermost_finally();
            self.terminate(Terminator::EndFinally {
                fin: finally.fin,
                outer,
            });
        }
        self.switch_to(after);
        Ok(())
    }

    fn bind_for_each_left(&mut self, left: &ast::ForInOfLeft, value: u32) -> Result<(), JsError> {
        match left {
            ast::ForInOfLeft::Variable(VariableKind::Var, pattern) => {
                self.bind_pattern(pattern, Expr::Temp(value), BindMode::Declare(DeclKind::Var))
            }
            ast::ForInOfLeft::Variable(var_kind, pattern) => {
                let kind = if *var_kind == VariableKind::Const {
                    DeclKind::Const
                } else {
                    DeclKind::Let
                };
                let mut bound = Vec::new();
                pattern.bound_names(&mut bound);
                let lexicals: Vec<_> = bound.into_iter().map(|id| (id, kind)).collect();
                self.declare_lexicals(&lexicals)?;
                self.bind_pattern(pattern, Expr::Temp(value), BindMode::Declare(kind))
            }
            ast::ForInOfLeft::Pattern(pattern) => {
                self.bind_pattern(pattern, Expr::Temp(value), BindMode::Assign)
            }
        }
    }

    fn lower_switch_cfg(&mut self, s: &ast::SwitchStatement) -> Result<(), JsError> {
        let discriminant = self.lower_expr(&s.discriminant)?;
        let discriminant = self.value_temp(discriminant);

        self.scopes.push(false);
        let result = self.lower_switch_cases_cfg(s, discriminant);
        self.scopes.pop();
        result
    }

    fn lower_switch_cases_cfg(&mut self, s: &ast::SwitchStatement, discriminant: u32) -> Result<(), JsError> {
        let all: Vec<Statement> = s
            .cases
            .iter()
            .flat_map(|c| c.consequent.iter().cloned())
            .collect();
        let slots = self.declare_lexicals(&lexical_declarations(&all))?;
        if !slots.is_empty() {
            self.emit(Stmt::Uninitialize(slots));
        }
        self.hoist_functions(&all)?;

        let after = self.new_block();
        let case_blocks: Vec<usize> = s.cases.iter().map(|_| self.new_block()).collect();
        let mut default_block = None;
        for (case, block) in s.cases.iter().zip(&case_blocks) {
            let Some(test) = &case.test else {
                default_block = Some(*block);
                continue;
            };
            let test = self.lower_expr(test)?;
            let next = self.new_block();
            let matches = Expr::Binary(
                ast::BinaryOp::StrictEq,
                Box::new(Expr::Temp(discriminant)),
                Box::new(test),
            );
            self.branch(matches, *block, next);
            self.switch_to(next);
        }
        self.terminate(Terminator::Goto(default_block.unwrap_or(after)));

        let id = self.label_id();
        let depth = self.finally_depth();
        self.fs.labels.push(LabelEntry {
            names: Vec::new(),
            id,
            kind: LabelKind::Switch,
            targets: Some(CfgTargets {
                break_block: after,
                break_depth: depth,
                continue_block: after,
                continue_depth: depth,
            }),
        });
        let mut result = Ok(());
        for (i, case) in s.cases.iter().enumerate() {
            let Some(block) = case_blocks.get(i) else { continue };
            self.switch_to(*block);
            result = self.lower_statements(&case.consequent);
            if result.is_err() {
                break;
            }
            let fallthrough = case_blocks.get(i + 1).copied().unwrap_or(after);
            self.terminate(Terminator::Goto(fallthrough));
        }
        self.fs.labels.pop();
        result?;
        self.switch_to(after);
        Ok(())
    }

    fn lower_try_cfg(&mut self, s: &ast::TryStatement) -> Result<(), JsError> {
        let outer_handler = self.handler();
        let after = self.new_block();
        let finally = s.finalizer.as_ref().map(|_| self.new_finally());
        let inner_handler = finally.map(Handler::Finally).or(outer_handler);

        self.set_handler(inner_handler);
        let catch = match &s.handler {
            Some(_) => Some((self.new_block(), self.temp())),
            None => None,
        };
        if let Some(f) = finally {
            self.push_finally(f);
        }
        let leave = |this: &mut Self| match finally {
            Some(f) => this.terminate(Terminator::EnterFinally {
                finally: f,
                then: after,
            }),
            None => this.terminate(Terminator::Goto(after)),
        };

        let try_handler = match catch {
            Some((target, temp)) => Some(Handler::Catch { target, temp }),
            None => inner_handler,
        };
        self.set_handler(try_handler);
        let try_block = self.new_block();
        self.terminate(Terminator::Goto(try_block));
        self.switch_to(try_block);
        let mut result = self.lower_block(&s.block.body);
        if result.is_ok() {
            leave(self);
        }
        self.set_handler(inner_handler);

        if let (Some((target, temp)), Some(handler), Ok(())) = (catch, &s.handler, &result) {
            self.switch_to(target);
            result = self.lower_catch_cfg(handler, temp);
            if result.is_ok() {
                leave(self);
            }
        }

        if let Some(f) = finally {
            self.pop_finally();
            self.set_handler(outer_handler);
            if let (Some(block), Ok(())) = (&s.finalizer, &result) {
                self.switch_to(f.block);
                result = self.lower_block(&block.body);
                let outer = self.innermost_finally();
                self.terminate(Terminator::EndFinally { fin: f.fin, outer });
            }
        }
        self.set_handler(outer_handler);
        result?;
        self.switch_to(after);
        Ok(())
    }

    fn lower_catch_cfg(&mut self, handler: &ast::CatchClause, temp: u32) -> Result<(), JsError> {
        let Some(param) = &handler.param else {
            return self.lower_block(&handler.body.body);
        };
        self.scopes.push(false);
        let mut bound = Vec::new();
        param.bound_names(&mut bound);
        let mut slots = Vec::new();
        for id in &bound {
            slots.push(self.scopes.declare(&id.name, DeclKind::CatchParam));
        }
        self.emit(Stmt::Uninitialize(slots));
        let result = self
            .bind_pattern(param, Expr::Temp(temp), BindMode::Declare(DeclKind::CatchParam))
            .and_then(|_| self.lower_block(&handler.body.body));
        self.scopes.pop();
        result
    }

    // ============ EXPRESSIONS ============

    pub(super) fn lower_yield(&mut self, y: &ast::YieldExpression) -> Result<Expr, JsError> {
        if !self.cfg_mode() {
            return Err(syntax_error(y.span, "Unsupported position for yield"));
        }
        let value = match &y.argument {
            Some(arg) => self.lower_expr(arg)?,
            None => Expr::Undefined,
        };
        let on_return = self.innermost_finally();
        let resume = self.new_block();
        if y.delegate {
            let iterator = self.temp();
            self.emit(Stmt::Expr(Expr::SetTemp(
                iterator,
                Box::new(Expr::GetIterator(Box::new(value))),
            )));
            let result = self.temp();
            self.terminate(Terminator::YieldDelegate {
                iterator,
                resume,
                result,
                on_return,
            });
            self.switch_to(resume);
            return Ok(Expr::Temp(result));
        }
        let value = {
            let t = self.temp();
            self.emit(Stmt::Expr(Expr::SetTemp(t, Box::new(value))));
            t
        };
        let sent = self.temp();
        self.terminate(Terminator::Yield {
            value,
            resume,
            sent,
            on_return,
        });
        self.switch_to(resume);
        Ok(Expr::Temp(sent))
    }

    /// `a && yield b` and friends: the right side gets its own block
    pub(super) fn lower_logical_cfg(&mut self, logical: &ast::LogicalExpression) -> Result<Expr, JsError> {
        let left = self.lower_expr(&logical.left)?;
        let t = self.temp();
        self.emit(Stmt::Expr(Expr::SetTemp(t, Box::new(left))));
        let right_block = self.new_block();
        let after = self.new_block();
        match logical.operator {
            ast::LogicalOp::And => self.branch(Expr::Temp(t), right_block, after),
            ast::LogicalOp::Or => self.branch(Expr::Temp(t), after, right_block),
            ast::LogicalOp::NullishCoalescing => {
                let nullish = Expr::Binary(
                    ast::BinaryOp::Eq,
                    Box::new(Expr::Temp(t)),
                    Box::new(Expr::Null),
                );
                self.branch(nullish, right_block, after);
            }
        }
        self.switch_to(right_block);
        let right = self.lower_expr(&logical.right)?;
        self.emit(Stmt::Expr(Expr::SetTemp(t, Box::new(right))));
        self.terminate(Terminator::Goto(after));
        self.switch_to(after);
        Ok(Expr::Temp(t))
    }

    pub(super) fn lower_conditional_cfg(&mut self, cond: &ast::ConditionalExpression) -> Result<Expr, JsError> {
        let test = self.lower_expr(&cond.test)?;
        let t = self.temp();
        let then = self.new_block();
        let otherwise = self.new_block();
        let after = self.new_block();
        self.branch(test, then, otherwise);
        for (block, arm) in [(then, &cond.consequent), (otherwise, &cond.alternate)] {
            self.switch_to(block);
            let value = self.lower_expr(arm)?;
            self.emit(Stmt::Expr(Expr::SetTemp(t, Box::new(value))));
            self.terminate(Terminator::Goto(after));
        }
        self.switch_to(after);
        Ok(Expr::Temp(t))
    }

    /// Default value whose initializer suspends
    pub(super) fn default_value_cfg(
        &mut self,
        value: Expr,
        default: &Expression,
        name: Option<&JsString>,
    ) -> Result<Expr, JsError> {
        let t = self.temp();
        self.emit(Stmt::Expr(Expr::SetTemp(t, Box::new(value))));
        let fallback = self.new_block();
        let after = self.new_block();
        let missing = Expr::Binary(
            ast::BinaryOp::StrictEq,
            Box::new(Expr::Temp(t)),
            Box::new(Expr::Undefined),
        );
        self.branch(missing, fallback, after);
        self.switch_to(fallback);
        let value = self.lower_expr_named(default, name)?;
        self.emit(Stmt::Expr(Expr::SetTemp(t, Box::new(value))));
        self.terminate(Terminator::Goto(after));
        self.switch_to(after);
        Ok(Expr::Temp(t))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ParseOptions;
    use crate::ir::{Body, FunctionTemplate, Handler, Terminator, lower_program};
    use crate::parser::Parser;
    use crate::string_dict::StringDict;
    use std::rc::Rc;

    fn generator(source: &str) -> Rc<FunctionTemplate> {
        let mut dict = StringDict::new();
        let program = Parser::new(source, &mut dict, ParseOptions::default())
            .parse_program()
            .unwrap();
        let script = lower_program(&program, source).unwrap();
        script.nested_templates().into_iter().next().unwrap()
    }

    fn machine(template: &FunctionTemplate) -> &crate::ir::StateMachine {
        match &template.body {
            Body::StateMachine(m) => m,
            Body::Statements(_) => panic!("Expected a state machine"),
        }
    }

    #[test]
    fn yield_inside_try_finally_routes_return_through_finally() {
        let g = generator("function* g() { try { yield 1; } finally { log(); } }");
        let m = machine(&g);
        assert_eq!(m.finally_count, 1);
        let on_return = m.blocks.iter().find_map(|b| match &b.term {
            Terminator::Yield { on_return, .. } => Some(*on_return),
            _ => None,
        });
        assert!(matches!(on_return, Some(Some(_))));
        assert!(m
            .blocks
            .iter()
            .any(|b| matches!(b.term, Terminator::EndFinally { outer: None, .. })));
    }

    #[test]
    fn catch_blocks_are_exception_targets() {
        let g = generator("function* g() { try { yield 1; } catch (e) { yield e; } }");
        let m = machine(&g);
        let target = m.blocks.iter().find_map(|b| match b.handler {
            Some(Handler::Catch { target, .. }) => Some(target),
            _ => None,
        });
        let Some(target) = target else {
            panic!("Expected a catch handler");
        };
        assert!(target < m.blocks.len());
    }

    #[test]
    fn for_of_closes_its_iterator_on_break() {
        let g = generator("function* g(xs) { for (const x of xs) { if (x) break; yield x; } }");
        let m = machine(&g);
        assert_eq!(m.finally_count, 1);
        assert!(m
            .blocks
            .iter()
            .any(|b| matches!(b.term, Terminator::EnterFinally { .. })));
    }
}
