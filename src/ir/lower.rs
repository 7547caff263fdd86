//! AST to IR lowering
//!
//! One pass over the AST per compilation unit. Identifiers are resolved against a
//! [`ScopeChain`] as they are met; everything the parser accepted but the runtime
//! should not have to interpret (patterns, defaults, optional chains, hoisting) is
//! spelled out as plain IR here.

use std::cell::OnceCell;
use std::rc::Rc;

use crate::ast::{self, Expression, Pattern, Statement, VariableKind};
use crate::error::JsError;
use crate::ir::generator::SmBuilder;
use crate::ir::scope::{DeclKind, ScopeChain};
use crate::ir::visit::{
    FunctionUsage, contains_closure, contains_yield, pattern_contains_yield, script_usage,
    statement_contains_closure, var_declared_names,
};
use crate::ir::{
    Arg, ArrayItem, Binding, Body, CatchBlock, ClassDef, ClassMember, Callee, Expr, ForEachStmt,
    FunctionKind, FunctionTemplate, Key, LabelId, LoopStmt, MethodKind, ObjectItem, Stmt,
    SwitchCase, Target, TemplateSite, WriteMode, next_site_id, next_template_id,
};
use crate::lexer::Span;
use crate::prelude::grow_stack;
use crate::value::{CheapClone, JsString, PropertyKey};

/// Deepest statement or expression nesting lowering accepts. Binary chains are built
/// iteratively by the parser, so this is the bound on tree depth for every later pass.
const MAX_DEPTH: u32 = 4_096;

/// Lower a parsed script into the template of its top level. `source` is the text the
/// program was parsed from, used for `Function.prototype.toString`.
pub fn lower_program(program: &ast::Program, source: &str) -> Result<Rc<FunctionTemplate>, JsError> {
    let mut lowerer = Lowerer {
        source,
        scopes: ScopeChain::new(),
        fs: FunctionState::new(FunctionKind::Script, program.strict, false),
        depth: 0,
    };
    lowerer.scopes.push_global();
    let lowered = lowerer.lower_script(program);
    let slot_count = lowerer.scopes.pop();
    let (prologue, body) = lowered?;
    log::debug!(
        "lowered script: {} slots, {} temps",
        slot_count,
        lowerer.fs.temp_count
    );
    Ok(Rc::new(FunctionTemplate {
        id: next_template_id(),
        name: JsString::from(""),
        kind: FunctionKind::Script,
        generator: false,
        strict: program.strict,
        length: 0,
        slot_count,
        temp_count: lowerer.fs.temp_count,
        this_slot: None,
        prologue,
        body: Body::Statements(body),
        span: program.span,
        doc: None,
        source_text: None,
        chunk: OnceCell::new(),
    }))
}

pub(super) fn syntax_error(span: Span, message: impl Into<String>) -> JsError {
    JsError::syntax_error(message, span.line, span.column)
}

/// How a pattern stores what it destructures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum BindMode {
    Declare(DeclKind),
    Assign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum LabelKind {
    Loop,
    Switch,
    Statement,
}

/// Jump targets of a label inside a generator state machine
#[derive(Debug, Clone, Copy)]
pub(super) struct CfgTargets {
    pub break_block: usize,
    pub break_depth: usize,
    pub continue_block: usize,
    pub continue_depth: usize,
}

#[derive(Debug)]
pub(super) struct LabelEntry {
    pub names: Vec<JsString>,
    pub id: LabelId,
    pub kind: LabelKind,
    pub targets: Option<CfgTargets>,
}

/// Per-function lowering state; swapped out while a nested function is lowered
pub(super) struct FunctionState {
    pub kind: FunctionKind,
    pub strict: bool,
    pub generator: bool,
    pub temp_count: u32,
    next_label: u32,
    pub labels: Vec<LabelEntry>,
    /// Statement sinks; generator bodies emit into `sm` when none is open
    pub buffers: Vec<Vec<Stmt>>,
    pub sm: Option<SmBuilder>,
    /// Script top level: expression statements record the completion value here
    completion: Option<u32>,
    this_slot: Option<u32>,
}

impl FunctionState {
    fn new(kind: FunctionKind, strict: bool, generator: bool) -> Self {
        Self {
            kind,
            strict,
            generator,
            temp_count: 0,
            next_label: 0,
            labels: Vec::new(),
            buffers: Vec::new(),
            sm: None,
            completion: None,
            this_slot: None,
        }
    }
}

pub(super) struct Lowerer<'s> {
    source: &'s str,
    pub scopes: ScopeChain,
    pub fs: FunctionState,
    /// Current statement and expression nesting
    depth: u32,
}

impl<'s> Lowerer<'s> {
    // ============ PLUMBING ============

    /// Run `f` one tree level deeper
    fn nested<T>(
        &mut self,
        span: Span,
        f: impl FnOnce(&mut Self) -> Result<T, JsError>,
    ) -> Result<T, JsError> {
        if self.depth >= MAX_DEPTH {
            return Err(syntax_error(span, "Expression nested too deeply"));
        }
        self.depth += 1;
        let result = grow_stack(|| f(self));
        self.depth -= 1;
        result
    }

    pub(super) fn temp(&mut self) -> u32 {
        let t = self.fs.temp_count;
        self.fs.temp_count += 1;
        t
    }

    pub(super) fn label_id(&mut self) -> LabelId {
        let id = LabelId(self.fs.next_label);
        self.fs.next_label += 1;
        id
    }

    /// Lowering a generator body straight into state machine blocks
    pub(super) fn cfg_mode(&self) -> bool {
        self.fs.sm.is_some() && self.fs.buffers.is_empty()
    }

    /// Whether `expr` suspends, forcing earlier operands into temps
    pub(super) fn yields(&self, expr: &Expression) -> bool {
        self.cfg_mode() && contains_yield(expr)
    }

    pub(super) fn emit(&mut self, stmt: Stmt) {
        if let Some(buffer) = self.fs.buffers.last_mut() {
            buffer.push(stmt);
        } else if let Some(sm) = self.fs.sm.as_mut() {
            sm.emit(stmt);
        }
    }

    /// Run `f` with a fresh statement sink and return what it emitted
    pub(super) fn collect<F>(&mut self, f: F) -> Result<Vec<Stmt>, JsError>
    where
        F: FnOnce(&mut Self) -> Result<(), JsError>,
    {
        self.fs.buffers.push(Vec::new());
        let result = f(self);
        let stmts = self.fs.buffers.pop().unwrap_or_default();
        result.map(|_| stmts)
    }

    /// Park a value in a temp so later operands may suspend
    pub(super) fn spill(&mut self, expr: Expr) -> Expr {
        match expr {
            Expr::Undefined
            | Expr::Null
            | Expr::Bool(_)
            | Expr::Number(_)
            | Expr::String(_)
            | Expr::Temp(_) => expr,
            other => {
                let t = self.temp();
                self.emit(Stmt::Expr(Expr::SetTemp(t, Box::new(other))));
                Expr::Temp(t)
            }
        }
    }

    fn source_text(&self, span: Span) -> Option<Rc<str>> {
        self.source.get(span.start..span.end).map(Rc::from)
    }

    // ============ SCRIPTS AND FUNCTIONS ============

    fn lower_script(&mut self, program: &ast::Program) -> Result<(Vec<Stmt>, Vec<Stmt>), JsError> {
        let usage = script_usage(&program.body);
        let this_slot = usage
            .arrow_this
            .then(|| self.scopes.declare(&JsString::from("this"), DeclKind::Implicit));

        let mut vars: Vec<JsString> = Vec::new();
        for id in var_declared_names(&program.body) {
            if !vars.contains(&id.name) {
                vars.push(id.name);
            }
        }
        let functions: Vec<&Rc<ast::Function>> = program
            .body
            .iter()
            .filter_map(|s| match s {
                Statement::FunctionDeclaration(f) => Some(f),
                _ => None,
            })
            .collect();
        for f in &functions {
            if let Some(id) = &f.id {
                if !vars.contains(&id.name) {
                    vars.push(id.name.cheap_clone());
                }
            }
        }
        let mut lexicals: Vec<(JsString, bool)> = Vec::new();
        for (id, kind) in lexical_declarations(&program.body) {
            if kind == DeclKind::Function {
                continue;
            }
            if lexicals.iter().any(|(n, _)| *n == id.name) || vars.contains(&id.name) {
                return Err(already_declared(&id));
            }
            lexicals.push((id.name, kind == DeclKind::Const));
        }

        let completion = self.temp();
        self.fs.completion = Some(completion);

        let prologue = self.collect(|this| {
            this.emit(Stmt::DeclareGlobals { vars, lexicals });
            if let Some(slot) = this_slot {
                this.emit(init_local("this", slot, Expr::This));
            }
            for f in functions {
                let Some(id) = &f.id else { continue };
                let template = this.lower_function(f, id.name.cheap_clone(), false, false)?;
                this.emit(Stmt::Expr(Expr::Assign {
                    target: Box::new(Target::Global(id.name.cheap_clone())),
                    value: Box::new(Expr::Function(template)),
                }));
            }
            Ok(())
        })?;
        let body = self.collect(|this| {
            this.lower_statements(&program.body)?;
            this.emit(Stmt::Return(Some(Expr::Temp(completion))));
            Ok(())
        })?;
        Ok((prologue, body))
    }

    /// Lower a function into its own template. `self_binding` makes the function's
    /// name visible inside its body (named function expressions).
    pub(super) fn lower_function(
        &mut self,
        func: &ast::Function,
        name: JsString,
        self_binding: bool,
        force_strict: bool,
    ) -> Result<Rc<FunctionTemplate>, JsError> {
        let kind = match func.kind {
            ast::FunctionKind::Normal => FunctionKind::Normal,
            ast::FunctionKind::Arrow => FunctionKind::Arrow,
            ast::FunctionKind::Method => FunctionKind::Method,
            ast::FunctionKind::Getter => FunctionKind::Getter,
            ast::FunctionKind::Setter => FunctionKind::Setter,
            ast::FunctionKind::ClassConstructor => FunctionKind::ClassConstructor,
        };
        self.lower_function_as(func, name, kind, self_binding, force_strict)
    }

    pub(super) fn lower_function_as(
        &mut self,
        func: &ast::Function,
        name: JsString,
        kind: FunctionKind,
        self_binding: bool,
        force_strict: bool,
    ) -> Result<Rc<FunctionTemplate>, JsError> {
        let strict = func.strict || force_strict;
        let outer = std::mem::replace(
            &mut self.fs,
            FunctionState::new(kind, strict, func.generator),
        );
        self.scopes.push(true);
        let lowered = self.lower_function_parts(func, kind, self_binding);
        let slot_count = self.scopes.pop();
        let state = std::mem::replace(&mut self.fs, outer);
        let (prologue, body) = lowered?;

        let length = func
            .params
            .iter()
            .take_while(|p| !matches!(p, Pattern::Assignment(_) | Pattern::Rest(_)))
            .count() as u32;
        Ok(Rc::new(FunctionTemplate {
            id: next_template_id(),
            name,
            kind,
            generator: func.generator,
            strict,
            length,
            slot_count,
            temp_count: state.temp_count,
            this_slot: state.this_slot,
            prologue,
            body,
            span: func.span,
            doc: func.doc.clone(),
            source_text: self.source_text(func.span),
            chunk: OnceCell::new(),
        }))
    }

    fn lower_function_parts(
        &mut self,
        func: &ast::Function,
        kind: FunctionKind,
        self_binding: bool,
    ) -> Result<(Vec<Stmt>, Body), JsError> {
        let usage = FunctionUsage::of(func);
        let body_stmts: &[Statement] = match &func.body {
            ast::FunctionBody::Block(stmts) => stmts,
            ast::FunctionBody::Expression(_) => &[],
        };

        let mut params = Vec::new();
        for param in &func.params {
            param.bound_names(&mut params);
        }
        for id in &params {
            self.scopes.declare(&id.name, DeclKind::Param);
        }

        let mut implicit: Vec<(JsString, u32, Expr)> = Vec::new();
        if kind != FunctionKind::Arrow {
            let this_name = JsString::from("this");
            if kind == FunctionKind::DerivedConstructor {
                self.fs.this_slot = Some(self.scopes.declare(&this_name, DeclKind::Implicit));
            } else if usage.arrow_this {
                let slot = self.scopes.declare(&this_name, DeclKind::Implicit);
                implicit.push((this_name, slot, Expr::This));
            }
            if usage.arrow_new_target {
                let name = JsString::from("new.target");
                let slot = self.scopes.declare(&name, DeclKind::Implicit);
                implicit.push((name, slot, Expr::NewTarget));
            }
            if kind == FunctionKind::DerivedConstructor && usage.arrow_super_call {
                let name = JsString::from("%active");
                let slot = self.scopes.declare(&name, DeclKind::Implicit);
                implicit.push((name, slot, Expr::Callee));
            }
            if usage.arguments && self.scopes.lookup_local("arguments").is_none() {
                let name = JsString::from("arguments");
                let slot = self.scopes.declare(&name, DeclKind::Implicit);
                implicit.push((name, slot, Expr::ArgumentsObject));
            }
        }

        let mut fresh_vars = Vec::new();
        for id in var_declared_names(body_stmts) {
            if self.scopes.lookup_local(id.name.as_str()).is_none() {
                let slot = self.scopes.declare(&id.name, DeclKind::Var);
                fresh_vars.push((id.name, slot));
            }
        }
        let functions: Vec<&Rc<ast::Function>> = body_stmts
            .iter()
            .filter_map(|s| match s {
                Statement::FunctionDeclaration(f) => Some(f),
                _ => None,
            })
            .collect();
        for f in &functions {
            if let Some(id) = &f.id {
                self.scopes.declare(&id.name, DeclKind::Function);
            }
        }
        for (id, decl_kind) in lexical_declarations(body_stmts) {
            if decl_kind == DeclKind::Function {
                continue;
            }
            if self.scopes.lookup_local(id.name.as_str()).is_some() {
                return Err(already_declared(&id));
            }
            self.scopes.declare(&id.name, decl_kind);
        }
        if let Some(id) = func.id.as_ref().filter(|_| self_binding) {
            if self.scopes.lookup_local(id.name.as_str()).is_none() {
                let slot = self.scopes.declare(&id.name, DeclKind::CalleeName);
                implicit.push((id.name.cheap_clone(), slot, Expr::Callee));
            }
        }

        let prologue = self.collect(|this| {
            for (name, slot, value) in implicit {
                this.emit(Stmt::Expr(Expr::Assign {
                    target: Box::new(Target::Local {
                        binding: Binding {
                            name,
                            hops: 0,
                            slot,
                        },
                        mode: WriteMode::Init,
                    }),
                    value: Box::new(value),
                }));
            }
            this.bind_parameters(func)?;
            for (name, slot) in fresh_vars {
                this.emit(init_local_named(name, slot, Expr::Undefined));
            }
            for f in functions {
                this.hoist_function(f)?;
            }
            Ok(())
        })?;

        let body = if func.generator {
            self.lower_generator_body(body_stmts)?
        } else {
            Body::Statements(self.collect(|this| match &func.body {
                ast::FunctionBody::Block(stmts) => this.lower_statements(stmts),
                ast::FunctionBody::Expression(e) => {
                    let value = this.lower_expr(e)?;
                    this.emit(Stmt::Return(Some(value)));
                    Ok(())
                }
            })?)
        };
        Ok((prologue, body))
    }

    fn bind_parameters(&mut self, func: &ast::Function) -> Result<(), JsError> {
        for (i, param) in func.params.iter().enumerate() {
            let index = i as u32;
            match param {
                Pattern::Rest(rest) => self.bind_pattern(
                    &rest.argument,
                    Expr::RestArgs(index),
                    BindMode::Declare(DeclKind::Param),
                )?,
                other => {
                    self.bind_pattern(other, Expr::Arg(index), BindMode::Declare(DeclKind::Param))?
                }
            }
        }
        Ok(())
    }

    /// Initialize a function declaration at the start of its scope
    fn hoist_function(&mut self, func: &Rc<ast::Function>) -> Result<(), JsError> {
        let Some(id) = &func.id else {
            return Ok(());
        };
        let template = self.lower_function(func, id.name.cheap_clone(), false, false)?;
        let target = self.declaration_target(id, DeclKind::Function);
        self.emit(Stmt::Expr(Expr::Assign {
            target: Box::new(target),
            value: Box::new(Expr::Function(template)),
        }));
        Ok(())
    }

    pub(super) fn hoist_functions(&mut self, body: &[Statement]) -> Result<(), JsError> {
        for stmt in body {
            if let Statement::FunctionDeclaration(f) = stmt {
                self.hoist_function(f)?;
            }
        }
        Ok(())
    }

    // ============ STATEMENTS ============

    pub(super) fn lower_statements(&mut self, stmts: &[Statement]) -> Result<(), JsError> {
        for stmt in stmts {
            self.lower_statement(stmt)?;
        }
        Ok(())
    }

    pub(super) fn lower_statement(&mut self, stmt: &Statement) -> Result<(), JsError> {
        self.nested(stmt.span(), |this| this.lower_statement_unchecked(stmt))
    }

    fn lower_statement_unchecked(&mut self, stmt: &Statement) -> Result<(), JsError> {
        match stmt {
            Statement::VariableDeclaration(decl) => self.lower_variable_declaration(decl),
            Statement::FunctionDeclaration(_) | Statement::Empty(_) | Statement::Debugger(_) => {
                Ok(())
            }
            Statement::ClassDeclaration(class) => {
                let Some(id) = &class.id else {
                    return Err(syntax_error(class.span, "Class declaration requires a name"));
                };
                let value = self.lower_class(class, Some(&id.name), true)?;
                let target = self.declaration_target(id, DeclKind::Class);
                self.emit(Stmt::Expr(Expr::Assign {
                    target: Box::new(target),
                    value: Box::new(value),
                }));
                Ok(())
            }
            Statement::Expression(s) => {
                let value = self.lower_expr(&s.expression)?;
                match self.fs.completion {
                    Some(t) => self.emit(Stmt::Expr(Expr::SetTemp(t, Box::new(value)))),
                    None => self.emit(Stmt::Expr(value)),
                }
                Ok(())
            }
            Statement::Throw(s) => {
                let value = self.lower_expr(&s.argument)?;
                self.emit(Stmt::Throw(value));
                Ok(())
            }
            Statement::Block(block) => self.lower_block(&block.body),
            Statement::Labeled(s) => self.lower_labeled(s),
            _ if self.cfg_mode() => self.lower_control_cfg(stmt),
            Statement::If(s) => {
                let test = self.lower_expr(&s.test)?;
                let then = self.collect(|this| this.lower_statement(&s.consequent))?;
                let otherwise = match &s.alternate {
                    Some(alt) => self.collect(|this| this.lower_statement(alt))?,
                    None => Vec::new(),
                };
                self.emit(Stmt::If {
                    test,
                    then,
                    otherwise,
                });
                Ok(())
            }
            Statement::Switch(s) => self.lower_switch(s),
            Statement::For(_)
            | Statement::ForIn(_)
            | Statement::ForOf(_)
            | Statement::While(_)
            | Statement::DoWhile(_) => self.lower_loop(stmt, Vec::new()),
            Statement::Try(s) => self.lower_try(s),
            Statement::Return(s) => {
                let value = match &s.argument {
                    Some(arg) => Some(self.lower_expr(arg)?),
                    None => None,
                };
                self.emit(Stmt::Return(value));
                Ok(())
            }
            Statement::Break(s) => {
                let entry = self.break_target(s.label.as_ref(), s.span)?;
                self.emit(Stmt::Break(entry));
                Ok(())
            }
            Statement::Continue(s) => {
                let entry = self.continue_target(s.label.as_ref(), s.span)?;
                self.emit(Stmt::Continue(entry));
                Ok(())
            }
        }
    }

    pub(super) fn lower_variable_declaration(&mut self, decl: &ast::VariableDeclaration) -> Result<(), JsError> {
        let kind = match decl.kind {
            VariableKind::Var => DeclKind::Var,
            VariableKind::Let => DeclKind::Let,
            VariableKind::Const => DeclKind::Const,
        };
        for declarator in &decl.declarations {
            match (&declarator.id, &declarator.init) {
                (Pattern::Identifier(_), None) if kind == DeclKind::Var => {}
                (pattern, init) => {
                    let value = match init {
                        Some(e) => self.lower_expr_named(e, pattern_name(pattern))?,
                        None => Expr::Undefined,
                    };
                    self.bind_pattern(pattern, value, BindMode::Declare(kind))?;
                }
            }
        }
        Ok(())
    }

    /// Where a declaration of `id` writes its initial value
    pub(super) fn declaration_target(&mut self, id: &ast::Identifier, kind: DeclKind) -> Target {
        if self.scopes.is_global_level() && self.scopes.resolve(id.name.as_str()).is_none() {
            return if kind.is_lexical() {
                Target::GlobalLexicalInit(id.name.cheap_clone())
            } else {
                Target::Global(id.name.cheap_clone())
            };
        }
        match self.scopes.resolve(id.name.as_str()) {
            Some((binding, _)) => Target::Local {
                binding,
                mode: if kind == DeclKind::Var {
                    WriteMode::Assign
                } else {
                    WriteMode::Init
                },
            },
            None => Target::Global(id.name.cheap_clone()),
        }
    }

    /// Block with its own lexical declarations
    pub(super) fn lower_block(&mut self, body: &[Statement]) -> Result<(), JsError> {
        let lexicals = lexical_declarations(body);
        if lexicals.is_empty() {
            return self.lower_statements(body);
        }
        let materialize = !self.cfg_mode() && contains_closure(body);
        self.scopes.push(materialize);
        let declared = self.declare_lexicals(&lexicals);
        let result = match declared {
            Ok(_) if materialize => self
                .collect(|this| {
                    this.hoist_functions(body)?;
                    this.lower_statements(body)
                })
                .map(Some),
            Ok(slots) => {
                if !slots.is_empty() {
                    self.emit(Stmt::Uninitialize(slots));
                }
                self.hoist_functions(body)
                    .and_then(|_| self.lower_statements(body))
                    .map(|_| None)
            }
            Err(e) => Err(e),
        };
        let slot_count = self.scopes.pop();
        if let Some(inner) = result? {
            self.emit(Stmt::Scoped {
                slots: slot_count,
                body: inner,
            });
        }
        Ok(())
    }

    /// Declare block-level bindings, returning the slots that start uninitialized
    pub(super) fn declare_lexicals(
        &mut self,
        lexicals: &[(ast::Identifier, DeclKind)],
    ) -> Result<Vec<u32>, JsError> {
        let mut slots = Vec::new();
        for (id, kind) in lexicals {
            if let Some(existing) = self.scopes.lookup_local(id.name.as_str()) {
                let both_functions = existing.kind == DeclKind::Function && *kind == DeclKind::Function;
                if !both_functions {
                    return Err(already_declared(id));
                }
            }
            let slot = self.scopes.declare(&id.name, *kind);
            if *kind != DeclKind::Function {
                slots.push(slot);
            }
        }
        Ok(slots)
    }

    fn lower_labeled(&mut self, s: &ast::LabeledStatement) -> Result<(), JsError> {
        let mut names = vec![s.label.name.cheap_clone()];
        let mut body: &Statement = &s.body;
        while let Statement::Labeled(inner) = body {
            names.push(inner.label.name.cheap_clone());
            body = &inner.body;
        }
        if is_loop(body) {
            return if self.cfg_mode() {
                self.lower_loop_cfg(body, names)
            } else {
                self.lower_loop(body, names)
            };
        }
        if self.cfg_mode() {
            return self.lower_labeled_cfg(body, names);
        }
        let id = self.label_id();
        self.fs.labels.push(LabelEntry {
            names,
            id,
            kind: LabelKind::Statement,
            targets: None,
        });
        let inner = self.collect(|this| this.lower_statement(body));
        self.fs.labels.pop();
        let inner = inner?;
        self.emit(Stmt::Labeled { label: id, body: inner });
        Ok(())
    }

    pub(super) fn break_target(
        &self,
        label: Option<&ast::Identifier>,
        span: Span,
    ) -> Result<LabelId, JsError> {
        self.find_break_entry(label, span).map(|e| e.id)
    }

    pub(super) fn find_break_entry(
        &self,
        label: Option<&ast::Identifier>,
        span: Span,
    ) -> Result<&LabelEntry, JsError> {
        let found = match label {
            Some(id) => self.fs.labels.iter().rev().find(|e| e.names.contains(&id.name)),
            None => self
                .fs
                .labels
                .iter()
                .rev()
                .find(|e| matches!(e.kind, LabelKind::Loop | LabelKind::Switch)),
        };
        found.ok_or_else(|| syntax_error(span, "Illegal break statement"))
    }

    pub(super) fn continue_target(
        &self,
        label: Option<&ast::Identifier>,
        span: Span,
    ) -> Result<LabelId, JsError> {
        self.find_continue_entry(label, span).map(|e| e.id)
    }

    pub(super) fn find_continue_entry(
        &self,
        label: Option<&ast::Identifier>,
        span: Span,
    ) -> Result<&LabelEntry, JsError> {
        self.fs
            .labels
            .iter()
            .rev()
            .filter(|e| e.kind == LabelKind::Loop)
            .find(|e| label.is_none_or(|id| e.names.contains(&id.name)))
            .ok_or_else(|| syntax_error(span, "Illegal continue statement"))
    }

    fn lower_loop(&mut self, stmt: &Statement, names: Vec<JsString>) -> Result<(), JsError> {
        let id = self.label_id();
        self.fs.labels.push(LabelEntry {
            names,
            id,
            kind: LabelKind::Loop,
            targets: None,
        });
        let result = self.lower_loop_inner(stmt, id);
        self.fs.labels.pop();
        result
    }

    fn lower_loop_inner(&mut self, stmt: &Statement, label: LabelId) -> Result<(), JsError> {
        match stmt {
            Statement::While(s) => {
                let test = self.lower_expr(&s.test)?;
                let body = self.collect(|this| this.lower_statement(&s.body))?;
                self.emit(Stmt::Loop(Box::new(LoopStmt {
                    label,
                    test: Some(test),
                    update: None,
                    body,
                    test_first: true,
                    fresh_scope: false,
                })));
                Ok(())
            }
            Statement::DoWhile(s) => {
                let body = self.collect(|this| this.lower_statement(&s.body))?;
                let test = self.lower_expr(&s.test)?;
                self.emit(Stmt::Loop(Box::new(LoopStmt {
                    label,
                    test: Some(test),
                    update: None,
                    body,
                    test_first: false,
                    fresh_scope: false,
                })));
                Ok(())
            }
            Statement::For(s) => self.lower_for(stmt, s, label),
            Statement::ForIn(s) => self.lower_for_each(stmt, &s.left, &s.right, &s.body, label, false),
            Statement::ForOf(s) => self.lower_for_each(stmt, &s.left, &s.right, &s.body, label, true),
            _ => Err(syntax_error(stmt.span(), "Expected a loop")),
        }
    }

    fn lower_for(&mut self, stmt: &Statement, s: &ast::ForStatement, label: LabelId) -> Result<(), JsError> {
        let lexical = match &s.init {
            Some(ast::ForInit::Variable(decl)) if decl.kind != VariableKind::Var => Some(decl),
            _ => None,
        };
        let Some(decl) = lexical else {
            match &s.init {
                Some(ast::ForInit::Variable(decl)) => self.lower_variable_declaration(decl)?,
                Some(ast::ForInit::Expression(e)) => {
                    let value = self.lower_expr(e)?;
                    self.emit(Stmt::Expr(value));
                }
                None => {}
            }
            let lowered = self.lower_for_parts(s, label, false)?;
            self.emit(lowered);
            return Ok(());
        };

        let materialize = statement_contains_closure(stmt);
        self.scopes.push(materialize);
        let kind = if decl.kind == VariableKind::Const {
            DeclKind::Const
        } else {
            DeclKind::Let
        };
        let mut names = Vec::new();
        for declarator in &decl.declarations {
            declarator.id.bound_names(&mut names);
        }
        let lexicals: Vec<(ast::Identifier, DeclKind)> =
            names.into_iter().map(|id| (id, kind)).collect();
        let result = self.declare_lexicals(&lexicals).and_then(|slots| {
            self.collect(|this| {
                if !materialize && !slots.is_empty() {
                    this.emit(Stmt::Uninitialize(slots));
                }
                this.lower_variable_declaration(decl)?;
                let lowered = this.lower_for_parts(s, label, materialize && kind == DeclKind::Let)?;
                this.emit(lowered);
                Ok(())
            })
        });
        let slot_count = self.scopes.pop();
        let inner = result?;
        if materialize {
            self.emit(Stmt::Scoped {
                slots: slot_count,
                body: inner,
            });
        } else {
            for stmt in inner {
                self.emit(stmt);
            }
        }
        Ok(())
    }

    fn lower_for_parts(
        &mut self,
        s: &ast::ForStatement,
        label: LabelId,
        fresh_scope: bool,
    ) -> Result<Stmt, JsError> {
        let test = s.test.as_ref().map(|t| self.lower_expr(t)).transpose()?;
        let update = s.update.as_ref().map(|u| self.lower_expr(u)).transpose()?;
        let body = self.collect(|this| this.lower_statement(&s.body))?;
        Ok(Stmt::Loop(Box::new(LoopStmt {
            label,
            test,
            update,
            body,
            test_first: true,
            fresh_scope,
        })))
    }

    fn lower_for_each(
        &mut self,
        stmt: &Statement,
        left: &ast::ForInOfLeft,
        right: &Expression,
        body: &Statement,
        label: LabelId,
        of: bool,
    ) -> Result<(), JsError> {
        let source = self.lower_expr(right)?;
        let value_temp = self.temp();
        let (bind, body, iteration_slots) = match left {
            ast::ForInOfLeft::Variable(VariableKind::Var, pattern) => {
                let bind = self.collect(|this| {
                    this.bind_pattern(pattern, Expr::Temp(value_temp), BindMode::Declare(DeclKind::Var))
                })?;
                let body = self.collect(|this| this.lower_statement(body))?;
                (bind, body, None)
            }
            ast::ForInOfLeft::Variable(var_kind, pattern) => {
                let kind = if *var_kind == VariableKind::Const {
                    DeclKind::Const
                } else {
                    DeclKind::Let
                };
                let materialize = statement_contains_closure(stmt);
                self.scopes.push(materialize);
                let mut names = Vec::new();
                pattern.bound_names(&mut names);
                let lexicals: Vec<(ast::Identifier, DeclKind)> =
                    names.into_iter().map(|id| (id, kind)).collect();
                let result = self.declare_lexicals(&lexicals).and_then(|_| {
                    let bind = self.collect(|this| {
                        this.bind_pattern(pattern, Expr::Temp(value_temp), BindMode::Declare(kind))
                    })?;
                    let body = self.collect(|this| this.lower_statement(body))?;
                    Ok((bind, body))
                });
                let slot_count = self.scopes.pop();
                let (bind, body) = result?;
                (bind, body, materialize.then_some(slot_count))
            }
            ast::ForInOfLeft::Pattern(pattern) => {
                let bind = self.collect(|this| {
                    this.bind_pattern(pattern, Expr::Temp(value_temp), BindMode::Assign)
                })?;
                let body = self.collect(|this| this.lower_statement(body))?;
                (bind, body, None)
            }
        };
        let each = Box::new(ForEachStmt {
            label,
            source,
            value_temp,
            iteration_slots,
            bind,
            body,
        });
        self.emit(if of { Stmt::ForOf(each) } else { Stmt::ForIn(each) });
        Ok(())
    }

    fn lower_switch(&mut self, s: &ast::SwitchStatement) -> Result<(), JsError> {
        let discriminant = self.lower_expr(&s.discriminant)?;
        let discriminant_temp = self.temp();
        self.emit(Stmt::Expr(Expr::SetTemp(
            discriminant_temp,
            Box::new(discriminant),
        )));

        let all: Vec<Statement> = s
            .cases
            .iter()
            .flat_map(|c| c.consequent.iter().cloned())
            .collect();
        let lexicals = lexical_declarations(&all);
        let materialize = !lexicals.is_empty() && contains_closure(&all);
        self.scopes.push(materialize);
        let id = self.label_id();
        self.fs.labels.push(LabelEntry {
            names: Vec::new(),
            id,
            kind: LabelKind::Switch,
            targets: None,
        });
        let result = self.declare_lexicals(&lexicals).and_then(|slots| {
            self.collect(|this| {
                if !materialize && !slots.is_empty() {
                    this.emit(Stmt::Uninitialize(slots));
                }
                this.hoist_functions(&all)?;
                let mut cases = Vec::with_capacity(s.cases.len());
                for case in &s.cases {
                    let test = case.test.as_ref().map(|t| this.lower_expr(t)).transpose()?;
                    let body = this.collect(|inner| inner.lower_statements(&case.consequent))?;
                    cases.push(SwitchCase { test, body });
                }
                this.emit(Stmt::Switch {
                    label: id,
                    discriminant: Expr::Temp(discriminant_temp),
                    cases,
                });
                Ok(())
            })
        });
        self.fs.labels.pop();
        let slot_count = self.scopes.pop();
        let inner = result?;
        if materialize {
            self.emit(Stmt::Scoped {
                slots: slot_count,
                body: inner,
            });
        } else {
            for stmt in inner {
                self.emit(stmt);
            }
        }
        Ok(())
    }

    fn lower_try(&mut self, s: &ast::TryStatement) -> Result<(), JsError> {
        let block = self.collect(|this| this.lower_block(&s.block.body))?;
        let catch = match &s.handler {
            Some(handler) => {
                let temp = self.temp();
                let body = self.lower_catch_body(handler, temp)?;
                Some(CatchBlock { temp, body })
            }
            None => None,
        };
        let finally = match &s.finalizer {
            Some(f) => Some(self.collect(|this| this.lower_block(&f.body))?),
            None => None,
        };
        self.emit(Stmt::Try {
            block,
            catch,
            finally,
        });
        Ok(())
    }

    /// Catch parameter binding followed by the handler body
    pub(super) fn lower_catch_body(
        &mut self,
        handler: &ast::CatchClause,
        temp: u32,
    ) -> Result<Vec<Stmt>, JsError> {
        let Some(param) = &handler.param else {
            return self.collect(|this| this.lower_block(&handler.body.body));
        };
        let materialize = !self.cfg_mode() && contains_closure(&handler.body.body);
        self.scopes.push(materialize);
        let mut names = Vec::new();
        param.bound_names(&mut names);
        for id in &names {
            self.scopes.declare(&id.name, DeclKind::CatchParam);
        }
        let inner = self.collect(|this| {
            this.bind_pattern(param, Expr::Temp(temp), BindMode::Declare(DeclKind::CatchParam))?;
            this.lower_block(&handler.body.body)
        });
        let slot_count = self.scopes.pop();
        let inner = inner?;
        Ok(if materialize {
            vec![Stmt::Scoped {
                slots: slot_count,
                body: inner,
            }]
        } else {
            inner
        })
    }

    // ============ PATTERNS ============

    /// Destructure `value` into `pattern`, emitting one statement per store
    pub(super) fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: Expr,
        mode: BindMode,
    ) -> Result<(), JsError> {
        match pattern {
            Pattern::Identifier(id) => {
                let target = match mode {
                    BindMode::Declare(kind) => self.declaration_target(id, kind),
                    BindMode::Assign => self.assignment_target(id),
                };
                self.emit(Stmt::Expr(Expr::Assign {
                    target: Box::new(target),
                    value: Box::new(value),
                }));
            }
            Pattern::Member(member) => {
                let target = self.member_target(member, false)?;
                self.emit(Stmt::Expr(Expr::Assign {
                    target: Box::new(target),
                    value: Box::new(value),
                }));
            }
            Pattern::Assignment(assign) => {
                let t = self.temp();
                self.emit(Stmt::Expr(Expr::SetTemp(t, Box::new(value))));
                let with_default =
                    self.default_value(Expr::Temp(t), &assign.right, pattern_name(&assign.left))?;
                self.bind_pattern(&assign.left, with_default, mode)?;
            }
            Pattern::Object(object) => {
                let t = self.temp();
                self.emit(Stmt::Expr(Expr::SetTemp(
                    t,
                    Box::new(Expr::RequireObjectCoercible(Box::new(value))),
                )));
                let mut excluded = Vec::new();
                for prop in &object.properties {
                    match prop {
                        ast::ObjectPatternProperty::KeyValue { key, value, .. } => {
                            let key = match key {
                                ast::PropertyName::Computed(e) => {
                                    let k = self.lower_expr(e)?;
                                    let kt = self.temp();
                                    self.emit(Stmt::Expr(Expr::SetTemp(
                                        kt,
                                        Box::new(Expr::ToPropertyKey(Box::new(k))),
                                    )));
                                    excluded.push(Expr::Temp(kt));
                                    Key::Computed(Box::new(Expr::Temp(kt)))
                                }
                                other => {
                                    let key = static_key(other);
                                    excluded.push(key_value(&key));
                                    Key::Static(key)
                                }
                            };
                            let element = Expr::Get {
                                object: Box::new(Expr::Temp(t)),
                                key,
                            };
                            self.bind_pattern(value, element, mode)?;
                        }
                        ast::ObjectPatternProperty::Rest(rest) => {
                            let rest_value = Expr::ObjectRest {
                                source: Box::new(Expr::Temp(t)),
                                excluded: excluded.clone(),
                            };
                            self.bind_pattern(rest, rest_value, mode)?;
                        }
                    }
                }
            }
            Pattern::Array(array) => {
                let t = self.temp();
                self.emit(Stmt::Expr(Expr::SetTemp(
                    t,
                    Box::new(Expr::GetIterator(Box::new(value))),
                )));
                for element in &array.elements {
                    match element {
                        None => self.emit(Stmt::Expr(Expr::IteratorStep(t))),
                        Some(Pattern::Rest(rest)) => {
                            self.bind_pattern(&rest.argument, Expr::IteratorRest(t), mode)?
                        }
                        Some(p) => self.bind_pattern(p, Expr::IteratorStep(t), mode)?,
                    }
                }
                self.emit(Stmt::Expr(Expr::IteratorClose(t)));
            }
            Pattern::Rest(rest) => self.bind_pattern(&rest.argument, value, mode)?,
        }
        Ok(())
    }

    /// `value === undefined ? default : value`, where `value` may be read twice
    fn default_value(
        &mut self,
        value: Expr,
        default: &Expression,
        name: Option<&JsString>,
    ) -> Result<Expr, JsError> {
        if self.yields(default) {
            return self.default_value_cfg(value, default, name);
        }
        let fallback = self.lower_expr_named(default, name)?;
        Ok(Expr::Conditional(
            Box::new(Expr::Binary(
                ast::BinaryOp::StrictEq,
                Box::new(value.clone()),
                Box::new(Expr::Undefined),
            )),
            Box::new(fallback),
            Box::new(value),
        ))
    }

    fn lower_destructuring_assignment(
        &mut self,
        pattern: &Pattern,
        right: &Expression,
    ) -> Result<Expr, JsError> {
        let value = self.lower_expr(right)?;
        let t = self.temp();
        if self.cfg_mode() && pattern_contains_yield(pattern) {
            self.emit(Stmt::Expr(Expr::SetTemp(t, Box::new(value))));
            self.bind_pattern(pattern, Expr::Temp(t), BindMode::Assign)?;
            return Ok(Expr::Temp(t));
        }
        let stmts = self.collect(|this| {
            this.emit(Stmt::Expr(Expr::SetTemp(t, Box::new(value))));
            this.bind_pattern(pattern, Expr::Temp(t), BindMode::Assign)
        })?;
        Ok(Expr::StmtExpr {
            stmts,
            result: Box::new(Expr::Temp(t)),
        })
    }

    // ============ REFERENCES ============

    fn read_identifier(&self, id: &ast::Identifier) -> Expr {
        match self.scopes.resolve(id.name.as_str()) {
            Some((binding, _)) => Expr::Local(binding),
            None if id.name.as_str() == "undefined" => Expr::Undefined,
            None => Expr::Global(id.name.cheap_clone()),
        }
    }

    pub(super) fn assignment_target(&self, id: &ast::Identifier) -> Target {
        match self.scopes.resolve(id.name.as_str()) {
            Some((binding, kind)) => {
                let mode = match kind {
                    DeclKind::Const => WriteMode::Const,
                    DeclKind::CalleeName if self.fs.strict => WriteMode::Const,
                    _ => WriteMode::Assign,
                };
                Target::Local { binding, mode }
            }
            None => Target::Global(id.name.cheap_clone()),
        }
    }

    fn member_target(&mut self, member: &ast::MemberExpression, spill: bool) -> Result<Target, JsError> {
        if let Expression::Super(_) = member.object.as_ref() {
            let key = self.lower_member_key(&member.property)?;
            let key = if spill { self.spill_key(key) } else { key };
            return Ok(Target::SuperMember {
                key,
                this: self.lower_this(),
            });
        }
        let key_yields = matches!(&member.property, ast::MemberProperty::Expression(e) if self.yields(e));
        let object = self.lower_expr(&member.object)?;
        let object = if spill || key_yields {
            self.spill(object)
        } else {
            object
        };
        let key = self.lower_member_key(&member.property)?;
        let key = if spill { self.spill_key(key) } else { key };
        Ok(Target::Member { object, key })
    }

    fn spill_key(&mut self, key: Key) -> Key {
        match key {
            Key::Computed(e) => {
                let converted = Expr::ToPropertyKey(e);
                Key::Computed(Box::new(self.spill(converted)))
            }
            other => other,
        }
    }

    /// Simple assignment target of `++`, `--` and compound operators
    fn lower_target(&mut self, expr: &Expression, spill: bool) -> Result<Target, JsError> {
        match expr {
            Expression::Identifier(id) => Ok(self.assignment_target(id)),
            Expression::Member(m) => self.member_target(m, spill),
            Expression::Parenthesized(inner, _) => self.lower_target(inner, spill),
            other => Err(syntax_error(
                other.span(),
                "Invalid left-hand side in assignment",
            )),
        }
    }

    fn lower_member_key(&mut self, property: &ast::MemberProperty) -> Result<Key, JsError> {
        match property {
            ast::MemberProperty::Identifier(id) => {
                Ok(Key::Static(PropertyKey::from_string(id.name.cheap_clone())))
            }
            ast::MemberProperty::Expression(e) => match e.as_ref() {
                Expression::Literal(ast::Literal {
                    value: ast::LiteralValue::String(s),
                    ..
                }) => Ok(Key::Static(PropertyKey::from_string(s.cheap_clone()))),
                Expression::Literal(ast::Literal {
                    value: ast::LiteralValue::Number(n),
                    ..
                }) => Ok(Key::Static(PropertyKey::from_number(*n))),
                other => Ok(Key::Computed(Box::new(self.lower_expr(other)?))),
            },
        }
    }

    fn lower_property_name(&mut self, name: &ast::PropertyName) -> Result<Key, JsError> {
        match name {
            ast::PropertyName::Computed(e) => Ok(Key::Computed(Box::new(self.lower_expr(e)?))),
            other => Ok(Key::Static(static_key(other))),
        }
    }

    fn lower_this(&self) -> Expr {
        match self.fs.kind {
            FunctionKind::Arrow | FunctionKind::DerivedConstructor => {
                match self.scopes.resolve("this") {
                    Some((binding, _)) => Expr::Local(binding),
                    None => Expr::This,
                }
            }
            _ => Expr::This,
        }
    }

    fn lower_new_target(&self) -> Expr {
        match self.fs.kind {
            FunctionKind::Arrow => match self.scopes.resolve("new.target") {
                Some((binding, _)) => Expr::Local(binding),
                None => Expr::Undefined,
            },
            FunctionKind::Script => Expr::Undefined,
            _ => Expr::NewTarget,
        }
    }

    // ============ EXPRESSIONS ============

    pub(super) fn lower_expr(&mut self, expr: &Expression) -> Result<Expr, JsError> {
        self.lower_expr_named(expr, None)
    }

    /// Lower `expr`; anonymous functions and classes take `name`
    pub(super) fn lower_expr_named(
        &mut self,
        expr: &Expression,
        name: Option<&JsString>,
    ) -> Result<Expr, JsError> {
        self.nested(expr.span(), |this| this.lower_expr_unchecked(expr, name))
    }

    fn lower_expr_unchecked(
        &mut self,
        expr: &Expression,
        name: Option<&JsString>,
    ) -> Result<Expr, JsError> {
        Ok(match expr {
            Expression::Literal(lit) => match &lit.value {
                ast::LiteralValue::Null => Expr::Null,
                ast::LiteralValue::Boolean(b) => Expr::Bool(*b),
                ast::LiteralValue::Number(n) => Expr::Number(*n),
                ast::LiteralValue::String(s) => Expr::String(s.cheap_clone()),
                ast::LiteralValue::RegExp { pattern, flags } => Expr::RegExp {
                    pattern: JsString::from(pattern.as_str()),
                    flags: JsString::from(flags.as_str()),
                },
            },
            Expression::Identifier(id) => self.read_identifier(id),
            Expression::This(_) => self.lower_this(),
            Expression::NewTarget(_) => self.lower_new_target(),
            Expression::Super(span) => {
                return Err(syntax_error(*span, "'super' keyword unexpected here"));
            }
            Expression::Array(array) => self.lower_array(array)?,
            Expression::Object(object) => self.lower_object(object)?,
            Expression::Function(func) => {
                let own = func.id.as_ref().map(|id| id.name.cheap_clone());
                let fn_name = own
                    .clone()
                    .or_else(|| name.cloned())
                    .unwrap_or_else(|| JsString::from(""));
                Expr::Function(self.lower_function(func, fn_name, own.is_some(), false)?)
            }
            Expression::Class(class) => self.lower_class(class, name, false)?,
            Expression::Template(template) => {
                let quasis = template
                    .quasis
                    .iter()
                    .map(|q| q.cooked.clone().unwrap_or_else(|| q.raw.cheap_clone()))
                    .collect();
                let exprs = self.lower_operands(template.expressions.iter().map(|e| e.as_ref()))?;
                Expr::TemplateConcat { quasis, exprs }
            }
            Expression::TaggedTemplate(tagged) => self.lower_tagged_template(tagged)?,
            Expression::Unary(unary) => self.lower_unary(unary)?,
            Expression::Binary(binary) => {
                let mut operands =
                    self.lower_operands([binary.left.as_ref(), binary.right.as_ref()])?;
                let right = operands.pop().unwrap_or(Expr::Undefined);
                let left = operands.pop().unwrap_or(Expr::Undefined);
                Expr::Binary(binary.operator, Box::new(left), Box::new(right))
            }
            Expression::Logical(logical) => {
                if self.yields(&logical.right) {
                    self.lower_logical_cfg(logical)?
                } else {
                    let left = self.lower_expr(&logical.left)?;
                    let right = self.lower_expr(&logical.right)?;
                    Expr::Logical(logical.operator, Box::new(left), Box::new(right))
                }
            }
            Expression::Conditional(cond) => {
                if self.yields(&cond.consequent) || self.yields(&cond.alternate) {
                    self.lower_conditional_cfg(cond)?
                } else {
                    let test = self.lower_expr(&cond.test)?;
                    let then = self.lower_expr(&cond.consequent)?;
                    let otherwise = self.lower_expr(&cond.alternate)?;
                    Expr::Conditional(Box::new(test), Box::new(then), Box::new(otherwise))
                }
            }
            Expression::Assignment(assign) => self.lower_assignment(assign)?,
            Expression::Update(update) => {
                let target = self.lower_target(&update.argument, false)?;
                Expr::Update {
                    target: Box::new(target),
                    increment: update.operator == ast::UpdateOp::Increment,
                    prefix: update.prefix,
                }
            }
            Expression::Sequence(seq) => {
                Expr::Sequence(self.lower_operands(seq.expressions.iter().map(|e| e.as_ref()))?)
            }
            Expression::Member(member) => self.lower_member(member)?,
            Expression::Call(call) => self.lower_call(call)?,
            Expression::New(new) => {
                let args_yield = new.arguments.iter().any(|a| self.yields(argument_expr(a)));
                let callee = self.lower_expr(&new.callee)?;
                let callee = if args_yield { self.spill(callee) } else { callee };
                let args = self.lower_args(&new.arguments)?;
                Expr::New {
                    callee: Box::new(callee),
                    args,
                }
            }
            Expression::OptionalChain(chain) => {
                let mut guards = Vec::new();
                let value = self.lower_chain_link(&chain.expression, &mut guards)?;
                wrap_guards(guards, value, Expr::Undefined)
            }
            Expression::Yield(y) => self.lower_yield(y)?,
            Expression::Parenthesized(inner, _) => self.lower_expr_named(inner, name)?,
        })
    }

    /// Operands evaluated left to right. Inside generator bodies, an operand followed
    /// by a suspending one is parked in a temp first.
    fn lower_operands<'e>(
        &mut self,
        exprs: impl IntoIterator<Item = &'e Expression>,
    ) -> Result<Vec<Expr>, JsError> {
        let exprs: Vec<&Expression> = exprs.into_iter().collect();
        let last_yield = exprs.iter().rposition(|e| self.yields(e));
        let mut out = Vec::with_capacity(exprs.len());
        for (i, e) in exprs.into_iter().enumerate() {
            let lowered = self.lower_expr(e)?;
            out.push(match last_yield {
                Some(last) if i < last => self.spill(lowered),
                _ => lowered,
            });
        }
        Ok(out)
    }

    fn lower_args(&mut self, args: &[ast::Argument]) -> Result<Vec<Arg>, JsError> {
        let last_yield = args.iter().rposition(|a| self.yields(argument_expr(a)));
        let mut out = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let spill = last_yield.is_some_and(|last| i < last);
            out.push(match arg {
                ast::Argument::Expression(e) => {
                    let v = self.lower_expr(e)?;
                    Arg::Value(if spill { self.spill(v) } else { v })
                }
                ast::Argument::Spread(s) => {
                    let v = self.lower_expr(&s.argument)?;
                    Arg::Spread(if spill { self.spill(v) } else { v })
                }
            });
        }
        Ok(out)
    }

    fn lower_array(&mut self, array: &ast::ArrayExpression) -> Result<Expr, JsError> {
        let last_yield = array.elements.iter().rposition(|el| match el {
            Some(ast::ArrayElement::Expression(e)) => self.yields(e),
            Some(ast::ArrayElement::Spread(s)) => self.yields(&s.argument),
            None => false,
        });
        let mut items = Vec::with_capacity(array.elements.len());
        for (i, element) in array.elements.iter().enumerate() {
            let spill = last_yield.is_some_and(|last| i < last);
            items.push(match element {
                None => ArrayItem::Hole,
                Some(ast::ArrayElement::Expression(e)) => {
                    let v = self.lower_expr(e)?;
                    ArrayItem::Value(if spill { self.spill(v) } else { v })
                }
                Some(ast::ArrayElement::Spread(s)) => {
                    let v = self.lower_expr(&s.argument)?;
                    ArrayItem::Spread(if spill { self.spill(v) } else { v })
                }
            });
        }
        Ok(Expr::Array(items))
    }

    fn lower_object(&mut self, object: &ast::ObjectExpression) -> Result<Expr, JsError> {
        let yields: Vec<bool> = object
            .properties
            .iter()
            .map(|p| match p {
                ast::ObjectProperty::Property(prop) => {
                    self.yields(&prop.value)
                        || matches!(&prop.key, ast::PropertyName::Computed(k) if self.yields(k))
                }
                ast::ObjectProperty::Spread(s) => self.yields(&s.argument),
            })
            .collect();
        let mut items = Vec::with_capacity(object.properties.len());
        for (i, prop) in object.properties.iter().enumerate() {
            let later_yield = yields.iter().skip(i + 1).any(|y| *y);
            let item = match prop {
                ast::ObjectProperty::Spread(s) => {
                    let v = self.lower_expr(&s.argument)?;
                    ObjectItem::Spread(if later_yield { self.spill(v) } else { v })
                }
                ast::ObjectProperty::Property(p) => {
                    let value_yields = self.yields(&p.value);
                    let key = self.lower_property_name(&p.key)?;
                    let key = if later_yield || value_yields {
                        self.spill_key(key)
                    } else {
                        key
                    };
                    let static_name = p.key.static_name();
                    match (p.kind, p.method) {
                        (ast::PropertyKind::Init, false) => {
                            let is_proto = !p.shorthand
                                && matches!(&p.key, ast::PropertyName::Identifier(n) | ast::PropertyName::String(n) if n.as_str() == "__proto__");
                            let value = self.lower_expr_named(&p.value, static_name.as_ref())?;
                            let value = if later_yield { self.spill(value) } else { value };
                            if is_proto {
                                ObjectItem::Proto(value)
                            } else {
                                ObjectItem::Property {
                                    name_function: static_name.is_none()
                                        && p.value.is_anonymous_function_definition(),
                                    key,
                                    value,
                                }
                            }
                        }
                        (kind, _) => {
                            let Expression::Function(func) = p.value.as_ref() else {
                                return Err(syntax_error(p.span, "Expected a method"));
                            };
                            let (method_kind, fn_kind, prefix) = match kind {
                                ast::PropertyKind::Get => (MethodKind::Getter, FunctionKind::Getter, "get "),
                                ast::PropertyKind::Set => (MethodKind::Setter, FunctionKind::Setter, "set "),
                                ast::PropertyKind::Init => (MethodKind::Method, FunctionKind::Method, ""),
                            };
                            let fn_name = static_name
                                .map(|n| JsString::from(format!("{prefix}{n}")))
                                .unwrap_or_else(|| JsString::from(""));
                            let template = self.lower_function_as(func, fn_name, fn_kind, false, false)?;
                            ObjectItem::Method {
                                key,
                                function: template,
                                kind: method_kind,
                            }
                        }
                    }
                }
            };
            items.push(item);
        }
        Ok(Expr::Object(items))
    }

    fn lower_tagged_template(&mut self, tagged: &ast::TaggedTemplateExpression) -> Result<Expr, JsError> {
        let site = Rc::new(TemplateSite {
            id: next_site_id(),
            cooked: tagged.quasi.quasis.iter().map(|q| q.cooked.clone()).collect(),
            raw: tagged.quasi.quasis.iter().map(|q| q.raw.cheap_clone()).collect(),
        });
        let args_yield = tagged.quasi.expressions.iter().any(|e| self.yields(e));
        let callee = match strip_parens(&tagged.tag) {
            Expression::Member(m) if !matches!(m.object.as_ref(), Expression::Super(_)) => {
                let object = self.lower_expr(&m.object)?;
                let key = self.lower_member_key(&m.property)?;
                if args_yield {
                    let t = self.temp();
                    self.emit(Stmt::Expr(Expr::SetTemp(t, Box::new(object))));
                    let function = self.spill(Expr::Get {
                        object: Box::new(Expr::Temp(t)),
                        key,
                    });
                    Callee::WithThis {
                        function,
                        this: Expr::Temp(t),
                    }
                } else {
                    Callee::Member { object, key }
                }
            }
            other => {
                let f = self.lower_expr(other)?;
                Callee::Value(if args_yield { self.spill(f) } else { f })
            }
        };
        let args = self.lower_operands(tagged.quasi.expressions.iter().map(|e| e.as_ref()))?;
        Ok(Expr::TaggedTemplate {
            callee: Box::new(callee),
            site,
            args,
        })
    }

    fn lower_unary(&mut self, unary: &ast::UnaryExpression) -> Result<Expr, JsError> {
        match unary.operator {
            ast::UnaryOp::Typeof => match strip_parens(&unary.argument) {
                Expression::Identifier(id) if self.scopes.resolve(id.name.as_str()).is_none() => {
                    Ok(Expr::TypeofGlobal(id.name.cheap_clone()))
                }
                other => Ok(Expr::Typeof(Box::new(self.lower_expr(other)?))),
            },
            ast::UnaryOp::Delete => self.lower_delete(&unary.argument),
            op => Ok(Expr::Unary(op, Box::new(self.lower_expr(&unary.argument)?))),
        }
    }

    fn lower_delete(&mut self, argument: &Expression) -> Result<Expr, JsError> {
        match strip_parens(argument) {
            Expression::Member(m) if matches!(m.object.as_ref(), Expression::Super(_)) => Err(
                syntax_error(m.span, "Unsupported reference to 'super'"),
            ),
            Expression::Member(m) => {
                let object = self.lower_expr(&m.object)?;
                let key = self.lower_member_key(&m.property)?;
                Ok(Expr::Delete {
                    object: Box::new(object),
                    key,
                })
            }
            Expression::Identifier(id) => Ok(match self.scopes.resolve(id.name.as_str()) {
                Some(_) => Expr::Bool(false),
                None => Expr::DeleteGlobal(id.name.cheap_clone()),
            }),
            Expression::OptionalChain(chain) => match chain.expression.as_ref() {
                Expression::Member(m) => {
                    let mut guards = Vec::new();
                    let object = self.lower_chain_link(&m.object, &mut guards)?;
                    let object = if m.optional {
                        guard(self, &mut guards, object)
                    } else {
                        object
                    };
                    let key = self.lower_member_key(&m.property)?;
                    let delete = Expr::Delete {
                        object: Box::new(object),
                        key,
                    };
                    Ok(wrap_guards(guards, delete, Expr::Bool(true)))
                }
                other => {
                    let value = self.lower_expr(other)?;
                    Ok(Expr::Sequence(vec![value, Expr::Bool(true)]))
                }
            },
            other => {
                let value = self.lower_expr(other)?;
                Ok(Expr::Sequence(vec![value, Expr::Bool(true)]))
            }
        }
    }

    fn lower_assignment(&mut self, assign: &ast::AssignmentExpression) -> Result<Expr, JsError> {
        let value_yields = self.yields(&assign.right);
        let (target, name) = match &assign.left {
            ast::AssignmentTarget::Pattern(pattern) => {
                return self.lower_destructuring_assignment(pattern, &assign.right);
            }
            ast::AssignmentTarget::Identifier(id) => (self.assignment_target(id), Some(&id.name)),
            ast::AssignmentTarget::Member(m) => (self.member_target(m, value_yields)?, None),
        };
        let target = Box::new(target);
        if let Some(op) = assign.operator.binary_op() {
            let value = self.lower_expr(&assign.right)?;
            return Ok(Expr::Compound {
                target,
                op,
                value: Box::new(value),
            });
        }
        let value = Box::new(self.lower_expr_named(&assign.right, name)?);
        Ok(match assign.operator.logical_op() {
            Some(op) => Expr::LogicalAssign { target, op, value },
            None => Expr::Assign { target, value },
        })
    }

    fn lower_member(&mut self, member: &ast::MemberExpression) -> Result<Expr, JsError> {
        if let Expression::Super(_) = member.object.as_ref() {
            return Ok(Expr::SuperGet {
                key: self.lower_member_key(&member.property)?,
                this: Box::new(self.lower_this()),
            });
        }
        let key_yields =
            matches!(&member.property, ast::MemberProperty::Expression(e) if self.yields(e));
        let object = self.lower_expr(&member.object)?;
        let object = if key_yields { self.spill(object) } else { object };
        let key = self.lower_member_key(&member.property)?;
        Ok(Expr::Get {
            object: Box::new(object),
            key,
        })
    }

    fn lower_call(&mut self, call: &ast::CallExpression) -> Result<Expr, JsError> {
        if let Expression::Super(span) = call.callee.as_ref() {
            return self.lower_super_call(&call.arguments, *span);
        }
        let args_yield = call.arguments.iter().any(|a| self.yields(argument_expr(a)));
        let callee = match strip_parens(&call.callee) {
            Expression::Member(m) if matches!(m.object.as_ref(), Expression::Super(_)) => {
                let key = self.lower_member_key(&m.property)?;
                let key = if args_yield { self.spill_key(key) } else { key };
                let this = self.lower_this();
                let function = Expr::SuperGet {
                    key,
                    this: Box::new(this.clone()),
                };
                Callee::WithThis {
                    function: if args_yield { self.spill(function) } else { function },
                    this,
                }
            }
            Expression::Member(m) => {
                let object = self.lower_expr(&m.object)?;
                let key = self.lower_member_key(&m.property)?;
                if args_yield {
                    let t = self.temp();
                    self.emit(Stmt::Expr(Expr::SetTemp(t, Box::new(object))));
                    let function = self.spill(Expr::Get {
                        object: Box::new(Expr::Temp(t)),
                        key,
                    });
                    Callee::WithThis {
                        function,
                        this: Expr::Temp(t),
                    }
                } else {
                    Callee::Member { object, key }
                }
            }
            other => {
                let f = self.lower_expr(other)?;
                Callee::Value(if args_yield { self.spill(f) } else { f })
            }
        };
        let args = self.lower_args(&call.arguments)?;
        Ok(Expr::Call {
            callee: Box::new(callee),
            args,
        })
    }

    fn lower_super_call(&mut self, arguments: &[ast::Argument], span: Span) -> Result<Expr, JsError> {
        let Some((this_binding, _)) = self.scopes.resolve("this") else {
            return Err(syntax_error(span, "'super' keyword unexpected here"));
        };
        let (new_target, active_function) = if self.fs.kind == FunctionKind::Arrow {
            let new_target = self
                .scopes
                .resolve("new.target")
                .map(|(b, _)| Expr::Local(b))
                .unwrap_or(Expr::Undefined);
            let active = self
                .scopes
                .resolve("%active")
                .map(|(b, _)| Expr::Local(b))
                .ok_or_else(|| syntax_error(span, "'super' keyword unexpected here"))?;
            (new_target, active)
        } else {
            (Expr::NewTarget, Expr::Callee)
        };
        let args = self.lower_args(arguments)?;
        Ok(Expr::SuperCall {
            args,
            this_binding,
            new_target: Box::new(new_target),
            active_function: Box::new(active_function),
        })
    }

    /// One link of an optional chain; `?.` links park their base in a temp and
    /// register a guard that short-circuits the whole chain
    fn lower_chain_link(
        &mut self,
        expr: &Expression,
        guards: &mut Vec<(u32, Expr)>,
    ) -> Result<Expr, JsError> {
        match expr {
            Expression::Member(m) if !matches!(m.object.as_ref(), Expression::Super(_)) => {
                let object = self.lower_chain_link(&m.object, guards)?;
                let object = if m.optional {
                    guard(self, guards, object)
                } else {
                    object
                };
                let key = self.lower_member_key(&m.property)?;
                Ok(Expr::Get {
                    object: Box::new(object),
                    key,
                })
            }
            Expression::Call(call) if !matches!(call.callee.as_ref(), Expression::Super(_)) => {
                let callee = match call.callee.as_ref() {
                    Expression::Member(m) if !matches!(m.object.as_ref(), Expression::Super(_)) => {
                        let object = self.lower_chain_link(&m.object, guards)?;
                        let object = if m.optional {
                            guard(self, guards, object)
                        } else {
                            object
                        };
                        let key = self.lower_member_key(&m.property)?;
                        let this_temp = self.temp();
                        let function = Expr::Get {
                            object: Box::new(Expr::SetTemp(this_temp, Box::new(object))),
                            key,
                        };
                        let function = if call.optional {
                            guard(self, guards, function)
                        } else {
                            function
                        };
                        Callee::WithThis {
                            function,
                            this: Expr::Temp(this_temp),
                        }
                    }
                    other => {
                        let f = self.lower_chain_link(other, guards)?;
                        Callee::Value(if call.optional {
                            guard(self, guards, f)
                        } else {
                            f
                        })
                    }
                };
                let args = self.lower_args(&call.arguments)?;
                Ok(Expr::Call {
                    callee: Box::new(callee),
                    args,
                })
            }
            other => self.lower_expr(other),
        }
    }

    // ============ CLASSES ============

    pub(super) fn lower_class(
        &mut self,
        class: &ast::Class,
        name_hint: Option<&JsString>,
        declaration: bool,
    ) -> Result<Expr, JsError> {
        let name = class
            .id
            .as_ref()
            .map(|id| id.name.cheap_clone())
            .or_else(|| name_hint.cloned())
            .unwrap_or_else(|| JsString::from(""));
        let inner_name = class.id.as_ref().filter(|_| !declaration);
        if inner_name.is_some() {
            self.scopes.push(false);
        }
        let binding = inner_name.and_then(|id| {
            self.scopes.declare(&id.name, DeclKind::Const);
            self.scopes.resolve(id.name.as_str()).map(|(b, _)| b)
        });
        let result = self.lower_class_parts(class, name, binding);
        if inner_name.is_some() {
            self.scopes.pop();
        }
        result
    }

    fn lower_class_parts(
        &mut self,
        class: &ast::Class,
        name: JsString,
        binding: Option<Binding>,
    ) -> Result<Expr, JsError> {
        let heritage = class
            .super_class
            .as_ref()
            .map(|h| self.lower_expr(h))
            .transpose()?;
        let derived = heritage.is_some();
        let ctor_kind = if derived {
            FunctionKind::DerivedConstructor
        } else {
            FunctionKind::ClassConstructor
        };
        let constructor = match &class.constructor {
            Some(ctor) => {
                let mut template =
                    self.lower_function_as(ctor, name.cheap_clone(), ctor_kind, false, true)?;
                if let Some(t) = Rc::get_mut(&mut template) {
                    t.doc = class.doc.clone().or_else(|| t.doc.take());
                    t.source_text = self.source_text(class.span);
                    t.span = class.span;
                }
                template
            }
            None => self.default_constructor(name.cheap_clone(), derived, class),
        };
        let mut members = Vec::with_capacity(class.members.len());
        for member in &class.members {
            let key = self.lower_property_name(&member.key)?;
            let (kind, fn_kind, prefix) = match member.kind {
                ast::MethodKind::Method => (MethodKind::Method, FunctionKind::Method, ""),
                ast::MethodKind::Get => (MethodKind::Getter, FunctionKind::Getter, "get "),
                ast::MethodKind::Set => (MethodKind::Setter, FunctionKind::Setter, "set "),
            };
            let fn_name = member
                .key
                .static_name()
                .map(|n| JsString::from(format!("{prefix}{n}")))
                .unwrap_or_else(|| JsString::from(""));
            let function = self.lower_function_as(&member.value, fn_name, fn_kind, false, true)?;
            members.push(ClassMember {
                key,
                function,
                kind,
                is_static: member.is_static,
            });
        }
        Ok(Expr::Class(Box::new(ClassDef {
            name,
            heritage,
            constructor,
            members,
            binding,
        })))
    }

    /// `constructor() {}` or `constructor(...args) { super(...args); }`
    fn default_constructor(&self, name: JsString, derived: bool, class: &ast::Class) -> Rc<FunctionTemplate> {
        let this_binding = Binding {
            name: JsString::from("this"),
            hops: 0,
            slot: 0,
        };
        let body = if derived {
            vec![Stmt::Expr(Expr::SuperCall {
                args: vec![Arg::Spread(Expr::RestArgs(0))],
                this_binding,
                new_target: Box::new(Expr::NewTarget),
                active_function: Box::new(Expr::Callee),
            })]
        } else {
            Vec::new()
        };
        Rc::new(FunctionTemplate {
            id: next_template_id(),
            name,
            kind: if derived {
                FunctionKind::DerivedConstructor
            } else {
                FunctionKind::ClassConstructor
            },
            generator: false,
            strict: true,
            length: 0,
            slot_count: u32::from(derived),
            temp_count: 0,
            this_slot: derived.then_some(0),
            prologue: Vec::new(),
            body: Body::Statements(body),
            span: class.span,
            doc: class.doc.clone(),
            source_text: self.source_text(class.span),
            chunk: OnceCell::new(),
        })
    }
}

// ============ HELPERS ============

fn guard(lowerer: &mut Lowerer<'_>, guards: &mut Vec<(u32, Expr)>, value: Expr) -> Expr {
    let t = lowerer.temp();
    guards.push((t, value));
    Expr::Temp(t)
}

/// `(t = base) == null ? short : rest`, innermost guard last
fn wrap_guards(guards: Vec<(u32, Expr)>, value: Expr, short: Expr) -> Expr {
    guards.into_iter().rev().fold(value, |rest, (t, base)| {
        Expr::Conditional(
            Box::new(Expr::Binary(
                ast::BinaryOp::Eq,
                Box::new(Expr::SetTemp(t, Box::new(base))),
                Box::new(Expr::Null),
            )),
            Box::new(short.clone()),
            Box::new(rest),
        )
    })
}

pub(super) fn strip_parens(expr: &Expression) -> &Expression {
    match expr {
        Expression::Parenthesized(inner, _) => strip_parens(inner),
        other => other,
    }
}

fn argument_expr(arg: &ast::Argument) -> &Expression {
    match arg {
        ast::Argument::Expression(e) => e,
        ast::Argument::Spread(s) => &s.argument,
    }
}

fn pattern_name(pattern: &Pattern) -> Option<&JsString> {
    match pattern {
        Pattern::Identifier(id) => Some(&id.name),
        _ => None,
    }
}

fn static_key(name: &ast::PropertyName) -> PropertyKey {
    match name {
        ast::PropertyName::Identifier(s) | ast::PropertyName::String(s) => {
            PropertyKey::from_string(s.cheap_clone())
        }
        ast::PropertyName::Number(n) => PropertyKey::from_number(*n),
        ast::PropertyName::Computed(_) => PropertyKey::from(""),
    }
}

fn key_value(key: &PropertyKey) -> Expr {
    match key.to_value() {
        crate::value::JsValue::String(s) => Expr::String(s),
        _ => Expr::Undefined,
    }
}

pub(super) fn is_loop(stmt: &Statement) -> bool {
    matches!(
        stmt,
        Statement::For(_)
            | Statement::ForIn(_)
            | Statement::ForOf(_)
            | Statement::While(_)
            | Statement::DoWhile(_)
    )
}

fn already_declared(id: &ast::Identifier) -> JsError {
    syntax_error(
        id.span,
        format!("Identifier '{}' has already been declared", id.name),
    )
}

fn init_local(name: &str, slot: u32, value: Expr) -> Stmt {
    init_local_named(JsString::from(name), slot, value)
}

fn init_local_named(name: JsString, slot: u32, value: Expr) -> Stmt {
    Stmt::Expr(Expr::Assign {
        target: Box::new(Target::Local {
            binding: Binding {
                name,
                hops: 0,
                slot,
            },
            mode: WriteMode::Init,
        }),
        value: Box::new(value),
    })
}

/// Lexically scoped declarations made directly in `body`
pub(super) fn lexical_declarations(body: &[Statement]) -> Vec<(ast::Identifier, DeclKind)> {
    let mut out = Vec::new();
    for stmt in body {
        match stmt {
            Statement::VariableDeclaration(decl) if decl.kind != VariableKind::Var => {
                let kind = if decl.kind == VariableKind::Const {
                    DeclKind::Const
                } else {
                    DeclKind::Let
                };
                let mut names = Vec::new();
                for declarator in &decl.declarations {
                    declarator.id.bound_names(&mut names);
                }
                out.extend(names.into_iter().map(|id| (id, kind)));
            }
            Statement::ClassDeclaration(class) => {
                if let Some(id) = &class.id {
                    out.push((id.clone(), DeclKind::Class));
                }
            }
            Statement::FunctionDeclaration(func) => {
                if let Some(id) = &func.id {
                    out.push((id.clone(), DeclKind::Function));
                }
            }
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseOptions;
    use crate::ir::Body;
    use crate::parser::Parser;
    use crate::string_dict::StringDict;

    fn lower(source: &str) -> Rc<FunctionTemplate> {
        let mut dict = StringDict::new();
        let program = Parser::new(source, &mut dict, ParseOptions::default())
            .parse_program()
            .unwrap();
        lower_program(&program, source).unwrap()
    }

    fn lower_err(source: &str) -> JsError {
        let mut dict = StringDict::new();
        let program = Parser::new(source, &mut dict, ParseOptions::default())
            .parse_program()
            .unwrap();
        match lower_program(&program, source) {
            Ok(_) => panic!("Expected a lowering error for {source}"),
            Err(e) => e,
        }
    }

    fn first_function(template: &FunctionTemplate) -> Rc<FunctionTemplate> {
        match template.nested_templates().into_iter().next() {
            Some(t) => t,
            None => panic!("Expected a nested function"),
        }
    }

    #[test]
    fn top_level_declarations_become_globals() {
        let script = lower("var a = 1; let b = 2; function f() {}");
        let Some(Stmt::DeclareGlobals { vars, lexicals }) = script.prologue.first() else {
            panic!("Expected global declarations first");
        };
        let vars: Vec<&str> = vars.iter().map(|v| v.as_str()).collect();
        assert_eq!(vars, vec!["a", "f"]);
        assert_eq!(lexicals.len(), 1);
        assert_eq!(script.slot_count, 0);
    }

    #[test]
    fn parameters_and_locals_share_the_function_scope() {
        let script = lower("function f(a, b) { var c; let d; return a + d; }");
        let f = first_function(&script);
        assert_eq!(f.slot_count, 4);
        assert_eq!(f.length, 2);
        assert_eq!(f.name.as_str(), "f");
    }

    #[test]
    fn blocks_without_closures_share_slots() {
        let script = lower("function f() { { let x = 1; } { let y = 2; } }");
        let f = first_function(&script);
        let Body::Statements(body) = &f.body else {
            panic!("Expected statements");
        };
        assert!(!body.iter().any(|s| matches!(s, Stmt::Scoped { .. })));
        assert_eq!(f.slot_count, 2);
    }

    #[test]
    fn captured_loop_bindings_get_fresh_scopes() {
        let script = lower("function f() { for (let i = 0; i < 3; i++) { g(() => i); } }");
        let f = first_function(&script);
        let Body::Statements(body) = &f.body else {
            panic!("Expected statements");
        };
        let Some(Stmt::Scoped { body: inner, .. }) = body.first() else {
            panic!("Expected a scoped loop");
        };
        assert!(inner
            .iter()
            .any(|s| matches!(s, Stmt::Loop(l) if l.fresh_scope)));
    }

    #[test]
    fn duplicate_lexical_declarations_are_rejected() {
        let err = lower_err("function f() { let a; let a; }");
        assert!(err.to_string().contains("Identifier 'a' has already been declared"));
    }

    #[test]
    fn anonymous_functions_take_binding_names() {
        let script = lower("var f = function() {}; var g = () => 1;");
        let names: Vec<String> = script
            .nested_templates()
            .iter()
            .map(|t| t.name.to_string())
            .collect();
        assert_eq!(names, vec!["f", "g"]);
    }

    #[test]
    fn generators_lower_to_state_machines() {
        let script = lower("function* g() { const x = yield 1; yield x + 1; }");
        let g = first_function(&script);
        let Body::StateMachine(machine) = &g.body else {
            panic!("Expected a state machine");
        };
        let yields = machine
            .blocks
            .iter()
            .filter(|b| matches!(b.term, crate::ir::Terminator::Yield { .. }))
            .count();
        assert_eq!(yields, 2);
    }
}
