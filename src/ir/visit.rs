//! Read-only AST traversal used by the lowering pre-passes

use crate::ast::*;
use crate::prelude::grow_stack;

/// Node handed to a traversal callback. Returning false from the callback skips the
/// node's children.
#[derive(Clone, Copy)]
pub(crate) enum Node<'a> {
    Statement(&'a Statement),
    Expression(&'a Expression),
    Pattern(&'a Pattern),
    Function(&'a Function),
}

type Callback<'a, 'f> = &'f mut dyn FnMut(Node<'a>) -> bool;

pub(crate) fn walk_statements<'a>(stmts: &'a [Statement], f: Callback<'a, '_>) {
    for stmt in stmts {
        walk_statement(stmt, f);
    }
}

pub(crate) fn walk_statement<'a>(stmt: &'a Statement, f: Callback<'a, '_>) {
    grow_stack(|| walk_statement_unchecked(stmt, f));
}

fn walk_statement_unchecked<'a>(stmt: &'a Statement, f: Callback<'a, '_>) {
    if !f(Node::Statement(stmt)) {
        return;
    }
    match stmt {
        Statement::VariableDeclaration(decl) => walk_declaration(decl, f),
        Statement::FunctionDeclaration(func) => walk_function(func, f),
        Statement::ClassDeclaration(class) => walk_class(class, f),
        Statement::Block(block) => walk_statements(&block.body, f),
        Statement::If(s) => {
            walk_expression(&s.test, f);
            walk_statement(&s.consequent, f);
            if let Some(alt) = &s.alternate {
                walk_statement(alt, f);
            }
        }
        Statement::Switch(s) => {
            walk_expression(&s.discriminant, f);
            for case in &s.cases {
                if let Some(test) = &case.test {
                    walk_expression(test, f);
                }
                walk_statements(&case.consequent, f);
            }
        }
        Statement::For(s) => {
            match &s.init {
                Some(ForInit::Variable(decl)) => walk_declaration(decl, f),
                Some(ForInit::Expression(e)) => walk_expression(e, f),
                None => {}
            }
            if let Some(test) = &s.test {
                walk_expression(test, f);
            }
            if let Some(update) = &s.update {
                walk_expression(update, f);
            }
            walk_statement(&s.body, f);
        }
        Statement::ForIn(ForInStatement {
            left, right, body, ..
        })
        | Statement::ForOf(ForOfStatement {
            left, right, body, ..
        }) => {
            match left {
                ForInOfLeft::Variable(_, pattern) | ForInOfLeft::Pattern(pattern) => {
                    walk_pattern(pattern, f)
                }
            }
            walk_expression(right, f);
            walk_statement(body, f);
        }
        Statement::While(s) => {
            walk_expression(&s.test, f);
            walk_statement(&s.body, f);
        }
        Statement::DoWhile(s) => {
            walk_statement(&s.body, f);
            walk_expression(&s.test, f);
        }
        Statement::Try(s) => {
            walk_statements(&s.block.body, f);
            if let Some(handler) = &s.handler {
                if let Some(param) = &handler.param {
                    walk_pattern(param, f);
                }
                walk_statements(&handler.body.body, f);
            }
            if let Some(finalizer) = &s.finalizer {
                walk_statements(&finalizer.body, f);
            }
        }
        Statement::Return(s) => {
            if let Some(arg) = &s.argument {
                walk_expression(arg, f);
            }
        }
        Statement::Throw(s) => walk_expression(&s.argument, f),
        Statement::Expression(s) => walk_expression(&s.expression, f),
        Statement::Labeled(s) => walk_statement(&s.body, f),
        Statement::Break(_) | Statement::Continue(_) | Statement::Empty(_) | Statement::Debugger(_) => {}
    }
}

fn walk_declaration<'a>(decl: &'a VariableDeclaration, f: Callback<'a, '_>) {
    for declarator in &decl.declarations {
        walk_pattern(&declarator.id, f);
        if let Some(init) = &declarator.init {
            walk_expression(init, f);
        }
    }
}

pub(crate) fn walk_function<'a>(func: &'a Function, f: Callback<'a, '_>) {
    if !f(Node::Function(func)) {
        return;
    }
    for param in &func.params {
        walk_pattern(param, f);
    }
    match &func.body {
        FunctionBody::Block(stmts) => walk_statements(stmts, f),
        FunctionBody::Expression(e) => walk_expression(e, f),
    }
}

fn walk_class<'a>(class: &'a Class, f: Callback<'a, '_>) {
    if let Some(heritage) = &class.super_class {
        walk_expression(heritage, f);
    }
    if let Some(ctor) = &class.constructor {
        walk_function(ctor, f);
    }
    for member in &class.members {
        walk_property_name(&member.key, f);
        walk_function(&member.value, f);
    }
}

fn walk_property_name<'a>(name: &'a PropertyName, f: Callback<'a, '_>) {
    if let PropertyName::Computed(e) = name {
        walk_expression(e, f);
    }
}

fn walk_member<'a>(member: &'a MemberExpression, f: Callback<'a, '_>) {
    walk_expression(&member.object, f);
    if let MemberProperty::Expression(e) = &member.property {
        walk_expression(e, f);
    }
}

fn walk_arguments<'a>(args: &'a [Argument], f: Callback<'a, '_>) {
    for arg in args {
        match arg {
            Argument::Expression(e) => walk_expression(e, f),
            Argument::Spread(s) => walk_expression(&s.argument, f),
        }
    }
}

pub(crate) fn walk_expression<'a>(expr: &'a Expression, f: Callback<'a, '_>) {
    grow_stack(|| walk_expression_unchecked(expr, f));
}

fn walk_expression_unchecked<'a>(expr: &'a Expression, f: Callback<'a, '_>) {
    if !f(Node::Expression(expr)) {
        return;
    }
    match expr {
        Expression::Literal(_)
        | Expression::Identifier(_)
        | Expression::This(_)
        | Expression::Super(_)
        | Expression::NewTarget(_) => {}
        Expression::Array(a) => {
            for element in a.elements.iter().flatten() {
                match element {
                    ArrayElement::Expression(e) => walk_expression(e, f),
                    ArrayElement::Spread(s) => walk_expression(&s.argument, f),
                }
            }
        }
        Expression::Object(o) => {
            for prop in &o.properties {
                match prop {
                    ObjectProperty::Property(p) => {
                        walk_property_name(&p.key, f);
                        walk_expression(&p.value, f);
                    }
                    ObjectProperty::Spread(s) => walk_expression(&s.argument, f),
                }
            }
        }
        Expression::Function(func) => walk_function(func, f),
        Expression::Class(class) => walk_class(class, f),
        Expression::Template(t) => {
            for e in &t.expressions {
                walk_expression(e, f);
            }
        }
        Expression::TaggedTemplate(t) => {
            walk_expression(&t.tag, f);
            for e in &t.quasi.expressions {
                walk_expression(e, f);
            }
        }
        Expression::Unary(u) => walk_expression(&u.argument, f),
        Expression::Binary(b) => {
            walk_expression(&b.left, f);
            walk_expression(&b.right, f);
        }
        Expression::Logical(l) => {
            walk_expression(&l.left, f);
            walk_expression(&l.right, f);
        }
        Expression::Conditional(c) => {
            walk_expression(&c.test, f);
            walk_expression(&c.consequent, f);
            walk_expression(&c.alternate, f);
        }
        Expression::Assignment(a) => {
            match &a.left {
                AssignmentTarget::Identifier(_) => {}
                AssignmentTarget::Member(m) => walk_member(m, f),
                AssignmentTarget::Pattern(p) => walk_pattern(p, f),
            }
            walk_expression(&a.right, f);
        }
        Expression::Update(u) => walk_expression(&u.argument, f),
        Expression::Sequence(s) => {
            for e in &s.expressions {
                walk_expression(e, f);
            }
        }
        Expression::Member(m) => walk_member(m, f),
        Expression::Call(c) => {
            walk_expression(&c.callee, f);
            walk_arguments(&c.arguments, f);
        }
        Expression::New(n) => {
            walk_expression(&n.callee, f);
            walk_arguments(&n.arguments, f);
        }
        Expression::OptionalChain(o) => walk_expression(&o.expression, f),
        Expression::Yield(y) => {
            if let Some(arg) = &y.argument {
                walk_expression(arg, f);
            }
        }
        Expression::Parenthesized(inner, _) => walk_expression(inner, f),
    }
}

pub(crate) fn walk_pattern<'a>(pattern: &'a Pattern, f: Callback<'a, '_>) {
    if !f(Node::Pattern(pattern)) {
        return;
    }
    match pattern {
        Pattern::Identifier(_) => {}
        Pattern::Object(o) => {
            for prop in &o.properties {
                match prop {
                    ObjectPatternProperty::KeyValue { key, value, .. } => {
                        walk_property_name(key, f);
                        walk_pattern(value, f);
                    }
                    ObjectPatternProperty::Rest(rest) => walk_pattern(rest, f),
                }
            }
        }
        Pattern::Array(a) => {
            for element in a.elements.iter().flatten() {
                walk_pattern(element, f);
            }
        }
        Pattern::Assignment(a) => {
            walk_pattern(&a.left, f);
            walk_expression(&a.right, f);
        }
        Pattern::Rest(r) => walk_pattern(&r.argument, f),
        Pattern::Member(m) => walk_member(m, f),
    }
}

// ============ QUERIES ============

/// Names declared with `var` anywhere in `body`, outside nested functions
pub(crate) fn var_declared_names(body: &[Statement]) -> Vec<Identifier> {
    let mut names = Vec::new();
    walk_statements(body, &mut |node| match node {
        Node::Statement(Statement::VariableDeclaration(decl)) => {
            if decl.kind == VariableKind::Var {
                for declarator in &decl.declarations {
                    declarator.id.bound_names(&mut names);
                }
            }
            false
        }
        Node::Statement(Statement::For(s)) => {
            if let Some(ForInit::Variable(decl)) = &s.init {
                if decl.kind == VariableKind::Var {
                    for declarator in &decl.declarations {
                        declarator.id.bound_names(&mut names);
                    }
                }
            }
            true
        }
        Node::Statement(Statement::ForIn(ForInStatement { left, .. }))
        | Node::Statement(Statement::ForOf(ForOfStatement { left, .. })) => {
            if let ForInOfLeft::Variable(VariableKind::Var, pattern) = left {
                pattern.bound_names(&mut names);
            }
            true
        }
        Node::Statement(Statement::FunctionDeclaration(_))
        | Node::Statement(Statement::ClassDeclaration(_)) => false,
        Node::Statement(_) => true,
        Node::Expression(_) | Node::Pattern(_) | Node::Function(_) => false,
    });
    names
}

/// Whether any function or class body appears in `stmts`
pub(crate) fn contains_closure(stmts: &[Statement]) -> bool {
    let mut found = false;
    walk_statements(stmts, &mut |node| {
        if found {
            return false;
        }
        if let Node::Function(_) = node {
            found = true;
            return false;
        }
        true
    });
    found
}

pub(crate) fn statement_contains_closure(stmt: &Statement) -> bool {
    contains_closure(std::slice::from_ref(stmt))
}

/// Whether `expr` contains a `yield` belonging to the current function
pub(crate) fn contains_yield(expr: &Expression) -> bool {
    let mut found = false;
    walk_expression(expr, &mut |node| {
        if found {
            return false;
        }
        match node {
            Node::Expression(Expression::Yield(_)) => {
                found = true;
                false
            }
            Node::Function(_) => false,
            _ => true,
        }
    });
    found
}

pub(crate) fn pattern_contains_yield(pattern: &Pattern) -> bool {
    let mut found = false;
    walk_pattern(pattern, &mut |node| {
        if found {
            return false;
        }
        match node {
            Node::Expression(Expression::Yield(_)) => {
                found = true;
                false
            }
            Node::Function(_) => false,
            _ => true,
        }
    });
    found
}

/// Implicit bindings a function must provide to itself or to its nested arrows
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct FunctionUsage {
    pub arguments: bool,
    pub arrow_this: bool,
    pub arrow_new_target: bool,
    pub arrow_super_call: bool,
}

impl FunctionUsage {
    pub(crate) fn of(func: &Function) -> Self {
        let mut usage = FunctionUsage::default();
        scan_usage(func, false, &mut usage);
        usage
    }
}

fn scan_usage(func: &Function, in_arrow: bool, usage: &mut FunctionUsage) {
    let mut visit = |node: Node<'_>| -> bool {
        match node {
            Node::Expression(Expression::Identifier(id)) => {
                if id.name.as_str() == "arguments" {
                    usage.arguments = true;
                }
                false
            }
            Node::Expression(Expression::This(_)) => {
                usage.arrow_this |= in_arrow;
                false
            }
            Node::Expression(Expression::NewTarget(_)) => {
                usage.arrow_new_target |= in_arrow;
                false
            }
            Node::Expression(Expression::Member(m))
                if matches!(m.object.as_ref(), Expression::Super(_)) =>
            {
                usage.arrow_this |= in_arrow;
                true
            }
            Node::Expression(Expression::Call(call)) => {
                if in_arrow && matches!(call.callee.as_ref(), Expression::Super(_)) {
                    usage.arrow_super_call = true;
                    usage.arrow_this = true;
                    usage.arrow_new_target = true;
                }
                true
            }
            Node::Function(inner) => {
                if inner.kind == FunctionKind::Arrow {
                    scan_usage(inner, true, usage);
                }
                false
            }
            _ => true,
        }
    };
    for param in &func.params {
        walk_pattern(param, &mut visit);
    }
    match &func.body {
        FunctionBody::Block(stmts) => walk_statements(stmts, &mut visit),
        FunctionBody::Expression(e) => walk_expression(e, &mut visit),
    }
}

/// Usage by the arrows of a script's top level
pub(crate) fn script_usage(body: &[Statement]) -> FunctionUsage {
    let mut usage = FunctionUsage::default();
    walk_statements(body, &mut |node| match node {
        Node::Function(inner) => {
            if inner.kind == FunctionKind::Arrow {
                scan_usage(inner, true, &mut usage);
            }
            false
        }
        _ => true,
    });
    usage
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseOptions;
    use crate::parser::Parser;
    use crate::string_dict::StringDict;

    fn parse(source: &str) -> Program {
        let mut dict = StringDict::new();
        Parser::new(source, &mut dict, ParseOptions::default())
            .parse_program()
            .unwrap()
    }

    #[test]
    fn var_names_skip_nested_functions() {
        let program = parse(
            "var a; if (x) { var b = 1; } for (var c in o) {} function f() { var d; } let e;",
        );
        let names: Vec<String> = var_declared_names(&program.body)
            .iter()
            .map(|id| id.name.to_string())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn arrow_usage_propagates_to_enclosing_function() {
        let program = parse("function f() { return () => this.x + arguments[0]; }");
        let Statement::FunctionDeclaration(func) = &program.body[0] else {
            panic!("Expected function declaration");
        };
        let usage = FunctionUsage::of(func);
        assert!(usage.arguments);
        assert!(usage.arrow_this);
        assert!(!usage.arrow_new_target);
    }

    #[test]
    fn closures_are_detected() {
        let program = parse("{ let a = 1; } { let b = 2; const g = () => b; }");
        assert!(!statement_contains_closure(&program.body[0]));
        assert!(statement_contains_closure(&program.body[1]));
    }
}
