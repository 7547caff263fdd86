//! Abstract Syntax Tree types for JavaScript

use std::rc::Rc;

use crate::lexer::{Comment, Span};
use crate::value::JsString;

/// A complete script
#[derive(Debug, Clone)]
pub struct Program {
    pub body: Vec<Statement>,
    /// Script begins with a `"use strict"` directive
    pub strict: bool,
    /// Every comment in the source, when comment recording is on
    pub comments: Vec<Comment>,
    pub span: Span,
}

// ============ STATEMENTS ============

#[derive(Debug, Clone)]
pub enum Statement {
    // Declarations
    VariableDeclaration(VariableDeclaration),
    FunctionDeclaration(Rc<Function>),
    ClassDeclaration(Rc<Class>),

    // Control Flow
    Block(BlockStatement),
    If(IfStatement),
    Switch(SwitchStatement),
    For(ForStatement),
    ForIn(ForInStatement),
    ForOf(ForOfStatement),
    While(WhileStatement),
    DoWhile(DoWhileStatement),
    Try(TryStatement),

    // Jump
    Return(ReturnStatement),
    Break(BreakStatement),
    Continue(ContinueStatement),
    Throw(ThrowStatement),

    // Other
    Expression(ExpressionStatement),
    Empty(Span),
    Debugger(Span),
    Labeled(LabeledStatement),
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::VariableDeclaration(d) => d.span,
            Statement::FunctionDeclaration(f) => f.span,
            Statement::ClassDeclaration(c) => c.span,
            Statement::Block(b) => b.span,
            Statement::If(s) => s.span,
            Statement::Switch(s) => s.span,
            Statement::For(s) => s.span,
            Statement::ForIn(s) => s.span,
            Statement::ForOf(s) => s.span,
            Statement::While(s) => s.span,
            Statement::DoWhile(s) => s.span,
            Statement::Try(s) => s.span,
            Statement::Return(s) => s.span,
            Statement::Break(s) => s.span,
            Statement::Continue(s) => s.span,
            Statement::Throw(s) => s.span,
            Statement::Expression(s) => s.span,
            Statement::Empty(span) | Statement::Debugger(span) => *span,
            Statement::Labeled(s) => s.span,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExpressionStatement {
    pub expression: Rc<Expression>,
    pub doc: Option<JsString>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct BlockStatement {
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct VariableDeclaration {
    pub kind: VariableKind,
    pub declarations: Vec<VariableDeclarator>,
    pub doc: Option<JsString>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Let,
    Const,
    Var,
}

#[derive(Debug, Clone)]
pub struct VariableDeclarator {
    pub id: Pattern,
    pub init: Option<Rc<Expression>>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Normal,
    Arrow,
    /// Shorthand method in an object literal or class body
    Method,
    Getter,
    Setter,
    /// Explicit `constructor` of a class
    ClassConstructor,
}

/// Every function form: declarations, expressions, arrows, methods and accessors
#[derive(Debug, Clone)]
pub struct Function {
    pub id: Option<Identifier>,
    pub params: Vec<Pattern>,
    pub body: FunctionBody,
    pub kind: FunctionKind,
    pub generator: bool,
    /// Strict either by its own directive or by the enclosing code
    pub strict: bool,
    /// Parameters are plain identifiers with no defaults, rest or patterns
    pub simple_params: bool,
    pub doc: Option<JsString>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    Block(Vec<Statement>),
    /// Concise arrow body
    Expression(Rc<Expression>),
}

#[derive(Debug, Clone)]
pub struct Class {
    pub id: Option<Identifier>,
    pub super_class: Option<Rc<Expression>>,
    pub constructor: Option<Rc<Function>>,
    pub members: Vec<ClassMember>,
    pub doc: Option<JsString>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ClassMember {
    pub key: PropertyName,
    pub value: Rc<Function>,
    pub kind: MethodKind,
    pub is_static: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Get,
    Set,
}

#[derive(Debug, Clone)]
pub struct IfStatement {
    pub test: Rc<Expression>,
    pub consequent: Box<Statement>,
    pub alternate: Option<Box<Statement>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SwitchStatement {
    pub discriminant: Rc<Expression>,
    pub cases: Vec<SwitchCase>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    /// `None` for `default:`
    pub test: Option<Rc<Expression>>,
    pub consequent: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ForStatement {
    pub init: Option<ForInit>,
    pub test: Option<Rc<Expression>>,
    pub update: Option<Rc<Expression>>,
    pub body: Box<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ForInit {
    Variable(VariableDeclaration),
    Expression(Rc<Expression>),
}

#[derive(Debug, Clone)]
pub struct ForInStatement {
    pub left: ForInOfLeft,
    pub right: Rc<Expression>,
    pub body: Box<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ForOfStatement {
    pub left: ForInOfLeft,
    pub right: Rc<Expression>,
    pub body: Box<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ForInOfLeft {
    Variable(VariableKind, Pattern),
    Pattern(Pattern),
}

#[derive(Debug, Clone)]
pub struct WhileStatement {
    pub test: Rc<Expression>,
    pub body: Box<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct DoWhileStatement {
    pub body: Box<Statement>,
    pub test: Rc<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TryStatement {
    pub block: BlockStatement,
    pub handler: Option<CatchClause>,
    pub finalizer: Option<BlockStatement>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct CatchClause {
    pub param: Option<Pattern>,
    pub body: BlockStatement,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ReturnStatement {
    pub argument: Option<Rc<Expression>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct BreakStatement {
    pub label: Option<Identifier>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ContinueStatement {
    pub label: Option<Identifier>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ThrowStatement {
    pub argument: Rc<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct LabeledStatement {
    pub label: Identifier,
    pub body: Box<Statement>,
    pub span: Span,
}

// ============ EXPRESSIONS ============

#[derive(Debug, Clone)]
pub enum Expression {
    Literal(Literal),
    Identifier(Identifier),
    This(Span),
    /// `super` as the object of a member access or as the callee of `super(...)`
    Super(Span),
    /// `new.target`
    NewTarget(Span),
    Array(ArrayExpression),
    Object(ObjectExpression),
    Function(Rc<Function>),
    Class(Rc<Class>),
    Template(TemplateLiteral),
    TaggedTemplate(TaggedTemplateExpression),
    Unary(UnaryExpression),
    Binary(BinaryExpression),
    Logical(LogicalExpression),
    Conditional(ConditionalExpression),
    Assignment(AssignmentExpression),
    Update(UpdateExpression),
    Sequence(SequenceExpression),
    Member(MemberExpression),
    Call(CallExpression),
    New(NewExpression),
    /// Boundary of an optional chain: `a?.b.c` short-circuits to here
    OptionalChain(OptionalChainExpression),
    Yield(YieldExpression),
    Parenthesized(Rc<Expression>, Span),
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::Literal(l) => l.span,
            Expression::Identifier(id) => id.span,
            Expression::This(span) | Expression::Super(span) | Expression::NewTarget(span) => {
                *span
            }
            Expression::Array(a) => a.span,
            Expression::Object(o) => o.span,
            Expression::Function(f) => f.span,
            Expression::Class(c) => c.span,
            Expression::Template(t) => t.span,
            Expression::TaggedTemplate(t) => t.span,
            Expression::Unary(u) => u.span,
            Expression::Binary(b) => b.span,
            Expression::Logical(l) => l.span,
            Expression::Conditional(c) => c.span,
            Expression::Assignment(a) => a.span,
            Expression::Update(u) => u.span,
            Expression::Sequence(s) => s.span,
            Expression::Member(m) => m.span,
            Expression::Call(c) => c.span,
            Expression::New(n) => n.span,
            Expression::OptionalChain(o) => o.span,
            Expression::Yield(y) => y.span,
            Expression::Parenthesized(_, span) => *span,
        }
    }

    /// Anonymous function or class definitions take their name from the binding
    pub fn is_anonymous_function_definition(&self) -> bool {
        match self {
            Expression::Function(f) => f.id.is_none(),
            Expression::Class(c) => c.id.is_none(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Literal {
    pub value: LiteralValue,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    Null,
    Boolean(bool),
    Number(f64),
    String(JsString),
    RegExp { pattern: String, flags: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: JsString,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ArrayExpression {
    /// `None` entries are holes
    pub elements: Vec<Option<ArrayElement>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ArrayElement {
    Expression(Rc<Expression>),
    Spread(SpreadElement),
}

#[derive(Debug, Clone)]
pub struct ObjectExpression {
    pub properties: Vec<ObjectProperty>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ObjectProperty {
    Property(Property),
    Spread(SpreadElement),
}

#[derive(Debug, Clone)]
pub struct Property {
    pub key: PropertyName,
    pub value: Rc<Expression>,
    pub kind: PropertyKind,
    pub shorthand: bool,
    pub method: bool,
    /// `{ a = 1 }`, only legal once the literal is reinterpreted as a pattern
    pub cover_initializer: Option<Rc<Expression>>,
    pub doc: Option<JsString>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum PropertyName {
    Identifier(JsString),
    String(JsString),
    Number(f64),
    Computed(Rc<Expression>),
}

impl PropertyName {
    /// Statically known key text, if not computed
    pub fn static_name(&self) -> Option<JsString> {
        match self {
            PropertyName::Identifier(s) | PropertyName::String(s) => Some(s.clone()),
            PropertyName::Number(n) => Some(JsString::from(crate::value::number_to_string(*n))),
            PropertyName::Computed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Init,
    Get,
    Set,
}

#[derive(Debug, Clone)]
pub struct TemplateLiteral {
    pub quasis: Vec<TemplateElement>,
    pub expressions: Vec<Rc<Expression>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TemplateElement {
    /// `None` when the chunk holds an escape that only a tag may see
    pub cooked: Option<JsString>,
    pub raw: JsString,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TaggedTemplateExpression {
    pub tag: Rc<Expression>,
    pub quasi: TemplateLiteral,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct UnaryExpression {
    pub operator: UnaryOp,
    pub argument: Rc<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Minus,
    Plus,
    Not,
    BitNot,
    Typeof,
    Void,
    Delete,
}

#[derive(Debug, Clone)]
pub struct BinaryExpression {
    pub operator: BinaryOp,
    pub left: Rc<Expression>,
    pub right: Rc<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    BitAnd,
    BitOr,
    BitXor,
    LShift,
    RShift,
    URShift,
    In,
    Instanceof,
}

#[derive(Debug, Clone)]
pub struct LogicalExpression {
    pub operator: LogicalOp,
    pub left: Rc<Expression>,
    pub right: Rc<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    NullishCoalescing,
}

#[derive(Debug, Clone)]
pub struct ConditionalExpression {
    pub test: Rc<Expression>,
    pub consequent: Rc<Expression>,
    pub alternate: Rc<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct AssignmentExpression {
    pub operator: AssignmentOp,
    pub left: AssignmentTarget,
    pub right: Rc<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum AssignmentTarget {
    Identifier(Identifier),
    Member(MemberExpression),
    /// Destructuring assignment; only with `=`
    Pattern(Pattern),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    ExpAssign,
    BitAndAssign,
    BitOrAssign,
    BitXorAssign,
    LShiftAssign,
    RShiftAssign,
    URShiftAssign,
    AndAssign,
    OrAssign,
    NullishAssign,
}

impl AssignmentOp {
    /// The arithmetic operator a compound assignment applies
    pub fn binary_op(self) -> Option<BinaryOp> {
        Some(match self {
            AssignmentOp::AddAssign => BinaryOp::Add,
            AssignmentOp::SubAssign => BinaryOp::Sub,
            AssignmentOp::MulAssign => BinaryOp::Mul,
            AssignmentOp::DivAssign => BinaryOp::Div,
            AssignmentOp::ModAssign => BinaryOp::Mod,
            AssignmentOp::ExpAssign => BinaryOp::Exp,
            AssignmentOp::BitAndAssign => BinaryOp::BitAnd,
            AssignmentOp::BitOrAssign => BinaryOp::BitOr,
            AssignmentOp::BitXorAssign => BinaryOp::BitXor,
            AssignmentOp::LShiftAssign => BinaryOp::LShift,
            AssignmentOp::RShiftAssign => BinaryOp::RShift,
            AssignmentOp::URShiftAssign => BinaryOp::URShift,
            _ => return None,
        })
    }

    pub fn logical_op(self) -> Option<LogicalOp> {
        match self {
            AssignmentOp::AndAssign => Some(LogicalOp::And),
            AssignmentOp::OrAssign => Some(LogicalOp::Or),
            AssignmentOp::NullishAssign => Some(LogicalOp::NullishCoalescing),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UpdateExpression {
    pub operator: UpdateOp,
    pub prefix: bool,
    pub argument: Rc<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

#[derive(Debug, Clone)]
pub struct SequenceExpression {
    pub expressions: Vec<Rc<Expression>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct MemberExpression {
    pub object: Rc<Expression>,
    pub property: MemberProperty,
    /// `?.` link
    pub optional: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum MemberProperty {
    Identifier(Identifier),
    Expression(Rc<Expression>),
}

#[derive(Debug, Clone)]
pub struct OptionalChainExpression {
    pub expression: Rc<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct CallExpression {
    pub callee: Rc<Expression>,
    pub arguments: Vec<Argument>,
    pub optional: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Argument {
    Expression(Rc<Expression>),
    Spread(SpreadElement),
}

#[derive(Debug, Clone)]
pub struct NewExpression {
    pub callee: Rc<Expression>,
    pub arguments: Vec<Argument>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct SpreadElement {
    pub argument: Rc<Expression>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct YieldExpression {
    pub argument: Option<Rc<Expression>>,
    pub delegate: bool,
    pub span: Span,
}

// ============ PATTERNS ============

#[derive(Debug, Clone)]
pub enum Pattern {
    Identifier(Identifier),
    Object(ObjectPattern),
    Array(ArrayPattern),
    Assignment(AssignmentPattern),
    Rest(RestElement),
    /// Member target, only in destructuring assignment (`[a.b] = ...`)
    Member(MemberExpression),
}

impl Pattern {
    pub fn span(&self) -> Span {
        match self {
            Pattern::Identifier(id) => id.span,
            Pattern::Object(o) => o.span,
            Pattern::Array(a) => a.span,
            Pattern::Assignment(a) => a.span,
            Pattern::Rest(r) => r.span,
            Pattern::Member(m) => m.span,
        }
    }

    /// Names this pattern binds, in source order
    pub fn bound_names(&self, out: &mut Vec<Identifier>) {
        match self {
            Pattern::Identifier(id) => out.push(id.clone()),
            Pattern::Object(o) => {
                for prop in &o.properties {
                    match prop {
                        ObjectPatternProperty::KeyValue { value, .. } => value.bound_names(out),
                        ObjectPatternProperty::Rest(rest) => rest.bound_names(out),
                    }
                }
            }
            Pattern::Array(a) => {
                for element in a.elements.iter().flatten() {
                    element.bound_names(out);
                }
            }
            Pattern::Assignment(a) => a.left.bound_names(out),
            Pattern::Rest(r) => r.argument.bound_names(out),
            Pattern::Member(_) => {}
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObjectPattern {
    pub properties: Vec<ObjectPatternProperty>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ObjectPatternProperty {
    KeyValue {
        key: PropertyName,
        value: Pattern,
        shorthand: bool,
        span: Span,
    },
    Rest(Box<Pattern>),
}

#[derive(Debug, Clone)]
pub struct ArrayPattern {
    /// `None` entries are elisions
    pub elements: Vec<Option<Pattern>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct RestElement {
    pub argument: Box<Pattern>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct AssignmentPattern {
    pub left: Box<Pattern>,
    pub right: Rc<Expression>,
    pub span: Span,
}
