//! Lowered intermediate representation
//!
//! The AST is lowered once per compilation unit into [`FunctionTemplate`]s: every
//! identifier is resolved to a scope slot, a temporary or a global name; destructuring,
//! default parameters and optional chains are rewritten into explicit steps; generator
//! bodies become a [`StateMachine`] whose suspension points are block terminators.
//!
//! Both execution tiers consume this form. The interpreted tier walks it directly, the
//! compiled tier translates each template into a register bytecode chunk first.

mod generator;
mod lower;
mod scope;
mod visit;

pub use lower::lower_program;

use std::cell::OnceCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ast::{BinaryOp, LogicalOp, UnaryOp};
use crate::compiler::BytecodeChunk;
use crate::lexer::Span;
use crate::value::{JsString, PropertyKey};

static NEXT_TEMPLATE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_SITE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_template_id() -> u64 {
    NEXT_TEMPLATE_ID.fetch_add(1, Ordering::Relaxed)
}

pub(crate) fn next_site_id() -> u64 {
    NEXT_SITE_ID.fetch_add(1, Ordering::Relaxed)
}

/// A resolved variable: `hops` runtime scopes outward from the current one, then `slot`
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: JsString,
    pub hops: u32,
    pub slot: u32,
}

/// Break/continue target, unique within one function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Normal,
    Arrow,
    Method,
    Getter,
    Setter,
    /// Constructor of a base class
    ClassConstructor,
    /// Constructor of a class with `extends`; `this` starts uninitialized
    DerivedConstructor,
    /// Top level of a script
    Script,
}

impl FunctionKind {
    pub fn is_class_constructor(self) -> bool {
        matches!(
            self,
            FunctionKind::ClassConstructor | FunctionKind::DerivedConstructor
        )
    }
}

/// Everything needed to instantiate and run one function. Shared by all closures
/// created from the same source function.
#[derive(Debug)]
pub struct FunctionTemplate {
    pub id: u64,
    pub name: JsString,
    pub kind: FunctionKind,
    pub generator: bool,
    pub strict: bool,
    /// Value of the `length` property
    pub length: u32,
    /// Slots of the function's own scope
    pub slot_count: u32,
    /// Frame-local temporaries, never captured
    pub temp_count: u32,
    /// Slot holding `this` in derived constructors, where `super()` initializes it
    pub this_slot: Option<u32>,
    /// Parameter binding; for generators it runs before the generator object exists
    pub prologue: Vec<Stmt>,
    pub body: Body,
    pub span: Span,
    pub doc: Option<JsString>,
    /// Source text, for `Function.prototype.toString`
    pub source_text: Option<Rc<str>>,
    /// Bytecode, present once the compiled tier has translated this template
    pub chunk: OnceCell<Rc<BytecodeChunk>>,
}

impl FunctionTemplate {
    pub fn is_constructor(&self) -> bool {
        !self.generator
            && matches!(
                self.kind,
                FunctionKind::Normal
                    | FunctionKind::ClassConstructor
                    | FunctionKind::DerivedConstructor
            )
    }

    pub fn is_arrow(&self) -> bool {
        self.kind == FunctionKind::Arrow
    }

    /// Templates nested directly in this one (function and class expressions)
    pub fn nested_templates(&self) -> Vec<Rc<FunctionTemplate>> {
        let mut out = Vec::new();
        for stmt in &self.prologue {
            stmt.collect_templates(&mut out);
        }
        match &self.body {
            Body::Statements(stmts) => {
                for stmt in stmts {
                    stmt.collect_templates(&mut out);
                }
            }
            Body::StateMachine(machine) => {
                for block in &machine.blocks {
                    for stmt in &block.body {
                        stmt.collect_templates(&mut out);
                    }
                }
            }
        }
        out
    }
}

#[derive(Debug)]
pub enum Body {
    Statements(Vec<Stmt>),
    StateMachine(StateMachine),
}

// ============ STATEMENTS ============

#[derive(Debug, Clone)]
pub enum Stmt {
    Expr(Expr),
    /// Run `body` in a fresh child scope with `slots` uninitialized slots
    Scoped { slots: u32, body: Vec<Stmt> },
    /// Put slots of the current scope back into their uninitialized state
    Uninitialize(Vec<u32>),
    /// Create global `var` bindings and lexical declarations of a script
    DeclareGlobals {
        vars: Vec<JsString>,
        lexicals: Vec<(JsString, bool)>,
    },
    If {
        test: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    Loop(Box<LoopStmt>),
    ForIn(Box<ForEachStmt>),
    ForOf(Box<ForEachStmt>),
    Switch {
        label: LabelId,
        discriminant: Expr,
        cases: Vec<SwitchCase>,
    },
    /// Labeled non-loop statement; `break label` leaves it
    Labeled { label: LabelId, body: Vec<Stmt> },
    Try {
        block: Vec<Stmt>,
        catch: Option<CatchBlock>,
        finally: Option<Vec<Stmt>>,
    },
    Return(Option<Expr>),
    Break(LabelId),
    Continue(LabelId),
    Throw(Expr),
}

/// `while`, `do-while` and `for(;;)` after lowering
#[derive(Debug, Clone)]
pub struct LoopStmt {
    pub label: LabelId,
    pub test: Option<Expr>,
    pub update: Option<Expr>,
    pub body: Vec<Stmt>,
    /// Evaluate `test` before the first iteration (false for do-while)
    pub test_first: bool,
    /// Replace the enclosing scope with a copy after every iteration, so closures
    /// capture per-iteration `let` bindings
    pub fresh_scope: bool,
}

/// `for-in` / `for-of`: each iteration stores the next value in `value_temp`, then
/// runs `bind` and `body`, inside a fresh scope of `iteration_slots` when present
#[derive(Debug, Clone)]
pub struct ForEachStmt {
    pub label: LabelId,
    pub source: Expr,
    pub value_temp: u32,
    pub iteration_slots: Option<u32>,
    pub bind: Vec<Stmt>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct CatchBlock {
    /// Receives the exception before `body` runs
    pub temp: u32,
    pub body: Vec<Stmt>,
}

// ============ EXPRESSIONS ============

#[derive(Debug, Clone)]
pub enum Expr {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(JsString),
    RegExp {
        pattern: JsString,
        flags: JsString,
    },

    Local(Binding),
    Global(JsString),
    /// `typeof name` where `name` may be unresolvable
    TypeofGlobal(JsString),
    Temp(u32),
    SetTemp(u32, Box<Expr>),

    This,
    NewTarget,
    /// Positional argument of the current call (prologue only)
    Arg(u32),
    /// Arguments from this index on, as an array
    RestArgs(u32),
    ArgumentsObject,
    /// The running function object
    Callee,

    Function(Rc<FunctionTemplate>),
    Class(Box<ClassDef>),
    Array(Vec<ArrayItem>),
    Object(Vec<ObjectItem>),
    /// Untagged template: quasis and ToString of each substitution, concatenated
    TemplateConcat {
        quasis: Vec<JsString>,
        exprs: Vec<Expr>,
    },
    TaggedTemplate {
        callee: Box<Callee>,
        site: Rc<TemplateSite>,
        args: Vec<Expr>,
    },

    Unary(UnaryOp, Box<Expr>),
    Typeof(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Sequence(Vec<Expr>),
    /// Run statements, then evaluate `result`
    StmtExpr {
        stmts: Vec<Stmt>,
        result: Box<Expr>,
    },

    Get {
        object: Box<Expr>,
        key: Key,
    },
    /// `super[key]`, read with `this` as the receiver
    SuperGet {
        key: Key,
        this: Box<Expr>,
    },
    Assign {
        target: Box<Target>,
        value: Box<Expr>,
    },
    Compound {
        target: Box<Target>,
        op: BinaryOp,
        value: Box<Expr>,
    },
    LogicalAssign {
        target: Box<Target>,
        op: LogicalOp,
        value: Box<Expr>,
    },
    Update {
        target: Box<Target>,
        increment: bool,
        prefix: bool,
    },
    Delete {
        object: Box<Expr>,
        key: Key,
    },
    /// `delete name` in sloppy code
    DeleteGlobal(JsString),

    Call {
        callee: Box<Callee>,
        args: Vec<Arg>,
    },
    New {
        callee: Box<Expr>,
        args: Vec<Arg>,
    },
    SuperCall {
        args: Vec<Arg>,
        /// Where the derived constructor keeps `this`
        this_binding: Binding,
        new_target: Box<Expr>,
        /// The derived constructor itself
        active_function: Box<Expr>,
    },

    /// Iterator record over a value (`Symbol.iterator`)
    GetIterator(Box<Expr>),
    /// Next value of the iterator record in a temp, `undefined` once exhausted
    IteratorStep(u32),
    /// Remaining values of the iterator record as an array
    IteratorRest(u32),
    /// Whether the iterator record in a temp is exhausted
    IteratorDone(u32),
    /// Close the iterator record unless it is exhausted
    IteratorClose(u32),
    /// Snapshot of the enumerable keys of a value, stepped like an iterator record
    ForInIterator(Box<Expr>),
    /// Copy of the own enumerable properties of `source` minus `excluded` keys
    ObjectRest {
        source: Box<Expr>,
        excluded: Vec<Expr>,
    },
    /// TypeError on `null`/`undefined`, else the value itself
    RequireObjectCoercible(Box<Expr>),
    /// ToPropertyKey, returned as a string or symbol value
    ToPropertyKey(Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum Key {
    Static(PropertyKey),
    Computed(Box<Expr>),
}

/// How a local write treats the binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Declaration initializer; also ends the temporal dead zone
    Init,
    Assign,
    /// Assignment to a `const` after initialization
    Const,
}

#[derive(Debug, Clone)]
pub enum Target {
    Local { binding: Binding, mode: WriteMode },
    Global(JsString),
    /// Top-level `let`/`const`/`class` initializer
    GlobalLexicalInit(JsString),
    Member { object: Expr, key: Key },
    SuperMember { key: Key, this: Expr },
    Temp(u32),
}

#[derive(Debug, Clone)]
pub enum Callee {
    /// Plain call, `this` is undefined
    Value(Expr),
    /// `object.key(...)`, `this` is the object
    Member { object: Expr, key: Key },
    /// Function and receiver already evaluated (optional chains)
    WithThis { function: Expr, this: Expr },
}

#[derive(Debug, Clone)]
pub enum Arg {
    Value(Expr),
    Spread(Expr),
}

#[derive(Debug, Clone)]
pub enum ArrayItem {
    Value(Expr),
    Spread(Expr),
    Hole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Getter,
    Setter,
}

#[derive(Debug, Clone)]
pub enum ObjectItem {
    Property {
        key: Key,
        value: Expr,
        /// Anonymous function value named after a computed key at runtime
        name_function: bool,
    },
    Method {
        key: Key,
        function: Rc<FunctionTemplate>,
        kind: MethodKind,
    },
    Spread(Expr),
    /// `__proto__: value`
    Proto(Expr),
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: JsString,
    pub heritage: Option<Expr>,
    pub constructor: Rc<FunctionTemplate>,
    pub members: Vec<ClassMember>,
    /// Binding of the class name visible to the class body
    pub binding: Option<Binding>,
}

#[derive(Debug, Clone)]
pub struct ClassMember {
    pub key: Key,
    pub function: Rc<FunctionTemplate>,
    pub kind: MethodKind,
    pub is_static: bool,
}

/// One tagged-template call site: its strings never change, so the site object is
/// created once per realm and reused
#[derive(Debug)]
pub struct TemplateSite {
    pub id: u64,
    pub cooked: Vec<Option<JsString>>,
    pub raw: Vec<JsString>,
}

// ============ GENERATOR STATE MACHINE ============

/// Generator body as basic blocks. Block bodies never suspend; suspension happens
/// only at a [`Terminator`], after which the next resumption enters another block.
/// All values that live across a suspension are in scope slots or temps.
#[derive(Debug)]
pub struct StateMachine {
    pub blocks: Vec<SmBlock>,
    /// Number of `finally` regions, each with its own pending completion
    pub finally_count: u32,
}

#[derive(Debug)]
pub struct SmBlock {
    pub body: Vec<Stmt>,
    pub term: Terminator,
    /// Where an exception raised in this block goes
    pub handler: Option<Handler>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Catch { target: usize, temp: u32 },
    Finally(FinallyTarget),
}

/// Entry block of a `finally` region and its completion slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinallyTarget {
    pub fin: u32,
    pub block: usize,
}

#[derive(Debug, Clone)]
pub enum Terminator {
    Goto(usize),
    Branch {
        test: u32,
        then: usize,
        otherwise: usize,
    },
    /// Suspend with the value in `value`; the sent value lands in `sent` on resume
    Yield {
        value: u32,
        resume: usize,
        sent: u32,
        /// Innermost `finally` around the yield, run by `generator.return()`
        on_return: Option<FinallyTarget>,
    },
    /// `yield*` over the iterator record in `iterator`; the delegate's final value
    /// lands in `result`
    YieldDelegate {
        iterator: u32,
        resume: usize,
        result: u32,
        on_return: Option<FinallyTarget>,
    },
    Return {
        value: u32,
        via: Option<FinallyTarget>,
    },
    Throw(u32),
    /// Record a jump to `then` as the pending completion and run the finally block
    EnterFinally { finally: FinallyTarget, then: usize },
    /// End of a finally block: resume the pending completion
    EndFinally {
        fin: u32,
        outer: Option<FinallyTarget>,
    },
}

// ============ TEMPLATE DISCOVERY ============

impl Stmt {
    fn collect_templates(&self, out: &mut Vec<Rc<FunctionTemplate>>) {
        match self {
            Stmt::Expr(e) | Stmt::Throw(e) | Stmt::Return(Some(e)) => e.collect_templates(out),
            Stmt::Scoped { body, .. } | Stmt::Labeled { body, .. } => {
                body.iter().for_each(|s| s.collect_templates(out))
            }
            Stmt::If {
                test,
                then,
                otherwise,
            } => {
                test.collect_templates(out);
                then.iter()
                    .chain(otherwise.iter())
                    .for_each(|s| s.collect_templates(out));
            }
            Stmt::Loop(l) => {
                for e in l.test.iter().chain(l.update.iter()) {
                    e.collect_templates(out);
                }
                l.body.iter().for_each(|s| s.collect_templates(out));
            }
            Stmt::ForIn(f) | Stmt::ForOf(f) => {
                f.source.collect_templates(out);
                f.bind
                    .iter()
                    .chain(f.body.iter())
                    .for_each(|s| s.collect_templates(out));
            }
            Stmt::Switch {
                discriminant,
                cases,
                ..
            } => {
                discriminant.collect_templates(out);
                for case in cases {
                    if let Some(test) = &case.test {
                        test.collect_templates(out);
                    }
                    case.body.iter().for_each(|s| s.collect_templates(out));
                }
            }
            Stmt::Try {
                block,
                catch,
                finally,
            } => {
                block.iter().for_each(|s| s.collect_templates(out));
                if let Some(c) = catch {
                    c.body.iter().for_each(|s| s.collect_templates(out));
                }
                if let Some(f) = finally {
                    f.iter().for_each(|s| s.collect_templates(out));
                }
            }
            Stmt::Uninitialize(_)
            | Stmt::DeclareGlobals { .. }
            | Stmt::Return(None)
            | Stmt::Break(_)
            | Stmt::Continue(_) => {}
        }
    }
}

impl Expr {
    fn collect_templates(&self, out: &mut Vec<Rc<FunctionTemplate>>) {
        let key = |k: &Key, out: &mut Vec<Rc<FunctionTemplate>>| {
            if let Key::Computed(e) = k {
                e.collect_templates(out);
            }
        };
        let target = |t: &Target, out: &mut Vec<Rc<FunctionTemplate>>| match t {
            Target::Member { object, key: k } => {
                object.collect_templates(out);
                key(k, out);
            }
            Target::SuperMember { key: k, .. } => key(k, out),
            _ => {}
        };
        let callee = |c: &Callee, out: &mut Vec<Rc<FunctionTemplate>>| match c {
            Callee::Value(e) => e.collect_templates(out),
            Callee::Member { object, key: k } => {
                object.collect_templates(out);
                key(k, out);
            }
            Callee::WithThis { function, this } => {
                function.collect_templates(out);
                this.collect_templates(out);
            }
        };
        let args = |a: &[Arg], out: &mut Vec<Rc<FunctionTemplate>>| {
            for arg in a {
                match arg {
                    Arg::Value(e) | Arg::Spread(e) => e.collect_templates(out),
                }
            }
        };
        match self {
            Expr::Function(t) => out.push(t.clone()),
            Expr::Class(class) => {
                if let Some(h) = &class.heritage {
                    h.collect_templates(out);
                }
                out.push(class.constructor.clone());
                for member in &class.members {
                    key(&member.key, out);
                    out.push(member.function.clone());
                }
            }
            Expr::Array(items) => {
                for item in items {
                    if let ArrayItem::Value(e) | ArrayItem::Spread(e) = item {
                        e.collect_templates(out);
                    }
                }
            }
            Expr::Object(items) => {
                for item in items {
                    match item {
                        ObjectItem::Property { key: k, value, .. } => {
                            key(k, out);
                            value.collect_templates(out);
                        }
                        ObjectItem::Method { key: k, function, .. } => {
                            key(k, out);
                            out.push(function.clone());
                        }
                        ObjectItem::Spread(e) | ObjectItem::Proto(e) => e.collect_templates(out),
                    }
                }
            }
            Expr::TemplateConcat { exprs, .. } => {
                exprs.iter().for_each(|e| e.collect_templates(out))
            }
            Expr::TaggedTemplate {
                callee: c, args: a, ..
            } => {
                callee(c, out);
                a.iter().for_each(|e| e.collect_templates(out));
            }
            Expr::SetTemp(_, e)
            | Expr::Unary(_, e)
            | Expr::Typeof(e)
            | Expr::GetIterator(e)
            | Expr::ForInIterator(e)
            | Expr::RequireObjectCoercible(e)
            | Expr::ToPropertyKey(e) => e.collect_templates(out),
            Expr::Binary(_, a, b) | Expr::Logical(_, a, b) => {
                a.collect_templates(out);
                b.collect_templates(out);
            }
            Expr::Conditional(a, b, c) => {
                a.collect_templates(out);
                b.collect_templates(out);
                c.collect_templates(out);
            }
            Expr::Sequence(items) => items.iter().for_each(|e| e.collect_templates(out)),
            Expr::StmtExpr { stmts, result } => {
                stmts.iter().for_each(|s| s.collect_templates(out));
                result.collect_templates(out);
            }
            Expr::Get { object, key: k } | Expr::Delete { object, key: k } => {
                object.collect_templates(out);
                key(k, out);
            }
            Expr::SuperGet { key: k, .. } => key(k, out),
            Expr::Assign { target: t, value }
            | Expr::Compound {
                target: t, value, ..
            }
            | Expr::LogicalAssign {
                target: t, value, ..
            } => {
                target(t, out);
                value.collect_templates(out);
            }
            Expr::Update { target: t, .. } => target(t, out),
            Expr::Call { callee: c, args: a } => {
                callee(c, out);
                args(a, out);
            }
            Expr::New { callee: c, args: a } => {
                c.collect_templates(out);
                args(a, out);
            }
            Expr::SuperCall { args: a, .. } => args(a, out),
            Expr::ObjectRest { source, excluded } => {
                source.collect_templates(out);
                excluded.iter().for_each(|e| e.collect_templates(out));
            }
            Expr::Undefined
            | Expr::Null
            | Expr::Bool(_)
            | Expr::Number(_)
            | Expr::String(_)
            | Expr::RegExp { .. }
            | Expr::Local(_)
            | Expr::Global(_)
            | Expr::TypeofGlobal(_)
            | Expr::Temp(_)
            | Expr::This
            | Expr::NewTarget
            | Expr::Arg(_)
            | Expr::RestArgs(_)
            | Expr::ArgumentsObject
            | Expr::Callee
            | Expr::DeleteGlobal(_)
            | Expr::IteratorStep(_)
            | Expr::IteratorRest(_)
            | Expr::IteratorDone(_)
            | Expr::IteratorClose(_) => {}
        }
    }
}
