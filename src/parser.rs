//! Parser for JavaScript source code
//!
//! Uses recursive descent with Pratt parsing for expressions. Early errors
//! (strict-mode restrictions, invalid assignment targets, misplaced `break`,
//! constructs newer than the configured language version) are reported here as
//! `SyntaxError`s so that nothing partially parsed ever reaches lowering.

use std::rc::Rc;

use crate::ast::*;
use crate::config::{LanguageVersion, ParseOptions};
use crate::error::JsError;
use crate::lexer::{keyword_text, CommentKind, Lexer, LexerCheckpoint, Span, Token, TokenKind};
use crate::prelude::{grow_stack, FxHashSet};
use crate::string_dict::StringDict;
use crate::value::JsString;

/// How deeply statements and expressions may nest before parsing gives up
const MAX_NESTING: u32 = 2_000;

/// Words reserved only in strict code
const STRICT_RESERVED: &[&str] = &[
    "implements",
    "interface",
    "let",
    "package",
    "private",
    "protected",
    "public",
    "static",
    "yield",
];

#[derive(Debug, Clone)]
struct Label {
    name: JsString,
    is_loop: bool,
    /// The labeled statement is itself another labeled statement
    chained: bool,
}

/// Per-function parsing state
#[derive(Debug, Clone, Default)]
struct FunctionContext {
    strict: bool,
    in_function: bool,
    generator: bool,
    super_call: bool,
    super_property: bool,
    new_target: bool,
    labels: Vec<Label>,
    loop_depth: u32,
    switch_depth: u32,
}

/// Infix operator and whether it short-circuits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InfixOp {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

struct ParserCheckpoint {
    lexer: LexerCheckpoint,
    current: Token,
    previous: Token,
    cover_init: Option<Span>,
    no_in: bool,
}

/// Parser for JavaScript source code
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    previous: Token,
    options: ParseOptions,
    ctx: FunctionContext,
    /// Position of a `{ a = 1 }` shorthand that has not yet been reinterpreted
    /// as a destructuring pattern
    cover_init: Option<Span>,
    /// `in` is not a binary operator inside a `for (...;` initializer
    no_in: bool,
    /// Current nesting, bounded by [`MAX_NESTING`]
    depth: u32,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, string_dict: &'a mut StringDict, options: ParseOptions) -> Self {
        Self::starting_at_line(source, string_dict, options, 1)
    }

    /// Parser whose positions are numbered from `first_line`
    pub fn starting_at_line(
        source: &'a str,
        string_dict: &'a mut StringDict,
        options: ParseOptions,
        first_line: u32,
    ) -> Self {
        let mut lexer = Lexer::new(source, string_dict).with_first_line(first_line);
        if options.record_comments {
            lexer = lexer.with_comments();
        }
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            previous: Token::eof(0, first_line.max(1), 1),
            options,
            ctx: FunctionContext::default(),
            cover_init: None,
            no_in: false,
            depth: 0,
        }
    }

    /// Run `f` one nesting level deeper
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, JsError>) -> Result<T, JsError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("Maximum nesting depth exceeded"));
        }
        self.depth += 1;
        let result = grow_stack(|| f(self));
        self.depth -= 1;
        result
    }

    /// Helper to intern a string in the dictionary
    #[inline]
    fn intern(&mut self, s: &str) -> JsString {
        self.lexer.string_dict().get_or_insert(s)
    }

    /// Parse a complete program
    pub fn parse_program(&mut self) -> Result<Program, JsError> {
        let start = self.current.span;
        let mut body = Vec::new();
        let strict = self.parse_directives(&mut body)?;

        while !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        let span = Span::new(start.start, self.lexer.source().len(), start.line, start.column);
        Ok(Program {
            body,
            strict,
            comments: self.lexer.take_comments(),
            span,
        })
    }

    /// Parse the directive prologue, switching to strict mode on `"use strict"`
    fn parse_directives(&mut self, body: &mut Vec<Statement>) -> Result<bool, JsError> {
        let mut became_strict = false;
        let mut octal: Option<Span> = None;

        loop {
            let legacy = match &self.current.kind {
                TokenKind::String(_) => false,
                TokenKind::LegacyOctalString(_) => true,
                _ => break,
            };
            let token_span = self.current.span;
            let raw = self
                .lexer
                .source()
                .get(token_span.start..token_span.end)
                .unwrap_or("");
            let statement = self.parse_statement()?;
            let is_directive = matches!(
                &statement,
                Statement::Expression(stmt)
                    if matches!(stmt.expression.as_ref(), Expression::Literal(lit) if lit.span == token_span)
            );
            body.push(statement);
            if !is_directive {
                break;
            }
            if legacy {
                octal.get_or_insert(token_span);
            }
            if raw == "\"use strict\"" || raw == "'use strict'" {
                became_strict = true;
                self.ctx.strict = true;
            }
        }

        if self.ctx.strict {
            if let Some(span) = octal {
                return Err(self.error_at(
                    "Octal escape sequences are not allowed in strict mode",
                    span,
                ));
            }
        }
        Ok(became_strict)
    }

    // ============ STATEMENTS ============

    fn parse_statement(&mut self) -> Result<Statement, JsError> {
        self.nested(Self::parse_statement_unchecked)
    }

    fn parse_statement_unchecked(&mut self) -> Result<Statement, JsError> {
        // Labeled statement: identifier followed by colon
        if self.check_identifier() && self.peek_is(&TokenKind::Colon) {
            return self.parse_labeled_statement();
        }

        let let_declaration =
            matches!(self.current.kind, TokenKind::Let) && self.let_starts_declaration();
        match &self.current.kind {
            TokenKind::Let if let_declaration => Ok(
                Statement::VariableDeclaration(self.parse_variable_statement()?),
            ),
            TokenKind::Const | TokenKind::Var => Ok(Statement::VariableDeclaration(
                self.parse_variable_statement()?,
            )),
            TokenKind::Function => {
                let function = self.parse_function_declaration()?;
                Ok(Statement::FunctionDeclaration(function))
            }
            TokenKind::Class => Ok(Statement::ClassDeclaration(self.parse_class(true)?)),
            TokenKind::LBrace => Ok(Statement::Block(self.parse_block_statement()?)),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Do => self.parse_do_while_statement(),
            TokenKind::Switch => self.parse_switch_statement(),
            TokenKind::Try => self.parse_try_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Break => self.parse_break_statement(),
            TokenKind::Continue => self.parse_continue_statement(),
            TokenKind::Throw => self.parse_throw_statement(),
            TokenKind::Semicolon => {
                let span = self.current.span;
                self.advance();
                Ok(Statement::Empty(span))
            }
            TokenKind::Debugger => {
                let start = self.current.span;
                self.advance();
                self.expect_semicolon()?;
                Ok(Statement::Debugger(self.span_from(start)))
            }
            TokenKind::With => {
                if self.ctx.strict {
                    Err(self.error("Strict mode code may not include a with statement"))
                } else {
                    Err(self.error("with statement is not supported"))
                }
            }
            _ => self.parse_expression_statement(),
        }
    }

    /// Body of `if`, loops and labels: declarations other than `var` are not allowed
    fn parse_substatement(&mut self) -> Result<Statement, JsError> {
        let lexical = match &self.current.kind {
            TokenKind::Const | TokenKind::Class => true,
            TokenKind::Let => self.ctx.strict || self.peek_is(&TokenKind::LBracket),
            TokenKind::Function => self.ctx.strict,
            _ => false,
        };
        if lexical {
            return Err(self.error("Declaration not allowed in a single-statement context"));
        }
        self.parse_statement()
    }

    fn parse_expression_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        let doc = self.doc_before(start);
        let mut expression = self.parse_expression()?;
        if let Expression::Assignment(assignment) = &mut expression {
            if let Some(right) = Rc::get_mut(&mut assignment.right) {
                inherit_doc(right, &doc);
            }
        }
        self.expect_semicolon()?;
        let span = self.span_from(start);
        Ok(Statement::Expression(ExpressionStatement {
            expression: Rc::new(expression),
            doc,
            span,
        }))
    }

    /// `let` begins a declaration only when followed by a binding
    fn let_starts_declaration(&mut self) -> bool {
        let checkpoint = self.lexer.checkpoint();
        let next = self.lexer.next_token();
        self.lexer.restore(checkpoint);
        match next.kind {
            TokenKind::LBracket | TokenKind::LBrace => true,
            TokenKind::Identifier(_)
            | TokenKind::Let
            | TokenKind::Yield
            | TokenKind::Of
            | TokenKind::Static => true,
            _ => false,
        }
    }

    fn parse_variable_statement(&mut self) -> Result<VariableDeclaration, JsError> {
        let declaration = self.parse_variable_declaration(false)?;
        self.expect_semicolon()?;
        Ok(VariableDeclaration {
            span: self.span_from(declaration.span),
            ..declaration
        })
    }

    /// Declaration list without the terminating semicolon. Initializers are
    /// optional inside a `for` head, where for-in/of supplies the value.
    fn parse_variable_declaration(
        &mut self,
        in_for_head: bool,
    ) -> Result<VariableDeclaration, JsError> {
        let start = self.current.span;
        let doc = self.doc_before(start);
        let kind = match self.current.kind {
            TokenKind::Let => VariableKind::Let,
            TokenKind::Const => VariableKind::Const,
            _ => VariableKind::Var,
        };
        if kind != VariableKind::Var {
            self.require_version(
                LanguageVersion::Es2015,
                if kind == VariableKind::Let {
                    "let declarations"
                } else {
                    "const declarations"
                },
                start,
            )?;
        }
        self.advance();

        let mut declarations = Vec::new();
        loop {
            let mut declarator = self.parse_variable_declarator()?;
            if declarations.is_empty() {
                if let Some(init) = declarator.init.as_mut().and_then(Rc::get_mut) {
                    inherit_doc(init, &doc);
                }
            }
            if !in_for_head {
                self.check_declarator_init(kind, &declarator)?;
            }
            declarator.span = self.span_from(declarator.span);
            declarations.push(declarator);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        if kind != VariableKind::Var {
            let mut names = Vec::new();
            for declarator in &declarations {
                declarator.id.bound_names(&mut names);
            }
            let mut seen = FxHashSet::default();
            for id in names {
                if id.name.as_str() == "let" {
                    return Err(self.error_at(
                        "let is disallowed as a lexically bound name",
                        id.span,
                    ));
                }
                if !seen.insert(id.name.clone()) {
                    return Err(self.error_at(
                        &format!("Identifier '{}' has already been declared", id.name),
                        id.span,
                    ));
                }
            }
        }

        let span = self.span_from(start);
        Ok(VariableDeclaration {
            kind,
            declarations,
            doc,
            span,
        })
    }

    fn parse_variable_declarator(&mut self) -> Result<VariableDeclarator, JsError> {
        let start = self.current.span;
        let id = self.parse_binding_pattern()?;

        let init = if self.match_token(&TokenKind::Eq) {
            Some(Rc::new(self.parse_assignment_expression()?))
        } else {
            None
        };

        Ok(VariableDeclarator {
            id,
            init,
            span: start,
        })
    }

    fn check_declarator_init(
        &self,
        kind: VariableKind,
        declarator: &VariableDeclarator,
    ) -> Result<(), JsError> {
        if declarator.init.is_some() {
            return Ok(());
        }
        if kind == VariableKind::Const {
            return Err(self.error_at("Missing initializer in const declaration", declarator.span));
        }
        if !matches!(declarator.id, Pattern::Identifier(_)) {
            return Err(self.error_at(
                "Missing initializer in destructuring declaration",
                declarator.span,
            ));
        }
        Ok(())
    }

    /// Binding identifier or destructuring pattern, as in declarations and parameters
    fn parse_binding_pattern(&mut self) -> Result<Pattern, JsError> {
        match &self.current.kind {
            TokenKind::LBrace => self.parse_object_pattern(),
            TokenKind::LBracket => self.parse_array_pattern(),
            _ => Ok(Pattern::Identifier(self.parse_binding_identifier()?)),
        }
    }

    /// Binding pattern with an optional `= default`
    fn parse_binding_element(&mut self) -> Result<Pattern, JsError> {
        let start = self.current.span;
        let pattern = self.parse_binding_pattern()?;
        if self.check(&TokenKind::Eq) {
            self.require_version(LanguageVersion::Es2015, "default values", self.current.span)?;
            self.advance();
            let right = self.parse_assignment_expression()?;
            let span = self.span_from(start);
            return Ok(Pattern::Assignment(AssignmentPattern {
                left: Box::new(pattern),
                right: Rc::new(right),
                span,
            }));
        }
        Ok(pattern)
    }

    fn parse_binding_identifier(&mut self) -> Result<Identifier, JsError> {
        let id = self.parse_identifier()?;
        self.validate_binding_identifier(&id, self.ctx.strict)?;
        Ok(id)
    }

    fn validate_binding_identifier(&self, id: &Identifier, strict: bool) -> Result<(), JsError> {
        if strict && matches!(id.name.as_str(), "eval" | "arguments") {
            return Err(self.error_at(
                &format!("Unexpected {} in strict mode", id.name),
                id.span,
            ));
        }
        if strict && STRICT_RESERVED.contains(&id.name.as_str()) {
            return Err(self.error_at(
                &format!("Unexpected strict mode reserved word '{}'", id.name),
                id.span,
            ));
        }
        Ok(())
    }

    fn parse_object_pattern(&mut self) -> Result<Pattern, JsError> {
        let start = self.current.span;
        self.require_version(LanguageVersion::Es2015, "destructuring", start)?;
        self.require_token(&TokenKind::LBrace)?;

        let mut properties = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.check(&TokenKind::DotDotDot) {
                let rest_start = self.current.span;
                self.require_version(
                    LanguageVersion::Es2018,
                    "object rest properties",
                    rest_start,
                )?;
                self.advance();
                let id = self.parse_binding_identifier()?;
                properties.push(ObjectPatternProperty::Rest(Box::new(Pattern::Identifier(id))));
                if self.check(&TokenKind::Comma) {
                    return Err(self.error("Rest element must be last element"));
                }
                break;
            }

            let prop_start = self.current.span;
            let shorthand_name = self.check_identifier();
            let key = self.parse_property_name()?;

            let (value, shorthand) = if self.match_token(&TokenKind::Colon) {
                (self.parse_binding_element()?, false)
            } else {
                if !shorthand_name {
                    return Err(self.unexpected_token("':'"));
                }
                let PropertyName::Identifier(name) = &key else {
                    return Err(self.unexpected_token("':'"));
                };
                let id = Identifier {
                    name: name.clone(),
                    span: prop_start,
                };
                self.validate_binding_identifier(&id, self.ctx.strict)?;
                let mut value = Pattern::Identifier(id);
                if self.match_token(&TokenKind::Eq) {
                    let right = Rc::new(self.parse_assignment_expression()?);
                    value = Pattern::Assignment(AssignmentPattern {
                        left: Box::new(value),
                        right,
                        span: self.span_from(prop_start),
                    });
                }
                (value, true)
            };

            properties.push(ObjectPatternProperty::KeyValue {
                key,
                value,
                shorthand,
                span: self.span_from(prop_start),
            });

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.require_token(&TokenKind::RBrace)?;
        let span = self.span_from(start);
        Ok(Pattern::Object(ObjectPattern { properties, span }))
    }

    fn parse_array_pattern(&mut self) -> Result<Pattern, JsError> {
        let start = self.current.span;
        self.require_version(LanguageVersion::Es2015, "destructuring", start)?;
        self.require_token(&TokenKind::LBracket)?;

        let mut elements = Vec::new();
        while !self.check(&TokenKind::RBracket) && !self.is_at_end() {
            if self.match_token(&TokenKind::Comma) {
                elements.push(None);
                continue;
            }

            if self.check(&TokenKind::DotDotDot) {
                let rest_start = self.current.span;
                self.advance();
                let argument = self.parse_binding_pattern()?;
                elements.push(Some(Pattern::Rest(RestElement {
                    argument: Box::new(argument),
                    span: self.span_from(rest_start),
                })));
                if self.check(&TokenKind::Comma) {
                    return Err(self.error("Rest element must be last element"));
                }
                break;
            }

            elements.push(Some(self.parse_binding_element()?));

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.require_token(&TokenKind::RBracket)?;
        let span = self.span_from(start);
        Ok(Pattern::Array(ArrayPattern { elements, span }))
    }

    fn parse_block_statement(&mut self) -> Result<BlockStatement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBrace)?;

        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        self.require_token(&TokenKind::RBrace)?;
        let span = self.span_from(start);
        Ok(BlockStatement { body, span })
    }

    fn parse_if_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::If)?;
        self.require_token(&TokenKind::LParen)?;
        let test = Rc::new(self.parse_expression()?);
        self.require_token(&TokenKind::RParen)?;

        let consequent = Box::new(self.parse_substatement()?);
        let alternate = if self.match_token(&TokenKind::Else) {
            Some(Box::new(self.parse_substatement()?))
        } else {
            None
        };

        let span = self.span_from(start);
        Ok(Statement::If(IfStatement {
            test,
            consequent,
            alternate,
            span,
        }))
    }

    fn parse_loop_body(&mut self) -> Result<Box<Statement>, JsError> {
        self.ctx.loop_depth += 1;
        let body = self.parse_substatement();
        self.ctx.loop_depth -= 1;
        Ok(Box::new(body?))
    }

    fn parse_for_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::For)?;
        self.require_token(&TokenKind::LParen)?;

        let mut init = None;
        if self.check(&TokenKind::Semicolon) {
            // Empty initializer
        } else if self.check(&TokenKind::Var)
            || self.check(&TokenKind::Const)
            || (self.check(&TokenKind::Let) && self.let_starts_declaration())
        {
            let saved_no_in = std::mem::replace(&mut self.no_in, true);
            let declaration = self.parse_variable_declaration(true);
            self.no_in = saved_no_in;
            let declaration = declaration?;

            if self.check(&TokenKind::In) || self.check(&TokenKind::Of) {
                let is_of = self.check(&TokenKind::Of);
                if declaration.declarations.len() != 1 {
                    return Err(self.error(
                        "Invalid left-hand side in for-in loop: must have a single binding",
                    ));
                }
                let Some(declarator) = declaration.declarations.into_iter().next() else {
                    return Err(self.error("Invalid left-hand side in for-in loop"));
                };
                if declarator.init.is_some() {
                    return Err(self.error_at(
                        "for-in loop variable declaration may not have an initializer",
                        declarator.span,
                    ));
                }
                let left = ForInOfLeft::Variable(declaration.kind, declarator.id);
                return self.parse_for_in_of_rest(start, left, is_of);
            }

            for declarator in &declaration.declarations {
                self.check_declarator_init(declaration.kind, declarator)?;
            }
            init = Some(ForInit::Variable(declaration));
        } else {
            let expr_start = self.current.span;
            let saved_no_in = std::mem::replace(&mut self.no_in, true);
            let expr = self.parse_assignment_expression_cover();
            self.no_in = saved_no_in;
            let mut expr = expr?;

            if self.check(&TokenKind::In) || self.check(&TokenKind::Of) {
                let is_of = self.check(&TokenKind::Of);
                if is_of && matches!(&expr, Expression::Identifier(id) if id.name.as_str() == "let")
                {
                    return Err(self.error("The left-hand side of a for-of loop may not be 'let'"));
                }
                let pattern = self.expression_to_for_target(&expr)?;
                self.cover_init = None;
                return self.parse_for_in_of_rest(start, ForInOfLeft::Pattern(pattern), is_of);
            }

            self.check_cover_init()?;
            if self.check(&TokenKind::Comma) {
                let saved_no_in = std::mem::replace(&mut self.no_in, true);
                let mut expressions = vec![Rc::new(expr)];
                let mut result = Ok(());
                while self.match_token(&TokenKind::Comma) {
                    match self.parse_assignment_expression() {
                        Ok(next) => expressions.push(Rc::new(next)),
                        Err(err) => {
                            result = Err(err);
                            break;
                        }
                    }
                }
                self.no_in = saved_no_in;
                result?;
                expr = Expression::Sequence(SequenceExpression {
                    expressions,
                    span: self.span_from(expr_start),
                });
            }
            init = Some(ForInit::Expression(Rc::new(expr)));
        }

        self.require_token(&TokenKind::Semicolon)?;
        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(Rc::new(self.parse_expression()?))
        };
        self.require_token(&TokenKind::Semicolon)?;
        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(Rc::new(self.parse_expression()?))
        };
        self.require_token(&TokenKind::RParen)?;

        let body = self.parse_loop_body()?;
        let span = self.span_from(start);
        Ok(Statement::For(ForStatement {
            init,
            test,
            update,
            body,
            span,
        }))
    }

    fn parse_for_in_of_rest(
        &mut self,
        start: Span,
        left: ForInOfLeft,
        is_of: bool,
    ) -> Result<Statement, JsError> {
        if is_of {
            self.require_version(LanguageVersion::Es2015, "for-of loops", self.current.span)?;
        }
        self.advance(); // consume 'in' or 'of'
        let right = Rc::new(if is_of {
            self.parse_assignment_expression()?
        } else {
            self.parse_expression()?
        });
        self.require_token(&TokenKind::RParen)?;
        let body = self.parse_loop_body()?;
        let span = self.span_from(start);

        Ok(if is_of {
            Statement::ForOf(ForOfStatement {
                left,
                right,
                body,
                span,
            })
        } else {
            Statement::ForIn(ForInStatement {
                left,
                right,
                body,
                span,
            })
        })
    }

    fn parse_while_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::While)?;
        self.require_token(&TokenKind::LParen)?;
        let test = Rc::new(self.parse_expression()?);
        self.require_token(&TokenKind::RParen)?;
        let body = self.parse_loop_body()?;

        let span = self.span_from(start);
        Ok(Statement::While(WhileStatement { test, body, span }))
    }

    fn parse_do_while_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Do)?;
        let body = self.parse_loop_body()?;
        self.require_token(&TokenKind::While)?;
        self.require_token(&TokenKind::LParen)?;
        let test = Rc::new(self.parse_expression()?);
        self.require_token(&TokenKind::RParen)?;
        // A semicolon is always inserted after do-while
        self.match_token(&TokenKind::Semicolon);

        let span = self.span_from(start);
        Ok(Statement::DoWhile(DoWhileStatement { body, test, span }))
    }

    fn parse_switch_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Switch)?;
        self.require_token(&TokenKind::LParen)?;
        let discriminant = Rc::new(self.parse_expression()?);
        self.require_token(&TokenKind::RParen)?;
        self.require_token(&TokenKind::LBrace)?;

        self.ctx.switch_depth += 1;
        let cases = self.parse_switch_cases();
        self.ctx.switch_depth -= 1;
        let cases = cases?;

        self.require_token(&TokenKind::RBrace)?;
        let span = self.span_from(start);
        Ok(Statement::Switch(SwitchStatement {
            discriminant,
            cases,
            span,
        }))
    }

    fn parse_switch_cases(&mut self) -> Result<Vec<SwitchCase>, JsError> {
        let mut cases = Vec::new();
        let mut seen_default = false;

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let case_start = self.current.span;
            let test = if self.match_token(&TokenKind::Case) {
                Some(Rc::new(self.parse_expression()?))
            } else if self.match_token(&TokenKind::Default) {
                if seen_default {
                    return Err(self.error_at(
                        "More than one default clause in switch statement",
                        case_start,
                    ));
                }
                seen_default = true;
                None
            } else {
                return Err(self.unexpected_token("'case' or 'default'"));
            };
            self.require_token(&TokenKind::Colon)?;

            let mut consequent = Vec::new();
            while !self.check(&TokenKind::Case)
                && !self.check(&TokenKind::Default)
                && !self.check(&TokenKind::RBrace)
                && !self.is_at_end()
            {
                consequent.push(self.parse_statement()?);
            }

            let span = self.span_from(case_start);
            cases.push(SwitchCase {
                test,
                consequent,
                span,
            });
        }

        Ok(cases)
    }

    fn parse_try_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Try)?;
        let block = self.parse_block_statement()?;

        let handler = if self.check(&TokenKind::Catch) {
            let catch_start = self.current.span;
            self.advance();
            let param = if self.match_token(&TokenKind::LParen) {
                let param = self.parse_binding_pattern()?;
                self.require_token(&TokenKind::RParen)?;
                Some(param)
            } else {
                self.require_version(
                    LanguageVersion::Es2020,
                    "optional catch binding",
                    catch_start,
                )?;
                None
            };
            let body = self.parse_block_statement()?;
            let span = self.span_from(catch_start);
            Some(CatchClause { param, body, span })
        } else {
            None
        };

        let finalizer = if self.match_token(&TokenKind::Finally) {
            Some(self.parse_block_statement()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(self.error("Missing catch or finally after try"));
        }

        let span = self.span_from(start);
        Ok(Statement::Try(TryStatement {
            block,
            handler,
            finalizer,
            span,
        }))
    }

    /// Whether the current token can begin the optional operand of a restricted production
    fn at_statement_end(&self) -> bool {
        self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RBrace)
            || self.is_at_end()
            || self.lexer.had_newline_before()
    }

    fn parse_return_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        if !self.ctx.in_function {
            return Err(self.error("Illegal return statement"));
        }
        self.require_token(&TokenKind::Return)?;

        let argument = if self.at_statement_end() {
            None
        } else {
            Some(Rc::new(self.parse_expression()?))
        };
        self.expect_semicolon()?;

        let span = self.span_from(start);
        Ok(Statement::Return(ReturnStatement { argument, span }))
    }

    fn parse_jump_label(&mut self) -> Result<Option<Identifier>, JsError> {
        if self.check_identifier() && !self.lexer.had_newline_before() {
            Ok(Some(self.parse_identifier()?))
        } else {
            Ok(None)
        }
    }

    fn parse_break_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Break)?;
        let label = self.parse_jump_label()?;

        match &label {
            Some(label) => {
                if !self.ctx.labels.iter().any(|l| l.name == label.name) {
                    return Err(self.error_at(&format!("Undefined label '{}'", label.name), label.span));
                }
            }
            None => {
                if self.ctx.loop_depth == 0 && self.ctx.switch_depth == 0 {
                    return Err(self.error_at("Illegal break statement", start));
                }
            }
        }
        self.expect_semicolon()?;

        let span = self.span_from(start);
        Ok(Statement::Break(BreakStatement { label, span }))
    }

    fn parse_continue_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Continue)?;
        let label = self.parse_jump_label()?;

        if self.ctx.loop_depth == 0 {
            return Err(self.error_at(
                "Illegal continue statement: no surrounding iteration statement",
                start,
            ));
        }
        if let Some(label) = &label {
            match self.ctx.labels.iter().rev().find(|l| l.name == label.name) {
                None => {
                    return Err(
                        self.error_at(&format!("Undefined label '{}'", label.name), label.span)
                    );
                }
                Some(found) if !found.is_loop => {
                    return Err(self.error_at(
                        &format!(
                            "Illegal continue statement: '{}' does not denote an iteration statement",
                            label.name
                        ),
                        label.span,
                    ));
                }
                Some(_) => {}
            }
        }
        self.expect_semicolon()?;

        let span = self.span_from(start);
        Ok(Statement::Continue(ContinueStatement { label, span }))
    }

    fn parse_throw_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Throw)?;
        if self.lexer.had_newline_before() {
            return Err(self.error("Illegal newline after throw"));
        }
        let argument = Rc::new(self.parse_expression()?);
        self.expect_semicolon()?;

        let span = self.span_from(start);
        Ok(Statement::Throw(ThrowStatement { argument, span }))
    }

    fn parse_labeled_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.current.span;
        let label = self.parse_identifier()?;
        self.require_token(&TokenKind::Colon)?;

        if self.ctx.labels.iter().any(|l| l.name == label.name) {
            return Err(self.error_at(
                &format!("Label '{}' has already been declared", label.name),
                label.span,
            ));
        }

        let is_loop = matches!(
            self.current.kind,
            TokenKind::For | TokenKind::While | TokenKind::Do
        );
        let chained = self.check_identifier() && self.peek_is(&TokenKind::Colon);
        if is_loop {
            // Labels directly wrapping this one also label the loop
            for outer in self.ctx.labels.iter_mut().rev() {
                if !outer.chained {
                    break;
                }
                outer.is_loop = true;
            }
        }
        self.ctx.labels.push(Label {
            name: label.name.clone(),
            is_loop,
            chained,
        });

        let body = if self.check(&TokenKind::Function) && !self.ctx.strict {
            self.parse_statement()
        } else {
            self.parse_substatement()
        };
        self.ctx.labels.pop();
        let body = Box::new(body?);

        let span = self.span_from(start);
        Ok(Statement::Labeled(LabeledStatement { label, body, span }))
    }

    // ============ FUNCTIONS ============

    fn parse_function_declaration(&mut self) -> Result<Rc<Function>, JsError> {
        let start = self.current.span;
        let doc = self.doc_before(start);
        self.require_token(&TokenKind::Function)?;
        let generator = self.parse_generator_star()?;
        let id = self.parse_identifier()?;
        self.parse_function_rest(Some(id), FunctionKind::Normal, generator, start, doc)
    }

    fn parse_function_expression(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        let doc = self.doc_before(start);
        self.require_token(&TokenKind::Function)?;
        let generator = self.parse_generator_star()?;
        let id = if self.check(&TokenKind::LParen) {
            None
        } else {
            // The name of a generator expression is bound inside the generator
            let saved = std::mem::replace(&mut self.ctx.generator, generator);
            let id = self.parse_identifier();
            self.ctx.generator = saved;
            Some(id?)
        };
        let function = self.parse_function_rest(id, FunctionKind::Normal, generator, start, doc)?;
        Ok(Expression::Function(function))
    }

    fn parse_generator_star(&mut self) -> Result<bool, JsError> {
        if self.check(&TokenKind::Star) {
            self.require_version(LanguageVersion::Es2015, "generators", self.current.span)?;
            self.advance();
            return Ok(true);
        }
        Ok(false)
    }

    /// Context for a new non-arrow function body
    fn function_context(&self, kind: FunctionKind, generator: bool) -> FunctionContext {
        FunctionContext {
            strict: self.ctx.strict,
            in_function: true,
            generator,
            super_call: kind == FunctionKind::ClassConstructor && self.ctx.super_call,
            super_property: matches!(
                kind,
                FunctionKind::Method
                    | FunctionKind::Getter
                    | FunctionKind::Setter
                    | FunctionKind::ClassConstructor
            ),
            new_target: true,
            labels: Vec::new(),
            loop_depth: 0,
            switch_depth: 0,
        }
    }

    /// Parameters and body of every non-arrow function form; the current token is `(`
    fn parse_function_rest(
        &mut self,
        id: Option<Identifier>,
        kind: FunctionKind,
        generator: bool,
        start: Span,
        doc: Option<JsString>,
    ) -> Result<Rc<Function>, JsError> {
        let context = self.function_context(kind, generator);
        let outer = std::mem::replace(&mut self.ctx, context);
        let saved_no_in = std::mem::replace(&mut self.no_in, false);
        let result = self.parse_function_parts();
        let strict = self.ctx.strict;
        self.ctx = outer;
        self.no_in = saved_no_in;
        let (params, body) = result?;

        if let Some(id) = &id {
            self.validate_binding_identifier(id, strict)?;
        }

        let simple_params = params.iter().all(|p| matches!(p, Pattern::Identifier(_)));
        let unique = !simple_params || kind != FunctionKind::Normal;
        self.validate_params(&params, strict, unique)?;
        self.check_accessor_params(kind, &params, start)?;

        let span = self.span_from(start);
        Ok(Rc::new(Function {
            id,
            params,
            body: FunctionBody::Block(body),
            kind,
            generator,
            strict,
            simple_params,
            doc,
            span,
        }))
    }

    fn parse_function_parts(&mut self) -> Result<(Vec<Pattern>, Vec<Statement>), JsError> {
        let params = self.parse_function_params()?;
        let body = self.parse_function_body(&params)?;
        Ok((params, body))
    }

    /// `{ directives statements }`; may switch the current context to strict
    fn parse_function_body(&mut self, params: &[Pattern]) -> Result<Vec<Statement>, JsError> {
        let body_start = self.current.span;
        self.require_token(&TokenKind::LBrace)?;
        let mut body = Vec::new();
        let became_strict = self.parse_directives(&mut body)?;
        if became_strict && !params.iter().all(|p| matches!(p, Pattern::Identifier(_))) {
            return Err(self.error_at(
                "Illegal 'use strict' directive in function with non-simple parameter list",
                body_start,
            ));
        }
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            body.push(self.parse_statement()?);
        }
        self.require_token(&TokenKind::RBrace)?;
        Ok(body)
    }

    fn parse_function_params(&mut self) -> Result<Vec<Pattern>, JsError> {
        self.require_token(&TokenKind::LParen)?;
        let mut params = Vec::new();

        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            if self.check(&TokenKind::DotDotDot) {
                let rest_start = self.current.span;
                self.require_version(LanguageVersion::Es2015, "rest parameters", rest_start)?;
                self.advance();
                let argument = self.parse_binding_pattern()?;
                params.push(Pattern::Rest(RestElement {
                    argument: Box::new(argument),
                    span: self.span_from(rest_start),
                }));
                if self.check(&TokenKind::Comma) {
                    return Err(self.error("Rest parameter must be last formal parameter"));
                }
                break;
            }

            params.push(self.parse_binding_element()?);

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
            if self.check(&TokenKind::RParen) {
                self.require_version(
                    LanguageVersion::Es2017,
                    "trailing commas in parameter lists",
                    self.previous.span,
                )?;
            }
        }

        self.require_token(&TokenKind::RParen)?;
        Ok(params)
    }

    fn validate_params(&self, params: &[Pattern], strict: bool, unique: bool) -> Result<(), JsError> {
        let mut names = Vec::new();
        for param in params {
            param.bound_names(&mut names);
        }
        let mut seen = FxHashSet::default();
        for id in &names {
            self.validate_binding_identifier(id, strict)?;
            if !seen.insert(id.name.clone()) && (strict || unique) {
                return Err(self.error_at(
                    "Duplicate parameter name not allowed in this context",
                    id.span,
                ));
            }
        }
        Ok(())
    }

    fn check_accessor_params(
        &self,
        kind: FunctionKind,
        params: &[Pattern],
        start: Span,
    ) -> Result<(), JsError> {
        match kind {
            FunctionKind::Getter if !params.is_empty() => {
                Err(self.error_at("Getter must not have any formal parameters", start))
            }
            FunctionKind::Setter
                if params.len() != 1 || matches!(params.first(), Some(Pattern::Rest(_))) =>
            {
                Err(self.error_at("Setter must have exactly one formal parameter", start))
            }
            _ => Ok(()),
        }
    }

    /// Arrow body after the parameter list; the current token is `=>`
    fn parse_arrow_function(
        &mut self,
        params: Vec<Pattern>,
        start: Span,
    ) -> Result<Expression, JsError> {
        self.require_version(LanguageVersion::Es2015, "arrow functions", start)?;
        if self.lexer.had_newline_before() {
            return Err(self.error("Unexpected newline before '=>'"));
        }
        self.require_token(&TokenKind::Arrow)?;

        let context = FunctionContext {
            strict: self.ctx.strict,
            in_function: true,
            generator: false,
            super_call: self.ctx.super_call,
            super_property: self.ctx.super_property,
            new_target: self.ctx.new_target,
            labels: Vec::new(),
            loop_depth: 0,
            switch_depth: 0,
        };
        let outer = std::mem::replace(&mut self.ctx, context);
        let result = if self.check(&TokenKind::LBrace) {
            let saved_no_in = std::mem::replace(&mut self.no_in, false);
            let body = self.parse_function_body(&params);
            self.no_in = saved_no_in;
            body.map(FunctionBody::Block)
        } else {
            self.parse_assignment_expression()
                .map(|expr| FunctionBody::Expression(Rc::new(expr)))
        };
        let strict = self.ctx.strict;
        self.ctx = outer;
        let body = result?;

        let simple_params = params.iter().all(|p| matches!(p, Pattern::Identifier(_)));
        self.validate_params(&params, strict, true)?;

        let span = self.span_from(start);
        Ok(Expression::Function(Rc::new(Function {
            id: None,
            params,
            body,
            kind: FunctionKind::Arrow,
            generator: false,
            strict,
            simple_params,
            doc: None,
            span,
        })))
    }

    /// Method in an object literal or class body, after its key
    fn parse_method(
        &mut self,
        kind: FunctionKind,
        generator: bool,
        start: Span,
        doc: Option<JsString>,
    ) -> Result<Rc<Function>, JsError> {
        // Accessors predate ES2015
        if kind == FunctionKind::Method {
            self.require_version(LanguageVersion::Es2015, "shorthand methods", start)?;
        }
        self.parse_function_rest(None, kind, generator, start, doc)
    }

    // ============ CLASSES ============

    fn parse_class(&mut self, declaration: bool) -> Result<Rc<Class>, JsError> {
        let start = self.current.span;
        let doc = self.doc_before(start);
        self.require_version(LanguageVersion::Es2015, "classes", start)?;
        self.require_token(&TokenKind::Class)?;

        // Class code is always strict
        let saved_strict = std::mem::replace(&mut self.ctx.strict, true);
        let result = self.parse_class_inner(declaration, start, doc);
        self.ctx.strict = saved_strict;
        result.map(Rc::new)
    }

    fn parse_class_inner(
        &mut self,
        declaration: bool,
        start: Span,
        doc: Option<JsString>,
    ) -> Result<Class, JsError> {
        let id = if self.check_identifier() {
            Some(self.parse_binding_identifier()?)
        } else if declaration {
            return Err(self.unexpected_token("class name"));
        } else {
            None
        };

        let super_class = if self.match_token(&TokenKind::Extends) {
            Some(Rc::new(self.parse_left_hand_side_expression()?))
        } else {
            None
        };

        self.require_token(&TokenKind::LBrace)?;
        let mut constructor = None;
        let mut members = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.match_token(&TokenKind::Semicolon) {
                continue;
            }
            let member_start = self.current.span;
            let member_doc = self.doc_before(member_start);

            let is_static = self.check(&TokenKind::Static) && self.peek_is_property_name();
            if is_static {
                self.advance();
            }
            let generator = self.match_token(&TokenKind::Star);
            let method_kind = if !generator && self.peek_accessor("get") {
                self.advance();
                MethodKind::Get
            } else if !generator && self.peek_accessor("set") {
                self.advance();
                MethodKind::Set
            } else {
                MethodKind::Method
            };

            let key = self.parse_property_name()?;
            let is_constructor = !is_static
                && matches!(&key, PropertyName::Identifier(n) | PropertyName::String(n) if n.as_str() == "constructor");

            if is_constructor {
                if method_kind != MethodKind::Method || generator {
                    return Err(self.error_at("Class constructor may not be an accessor", member_start));
                }
                if constructor.is_some() {
                    return Err(self.error_at(
                        "A class may only have one constructor",
                        member_start,
                    ));
                }
                let saved = std::mem::replace(&mut self.ctx.super_call, super_class.is_some());
                let function = self.parse_method(
                    FunctionKind::ClassConstructor,
                    false,
                    member_start,
                    member_doc.or_else(|| doc.clone()),
                );
                self.ctx.super_call = saved;
                constructor = Some(function?);
                continue;
            }

            if is_static
                && matches!(&key, PropertyName::Identifier(n) | PropertyName::String(n) if n.as_str() == "prototype")
            {
                return Err(self.error_at(
                    "Classes may not have a static property named 'prototype'",
                    member_start,
                ));
            }

            let function_kind = match method_kind {
                MethodKind::Method => FunctionKind::Method,
                MethodKind::Get => FunctionKind::Getter,
                MethodKind::Set => FunctionKind::Setter,
            };
            let value = self.parse_method(function_kind, generator, member_start, member_doc)?;
            let span = self.span_from(member_start);
            members.push(ClassMember {
                key,
                value,
                kind: method_kind,
                is_static,
                span,
            });
        }

        self.require_token(&TokenKind::RBrace)?;
        let span = self.span_from(start);
        Ok(Class {
            id,
            super_class,
            constructor,
            members,
            doc,
            span,
        })
    }

    // ============ EXPRESSIONS ============

    fn parse_expression(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        let mut expr = self.parse_assignment_expression()?;

        if self.check(&TokenKind::Comma) {
            let mut expressions = vec![Rc::new(expr)];
            while self.match_token(&TokenKind::Comma) {
                expressions.push(Rc::new(self.parse_assignment_expression()?));
            }
            let span = self.span_from(start);
            expr = Expression::Sequence(SequenceExpression { expressions, span });
        }

        Ok(expr)
    }

    fn parse_assignment_expression(&mut self) -> Result<Expression, JsError> {
        // A pending initializer of an enclosing literal stays pending
        let outer = self.cover_init.take();
        let expr = self.parse_assignment_expression_cover()?;
        self.check_cover_init()?;
        self.cover_init = outer;
        Ok(expr)
    }

    fn check_cover_init(&mut self) -> Result<(), JsError> {
        match self.cover_init.take() {
            Some(span) => Err(self.error_at("Invalid shorthand property initializer", span)),
            None => Ok(()),
        }
    }

    /// Assignment expression that may leave a pending `{ a = 1 }` initializer,
    /// for positions where the literal can still become a nested pattern
    fn parse_assignment_expression_cover(&mut self) -> Result<Expression, JsError> {
        self.nested(Self::parse_assignment_expression_unchecked)
    }

    fn parse_assignment_expression_unchecked(&mut self) -> Result<Expression, JsError> {
        if self.ctx.generator && self.check(&TokenKind::Yield) {
            return self.parse_yield_expression();
        }

        let saved_cover = self.cover_init.take();
        let start = self.current.span;
        let expr = self.parse_conditional_expression()?;
        let is_literal = matches!(expr, Expression::Object(_) | Expression::Array(_));

        if let Some(operator) = self.current_assignment_op() {
            match operator {
                AssignmentOp::ExpAssign => {
                    self.require_version(LanguageVersion::Es2016, "'**='", self.current.span)?
                }
                AssignmentOp::AndAssign | AssignmentOp::OrAssign | AssignmentOp::NullishAssign => {
                    self.require_version(
                        LanguageVersion::Latest,
                        "logical assignment",
                        self.current.span,
                    )?
                }
                _ => {}
            }

            let left = if operator == AssignmentOp::Assign && is_literal {
                let pattern = self.expression_to_pattern(&expr)?;
                self.cover_init = None;
                AssignmentTarget::Pattern(pattern)
            } else {
                self.check_cover_init()?;
                self.expression_to_assignment_target(&expr)?
            };
            self.advance();

            let right = self.parse_assignment_expression()?;
            self.cover_init = saved_cover;
            let span = self.span_from(start);
            return Ok(Expression::Assignment(AssignmentExpression {
                operator,
                left,
                right: Rc::new(right),
                span,
            }));
        }

        if !is_literal {
            self.check_cover_init()?;
        }
        self.cover_init = self.cover_init.or(saved_cover);
        Ok(expr)
    }

    fn parse_yield_expression(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Yield)?;

        let delegate = !self.lexer.had_newline_before() && self.match_token(&TokenKind::Star);

        // `yield` alone is valid wherever its operand would be absent
        let argument = if delegate
            || !(self.check(&TokenKind::Semicolon)
                || self.check(&TokenKind::RBrace)
                || self.check(&TokenKind::RParen)
                || self.check(&TokenKind::RBracket)
                || self.check(&TokenKind::Comma)
                || self.check(&TokenKind::Colon)
                || (self.check(&TokenKind::In) && self.no_in)
                || self.is_at_end()
                || self.lexer.had_newline_before())
        {
            Some(Rc::new(self.parse_assignment_expression()?))
        } else {
            None
        };

        let span = self.span_from(start);
        Ok(Expression::Yield(YieldExpression {
            argument,
            delegate,
            span,
        }))
    }

    fn parse_conditional_expression(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        let test = self.parse_binary_expression(0)?;

        if self.match_token(&TokenKind::Question) {
            let saved_no_in = std::mem::replace(&mut self.no_in, false);
            let consequent = self.parse_assignment_expression();
            self.no_in = saved_no_in;
            let consequent = Rc::new(consequent?);
            self.require_token(&TokenKind::Colon)?;
            let alternate = Rc::new(self.parse_assignment_expression()?);
            let span = self.span_from(start);
            return Ok(Expression::Conditional(ConditionalExpression {
                test: Rc::new(test),
                consequent,
                alternate,
                span,
            }));
        }

        Ok(test)
    }

    /// Pratt parser for binary expressions
    fn parse_binary_expression(&mut self, min_prec: u8) -> Result<Expression, JsError> {
        let start = self.current.span;
        let mut left = self.parse_unary_expression()?;

        while let Some((op, prec)) = self.current_binary_op() {
            if prec < min_prec {
                break;
            }
            let op_span = self.current.span;

            match op {
                InfixOp::Binary(BinaryOp::Exp) => {
                    self.require_version(LanguageVersion::Es2016, "'**'", op_span)?;
                    if matches!(left, Expression::Unary(_)) {
                        return Err(self.error_at(
                            "Unary operator used immediately before exponentiation expression",
                            op_span,
                        ));
                    }
                }
                InfixOp::Logical(LogicalOp::NullishCoalescing) => {
                    self.require_version(LanguageVersion::Es2020, "'??'", op_span)?;
                }
                _ => {}
            }
            self.advance();

            // Right associativity for ** operator
            let next_prec = if op == InfixOp::Binary(BinaryOp::Exp) {
                prec
            } else {
                prec + 1
            };
            let right = self.parse_binary_expression(next_prec)?;

            let span = self.span_from(start);
            left = match op {
                InfixOp::Logical(operator) => {
                    check_nullish_mixing(operator, &left, &right)
                        .map_err(|message| self.error_at(message, op_span))?;
                    Expression::Logical(LogicalExpression {
                        operator,
                        left: Rc::new(left),
                        right: Rc::new(right),
                        span,
                    })
                }
                InfixOp::Binary(operator) => Expression::Binary(BinaryExpression {
                    operator,
                    left: Rc::new(left),
                    right: Rc::new(right),
                    span,
                }),
            };
        }

        Ok(left)
    }

    fn parse_unary_expression(&mut self) -> Result<Expression, JsError> {
        self.nested(Self::parse_unary_expression_unchecked)
    }

    fn parse_unary_expression_unchecked(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;

        if let Some(operator) = self.current_unary_op() {
            self.advance();
            let argument = self.parse_unary_expression()?;

            if operator == UnaryOp::Delete && self.ctx.strict {
                if let Expression::Identifier(id) = &argument {
                    return Err(self.error_at(
                        &format!("Delete of an unqualified identifier '{}' in strict mode", id.name),
                        id.span,
                    ));
                }
            }

            let span = self.span_from(start);
            return Ok(Expression::Unary(UnaryExpression {
                operator,
                argument: Rc::new(argument),
                span,
            }));
        }

        // Update expressions (prefix)
        if let Some(operator) = self.current_update_op() {
            self.advance();
            let argument = self.parse_unary_expression()?;
            self.check_update_target(&argument, "prefix")?;
            let span = self.span_from(start);
            return Ok(Expression::Update(UpdateExpression {
                operator,
                prefix: true,
                argument: Rc::new(argument),
                span,
            }));
        }

        self.parse_postfix_expression()
    }

    fn parse_postfix_expression(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        let mut expr = self.parse_left_hand_side_expression()?;

        // Postfix update; a line break before `++` ends the statement
        if !self.lexer.had_newline_before() {
            if let Some(operator) = self.current_update_op() {
                self.check_update_target(&expr, "postfix")?;
                self.advance();
                let span = self.span_from(start);
                expr = Expression::Update(UpdateExpression {
                    operator,
                    prefix: false,
                    argument: Rc::new(expr),
                    span,
                });
            }
        }

        Ok(expr)
    }

    fn check_update_target(&self, expr: &Expression, position: &str) -> Result<(), JsError> {
        match strip_parens(expr) {
            Expression::Identifier(id) => {
                if self.ctx.strict && matches!(id.name.as_str(), "eval" | "arguments") {
                    return Err(self.error_at(
                        &format!("Unexpected {} in strict mode", id.name),
                        id.span,
                    ));
                }
                Ok(())
            }
            Expression::Member(member) if !member.optional => Ok(()),
            _ => Err(self.error_at(
                &format!("Invalid left-hand side expression in {} operation", position),
                expr.span(),
            )),
        }
    }

    fn parse_left_hand_side_expression(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        let mut expr = self.parse_member_expression()?;
        let mut in_chain = false;

        // Call expressions and member access chain
        loop {
            if self.check(&TokenKind::LParen) {
                let arguments = self.parse_call_arguments()?;
                let span = self.span_from(start);
                expr = Expression::Call(CallExpression {
                    callee: Rc::new(expr),
                    arguments,
                    optional: false,
                    span,
                });
            } else if self.match_token(&TokenKind::Dot) {
                let property = self.parse_identifier_name()?;
                let span = self.span_from(start);
                expr = Expression::Member(MemberExpression {
                    object: Rc::new(expr),
                    property: MemberProperty::Identifier(property),
                    optional: false,
                    span,
                });
            } else if self.check(&TokenKind::LBracket) {
                let property = self.parse_computed_member()?;
                let span = self.span_from(start);
                expr = Expression::Member(MemberExpression {
                    object: Rc::new(expr),
                    property: MemberProperty::Expression(Rc::new(property)),
                    optional: false,
                    span,
                });
            } else if matches!(
                self.current.kind,
                TokenKind::TemplateHead(_) | TokenKind::TemplateNoSub(_)
            ) {
                if in_chain {
                    return Err(self.error("Invalid tagged template on optional chain"));
                }
                let quasi = self.parse_template_literal(true)?;
                let span = self.span_from(start);
                expr = Expression::TaggedTemplate(TaggedTemplateExpression {
                    tag: Rc::new(expr),
                    quasi,
                    span,
                });
            } else if self.check(&TokenKind::QuestionDot) {
                self.require_version(LanguageVersion::Es2020, "optional chaining", self.current.span)?;
                self.advance();
                in_chain = true;
                if self.check(&TokenKind::LParen) {
                    let arguments = self.parse_call_arguments()?;
                    let span = self.span_from(start);
                    expr = Expression::Call(CallExpression {
                        callee: Rc::new(expr),
                        arguments,
                        optional: true,
                        span,
                    });
                } else if self.check(&TokenKind::LBracket) {
                    let property = self.parse_computed_member()?;
                    let span = self.span_from(start);
                    expr = Expression::Member(MemberExpression {
                        object: Rc::new(expr),
                        property: MemberProperty::Expression(Rc::new(property)),
                        optional: true,
                        span,
                    });
                } else if matches!(
                    self.current.kind,
                    TokenKind::TemplateHead(_) | TokenKind::TemplateNoSub(_)
                ) {
                    return Err(self.error("Invalid tagged template on optional chain"));
                } else {
                    let property = self.parse_identifier_name()?;
                    let span = self.span_from(start);
                    expr = Expression::Member(MemberExpression {
                        object: Rc::new(expr),
                        property: MemberProperty::Identifier(property),
                        optional: true,
                        span,
                    });
                }
            } else {
                break;
            }
        }

        if in_chain {
            let span = self.span_from(start);
            expr = Expression::OptionalChain(OptionalChainExpression {
                expression: Rc::new(expr),
                span,
            });
        }

        Ok(expr)
    }

    fn parse_computed_member(&mut self) -> Result<Expression, JsError> {
        self.require_token(&TokenKind::LBracket)?;
        let saved_no_in = std::mem::replace(&mut self.no_in, false);
        let property = self.parse_expression();
        self.no_in = saved_no_in;
        let property = property?;
        self.require_token(&TokenKind::RBracket)?;
        Ok(property)
    }

    /// Primary expression followed by `.name` and `[expr]` accesses, but no calls
    fn parse_member_expression(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        let mut expr = if self.check(&TokenKind::New) {
            self.parse_new_expression()?
        } else {
            self.parse_primary_expression()?
        };

        loop {
            if self.match_token(&TokenKind::Dot) {
                let property = self.parse_identifier_name()?;
                let span = self.span_from(start);
                expr = Expression::Member(MemberExpression {
                    object: Rc::new(expr),
                    property: MemberProperty::Identifier(property),
                    optional: false,
                    span,
                });
            } else if self.check(&TokenKind::LBracket) {
                let property = self.parse_computed_member()?;
                let span = self.span_from(start);
                expr = Expression::Member(MemberExpression {
                    object: Rc::new(expr),
                    property: MemberProperty::Expression(Rc::new(property)),
                    optional: false,
                    span,
                });
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_new_expression(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::New)?;

        if self.match_token(&TokenKind::Dot) {
            let property = self.parse_identifier_name()?;
            if property.name.as_str() != "target" {
                return Err(self.error_at("Unexpected identifier after 'new.'", property.span));
            }
            if !self.ctx.new_target {
                return Err(self.error_at("new.target expression is not allowed here", start));
            }
            return Ok(Expression::NewTarget(self.span_from(start)));
        }

        let callee = self.parse_member_expression()?;
        if self.check(&TokenKind::QuestionDot) {
            return Err(self.error("Invalid optional chain from new expression"));
        }
        let arguments = if self.check(&TokenKind::LParen) {
            self.parse_call_arguments()?
        } else {
            Vec::new()
        };

        let span = self.span_from(start);
        Ok(Expression::New(NewExpression {
            callee: Rc::new(callee),
            arguments,
            span,
        }))
    }

    fn parse_primary_expression(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;

        match &self.current.kind {
            // Literals
            TokenKind::Number(n) => {
                let n = *n;
                self.advance();
                Ok(Expression::Literal(Literal {
                    value: LiteralValue::Number(n),
                    span: self.span_from(start),
                }))
            }
            TokenKind::LegacyOctalNumber(n) => {
                let n = *n;
                if self.ctx.strict {
                    return Err(self.error("Octal literals are not allowed in strict mode"));
                }
                self.advance();
                Ok(Expression::Literal(Literal {
                    value: LiteralValue::Number(n),
                    span: self.span_from(start),
                }))
            }
            TokenKind::String(s) => {
                let s = s.clone();
                self.advance();
                Ok(Expression::Literal(Literal {
                    value: LiteralValue::String(s),
                    span: self.span_from(start),
                }))
            }
            TokenKind::LegacyOctalString(s) => {
                let s = s.clone();
                if self.ctx.strict {
                    return Err(
                        self.error("Octal escape sequences are not allowed in strict mode")
                    );
                }
                self.advance();
                Ok(Expression::Literal(Literal {
                    value: LiteralValue::String(s),
                    span: self.span_from(start),
                }))
            }
            TokenKind::True | TokenKind::False => {
                let value = self.check(&TokenKind::True);
                self.advance();
                Ok(Expression::Literal(Literal {
                    value: LiteralValue::Boolean(value),
                    span: self.span_from(start),
                }))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expression::Literal(Literal {
                    value: LiteralValue::Null,
                    span: self.span_from(start),
                }))
            }
            TokenKind::This => {
                self.advance();
                Ok(Expression::This(self.span_from(start)))
            }
            TokenKind::Super => self.parse_super(),

            // Array literal
            TokenKind::LBracket => self.parse_array_literal(),

            // Object literal
            TokenKind::LBrace => self.parse_object_literal(),

            // Parenthesized expression or arrow function
            TokenKind::LParen => self.parse_parenthesized_or_arrow(),

            // Function expression
            TokenKind::Function => self.parse_function_expression(),

            // Class expression
            TokenKind::Class => Ok(Expression::Class(self.parse_class(false)?)),

            // Template literal
            TokenKind::TemplateNoSub(_) | TokenKind::TemplateHead(_) => {
                Ok(Expression::Template(self.parse_template_literal(false)?))
            }

            // RegExp literal - when we see `/` where an expression is expected
            TokenKind::Slash | TokenKind::SlashEq => {
                // The lexer scanned this as Slash or SlashEq; rescan from the same
                // position as a regexp.
                self.current = self.lexer.rescan_as_regexp(self.current.span);
                match self.current.kind.clone() {
                    TokenKind::RegExp(pattern, flags) => {
                        self.advance();
                        Ok(Expression::Literal(Literal {
                            value: LiteralValue::RegExp { pattern, flags },
                            span: self.span_from(start),
                        }))
                    }
                    _ => Err(self.error("unterminated regular expression literal")),
                }
            }

            TokenKind::Invalid(c) => Err(self.error(&format!("illegal character '{}'", c))),
            TokenKind::Unterminated(what) => Err(self.error(&format!("unterminated {}", what))),

            _ if self.check_identifier() => {
                let id = self.parse_identifier()?;

                // Arrow function with a single bare parameter: id =>
                if self.check(&TokenKind::Arrow) && !self.lexer.had_newline_before() {
                    self.validate_binding_identifier(&id, self.ctx.strict)?;
                    return self.parse_arrow_function(vec![Pattern::Identifier(id)], start);
                }

                Ok(Expression::Identifier(id))
            }

            _ => Err(self.unexpected_token("expression")),
        }
    }

    fn parse_super(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Super)?;
        let allowed = match &self.current.kind {
            TokenKind::LParen => self.ctx.super_call,
            TokenKind::Dot | TokenKind::LBracket => self.ctx.super_property,
            _ => false,
        };
        if !allowed {
            return Err(self.error_at("'super' keyword unexpected here", start));
        }
        Ok(Expression::Super(self.span_from(start)))
    }

    fn parse_array_literal(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBracket)?;
        let saved_no_in = std::mem::replace(&mut self.no_in, false);
        let elements = self.parse_array_elements();
        self.no_in = saved_no_in;
        let elements = elements?;
        self.require_token(&TokenKind::RBracket)?;

        let span = self.span_from(start);
        Ok(Expression::Array(ArrayExpression { elements, span }))
    }

    fn parse_array_elements(&mut self) -> Result<Vec<Option<ArrayElement>>, JsError> {
        let mut elements = Vec::new();

        while !self.check(&TokenKind::RBracket) && !self.is_at_end() {
            if self.match_token(&TokenKind::Comma) {
                elements.push(None);
                continue;
            }

            if self.check(&TokenKind::DotDotDot) {
                let arg_start = self.current.span;
                self.require_version(LanguageVersion::Es2015, "spread elements", arg_start)?;
                self.advance();
                let argument = Rc::new(self.parse_assignment_expression_cover()?);
                let span = self.span_from(arg_start);
                elements.push(Some(ArrayElement::Spread(SpreadElement { argument, span })));
            } else {
                let expr = self.parse_assignment_expression_cover()?;
                elements.push(Some(ArrayElement::Expression(Rc::new(expr))));
            }

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        Ok(elements)
    }

    fn parse_object_literal(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBrace)?;
        let saved_no_in = std::mem::replace(&mut self.no_in, false);
        let properties = self.parse_object_properties();
        self.no_in = saved_no_in;
        let properties = properties?;
        self.require_token(&TokenKind::RBrace)?;

        let span = self.span_from(start);
        Ok(Expression::Object(ObjectExpression { properties, span }))
    }

    fn parse_object_properties(&mut self) -> Result<Vec<ObjectProperty>, JsError> {
        let mut properties = Vec::new();

        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.check(&TokenKind::DotDotDot) {
                let arg_start = self.current.span;
                self.require_version(LanguageVersion::Es2018, "object spread properties", arg_start)?;
                self.advance();
                let argument = Rc::new(self.parse_assignment_expression_cover()?);
                let span = self.span_from(arg_start);
                properties.push(ObjectProperty::Spread(SpreadElement { argument, span }));
            } else {
                properties.push(ObjectProperty::Property(self.parse_property()?));
            }

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }

        Ok(properties)
    }

    fn parse_property(&mut self) -> Result<Property, JsError> {
        let start = self.current.span;
        let doc = self.doc_before(start);

        let generator = self.check(&TokenKind::Star);
        if generator {
            self.require_version(LanguageVersion::Es2015, "generator methods", start)?;
            self.advance();
        }

        // Check for getter/setter
        let kind = if !generator && self.peek_accessor("get") {
            self.advance();
            PropertyKind::Get
        } else if !generator && self.peek_accessor("set") {
            self.advance();
            PropertyKind::Set
        } else {
            PropertyKind::Init
        };

        let shorthand_candidate = kind == PropertyKind::Init && self.check_identifier();
        let key_span = self.current.span;
        let key = self.parse_property_name()?;

        // Methods and accessors
        if kind != PropertyKind::Init || generator || self.check(&TokenKind::LParen) {
            let function_kind = match kind {
                PropertyKind::Get => FunctionKind::Getter,
                PropertyKind::Set => FunctionKind::Setter,
                PropertyKind::Init => FunctionKind::Method,
            };
            let function = self.parse_method(function_kind, generator, start, doc.clone())?;
            let span = self.span_from(start);
            return Ok(Property {
                key,
                value: Rc::new(Expression::Function(function)),
                kind,
                shorthand: false,
                method: kind == PropertyKind::Init,
                cover_initializer: None,
                doc,
                span,
            });
        }

        // Regular property
        if self.match_token(&TokenKind::Colon) {
            let mut value = self.parse_assignment_expression_cover()?;
            inherit_doc(&mut value, &doc);
            let span = self.span_from(start);
            return Ok(Property {
                key,
                value: Rc::new(value),
                kind,
                shorthand: false,
                method: false,
                cover_initializer: None,
                doc,
                span,
            });
        }

        // Shorthand: { a } is { a: a }
        let name = match (&key, shorthand_candidate) {
            (PropertyName::Identifier(name), true) => name.clone(),
            _ => return Err(self.unexpected_token("':'")),
        };
        self.require_version(LanguageVersion::Es2015, "shorthand properties", start)?;
        let id = Identifier {
            name,
            span: key_span,
        };
        if self.ctx.strict && STRICT_RESERVED.contains(&id.name.as_str()) {
            return Err(self.error_at(
                &format!("Unexpected strict mode reserved word '{}'", id.name),
                id.span,
            ));
        }

        let cover_initializer = if self.check(&TokenKind::Eq) {
            let eq_span = self.current.span;
            self.advance();
            let init = self.parse_assignment_expression()?;
            self.cover_init.get_or_insert(eq_span);
            Some(Rc::new(init))
        } else {
            None
        };

        let span = self.span_from(start);
        Ok(Property {
            key,
            value: Rc::new(Expression::Identifier(id)),
            kind,
            shorthand: true,
            method: false,
            cover_initializer,
            doc,
            span,
        })
    }

    fn checkpoint(&self) -> ParserCheckpoint {
        ParserCheckpoint {
            lexer: self.lexer.checkpoint(),
            current: self.current.clone(),
            previous: self.previous.clone(),
            cover_init: self.cover_init,
            no_in: self.no_in,
        }
    }

    fn rollback(&mut self, checkpoint: ParserCheckpoint) {
        self.lexer.restore(checkpoint.lexer);
        self.current = checkpoint.current;
        self.previous = checkpoint.previous;
        self.cover_init = checkpoint.cover_init;
        self.no_in = checkpoint.no_in;
    }

    fn parse_parenthesized_or_arrow(&mut self) -> Result<Expression, JsError> {
        let start = self.current.span;

        // Save state for potential rollback
        let checkpoint = self.checkpoint();
        let saved_ctx_strict = self.ctx.strict;

        if let Ok(params) = self.try_parse_arrow_params() {
            if self.check(&TokenKind::Arrow) {
                return self.parse_arrow_function(params, start);
            }
        }
        self.ctx.strict = saved_ctx_strict;
        self.rollback(checkpoint);

        // Parse as parenthesized expression
        self.require_token(&TokenKind::LParen)?;
        let saved_no_in = std::mem::replace(&mut self.no_in, false);
        let inner = self.parse_expression();
        self.no_in = saved_no_in;
        let inner = inner?;
        self.require_token(&TokenKind::RParen)?;

        let span = self.span_from(start);
        Ok(Expression::Parenthesized(Rc::new(inner), span))
    }

    /// Try to parse a parenthesized arrow parameter list
    fn try_parse_arrow_params(&mut self) -> Result<Vec<Pattern>, JsError> {
        let saved_no_in = std::mem::replace(&mut self.no_in, false);
        let result = self.parse_function_params();
        self.no_in = saved_no_in;
        result
    }

    fn parse_template_literal(&mut self, tagged: bool) -> Result<TemplateLiteral, JsError> {
        let start = self.current.span;
        self.require_version(LanguageVersion::Es2015, "template literals", start)?;

        let (first, has_substitutions) = match &self.current.kind {
            TokenKind::TemplateNoSub(part) => (part.clone(), false),
            TokenKind::TemplateHead(part) => (part.clone(), true),
            _ => return Err(self.unexpected_token("template literal")),
        };
        let mut quasis = vec![self.template_element(first, start, tagged)?];
        let mut expressions = Vec::new();
        self.advance();

        if has_substitutions {
            let saved_no_in = std::mem::replace(&mut self.no_in, false);
            let result = self.parse_template_substitutions(tagged, &mut quasis, &mut expressions);
            self.no_in = saved_no_in;
            result?;
        }

        let span = self.span_from(start);
        Ok(TemplateLiteral {
            quasis,
            expressions,
            span,
        })
    }

    fn parse_template_substitutions(
        &mut self,
        tagged: bool,
        quasis: &mut Vec<TemplateElement>,
        expressions: &mut Vec<Rc<Expression>>,
    ) -> Result<(), JsError> {
        loop {
            expressions.push(Rc::new(self.parse_expression()?));
            if !self.check(&TokenKind::RBrace) {
                return Err(self.unexpected_token("'}' in template literal"));
            }

            // Rescan from the `}` as the continuation of the template
            let token = self.lexer.rescan_template_continuation(self.current.span);
            match &token.kind {
                TokenKind::TemplateMiddle(part) => {
                    quasis.push(self.template_element(part.clone(), token.span, tagged)?);
                    self.current = token;
                    self.advance();
                }
                TokenKind::TemplateTail(part) => {
                    quasis.push(self.template_element(part.clone(), token.span, tagged)?);
                    self.current = token;
                    self.advance();
                    return Ok(());
                }
                _ => {
                    self.current = token;
                    return Err(self.error("unterminated template literal"));
                }
            }
        }
    }

    fn template_element(
        &self,
        part: crate::lexer::TemplatePart,
        span: Span,
        tagged: bool,
    ) -> Result<TemplateElement, JsError> {
        if part.cooked.is_none() && !tagged {
            return Err(self.error_at("Invalid escape sequence in template", span));
        }
        Ok(TemplateElement {
            cooked: part.cooked,
            raw: part.raw,
            span,
        })
    }

    fn parse_call_arguments(&mut self) -> Result<Vec<Argument>, JsError> {
        self.require_token(&TokenKind::LParen)?;
        let saved_no_in = std::mem::replace(&mut self.no_in, false);
        let arguments = self.parse_argument_list();
        self.no_in = saved_no_in;
        let arguments = arguments?;
        self.require_token(&TokenKind::RParen)?;
        Ok(arguments)
    }

    fn parse_argument_list(&mut self) -> Result<Vec<Argument>, JsError> {
        let mut arguments = Vec::new();

        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            if self.check(&TokenKind::DotDotDot) {
                let arg_start = self.current.span;
                self.require_version(LanguageVersion::Es2015, "spread arguments", arg_start)?;
                self.advance();
                let argument = Rc::new(self.parse_assignment_expression()?);
                let span = self.span_from(arg_start);
                arguments.push(Argument::Spread(SpreadElement { argument, span }));
            } else {
                arguments.push(Argument::Expression(Rc::new(
                    self.parse_assignment_expression()?,
                )));
            }

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
            if self.check(&TokenKind::RParen) {
                self.require_version(
                    LanguageVersion::Es2017,
                    "trailing commas in calls",
                    self.previous.span,
                )?;
            }
        }

        Ok(arguments)
    }

    // ============ NAMES ============

    /// Identifier reference or binding; contextual keywords are accepted where
    /// the current mode allows them
    fn parse_identifier(&mut self) -> Result<Identifier, JsError> {
        let span = self.current.span;
        let name = match &self.current.kind {
            TokenKind::Identifier(name) => name.clone(),
            TokenKind::Of => self.intern("of"),
            TokenKind::Let if !self.ctx.strict => self.intern("let"),
            TokenKind::Static if !self.ctx.strict => self.intern("static"),
            TokenKind::Yield if !self.ctx.strict && !self.ctx.generator => self.intern("yield"),
            TokenKind::Let | TokenKind::Static | TokenKind::Yield => {
                let text = keyword_text(&self.current.kind).unwrap_or("");
                let message = if self.ctx.strict {
                    format!("Unexpected strict mode reserved word '{}'", text)
                } else {
                    format!("Unexpected reserved word '{}'", text)
                };
                return Err(self.error(&message));
            }
            _ => return Err(self.unexpected_token("identifier")),
        };
        if self.ctx.strict && STRICT_RESERVED.contains(&name.as_str()) {
            return Err(self.error(&format!("Unexpected strict mode reserved word '{}'", name)));
        }
        self.advance();
        Ok(Identifier { name, span })
    }

    /// Any identifier or keyword, as after `.`
    fn parse_identifier_name(&mut self) -> Result<Identifier, JsError> {
        let span = self.current.span;
        let name = match &self.current.kind {
            TokenKind::Identifier(name) => name.clone(),
            kind => match keyword_text(kind) {
                Some(text) => self.intern(text),
                None => return Err(self.unexpected_token("property name")),
            },
        };
        self.advance();
        Ok(Identifier { name, span })
    }

    fn parse_property_name(&mut self) -> Result<PropertyName, JsError> {
        match &self.current.kind {
            TokenKind::String(s) => {
                let s = s.clone();
                self.advance();
                Ok(PropertyName::String(s))
            }
            TokenKind::LegacyOctalString(s) => {
                let s = s.clone();
                if self.ctx.strict {
                    return Err(
                        self.error("Octal escape sequences are not allowed in strict mode")
                    );
                }
                self.advance();
                Ok(PropertyName::String(s))
            }
            TokenKind::Number(n) => {
                let n = *n;
                self.advance();
                Ok(PropertyName::Number(n))
            }
            TokenKind::LegacyOctalNumber(n) => {
                let n = *n;
                if self.ctx.strict {
                    return Err(self.error("Octal literals are not allowed in strict mode"));
                }
                self.advance();
                Ok(PropertyName::Number(n))
            }
            TokenKind::LBracket => {
                self.require_version(
                    LanguageVersion::Es2015,
                    "computed property names",
                    self.current.span,
                )?;
                self.advance();
                let saved_no_in = std::mem::replace(&mut self.no_in, false);
                let expr = self.parse_assignment_expression();
                self.no_in = saved_no_in;
                let expr = expr?;
                self.require_token(&TokenKind::RBracket)?;
                Ok(PropertyName::Computed(Rc::new(expr)))
            }
            _ => {
                let id = self.parse_identifier_name()?;
                Ok(PropertyName::Identifier(id.name))
            }
        }
    }

    /// `get`/`set` followed by a property name (rather than `(`, `:` or `,`)
    fn peek_accessor(&mut self, word: &str) -> bool {
        matches!(&self.current.kind, TokenKind::Identifier(name) if name.as_str() == word)
            && self.peek_is_property_name()
    }

    fn peek_is_property_name(&mut self) -> bool {
        let checkpoint = self.lexer.checkpoint();
        let next = self.lexer.next_token();
        self.lexer.restore(checkpoint);
        match next.kind {
            TokenKind::Identifier(_)
            | TokenKind::String(_)
            | TokenKind::LegacyOctalString(_)
            | TokenKind::Number(_)
            | TokenKind::LegacyOctalNumber(_)
            | TokenKind::LBracket
            | TokenKind::Star => true,
            ref kind => keyword_text(kind).is_some(),
        }
    }

    // ============ HELPERS ============

    fn advance(&mut self) {
        self.previous = std::mem::replace(&mut self.current, self.lexer.next_token());
    }

    fn require_token(&mut self, kind: &TokenKind) -> Result<(), JsError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected_token(&format!("{:?}", kind)))
        }
    }

    /// Automatic semicolon insertion
    fn expect_semicolon(&mut self) -> Result<(), JsError> {
        if self.match_token(&TokenKind::Semicolon) {
            return Ok(());
        }
        if self.check(&TokenKind::RBrace) || self.is_at_end() || self.lexer.had_newline_before() {
            return Ok(());
        }
        Err(self.error("missing ; before statement"))
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    fn peek_is(&mut self, kind: &TokenKind) -> bool {
        let checkpoint = self.lexer.checkpoint();
        let next = self.lexer.next_token();
        self.lexer.restore(checkpoint);
        std::mem::discriminant(&next.kind) == std::mem::discriminant(kind)
    }

    fn check_identifier(&self) -> bool {
        match &self.current.kind {
            TokenKind::Identifier(_) | TokenKind::Of => true,
            TokenKind::Let | TokenKind::Static => !self.ctx.strict,
            TokenKind::Yield => !self.ctx.strict && !self.ctx.generator,
            _ => false,
        }
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Eof)
    }

    fn require_version(
        &self,
        required: LanguageVersion,
        construct: &str,
        span: Span,
    ) -> Result<(), JsError> {
        if self.options.language_version >= required {
            return Ok(());
        }
        Err(self.error_at(
            &format!(
                "{} not supported in {} (requires {})",
                construct,
                self.options.language_version.name(),
                required.name()
            ),
            span,
        ))
    }

    /// Nearest `/** ... */` comment between the previous token and `start`
    fn doc_before(&self, start: Span) -> Option<JsString> {
        let previous_end = if self.previous.span.end <= start.start {
            self.previous.span.end
        } else {
            0
        };
        let comment = self
            .lexer
            .comments()
            .iter()
            .rev()
            .find(|c| c.span.end <= start.start)?;
        (comment.kind == CommentKind::Doc && comment.span.start >= previous_end)
            .then(|| comment.text.clone())
    }

    fn span_from(&self, start: Span) -> Span {
        Span::new(
            start.start,
            self.previous.span.end.max(start.start),
            start.line,
            start.column,
        )
    }

    fn error(&self, message: &str) -> JsError {
        self.error_at(message, self.current.span)
    }

    fn error_at(&self, message: &str, span: Span) -> JsError {
        JsError::syntax_error(message, span.line, span.column)
    }

    fn unexpected_token(&self, expected: &str) -> JsError {
        match &self.current.kind {
            TokenKind::Eof => self.error(&format!("Unexpected end of input, expected {}", expected)),
            TokenKind::Invalid(c) => self.error(&format!("illegal character '{}'", c)),
            TokenKind::Unterminated(what) => self.error(&format!("unterminated {}", what)),
            kind => self.error(&format!("Unexpected {:?}, expected {}", kind, expected)),
        }
    }

    fn current_binary_op(&self) -> Option<(InfixOp, u8)> {
        use InfixOp::{Binary, Logical};
        let op = match &self.current.kind {
            TokenKind::QuestionQuestion => (Logical(LogicalOp::NullishCoalescing), 1),
            TokenKind::PipePipe => (Logical(LogicalOp::Or), 2),
            TokenKind::AmpAmp => (Logical(LogicalOp::And), 3),
            TokenKind::Pipe => (Binary(BinaryOp::BitOr), 4),
            TokenKind::Caret => (Binary(BinaryOp::BitXor), 5),
            TokenKind::Amp => (Binary(BinaryOp::BitAnd), 6),
            TokenKind::EqEq => (Binary(BinaryOp::Eq), 7),
            TokenKind::BangEq => (Binary(BinaryOp::NotEq), 7),
            TokenKind::EqEqEq => (Binary(BinaryOp::StrictEq), 7),
            TokenKind::BangEqEq => (Binary(BinaryOp::StrictNotEq), 7),
            TokenKind::Lt => (Binary(BinaryOp::Lt), 8),
            TokenKind::LtEq => (Binary(BinaryOp::LtEq), 8),
            TokenKind::Gt => (Binary(BinaryOp::Gt), 8),
            TokenKind::GtEq => (Binary(BinaryOp::GtEq), 8),
            TokenKind::Instanceof => (Binary(BinaryOp::Instanceof), 8),
            TokenKind::In if !self.no_in => (Binary(BinaryOp::In), 8),
            TokenKind::LtLt => (Binary(BinaryOp::LShift), 9),
            TokenKind::GtGt => (Binary(BinaryOp::RShift), 9),
            TokenKind::GtGtGt => (Binary(BinaryOp::URShift), 9),
            TokenKind::Plus => (Binary(BinaryOp::Add), 10),
            TokenKind::Minus => (Binary(BinaryOp::Sub), 10),
            TokenKind::Star => (Binary(BinaryOp::Mul), 11),
            TokenKind::Slash => (Binary(BinaryOp::Div), 11),
            TokenKind::Percent => (Binary(BinaryOp::Mod), 11),
            TokenKind::StarStar => (Binary(BinaryOp::Exp), 12),
            _ => return None,
        };
        Some(op)
    }

    fn current_unary_op(&self) -> Option<UnaryOp> {
        match &self.current.kind {
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Typeof => Some(UnaryOp::Typeof),
            TokenKind::Void => Some(UnaryOp::Void),
            TokenKind::Delete => Some(UnaryOp::Delete),
            _ => None,
        }
    }

    fn current_update_op(&self) -> Option<UpdateOp> {
        match &self.current.kind {
            TokenKind::PlusPlus => Some(UpdateOp::Increment),
            TokenKind::MinusMinus => Some(UpdateOp::Decrement),
            _ => None,
        }
    }

    fn current_assignment_op(&self) -> Option<AssignmentOp> {
        match &self.current.kind {
            TokenKind::Eq => Some(AssignmentOp::Assign),
            TokenKind::PlusEq => Some(AssignmentOp::AddAssign),
            TokenKind::MinusEq => Some(AssignmentOp::SubAssign),
            TokenKind::StarEq => Some(AssignmentOp::MulAssign),
            TokenKind::SlashEq => Some(AssignmentOp::DivAssign),
            TokenKind::PercentEq => Some(AssignmentOp::ModAssign),
            TokenKind::StarStarEq => Some(AssignmentOp::ExpAssign),
            TokenKind::AmpEq => Some(AssignmentOp::BitAndAssign),
            TokenKind::PipeEq => Some(AssignmentOp::BitOrAssign),
            TokenKind::CaretEq => Some(AssignmentOp::BitXorAssign),
            TokenKind::LtLtEq => Some(AssignmentOp::LShiftAssign),
            TokenKind::GtGtEq => Some(AssignmentOp::RShiftAssign),
            TokenKind::GtGtGtEq => Some(AssignmentOp::URShiftAssign),
            TokenKind::AmpAmpEq => Some(AssignmentOp::AndAssign),
            TokenKind::PipePipeEq => Some(AssignmentOp::OrAssign),
            TokenKind::QuestionQuestionEq => Some(AssignmentOp::NullishAssign),
            _ => None,
        }
    }

    // ============ COVER GRAMMAR ============

    /// Reinterpret an object or array literal as a destructuring pattern
    fn expression_to_pattern(&self, expr: &Expression) -> Result<Pattern, JsError> {
        match expr {
            Expression::Identifier(id) => {
                self.validate_binding_identifier(id, self.ctx.strict)?;
                Ok(Pattern::Identifier(id.clone()))
            }
            Expression::Member(member) if !member.optional => Ok(Pattern::Member(member.clone())),
            Expression::Parenthesized(inner, _)
                if matches!(
                    strip_parens(inner),
                    Expression::Identifier(_) | Expression::Member(_)
                ) =>
            {
                self.expression_to_pattern(strip_parens(inner))
            }
            Expression::Object(object) => {
                self.require_version(LanguageVersion::Es2015, "destructuring", object.span)?;
                let mut properties = Vec::with_capacity(object.properties.len());
                let count = object.properties.len();
                for (i, prop) in object.properties.iter().enumerate() {
                    match prop {
                        ObjectProperty::Property(prop) => {
                            if prop.kind != PropertyKind::Init || prop.method {
                                return Err(self.error_at(
                                    "Invalid destructuring assignment target",
                                    prop.span,
                                ));
                            }
                            let mut value = self.expression_to_pattern(&prop.value)?;
                            if let Some(init) = &prop.cover_initializer {
                                value = Pattern::Assignment(AssignmentPattern {
                                    left: Box::new(value),
                                    right: init.clone(),
                                    span: prop.span,
                                });
                            }
                            properties.push(ObjectPatternProperty::KeyValue {
                                key: prop.key.clone(),
                                value,
                                shorthand: prop.shorthand,
                                span: prop.span,
                            });
                        }
                        ObjectProperty::Spread(spread) => {
                            if i + 1 != count {
                                return Err(self.error_at(
                                    "Rest element must be last element",
                                    spread.span,
                                ));
                            }
                            let target = self.expression_to_pattern(&spread.argument)?;
                            if !matches!(target, Pattern::Identifier(_) | Pattern::Member(_)) {
                                return Err(self.error_at(
                                    "`...` must be followed by an assignable reference in assignment contexts",
                                    spread.span,
                                ));
                            }
                            properties.push(ObjectPatternProperty::Rest(Box::new(target)));
                        }
                    }
                }
                Ok(Pattern::Object(ObjectPattern {
                    properties,
                    span: object.span,
                }))
            }
            Expression::Array(array) => {
                self.require_version(LanguageVersion::Es2015, "destructuring", array.span)?;
                let count = array.elements.len();
                let mut elements = Vec::with_capacity(count);
                for (i, element) in array.elements.iter().enumerate() {
                    match element {
                        None => elements.push(None),
                        Some(ArrayElement::Expression(expr)) => {
                            elements.push(Some(self.expression_to_pattern(expr)?));
                        }
                        Some(ArrayElement::Spread(spread)) => {
                            if i + 1 != count {
                                return Err(self.error_at(
                                    "Rest element must be last element",
                                    spread.span,
                                ));
                            }
                            let argument = self.expression_to_pattern(&spread.argument)?;
                            if matches!(argument, Pattern::Assignment(_)) {
                                return Err(self.error_at(
                                    "Rest element may not have a default initializer",
                                    spread.span,
                                ));
                            }
                            elements.push(Some(Pattern::Rest(RestElement {
                                argument: Box::new(argument),
                                span: spread.span,
                            })));
                        }
                    }
                }
                Ok(Pattern::Array(ArrayPattern {
                    elements,
                    span: array.span,
                }))
            }
            Expression::Assignment(assign) if assign.operator == AssignmentOp::Assign => {
                let left = match &assign.left {
                    AssignmentTarget::Identifier(id) => Pattern::Identifier(id.clone()),
                    AssignmentTarget::Member(member) => Pattern::Member(member.clone()),
                    AssignmentTarget::Pattern(pattern) => pattern.clone(),
                };
                Ok(Pattern::Assignment(AssignmentPattern {
                    left: Box::new(left),
                    right: assign.right.clone(),
                    span: assign.span,
                }))
            }
            _ => Err(self.error_at("Invalid destructuring assignment target", expr.span())),
        }
    }

    fn expression_to_assignment_target(
        &self,
        expr: &Expression,
    ) -> Result<AssignmentTarget, JsError> {
        match strip_parens(expr) {
            Expression::Identifier(id) => {
                if self.ctx.strict && matches!(id.name.as_str(), "eval" | "arguments") {
                    return Err(self.error_at(
                        &format!("Unexpected {} in strict mode", id.name),
                        id.span,
                    ));
                }
                Ok(AssignmentTarget::Identifier(id.clone()))
            }
            Expression::Member(member) if !member.optional => {
                Ok(AssignmentTarget::Member(member.clone()))
            }
            _ => Err(self.error_at("Invalid left-hand side in assignment", expr.span())),
        }
    }

    fn expression_to_for_target(&self, expr: &Expression) -> Result<Pattern, JsError> {
        match expr {
            Expression::Object(_) | Expression::Array(_) => self.expression_to_pattern(expr),
            _ => match self.expression_to_assignment_target(expr) {
                Ok(AssignmentTarget::Identifier(id)) => Ok(Pattern::Identifier(id)),
                Ok(AssignmentTarget::Member(member)) => Ok(Pattern::Member(member)),
                _ => Err(self.error_at("Invalid left-hand side in for-loop", expr.span())),
            },
        }
    }
}

fn strip_parens(expr: &Expression) -> &Expression {
    match expr {
        Expression::Parenthesized(inner, _) => strip_parens(inner),
        other => other,
    }
}

/// `??` cannot be mixed with `&&` or `||` without parentheses
fn check_nullish_mixing(
    operator: LogicalOp,
    left: &Expression,
    right: &Expression,
) -> Result<(), &'static str> {
    let is = |expr: &Expression, nullish: bool| {
        matches!(expr, Expression::Logical(l)
            if (l.operator == LogicalOp::NullishCoalescing) == nullish)
    };
    let mixed = if operator == LogicalOp::NullishCoalescing {
        is(left, false) || is(right, false)
    } else {
        is(left, true) || is(right, true)
    };
    if mixed {
        Err("Cannot mix '??' with '&&' or '||' without parentheses")
    } else {
        Ok(())
    }
}

/// A function or class without its own doc comment takes the one of the
/// declaration, property or statement it initializes
fn inherit_doc(expr: &mut Expression, doc: &Option<JsString>) {
    let Some(doc) = doc else {
        return;
    };
    match expr {
        Expression::Function(function) => {
            if let Some(function) = Rc::get_mut(function) {
                function.doc.get_or_insert_with(|| doc.clone());
            }
        }
        Expression::Class(class) => {
            if let Some(class) = Rc::get_mut(class) {
                class.doc.get_or_insert_with(|| doc.clone());
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_with(source: &str, options: ParseOptions) -> Result<Program, JsError> {
        let mut dict = StringDict::new();
        let mut parser = Parser::new(source, &mut dict, options);
        parser.parse_program()
    }

    fn parse(source: &str) -> Result<Program, JsError> {
        parse_with(source, ParseOptions::default())
    }

    fn syntax_message(source: &str) -> String {
        match parse(source) {
            Err(JsError::SyntaxError { message, .. }) => message,
            other => format!("no syntax error: {:?}", other.map(|p| p.body.len())),
        }
    }

    #[test]
    fn test_variable_declaration() {
        let program = parse("let x = 1, y;").unwrap();
        assert!(matches!(
            &program.body[..],
            [Statement::VariableDeclaration(d)] if d.kind == VariableKind::Let && d.declarations.len() == 2
        ));
    }

    #[test]
    fn test_binary_precedence() {
        let program = parse("1 + 2 * 3").unwrap();
        let Statement::Expression(stmt) = &program.body[0] else {
            panic!("Unexpected node")
        };
        assert!(matches!(
            stmt.expression.as_ref(),
            Expression::Binary(BinaryExpression { operator: BinaryOp::Add, right, .. })
                if matches!(right.as_ref(), Expression::Binary(b) if b.operator == BinaryOp::Mul)
        ));
    }

    #[test]
    fn test_exponent_is_right_associative() {
        let program = parse("2 ** 3 ** 2").unwrap();
        let Statement::Expression(stmt) = &program.body[0] else {
            panic!("Unexpected node")
        };
        assert!(matches!(
            stmt.expression.as_ref(),
            Expression::Binary(BinaryExpression { operator: BinaryOp::Exp, right, .. })
                if matches!(right.as_ref(), Expression::Binary(b) if b.operator == BinaryOp::Exp)
        ));
        assert!(syntax_message("-2 ** 2").contains("exponentiation"));
    }

    #[test]
    fn test_arrow_functions() {
        assert!(parse("var f = (a, b = 1, ...c) => a + b;").is_ok());
        assert!(parse("var g = x => { return x; };").is_ok());
        assert!(parse("var h = ({a, b}, [c]) => a;").is_ok());
        assert!(parse("(a, b);").is_ok());
    }

    #[test]
    fn test_asi() {
        let program = parse("var a = 1\nvar b = 2\na\n++b").unwrap();
        assert_eq!(program.body.len(), 4);
        assert!(parse("var a = 1 var b = 2").is_err());
        let program = parse("function f() { return\n42 }").unwrap();
        let Statement::FunctionDeclaration(f) = &program.body[0] else {
            panic!("Unexpected node")
        };
        assert!(matches!(&f.body, FunctionBody::Block(b) if b.len() == 2));
    }

    #[test]
    fn test_regexp_literal() {
        let program = parse("var r = /ab+c/gi;").unwrap();
        let Statement::VariableDeclaration(decl) = &program.body[0] else {
            panic!("Unexpected node")
        };
        assert!(matches!(
            decl.declarations[0].init.as_deref(),
            Some(Expression::Literal(Literal { value: LiteralValue::RegExp { pattern, flags }, .. }))
                if pattern == "ab+c" && flags == "gi"
        ));
    }

    #[test]
    fn test_template_literal_parts() {
        let program = parse("`a${1}b${2}c`").unwrap();
        let Statement::Expression(stmt) = &program.body[0] else {
            panic!("Unexpected node")
        };
        assert!(matches!(
            stmt.expression.as_ref(),
            Expression::Template(t) if t.quasis.len() == 3 && t.expressions.len() == 2
        ));
    }

    #[test]
    fn test_invalid_escape_only_in_tagged_templates() {
        assert!(parse("tag`\\unicode`").is_ok());
        assert!(syntax_message("`\\unicode`").contains("Invalid escape"));
    }

    #[test]
    fn test_cover_initializer() {
        assert!(parse("({a = 1} = {});").is_ok());
        assert!(parse("[{a = 1}] = [{}];").is_ok());
        assert!(parse("for ({a = 1} of []) ;").is_ok());
        assert!(syntax_message("({a = 1});").contains("shorthand property initializer"));
        assert!(syntax_message("f({a = 1});").contains("shorthand property initializer"));
        assert!(syntax_message("var x = [{a = 1}];").contains("shorthand property initializer"));
    }

    #[test]
    fn test_strict_mode_restrictions() {
        assert!(parse("var eval = 1;").is_ok());
        assert!(syntax_message("'use strict'; var eval = 1;").contains("eval"));
        assert!(syntax_message("'use strict'; ({eval = 0} = {});").contains("eval"));
        assert!(syntax_message("'use strict'; var x = 010;").contains("Octal"));
        assert!(syntax_message("function f(a, a) { 'use strict'; }").contains("Duplicate"));
        assert!(parse("function f(a, a) {}").is_ok());
        assert!(syntax_message("'use strict'; delete x;").contains("unqualified"));
        assert!(syntax_message("function f(a = 1) { 'use strict'; }").contains("non-simple"));
    }

    #[test]
    fn test_language_version_gates() {
        let es5 = ParseOptions {
            language_version: LanguageVersion::Es5,
            record_comments: false,
        };
        for source in [
            "let x = 1;",
            "var f = () => 1;",
            "function* g() {}",
            "var s = `t`;",
            "var [a] = [1];",
            "class A {}",
        ] {
            let err = parse_with(source, es5).map(|_| ()).unwrap_err();
            assert!(err.to_string().contains("not supported in ES5"), "{}", source);
        }

        let es2017 = ParseOptions {
            language_version: LanguageVersion::Es2017,
            record_comments: false,
        };
        let err = parse_with("var {a, ...rest} = {};", es2017)
            .map(|_| ())
            .unwrap_err();
        assert!(err.to_string().contains("object rest properties not supported"));
        assert!(parse_with("var {a, ...rest} = {};", ParseOptions::default()).is_ok());
    }

    #[test]
    fn test_labels_and_jumps() {
        assert!(parse("outer: for (;;) { inner: for (;;) { continue outer; } }").is_ok());
        assert!(parse("a: b: while (true) { continue a; }").is_ok());
        assert!(syntax_message("break;").contains("Illegal break"));
        assert!(syntax_message("while (1) { break nope; }").contains("Undefined label"));
        assert!(syntax_message("a: { for (;;) continue a; }").contains("iteration statement"));
        assert!(parse("a: { break a; }").is_ok());
    }

    #[test]
    fn test_super_placement() {
        assert!(parse("class A extends B { constructor() { super(); } m() { return super.m(); } }").is_ok());
        assert!(syntax_message("class A { constructor() { super(); } }").contains("super"));
        assert!(syntax_message("function f() { super.x; }").contains("super"));
    }

    #[test]
    fn test_optional_chain_boundary() {
        let program = parse("a?.b.c").unwrap();
        let Statement::Expression(stmt) = &program.body[0] else {
            panic!("Unexpected node")
        };
        assert!(matches!(stmt.expression.as_ref(), Expression::OptionalChain(_)));
        assert!(syntax_message("a?.b = 1").contains("left-hand side"));
    }

    #[test]
    fn test_nullish_mixing_requires_parens() {
        assert!(syntax_message("a ?? b || c").contains("Cannot mix"));
        assert!(parse("(a ?? b) || c").is_ok());
    }

    #[test]
    fn test_doc_comments_attach_to_functions() {
        let options = ParseOptions {
            language_version: LanguageVersion::Latest,
            record_comments: true,
        };
        let source = "/** Adds. */\nfunction add(a, b) { return a + b; }\n// plain\nfunction sub() {}\n/** Obj doc */ var o = { /** method doc */ m: function() {} };";
        let program = parse_with(source, options).unwrap();
        assert_eq!(program.comments.len(), 4);
        let Statement::FunctionDeclaration(add) = &program.body[0] else {
            panic!("Unexpected node")
        };
        assert_eq!(add.doc.as_ref().map(|d| d.as_str()), Some("/** Adds. */"));
        let Statement::FunctionDeclaration(sub) = &program.body[1] else {
            panic!("Unexpected node")
        };
        assert!(sub.doc.is_none());
        let Statement::VariableDeclaration(decl) = &program.body[2] else {
            panic!("Unexpected node")
        };
        assert_eq!(decl.doc.as_ref().map(|d| d.as_str()), Some("/** Obj doc */"));
        let Some(Expression::Object(object)) = decl.declarations[0].init.as_deref() else {
            panic!("Unexpected node")
        };
        let ObjectProperty::Property(prop) = &object.properties[0] else {
            panic!("Unexpected node")
        };
        assert_eq!(prop.doc.as_ref().map(|d| d.as_str()), Some("/** method doc */"));
        assert!(matches!(prop.value.as_ref(), Expression::Function(f)
            if f.doc.as_ref().map(|d| d.as_str()) == Some("/** method doc */")));
    }

    #[test]
    fn test_syntax_error_position() {
        let mut dict = StringDict::new();
        let mut parser =
            Parser::starting_at_line("var a = 1;\nvar = 2;", &mut dict, ParseOptions::default(), 10);
        let err = parser.parse_program().map(|_| ()).unwrap_err();
        assert!(matches!(err, JsError::SyntaxError { location, .. } if location.line == 11));
    }

    #[test]
    fn test_for_variants() {
        assert!(parse("for (;;) break;").is_ok());
        assert!(parse("for (var i = 0, j = 1; i < j; i++) ;").is_ok());
        assert!(parse("for (var k in o) ;").is_ok());
        assert!(parse("for (let [a, b] of pairs) ;").is_ok());
        assert!(parse("for (x.y in o) ;").is_ok());
        assert!(parse("for (var i = 'a' in o ? 1 : 2; ;) break;").is_err());
        assert!(parse("for (var i = ('a' in o) ? 1 : 2; ;) break;").is_ok());
    }

    #[test]
    fn test_class_members() {
        let program =
            parse("class A { constructor(x) { this.x = x; } get v() { return 1; } static s() {} *g() {} }")
                .unwrap();
        let Statement::ClassDeclaration(class) = &program.body[0] else {
            panic!("Unexpected node")
        };
        assert!(class.constructor.is_some());
        assert_eq!(class.members.len(), 3);
        assert!(class.members.iter().any(|m| m.is_static));
        assert!(class.members.iter().any(|m| m.kind == MethodKind::Get));
        assert!(syntax_message("class A { constructor() {} constructor() {} }").contains("one constructor"));
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000));
        assert!(syntax_message(&deep).contains("Maximum nesting depth exceeded"));

        let blocks = format!("{}{}", "{".repeat(20_000), "}".repeat(20_000));
        assert!(syntax_message(&blocks).contains("Maximum nesting depth exceeded"));

        let unary = format!("{}x", "!".repeat(20_000));
        assert!(syntax_message(&unary).contains("Maximum nesting depth exceeded"));

        let shallow = format!("{}1{}", "[".repeat(200), "]".repeat(200));
        assert!(parse(&shallow).is_ok());
    }
}
