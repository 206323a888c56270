use std::{collections::VecDeque, rc::Rc};

use crate::{
    ast::{
        BinaryOp, Expr, ExprKind, Field, FunctionDecl, Literal, LogicalOp, MatchArm,
        MatchPattern, Param, Program, Stmt, StmtKind, TypeName, UnaryOp,
    },
    diagnostics::{Diagnostic, SourceSpan},
    lexer::{Keyword, Lexer, Token, TokenKind, TokenValue},
};

pub const MAX_NESTING_DEPTH: usize = 256;

// Binding power of prefix `not`: its operand is parsed at equality level and above.
const NOT_PRECEDENCE: u8 = 3;

pub fn parse_program(source: &str) -> Result<Program, Diagnostic> {
    Parser::new(source).parse_program()
}

#[derive(Debug, Clone, Copy)]
enum InfixOperator {
    Logical(LogicalOp),
    Binary(BinaryOp),
}

/// Precedence table for infix operators, all left-associative.
/// Assignment (right-associative) sits below this table.
///
/// | precedence | operators |
/// |---|---|
/// | 1 | `or` |
/// | 2 | `and` |
/// | 3 | prefix `not` |
/// | 4 | `==` `!=` |
/// | 5 | `<` `<=` `>` `>=` |
/// | 6 | `+` `-` |
/// | 7 | `*` `/` `%` |
fn infix_operator(kind: TokenKind) -> Option<(InfixOperator, u8)> {
    use InfixOperator::{Binary, Logical};
    let entry = match kind {
        TokenKind::Keyword(Keyword::Or) => (Logical(LogicalOp::Or), 1),
        TokenKind::Keyword(Keyword::And) => (Logical(LogicalOp::And), 2),
        TokenKind::EqualEqual => (Binary(BinaryOp::Equal), 4),
        TokenKind::BangEqual => (Binary(BinaryOp::NotEqual), 4),
        TokenKind::Less => (Binary(BinaryOp::Less), 5),
        TokenKind::LessEqual => (Binary(BinaryOp::LessEqual), 5),
        TokenKind::Greater => (Binary(BinaryOp::Greater), 5),
        TokenKind::GreaterEqual => (Binary(BinaryOp::GreaterEqual), 5),
        TokenKind::Plus => (Binary(BinaryOp::Add), 6),
        TokenKind::Minus => (Binary(BinaryOp::Sub), 6),
        TokenKind::Star => (Binary(BinaryOp::Mul), 7),
        TokenKind::Slash => (Binary(BinaryOp::Div), 7),
        TokenKind::Percent => (Binary(BinaryOp::Mod), 7),
        _ => return None,
    };
    Some(entry)
}

/// Recursive-descent parser pulling tokens from the lexer on demand.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: VecDeque<Token>,
    last_span: SourceSpan,
    expected: Vec<String>,
    depth: usize,
    max_depth: usize,
    /// Cleared directly inside `if`/`while`/`for`/`match` parentheses, where
    /// `name {` is a missing `)` rather than a struct literal.
    struct_literals: bool,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            lexer: Lexer::new(source),
            lookahead: VecDeque::with_capacity(3),
            last_span: SourceSpan::default(),
            expected: Vec::new(),
            depth: 0,
            max_depth: MAX_NESTING_DEPTH,
            struct_literals: true,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn parse_program(mut self) -> Result<Program, Diagnostic> {
        let mut items = Vec::new();
        while !self.check(TokenKind::Eof)? {
            items.push(self.parse_statement()?);
        }
        tracing::debug!(statements = items.len(), "parsed program");
        Ok(Program { items })
    }

    fn parse_statement(&mut self) -> Result<Stmt, Diagnostic> {
        self.nested(|parser| parser.parse_statement_inner())
    }

    fn parse_statement_inner(&mut self) -> Result<Stmt, Diagnostic> {
        match self.peek_kind(0)? {
            TokenKind::Keyword(Keyword::Fn) => {
                if self.peek_kind(1)? == TokenKind::Identifier {
                    if self.peek_kind(2)? == TokenKind::LParen {
                        return self.parse_function();
                    }
                    return self.parse_declaration();
                }
                self.parse_expression_statement()
            }
            TokenKind::Keyword(Keyword::Const) => self.parse_declaration(),
            TokenKind::Keyword(keyword) if keyword.is_type() => self.parse_declaration(),
            TokenKind::Identifier if self.peek_kind(1)? == TokenKind::Identifier => {
                self.parse_declaration()
            }
            TokenKind::Keyword(Keyword::Struct) => self.parse_struct_def(),
            TokenKind::Keyword(Keyword::Variant) => self.parse_variant_def(),
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::While) => self.parse_while(),
            TokenKind::Keyword(Keyword::For) => self.parse_for(),
            TokenKind::Keyword(Keyword::Match) => self.parse_match(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return(),
            TokenKind::Keyword(Keyword::Break) => {
                let start = self.advance()?.span;
                self.consume_terminator()?;
                Ok(Stmt {
                    kind: StmtKind::Break,
                    span: start,
                })
            }
            TokenKind::Keyword(Keyword::Continue) => {
                let start = self.advance()?.span;
                self.consume_terminator()?;
                Ok(Stmt {
                    kind: StmtKind::Continue,
                    span: start,
                })
            }
            TokenKind::LBrace => {
                let (items, span) = self.parse_block()?;
                Ok(Stmt {
                    kind: StmtKind::Block(items),
                    span,
                })
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_declaration(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.peek(0)?.span;
        let constant = self.matches_keyword(Keyword::Const)?;
        let ty = self.parse_type()?;
        let name = self.consume_identifier("expected variable name")?;
        self.consume(TokenKind::Assign, "expected `=` in declaration")?;
        let initializer = self.parse_expression()?;
        let end = initializer.span;
        self.consume_terminator()?;
        Ok(Stmt {
            kind: StmtKind::VarDecl {
                name: name.lexeme,
                ty,
                constant,
                initializer,
            },
            span: start.to(end),
        })
    }

    fn parse_type(&mut self) -> Result<TypeName, Diagnostic> {
        let ty = match self.peek_kind(0)? {
            TokenKind::Keyword(Keyword::Int) => TypeName::Int,
            TokenKind::Keyword(Keyword::Float) => TypeName::Float,
            TokenKind::Keyword(Keyword::String) => TypeName::String,
            TokenKind::Keyword(Keyword::Bool) => TypeName::Bool,
            TokenKind::Keyword(Keyword::Fn) => TypeName::Fn,
            TokenKind::Keyword(Keyword::List) => TypeName::List,
            TokenKind::Keyword(Keyword::Var) => TypeName::Var,
            TokenKind::Identifier => TypeName::Custom(self.peek(0)?.lexeme.clone()),
            _ => {
                self.note_expected("type");
                return Err(self.error_at_current("expected a type")?);
            }
        };
        self.advance()?;
        Ok(ty)
    }

    fn parse_function(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Fn)?.span;
        let name = self.consume_identifier("expected function name")?;
        let decl = self.parse_function_rest(Some(name.lexeme), start)?;
        let span = decl.span;
        Ok(Stmt {
            kind: StmtKind::Function(Rc::new(decl)),
            span,
        })
    }

    /// Parameters, optional return type and body, shared by definitions and lambdas.
    fn parse_function_rest(
        &mut self,
        name: Option<String>,
        start: SourceSpan,
    ) -> Result<FunctionDecl, Diagnostic> {
        self.consume(TokenKind::LParen, "expected `(` before parameters")?;
        let mut params: Vec<Param> = Vec::new();
        if !self.check(TokenKind::RParen)? {
            loop {
                let ty = self.parse_type()?;
                let param = self.consume_identifier("expected parameter name")?;
                if params.iter().any(|existing| existing.name == param.lexeme) {
                    return Err(Diagnostic::parser(format!(
                        "duplicate parameter `{}`",
                        param.lexeme
                    ))
                    .with_span(param.span));
                }
                params.push(Param {
                    name: param.lexeme,
                    ty,
                    span: param.span,
                });
                if !self.matches(TokenKind::Comma)? {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "expected `)` after parameters")?;
        let return_type = if self.matches(TokenKind::Colon)? {
            Some(self.parse_type()?)
        } else {
            None
        };
        let (body, body_span) = self.parse_block()?;
        Ok(FunctionDecl {
            name,
            params,
            return_type,
            body,
            span: start.to(body_span),
        })
    }

    fn parse_fields(&mut self, what: &str) -> Result<Vec<Field>, Diagnostic> {
        self.consume(TokenKind::LBrace, &format!("expected `{{` to open {what} body"))?;
        let mut fields: Vec<Field> = Vec::new();
        while !self.check(TokenKind::RBrace)? {
            let ty = self.parse_type()?;
            let name = self.consume_identifier("expected member name")?;
            if fields.iter().any(|field| field.name == name.lexeme) {
                return Err(
                    Diagnostic::parser(format!("duplicate member `{}`", name.lexeme))
                        .with_span(name.span),
                );
            }
            self.consume(TokenKind::Semicolon, "expected `;` after member")?;
            fields.push(Field {
                name: name.lexeme,
                ty,
                span: name.span,
            });
        }
        self.consume(TokenKind::RBrace, &format!("expected `}}` to close {what} body"))?;
        self.matches(TokenKind::Semicolon)?;
        Ok(fields)
    }

    fn parse_struct_def(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Struct)?.span;
        let name = self.consume_identifier("expected struct name")?;
        let fields = self.parse_fields("struct")?;
        Ok(Stmt {
            kind: StmtKind::StructDef {
                name: name.lexeme,
                fields,
            },
            span: start.to(self.last_span),
        })
    }

    fn parse_variant_def(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Variant)?.span;
        let name = self.consume_identifier("expected variant name")?;
        let cases = self.parse_fields("variant")?;
        if cases.is_empty() {
            return Err(Diagnostic::parser(format!(
                "variant `{}` must declare at least one case",
                name.lexeme
            ))
            .with_span(name.span));
        }
        Ok(Stmt {
            kind: StmtKind::VariantDef {
                name: name.lexeme,
                cases,
            },
            span: start.to(self.last_span),
        })
    }

    fn parse_block(&mut self) -> Result<(Vec<Stmt>, SourceSpan), Diagnostic> {
        self.with_struct_literals(true, Self::parse_block_inner)
    }

    fn parse_block_inner(&mut self) -> Result<(Vec<Stmt>, SourceSpan), Diagnostic> {
        let start = self.consume(TokenKind::LBrace, "expected `{` to open block")?.span;
        let mut items = Vec::new();
        while !self.check(TokenKind::RBrace)? && !self.check(TokenKind::Eof)? {
            items.push(self.parse_statement()?);
        }
        let end = self.consume(TokenKind::RBrace, "expected `}` to close block")?.span;
        Ok((items, start.to(end)))
    }

    fn parse_condition(&mut self) -> Result<Expr, Diagnostic> {
        self.consume(TokenKind::LParen, "expected `(` before condition")?;
        let condition = self.with_struct_literals(false, Self::parse_expression)?;
        self.consume(TokenKind::RParen, "expected `)` after condition")?;
        Ok(condition)
    }

    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::If)?.span;
        let condition = self.parse_condition()?;
        let (then_branch, mut end) = self.parse_block()?;
        let mut branches = vec![(condition, then_branch)];
        let mut else_branch = None;
        loop {
            let chained = if self.matches_keyword(Keyword::Elif)? {
                true
            } else if self.check_keyword(Keyword::Else)?
                && self.peek_kind(1)? == TokenKind::Keyword(Keyword::If)
            {
                self.advance()?;
                self.advance()?;
                true
            } else {
                false
            };
            if chained {
                let condition = self.parse_condition()?;
                let (body, span) = self.parse_block()?;
                branches.push((condition, body));
                end = span;
                continue;
            }
            if self.matches_keyword(Keyword::Else)? {
                let (body, span) = self.parse_block()?;
                else_branch = Some(body);
                end = span;
            }
            break;
        }
        Ok(Stmt {
            kind: StmtKind::If {
                branches,
                else_branch,
            },
            span: start.to(end),
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::While)?.span;
        let condition = self.parse_condition()?;
        let (body, end) = self.parse_block()?;
        Ok(Stmt {
            kind: StmtKind::While { condition, body },
            span: start.to(end),
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::For)?.span;
        self.consume(TokenKind::LParen, "expected `(` after `for`")?;
        let binding = self.consume_identifier("expected loop variable")?;
        self.consume_keyword(Keyword::In)?;
        let iterable = self.with_struct_literals(false, Self::parse_expression)?;
        self.consume(TokenKind::RParen, "expected `)` after iterable")?;
        let (body, end) = self.parse_block()?;
        Ok(Stmt {
            kind: StmtKind::For {
                binding: binding.lexeme,
                iterable,
                body,
            },
            span: start.to(end),
        })
    }

    fn parse_match(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Match)?.span;
        let subject = self.parse_condition()?;
        self.consume(TokenKind::LBrace, "expected `{` after match subject")?;
        let mut arms = Vec::new();
        while !self.check(TokenKind::RBrace)? {
            let head = self.consume_identifier("expected variant case or `_`")?;
            let pattern = if head.lexeme == "_" {
                MatchPattern::Wildcard
            } else {
                self.consume(TokenKind::LParen, "expected `(` after variant case")?;
                let binding = self.consume_identifier("expected binding name")?;
                self.consume(TokenKind::RParen, "expected `)` after binding")?;
                MatchPattern::Case {
                    case: head.lexeme,
                    binding: binding.lexeme,
                }
            };
            self.consume(TokenKind::FatArrow, "expected `=>` in match arm")?;
            let (body, span) = self.parse_block()?;
            arms.push(MatchArm {
                pattern,
                body,
                span: head.span.to(span),
            });
        }
        let end = self.consume(TokenKind::RBrace, "expected `}` after match arms")?.span;
        Ok(Stmt {
            kind: StmtKind::Match { subject, arms },
            span: start.to(end),
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Return)?.span;
        let value = match self.peek_kind(0)? {
            TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof => None,
            _ => Some(self.parse_expression()?),
        };
        let end = value.as_ref().map(|expr| expr.span).unwrap_or(start);
        self.consume_terminator()?;
        Ok(Stmt {
            kind: StmtKind::Return(value),
            span: start.to(end),
        })
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let expr = self.parse_expression()?;
        self.consume_terminator()?;
        Ok(Stmt {
            span: expr.span,
            kind: StmtKind::Expr(expr),
        })
    }

    /// `;` ends every simple statement; only the last statement of the input may omit it.
    fn consume_terminator(&mut self) -> Result<(), Diagnostic> {
        if self.matches(TokenKind::Semicolon)? || self.check(TokenKind::Eof)? {
            return Ok(());
        }
        Err(self.error_at_current("expected `;` after statement")?)
    }

    pub fn parse_expression(&mut self) -> Result<Expr, Diagnostic> {
        self.nested(|parser| parser.parse_assignment())
    }

    fn parse_assignment(&mut self) -> Result<Expr, Diagnostic> {
        let target = self.parse_binary(1)?;
        if !self.matches(TokenKind::Assign)? {
            return Ok(target);
        }
        let equals = self.last_span;
        let value = self.parse_assignment()?;
        if !matches!(
            target.kind,
            ExprKind::Variable(_) | ExprKind::Index { .. } | ExprKind::Field { .. }
        ) {
            return Err(Diagnostic::parser("invalid assignment target")
                .with_span(equals)
                .with_note("only variables, fields and list elements can be assigned"));
        }
        Ok(Expr {
            span: target.span.to(value.span),
            kind: ExprKind::Assign {
                target: Box::new(target),
                value: Box::new(value),
            },
        })
    }

    /// Precedence climbing over [`infix_operator`].
    fn parse_binary(&mut self, min_precedence: u8) -> Result<Expr, Diagnostic> {
        let mut left = if min_precedence <= NOT_PRECEDENCE
            && self.matches_keyword(Keyword::Not)?
        {
            let start = self.last_span;
            let operand = self.nested(|parser| parser.parse_binary(NOT_PRECEDENCE + 1))?;
            Expr {
                span: start.to(operand.span),
                kind: ExprKind::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(operand),
                },
            }
        } else {
            self.parse_unary()?
        };

        loop {
            let Some((operator, precedence)) = infix_operator(self.peek_kind(0)?) else {
                self.note_expected("operator");
                break;
            };
            if precedence < min_precedence {
                break;
            }
            self.advance()?;
            let right = self.parse_binary(precedence + 1)?;
            let span = left.span.to(right.span);
            let (left_box, right_box) = (Box::new(left), Box::new(right));
            left = Expr {
                span,
                kind: match operator {
                    InfixOperator::Logical(op) => ExprKind::Logical {
                        op,
                        left: left_box,
                        right: right_box,
                    },
                    InfixOperator::Binary(op) => ExprKind::Binary {
                        op,
                        left: left_box,
                        right: right_box,
                    },
                },
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        self.nested(|parser| parser.parse_unary_inner())
    }

    fn parse_unary_inner(&mut self) -> Result<Expr, Diagnostic> {
        if self.matches(TokenKind::Minus)? {
            let start = self.last_span;
            let operand = self.parse_unary()?;
            return Ok(Expr {
                span: start.to(operand.span),
                kind: ExprKind::Unary {
                    op: UnaryOp::Negate,
                    expr: Box::new(operand),
                },
            });
        }
        if self.matches(TokenKind::At)? {
            let start = self.last_span;
            let operand = self.parse_unary()?;
            return Ok(Expr {
                span: start.to(operand.span),
                kind: ExprKind::Copy(Box::new(operand)),
            });
        }
        if let Some(ty) = self.cast_ahead()? {
            let start = self.advance()?.span;
            self.advance()?;
            self.advance()?;
            let operand = self.parse_unary()?;
            return Ok(Expr {
                span: start.to(operand.span),
                kind: ExprKind::Cast {
                    ty,
                    expr: Box::new(operand),
                },
            });
        }
        self.parse_postfix()
    }

    /// `( int )`, `( float )`, `( string )` or `( bool )` in prefix position.
    fn cast_ahead(&mut self) -> Result<Option<TypeName>, Diagnostic> {
        if self.peek_kind(0)? != TokenKind::LParen || self.peek_kind(2)? != TokenKind::RParen {
            return Ok(None);
        }
        let ty = match self.peek_kind(1)? {
            TokenKind::Keyword(Keyword::Int) => TypeName::Int,
            TokenKind::Keyword(Keyword::Float) => TypeName::Float,
            TokenKind::Keyword(Keyword::String) => TypeName::String,
            TokenKind::Keyword(Keyword::Bool) => TypeName::Bool,
            _ => return Ok(None),
        };
        Ok(Some(ty))
    }

    fn parse_postfix(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.matches(TokenKind::LParen)? {
                let args = self.parse_arguments(TokenKind::RParen)?;
                let end = self.consume(TokenKind::RParen, "expected `)` after arguments")?.span;
                expr = Expr {
                    span: expr.span.to(end),
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                };
            } else if self.matches(TokenKind::LBracket)? {
                let index = self.with_struct_literals(true, Self::parse_expression)?;
                let end = self.consume(TokenKind::RBracket, "expected `]` after index")?.span;
                expr = Expr {
                    span: expr.span.to(end),
                    kind: ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    },
                };
            } else if self.matches(TokenKind::Dot)? {
                let field = self.consume_identifier("expected field name after `.`")?;
                expr = Expr {
                    span: expr.span.to(field.span),
                    kind: ExprKind::Field {
                        target: Box::new(expr),
                        field: field.lexeme,
                    },
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Comma-separated expressions up to (not including) `closing`.
    fn parse_arguments(&mut self, closing: TokenKind) -> Result<Vec<Expr>, Diagnostic> {
        let mut args = Vec::new();
        if self.check(closing)? {
            return Ok(args);
        }
        loop {
            args.push(self.with_struct_literals(true, Self::parse_expression)?);
            if !self.matches(TokenKind::Comma)? || self.check(closing)? {
                break;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let kind = self.peek_kind(0)?;
        let literal = match kind {
            TokenKind::Integer | TokenKind::Float | TokenKind::String => {
                let token = self.advance()?;
                let literal = match token.value {
                    Some(TokenValue::Int(n)) => Literal::Int(n),
                    Some(TokenValue::Float(n)) => Literal::Float(n),
                    Some(TokenValue::Str(s)) => Literal::String(s),
                    None => {
                        return Err(Diagnostic::parser("literal token without a value")
                            .with_span(token.span));
                    }
                };
                return Ok(Expr {
                    kind: ExprKind::Literal(literal),
                    span: token.span,
                });
            }
            TokenKind::Keyword(Keyword::True) => Literal::Bool(true),
            TokenKind::Keyword(Keyword::False) => Literal::Bool(false),
            TokenKind::Keyword(Keyword::Null) => Literal::Null,
            TokenKind::Identifier => return self.parse_identifier_expression(),
            TokenKind::LParen => {
                self.advance()?;
                let inner = self.with_struct_literals(true, Self::parse_expression)?;
                self.consume(TokenKind::RParen, "expected `)` after expression")?;
                return Ok(inner);
            }
            TokenKind::LBracket => {
                let start = self.advance()?.span;
                let elements = self.parse_arguments(TokenKind::RBracket)?;
                let end = self
                    .consume(TokenKind::RBracket, "expected `]` after list elements")?
                    .span;
                return Ok(Expr {
                    kind: ExprKind::List(elements),
                    span: start.to(end),
                });
            }
            TokenKind::Keyword(Keyword::Fn) => {
                let start = self.advance()?.span;
                let decl = self.parse_function_rest(None, start)?;
                return Ok(Expr {
                    span: decl.span,
                    kind: ExprKind::Lambda(Rc::new(decl)),
                });
            }
            _ => {
                self.note_expected("expression");
                return Err(self.error_at_current("expected expression")?);
            }
        };
        let token = self.advance()?;
        Ok(Expr {
            kind: ExprKind::Literal(literal),
            span: token.span,
        })
    }

    /// A variable, a struct literal `Name { .. }` or a variant constructor `Name::case(..)`.
    fn parse_identifier_expression(&mut self) -> Result<Expr, Diagnostic> {
        let name = self.advance()?;
        if self.matches(TokenKind::DoubleColon)? {
            let case = self.consume_identifier("expected variant case after `::`")?;
            self.consume(TokenKind::LParen, "expected `(` after variant case")?;
            let value = self.with_struct_literals(true, Self::parse_expression)?;
            let end = self.consume(TokenKind::RParen, "expected `)` after variant value")?.span;
            return Ok(Expr {
                span: name.span.to(end),
                kind: ExprKind::VariantLiteral {
                    name: name.lexeme,
                    case: case.lexeme,
                    value: Box::new(value),
                },
            });
        }
        if self.struct_literals && self.matches(TokenKind::LBrace)? {
            let values = self.parse_arguments(TokenKind::RBrace)?;
            let end = self
                .consume(TokenKind::RBrace, "expected `}` after struct members")?
                .span;
            return Ok(Expr {
                span: name.span.to(end),
                kind: ExprKind::StructLiteral {
                    name: name.lexeme,
                    values,
                },
            });
        }
        Ok(Expr {
            span: name.span,
            kind: ExprKind::Variable(name.lexeme),
        })
    }

    fn with_struct_literals<T>(
        &mut self,
        allowed: bool,
        parse: impl FnOnce(&mut Self) -> Result<T, Diagnostic>,
    ) -> Result<T, Diagnostic> {
        let previous = std::mem::replace(&mut self.struct_literals, allowed);
        let result = parse(self);
        self.struct_literals = previous;
        result
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, Diagnostic>,
    ) -> Result<T, Diagnostic> {
        if self.depth >= self.max_depth {
            let span = self.peek(0)?.span;
            return Err(Diagnostic::parser(format!(
                "nesting exceeds the maximum depth of {}",
                self.max_depth
            ))
            .with_span(span));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn peek(&mut self, offset: usize) -> Result<&Token, Diagnostic> {
        while self.lookahead.len() <= offset {
            match self.lexer.next() {
                Some(token) => self.lookahead.push_back(token?),
                None => break,
            }
        }
        let last = self.lookahead.len().saturating_sub(1);
        self.lookahead
            .get(offset.min(last))
            .ok_or_else(|| Diagnostic::parser("unexpected end of input"))
    }

    fn peek_kind(&mut self, offset: usize) -> Result<TokenKind, Diagnostic> {
        Ok(self.peek(offset)?.kind)
    }

    fn advance(&mut self) -> Result<Token, Diagnostic> {
        // `Eof` stays buffered so every later peek still sees it
        let token = if self.peek_kind(0)? == TokenKind::Eof {
            self.peek(0)?.clone()
        } else {
            self.lookahead
                .pop_front()
                .ok_or_else(|| Diagnostic::parser("unexpected end of input"))?
        };
        self.last_span = token.span;
        self.expected.clear();
        Ok(token)
    }

    fn note_expected(&mut self, label: impl Into<String>) {
        let label = label.into();
        if !self.expected.contains(&label) {
            self.expected.push(label);
        }
    }

    fn check(&mut self, kind: TokenKind) -> Result<bool, Diagnostic> {
        self.note_expected(kind.to_string());
        Ok(self.peek_kind(0)? == kind)
    }

    fn check_keyword(&mut self, keyword: Keyword) -> Result<bool, Diagnostic> {
        self.check(TokenKind::Keyword(keyword))
    }

    fn matches(&mut self, kind: TokenKind) -> Result<bool, Diagnostic> {
        if self.check(kind)? {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn matches_keyword(&mut self, keyword: Keyword) -> Result<bool, Diagnostic> {
        self.matches(TokenKind::Keyword(keyword))
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, Diagnostic> {
        if self.check(kind)? {
            self.advance()
        } else {
            Err(self.error_at_current(message)?)
        }
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> Result<Token, Diagnostic> {
        self.consume(
            TokenKind::Keyword(keyword),
            &format!("expected keyword `{}`", keyword.as_str()),
        )
    }

    fn consume_identifier(&mut self, message: &str) -> Result<Token, Diagnostic> {
        self.consume(TokenKind::Identifier, message)
    }

    /// Error at the next unconsumed token, carrying everything that would have been accepted there.
    fn error_at_current(&mut self, message: &str) -> Result<Diagnostic, Diagnostic> {
        let expected = self.expected.clone();
        let token = self.peek(0)?;
        Ok(Diagnostic::parser(message)
            .with_span(token.span)
            .with_expected(expected)
            .with_found(token.describe()))
    }
}
