use crate::{
    ast::{BinaryOp, Expr, ExprKind, Literal, Program, Stmt, StmtKind, UnaryOp},
    diagnostics::{Diagnostic, DiagnosticKind, SourceSpan},
    lexer::{Keyword, Lexer, Token, TokenKind},
};

pub fn parse_program(source: &str) -> Result<Program, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_program()
}

/// Binary operators from loosest to tightest binding.
const PRECEDENCE: &[&[(TokenKind, BinaryOp)]] = &[
    &[(TokenKind::DoublePipe, BinaryOp::Or)],
    &[(TokenKind::DoubleAmpersand, BinaryOp::And)],
    &[
        (TokenKind::EqualEqual, BinaryOp::Equal),
        (TokenKind::BangEqual, BinaryOp::NotEqual),
    ],
    &[
        (TokenKind::LessEqual, BinaryOp::LessEqual),
        (TokenKind::GreaterEqual, BinaryOp::GreaterEqual),
        (TokenKind::Less, BinaryOp::Less),
        (TokenKind::Greater, BinaryOp::Greater),
    ],
    &[
        (TokenKind::Plus, BinaryOp::Add),
        (TokenKind::Minus, BinaryOp::Sub),
    ],
    &[
        (TokenKind::Star, BinaryOp::Mul),
        (TokenKind::Slash, BinaryOp::Div),
        (TokenKind::Percent, BinaryOp::Mod),
    ],
];

struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    fn parse_program(&mut self) -> Result<Program, Diagnostic> {
        let mut items = Vec::new();
        while !self.check(TokenKind::Eof) {
            items.push(self.parse_statement()?);
        }
        Ok(Program { items })
    }

    fn parse_block_items(&mut self, terminator: TokenKind) -> Result<Vec<Stmt>, Diagnostic> {
        let mut items = Vec::new();
        while !self.check(terminator) && !self.check(TokenKind::Eof) {
            items.push(self.parse_statement()?);
        }
        self.consume(terminator, "expected block terminator")?;
        Ok(items)
    }

    fn parse_block(&mut self) -> Result<(Vec<Stmt>, SourceSpan), Diagnostic> {
        let lbrace = self.consume(TokenKind::LBrace, "expected `{` to start block")?;
        let items = self.parse_block_items(TokenKind::RBrace)?;
        let end = self.previous().span.end;
        Ok((items, SourceSpan::new(lbrace.span.start, end)))
    }

    fn parse_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let Some(token) = self.peek() else {
            return Err(self.error_eof("unexpected end of input"));
        };
        match token.kind {
            TokenKind::Keyword(Keyword::Var) => self.parse_var_decl(),
            TokenKind::Keyword(Keyword::Const) => self.parse_const_decl(),
            TokenKind::Keyword(Keyword::Fn) => self.parse_function(),
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::While) => self.parse_while(),
            TokenKind::Keyword(Keyword::Loop) => self.parse_loop(),
            TokenKind::Keyword(Keyword::For) => self.parse_for(),
            TokenKind::Keyword(Keyword::Try) => self.parse_try(),
            TokenKind::Keyword(Keyword::Throw) => self.parse_throw(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return(),
            TokenKind::Keyword(Keyword::Break) => self.parse_break(),
            TokenKind::Keyword(Keyword::Continue) => {
                let token = self.advance();
                self.consume_optional_semicolon();
                Ok(Stmt {
                    span: token.span,
                    kind: StmtKind::Continue,
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

    fn parse_var_decl(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Var)?.span.start;
        let _ = self.matches_keyword(Keyword::Mut);
        let name_token = self.consume_identifier("expected variable name")?;
        let initializer = if self.matches(TokenKind::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.consume_optional_semicolon();
        let end = initializer
            .as_ref()
            .map_or(name_token.span.end, |expr| expr.span.end);
        Ok(Stmt {
            kind: StmtKind::VarDecl {
                name: name_token.lexeme,
                initializer,
            },
            span: SourceSpan::new(start, end),
        })
    }

    fn parse_const_decl(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Const)?.span.start;
        let name_token = self.consume_identifier("expected constant name")?;
        self.consume(TokenKind::Assign, "expected `=` in constant declaration")?;
        let value = self.parse_expression()?;
        self.consume_optional_semicolon();
        Ok(Stmt {
            span: SourceSpan::new(start, value.span.end),
            kind: StmtKind::ConstDecl {
                name: name_token.lexeme,
                value,
            },
        })
    }

    fn parse_function(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Fn)?.span.start;
        let name_token = self.consume_identifier("expected function name")?;
        self.consume(TokenKind::LParen, "expected `(` after function name")?;
        let params = self.parse_params(TokenKind::RParen)?;
        self.consume(TokenKind::RParen, "expected `)` after parameters")?;
        let (body, span) = self.parse_block()?;
        Ok(Stmt {
            span: SourceSpan::new(start, span.end),
            kind: StmtKind::Function {
                name: name_token.lexeme,
                params,
                body,
            },
        })
    }

    fn parse_params(&mut self, terminator: TokenKind) -> Result<Vec<String>, Diagnostic> {
        let mut params = Vec::new();
        if self.check(terminator) {
            return Ok(params);
        }
        loop {
            params.push(self.consume_identifier("expected parameter name")?.lexeme);
            if !self.matches(TokenKind::Comma) {
                return Ok(params);
            }
        }
    }

    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::If)?.span.start;
        let condition = self.parse_expression()?;
        let (then_branch, mut span) = self.parse_block()?;
        let else_branch = if self.matches_keyword(Keyword::Else) {
            if self.check(TokenKind::Keyword(Keyword::If)) {
                let nested = self.parse_if()?;
                span = nested.span;
                Some(vec![nested])
            } else {
                let (branch, else_span) = self.parse_block()?;
                span = else_span;
                Some(branch)
            }
        } else {
            None
        };
        Ok(Stmt {
            span: SourceSpan::new(start, span.end),
            kind: StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::While)?.span.start;
        let condition = self.parse_expression()?;
        let (body, span) = self.parse_block()?;
        Ok(Stmt {
            span: SourceSpan::new(start, span.end),
            kind: StmtKind::While { condition, body },
        })
    }

    fn parse_loop(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Loop)?.span.start;
        let (body, span) = self.parse_block()?;
        Ok(Stmt {
            span: SourceSpan::new(start, span.end),
            kind: StmtKind::Loop { body },
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::For)?.span.start;
        let binding = self.consume_identifier("expected loop binding")?;
        self.consume_keyword(Keyword::In)?;
        let iterable = self.parse_expression()?;
        let (body, span) = self.parse_block()?;
        Ok(Stmt {
            span: SourceSpan::new(start, span.end),
            kind: StmtKind::For {
                binding: binding.lexeme,
                iterable,
                body,
            },
        })
    }

    fn parse_try(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Try)?.span.start;
        let (body, _) = self.parse_block()?;
        self.consume_keyword(Keyword::Catch)?;
        let binding = if self.check(TokenKind::Identifier) {
            Some(self.advance().lexeme)
        } else {
            None
        };
        let (handler, span) = self.parse_block()?;
        Ok(Stmt {
            span: SourceSpan::new(start, span.end),
            kind: StmtKind::Try {
                body,
                binding,
                handler,
            },
        })
    }

    fn parse_throw(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.consume_keyword(Keyword::Throw)?.span.start;
        let value = self.parse_expression()?;
        self.consume_optional_semicolon();
        Ok(Stmt {
            span: SourceSpan::new(start, value.span.end),
            kind: StmtKind::Throw(value),
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, Diagnostic> {
        let token = self.consume_keyword(Keyword::Return)?;
        let expr = self.parse_optional_operand()?;
        let end = expr.as_ref().map_or(token.span.end, |e| e.span.end);
        Ok(Stmt {
            span: SourceSpan::new(token.span.start, end),
            kind: StmtKind::Return(expr),
        })
    }

    fn parse_break(&mut self) -> Result<Stmt, Diagnostic> {
        let token = self.consume_keyword(Keyword::Break)?;
        let expr = self.parse_optional_operand()?;
        let end = expr.as_ref().map_or(token.span.end, |e| e.span.end);
        Ok(Stmt {
            span: SourceSpan::new(token.span.start, end),
            kind: StmtKind::Break(expr),
        })
    }

    /// Value after `return` or `break`, absent before `;`, `}` or the end.
    fn parse_optional_operand(&mut self) -> Result<Option<Expr>, Diagnostic> {
        let expr = if self.check(TokenKind::Semicolon)
            || self.check(TokenKind::RBrace)
            || self.check(TokenKind::Eof)
        {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume_optional_semicolon();
        Ok(expr)
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let expr = self.parse_expression()?;
        self.consume_optional_semicolon();
        Ok(Stmt {
            span: expr.span,
            kind: StmtKind::Expr(expr),
        })
    }

    fn parse_expression(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, Diagnostic> {
        let expr = self.parse_binary(0)?;
        if !self.matches(TokenKind::Assign) {
            return Ok(expr);
        }
        let equals = self.previous().span;
        let value = self.parse_assignment()?;
        match expr.kind {
            ExprKind::Variable(_) | ExprKind::Index { .. } | ExprKind::Field { .. } => Ok(Expr {
                span: SourceSpan::new(expr.span.start, value.span.end),
                kind: ExprKind::Assign {
                    target: Box::new(expr),
                    value: Box::new(value),
                },
            }),
            _ => Err(
                Diagnostic::new(DiagnosticKind::Parser, "invalid assignment target")
                    .with_span(equals),
            ),
        }
    }

    fn parse_binary(&mut self, level: usize) -> Result<Expr, Diagnostic> {
        let Some(operators) = PRECEDENCE.get(level) else {
            return self.parse_unary();
        };
        let mut expr = self.parse_binary(level + 1)?;
        while let Some(op) = self.match_operator(operators) {
            let right = self.parse_binary(level + 1)?;
            expr = Expr {
                span: SourceSpan::new(expr.span.start, right.span.end),
                kind: ExprKind::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
            };
        }
        Ok(expr)
    }

    fn match_operator(&mut self, operators: &[(TokenKind, BinaryOp)]) -> Option<BinaryOp> {
        let op = operators
            .iter()
            .find(|(kind, _)| self.check(*kind))
            .map(|&(_, op)| op)?;
        self.advance();
        Some(op)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        let op = if self.matches(TokenKind::Minus) {
            UnaryOp::Negate
        } else if self.matches(TokenKind::Bang) {
            UnaryOp::Not
        } else {
            return self.parse_call();
        };
        let start = self.previous().span.start;
        let operand = self.parse_unary()?;
        Ok(Expr {
            span: SourceSpan::new(start, operand.span.end),
            kind: ExprKind::Unary {
                op,
                expr: Box::new(operand),
            },
        })
    }

    fn parse_call(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_primary()?;
        loop {
            // `(` or `[` on a new line opens a new statement.
            let continues = self.peek().is_some_and(|token| !token.starts_line);
            if continues && self.matches(TokenKind::LParen) {
                let args = self.parse_list(TokenKind::RParen)?;
                let paren = self.consume(TokenKind::RParen, "expected `)` after arguments")?;
                expr = Expr {
                    span: SourceSpan::new(expr.span.start, paren.span.end),
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                };
            } else if continues && self.matches(TokenKind::LBracket) {
                let index = self.parse_expression()?;
                let bracket = self.consume(TokenKind::RBracket, "expected `]` after index")?;
                expr = Expr {
                    span: SourceSpan::new(expr.span.start, bracket.span.end),
                    kind: ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    },
                };
            } else if self.matches(TokenKind::Dot) {
                let ident = self.consume_identifier("expected field after `.`")?;
                expr = Expr {
                    span: SourceSpan::new(expr.span.start, ident.span.end),
                    kind: ExprKind::Field {
                        target: Box::new(expr),
                        field: ident.lexeme,
                    },
                };
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma separated expressions up to, not including, `terminator`.
    fn parse_list(&mut self, terminator: TokenKind) -> Result<Vec<Expr>, Diagnostic> {
        let mut items = Vec::new();
        while !self.check(terminator) && !self.check(TokenKind::Eof) {
            items.push(self.parse_expression()?);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        Ok(items)
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.error_eof("unexpected end of expression"));
        };
        let literal = match token.kind {
            TokenKind::Keyword(Keyword::True) => Literal::Bool(true),
            TokenKind::Keyword(Keyword::False) => Literal::Bool(false),
            TokenKind::Keyword(Keyword::None) => Literal::None,
            TokenKind::Number => self.number(&token)?,
            TokenKind::String => Literal::String(token.lexeme.clone()),
            TokenKind::Identifier => {
                self.advance();
                return Ok(Expr {
                    span: token.span,
                    kind: ExprKind::Variable(token.lexeme),
                });
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                let rparen = self.consume(TokenKind::RParen, "expected `)` after expression")?;
                return Ok(Expr {
                    span: SourceSpan::new(token.span.start, rparen.span.end),
                    kind: ExprKind::Group(Box::new(inner)),
                });
            }
            TokenKind::LBracket => {
                self.advance();
                let elements = self.parse_list(TokenKind::RBracket)?;
                let rbracket =
                    self.consume(TokenKind::RBracket, "expected `]` after array literal")?;
                return Ok(Expr {
                    span: SourceSpan::new(token.span.start, rbracket.span.end),
                    kind: ExprKind::ArrayLiteral(elements),
                });
            }
            TokenKind::LBrace => return self.parse_inline_map(),
            TokenKind::Pipe | TokenKind::DoublePipe => return self.parse_lambda(),
            _ => return Err(self.error(&token, "unexpected token in expression")),
        };
        self.advance();
        Ok(Expr {
            span: token.span,
            kind: ExprKind::Literal(literal),
        })
    }

    fn number(&self, token: &Token) -> Result<Literal, Diagnostic> {
        let digits = token.lexeme.replace('_', "");
        let literal = if digits.contains(['.', 'e', 'E']) {
            digits.parse().map(Literal::Float).ok()
        } else {
            digits.parse().map(Literal::Int).ok()
        };
        literal.ok_or_else(|| self.error(token, "invalid number literal"))
    }

    fn parse_inline_map(&mut self) -> Result<Expr, Diagnostic> {
        let lbrace = self.advance();
        let mut entries = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            let key = self.parse_expression()?;
            self.consume(TokenKind::Colon, "expected `:` in map literal")?;
            let value = self.parse_expression()?;
            entries.push((key, value));
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        let rbrace = self.consume(TokenKind::RBrace, "expected `}` after map literal")?;
        Ok(Expr {
            span: SourceSpan::new(lbrace.span.start, rbrace.span.end),
            kind: ExprKind::MapLiteral(entries),
        })
    }

    /// `|a, b| expr`, `|| expr` or a lambda with a block body.
    fn parse_lambda(&mut self) -> Result<Expr, Diagnostic> {
        let opening = self.advance();
        let params = if opening.kind == TokenKind::DoublePipe {
            Vec::new()
        } else {
            let params = self.parse_params(TokenKind::Pipe)?;
            self.consume(TokenKind::Pipe, "expected closing `|` in lambda")?;
            params
        };
        let (body, end) = if self.check(TokenKind::LBrace) {
            let (body, span) = self.parse_block()?;
            (body, span.end)
        } else {
            let expr = self.parse_expression()?;
            let end = expr.span.end;
            let body = vec![Stmt {
                span: expr.span,
                kind: StmtKind::Return(Some(expr)),
            }];
            (body, end)
        };
        Ok(Expr {
            span: SourceSpan::new(opening.span.start, end),
            kind: ExprKind::Lambda { params, body },
        })
    }

    fn consume_optional_semicolon(&mut self) {
        let _ = self.matches(TokenKind::Semicolon);
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches_keyword(&mut self, keyword: Keyword) -> bool {
        self.matches(TokenKind::Keyword(keyword))
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self
                .peek()
                .map(|tok| self.error(tok, message))
                .unwrap_or_else(|| self.error_eof(message)))
        }
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> Result<Token, Diagnostic> {
        let message = format!("expected keyword `{}`", format!("{keyword:?}").to_lowercase());
        self.consume(TokenKind::Keyword(keyword), &message)
    }

    fn consume_identifier(&mut self, message: &str) -> Result<Token, Diagnostic> {
        self.consume(TokenKind::Identifier, message)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|token| token.kind == kind)
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().map(|t| t.kind), Some(TokenKind::Eof) | None)
    }

    fn error(&self, token: &Token, message: &str) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Parser, message).with_span(token.span)
    }

    fn error_eof(&self, message: &str) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Parser, message)
    }
}
