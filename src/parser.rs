//! Expression parser - converts source text to AST
//!
//! Recursive descent following the grammar precedence, lowest to highest:
//! 1. or
//! 2. and
//! 3. not (unary)
//! 4. comparison / predicate (== != < <= > >= in contains like before after
//!    same_day_as is, and the `within` / `older than` time windows);
//!    comparisons do not chain
//! 5. additive (+ -)
//! 6. multiplicative (* /)
//! 7. unary -
//! 8. primary (literal, path, raw block, parenthesized expression)

use crate::ast::*;
use crate::error::{Error, Result};
use crate::lexer::{split_resolver_hint, Lexer};
use crate::token::{Token, TokenType};

/// Parser for expressions.
///
/// A parser consumes one source string and holds no global state; create a
/// fresh instance per parse.
pub struct Parser {
    lexer: Lexer,
    current_token: Option<Token>,
    recursion_depth: usize,
}

const MAX_RECURSION_DEPTH: usize = 200;

impl Parser {
    /// Create a new parser for the given input string
    pub fn new(input: &str) -> Self {
        let mut parser = Self {
            lexer: Lexer::new(input),
            current_token: None,
            recursion_depth: 0,
        };
        parser.advance();
        parser
    }

    /// Advance to the next token
    fn advance(&mut self) {
        self.current_token = Some(self.lexer.next_token());
    }

    /// Get the current token (if any)
    fn current_token(&self) -> Option<&Token> {
        self.current_token.as_ref()
    }

    /// Check if current token matches the given type
    fn current_token_is(&self, token_type: TokenType) -> bool {
        self.current_token()
            .map(|t| t.token_type == token_type)
            .unwrap_or(false)
    }

    /// Check if current token is one of the given types
    fn current_token_is_one_of(&self, types: &[TokenType]) -> bool {
        self.current_token()
            .map(|t| types.contains(&t.token_type))
            .unwrap_or(false)
    }

    /// Build a parse error at the current token
    fn error_here(&self, message: impl Into<String>) -> Error {
        match self.current_token() {
            Some(token) => Error::Parse {
                message: message.into(),
                line: token.line,
                column: token.column,
            },
            None => Error::Parse {
                message: message.into(),
                line: 1,
                column: 1,
            },
        }
    }

    /// Surface a lexical error token as a parse error
    fn lex_error(token: &Token) -> Error {
        Error::Parse {
            message: token.value.clone(),
            line: token.line,
            column: token.column,
        }
    }

    /// Expect a specific token type and advance
    fn expect(&mut self, token_type: TokenType) -> Result<Token> {
        match self.current_token.take() {
            Some(token) if token.token_type == token_type => {
                self.advance();
                Ok(token)
            }
            Some(token) if token.token_type == TokenType::Error => Err(Self::lex_error(&token)),
            Some(token) => Err(Error::Parse {
                message: format!("expected {:?}, got {:?}", token_type, token.token_type),
                line: token.line,
                column: token.column,
            }),
            None => Err(Error::Parse {
                message: format!("expected {:?}, but reached end of input", token_type),
                line: 1,
                column: 1,
            }),
        }
    }

    /// Parse the entire source (top-level entry point)
    pub fn parse(&mut self) -> Result<Expr> {
        if self.current_token_is(TokenType::Eof) {
            return Err(self.error_here("empty expression"));
        }

        let expr = self.parse_expression()?;

        // Ensure we've consumed all input
        if !self.current_token_is(TokenType::Eof) {
            let token = self.current_token().unwrap();
            if token.token_type == TokenType::Error {
                return Err(Self::lex_error(token));
            }
            return Err(self.error_here(format!(
                "unexpected token {:?}",
                self.current_token().unwrap().token_type
            )));
        }

        Ok(expr)
    }

    /// Check recursion depth and increment
    fn check_recursion_depth(&mut self) -> Result<()> {
        self.recursion_depth += 1;
        if self.recursion_depth > MAX_RECURSION_DEPTH {
            return Err(self.error_here(format!(
                "expression too deeply nested (max depth: {})",
                MAX_RECURSION_DEPTH
            )));
        }
        Ok(())
    }

    fn decrement_recursion_depth(&mut self) {
        self.recursion_depth -= 1;
    }

    /// Parse an expression (lowest precedence)
    fn parse_expression(&mut self) -> Result<Expr> {
        self.check_recursion_depth()?;
        let expr = self.parse_or_expression();
        self.decrement_recursion_depth();
        expr
    }

    /// Parse or expression: and_expr ('or' and_expr)*
    fn parse_or_expression(&mut self) -> Result<Expr> {
        let mut left = self.parse_and_expression()?;

        while self.current_token_is(TokenType::Or) {
            self.advance();
            let right = self.parse_and_expression()?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    left: Box::new(left),
                    op: BinaryOp::Or,
                    right: Box::new(right),
                },
                span,
            );
        }

        Ok(left)
    }

    /// Parse and expression: not_expr ('and' not_expr)*
    fn parse_and_expression(&mut self) -> Result<Expr> {
        let mut left = self.parse_not_expression()?;

        while self.current_token_is(TokenType::And) {
            self.advance();
            let right = self.parse_not_expression()?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    left: Box::new(left),
                    op: BinaryOp::And,
                    right: Box::new(right),
                },
                span,
            );
        }

        Ok(left)
    }

    /// Parse not expression: 'not' not_expr | cmp_expr
    fn parse_not_expression(&mut self) -> Result<Expr> {
        if self.current_token_is(TokenType::Not) {
            let not_token = self.expect(TokenType::Not)?;
            self.check_recursion_depth()?;
            let operand = self.parse_not_expression();
            self.decrement_recursion_depth();
            let operand = operand?;
            let span = Span::new(not_token.start, operand.span.end);
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(operand),
                },
                span,
            ));
        }

        self.parse_comparison_expression()
    }

    /// Parse a comparison/predicate expression.
    ///
    /// At most one comparison is consumed: `a < b < c` leaves the second `<`
    /// for the caller, which rejects it as an unexpected token.
    fn parse_comparison_expression(&mut self) -> Result<Expr> {
        let left = self.parse_additive_expression()?;

        const COMPARISON_OPS: &[(TokenType, BinaryOp)] = &[
            (TokenType::Equal, BinaryOp::Eq),
            (TokenType::NotEqual, BinaryOp::Ne),
            (TokenType::LessThan, BinaryOp::Lt),
            (TokenType::LessThanOrEqual, BinaryOp::Le),
            (TokenType::GreaterThan, BinaryOp::Gt),
            (TokenType::GreaterThanOrEqual, BinaryOp::Ge),
            (TokenType::In, BinaryOp::In),
            (TokenType::Contains, BinaryOp::Contains),
            (TokenType::Like, BinaryOp::Like),
            (TokenType::Before, BinaryOp::Before),
            (TokenType::After, BinaryOp::After),
            (TokenType::SameDayAs, BinaryOp::SameDayAs),
        ];

        if let Some(token) = self.current_token() {
            if let Some((_, op)) = COMPARISON_OPS
                .iter()
                .find(|(tt, _)| *tt == token.token_type)
            {
                let op = *op;
                self.advance();
                let right = self.parse_additive_expression()?;
                let span = left.span.merge(right.span);
                return Ok(Expr::new(
                    ExprKind::Binary {
                        left: Box::new(left),
                        op,
                        right: Box::new(right),
                    },
                    span,
                ));
            }
        }

        if self.current_token_is(TokenType::Is) {
            self.advance();
            return self.parse_is_target(left);
        }

        if self.current_token_is(TokenType::Within) {
            self.advance();
            return self.parse_time_window(left, WindowDirection::Within);
        }

        if self.current_token_is(TokenType::Older) {
            self.advance();
            if !self.current_token_is(TokenType::Than) {
                return Err(self.error_here("expected 'than' after 'older'"));
            }
            self.advance();
            return self.parse_time_window(left, WindowDirection::OlderThan);
        }

        Ok(left)
    }

    /// Parse the right-hand side of an `is` check.
    ///
    /// Sentinel tags (`$past`, `$future`, `$today`, `$empty`) become
    /// dedicated checks; any other expression makes `is` behave as `==`.
    fn parse_is_target(&mut self, subject: Expr) -> Result<Expr> {
        if self.current_token_is(TokenType::Sentinel) {
            let token = self.expect(TokenType::Sentinel)?;
            let sentinel = Sentinel::from_name(&token.value).ok_or(Error::UnknownSentinel {
                name: token.value.clone(),
                line: token.line,
                column: token.column,
            })?;
            let target = match sentinel {
                Sentinel::Past => IsTarget::Past,
                Sentinel::Future => IsTarget::Future,
                Sentinel::Today => IsTarget::Today,
                Sentinel::Empty => IsTarget::Empty,
                // `x is $now` degrades to instant equality
                Sentinel::Now => IsTarget::Expr(Box::new(Expr::new(
                    ExprKind::Literal(Literal::Sentinel(Sentinel::Now)),
                    Span::new(token.start, token.end),
                ))),
            };
            let span = Span::new(subject.span.start, token.end);
            return Ok(Expr::new(
                ExprKind::IsCheck {
                    subject: Box::new(subject),
                    target,
                },
                span,
            ));
        }

        let target = self.parse_additive_expression()?;
        let span = subject.span.merge(target.span);
        Ok(Expr::new(
            ExprKind::IsCheck {
                subject: Box::new(subject),
                target: IsTarget::Expr(Box::new(target)),
            },
            span,
        ))
    }

    /// Parse the quantity + unit tail of a time-window expression
    fn parse_time_window(&mut self, subject: Expr, direction: WindowDirection) -> Result<Expr> {
        let quantity = self.parse_additive_expression()?;

        let unit_token = match self.current_token() {
            Some(token) if token.token_type == TokenType::Identifier => {
                self.expect(TokenType::Identifier)?
            }
            _ => {
                return Err(self.error_here(
                    "expected a time unit (minutes, hours, days, weeks, months, years)",
                ))
            }
        };
        let unit = TimeUnit::from_name(&unit_token.value).ok_or_else(|| Error::Parse {
            message: format!("unknown time unit '{}'", unit_token.value),
            line: unit_token.line,
            column: unit_token.column,
        })?;

        let span = Span::new(subject.span.start, unit_token.end);
        Ok(Expr::new(
            ExprKind::TimeWindow {
                subject: Box::new(subject),
                quantity: Box::new(quantity),
                unit,
                direction,
            },
            span,
        ))
    }

    /// Parse additive expression: mul_expr (('+' | '-') mul_expr)*
    fn parse_additive_expression(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative_expression()?;

        while self.current_token_is_one_of(&[TokenType::Plus, TokenType::Minus]) {
            let op = if self.current_token_is(TokenType::Plus) {
                BinaryOp::Add
            } else {
                BinaryOp::Sub
            };
            self.advance();
            let right = self.parse_multiplicative_expression()?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            );
        }

        Ok(left)
    }

    /// Parse multiplicative expression: unary (('*' | '/') unary)*
    fn parse_multiplicative_expression(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary_expression()?;

        while self.current_token_is_one_of(&[TokenType::Multiply, TokenType::Divide]) {
            let op = if self.current_token_is(TokenType::Multiply) {
                BinaryOp::Mul
            } else {
                BinaryOp::Div
            };
            self.advance();
            let right = self.parse_unary_expression()?;
            let span = left.span.merge(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span,
            );
        }

        Ok(left)
    }

    /// Parse unary expression: '-' unary | primary
    ///
    /// A minus directly in front of a number literal folds into a negative
    /// literal.
    fn parse_unary_expression(&mut self) -> Result<Expr> {
        if self.current_token_is(TokenType::Minus) {
            let minus_token = self.expect(TokenType::Minus)?;

            if self.current_token_is(TokenType::NumberLiteral) {
                let number = self.expect(TokenType::NumberLiteral)?;
                let span = Span::new(minus_token.start, number.end);
                let literal = parse_number_literal(&format!("-{}", number.value), &number)?;
                return Ok(Expr::new(ExprKind::Literal(literal), span));
            }

            self.check_recursion_depth()?;
            let operand = self.parse_unary_expression();
            self.decrement_recursion_depth();
            let operand = operand?;
            let span = Span::new(minus_token.start, operand.span.end);
            return Ok(Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(operand),
                },
                span,
            ));
        }

        self.parse_primary()
    }

    /// Parse a primary: literal, sentinel, path, raw block, or parens
    fn parse_primary(&mut self) -> Result<Expr> {
        let Some(token) = self.current_token() else {
            return Err(self.error_here("unexpected end of input"));
        };

        match token.token_type {
            TokenType::NumberLiteral => {
                let token = self.expect(TokenType::NumberLiteral)?;
                let literal = parse_number_literal(&token.value, &token)?;
                Ok(Expr::new(
                    ExprKind::Literal(literal),
                    Span::new(token.start, token.end),
                ))
            }
            TokenType::StringLiteral => {
                let token = self.expect(TokenType::StringLiteral)?;
                Ok(Expr::new(
                    ExprKind::Literal(Literal::String(token.value.clone())),
                    Span::new(token.start, token.end),
                ))
            }
            TokenType::BooleanLiteral => {
                let token = self.expect(TokenType::BooleanLiteral)?;
                Ok(Expr::new(
                    ExprKind::Literal(Literal::Bool(token.value == "true")),
                    Span::new(token.start, token.end),
                ))
            }
            TokenType::Sentinel => {
                let token = self.expect(TokenType::Sentinel)?;
                let sentinel =
                    Sentinel::from_name(&token.value).ok_or(Error::UnknownSentinel {
                        name: token.value.clone(),
                        line: token.line,
                        column: token.column,
                    })?;
                Ok(Expr::new(
                    ExprKind::Literal(Literal::Sentinel(sentinel)),
                    Span::new(token.start, token.end),
                ))
            }
            TokenType::RawBlock => {
                let token = self.expect(TokenType::RawBlock)?;
                let (resolver, text) = split_resolver_hint(&token.value);
                Ok(Expr::new(
                    ExprKind::RawPath {
                        text: text.to_string(),
                        resolver: resolver.map(|s| s.to_string()),
                    },
                    Span::new(token.start, token.end),
                ))
            }
            TokenType::OpenParen => {
                let open = self.expect(TokenType::OpenParen)?;
                let inner = self.parse_expression()?;
                let close = self.expect(TokenType::CloseParen)?;
                // Parentheses are transparent in the tree; widen the span only.
                Ok(Expr::new(inner.kind, Span::new(open.start, close.end)))
            }
            TokenType::Identifier => self.parse_path(),
            TokenType::Error => Err(Self::lex_error(token)),
            TokenType::Eof => Err(self.error_here("unexpected end of input")),
            _ => Err(self.error_here(format!("unexpected token {:?}", token.token_type))),
        }
    }

    /// Parse a path: IDENT ('.' IDENT | '[' INT ']')*
    fn parse_path(&mut self) -> Result<Expr> {
        let head = self.expect(TokenType::Identifier)?;
        let start = head.start;
        let mut end = head.end;
        let mut segments = vec![Segment::Key(head.value.clone())];

        loop {
            if self.current_token_is(TokenType::Dot) {
                self.advance();
                let name = self.expect(TokenType::Identifier)?;
                end = name.end;
                segments.push(Segment::Key(name.value.clone()));
                continue;
            }

            if self.current_token_is(TokenType::OpenBracket) {
                self.advance();
                let index_token = self.expect(TokenType::NumberLiteral)?;
                if index_token.value.contains('.') {
                    return Err(Error::Parse {
                        message: "path index must be a non-negative integer".into(),
                        line: index_token.line,
                        column: index_token.column,
                    });
                }
                let index: usize =
                    index_token.value.parse().map_err(|_| Error::Parse {
                        message: format!("invalid path index '{}'", index_token.value),
                        line: index_token.line,
                        column: index_token.column,
                    })?;
                let close = self.expect(TokenType::CloseBracket)?;
                end = close.end;
                segments.push(Segment::Index(index));
                continue;
            }

            break;
        }

        Ok(Expr::new(ExprKind::Path(segments), Span::new(start, end)))
    }
}

/// Parse a number literal token into an `Int` or `Float` literal
fn parse_number_literal(text: &str, token: &Token) -> Result<Literal> {
    if text.contains('.') {
        let value: f64 = text.parse().map_err(|_| Error::Parse {
            message: format!("invalid number '{}'", text),
            line: token.line,
            column: token.column,
        })?;
        Ok(Literal::Float(value))
    } else {
        let value: i64 = text.parse().map_err(|_| Error::Parse {
            message: format!("integer literal out of range: '{}'", text),
            line: token.line,
            column: token.column,
        })?;
        Ok(Literal::Int(value))
    }
}
