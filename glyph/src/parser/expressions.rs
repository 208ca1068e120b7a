use super::Parser;
use crate::ast::{BinaryOp, Expr, ExprKind, LambdaBody, Literal, UnaryOp};
use crate::lexer::TokenKind;
use crate::GlyphResult;

fn binary_op(kind: TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Mod,
        TokenKind::EqEq => BinaryOp::Eq,
        TokenKind::NotEq => BinaryOp::NotEq,
        TokenKind::Lt => BinaryOp::Lt,
        TokenKind::LtEq => BinaryOp::LtEq,
        TokenKind::Gt => BinaryOp::Gt,
        TokenKind::GtEq => BinaryOp::GtEq,
        TokenKind::AndAnd => BinaryOp::And,
        TokenKind::OrOr => BinaryOp::Or,
        _ => return None,
    };
    Some(op)
}

/// Dotted name of a `a.b.c` chain of plain variables, if `expr` is one
fn name_path(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Variable(name) => Some(name.clone()),
        ExprKind::FieldAccess { object, field } => {
            name_path(object).map(|base| format!("{}.{}", base, field))
        }
        _ => None,
    }
}

impl Parser<'_> {
    pub fn parse_expression(&mut self) -> GlyphResult<Expr> {
        self.push_depth()?;
        let result = self.parse_binary(0);
        self.pop_depth();
        result
    }

    /// Precedence climbing. An operator that starts a new line ends the expression,
    /// since at that position it is a directive.
    fn parse_binary(&mut self, min_precedence: u8) -> GlyphResult<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            let token = self.current();
            if token.directive {
                break;
            }
            let Some(op) = binary_op(token.kind) else {
                break;
            };
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.advance();

            let right = self.parse_binary(precedence + 1)?;
            let span = left.span.to(right.span);
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                span,
            );
        }

        Ok(left)
    }

    pub(crate) fn parse_unary(&mut self) -> GlyphResult<Expr> {
        let start = self.current().span;
        let op = match self.current().kind {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Await => {
                self.advance();
                self.push_depth()?;
                let operand = self.parse_unary();
                self.pop_depth();
                let operand = operand?;
                return Ok(Expr::new(
                    ExprKind::Await(Box::new(operand)),
                    self.span_from(start),
                ));
            }
            _ => None,
        };

        match op {
            Some(op) => {
                self.advance();
                self.push_depth()?;
                let operand = self.parse_unary();
                self.pop_depth();
                let operand = operand?;
                Ok(Expr::new(
                    ExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    self.span_from(start),
                ))
            }
            None => {
                let primary = self.parse_primary()?;
                self.parse_postfix(primary)
            }
        }
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> GlyphResult<Expr> {
        loop {
            if self.check(TokenKind::Dot) {
                self.advance();
                let field = self.expect_word("field name after '.'")?;

                if self.check_inline(TokenKind::LParen) {
                    let args = self.parse_arguments()?;
                    let span = self.span_from(expr.span);
                    expr = match name_path(&expr) {
                        Some(base) => Expr::new(
                            ExprKind::Call {
                                name: format!("{}.{}", base, field),
                                args,
                            },
                            span,
                        ),
                        None => {
                            let mut receiver_args = vec![expr];
                            receiver_args.extend(args);
                            Expr::new(
                                ExprKind::Call {
                                    name: field,
                                    args: receiver_args,
                                },
                                span,
                            )
                        }
                    };
                } else {
                    let span = self.span_from(expr.span);
                    expr = Expr::new(
                        ExprKind::FieldAccess {
                            object: Box::new(expr),
                            field,
                        },
                        span,
                    );
                }
            } else if self.check_inline(TokenKind::LParen) {
                let name = match &expr.kind {
                    ExprKind::Variable(name) => name.clone(),
                    _ => {
                        return Err(self.error_with_hint(
                            "Only named functions can be called",
                            "Bind the value to a variable first: '$ f = ...' then 'f(...)'",
                        ))
                    }
                };
                let args = self.parse_arguments()?;
                let span = self.span_from(expr.span);
                expr = Expr::new(ExprKind::Call { name, args }, span);
            } else if self.check_inline(TokenKind::LBracket) {
                self.advance();
                let index = self.parse_expression()?;
                self.expect(TokenKind::RBracket)?;
                let span = self.span_from(expr.span);
                expr = Expr::new(
                    ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    span,
                );
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_arguments(&mut self) -> GlyphResult<Vec<Expr>> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        self.skip_commas();
        while !self.check(TokenKind::RParen) && !self.is_at_end() {
            args.push(self.parse_expression()?);
            self.skip_commas();
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> GlyphResult<Expr> {
        let token = self.current().clone();
        let span = token.span;

        let literal = match token.kind {
            TokenKind::Integer => match token.lexeme.parse::<i64>() {
                Ok(value) => Some(Literal::Int(value)),
                Err(_) => {
                    return Err(self.error(format!("Integer literal {} is out of range", token.lexeme)))
                }
            },
            TokenKind::Float => match token.lexeme.parse::<f64>() {
                Ok(value) => Some(Literal::Float(value)),
                Err(_) => return Err(self.error(format!("Invalid float literal {}", token.lexeme))),
            },
            TokenKind::Str => Some(Literal::String(token.lexeme.clone())),
            TokenKind::True => Some(Literal::Bool(true)),
            TokenKind::False => Some(Literal::Bool(false)),
            TokenKind::Null => Some(Literal::Null),
            _ => None,
        };
        if let Some(literal) = literal {
            self.advance();
            return Ok(Expr::new(ExprKind::Literal(literal), span));
        }

        match token.kind {
            TokenKind::Ident => {
                self.advance();
                Ok(Expr::new(ExprKind::Variable(token.lexeme), span))
            }
            TokenKind::LBracket => self.parse_array(),
            TokenKind::LBrace => self.parse_object(),
            TokenKind::LParen => {
                let is_lambda = self
                    .matching_paren(0)
                    .is_some_and(|close| self.peek(close + 1).kind == TokenKind::FatArrow);
                if is_lambda {
                    return self.parse_lambda();
                }
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::new(inner.kind, self.span_from(span)))
            }
            TokenKind::Func => self.parse_lambda(),
            _ => Err(self.error_with_hint(
                format!("Expected an expression, but found {}", self.describe_current()),
                "Expressions are literals, variables, calls, objects '{...}' or arrays '[...]'",
            )),
        }
    }

    fn parse_array(&mut self) -> GlyphResult<Expr> {
        let start = self.expect(TokenKind::LBracket)?.span;
        let mut elements = Vec::new();
        self.skip_commas();
        while !self.check(TokenKind::RBracket) && !self.is_at_end() {
            elements.push(self.parse_expression()?);
            self.skip_commas();
        }
        self.expect(TokenKind::RBracket)?;
        Ok(Expr::new(ExprKind::Array(elements), self.span_from(start)))
    }

    fn parse_object(&mut self) -> GlyphResult<Expr> {
        let start = self.expect(TokenKind::LBrace)?.span;
        let mut fields = Vec::new();
        self.skip_commas();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            let key = if self.check(TokenKind::Str) {
                self.advance().lexeme
            } else {
                self.expect_word("object key")?
            };
            self.expect(TokenKind::Colon)?;
            let value = self.parse_expression()?;
            fields.push((key, value));
            self.skip_commas();
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Expr::new(ExprKind::Object(fields), self.span_from(start)))
    }

    /// `(a, b) => expr`, `(a) => { ... }` or `fn(a) { ... }`
    fn parse_lambda(&mut self) -> GlyphResult<Expr> {
        let start = self.current().span;
        let keyword = self.eat(TokenKind::Func);
        let params = self.parse_param_list(true)?;

        let body = if keyword {
            LambdaBody::Block(self.parse_block()?)
        } else {
            self.expect(TokenKind::FatArrow)?;
            if self.check(TokenKind::LBrace) && self.brace_opens_block() {
                LambdaBody::Block(self.parse_block()?)
            } else {
                LambdaBody::Expr(Box::new(self.parse_expression()?))
            }
        };

        Ok(Expr::new(
            ExprKind::Lambda { params, body },
            self.span_from(start),
        ))
    }

    /// Whether the `{` under the cursor starts a block rather than an object literal
    fn brace_opens_block(&self) -> bool {
        let next = self.peek(1);
        let after = self.peek(2);
        let looks_like_object = next.kind == TokenKind::RBrace
            || (next.kind == TokenKind::Str || next.word().is_some())
                && after.kind == TokenKind::Colon
                && !next.directive;
        !looks_like_object
    }
}
