use super::Parser;
use crate::ast::{AssignTarget, Expr, ExprKind, PathStep, Statement, StatementKind, SwitchCase};
use crate::lexer::TokenKind;
use crate::GlyphResult;

impl Parser<'_> {
    /// `{ statement* }`
    pub(crate) fn parse_block(&mut self) -> GlyphResult<Vec<Statement>> {
        self.expect(TokenKind::LBrace)?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(statements)
    }

    pub(crate) fn parse_statement(&mut self) -> GlyphResult<Statement> {
        self.push_depth()?;
        let result = self.parse_statement_inner();
        self.pop_depth();
        result
    }

    fn parse_statement_inner(&mut self) -> GlyphResult<Statement> {
        let start = self.current().span;

        let kind = match self.current().kind {
            TokenKind::Dollar => {
                self.advance();
                self.parse_assignment()?
            }
            TokenKind::Gt => {
                self.advance();
                let ends_here = matches!(self.current().kind, TokenKind::RBrace | TokenKind::Eof)
                    || self.current().directive;
                if ends_here {
                    StatementKind::Return(None)
                } else {
                    StatementKind::Return(Some(self.parse_expression()?))
                }
            }
            TokenKind::If => self.parse_if()?,
            TokenKind::While => {
                self.advance();
                let condition = self.parse_expression()?;
                let body = self.parse_block()?;
                StatementKind::While { condition, body }
            }
            TokenKind::For => self.parse_for()?,
            TokenKind::Switch => self.parse_switch()?,
            TokenKind::Break => {
                self.advance();
                StatementKind::Break
            }
            TokenKind::Continue => {
                self.advance();
                StatementKind::Continue
            }
            TokenKind::Question => {
                self.advance();
                StatementKind::Validate(self.parse_expression()?)
            }
            TokenKind::Const => {
                return Err(self.error_with_hint(
                    "Constants can only be declared at the top level",
                    "Use '$ name = value' for a local variable",
                ))
            }
            _ => {
                let expr = self.parse_expression()?;
                if self.check_inline(TokenKind::Assign) {
                    self.advance();
                    let target = self.assign_target(expr)?;
                    let value = self.parse_expression()?;
                    StatementKind::Assign {
                        target,
                        type_annotation: None,
                        value,
                    }
                } else {
                    StatementKind::Expression(expr)
                }
            }
        };

        Ok(Statement {
            kind,
            span: self.span_from(start),
        })
    }

    /// `target(.field | [index])* [: Type] = value`, after the `$`
    fn parse_assignment(&mut self) -> GlyphResult<StatementKind> {
        let name = self.expect_ident("variable name")?.lexeme;
        let mut target = AssignTarget::variable(name);

        loop {
            if self.check(TokenKind::Dot) {
                self.advance();
                target.path.push(PathStep::Field(self.expect_word("field name")?));
            } else if self.check_inline(TokenKind::LBracket) {
                self.advance();
                target.path.push(PathStep::Index(self.parse_expression()?));
                self.expect(TokenKind::RBracket)?;
            } else {
                break;
            }
        }

        let type_annotation = if self.eat(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        self.expect(TokenKind::Assign)?;
        let value = self.parse_expression()?;

        Ok(StatementKind::Assign {
            target,
            type_annotation,
            value,
        })
    }

    fn assign_target(&self, expr: Expr) -> GlyphResult<AssignTarget> {
        let span = expr.span;
        match expr.kind {
            ExprKind::Variable(name) => Ok(AssignTarget::variable(name)),
            ExprKind::FieldAccess { object, field } => {
                let mut target = self.assign_target(*object)?;
                target.path.push(PathStep::Field(field));
                Ok(target)
            }
            ExprKind::Index { object, index } => {
                let mut target = self.assign_target(*object)?;
                target.path.push(PathStep::Index(*index));
                Ok(target)
            }
            _ => Err(self.error_at(
                "Invalid assignment target; expected a variable, field or index",
                span,
            )),
        }
    }

    fn parse_if(&mut self) -> GlyphResult<StatementKind> {
        self.expect(TokenKind::If)?;
        let condition = self.parse_expression()?;
        let then_block = self.parse_block()?;

        let else_block = if self.eat(TokenKind::Else) {
            if self.check(TokenKind::If) {
                let start = self.current().span;
                let nested = self.parse_if()?;
                Some(vec![Statement {
                    kind: nested,
                    span: self.span_from(start),
                }])
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };

        Ok(StatementKind::If {
            condition,
            then_block,
            else_block,
        })
    }

    /// `for [key,] value in iterable { ... }`
    fn parse_for(&mut self) -> GlyphResult<StatementKind> {
        self.expect(TokenKind::For)?;
        let first = self.expect_ident("loop variable")?.lexeme;
        self.skip_commas();

        let (key_var, value_var) = if self.check(TokenKind::Ident) {
            let second = self.advance().lexeme;
            (Some(first), second)
        } else {
            (None, first)
        };

        self.expect(TokenKind::In)?;
        let iterable = self.parse_expression()?;
        let body = self.parse_block()?;

        Ok(StatementKind::For {
            key_var,
            value_var,
            iterable,
            body,
        })
    }

    /// `switch value { case a { ... } case b { ... } default { ... } }`
    fn parse_switch(&mut self) -> GlyphResult<StatementKind> {
        self.expect(TokenKind::Switch)?;
        let value = self.parse_expression()?;
        self.expect(TokenKind::LBrace)?;

        let mut cases = Vec::new();
        let mut default = None;

        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            match self.current().kind {
                TokenKind::Case => {
                    self.advance();
                    let case_value = self.parse_expression()?;
                    let body = self.parse_block()?;
                    cases.push(SwitchCase {
                        value: case_value,
                        body,
                    });
                }
                TokenKind::Default => {
                    if default.is_some() {
                        return Err(self.error("Switch statement has more than one default case"));
                    }
                    self.advance();
                    default = Some(self.parse_block()?);
                }
                _ => {
                    return Err(self.error_with_hint(
                        format!("Expected 'case' or 'default', but found {}", self.describe_current()),
                        "Switch cases are written as 'case value { ... }'",
                    ))
                }
            }
        }

        self.expect(TokenKind::RBrace)?;
        Ok(StatementKind::Switch {
            value,
            cases,
            default,
        })
    }
}
