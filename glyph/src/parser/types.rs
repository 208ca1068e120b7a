use super::Parser;
use crate::ast::Field;
use crate::lexer::TokenKind;
use crate::types::Type;
use crate::GlyphResult;

impl Parser<'_> {
    /// `A | B | ...`, where each member may carry `?` suffixes
    pub(crate) fn parse_type(&mut self) -> GlyphResult<Type> {
        let mut members = vec![self.parse_optional_type()?];
        while self.check_inline(TokenKind::Pipe) {
            self.advance();
            members.push(self.parse_optional_type()?);
        }
        Ok(Type::union(members))
    }

    fn parse_optional_type(&mut self) -> GlyphResult<Type> {
        let mut ty = self.parse_base_type()?;
        while self.check_inline(TokenKind::Question) {
            self.advance();
            ty = Type::Optional(Box::new(ty));
        }
        Ok(ty)
    }

    fn parse_base_type(&mut self) -> GlyphResult<Type> {
        match self.current().kind {
            TokenKind::LBracket => {
                self.advance();
                let element = self.parse_type()?;
                self.expect(TokenKind::RBracket)?;
                Ok(Type::Array(Box::new(element)))
            }
            TokenKind::LParen => {
                self.advance();
                let mut params = Vec::new();
                while !self.check(TokenKind::RParen) && !self.is_at_end() {
                    params.push(self.parse_type()?);
                    self.skip_commas();
                }
                self.expect(TokenKind::RParen)?;
                if self.eat(TokenKind::Arrow) {
                    let ret = self.parse_type()?;
                    Ok(Type::Function {
                        params,
                        ret: Box::new(ret),
                    })
                } else if params.len() == 1 {
                    Ok(params.remove(0))
                } else {
                    Err(self.error_with_hint(
                        "Expected '->' after function parameter types",
                        "Function types are written as '(int, int) -> int'",
                    ))
                }
            }
            _ => {
                let name = match self.current().word() {
                    Some(word) => word.to_string(),
                    None => {
                        return Err(self.error_with_hint(
                            format!("Expected a type, but found {}", self.describe_current()),
                            "Types look like 'int', 'string', 'User', '[User]' or 'User?'",
                        ))
                    }
                };
                self.advance();

                if self.check_inline(TokenKind::Lt) {
                    self.advance();
                    let mut args = Vec::new();
                    while !self.check(TokenKind::Gt) && !self.is_at_end() {
                        args.push(self.parse_type()?);
                        self.skip_commas();
                    }
                    self.expect(TokenKind::Gt)?;
                    return Ok(Type::Generic { base: name, args });
                }

                Ok(Type::from_name(&name))
            }
        }
    }

    /// Optional `<T, U>` after a declaration name
    pub(crate) fn parse_type_params(&mut self) -> GlyphResult<Vec<String>> {
        let mut params = Vec::new();
        if self.check_inline(TokenKind::Lt) {
            self.advance();
            while !self.check(TokenKind::Gt) && !self.is_at_end() {
                params.push(self.expect_ident("type parameter name")?.lexeme);
                self.skip_commas();
            }
            self.expect(TokenKind::Gt)?;
        }
        Ok(params)
    }

    /// `name: type[!] [= default]`; the type may be omitted when `untyped` is allowed
    pub(crate) fn parse_field(&mut self, untyped: bool) -> GlyphResult<Field> {
        let start = self.current().span;
        let name = self.expect_word("field name")?;

        let type_annotation = if self.eat(TokenKind::Colon) {
            self.parse_type()?
        } else if untyped {
            Type::Named("any".to_string())
        } else {
            return Err(self.error_with_hint(
                format!(
                    "Expected ':' after field name '{}', but found {}",
                    name,
                    self.describe_current()
                ),
                "Fields are written as 'name: type', e.g. 'email: string!'",
            ));
        };

        let required = self.check_inline(TokenKind::Bang) && {
            self.advance();
            true
        };

        let default = if self.check_inline(TokenKind::Assign) {
            self.advance();
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(Field {
            name,
            type_annotation,
            required,
            default,
            span: self.span_from(start),
        })
    }

    /// Parenthesised, comma-optional field list
    pub(crate) fn parse_param_list(&mut self, untyped: bool) -> GlyphResult<Vec<Field>> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        self.skip_commas();
        while !self.check(TokenKind::RParen) && !self.is_at_end() {
            params.push(self.parse_field(untyped)?);
            self.skip_commas();
        }
        self.expect(TokenKind::RParen)?;
        Ok(params)
    }
}
