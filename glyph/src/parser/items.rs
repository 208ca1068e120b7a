use super::Parser;
use crate::ast::{
    AuthConfig, Command, CommandParam, ConstDecl, ContractDef, ContractEndpoint, CronTask,
    EventHandler, Field, Function, GraphQLOperation, GraphQLResolver, HttpMethod, ImportDecl, ImportName,
    Injection, Item, Middleware, Module, QueryParamDecl, QueueWorker, RateLimit, Route, Span,
    Statement, TypeDef,
};
use crate::lexer::{Token, TokenKind};
use crate::types::Type;
use crate::GlyphResult;
use std::collections::BTreeMap;

const TOP_LEVEL_HINT: &str =
    "Top-level items start with ':', '@', '!', '*', '~', '&', '=', 'contract', 'import' or 'const'";

/// Everything a handler body may declare besides its statements
#[derive(Default)]
struct HandlerBody {
    input: Option<(String, Type)>,
    auth: Option<AuthConfig>,
    rate_limit: Option<RateLimit>,
    query_params: Vec<QueryParamDecl>,
    middleware: Vec<Middleware>,
    injections: Vec<Injection>,
    /// Numeric settings such as `+ retries(3)`
    settings: BTreeMap<String, u32>,
    statements: Vec<Statement>,
}

impl HandlerBody {
    fn setting(&self, name: &str) -> u32 {
        self.settings.get(name).copied().unwrap_or(0)
    }
}

impl Parser<'_> {
    pub fn parse_module(&mut self) -> GlyphResult<Module> {
        let mut module = Module::default();

        while !self.is_at_end() {
            if self.check(TokenKind::Module) {
                self.advance();
                let name = if self.check(TokenKind::Str) {
                    self.advance().lexeme
                } else {
                    self.parse_dotted_name("module name")?
                };
                module.name = Some(name);
                continue;
            }
            module.items.push(self.parse_item()?);
        }

        Ok(module)
    }

    fn parse_item(&mut self) -> GlyphResult<Item> {
        let start = self.current().span;
        let token = self.current().clone();

        match token.kind {
            TokenKind::Colon => {
                self.advance();
                self.parse_type_def(start).map(Item::TypeDef)
            }
            TokenKind::Ident if token.lexeme == "type" && self.peek(1).kind == TokenKind::Ident => {
                self.advance();
                self.parse_type_def(start).map(Item::TypeDef)
            }
            TokenKind::At => {
                self.advance();
                self.parse_at_item(start)
            }
            TokenKind::Bang => {
                self.advance();
                self.parse_command(start).map(Item::Command)
            }
            TokenKind::Star => {
                self.advance();
                self.parse_cron_task(start).map(Item::CronTask)
            }
            TokenKind::Tilde => {
                self.advance();
                self.parse_event_handler(start).map(Item::EventHandler)
            }
            TokenKind::Ampersand => {
                self.advance();
                self.parse_queue_worker(start).map(Item::QueueWorker)
            }
            TokenKind::Func => {
                self.advance();
                self.parse_function(start).map(Item::Function)
            }
            TokenKind::Assign if token.directive => {
                self.advance();
                self.parse_function(start).map(Item::Function)
            }
            TokenKind::Contract => self.parse_contract(start).map(Item::Contract),
            TokenKind::Import | TokenKind::From => self.parse_import(start).map(Item::Import),
            TokenKind::Const => self.parse_const(start).map(Item::Const),
            _ => Err(self.error_with_hint(
                format!("Unexpected {} at top level", self.describe_current()),
                TOP_LEVEL_HINT,
            )),
        }
    }

    /// Item introduced by `@`: a route or one of the keyword forms
    fn parse_at_item(&mut self, start: Span) -> GlyphResult<Item> {
        if self.check(TokenKind::Path) {
            return self.parse_route(start, Some(HttpMethod::Get)).map(Item::Route);
        }

        let word = match self.current().word() {
            Some(word) => word.to_string(),
            None => {
                return Err(self.error_with_hint(
                    format!(
                        "Expected 'route', an HTTP method or a path after '@', but found {}",
                        self.describe_current()
                    ),
                    "Routes are written as '@ GET /users { ... }'",
                ))
            }
        };

        if let Some(method) = HttpMethod::parse(&word) {
            self.advance();
            return self.parse_route(start, Some(method)).map(Item::Route);
        }
        if let Some(operation) = GraphQLOperation::parse(&word) {
            self.advance();
            return self.parse_resolver(start, operation).map(Item::Resolver);
        }

        match word.as_str() {
            "route" => {
                self.advance();
                self.parse_route(start, None).map(Item::Route)
            }
            "command" | "cmd" => {
                self.advance();
                self.parse_command(start).map(Item::Command)
            }
            "cron" | "schedule" => {
                self.advance();
                self.parse_cron_task(start).map(Item::CronTask)
            }
            "event" | "on" => {
                self.advance();
                self.parse_event_handler(start).map(Item::EventHandler)
            }
            "queue" | "worker" => {
                self.advance();
                self.parse_queue_worker(start).map(Item::QueueWorker)
            }
            other => Err(self.error_with_hint(
                format!("Expected 'route' or an HTTP method after '@', but found '{}'", other),
                "Supported methods are GET, POST, PUT, DELETE and PATCH",
            )),
        }
    }

    fn parse_type_def(&mut self, start: Span) -> GlyphResult<TypeDef> {
        let name = self.expect_ident("type name")?.lexeme;
        let type_params = self.parse_type_params()?;

        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        self.skip_commas();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            let field = self.parse_field(false)?;
            if fields.iter().any(|f: &Field| f.name == field.name) {
                return Err(self.error_at(
                    format!("Duplicate field '{}' in type {}", field.name, name),
                    field.span,
                ));
            }
            fields.push(field);
            self.skip_commas();
        }
        self.expect(TokenKind::RBrace)?;

        Ok(TypeDef {
            name,
            type_params,
            fields,
            span: self.span_from(start),
        })
    }

    /// Route after its head keyword. `method` is `None` for the legacy
    /// `@ route /path [METHOD]` form.
    fn parse_route(&mut self, start: Span, method: Option<HttpMethod>) -> GlyphResult<Route> {
        let path = self.parse_route_path()?;

        let method = match method {
            Some(method) => method,
            None if self.check_inline(TokenKind::LBracket) => {
                self.advance();
                let method = self.parse_http_method()?;
                self.expect(TokenKind::RBracket)?;
                method
            }
            None => HttpMethod::Get,
        };

        let return_type = self.parse_return_arrow()?;
        let handler = self.parse_handler_body("route")?;

        Ok(Route {
            method,
            path,
            input: handler.input,
            return_type,
            auth: handler.auth,
            rate_limit: handler.rate_limit,
            query_params: handler.query_params,
            middleware: handler.middleware,
            injections: handler.injections,
            body: handler.statements,
            span: self.span_from(start),
        })
    }

    fn parse_route_path(&mut self) -> GlyphResult<String> {
        if self.check(TokenKind::Path) {
            return Ok(self.advance().lexeme);
        }
        Err(self.error_with_hint(
            format!("Expected route path, but found {}", self.describe_current()),
            "Route paths must start with '/' (e.g., /api/users)",
        ))
    }

    fn parse_http_method(&mut self) -> GlyphResult<HttpMethod> {
        let token = self.current().clone();
        let method = token.word().and_then(HttpMethod::parse);
        match method {
            Some(method) => {
                self.advance();
                Ok(method)
            }
            None => Err(self.error_with_hint(
                format!("Invalid HTTP method {}", self.describe_current()),
                "Supported methods are GET, POST, PUT, DELETE and PATCH",
            )),
        }
    }

    fn parse_return_arrow(&mut self) -> GlyphResult<Option<Type>> {
        if self.check_inline(TokenKind::Arrow) {
            self.advance();
            Ok(Some(self.parse_type()?))
        } else {
            Ok(None)
        }
    }

    /// Directives and statements of a handler.
    ///
    /// They may follow the head directly, one per line, and may be followed by a
    /// `{ ... }` block that can itself contain directives.
    fn parse_handler_body(&mut self, owner: &str) -> GlyphResult<HandlerBody> {
        let mut body = HandlerBody::default();

        loop {
            if self.check(TokenKind::LBrace) {
                self.advance();
                while !self.check(TokenKind::RBrace) && !self.is_at_end() {
                    self.parse_handler_entry(&mut body, owner)?;
                }
                self.expect(TokenKind::RBrace)?;
                break;
            }
            if !self.starts_braceless_entry() {
                break;
            }
            self.parse_handler_entry(&mut body, owner)?;
        }

        Ok(body)
    }

    fn starts_braceless_entry(&self) -> bool {
        let token = self.current();
        match token.kind {
            TokenKind::Plus
            | TokenKind::Percent
            | TokenKind::Lt
            | TokenKind::Question
            | TokenKind::Dollar
            | TokenKind::Gt => token.directive,
            TokenKind::If | TokenKind::While | TokenKind::For | TokenKind::Switch => true,
            _ => false,
        }
    }

    fn parse_handler_entry(&mut self, body: &mut HandlerBody, owner: &str) -> GlyphResult<()> {
        match self.current().kind {
            TokenKind::Plus => self.parse_middleware(body, owner),
            TokenKind::Percent => {
                self.advance();
                let injection = self.parse_injection()?;
                body.injections.push(injection);
                Ok(())
            }
            TokenKind::Lt => {
                self.advance();
                let name = self.expect_word("input name")?;
                self.expect(TokenKind::Colon)?;
                let ty = self.parse_type()?;
                body.input = Some((name, ty));
                Ok(())
            }
            TokenKind::Question
                if self.peek(1).word().is_some() && self.peek(2).kind == TokenKind::Colon =>
            {
                self.advance();
                let field = self.parse_field(false)?;
                let is_array = match &field.type_annotation {
                    Type::Array(_) => true,
                    Type::Optional(inner) => matches!(inner.as_ref(), Type::Array(_)),
                    _ => false,
                };
                body.query_params.push(QueryParamDecl {
                    name: field.name,
                    type_annotation: field.type_annotation,
                    required: field.required,
                    default: field.default,
                    is_array,
                });
                Ok(())
            }
            _ => {
                let statement = self.parse_statement()?;
                body.statements.push(statement);
                Ok(())
            }
        }
    }

    fn parse_injection(&mut self) -> GlyphResult<Injection> {
        let name = self.expect_word("dependency name")?;
        self.expect(TokenKind::Colon)?;
        let type_annotation = self.parse_type()?;
        Ok(Injection {
            name,
            type_annotation,
        })
    }

    fn parse_middleware(&mut self, body: &mut HandlerBody, owner: &str) -> GlyphResult<()> {
        let start = self.expect(TokenKind::Plus)?.span;
        let name = self.expect_word("middleware name")?;

        let (tokens, raw_args) = if self.check_inline(TokenKind::LParen) {
            self.skip_balanced(&format!("{} middleware '{}'", owner, name))?
        } else {
            (Vec::new(), String::new())
        };

        match name.as_str() {
            "auth" => body.auth = Some(self.auth_config(&tokens, start)?),
            "ratelimit" => body.rate_limit = Some(self.rate_limit(&tokens, &raw_args, start)?),
            "retries" | "concurrency" | "timeout" => {
                let value = self.integer_argument(&name, &tokens, start)?;
                body.settings.insert(name.clone(), value);
            }
            _ => {}
        }

        body.middleware.push(Middleware {
            name,
            raw_args,
            span: self.span_from(start),
        });
        Ok(())
    }

    /// `auth(kind)` or `auth(kind, optional)`
    fn auth_config(&self, tokens: &[Token], span: Span) -> GlyphResult<AuthConfig> {
        let mut words = tokens.iter().filter_map(|t| match t.kind {
            TokenKind::Str => Some(t.lexeme.as_str()),
            _ => t.word(),
        });
        let auth_type = words.next().ok_or_else(|| {
            self.error_at("auth middleware needs an auth type, e.g. auth(jwt)", span)
        })?;
        let required = !words.any(|w| w == "optional");
        Ok(AuthConfig {
            auth_type: auth_type.to_string(),
            required,
        })
    }

    /// `ratelimit(100/min)` or `ratelimit("100/min")`
    fn rate_limit(&self, tokens: &[Token], raw: &str, span: Span) -> GlyphResult<RateLimit> {
        let text = match tokens {
            [single] if single.kind == TokenKind::Str => single.lexeme.clone(),
            _ => raw.chars().filter(|c| !c.is_whitespace()).collect(),
        };
        let (count, window) = text.split_once('/').unwrap_or((text.as_str(), "min"));
        let requests = count.parse::<u32>().map_err(|_| {
            self.error_at(
                format!("Invalid rate limit '{}'; expected requests/window, e.g. 100/min", text),
                span,
            )
        })?;
        Ok(RateLimit {
            requests,
            window: window.to_string(),
        })
    }

    fn integer_argument(&self, name: &str, tokens: &[Token], span: Span) -> GlyphResult<u32> {
        match tokens {
            [token] if token.kind == TokenKind::Integer => token
                .lexeme
                .parse::<u32>()
                .map_err(|_| self.error_at(format!("{} must be a non-negative integer", name), span)),
            _ => Err(self.error_at(format!("{} expects a single integer, e.g. {}(3)", name, name), span)),
        }
    }

    /// `! name ["description"] params [-> Type] { ... }`; params may be parenthesised
    fn parse_command(&mut self, start: Span) -> GlyphResult<Command> {
        let name = self.parse_dotted_name("command name")?;
        let description = if self.check(TokenKind::Str) {
            Some(self.advance().lexeme)
        } else {
            None
        };

        let mut params = Vec::new();
        if self.check_inline(TokenKind::LParen) {
            self.advance();
            self.skip_commas();
            while !self.check(TokenKind::RParen) && !self.is_at_end() {
                params.push(self.parse_command_param()?);
                self.skip_commas();
            }
            self.expect(TokenKind::RParen)?;
        } else {
            while self.starts_command_param() {
                params.push(self.parse_command_param()?);
                self.skip_commas();
            }
        }

        let return_type = self.parse_return_arrow()?;
        let handler = self.parse_handler_body("command")?;

        Ok(Command {
            name,
            description,
            params,
            return_type,
            body: handler.statements,
            span: self.span_from(start),
        })
    }

    fn starts_command_param(&self) -> bool {
        let token = self.current();
        match token.kind {
            TokenKind::Minus => true,
            TokenKind::Ident => !(token.directive && token.lexeme == "type"),
            _ => false,
        }
    }

    /// `name[: type[!]] [= default]` or `--flag[: type] [= default]`
    fn parse_command_param(&mut self) -> GlyphResult<CommandParam> {
        let is_flag = self.eat(TokenKind::Minus);
        if is_flag {
            self.eat(TokenKind::Minus);
        }
        let name = self.expect_word("parameter name")?;

        let type_annotation = if self.check_inline(TokenKind::Colon) {
            self.advance();
            self.parse_type()?
        } else if is_flag {
            Type::Bool
        } else {
            Type::String
        };

        let required = self.check_inline(TokenKind::Bang) && {
            self.advance();
            true
        };

        let default = if self.check_inline(TokenKind::Assign) {
            self.advance();
            Some(self.parse_unary()?)
        } else {
            None
        };

        Ok(CommandParam {
            name,
            type_annotation,
            required,
            default,
            is_flag,
        })
    }

    /// `* "schedule" [name] [tz "Zone"] { ... }`
    fn parse_cron_task(&mut self, start: Span) -> GlyphResult<CronTask> {
        if !self.check(TokenKind::Str) {
            return Err(self.error_with_hint(
                "Expected cron schedule string",
                "Example: * \"0 0 * * *\" daily_cleanup { ... }",
            ));
        }
        let schedule = self.advance().lexeme;

        let name = if self.check_inline(TokenKind::Ident) && !self.check_word("tz") {
            Some(self.advance().lexeme)
        } else {
            None
        };

        let timezone = if self.check_inline(TokenKind::Ident) && self.check_word("tz") {
            self.advance();
            if !self.check(TokenKind::Str) {
                return Err(self.error_with_hint(
                    "Expected a timezone string after 'tz'",
                    "Example: tz \"Europe/Amsterdam\"",
                ));
            }
            Some(self.advance().lexeme)
        } else {
            None
        };

        let handler = self.parse_handler_body("cron task")?;

        Ok(CronTask {
            name,
            schedule,
            timezone,
            retries: handler.setting("retries"),
            injections: handler.injections,
            body: handler.statements,
            span: self.span_from(start),
        })
    }

    /// `~ "user.created" [async] { ... }`
    fn parse_event_handler(&mut self, start: Span) -> GlyphResult<EventHandler> {
        let event_type = if self.check(TokenKind::Str) {
            self.advance().lexeme
        } else if self.current().word().is_some() {
            self.parse_dotted_name("event type")?
        } else {
            return Err(self.error_with_hint(
                format!("Expected event type, but found {}", self.describe_current()),
                "Example: ~ \"user.created\" { ... }",
            ));
        };

        let is_async = self.check_inline(TokenKind::Async) && {
            self.advance();
            true
        };

        let handler = self.parse_handler_body("event handler")?;

        Ok(EventHandler {
            event_type,
            is_async,
            injections: handler.injections,
            body: handler.statements,
            span: self.span_from(start),
        })
    }

    /// `& queue.name { + concurrency(5) ... }`
    fn parse_queue_worker(&mut self, start: Span) -> GlyphResult<QueueWorker> {
        let queue_name = if self.check(TokenKind::Str) {
            self.advance().lexeme
        } else if self.current().word().is_some() {
            self.parse_dotted_name("queue name")?
        } else {
            return Err(self.error_with_hint(
                format!("Expected queue name, but found {}", self.describe_current()),
                "Example: & \"email.send\" { ... }",
            ));
        };

        let handler = self.parse_handler_body("queue worker")?;

        Ok(QueueWorker {
            queue_name,
            concurrency: handler.setting("concurrency"),
            max_retries: handler.setting("retries"),
            timeout: handler.setting("timeout"),
            injections: handler.injections,
            body: handler.statements,
            span: self.span_from(start),
        })
    }

    /// `@ query user(id: int!) -> User { ... }`
    fn parse_resolver(
        &mut self,
        start: Span,
        operation: GraphQLOperation,
    ) -> GlyphResult<GraphQLResolver> {
        let field_name = match self.current().word() {
            Some(word) => word.to_string(),
            None => {
                return Err(self.error_with_hint(
                    format!("Expected field name after '{}', but found {}", operation, self.describe_current()),
                    "Resolvers are written as '@ query user(id: int) -> User { ... }'",
                ))
            }
        };
        self.advance();

        let params = if self.check_inline(TokenKind::LParen) {
            self.parse_param_list(false)?
        } else {
            Vec::new()
        };
        let return_type = self.parse_return_arrow()?;
        let handler = self.parse_handler_body("resolver")?;

        Ok(GraphQLResolver {
            operation,
            field_name,
            params,
            return_type,
            injections: handler.injections,
            body: handler.statements,
            span: self.span_from(start),
        })
    }

    /// `func name<T>(a: int, b) -> int { ... }`; `: int` is accepted for the return type too
    fn parse_function(&mut self, start: Span) -> GlyphResult<Function> {
        let name = self.expect_ident("function name")?.lexeme;
        let type_params = self.parse_type_params()?;
        let params = self.parse_param_list(true)?;

        let return_type = if self.check_inline(TokenKind::Arrow) || self.check_inline(TokenKind::Colon) {
            self.advance();
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = self.parse_block()?;

        Ok(Function {
            name,
            type_params,
            params,
            return_type,
            body,
            span: self.span_from(start),
        })
    }

    /// `contract Name { @ GET /path -> Type ... }`; the `@` is optional
    fn parse_contract(&mut self, start: Span) -> GlyphResult<ContractDef> {
        self.expect(TokenKind::Contract)?;
        let name = self.expect_ident("contract name")?.lexeme;
        self.expect(TokenKind::LBrace)?;

        let mut endpoints: Vec<ContractEndpoint> = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            let endpoint_start = self.current().span;
            self.eat(TokenKind::At);
            let method = self.parse_http_method()?;
            let path = self.parse_route_path()?;
            let return_type = self.parse_return_arrow()?;

            let endpoint = ContractEndpoint {
                method,
                path,
                return_type,
                span: self.span_from(endpoint_start),
            };
            if endpoints.iter().any(|e| e.key() == endpoint.key()) {
                return Err(self.error_at(
                    format!("Duplicate endpoint {} in contract {}", endpoint.key(), name),
                    endpoint.span,
                ));
            }
            endpoints.push(endpoint);
            self.skip_commas();
        }
        self.expect(TokenKind::RBrace)?;

        Ok(ContractDef {
            name,
            endpoints,
            span: self.span_from(start),
        })
    }

    /// `import "path" [as alias]` or `from "path" import { a, b as c }`
    fn parse_import(&mut self, start: Span) -> GlyphResult<ImportDecl> {
        if self.eat(TokenKind::From) {
            let path = self.parse_import_path()?;
            self.expect(TokenKind::Import)?;
            self.expect(TokenKind::LBrace)?;

            let mut names = Vec::new();
            self.skip_commas();
            while !self.check(TokenKind::RBrace) && !self.is_at_end() {
                let name = self.expect_ident("imported name")?.lexeme;
                let alias = if self.eat(TokenKind::As) {
                    Some(self.expect_ident("alias")?.lexeme)
                } else {
                    None
                };
                names.push(ImportName { name, alias });
                self.skip_commas();
            }
            self.expect(TokenKind::RBrace)?;

            if names.is_empty() {
                return Err(self.error_at("Empty import list", self.span_from(start)));
            }

            return Ok(ImportDecl {
                path,
                alias: None,
                names,
                span: self.span_from(start),
            });
        }

        self.expect(TokenKind::Import)?;
        let path = self.parse_import_path()?;
        let alias = if self.check_inline(TokenKind::As) {
            self.advance();
            Some(self.expect_ident("module alias")?.lexeme)
        } else {
            None
        };

        Ok(ImportDecl {
            path,
            alias,
            names: Vec::new(),
            span: self.span_from(start),
        })
    }

    fn parse_import_path(&mut self) -> GlyphResult<String> {
        if self.check(TokenKind::Str) {
            Ok(self.advance().lexeme)
        } else {
            Err(self.error_with_hint(
                format!("Expected import path string, but found {}", self.describe_current()),
                "Imports are written as 'import \"./utils\"'",
            ))
        }
    }

    /// `const NAME [: Type] = value`
    fn parse_const(&mut self, start: Span) -> GlyphResult<ConstDecl> {
        self.expect(TokenKind::Const)?;
        let name = self.expect_ident("constant name")?.lexeme;
        let type_annotation = if self.eat(TokenKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(TokenKind::Assign)?;
        let value = self.parse_expression()?;

        Ok(ConstDecl {
            name,
            type_annotation,
            value,
            span: self.span_from(start),
        })
    }

    /// `a.b.c` as a single string
    fn parse_dotted_name(&mut self, what: &str) -> GlyphResult<String> {
        let mut name = self.expect_word(what)?;
        while self.check(TokenKind::Dot) && self.peek(1).word().is_some() {
            self.advance();
            name.push('.');
            name.push_str(&self.expect_word(what)?);
        }
        Ok(name)
    }
}
