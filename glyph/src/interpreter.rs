use crate::ast::{
    ConstDecl, ContractDef, CronTask, EventHandler, GraphQLOperation, GraphQLResolver, HttpMethod,
    ImportDecl, Injection, Item, LambdaBody, Module, QueueWorker, Route, Statement, StatementKind,
    TypeDef,
};
use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::evaluator::{typecheck, ControlSignal, Evaluator, Request, TimeoutTracker};
use crate::lexer::SyntaxMode;
use crate::modules::{self, ModuleResolver};
use crate::registry::{DuplicatePolicy, ModuleScope, Registry};
use crate::routing::{RouteMatch, RouteTable};
use crate::value::{Closure, Value};
use crate::{parser, GlyphError, GlyphResult, ResourceLimits};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Settings shared by an interpreter and every module it imports
#[derive(Debug, Clone, Default)]
pub struct InterpreterOptions {
    pub limits: ResourceLimits,
    pub duplicate_policy: DuplicatePolicy,
    /// Extra directories searched for non-relative imports
    pub search_paths: Vec<PathBuf>,
}

/// The Glyph interpreter.
///
/// Loads one module's declarations into registries and runs its entry points:
/// routes, commands, cron tasks, event handlers, queue workers and GraphQL
/// resolvers. Every entry point runs in a fresh child of the global scope.
pub struct Interpreter {
    options: InterpreterOptions,
    registry: Registry,
    globals: Environment,
    providers: HashMap<String, Value>,
    resolver: Rc<RefCell<ModuleResolver>>,
    current_file: Option<PathBuf>,
    module_name: Option<String>,
    mode: SyntaxMode,
    routes: RouteTable,
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("module_name", &self.module_name)
            .field("current_file", &self.current_file)
            .field("mode", &self.mode)
            .field("declarations", &self.registry.len())
            .field("globals", &self.globals)
            .finish_non_exhaustive()
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        self.globals.release();
        // Importers share the resolver; only the last one tears down cached modules
        if Rc::strong_count(&self.resolver) == 1 {
            self.resolver.borrow().release_modules();
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::with_options(InterpreterOptions::default())
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: InterpreterOptions) -> Self {
        let resolver = Rc::new(RefCell::new(ModuleResolver::new(options.search_paths.clone())));
        Self::with_resolver(options, resolver)
    }

    /// Create an interpreter with custom resource limits
    pub fn with_limits(limits: ResourceLimits) -> Self {
        Self::with_options(InterpreterOptions {
            limits,
            ..InterpreterOptions::default()
        })
    }

    pub(crate) fn with_resolver(
        options: InterpreterOptions,
        resolver: Rc<RefCell<ModuleResolver>>,
    ) -> Self {
        Self {
            options,
            registry: Registry::new(),
            globals: Environment::new(),
            providers: HashMap::new(),
            resolver,
            current_file: None,
            module_name: None,
            mode: SyntaxMode::Compact,
            routes: RouteTable::new(),
        }
    }

    pub fn options(&self) -> &InterpreterOptions {
        &self.options
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.options.limits
    }

    /// Parse `source` and load its declarations
    pub fn load_source(
        &mut self,
        source: &str,
        filename: Option<&str>,
        mode: SyntaxMode,
    ) -> GlyphResult<()> {
        let module = parser::parse(
            source,
            filename.map(str::to_string),
            mode,
            &self.options.limits,
        )?;
        self.mode = mode;
        self.load_module(&module)
    }

    /// Read, parse and load a file. Its syntax is chosen by extension.
    pub fn load_file(&mut self, path: &Path) -> GlyphResult<()> {
        let canonical = modules::canonicalize(path)?;
        self.resolver.borrow_mut().begin(&canonical)?;
        let result = self.load_dependency_file(path);
        self.resolver.borrow_mut().finish(&canonical);
        result
    }

    /// Load a file whose place on the import stack the caller manages
    pub(crate) fn load_dependency_file(&mut self, path: &Path) -> GlyphResult<()> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| GlyphError::Module(format!("cannot read {}: {}", path.display(), e)))?;
        self.current_file = Some(path.to_path_buf());
        self.load_source(&source, Some(&path.display().to_string()), SyntaxMode::from_path(path))
    }

    /// Register every item of `module` in declaration order.
    ///
    /// Imports and constants are evaluated as they are reached, so a constant
    /// may only use functions and imports declared above it.
    pub fn load_module(&mut self, module: &Module) -> GlyphResult<()> {
        if let Some(name) = &module.name {
            self.module_name = Some(name.clone());
        }

        for item in &module.items {
            match item {
                Item::Import(decl) => self.import(decl).map_err(|e| e.at(decl.span))?,
                Item::Const(decl) => self.define_const(decl).map_err(|e| e.at(decl.span))?,
                other => {
                    self.registry
                        .register(other, self.options.duplicate_policy)
                        .map_err(|e| GlyphError::from(e).at(other.span()))?;
                    if let Item::Route(route) = other {
                        self.routes.insert(route).map_err(|e| {
                            GlyphError::from(RuntimeError::UnsupportedOperation(format!(
                                "invalid route path {}: {}",
                                route.path, e
                            )))
                            .at(route.span)
                        })?;
                    }
                }
            }
        }

        debug!(
            module = self.module_name.as_deref().unwrap_or("<anonymous>"),
            items = module.items.len(),
            "module loaded"
        );
        Ok(())
    }

    fn import(&self, decl: &ImportDecl) -> GlyphResult<()> {
        let loaded = modules::load_import(
            &self.resolver,
            &decl.path,
            self.current_file.as_deref(),
            &self.options,
        )?;

        if decl.names.is_empty() {
            let binding = decl
                .alias
                .clone()
                .unwrap_or_else(|| modules::display_name(Path::new(&decl.path)));
            self.globals.define(binding, Value::Object(loaded.exports));
            return Ok(());
        }

        for name in &decl.names {
            let value = loaded.exports.get(&name.name).cloned().ok_or_else(|| {
                RuntimeError::NotFound {
                    kind: "export",
                    name: format!("{} in {}", name.name, decl.path),
                }
            })?;
            self.globals.define(name.local_name(), value);
        }
        Ok(())
    }

    fn define_const(&mut self, decl: &ConstDecl) -> GlyphResult<()> {
        if self.globals.is_constant(&decl.name)
            && self.options.duplicate_policy == DuplicatePolicy::Error
        {
            return Err(RuntimeError::Duplicate {
                kind: "constant",
                name: decl.name.clone(),
            }
            .into());
        }

        let timeout = TimeoutTracker::start(&self.options.limits);
        let mut evaluator = self.evaluator(&timeout);
        let value = evaluator.evaluate(&decl.value, &self.globals)?;
        if let Some(declared) = &decl.type_annotation {
            if !typecheck::conforms(&value, declared, &self.registry) {
                return Err(RuntimeError::TypeMismatch(format!(
                    "constant '{}' is declared as {}, got {}",
                    decl.name,
                    declared,
                    typecheck::infer_type(&value)
                ))
                .into());
            }
        }
        self.globals.define_constant(decl.name.clone(), value);
        Ok(())
    }

    fn evaluator<'a>(&'a self, timeout: &'a TimeoutTracker) -> Evaluator<'a> {
        Evaluator::new(&self.registry, self.globals.clone(), &self.options.limits, timeout)
    }

    /// Register a value for injection, by dependency name or by type name
    pub fn provide(&mut self, name_or_type: impl Into<String>, value: Value) {
        self.providers.insert(name_or_type.into(), value);
    }

    fn bind_injections(&self, injections: &[Injection], env: &Environment) {
        for injection in injections {
            let provided = self
                .providers
                .get(&injection.name)
                .or_else(|| self.providers.get(&injection.type_annotation.to_string()));
            let value = match provided {
                Some(value) => value.clone(),
                None => {
                    warn!(
                        dependency = %injection.name,
                        ty = %injection.type_annotation,
                        "no provider registered; injecting null"
                    );
                    Value::Null
                }
            };
            env.define(injection.name.clone(), value);
        }
    }

    /// Match a concrete request path against the loaded routes
    pub fn match_route(&self, method: HttpMethod, path: &str) -> RouteMatch {
        self.routes.lookup(method, path)
    }

    /// Route a concrete request to its handler and run it
    pub fn dispatch(&self, method: HttpMethod, path: &str, request: &Request) -> GlyphResult<Value> {
        trace!(%method, path, "dispatching request");
        match self.match_route(method, path) {
            RouteMatch::Found { key, params } => {
                let route = self.registry.routes.get(&key).ok_or_else(|| {
                    RuntimeError::NotFound {
                        kind: "route",
                        name: key.clone(),
                    }
                })?;
                self.execute_route(route, &params, request)
            }
            RouteMatch::MethodNotAllowed { .. } | RouteMatch::NotFound => Err(RuntimeError::NotFound {
                kind: "route",
                name: format!("{} {}", method, path),
            }
            .into()),
        }
    }

    /// Run a route handler with its path parameters and request data bound
    pub fn execute_route(
        &self,
        route: &Route,
        params: &BTreeMap<String, String>,
        request: &Request,
    ) -> GlyphResult<Value> {
        trace!(route = %route.key(), "executing route");
        let timeout = TimeoutTracker::start(&self.options.limits);
        let mut evaluator = self.evaluator(&timeout);
        let env = self.globals.child();

        for (name, value) in params {
            env.define(name.clone(), Value::string(value.clone()));
        }

        env.define("query", request.query_object());
        for param in &route.query_params {
            let raw = request.query.get(&param.name).filter(|values| !values.is_empty());
            let value = match raw {
                Some(values) if param.is_array => {
                    let element = match &param.type_annotation {
                        crate::types::Type::Array(element) => element.as_ref().clone(),
                        crate::types::Type::Optional(inner) => match inner.as_ref() {
                            crate::types::Type::Array(element) => element.as_ref().clone(),
                            other => other.clone(),
                        },
                        other => other.clone(),
                    };
                    values
                        .iter()
                        .map(|text| typecheck::coerce_scalar(text, &element))
                        .collect::<Result<Vec<_>, _>>()
                        .map(Value::Array)?
                }
                Some(values) => typecheck::coerce_scalar(&values[0], &param.type_annotation)?,
                None => match &param.default {
                    Some(default) => evaluator.evaluate(default, &env)?,
                    None if param.required => {
                        return Err(RuntimeError::MissingRequiredParam(param.name.clone()).into())
                    }
                    None => Value::Null,
                },
            };
            env.define(param.name.clone(), value);
        }

        if let Some((name, declared)) = &route.input {
            let body = request.body.clone().unwrap_or_default();
            if !typecheck::conforms(&body, declared, &self.registry) {
                return Err(RuntimeError::TypeMismatch(format!(
                    "input '{}' of {} expects {}, got {}",
                    name,
                    route.key(),
                    declared,
                    typecheck::infer_type(&body)
                ))
                .into());
            }
            env.define(name.clone(), body);
        }

        if route.auth.is_some() {
            env.define("auth", request.auth.clone().unwrap_or_default());
        }

        env.define(
            "request",
            Value::object([
                ("method", Value::string(route.method.as_str())),
                ("path", Value::string(concrete_path(&route.path, params))),
                ("headers", request.headers_object()),
                ("body", request.body.clone().unwrap_or_default()),
            ]),
        );

        self.bind_injections(&route.injections, &env);

        let value = evaluator.run_body(&route.body, &env)?;
        if let Some(declared) = &route.return_type {
            evaluator.check_return(&format!("route {}", route.key()), declared, &value)?;
        }
        Ok(value)
    }

    /// Run a CLI command with positional arguments and `--flag` values
    pub fn execute_command(
        &self,
        name: &str,
        positional: &[String],
        flags: &BTreeMap<String, String>,
    ) -> GlyphResult<Value> {
        trace!(command = name, "executing command");
        let command = self.registry.commands.get(name).ok_or_else(|| RuntimeError::NotFound {
            kind: "command",
            name: name.to_string(),
        })?;

        if let Some(unknown) = flags
            .keys()
            .find(|flag| !command.params.iter().any(|p| p.is_flag && &p.name == *flag))
        {
            return Err(RuntimeError::NotFound {
                kind: "flag",
                name: format!("--{}", unknown),
            }
            .into());
        }

        let positional_params = command.params.iter().filter(|p| !p.is_flag).count();
        if positional.len() > positional_params {
            return Err(RuntimeError::ArityMismatch {
                name: command.name.clone(),
                expected: positional_params,
                actual: positional.len(),
            }
            .into());
        }

        let timeout = TimeoutTracker::start(&self.options.limits);
        let mut evaluator = self.evaluator(&timeout);
        let env = self.globals.child();
        let mut remaining = positional.iter();

        for param in &command.params {
            let raw = if param.is_flag {
                flags.get(&param.name)
            } else {
                remaining.next()
            };
            let value = match raw {
                Some(text) if param.is_flag && text.is_empty() => Value::Bool(true),
                Some(text) => typecheck::coerce_scalar(text, &param.type_annotation)?,
                None => match &param.default {
                    Some(default) => evaluator.evaluate(default, &env)?,
                    None if param.required => {
                        return Err(RuntimeError::MissingRequiredParam(param.name.clone()).into())
                    }
                    None if param.is_flag => Value::Bool(false),
                    None => Value::Null,
                },
            };
            env.define(param.name.clone(), value);
        }

        let value = evaluator.run_body(&command.body, &env)?;
        if let Some(declared) = &command.return_type {
            evaluator.check_return(&format!("command {}", command.name), declared, &value)?;
        }
        Ok(value)
    }

    /// Run a cron task once, looked up by name or schedule
    pub fn execute_cron_task(&self, name_or_schedule: &str) -> GlyphResult<Value> {
        trace!(task = name_or_schedule, "executing cron task");
        let task = self
            .registry
            .cron_task(name_or_schedule)
            .ok_or_else(|| RuntimeError::NotFound {
                kind: "cron task",
                name: name_or_schedule.to_string(),
            })?;
        self.run_handler(&task.injections, &task.body, &[])
    }

    /// Deliver an event to its handler; `event` and `input` are bound to `data`
    pub fn emit_event(&self, event_type: &str, data: Value) -> GlyphResult<Value> {
        trace!(event = event_type, "emitting event");
        let handler = self
            .registry
            .event_handlers
            .get(event_type)
            .ok_or_else(|| RuntimeError::NotFound {
                kind: "event handler",
                name: event_type.to_string(),
            })?;
        self.run_handler(
            &handler.injections,
            &handler.body,
            &[("event", data.clone()), ("input", data)],
        )
    }

    /// Process one queue message; `message` and `input` are bound to it
    pub fn execute_queue_worker(&self, queue: &str, message: Value) -> GlyphResult<Value> {
        trace!(queue, "executing queue worker");
        let worker = self
            .registry
            .queue_workers
            .get(queue)
            .ok_or_else(|| RuntimeError::NotFound {
                kind: "queue worker",
                name: queue.to_string(),
            })?;
        self.run_handler(
            &worker.injections,
            &worker.body,
            &[("message", message.clone()), ("input", message)],
        )
    }

    fn run_handler(
        &self,
        injections: &[Injection],
        body: &[Statement],
        bindings: &[(&str, Value)],
    ) -> GlyphResult<Value> {
        let timeout = TimeoutTracker::start(&self.options.limits);
        let mut evaluator = self.evaluator(&timeout);
        let env = self.globals.child();
        for (name, value) in bindings {
            env.define(*name, value.clone());
        }
        self.bind_injections(injections, &env);
        evaluator.run_body(body, &env)
    }

    /// Resolve a GraphQL field. Arguments are matched to parameters by name and
    /// also bound together as `args`.
    pub fn execute_resolver(
        &self,
        operation: GraphQLOperation,
        field: &str,
        args: &BTreeMap<String, Value>,
    ) -> GlyphResult<Value> {
        trace!(%operation, field, "executing resolver");
        let resolver = self
            .registry
            .resolver(operation, field)
            .ok_or_else(|| RuntimeError::NotFound {
                kind: "resolver",
                name: format!("{}.{}", operation, field),
            })?;

        let timeout = TimeoutTracker::start(&self.options.limits);
        let mut evaluator = self.evaluator(&timeout);
        let env = self.globals.child();
        env.define("args", Value::Object(args.clone()));

        for param in &resolver.params {
            let value = match args.get(&param.name) {
                Some(value) => value.clone(),
                None => match &param.default {
                    Some(default) => evaluator.evaluate(default, &env)?,
                    None if param.is_optional() => Value::Null,
                    None => {
                        return Err(RuntimeError::MissingRequiredParam(param.name.clone()).into())
                    }
                },
            };
            if !typecheck::conforms(&value, &param.type_annotation, &self.registry) {
                return Err(RuntimeError::TypeMismatch(format!(
                    "argument '{}' of {} expects {}, got {}",
                    param.name,
                    resolver.key(),
                    param.type_annotation,
                    typecheck::infer_type(&value)
                ))
                .into());
            }
            env.define(param.name.clone(), value);
        }
        self.bind_injections(&resolver.injections, &env);

        let value = evaluator.run_body(&resolver.body, &env)?;
        if let Some(declared) = &resolver.return_type {
            evaluator.check_return(&format!("resolver {}", resolver.key()), declared, &value)?;
        }
        Ok(value)
    }

    /// Call a declared or imported function by name
    pub fn call_function(&self, name: &str, args: Vec<Value>) -> GlyphResult<Value> {
        let timeout = TimeoutTracker::start(&self.options.limits);
        let mut evaluator = self.evaluator(&timeout);
        if let Some(function) = self.registry.functions.get(name) {
            let closure = evaluator.function_closure(function);
            return evaluator.call_closure(&closure, args);
        }
        match self.globals.lookup(name) {
            Some(callee @ (Value::Function(_) | Value::Builtin(_))) => {
                evaluator.call_value(&callee, args)
            }
            _ => Err(RuntimeError::UndefinedFunction(name.to_string()).into()),
        }
    }

    /// Evaluate one expression in the global scope
    pub fn evaluate_source(&self, source: &str) -> GlyphResult<Value> {
        let expr = parser::parse_expression(source, self.mode)?;
        let timeout = TimeoutTracker::start(&self.options.limits);
        let mut evaluator = self.evaluator(&timeout);
        evaluator
            .evaluate(&expr, &self.globals)
            .map_err(|e| e.at(expr.span))
    }

    /// Execute statements in the global scope, keeping their bindings.
    ///
    /// Yields the value of a `return`, or else of the last expression statement.
    pub fn execute_source(&self, source: &str) -> GlyphResult<Value> {
        let statements = parser::parse_statements(source, self.mode)?;
        let timeout = TimeoutTracker::start(&self.options.limits);
        let mut evaluator = self.evaluator(&timeout);
        let mut last = Value::Null;

        for statement in &statements {
            if let StatementKind::Expression(expr) = &statement.kind {
                last = evaluator
                    .evaluate(expr, &self.globals)
                    .map_err(|e| e.at(statement.span))?;
                continue;
            }
            match evaluator.execute(statement, &self.globals)? {
                ControlSignal::Normal => last = Value::Null,
                ControlSignal::Return(value) => return Ok(value),
                ControlSignal::Break => {
                    return Err(GlyphError::from(RuntimeError::InvalidControlFlow("break"))
                        .at(statement.span))
                }
                ControlSignal::Continue => {
                    return Err(GlyphError::from(RuntimeError::InvalidControlFlow("continue"))
                        .at(statement.span))
                }
            }
        }
        Ok(last)
    }

    /// Hand the loaded module over to an importer: its scope plus the functions
    /// and constants it exports
    pub fn into_exports(mut self) -> (Rc<ModuleScope>, BTreeMap<String, Value>) {
        let scope = Rc::new(ModuleScope {
            registry: std::mem::take(&mut self.registry),
            globals: std::mem::take(&mut self.globals),
        });

        let mut exports: BTreeMap<String, Value> = scope
            .globals
            .get_all()
            .into_iter()
            .filter(|(name, _)| scope.globals.is_constant(name))
            .collect();

        for function in scope.registry.functions.iter() {
            let closure = Closure {
                name: Some(function.name.clone()),
                params: function.params.clone(),
                return_type: function.return_type.clone(),
                body: LambdaBody::Block(function.body.clone()),
                env: scope.globals.clone(),
                home: Some(Rc::clone(&scope)),
            };
            exports.insert(function.name.clone(), Value::Function(Rc::new(closure)));
        }

        (scope, exports)
    }

    /// Drop every declaration and global binding
    pub fn reset(&mut self) {
        self.registry = Registry::new();
        self.globals.release();
        self.globals = Environment::new();
        self.routes = RouteTable::new();
        self.module_name = None;
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn globals(&self) -> &Environment {
        &self.globals
    }

    pub fn module_name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }

    pub fn mode(&self) -> SyntaxMode {
        self.mode
    }

    /// Syntax used by `evaluate_source` and `execute_source`
    pub fn set_mode(&mut self, mode: SyntaxMode) {
        self.mode = mode;
    }

    pub fn get_route(&self, method: HttpMethod, path: &str) -> Option<&Route> {
        self.registry.route(method, path)
    }

    pub fn get_routes(&self) -> Vec<&Route> {
        self.registry.routes.iter().collect()
    }

    pub fn get_contract(&self, name: &str) -> Option<&ContractDef> {
        self.registry.contracts.get(name)
    }

    pub fn get_contracts(&self) -> Vec<&ContractDef> {
        self.registry.contracts.iter().collect()
    }

    pub fn get_type_def(&self, name: &str) -> Option<&TypeDef> {
        self.registry.types.get(name)
    }

    pub fn get_type_defs(&self) -> Vec<&TypeDef> {
        self.registry.types.iter().collect()
    }

    pub fn get_graphql_resolvers(&self) -> Vec<&GraphQLResolver> {
        self.registry.resolvers.iter().collect()
    }

    pub fn get_cron_tasks(&self) -> Vec<&CronTask> {
        self.registry.cron_tasks.iter().collect()
    }

    pub fn get_event_handlers(&self) -> Vec<&EventHandler> {
        self.registry.event_handlers.iter().collect()
    }

    pub fn get_queue_workers(&self) -> Vec<&QueueWorker> {
        self.registry.queue_workers.iter().collect()
    }
}

/// `/users/:id` with `id = 7` becomes `/users/7`
fn concrete_path(template: &str, params: &BTreeMap<String, String>) -> String {
    template
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => params.get(name).map(String::as_str).unwrap_or(segment),
            None => segment,
        })
        .collect::<Vec<_>>()
        .join("/")
}
