//! Syntax tree for Glyph modules
//!
//! The parser builds this tree once; everything downstream (interpreter, contract
//! verification, documentation tooling) only reads it. Every item, statement and
//! expression carries the [`Span`] it was parsed from.

use crate::types::Type;
use serde::Serialize;
use std::fmt;

/// Span representing a location in source code
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub fn new(start: usize, end: usize, line: usize, col: usize) -> Self {
        Self {
            start,
            end,
            line,
            col,
        }
    }

    /// Smallest span covering both `self` and `other`, anchored at `self`'s position
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start,
            end: other.end.max(self.end),
            line: self.line,
            col: self.col,
        }
    }
}

/// One parsed source unit
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    /// Name from a `module` declaration, if present
    pub name: Option<String>,
    pub items: Vec<Item>,
}

impl Module {
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.items.iter().filter_map(|item| match item {
            Item::Route(route) => Some(route),
            _ => None,
        })
    }

    pub fn contracts(&self) -> impl Iterator<Item = &ContractDef> {
        self.items.iter().filter_map(|item| match item {
            Item::Contract(contract) => Some(contract),
            _ => None,
        })
    }

    /// Kind and key of every item, in declaration order.
    ///
    /// Two modules with equal outlines declare the same things in the same order,
    /// independent of which concrete syntax they were written in.
    pub fn outline(&self) -> Vec<ItemOutline> {
        self.items.iter().map(Item::outline).collect()
    }
}

/// Syntax-independent summary of one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutline {
    pub kind: &'static str,
    pub key: String,
    pub statements: usize,
}

impl fmt::Display for ItemOutline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({} statements)", self.kind, self.key, self.statements)
    }
}

/// Top-level declaration
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    TypeDef(TypeDef),
    Route(Route),
    Function(Function),
    Command(Command),
    CronTask(CronTask),
    EventHandler(EventHandler),
    QueueWorker(QueueWorker),
    Contract(ContractDef),
    Resolver(GraphQLResolver),
    Import(ImportDecl),
    Const(ConstDecl),
}

impl Item {
    pub fn span(&self) -> Span {
        match self {
            Item::TypeDef(it) => it.span,
            Item::Route(it) => it.span,
            Item::Function(it) => it.span,
            Item::Command(it) => it.span,
            Item::CronTask(it) => it.span,
            Item::EventHandler(it) => it.span,
            Item::QueueWorker(it) => it.span,
            Item::Contract(it) => it.span,
            Item::Resolver(it) => it.span,
            Item::Import(it) => it.span,
            Item::Const(it) => it.span,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Item::TypeDef(_) => "type",
            Item::Route(_) => "route",
            Item::Function(_) => "function",
            Item::Command(_) => "command",
            Item::CronTask(_) => "cron",
            Item::EventHandler(_) => "event",
            Item::QueueWorker(_) => "queue",
            Item::Contract(_) => "contract",
            Item::Resolver(_) => "resolver",
            Item::Import(_) => "import",
            Item::Const(_) => "const",
        }
    }

    pub fn outline(&self) -> ItemOutline {
        let (key, statements) = match self {
            Item::TypeDef(it) => (it.name.clone(), 0),
            Item::Route(it) => (it.key(), it.body.len()),
            Item::Function(it) => (it.name.clone(), it.body.len()),
            Item::Command(it) => (it.name.clone(), it.body.len()),
            Item::CronTask(it) => (it.key().to_string(), it.body.len()),
            Item::EventHandler(it) => (it.event_type.clone(), it.body.len()),
            Item::QueueWorker(it) => (it.queue_name.clone(), it.body.len()),
            Item::Contract(it) => (it.name.clone(), it.endpoints.len()),
            Item::Resolver(it) => (it.key(), it.body.len()),
            Item::Import(it) => (it.path.clone(), 0),
            Item::Const(it) => (it.name.clone(), 0),
        };
        ItemOutline {
            kind: self.kind_name(),
            key,
            statements,
        }
    }
}

/// Name, type annotation, required flag and optional default
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub type_annotation: Type,
    pub required: bool,
    pub default: Option<Expr>,
    pub span: Span,
}

impl Field {
    /// Whether a parameter declared with this field may be left out of a call
    pub fn is_optional(&self) -> bool {
        self.default.is_some() || matches!(self.type_annotation, Type::Optional(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    pub name: String,
    pub type_params: Vec<String>,
    pub fields: Vec<Field>,
    pub span: Span,
}

impl TypeDef {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "DELETE" => Some(HttpMethod::Delete),
            "PATCH" => Some(HttpMethod::Patch),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthConfig {
    pub auth_type: String,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateLimit {
    pub requests: u32,
    pub window: String,
}

/// Middleware other than auth and rate limiting, kept with its raw argument text
#[derive(Debug, Clone, PartialEq)]
pub struct Middleware {
    pub name: String,
    pub raw_args: String,
    pub span: Span,
}

/// `% name: Type`
#[derive(Debug, Clone, PartialEq)]
pub struct Injection {
    pub name: String,
    pub type_annotation: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryParamDecl {
    pub name: String,
    pub type_annotation: Type,
    pub required: bool,
    pub default: Option<Expr>,
    pub is_array: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub method: HttpMethod,
    pub path: String,
    /// Name and type from `< input: Type`
    pub input: Option<(String, Type)>,
    pub return_type: Option<Type>,
    pub auth: Option<AuthConfig>,
    pub rate_limit: Option<RateLimit>,
    pub query_params: Vec<QueryParamDecl>,
    pub middleware: Vec<Middleware>,
    pub injections: Vec<Injection>,
    pub body: Vec<Statement>,
    pub span: Span,
}

impl Route {
    /// Canonical `METHOD /path` key
    pub fn key(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Key used for registration and dispatch. Parameter names are erased, so
    /// `GET /users/:id` and `GET /users/:uid` claim the same slot.
    pub fn dispatch_key(&self) -> String {
        dispatch_key(self.method, &self.path)
    }

    /// Names of `:param` segments in declaration order
    pub fn path_params(&self) -> Vec<String> {
        self.path
            .split('/')
            .filter_map(|segment| segment.strip_prefix(':'))
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub type_params: Vec<String>,
    pub params: Vec<Field>,
    pub return_type: Option<Type>,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandParam {
    pub name: String,
    pub type_annotation: Type,
    pub required: bool,
    pub default: Option<Expr>,
    pub is_flag: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub description: Option<String>,
    pub params: Vec<CommandParam>,
    pub return_type: Option<Type>,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CronTask {
    pub name: Option<String>,
    pub schedule: String,
    pub timezone: Option<String>,
    pub retries: u32,
    pub injections: Vec<Injection>,
    pub body: Vec<Statement>,
    pub span: Span,
}

/// `METHOD /path` with every `:name` segment reduced to `:`
pub fn dispatch_key(method: HttpMethod, path: &str) -> String {
    let shape: Vec<&str> = path
        .split('/')
        .map(|segment| if segment.starts_with(':') { ":" } else { segment })
        .collect();
    format!("{} {}", method, shape.join("/"))
}

impl CronTask {
    /// Name if declared, otherwise the schedule string
    pub fn key(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.schedule)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventHandler {
    pub event_type: String,
    pub is_async: bool,
    pub injections: Vec<Injection>,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueWorker {
    pub queue_name: String,
    pub concurrency: u32,
    pub max_retries: u32,
    pub timeout: u32,
    pub injections: Vec<Injection>,
    pub body: Vec<Statement>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractEndpoint {
    pub method: HttpMethod,
    pub path: String,
    pub return_type: Option<Type>,
    pub span: Span,
}

impl ContractEndpoint {
    pub fn key(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractDef {
    pub name: String,
    pub endpoints: Vec<ContractEndpoint>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum GraphQLOperation {
    Query,
    Mutation,
    Subscription,
}

impl GraphQLOperation {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "query" => Some(GraphQLOperation::Query),
            "mutation" => Some(GraphQLOperation::Mutation),
            "subscription" => Some(GraphQLOperation::Subscription),
            _ => None,
        }
    }
}

impl fmt::Display for GraphQLOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GraphQLOperation::Query => "query",
            GraphQLOperation::Mutation => "mutation",
            GraphQLOperation::Subscription => "subscription",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphQLResolver {
    pub operation: GraphQLOperation,
    pub field_name: String,
    pub params: Vec<Field>,
    pub return_type: Option<Type>,
    pub injections: Vec<Injection>,
    pub body: Vec<Statement>,
    pub span: Span,
}

impl GraphQLResolver {
    pub fn key(&self) -> String {
        format!("{}.{}", self.operation, self.field_name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportName {
    pub name: String,
    pub alias: Option<String>,
}

impl ImportName {
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub path: String,
    pub alias: Option<String>,
    /// Empty for whole-module imports
    pub names: Vec<ImportName>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstDecl {
    pub name: String,
    pub type_annotation: Option<Type>,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Assign {
        target: AssignTarget,
        type_annotation: Option<Type>,
        value: Expr,
    },
    Return(Option<Expr>),
    If {
        condition: Expr,
        then_block: Vec<Statement>,
        else_block: Option<Vec<Statement>>,
    },
    While {
        condition: Expr,
        body: Vec<Statement>,
    },
    For {
        key_var: Option<String>,
        value_var: String,
        iterable: Expr,
        body: Vec<Statement>,
    },
    Switch {
        value: Expr,
        cases: Vec<SwitchCase>,
        default: Option<Vec<Statement>>,
    },
    Validate(Expr),
    Expression(Expr),
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub value: Expr,
    pub body: Vec<Statement>,
}

/// Left-hand side of an assignment: a variable followed by field/index steps
#[derive(Debug, Clone, PartialEq)]
pub struct AssignTarget {
    pub name: String,
    pub path: Vec<PathStep>,
}

impl AssignTarget {
    pub fn variable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathStep {
    Field(String),
    Index(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Variable(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// Call by (possibly dotted) name, e.g. `len(x)` or `users.find(id)`
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Object(Vec<(String, Expr)>),
    Array(Vec<Expr>),
    FieldAccess {
        object: Box<Expr>,
        field: String,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Lambda {
        params: Vec<Field>,
        body: LambdaBody,
    },
    Await(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LambdaBody {
    Expr(Box<Expr>),
    Block(Vec<Statement>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    /// Binding power for precedence climbing; higher binds tighter
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq | BinaryOp::NotEq => 3,
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => 4,
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 6,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
        })
    }
}
