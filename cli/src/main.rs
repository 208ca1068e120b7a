mod error_formatter;
mod formatter;
mod interactive;
mod server;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use error_formatter::SourceError;
use formatter::Formatter;
use glyph::contract::{self, VerifyResult};
use glyph::{GlyphResult, GraphQLOperation, HttpMethod, Interpreter, Request, SyntaxMode, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "glyph")]
#[command(about = "Backend services in a few lines.")]
#[command(
    long_about = "Glyph is a small language for HTTP routes, CLI commands, scheduled tasks, event handlers, queue workers and GraphQL resolvers.\nThe CLI runs .glyph and .glyphx files, inspects their declarations, checks API contracts and serves routes over HTTP."
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one entry point of a module and print its result as JSON
    ///
    /// Exactly one of --route, --command, --event, --cron, --queue or --resolver selects
    /// what runs. Remaining arguments are passed to a command: positional values first,
    /// then --flag or --flag=value pairs.
    #[command(group(
        ArgGroup::new("entry")
            .required(true)
            .args(["route", "command", "event", "cron", "queue", "resolver"])
    ))]
    Run {
        /// Source file (.glyph for compact syntax, .glyphx for expanded)
        file: PathBuf,
        /// Route to dispatch, e.g. "GET /users/42"
        #[arg(long, value_name = "METHOD PATH")]
        route: Option<String>,
        /// Command to run
        #[arg(long, value_name = "NAME")]
        command: Option<String>,
        /// Event type to emit
        #[arg(long, value_name = "TYPE")]
        event: Option<String>,
        /// Cron task to run once, by name or schedule
        #[arg(long, value_name = "NAME")]
        cron: Option<String>,
        /// Queue whose worker receives --data as its message
        #[arg(long, value_name = "QUEUE")]
        queue: Option<String>,
        /// GraphQL resolver, e.g. "query.user"; --data holds its arguments
        #[arg(long, value_name = "OPERATION.FIELD")]
        resolver: Option<String>,
        /// JSON payload: event data, queue message, resolver arguments or request body
        #[arg(long, value_name = "JSON")]
        data: Option<String>,
        /// Query parameter for --route (repeatable, name=value)
        #[arg(short = 'q', long = "query", value_name = "NAME=VALUE")]
        query: Vec<String>,
        /// Request header for --route (repeatable, name=value)
        #[arg(short = 'H', long = "header", value_name = "NAME=VALUE")]
        headers: Vec<String>,
        /// Authenticated principal for --route, as JSON
        #[arg(long, value_name = "JSON")]
        auth: Option<String>,
        /// Arguments for --command
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Show every declaration of a module
    Show {
        /// Source file to inspect
        file: PathBuf,
    },
    /// List all .glyph and .glyphx files below a directory with item counts
    List {
        /// Directory to scan
        #[arg(default_value = ".")]
        root: PathBuf,
    },
    /// Check routes against the contracts declared in a module
    ///
    /// Exits with a non-zero status when any endpoint is missing or returns an
    /// incompatible type.
    Verify {
        /// Source file declaring routes and contracts
        file: PathBuf,
        /// Only check this contract
        #[arg(short, long, value_name = "NAME")]
        contract: Option<String>,
    },
    /// Compare the contracts of two module versions
    ///
    /// Contracts are paired by name. Exits with a non-zero status when a change breaks
    /// existing consumers.
    Diff {
        /// Previous version
        old: PathBuf,
        /// New version
        new: PathBuf,
        /// Only compare this contract
        #[arg(short, long, value_name = "NAME")]
        contract: Option<String>,
    },
    /// Print a compact source file in expanded syntax
    Expand {
        file: PathBuf,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print an expanded source file in compact syntax
    Compact {
        file: PathBuf,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Serve the routes of a module over HTTP (default: localhost:3000)
    ///
    /// Every request runs against a freshly loaded interpreter. Responses are the
    /// JSON rendering of the handler's result.
    Serve {
        file: PathBuf,
        /// Host address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port number to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Start an interactive session
    Repl {
        /// Module to load before the first prompt
        #[arg(short, long)]
        load: Option<PathBuf>,
        /// Read expanded syntax instead of compact
        #[arg(long)]
        expanded: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if !matches!(cli.command, Commands::Serve { .. }) {
        init_logging(None);
    }

    let result = match cli.command {
        Commands::Run {
            file,
            route,
            command,
            event,
            cron,
            queue,
            resolver,
            data,
            query,
            headers,
            auth,
            args,
        } => {
            let entry = if let Some(route) = route {
                Entry::Route {
                    target: route,
                    query,
                    headers,
                    auth,
                }
            } else if let Some(name) = command {
                Entry::Command { name, args }
            } else if let Some(event_type) = event {
                Entry::Event(event_type)
            } else if let Some(name) = cron {
                Entry::Cron(name)
            } else if let Some(name) = queue {
                Entry::Queue(name)
            } else if let Some(target) = resolver {
                Entry::Resolver(target)
            } else {
                unreachable!("clap requires one entry point")
            };
            run_command(&file, entry, data.as_deref())
        }
        Commands::Show { file } => show_command(&file),
        Commands::List { root } => list_command(&root),
        Commands::Verify { file, contract } => verify_command(&file, contract.as_deref()),
        Commands::Diff { old, new, contract } => diff_command(&old, &new, contract.as_deref()),
        Commands::Expand { file, output } => convert_command(&file, output.as_deref(), true),
        Commands::Compact { file, output } => convert_command(&file, output.as_deref(), false),
        Commands::Serve { file, host, port } => serve_command(&file, &host, port),
        Commands::Repl { load, expanded } => {
            let mode = if expanded {
                SyntaxMode::Expanded
            } else {
                SyntaxMode::Compact
            };
            interactive::run_repl(load.as_deref(), mode)
        }
    };

    if let Err(e) = result {
        if let Some(located) = e.downcast_ref::<SourceError>() {
            eprintln!("{}", error_formatter::format_located(located));
        } else if let Some(glyph_err) = e.downcast_ref::<glyph::GlyphError>() {
            eprintln!("{}", error_formatter::format_error(glyph_err));
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

/// Install the fmt subscriber. Without a default filter, logging stays off
/// unless GLYPH_LOG is set.
pub(crate) fn init_logging(default_filter: Option<&str>) {
    let filter = match (EnvFilter::try_from_env("GLYPH_LOG"), default_filter) {
        (Ok(filter), _) => filter,
        (Err(_), Some(default)) => EnvFilter::new(default),
        (Err(_), None) => return,
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

enum Entry {
    Route {
        target: String,
        query: Vec<String>,
        headers: Vec<String>,
        auth: Option<String>,
    },
    Command {
        name: String,
        args: Vec<String>,
    },
    Event(String),
    Cron(String),
    Queue(String),
    Resolver(String),
}

fn run_command(file: &Path, entry: Entry, data: Option<&str>) -> Result<()> {
    let (interpreter, source) = load_module(file)?;
    let data = data.map(parse_json).transpose()?;

    let result: GlyphResult<Value> = match entry {
        Entry::Route {
            target,
            query,
            headers,
            auth,
        } => {
            let (method, path) = parse_route_target(&target)?;
            let mut request = Request::new();
            for pair in &query {
                let (name, value) = split_pair(pair)?;
                request = request.with_query(name, value);
            }
            for pair in &headers {
                let (name, value) = split_pair(pair)?;
                request = request.with_header(name, value);
            }
            if let Some(body) = data {
                request = request.with_body(body);
            }
            if let Some(principal) = auth {
                request = request.with_auth(parse_json(&principal)?);
            }
            interpreter.dispatch(method, path, &request)
        }
        Entry::Command { name, args } => {
            let (positional, flags) = split_command_args(&args);
            interpreter.execute_command(&name, &positional, &flags)
        }
        Entry::Event(event_type) => {
            interpreter.emit_event(&event_type, data.unwrap_or_default())
        }
        Entry::Cron(name) => interpreter.execute_cron_task(&name),
        Entry::Queue(queue) => interpreter.execute_queue_worker(&queue, data.unwrap_or_default()),
        Entry::Resolver(target) => {
            let (operation, field) = parse_resolver_target(&target)?;
            let args = match data {
                Some(Value::Object(fields)) => fields,
                Some(other) => anyhow::bail!(
                    "resolver arguments must be a JSON object, got {}",
                    other.type_name()
                ),
                None => BTreeMap::new(),
            };
            interpreter.execute_resolver(operation, field, &args)
        }
    };

    let value = result.map_err(|e| source.error(e))?;
    println!("{}", serde_json::to_string_pretty(&value.to_json())?);
    Ok(())
}

fn show_command(file: &Path) -> Result<()> {
    let (interpreter, _) = load_module(file)?;
    let formatter = Formatter::default();
    print!("{}", formatter.format_module(&interpreter));
    Ok(())
}

fn list_command(root: &Path) -> Result<()> {
    println!("Scanning {}...", root.display());

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !is_glyph_file(path) {
            continue;
        }
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let source = SourceFile::new(path, text);
        let module = glyph::parse(
            &source.text,
            Some(source.id.clone()),
            SyntaxMode::from_path(path),
            &glyph::ResourceLimits::default(),
        )
        .map_err(|e| source.error(e))?;
        files.push((path.to_path_buf(), module));
    }

    println!();
    let formatter = Formatter::default();
    print!("{}", formatter.format_workspace_summary(&files));
    Ok(())
}

fn verify_command(file: &Path, only: Option<&str>) -> Result<()> {
    let (interpreter, _) = load_module(file)?;

    let contracts = match only {
        Some(name) => vec![interpreter
            .get_contract(name)
            .with_context(|| format!("contract '{}' not found in {}", name, file.display()))?],
        None => interpreter.get_contracts(),
    };
    if contracts.is_empty() {
        anyhow::bail!("no contracts declared in {}", file.display());
    }

    let results: Vec<VerifyResult> = contracts
        .into_iter()
        .map(|c| contract::verify_routes(c, interpreter.get_routes()))
        .collect();

    let formatter = Formatter::default();
    print!("{}", formatter.format_verification(&results));

    let failed = results.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        anyhow::bail!("{} of {} contract(s) failed verification", failed, results.len());
    }
    Ok(())
}

fn diff_command(old: &Path, new: &Path, only: Option<&str>) -> Result<()> {
    let (before, _) = load_module(old)?;
    let (after, _) = load_module(new)?;

    let mut pairs = Vec::new();
    for contract in before.get_contracts() {
        if only.is_some_and(|name| name != contract.name) {
            continue;
        }
        match after.get_contract(&contract.name) {
            Some(updated) => pairs.push((contract.name.clone(), contract::diff(contract, updated))),
            None => println!("contract '{}' was removed", contract.name),
        }
    }
    if let Some(name) = only {
        if pairs.is_empty() {
            anyhow::bail!("contract '{}' is not declared in both versions", name);
        }
    }

    let formatter = Formatter::default();
    print!("{}", formatter.format_diffs(&pairs));

    if pairs.iter().any(|(_, diff)| diff.is_breaking()) {
        anyhow::bail!("breaking contract changes detected");
    }
    Ok(())
}

fn convert_command(file: &Path, output: Option<&Path>, expand: bool) -> Result<()> {
    let text =
        fs::read_to_string(file).with_context(|| format!("cannot read {}", file.display()))?;
    let converted = if expand {
        glyph::expand_source(&text)
    } else {
        glyph::compact_source(&text)
    };

    match output {
        Some(path) => fs::write(path, converted)
            .with_context(|| format!("cannot write {}", path.display()))?,
        None => print!("{}", converted),
    }
    Ok(())
}

fn serve_command(file: &Path, host: &str, port: u16) -> Result<()> {
    #[cfg(feature = "server")]
    {
        init_logging(Some("glyph=info,tower_http=info"));

        // Surface syntax errors before binding the socket
        let (interpreter, _) = load_module(file)?;
        println!(
            "Serving {} route(s) from {}",
            interpreter.get_routes().len(),
            file.display()
        );
        drop(interpreter);

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(server::http::start_server(file.to_path_buf(), host, port))?;
    }

    #[cfg(not(feature = "server"))]
    {
        let _ = (file, host, port);
        eprintln!("Error: Server feature not enabled");
        eprintln!("Recompile with: cargo build --features server");
        std::process::exit(1);
    }

    Ok(())
}

/// Source text kept around so runtime errors can point into it
pub(crate) struct SourceFile {
    pub id: String,
    pub text: String,
}

impl SourceFile {
    pub fn new(path: &Path, text: String) -> Self {
        Self {
            id: path.display().to_string(),
            text,
        }
    }

    pub fn error(&self, error: glyph::GlyphError) -> anyhow::Error {
        SourceError {
            error,
            source_id: self.id.clone(),
            source_text: self.text.clone(),
        }
        .into()
    }
}

pub(crate) fn load_module(file: &Path) -> Result<(Interpreter, SourceFile)> {
    let text =
        fs::read_to_string(file).with_context(|| format!("cannot read {}", file.display()))?;
    let source = SourceFile::new(file, text);
    let mut interpreter = Interpreter::new();
    interpreter.load_file(file).map_err(|e| source.error(e))?;
    Ok((interpreter, source))
}

fn is_glyph_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| glyph::modules::EXTENSIONS.contains(&ext))
}

fn parse_json(text: &str) -> Result<Value> {
    let json: serde_json::Value =
        serde_json::from_str(text).with_context(|| format!("invalid JSON: {}", text))?;
    Ok(Value::from_json(&json))
}

/// "GET /users/1" or "/users/1" (GET is implied)
fn parse_route_target(target: &str) -> Result<(HttpMethod, &str)> {
    let target = target.trim();
    match target.split_once(char::is_whitespace) {
        Some((method, path)) => {
            let method = HttpMethod::parse(method)
                .with_context(|| format!("unknown HTTP method '{}'", method))?;
            Ok((method, path.trim()))
        }
        None if target.starts_with('/') => Ok((HttpMethod::Get, target)),
        None => anyhow::bail!("expected a route like \"GET /path\", got '{}'", target),
    }
}

fn parse_resolver_target(target: &str) -> Result<(GraphQLOperation, &str)> {
    let (operation, field) = target
        .split_once('.')
        .with_context(|| format!("expected OPERATION.FIELD, got '{}'", target))?;
    let operation = GraphQLOperation::parse(operation).with_context(|| {
        format!(
            "unknown operation '{}' (expected query, mutation or subscription)",
            operation
        )
    })?;
    Ok((operation, field))
}

fn split_pair(pair: &str) -> Result<(&str, &str)> {
    pair.split_once('=')
        .with_context(|| format!("expected NAME=VALUE, got '{}'", pair))
}

/// Positional values in order, then `--flag value`, `--flag=value` or a bare `--flag`.
/// Bare flags map to an empty string, which commands read as `true`.
fn split_command_args(args: &[String]) -> (Vec<String>, BTreeMap<String, String>) {
    let mut positional = Vec::new();
    let mut flags = BTreeMap::new();
    let mut iter = args.iter().peekable();

    while let Some(arg) = iter.next() {
        let Some(flag) = arg.strip_prefix("--") else {
            positional.push(arg.clone());
            continue;
        };
        if let Some((name, value)) = flag.split_once('=') {
            flags.insert(name.to_string(), value.to_string());
        } else if let Some(value) = iter.next_if(|next| !next.starts_with("--")) {
            flags.insert(flag.to_string(), value.clone());
        } else {
            flags.insert(flag.to_string(), String::new());
        }
    }

    (positional, flags)
}
