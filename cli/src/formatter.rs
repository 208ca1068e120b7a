use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Row, Table};
use glyph::ast::{CommandParam, Field, Injection, Route};
use glyph::contract::{DiffResult, VerifyResult};
use glyph::{Interpreter, Item, Module, SyntaxMode, Type};
use std::path::PathBuf;

pub struct Formatter {}

impl Default for Formatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter {
    pub fn new() -> Self {
        Self {}
    }

    /// One table row per declaration, grouped by kind
    pub fn format_module(&self, interpreter: &Interpreter) -> String {
        let mut output = String::new();
        let title = match (interpreter.module_name(), interpreter.current_file()) {
            (Some(name), _) => format!("Module {}", name),
            (None, Some(path)) => format!("Module {}", path.display()),
            (None, None) => "Module".to_string(),
        };
        output.push_str(&title);
        output.push_str("\n\n");

        let registry = interpreter.registry();
        let mut rows: Vec<[String; 3]> = Vec::new();

        for def in registry.types.iter() {
            let fields: Vec<String> = def.fields.iter().map(format_field).collect();
            let name = if def.type_params.is_empty() {
                def.name.clone()
            } else {
                format!("{}<{}>", def.name, def.type_params.join(", "))
            };
            rows.push(["type".into(), name, fields.join(", ")]);
        }
        for route in registry.routes.iter() {
            rows.push(["route".into(), route.key(), describe_route(route)]);
        }
        for function in registry.functions.iter() {
            let params: Vec<String> = function.params.iter().map(format_field).collect();
            rows.push([
                "function".into(),
                function.name.clone(),
                with_return(format!("({})", params.join(", ")), function.return_type.as_ref()),
            ]);
        }
        for command in registry.commands.iter() {
            let params: Vec<String> = command.params.iter().map(format_command_param).collect();
            let mut detail = params.join(" ");
            if let Some(description) = &command.description {
                detail = format!("{} {}", quote(description), detail).trim_end().to_string();
            }
            rows.push(["command".into(), command.name.clone(), detail]);
        }
        for task in registry.cron_tasks.iter() {
            let mut detail = quote(&task.schedule);
            if let Some(tz) = &task.timezone {
                detail.push_str(&format!(" tz {}", tz));
            }
            if task.retries > 0 {
                detail.push_str(&format!(", {} retries", task.retries));
            }
            push_injections(&mut detail, &task.injections);
            rows.push(["cron".into(), task.key().to_string(), detail]);
        }
        for handler in registry.event_handlers.iter() {
            let mut detail = if handler.is_async {
                "async".to_string()
            } else {
                String::new()
            };
            push_injections(&mut detail, &handler.injections);
            rows.push(["event".into(), handler.event_type.clone(), detail]);
        }
        for worker in registry.queue_workers.iter() {
            let mut detail = format!(
                "concurrency {}, {} retries, timeout {}s",
                worker.concurrency, worker.max_retries, worker.timeout
            );
            push_injections(&mut detail, &worker.injections);
            rows.push(["queue".into(), worker.queue_name.clone(), detail]);
        }
        for contract in registry.contracts.iter() {
            let endpoints: Vec<String> = contract
                .endpoints
                .iter()
                .map(|e| with_return(e.key(), e.return_type.as_ref()))
                .collect();
            rows.push(["contract".into(), contract.name.clone(), endpoints.join("\n")]);
        }
        for resolver in registry.resolvers.iter() {
            let params: Vec<String> = resolver.params.iter().map(format_field).collect();
            rows.push([
                "resolver".into(),
                resolver.key(),
                with_return(format!("({})", params.join(", ")), resolver.return_type.as_ref()),
            ]);
        }

        if rows.is_empty() {
            output.push_str("No declarations.\n");
            return output;
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(Row::from(vec![
            Cell::new("Kind").set_alignment(CellAlignment::Left),
            Cell::new("Name").set_alignment(CellAlignment::Left),
            Cell::new("Details").set_alignment(CellAlignment::Left),
        ]));
        for [kind, name, detail] in rows {
            table.add_row(vec![Cell::new(kind), Cell::new(name), Cell::new(detail)]);
        }

        output.push_str(&table.to_string());
        output.push('\n');
        output
    }

    pub fn format_workspace_summary(&self, files: &[(PathBuf, Module)]) -> String {
        let mut output = String::new();
        let item_count: usize = files.iter().map(|(_, module)| module.items.len()).sum();
        output.push_str(&format!(
            "Workspace contains {} files, {} declarations\n\n",
            files.len(),
            item_count
        ));
        if files.is_empty() {
            return output;
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(Row::from(vec![
            Cell::new("File"),
            Cell::new("Syntax"),
            Cell::new("Types"),
            Cell::new("Routes"),
            Cell::new("Functions"),
            Cell::new("Other"),
        ]));

        for (path, module) in files {
            let count = |pred: fn(&Item) -> bool| module.items.iter().filter(|&i| pred(i)).count();
            let types = count(|i| matches!(i, Item::TypeDef(_)));
            let routes = count(|i| matches!(i, Item::Route(_)));
            let functions = count(|i| matches!(i, Item::Function(_)));
            let other = module.items.len() - types - routes - functions;
            let syntax = match SyntaxMode::from_path(path) {
                SyntaxMode::Compact => "compact",
                SyntaxMode::Expanded => "expanded",
            };
            table.add_row(vec![
                Cell::new(path.display()),
                Cell::new(syntax),
                Cell::new(types).set_alignment(CellAlignment::Right),
                Cell::new(routes).set_alignment(CellAlignment::Right),
                Cell::new(functions).set_alignment(CellAlignment::Right),
                Cell::new(other).set_alignment(CellAlignment::Right),
            ]);
        }

        output.push_str(&table.to_string());
        output.push('\n');
        output
    }

    pub fn format_verification(&self, results: &[VerifyResult]) -> String {
        let mut output = String::new();
        for result in results {
            if result.passed {
                output.push_str(&format!("✓ contract {} satisfied\n", result.contract_name));
                continue;
            }
            output.push_str(&format!(
                "✗ contract {}: {} violation(s)\n",
                result.contract_name,
                result.violations.len()
            ));
            for violation in &result.violations {
                output.push_str(&format!("  {}\n", violation));
            }
        }
        output
    }

    pub fn format_diffs(&self, diffs: &[(String, DiffResult)]) -> String {
        let mut output = String::new();
        for (name, diff) in diffs {
            if diff.changes.is_empty() {
                output.push_str(&format!("contract {}: no changes\n", name));
                continue;
            }
            let breaking = diff.breaking_changes().count();
            output.push_str(&format!(
                "contract {}: {} change(s), {} breaking\n",
                name,
                diff.changes.len(),
                breaking
            ));
            for change in &diff.changes {
                output.push_str(&format!("  {}\n", change));
            }
        }
        output
    }
}

fn format_field(field: &Field) -> String {
    let marker = if field.required { "!" } else { "" };
    let default = if field.default.is_some() { " = …" } else { "" };
    format!("{}: {}{}{}", field.name, field.type_annotation, marker, default)
}

fn format_command_param(param: &CommandParam) -> String {
    if param.is_flag {
        return format!("--{}", param.name);
    }
    let marker = if param.required { "!" } else { "" };
    format!("{}: {}{}", param.name, param.type_annotation, marker)
}

fn with_return(base: String, ret: Option<&Type>) -> String {
    match ret {
        Some(ty) => format!("{} -> {}", base, ty),
        None => base,
    }
}

fn describe_route(route: &Route) -> String {
    let mut parts = Vec::new();
    if let Some(ret) = &route.return_type {
        parts.push(format!("-> {}", ret));
    }
    if let Some((name, ty)) = &route.input {
        parts.push(format!("input {}: {}", name, ty));
    }
    if let Some(auth) = &route.auth {
        let optional = if auth.required { "" } else { " (optional)" };
        parts.push(format!("auth {}{}", auth.auth_type, optional));
    }
    if let Some(limit) = &route.rate_limit {
        parts.push(format!("rate {}/{}", limit.requests, limit.window));
    }
    if !route.query_params.is_empty() {
        let names: Vec<&str> = route.query_params.iter().map(|q| q.name.as_str()).collect();
        parts.push(format!("query {}", names.join(", ")));
    }
    let mut detail = parts.join(", ");
    push_injections(&mut detail, &route.injections);
    detail
}

fn push_injections(detail: &mut String, injections: &[Injection]) {
    if injections.is_empty() {
        return;
    }
    let names: Vec<String> = injections
        .iter()
        .map(|i| format!("{}: {}", i.name, i.type_annotation))
        .collect();
    if !detail.is_empty() {
        detail.push_str(", ");
    }
    detail.push_str(&format!("uses {}", names.join(", ")));
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text)
}
