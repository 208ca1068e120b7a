use crate::error_formatter::{self, SourceError};
use anyhow::{Context, Result};
use glyph::evaluator::typecheck::infer_type;
use glyph::{tokenize, GlyphError, Interpreter, SyntaxMode, TokenKind, Value};
use inquire::error::InquireError;
use inquire::Text;
use std::io::{BufRead, IsTerminal};
use std::path::Path;

const HELP: &str = "\
Enter an expression, a statement or a declaration. Blocks may span several lines.

Commands:
  :help            show this help
  :quit            leave the session
  :vars            list global variables
  :functions       list declared functions
  :types           list declared types
  :type <expr>     show the inferred type of an expression
  :load <file>     load a .glyph or .glyphx file
  :reset           forget everything declared so far";

/// What the session should do after a line has been handled
#[derive(Debug, PartialEq)]
pub enum Step {
    Continue(Option<String>),
    Quit,
}

pub struct Repl {
    interpreter: Interpreter,
    mode: SyntaxMode,
}

impl Repl {
    pub fn new(mode: SyntaxMode) -> Self {
        let mut interpreter = Interpreter::new();
        interpreter.set_mode(mode);
        Self { interpreter, mode }
    }

    /// Handle one complete input. Errors are rendered into the returned text.
    pub fn handle(&mut self, input: &str) -> Step {
        let input = input.trim();
        if input.is_empty() {
            return Step::Continue(None);
        }
        if let Some(command) = input.strip_prefix(':') {
            if !command.starts_with(char::is_whitespace) && !command.is_empty() {
                return self.handle_command(command);
            }
        }
        Step::Continue(Some(self.evaluate(input)))
    }

    fn handle_command(&mut self, command: &str) -> Step {
        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };

        let output = match name {
            "help" | "h" => HELP.to_string(),
            "quit" | "q" | "exit" => return Step::Quit,
            "vars" => self.list_vars(),
            "functions" => self.list_functions(),
            "types" => self.list_types(),
            "type" if arg.is_empty() => "usage: :type <expr>".to_string(),
            "type" => match self.interpreter.evaluate_source(arg) {
                Ok(value) => infer_type(&value).to_string(),
                Err(e) => render(e, arg),
            },
            "load" if arg.is_empty() => "usage: :load <file>".to_string(),
            "load" => self.load(Path::new(arg)),
            "reset" => {
                self.interpreter.reset();
                self.interpreter.set_mode(self.mode);
                "Session cleared.".to_string()
            }
            other => format!("unknown command ':{}' (try :help)", other),
        };
        Step::Continue(Some(output))
    }

    fn evaluate(&mut self, input: &str) -> String {
        if self.looks_like_declaration(input) {
            return match self.interpreter.load_source(input, Some("<repl>"), self.mode) {
                Ok(()) => "ok".to_string(),
                Err(e) => render(e, input),
            };
        }

        match self.interpreter.evaluate_source(input) {
            Ok(value) => return value.to_string(),
            Err(e) if !e.is_syntax() => return render(e, input),
            Err(_) => {}
        }
        match self.interpreter.execute_source(input) {
            Ok(Value::Null) => String::new(),
            Ok(value) => value.to_string(),
            Err(e) => render(e, input),
        }
    }

    /// Directive symbols also start expressions (`!done`), so they only count when a
    /// block follows
    fn looks_like_declaration(&self, input: &str) -> bool {
        let Ok(tokens) = tokenize(input, self.mode) else {
            return false;
        };
        let has_block = tokens.iter().any(|token| token.kind == TokenKind::LBrace);
        tokens.first().is_some_and(|token| match token.kind {
            TokenKind::Import | TokenKind::Module | TokenKind::Const | TokenKind::Contract => true,
            TokenKind::At
            | TokenKind::Colon
            | TokenKind::Bang
            | TokenKind::Star
            | TokenKind::Tilde
            | TokenKind::Ampersand
            | TokenKind::Func => has_block,
            _ => false,
        })
    }

    fn list_vars(&self) -> String {
        let vars: Vec<String> = self
            .interpreter
            .globals()
            .get_all()
            .into_iter()
            .filter(|(_, value)| !matches!(value, Value::Function(_) | Value::Builtin(_)))
            .map(|(name, value)| format!("{} = {}", name, value))
            .collect();
        if vars.is_empty() {
            "No variables.".to_string()
        } else {
            vars.join("\n")
        }
    }

    fn list_functions(&self) -> String {
        let mut lines: Vec<String> = self
            .interpreter
            .registry()
            .functions
            .iter()
            .map(|function| {
                let params: Vec<&str> = function.params.iter().map(|p| p.name.as_str()).collect();
                format!("{}({})", function.name, params.join(", "))
            })
            .collect();
        lines.extend(
            self.interpreter
                .globals()
                .get_all()
                .into_iter()
                .filter(|(_, value)| matches!(value, Value::Function(_)))
                .map(|(name, _)| format!("{} (imported)", name)),
        );
        if lines.is_empty() {
            "No functions.".to_string()
        } else {
            lines.join("\n")
        }
    }

    fn list_types(&self) -> String {
        let types: Vec<String> = self
            .interpreter
            .get_type_defs()
            .into_iter()
            .map(|def| {
                let fields: Vec<String> = def
                    .fields
                    .iter()
                    .map(|f| format!("{}: {}", f.name, f.type_annotation))
                    .collect();
                format!("{} {{ {} }}", def.name, fields.join(", "))
            })
            .collect();
        if types.is_empty() {
            "No types.".to_string()
        } else {
            types.join("\n")
        }
    }

    fn load(&mut self, path: &Path) -> String {
        match self.interpreter.load_file(path) {
            Ok(()) => {
                self.interpreter.set_mode(self.mode);
                format!("Loaded {}", path.display())
            }
            Err(e) => match std::fs::read_to_string(path) {
                Ok(text) => error_formatter::format_located(&SourceError {
                    error: e,
                    source_id: path.display().to_string(),
                    source_text: text,
                }),
                Err(_) => error_formatter::format_error(&e),
            },
        }
    }
}

fn render(error: GlyphError, input: &str) -> String {
    error_formatter::format_located(&SourceError {
        error,
        source_id: "<input>".to_string(),
        source_text: input.to_string(),
    })
}

/// Net count of unclosed `{`, `(` and `[` outside string literals
fn open_brackets(text: &str) -> i32 {
    let mut depth = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in text.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' | '(' | '[' => depth += 1,
            '}' | ')' | ']' => depth -= 1,
            _ => {}
        }
    }
    depth
}

pub fn run_repl(preload: Option<&Path>, mode: SyntaxMode) -> Result<()> {
    let mut repl = Repl::new(mode);
    if let Some(path) = preload {
        println!("{}", repl.load(path));
    }

    let interactive = std::io::stdin().is_terminal();
    if interactive {
        println!("Glyph {} (type :help for commands)", env!("CARGO_PKG_VERSION"));
    }
    let mut lines = std::io::stdin().lock().lines();
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { "glyph>" } else { "  ...>" };
        let line = if interactive {
            match Text::new(prompt).prompt() {
                Ok(line) => line,
                Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
                Err(e) => return Err(e).context("Failed to read input"),
            }
        } else {
            match lines.next() {
                Some(line) => line.context("Failed to read input")?,
                None => break,
            }
        };

        buffer.push_str(&line);
        buffer.push('\n');
        if open_brackets(&buffer) > 0 {
            continue;
        }

        let input = std::mem::take(&mut buffer);
        match repl.handle(&input) {
            Step::Quit => break,
            Step::Continue(Some(output)) if !output.is_empty() => println!("{}", output),
            Step::Continue(_) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(repl: &mut Repl, input: &str) -> String {
        match repl.handle(input) {
            Step::Continue(Some(text)) => text,
            other => panic!("unexpected step {:?} for {}", other, input),
        }
    }

    #[test]
    fn test_expressions_and_statements() {
        let mut repl = Repl::new(SyntaxMode::Compact);
        assert_eq!(output(&mut repl, "1 + 2"), "3");
        assert_eq!(output(&mut repl, "$ total = 40"), "");
        assert_eq!(output(&mut repl, "total + 2"), "42");
        assert_eq!(output(&mut repl, ":vars"), "total = 40");
    }

    #[test]
    fn test_declarations_persist() {
        let mut repl = Repl::new(SyntaxMode::Compact);
        assert_eq!(output(&mut repl, "func double(n) {\n  > n * 2\n}"), "ok");
        assert_eq!(output(&mut repl, "double(21)"), "42");
        assert_eq!(output(&mut repl, ":functions"), "double(n)");
        assert_eq!(output(&mut repl, ": Point { x: int!, y: int! }"), "ok");
        assert_eq!(output(&mut repl, ":types"), "Point { x: int, y: int }");
    }

    #[test]
    fn test_type_command() {
        let mut repl = Repl::new(SyntaxMode::Compact);
        assert_eq!(output(&mut repl, ":type [1, 2]"), "[int]");
        assert_eq!(output(&mut repl, ":type"), "usage: :type <expr>");
    }

    #[test]
    fn test_reset_and_quit() {
        let mut repl = Repl::new(SyntaxMode::Compact);
        output(&mut repl, "$ x = 1");
        assert_eq!(output(&mut repl, ":reset"), "Session cleared.");
        assert_eq!(output(&mut repl, ":vars"), "No variables.");
        assert_eq!(repl.handle(":quit"), Step::Quit);
        assert!(output(&mut repl, ":frobnicate").starts_with("unknown command"));
    }

    #[test]
    fn test_errors_are_reported_not_raised() {
        let mut repl = Repl::new(SyntaxMode::Compact);
        assert!(output(&mut repl, "1 / 0").contains("division by zero"));
        assert!(output(&mut repl, "missing").contains("undefined variable: missing"));
    }

    #[test]
    fn test_open_brackets() {
        assert_eq!(open_brackets("func f() {"), 1);
        assert_eq!(open_brackets("x = \"{\""), 0);
        assert_eq!(open_brackets("[1, (2)]"), 0);
    }
}
