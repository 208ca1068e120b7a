use ariadne::{Color, Label, Report, ReportKind, Source};
use glyph::error::ErrorDetails;
use glyph::{GlyphError, Span};
use std::fmt;

/// A GlyphError together with the source it was raised from, so runtime errors can be
/// rendered against the file that produced them
#[derive(Debug)]
pub struct SourceError {
    pub error: GlyphError,
    pub source_id: String,
    pub source_text: String,
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for SourceError {}

pub fn format_located(located: &SourceError) -> String {
    match &located.error {
        GlyphError::Runtime {
            error,
            span: Some(span),
        } => render(
            "Runtime error",
            &error.to_string(),
            &located.source_id,
            &located.source_text,
            *span,
            None,
        )
        .unwrap_or_else(|| located.error.to_string()),
        GlyphError::MultipleErrors(errors) => {
            let mut result = String::from("Multiple errors occurred:\n\n");
            for error in errors {
                result.push_str(&format_located(&SourceError {
                    error: error.clone(),
                    source_id: located.source_id.clone(),
                    source_text: located.source_text.clone(),
                }));
                result.push_str("\n\n");
            }
            result
        }
        other => format_error(other),
    }
}

/// Format a GlyphError with fancy terminal output using Ariadne
pub fn format_error(error: &GlyphError) -> String {
    match error {
        GlyphError::Lex(details) => render_details("Lex error", details),
        GlyphError::Parse(details) => render_details("Parse error", details),
        GlyphError::Runtime { .. } => error.to_string(),
        GlyphError::Module(msg) => format!("Module error: {}", msg),
        GlyphError::ResourceLimitExceeded {
            limit_name,
            limit_value,
            actual_value,
            suggestion,
        } => {
            format!(
                "Resource limit exceeded: {}\n  Limit: {}\n  Actual: {}\n  {}",
                limit_name, limit_value, actual_value, suggestion
            )
        }
        GlyphError::MultipleErrors(errors) => {
            let mut result = String::from("Multiple errors occurred:\n\n");
            for error in errors {
                result.push_str(&format_error(error));
                result.push_str("\n\n");
            }
            result
        }
    }
}

fn render_details(kind: &str, details: &ErrorDetails) -> String {
    render(
        kind,
        &details.message,
        &details.source_id,
        &details.source_text,
        details.span,
        details.hint.as_deref(),
    )
    .unwrap_or_else(|| format!("{}: {} at {}", kind, details.message, details.source_id))
}

fn render(
    kind: &str,
    message: &str,
    source_id: &str,
    source_text: &str,
    span: Span,
    hint: Option<&str>,
) -> Option<String> {
    let start = span.start.min(source_text.len());
    let end = span.end.clamp(start, source_text.len());
    let location = format!("{}:{}:{}", source_id, span.line, span.col);

    let mut report = Report::build(ReportKind::Error, source_id, start)
        .with_message(format!("{}: {} ({})", kind, message, location))
        .with_label(
            Label::new((source_id, start..end))
                .with_message(message)
                .with_color(Color::Red),
        );

    if let Some(hint) = hint {
        report = report.with_help(hint);
    }

    let mut output = Vec::new();
    report
        .finish()
        .write((source_id, Source::from(source_text)), &mut output)
        .ok()?;
    Some(String::from_utf8_lossy(&output).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_report_includes_hint() {
        let source = "@ GET users {\n}\n";
        let error = glyph::parse_str(source, glyph::SyntaxMode::Compact).unwrap_err();
        let rendered = format_error(&error);
        assert!(rendered.contains("Parse error"));
        assert!(rendered.contains("Route paths must start with '/'"));
    }

    #[test]
    fn test_runtime_error_points_into_source() {
        let source = "! boom {\n  > 1 / 0\n}\n";
        let mut interpreter = glyph::Interpreter::new();
        interpreter
            .load_source(source, Some("boom.glyph"), glyph::SyntaxMode::Compact)
            .unwrap();
        let error = interpreter
            .execute_command("boom", &[], &Default::default())
            .unwrap_err();
        let rendered = format_located(&SourceError {
            error,
            source_id: "boom.glyph".to_string(),
            source_text: source.to_string(),
        });
        assert!(rendered.contains("Runtime error: division by zero"));
        assert!(rendered.contains("boom.glyph:2:"));
    }

    #[test]
    fn test_module_error_is_plain() {
        let error = GlyphError::Module("circular import: a -> b -> a".to_string());
        assert_eq!(format_error(&error), "Module error: circular import: a -> b -> a");
    }
}
