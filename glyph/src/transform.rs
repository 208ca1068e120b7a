//! Conversion between the compact and expanded syntaxes
//!
//! Rewrites are purely lexical and mirror the tokenizer's directive rules: item
//! directives are recognised at the start of a line, statement directives also
//! directly after `{`. Strings, comments and indentation pass through untouched.

use crate::lexer::{ITEM_KEYWORDS, STATEMENT_KEYWORDS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Expand,
    Compact,
}

/// Rewrite compact source (`@ GET /x`, `$ x = 1`) with keyword directives
pub fn expand_source(source: &str) -> String {
    rewrite(source, Direction::Expand)
}

/// Rewrite expanded source (`route GET /x`, `let x = 1`) with symbol directives
pub fn compact_source(source: &str) -> String {
    rewrite(source, Direction::Compact)
}

fn rewrite(source: &str, direction: Direction) -> String {
    source
        .split('\n')
        .map(|line| rewrite_line(line, direction))
        .collect::<Vec<_>>()
        .join("\n")
}

fn rewrite_line(line: &str, direction: Direction) -> String {
    let indent_len = line.len() - line.trim_start().len();
    let (indent, mut rest) = line.split_at(indent_len);
    let mut out = String::with_capacity(line.len() + 8);
    out.push_str(indent);

    if let Some((replacement, consumed)) = directive_at(rest, direction, true) {
        out.push_str(&replacement);
        rest = &rest[consumed..];
    }

    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut i = 0;
    while let Some(c) = rest[i..].chars().next() {
        if let Some(q) = quote {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            i += c.len_utf8();
            continue;
        }

        match c {
            '"' | '\'' => quote = Some(c),
            '#' => {
                out.push_str(&rest[i..]);
                break;
            }
            '/' if rest[i..].starts_with("//") => {
                out.push_str(&rest[i..]);
                break;
            }
            '{' => {
                out.push('{');
                i += 1;
                let after = &rest[i..];
                let gap = after.len() - after.trim_start_matches([' ', '\t']).len();
                if let Some((replacement, consumed)) = directive_at(&after[gap..], direction, false)
                {
                    out.push_str(&after[..gap]);
                    out.push_str(&replacement);
                    i += gap + consumed;
                }
                continue;
            }
            _ => {}
        }
        out.push(c);
        i += c.len_utf8();
    }
    out
}

/// Replacement for a directive at the start of `text`, with the number of bytes it replaces
fn directive_at(text: &str, direction: Direction, line_start: bool) -> Option<(String, usize)> {
    match direction {
        Direction::Expand => expand_directive(text, line_start),
        Direction::Compact => compact_directive(text, line_start),
    }
}

fn expand_directive(text: &str, line_start: bool) -> Option<(String, usize)> {
    let symbol = text.chars().next()?;
    let next = text[symbol.len_utf8()..].chars().next();

    let keyword = STATEMENT_KEYWORDS
        .iter()
        .chain(line_start.then_some(ITEM_KEYWORDS).into_iter().flatten())
        .find(|(_, s)| *s == symbol)
        .map(|(keyword, _)| *keyword)?;

    match next {
        None => Some((keyword.to_string(), 1)),
        Some(c) if c.is_whitespace() => Some((keyword.to_string(), 1)),
        // `$x = 1` reads as `$ x = 1`
        Some(c) if symbol == '$' && (c.is_ascii_alphabetic() || c == '_') => {
            Some((format!("{} ", keyword), 1))
        }
        Some(_) => None,
    }
}

fn compact_directive(text: &str, line_start: bool) -> Option<(String, usize)> {
    let word_len = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    if word_len == 0 {
        return None;
    }
    let (word, after) = text.split_at(word_len);

    // A keyword followed by `:` or `.` is a field name
    let next = after.trim_start_matches([' ', '\t']).chars().next();
    if matches!(next, Some(':') | Some('.')) {
        return None;
    }
    if after.chars().next().is_some_and(|c| !c.is_whitespace()) {
        return None;
    }

    let symbol = if word == "inject" {
        Some('%')
    } else {
        STATEMENT_KEYWORDS
            .iter()
            .chain(line_start.then_some(ITEM_KEYWORDS).into_iter().flatten())
            .find(|(keyword, _)| *keyword == word)
            .map(|(_, symbol)| *symbol)
    }?;

    Some((symbol.to_string(), word_len))
}
