use crate::lexer::{tokenize, SyntaxMode, TokenKind};
use std::path::Path;

fn kinds(source: &str, mode: SyntaxMode) -> Vec<TokenKind> {
    tokenize(source, mode)
        .unwrap()
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

#[test]
fn test_compact_route_head() {
    let tokens = tokenize("@ GET /users/:id -> User", SyntaxMode::Compact).unwrap();
    let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::At,
            TokenKind::Ident,
            TokenKind::Path,
            TokenKind::Arrow,
            TokenKind::Ident,
            TokenKind::Eof
        ]
    );
    assert!(tokens[0].directive);
    assert!(!tokens[1].directive);
    assert_eq!(tokens[2].lexeme, "/users/:id");
}

#[test]
fn test_expanded_keywords_produce_same_kinds() {
    let compact = kinds("@ GET /users/:id -> User", SyntaxMode::Compact);
    let expanded = kinds("route GET /users/:id -> User", SyntaxMode::Expanded);
    assert_eq!(compact, expanded);

    let compact = kinds("$ total = 1", SyntaxMode::Compact);
    let expanded = kinds("let total = 1", SyntaxMode::Expanded);
    assert_eq!(compact, expanded);
}

#[test]
fn test_expanded_keyword_mid_line_is_identifier() {
    assert_eq!(
        kinds("let route = 1", SyntaxMode::Expanded),
        vec![
            TokenKind::Dollar,
            TokenKind::Ident,
            TokenKind::Assign,
            TokenKind::Integer,
            TokenKind::Eof
        ]
    );
}

#[test]
fn test_expanded_keyword_as_field_name() {
    let tokens = tokenize("let kind = event.type", SyntaxMode::Expanded).unwrap();
    let last_word = &tokens[tokens.len() - 2];
    assert_eq!(last_word.kind, TokenKind::Ident);
    assert_eq!(last_word.lexeme, "type");
    assert!(!last_word.directive);
}

#[test]
fn test_keyword_spelling_is_plain_in_compact_mode() {
    // In compact mode the word `let` is an ordinary identifier
    assert_eq!(
        kinds("let", SyntaxMode::Compact),
        vec![TokenKind::Ident, TokenKind::Eof]
    );
}

#[test]
fn test_plus_directive_versus_concatenation() {
    let source = "+ auth(jwt)\n> \"Hello, \" + name";
    let tokens = tokenize(source, SyntaxMode::Compact).unwrap();
    let pluses: Vec<bool> = tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Plus)
        .map(|t| t.directive)
        .collect();
    assert_eq!(pluses, vec![true, false]);
}

#[test]
fn test_string_escapes() {
    let tokens = tokenize(r#""a\"b\n" 'single'"#, SyntaxMode::Compact).unwrap();
    assert_eq!(tokens[0].kind, TokenKind::Str);
    assert_eq!(tokens[0].lexeme, "a\"b\n");
    assert_eq!(tokens[1].lexeme, "single");
}

#[test]
fn test_negative_literal_versus_subtraction() {
    let tokens = tokenize("[1, -2]", SyntaxMode::Compact).unwrap();
    assert_eq!(tokens[3].kind, TokenKind::Integer);
    assert_eq!(tokens[3].lexeme, "-2");

    assert_eq!(
        kinds("a -1", SyntaxMode::Compact),
        vec![
            TokenKind::Ident,
            TokenKind::Minus,
            TokenKind::Integer,
            TokenKind::Eof
        ]
    );
}

#[test]
fn test_division_is_not_a_path() {
    assert_eq!(
        kinds("total /count", SyntaxMode::Compact),
        vec![
            TokenKind::Ident,
            TokenKind::Slash,
            TokenKind::Ident,
            TokenKind::Eof
        ]
    );
}

#[test]
fn test_comments_are_skipped() {
    let tokens = tokenize("# header\n$ x = 1 // trailing\n", SyntaxMode::Compact).unwrap();
    assert_eq!(tokens[0].kind, TokenKind::Dollar);
    assert!(tokens[0].directive);
    assert_eq!(tokens[0].span.line, 2);
    assert_eq!(tokens.len(), 5);
}

#[test]
fn test_float_and_two_char_operators() {
    assert_eq!(
        kinds("1.5 >= 2 && a != b || c => d", SyntaxMode::Compact),
        vec![
            TokenKind::Float,
            TokenKind::GtEq,
            TokenKind::Integer,
            TokenKind::AndAnd,
            TokenKind::Ident,
            TokenKind::NotEq,
            TokenKind::Ident,
            TokenKind::OrOr,
            TokenKind::Ident,
            TokenKind::FatArrow,
            TokenKind::Ident,
            TokenKind::Eof
        ]
    );
}

#[test]
fn test_unterminated_string_is_lex_error() {
    let err = tokenize("$ name = \"open\n", SyntaxMode::Compact).unwrap_err();
    assert!(err.is_syntax());
    let diagnostics = err.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].line, 1);
    assert!(diagnostics[0].message.contains("unterminated string"));
}

#[test]
fn test_unexpected_character() {
    let err = tokenize("$ x = 1 ^ 2", SyntaxMode::Compact).unwrap_err();
    assert!(err.to_string().contains("unexpected character '^'"));
}

#[test]
fn test_syntax_mode_from_path() {
    assert_eq!(
        SyntaxMode::from_path(Path::new("api/users.glyphx")),
        SyntaxMode::Expanded
    );
    assert_eq!(
        SyntaxMode::from_path(Path::new("api/users.glyph")),
        SyntaxMode::Compact
    );
    assert_eq!(SyntaxMode::from_path(Path::new("README")), SyntaxMode::Compact);
    assert_eq!(SyntaxMode::Expanded.extension(), "glyphx");
}
