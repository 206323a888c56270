use siulang::{
    diagnostics::{Diagnostic, Position},
    lexer::{Keyword, Lexer, Token, TokenKind, TokenValue},
};

fn lex(source: &str) -> Vec<Token> {
    Lexer::new(source).tokenize().expect("source should lex")
}

fn lex_error(source: &str) -> Diagnostic {
    match Lexer::new(source).tokenize() {
        Ok(tokens) => panic!("expected lexical error, received {} tokens", tokens.len()),
        Err(diag) => diag,
    }
}

const SAMPLE: &str = r#"
fn area(Shape s): float {
    match (s) {
        circle(r) => { return 3.14 * r * r; }
        _ => { return 0.0; }
    }
}
list xs = [1, 2, 3];
xs[0] = @xs[1] + len("a\tb") - 7 % 2;
if (xs[0] >= 2 and not false) { print(Shape::circle(1)); }
"#;

#[test]
fn lexemes_reconstruct_source() {
    let tokens = lex(SAMPLE);
    let mut rebuilt = String::new();
    let mut cursor = 0;
    for token in &tokens {
        let gap = &SAMPLE[cursor..token.span.start];
        assert!(gap.chars().all(char::is_whitespace), "gap {gap:?}");
        assert_eq!(&SAMPLE[token.span.start..token.span.end], token.lexeme);
        rebuilt.push_str(gap);
        rebuilt.push_str(&token.lexeme);
        cursor = token.span.end;
    }
    rebuilt.push_str(&SAMPLE[cursor..]);
    assert_eq!(rebuilt, SAMPLE);

    let relexed = lex(&rebuilt);
    let kinds = |tokens: &[Token]| tokens.iter().map(|t| t.kind).collect::<Vec<_>>();
    assert_eq!(kinds(&relexed), kinds(&tokens));
}

#[test]
fn keywords_and_identifiers() {
    let kinds: Vec<_> = lex("if iffy elif _ var variant")
        .into_iter()
        .map(|t| t.kind)
        .collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::Keyword(Keyword::If),
            TokenKind::Identifier,
            TokenKind::Keyword(Keyword::Elif),
            TokenKind::Identifier,
            TokenKind::Keyword(Keyword::Var),
            TokenKind::Keyword(Keyword::Variant),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn literal_values_are_decoded() {
    let tokens = lex(r#"42 3.5 "a\n\"b\"\\""#);
    assert_eq!(tokens[0].value, Some(TokenValue::Int(42)));
    assert_eq!(tokens[1].value, Some(TokenValue::Float(3.5)));
    assert_eq!(
        tokens[2].value,
        Some(TokenValue::Str("a\n\"b\"\\".to_string()))
    );
    assert_eq!(tokens[2].lexeme, r#""a\n\"b\"\\""#);
}

#[test]
fn comments_are_skipped() {
    let tokens = lex("a # trailing\n/* block\n spanning */ b");
    assert_eq!(tokens.len(), 3);
    assert_eq!(tokens[1].span.position, Position::new(3, 14));
}

#[test]
fn malformed_literals_are_rejected() {
    assert!(lex_error("1.").message.contains("expected digits after `.`"));
    assert!(lex_error("12abc").message.contains("malformed numeric literal `12abc`"));
    assert!(lex_error("9223372036854775808")
        .message
        .contains("does not fit in 64 bits"));
}

#[test]
fn string_errors_are_positioned() {
    let diag = lex_error("x = \"open");
    assert!(diag.message.contains("unterminated string"));
    assert_eq!(diag.position(), Some(Position::new(1, 5)));

    let diag = lex_error(r#""bad \q escape""#);
    assert!(diag.message.contains("unknown escape sequence `\\q`"));
    assert_eq!(diag.position(), Some(Position::new(1, 6)));

    assert!(lex_error("\"line\nbreak\"").message.contains("unterminated"));
}

#[test]
fn unexpected_characters_are_named() {
    let diag = lex_error("a $ b");
    assert!(diag.message.contains("`$`"));
    assert_eq!(diag.position(), Some(Position::new(1, 3)));

    let diag = lex_error("!x");
    assert!(diag.notes.iter().any(|note| note.contains("`not`")));
}

#[test]
fn identifiers_are_length_limited() {
    let ok = "a".repeat(100);
    assert_eq!(lex(&ok)[0].kind, TokenKind::Identifier);
    let too_long = "a".repeat(101);
    assert!(lex_error(&too_long).message.contains("longer than 100"));
}

#[test]
fn unterminated_block_comment_is_an_error() {
    let diag = lex_error("a /* never closed");
    assert!(diag.message.contains("unterminated block comment"));
    assert_eq!(diag.position(), Some(Position::new(1, 3)));
}
