use std::fmt;

use crate::diagnostics::{Diagnostic, Position, SourceSpan};

pub const MAX_IDENTIFIER_LENGTH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Fn,
    Const,
    Struct,
    Variant,
    Match,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Return,
    Break,
    Continue,
    And,
    Or,
    Not,
    True,
    False,
    Null,
    Int,
    Float,
    String,
    Bool,
    List,
    Var,
}

impl Keyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Fn => "fn",
            Keyword::Const => "const",
            Keyword::Struct => "struct",
            Keyword::Variant => "variant",
            Keyword::Match => "match",
            Keyword::If => "if",
            Keyword::Elif => "elif",
            Keyword::Else => "else",
            Keyword::While => "while",
            Keyword::For => "for",
            Keyword::In => "in",
            Keyword::Return => "return",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
            Keyword::And => "and",
            Keyword::Or => "or",
            Keyword::Not => "not",
            Keyword::True => "true",
            Keyword::False => "false",
            Keyword::Null => "null",
            Keyword::Int => "int",
            Keyword::Float => "float",
            Keyword::String => "string",
            Keyword::Bool => "bool",
            Keyword::List => "list",
            Keyword::Var => "var",
        }
    }

    /// Keywords that name a type in declarations, parameters and casts.
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            Keyword::Int
                | Keyword::Float
                | Keyword::String
                | Keyword::Bool
                | Keyword::List
                | Keyword::Var
                | Keyword::Fn
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Integer,
    Float,
    String,
    Keyword(Keyword),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,
    DoubleColon,
    Semicolon,
    FatArrow,
    At,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Identifier => "identifier",
            TokenKind::Integer => "integer literal",
            TokenKind::Float => "float literal",
            TokenKind::String => "string literal",
            TokenKind::Keyword(keyword) => return write!(f, "`{}`", keyword.as_str()),
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::LBrace => "`{`",
            TokenKind::RBrace => "`}`",
            TokenKind::LBracket => "`[`",
            TokenKind::RBracket => "`]`",
            TokenKind::Comma => "`,`",
            TokenKind::Dot => "`.`",
            TokenKind::Colon => "`:`",
            TokenKind::DoubleColon => "`::`",
            TokenKind::Semicolon => "`;`",
            TokenKind::FatArrow => "`=>`",
            TokenKind::At => "`@`",
            TokenKind::Assign => "`=`",
            TokenKind::Plus => "`+`",
            TokenKind::Minus => "`-`",
            TokenKind::Star => "`*`",
            TokenKind::Slash => "`/`",
            TokenKind::Percent => "`%`",
            TokenKind::EqualEqual => "`==`",
            TokenKind::BangEqual => "`!=`",
            TokenKind::Less => "`<`",
            TokenKind::LessEqual => "`<=`",
            TokenKind::Greater => "`>`",
            TokenKind::GreaterEqual => "`>=`",
            TokenKind::Eof => "end of input",
        };
        f.write_str(text)
    }
}

/// Decoded payload of a literal token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// Exact source text of the token, quotes and escapes included.
    pub lexeme: String,
    pub span: SourceSpan,
    pub value: Option<TokenValue>,
}

impl Token {
    /// How the token reads in an error message.
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Eof => "end of input".to_string(),
            _ => format!("`{}`", self.lexeme),
        }
    }
}

/// On-demand tokenizer. Yields tokens up to and including a single `Eof`,
/// then `None`. The first error also ends the sequence.
pub struct Lexer<'a> {
    source: &'a str,
    chars: std::str::CharIndices<'a>,
    current: usize,
    peeked: Option<(usize, char)>,
    line: usize,
    column: usize,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices(),
            current: 0,
            peeked: None,
            line: 1,
            column: 1,
            finished: false,
        }
    }

    pub fn tokenize(self) -> Result<Vec<Token>, Diagnostic> {
        self.collect()
    }

    fn current_position(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = match self.peeked.take() {
            Some(pair) => Some(pair),
            None => self.chars.next(),
        };
        let (idx, ch) = next?;
        self.current = idx + ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some((idx, ch))
    }

    fn peek(&mut self) -> Option<char> {
        if self.peeked.is_none() {
            self.peeked = self.chars.next();
        }
        self.peeked.map(|(_, ch)| ch)
    }

    fn peek_second(&mut self) -> Option<char> {
        self.peek()?;
        self.chars.clone().next().map(|(_, ch)| ch)
    }

    fn match_next(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_while<F>(&mut self, mut predicate: F)
    where
        F: FnMut(char) -> bool,
    {
        while let Some(ch) = self.peek() {
            if !predicate(ch) {
                break;
            }
            self.bump();
        }
    }

    fn skip_trivia(&mut self) -> Result<(), Diagnostic> {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.bump();
                }
                Some('#') => self.eat_while(|ch| ch != '\n'),
                Some('/') if self.peek_second() == Some('*') => self.block_comment()?,
                _ => return Ok(()),
            }
        }
    }

    fn block_comment(&mut self) -> Result<(), Diagnostic> {
        let position = self.current_position();
        let start = self.current_offset();
        self.bump();
        self.bump();
        let mut depth = 1;
        while let Some((_, ch)) = self.bump() {
            if ch == '/' && self.match_next('*') {
                depth += 1;
            } else if ch == '*' && self.match_next('/') {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
        }
        Err(Diagnostic::lexer("unterminated block comment")
            .with_span(SourceSpan::new(start, start + 2, position)))
    }

    fn current_offset(&self) -> usize {
        match self.peeked {
            Some((idx, _)) => idx,
            None => self.current,
        }
    }

    fn token(&self, kind: TokenKind, start: usize, position: Position) -> Token {
        Token {
            kind,
            lexeme: self.source[start..self.current].to_string(),
            span: SourceSpan::new(start, self.current, position),
            value: None,
        }
    }

    fn error_here(&self, message: String, start: usize, position: Position) -> Diagnostic {
        Diagnostic::lexer(message).with_span(SourceSpan::new(start, self.current, position))
    }

    fn identifier_or_keyword(&mut self, start: usize, position: Position) -> Result<Token, Diagnostic> {
        self.eat_while(|ch| ch.is_ascii_alphanumeric() || ch == '_');
        let lexeme = &self.source[start..self.current];
        if lexeme.chars().count() > MAX_IDENTIFIER_LENGTH {
            return Err(self.error_here(
                format!("identifier is longer than {MAX_IDENTIFIER_LENGTH} characters"),
                start,
                position,
            ));
        }
        let kind = keyword_for(lexeme).unwrap_or(TokenKind::Identifier);
        Ok(self.token(kind, start, position))
    }

    fn number_literal(&mut self, start: usize, position: Position) -> Result<Token, Diagnostic> {
        self.eat_while(|ch| ch.is_ascii_digit());
        let mut is_float = false;
        if self.peek() == Some('.') {
            if !self.peek_second().is_some_and(|ch| ch.is_ascii_digit()) {
                self.bump();
                return Err(self.error_here(
                    format!(
                        "malformed numeric literal `{}`: expected digits after `.`",
                        &self.source[start..self.current]
                    ),
                    start,
                    position,
                ));
            }
            self.bump();
            self.eat_while(|ch| ch.is_ascii_digit());
            is_float = true;
        }
        if self.peek().is_some_and(|ch| ch.is_alphabetic() || ch == '_') {
            self.eat_while(|ch| ch.is_alphanumeric() || ch == '_');
            return Err(self.error_here(
                format!(
                    "malformed numeric literal `{}`",
                    &self.source[start..self.current]
                ),
                start,
                position,
            ));
        }

        let lexeme = &self.source[start..self.current];
        let (kind, value) = if is_float {
            match lexeme.parse::<f64>() {
                Ok(n) => (TokenKind::Float, TokenValue::Float(n)),
                Err(_) => {
                    return Err(self.error_here(
                        format!("malformed numeric literal `{lexeme}`"),
                        start,
                        position,
                    ));
                }
            }
        } else {
            match lexeme.parse::<i64>() {
                Ok(n) => (TokenKind::Integer, TokenValue::Int(n)),
                Err(_) => {
                    return Err(self.error_here(
                        format!("integer literal `{lexeme}` does not fit in 64 bits"),
                        start,
                        position,
                    ));
                }
            }
        };
        let mut token = self.token(kind, start, position);
        token.value = Some(value);
        Ok(token)
    }

    fn string_literal(&mut self, start: usize, position: Position) -> Result<Token, Diagnostic> {
        let mut value = String::new();
        loop {
            let char_position = self.current_position();
            match self.bump() {
                Some((_, '"')) => break,
                Some((idx, '\\')) => {
                    let escaped = match self.bump() {
                        Some((_, 'n')) => '\n',
                        Some((_, 't')) => '\t',
                        Some((_, 'r')) => '\r',
                        Some((_, '0')) => '\0',
                        Some((_, '"')) => '"',
                        Some((_, '\\')) => '\\',
                        Some((_, '\n')) | None => {
                            return Err(Diagnostic::lexer("unterminated string literal")
                                .with_span(SourceSpan::new(start, self.current, position)));
                        }
                        Some((_, other)) => {
                            return Err(Diagnostic::lexer(format!(
                                "unknown escape sequence `\\{other}`"
                            ))
                            .with_span(SourceSpan::new(idx, self.current, char_position)));
                        }
                    };
                    value.push(escaped);
                }
                Some((_, '\n')) | None => {
                    return Err(Diagnostic::lexer("unterminated string literal")
                        .with_span(SourceSpan::new(start, self.current, position)));
                }
                Some((_, ch)) => value.push(ch),
            }
        }
        let mut token = self.token(TokenKind::String, start, position);
        token.value = Some(TokenValue::Str(value));
        Ok(token)
    }

    fn next_token(&mut self) -> Result<Token, Diagnostic> {
        self.skip_trivia()?;
        let position = self.current_position();
        let Some((start, ch)) = self.bump() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                span: SourceSpan::new(self.current, self.current, position),
                value: None,
            });
        };

        let kind = match ch {
            'a'..='z' | 'A'..='Z' | '_' => return self.identifier_or_keyword(start, position),
            '0'..='9' => return self.number_literal(start, position),
            '"' => return self.string_literal(start, position),
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ';' => TokenKind::Semicolon,
            '@' => TokenKind::At,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            ':' => {
                if self.match_next(':') {
                    TokenKind::DoubleColon
                } else {
                    TokenKind::Colon
                }
            }
            '=' => {
                if self.match_next('=') {
                    TokenKind::EqualEqual
                } else if self.match_next('>') {
                    TokenKind::FatArrow
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.match_next('=') {
                    TokenKind::BangEqual
                } else {
                    return Err(self
                        .error_here("unexpected character `!`".to_string(), start, position)
                        .with_note("logical negation is spelled `not`"));
                }
            }
            '<' => {
                if self.match_next('=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                if self.match_next('=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }
            }
            other => {
                return Err(self.error_here(
                    format!("unexpected character `{other}`"),
                    start,
                    position,
                ));
            }
        };
        Ok(self.token(kind, start, position))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, Diagnostic>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_token();
        match &result {
            Ok(token) if token.kind == TokenKind::Eof => self.finished = true,
            Err(_) => self.finished = true,
            Ok(_) => {}
        }
        Some(result)
    }
}

fn keyword_for(ident: &str) -> Option<TokenKind> {
    use self::Keyword as Kw;
    let keyword = match ident {
        "fn" => Kw::Fn,
        "const" => Kw::Const,
        "struct" => Kw::Struct,
        "variant" => Kw::Variant,
        "match" => Kw::Match,
        "if" => Kw::If,
        "elif" => Kw::Elif,
        "else" => Kw::Else,
        "while" => Kw::While,
        "for" => Kw::For,
        "in" => Kw::In,
        "return" => Kw::Return,
        "break" => Kw::Break,
        "continue" => Kw::Continue,
        "and" => Kw::And,
        "or" => Kw::Or,
        "not" => Kw::Not,
        "true" => Kw::True,
        "false" => Kw::False,
        "null" => Kw::Null,
        "int" => Kw::Int,
        "float" => Kw::Float,
        "string" => Kw::String,
        "bool" => Kw::Bool,
        "list" => Kw::List,
        "var" => Kw::Var,
        _ => return None,
    };
    Some(TokenKind::Keyword(keyword))
}
