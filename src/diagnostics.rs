use std::fmt;

use thiserror::Error;

/// A 1-based line/column location in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Represents a byte span within a source file, anchored at the position of its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
    pub position: Position,
}

impl SourceSpan {
    pub const fn new(start: usize, end: usize, position: Position) -> Self {
        Self {
            start,
            end,
            position,
        }
    }

    /// Span covering `self` through the end of `other`.
    pub fn to(self, other: SourceSpan) -> SourceSpan {
        SourceSpan {
            start: self.start,
            end: self.end.max(other.end),
            position: self.position,
        }
    }
}

/// What went wrong at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    UnboundIdentifier,
    TypeMismatch,
    ArityMismatch,
    DivisionByZero,
    Overflow,
    ControlFlow,
    RecursionLimit,
    StepLimit,
    ConstAssignment,
    Redeclaration,
    UndefinedType,
    NotCallable,
    IndexOutOfBounds,
    UnknownField,
    InvalidCast,
    MissingReturn,
    InvalidOperation,
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuntimeErrorKind::UnboundIdentifier => "unbound identifier",
            RuntimeErrorKind::TypeMismatch => "type mismatch",
            RuntimeErrorKind::ArityMismatch => "arity mismatch",
            RuntimeErrorKind::DivisionByZero => "division by zero",
            RuntimeErrorKind::Overflow => "overflow",
            RuntimeErrorKind::ControlFlow => "invalid control flow",
            RuntimeErrorKind::RecursionLimit => "recursion limit",
            RuntimeErrorKind::StepLimit => "step limit",
            RuntimeErrorKind::ConstAssignment => "constant assignment",
            RuntimeErrorKind::Redeclaration => "redeclaration",
            RuntimeErrorKind::UndefinedType => "undefined type",
            RuntimeErrorKind::NotCallable => "not callable",
            RuntimeErrorKind::IndexOutOfBounds => "index out of bounds",
            RuntimeErrorKind::UnknownField => "unknown field",
            RuntimeErrorKind::InvalidCast => "invalid cast",
            RuntimeErrorKind::MissingReturn => "missing return",
            RuntimeErrorKind::InvalidOperation => "invalid operation",
        };
        f.write_str(name)
    }
}

/// Classification of a diagnostic event by the pipeline stage that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lexer,
    Parser,
    Check,
    Runtime(RuntimeErrorKind),
}

impl DiagnosticKind {
    pub fn runtime_kind(&self) -> Option<RuntimeErrorKind> {
        match self {
            DiagnosticKind::Runtime(kind) => Some(*kind),
            _ => None,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Lexer => f.write_str("lexical error"),
            DiagnosticKind::Parser => f.write_str("syntax error"),
            DiagnosticKind::Check => f.write_str("check error"),
            DiagnosticKind::Runtime(kind) => write!(f, "runtime error ({kind})"),
        }
    }
}

/// The offending source line, kept so a diagnostic can be rendered without the source at hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Excerpt {
    pub line: usize,
    pub text: String,
    pub column: usize,
    pub width: usize,
}

/// Rich diagnostic information surfaced to end users.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Option<SourceSpan>,
    pub expected: Vec<String>,
    pub found: Option<String>,
    pub excerpt: Option<Excerpt>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
            expected: Vec::new(),
            found: None,
            excerpt: None,
            notes: Vec::new(),
        }
    }

    pub fn lexer(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Lexer, message)
    }

    pub fn parser(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Parser, message)
    }

    pub fn runtime(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Runtime(kind), message)
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_expected<I, S>(mut self, expected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected.extend(expected.into_iter().map(Into::into));
        self
    }

    pub fn with_found(mut self, found: impl Into<String>) -> Self {
        self.found = Some(found.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Attaches the line of `source` the span points into. No-op without a span.
    pub fn with_source(mut self, source: &str) -> Self {
        let Some(span) = self.span else {
            return self;
        };
        let Some(text) = source.lines().nth(span.position.line.saturating_sub(1)) else {
            return self;
        };
        let column = span.position.column.max(1);
        let remaining = text.chars().count().saturating_sub(column - 1).max(1);
        let width = source
            .get(span.start..span.end)
            .map(|slice| slice.lines().next().unwrap_or("").chars().count())
            .unwrap_or(1)
            .clamp(1, remaining);
        self.excerpt = Some(Excerpt {
            line: span.position.line,
            text: text.to_string(),
            column,
            width,
        });
        self
    }

    pub fn position(&self) -> Option<Position> {
        self.span.map(|span| span.position)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(span) = self.span {
            write!(f, " at {}", span.position)?;
        }
        write!(f, ": {}", self.message)?;
        if !self.expected.is_empty() {
            write!(f, "\n  expected one of: {}", self.expected.join(", "))?;
        }
        if let Some(found) = &self.found {
            write!(f, "\n  found: {found}")?;
        }
        if let Some(excerpt) = &self.excerpt {
            let gutter = excerpt.line.to_string().len();
            write!(f, "\n{:gutter$} |", "")?;
            write!(f, "\n{} | {}", excerpt.line, excerpt.text)?;
            write!(
                f,
                "\n{:gutter$} | {}{}",
                "",
                " ".repeat(excerpt.column - 1),
                "^".repeat(excerpt.width)
            )?;
        }
        for note in &self.notes {
            write!(f, "\n  note: {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Unified error type for the siulang toolchain.
#[derive(Debug, Error)]
pub enum SiuError {
    #[error("{0}")]
    Diagnostic(Box<Diagnostic>),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<Diagnostic> for SiuError {
    fn from(diag: Diagnostic) -> Self {
        SiuError::Diagnostic(Box::new(diag))
    }
}

impl SiuError {
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            SiuError::Diagnostic(diag) => Some(&**diag),
            SiuError::Io(_) => None,
        }
    }

    /// Attaches a source excerpt when this is a positioned diagnostic.
    pub fn with_source(self, source: &str) -> Self {
        match self {
            SiuError::Diagnostic(diag) => SiuError::from((*diag).with_source(source)),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, SiuError>;
