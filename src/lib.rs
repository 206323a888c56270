//! Core library for the siulang scripting language: a lazy lexer, a
//! precedence-climbing parser, a static return check and a tree-walking
//! interpreter with lexical closures.

pub mod ast;
pub mod checker;
pub mod diagnostics;
pub mod environment;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod repl;
pub mod runtime;
pub mod stdlib;
pub mod value;

pub use diagnostics::{
    Diagnostic, DiagnosticKind, Position, RuntimeErrorKind, SiuError, SourceSpan,
};
pub use repl::Repl;
pub use runtime::{Interpreter, InterpreterConfig};
pub use value::Value;
