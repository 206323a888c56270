use rustyline::{error::ReadlineError, DefaultEditor};

use crate::{
    diagnostics::{Result, SiuError},
    runtime::{Interpreter, InterpreterConfig},
};

const PROMPT: &str = "siu> ";
const CONTINUATION_PROMPT: &str = "...> ";

/// Interactive session over one interpreter, so declarations persist between inputs.
pub struct Repl {
    interpreter: Interpreter,
}

impl Default for Repl {
    fn default() -> Self {
        Self::new()
    }
}

impl Repl {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        Self {
            interpreter: Interpreter::with_config(config),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new().map_err(readline_error)?;
        let mut pending = String::new();
        loop {
            let prompt = if pending.is_empty() {
                PROMPT
            } else {
                CONTINUATION_PROMPT
            };
            match editor.readline(prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if pending.is_empty() {
                        match trimmed {
                            ":quit" | ":exit" => break,
                            ":vars" => {
                                self.print_globals();
                                continue;
                            }
                            "" => continue,
                            _ => {}
                        }
                    }
                    pending.push_str(&line);
                    pending.push('\n');
                    if !is_complete(&pending) {
                        continue;
                    }
                    let source = std::mem::take(&mut pending);
                    editor.add_history_entry(source.trim()).ok();
                    self.eval_and_print(&source);
                }
                Err(ReadlineError::Interrupted) => {
                    pending.clear();
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(readline_error(err)),
            }
        }
        Ok(())
    }

    fn eval_and_print(&mut self, source: &str) {
        match self.interpreter.eval_source(source) {
            Ok(value) if value.is_null() => {}
            Ok(value) => println!("{value:?}"),
            Err(err) => eprintln!("{err}"),
        }
    }

    fn print_globals(&self) {
        let globals = self.interpreter.globals().borrow();
        for name in globals.local_names() {
            println!("{name}");
        }
        for def in self.interpreter.types() {
            println!("type {}", def.name());
        }
    }
}

/// Whether `source` has balanced braces, brackets and parentheses outside strings and comments.
pub fn is_complete(source: &str) -> bool {
    let mut depth: i64 = 0;
    let mut chars = source.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                while let Some(inner) = chars.next() {
                    match inner {
                        '\\' => {
                            chars.next();
                        }
                        '"' | '\n' => break,
                        _ => {}
                    }
                }
            }
            '#' => {
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut nesting = 1;
                while nesting > 0 {
                    match chars.next() {
                        Some('/') if chars.peek() == Some(&'*') => {
                            chars.next();
                            nesting += 1;
                        }
                        Some('*') if chars.peek() == Some(&'/') => {
                            chars.next();
                            nesting -= 1;
                        }
                        Some(_) => {}
                        None => return false,
                    }
                }
            }
            '{' | '(' | '[' => depth += 1,
            '}' | ')' | ']' => depth -= 1,
            _ => {}
        }
    }
    // a surplus of closers is left for the parser to report
    depth <= 0
}

fn readline_error(err: ReadlineError) -> SiuError {
    SiuError::from(std::io::Error::new(std::io::ErrorKind::Other, err))
}
