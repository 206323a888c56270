use std::{fs, path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use siulang::{
    diagnostics::Result,
    lexer::Lexer,
    parser, printer,
    runtime::{DEFAULT_MAX_CALL_DEPTH, DEFAULT_MAX_EVAL_DEPTH},
    Interpreter, InterpreterConfig, Repl, SiuError,
};

#[derive(Parser)]
#[command(author, version, about = "siulang interpreter")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(clap::Args)]
struct Limits {
    /// Maximum nested function calls
    #[arg(long = "max-depth", default_value_t = DEFAULT_MAX_CALL_DEPTH)]
    max_depth: usize,
    /// Maximum nesting of statements and expressions under evaluation
    #[arg(long = "max-eval-depth", default_value_t = DEFAULT_MAX_EVAL_DEPTH)]
    max_eval_depth: usize,
    /// Abort after this many evaluation steps
    #[arg(long = "max-steps")]
    max_steps: Option<u64>,
}

impl From<Limits> for InterpreterConfig {
    fn from(limits: Limits) -> Self {
        InterpreterConfig {
            max_call_depth: limits.max_depth,
            max_eval_depth: limits.max_eval_depth,
            max_steps: limits.max_steps,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run a siulang script file, then its `main()` if it defines one
    Run {
        script: PathBuf,
        #[command(flatten)]
        limits: Limits,
    },
    /// Evaluate a snippet and print its result
    Eval {
        source: String,
        #[command(flatten)]
        limits: Limits,
    },
    /// Start an interactive session
    Repl {
        #[command(flatten)]
        limits: Limits,
    },
    /// Print the tokens of a file, one per line
    Tokens { script: PathBuf },
    /// Print the syntax tree of a file
    Ast { script: PathBuf },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SIU_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let command = args.command.unwrap_or(Command::Repl {
        limits: Limits {
            max_depth: DEFAULT_MAX_CALL_DEPTH,
            max_eval_depth: DEFAULT_MAX_EVAL_DEPTH,
            max_steps: None,
        },
    });
    match execute(command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn execute(command: Command) -> Result<()> {
    match command {
        Command::Run { script, limits } => {
            let source = fs::read_to_string(&script)?;
            tracing::debug!(script = %script.display(), "running script");
            Interpreter::with_config(limits.into()).run_source(&source)?;
            Ok(())
        }
        Command::Eval { source, limits } => {
            let value = Interpreter::with_config(limits.into()).run_source(&source)?;
            if !value.is_null() {
                println!("{value}");
            }
            Ok(())
        }
        Command::Repl { limits } => Repl::with_config(limits.into()).run(),
        Command::Tokens { script } => {
            let source = fs::read_to_string(&script)?;
            for token in Lexer::new(&source) {
                let token = token.map_err(|diag| SiuError::from(diag.with_source(&source)))?;
                let position = token.span.position;
                println!("{position}\t{}\t{}", token.kind, token.lexeme);
            }
            Ok(())
        }
        Command::Ast { script } => {
            let source = fs::read_to_string(&script)?;
            let program = parser::parse_program(&source)
                .map_err(|diag| SiuError::from(diag.with_source(&source)))?;
            print!("{}", printer::render_program(&program));
            Ok(())
        }
    }
}
