//! A Harvard-architecture language: a Turing-complete Control language for
//! effects and a provably halting Data language for values, kept apart by
//! the grammar and the AST types.

pub mod ast;
pub mod checker;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod number;
pub mod parser;
mod reverse;
pub mod symbols;
pub mod token;
pub mod trace;

pub use ast::{BlockId, Program};
pub use checker::{analyze, check_totality, Analysis};
pub use config::Config;
pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use error::{Error, ErrorKind, Result};
pub use interpreter::{Environment, ExecutionResult, Interpreter};
pub use number::NumericValue;
pub use parser::parse;
pub use trace::{Event, LogTracer, NoopTracer, Recorder, Tracer};

/// Checks and runs `program` with the default configuration.
pub fn run(program: &Program) -> Result<ExecutionResult> {
    Interpreter::new(program)?.run()
}
