//! `minipy` library crate.
//!
//! High-level layout:
//! - frontend: `lexer` + `parser` produce the statement tree (`statement`)
//! - shared runtime object/value model: `runtime`
//! - execution: statements evaluate themselves against a closure and a
//!   context that collects program output
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod statement;
pub mod token;

use anyhow::Result;

/// Lexes, parses, and executes `source`, returning everything it printed.
pub fn interpret(source: &str) -> Result<String> {
    let lexer = lexer::Lexer::new(source)?;
    let program = parser::parse(lexer)?;
    let mut output = String::new();
    statement::execute_program(&program, &mut output)?;
    Ok(output)
}
