//! Crate root: wires together the compilation pipeline.
//!
//! The stages are intentionally small and composable so they can be evolved
//! independently:
//! - `tokenizer` performs lexical analysis and produces a flat token stream.
//! - `parser` owns all syntactic knowledge and returns an expression AST.
//! - `codegen` lowers the AST into x86-64 assembly (AT&T or Intel syntax).
//! - `error` centralises reporting utilities shared by the other modules.
//!
//! `consteval` and `sim` compute the value of an expression, from the AST and
//! from the generated instructions respectively.

pub mod codegen;
pub mod consteval;
pub mod error;
pub mod parser;
pub mod sim;
pub mod tokenizer;


use snafu::ResultExt;

pub use codegen::{Assembly, Syntax};
pub use error::{CompileError, CompileResult, report};
use error::{EvaluateSnafu, ExecuteSnafu};
use parser::AstNode;

/// Tokenize and parse a source string.
pub fn parse_expression(source: &str) -> CompileResult<AstNode> {
  let tokens = tokenizer::tokenize(source)?;
  parser::parse(tokens, source)
}

/// Compile a source string into assembly for the given syntax.
pub fn compile(source: &str, syntax: Syntax) -> CompileResult<Assembly> {
  let ast = parse_expression(source)?;
  Ok(Assembly::new(codegen::lower(&ast), syntax))
}

/// Compile a source string into AT&T assembly.
pub fn generate_assembly(expr: &str) -> CompileResult<String> {
  Ok(compile(expr, Syntax::Att)?.to_string())
}

/// Value of the expression computed directly from its AST.
pub fn evaluate(source: &str) -> CompileResult<i64> {
  let ast = parse_expression(source)?;
  consteval::eval(&ast).context(EvaluateSnafu)
}

/// Value the generated code leaves in `%rax` when run.
pub fn execute(source: &str) -> CompileResult<i64> {
  let assembly = compile(source, Syntax::Att)?;
  sim::run(&assembly.insts).context(ExecuteSnafu)
}
