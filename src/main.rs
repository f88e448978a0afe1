use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use snafu::ResultExt;
use tracing_subscriber::EnvFilter;

use exprcc::error::{ReadInputSnafu, WriteOutputSnafu};
use exprcc::{CompileResult, Syntax};

/// Compile an integer expression to x86-64 assembly.
#[derive(Parser, Debug)]
#[command(name = "exprcc", version)]
struct Args {
  /// Expression to compile; read from stdin when omitted. Put `--` before
  /// expressions such as `-(1+2)` that look like flags.
  #[arg(allow_negative_numbers = true)]
  expr: Option<String>,

  /// Write output to FILE instead of stdout.
  #[arg(short, long, value_name = "FILE")]
  output: Option<PathBuf>,

  /// Assembly dialect.
  #[arg(long, value_enum, default_value_t = SyntaxArg::Att)]
  syntax: SyntaxArg,

  /// Simulate the generated code and print the value it returns.
  #[arg(long, conflicts_with = "eval")]
  run: bool,

  /// Constant-fold the expression and print its value.
  #[arg(long)]
  eval: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SyntaxArg {
  Att,
  Intel,
}

impl From<SyntaxArg> for Syntax {
  fn from(arg: SyntaxArg) -> Self {
    match arg {
      SyntaxArg::Att => Syntax::Att,
      SyntaxArg::Intel => Syntax::Intel,
    }
  }
}

fn main() {
  // stdout carries the assembly, logs go to stderr.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("exprcc=warn")),
    )
    .with_writer(io::stderr)
    .with_ansi(false)
    .init();

  let args = Args::parse();
  if let Err(err) = run(&args) {
    exprcc::report(&err);
  }
}

fn run(args: &Args) -> CompileResult<()> {
  let source = match &args.expr {
    Some(expr) => expr.clone(),
    None => io::read_to_string(io::stdin()).context(ReadInputSnafu)?,
  };
  tracing::debug!(len = source.len(), "compiling");

  let output = if args.eval {
    format!("{}\n", exprcc::evaluate(&source)?)
  } else if args.run {
    format!("{}\n", exprcc::execute(&source)?)
  } else {
    exprcc::compile(&source, args.syntax.into())?.to_string()
  };

  match &args.output {
    Some(path) => fs::write(path, output).context(WriteOutputSnafu {
      path: path.display().to_string(),
    }),
    None => io::stdout()
      .lock()
      .write_all(output.as_bytes())
      .context(WriteOutputSnafu { path: "<stdout>" }),
  }
}
