//! Shared error utilities used across the compilation pipeline.
//!
//! Diagnostics are kept lightweight on purpose – positioned errors format
//! the offending source line with a caret under the bad byte, in the style of
//! chibicc. Errors that have no position (evaluation faults, CLI I/O) live in the
//! same enum so every failure ends up in [`report`].

use std::fmt;
use std::io;
use std::num::ParseIntError;
use std::process;

use snafu::Snafu;

use crate::consteval::EvalError;
use crate::sim::SimError;

pub type CompileResult<T> = Result<T, CompileError>;

/// Source context for a positioned error: the line holding the offset and a
/// caret marker aligned under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
  pub loc: usize,
  pub line: String,
  pub marker: String,
}

impl Diagnostic {
  /// Anchor a diagnostic at byte offset `loc` of `source`.
  pub fn new(source: &str, loc: usize) -> Self {
    let mut safe_loc = loc.min(source.len());
    while !source.is_char_boundary(safe_loc) {
      safe_loc -= 1;
    }

    let line_start = source[..safe_loc].rfind('\n').map_or(0, |i| i + 1);
    let line_end = source[safe_loc..]
      .find('\n')
      .map_or(source.len(), |i| safe_loc + i);
    let line = source[line_start..line_end].trim_end_matches('\r');

    let column = source[line_start..safe_loc].chars().count();
    Self {
      loc,
      line: line.to_string(),
      marker: format!("{}^", " ".repeat(column)),
    }
  }
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}\n{}", self.line, self.marker)
  }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CompileError {
  #[snafu(display("{diag} invalid token: '{found}'"))]
  InvalidToken { diag: Diagnostic, found: char },

  #[snafu(display("{diag} invalid number: {source}"))]
  InvalidNumber {
    diag: Diagnostic,
    source: ParseIntError,
  },

  #[snafu(display("{diag} expected \"{expected}\", but got \"{found}\""))]
  ExpectedToken {
    diag: Diagnostic,
    expected: String,
    found: String,
  },

  #[snafu(display("{diag} expected a number, but got \"{found}\""))]
  ExpectedNumber { diag: Diagnostic, found: String },

  #[snafu(display("{diag} unexpected token \"{found}\" after expression"))]
  TrailingInput { diag: Diagnostic, found: String },

  #[snafu(display("{diag} expression nests deeper than {limit} levels"))]
  NestingTooDeep { diag: Diagnostic, limit: usize },

  #[snafu(display("cannot evaluate expression: {source}"))]
  Evaluate { source: EvalError },

  #[snafu(display("generated code faulted: {source}"))]
  Execute { source: SimError },

  #[snafu(display("cannot read expression from stdin: {source}"))]
  ReadInput { source: io::Error },

  #[snafu(display("cannot write {path}: {source}"))]
  WriteOutput { path: String, source: io::Error },
}

impl CompileError {
  pub fn invalid_token(source: &str, loc: usize, found: char) -> Self {
    Self::InvalidToken {
      diag: Diagnostic::new(source, loc),
      found,
    }
  }

  pub fn invalid_number(source: &str, loc: usize, err: ParseIntError) -> Self {
    Self::InvalidNumber {
      diag: Diagnostic::new(source, loc),
      source: err,
    }
  }

  pub fn expected_token(
    source: &str,
    loc: usize,
    expected: impl Into<String>,
    found: impl Into<String>,
  ) -> Self {
    Self::ExpectedToken {
      diag: Diagnostic::new(source, loc),
      expected: expected.into(),
      found: found.into(),
    }
  }

  pub fn expected_number(source: &str, loc: usize, found: impl Into<String>) -> Self {
    Self::ExpectedNumber {
      diag: Diagnostic::new(source, loc),
      found: found.into(),
    }
  }

  pub fn trailing_input(source: &str, loc: usize, found: impl Into<String>) -> Self {
    Self::TrailingInput {
      diag: Diagnostic::new(source, loc),
      found: found.into(),
    }
  }

  pub fn nesting_too_deep(source: &str, loc: usize, limit: usize) -> Self {
    Self::NestingTooDeep {
      diag: Diagnostic::new(source, loc),
      limit,
    }
  }

  /// Source context of a positioned error, `None` for top-level failures.
  pub fn diagnostic(&self) -> Option<&Diagnostic> {
    match self {
      Self::InvalidToken { diag, .. }
      | Self::InvalidNumber { diag, .. }
      | Self::ExpectedToken { diag, .. }
      | Self::ExpectedNumber { diag, .. }
      | Self::TrailingInput { diag, .. }
      | Self::NestingTooDeep { diag, .. } => Some(diag),
      Self::Evaluate { .. }
      | Self::Execute { .. }
      | Self::ReadInput { .. }
      | Self::WriteOutput { .. } => None,
    }
  }

  /// Byte offset the error points at, if it has one.
  pub fn loc(&self) -> Option<usize> {
    self.diagnostic().map(|diag| diag.loc)
  }
}

/// Print the error to stderr and abort the process with status 1.
pub fn report(err: &CompileError) -> ! {
  tracing::debug!(loc = ?err.loc(), "compilation aborted");
  eprintln!("{err}");
  process::exit(1)
}
