//! Constant folding of a parsed expression.
//!
//! Uses the same integer semantics as the generated x86-64 code: arithmetic
//! wraps on overflow, division truncates toward zero and comparisons yield
//! 0 or 1. The two cases where `idiv` traps are reported as errors.

use snafu::Snafu;

use crate::parser::{AstNode, BinaryOp};

pub type EvalResult<T> = Result<T, EvalError>;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum EvalError {
  #[snafu(display("division by zero"))]
  DivisionByZero,

  #[snafu(display("division overflow: {lhs} / {rhs}"))]
  DivisionOverflow { lhs: i64, rhs: i64 },
}

pub fn eval(node: &AstNode) -> EvalResult<i64> {
  match node {
    AstNode::Num { value } => Ok(*value),
    AstNode::Neg { operand } => Ok(eval(operand)?.wrapping_neg()),
    AstNode::Binary { op, lhs, rhs } => {
      let a = eval(lhs)?;
      let b = eval(rhs)?;
      apply(*op, a, b)
    }
  }
}

/// Apply a binary operator the way the emitted instruction sequence does.
pub fn apply(op: BinaryOp, a: i64, b: i64) -> EvalResult<i64> {
  let value = match op {
    BinaryOp::Add => a.wrapping_add(b),
    BinaryOp::Sub => a.wrapping_sub(b),
    BinaryOp::Mul => a.wrapping_mul(b),
    BinaryOp::Div => {
      if b == 0 {
        return DivisionByZeroSnafu.fail();
      }
      a.checked_div(b)
        .ok_or(EvalError::DivisionOverflow { lhs: a, rhs: b })?
    }
    BinaryOp::Eq => i64::from(a == b),
    BinaryOp::Ne => i64::from(a != b),
    BinaryOp::Lt => i64::from(a < b),
    BinaryOp::Le => i64::from(a <= b),
  };
  Ok(value)
}
