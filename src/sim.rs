//! A tiny model of the x86-64 machine state touched by generated code.
//!
//! [`run`] executes an [`Inst`] list the way the CPU would and returns what
//! ends up in `%rax` at `ret`. It lets the CLI print the value of an
//! expression without an assembler, and lets tests check the generated code
//! itself rather than the AST.

use snafu::Snafu;

use crate::codegen::{Cond, Inst, Reg};

pub type SimResult<T> = Result<T, SimError>;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum SimError {
  #[snafu(display("instruction {pc}: division by zero"))]
  DivisionByZero { pc: usize },

  #[snafu(display("instruction {pc}: quotient does not fit in 64 bits"))]
  DivisionOverflow { pc: usize },

  #[snafu(display("instruction {pc}: pop from empty stack"))]
  StackUnderflow { pc: usize },

  #[snafu(display("instruction {pc}: condition tested before any cmp"))]
  UndefinedFlags { pc: usize },

  #[snafu(display("fell off the end of the program without ret"))]
  MissingReturn,
}

/// Flags are kept as the two compared operands; each `set<cc>` recomputes
/// its signed predicate from them.
#[derive(Debug, Default)]
struct Machine {
  rax: i64,
  rdx: i64,
  rdi: i64,
  flags: Option<(i64, i64)>,
  stack: Vec<i64>,
}

impl Machine {
  fn read(&self, reg: Reg) -> i64 {
    match reg {
      Reg::Rax => self.rax,
      Reg::Rdi => self.rdi,
      Reg::Al => self.rax & 0xff,
    }
  }

  fn write(&mut self, reg: Reg, value: i64) {
    match reg {
      Reg::Rax => self.rax = value,
      Reg::Rdi => self.rdi = value,
      Reg::Al => self.rax = (self.rax & !0xff) | (value & 0xff),
    }
  }

  fn step(&mut self, pc: usize, inst: &Inst) -> SimResult<()> {
    match *inst {
      Inst::Mov { imm, dst } => self.write(dst, imm),
      Inst::Push(reg) => {
        let value = self.read(reg);
        self.stack.push(value);
      }
      Inst::Pop(reg) => {
        let value = self.stack.pop().ok_or(SimError::StackUnderflow { pc })?;
        self.write(reg, value);
      }
      Inst::Add { src, dst } => self.write(dst, self.read(dst).wrapping_add(self.read(src))),
      Inst::Sub { src, dst } => self.write(dst, self.read(dst).wrapping_sub(self.read(src))),
      Inst::Imul { src, dst } => self.write(dst, self.read(dst).wrapping_mul(self.read(src))),
      Inst::Cqo => self.rdx = if self.rax < 0 { -1 } else { 0 },
      Inst::Idiv(reg) => self.idiv(pc, self.read(reg))?,
      Inst::Neg(reg) => self.write(reg, self.read(reg).wrapping_neg()),
      Inst::Cmp { lhs, rhs } => self.flags = Some((self.read(lhs), self.read(rhs))),
      Inst::Set { cond, dst } => {
        let (a, b) = self.flags.ok_or(SimError::UndefinedFlags { pc })?;
        let bit = match cond {
          Cond::Eq => a == b,
          Cond::Ne => a != b,
          Cond::Lt => a < b,
          Cond::Le => a <= b,
        };
        self.write(dst, i64::from(bit));
      }
      Inst::Movzb { src, dst } => self.write(dst, self.read(src) & 0xff),
      // Handled by `run`.
      Inst::Ret => {}
    }
    Ok(())
  }

  /// 128-bit `%rdx:%rax` divided by `divisor`, truncating.
  fn idiv(&mut self, pc: usize, divisor: i64) -> SimResult<()> {
    if divisor == 0 {
      return DivisionByZeroSnafu { pc }.fail();
    }
    let dividend = (i128::from(self.rdx) << 64) | i128::from(self.rax as u64);
    let divisor = i128::from(divisor);
    let quotient =
      i64::try_from(dividend / divisor).map_err(|_| SimError::DivisionOverflow { pc })?;
    // |remainder| < |divisor|, so it always fits.
    let remainder = (dividend % divisor) as i64;
    self.rax = quotient;
    self.rdx = remainder;
    Ok(())
  }
}

/// Execute `insts` from the top and return `%rax` at the first `ret`.
pub fn run(insts: &[Inst]) -> SimResult<i64> {
  let mut machine = Machine::default();
  for (pc, inst) in insts.iter().enumerate() {
    if *inst == Inst::Ret {
      tracing::trace!(pc, rax = machine.rax, "returned");
      return Ok(machine.rax);
    }
    machine.step(pc, inst)?;
  }
  MissingReturnSnafu.fail()
}
