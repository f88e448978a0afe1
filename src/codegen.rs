//! Code generation: lower the parsed AST into x86-64 assembly.
//!
//! The emitter uses a simple stack machine: every expression leaves a single
//! value on the stack, binary operators pop their right operand into `%rdi`
//! and their left operand into `%rax`, then push the result back. Lowering
//! produces a typed [`Inst`] list first; rendering to text for a given
//! [`Syntax`] is a separate step so the same list can also be simulated.

use std::fmt;

use crate::parser::{AstNode, BinaryOp};

/// Assembly dialect of the rendered output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Syntax {
  /// GNU AT&T syntax, `op src, dst`.
  #[default]
  Att,
  /// Intel syntax without register prefixes, `op dst, src`.
  Intel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
  Rax,
  Rdi,
  Al,
}

impl Reg {
  fn name(self) -> &'static str {
    match self {
      Self::Rax => "rax",
      Self::Rdi => "rdi",
      Self::Al => "al",
    }
  }
}

/// Condition tested by a `set<cc>` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
  Eq,
  Ne,
  Lt,
  Le,
}

impl Cond {
  fn suffix(self) -> &'static str {
    match self {
      Self::Eq => "e",
      Self::Ne => "ne",
      Self::Lt => "l",
      Self::Le => "le",
    }
  }
}

/// The handful of instructions the generator ever emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inst {
  Mov { imm: i64, dst: Reg },
  Push(Reg),
  Pop(Reg),
  Add { src: Reg, dst: Reg },
  Sub { src: Reg, dst: Reg },
  Imul { src: Reg, dst: Reg },
  /// Sign-extend `%rax` into `%rdx:%rax`.
  Cqo,
  /// Signed divide `%rdx:%rax`; quotient to `%rax`, remainder to `%rdx`.
  Idiv(Reg),
  Neg(Reg),
  /// Set flags from `lhs - rhs`.
  Cmp { lhs: Reg, rhs: Reg },
  Set { cond: Cond, dst: Reg },
  Movzb { src: Reg, dst: Reg },
  Ret,
}

impl Inst {
  /// Render one instruction, without indentation.
  pub fn render(&self, syntax: Syntax) -> String {
    match syntax {
      Syntax::Att => self.render_att(),
      Syntax::Intel => self.render_intel(),
    }
  }

  fn render_att(&self) -> String {
    let r = |reg: &Reg| format!("%{}", reg.name());
    match self {
      Inst::Mov { imm, dst } => format!("mov ${imm}, {}", r(dst)),
      Inst::Push(reg) => format!("push {}", r(reg)),
      Inst::Pop(reg) => format!("pop {}", r(reg)),
      Inst::Add { src, dst } => format!("add {}, {}", r(src), r(dst)),
      Inst::Sub { src, dst } => format!("sub {}, {}", r(src), r(dst)),
      Inst::Imul { src, dst } => format!("imul {}, {}", r(src), r(dst)),
      Inst::Cqo => "cqo".to_string(),
      Inst::Idiv(reg) => format!("idiv {}", r(reg)),
      Inst::Neg(reg) => format!("neg {}", r(reg)),
      Inst::Cmp { lhs, rhs } => format!("cmp {}, {}", r(rhs), r(lhs)),
      Inst::Set { cond, dst } => format!("set{} {}", cond.suffix(), r(dst)),
      Inst::Movzb { src, dst } => format!("movzb {}, {}", r(src), r(dst)),
      Inst::Ret => "ret".to_string(),
    }
  }

  fn render_intel(&self) -> String {
    let r = |reg: &Reg| reg.name();
    match self {
      Inst::Mov { imm, dst } => format!("mov {}, {imm}", r(dst)),
      Inst::Push(reg) => format!("push {}", r(reg)),
      Inst::Pop(reg) => format!("pop {}", r(reg)),
      Inst::Add { src, dst } => format!("add {}, {}", r(dst), r(src)),
      Inst::Sub { src, dst } => format!("sub {}, {}", r(dst), r(src)),
      Inst::Imul { src, dst } => format!("imul {}, {}", r(dst), r(src)),
      Inst::Cqo => "cqo".to_string(),
      Inst::Idiv(reg) => format!("idiv {}", r(reg)),
      Inst::Neg(reg) => format!("neg {}", r(reg)),
      Inst::Cmp { lhs, rhs } => format!("cmp {}, {}", r(lhs), r(rhs)),
      Inst::Set { cond, dst } => format!("set{} {}", cond.suffix(), r(dst)),
      Inst::Movzb { src, dst } => format!("movzx {}, {}", r(dst), r(src)),
      Inst::Ret => "ret".to_string(),
    }
  }
}

/// A lowered expression ready to be printed or simulated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
  pub insts: Vec<Inst>,
  pub syntax: Syntax,
}

impl Assembly {
  pub fn new(insts: Vec<Inst>, syntax: Syntax) -> Self {
    Self { insts, syntax }
  }

  /// Prologue directives followed by one line per instruction.
  pub fn lines(&self) -> Vec<String> {
    let mut lines = Vec::with_capacity(self.insts.len() + 3);
    if self.syntax == Syntax::Intel {
      lines.push(".intel_syntax noprefix".to_string());
    }
    lines.push(".global main".to_string());
    lines.push("main:".to_string());
    lines.extend(
      self
        .insts
        .iter()
        .map(|inst| format!("    {}", inst.render(self.syntax))),
    );
    lines
  }
}

impl fmt::Display for Assembly {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for line in self.lines() {
      writeln!(f, "{line}")?;
    }
    Ok(())
  }
}

/// Emit assembly text lines for an expression.
pub fn generate(node: &AstNode, syntax: Syntax) -> Vec<String> {
  Assembly::new(lower(node), syntax).lines()
}

/// Lower an expression to instructions, ending with the value in `%rax` and a `ret`.
pub fn lower(node: &AstNode) -> Vec<Inst> {
  let mut insts = Vec::new();
  emit_expr(node, &mut insts);
  insts.push(Inst::Pop(Reg::Rax));
  insts.push(Inst::Ret);
  tracing::debug!(count = insts.len(), "lowered expression");
  insts
}

/// Emit stack-based code for a single expression node.
fn emit_expr(node: &AstNode, insts: &mut Vec<Inst>) {
  match node {
    AstNode::Num { value } => {
      insts.push(Inst::Mov {
        imm: *value,
        dst: Reg::Rax,
      });
      insts.push(Inst::Push(Reg::Rax));
    }
    AstNode::Neg { operand } => {
      emit_expr(operand, insts);
      insts.push(Inst::Pop(Reg::Rax));
      insts.push(Inst::Neg(Reg::Rax));
      insts.push(Inst::Push(Reg::Rax));
    }
    AstNode::Binary { op, lhs, rhs } => {
      emit_expr(lhs, insts);
      emit_expr(rhs, insts);
      insts.push(Inst::Pop(Reg::Rdi));
      insts.push(Inst::Pop(Reg::Rax));
      emit_binary(*op, insts);
      insts.push(Inst::Push(Reg::Rax));
    }
  }
}

/// Combine `%rax` (lhs) and `%rdi` (rhs) into `%rax`.
fn emit_binary(op: BinaryOp, insts: &mut Vec<Inst>) {
  let (src, dst) = (Reg::Rdi, Reg::Rax);
  match op {
    BinaryOp::Add => insts.push(Inst::Add { src, dst }),
    BinaryOp::Sub => insts.push(Inst::Sub { src, dst }),
    BinaryOp::Mul => insts.push(Inst::Imul { src, dst }),
    BinaryOp::Div => insts.extend([Inst::Cqo, Inst::Idiv(src)]),
    BinaryOp::Eq => emit_compare(Cond::Eq, insts),
    BinaryOp::Ne => emit_compare(Cond::Ne, insts),
    BinaryOp::Lt => emit_compare(Cond::Lt, insts),
    BinaryOp::Le => emit_compare(Cond::Le, insts),
  }
}

/// Set `%rax` to 1 when `%rax <cond> %rdi` holds, 0 otherwise.
fn emit_compare(cond: Cond, insts: &mut Vec<Inst>) {
  insts.extend([
    Inst::Cmp {
      lhs: Reg::Rax,
      rhs: Reg::Rdi,
    },
    Inst::Set { cond, dst: Reg::Al },
    Inst::Movzb {
      src: Reg::Al,
      dst: Reg::Rax,
    },
  ]);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::parse;
  use crate::tokenizer::tokenize;

  fn ast(source: &str) -> AstNode {
    parse(tokenize(source).unwrap(), source).unwrap()
  }

  #[test]
  fn number_in_att_syntax() {
    assert_eq!(
      generate(&ast("42"), Syntax::Att),
      [
        ".global main",
        "main:",
        "    mov $42, %rax",
        "    push %rax",
        "    pop %rax",
        "    ret",
      ]
    );
  }

  #[test]
  fn addition_in_att_syntax() {
    assert_eq!(
      generate(&ast("1 + 2"), Syntax::Att),
      [
        ".global main",
        "main:",
        "    mov $1, %rax",
        "    push %rax",
        "    mov $2, %rax",
        "    push %rax",
        "    pop %rdi",
        "    pop %rax",
        "    add %rdi, %rax",
        "    push %rax",
        "    pop %rax",
        "    ret",
      ]
    );
  }

  #[test]
  fn intel_syntax_has_directive_and_swapped_operands() {
    let lines = generate(&ast("3 - 1"), Syntax::Intel);
    assert_eq!(lines[0], ".intel_syntax noprefix");
    assert_eq!(lines[1], ".global main");
    assert!(lines.contains(&"    mov rax, 3".to_string()));
    assert!(lines.contains(&"    sub rax, rdi".to_string()));
    assert_eq!(lines.last().map(String::as_str), Some("    ret"));
  }

  #[test]
  fn division_sign_extends_before_idiv() {
    let insts = lower(&ast("7 / 2"));
    let cqo = insts.iter().position(|i| *i == Inst::Cqo).unwrap();
    assert_eq!(insts[cqo + 1], Inst::Idiv(Reg::Rdi));
  }

  #[test]
  fn comparison_materialises_zero_or_one() {
    let lines = generate(&ast("1 <= 2"), Syntax::Att);
    let body: Vec<&str> = lines.iter().map(|l| l.trim()).collect();
    let cmp = body.iter().position(|l| *l == "cmp %rdi, %rax").unwrap();
    assert_eq!(body[cmp + 1], "setle %al");
    assert_eq!(body[cmp + 2], "movzb %al, %rax");

    let intel = generate(&ast("1 != 2"), Syntax::Intel);
    assert!(intel.contains(&"    cmp rax, rdi".to_string()));
    assert!(intel.contains(&"    setne al".to_string()));
    assert!(intel.contains(&"    movzx rax, al".to_string()));
  }

  #[test]
  fn each_operator_lowers_after_popping_both_operands() {
    let compare = |cond| {
      vec![
        Inst::Cmp {
          lhs: Reg::Rax,
          rhs: Reg::Rdi,
        },
        Inst::Set { cond, dst: Reg::Al },
        Inst::Movzb {
          src: Reg::Al,
          dst: Reg::Rax,
        },
      ]
    };
    let (src, dst) = (Reg::Rdi, Reg::Rax);
    let cases = [
      ("8 + 2", vec![Inst::Add { src, dst }]),
      ("8 - 2", vec![Inst::Sub { src, dst }]),
      ("8 * 2", vec![Inst::Imul { src, dst }]),
      ("8 / 2", vec![Inst::Cqo, Inst::Idiv(src)]),
      ("8 == 2", compare(Cond::Eq)),
      ("8 != 2", compare(Cond::Ne)),
      ("8 < 2", compare(Cond::Lt)),
      ("8 <= 2", compare(Cond::Le)),
    ];

    for (source, expected) in cases {
      let insts = lower(&ast(source));
      // mov, push, mov, push, pop rdi, pop rax, <op>, push, pop, ret
      let op = &insts[6..insts.len() - 3];
      assert_eq!(op, expected.as_slice(), "{source}");
      assert_eq!(insts[4], Inst::Pop(Reg::Rdi));
      assert_eq!(insts[5], Inst::Pop(Reg::Rax));
    }
  }

  #[test]
  fn negation_uses_neg_not_sub() {
    let insts = lower(&ast("-5"));
    assert!(insts.contains(&Inst::Neg(Reg::Rax)));
    assert!(!insts.iter().any(|i| matches!(i, Inst::Sub { .. })));
  }

  #[test]
  fn output_is_stable_across_runs() {
    let first = Assembly::new(lower(&ast("(3 + 5) * 2 - 4 / 2")), Syntax::Att).to_string();
    let second = Assembly::new(lower(&ast("(3 + 5) * 2 - 4 / 2")), Syntax::Att).to_string();
    assert_eq!(first, second);
    assert!(first.ends_with("    ret\n"));
  }

  #[test]
  fn stack_is_balanced() {
    let insts = lower(&ast("1 + 2 * (3 - -4) == 5"));
    let depth = insts.iter().fold(0i64, |depth, inst| match inst {
      Inst::Push(_) => depth + 1,
      Inst::Pop(_) => depth - 1,
      _ => depth,
    });
    assert_eq!(depth, 0);
  }
}
