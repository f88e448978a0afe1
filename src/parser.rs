//! Recursive-descent parser producing an expression AST.
//!
//! The parser mirrors the classic chibicc structure: one helper per
//! precedence level, each folding its operators left-associatively. `>` and
//! `>=` never reach the AST; they are rewritten as `<` and `<=` with the
//! operands swapped, so the back-end only deals with "less than" comparisons.

use std::fmt;

use crate::error::{CompileError, CompileResult};
use crate::tokenizer::{Token, TokenKind, describe_token, token_text};

/// Binary operators recognised by the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Eq,
  Ne,
  Lt,
  Le,
}

impl BinaryOp {
  pub fn symbol(self) -> &'static str {
    match self {
      Self::Add => "+",
      Self::Sub => "-",
      Self::Mul => "*",
      Self::Div => "/",
      Self::Eq => "==",
      Self::Ne => "!=",
      Self::Lt => "<",
      Self::Le => "<=",
    }
  }
}

/// Expression tree produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AstNode {
  Num {
    value: i64,
  },
  Neg {
    operand: Box<AstNode>,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<AstNode>,
    rhs: Box<AstNode>,
  },
}

impl AstNode {
  pub fn number(value: i64) -> Self {
    Self::Num { value }
  }

  pub fn unary_neg(operand: AstNode) -> Self {
    Self::Neg {
      operand: Box::new(operand),
    }
  }

  pub fn binary(op: BinaryOp, lhs: AstNode, rhs: AstNode) -> Self {
    Self::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    }
  }
}

/// Prefix notation, e.g. `(+ 1 (* 2 3))`. Handy in logs and tests.
impl fmt::Display for AstNode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Num { value } => write!(f, "{value}"),
      Self::Neg { operand } => write!(f, "(neg {operand})"),
      Self::Binary { op, lhs, rhs } => write!(f, "({} {lhs} {rhs})", op.symbol()),
    }
  }
}

/// Deepest run of parentheses and unary signs the parser descends into.
pub const MAX_NESTING: usize = 128;

/// Tallest expression tree accepted. Operator chains grow the tree without
/// parser recursion, but codegen and evaluation recurse over it.
pub const MAX_TREE_HEIGHT: usize = 1024;

/// Parse a single expression that must span the whole token stream.
pub fn parse(tokens: Vec<Token>, source: &str) -> CompileResult<AstNode> {
  let mut stream = TokenStream::new(tokens, source);
  let tree = parse_expr(&mut stream)?;

  if !stream.is_eof() {
    let (loc, got) = match stream.peek() {
      Some(token) => (token.loc, describe_token(Some(token), source)),
      None => (source.len(), "EOF".to_string()),
    };
    return Err(CompileError::trailing_input(source, loc, got));
  }

  tracing::debug!(ast = %tree.node, height = tree.height, "parsed expression");
  Ok(tree.node)
}

/// A parsed node and the height of the tree below it.
struct Subtree {
  node: AstNode,
  height: usize,
}

impl Subtree {
  fn leaf(node: AstNode) -> Self {
    Self { node, height: 1 }
  }
}

fn parse_expr(stream: &mut TokenStream) -> CompileResult<Subtree> {
  parse_equality(stream)
}

fn parse_equality(stream: &mut TokenStream) -> CompileResult<Subtree> {
  let mut tree = parse_relational(stream)?;

  loop {
    let op_str = match stream.peek_punctuator() {
      Some(symbol @ ("==" | "!=")) => symbol,
      _ => break,
    };

    let op = match op_str {
      "==" => BinaryOp::Eq,
      "!=" => BinaryOp::Ne,
      _ => unreachable!(),
    };

    let loc = stream.loc();
    stream.skip(op_str)?;
    let rhs = parse_relational(stream)?;
    tree = stream.binary(op, tree, rhs, loc)?;
  }

  Ok(tree)
}

fn parse_relational(stream: &mut TokenStream) -> CompileResult<Subtree> {
  let mut tree = parse_add(stream)?;

  loop {
    let op_str = match stream.peek_punctuator() {
      Some(symbol @ ("<" | "<=" | ">" | ">=")) => symbol,
      _ => break,
    };

    // `a > b` is `b < a`, `a >= b` is `b <= a`.
    let (op, swapped) = match op_str {
      "<" => (BinaryOp::Lt, false),
      "<=" => (BinaryOp::Le, false),
      ">" => (BinaryOp::Lt, true),
      ">=" => (BinaryOp::Le, true),
      _ => unreachable!(),
    };

    let loc = stream.loc();
    stream.skip(op_str)?;
    let rhs = parse_add(stream)?;
    tree = if swapped {
      stream.binary(op, rhs, tree, loc)?
    } else {
      stream.binary(op, tree, rhs, loc)?
    };
  }

  Ok(tree)
}

fn parse_add(stream: &mut TokenStream) -> CompileResult<Subtree> {
  let mut tree = parse_mul(stream)?;

  loop {
    let op_str = match stream.peek_punctuator() {
      Some(symbol @ ("+" | "-")) => symbol,
      _ => break,
    };

    let op = match op_str {
      "+" => BinaryOp::Add,
      "-" => BinaryOp::Sub,
      _ => unreachable!(),
    };

    let loc = stream.loc();
    stream.skip(op_str)?;
    let rhs = parse_mul(stream)?;
    tree = stream.binary(op, tree, rhs, loc)?;
  }

  Ok(tree)
}

fn parse_mul(stream: &mut TokenStream) -> CompileResult<Subtree> {
  let mut tree = parse_unary(stream)?;

  loop {
    let op_str = match stream.peek_punctuator() {
      Some(symbol @ ("*" | "/")) => symbol,
      _ => break,
    };

    let op = match op_str {
      "*" => BinaryOp::Mul,
      "/" => BinaryOp::Div,
      _ => unreachable!(),
    };

    let loc = stream.loc();
    stream.skip(op_str)?;
    let rhs = parse_unary(stream)?;
    tree = stream.binary(op, tree, rhs, loc)?;
  }

  Ok(tree)
}

fn parse_unary(stream: &mut TokenStream) -> CompileResult<Subtree> {
  let loc = stream.loc();

  if stream.equal("+") {
    stream.enter(loc)?;
    let operand = parse_unary(stream)?;
    stream.leave();
    return Ok(operand);
  }

  if stream.equal("-") {
    stream.enter(loc)?;
    let operand = parse_unary(stream)?;
    stream.leave();
    return stream.neg(operand, loc);
  }

  parse_primary(stream)
}

fn parse_primary(stream: &mut TokenStream) -> CompileResult<Subtree> {
  let loc = stream.loc();

  if stream.equal("(") {
    stream.enter(loc)?;
    let tree = parse_expr(stream)?;
    stream.skip(")")?;
    stream.leave();
    return Ok(tree);
  }

  let value = stream.get_number()?;
  Ok(Subtree::leaf(AstNode::number(value)))
}

/// Lightweight cursor over the token vector.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
  depth: usize,
}

impl<'a> TokenStream<'a> {
  /// Take ownership of the token stream; the parser will advance `pos` as it consumes input.
  fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
      depth: 0,
    }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  /// Byte offset of the current token.
  fn loc(&self) -> usize {
    self.peek().map_or(self.source.len(), |token| token.loc)
  }

  /// Text of the current token when it is a punctuator.
  fn peek_punctuator(&self) -> Option<&'a str> {
    let source = self.source;
    self
      .peek()
      .filter(|token| token.kind == TokenKind::Punctuator)
      .map(|token| token_text(token, source))
  }

  /// Step past the current token, never beyond `Eof`.
  fn advance(&mut self) {
    if !self.is_eof() && self.pos < self.tokens.len() {
      self.pos += 1;
    }
  }

  /// Consume the current token if it matches the provided punctuator.
  fn equal(&mut self, op: &str) -> bool {
    if self.peek_punctuator() == Some(op) {
      self.advance();
      return true;
    }
    false
  }

  fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s) {
      return Ok(());
    }

    let (loc, got) = match self.peek() {
      Some(token) => (token.loc, describe_token(Some(token), self.source)),
      None => (self.source.len(), "EOF".to_string()),
    };
    Err(CompileError::expected_token(self.source, loc, s, got))
  }

  /// Parse the current token as an integer literal.
  fn get_number(&mut self) -> CompileResult<i64> {
    let Some(token) = self.peek() else {
      return Err(CompileError::expected_number(
        self.source,
        self.source.len(),
        "EOF",
      ));
    };

    if token.kind == TokenKind::Num
      && let Some(value) = token.value
    {
      self.advance();
      return Ok(value);
    }

    let got = describe_token(Some(token), self.source);
    Err(CompileError::expected_number(self.source, token.loc, got))
  }

  fn is_eof(&self) -> bool {
    matches!(self.peek().map(|token| token.kind), Some(TokenKind::Eof))
  }

  /// Descend into a parenthesis or unary sign found at `loc`.
  fn enter(&mut self, loc: usize) -> CompileResult<()> {
    self.depth += 1;
    if self.depth > MAX_NESTING {
      return Err(CompileError::nesting_too_deep(self.source, loc, MAX_NESTING));
    }
    Ok(())
  }

  fn leave(&mut self) {
    self.depth -= 1;
  }

  fn neg(&self, operand: Subtree, loc: usize) -> CompileResult<Subtree> {
    let height = self.check_height(operand.height + 1, loc)?;
    Ok(Subtree {
      node: AstNode::unary_neg(operand.node),
      height,
    })
  }

  fn binary(
    &self,
    op: BinaryOp,
    lhs: Subtree,
    rhs: Subtree,
    loc: usize,
  ) -> CompileResult<Subtree> {
    let height = self.check_height(lhs.height.max(rhs.height) + 1, loc)?;
    Ok(Subtree {
      node: AstNode::binary(op, lhs.node, rhs.node),
      height,
    })
  }

  fn check_height(&self, height: usize, loc: usize) -> CompileResult<usize> {
    if height > MAX_TREE_HEIGHT {
      return Err(CompileError::nesting_too_deep(
        self.source,
        loc,
        MAX_TREE_HEIGHT,
      ));
    }
    Ok(height)
  }
}
