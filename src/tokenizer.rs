//! Splits an expression into operator and integer tokens.
//!
//! `<=` and friends are tried before `<`, so the longest operator at each
//! offset wins. Tokens only record spans; their text is sliced back out of
//! the source on demand.

use crate::error::{CompileError, CompileResult};

const TWO_CHAR_PUNCTUATORS: [&str; 4] = ["==", "!=", "<=", ">="];
const ONE_CHAR_PUNCTUATORS: &str = "+-*/()<>";

/// What a token is, as far as the parser cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Punctuator,
  Num,
  Eof,
}

/// A lexeme located by byte span. Only `Num` tokens carry a `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub value: Option<i64>,
  pub loc: usize,
  pub len: usize,
}

impl Token {
  pub fn new(kind: TokenKind, loc: usize, len: usize, value: Option<i64>) -> Self {
    Self {
      kind,
      value,
      loc,
      len,
    }
  }
}

/// Scan `input` left to right. The result always ends with one zero-length
/// `Eof` token at `input.len()`.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let mut pos = 0;

  while let Some(c) = input[pos..].chars().next() {
    if c.is_ascii_whitespace() {
      pos += 1;
      continue;
    }

    let rest = &input[pos..];
    let (kind, len, value) = if let Some(op) = TWO_CHAR_PUNCTUATORS
      .into_iter()
      .find(|op| rest.starts_with(op))
    {
      (TokenKind::Punctuator, op.len(), None)
    } else if ONE_CHAR_PUNCTUATORS.contains(c) {
      (TokenKind::Punctuator, 1, None)
    } else if c.is_ascii_digit() {
      let len = rest.bytes().take_while(u8::is_ascii_digit).count();
      let value = rest[..len]
        .parse::<i64>()
        .map_err(|err| CompileError::invalid_number(input, pos, err))?;
      (TokenKind::Num, len, Some(value))
    } else {
      return Err(CompileError::invalid_token(input, pos, c));
    };

    tokens.push(Token::new(kind, pos, len, value));
    pos += len;
  }

  tokens.push(Token::new(TokenKind::Eof, input.len(), 0, None));
  tracing::trace!(count = tokens.len(), "tokenized input");
  Ok(tokens)
}

/// Source text covered by `token`.
pub fn token_text<'a>(token: &Token, source: &'a str) -> &'a str {
  let end = token.loc + token.len;
  &source[token.loc..end]
}

/// Token text as quoted in error messages, `EOF` at the end of input.
pub fn describe_token(token: Option<&Token>, source: &str) -> String {
  token
    .filter(|t| t.kind != TokenKind::Eof)
    .map_or_else(|| "EOF".to_string(), |t| token_text(t, source).to_string())
}
