//! Lexical analysis: turns the raw input string into a vector of tokens.
//!
//! The tokenizer knows nothing about semantics beyond classifying words,
//! literals and punctuators. Multi-character punctuators are matched before
//! single-character ones to avoid ambiguity.

use std::fmt;

use log::trace;

use crate::error::{CompileError, CompileResult};

/// Kinds of tokens recognised by the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
  Ident,
  Keyword,
  Punctuator,
  Num,
  Str,
  Eof,
}

/// Thin wrapper for lexical information needed by later stages.
#[derive(Debug, Clone)]
pub struct Token {
  pub kind: TokenKind,
  /// Value of numeric and character literals.
  pub value: Option<i64>,
  /// `true` when a numeric literal does not fit in `int`.
  pub is_long: bool,
  /// Decoded contents of a string literal, NUL terminator included.
  pub bytes: Option<Vec<u8>>,
  pub loc: usize,
  pub len: usize,
}

impl Token {
  /// Convenience constructor to keep the `tokenize` loop readable.
  pub fn new(kind: TokenKind, loc: usize, len: usize, value: Option<i64>) -> Self {
    Self {
      kind,
      value,
      is_long: false,
      bytes: None,
      loc,
      len,
    }
  }
}

const KEYWORDS: &[&str] = &[
  "return", "if", "else", "for", "while", "do", "break", "continue", "sizeof", "void", "_Bool",
  "char", "short", "int", "long", "typedef", "static",
];

// Longest first, so that `<<=` wins over `<<` and `<`.
const PUNCTUATORS: &[&str] = &[
  "<<=", ">>=", "==", "!=", "<=", ">=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "&&", "||",
  "++", "--", "<<", ">>",
];

/// Lex the input into a flat vector of tokens terminated by an `Eof` marker.
pub fn tokenize(input: &str) -> CompileResult<Vec<Token>> {
  let mut tokens = Vec::new();
  let bytes = input.as_bytes();
  let mut i = 0;

  while i < bytes.len() {
    let c = bytes[i];
    if c.is_ascii_whitespace() {
      i += 1;
      continue;
    }

    if input[i..].starts_with("//") {
      i = input[i..].find('\n').map_or(bytes.len(), |end| i + end);
      continue;
    }

    if input[i..].starts_with("/*") {
      let Some(end) = input[i + 2..].find("*/") else {
        return Err(CompileError::tokenize_at(input, i, "unclosed block comment"));
      };
      i += end + 4;
      continue;
    }

    if c.is_ascii_digit() {
      let token = read_number(input, i)?;
      i += token.len;
      tokens.push(token);
      continue;
    }

    if c == b'"' {
      let token = read_string_literal(input, i)?;
      i += token.len;
      tokens.push(token);
      continue;
    }

    if c == b'\'' {
      let token = read_char_literal(input, i)?;
      i += token.len;
      tokens.push(token);
      continue;
    }

    if is_ident_start(c) {
      let start = i;
      i += 1;
      while i < bytes.len() && is_ident_continue(bytes[i]) {
        i += 1;
      }
      let kind = if KEYWORDS.contains(&&input[start..i]) {
        TokenKind::Keyword
      } else {
        TokenKind::Ident
      };
      tokens.push(Token::new(kind, start, i - start, None));
      continue;
    }

    if let Some(op) = PUNCTUATORS
      .iter()
      .find(|op| input[i..].starts_with(*op))
    {
      tokens.push(Token::new(TokenKind::Punctuator, i, op.len(), None));
      i += op.len();
      continue;
    }

    if c.is_ascii_punctuation() && !matches!(c, b'@' | b'$' | b'`' | b'#' | b'\\') {
      tokens.push(Token::new(TokenKind::Punctuator, i, 1, None));
      i += 1;
      continue;
    }

    let invalid_char = input[i..].chars().next().unwrap_or('\0');
    return Err(CompileError::tokenize_at(
      input,
      i,
      format!("invalid token: '{invalid_char}'"),
    ));
  }

  tokens.push(Token::new(TokenKind::Eof, input.len(), 0, None));
  trace!("tokenized {} bytes into {} tokens", input.len(), tokens.len());
  Ok(tokens)
}

fn is_ident_start(c: u8) -> bool {
  c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_continue(c: u8) -> bool {
  c.is_ascii_alphanumeric() || c == b'_'
}

/// Integer literals wrap on overflow, like a 64-bit accumulator would.
fn read_number(input: &str, start: usize) -> CompileResult<Token> {
  let bytes = input.as_bytes();
  let lower = |idx: usize| bytes.get(idx).map(u8::to_ascii_lowercase);

  let (radix, mut i) = if bytes[start] == b'0' && lower(start + 1) == Some(b'x') {
    (16, start + 2)
  } else if bytes[start] == b'0' && lower(start + 1) == Some(b'b') {
    (2, start + 2)
  } else if bytes[start] == b'0' {
    (8, start + 1)
  } else {
    (10, start)
  };

  let digits_start = i;
  let mut value: i64 = 0;
  while let Some(digit) = bytes.get(i).and_then(|&b| (b as char).to_digit(radix)) {
    value = value.wrapping_mul(i64::from(radix)).wrapping_add(i64::from(digit));
    i += 1;
  }
  if radix != 8 && i == digits_start {
    return Err(CompileError::tokenize_at(input, start, "invalid number literal"));
  }

  let mut is_long = i64::from(value as i32) != value;
  if matches!(lower(i), Some(b'l')) {
    i += 1;
    if matches!(lower(i), Some(b'l')) {
      i += 1;
    }
    is_long = true;
  }

  if bytes.get(i).is_some_and(|&b| is_ident_continue(b)) {
    return Err(CompileError::tokenize_at(input, start, "invalid number literal"));
  }

  let mut token = Token::new(TokenKind::Num, start, i - start, Some(value));
  token.is_long = is_long;
  Ok(token)
}

fn read_string_literal(input: &str, start: usize) -> CompileResult<Token> {
  let bytes = input.as_bytes();
  let mut decoded = Vec::new();
  let mut i = start + 1;

  loop {
    match bytes.get(i) {
      None | Some(b'\n') => {
        return Err(CompileError::tokenize_at(input, start, "unclosed string literal"));
      }
      Some(b'"') => break,
      Some(b'\\') => {
        let (byte, consumed) = read_escape(input, i + 1)?;
        decoded.push(byte);
        i += 1 + consumed;
      }
      Some(&b) => {
        decoded.push(b);
        i += 1;
      }
    }
  }
  decoded.push(0);

  let mut token = Token::new(TokenKind::Str, start, i + 1 - start, None);
  token.bytes = Some(decoded);
  Ok(token)
}

fn read_char_literal(input: &str, start: usize) -> CompileResult<Token> {
  let bytes = input.as_bytes();
  let (byte, consumed) = match bytes.get(start + 1) {
    None | Some(b'\n') => {
      return Err(CompileError::tokenize_at(input, start, "unclosed char literal"));
    }
    Some(b'\\') => {
      let (byte, consumed) = read_escape(input, start + 2)?;
      (byte, consumed + 1)
    }
    Some(&b) => (b, 1),
  };

  let end = start + 1 + consumed;
  if bytes.get(end) != Some(&b'\'') {
    return Err(CompileError::tokenize_at(input, start, "unclosed char literal"));
  }

  // `char` is signed.
  let value = i64::from(byte as i8);
  Ok(Token::new(TokenKind::Num, start, end + 1 - start, Some(value)))
}

/// Decode the escape sequence starting right after a backslash, returning the
/// byte and the number of input bytes consumed.
fn read_escape(input: &str, i: usize) -> CompileResult<(u8, usize)> {
  let bytes = input.as_bytes();
  let Some(&c) = bytes.get(i) else {
    return Err(CompileError::tokenize_at(input, i, "unterminated escape sequence"));
  };

  if (b'0'..=b'7').contains(&c) {
    let mut value: u32 = 0;
    let mut len = 0;
    while len < 3 && bytes.get(i + len).is_some_and(|b| (b'0'..=b'7').contains(b)) {
      value = value * 8 + u32::from(bytes[i + len] - b'0');
      len += 1;
    }
    return Ok((value as u8, len));
  }

  if c == b'x' {
    let mut value: u32 = 0;
    let mut len = 1;
    while let Some(digit) = bytes.get(i + len).and_then(|&b| (b as char).to_digit(16)) {
      value = value.wrapping_mul(16).wrapping_add(digit);
      len += 1;
    }
    if len == 1 {
      return Err(CompileError::tokenize_at(input, i, "invalid hex escape sequence"));
    }
    return Ok((value as u8, len));
  }

  let byte = match c {
    b'a' => 0x07,
    b'b' => 0x08,
    b't' => b'\t',
    b'n' => b'\n',
    b'v' => 0x0b,
    b'f' => 0x0c,
    b'r' => b'\r',
    // GNU extension.
    b'e' => 0x1b,
    other => other,
  };
  Ok((byte, 1))
}

/// Return the slice from the source that produced this token.
pub fn token_text<'a>(token: &Token, source: &'a str) -> &'a str {
  let end = token.loc + token.len;
  &source[token.loc..end]
}

/// Human-friendly description used in diagnostics.
pub fn describe_token(token: Option<&Token>, source: &str) -> String {
  match token {
    Some(t) => match t.kind {
      TokenKind::Eof => "EOF".to_string(),
      _ => token_text(t, source).to_string(),
    },
    None => "EOF".to_string(),
  }
}

/// One-token-per-line listing used by `--dump-tokens`.
pub struct TokenDump<'a> {
  pub tokens: &'a [Token],
  pub source: &'a str,
}

impl fmt::Display for TokenDump<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for token in self.tokens {
      let kind = match token.kind {
        TokenKind::Ident => "ident",
        TokenKind::Keyword => "keyword",
        TokenKind::Punctuator => "punct",
        TokenKind::Num => "num",
        TokenKind::Str => "str",
        TokenKind::Eof => "eof",
      };
      writeln!(f, "{:>6} {:<8} {}", token.loc, kind, describe_token(Some(token), self.source))?;
    }
    Ok(())
  }
}
