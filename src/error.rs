//! Shared error utilities used across the compilation pipeline.
//!
//! Every error is fatal: the first one aborts compilation. Diagnostics are
//! rendered as `line:col: error: message`, followed by the offending source
//! line and a caret under the byte.

use std::fmt;

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
pub enum CompileError {
  /// A character that starts no token.
  #[snafu(display("{diagnostic}"))]
  Tokenize { diagnostic: Diagnostic },

  /// Syntactically or semantically invalid program.
  #[snafu(display("{diagnostic}"))]
  Compile { diagnostic: Diagnostic },

  /// Broken invariant inside the compiler itself.
  #[snafu(display("internal compiler error: {message}"))]
  Internal { message: String },
}

impl CompileError {
  /// Construct an error anchored at a specific byte offset in the source.
  pub fn at(source: &str, loc: usize, message: impl Into<String>) -> Self {
    Self::Compile {
      diagnostic: Diagnostic::new(source, loc, message),
    }
  }

  /// Same as [`CompileError::at`], for failures raised by the tokenizer.
  pub fn tokenize_at(source: &str, loc: usize, message: impl Into<String>) -> Self {
    Self::Tokenize {
      diagnostic: Diagnostic::new(source, loc, message),
    }
  }

  pub fn internal(message: impl Into<String>) -> Self {
    Self::Internal {
      message: message.into(),
    }
  }

  pub fn diagnostic(&self) -> Option<&Diagnostic> {
    match self {
      Self::Tokenize { diagnostic } | Self::Compile { diagnostic } => Some(diagnostic),
      Self::Internal { .. } => None,
    }
  }
}

/// A message pinned to a line and column of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
  /// 1-based line number.
  pub line: usize,
  /// 1-based column, counted in characters.
  pub column: usize,
  pub line_text: String,
  pub message: String,
}

impl Diagnostic {
  pub fn new(source: &str, loc: usize, message: impl Into<String>) -> Self {
    let mut safe_loc = loc.min(source.len());
    while !source.is_char_boundary(safe_loc) {
      safe_loc -= 1;
    }

    let line_start = source[..safe_loc].rfind('\n').map_or(0, |idx| idx + 1);
    let line_end = source[safe_loc..]
      .find('\n')
      .map_or(source.len(), |idx| safe_loc + idx);
    let line = source[..line_start].matches('\n').count() + 1;
    let column = source[line_start..safe_loc].chars().count() + 1;

    Self {
      line,
      column,
      line_text: source[line_start..line_end].trim_end_matches('\r').to_string(),
      message: message.into(),
    }
  }
}

impl fmt::Display for Diagnostic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "{}:{}: error: {}", self.line, self.column, self.message)?;
    writeln!(f, "  {}", self.line_text)?;
    write!(f, "  {}^", " ".repeat(self.column - 1))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn locates_offset_on_later_line() {
    let source = "int main() {\n  return x;\n}\n";
    let loc = source.find('x').unwrap();
    let diag = Diagnostic::new(source, loc, "undefined variable");
    assert_eq!(diag.line, 2);
    assert_eq!(diag.column, 10);
    assert_eq!(diag.line_text, "  return x;");
  }

  #[test]
  fn renders_caret_under_column() {
    let err = CompileError::at("1 + ;", 4, "expected an expression");
    let rendered = err.to_string();
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines[0], "1:5: error: expected an expression");
    assert_eq!(lines[1], "  1 + ;");
    assert_eq!(lines[2], "      ^");
  }

  #[test]
  fn offset_past_end_points_after_last_char() {
    let diag = Diagnostic::new("abc", 100, "eof");
    assert_eq!((diag.line, diag.column), (1, 4));
  }

  #[test]
  fn internal_errors_have_no_location() {
    let err = CompileError::internal("unbalanced scopes");
    assert!(err.diagnostic().is_none());
    assert_eq!(err.to_string(), "internal compiler error: unbalanced scopes");
  }
}
