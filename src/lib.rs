//! minicc: a small C compiler that emits x86-64 AT&T assembly.
//!
//! - `tokenizer` splits the source into keywords, identifiers, literals and
//!   punctuators.
//! - `parser` owns all syntactic knowledge and builds a typed [`ast::Program`],
//!   resolving names through `scope`.
//! - `codegen` lowers the program into x86-64 AT&T assembly.
//! - `error` holds the diagnostics every stage reports through.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod parser;
pub mod scope;
pub mod tokenizer;
pub mod ty;

pub use error::{CompileError, CompileResult};

/// Compile a C source string into AT&T assembly.
pub fn generate_assembly(source: &str) -> CompileResult<String> {
  let tokens = tokenizer::tokenize(source)?;
  let program = parser::parse(tokens, source)?;
  codegen::generate(&program, source)
}
