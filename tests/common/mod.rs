//! Shared helpers for the integration tests: compile C source with minicc,
//! assemble and link the result with the system `cc`, and run it.

#![allow(dead_code)]

use std::fs;
use std::process::Command;

use minicc::{CompileError, generate_assembly};

/// The system C compiler, used only as assembler and linker.
pub const C_COMPILER: &str = "cc";

pub fn init_logger() {
  let _ = env_logger::builder().is_test(true).try_init();
}

/// Compile `source`, panicking with the rendered diagnostic on failure.
pub fn compile(source: &str) -> String {
  init_logger();
  generate_assembly(source).unwrap_or_else(|err| panic!("compilation failed:\n{err}"))
}

/// Compile, link and run `source`, returning the process exit code.
pub fn compile_and_run(source: &str) -> i32 {
  let asm = compile(source);

  let dir = tempfile::tempdir().expect("failed to create temp dir");
  let asm_path = dir.path().join("test.s");
  let exe_path = dir.path().join("test.out");
  fs::write(&asm_path, asm).expect("failed to write assembly");

  let output = Command::new(C_COMPILER)
    .arg("-o")
    .arg(&exe_path)
    .arg(&asm_path)
    .output()
    .expect("failed to run the C compiler");
  assert!(
    output.status.success(),
    "linking failed:\n{}",
    String::from_utf8_lossy(&output.stderr)
  );

  let status = Command::new(&exe_path)
    .status()
    .expect("failed to run the compiled program");
  status.code().unwrap_or(-1)
}

/// Compile `source` expecting a failure.
pub fn compile_error(source: &str) -> CompileError {
  init_logger();
  match generate_assembly(source) {
    Ok(asm) => panic!("expected a compile error, got assembly:\n{asm}"),
    Err(err) => err,
  }
}

/// The message of the diagnostic `source` fails with.
pub fn error_message(source: &str) -> String {
  let err = compile_error(source);
  match err.diagnostic() {
    Some(diagnostic) => diagnostic.message.clone(),
    None => panic!("expected a located error, got: {err}"),
  }
}
