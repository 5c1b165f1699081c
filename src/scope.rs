//! Lexical scopes and the variable pools they feed.
//!
//! Frames form a stack: the bottom frame is file scope, every block, loop or
//! function pushes another. Identifiers (variables, typedef names and
//! functions share C's ordinary namespace) are looked up innermost first.
//! Locals outlive their frame: they stay in the function's pool until
//! [`ScopeTable::finish_function`] lays out the stack frame.

use std::collections::HashMap;

use log::debug;
use snafu::{Snafu, ensure};

use crate::ast::{Obj, VarRef};
use crate::ty::{Type, align_to};

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum ScopeError {
  #[snafu(display("'{name}' is already declared in this scope"))]
  AlreadyDeclared { name: String },

  #[snafu(display("no block scope is open"))]
  NoOpenScope,
}

/// What an identifier stands for.
#[derive(Debug, Clone)]
pub enum Binding {
  Var(VarRef),
  Typedef(Type),
  Func(Type),
}

#[derive(Debug, Default)]
struct Frame {
  names: HashMap<String, Binding>,
}

#[derive(Debug)]
pub struct ScopeTable {
  frames: Vec<Frame>,
  locals: Vec<Obj>,
  globals: Vec<Obj>,
}

impl Default for ScopeTable {
  fn default() -> Self {
    Self::new()
  }
}

impl ScopeTable {
  /// A table with only the file-scope frame open.
  pub fn new() -> Self {
    Self {
      frames: vec![Frame::default()],
      locals: Vec::new(),
      globals: Vec::new(),
    }
  }

  pub fn enter(&mut self) {
    self.frames.push(Frame::default());
  }

  pub fn leave(&mut self) -> Result<(), ScopeError> {
    ensure!(self.frames.len() > 1, NoOpenScopeSnafu);
    self.frames.pop();
    Ok(())
  }

  pub fn depth(&self) -> usize {
    self.frames.len() - 1
  }

  fn bind(&mut self, name: &str, binding: Binding) -> Result<(), ScopeError> {
    let Some(frame) = self.frames.last_mut() else {
      return NoOpenScopeSnafu.fail();
    };
    ensure!(
      !frame.names.contains_key(name),
      AlreadyDeclaredSnafu { name }
    );
    frame.names.insert(name.to_string(), binding);
    Ok(())
  }

  /// Declare a local variable in the innermost frame.
  pub fn declare(&mut self, name: &str, ty: Type) -> Result<VarRef, ScopeError> {
    let var = VarRef::Local(self.locals.len());
    self.bind(name, Binding::Var(var))?;
    self.locals.push(Obj::local(name, ty));
    Ok(var)
  }

  /// Declare a global that is visible from the innermost frame. `symbol` is
  /// the assembler name, which differs from `name` for static locals.
  pub fn declare_global(
    &mut self,
    name: &str,
    symbol: &str,
    ty: Type,
    is_static: bool,
  ) -> Result<VarRef, ScopeError> {
    let var = VarRef::Global(self.globals.len());
    self.bind(name, Binding::Var(var))?;
    let mut obj = Obj::global(symbol, ty);
    obj.is_static = is_static;
    self.globals.push(obj);
    Ok(var)
  }

  /// Anonymous globals (string literals) have no binding.
  pub fn add_anonymous_global(&mut self, obj: Obj) -> VarRef {
    self.globals.push(obj);
    VarRef::Global(self.globals.len() - 1)
  }

  pub fn declare_typedef(&mut self, name: &str, ty: Type) -> Result<(), ScopeError> {
    self.bind(name, Binding::Typedef(ty))
  }

  /// Functions may be declared any number of times; the latest type wins.
  pub fn declare_func(&mut self, name: &str, ty: Type) -> Result<(), ScopeError> {
    let Some(frame) = self.frames.first_mut() else {
      return NoOpenScopeSnafu.fail();
    };
    match frame.names.get(name) {
      Some(Binding::Func(_)) | None => {
        frame.names.insert(name.to_string(), Binding::Func(ty));
        Ok(())
      }
      Some(_) => AlreadyDeclaredSnafu { name }.fail(),
    }
  }

  pub fn resolve(&self, name: &str) -> Option<&Binding> {
    self
      .frames
      .iter()
      .rev()
      .find_map(|frame| frame.names.get(name))
  }

  pub fn resolve_var(&self, name: &str) -> Option<VarRef> {
    match self.resolve(name) {
      Some(Binding::Var(var)) => Some(*var),
      _ => None,
    }
  }

  pub fn resolve_typedef(&self, name: &str) -> Option<&Type> {
    match self.resolve(name) {
      Some(Binding::Typedef(ty)) => Some(ty),
      _ => None,
    }
  }

  pub fn obj(&self, var: VarRef) -> &Obj {
    match var {
      VarRef::Local(idx) => &self.locals[idx],
      VarRef::Global(idx) => &self.globals[idx],
    }
  }

  pub fn obj_mut(&mut self, var: VarRef) -> &mut Obj {
    match var {
      VarRef::Local(idx) => &mut self.locals[idx],
      VarRef::Global(idx) => &mut self.globals[idx],
    }
  }

  /// Fix the offset of a parameter passed on the stack.
  pub fn pin_offset(&mut self, var: VarRef, offset: i64) {
    let obj = self.obj_mut(var);
    obj.offset = offset;
    obj.pinned = true;
  }

  /// Lay out every local of the current function in declaration order and
  /// return the frame size, rounded up to 16 bytes.
  pub fn assign_offsets(&mut self) -> i64 {
    let mut offset = 0;
    for obj in self.locals.iter_mut().filter(|obj| !obj.pinned) {
      offset = align_to(offset + obj.ty.size(), obj.ty.align().max(1));
      obj.offset = -offset;
    }
    align_to(offset, 16)
  }

  /// Close the current function: assign offsets and hand over its locals,
  /// leaving an empty pool for the next one.
  pub fn finish_function(&mut self) -> (Vec<Obj>, i64) {
    let stack_size = self.assign_offsets();
    let locals = std::mem::take(&mut self.locals);
    debug!(
      "laid out {} locals in a {stack_size}-byte frame",
      locals.len()
    );
    (locals, stack_size)
  }

  pub fn into_globals(self) -> Vec<Obj> {
    self.globals
  }
}
