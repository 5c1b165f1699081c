//! Code generation: lower the parsed AST into AT&T x86-64 assembly.
//!
//! The emitter is a simple stack machine: every expression leaves exactly one
//! value on the stack and every statement leaves the stack as it found it.
//! Locals live in the stack frame and are addressed relative to `%rbp`,
//! globals relative to `%rip`.

use log::debug;

use crate::ast::{
  BinaryOp, Expr, ExprKind, Function, LogicalOp, Obj, Program, Stmt, UnaryOp, VarRef,
};
use crate::error::{CompileError, CompileResult};
use crate::ty::{Type, TypeKind};

/// General-purpose registers the emitter touches, named per operand width.
#[derive(Debug, Clone, Copy)]
enum Reg {
  Ax,
  Di,
  Si,
  Dx,
  Cx,
  R8,
  R9,
}

impl Reg {
  fn name(self, size: i64) -> &'static str {
    let names = match self {
      Reg::Ax => ["%al", "%ax", "%eax", "%rax"],
      Reg::Di => ["%dil", "%di", "%edi", "%rdi"],
      Reg::Si => ["%sil", "%si", "%esi", "%rsi"],
      Reg::Dx => ["%dl", "%dx", "%edx", "%rdx"],
      Reg::Cx => ["%cl", "%cx", "%ecx", "%rcx"],
      Reg::R8 => ["%r8b", "%r8w", "%r8d", "%r8"],
      Reg::R9 => ["%r9b", "%r9w", "%r9d", "%r9"],
    };
    match size {
      1 => names[0],
      2 => names[1],
      4 => names[2],
      _ => names[3],
    }
  }
}

/// Integer argument registers of the System V calling convention.
const ARG_REGS: [Reg; 6] = [Reg::Di, Reg::Si, Reg::Dx, Reg::Cx, Reg::R8, Reg::R9];

/// Emit assembly for a whole program.
pub fn generate(program: &Program, source: &str) -> CompileResult<String> {
  let mut cg = CodeGen {
    out: String::new(),
    source,
    globals: &program.globals,
    locals: &[],
    func_name: "",
    depth: 0,
    label_count: program.label_count,
  };

  cg.emit_data();
  for func in &program.functions {
    cg.emit_function(func)?;
  }
  cg.out.push_str("    .section .note.GNU-stack,\"\",@progbits\n");

  Ok(cg.out)
}

struct CodeGen<'a> {
  out: String,
  source: &'a str,
  globals: &'a [Obj],
  /// Locals of the function being emitted.
  locals: &'a [Obj],
  func_name: &'a str,
  /// Values currently pushed on the operand stack.
  depth: usize,
  /// Next free label id; continues the parser's loop numbering.
  label_count: usize,
}

impl<'a> CodeGen<'a> {
  fn label(&mut self, name: &str) {
    self.out.push_str(name);
    self.out.push_str(":\n");
  }

  fn new_label_id(&mut self) -> usize {
    let id = self.label_count;
    self.label_count += 1;
    id
  }

  fn push(&mut self) {
    self.out.push_str("    push %rax\n");
    self.depth += 1;
  }

  fn pop(&mut self, reg: Reg) {
    self.out.push_str(&format!("    pop {}\n", reg.name(8)));
    self.depth -= 1;
  }

  /// Drop whatever was pushed since the stack was at `depth`.
  fn discard_to(&mut self, depth: usize) {
    while self.depth > depth {
      self.pop(Reg::Ax);
    }
  }

  fn emit_data(&mut self) {
    if self.globals.is_empty() {
      return;
    }

    self.out.push_str("    .data\n");
    for obj in self.globals {
      if !obj.is_static {
        self.out.push_str(&format!("    .globl {}\n", obj.name));
      }
      self.out.push_str(&format!("    .align {}\n", obj.ty.align().max(1)));
      self.label(&obj.name);
      match &obj.init_data {
        Some(bytes) => {
          for byte in bytes {
            self.out.push_str(&format!("    .byte {byte}\n"));
          }
        }
        None => self.out.push_str(&format!("    .zero {}\n", obj.ty.size())),
      }
    }
  }

  fn emit_function(&mut self, func: &'a Function) -> CompileResult<()> {
    debug!(
      "generating {} ({}-byte frame, {} locals)",
      func.name,
      func.stack_size,
      func.locals.len()
    );
    self.locals = &func.locals;
    self.func_name = &func.name;
    self.depth = 0;

    self.out.push_str("    .text\n");
    if !func.is_static {
      self.out.push_str(&format!("    .globl {}\n", func.name));
    }
    self.label(&func.name);

    // Prologue
    self.out.push_str("    push %rbp\n");
    self.out.push_str("    mov %rsp, %rbp\n");
    self.out.push_str(&format!("    sub ${}, %rsp\n", func.stack_size));

    // Spill register arguments into their slots; the rest already sit
    // above the return address.
    for (&idx, reg) in func.params.iter().zip(ARG_REGS) {
      let param = &func.locals[idx];
      self.out.push_str(&format!(
        "    mov {}, {}(%rbp)\n",
        reg.name(param.ty.size()),
        param.offset
      ));
    }

    self.stmt(&func.body)?;
    if self.depth != 0 {
      return Err(CompileError::internal(format!(
        "operand stack not empty at the end of '{}'",
        func.name
      )));
    }

    // Falling off the end of main returns 0.
    if func.name == "main" {
      self.out.push_str("    mov $0, %rax\n");
    }

    // Epilogue
    self.label(&format!(".Lreturn_{}", func.name));
    self.out.push_str("    mov %rbp, %rsp\n");
    self.out.push_str("    pop %rbp\n");
    self.out.push_str("    ret\n");
    Ok(())
  }

  /// Generate one statement, checking that it leaves the operand stack as
  /// it found it.
  fn stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
    let depth = self.depth;
    self.stmt_inner(stmt)?;
    if self.depth != depth {
      return Err(CompileError::internal(format!(
        "operand stack unbalanced in '{}': {} before a statement, {} after",
        self.func_name, depth, self.depth
      )));
    }
    Ok(())
  }

  fn stmt_inner(&mut self, stmt: &Stmt) -> CompileResult<()> {
    match stmt {
      Stmt::Block(stmts) => {
        for stmt in stmts {
          self.stmt(stmt)?;
        }
      }
      Stmt::Expr(expr) => {
        let depth = self.depth;
        self.expr(expr)?;
        self.discard_to(depth);
      }
      Stmt::Return(value) => {
        if let Some(value) = value {
          self.expr(value)?;
          self.pop(Reg::Ax);
        }
        self.out.push_str(&format!("    jmp .Lreturn_{}\n", self.func_name));
      }
      Stmt::If { cond, then, els } => {
        let id = self.new_label_id();
        self.condition(cond)?;
        self.out.push_str(&format!("    je .Lelse{id}\n"));
        self.stmt(then)?;
        self.out.push_str(&format!("    jmp .Lend{id}\n"));
        self.label(&format!(".Lelse{id}"));
        if let Some(els) = els {
          self.stmt(els)?;
        }
        self.label(&format!(".Lend{id}"));
      }
      Stmt::For {
        id,
        init,
        cond,
        post,
        body,
      } => {
        let id = id.0;
        if let Some(init) = init {
          self.stmt(init)?;
        }
        self.label(&format!(".Lbegin{id}"));
        if let Some(cond) = cond {
          self.condition(cond)?;
          self.out.push_str(&format!("    je .Lend{id}\n"));
        }
        self.stmt(body)?;
        // `continue` lands here so the post-expression still runs.
        self.label(&format!(".Lnext{id}"));
        if let Some(post) = post {
          let depth = self.depth;
          self.expr(post)?;
          self.discard_to(depth);
        }
        self.out.push_str(&format!("    jmp .Lbegin{id}\n"));
        self.label(&format!(".Lend{id}"));
      }
      Stmt::While { id, cond, body } => {
        let id = id.0;
        self.label(&format!(".Lbegin{id}"));
        self.condition(cond)?;
        self.out.push_str(&format!("    je .Lend{id}\n"));
        self.stmt(body)?;
        self.label(&format!(".Lnext{id}"));
        self.out.push_str(&format!("    jmp .Lbegin{id}\n"));
        self.label(&format!(".Lend{id}"));
      }
      Stmt::DoWhile { id, body, cond } => {
        let id = id.0;
        self.label(&format!(".Lbegin{id}"));
        self.stmt(body)?;
        self.label(&format!(".Lnext{id}"));
        self.condition(cond)?;
        self.out.push_str(&format!("    jne .Lbegin{id}\n"));
        self.label(&format!(".Lend{id}"));
      }
      Stmt::Break(id) => self.out.push_str(&format!("    jmp .Lend{}\n", id.0)),
      Stmt::Continue(id) => self.out.push_str(&format!("    jmp .Lnext{}\n", id.0)),
    }
    Ok(())
  }

  /// Evaluate `cond` and compare it against zero, leaving the flags set.
  fn condition(&mut self, cond: &Expr) -> CompileResult<()> {
    self.expr(cond)?;
    self.pop(Reg::Ax);
    self.cmp_zero(&cond.ty);
    Ok(())
  }

  fn cmp_zero(&mut self, ty: &Type) {
    self.out.push_str(&format!("    cmp $0, {}\n", Reg::Ax.name(op_size(ty))));
  }

  /// Load `%rax` with the address of a variable.
  fn lea_var(&mut self, var: VarRef) {
    match var {
      VarRef::Local(idx) => {
        let offset = self.locals[idx].offset;
        self.out.push_str(&format!("    lea {offset}(%rbp), %rax\n"));
      }
      VarRef::Global(idx) => {
        let name = &self.globals[idx].name;
        self.out.push_str(&format!("    lea {name}(%rip), %rax\n"));
      }
    }
  }

  /// Push the address of an lvalue.
  fn addr(&mut self, expr: &Expr) -> CompileResult<()> {
    match &expr.kind {
      ExprKind::Var { var } => {
        self.lea_var(*var);
        self.push();
        Ok(())
      }
      ExprKind::Deref { operand } => self.expr(operand),
      ExprKind::Comma { lhs, rhs } => {
        let depth = self.depth;
        self.expr(lhs)?;
        self.discard_to(depth);
        self.addr(rhs)
      }
      _ => Err(CompileError::at(self.source, expr.loc, "not an lvalue")),
    }
  }

  /// Replace the address in `%rax` with the value it points to, extended to
  /// 64 bits. Arrays are left alone: their value is their address.
  fn load(&mut self, ty: &Type) {
    match ty.kind {
      TypeKind::Array { .. } | TypeKind::Func { .. } => {}
      TypeKind::Bool => self.out.push_str("    movzbl (%rax), %eax\n"),
      TypeKind::Char => self.out.push_str("    movsbq (%rax), %rax\n"),
      TypeKind::Short => self.out.push_str("    movswq (%rax), %rax\n"),
      TypeKind::Int => self.out.push_str("    movslq (%rax), %rax\n"),
      _ => self.out.push_str("    mov (%rax), %rax\n"),
    }
  }

  /// Store `%rax` to the address in `%rdi`.
  fn store(&mut self, ty: &Type) {
    self.out.push_str(&format!("    mov {}, (%rdi)\n", Reg::Ax.name(ty.size())));
  }

  /// Convert the value in `%rax` from `from` to `to`.
  fn cast(&mut self, from: &Type, to: &Type) {
    match to.kind {
      TypeKind::Void => {}
      TypeKind::Bool => {
        self.cmp_zero(from);
        self.out.push_str("    setne %al\n");
        self.out.push_str("    movzbl %al, %eax\n");
      }
      TypeKind::Char => self.out.push_str("    movsbq %al, %rax\n"),
      TypeKind::Short => self.out.push_str("    movswq %ax, %rax\n"),
      TypeKind::Int => self.out.push_str("    movslq %eax, %rax\n"),
      _ => {
        if from.is_integer() && from.size() <= 4 {
          self.out.push_str("    movslq %eax, %rax\n");
        }
      }
    }
  }

  /// Push the value of an expression.
  fn expr(&mut self, expr: &Expr) -> CompileResult<()> {
    match &expr.kind {
      ExprKind::Num { value } => {
        self.out.push_str(&format!("    mov ${value}, %rax\n"));
        self.push();
      }
      ExprKind::Var { var } => {
        self.lea_var(*var);
        self.load(&expr.ty);
        self.push();
      }
      ExprKind::Unary { op, operand } => {
        self.expr(operand)?;
        self.pop(Reg::Ax);
        match op {
          UnaryOp::Neg => {
            let ax = Reg::Ax.name(op_size(&expr.ty));
            self.out.push_str(&format!("    neg {ax}\n"));
          }
          UnaryOp::BitNot => {
            let ax = Reg::Ax.name(op_size(&expr.ty));
            self.out.push_str(&format!("    not {ax}\n"));
          }
          UnaryOp::Not => {
            self.cmp_zero(&operand.ty);
            self.out.push_str("    sete %al\n");
            self.out.push_str("    movzbl %al, %eax\n");
          }
        }
        self.push();
      }
      ExprKind::Binary { op, lhs, rhs } => {
        self.expr(lhs)?;
        self.expr(rhs)?;
        self.pop(Reg::Di);
        self.pop(Reg::Ax);
        self.binary_op(*op, &expr.ty, &lhs.ty, &rhs.ty);
        self.push();
      }
      ExprKind::Logical { op, lhs, rhs } => self.logical(*op, lhs, rhs)?,
      ExprKind::Assign {
        op,
        op_ty,
        lhs,
        rhs,
      } => {
        self.addr(lhs)?;
        match op {
          None => {
            self.expr(rhs)?;
            self.pop(Reg::Ax);
          }
          Some(op) => {
            // Reuse the address already on the stack for the read.
            self.out.push_str("    mov (%rsp), %rax\n");
            self.load(&lhs.ty);
            self.cast(&lhs.ty, op_ty);
            self.push();
            self.expr(rhs)?;
            self.pop(Reg::Di);
            self.pop(Reg::Ax);
            self.binary_op(*op, op_ty, op_ty, &rhs.ty);
            self.cast(op_ty, &lhs.ty);
          }
        }
        self.pop(Reg::Di);
        self.store(&lhs.ty);
        self.push();
      }
      ExprKind::Ternary { cond, then, els } => {
        let id = self.new_label_id();
        self.condition(cond)?;
        self.out.push_str(&format!("    je .Lfalse{id}\n"));
        self.expr(then)?;
        self.pop(Reg::Ax);
        self.out.push_str(&format!("    jmp .Lnext{id}\n"));
        self.label(&format!(".Lfalse{id}"));
        self.expr(els)?;
        self.pop(Reg::Ax);
        self.label(&format!(".Lnext{id}"));
        self.push();
      }
      ExprKind::Comma { lhs, rhs } => {
        let depth = self.depth;
        self.expr(lhs)?;
        self.discard_to(depth);
        self.expr(rhs)?;
      }
      ExprKind::Addr { operand } => self.addr(operand)?,
      ExprKind::Deref { operand } => {
        self.expr(operand)?;
        self.pop(Reg::Ax);
        self.load(&expr.ty);
        self.push();
      }
      ExprKind::IncDec {
        prefix,
        step,
        operand,
      } => {
        self.addr(operand)?;
        self.out.push_str("    mov (%rsp), %rax\n");
        self.load(&operand.ty);
        self.out.push_str("    mov %rax, %rdx\n");
        self.out.push_str(&format!("    add ${step}, %rax\n"));
        self.cast(&Type::long(), &operand.ty);
        self.pop(Reg::Di);
        self.store(&operand.ty);
        if !prefix {
          self.out.push_str("    mov %rdx, %rax\n");
        }
        self.push();
      }
      ExprKind::Cast { operand } => {
        self.expr(operand)?;
        self.pop(Reg::Ax);
        self.cast(&operand.ty, &expr.ty);
        self.push();
      }
      ExprKind::Call { name, args } => self.call(name, args, &expr.ty)?,
    }
    Ok(())
  }

  /// Apply `op` to `%rax` (left) and `%rdi` (right), leaving the result in
  /// `%rax`.
  fn binary_op(&mut self, op: BinaryOp, ty: &Type, lhs_ty: &Type, rhs_ty: &Type) {
    let ax = Reg::Ax.name(op_size(ty));
    let di = Reg::Di.name(op_size(ty));

    match op {
      BinaryOp::Add | BinaryOp::Sub if lhs_ty.is_pointer() => {
        let elem_size = lhs_ty.base().map_or(1, Type::size);
        let mnemonic = if op == BinaryOp::Add { "add" } else { "sub" };
        if rhs_ty.is_pointer() {
          // Pointer difference, in elements.
          self.out.push_str("    sub %rdi, %rax\n");
          if elem_size > 1 {
            self.out.push_str(&format!("    mov ${elem_size}, %rdi\n"));
            self.out.push_str("    cqo\n");
            self.out.push_str("    idiv %rdi\n");
          }
        } else {
          if elem_size != 1 {
            self.out.push_str(&format!("    imul ${elem_size}, %rdi\n"));
          }
          self.out.push_str(&format!("    {mnemonic} %rdi, %rax\n"));
        }
      }
      BinaryOp::Add => self.out.push_str(&format!("    add {di}, {ax}\n")),
      BinaryOp::Sub => self.out.push_str(&format!("    sub {di}, {ax}\n")),
      BinaryOp::Mul => self.out.push_str(&format!("    imul {di}, {ax}\n")),
      BinaryOp::Div | BinaryOp::Mod => {
        // Divide at the width of the narrower operand, never below 32 bits.
        let size = lhs_ty.size().min(rhs_ty.size()).max(4);
        if size == 8 {
          self.out.push_str("    cqo\n");
          self.out.push_str("    idiv %rdi\n");
        } else {
          self.out.push_str("    cltd\n");
          self.out.push_str("    idiv %edi\n");
        }
        if op == BinaryOp::Mod {
          self.out.push_str("    mov %rdx, %rax\n");
        }
        if size == 4 && op_size(ty) == 8 {
          self.out.push_str("    movslq %eax, %rax\n");
        }
      }
      BinaryOp::BitAnd => self.out.push_str(&format!("    and {di}, {ax}\n")),
      BinaryOp::BitOr => self.out.push_str(&format!("    or {di}, {ax}\n")),
      BinaryOp::BitXor => self.out.push_str(&format!("    xor {di}, {ax}\n")),
      BinaryOp::Shl => {
        self.out.push_str("    mov %rdi, %rcx\n");
        self.out.push_str(&format!("    shl %cl, {ax}\n"));
      }
      BinaryOp::Shr => {
        self.out.push_str("    mov %rdi, %rcx\n");
        self.out.push_str(&format!("    sar %cl, {ax}\n"));
      }
      BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
        let size = compare_size(lhs_ty, rhs_ty);
        self.out.push_str(&format!("    cmp {}, {}\n", Reg::Di.name(size), Reg::Ax.name(size)));
        let set = match op {
          BinaryOp::Eq => "sete",
          BinaryOp::Ne => "setne",
          BinaryOp::Lt => "setl",
          BinaryOp::Le => "setle",
          BinaryOp::Gt => "setg",
          _ => "setge",
        };
        self.out.push_str(&format!("    {set} %al\n"));
        self.out.push_str("    movzbl %al, %eax\n");
      }
    }
  }

  /// `&&` and `||` jump past the right operand once the left one decides
  /// the result.
  fn logical(&mut self, op: LogicalOp, lhs: &Expr, rhs: &Expr) -> CompileResult<()> {
    let id = self.new_label_id();
    let (jump, short, short_value, long_value) = match op {
      LogicalOp::And => ("je", "false", 0, 1),
      LogicalOp::Or => ("jne", "true", 1, 0),
    };

    self.condition(lhs)?;
    self.out.push_str(&format!("    {jump} .L{short}{id}\n"));
    self.condition(rhs)?;
    self.out.push_str(&format!("    {jump} .L{short}{id}\n"));
    self.out.push_str(&format!("    mov ${long_value}, %rax\n"));
    self.out.push_str(&format!("    jmp .Lend{id}\n"));
    self.label(&format!(".L{short}{id}"));
    self.out.push_str(&format!("    mov ${short_value}, %rax\n"));
    self.label(&format!(".Lend{id}"));
    self.push();
    Ok(())
  }

  /// Arguments are evaluated left to right. The first six travel in
  /// registers; the rest are copied below them so the seventh ends up at
  /// the lowest address. `%rsp` is 16-byte aligned at the `call`.
  fn call(&mut self, name: &str, args: &[Expr], ret_ty: &Type) -> CompileResult<()> {
    for arg in args {
      self.expr(arg)?;
    }

    let nargs = args.len();
    let cleanup = if nargs <= ARG_REGS.len() {
      for reg in ARG_REGS[..nargs].iter().rev() {
        self.pop(*reg);
      }
      let pad = self.depth % 2 == 1;
      if pad {
        self.out.push_str("    sub $8, %rsp\n");
      }
      self.out.push_str("    mov $0, %eax\n");
      self.out.push_str(&format!("    call {name}\n"));
      if pad { 8 } else { 0 }
    } else {
      let stack_args = nargs - ARG_REGS.len();
      for (idx, reg) in ARG_REGS.iter().enumerate() {
        self.out.push_str(&format!("    mov {}(%rsp), {}\n", (nargs - 1 - idx) * 8, reg.name(8)));
      }
      let pad = if (self.depth + stack_args) % 2 == 1 { 8 } else { 0 };
      if pad != 0 {
        self.out.push_str(&format!("    sub ${pad}, %rsp\n"));
      }
      for (copied, idx) in (ARG_REGS.len()..nargs).rev().enumerate() {
        let offset = (nargs - 1 - idx) * 8 + pad + copied * 8;
        self.out.push_str(&format!("    pushq {offset}(%rsp)\n"));
      }
      self.out.push_str("    mov $0, %eax\n");
      self.out.push_str(&format!("    call {name}\n"));
      self.depth -= nargs;
      (nargs + stack_args) * 8 + pad
    };

    if cleanup != 0 {
      self.out.push_str(&format!("    add ${cleanup}, %rsp\n"));
    }

    // The callee only guarantees the low bits of narrow return values.
    match ret_ty.kind {
      TypeKind::Bool => self.out.push_str("    movzbl %al, %eax\n"),
      TypeKind::Char => self.out.push_str("    movsbq %al, %rax\n"),
      TypeKind::Short => self.out.push_str("    movswq %ax, %rax\n"),
      TypeKind::Int => self.out.push_str("    movslq %eax, %rax\n"),
      _ => {}
    }
    self.push();
    Ok(())
  }
}

/// Operand width for arithmetic on a value of type `ty`.
fn op_size(ty: &Type) -> i64 {
  if ty.is_pointer() || ty.size() == 8 {
    8
  } else {
    4
  }
}

/// Comparisons use the narrower of the two operand widths; pointers are
/// always compared in full.
fn compare_size(lhs: &Type, rhs: &Type) -> i64 {
  if lhs.is_pointer() || rhs.is_pointer() {
    8
  } else {
    lhs.size().min(rhs.size())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{parser, tokenizer};

  fn compile(source: &str) -> String {
    let tokens = tokenizer::tokenize(source).unwrap();
    let program = parser::parse(tokens, source).unwrap();
    generate(&program, source).unwrap()
  }

  #[test]
  fn function_has_prologue_and_epilogue() {
    let asm = compile("int main() { return 42; }");
    assert!(asm.contains(".globl main\nmain:\n    push %rbp\n    mov %rsp, %rbp\n"));
    assert!(asm.contains("    mov $42, %rax\n"));
    assert!(asm.contains(".Lreturn_main:\n    mov %rbp, %rsp\n    pop %rbp\n    ret\n"));
  }

  #[test]
  fn static_functions_are_not_exported() {
    let asm = compile("static int helper() { return 1; } int main() { return helper(); }");
    assert!(!asm.contains(".globl helper"));
    assert!(asm.contains("helper:\n"));
    assert!(asm.contains("call helper"));
  }

  #[test]
  fn loop_labels_use_parser_ids_and_branches_continue_counting() {
    let asm = compile("int main() { int i; for (i = 0; i < 3; i++) if (i) break; return i; }");
    assert!(asm.contains(".Lbegin0:"));
    assert!(asm.contains(".Lnext0:"));
    assert!(asm.contains(".Lend0:"));
    assert!(asm.contains("jmp .Lend0"));
    assert!(asm.contains(".Lelse1:"));
    assert!(asm.contains(".Lend1:"));
  }

  #[test]
  fn narrow_comparison_uses_narrow_registers() {
    let asm = compile("int main() { char c; long l; c = 1; l = 1; return c == l; }");
    assert!(asm.contains("cmp %dil, %al"));
  }

  #[test]
  fn pointer_addition_scales_by_element_size() {
    let asm = compile("int main() { long a[4]; long *p; p = a + 2; return 0; }");
    assert!(asm.contains("imul $8, %rdi"));
  }

  #[test]
  fn globals_and_strings_go_to_data() {
    let asm = compile("int g; char *s() { return \"hi\"; } int main() { return g; }");
    assert!(asm.contains(".globl g\n    .align 4\ng:\n    .zero 4\n"));
    assert!(asm.contains(".L..0:\n    .byte 104\n    .byte 105\n    .byte 0\n"));
    assert!(!asm.contains(".globl .L..0"));
    assert!(asm.contains("lea g(%rip), %rax"));
  }

  #[test]
  fn register_parameters_are_spilled_with_their_width() {
    let asm = compile("int f(char a, short b, int c, long d) { return a; }");
    assert!(asm.contains("mov %dil, -1(%rbp)"));
    assert!(asm.contains("mov %si, -4(%rbp)"));
    assert!(asm.contains("mov %edx, -8(%rbp)"));
    assert!(asm.contains("mov %rcx, -16(%rbp)"));
  }

  #[test]
  fn stack_parameters_are_read_above_the_frame() {
    let asm = compile(
      "int f(int a, int b, int c, int d, int e, int g, int h, int i) { return i; }",
    );
    assert!(asm.contains("lea 24(%rbp), %rax"));
  }
}
