//! Syntax tree produced by the parser and consumed by the code generator.
//!
//! Every node owns its children. The only references that cross the tree
//! are handles: [`VarRef`] indexes a variable pool and [`LoopId`] names the
//! loop a `break`/`continue` belongs to.

use crate::ty::Type;

/// A variable, local or global.
#[derive(Debug, Clone)]
pub struct Obj {
  /// Source name for locals, assembler symbol for globals.
  pub name: String,
  pub ty: Type,
  pub is_local: bool,
  pub is_static: bool,
  /// Frame offset relative to `%rbp`. Negative for locals in the frame,
  /// positive for parameters passed on the stack.
  pub offset: i64,
  /// Stack-passed parameters keep the offset they were given.
  pub pinned: bool,
  /// Initial contents of string literal globals.
  pub init_data: Option<Vec<u8>>,
}

impl Obj {
  pub fn local(name: impl Into<String>, ty: Type) -> Self {
    Self {
      name: name.into(),
      ty,
      is_local: true,
      is_static: false,
      offset: 0,
      pinned: false,
      init_data: None,
    }
  }

  pub fn global(name: impl Into<String>, ty: Type) -> Self {
    Self {
      is_local: false,
      ..Self::local(name, ty)
    }
  }
}

/// Handle to a variable: an index into the current function's locals or
/// into the program's globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarRef {
  Local(usize),
  Global(usize),
}

/// Identifies a loop; also the number used in its `.L<purpose><id>` labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
  Add,
  Sub,
  Mul,
  Div,
  Mod,
  BitAnd,
  BitOr,
  BitXor,
  Shl,
  Shr,
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
  Neg,
  Not,
  BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
  And,
  Or,
}

/// Expression tree produced by the parser.
#[derive(Debug, Clone)]
pub enum ExprKind {
  Num {
    value: i64,
  },
  Var {
    var: VarRef,
  },
  Unary {
    op: UnaryOp,
    operand: Box<Expr>,
  },
  Binary {
    op: BinaryOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  Logical {
    op: LogicalOp,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  /// `op` is set for compound assignment; the operation happens in
  /// `op_ty`, and `rhs` has already been converted to it.
  Assign {
    op: Option<BinaryOp>,
    op_ty: Type,
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  Ternary {
    cond: Box<Expr>,
    then: Box<Expr>,
    els: Box<Expr>,
  },
  Comma {
    lhs: Box<Expr>,
    rhs: Box<Expr>,
  },
  Addr {
    operand: Box<Expr>,
  },
  Deref {
    operand: Box<Expr>,
  },
  /// `++`/`--`; `step` is already scaled for pointers.
  IncDec {
    prefix: bool,
    step: i64,
    operand: Box<Expr>,
  },
  /// Conversion to the type of the enclosing `Expr`.
  Cast {
    operand: Box<Expr>,
  },
  Call {
    name: String,
    args: Vec<Expr>,
  },
}

#[derive(Debug, Clone)]
pub struct Expr {
  pub kind: ExprKind,
  pub ty: Type,
  /// Byte offset of the token that produced the node.
  pub loc: usize,
}

impl Expr {
  pub fn new(kind: ExprKind, ty: Type, loc: usize) -> Self {
    Self { kind, ty, loc }
  }

  pub fn number(value: i64, ty: Type, loc: usize) -> Self {
    Self::new(ExprKind::Num { value }, ty, loc)
  }

  pub fn cast(self, ty: Type) -> Self {
    if self.ty == ty {
      return self;
    }
    let loc = self.loc;
    Self::new(
      ExprKind::Cast {
        operand: Box::new(self),
      },
      ty,
      loc,
    )
  }

  pub fn is_lvalue(&self) -> bool {
    match &self.kind {
      ExprKind::Var { .. } => !self.ty.is_array(),
      ExprKind::Deref { .. } => !self.ty.is_array() && !self.ty.is_func(),
      _ => false,
    }
  }
}

#[derive(Debug, Clone)]
pub enum Stmt {
  Block(Vec<Stmt>),
  Expr(Expr),
  Return(Option<Expr>),
  If {
    cond: Expr,
    then: Box<Stmt>,
    els: Option<Box<Stmt>>,
  },
  For {
    id: LoopId,
    init: Option<Box<Stmt>>,
    cond: Option<Expr>,
    post: Option<Expr>,
    body: Box<Stmt>,
  },
  While {
    id: LoopId,
    cond: Expr,
    body: Box<Stmt>,
  },
  DoWhile {
    id: LoopId,
    body: Box<Stmt>,
    cond: Expr,
  },
  Break(LoopId),
  Continue(LoopId),
}

#[derive(Debug, Clone)]
pub struct Function {
  pub name: String,
  pub ret_ty: Type,
  /// Indices into `locals`, in declaration order.
  pub params: Vec<usize>,
  pub locals: Vec<Obj>,
  pub body: Stmt,
  /// Frame size, a multiple of 16.
  pub stack_size: i64,
  pub is_static: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Program {
  pub functions: Vec<Function>,
  pub globals: Vec<Obj>,
  /// Label ids already handed out by the parser; the code generator keeps
  /// counting from here.
  pub label_count: usize,
}
