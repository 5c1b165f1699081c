//! Recursive-descent parser producing the program AST.
//!
//! Expressions are parsed by one helper per precedence level with statements
//! layered on top. Declarations consult the [`ScopeTable`] as they go, so
//! every identifier is resolved and every expression typed the moment it is
//! parsed.

use log::{debug, trace};

use crate::ast::{
  BinaryOp, Expr, ExprKind, Function, LogicalOp, LoopId, Obj, Program, Stmt, UnaryOp, VarRef,
};
use crate::error::{CompileError, CompileResult};
use crate::scope::{Binding, ScopeError, ScopeTable};
use crate::tokenizer::{Token, TokenKind, describe_token, token_text};
use crate::ty::{MAX_OBJECT_SIZE, Type, TypeKind, common_type, pointer_to, promoted};

const COMPOUND_ASSIGN_OPS: &[(&str, BinaryOp)] = &[
  ("+=", BinaryOp::Add),
  ("-=", BinaryOp::Sub),
  ("*=", BinaryOp::Mul),
  ("/=", BinaryOp::Div),
  ("%=", BinaryOp::Mod),
  ("&=", BinaryOp::BitAnd),
  ("|=", BinaryOp::BitOr),
  ("^=", BinaryOp::BitXor),
  ("<<=", BinaryOp::Shl),
  (">>=", BinaryOp::Shr),
];

const TYPE_KEYWORDS: &[&str] = &[
  "void", "_Bool", "char", "short", "int", "long", "typedef", "static",
];

/// Parse a whole translation unit from the token stream.
pub fn parse(tokens: Vec<Token>, source: &str) -> CompileResult<Program> {
  Parser::new(tokens, source).program()
}

/// Storage-class information attached to a declaration.
#[derive(Debug, Default, Clone, Copy)]
struct DeclAttr {
  is_typedef: bool,
  is_static: bool,
}

#[derive(Debug)]
struct Param {
  /// `None` for an abstract parameter in a prototype such as `int f(int);`.
  name: Option<String>,
  loc: usize,
  ty: Type,
}

/// Result of parsing one declarator: the declared name and its full type.
#[derive(Debug)]
struct Declarator {
  name: String,
  loc: usize,
  ty: Type,
  /// Named parameters, when `ty` is a function type.
  params: Vec<Param>,
}

pub struct Parser<'a> {
  stream: TokenStream<'a>,
  scopes: ScopeTable,
  functions: Vec<Function>,
  /// Innermost loop enclosing the statement being parsed.
  current_loop: Option<LoopId>,
  /// Return type of the function being parsed.
  ret_ty: Option<Type>,
  label_count: usize,
  string_count: usize,
  static_count: usize,
}

impl<'a> Parser<'a> {
  pub fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      stream: TokenStream::new(tokens, source),
      scopes: ScopeTable::new(),
      functions: Vec::new(),
      current_loop: None,
      ret_ty: None,
      label_count: 0,
      string_count: 0,
      static_count: 0,
    }
  }

  fn error_at(&self, loc: usize, message: impl Into<String>) -> CompileError {
    CompileError::at(self.stream.source, loc, message)
  }

  fn scope_error(&self, loc: usize, err: ScopeError) -> CompileError {
    match err {
      ScopeError::AlreadyDeclared { .. } => self.error_at(loc, err.to_string()),
      ScopeError::NoOpenScope => CompileError::internal(err.to_string()),
    }
  }

  fn leave_scope(&mut self) -> CompileResult<()> {
    self
      .scopes
      .leave()
      .map_err(|err| CompileError::internal(err.to_string()))
  }

  fn new_loop_id(&mut self) -> LoopId {
    let id = LoopId(self.label_count);
    self.label_count += 1;
    trace!("allocated loop id {}", id.0);
    id
  }

  // program = (typedef | function-definition | global-declaration)*
  pub fn program(mut self) -> CompileResult<Program> {
    while !self.stream.is_eof() {
      let (base, attr) = self.declspec()?;

      if attr.is_typedef {
        self.typedef_decl(base)?;
        continue;
      }

      if self.stream.equal(";") {
        continue;
      }

      let first = self.declarator(base.clone())?;
      if first.ty.is_func() && self.stream.is("{") {
        self.function(first, attr)?;
        continue;
      }
      self.global_declaration(base, attr, first)?;
    }

    Ok(Program {
      functions: self.functions,
      globals: self.scopes.into_globals(),
      label_count: self.label_count,
    })
  }

  fn function(&mut self, decl: Declarator, attr: DeclAttr) -> CompileResult<()> {
    if self.functions.iter().any(|func| func.name == decl.name) {
      return Err(self.error_at(decl.loc, format!("redefinition of '{}'", decl.name)));
    }
    self.check_prototype(&decl)?;
    self
      .scopes
      .declare_func(&decl.name, decl.ty.clone())
      .map_err(|err| self.scope_error(decl.loc, err))?;

    let ret_ty = decl.ty.base().cloned().unwrap_or_else(Type::int);
    self.scopes.enter();

    let mut params = Vec::with_capacity(decl.params.len());
    for (idx, param) in decl.params.into_iter().enumerate() {
      let Some(name) = param.name else {
        return Err(self.error_at(param.loc, "parameter name omitted"));
      };
      let var = self
        .scopes
        .declare(&name, param.ty)
        .map_err(|err| self.scope_error(param.loc, err))?;
      if idx >= 6 {
        self.scopes.pin_offset(var, 16 + 8 * (idx as i64 - 6));
      }
      if let VarRef::Local(local) = var {
        params.push(local);
      }
    }

    self.ret_ty = Some(ret_ty.clone());
    self.stream.skip("{")?;
    // Parameters and the outermost locals share one frame.
    let body = self.compound_stmt(false)?;
    self.ret_ty = None;
    self.leave_scope()?;
    if self.scopes.depth() != 0 {
      return Err(CompileError::internal(format!(
        "{} scopes still open after '{}'",
        self.scopes.depth(),
        decl.name
      )));
    }

    let (locals, stack_size) = self.scopes.finish_function();
    if stack_size > MAX_OBJECT_SIZE {
      return Err(self.error_at(decl.loc, format!("stack frame of '{}' is too large", decl.name)));
    }
    debug!(
      "parsed function {} ({} params, {} locals, {stack_size}-byte frame)",
      decl.name,
      params.len(),
      locals.len()
    );

    self.functions.push(Function {
      name: decl.name,
      ret_ty,
      params,
      locals,
      body,
      stack_size,
      is_static: attr.is_static,
    });
    Ok(())
  }

  fn global_declaration(
    &mut self,
    base: Type,
    attr: DeclAttr,
    first: Declarator,
  ) -> CompileResult<()> {
    let mut decl = first;
    loop {
      if decl.ty.is_func() {
        self.check_prototype(&decl)?;
        self
          .scopes
          .declare_func(&decl.name, decl.ty)
          .map_err(|err| self.scope_error(decl.loc, err))?;
      } else {
        if decl.ty.is_void() {
          return Err(self.error_at(decl.loc, "variable declared void"));
        }
        if decl.ty.is_array() && decl.ty.array_len().is_none() {
          return Err(self.error_at(decl.loc, format!("array size missing in '{}'", decl.name)));
        }
        if self.stream.is("=") {
          return Err(self.error_at(
            self.stream.loc(),
            "initializers for global variables are not supported",
          ));
        }
        self
          .scopes
          .declare_global(&decl.name, &decl.name, decl.ty, attr.is_static)
          .map_err(|err| self.scope_error(decl.loc, err))?;
      }

      if self.stream.equal(";") {
        return Ok(());
      }
      self.stream.skip(",")?;
      decl = self.declarator(base.clone())?;
    }
  }

  /// A function declared with a parameter list must keep the same type.
  /// `f()` leaves the parameters unspecified and matches anything.
  fn check_prototype(&self, decl: &Declarator) -> CompileResult<()> {
    if let Some(Binding::Func(prev)) = self.scopes.resolve(&decl.name)
      && !prev.params().is_empty()
      && !decl.ty.params().is_empty()
      && !prev.same_as(&decl.ty)
    {
      return Err(self.error_at(decl.loc, format!("conflicting types for '{}'", decl.name)));
    }
    Ok(())
  }

  fn typedef_decl(&mut self, base: Type) -> CompileResult<()> {
    let mut first = true;
    while !self.stream.equal(";") {
      if !first {
        self.stream.skip(",")?;
      }
      first = false;

      let decl = self.declarator(base.clone())?;
      self
        .scopes
        .declare_typedef(&decl.name, decl.ty)
        .map_err(|err| self.scope_error(decl.loc, err))?;
    }
    Ok(())
  }

  fn is_typename(&self) -> bool {
    self.is_typename_at(0)
  }

  fn is_typename_at(&self, offset: usize) -> bool {
    let Some(token) = self.stream.peek_nth(offset) else {
      return false;
    };
    let text = token_text(token, self.stream.source);
    match token.kind {
      TokenKind::Keyword => TYPE_KEYWORDS.contains(&text),
      TokenKind::Ident => self.scopes.resolve_typedef(text).is_some(),
      _ => false,
    }
  }

  // declspec = ("void" | "_Bool" | "char" | "short" | "int" | "long"
  //             | "typedef" | "static" | typedef-name)+
  //
  // The order of type keywords is irrelevant, so each one bumps a counter
  // and the sum picks the type: `long int long` is `long`.
  fn declspec(&mut self) -> CompileResult<(Type, DeclAttr)> {
    const VOID: u32 = 1 << 0;
    const BOOL: u32 = 1 << 2;
    const CHAR: u32 = 1 << 4;
    const SHORT: u32 = 1 << 6;
    const INT: u32 = 1 << 8;
    const LONG: u32 = 1 << 10;
    const OTHER: u32 = 1 << 12;

    let mut ty = Type::int();
    let mut counter = 0;
    let mut attr = DeclAttr::default();

    if !self.is_typename() {
      let got = describe_token(self.stream.peek(), self.stream.source);
      return Err(self.error_at(
        self.stream.loc(),
        format!("expected a type name, but got \"{got}\""),
      ));
    }

    while self.is_typename() {
      let loc = self.stream.loc();
      let text = self.stream.text();

      if text == "typedef" || text == "static" {
        if text == "typedef" {
          attr.is_typedef = true;
        } else {
          attr.is_static = true;
        }
        if attr.is_typedef && attr.is_static {
          return Err(self.error_at(loc, "typedef and static may not be used together"));
        }
        self.stream.advance();
        continue;
      }

      if self.stream.peek().is_some_and(|t| t.kind == TokenKind::Ident) {
        // A typedef name after a type keyword is the declarator, not a type.
        if counter != 0 {
          break;
        }
        if let Some(named) = self.scopes.resolve_typedef(text) {
          ty = named.clone();
        }
        counter += OTHER;
        self.stream.advance();
        continue;
      }

      counter += match text {
        "void" => VOID,
        "_Bool" => BOOL,
        "char" => CHAR,
        "short" => SHORT,
        "int" => INT,
        "long" => LONG,
        _ => OTHER,
      };

      ty = match counter {
        VOID => Type::void(),
        BOOL => Type::bool(),
        CHAR => Type::char(),
        c if c == SHORT || c == SHORT + INT => Type::short(),
        INT => Type::int(),
        c if c == LONG || c == LONG + INT || c == LONG + LONG || c == LONG + LONG + INT => {
          Type::long()
        }
        OTHER => ty,
        _ => return Err(self.error_at(loc, "invalid type")),
      };
      self.stream.advance();
    }

    Ok((ty, attr))
  }

  // declarator = "*"* ident type-suffix
  fn declarator(&mut self, mut ty: Type) -> CompileResult<Declarator> {
    while self.stream.equal("*") {
      ty = pointer_to(ty);
    }

    let (name, loc) = self.stream.get_ident()?;
    let mut params = Vec::new();
    let ty = self.type_suffix(ty, Some(&mut params))?;
    Ok(Declarator {
      name,
      loc,
      ty,
      params,
    })
  }

  // abstract-declarator = "*"* type-suffix
  fn typename(&mut self) -> CompileResult<Type> {
    let (mut ty, attr) = self.declspec()?;
    if attr.is_typedef || attr.is_static {
      return Err(self.error_at(self.stream.loc(), "storage class in a type name"));
    }
    while self.stream.equal("*") {
      ty = pointer_to(ty);
    }
    self.type_suffix(ty, None)
  }

  // type-suffix = "(" func-params | "[" const-expr? "]" type-suffix | ε
  //
  // `int a[2][3]`: the `[3]` suffix is applied to the element type first,
  // then `[2]` wraps the result.
  fn type_suffix(&mut self, ty: Type, params: Option<&mut Vec<Param>>) -> CompileResult<Type> {
    if self.stream.equal("(") {
      return self.func_params(ty, params);
    }

    if self.stream.equal("[") {
      let loc = self.stream.loc();
      let len = if self.stream.equal("]") {
        None
      } else {
        let len = self.const_expr()?;
        if len < 0 {
          return Err(self.error_at(loc, "array size is negative"));
        }
        self.stream.skip("]")?;
        Some(len as usize)
      };
      let elem = self.type_suffix(ty, None)?;
      if let Some(len) = len
        && (len as i64)
          .checked_mul(elem.size())
          .is_none_or(|size| size > MAX_OBJECT_SIZE)
      {
        return Err(self.error_at(loc, "array is too large"));
      }
      return Ok(Type::array_of(elem, len));
    }

    Ok(ty)
  }

  // func-params = ("void" | param ("," param)*)? ")"
  fn func_params(&mut self, ret: Type, out: Option<&mut Vec<Param>>) -> CompileResult<Type> {
    let mut params = Vec::new();

    let is_void_list = self.stream.peek().is_some_and(|t| t.kind == TokenKind::Keyword)
      && self.stream.text() == "void"
      && self.stream.peek_nth(1).is_some_and(|t| token_text(t, self.stream.source) == ")");
    if is_void_list {
      self.stream.advance();
    }

    while !self.stream.equal(")") {
      if !params.is_empty() {
        self.stream.skip(",")?;
      }
      let start = self.stream.loc();
      let (base, _) = self.declspec()?;
      let (name, loc, ty) = if self.is_named_declarator() {
        let decl = self.declarator(base)?;
        (Some(decl.name), decl.loc, decl.ty)
      } else {
        let mut ty = base;
        while self.stream.equal("*") {
          ty = pointer_to(ty);
        }
        (None, start, self.type_suffix(ty, None)?)
      };
      // Array parameters are really pointers.
      let ty = ty.decayed();
      if ty.is_void() {
        return Err(self.error_at(loc, "parameter declared void"));
      }
      params.push(Param { name, loc, ty });
    }

    let ty = Type::func(ret, params.iter().map(|p| p.ty.clone()).collect());
    if let Some(out) = out {
      *out = params;
    }
    Ok(ty)
  }

  /// Whether the `*`s ahead are followed by a name rather than an abstract
  /// declarator.
  fn is_named_declarator(&self) -> bool {
    let mut offset = 0;
    while self
      .stream
      .peek_nth(offset)
      .is_some_and(|t| token_text(t, self.stream.source) == "*")
    {
      offset += 1;
    }
    self
      .stream
      .peek_nth(offset)
      .is_some_and(|t| t.kind == TokenKind::Ident)
  }

  // compound-stmt = (declaration | stmt)* "}"
  fn compound_stmt(&mut self, new_scope: bool) -> CompileResult<Stmt> {
    if new_scope {
      self.scopes.enter();
    }

    let mut stmts = Vec::new();
    while !self.stream.equal("}") {
      if self.stream.is_eof() {
        return Err(self.error_at(self.stream.loc(), "expected \"}\", but got \"EOF\""));
      }
      if self.is_typename() {
        stmts.push(self.declaration()?);
      } else {
        stmts.push(self.stmt()?);
      }
    }

    if new_scope {
      self.leave_scope()?;
    }
    Ok(Stmt::Block(stmts))
  }

  // declaration = declspec (declarator ("=" initializer)?
  //                         ("," declarator ("=" initializer)?)*)? ";"
  //
  // The declaration itself generates no code; initializers become assignment
  // statements that run where the declaration appears.
  fn declaration(&mut self) -> CompileResult<Stmt> {
    let (base, attr) = self.declspec()?;
    if attr.is_typedef {
      self.typedef_decl(base)?;
      return Ok(Stmt::Block(Vec::new()));
    }

    let mut stmts = Vec::new();
    let mut first = true;
    while !self.stream.equal(";") {
      if !first {
        self.stream.skip(",")?;
      }
      first = false;

      let decl = self.declarator(base.clone())?;
      if decl.ty.is_void() {
        return Err(self.error_at(decl.loc, "variable declared void"));
      }
      if decl.ty.is_func() {
        self.check_prototype(&decl)?;
        self
          .scopes
          .declare_func(&decl.name, decl.ty)
          .map_err(|err| self.scope_error(decl.loc, err))?;
        continue;
      }

      if attr.is_static {
        self.static_local(decl)?;
        continue;
      }

      let var = self
        .scopes
        .declare(&decl.name, decl.ty)
        .map_err(|err| self.scope_error(decl.loc, err))?;
      if self.stream.equal("=") {
        self.initializer(var, decl.loc, &mut stmts)?;
      }
      if self.scopes.obj(var).ty.is_array() && self.scopes.obj(var).ty.array_len().is_none() {
        return Err(self.error_at(decl.loc, format!("array size missing in '{}'", decl.name)));
      }
    }

    Ok(Stmt::Block(stmts))
  }

  /// A static local lives in `.data` under a unique name but is only
  /// visible in its block.
  fn static_local(&mut self, decl: Declarator) -> CompileResult<()> {
    if self.stream.is("=") {
      return Err(self.error_at(
        self.stream.loc(),
        "initializers for static variables are not supported",
      ));
    }
    if decl.ty.is_array() && decl.ty.array_len().is_none() {
      return Err(self.error_at(decl.loc, format!("array size missing in '{}'", decl.name)));
    }
    let symbol = format!(".Lstatic.{}.{}", decl.name, self.static_count);
    self.static_count += 1;
    self
      .scopes
      .declare_global(&decl.name, &symbol, decl.ty, true)
      .map_err(|err| self.scope_error(decl.loc, err))?;
    Ok(())
  }

  fn var_expr(&self, var: VarRef, loc: usize) -> Expr {
    let ty = self.scopes.obj(var).ty.clone();
    Expr::new(ExprKind::Var { var }, ty, loc)
  }

  fn initializer(&mut self, var: VarRef, loc: usize, out: &mut Vec<Stmt>) -> CompileResult<()> {
    let ty = self.scopes.obj(var).ty.clone();
    if ty.is_array() && ty.array_len().is_none() {
      let len = self.count_initializer_elements(&ty)?;
      let elem = ty.base().cloned().unwrap_or_else(Type::int);
      self.scopes.obj_mut(var).ty = Type::array_of(elem, Some(len));
    }

    let target = self.var_expr(var, loc);
    self.init_into(target, out)
  }

  /// Length of the outermost array in the upcoming initializer, found by
  /// scanning ahead without consuming anything.
  fn count_initializer_elements(&self, ty: &Type) -> CompileResult<usize> {
    let Some(token) = self.stream.peek() else {
      return Err(self.error_at(self.stream.loc(), "expected an initializer"));
    };

    if token.kind == TokenKind::Str && ty.base().is_some_and(|elem| elem.kind == TypeKind::Char) {
      return Ok(token.bytes.as_ref().map_or(0, Vec::len));
    }

    if token_text(token, self.stream.source) != "{" {
      return Err(self.error_at(token.loc, "array initializer must be an initializer list"));
    }

    let mut depth = 0usize;
    let mut count = 0;
    let mut element_open = false;
    let mut offset = 0;
    while let Some(token) = self.stream.peek_nth(offset) {
      if token.kind == TokenKind::Eof {
        break;
      }
      let text = token_text(token, self.stream.source);
      match text {
        "{" | "(" | "[" => {
          if depth == 1 && !element_open {
            element_open = true;
            count += 1;
          }
          depth += 1;
        }
        "}" | ")" | "]" => {
          depth -= 1;
          if depth == 0 {
            return Ok(count);
          }
        }
        "," if depth == 1 => element_open = false,
        _ => {
          if depth == 1 && !element_open {
            element_open = true;
            count += 1;
          }
        }
      }
      offset += 1;
    }
    Err(self.error_at(token.loc, "unterminated initializer list"))
  }

  /// Desugar an initializer for `target` into assignment statements.
  /// Elements without an explicit initializer are zeroed.
  fn init_into(&mut self, target: Expr, out: &mut Vec<Stmt>) -> CompileResult<()> {
    if !target.ty.is_array() {
      let brace = self.stream.equal("{");
      let loc = self.stream.loc();
      let value = self.assign()?;
      if brace {
        self.stream.skip("}")?;
      }
      out.push(Stmt::Expr(self.new_assign(target, value, loc)?));
      return Ok(());
    }

    let len = target.ty.array_len().unwrap_or(0);
    let is_char_array = target.ty.base().is_some_and(|elem| elem.kind == TypeKind::Char);

    if is_char_array
      && let Some(token) = self.stream.peek()
      && token.kind == TokenKind::Str
    {
      let bytes = token.bytes.clone().unwrap_or_default();
      let loc = token.loc;
      self.stream.advance();
      for idx in 0..len {
        let value = bytes.get(idx).copied().unwrap_or(0) as i8;
        let elem = self.array_element(target.clone(), idx, loc)?;
        let value = Expr::number(i64::from(value), Type::int(), loc);
        out.push(Stmt::Expr(self.new_assign(elem, value, loc)?));
      }
      return Ok(());
    }

    self.stream.skip("{")?;
    let mut idx = 0;
    if !self.stream.equal("}") {
      loop {
        let loc = self.stream.loc();
        if idx >= len {
          return Err(self.error_at(loc, "excess elements in array initializer"));
        }
        let elem = self.array_element(target.clone(), idx, loc)?;
        self.init_into(elem, out)?;
        idx += 1;

        if self.stream.equal("}") {
          break;
        }
        self.stream.skip(",")?;
        if self.stream.equal("}") {
          break;
        }
      }
    }

    for rest in idx..len {
      let elem = self.array_element(target.clone(), rest, target.loc)?;
      self.zero_fill(elem, out)?;
    }
    Ok(())
  }

  fn zero_fill(&mut self, target: Expr, out: &mut Vec<Stmt>) -> CompileResult<()> {
    if target.ty.is_array() {
      for idx in 0..target.ty.array_len().unwrap_or(0) {
        let elem = self.array_element(target.clone(), idx, target.loc)?;
        self.zero_fill(elem, out)?;
      }
      return Ok(());
    }
    let loc = target.loc;
    let zero = Expr::number(0, Type::int(), loc);
    out.push(Stmt::Expr(self.new_assign(target, zero, loc)?));
    Ok(())
  }

  fn array_element(&self, array: Expr, idx: usize, loc: usize) -> CompileResult<Expr> {
    let index = Expr::number(idx as i64, Type::long(), loc);
    let addr = self.new_add(array, index, loc)?;
    self.new_deref(addr, loc)
  }

  // stmt = "return" expr? ";"
  //      | "if" "(" expr ")" stmt ("else" stmt)?
  //      | "for" "(" (declaration | expr? ";") expr? ";" expr? ")" stmt
  //      | "while" "(" expr ")" stmt
  //      | "do" stmt "while" "(" expr ")" ";"
  //      | "break" ";" | "continue" ";"
  //      | "{" compound-stmt
  //      | expr? ";"
  fn stmt(&mut self) -> CompileResult<Stmt> {
    let loc = self.stream.loc();

    if self.stream.equal("return") {
      return self.return_stmt(loc);
    }

    if self.stream.equal("if") {
      self.stream.skip("(")?;
      let cond = self.expr()?;
      self.stream.skip(")")?;
      let then = Box::new(self.stmt()?);
      let els = if self.stream.equal("else") {
        Some(Box::new(self.stmt()?))
      } else {
        None
      };
      return Ok(Stmt::If { cond, then, els });
    }

    if self.stream.equal("for") {
      return self.for_stmt();
    }

    if self.stream.equal("while") {
      let id = self.new_loop_id();
      self.stream.skip("(")?;
      let cond = self.expr()?;
      self.stream.skip(")")?;
      let body = Box::new(self.loop_body(id)?);
      return Ok(Stmt::While { id, cond, body });
    }

    if self.stream.equal("do") {
      let id = self.new_loop_id();
      let body = Box::new(self.loop_body(id)?);
      self.stream.skip("while")?;
      self.stream.skip("(")?;
      let cond = self.expr()?;
      self.stream.skip(")")?;
      self.stream.skip(";")?;
      return Ok(Stmt::DoWhile { id, body, cond });
    }

    if self.stream.equal("break") {
      let Some(id) = self.current_loop else {
        return Err(self.error_at(loc, "break statement not within loop"));
      };
      self.stream.skip(";")?;
      return Ok(Stmt::Break(id));
    }

    if self.stream.equal("continue") {
      let Some(id) = self.current_loop else {
        return Err(self.error_at(loc, "continue statement not within loop"));
      };
      self.stream.skip(";")?;
      return Ok(Stmt::Continue(id));
    }

    if self.stream.equal("{") {
      return self.compound_stmt(true);
    }

    if self.stream.equal(";") {
      return Ok(Stmt::Block(Vec::new()));
    }

    let expr = self.expr()?;
    self.stream.skip(";")?;
    Ok(Stmt::Expr(expr))
  }

  fn return_stmt(&mut self, loc: usize) -> CompileResult<Stmt> {
    let ret_ty = self.ret_ty.clone().unwrap_or_else(Type::int);

    if self.stream.equal(";") {
      return Ok(Stmt::Return(None));
    }

    let value = self.expr()?;
    self.stream.skip(";")?;
    if ret_ty.is_void() {
      return Err(self.error_at(loc, "void function should not return a value"));
    }
    Ok(Stmt::Return(Some(value.cast(ret_ty))))
  }

  fn for_stmt(&mut self) -> CompileResult<Stmt> {
    let id = self.new_loop_id();
    self.stream.skip("(")?;
    self.scopes.enter();

    let init = if self.stream.equal(";") {
      None
    } else if self.is_typename() {
      Some(Box::new(self.declaration()?))
    } else {
      let expr = self.expr()?;
      self.stream.skip(";")?;
      Some(Box::new(Stmt::Expr(expr)))
    };

    let cond = if self.stream.is(";") {
      None
    } else {
      Some(self.expr()?)
    };
    self.stream.skip(";")?;

    let post = if self.stream.is(")") {
      None
    } else {
      Some(self.expr()?)
    };
    self.stream.skip(")")?;

    let body = Box::new(self.loop_body(id)?);
    self.leave_scope()?;

    Ok(Stmt::For {
      id,
      init,
      cond,
      post,
      body,
    })
  }

  /// Parse a loop body with `id` as the target of `break`/`continue`.
  fn loop_body(&mut self, id: LoopId) -> CompileResult<Stmt> {
    let outer = self.current_loop.replace(id);
    let body = self.stmt();
    self.current_loop = outer;
    body
  }

  // expr = assign ("," expr)?
  fn expr(&mut self) -> CompileResult<Expr> {
    let node = self.assign()?;

    let loc = self.stream.loc();
    if self.stream.equal(",") {
      let rhs = self.expr()?;
      let ty = rhs.ty.clone();
      return Ok(Expr::new(
        ExprKind::Comma {
          lhs: Box::new(node),
          rhs: Box::new(rhs),
        },
        ty,
        loc,
      ));
    }

    Ok(node)
  }

  // assign = conditional (assign-op assign)?
  // assign-op = "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "&=" | "|=" | "^="
  //           | "<<=" | ">>="
  fn assign(&mut self) -> CompileResult<Expr> {
    let node = self.conditional()?;

    let loc = self.stream.loc();
    if self.stream.equal("=") {
      let rhs = self.assign()?;
      return self.new_assign(node, rhs, loc);
    }

    for &(symbol, op) in COMPOUND_ASSIGN_OPS {
      if self.stream.equal(symbol) {
        let rhs = self.assign()?;
        return self.new_compound_assign(op, node, rhs, loc);
      }
    }

    Ok(node)
  }

  fn new_assign(&self, lhs: Expr, rhs: Expr, loc: usize) -> CompileResult<Expr> {
    if !lhs.is_lvalue() {
      return Err(self.error_at(lhs.loc, "not an lvalue"));
    }
    if rhs.ty.is_void() {
      return Err(self.error_at(rhs.loc, "void value not ignored as it ought to be"));
    }
    self.check_assignable(&lhs.ty, &rhs)?;
    let ty = lhs.ty.clone();
    Ok(Expr::new(
      ExprKind::Assign {
        op: None,
        op_ty: ty.clone(),
        rhs: Box::new(rhs.cast(ty.clone())),
        lhs: Box::new(lhs),
      },
      ty,
      loc,
    ))
  }

  /// Pointers only take pointers to the same type, `void *`, or a null
  /// constant. Integers other than `_Bool` never take pointers.
  fn check_assignable(&self, target: &Type, rhs: &Expr) -> CompileResult<()> {
    let value = rhs.ty.decayed();
    if target.is_pointer() {
      if value.is_pointer() {
        let compatible = match (target.base(), value.base()) {
          (Some(a), Some(b)) => a.is_void() || b.is_void() || a.same_as(b),
          _ => false,
        };
        if !compatible {
          return Err(self.error_at(rhs.loc, "assignment from incompatible pointer type"));
        }
      } else if eval_const(rhs) != Some(0) {
        return Err(self.error_at(rhs.loc, "assignment makes a pointer from an integer"));
      }
    } else if target.is_integer() && target.kind != TypeKind::Bool && value.is_pointer() {
      return Err(self.error_at(rhs.loc, "assignment makes an integer from a pointer"));
    }
    Ok(())
  }

  /// `a op= b` stays one node so that `a`'s address is computed only once.
  fn new_compound_assign(
    &self,
    op: BinaryOp,
    lhs: Expr,
    rhs: Expr,
    loc: usize,
  ) -> CompileResult<Expr> {
    if !lhs.is_lvalue() {
      return Err(self.error_at(lhs.loc, "not an lvalue"));
    }
    if !rhs.ty.is_integer() {
      return Err(self.error_at(loc, "invalid operands to compound assignment"));
    }

    let (op_ty, rhs) = if lhs.ty.is_pointer() {
      if !matches!(op, BinaryOp::Add | BinaryOp::Sub) {
        return Err(self.error_at(loc, "invalid operands to compound assignment"));
      }
      (lhs.ty.clone(), rhs.cast(Type::long()))
    } else if !lhs.ty.is_integer() {
      return Err(self.error_at(loc, "invalid operands to compound assignment"));
    } else if matches!(op, BinaryOp::Shl | BinaryOp::Shr) {
      (promoted(&lhs.ty), rhs.cast(Type::int()))
    } else {
      let op_ty = common_type(&lhs.ty, &rhs.ty);
      let rhs = rhs.cast(op_ty.clone());
      (op_ty, rhs)
    };

    let ty = lhs.ty.clone();
    Ok(Expr::new(
      ExprKind::Assign {
        op: Some(op),
        op_ty,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
      },
      ty,
      loc,
    ))
  }

  // conditional = logor ("?" expr ":" conditional)?
  fn conditional(&mut self) -> CompileResult<Expr> {
    let cond = self.logor()?;

    let loc = self.stream.loc();
    if !self.stream.equal("?") {
      return Ok(cond);
    }

    let then = self.expr()?;
    self.stream.skip(":")?;
    let els = self.conditional()?;

    let (ty, then, els) = if then.ty.is_integer() && els.ty.is_integer() {
      let ty = common_type(&then.ty, &els.ty);
      let then = then.cast(ty.clone());
      let els = els.cast(ty.clone());
      (ty, then, els)
    } else if then.ty.is_pointer() {
      (then.ty.decayed(), then, els)
    } else if els.ty.is_pointer() {
      (els.ty.decayed(), then, els)
    } else {
      (then.ty.clone(), then, els)
    };

    Ok(Expr::new(
      ExprKind::Ternary {
        cond: Box::new(cond),
        then: Box::new(then),
        els: Box::new(els),
      },
      ty,
      loc,
    ))
  }

  // logor = logand ("||" logand)*
  fn logor(&mut self) -> CompileResult<Expr> {
    let mut node = self.logand()?;
    loop {
      let loc = self.stream.loc();
      if !self.stream.equal("||") {
        return Ok(node);
      }
      let rhs = self.logand()?;
      node = logical(LogicalOp::Or, node, rhs, loc);
    }
  }

  // logand = bitor ("&&" bitor)*
  fn logand(&mut self) -> CompileResult<Expr> {
    let mut node = self.bitor()?;
    loop {
      let loc = self.stream.loc();
      if !self.stream.equal("&&") {
        return Ok(node);
      }
      let rhs = self.bitor()?;
      node = logical(LogicalOp::And, node, rhs, loc);
    }
  }

  // bitor = bitxor ("|" bitxor)*
  fn bitor(&mut self) -> CompileResult<Expr> {
    let mut node = self.bitxor()?;
    loop {
      let loc = self.stream.loc();
      if !self.stream.equal("|") {
        return Ok(node);
      }
      let rhs = self.bitxor()?;
      node = self.new_arith(BinaryOp::BitOr, node, rhs, loc)?;
    }
  }

  // bitxor = bitand ("^" bitand)*
  fn bitxor(&mut self) -> CompileResult<Expr> {
    let mut node = self.bitand()?;
    loop {
      let loc = self.stream.loc();
      if !self.stream.equal("^") {
        return Ok(node);
      }
      let rhs = self.bitand()?;
      node = self.new_arith(BinaryOp::BitXor, node, rhs, loc)?;
    }
  }

  // bitand = equality ("&" equality)*
  fn bitand(&mut self) -> CompileResult<Expr> {
    let mut node = self.equality()?;
    loop {
      let loc = self.stream.loc();
      if !self.stream.equal("&") {
        return Ok(node);
      }
      let rhs = self.equality()?;
      node = self.new_arith(BinaryOp::BitAnd, node, rhs, loc)?;
    }
  }

  // equality = relational ("==" relational | "!=" relational)*
  fn equality(&mut self) -> CompileResult<Expr> {
    let mut node = self.relational()?;

    loop {
      let loc = self.stream.loc();
      let op = match self.stream.punct() {
        Some("==") => BinaryOp::Eq,
        Some("!=") => BinaryOp::Ne,
        _ => break,
      };
      self.stream.advance();
      let rhs = self.relational()?;
      node = self.new_compare(op, node, rhs, loc)?;
    }

    Ok(node)
  }

  // relational = shift ("<" shift | "<=" shift | ">" shift | ">=" shift)*
  fn relational(&mut self) -> CompileResult<Expr> {
    let mut node = self.shift()?;

    loop {
      let loc = self.stream.loc();
      let op = match self.stream.punct() {
        Some("<") => BinaryOp::Lt,
        Some("<=") => BinaryOp::Le,
        Some(">") => BinaryOp::Gt,
        Some(">=") => BinaryOp::Ge,
        _ => break,
      };
      self.stream.advance();
      let rhs = self.shift()?;
      node = self.new_compare(op, node, rhs, loc)?;
    }

    Ok(node)
  }

  // shift = add ("<<" add | ">>" add)*
  fn shift(&mut self) -> CompileResult<Expr> {
    let mut node = self.add()?;

    loop {
      let loc = self.stream.loc();
      let op = match self.stream.punct() {
        Some("<<") => BinaryOp::Shl,
        Some(">>") => BinaryOp::Shr,
        _ => break,
      };
      self.stream.advance();
      let rhs = self.add()?;
      if !node.ty.is_integer() || !rhs.ty.is_integer() {
        return Err(self.error_at(loc, "invalid operands to shift"));
      }
      let ty = promoted(&node.ty);
      node = binary(op, node.cast(ty.clone()), rhs.cast(Type::int()), ty, loc);
    }

    Ok(node)
  }

  // add = mul ("+" mul | "-" mul)*
  fn add(&mut self) -> CompileResult<Expr> {
    let mut node = self.mul()?;

    loop {
      let loc = self.stream.loc();
      if self.stream.equal("+") {
        let rhs = self.mul()?;
        node = self.new_add(node, rhs, loc)?;
        continue;
      }
      if self.stream.equal("-") {
        let rhs = self.mul()?;
        node = self.new_sub(node, rhs, loc)?;
        continue;
      }
      return Ok(node);
    }
  }

  // mul = cast ("*" cast | "/" cast | "%" cast)*
  fn mul(&mut self) -> CompileResult<Expr> {
    let mut node = self.cast()?;

    loop {
      let loc = self.stream.loc();
      let op = match self.stream.punct() {
        Some("*") => BinaryOp::Mul,
        Some("/") => BinaryOp::Div,
        Some("%") => BinaryOp::Mod,
        _ => break,
      };
      self.stream.advance();
      let rhs = self.cast()?;
      node = if op == BinaryOp::Mul {
        self.new_arith(op, node, rhs, loc)?
      } else {
        self.new_div(op, node, rhs, loc)?
      };
    }

    Ok(node)
  }

  /// Arithmetic on the common type of both operands.
  fn new_arith(&self, op: BinaryOp, lhs: Expr, rhs: Expr, loc: usize) -> CompileResult<Expr> {
    if !lhs.ty.is_integer() || !rhs.ty.is_integer() {
      return Err(self.error_at(loc, "invalid operands to binary expression"));
    }
    let ty = common_type(&lhs.ty, &rhs.ty);
    Ok(binary(op, lhs.cast(ty.clone()), rhs.cast(ty.clone()), ty, loc))
  }

  /// Division keeps its operands unconverted: the code generator divides at
  /// the width of the narrower one.
  fn new_div(&self, op: BinaryOp, lhs: Expr, rhs: Expr, loc: usize) -> CompileResult<Expr> {
    if !lhs.ty.is_integer() || !rhs.ty.is_integer() {
      return Err(self.error_at(loc, "invalid operands to binary expression"));
    }
    let ty = common_type(&lhs.ty, &rhs.ty);
    Ok(binary(op, lhs, rhs, ty, loc))
  }

  /// Comparisons also keep their operands unconverted.
  fn new_compare(&self, op: BinaryOp, lhs: Expr, rhs: Expr, loc: usize) -> CompileResult<Expr> {
    let scalar = |ty: &Type| ty.is_integer() || ty.is_pointer();
    if !scalar(&lhs.ty) || !scalar(&rhs.ty) {
      return Err(self.error_at(loc, "invalid operands to comparison"));
    }
    Ok(binary(op, lhs, rhs, Type::int(), loc))
  }

  /// `+` also covers pointer arithmetic; the integer side is scaled by the
  /// pointee size during code generation.
  fn new_add(&self, lhs: Expr, rhs: Expr, loc: usize) -> CompileResult<Expr> {
    if lhs.ty.is_integer() && rhs.ty.is_integer() {
      return self.new_arith(BinaryOp::Add, lhs, rhs, loc);
    }
    if lhs.ty.is_pointer() && rhs.ty.is_pointer() {
      return Err(self.error_at(loc, "invalid operands to pointer addition"));
    }

    // Canonicalize `num + ptr` to `ptr + num`.
    let (ptr, num) = if lhs.ty.is_pointer() {
      (lhs, rhs)
    } else {
      (rhs, lhs)
    };
    if !ptr.ty.is_pointer() || !num.ty.is_integer() {
      return Err(self.error_at(loc, "invalid operands to binary expression"));
    }
    let ty = ptr.ty.decayed();
    Ok(binary(BinaryOp::Add, ptr, num.cast(Type::long()), ty, loc))
  }

  fn new_sub(&self, lhs: Expr, rhs: Expr, loc: usize) -> CompileResult<Expr> {
    if lhs.ty.is_integer() && rhs.ty.is_integer() {
      return self.new_arith(BinaryOp::Sub, lhs, rhs, loc);
    }

    // ptr - num
    if lhs.ty.is_pointer() && rhs.ty.is_integer() {
      let ty = lhs.ty.decayed();
      return Ok(binary(BinaryOp::Sub, lhs, rhs.cast(Type::long()), ty, loc));
    }

    // ptr - ptr: the number of elements between the two.
    if lhs.ty.is_pointer() && rhs.ty.is_pointer() {
      let compatible = match (lhs.ty.base(), rhs.ty.base()) {
        (Some(a), Some(b)) => a.same_as(b),
        _ => false,
      };
      if !compatible {
        return Err(self.error_at(loc, "subtraction of incompatible pointer types"));
      }
      return Ok(binary(BinaryOp::Sub, lhs, rhs, Type::long(), loc));
    }

    Err(self.error_at(loc, "invalid operands to binary expression"))
  }

  fn new_deref(&self, operand: Expr, loc: usize) -> CompileResult<Expr> {
    let Some(base) = operand.ty.base().filter(|_| operand.ty.is_pointer()).cloned() else {
      return Err(self.error_at(loc, "invalid pointer dereference"));
    };
    if base.is_void() {
      return Err(self.error_at(loc, "dereferencing a void pointer"));
    }
    Ok(Expr::new(
      ExprKind::Deref {
        operand: Box::new(operand),
      },
      base,
      loc,
    ))
  }

  fn new_incdec(&self, operand: Expr, prefix: bool, delta: i64, loc: usize) -> CompileResult<Expr> {
    if !operand.is_lvalue() {
      return Err(self.error_at(operand.loc, "not an lvalue"));
    }
    let step = match operand.ty.base() {
      Some(base) if operand.ty.is_pointer() => delta * base.size(),
      _ => delta,
    };
    let ty = operand.ty.clone();
    Ok(Expr::new(
      ExprKind::IncDec {
        prefix,
        step,
        operand: Box::new(operand),
      },
      ty,
      loc,
    ))
  }

  // cast = "(" type-name ")" cast | unary
  fn cast(&mut self) -> CompileResult<Expr> {
    if self.stream.is("(") && self.is_typename_at(1) {
      let loc = self.stream.loc();
      self.stream.advance();
      let ty = self.typename()?;
      self.stream.skip(")")?;
      let operand = self.cast()?;
      if !ty.is_void() && !(operand.ty.is_integer() || operand.ty.is_pointer()) {
        return Err(self.error_at(loc, "invalid cast"));
      }
      let mut node = operand.cast(ty);
      node.loc = loc;
      return Ok(node);
    }

    self.unary()
  }

  // unary = ("+" | "-" | "!" | "~" | "&" | "*") cast
  //       | ("++" | "--") unary
  //       | "sizeof" "(" type-name ")"
  //       | "sizeof" unary
  //       | postfix
  fn unary(&mut self) -> CompileResult<Expr> {
    let loc = self.stream.loc();

    if self.stream.equal("+") {
      let operand = self.cast()?;
      if !operand.ty.is_integer() {
        return Err(self.error_at(loc, "invalid operand to unary '+'"));
      }
      let ty = promoted(&operand.ty);
      return Ok(operand.cast(ty));
    }

    if self.stream.equal("-") {
      let operand = self.cast()?;
      return self.new_unary(UnaryOp::Neg, operand, loc);
    }

    if self.stream.equal("~") {
      let operand = self.cast()?;
      return self.new_unary(UnaryOp::BitNot, operand, loc);
    }

    if self.stream.equal("!") {
      let operand = self.cast()?;
      if !(operand.ty.is_integer() || operand.ty.is_pointer()) {
        return Err(self.error_at(loc, "invalid operand to '!'"));
      }
      return Ok(Expr::new(
        ExprKind::Unary {
          op: UnaryOp::Not,
          operand: Box::new(operand),
        },
        Type::int(),
        loc,
      ));
    }

    if self.stream.equal("&") {
      let operand = self.cast()?;
      if !matches!(operand.kind, ExprKind::Var { .. } | ExprKind::Deref { .. }) {
        return Err(self.error_at(operand.loc, "cannot take the address of an rvalue"));
      }
      let ty = pointer_to(operand.ty.clone());
      return Ok(Expr::new(
        ExprKind::Addr {
          operand: Box::new(operand),
        },
        ty,
        loc,
      ));
    }

    if self.stream.equal("*") {
      let operand = self.cast()?;
      return self.new_deref(operand, loc);
    }

    if self.stream.equal("++") {
      let operand = self.unary()?;
      return self.new_incdec(operand, true, 1, loc);
    }

    if self.stream.equal("--") {
      let operand = self.unary()?;
      return self.new_incdec(operand, true, -1, loc);
    }

    if self.stream.equal("sizeof") {
      let ty = if self.stream.is("(") && self.is_typename_at(1) {
        self.stream.advance();
        let ty = self.typename()?;
        self.stream.skip(")")?;
        ty
      } else {
        self.unary()?.ty
      };
      if ty.is_array() && ty.array_len().is_none() {
        return Err(self.error_at(loc, "invalid application of sizeof to an incomplete type"));
      }
      return Ok(Expr::number(ty.size(), Type::long(), loc));
    }

    self.postfix()
  }

  fn new_unary(&self, op: UnaryOp, operand: Expr, loc: usize) -> CompileResult<Expr> {
    if !operand.ty.is_integer() {
      return Err(self.error_at(loc, "invalid operand to unary expression"));
    }
    let ty = promoted(&operand.ty);
    Ok(Expr::new(
      ExprKind::Unary {
        op,
        operand: Box::new(operand.cast(ty.clone())),
      },
      ty,
      loc,
    ))
  }

  // postfix = primary ("[" expr "]" | "++" | "--")*
  fn postfix(&mut self) -> CompileResult<Expr> {
    let mut node = self.primary()?;

    loop {
      let loc = self.stream.loc();
      if self.stream.equal("[") {
        let index = self.expr()?;
        self.stream.skip("]")?;
        let addr = self.new_add(node, index, loc)?;
        node = self.new_deref(addr, loc)?;
        continue;
      }
      if self.stream.equal("++") {
        node = self.new_incdec(node, false, 1, loc)?;
        continue;
      }
      if self.stream.equal("--") {
        node = self.new_incdec(node, false, -1, loc)?;
        continue;
      }
      return Ok(node);
    }
  }

  // primary = "(" expr ")" | num | str | ident ("(" func-args ")")?
  fn primary(&mut self) -> CompileResult<Expr> {
    let loc = self.stream.loc();

    if self.stream.equal("(") {
      let node = self.expr()?;
      self.stream.skip(")")?;
      return Ok(node);
    }

    if let Some(token) = self.stream.peek()
      && token.kind == TokenKind::Str
    {
      let bytes = token.bytes.clone().unwrap_or_default();
      self.stream.advance();
      return Ok(self.string_literal(bytes, loc));
    }

    if self.stream.peek().is_some_and(|t| t.kind == TokenKind::Ident) {
      let (name, loc) = self.stream.get_ident()?;
      if self.stream.is("(") {
        return self.funcall(name, loc);
      }
      return match self.scopes.resolve(&name) {
        Some(Binding::Var(var)) => Ok(self.var_expr(*var, loc)),
        Some(Binding::Func(_)) => {
          Err(self.error_at(loc, format!("function '{name}' used as a value")))
        }
        Some(Binding::Typedef(_)) => {
          Err(self.error_at(loc, format!("unexpected type name '{name}'")))
        }
        None => Err(self.error_at(loc, format!("undefined variable '{name}'"))),
      };
    }

    if self.stream.peek().is_some_and(|t| t.kind == TokenKind::Num) {
      let is_long = self.stream.peek().is_some_and(|t| t.is_long);
      let (value, loc) = self.stream.get_number()?;
      let ty = if is_long { Type::long() } else { Type::int() };
      return Ok(Expr::number(value, ty, loc));
    }

    let got = describe_token(self.stream.peek(), self.stream.source);
    Err(self.error_at(loc, format!("expected an expression, but got \"{got}\"")))
  }

  /// String literals become anonymous global `char` arrays.
  fn string_literal(&mut self, bytes: Vec<u8>, loc: usize) -> Expr {
    let ty = Type::array_of(Type::char(), Some(bytes.len()));
    let mut obj = Obj::global(format!(".L..{}", self.string_count), ty.clone());
    self.string_count += 1;
    obj.is_static = true;
    obj.init_data = Some(bytes);
    let var = self.scopes.add_anonymous_global(obj);
    Expr::new(ExprKind::Var { var }, ty, loc)
  }

  // func-args = (assign ("," assign)*)? ")"
  fn funcall(&mut self, name: String, loc: usize) -> CompileResult<Expr> {
    self.stream.skip("(")?;

    let func_ty = match self.scopes.resolve(&name) {
      Some(Binding::Func(ty)) => Some(ty.clone()),
      Some(_) => return Err(self.error_at(loc, format!("'{name}' is not a function"))),
      // Undeclared functions are assumed to return int.
      None => None,
    };

    let mut args = Vec::new();
    while !self.stream.equal(")") {
      if !args.is_empty() {
        self.stream.skip(",")?;
      }
      let arg = self.assign()?;
      if arg.ty.is_void() {
        return Err(self.error_at(arg.loc, "void value passed as an argument"));
      }
      args.push(arg);
    }

    let ret_ty = match &func_ty {
      Some(ty) => {
        let params = ty.params();
        // `f()` declares a function with unspecified parameters.
        if !params.is_empty() && params.len() != args.len() {
          let problem = if args.len() < params.len() { "few" } else { "many" };
          return Err(self.error_at(loc, format!("too {problem} arguments to function '{name}'")));
        }
        args = args
          .into_iter()
          .enumerate()
          .map(|(idx, arg)| match params.get(idx) {
            Some(param) => arg.cast(param.clone()),
            None => arg,
          })
          .collect();
        ty.base().cloned().unwrap_or_else(Type::int)
      }
      None => Type::int(),
    };

    Ok(Expr::new(ExprKind::Call { name, args }, ret_ty, loc))
  }

  fn const_expr(&mut self) -> CompileResult<i64> {
    let loc = self.stream.loc();
    let node = self.conditional()?;
    eval_const(&node).ok_or_else(|| self.error_at(loc, "expected a constant expression"))
  }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, ty: Type, loc: usize) -> Expr {
  Expr::new(
    ExprKind::Binary {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    },
    ty,
    loc,
  )
}

fn logical(op: LogicalOp, lhs: Expr, rhs: Expr, loc: usize) -> Expr {
  Expr::new(
    ExprKind::Logical {
      op,
      lhs: Box::new(lhs),
      rhs: Box::new(rhs),
    },
    Type::int(),
    loc,
  )
}

/// Truncate `value` to the width of an integer type, sign-extending back.
fn truncate(value: i64, ty: &Type) -> i64 {
  match ty.kind {
    TypeKind::Bool => i64::from(value != 0),
    TypeKind::Char => i64::from(value as i8),
    TypeKind::Short => i64::from(value as i16),
    TypeKind::Int => i64::from(value as i32),
    _ => value,
  }
}

/// Fold an integer constant expression, or `None` if it is not one.
pub fn eval_const(node: &Expr) -> Option<i64> {
  let value = match &node.kind {
    ExprKind::Num { value } => *value,
    ExprKind::Cast { operand } => eval_const(operand)?,
    ExprKind::Comma { rhs, .. } => eval_const(rhs)?,
    ExprKind::Ternary { cond, then, els } => {
      if eval_const(cond)? != 0 {
        eval_const(then)?
      } else {
        eval_const(els)?
      }
    }
    ExprKind::Unary { op, operand } => {
      let value = eval_const(operand)?;
      match op {
        UnaryOp::Neg => value.wrapping_neg(),
        UnaryOp::Not => i64::from(value == 0),
        UnaryOp::BitNot => !value,
      }
    }
    ExprKind::Logical { op, lhs, rhs } => {
      let lhs = eval_const(lhs)? != 0;
      let value = match op {
        LogicalOp::And => lhs && eval_const(rhs)? != 0,
        LogicalOp::Or => lhs || eval_const(rhs)? != 0,
      };
      i64::from(value)
    }
    ExprKind::Binary { op, lhs, rhs } => {
      if !node.ty.is_integer() {
        return None;
      }
      let (l, r) = (eval_const(lhs)?, eval_const(rhs)?);
      match op {
        BinaryOp::Add => l.wrapping_add(r),
        BinaryOp::Sub => l.wrapping_sub(r),
        BinaryOp::Mul => l.wrapping_mul(r),
        BinaryOp::Div => l.checked_div(r)?,
        BinaryOp::Mod => l.checked_rem(r)?,
        BinaryOp::BitAnd => l & r,
        BinaryOp::BitOr => l | r,
        BinaryOp::BitXor => l ^ r,
        BinaryOp::Shl => l.wrapping_shl(r as u32),
        BinaryOp::Shr => l.wrapping_shr(r as u32),
        BinaryOp::Eq => i64::from(l == r),
        BinaryOp::Ne => i64::from(l != r),
        BinaryOp::Lt => i64::from(l < r),
        BinaryOp::Le => i64::from(l <= r),
        BinaryOp::Gt => i64::from(l > r),
        BinaryOp::Ge => i64::from(l >= r),
      }
    }
    _ => return None,
  };
  Some(truncate(value, &node.ty))
}

/// Lightweight cursor over the token vector.
struct TokenStream<'a> {
  tokens: Vec<Token>,
  source: &'a str,
  pos: usize,
}

impl<'a> TokenStream<'a> {
  /// Take ownership of the token stream; the parser will advance `pos` as it consumes input.
  fn new(tokens: Vec<Token>, source: &'a str) -> Self {
    Self {
      tokens,
      source,
      pos: 0,
    }
  }

  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn peek_nth(&self, offset: usize) -> Option<&Token> {
    self.tokens.get(self.pos + offset)
  }

  /// Byte offset of the current token, for diagnostics.
  fn loc(&self) -> usize {
    self.peek().map_or(self.source.len(), |token| token.loc)
  }

  fn text(&self) -> &'a str {
    self
      .peek()
      .map_or("", |token| token_text(token, self.source))
  }

  fn advance(&mut self) {
    if self.pos + 1 < self.tokens.len() {
      self.pos += 1;
    }
  }

  /// The current punctuator, if the current token is one.
  fn punct(&self) -> Option<&'a str> {
    self
      .peek()
      .filter(|token| token.kind == TokenKind::Punctuator)
      .map(|token| token_text(token, self.source))
  }

  /// Does the current token spell `op`? Keywords and punctuators only.
  fn is(&self, op: &str) -> bool {
    self.peek().is_some_and(|token| {
      matches!(token.kind, TokenKind::Punctuator | TokenKind::Keyword)
        && token.len == op.len()
        && token_text(token, self.source) == op
    })
  }

  /// Consume the current token if it matches the provided punctuator or keyword.
  fn equal(&mut self, op: &str) -> bool {
    if self.is(op) {
      self.pos += 1;
      return true;
    }
    false
  }

  fn skip(&mut self, s: &str) -> CompileResult<()> {
    if self.equal(s) {
      Ok(())
    } else {
      let (loc, got) = match self.tokens.get(self.pos) {
        Some(token) => (token.loc, describe_token(Some(token), self.source)),
        None => (self.source.len(), "EOF".to_string()),
      };
      Err(CompileError::at(
        self.source,
        loc,
        format!("expected \"{s}\", but got \"{got}\""),
      ))
    }
  }

  /// Parse the current token as an integer literal returning its value and location.
  fn get_number(&mut self) -> CompileResult<(i64, usize)> {
    if let Some(token) = self.tokens.get(self.pos)
      && token.kind == TokenKind::Num
    {
      let value = token.value.ok_or_else(|| {
        CompileError::internal("numeric token missing value")
      })?;
      let loc = token.loc;
      self.pos += 1;
      return Ok((value, loc));
    }

    let Some(token) = self.tokens.get(self.pos) else {
      return Err(CompileError::at(
        self.source,
        self.source.len(),
        "unexpected end of input while parsing number",
      ));
    };
    let got = describe_token(Some(token), self.source);
    Err(CompileError::at(
      self.source,
      token.loc,
      format!("expected a number, but got \"{got}\""),
    ))
  }

  /// Parse the current token as an identifier.
  fn get_ident(&mut self) -> CompileResult<(String, usize)> {
    if let Some(token) = self.tokens.get(self.pos)
      && token.kind == TokenKind::Ident
    {
      let ident = token_text(token, self.source).to_string();
      let loc = token.loc;
      self.pos += 1;
      return Ok((ident, loc));
    }

    let Some(token) = self.tokens.get(self.pos) else {
      return Err(CompileError::at(
        self.source,
        self.source.len(),
        "unexpected end of input while parsing identifier",
      ));
    };
    let got = describe_token(Some(token), self.source);
    Err(CompileError::at(
      self.source,
      token.loc,
      format!("expected an identifier, but got \"{got}\""),
    ))
  }

  fn is_eof(&self) -> bool {
    matches!(self.peek().map(|token| token.kind), Some(TokenKind::Eof))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tokenizer::tokenize;

  fn parse_source(source: &str) -> CompileResult<Program> {
    parse(tokenize(source)?, source)
  }

  fn error_message(source: &str) -> String {
    let err = parse_source(source).unwrap_err();
    err.diagnostic().unwrap().message.clone()
  }

  fn body(func: &Function) -> &[Stmt] {
    match &func.body {
      Stmt::Block(stmts) => stmts,
      other => panic!("function body is not a block: {other:?}"),
    }
  }

  fn returned_constant(source: &str) -> i64 {
    let program = parse_source(source).unwrap();
    let Some(Stmt::Return(Some(value))) = body(&program.functions[0]).last() else {
      panic!("last statement is not a return");
    };
    eval_const(value).unwrap()
  }

  #[test]
  fn loops_get_ids_in_source_order() {
    let program = parse_source(
      "int main() { while (1) { for (;;) break; continue; } do ; while (0); return 0; }",
    )
    .unwrap();
    assert_eq!(program.label_count, 3);

    let Stmt::While { id, body: outer, .. } = &body(&program.functions[0])[0] else {
      panic!("expected a while loop");
    };
    assert_eq!(*id, LoopId(0));
    let Stmt::Block(inner) = outer.as_ref() else {
      panic!("expected a block");
    };
    let Stmt::For { id: for_id, body: for_body, .. } = &inner[0] else {
      panic!("expected a for loop");
    };
    assert_eq!(*for_id, LoopId(1));
    assert!(matches!(for_body.as_ref(), Stmt::Break(LoopId(1))));
    assert!(matches!(inner[1], Stmt::Continue(LoopId(0))));
  }

  #[test]
  fn shadowed_variables_are_distinct_locals() {
    let program = parse_source("int main() { int x; { int x; x = 2; } x = 1; return x; }").unwrap();
    let func = &program.functions[0];
    assert_eq!(func.locals.len(), 2);

    let stmts = body(func);
    let Stmt::Block(inner) = &stmts[1] else {
      panic!("expected a nested block");
    };
    let assigned = |stmt: &Stmt| match stmt {
      Stmt::Expr(Expr {
        kind: ExprKind::Assign { lhs, .. },
        ..
      }) => match lhs.kind {
        ExprKind::Var { var } => var,
        _ => panic!("assignment to a non-variable"),
      },
      _ => panic!("expected an assignment"),
    };
    assert_eq!(assigned(&inner[1]), VarRef::Local(1));
    assert_eq!(assigned(&stmts[2]), VarRef::Local(0));
  }

  #[test]
  fn redeclaration_in_one_block_is_an_error() {
    assert_eq!(
      error_message("int main() { int a; int a; return 0; }"),
      "'a' is already declared in this scope"
    );
  }

  #[test]
  fn parameter_and_body_share_a_scope() {
    assert!(parse_source("int f(int a) { int a; return a; }").is_err());
    assert!(parse_source("int f(int a) { { int a; } return a; }").is_ok());
  }

  #[test]
  fn for_init_is_scoped_to_the_loop() {
    assert_eq!(
      error_message("int main() { for (int i = 0; i < 3; i++) ; return i; }"),
      "undefined variable 'i'"
    );
  }

  #[test]
  fn break_outside_a_loop_is_rejected() {
    assert_eq!(
      error_message("int main() { break; }"),
      "break statement not within loop"
    );
  }

  #[test]
  fn sizeof_is_folded() {
    assert_eq!(returned_constant("int main() { return sizeof(int[3]); }"), 12);
    assert_eq!(returned_constant("int main() { long x; return sizeof x; }"), 8);
    assert_eq!(returned_constant("int main() { char *p; return sizeof(*p); }"), 1);
  }

  #[test]
  fn constant_expressions_size_arrays() {
    let program = parse_source("int main() { int a[2 * 3 + 1]; return 0; }").unwrap();
    assert_eq!(program.functions[0].locals[0].ty.array_len(), Some(7));
  }

  #[test]
  fn initializers_fix_array_length() {
    let program =
      parse_source("int main() { int a[] = {1, 2, 3}; char s[] = \"hi\"; return 0; }").unwrap();
    let locals = &program.functions[0].locals;
    assert_eq!(locals[0].ty.array_len(), Some(3));
    assert_eq!(locals[1].ty.array_len(), Some(3));
  }

  #[test]
  fn too_many_initializers_are_rejected() {
    assert_eq!(
      error_message("int main() { int a[2] = {1, 2, 3}; return 0; }"),
      "excess elements in array initializer"
    );
  }

  #[test]
  fn global_initializers_are_rejected() {
    assert_eq!(
      error_message("int g = 3; int main() { return g; }"),
      "initializers for global variables are not supported"
    );
  }

  #[test]
  fn stack_parameters_are_pinned_above_the_frame() {
    let program =
      parse_source("int f(int a, int b, int c, int d, int e, int f, int g, int h) { return h; }")
        .unwrap();
    let locals = &program.functions[0].locals;
    assert_eq!(locals[6].offset, 16);
    assert_eq!(locals[7].offset, 24);
    assert!(locals[5].offset < 0);
  }

  #[test]
  fn typedef_names_declare_variables() {
    let program = parse_source("typedef long T; int main() { T x; return sizeof(x); }").unwrap();
    assert_eq!(program.functions[0].locals[0].ty, Type::long());
  }

  #[test]
  fn prototypes_check_argument_count() {
    assert_eq!(
      error_message("int add(int a, int b); int main() { return add(1); }"),
      "too few arguments to function 'add'"
    );
  }

  #[test]
  fn conflicting_prototypes_are_rejected() {
    assert_eq!(
      error_message("int f(int a); long f(int a) { return a; }"),
      "conflicting types for 'f'"
    );
    assert!(parse_source("int f(); int f(int a) { return a; }").is_ok());
  }

  #[test]
  fn unnamed_parameters_only_in_prototypes() {
    let program = parse_source(
      "int add(int, int *); int main() { int b; b = 2; return add(1, &b); } \
       int add(int a, int *b) { return a + *b; }",
    )
    .unwrap();
    assert_eq!(program.functions.len(), 2);
    assert_eq!(
      error_message("int f(int) { return 0; }"),
      "parameter name omitted"
    );
  }

  #[test]
  fn oversized_arrays_are_rejected() {
    assert_eq!(
      error_message("int main() { char a[9223372036854775807]; return 0; }"),
      "array is too large"
    );
    assert_eq!(
      error_message("int main() { return sizeof(int[4611686018427387904]); }"),
      "array is too large"
    );
    assert_eq!(
      error_message("int main() { char a[2000000000]; char b[2000000000]; return 0; }"),
      "stack frame of 'main' is too large"
    );
  }

  #[test]
  fn assignment_checks_pointer_compatibility() {
    assert_eq!(
      error_message("int main() { int *p; char *q; p = q; return 0; }"),
      "assignment from incompatible pointer type"
    );
    assert_eq!(
      error_message("int main() { int *p; p = 5; return 0; }"),
      "assignment makes a pointer from an integer"
    );
    assert_eq!(
      error_message("int main() { int x; int *p; x = p; return 0; }"),
      "assignment makes an integer from a pointer"
    );
    assert!(parse_source("int main() { int *p = 0; void *v; v = p; p = v; return 0; }").is_ok());
  }

  #[test]
  fn pointer_subtraction_needs_matching_pointees() {
    assert_eq!(
      error_message("int main() { int *p; char *q; return p - q; }"),
      "subtraction of incompatible pointer types"
    );
  }

  #[test]
  fn static_locals_become_hidden_globals() {
    let program = parse_source("int main() { static int n; return n; }").unwrap();
    let obj = &program.globals[0];
    assert!(obj.is_static);
    assert!(obj.name.starts_with(".Lstatic.n."));
    assert!(program.functions[0].locals.is_empty());
  }

  #[test]
  fn assignment_needs_an_lvalue() {
    assert_eq!(
      error_message("int main() { 1 = 2; return 0; }"),
      "not an lvalue"
    );
    assert_eq!(
      error_message("int main() { return &1; }"),
      "cannot take the address of an rvalue"
    );
  }
}
