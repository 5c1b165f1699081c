//! C types understood by the compiler.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
  Void,
  Bool,
  Char,
  Short,
  Int,
  Long,
  Ptr,
  /// `len` is `None` for `T[]` until an initializer fixes it.
  Array {
    len: Option<usize>,
  },
  Func {
    params: Vec<Type>,
  },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
  pub kind: TypeKind,
  /// Pointee, element or return type.
  pub base: Option<Box<Type>>,
}

impl Type {
  fn scalar(kind: TypeKind) -> Self {
    Self { kind, base: None }
  }

  pub fn void() -> Self {
    Self::scalar(TypeKind::Void)
  }

  pub fn bool() -> Self {
    Self::scalar(TypeKind::Bool)
  }

  pub fn char() -> Self {
    Self::scalar(TypeKind::Char)
  }

  pub fn short() -> Self {
    Self::scalar(TypeKind::Short)
  }

  pub fn int() -> Self {
    Self::scalar(TypeKind::Int)
  }

  pub fn long() -> Self {
    Self::scalar(TypeKind::Long)
  }

  pub fn pointer_to(base: Type) -> Self {
    Self {
      kind: TypeKind::Ptr,
      base: Some(Box::new(base)),
    }
  }

  pub fn array_of(base: Type, len: Option<usize>) -> Self {
    Self {
      kind: TypeKind::Array { len },
      base: Some(Box::new(base)),
    }
  }

  pub fn func(ret: Type, params: Vec<Type>) -> Self {
    Self {
      kind: TypeKind::Func { params },
      base: Some(Box::new(ret)),
    }
  }

  pub fn is_integer(&self) -> bool {
    matches!(
      self.kind,
      TypeKind::Bool | TypeKind::Char | TypeKind::Short | TypeKind::Int | TypeKind::Long
    )
  }

  /// Pointers and arrays: anything that can be dereferenced.
  pub fn is_pointer(&self) -> bool {
    matches!(self.kind, TypeKind::Ptr | TypeKind::Array { .. })
  }

  pub fn is_array(&self) -> bool {
    matches!(self.kind, TypeKind::Array { .. })
  }

  pub fn is_void(&self) -> bool {
    matches!(self.kind, TypeKind::Void)
  }

  pub fn is_func(&self) -> bool {
    matches!(self.kind, TypeKind::Func { .. })
  }

  pub fn base(&self) -> Option<&Type> {
    self.base.as_deref()
  }

  pub fn array_len(&self) -> Option<usize> {
    match self.kind {
      TypeKind::Array { len } => len,
      _ => None,
    }
  }

  pub fn params(&self) -> &[Type] {
    match &self.kind {
      TypeKind::Func { params } => params,
      _ => &[],
    }
  }

  pub fn size(&self) -> i64 {
    match &self.kind {
      TypeKind::Void | TypeKind::Bool | TypeKind::Char => 1,
      TypeKind::Short => 2,
      TypeKind::Int => 4,
      TypeKind::Long | TypeKind::Ptr => 8,
      TypeKind::Array { len } => {
        let elem = self.base().map_or(0, Type::size);
        elem * len.unwrap_or(0) as i64
      }
      TypeKind::Func { .. } => 1,
    }
  }

  pub fn align(&self) -> i64 {
    match &self.kind {
      TypeKind::Array { .. } => self.base().map_or(1, Type::align),
      _ => self.size(),
    }
  }

  /// Two types are the same iff their tag sequences match and, where both
  /// array lengths are known, the lengths agree.
  pub fn same_as(&self, other: &Type) -> bool {
    match (&self.kind, &other.kind) {
      (TypeKind::Array { len: a }, TypeKind::Array { len: b }) => {
        if let (Some(a), Some(b)) = (a, b)
          && a != b
        {
          return false;
        }
      }
      (TypeKind::Func { params: a }, TypeKind::Func { params: b }) => {
        if a.len() != b.len() || a.iter().zip(b).any(|(x, y)| !x.same_as(y)) {
          return false;
        }
      }
      (a, b) if a != b => return false,
      _ => {}
    }
    match (self.base(), other.base()) {
      (Some(a), Some(b)) => a.same_as(b),
      (None, None) => true,
      _ => false,
    }
  }

  /// Arrays decay to a pointer to their first element in value context.
  pub fn decayed(&self) -> Type {
    match (&self.kind, self.base()) {
      (TypeKind::Array { .. }, Some(elem)) => Type::pointer_to(elem.clone()),
      _ => self.clone(),
    }
  }
}

pub fn pointer_to(base: Type) -> Type {
  Type::pointer_to(base)
}

/// Result type of the usual arithmetic conversions for two integer operands.
pub fn common_type(lhs: &Type, rhs: &Type) -> Type {
  if lhs.is_pointer() {
    return lhs.decayed();
  }
  if lhs.size() == 8 || rhs.size() == 8 {
    Type::long()
  } else {
    Type::int()
  }
}

/// Integer promotion: anything narrower than `int` becomes `int`.
pub fn promoted(ty: &Type) -> Type {
  if ty.is_integer() && ty.size() < 4 {
    Type::int()
  } else {
    ty.clone()
  }
}

/// Largest object or stack frame the code generator can address with a
/// 32-bit immediate.
pub const MAX_OBJECT_SIZE: i64 = i32::MAX as i64;

pub fn align_to(n: i64, align: i64) -> i64 {
  (n + align - 1) / align * align
}
