mod common;
use common::{compile_and_run, error_message};

#[test]
fn test_recursive_fibonacci() {
  let input = r#"
  int fib(int n) {
    if (n <= 1) return n;
    return fib(n - 1) + fib(n - 2);
  }
  int main() { return fib(10); }
  "#;
  assert_eq!(compile_and_run(input), 55);
}

#[test]
fn test_eight_arguments() {
  let input = r#"
  int sum8(int a, int b, int c, int d, int e, int f, int g, int h) {
    return a + b + c + d + e + f + g + h;
  }
  int main() { return sum8(1, 2, 3, 4, 5, 6, 7, 8); }
  "#;
  assert_eq!(compile_and_run(input), 36);
}

#[test]
fn test_stack_arguments_keep_their_order() {
  let input = r#"
  int pick(int a, int b, int c, int d, int e, int f, int g, int h, int i) {
    return g * 100 + h * 10 + i - a;
  }
  int main() { return 1 + pick(1, 0, 0, 0, 0, 0, 2, 3, 4); }
  "#;
  assert_eq!(compile_and_run(input), 234);
}

#[test]
fn test_nested_calls_inside_expressions() {
  let input = r#"
  int add(int a, int b) { return a + b; }
  int main() { return 1 + add(2, add(3, 4)); }
  "#;
  assert_eq!(compile_and_run(input), 10);
}

#[test]
fn test_prototype_before_definition() {
  let input = r#"
  int sq(int x);
  int main() { return sq(5); }
  int sq(int x) { return x * x; }
  "#;
  assert_eq!(compile_and_run(input), 25);
}

#[test]
fn test_undeclared_function_is_assumed_to_return_int() {
  let input = r#"
  int main() { return later(4); }
  int later(int x) { return x + 1; }
  "#;
  assert_eq!(compile_and_run(input), 5);
}

#[test]
fn test_calling_into_libc() {
  assert_eq!(compile_and_run("int main() { return abs(-9); }"), 9);
}

#[test]
fn test_void_and_static_functions() {
  let input = r#"
  int g;
  void set(int v) { g = v; }
  static int twice(int x) { return x * 2; }
  int main() {
    set(21);
    return twice(g);
  }
  "#;
  assert_eq!(compile_and_run(input), 42);
}

#[test]
fn test_narrow_parameters_and_returns() {
  let input = r#"
  char id(char c) { return c; }
  short neg(short s) { return -s; }
  int main() { return id(300) + neg(-2); }
  "#;
  assert_eq!(compile_and_run(input), 46);
}

#[test]
fn test_main_without_return_exits_zero() {
  assert_eq!(compile_and_run("int main() { int x; x = 3; }"), 0);
}

#[test]
fn test_argument_count_is_checked() {
  assert_eq!(
    error_message("int f(int a) { return a; } int main() { return f(1, 2); }"),
    "too many arguments to function 'f'"
  );
}

#[test]
fn test_redefinition_is_rejected() {
  assert_eq!(
    error_message("int f() { return 1; } int f() { return 2; }"),
    "redefinition of 'f'"
  );
}

#[test]
fn test_prototypes_with_unnamed_parameters() {
  let input = r#"
  int add(int, int);
  long scale(long *, int);
  int main() { long x; x = 6; return add(1, 2) + scale(&x, 4); }
  int add(int a, int b) { return a + b; }
  long scale(long *p, int k) { return *p * k; }
  "#;
  assert_eq!(compile_and_run(input), 27);
}

#[test]
fn test_definition_needs_parameter_names() {
  assert_eq!(
    error_message("int f(int, int b) { return b; } int main() { return f(1, 2); }"),
    "parameter name omitted"
  );
}
