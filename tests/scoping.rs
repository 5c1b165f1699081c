mod common;
use common::{compile_and_run, error_message};

#[test]
fn test_inner_block_shadows_outer() {
  let input = r#"
  int main() {
    int x;
    x = 1;
    {
      int x;
      x = 2;
    }
    return x;
  }
  "#;
  assert_eq!(compile_and_run(input), 1);
}

#[test]
fn test_inner_block_sees_outer_variables() {
  let input = r#"
  int main() {
    int x;
    x = 5;
    {
      int y;
      y = x + 1;
      x = y;
    }
    return x;
  }
  "#;
  assert_eq!(compile_and_run(input), 6);
}

#[test]
fn test_loop_variable_shadows_function_variable() {
  let input = r#"
  int main() {
    int i;
    int s;
    s = 0;
    i = 10;
    for (int i = 0; i < 3; i++) s += i;
    return s + i;
  }
  "#;
  assert_eq!(compile_and_run(input), 13);
}

#[test]
fn test_locals_shadow_globals() {
  let input = r#"
  int g;
  int main() {
    g = 4;
    {
      int g;
      g = 9;
    }
    return g;
  }
  "#;
  assert_eq!(compile_and_run(input), 4);
}

#[test]
fn test_static_locals_keep_their_value() {
  let input = r#"
  int counter() {
    static int n;
    n++;
    return n;
  }
  int main() {
    counter();
    counter();
    return counter();
  }
  "#;
  assert_eq!(compile_and_run(input), 3);
}

#[test]
fn test_static_locals_with_the_same_name_are_distinct() {
  let input = r#"
  int a() { static int n; n += 1; return n; }
  int b() { static int n; n += 10; return n; }
  int main() {
    a();
    b();
    return a() + b();
  }
  "#;
  assert_eq!(compile_and_run(input), 22);
}

#[test]
fn test_variable_can_shadow_a_typedef() {
  let input = r#"
  typedef int T;
  int main() {
    T x;
    x = 3;
    {
      int T;
      T = 4;
      x = x + T;
    }
    return x;
  }
  "#;
  assert_eq!(compile_and_run(input), 7);
}

#[test]
fn test_block_local_typedef() {
  let input = r#"
  int main() {
    typedef char byte;
    byte b;
    b = 255;
    return b + 2;
  }
  "#;
  assert_eq!(compile_and_run(input), 1);
}

#[test]
fn test_redeclaration_in_the_same_block_fails() {
  assert_eq!(
    error_message("int main() { int x; char x; return 0; }"),
    "'x' is already declared in this scope"
  );
}

#[test]
fn test_variable_is_gone_after_its_block() {
  assert_eq!(
    error_message("int main() { { int y; y = 1; } return y; }"),
    "undefined variable 'y'"
  );
}
