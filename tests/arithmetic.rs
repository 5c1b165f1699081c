mod common;
use common::compile_and_run;

#[test]
fn test_addition() {
  assert_eq!(compile_and_run("int main() { return 2 + 3; }"), 5);
}

#[test]
fn test_parenthesized_expression() {
  assert_eq!(compile_and_run("int main() { return (2+3)*(3-2); }"), 5);
}

#[test]
fn test_precedence_and_unary_minus() {
  assert_eq!(compile_and_run("int main() { return 10 - 2 * 3; }"), 4);
  assert_eq!(compile_and_run("int main() { return -10 + 20; }"), 10);
  assert_eq!(compile_and_run("int main() { return - -3 + +2; }"), 5);
}

#[test]
fn test_division_and_modulo() {
  assert_eq!(compile_and_run("int main() { return 17 / 5; }"), 3);
  assert_eq!(compile_and_run("int main() { return 17 % 5; }"), 2);
  assert_eq!(compile_and_run("int main() { return -7 / 2 + 10; }"), 7);
  assert_eq!(compile_and_run("int main() { return -7 % 3 + 10; }"), 9);
}

#[test]
fn test_shifts_and_bitwise_operators() {
  assert_eq!(compile_and_run("int main() { return 1 << 4; }"), 16);
  assert_eq!(compile_and_run("int main() { return (-16 >> 2) + 10; }"), 6);
  assert_eq!(compile_and_run("int main() { return (6 & 3) | (8 ^ 2); }"), 10);
  assert_eq!(compile_and_run("int main() { return ~0 + 2; }"), 1);
  assert_eq!(compile_and_run("int main() { return !0 + !5; }"), 1);
}

#[test]
fn test_comparisons() {
  let input = r#"
  int main() {
    return (1 < 2) + (2 <= 2) + (3 > 4) + (5 >= 5) + (1 == 1) + (1 != 1);
  }
  "#;
  assert_eq!(compile_and_run(input), 4);
}

#[test]
fn test_char_operands_are_promoted() {
  assert_eq!(
    compile_and_run("int main() { return (char)127 + (char)127; }"),
    254
  );
  assert_eq!(
    compile_and_run("int main() { char c; c = -1; return c + 2; }"),
    1
  );
}

#[test]
fn test_chained_compound_assignment() {
  let input = r#"
  int main() {
    int a;
    int b;
    a = 2;
    b = 3;
    a += b += 5;
    return a + b;
  }
  "#;
  assert_eq!(compile_and_run(input), 18);
}

#[test]
fn test_compound_assignment_operators() {
  let input = r#"
  int main() {
    int x;
    x = 7;
    x *= 3;
    x -= 1;
    x /= 4;
    x %= 3;
    x <<= 4;
    x >>= 1;
    x |= 3;
    x &= 14;
    x ^= 1;
    return x;
  }
  "#;
  // 21, 20, 5, 2, 32, 16, 19, 2, 3
  assert_eq!(compile_and_run(input), 3);
}

#[test]
fn test_increment_and_decrement() {
  let input = r#"
  int main() {
    int i;
    int a;
    int b;
    i = 5;
    a = i++;
    b = ++i;
    i--;
    return a * 10 + b - i;
  }
  "#;
  assert_eq!(compile_and_run(input), 50 + 7 - 6);
}

#[test]
fn test_number_literals() {
  assert_eq!(
    compile_and_run("int main() { return 0x10 + 010 + 0b11; }"),
    27
  );
  assert_eq!(compile_and_run("int main() { return 'a'; }"), 97);
  assert_eq!(compile_and_run("int main() { return '\\n' + '\\0'; }"), 10);
}

#[test]
fn test_long_arithmetic() {
  let input = r#"
  int main() {
    long x;
    x = 3000000000;
    return x / 1000000000L;
  }
  "#;
  assert_eq!(compile_and_run(input), 3);
  assert_eq!(
    compile_and_run("int main() { long long x; x = 1L << 40; return x >> 38; }"),
    4
  );
}

#[test]
fn test_casts_truncate() {
  assert_eq!(compile_and_run("int main() { return (char)300; }"), 44);
  assert_eq!(compile_and_run("int main() { return (short)65537; }"), 1);
  assert_eq!(
    compile_and_run("int main() { return (_Bool)5 + (_Bool)0; }"),
    1
  );
  assert_eq!(
    compile_and_run("int main() { short s; s = 40000; return s == -25536; }"),
    1
  );
}

#[test]
fn test_bool_assignment_normalizes() {
  assert_eq!(
    compile_and_run("int main() { _Bool b; b = 42; return b; }"),
    1
  );
}

#[test]
fn test_sizeof() {
  assert_eq!(
    compile_and_run("int main() { return sizeof(long) + sizeof(short) + sizeof(char); }"),
    11
  );
  assert_eq!(
    compile_and_run("int main() { int x; return sizeof(x) + sizeof(&x); }"),
    12
  );
}
