mod common;
use common::compile_and_run;

#[test]
fn test_store_through_pointer() {
  let input = "int main() { int x; int *p; x = 3; p = &x; *p = 7; return x; }";
  assert_eq!(compile_and_run(input), 7);
}

#[test]
fn test_array_indexing() {
  let input = r#"
  int main() {
    int a[3];
    a[0] = 1;
    a[1] = 2;
    a[2] = 3;
    return a[0] + a[1] + 2[a];
  }
  "#;
  assert_eq!(compile_and_run(input), 6);
}

#[test]
fn test_pointer_arithmetic_scales() {
  let input = r#"
  int main() {
    long a[4];
    long *p;
    p = a;
    *(p + 2) = 5;
    *(a + 3) = 6;
    return a[2] * 10 + *(p + 3);
  }
  "#;
  assert_eq!(compile_and_run(input), 56);
}

#[test]
fn test_pointer_difference_counts_elements() {
  let input = r#"
  int main() {
    int a[10];
    int *p;
    int *q;
    p = a + 2;
    q = a + 9;
    return q - p;
  }
  "#;
  assert_eq!(compile_and_run(input), 7);
}

#[test]
fn test_pointer_increment_and_compound_assignment() {
  let input = r#"
  int main() {
    int a[4] = {10, 20, 30, 40};
    int *p;
    p = a;
    p++;
    ++p;
    p += 1;
    p -= 2;
    return *p;
  }
  "#;
  assert_eq!(compile_and_run(input), 20);

  let input = r#"
  int main() {
    int a[2] = {7, 9};
    int *p;
    p = a;
    int x;
    x = *p++;
    return x * 10 + *p;
  }
  "#;
  assert_eq!(compile_and_run(input), 79);
}

#[test]
fn test_two_dimensional_array() {
  let input = r#"
  int main() {
    int m[2][3];
    int i;
    int j;
    for (i = 0; i < 2; i++)
      for (j = 0; j < 3; j++)
        m[i][j] = i * 3 + j;
    return m[1][2] * 10 + sizeof(m) / sizeof(m[0]);
  }
  "#;
  assert_eq!(compile_and_run(input), 52);
}

#[test]
fn test_initializer_lists() {
  let input = r#"
  int main() {
    int a[5] = {1, 2, 3};
    return a[0] + a[2] + a[3] + a[4];
  }
  "#;
  assert_eq!(compile_and_run(input), 4);

  let input = r#"
  int main() {
    int a[] = {4, 5, 6};
    return sizeof(a) + a[2];
  }
  "#;
  assert_eq!(compile_and_run(input), 18);

  let input = r#"
  int main() {
    int m[2][2] = {{1, 2}, {3}};
    return m[0][0] * 100 + m[0][1] * 10 + m[1][0] + m[1][1] * 100;
  }
  "#;
  assert_eq!(compile_and_run(input), 123);
}

#[test]
fn test_string_literals() {
  assert_eq!(
    compile_and_run("int main() { char *s; s = \"hello\"; return s[1]; }"),
    101
  );
  assert_eq!(
    compile_and_run("int main() { char s[] = \"abc\"; return sizeof(s) * 10 + (s[3] == 0); }"),
    41
  );
  assert_eq!(
    compile_and_run("int main() { return sizeof(\"\\t\\x41\"); }"),
    3
  );
}

#[test]
fn test_swap_through_pointers() {
  let input = r#"
  void swap(int *a, int *b) {
    int t;
    t = *a;
    *a = *b;
    *b = t;
  }
  int main() {
    int x;
    int y;
    x = 1;
    y = 2;
    swap(&x, &y);
    return x * 10 + y;
  }
  "#;
  assert_eq!(compile_and_run(input), 21);
}

#[test]
fn test_array_parameters_decay() {
  let input = r#"
  int sum(int a[], int n) {
    int i;
    int s;
    s = 0;
    for (i = 0; i < n; i++) s += a[i];
    return s;
  }
  int main() {
    int v[4] = {1, 2, 3, 4};
    return sum(v, 4) + sizeof(v);
  }
  "#;
  assert_eq!(compile_and_run(input), 26);
}

#[test]
fn test_global_arrays() {
  let input = r#"
  int g[4];
  char buf[3];
  int main() {
    g[3] = 12;
    buf[1] = 3;
    return g[3] + g[0] + buf[1];
  }
  "#;
  assert_eq!(compile_and_run(input), 15);
}

#[test]
fn test_pointer_to_pointer() {
  let input = r#"
  int main() {
    int x;
    int *p;
    int **pp;
    p = &x;
    pp = &p;
    **pp = 9;
    return x;
  }
  "#;
  assert_eq!(compile_and_run(input), 9);
}
