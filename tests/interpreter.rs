use std::{
    cell::RefCell,
    io::{self, Write},
    rc::Rc,
};

use siulang::{
    diagnostics::{DiagnosticKind, Position, RuntimeErrorKind, SiuError},
    runtime::{Interpreter, InterpreterConfig},
    value::{Value, ValueKind},
};

#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("output is utf-8")
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn eval(source: &str) -> Value {
    let mut interpreter = Interpreter::new();
    interpreter
        .eval_source(source)
        .expect("evaluation should succeed")
}

fn eval_error(source: &str) -> SiuError {
    eval_error_with(InterpreterConfig::default(), source)
}

fn eval_error_with(config: InterpreterConfig, source: &str) -> SiuError {
    let mut interpreter = Interpreter::with_config(config);
    match interpreter.eval_source(source) {
        Ok(value) => panic!("expected error, received value {value}"),
        Err(err) => err,
    }
}

fn eval_output(source: &str) -> String {
    let buffer = SharedBuffer::default();
    let mut interpreter = Interpreter::new().with_output(Box::new(buffer.clone()));
    interpreter
        .eval_source(source)
        .expect("evaluation should succeed");
    buffer.contents()
}

fn runtime_kind(err: &SiuError) -> RuntimeErrorKind {
    err.diagnostic()
        .and_then(|diag| diag.kind.runtime_kind())
        .unwrap_or_else(|| panic!("expected runtime error, found {err}"))
}

fn expect_int(value: &Value) -> i64 {
    match value.0.as_ref() {
        ValueKind::Int(n) => *n,
        _ => panic!("expected int, found {}", value.type_name()),
    }
}

fn expect_float(value: &Value) -> f64 {
    match value.0.as_ref() {
        ValueKind::Float(n) => *n,
        _ => panic!("expected float, found {}", value.type_name()),
    }
}

fn expect_bool(value: &Value) -> bool {
    match value.0.as_ref() {
        ValueKind::Bool(b) => *b,
        _ => panic!("expected bool, found {}", value.type_name()),
    }
}

fn expect_string(value: &Value) -> String {
    match value.0.as_ref() {
        ValueKind::String(s) => s.clone(),
        _ => panic!("expected string, found {}", value.type_name()),
    }
}

#[test]
fn multiplication_binds_tighter_than_addition() {
    assert!(expect_bool(&eval("1 + 2 * 3 == 7")));
    assert_eq!(expect_int(&eval("(1 + 2) * 3")), 9);
    assert_eq!(expect_int(&eval("10 - 4 - 3")), 3);
}

#[test]
fn empty_program_yields_null() {
    assert!(eval("").is_null());
    assert!(eval("# only a comment\n/* and a block */").is_null());
}

#[test]
fn result_is_last_value_producing_statement() {
    assert_eq!(expect_int(&eval("int x = 5; x;")), 5);
    assert_eq!(expect_int(&eval("1; int y = 2;")), 1);
    assert_eq!(
        expect_string(&eval(
            r#"
            int x = 4;
            if (x > 5) { "big"; } elif (x > 3) { "mid"; } else { "small"; }
            "#
        )),
        "mid"
    );
}

#[test]
fn inner_declaration_shadows_outer() {
    let value = eval(
        r#"
        int x = 1;
        {
            int x = 2;
            x = 3;
        }
        x
        "#,
    );
    assert_eq!(expect_int(&value), 1);
}

#[test]
fn assignment_updates_enclosing_binding() {
    let value = eval(
        r#"
        int x = 1;
        { x = 7; }
        x
        "#,
    );
    assert_eq!(expect_int(&value), 7);
}

#[test]
fn closure_observes_later_mutation() {
    let value = eval(
        r#"
        int n = 1;
        fn get(): int { return n; }
        n = 5;
        get()
        "#,
    );
    assert_eq!(expect_int(&value), 5);
}

#[test]
fn closures_keep_private_state() {
    let value = eval(
        r#"
        fn make_counter(): fn {
            int count = 0;
            return fn(): int {
                count = count + 1;
                return count;
            };
        }
        fn first = make_counter();
        fn second = make_counter();
        first();
        first();
        second();
        first() * 10 + second()
        "#,
    );
    assert_eq!(expect_int(&value), 32);
}

#[test]
fn functions_are_first_class() {
    let value = eval(
        r#"
        fn apply(fn f, int x): int { return f(x); }
        apply(fn(int n): int { return n * 2; }, 21)
        "#,
    );
    assert_eq!(expect_int(&value), 42);
}

#[test]
fn recursion_computes_fibonacci() {
    let value = eval(
        r#"
        fn fib(int n): int {
            if (n < 2) { return n; }
            return fib(n - 1) + fib(n - 2);
        }
        fib(15)
        "#,
    );
    assert_eq!(expect_int(&value), 610);
}

#[test]
fn arity_mismatch_is_reported() {
    let err = eval_error("fn f(int a): int { return a; }\nf(1, 2);");
    assert_eq!(runtime_kind(&err), RuntimeErrorKind::ArityMismatch);
    assert!(err.to_string().contains("expected 1 arguments but received 2"));
}

#[test]
fn division_by_zero_is_reported() {
    assert_eq!(runtime_kind(&eval_error("1 / 0")), RuntimeErrorKind::DivisionByZero);
    assert_eq!(runtime_kind(&eval_error("5 % 0")), RuntimeErrorKind::DivisionByZero);
    assert_eq!(runtime_kind(&eval_error("1.5 / 0")), RuntimeErrorKind::DivisionByZero);
}

#[test]
fn unbound_identifier_names_variable_and_position() {
    let err = eval_error("int a = 1;\nb + a");
    assert_eq!(runtime_kind(&err), RuntimeErrorKind::UnboundIdentifier);
    let diag = err.diagnostic().unwrap();
    assert!(diag.message.contains("`b`"));
    assert_eq!(diag.position(), Some(Position::new(2, 1)));
    let rendered = err.to_string();
    assert!(rendered.contains("2 | b + a"), "{rendered}");
}

#[test]
fn integer_arithmetic_is_checked() {
    assert_eq!(
        runtime_kind(&eval_error("9223372036854775807 + 1")),
        RuntimeErrorKind::Overflow
    );
    assert_eq!(
        runtime_kind(&eval_error("-9223372036854775807 - 2")),
        RuntimeErrorKind::Overflow
    );
    assert_eq!(expect_int(&eval("7 / 2")), 3);
    assert_eq!(expect_int(&eval("-7 / 2")), -3);
    assert_eq!(expect_int(&eval("-7 % 3")), -1);
}

#[test]
fn floats_promote_mixed_arithmetic() {
    assert_eq!(expect_float(&eval("7 / 2.0")), 3.5);
    assert_eq!(expect_float(&eval("1 + 0.5")), 1.5);
    assert!(expect_bool(&eval("1 == 1.0")));
    assert!(expect_bool(&eval("2 < 2.5")));
}

#[test]
fn float_slots_accept_integers() {
    let value = eval("float f = 1; f = f + 1; f");
    assert_eq!(expect_float(&value), 2.0);
    assert_eq!(eval("float f = 3; f").to_string(), "3.0");
}

#[test]
fn strings_concatenate_only_with_strings() {
    assert_eq!(expect_string(&eval(r#""sui" + "lang""#)), "suilang");
    assert_eq!(
        runtime_kind(&eval_error(r#""a" + 1"#)),
        RuntimeErrorKind::TypeMismatch
    );
    assert_eq!(expect_string(&eval(r#""abc"[1]"#)), "b");
}

#[test]
fn equality_rules() {
    assert!(expect_bool(&eval(r#""a" == "a""#)));
    assert!(expect_bool(&eval("null == null")));
    assert!(!expect_bool(&eval("1 == null")));
    assert!(expect_bool(&eval("true != false")));
    assert_eq!(
        runtime_kind(&eval_error(r#"1 == "1""#)),
        RuntimeErrorKind::TypeMismatch
    );
    assert_eq!(
        runtime_kind(&eval_error("[1] == [1]")),
        RuntimeErrorKind::TypeMismatch
    );
}

#[test]
fn conditions_must_be_booleans() {
    let err = eval_error("if (1) { 2; }");
    assert_eq!(runtime_kind(&err), RuntimeErrorKind::TypeMismatch);
    assert!(err.to_string().contains("`if` condition must be `bool`"));
    assert_eq!(
        runtime_kind(&eval_error("while (null) { }")),
        RuntimeErrorKind::TypeMismatch
    );
    assert_eq!(
        runtime_kind(&eval_error("not 0")),
        RuntimeErrorKind::TypeMismatch
    );
}

#[test]
fn logical_operators_short_circuit() {
    assert!(!expect_bool(&eval("false and 1 / 0 == 0")));
    assert!(expect_bool(&eval("true or missing")));
    assert!(expect_bool(&eval("not 1 == 2")));
    assert!(expect_bool(&eval("not true or true")));
    assert!(expect_bool(&eval("true and not false")));
}

#[test]
fn elif_and_else_if_chain() {
    let source = |n: i64| {
        format!(
            r#"
            int n = {n};
            string label = "";
            if (n == 1) {{ label = "one"; }}
            elif (n == 2) {{ label = "two"; }}
            else if (n == 3) {{ label = "three"; }}
            else {{ label = "many"; }}
            label
            "#
        )
    };
    assert_eq!(expect_string(&eval(&source(1))), "one");
    assert_eq!(expect_string(&eval(&source(2))), "two");
    assert_eq!(expect_string(&eval(&source(3))), "three");
    assert_eq!(expect_string(&eval(&source(9))), "many");
}

#[test]
fn while_loop_honours_break_and_continue() {
    let value = eval(
        r#"
        int i = 0;
        int total = 0;
        while (i < 10) {
            i = i + 1;
            if (i % 2 == 0) { continue; }
            if (i > 7) { break; }
            total = total + i;
        }
        total
        "#,
    );
    assert_eq!(expect_int(&value), 16);
}

#[test]
fn for_loop_iterates_lists_and_strings() {
    let value = eval(
        r#"
        list xs = [1, 2, 3];
        int sum = 0;
        for (x in xs) { sum = sum + x; }
        sum
        "#,
    );
    assert_eq!(expect_int(&value), 6);
    let output = eval_output(r#"for (c in "hey") { print(c); }"#);
    assert_eq!(output, "h\ne\ny\n");
}

#[test]
fn return_inside_loop_leaves_function() {
    let value = eval(
        r#"
        fn find(list xs, int target): int {
            int i = 0;
            for (x in xs) {
                if (x == target) { return i; }
                i = i + 1;
            }
            return -1;
        }
        find([4, 8, 15], 8) * 10 + find([1], 3)
        "#,
    );
    assert_eq!(expect_int(&value), 9);
}

#[test]
fn stray_control_flow_is_rejected() {
    assert_eq!(runtime_kind(&eval_error("break;")), RuntimeErrorKind::ControlFlow);
    assert_eq!(
        runtime_kind(&eval_error("return 1;")),
        RuntimeErrorKind::ControlFlow
    );
    assert_eq!(
        runtime_kind(&eval_error("fn f() { continue; }\nwhile (true) { f(); }")),
        RuntimeErrorKind::ControlFlow
    );
}

#[test]
fn return_types_are_checked_before_running() {
    let err = eval_error("print(1);\nfn f() { return 1; }");
    let diag = err.diagnostic().unwrap();
    assert_eq!(diag.kind, DiagnosticKind::Check);
    assert_eq!(diag.position(), Some(Position::new(2, 10)));

    let err = eval_error("fn g(): int { return; }");
    assert_eq!(err.diagnostic().unwrap().kind, DiagnosticKind::Check);

    let err = eval_error("fn outer(): int { fn inner() { return 2; } return 1; }");
    assert_eq!(err.diagnostic().unwrap().kind, DiagnosticKind::Check);
}

#[test]
fn return_values_match_declared_type() {
    assert_eq!(
        runtime_kind(&eval_error(r#"fn f(): int { return "s"; } f()"#)),
        RuntimeErrorKind::TypeMismatch
    );
    assert_eq!(
        runtime_kind(&eval_error("fn f(): int { int x = 1; } f()")),
        RuntimeErrorKind::MissingReturn
    );
    assert_eq!(expect_float(&eval("fn half(): float { return 1; } half()")), 1.0);
    assert!(eval("fn nothing(): var { } nothing()").is_null());
}

#[test]
fn parameters_are_type_checked() {
    let err = eval_error(r#"fn f(int a): int { return a; } f("x")"#);
    assert_eq!(runtime_kind(&err), RuntimeErrorKind::TypeMismatch);
    assert!(err.to_string().contains("parameter `a`"));
}

#[test]
fn declarations_are_typed() {
    assert_eq!(
        runtime_kind(&eval_error(r#"int a = "s";"#)),
        RuntimeErrorKind::TypeMismatch
    );
    assert_eq!(
        runtime_kind(&eval_error("int a = 1; a = 2.5;")),
        RuntimeErrorKind::TypeMismatch
    );
    assert_eq!(expect_string(&eval(r#"var v = 1; v = "any"; v"#)), "any");
}

#[test]
fn constants_cannot_be_reassigned() {
    assert_eq!(
        runtime_kind(&eval_error("const int k = 1; k = 2;")),
        RuntimeErrorKind::ConstAssignment
    );
    assert_eq!(
        runtime_kind(&eval_error("fn f() { } f = 1;")),
        RuntimeErrorKind::ConstAssignment
    );
}

#[test]
fn redeclaration_in_same_scope_fails() {
    assert_eq!(
        runtime_kind(&eval_error("int a = 1; int a = 2;")),
        RuntimeErrorKind::Redeclaration
    );
    assert_eq!(
        runtime_kind(&eval_error("struct P { int x; }; struct P { int y; };")),
        RuntimeErrorKind::Redeclaration
    );
}

#[test]
fn struct_fields_read_and_write_in_place() {
    let value = eval(
        r#"
        struct Point { int x; int y; };
        Point p = Point { 1, 2 };
        p.x = 10;
        p.x + p.y
        "#,
    );
    assert_eq!(expect_int(&value), 12);
}

#[test]
fn structs_alias_unless_copied() {
    let value = eval(
        r#"
        struct Point { int x; int y; };
        Point p = Point { 1, 2 };
        Point alias = p;
        Point copy = @p;
        alias.x = 5;
        copy.x = 7;
        p.x * 10 + copy.x
        "#,
    );
    assert_eq!(expect_int(&value), 57);
}

#[test]
fn struct_errors() {
    let prelude = "struct Point { int x; int y; };\n";
    assert_eq!(
        runtime_kind(&eval_error(&format!("{prelude}Point {{ 1 }}"))),
        RuntimeErrorKind::ArityMismatch
    );
    assert_eq!(
        runtime_kind(&eval_error(&format!("{prelude}Point p = Point {{ 1, 2 }}; p.z"))),
        RuntimeErrorKind::UnknownField
    );
    assert_eq!(
        runtime_kind(&eval_error(&format!(
            "{prelude}Point p = Point {{ 1, 2 }}; p.x = \"s\";"
        ))),
        RuntimeErrorKind::TypeMismatch
    );
    assert_eq!(
        runtime_kind(&eval_error("Ghost g = null;")),
        RuntimeErrorKind::UndefinedType
    );
    assert_eq!(
        runtime_kind(&eval_error("struct Line { Ghost a; };")),
        RuntimeErrorKind::UndefinedType
    );
}

#[test]
fn recursive_struct_fields_accept_null() {
    let value = eval(
        r#"
        struct Node { int value; Node next; };
        Node tail = Node { 2, null };
        Node head = Node { 1, tail };
        head.next.value
        "#,
    );
    assert_eq!(expect_int(&value), 2);
}

#[test]
fn match_destructures_variants() {
    let source = |construct: &str| {
        format!(
            r#"
            variant Shape {{ float circle; int square; }};
            Shape s = {construct};
            float area = 0.0;
            match (s) {{
                circle(r) => {{ area = 3.0 * r * r; }}
                square(side) => {{ area = side * side; }}
            }}
            area
            "#
        )
    };
    assert_eq!(expect_float(&eval(&source("Shape::circle(2)"))), 12.0);
    assert_eq!(expect_float(&eval(&source("Shape::square(3)"))), 9.0);
}

#[test]
fn match_wildcard_and_no_match() {
    let value = eval(
        r#"
        variant Token { int number; string word; };
        Token t = Token::word("hi");
        int hits = 0;
        match (t) {
            number(n) => { hits = n; }
            _ => { hits = 100; }
        }
        match (t) {
            number(n) => { hits = hits + 1; }
        }
        hits
        "#,
    );
    assert_eq!(expect_int(&value), 100);
}

#[test]
fn variant_errors() {
    let prelude = "variant Opt { int some; bool none; };\n";
    assert_eq!(
        runtime_kind(&eval_error(&format!("{prelude}Opt::maybe(1)"))),
        RuntimeErrorKind::UnknownField
    );
    assert_eq!(
        runtime_kind(&eval_error(&format!("{prelude}Opt::some(\"x\")"))),
        RuntimeErrorKind::TypeMismatch
    );
    assert_eq!(
        runtime_kind(&eval_error("match (1) { _ => { } }")),
        RuntimeErrorKind::TypeMismatch
    );
    assert_eq!(
        runtime_kind(&eval_error(&format!(
            "{prelude}match (Opt::some(1)) {{ other(x) => {{ }} }}"
        ))),
        RuntimeErrorKind::UnknownField
    );
    assert_eq!(eval(&format!("{prelude}Opt::some(3)")).to_string(), "Opt::some(3)");
}

#[test]
fn lists_are_shared_and_bounds_checked() {
    let value = eval(
        r#"
        fn append(list xs) { push(xs, 4); }
        list ys = [1, 2, 3];
        append(ys);
        ys[0] = 10;
        ys[0] + len(ys)
        "#,
    );
    assert_eq!(expect_int(&value), 14);
    assert_eq!(
        runtime_kind(&eval_error("list xs = [1]; xs[1]")),
        RuntimeErrorKind::IndexOutOfBounds
    );
    assert_eq!(
        runtime_kind(&eval_error("list xs = [1]; xs[-1]")),
        RuntimeErrorKind::IndexOutOfBounds
    );
    assert_eq!(
        runtime_kind(&eval_error(r#"string s = "ab"; s[0] = "x";"#)),
        RuntimeErrorKind::InvalidOperation
    );
}

#[test]
fn deep_copy_detaches_nested_lists() {
    let value = eval(
        r#"
        list inner = [1];
        list outer = [inner];
        list copy = @outer;
        push(inner, 2);
        len(copy[0]) * 10 + len(outer[0])
        "#,
    );
    assert_eq!(expect_int(&value), 12);
}

#[test]
fn self_referencing_list_prints_and_copies() {
    let output = eval_output(
        r#"
        list xs = [1];
        xs[0] = xs;
        print(xs);
        list ys = [1];
        push(ys, ys);
        print(ys);
        list zs = @ys;
        push(ys, 3);
        print(len(zs), len(zs[1]), len(ys));
        "#,
    );
    assert_eq!(output, "[[...]]\n[1, [...]]\n2 2 3\n");
}

#[test]
fn cyclic_struct_prints_and_copies() {
    let output = eval_output(
        r#"
        struct Node { int id; Node next; };
        Node n = Node { 1, null };
        n.next = n;
        print(n);
        Node m = @n;
        m.id = 2;
        print(n.id, m.id, m.next.id);
        "#,
    );
    assert_eq!(
        output,
        "Node { id: 1, next: Node { ... } }\n1 2 2\n"
    );
}

#[test]
fn copying_overly_nested_value_fails() {
    let err = eval_error(
        r#"
        list deep = [];
        int i = 0;
        while (i < 200) { deep = [deep]; i = i + 1; }
        list copy = @deep;
        "#,
    );
    assert_eq!(runtime_kind(&err), RuntimeErrorKind::InvalidOperation);
}

#[test]
fn run_source_calls_main_after_top_level() {
    let buffer = SharedBuffer::default();
    let mut interpreter = Interpreter::new().with_output(Box::new(buffer.clone()));
    let value = interpreter
        .run_source(
            r#"
            int base = 40;
            fn main(): int {
                print("in main");
                return base + 2;
            }
            print("top level");
            "#,
        )
        .unwrap();
    assert_eq!(expect_int(&value), 42);
    assert_eq!(buffer.contents(), "top level\nin main\n");
}

#[test]
fn run_source_without_parameterless_main_keeps_top_level_result() {
    let mut interpreter = Interpreter::new();
    let value = interpreter.run_source("fn main(int n): int { return n; }\n7").unwrap();
    assert_eq!(expect_int(&value), 7);

    let mut interpreter = Interpreter::new();
    let value = interpreter.eval_source("fn main(): int { return 1; }\n5").unwrap();
    assert_eq!(expect_int(&value), 5);
}

#[test]
fn errors_in_main_carry_excerpt() {
    let mut interpreter = Interpreter::new();
    let err = interpreter
        .run_source("fn main() {\n  print(1 / 0);\n}\n")
        .unwrap_err();
    assert_eq!(runtime_kind(&err), RuntimeErrorKind::DivisionByZero);
    let diag = err.diagnostic().unwrap();
    assert_eq!(diag.position(), Some(Position::new(2, 9)));
    assert!(diag.excerpt.is_some());
}

#[test]
fn casts_convert_between_primitives() {
    assert_eq!(expect_int(&eval("(int)3.9")), 3);
    assert_eq!(expect_int(&eval("(int)-3.9")), -3);
    assert_eq!(expect_int(&eval(r#"(int)"42""#)), 42);
    assert_eq!(expect_int(&eval("(int)true")), 1);
    assert_eq!(expect_float(&eval("(float)2")), 2.0);
    assert_eq!(expect_string(&eval(r#"(string)12 + "!""#)), "12!");
    assert!(!expect_bool(&eval("(bool)0")));
    assert!(expect_bool(&eval(r#"(bool)"x""#)));
    assert_eq!(
        runtime_kind(&eval_error(r#"(int)"abc""#)),
        RuntimeErrorKind::InvalidCast
    );
    assert_eq!(
        runtime_kind(&eval_error("(int)[1]")),
        RuntimeErrorKind::InvalidCast
    );
    assert_eq!(
        runtime_kind(&eval_error("(int)(9223372036854775807 * 10.0)")),
        RuntimeErrorKind::Overflow
    );
}

#[test]
fn calling_a_non_function_fails() {
    assert_eq!(
        runtime_kind(&eval_error("int x = 1; x(2)")),
        RuntimeErrorKind::NotCallable
    );
}

#[test]
fn print_writes_space_separated_line() {
    let output = eval_output(r#"print("hi", 1, 2.5, true, null); print([1, "a"]);"#);
    assert_eq!(output, "hi 1 2.5 true null\n[1, \"a\"]\n");
}

#[test]
fn prelude_can_be_shadowed() {
    assert_eq!(expect_int(&eval("int len = 3; len")), 3);
}

#[test]
fn prelude_functions_are_constants() {
    let err = eval_error("print = 1;");
    assert_eq!(runtime_kind(&err), RuntimeErrorKind::ConstAssignment);
    assert_eq!(expect_int(&eval("len([1, 2, 3])")), 3);
}

#[test]
fn recursion_limit_is_enforced() {
    let config = InterpreterConfig {
        max_call_depth: 20,
        ..InterpreterConfig::default()
    };
    let err = eval_error_with(config, "fn f(int n): int { return f(n + 1); }\nf(0)");
    assert_eq!(runtime_kind(&err), RuntimeErrorKind::RecursionLimit);
}

#[test]
fn default_limits_stop_unbounded_recursion() {
    let err = eval_error("fn f(int n): int { return f(n + 1); }\nf(0)");
    assert_eq!(runtime_kind(&err), RuntimeErrorKind::RecursionLimit);

    let nested = r#"
        fn f(int n): int {
            if (n > -1) { while (true) { { { return 1 + ((((f(n + 1))))); } } } }
            return 0;
        }
        f(0)
    "#;
    let err = eval_error(nested);
    assert_eq!(runtime_kind(&err), RuntimeErrorKind::RecursionLimit);
    assert!(err.to_string().contains("evaluation nesting exceeded the limit of 256"));
}

#[test]
fn eval_depth_limit_counts_nested_blocks() {
    let config = InterpreterConfig {
        max_eval_depth: 8,
        ..InterpreterConfig::default()
    };
    let source = "{ { { { { { { { { 1; } } } } } } } } }";
    let err = eval_error_with(config.clone(), source);
    assert_eq!(runtime_kind(&err), RuntimeErrorKind::RecursionLimit);

    let mut interpreter = Interpreter::with_config(config);
    let value = interpreter.eval_source("{ { 1 + 2; } }").unwrap();
    assert_eq!(expect_int(&value), 3);
}

#[test]
fn step_limit_stops_runaway_loops() {
    let config = InterpreterConfig {
        max_steps: Some(1_000),
        ..InterpreterConfig::default()
    };
    let err = eval_error_with(config, "while (true) { }");
    assert_eq!(runtime_kind(&err), RuntimeErrorKind::StepLimit);
}

#[test]
fn state_persists_within_one_interpreter_only() {
    let mut first = Interpreter::new();
    first.eval_source("int shared = 41;").unwrap();
    let value = first.eval_source("shared + 1").unwrap();
    assert_eq!(expect_int(&value), 42);

    let mut second = Interpreter::new();
    let err = second.eval_source("shared").unwrap_err();
    assert_eq!(runtime_kind(&err), RuntimeErrorKind::UnboundIdentifier);
}

#[test]
fn errors_leave_interpreter_usable() {
    let mut interpreter = Interpreter::new();
    interpreter.eval_source("int x = 1;").unwrap();
    assert!(interpreter.eval_source("fn f() { x = \"s\"; } f();").is_err());
    let value = interpreter.eval_source("x").unwrap();
    assert_eq!(expect_int(&value), 1);
}
