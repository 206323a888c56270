use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn siu() -> Command {
    Command::cargo_bin("siu").expect("binary exists")
}

#[test]
fn siu_run_closures_demo() {
    siu()
        .arg("run")
        .arg("demos/closures.siu")
        .assert()
        .success()
        .stdout(predicate::str::contains("counters: 2 20"))
        .stdout(predicate::str::contains("[0, 1, 1, 2, 3, 5, 8, 13, 21, 34]"));
}

#[test]
fn siu_run_shapes_demo() {
    siu()
        .arg("run")
        .arg("demos/shapes.siu")
        .assert()
        .success()
        .stdout(predicate::str::contains("total area: 9.0"));
}

#[test]
fn siu_eval_prints_result() {
    siu()
        .arg("eval")
        .arg("1 + 2 * 3")
        .assert()
        .success()
        .stdout("7\n");
}

#[test]
fn siu_eval_skips_null_result() {
    siu().arg("eval").arg("int x = 1;").assert().success().stdout("");
}

#[test]
fn siu_run_reports_error_with_excerpt() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("broken.siu");
    fs::write(&script, "int a = 1;\nprint(a / 0);\n").expect("write script");

    siu()
        .arg("run")
        .arg(&script)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "runtime error (division by zero) at 2:7",
        ))
        .stderr(predicate::str::contains("2 | print(a / 0);"))
        .stderr(predicate::str::contains("^^^^^"));
}

#[test]
fn siu_run_enforces_step_limit() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("spin.siu");
    fs::write(&script, "while (true) { }\n").expect("write script");

    siu()
        .arg("run")
        .arg(&script)
        .arg("--max-steps")
        .arg("500")
        .assert()
        .failure()
        .stderr(predicate::str::contains("step limit"));
}

#[test]
fn siu_tokens_lists_positions() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("tokens.siu");
    fs::write(&script, "int x = 4;\n").expect("write script");

    siu()
        .arg("tokens")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("1:1\t`int`\tint"))
        .stdout(predicate::str::contains("1:5\tidentifier\tx"))
        .stdout(predicate::str::contains("2:1\tend of input"));
}

#[test]
fn siu_ast_renders_tree() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("tree.siu");
    fs::write(&script, "print(1 + 2);\n").expect("write script");

    siu()
        .arg("ast")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Program\n  Call\n    Variable print"));
}

#[test]
fn siu_ast_reports_syntax_error() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("bad.siu");
    fs::write(&script, "if (true { }\n").expect("write script");

    siu()
        .arg("ast")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("syntax error at 1:10"))
        .stderr(predicate::str::contains("found: `{`"));
}

#[test]
fn siu_run_calls_main() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("entry.siu");
    fs::write(
        &script,
        "fn greet(string name) { print(\"hello\", name); }\nfn main() { greet(\"siu\"); }\n",
    )
    .expect("write script");

    siu()
        .arg("run")
        .arg(&script)
        .assert()
        .success()
        .stdout("hello siu\n");
}

#[test]
fn siu_eval_prints_cyclic_list() {
    siu()
        .arg("eval")
        .arg("list xs = [1]; push(xs, xs); xs")
        .assert()
        .success()
        .stdout("[1, [...]]\n");
}

#[test]
fn siu_eval_reports_runaway_recursion() {
    siu()
        .arg("eval")
        .arg("fn f(int n): int { return f(n + 1); } f(0)")
        .assert()
        .failure()
        .stderr(predicate::str::contains("runtime error (recursion limit)"));
}
