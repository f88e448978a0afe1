use std::io::Write;
use std::process::{Command, Output, Stdio};

fn exprcc(args: &[&str]) -> Output {
  Command::new(env!("CARGO_BIN_EXE_exprcc"))
    .args(args)
    .env_remove("RUST_LOG")
    .output()
    .expect("spawn exprcc")
}

fn stdout(output: &Output) -> String {
  String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
  String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn prints_assembly_and_exits_zero() {
  let output = exprcc(&["1 + 2"]);
  assert!(output.status.success());
  let asm = stdout(&output);
  assert!(asm.starts_with(".global main\nmain:\n"));
  assert!(asm.contains("    add %rdi, %rax\n"));
  assert!(asm.ends_with("    ret\n"));
}

#[test]
fn intel_syntax_flag() {
  let output = exprcc(&["--syntax", "intel", "6 / 3"]);
  assert!(output.status.success());
  let asm = stdout(&output);
  assert!(asm.starts_with(".intel_syntax noprefix\n"));
  assert!(asm.contains("    idiv rdi\n"));
}

#[test]
fn run_prints_value() {
  let output = exprcc(&["--run", "(3 + 5) * 2 - 4 / 2"]);
  assert!(output.status.success());
  assert_eq!(stdout(&output), "14\n");
}

#[test]
fn eval_prints_value() {
  let output = exprcc(&["--eval", "-5"]);
  assert!(output.status.success());
  assert_eq!(stdout(&output), "-5\n");
}

#[test]
fn diagnostic_exits_non_zero_without_output() {
  let output = exprcc(&["1 $ 2"]);
  assert_eq!(output.status.code(), Some(1));
  assert!(output.stdout.is_empty());
  assert_eq!(stderr(&output), "1 $ 2\n  ^ invalid token: '$'\n");
}

#[test]
fn run_reports_division_fault() {
  let output = exprcc(&["--run", "1 / 0"]);
  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("division by zero"));
}

#[test]
fn reads_expression_from_stdin() {
  let mut child = Command::new(env!("CARGO_BIN_EXE_exprcc"))
    .arg("--run")
    .env_remove("RUST_LOG")
    .stdin(Stdio::piped())
    .stdout(Stdio::piped())
    .spawn()
    .expect("spawn exprcc");
  child
    .stdin
    .take()
    .expect("stdin")
    .write_all(b"2 * (3 + 4)\n")
    .expect("write stdin");
  let output = child.wait_with_output().expect("wait exprcc");
  assert!(output.status.success());
  assert_eq!(stdout(&output), "14\n");
}

#[test]
fn writes_to_output_file() {
  let path = std::env::temp_dir().join(format!("exprcc-cli-{}.s", std::process::id()));
  let path_str = path.to_string_lossy().into_owned();
  let output = exprcc(&["-o", &path_str, "42"]);
  assert!(output.status.success());
  assert!(output.stdout.is_empty());
  let asm = std::fs::read_to_string(&path).expect("read output");
  assert!(asm.contains("    mov $42, %rax\n"));
  let _ = std::fs::remove_file(&path);
}

#[test]
fn runaway_nesting_is_a_diagnostic_not_a_crash() {
  let mut child = Command::new(env!("CARGO_BIN_EXE_exprcc"))
    .arg("--run")
    .env_remove("RUST_LOG")
    .stdin(Stdio::piped())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .spawn()
    .expect("spawn exprcc");
  child
    .stdin
    .take()
    .expect("stdin")
    .write_all("(".repeat(100_000).as_bytes())
    .expect("write stdin");
  let output = child.wait_with_output().expect("wait exprcc");
  assert_eq!(output.status.code(), Some(1));
  assert!(output.stdout.is_empty());
  let marker = format!(
    "\n{}^ expression nests deeper than {} levels\n",
    " ".repeat(exprcc::parser::MAX_NESTING),
    exprcc::parser::MAX_NESTING
  );
  assert!(stderr(&output).ends_with(&marker));
}

#[test]
fn long_operator_chain_is_a_diagnostic() {
  let source = format!("1{}", "+1".repeat(5_000));
  let output = exprcc(&[&source]);
  assert_eq!(output.status.code(), Some(1));
  assert!(output.stdout.is_empty());
  assert!(stderr(&output).contains("^ expression nests deeper than"));
}
