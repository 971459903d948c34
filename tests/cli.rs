use assert_cmd::Command;
use predicates::prelude::*;
use std::{fs, path::Path};
use tempfile::tempdir;

fn resin() -> Command {
    let mut cmd = Command::cargo_bin("resin").expect("binary exists");
    cmd.env_remove("RESIN_PATH").env_remove("RESIN_LOG");
    cmd
}

fn write_script(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write script");
    path
}

#[test]
fn runs_script_file() {
    let dir = tempdir().expect("create temp dir");
    let script = write_script(dir.path(), "hello.rsn", "print(\"Hello from resin\", 1 + 2)\n");

    resin()
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello from resin 3"));
}

#[test]
fn reads_standard_input_when_no_script_given() {
    resin()
        .write_stdin("print(\"from stdin\")")
        .assert()
        .success()
        .stdout(predicate::str::contains("from stdin"));
}

#[test]
fn dash_reads_standard_input() {
    resin()
        .arg("-")
        .write_stdin("#!/usr/bin/env resin\nprint(\"dash\")\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("dash"));
}

#[test]
fn skips_shebang_line() {
    let dir = tempdir().expect("create temp dir");
    let script = write_script(
        dir.path(),
        "tool.rsn",
        "#!/usr/bin/env resin\nprint(\"after shebang\")\n",
    );

    resin()
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("after shebang"));
}

#[test]
fn passes_remaining_arguments_to_script() {
    let dir = tempdir().expect("create temp dir");
    let script = write_script(
        dir.path(),
        "args.rsn",
        "print(std.string.join(arguments, \",\"))\n",
    );

    resin()
        .arg(&script)
        .args(["one", "two", "-x"])
        .assert()
        .success()
        .stdout(predicate::str::contains("one,two,-x"));
}

#[test]
fn include_flag_extends_search_path() {
    let modules = tempdir().expect("create module dir");
    write_script(modules.path(), "greet.rsn", "var greeting = \"hello module\"\n");
    let dir = tempdir().expect("create temp dir");
    let script = write_script(dir.path(), "main.rsn", "load(\"greet\")\nprint(greeting)\n");

    resin()
        .arg("-I")
        .arg(modules.path())
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("hello module"));
}

#[test]
fn search_path_environment_variable_is_honoured() {
    let modules = tempdir().expect("create module dir");
    write_script(modules.path(), "answer.rsn", "const answer = 42\n");

    resin()
        .env("RESIN_PATH", modules.path())
        .write_stdin("load(\"answer\")\nprint(answer)\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("42"));
}

#[test]
fn missing_script_exits_with_status_two() {
    let dir = tempdir().expect("create temp dir");

    resin()
        .arg(dir.path().join("absent.rsn"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unable to load"));
}

#[test]
fn uncaught_error_is_reported_with_location() {
    let dir = tempdir().expect("create temp dir");
    let script = write_script(dir.path(), "broken.rsn", "print(\"before\")\nmissing()\n");

    resin()
        .arg(&script)
        .assert()
        .code(4)
        .stdout(predicate::str::contains("before"))
        .stderr(predicate::str::contains("Error: undefined variable `missing`"))
        .stderr(predicate::str::contains("at line 2"));
}

#[test]
fn uncaught_host_exception_is_named() {
    let modules = tempdir().expect("create module dir");

    resin()
        .arg("-I")
        .arg(modules.path())
        .write_stdin("load(\"not_installed_anywhere\")")
        .assert()
        .code(4)
        .stderr(predicate::str::contains(
            "ResinError: can't find a candidate for module 'not_installed_anywhere'",
        ));
}

#[test]
fn script_can_recover_from_failed_load() {
    resin()
        .write_stdin(
            "try {\n  load(\"not_installed_anywhere\")\n} catch e {\n  print(\"caught\", e.name, e.kind)\n}\nprint(\"still running\")\n",
        )
        .assert()
        .success()
        .stdout(predicate::str::contains("caught ResinError not_found"))
        .stdout(predicate::str::contains("still running"));
}

#[test]
fn exit_sets_status_code() {
    resin()
        .write_stdin("print(\"bye\")\nexit(7)\nprint(\"unreachable\")\n")
        .assert()
        .code(7)
        .stdout(predicate::str::contains("bye"))
        .stdout(predicate::str::contains("unreachable").not());
}

#[test]
fn empty_script_succeeds() {
    let dir = tempdir().expect("create temp dir");
    let script = write_script(dir.path(), "empty.rsn", "");

    resin().arg(&script).assert().success();
}

#[test]
fn help_and_version_exit_cleanly() {
    resin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--include"));

    resin()
        .arg("-v")
        .assert()
        .success()
        .stdout(predicate::str::contains("resin"));
}

#[test]
fn unknown_flag_exits_with_status_one() {
    resin().arg("--bogus").assert().code(1);
}
