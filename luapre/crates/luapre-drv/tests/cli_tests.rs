//! End-to-end CLI tests.
//!
//! Each test runs the real `luapre` binary against files in a temporary
//! directory and checks the produced output files and diagnostics.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn luapre_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_luapre"))
}

/// Write `source` to `name` inside `dir` and return the full path.
fn write_input(dir: &TempDir, name: &str, source: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, source).expect("failed to write test input");
    path
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| panic!("failed to read {path:?}: {e}"))
}

/// Run the binary over one input and return the produced output text.
fn preprocess(source: &str) -> String {
    let dir = TempDir::new().expect("temp dir");
    let input = write_input(&dir, "input.lua2p", source);

    let mut cmd = Command::new(luapre_bin());
    cmd.arg("--silent").arg(&input);
    cmd.assert().success();

    read(&dir.path().join("input.lua"))
}

#[test]
fn identity_for_sigil_free_input() {
    let source = "print(\"hi\")\n";
    assert_eq!(preprocess(source), source);
}

#[test]
fn identity_preserves_comments_and_strings() {
    let source = "-- header\nlocal s = 'a\\tb' .. [==[\nraw ]] text\n]==]\nreturn s\n";
    assert_eq!(preprocess(source), source);
}

#[test]
fn meta_line_loop_unrolls_with_indentation() {
    let output = preprocess("!for i=1,3 do\n    x()\n!end\n");
    assert_eq!(output, "    x()\n    x()\n    x()\n");
}

#[test]
fn inline_value_is_replaced_by_its_result() {
    assert_eq!(preprocess("local n = !(1+2)\n"), "local n = 3\n");
}

#[test]
fn inline_code_emits_raw_text() {
    assert_eq!(preprocess("!!(\"foo\"..1) = 5\n"), "foo1 = 5\n");
}

#[test]
fn serialized_string_newline_is_escaped() {
    let output = preprocess("!local s = \"a\\nb\"\nt = !(s)\n");
    // The newline is a backslash continuation inside the literal, not a
    // bare line break in the middle of a string.
    assert_eq!(output, "t = \"a\\\nb\"\n");
}

#[test]
fn empty_meta_block_emits_nothing() {
    assert_eq!(preprocess("!()x()\n"), "x()\n");
}

#[test]
fn inline_nil_result_serializes_as_nil() {
    let output = preprocess("!local function f() end\nv = !(f())\n");
    assert_eq!(output, "v = nil\n");
}

#[test]
fn shebang_line_is_preserved() {
    let output = preprocess("#!/usr/bin/env lua\nprint(!(21*2))\n");
    assert_eq!(output, "#!/usr/bin/env lua\nprint(42)\n");
}

#[test]
fn invalid_double_block_reports_parser_diagnostic() {
    let dir = TempDir::new().expect("temp dir");
    let input = write_input(&dir, "input.lua2p", "local x = !!(1+)");

    let mut cmd = Command::new(luapre_bin());
    cmd.arg("--silent").arg(&input);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains(":1:11:"))
        .stderr(predicate::str::contains("[Parser]"))
        .stderr(predicate::str::contains("valid expression"))
        .stderr(predicate::str::contains("^"));
}

#[test]
fn lexical_error_reports_tokenizer_diagnostic() {
    let dir = TempDir::new().expect("temp dir");
    let input = write_input(&dir, "input.lua2p", "local s = \"unterminated\n");

    let mut cmd = Command::new(luapre_bin());
    cmd.arg("--silent").arg(&input);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("[Tokenizer]"))
        .stderr(predicate::str::contains("Unfinished string."));
}

#[test]
fn metaprogram_runtime_error_points_into_meta_file() {
    let dir = TempDir::new().expect("temp dir");
    let input = write_input(&dir, "input.lua2p", "!error('boom')\n");

    let mut cmd = Command::new(luapre_bin());
    cmd.arg("--silent").arg(&input);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("[Meta]"))
        .stderr(predicate::str::contains("input.meta.lua:1"))
        .stderr(predicate::str::contains("boom"));

    // The metaprogram file is left behind for inspection.
    assert!(dir.path().join("input.meta.lua").exists());
}

#[test]
fn invalid_output_reports_against_output_file() {
    let dir = TempDir::new().expect("temp dir");
    let input = write_input(&dir, "input.lua2p", "!!(\"if\")\n");

    let mut cmd = Command::new(luapre_bin());
    cmd.arg("--silent").arg(&input);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("[Output]"))
        .stderr(predicate::str::contains("input.lua"));

    // The output file was still written in full before the error.
    assert_eq!(read(&dir.path().join("input.lua")), "if\n");
}

#[test]
fn input_with_output_extension_is_rejected() {
    let dir = TempDir::new().expect("temp dir");
    let input = write_input(&dir, "input.lua", "print(1)\n");

    let mut cmd = Command::new(luapre_bin());
    cmd.arg("--silent").arg(&input);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("[CommandLine]"))
        .stderr(predicate::str::contains(".lua"));
}

#[test]
fn custom_output_extension() {
    let dir = TempDir::new().expect("temp dir");
    let input = write_input(&dir, "input.lua", "x = !(1)\n");

    let mut cmd = Command::new(luapre_bin());
    cmd.arg("--silent")
        .arg("--outputextension=out")
        .arg(&input);
    cmd.assert().success();
    assert_eq!(read(&dir.path().join("input.out")), "x = 1\n");
}

#[test]
fn missing_input_reports_loader_diagnostic() {
    let mut cmd = Command::new(luapre_bin());
    cmd.arg("--silent").arg("does-not-exist.lua2p");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("[Loader]"));
}

#[test]
fn no_paths_is_a_usage_error() {
    let mut cmd = Command::new(luapre_bin());
    cmd.assert().failure();
}

#[test]
fn meta_file_removed_by_default_and_kept_with_debug() {
    let dir = TempDir::new().expect("temp dir");
    let input = write_input(&dir, "input.lua2p", "x = !(1)\n");
    let meta = dir.path().join("input.meta.lua");

    Command::new(luapre_bin())
        .arg("--silent")
        .arg(&input)
        .assert()
        .success();
    assert!(!meta.exists());

    Command::new(luapre_bin())
        .arg("--silent")
        .arg("--debug")
        .arg(&input)
        .assert()
        .success();
    assert!(meta.exists());
    let metaprogram = read(&meta);
    assert!(metaprogram.contains("outputValue(1)"), "{metaprogram}");
}

#[test]
fn debug_mode_escapes_serialized_newlines() {
    let dir = TempDir::new().expect("temp dir");
    let input = write_input(&dir, "input.lua2p", "!local s = \"a\\nb\"\nt = !(s)\n");

    Command::new(luapre_bin())
        .arg("--silent")
        .arg("--debug")
        .arg(&input)
        .assert()
        .success();
    assert_eq!(read(&dir.path().join("input.lua")), "t = \"a\\nb\"\n");
}

#[test]
fn line_number_annotations_appear_on_line_changes_only() {
    let dir = TempDir::new().expect("temp dir");
    let input = write_input(&dir, "input.lua2p", "a = 1 b = 2\nc = 3\n");

    Command::new(luapre_bin())
        .arg("--silent")
        .arg("--linenumbers")
        .arg(&input)
        .assert()
        .success();
    let output = read(&dir.path().join("input.lua"));
    assert!(output.contains("--[[@1]]a = 1 b = 2"), "{output}");
    assert!(output.contains("--[[@2]]c = 3"), "{output}");
    assert_eq!(output.matches("--[[@1]]").count(), 1, "{output}");
}

#[test]
fn save_info_records_processed_files() {
    let dir = TempDir::new().expect("temp dir");
    let plain = write_input(&dir, "plain.lua2p", "print(1)\n");
    let meta = write_input(&dir, "meta.lua2p", "x = !(1)\n");
    let info = dir.path().join("info.lua");

    Command::new(luapre_bin())
        .arg("--silent")
        .arg(format!("--saveinfo={}", info.display()))
        .arg(&plain)
        .arg(&meta)
        .assert()
        .success();

    let record = read(&info);
    assert!(record.starts_with("return {"), "{record}");
    assert!(record.contains("date="), "{record}");
    assert!(record.contains("hasPreprocessorCode=false"), "{record}");
    assert!(record.contains("hasPreprocessorCode=true"), "{record}");
}

#[test]
fn handler_aftermeta_replaces_output() {
    let dir = TempDir::new().expect("temp dir");
    let handler = write_input(
        &dir,
        "handler.lua",
        "return function(message, path, lua)\n\
         if message == 'aftermeta' then return '-- replaced\\n' .. lua end\n\
         end\n",
    );
    let input = write_input(&dir, "input.lua2p", "x = !(1)\n");

    Command::new(luapre_bin())
        .arg("--silent")
        .arg(format!("--handler={}", handler.display()))
        .arg(&input)
        .assert()
        .success();
    assert_eq!(read(&dir.path().join("input.lua")), "-- replaced\nx = 1\n");
}

#[test]
fn handler_init_can_add_files() {
    let dir = TempDir::new().expect("temp dir");
    let extra = write_input(&dir, "extra.lua2p", "y = !(2)\n");
    let handler_source = format!(
        "return function(message, paths)\n\
         if message == 'init' then table.insert(paths, {:?}) end\n\
         end\n",
        extra.display().to_string()
    );
    let handler = write_input(&dir, "handler.lua", &handler_source);
    let input = write_input(&dir, "input.lua2p", "x = !(1)\n");

    Command::new(luapre_bin())
        .arg("--silent")
        .arg(format!("--handler={}", handler.display()))
        .arg(&input)
        .assert()
        .success();
    assert_eq!(read(&dir.path().join("input.lua")), "x = 1\n");
    assert_eq!(read(&dir.path().join("extra.lua")), "y = 2\n");
}

#[test]
fn silent_suppresses_chatter() {
    let dir = TempDir::new().expect("temp dir");
    let input = write_input(&dir, "input.lua2p", "print(1)\n");

    Command::new(luapre_bin())
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Processing"));

    Command::new(luapre_bin())
        .arg("--silent")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn double_dash_terminates_option_parsing() {
    let dir = TempDir::new().expect("temp dir");
    let input = write_input(&dir, "input.lua2p", "print(1)\n");

    Command::new(luapre_bin())
        .arg("--silent")
        .arg("--")
        .arg(&input)
        .assert()
        .success();
}

#[test]
fn multiple_files_processed_in_order() {
    let dir = TempDir::new().expect("temp dir");
    let first = write_input(&dir, "first.lua2p", "a = !(1)\n");
    let second = write_input(&dir, "second.lua2p", "b = !(2)\n");

    Command::new(luapre_bin())
        .arg(&first)
        .arg(&second)
        .assert()
        .success()
        .stdout(predicate::str::contains("first.lua2p").and(predicate::str::contains("second.lua2p")));
    assert_eq!(read(&dir.path().join("first.lua")), "a = 1\n");
    assert_eq!(read(&dir.path().join("second.lua")), "b = 2\n");
}

#[test]
fn metaprogram_state_does_not_leak_between_files() {
    let dir = TempDir::new().expect("temp dir");
    let first = write_input(&dir, "first.lua2p", "!leak = 'oops'\n");
    let second = write_input(&dir, "second.lua2p", "v = !(tostring(leak))\n");

    Command::new(luapre_bin())
        .arg("--silent")
        .arg(&first)
        .arg(&second)
        .assert()
        .success();
    assert_eq!(read(&dir.path().join("second.lua")), "v = \"nil\"\n");
}

#[test]
fn multiline_meta_block() {
    let output = preprocess("local t = !(\n{1,\n2}\n)\n");
    assert_eq!(output, "local t = {1,2}\n");
}
