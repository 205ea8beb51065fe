//! CLI integration tests for the `glint` binary.
//!
//! These tests invoke the compiled binary to verify end-to-end behavior.

use std::path::Path;
use std::process::{Command, Output};

fn glint_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_glint"))
}

fn run(args: &[&str]) -> Output {
    glint_bin().args(args).output().expect("run binary")
}

fn write(dir: &Path, name: &str, text: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, text).expect("write file");
    path.to_str().unwrap().to_string()
}

const SHADER: &str = r#"#version 450
layout(local_size_x = 64) in;
layout(std430, binding = 0) buffer Data { float values[]; } data;

void main() {
    uint i = gl_GlobalInvocationID.x;
    data.values[i] = data.values[i] * 2.0;
}
"#;

#[test]
fn cli_compile_writes_module() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let src = write(dir.path(), "double.comp", SHADER);
    let out = dir.path().join("double.spv");

    let output = run(&["compile", &src]);
    assert!(
        output.status.success(),
        "glint compile should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sha256:"), "stdout: {}", stdout);

    let bytes = std::fs::read(&out).expect("read module");
    assert_eq!(bytes.len() % 4, 0);
    assert_eq!(&bytes[..4], &0x0723_0203u32.to_le_bytes());

    // same input, same fingerprint
    let again = run(&["compile", &src, "-o", dir.path().join("again.spv").to_str().unwrap()]);
    let again_stdout = String::from_utf8_lossy(&again.stdout);
    let hash = |s: &str| s.split("sha256:").nth(1).map(str::to_string);
    assert_eq!(hash(&stdout), hash(&again_stdout));
    assert_eq!(std::fs::read(dir.path().join("again.spv")).unwrap(), bytes);
}

#[test]
fn cli_compile_failure_prints_report() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let src = write(dir.path(), "broken.comp", "void main() { int x = y; }\n");

    let output = run(&["compile", &src, "--name", "broken-shader"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Error generated when compiling shader 'broken-shader' (semantic analysis)"),
        "stderr: {}",
        stderr
    );
    assert!(stderr.contains("broken-shader:1:"), "stderr: {}", stderr);
    assert!(!dir.path().join("broken.spv").exists());
}

#[test]
fn cli_check_json() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let good = write(dir.path(), "good.comp", SHADER);
    let bad = write(dir.path(), "bad.comp", "void main() {\n  float f = true + ;\n}\n");

    let output = run(&["check", &good, "--format", "json"]);
    assert!(output.status.success());
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(v["success"], true);
    assert!(v["words"].as_u64().unwrap() > 5);

    let output = run(&["check", &bad, "--format", "json"]);
    assert_eq!(output.status.code(), Some(1));
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(v["success"], false);
    assert_eq!(v["stage"], "Syntax");
    assert_eq!(v["diagnostics"][0]["kind"], "SyntaxError");
    assert_eq!(v["diagnostics"][0]["location"]["line"], 2);
}

#[test]
fn cli_profile_round_trips_through_compile() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let output = run(&["profile"]);
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("max_compute_work_group_size_x = 1024"), "{}", text);
    assert!(text.contains("[limits]"), "{}", text);

    // a partial profile only overrides what it names
    let profile = write(dir.path(), "small.toml", "max_compute_work_group_size_x = 32\n");
    let src = write(dir.path(), "wide.comp", SHADER);
    let output = run(&["check", &src, "--profile", &profile]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("MaxComputeWorkGroupSizeX (32)"), "{}", stdout);

    let broken = write(dir.path(), "broken.toml", "max_compute_work_group_size_x = \"lots\"\n");
    let output = run(&["check", &src, "--profile", &broken]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to parse profile"));
}

#[test]
fn cli_ast_json() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let src = write(dir.path(), "ast.comp", SHADER);
    let output = run(&["ast", &src, "--format", "json"]);
    assert!(output.status.success());
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(v["items"].as_array().unwrap().len(), 3);
}

#[test]
fn cli_disasm_source_and_binary() {
    let dir = tempfile::tempdir().expect("create tempdir");
    let src = write(dir.path(), "d.comp", SHADER);

    let output = run(&["disasm", &src]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let from_source = String::from_utf8_lossy(&output.stdout).to_string();
    assert!(from_source.contains("OpEntryPoint GLCompute"), "{}", from_source);
    assert!(from_source.contains("LocalSize 64 1 1"), "{}", from_source);

    assert!(run(&["compile", &src]).status.success());
    let spv = dir.path().join("d.spv");
    let output = run(&["disasm", spv.to_str().unwrap()]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), from_source);

    let junk = write(dir.path(), "junk.spv", "not spirv");
    let output = run(&["disasm", &junk]);
    assert_eq!(output.status.code(), Some(2));
}
