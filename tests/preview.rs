use std::process::Command;

const FINDINGS: &str = r#"{
    "errors": ["some error"],
    "warnings": ["my warning", {"message": "unused import", "file": "src/lib.rs", "line": 3}]
}"#;

fn preview(dir: &std::path::Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_tripwire"))
        .args(["--color", "never", "preview", "--findings", "findings.json"])
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap()
}

#[test]
fn preview_json_contains_report() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("findings.json"), FINDINGS).unwrap();

    let output = preview(
        dir.path(),
        &["--format", "json", "--report-id", "lint", "--base", "abc", "--head", "def"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let body = json["body"].as_str().unwrap();
    assert!(body.contains(":no_entry_sign: | some error"));
    assert!(body.contains(":warning: | unused import (`src/lib.rs:3`)"));
    assert!(body.contains(r#"data-meta="generated_by_lint""#));
    assert!(body.contains(r#"data-base-commit="abc" data-head-commit="def""#));
    assert_eq!(
        json["statusLine"],
        "⚠ 1 Error. 2 Warnings. Don't worry, everything is fixable."
    );
    assert_eq!(json["hasFindings"], true);
}

#[test]
fn preview_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("findings.json"), FINDINGS).unwrap();

    let first = preview(dir.path(), &[]);
    let second = preview(dir.path(), &[]);
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);
    let text = String::from_utf8_lossy(&first.stdout);
    assert!(text.trim_end().ends_with("Don't worry, everything is fixable."));
}

#[test]
fn malformed_findings_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("findings.json"), "{not json").unwrap();

    let output = preview(dir.path(), &[]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("parsing findings"));
}
