use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tempfile::tempdir;

#[allow(deprecated)]
fn buildlens(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("buildlens").expect("binary");
    cmd.current_dir(workdir).env_remove("NODE_ENV").env("RUST_LOG", "warn");
    cmd
}

fn write_trigger(dir: &Path, errors: Value) -> std::path::PathBuf {
    let path = dir.join("build.json");
    let trigger = json!({
        "errors": errors,
        "warnings": [
            {"message": "[eslint] 'x' is defined but never used", "file": "/p/src/utils/a.js"}
        ]
    });
    fs::write(&path, serde_json::to_vec(&trigger).expect("json")).expect("write trigger");
    path
}

fn module_not_found() -> Value {
    json!([{
        "message": "Module not found: Error: Can't resolve './missing'",
        "module": {"resource": "/p/src/pages/home/index.js"}
    }])
}

fn read_report(out: &Path) -> Value {
    let bytes = fs::read(out.join("error-report.json")).expect("report written");
    serde_json::from_slice(&bytes).expect("report json")
}

#[test]
fn strict_blocking_exits_non_zero_after_writing_report() {
    let temp = tempdir().expect("tempdir");
    let input = write_trigger(temp.path(), module_not_found());
    let out = temp.path().join("out");

    buildlens(temp.path())
        .arg("report")
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&out)
        .arg("--strict")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("存在强阻断错误"))
        .stderr(predicate::str::contains("moduleNotFound"));

    let report = read_report(&out);
    assert_eq!(report["buildStatus"], "failed");
    assert_eq!(report["errors"]["页面-home"][0]["type"], "moduleNotFound");
}

#[test]
fn lenient_build_with_errors_still_succeeds() {
    let temp = tempdir().expect("tempdir");
    let input = write_trigger(temp.path(), module_not_found());
    let out = temp.path().join("out");

    buildlens(temp.path())
        .arg("report")
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 error(s), 1 warning(s)"))
        .stdout(predicate::str::contains("error-report.json"));

    assert!(out.join("index.html").exists());
    assert!(out.join("port-info.json").exists());
    assert_eq!(read_report(&out)["warnings"]["其他"][0]["type"], "eslintError");
}

#[test]
fn production_environment_enables_strict_mode() {
    let temp = tempdir().expect("tempdir");
    let input = write_trigger(temp.path(), module_not_found());

    buildlens(temp.path())
        .env("NODE_ENV", "production")
        .arg("report")
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(temp.path().join("out"))
        .assert()
        .code(1);
}

#[test]
fn config_can_clear_the_blocking_list() {
    let temp = tempdir().expect("tempdir");
    let input = write_trigger(temp.path(), module_not_found());
    let config = temp.path().join("buildlens.toml");
    fs::write(
        &config,
        r#"
strict = true
outputPath = "report-out"

[errors]
blocking = []
"#,
    )
    .expect("config");

    buildlens(temp.path())
        .arg("--config")
        .arg(&config)
        .arg("report")
        .arg("--input")
        .arg(&input)
        .assert()
        .success();

    assert_eq!(read_report(&temp.path().join("report-out"))["buildStatus"], "failed");
}

#[test]
fn zero_diagnostics_publish_a_success_report() {
    let temp = tempdir().expect("tempdir");
    let input = temp.path().join("clean.json");
    fs::write(&input, "{}").expect("trigger");
    let out = temp.path().join("out");

    buildlens(temp.path())
        .arg("report")
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&out)
        .arg("--strict")
        .assert()
        .success();

    let report = read_report(&out);
    assert_eq!(report["buildStatus"], "success");
    assert_eq!(report["errors"], json!({}));
}

#[test]
fn run_reads_build_events_from_stdin() {
    let temp = tempdir().expect("tempdir");
    let out = temp.path().join("out");
    let event = json!({"errors": [], "warnings": [{"message": "TS6133: 'a' is declared but its value is never read."}]});

    buildlens(temp.path())
        .arg("run")
        .arg("--output")
        .arg(&out)
        .write_stdin(format!("not json\n\n{event}\n"))
        .assert()
        .success();

    let report = read_report(&out);
    assert_eq!(report["buildStatus"], "success");
    assert_eq!(report["warnings"]["其他"][0]["type"], "tsTypeError");
}

#[test]
fn run_halts_on_blocking_event_while_stdin_stays_open() {
    use assert_cmd::cargo::CommandCargoExt;

    let temp = tempdir().expect("tempdir");
    let out = temp.path().join("out");
    let event = json!({"errors": module_not_found(), "warnings": []});

    #[allow(deprecated)]
    let mut child = std::process::Command::cargo_bin("buildlens")
        .expect("binary")
        .current_dir(temp.path())
        .env_remove("NODE_ENV")
        .env("RUST_LOG", "warn")
        .arg("run")
        .arg("--strict")
        .arg("--output")
        .arg(&out)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn");

    let mut stdin = child.stdin.take().expect("stdin");
    writeln!(stdin, "{event}").expect("write event");
    stdin.flush().expect("flush");

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().expect("try_wait") {
            break Some(status);
        }
        if Instant::now() >= deadline {
            break None;
        }
        std::thread::sleep(Duration::from_millis(50));
    };
    if status.is_none() {
        let _ = child.kill();
        let _ = child.wait();
    }
    drop(stdin);

    let status = status.expect("bridge exits while stdin is still open");
    assert_eq!(status.code(), Some(1));
    assert_eq!(read_report(&out)["buildStatus"], "failed");
}

#[test]
fn missing_input_is_reported() {
    let temp = tempdir().expect("tempdir");

    buildlens(temp.path())
        .arg("report")
        .arg("--input")
        .arg(temp.path().join("absent.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.json"));
}
