use std::{fs, path::PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use uuid::Uuid;

fn temp_problem(files: &[(&str, &str)]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("jtk-cli-{}.pbm", Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create temp problem");
    for (name, contents) in files {
        fs::write(dir.join(name), contents).expect("write problem file");
    }
    dir
}

#[test]
fn info_prints_the_problem_as_json() {
    let dir = temp_problem(&[
        ("handler.yml", "handler: std\n"),
        ("problem.en.yml", "author: Ada\n"),
        ("solution.cc", "int main() {}\n"),
        ("sample.inp", ""),
    ]);

    let output = cargo_bin_cmd!("jtk")
        .env("NO_COLOR", "1")
        .arg("info")
        .arg("-d")
        .arg(&dir)
        .output()
        .expect("failed to run command");
    assert!(output.status.success());

    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(json["golden_solution"], "solution.cc");
    assert_eq!(json["testcases"][0], "sample");
    assert_eq!(json["structure"], "multi");

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn make_fails_on_a_broken_directory() {
    let dir = temp_problem(&[("problem.en.yml", "author: Ada\n")]);

    let output = cargo_bin_cmd!("jtk")
        .env("NO_COLOR", "1")
        .arg("make")
        .arg("-d")
        .arg(&dir)
        .output()
        .expect("failed to run command");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("handler.yml"));

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn ignored_errors_do_not_fail_the_run() {
    let dir = temp_problem(&[("problem.en.yml", "author: Ada\n")]);

    let output = cargo_bin_cmd!("jtk")
        .env("NO_COLOR", "1")
        .arg("make")
        .arg("-i")
        .arg("-d")
        .arg(&dir)
        .arg("info")
        .output()
        .expect("failed to run command");
    assert!(output.status.success());

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn all_cannot_be_combined() {
    let output = cargo_bin_cmd!("jtk")
        .arg("make")
        .arg("all")
        .arg("pdf")
        .output()
        .expect("failed to run command");
    assert!(!output.status.success());
}

#[test]
fn clean_removes_scratch_and_executables() {
    let dir = temp_problem(&[("solution.cc.exe", ""), ("solution.cc", "")]);
    fs::create_dir_all(dir.join("jtk-work").join("0123abcd")).expect("create arena");

    let output = cargo_bin_cmd!("jtk")
        .arg("clean")
        .arg("-d")
        .arg(&dir)
        .output()
        .expect("failed to run command");
    assert!(output.status.success());
    assert!(!dir.join("jtk-work").exists());
    assert!(!dir.join("solution.cc.exe").exists());
    assert!(dir.join("solution.cc").exists());

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn config_set_is_saved_and_read_back() {
    let path = std::env::temp_dir()
        .join(format!("jtk-cli-settings-{}", Uuid::new_v4()))
        .join("settings.yml");

    let set = cargo_bin_cmd!("jtk")
        .env("JTK_SETTINGS", &path)
        .args(["config", "set", "name", "Ada Lovelace"])
        .output()
        .expect("failed to run command");
    assert!(set.status.success());
    assert!(fs::read_to_string(&path).expect("settings written").contains("Ada Lovelace"));

    let get = cargo_bin_cmd!("jtk")
        .env("JTK_SETTINGS", &path)
        .args(["config", "get", "name"])
        .output()
        .expect("failed to run command");
    assert!(get.status.success());
    assert_eq!(String::from_utf8_lossy(&get.stdout).trim(), "Ada Lovelace");

    let show = cargo_bin_cmd!("jtk")
        .env("JTK_SETTINGS", &path)
        .args(["config", "show"])
        .output()
        .expect("failed to run command");
    assert!(show.status.success());
    assert!(String::from_utf8_lossy(&show.stdout).contains("developer: false"));

    let unknown = cargo_bin_cmd!("jtk")
        .env("JTK_SETTINGS", &path)
        .args(["config", "set", "default_model", "x"])
        .output()
        .expect("failed to run command");
    assert!(!unknown.status.success());

    if let Some(parent) = path.parent() {
        let _ = fs::remove_dir_all(parent);
    }
}
