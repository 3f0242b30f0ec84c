use std::{
    fs,
    path::{Path, PathBuf},
};

use jtk::{
    error::{BuildError, build_error},
    problem::{HandlerKind, Problem, SourceModifier, Structure},
};
use uuid::Uuid;

fn temp_problem(files: &[(&str, &str)]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("jtk-load-{}.pbm", Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create temp problem");
    for (name, contents) in files {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, contents).expect("write problem file");
    }
    dir
}

fn missing_reason(dir: &Path) -> String {
    let err = Problem::load(dir).expect_err("load should fail");
    match build_error(&err) {
        Some(BuildError::MissingMetadata { reason, .. }) => reason.clone(),
        other => panic!("expected MissingMetadata, got {other:?}"),
    }
}

#[test]
fn complete_problem_loads() {
    let dir = temp_problem(&[
        ("handler.yml", "handler: std\nsolution: C++\n"),
        ("problem.en.yml", "title: Hello\nauthor: Ada Lovelace\n"),
        ("problem.ca.yml", "title: Hola\ntranslator: Jordi\n"),
        ("solution.cc", "int main() {}\n"),
        ("solution.py", "print('OK')\n"),
        ("sample-2.inp", ""),
        ("sample-1.inp", ""),
        ("big.inp", ""),
        ("scores.yml", "- part: all\n  prefix: ''\n  points: 100\n"),
    ]);

    let problem = Problem::load(&dir).expect("load");
    assert_eq!(problem.structure(), Structure::Multi);
    assert_eq!(problem.languages(), ["ca", "en"]);
    assert_eq!(problem.original_language(), "en");
    assert_eq!(problem.solutions(), ["solution.cc", "solution.py"]);
    assert_eq!(problem.golden_solution(), Some("solution.cc"));
    assert_eq!(problem.alternative_solutions(), ["solution.py"]);
    assert_eq!(problem.testcases(), ["big", "sample-1", "sample-2"]);
    assert_eq!(problem.metadata_field("ca", "translator"), Some("Jordi"));
    assert_eq!(problem.scores().map(|s| s.len()), Some(1));
    assert_eq!(problem.statement_languages(), ["ca", "en"]);

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn missing_golden_solution_fails_before_building() {
    let dir = temp_problem(&[
        ("handler.yml", "solution: Python3\n"),
        ("problem.en.yml", "author: Ada\n"),
        ("solution.cc", "int main() {}\n"),
    ]);

    assert!(missing_reason(&dir).contains("solution.py"));
    assert!(!dir.join("jtk-work").exists());

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn handler_file_is_required() {
    let dir = temp_problem(&[("problem.en.yml", "author: Ada\n"), ("solution.cc", "")]);
    assert!(missing_reason(&dir).contains("handler.yml"));
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn invalid_handler_is_missing_metadata() {
    let dir = temp_problem(&[
        ("handler.yml", "handler: interactive\n"),
        ("problem.en.yml", "author: Ada\n"),
        ("solution.cc", ""),
    ]);
    assert!(missing_reason(&dir).contains("handler.yml"));
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn unknown_compiler_override_is_missing_metadata() {
    let dir = temp_problem(&[
        ("handler.yml", "compilers: Fortran77\n"),
        ("problem.en.yml", "author: Ada\n"),
        ("solution.cc", ""),
    ]);
    assert!(missing_reason(&dir).contains("Fortran77"));
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn an_author_is_required() {
    let dir = temp_problem(&[
        ("handler.yml", ""),
        ("problem.en.yml", "title: Hello\n"),
        ("solution.cc", ""),
    ]);
    assert!(missing_reason(&dir).contains("original language"));
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn no_solutions_is_missing_metadata() {
    let dir = temp_problem(&[("handler.yml", ""), ("problem.en.yml", "author: Ada\n")]);
    assert!(missing_reason(&dir).contains("No solutions"));
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn negative_scores_are_rejected() {
    let dir = temp_problem(&[
        ("handler.yml", ""),
        ("problem.en.yml", "author: Ada\n"),
        ("solution.cc", ""),
        ("scores.yml", "- part: a\n  prefix: a\n  points: -5\n"),
    ]);
    assert!(missing_reason(&dir).contains("scores.yml"));
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn overrides_pick_the_golden_solution() {
    let dir = temp_problem(&[
        ("handler.yml", "solution: C++\ncompilers: RunPython\n"),
        ("problem.en.yml", "author: Ada\n"),
        ("solution.cc", ""),
        ("solution.py", ""),
    ]);
    let problem = Problem::load(&dir).expect("load");
    assert_eq!(problem.golden_solution(), Some("solution.py"));
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn legacy_structs_modifier_is_normalized() {
    let dir = temp_problem(&[
        ("handler.yml", "source_modifier: structs\n"),
        ("problem.en.yml", "author: Ada\n"),
        ("solution.cc", ""),
    ]);
    let problem = Problem::load(&dir).expect("load");
    assert_eq!(problem.handler().source_modifier, SourceModifier::NoMain);
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn game_problems_skip_solutions() {
    let dir = temp_problem(&[
        ("handler.yml", "handler: game\ngame:\n  hide: [AIDummy.cc]\n"),
        ("problem.en.yml", "author: Ada\n"),
    ]);
    let problem = Problem::load(&dir).expect("load");
    assert_eq!(problem.handler().handler, HandlerKind::Game);
    assert!(problem.solutions().is_empty());
    assert_eq!(problem.golden_solution(), None);
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn single_structure_reads_sibling_languages() {
    let root = temp_problem(&[
        ("en/handler.yml", ""),
        ("en/problem.en.yml", "author: Ada\n"),
        ("en/solution.cc", ""),
        ("ca/problem.ca.yml", "translator: Jordi\n"),
    ]);

    let problem = Problem::load(&root.join("en")).expect("load");
    assert_eq!(problem.structure(), Structure::Single);
    assert_eq!(problem.language(), Some("en"));
    assert_eq!(problem.languages(), ["ca", "en"]);
    assert_eq!(problem.statement_languages(), ["en"]);

    let _ = fs::remove_dir_all(root);
}
