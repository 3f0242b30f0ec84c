use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use jtk::toolchain::{BuildContext, CompileMode, ProbeCache, concat, resolve_by_id};
use uuid::Uuid;

/// Echo programs: stdin copied verbatim to stdout.
const ECHOES: [(&str, &str); 7] = [
    (
        "C",
        "#include <stdio.h>\nint main(void) {\n    int c;\n    while ((c = getchar()) != EOF) \
         putchar(c);\n    return 0;\n}\n",
    ),
    (
        "C++",
        "#include <iostream>\nint main() { std::cout << std::cin.rdbuf(); }\n",
    ),
    ("Python3", "import sys\nsys.stdout.write(sys.stdin.read())\n"),
    ("Haskell", "main :: IO ()\nmain = interact id\n"),
    (
        "Java",
        "class Main {\n    public static void main(String[] args) throws Exception {\n        \
         System.in.transferTo(System.out);\n    }\n}\n",
    ),
    (
        "Rust",
        "use std::io::Read;\nfn main() {\n    let mut text = String::new();\n    if \
         std::io::stdin().read_to_string(&mut text).is_ok() {\n        print!(\"{text}\");\n    \
         }\n}\n",
    ),
    ("R", "lines <- readLines(file(\"stdin\"))\ncat(c(lines, \"\"), sep = \"\\n\")\n"),
];

const INPUT: &str = "3\nhello world\n  spaced  line\n";

fn temp_dirs() -> (PathBuf, PathBuf) {
    let problem = std::env::temp_dir().join(format!("jtk-contract-{}.pbm", Uuid::new_v4()));
    let work = problem.join("jtk-work").join("contract");
    fs::create_dir_all(&work).expect("create work dir");
    (problem, work)
}

fn context<'a>(problem: &'a Path, work: &'a Path) -> BuildContext<'a> {
    BuildContext {
        problem_dir:       problem,
        work_dir:          work,
        prefix:            "jtk",
        compile_timeout:   Duration::from_secs(300),
        execution_timeout: Some(Duration::from_secs(60)),
    }
}

/// Compiles `source` as `solution.<ext>` and runs it on `input`.
async fn compile_and_run(
    id: &str,
    source: &str,
    input: &str,
    mode: CompileMode,
    problem: &Path,
    work: &Path,
) -> String {
    let toolchain = resolve_by_id(id).expect("registered toolchain");
    let ctx = context(problem, work);

    let scratch = work.join(format!("jtk-solution.{}", toolchain.extension()));
    fs::write(&scratch, source).expect("write scratch source");
    let artifact = toolchain
        .compile(&ctx, &scratch, mode)
        .await
        .unwrap_or_else(|e| panic!("{id} failed to compile: {e:#}"));
    assert!(artifact.executable.exists());

    let inp = work.join("case.inp");
    let out = work.join("case.out");
    fs::write(&inp, input).expect("write input");
    toolchain
        .execute(&ctx, &artifact, &inp, &out)
        .await
        .unwrap_or_else(|e| panic!("{id} failed to run: {e:#}"));
    fs::read_to_string(out).expect("read output")
}

#[tokio::test]
async fn every_available_toolchain_round_trips_its_input() {
    let probes = ProbeCache::new();
    let (problem, work) = temp_dirs();

    for (id, source) in ECHOES {
        let toolchain = resolve_by_id(id).expect("registered toolchain");
        if !probes.is_available(toolchain.probe()).await {
            eprintln!("skipping {id}: not installed");
            continue;
        }
        let output =
            compile_and_run(id, source, INPUT, CompileMode::Standalone, &problem, &work).await;
        assert_eq!(output, INPUT, "{id} did not echo its input");
    }

    let _ = fs::remove_dir_all(problem);
}

#[tokio::test]
async fn merging_appends_main_after_the_solution() {
    let probes = ProbeCache::new();
    let toolchain = resolve_by_id("C++").expect("C++");
    if !probes.is_available(toolchain.probe()).await {
        eprintln!("skipping: g++ not installed");
        return;
    }
    let (problem, work) = temp_dirs();

    let solution = "int f() { return 1; }\n";
    let main_v1 = "#include <iostream>\nint f();\nint main() { std::cout << f() << '\\n'; }\n";
    let main_v2 = "#include <iostream>\nint f();\nint main() { std::cout << f() + 1 << '\\n'; }\n";

    fs::write(problem.join("main.cc"), main_v1).expect("write main");
    let first =
        compile_and_run("C++", solution, "", CompileMode::MergeWithMain, &problem, &work).await;
    assert_eq!(first, "1\n");
    assert_eq!(
        fs::read_to_string(work.join("jtk-solution.cc")).expect("read merged"),
        concat(&[solution, main_v1])
    );

    fs::write(problem.join("notes.txt"), "unrelated").expect("write unrelated");
    let unchanged =
        compile_and_run("C++", solution, "", CompileMode::MergeWithMain, &problem, &work).await;
    assert_eq!(unchanged, first);

    fs::write(problem.join("main.cc"), main_v2).expect("rewrite main");
    let second =
        compile_and_run("C++", solution, "", CompileMode::MergeWithMain, &problem, &work).await;
    assert_eq!(second, "2\n");

    let _ = fs::remove_dir_all(problem);
}

#[tokio::test]
async fn scripts_merge_with_main_too() {
    let probes = ProbeCache::new();
    let toolchain = resolve_by_id("Python3").expect("Python3");
    if !probes.is_available(toolchain.probe()).await {
        eprintln!("skipping: python3 not installed");
        return;
    }
    let (problem, work) = temp_dirs();
    fs::write(problem.join("main.py"), "print(double(int(input())))\n").expect("write main");

    let output = compile_and_run(
        "Python3",
        "def double(x):\n    return 2 * x\n",
        "21\n",
        CompileMode::MergeWithMain,
        &problem,
        &work,
    )
    .await;
    assert_eq!(output, "42\n");

    let _ = fs::remove_dir_all(problem);
}

#[tokio::test]
async fn merging_without_main_fails_to_compile() {
    let (problem, work) = temp_dirs();
    let toolchain = resolve_by_id("Python3").expect("Python3");
    let ctx = context(&problem, &work);
    let scratch = work.join("jtk-solution.py");
    fs::write(&scratch, "print(1)\n").expect("write");

    let err = toolchain
        .compile(&ctx, &scratch, CompileMode::MergeWithMain)
        .await
        .expect_err("main.py is missing");
    assert!(format!("{err:#}").contains("main.py not found"));

    let _ = fs::remove_dir_all(problem);
}

#[tokio::test]
async fn injected_python_runs_the_input_as_code() {
    let probes = ProbeCache::new();
    let toolchain = resolve_by_id("RunPython").expect("RunPython");
    if !probes.is_available(toolchain.probe()).await {
        eprintln!("skipping: python3 not installed");
        return;
    }
    let (problem, work) = temp_dirs();

    let output = compile_and_run(
        "RunPython",
        "def square(x):\n    return x * x\n",
        "print(square(7))\n",
        CompileMode::Standalone,
        &problem,
        &work,
    )
    .await;
    assert_eq!(output, "49\n");

    let _ = fs::remove_dir_all(problem);
}

#[tokio::test]
async fn circuits_placeholder_writes_empty_outputs() {
    let (problem, work) = temp_dirs();
    let output = compile_and_run(
        "Verilog",
        "module top; endmodule\n",
        "anything\n",
        CompileMode::Standalone,
        &problem,
        &work,
    )
    .await;
    assert_eq!(output, "");

    let _ = fs::remove_dir_all(problem);
}

#[tokio::test]
async fn project_builds_link_public_and_private_sources() {
    let tools = ProbeCache::new();
    let toolchain = resolve_by_id("PRO2").expect("PRO2");
    if !tools.is_available(toolchain.probe()).await {
        eprintln!("skipping: g++ not installed");
        return;
    }
    let (problem, work) = temp_dirs();
    for tree in ["public", "private"] {
        fs::create_dir_all(problem.join(tree)).expect("create tree");
    }
    fs::write(
        problem.join("public").join("Greeter.hh"),
        "#include <string>\nstd::string greeting();\n",
    )
    .expect("write header");
    fs::write(
        problem.join("public").join("Greeter.cc"),
        "#include \"Greeter.hh\"\nstd::string greeting() { return \"public\"; }\n",
    )
    .expect("write public source");
    fs::write(
        problem.join("private").join("Greeter.cc"),
        "#include \"Greeter.hh\"\nstd::string greeting() { return \"private\"; }\n",
    )
    .expect("write private source");

    let program = "#include <iostream>\n#include \"Greeter.hh\"\nint main() {\n    std::cout << \
                   greeting() << '\\n';\n    std::cout << std::cin.rdbuf();\n}\n";
    let output =
        compile_and_run("PRO2", program, INPUT, CompileMode::Standalone, &problem, &work).await;
    assert_eq!(output, format!("private\n{INPUT}"));

    let _ = fs::remove_dir_all(problem);
}

#[tokio::test]
async fn turtle_imports_are_rewritten_only_for_standalone_compiles() {
    let tools = ProbeCache::new();
    let toolchain = resolve_by_id("Python3").expect("Python3");
    if !tools.is_available(toolchain.probe()).await {
        eprintln!("skipping: python3 not installed");
        return;
    }
    let (problem, work) = temp_dirs();
    let ctx = context(&problem, &work);
    let scratch = work.join("jtk-solution.py");
    let solution = "import turtle\n\ndef draw():\n    turtle.forward(10)\n";

    fs::write(&scratch, solution).expect("write scratch source");
    toolchain
        .compile(&ctx, &scratch, CompileMode::Standalone)
        .await
        .expect("standalone compile");
    let standalone = fs::read_to_string(&scratch).expect("read rewritten");
    assert!(standalone.starts_with("import turtle_pil as turtle\n"));

    fs::write(problem.join("main.py"), "draw()\n").expect("write main");
    fs::write(&scratch, solution).expect("write scratch source");
    toolchain
        .compile(&ctx, &scratch, CompileMode::MergeWithMain)
        .await
        .expect("merged compile");
    let merged = fs::read_to_string(&scratch).expect("read merged");
    assert!(merged.starts_with("import turtle\n"));
    assert!(!merged.contains("turtle_pil"));

    let _ = fs::remove_dir_all(problem);
}
