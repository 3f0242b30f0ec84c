#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::{
    Artifact, BuildContext, Injector, MERGE_SEPARATOR, Toolchain, compile_step, display_name,
    ensure_compiled, read_text, run_with_input, write_text,
};
use crate::process::os_args;

/// Syntax check, or nothing at all when the language has none. The script
/// itself is the artifact.
pub(super) async fn compile(
    toolchain: &Toolchain,
    ctx: &BuildContext<'_>,
    source: &Path,
) -> Result<PathBuf> {
    let spec = toolchain.spec();
    match spec.check.split_first() {
        Some((program, prefix)) => {
            let mut args = os_args(prefix);
            args.push(display_name(source).into());
            let collected = compile_step(ctx, program, args, ctx.work_dir, source).await?;
            ensure_compiled(&collected, source)?;
        }
        None => tracing::warn!("No compilation available for {}", spec.name),
    }
    Ok(source.to_path_buf())
}

/// `<runner> script < input > output`.
pub(super) async fn execute(
    toolchain: &Toolchain,
    ctx: &BuildContext<'_>,
    artifact: &Artifact,
    input: &Path,
    output: &Path,
    testcase: &str,
) -> Result<()> {
    let (program, prefix) = runner(toolchain)?;
    let mut args = os_args(prefix);
    args.push(display_name(&artifact.executable).into());
    run_with_input(ctx, (*program).into(), args, Some(input), output, testcase).await
}

/// Splices the input into a per-testcase copy of the script, then runs that
/// copy without stdin.
pub(super) async fn execute_injected(
    toolchain: &Toolchain,
    ctx: &BuildContext<'_>,
    artifact: &Artifact,
    input: &Path,
    output: &Path,
    testcase: &str,
) -> Result<()> {
    let injector = toolchain
        .spec()
        .injector
        .context("injected toolchain without an injector")?;
    let stem = artifact
        .source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let merged_path = ctx.work_dir.join(format!(
        "{}-{stem}-{testcase}.{}",
        ctx.prefix,
        toolchain.extension()
    ));

    tracing::info!(
        "merge {} {} > {}",
        display_name(&artifact.executable),
        display_name(input),
        display_name(&merged_path)
    );
    let program_text = read_text(&artifact.executable).await?;
    let input_text = read_text(input).await?;
    write_text(&merged_path, &inject(injector, &program_text, &input_text)).await?;

    let (program, prefix) = runner(toolchain)?;
    let mut args = os_args(prefix);
    args.push(display_name(&merged_path).into());
    run_with_input(ctx, (*program).into(), args, None, output, testcase).await
}

/// Interpreter program and its leading arguments.
fn runner(toolchain: &Toolchain) -> Result<(&'static &'static str, &'static [&'static str])> {
    toolchain
        .spec()
        .runner
        .split_first()
        .with_context(|| format!("{} has no interpreter configured", toolchain.name()))
}

/// Builds the program that prints the evaluation of every input line.
pub fn inject(injector: Injector, program: &str, input: &str) -> String {
    let mut merged = String::from(program);
    merged.push_str(MERGE_SEPARATOR);
    match injector {
        Injector::Python => merged.push_str(input),
        Injector::Haskell => {
            merged.push_str("main = do\n");
            for line in input.trim().split('\n') {
                if line.trim().is_empty() {
                    merged.push_str("    print ()\n");
                } else if line.starts_with("let") {
                    merged.push_str(&format!("    {line}\n"));
                } else {
                    merged.push_str(&format!("    print $ {line}\n"));
                }
            }
        }
        Injector::Clojure => {
            for line in input.split('\n') {
                if line.trim().is_empty() {
                    merged.push('\n');
                } else {
                    merged.push_str(&format!("(println {line})\n"));
                }
            }
        }
    }
    merged
}

/// Points turtle graphics at the headless `turtle_pil` module.
pub fn use_turtle_pil(source: &str) -> String {
    source
        .replacen("import turtle", "import turtle_pil as turtle", 1)
        .replacen("from turtle import", "from turtle_pil import", 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haskell_lines_become_prints() {
        let merged = inject(Injector::Haskell, "double x = 2 * x", "double 3\nlet y = 4\n\ndouble y\n");
        assert_eq!(
            merged,
            "double x = 2 * x\n\n\nmain = do\n    print $ double 3\n    let y = 4\n    print ()\n    print $ double y\n"
        );
    }

    #[test]
    fn clojure_lines_are_wrapped() {
        let merged = inject(Injector::Clojure, "(defn f [x] x)", "(f 1)\n\n(f 2)");
        assert_eq!(merged, "(defn f [x] x)\n\n\n(println (f 1))\n\n(println (f 2))\n");
    }

    #[test]
    fn python_input_is_appended_verbatim() {
        assert_eq!(
            inject(Injector::Python, "def f(x): return x", "print(f(1))\n"),
            "def f(x): return x\n\n\nprint(f(1))\n"
        );
    }

    #[test]
    fn turtle_imports_are_redirected() {
        assert_eq!(use_turtle_pil("import turtle\n"), "import turtle_pil as turtle\n");
        assert_eq!(
            use_turtle_pil("from turtle import Turtle\n"),
            "from turtle_pil import Turtle\n"
        );
    }
}
