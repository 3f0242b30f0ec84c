#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::{
    Artifact, BuildContext, Toolchain, compile_step, display_name, ensure_compiled,
    run_with_input, with_suffix,
};
use crate::process::os_args;

/// Class every solution must declare as its entry point.
const MAIN_CLASS: &str = "Main";

/// `javac -d <source>.classes source`; the artifact is `Main.class`.
pub(super) async fn compile(
    toolchain: &Toolchain,
    ctx: &BuildContext<'_>,
    source: &Path,
) -> Result<PathBuf> {
    let classes = with_suffix(source, ".classes");
    if tokio::fs::try_exists(&classes).await.unwrap_or(false) {
        tokio::fs::remove_dir_all(&classes)
            .await
            .with_context(|| format!("Could not clear {}", classes.display()))?;
    }
    tokio::fs::create_dir_all(&classes)
        .await
        .with_context(|| format!("Could not create {}", classes.display()))?;

    let spec = toolchain.spec();
    let mut args = os_args(spec.flags);
    args.push("-d".into());
    args.push(display_name(&classes).into());
    args.push(display_name(source).into());

    let collected = compile_step(ctx, spec.tool, args, ctx.work_dir, source).await?;
    ensure_compiled(&collected, source)?;
    Ok(classes.join(format!("{MAIN_CLASS}.class")))
}

/// `java -cp <classes> Main`.
pub(super) async fn execute(
    toolchain: &Toolchain,
    ctx: &BuildContext<'_>,
    artifact: &Artifact,
    input: &Path,
    output: &Path,
    testcase: &str,
) -> Result<()> {
    let classes = artifact
        .executable
        .parent()
        .context("class file has no parent directory")?;
    let (program, prefix) = toolchain
        .spec()
        .runner
        .split_first()
        .context("JVM toolchain without a runner")?;
    let mut args = os_args(prefix);
    args.push("-cp".into());
    args.push(classes.as_os_str().to_owned());
    args.push(MAIN_CLASS.into());
    run_with_input(ctx, (*program).into(), args, Some(input), output, testcase).await
}
