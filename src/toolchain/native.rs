#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::{Path, PathBuf};

use anyhow::Result;

use super::{
    Artifact, BuildContext, Toolchain, compile_step, display_name, ensure_compiled, run_with_input,
    with_suffix,
};
use crate::process::os_args;

/// `tool flags source -o source.exe`, run inside the scratch directory.
pub(super) async fn compile(
    toolchain: &Toolchain,
    ctx: &BuildContext<'_>,
    source: &Path,
) -> Result<PathBuf> {
    let executable = with_suffix(source, ".exe");
    let _ = tokio::fs::remove_file(&executable).await;

    let spec = toolchain.spec();
    let mut args = os_args(spec.flags);
    args.push(display_name(source).into());
    args.push("-o".into());
    args.push(display_name(&executable).into());

    let collected = compile_step(ctx, spec.tool, args, ctx.work_dir, source).await?;
    ensure_compiled(&collected, source)?;
    Ok(executable)
}

/// Runs the binary directly.
pub(super) async fn execute(
    _toolchain: &Toolchain,
    ctx: &BuildContext<'_>,
    artifact: &Artifact,
    input: &Path,
    output: &Path,
    testcase: &str,
) -> Result<()> {
    run_with_input(
        ctx,
        artifact.executable.as_os_str().to_owned(),
        Vec::new(),
        Some(input),
        output,
        testcase,
    )
    .await
}
