#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use super::{BuildContext, Toolchain, compile_step, display_name, ensure_compiled, with_suffix};
use crate::{
    error::BuildError,
    process::os_args,
    util::{copy_file, file_names_matching},
};

/// Source trees copied into a project build, in overwrite order.
const PROJECT_TREES: [&str; 2] = ["public", "private"];
/// Source trees copied into a make build, in overwrite order.
const MAKE_TREES: [&str; 3] = ["public", "private", "solution"];
/// Archive standing in for a missing `solution/` tree.
const SOLUTION_ARCHIVE: &str = "solution.tar";

/// Creates `<work>/<prefix>-<id>-<source name>/`, empty.
async fn build_dir(toolchain: &Toolchain, ctx: &BuildContext<'_>, source: &Path) -> Result<PathBuf> {
    let dir = ctx.work_dir.join(format!(
        "{}-{}-{}",
        ctx.prefix,
        toolchain.id(),
        display_name(source)
    ));
    if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
        tokio::fs::remove_dir_all(&dir)
            .await
            .with_context(|| format!("Could not clear {}", dir.display()))?;
    }
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Could not create {}", dir.display()))?;
    tracing::info!("Using working directory {}", dir.display());
    Ok(dir)
}

/// Copies `*.cc` and `*.hh` (and optionally `Makefile`) from each tree, in
/// order, so later trees overwrite files of earlier ones.
pub(crate) async fn merge_trees(
    problem_dir: &Path,
    trees: &[&str],
    dest: &Path,
    with_makefile: bool,
) -> Result<()> {
    for tree in trees {
        let dir = problem_dir.join(tree);
        if !dir.is_dir() {
            continue;
        }
        let mut names = file_names_matching(&dir, "*.cc")?;
        names.extend(file_names_matching(&dir, "*.hh")?);
        if with_makefile && dir.join("Makefile").is_file() {
            names.push("Makefile".to_string());
        }
        for name in names {
            copy_file(&dir.join(&name), &dest.join(&name)).await?;
        }
    }
    Ok(())
}

/// PRO2: public and private C++ files plus the source as `program.<ext>`,
/// all compiled together with `g++`.
pub(super) async fn compile_project(
    toolchain: &Toolchain,
    ctx: &BuildContext<'_>,
    source: &Path,
) -> Result<PathBuf> {
    let executable = with_suffix(source, ".exe");
    let _ = tokio::fs::remove_file(&executable).await;
    let dir = build_dir(toolchain, ctx, source).await?;

    merge_trees(ctx.problem_dir, &PROJECT_TREES, &dir, false).await?;
    let extension = source
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cc".into());
    copy_file(source, &dir.join(format!("program.{extension}"))).await?;

    let spec = toolchain.spec();
    let exe_name = display_name(&executable);
    let mut args = os_args(spec.flags);
    args.push("-o".into());
    args.push(exe_name.clone().into());
    args.extend(os_args(file_names_matching(&dir, "*.cc")?));

    let collected = compile_step(ctx, spec.tool, args, &dir, source).await?;
    ensure_compiled(&collected, source)?;
    copy_back(&dir.join(&exe_name), &executable, source).await?;
    Ok(executable)
}

/// MakePRO2: public, private and solution trees (sources and `Makefile`)
/// merged in that order, then `make`, which must leave `program.exe`.
pub(super) async fn compile_make(
    toolchain: &Toolchain,
    ctx: &BuildContext<'_>,
    source: &Path,
) -> Result<PathBuf> {
    let executable = with_suffix(source, ".exe");
    let _ = tokio::fs::remove_file(&executable).await;
    let dir = build_dir(toolchain, ctx, source).await?;

    merge_trees(ctx.problem_dir, &MAKE_TREES, &dir, true).await?;
    if !ctx.problem_dir.join("solution").is_dir() {
        unpack_solution(ctx, &dir, source).await?;
    }

    let collected = compile_step(ctx, toolchain.spec().tool, Vec::new(), &dir, source).await?;
    ensure_compiled(&collected, source)?;
    copy_back(&dir.join("program.exe"), &executable, source).await?;
    Ok(executable)
}

/// Without a `solution/` tree the solution files come from
/// `<problem>/solution.tar`, or failing that from the source itself as
/// `program.cc`.
async fn unpack_solution(ctx: &BuildContext<'_>, dir: &Path, source: &Path) -> Result<()> {
    let archive = ctx.problem_dir.join(SOLUTION_ARCHIVE);
    if !archive.is_file() {
        tracing::debug!("no {SOLUTION_ARCHIVE}, building {} as program.cc", display_name(source));
        return copy_file(source, &dir.join("program.cc")).await;
    }
    let archive = tokio::fs::canonicalize(&archive)
        .await
        .with_context(|| format!("Could not resolve {}", archive.display()))?;
    let collected = compile_step(
        ctx,
        "tar",
        os_args([OsStr::new("xf"), archive.as_os_str()]),
        dir,
        source,
    )
    .await?;
    ensure_compiled(&collected, source)
}

/// Copies the built binary next to the scratch source.
async fn copy_back(built: &Path, executable: &Path, source: &Path) -> Result<()> {
    if !tokio::fs::try_exists(built).await.unwrap_or(false) {
        return Err(BuildError::CompileFailed {
            source_file: display_name(source),
            exit_code:   None,
            reason:      format!("`{}` not found after building", display_name(built)),
        }
        .into());
    }
    copy_file(built, executable).await
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn later_trees_overwrite_earlier_ones() {
        let root = std::env::temp_dir().join(format!("jtk-trees-{}", Uuid::new_v4()));
        for (tree, body) in [("public", "public"), ("private", "private"), ("solution", "solution")] {
            std::fs::create_dir_all(root.join(tree)).expect("create tree");
            std::fs::write(root.join(tree).join("Stack.hh"), body).expect("write header");
        }
        std::fs::write(root.join("public").join("main.cc"), "int main(){}").expect("write main");
        std::fs::write(root.join("solution").join("Makefile"), "all:").expect("write makefile");
        let dest = root.join("build");
        std::fs::create_dir_all(&dest).expect("create build");

        merge_trees(&root, &MAKE_TREES, &dest, true).await.expect("merge");

        assert_eq!(std::fs::read_to_string(dest.join("Stack.hh")).expect("read"), "solution");
        assert!(dest.join("main.cc").is_file());
        assert!(dest.join("Makefile").is_file());
        let _ = std::fs::remove_dir_all(root);
    }
}
