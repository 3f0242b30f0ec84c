#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::{Path, PathBuf};

use anyhow::Result;

use super::{display_name, with_suffix, write_text};

/// Writes an echo script standing in for an executable.
pub(super) async fn compile(source: &Path) -> Result<PathBuf> {
    let executable = with_suffix(source, ".exe");
    write_text(
        &executable,
        &format!(
            "echo \"This is a fake executable for Verilog source {}\"\n",
            display_name(source)
        ),
    )
    .await?;
    Ok(executable)
}

/// Nothing runs; the output is left empty.
pub(super) async fn execute(output: &Path) -> Result<()> {
    write_text(output, "").await
}
