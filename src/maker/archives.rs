#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use anyhow::Result;

use super::{Maker, run_external};

/// Trees packed for multi-file problems.
const ARCHIVED_TREES: [&str; 3] = ["public", "private", "solution"];

impl Maker {
    /// Packs `public/`, `private/` and `solution/` into sibling tarballs for
    /// PRO2 problems. A failing `tar` aborts the build.
    pub async fn make_tar_files(&self) -> Result<()> {
        if !self.problem.handler().uses_pro2() {
            return Ok(());
        }

        for tree in ARCHIVED_TREES {
            let dir = self.problem.directory().join(tree);
            if !dir.is_dir() {
                continue;
            }
            let archive = format!("../{tree}.tar");
            run_external("tar", &["cf", &archive, "."], &dir, &self.config).await?;
            tracing::info!("Created {tree}.tar");
        }
        Ok(())
    }
}
