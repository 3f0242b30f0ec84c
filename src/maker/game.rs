#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::Path;

use anyhow::{Context, Result};
use itertools::Itertools;

use super::{Maker, run_external};
use crate::util::{copy_file, file_names_matching};

/// Runner files that may be published.
const PUBLISHED_PATTERNS: [&str; 6] = ["README.txt", "README.md", "Makefile", "*.cc", "*.hh", "*.cnf"];

/// Files of a runner split by the hide list.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Publication {
    /// Copied to `Public/`.
    pub published: Vec<String>,
    /// Matched a pattern but are on the hide list.
    pub hidden:    Vec<String>,
}

/// Picks the runner files to publish, sorted, keeping hidden ones apart.
pub(crate) fn select_public_files(runner: &Path, hide: &[String]) -> Result<Publication> {
    let mut names = Vec::new();
    for pattern in PUBLISHED_PATTERNS {
        names.extend(file_names_matching(runner, pattern)?);
    }

    let (hidden, published): (Vec<String>, Vec<String>) = names
        .into_iter()
        .sorted()
        .dedup()
        .partition(|name| hide.contains(name));
    Ok(Publication { published, hidden })
}

/// Builds the docs and the runner, then publishes the runner's public files.
pub(super) async fn make_game(maker: &Maker) -> Result<()> {
    let directory = maker.problem.directory();

    for part in ["Doc", "Runner"] {
        tracing::info!("Making {part}");
        run_external("make", &["all"], &directory.join(part), &maker.config).await?;
    }

    let runner = directory.join("Runner");
    let public = directory.join("Public");
    if public.exists() {
        tokio::fs::remove_dir_all(&public)
            .await
            .with_context(|| format!("Could not remove {}", public.display()))?;
    }
    tokio::fs::create_dir_all(&public)
        .await
        .with_context(|| format!("Could not create {}", public.display()))?;

    let publication = select_public_files(&runner, maker.problem.handler().hidden_files())?;
    for name in &publication.published {
        copy_file(&runner.join(name), &public.join(name)).await?;
    }

    tracing::info!("Published: {}", publication.published.join(" "));
    if !publication.hidden.is_empty() {
        tracing::info!("Hidden: {}", publication.hidden.join(" "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn hidden_files_are_kept_apart() {
        let runner = std::env::temp_dir().join(format!("jtk-runner-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&runner).expect("create runner");
        for name in ["Board.cc", "Board.hh", "AIDummy.cc", "Makefile", "default.cnf", "notes.org"] {
            std::fs::write(runner.join(name), "").expect("write runner file");
        }

        let publication =
            select_public_files(&runner, &["AIDummy.cc".to_string()]).expect("select");
        assert_eq!(
            publication.published,
            ["Board.cc", "Board.hh", "Makefile", "default.cnf"]
        );
        assert_eq!(publication.hidden, ["AIDummy.cc"]);

        std::fs::remove_dir_all(&runner).ok();
    }
}
