#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::short_id;

/// A private working directory for one `Maker`.
///
/// Lives at `<problem>/<prefix>-work/<id>/`. Every scratch copy of a solution,
/// every verification output and every statement staging directory is created
/// inside it, so nothing a build writes there can be mistaken for an author
/// file. Removed when dropped unless `keep` is set.
#[derive(Debug)]
pub struct Scratch {
    /// Root of this arena.
    root:   PathBuf,
    /// `<problem>/<prefix>-work`, shared by all arenas of the problem.
    parent: PathBuf,
    /// Prefix used for scratch file names.
    prefix: String,
    /// Leave the directory on disk when dropped.
    keep:   bool,
}

impl Scratch {
    /// Creates a fresh arena under `problem_dir`.
    pub fn create(problem_dir: &Path, prefix: &str, keep: bool) -> Result<Self> {
        let parent = Self::parent_dir(problem_dir, prefix);
        let root = parent.join(short_id());
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Could not create scratch directory {}", root.display()))?;
        tracing::debug!("Using scratch directory {}", root.display());
        Ok(Self {
            root,
            parent,
            prefix: prefix.to_string(),
            keep,
        })
    }

    /// Directory holding every arena of a problem.
    pub fn parent_dir(problem_dir: &Path, prefix: &str) -> PathBuf {
        problem_dir.join(format!("{prefix}-work"))
    }

    /// Root of this arena.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<prefix>-<name>`.
    pub fn prefixed(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}-{name}", self.prefix))
    }

    /// A new empty subdirectory `<root>/<name>`, replacing any previous one.
    pub fn fresh_dir(&self, name: &str) -> Result<PathBuf> {
        let dir = self.root.join(name);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)
                .with_context(|| format!("Could not clear {}", dir.display()))?;
        }
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Could not create {}", dir.display()))?;
        Ok(dir)
    }

    /// True when `path` lies inside the scratch area of `problem_dir`.
    pub fn contains(problem_dir: &Path, prefix: &str, path: &Path) -> bool {
        path.starts_with(Self::parent_dir(problem_dir, prefix))
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            tracing::debug!("Could not remove {}: {e}", self.root.display());
        }
        // Removes the shared parent only when no other arena is left.
        let _ = std::fs::remove_dir(&self.parent);
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn temp_problem() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("jtk-scratch-{}.pbm", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("create temp problem");
        dir
    }

    #[test]
    fn arena_is_removed_on_drop() {
        let problem = temp_problem();
        let root = {
            let scratch = Scratch::create(&problem, "jtk", false).expect("create arena");
            assert!(scratch.root().is_dir());
            assert!(Scratch::contains(&problem, "jtk", &scratch.prefixed("solution.cc")));
            scratch.root().to_path_buf()
        };
        assert!(!root.exists());
        assert!(!Scratch::parent_dir(&problem, "jtk").exists());
        let _ = std::fs::remove_dir_all(problem);
    }

    #[test]
    fn kept_arena_survives_drop() {
        let problem = temp_problem();
        let root = {
            let scratch = Scratch::create(&problem, "jtk", true).expect("create arena");
            scratch.root().to_path_buf()
        };
        assert!(root.is_dir());
        let _ = std::fs::remove_dir_all(problem);
    }
}
