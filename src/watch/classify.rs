#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::Path;

use crate::{
    config::SAMPLE_PREFIX,
    problem::language_name,
    scratch::Scratch,
    toolchain::solution_extensions,
};

/// What a changed file means for the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// The golden solution changed.
    Golden,
    /// Another solution changed.
    Alternative(String),
    /// A testcase input changed.
    Testcase {
        /// Base name without `.inp`.
        name:   String,
        /// Whether the statement shows it.
        sample: bool,
    },
    /// The correct output of a sample changed.
    SampleOutput,
    /// A statement source changed.
    Statement,
    /// Nothing to do.
    Ignored,
}

/// Classifies a change to `path` in the problem `directory`.
///
/// Nested paths and anything with the scratch prefix are ignored.
pub fn classify(directory: &Path, prefix: &str, golden: Option<&str>, path: &Path) -> Trigger {
    if path.parent() != Some(directory) || Scratch::contains(directory, prefix, path) {
        return Trigger::Ignored;
    }
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return Trigger::Ignored;
    };
    if name.starts_with(prefix) {
        return Trigger::Ignored;
    }

    if is_solution(&name) {
        return if golden == Some(name.as_str()) {
            Trigger::Golden
        } else {
            Trigger::Alternative(name)
        };
    }

    if let Some(testcase) = name.strip_suffix(".inp") {
        return Trigger::Testcase {
            name:   testcase.to_string(),
            sample: testcase.starts_with(SAMPLE_PREFIX),
        };
    }

    if name.ends_with(".cor") && name.starts_with(SAMPLE_PREFIX) {
        return Trigger::SampleOutput;
    }

    let statement_language = name
        .strip_prefix("problem.")
        .and_then(|rest| rest.strip_suffix(".tex"));
    if statement_language.is_some_and(|lang| language_name(lang).is_some()) {
        return Trigger::Statement;
    }

    Trigger::Ignored
}

/// `solution.<ext>` for a known extension.
fn is_solution(name: &str) -> bool {
    name.strip_prefix("solution.")
        .is_some_and(|ext| solution_extensions().any(|known| known == ext))
}
