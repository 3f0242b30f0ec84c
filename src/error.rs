#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the build pipeline that callers branch on.
///
/// Everything else travels as a plain `anyhow::Error` with context attached;
/// these variants are recovered with `anyhow::Error::downcast_ref`.
#[derive(Error, Debug)]
pub enum BuildError {
    /// A compile step did not produce the expected artifact.
    #[error("compilation of `{source_file}` failed{}: {reason}", exit_suffix(.exit_code))]
    CompileFailed {
        /// Solution (or scratch copy) being compiled.
        source_file: String,
        /// Exit code of the compiler, when it ran to completion.
        exit_code:   Option<i32>,
        /// Human readable cause.
        reason:      String,
    },
    /// A single execution exited nonzero, timed out or produced no output.
    #[error("execution of `{artifact}` on testcase `{testcase}` failed{}: {reason}", exit_suffix(.exit_code))]
    ExecutionFailed {
        /// Executable or script that ran.
        artifact:  String,
        /// Testcase base name.
        testcase:  String,
        /// Exit code, if the process was not killed.
        exit_code: Option<i32>,
        /// Human readable cause.
        reason:    String,
    },
    /// No toolchain registered for an id or extension.
    #[error("no toolchain registered for {0}")]
    UnknownToolchain(String),
    /// The probe reports the required tool is not installed.
    #[error("toolchain `{toolchain}` is not available on this machine (needed for `{solution}`)")]
    ToolchainUnavailable {
        /// Toolchain id or extension.
        toolchain: String,
        /// Solution that needed it.
        solution:  String,
    },
    /// Required file or field absent while loading a problem.
    #[error("{reason} (in {})", .directory.display())]
    MissingMetadata {
        /// Problem directory being loaded.
        directory: PathBuf,
        /// What was missing.
        reason:    String,
    },
    /// Aggregate failure after a whole batch of golden executions.
    #[error("{count} errors occurred while making correct outputs")]
    TestcaseErrors {
        /// Number of failed testcases.
        count: usize,
    },
    /// An external helper (make, tar, xelatex, pandoc) failed.
    #[error("`{tool}` failed{}: {reason}", exit_suffix(.exit_code))]
    ExternalTool {
        /// Rendered command line or tool name.
        tool:      String,
        /// Exit code, if any.
        exit_code: Option<i32>,
        /// Human readable cause.
        reason:    String,
    },
    /// Catch-all for anything else.
    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

/// Formats an optional exit code as a message suffix.
fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with exit code {code}"),
        None => String::new(),
    }
}

/// Returns the `BuildError` carried by an `anyhow` chain, if any.
pub fn build_error(err: &anyhow::Error) -> Option<&BuildError> {
    err.chain().find_map(|cause| cause.downcast_ref::<BuildError>())
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn messages_name_the_file_and_exit_code() {
        let err = BuildError::CompileFailed {
            source_file: "jtk-solution.cc".into(),
            exit_code:   Some(1),
            reason:      "`jtk-solution.cc.exe` was not produced".into(),
        };
        let text = err.to_string();
        assert!(text.contains("jtk-solution.cc"));
        assert!(text.contains("exit code 1"));
    }

    #[test]
    fn build_error_survives_added_context() {
        let err: anyhow::Error = Err::<(), _>(BuildError::TestcaseErrors { count: 2 })
            .context("while making correct outputs")
            .unwrap_err();
        assert!(matches!(build_error(&err), Some(BuildError::TestcaseErrors { count: 2 })));
    }
}
