#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Drives a problem build: golden solution, correct outputs, verification
//! of alternatives, statements and game publishing.

/// `public`/`private`/`solution` tarballs.
mod archives;
/// Game problems.
mod game;
/// Result tables and diffs.
pub mod report;
/// PDF and textual statements.
pub mod statements;

use std::{
    collections::HashMap,
    ffi::OsString,
    path::{Path, PathBuf},
    sync::Arc,
    time::Instant,
};

use anyhow::{Context, Result, bail};
pub use report::{ExecutionResult, Verdict};
pub use statements::{Length, TextFormat};

use crate::{
    config::ToolkitConfig,
    error::BuildError,
    problem::{HandlerKind, LANGUAGES, Problem},
    process::Invocation,
    scratch::Scratch,
    toolchain::{
        Artifact, BuildContext, CompileMode, ProbeCache, Toolchain, resolve_by_extension,
        resolve_by_id,
    },
    util::{copy_file, file_size, files_equal},
};

/// What `verify_solution` found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The toolchain is not installed; nothing ran.
    Skipped,
    /// The solution did not compile.
    CompileFailed,
    /// Every testcase ran.
    Checked {
        /// Testcases with an `OK` verdict.
        passed: usize,
        /// Testcases with `WA` or `EE`.
        failed: usize,
    },
}

/// Builds one problem. Owns the loaded problem, the configuration, a shared
/// probe cache and a private scratch arena.
#[derive(Debug)]
pub struct Maker {
    /// Loaded problem.
    problem:   Problem,
    /// Toolkit settings.
    config:    ToolkitConfig,
    /// Availability probes, shared with other makers.
    probes:    Arc<ProbeCache>,
    /// Where every scratch file goes.
    scratch:   Scratch,
    /// Compiled artifacts by solution name.
    artifacts: HashMap<String, Artifact>,
}

impl Maker {
    /// Creates a maker and its scratch arena.
    pub fn new(problem: Problem, config: ToolkitConfig, probes: Arc<ProbeCache>) -> Result<Self> {
        let scratch = Scratch::create(problem.directory(), config.prefix(), config.keep_scratch())?;
        Ok(Self {
            problem,
            config,
            probes,
            scratch,
            artifacts: HashMap::new(),
        })
    }

    /// The loaded problem.
    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    /// Mutable access, for re-scans in watch mode.
    pub fn problem_mut(&mut self) -> &mut Problem {
        &mut self.problem
    }

    /// Toolkit settings.
    pub fn config(&self) -> &ToolkitConfig {
        &self.config
    }

    /// Probe cache.
    pub fn probes(&self) -> &ProbeCache {
        &self.probes
    }

    /// The scratch arena.
    pub fn scratch(&self) -> &Scratch {
        &self.scratch
    }

    /// Artifact compiled for `solution`, if any.
    pub fn artifact(&self, solution: &str) -> Option<&Artifact> {
        self.artifacts.get(solution)
    }

    /// Context handed to every toolchain call.
    fn context(&self) -> BuildContext<'_> {
        BuildContext {
            problem_dir:       self.problem.directory(),
            work_dir:          self.scratch.root(),
            prefix:            self.config.prefix(),
            compile_timeout:   self.config.compile_timeout(),
            execution_timeout: self.config.execution_timeout(),
        }
    }

    /// Checks the directory is a problem directory and logs what was found.
    pub fn show_directory(&self) -> Result<()> {
        let directory = self.problem.directory();
        check_problem_directory(directory)?;

        tracing::info!("directory: {}", directory.display());
        tracing::info!("structure: {:?}", self.problem.structure());
        tracing::info!("handler: {:?}", self.problem.handler().handler);
        tracing::info!("languages: {}", self.problem.languages().join(" "));
        if let Some(golden) = self.problem.golden_solution() {
            tracing::info!("golden solution: {golden}");
        }
        tracing::info!("testcases: {}", self.problem.testcases().len());
        Ok(())
    }

    /// Builds everything the handler kind calls for.
    ///
    /// Fatal: golden compile failures, an unavailable golden toolchain and
    /// any golden execution error. Alternative solutions and statements
    /// only log their problems.
    pub async fn build_all(&mut self) -> Result<()> {
        match self.problem.handler().handler {
            HandlerKind::Quiz => {
                tracing::info!("Quiz problem: nothing to build");
                Ok(())
            }
            HandlerKind::Game => game::make_game(self).await,
            HandlerKind::Std | HandlerKind::Graphic | HandlerKind::Circuits => {
                self.make_tar_files().await?;
                self.compile_golden().await?;
                self.compute_golden_outputs().await?;
                self.verify_all().await;
                self.regenerate_pdf_statements().await?;
                self.regenerate_textual_statements(&TextFormat::ALL, Length::Full)
                    .await?;
                self.regenerate_textual_statements(&TextFormat::ALL, Length::Short)
                    .await?;
                Ok(())
            }
        }
    }

    /// Toolchain that builds `solution`: the handler override when it
    /// handles this extension, otherwise the extension's toolchain.
    pub fn toolchain_for(&self, solution: &str) -> Result<Toolchain> {
        let extension = Path::new(solution)
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .with_context(|| format!("{solution} has no extension"))?;

        if let Some(id) = self.problem.handler().compilers() {
            let toolchain = resolve_by_id(id)?;
            if toolchain.extension() == extension {
                return Ok(toolchain);
            }
        }
        resolve_by_extension(&extension)
    }

    /// Fails with `ToolchainUnavailable` when the probe says the tool is
    /// missing. Circuit problems are never gated.
    async fn require_available(&self, toolchain: Toolchain, solution: &str) -> Result<()> {
        if self.problem.handler().handler == HandlerKind::Circuits {
            return Ok(());
        }
        if self.probes.is_available(toolchain.probe()).await {
            Ok(())
        } else {
            Err(BuildError::ToolchainUnavailable {
                toolchain: toolchain.id().to_string(),
                solution:  solution.to_string(),
            }
            .into())
        }
    }

    /// Compiles one solution from a scratch copy and remembers the artifact.
    pub async fn compile_one(&mut self, solution: &str) -> Result<Artifact> {
        let toolchain = self.toolchain_for(solution)?;
        self.require_available(toolchain, solution).await?;

        let original = self.problem.directory().join(solution);
        let source = self.scratch.prefixed(solution);
        copy_file(&original, &source).await?;

        let mode = if self.problem.handler().merges_main() {
            CompileMode::MergeWithMain
        } else {
            CompileMode::Standalone
        };

        tracing::info!("Compiling {solution} with {}", toolchain.name());
        let artifact = toolchain.compile(&self.context(), &source, mode).await?;
        tracing::info!(
            "Compiled {solution} to {}",
            artifact
                .executable
                .strip_prefix(self.scratch.root())
                .unwrap_or(&artifact.executable)
                .display()
        );
        self.artifacts
            .insert(solution.to_string(), artifact.clone());
        Ok(artifact)
    }

    /// Compiles the golden solution.
    pub async fn compile_golden(&mut self) -> Result<Artifact> {
        let golden = self.golden()?.to_string();
        self.compile_one(&golden).await
    }

    /// Compiles every solution, stopping at the first failure.
    pub async fn compile_all(&mut self) -> Result<()> {
        let solutions = self.problem.solutions().to_vec();
        for solution in solutions {
            self.compile_one(&solution).await?;
        }
        Ok(())
    }

    /// Name of the golden solution.
    fn golden(&self) -> Result<&str> {
        self.problem.golden_solution().ok_or_else(|| {
            BuildError::MissingMetadata {
                directory: self.problem.directory().to_path_buf(),
                reason:    "this problem has no golden solution".into(),
            }
            .into()
        })
    }

    /// Runs the golden solution on every testcase, writing `<tc>.cor`.
    pub async fn compute_golden_outputs(&mut self) -> Result<Vec<ExecutionResult>> {
        let testcases = self.problem.testcases().to_vec();
        self.compute_golden_outputs_for(&testcases).await
    }

    /// Runs the golden solution on `testcases`, writing `<tc>.cor`.
    ///
    /// Every testcase runs; afterwards the table is printed and the batch
    /// fails with `TestcaseErrors` if any of them did.
    pub async fn compute_golden_outputs_for(
        &mut self,
        testcases: &[String],
    ) -> Result<Vec<ExecutionResult>> {
        let golden = self.golden()?.to_string();
        let artifact = match self.artifacts.get(&golden) {
            Some(artifact) => artifact.clone(),
            None => self.compile_golden().await?,
        };

        tracing::info!("Making correct outputs with {golden}");
        let mut results = Vec::with_capacity(testcases.len());
        for testcase in testcases {
            let output = self.problem.directory().join(format!("{testcase}.cor"));
            let (result, outcome) = self.run_testcase(&artifact, testcase, &output).await;
            if let Err(e) = outcome {
                tracing::error!("{e:#}");
            }
            results.push(result);
        }

        println!("{}", report::golden_table(&results));

        let count = report::failures(&results);
        if count > 0 {
            return Err(BuildError::TestcaseErrors { count }.into());
        }
        tracing::info!("{} correct outputs made", results.len());
        Ok(results)
    }

    /// Runs `artifact` on one testcase into `output` and times it.
    ///
    /// Graphic problems draw `output.png` in the work directory; it is moved
    /// to `output` after a clean run.
    async fn run_testcase(
        &self,
        artifact: &Artifact,
        testcase: &str,
        output: &Path,
    ) -> (ExecutionResult, Result<()>) {
        let ctx = self.context();
        let input = self.problem.directory().join(format!("{testcase}.inp"));

        let start = Instant::now();
        let mut outcome = artifact
            .toolchain
            .execute(&ctx, artifact, &input, output)
            .await;
        let elapsed = start.elapsed();

        if outcome.is_ok() && self.problem.handler().handler == HandlerKind::Graphic {
            let drawing = self.scratch.root().join("output.png");
            outcome = tokio::fs::rename(&drawing, output)
                .await
                .with_context(|| format!("{testcase}: output.png was not drawn"));
        }

        let result = ExecutionResult {
            testcase: testcase.to_string(),
            elapsed,
            input_size: file_size(&input).await,
            output_size: file_size(output).await,
            failed: outcome.is_err(),
            verdict: None,
        };
        (result, outcome)
    }

    /// Compiles `solution` and checks it against every `.cor`.
    ///
    /// A missing toolchain or a compile error is reported and returned as an
    /// outcome; wrong answers are counted, never raised.
    pub async fn verify_solution(&mut self, solution: &str) -> Result<VerifyOutcome> {
        tracing::info!("Verifying {solution}");
        let toolchain = self.toolchain_for(solution)?;
        if self.require_available(toolchain, solution).await.is_err() {
            tracing::warn!(
                "{} is not available, skipping verification of {solution}",
                toolchain.name()
            );
            return Ok(VerifyOutcome::Skipped);
        }

        let artifact = match self.compile_one(solution).await {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::error!("{e:#}");
                return Ok(VerifyOutcome::CompileFailed);
            }
        };

        let testcases = self.problem.testcases().to_vec();
        let results = self.check_testcases(solution, &artifact, &testcases).await?;
        let failed = report::failures(&results);
        let passed = results.len() - failed;
        if failed == 0 {
            tracing::info!("{solution}: all {passed} testcases passed");
        } else {
            tracing::warn!("{solution}: {failed} testcases failed");
        }
        Ok(VerifyOutcome::Checked { passed, failed })
    }

    /// Runs `artifact` on `testcases`, compares with `.cor` and prints the
    /// table plus a diff for every wrong answer.
    async fn check_testcases(
        &self,
        solution: &str,
        artifact: &Artifact,
        testcases: &[String],
    ) -> Result<Vec<ExecutionResult>> {
        let extension = artifact.toolchain.extension();
        let mut results = Vec::with_capacity(testcases.len());
        for testcase in testcases {
            let output = self
                .scratch
                .prefixed(&format!("{testcase}.{extension}.out"));
            let expected = self.problem.directory().join(format!("{testcase}.cor"));

            let (mut result, outcome) = self.run_testcase(artifact, testcase, &output).await;
            let verdict = match outcome {
                Err(e) => {
                    tracing::error!("{e:#}");
                    Verdict::ExecutionError
                }
                Ok(()) if files_equal(&output, &expected).await => Verdict::Ok,
                Ok(()) => {
                    show_difference(testcase, &expected, &output).await;
                    Verdict::WrongAnswer
                }
            };
            result.failed = verdict != Verdict::Ok;
            result.verdict = Some(verdict);
            results.push(result);
        }

        println!("{solution}");
        println!("{}", report::verify_table(&results));
        Ok(results)
    }

    /// Verifies every alternative solution. Problems are logged and never
    /// fail the build.
    pub async fn verify_all(&mut self) {
        let alternatives: Vec<String> = self
            .problem
            .alternative_solutions()
            .into_iter()
            .map(str::to_string)
            .collect();
        for solution in alternatives {
            if let Err(e) = self.verify_solution(&solution).await {
                tracing::error!("Could not verify {solution}: {e:#}");
            }
        }
    }

    /// Re-runs every compiled alternative on `testcases`.
    pub async fn run_alternatives_for(&mut self, testcases: &[String]) -> Result<()> {
        let mut compiled: Vec<(String, Artifact)> = self
            .problem
            .alternative_solutions()
            .into_iter()
            .filter_map(|s| self.artifacts.get(s).map(|a| (s.to_string(), a.clone())))
            .collect();
        compiled.sort_by(|a, b| a.0.cmp(&b.0));

        for (solution, artifact) in compiled {
            self.check_testcases(&solution, &artifact, testcases)
                .await?;
        }
        Ok(())
    }

    /// Forgets the artifact of `solution` so the next use recompiles it.
    pub fn forget(&mut self, solution: &str) {
        self.artifacts.remove(solution);
    }
}

/// Prints a word diff of a wrong answer when both sides are text.
async fn show_difference(testcase: &str, expected: &Path, actual: &Path) {
    let (Ok(expected), Ok(actual)) = (
        tokio::fs::read_to_string(expected).await,
        tokio::fs::read_to_string(actual).await,
    ) else {
        return;
    };
    if let Some((expected, actual)) = report::word_diff(&expected, &actual) {
        println!("{testcase}:\nExpected:\n{expected}\nActual:\n{actual}");
    }
}

/// A problem directory ends in `.pbm` or is a language directory inside one.
pub fn check_problem_directory(directory: &Path) -> Result<()> {
    let name = |path: &Path| {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };

    if name(directory).ends_with(".pbm") {
        return Ok(());
    }
    let is_language = LANGUAGES.iter().any(|(tag, _)| *tag == name(directory));
    let in_pbm = directory
        .parent()
        .is_some_and(|parent| name(parent).ends_with(".pbm"));
    if is_language && in_pbm {
        return Ok(());
    }
    bail!(
        "{} is not a problem directory (expected a .pbm directory or a language directory inside \
         one)",
        directory.display()
    )
}

/// Runs an external helper in `cwd`; a spawn failure or a nonzero exit is an
/// `ExternalTool` error.
pub(crate) async fn run_external(
    program: &str,
    args: &[&str],
    cwd: &Path,
    config: &ToolkitConfig,
) -> Result<()> {
    let invocation = Invocation::builder()
        .program(program)
        .args(args.iter().map(OsString::from).collect())
        .cwd(cwd)
        .deadline(config.compile_timeout())
        .build();
    let rendered = invocation.render();
    tracing::info!("{rendered}");

    let collected = invocation.run().await.map_err(|e| BuildError::ExternalTool {
        tool:      rendered.clone(),
        exit_code: None,
        reason:    format!("{e:#}"),
    })?;
    if !collected.success() {
        crate::toolchain::forward_stderr(&collected);
        return Err(BuildError::ExternalTool {
            tool:      rendered,
            exit_code: collected.code(),
            reason:    "nonzero exit status".into(),
        }
        .into());
    }
    Ok(())
}

/// Removes every scratch arena of a problem and generated `*.exe` files.
/// Returns how many entries were removed.
pub fn clean(directory: &Path, prefix: &str) -> Result<usize> {
    let mut removed = 0;

    let arenas = Scratch::parent_dir(directory, prefix);
    if arenas.is_dir() {
        std::fs::remove_dir_all(&arenas)
            .with_context(|| format!("Could not remove {}", arenas.display()))?;
        tracing::info!("removed {}", arenas.display());
        removed += 1;
    }

    let executables: Vec<PathBuf> = crate::util::glob_sorted(&directory.join("*.exe"))?;
    for exe in executables {
        std::fs::remove_file(&exe).with_context(|| format!("Could not remove {}", exe.display()))?;
        tracing::info!("removed {}", exe.display());
        removed += 1;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[test]
    fn pbm_and_language_directories_are_accepted() {
        let root = std::env::temp_dir().join(format!("jtk-dirs-{}", Uuid::new_v4()));
        let pbm = root.join("hello.pbm");
        let en = pbm.join("en");
        let stray = root.join("hello");
        for dir in [&en, &stray] {
            std::fs::create_dir_all(dir).expect("create dirs");
        }

        assert!(check_problem_directory(&pbm).is_ok());
        assert!(check_problem_directory(&en).is_ok());
        assert!(check_problem_directory(&stray).is_err());
        assert!(check_problem_directory(&stray.join("en")).is_err());

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn clean_removes_arenas_and_executables() {
        let dir = std::env::temp_dir().join(format!("jtk-clean-{}.pbm", Uuid::new_v4()));
        std::fs::create_dir_all(dir.join("jtk-work").join("abc")).expect("create arena");
        std::fs::write(dir.join("solution.cc.exe"), "").expect("write exe");
        std::fs::write(dir.join("solution.cc"), "").expect("write source");

        assert_eq!(clean(&dir, "jtk").expect("clean"), 2);
        assert!(!dir.join("jtk-work").exists());
        assert!(dir.join("solution.cc").exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
