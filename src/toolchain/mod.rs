#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Compilers and interpreters behind one two-operation contract:
//! `compile` turns a scratch copy of a solution into an [`Artifact`], and
//! `execute` runs that artifact with one input file piped to stdin.

/// Single-file native compilers (gcc, g++, ghc, rustc).
mod native;
/// Multi-file C++ builds (PRO2, MakePRO2).
mod multifile;
/// Stub toolchain for circuit problems.
mod placeholder;
/// Availability probes and their single-flight cache.
pub mod probe;
/// Static table of every toolchain, keyed by id and by extension.
pub mod registry;
/// Interpreted languages, plain and with injected input.
mod script;
/// JVM languages.
mod vm;

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
pub use probe::{Probe, ProbeCache, ProbeOutcome};
pub use registry::{
    available_ids, defined_ids, extension_for_language, infos, probe_for_extension,
    resolve_by_extension, resolve_by_id, solution_extensions,
};
pub use script::{inject, use_turtle_pil};
use serde::Serialize;

use crate::{
    error::BuildError,
    process::{Collected, Invocation, StdinSource, TimedOut},
};

/// Separator placed between concatenated sources.
pub const MERGE_SEPARATOR: &str = "\n\n\n";

/// How a toolchain turns a source into something runnable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// One compiler call producing `<source>.exe`.
    Native,
    /// Public and private C++ files compiled together with the source.
    Project,
    /// Public, private and solution trees merged, then `make`.
    Make,
    /// Compiled to class files and run on a virtual machine.
    Vm,
    /// Interpreted; compile is a syntax check or nothing.
    Script,
    /// Interpreted with the testcase input merged into the program text.
    Injected,
    /// Writes a stub executable; running it does nothing.
    Placeholder,
}

/// Whether the source is compiled alone or appended to `main.<ext>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileMode {
    /// Compile the solution as is.
    Standalone,
    /// Concatenate the solution with the problem's `main.<ext>` first.
    MergeWithMain,
}

/// How the testcase input is spliced into an injected program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Injector {
    /// Append the input verbatim.
    Python,
    /// Append a `main = do` block printing each line.
    Haskell,
    /// Wrap each non-blank line in `println`.
    Clojure,
}

/// Static description of one toolchain.
#[derive(Debug)]
pub struct ToolchainSpec {
    /// Registry id (`C++`, `RunPython`, ...).
    pub id:        &'static str,
    /// Display name.
    pub name:      &'static str,
    /// Source language.
    pub language:  &'static str,
    /// Compiler or interpreter executable.
    pub tool:      &'static str,
    /// Fixed compiler flags.
    pub flags:     &'static [&'static str],
    /// Source file extension.
    pub extension: &'static str,
    /// Compile/run strategy.
    pub family:    Family,
    /// Availability probe.
    pub probe:     Probe,
    /// Syntax-check command standing in for compilation; empty for none.
    pub check:     &'static [&'static str],
    /// Interpreter command prefix for script families.
    pub runner:    &'static [&'static str],
    /// Input splicing for injected families.
    pub injector:  Option<Injector>,
    /// Source rewrite applied to the scratch copy before compiling.
    pub rewrite:   Option<fn(&str) -> String>,
    /// Caveat shown by `jtk compilers`.
    pub warning:   &'static str,
}

/// What the orchestrator passes to every toolchain call.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    /// Problem directory (read-only inputs such as `main.<ext>`, `public/`).
    pub problem_dir:       &'a Path,
    /// Scratch directory where every output of the toolchain goes.
    pub work_dir:          &'a Path,
    /// Prefix for scratch file names.
    pub prefix:            &'a str,
    /// Bound on compile steps.
    pub compile_timeout:   Duration,
    /// Bound on one execution, if any.
    pub execution_timeout: Option<Duration>,
}

/// Result of a successful compile.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Toolchain that produced it.
    pub toolchain:  Toolchain,
    /// Scratch copy of the source that was compiled.
    pub source:     PathBuf,
    /// The runnable file (`.exe`, `Main.class` or the script itself).
    pub executable: PathBuf,
}

/// Serializable summary of a toolchain, as shown by `jtk compilers`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolchainInfo {
    /// Registry id.
    pub id:        String,
    /// Display name.
    pub name:      String,
    /// Source language.
    pub language:  String,
    /// Probe version line, or `not found`.
    pub version:   String,
    /// Whether the probe succeeded.
    pub available: bool,
    /// Compiler flags joined by spaces.
    pub flags:     String,
    /// Source extension.
    pub extension: String,
    /// Compile/run strategy.
    pub family:    Family,
    /// Caveat, if any.
    pub warning:   String,
}

/// Handle to one registered toolchain.
#[derive(Debug, Clone, Copy)]
pub struct Toolchain(&'static ToolchainSpec);

impl PartialEq for Toolchain {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Toolchain {}

impl Toolchain {
    /// Wraps a static spec.
    pub(crate) const fn new(spec: &'static ToolchainSpec) -> Self {
        Self(spec)
    }

    /// Static description.
    pub fn spec(&self) -> &'static ToolchainSpec {
        self.0
    }

    /// Registry id.
    pub fn id(&self) -> &'static str {
        self.0.id
    }

    /// Display name.
    pub fn name(&self) -> &'static str {
        self.0.name
    }

    /// Source extension.
    pub fn extension(&self) -> &'static str {
        self.0.extension
    }

    /// Compile/run strategy.
    pub fn family(&self) -> Family {
        self.0.family
    }

    /// Availability probe.
    pub fn probe(&self) -> Probe {
        self.0.probe
    }

    /// Summary including the probed version.
    pub async fn info(&self, cache: &ProbeCache) -> ToolchainInfo {
        let outcome = cache.check(self.0.probe).await;
        ToolchainInfo {
            id:        self.0.id.to_string(),
            name:      self.0.name.to_string(),
            language:  self.0.language.to_string(),
            version:   outcome.version.clone(),
            available: outcome.available,
            flags:     self.0.flags.join(" "),
            extension: self.0.extension.to_string(),
            family:    self.0.family,
            warning:   self.0.warning.to_string(),
        }
    }

    /// Compiles `source`, a file inside `ctx.work_dir`.
    ///
    /// The scratch copy may be rewritten in place: merged with `main`, or
    /// for standalone compiles given the toolchain's source rewrite. Fails
    /// with [`BuildError::CompileFailed`] when the expected artifact does not
    /// exist afterwards.
    pub async fn compile(
        &self,
        ctx: &BuildContext<'_>,
        source: &Path,
        mode: CompileMode,
    ) -> Result<Artifact> {
        if mode == CompileMode::Standalone
            && let Some(rewrite) = self.0.rewrite
        {
            let text = read_text(source).await?;
            tracing::info!("tweak {} for {}", display_name(source), self.0.name);
            write_text(source, &rewrite(&text)).await?;
        }

        if mode == CompileMode::MergeWithMain {
            self.merge_with_main(ctx, source).await?;
        }

        let executable = match self.0.family {
            Family::Native => native::compile(self, ctx, source).await?,
            Family::Project => multifile::compile_project(self, ctx, source).await?,
            Family::Make => multifile::compile_make(self, ctx, source).await?,
            Family::Vm => vm::compile(self, ctx, source).await?,
            Family::Script | Family::Injected => script::compile(self, ctx, source).await?,
            Family::Placeholder => placeholder::compile(source).await?,
        };

        if !tokio::fs::try_exists(&executable).await.unwrap_or(false) {
            return Err(BuildError::CompileFailed {
                source_file: display_name(source),
                exit_code:   None,
                reason:      format!("`{}` was not produced", display_name(&executable)),
            }
            .into());
        }

        Ok(Artifact {
            toolchain: *self,
            source: source.to_path_buf(),
            executable,
        })
    }

    /// Runs `artifact` with `input` on stdin and writes stdout verbatim to
    /// `output`, which exists afterwards even when the run failed.
    ///
    /// A nonzero exit or a timeout is a [`BuildError::ExecutionFailed`].
    pub async fn execute(
        &self,
        ctx: &BuildContext<'_>,
        artifact: &Artifact,
        input: &Path,
        output: &Path,
    ) -> Result<()> {
        let testcase = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let _ = tokio::fs::remove_file(output).await;
        let result = match self.0.family {
            Family::Native | Family::Project | Family::Make => {
                native::execute(self, ctx, artifact, input, output, &testcase).await
            }
            Family::Vm => vm::execute(self, ctx, artifact, input, output, &testcase).await,
            Family::Script => script::execute(self, ctx, artifact, input, output, &testcase).await,
            Family::Injected => {
                script::execute_injected(self, ctx, artifact, input, output, &testcase).await
            }
            Family::Placeholder => placeholder::execute(output).await,
        };

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            write_text(output, "").await?;
        }
        result
    }

    /// Rewrites the scratch source as the concatenation with `main.<ext>`.
    async fn merge_with_main(&self, ctx: &BuildContext<'_>, source: &Path) -> Result<()> {
        if self.0.family == Family::Injected {
            return Err(BuildError::CompileFailed {
                source_file: display_name(source),
                exit_code:   None,
                reason:      format!("{} cannot be merged with a main file", self.0.name),
            }
            .into());
        }

        let main_name = format!("main.{}", self.0.extension);
        let main_path = ctx.problem_dir.join(&main_name);
        if !tokio::fs::try_exists(&main_path).await.unwrap_or(false) {
            return Err(BuildError::CompileFailed {
                source_file: display_name(source),
                exit_code:   None,
                reason:      format!("{main_name} not found"),
            }
            .into());
        }

        tracing::info!("add {main_name} to {}", display_name(source));
        let main = read_text(&main_path).await?;
        let solution = read_text(source).await?;
        // The Java driver declares the class, so it goes first.
        let merged = if self.0.family == Family::Vm {
            concat(&[&main, &solution])
        } else {
            concat(&[&solution, &main])
        };
        write_text(source, &merged).await
    }
}

/// Joins sources, each followed by the separator.
pub fn concat(parts: &[&str]) -> String {
    parts
        .iter()
        .flat_map(|part| [*part, MERGE_SEPARATOR])
        .collect()
}

/// Runs one compile-side step, logging the command line first.
pub(crate) async fn run_step(invocation: Invocation) -> Result<Collected> {
    tracing::info!("{}", invocation.render());
    let collected = invocation.run().await?;
    forward_stderr(&collected);
    Ok(collected)
}

/// Runs a compile step under the compile timeout. Spawn failures and
/// timeouts become `CompileFailed` for `source`.
pub(crate) async fn compile_step(
    ctx: &BuildContext<'_>,
    program: &str,
    args: Vec<OsString>,
    cwd: &Path,
    source: &Path,
) -> Result<Collected> {
    let invocation = Invocation::builder()
        .program(program)
        .args(args)
        .cwd(cwd)
        .deadline(ctx.compile_timeout)
        .build();
    run_step(invocation).await.map_err(|e| {
        BuildError::CompileFailed {
            source_file: display_name(source),
            exit_code:   None,
            reason:      format!("{e:#}"),
        }
        .into()
    })
}

/// Echoes captured diagnostics of a child to our stderr.
pub(crate) fn forward_stderr(collected: &Collected) {
    if !collected.stderr.is_empty() {
        eprint!("{}", collected.stderr_lossy());
    }
}

/// Runs a program with the contents of `input` on stdin, storing stdout in
/// `output`. Shared by every family that actually executes something.
pub(crate) async fn run_with_input(
    ctx: &BuildContext<'_>,
    program: OsString,
    args: Vec<OsString>,
    input: Option<&Path>,
    output: &Path,
    testcase: &str,
) -> Result<()> {
    let stdin = match input {
        Some(path) => StdinSource::Bytes(
            tokio::fs::read(path)
                .await
                .with_context(|| format!("Could not read {}", path.display()))?,
        ),
        None => StdinSource::Null,
    };

    let invocation = Invocation::builder()
        .program(program)
        .args(args)
        .stdin(stdin)
        .cwd(ctx.work_dir)
        .maybe_deadline(ctx.execution_timeout)
        .build();
    let rendered = invocation.render();
    match input {
        Some(path) => tracing::info!(
            "{rendered} < {} > {}",
            display_name(path),
            display_name(output)
        ),
        None => tracing::info!("{rendered} > {}", display_name(output)),
    }

    let collected = match invocation.run().await {
        Ok(collected) => collected,
        Err(e) => {
            let reason = if e.chain().any(|c| c.downcast_ref::<TimedOut>().is_some()) {
                "time limit exceeded".to_string()
            } else {
                format!("{e:#}")
            };
            return Err(BuildError::ExecutionFailed {
                artifact: rendered,
                testcase: testcase.to_string(),
                exit_code: None,
                reason,
            }
            .into());
        }
    };

    tokio::fs::write(output, &collected.stdout)
        .await
        .with_context(|| format!("Could not write {}", output.display()))?;
    forward_stderr(&collected);

    if !collected.success() {
        return Err(BuildError::ExecutionFailed {
            artifact:  rendered,
            testcase:  testcase.to_string(),
            exit_code: collected.code(),
            reason:    "nonzero exit status".into(),
        }
        .into());
    }
    Ok(())
}

/// Reads a UTF-8 text file with context.
pub(crate) async fn read_text(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Could not read {}", path.display()))
}

/// Writes a text file with context.
pub(crate) async fn write_text(path: &Path, text: &str) -> Result<()> {
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("Could not write {}", path.display()))
}

/// Last path component, for messages.
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Appends `suffix` to the full file name (`a.cc` + `.exe` = `a.cc.exe`).
pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Converts a compile step result into `CompileFailed` when the tool failed.
pub(crate) fn ensure_compiled(collected: &Collected, source: &Path) -> Result<()> {
    if collected.success() {
        Ok(())
    } else {
        Err(BuildError::CompileFailed {
            source_file: display_name(source),
            exit_code:   collected.code(),
            reason:      format!("`{}` reported errors", display_name(source)),
        }
        .into())
    }
}
