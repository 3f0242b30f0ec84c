//! # jtk
//!
//! A build tool for online-judge problems: compiles the golden solution,
//! computes the correct outputs, verifies alternative solutions and
//! typesets the statements of a problem directory.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Toolkit configuration and author settings
pub mod config;
/// Errors the build pipeline reports
pub mod error;
/// The build orchestrator
pub mod maker;
/// Problem directories
pub mod problem;
/// Subprocess execution
pub mod process;
/// Per-build scratch directories
pub mod scratch;
/// Compilers, interpreters and their availability
pub mod toolchain;
/// Utility functions for convenience
pub mod util;
/// Watch mode
pub mod watch;

use std::{path::Path, str::FromStr, sync::Arc};

use anyhow::{Context, Result, bail};
use config::{Settings, ToolkitConfig};
use maker::{Length, Maker, TextFormat};
use owo_colors::OwoColorize;
use problem::Problem;
use tabled::{Table, Tabled, settings::Style};
use toolchain::{ProbeCache, available_ids, defined_ids, infos};

/// A step of `jtk make`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Everything the problem kind calls for.
    All,
    /// Validate and describe the directory.
    Info,
    /// Compile every solution.
    Exe,
    /// Compute the correct outputs.
    Cor,
    /// PDF statements.
    Pdf,
    /// Plain text statements.
    Txt,
    /// Markdown statements.
    Md,
    /// HTML statements.
    Html,
}

impl FromStr for Task {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "all" => Ok(Task::All),
            "info" => Ok(Task::Info),
            "exe" => Ok(Task::Exe),
            "cor" => Ok(Task::Cor),
            "pdf" => Ok(Task::Pdf),
            "txt" => Ok(Task::Txt),
            "md" => Ok(Task::Md),
            "html" => Ok(Task::Html),
            other => Err(format!(
                "unknown task `{other}` (expected all, info, exe, cor, pdf, txt, md or html)"
            )),
        }
    }
}

/// Textual formats requested among `tasks`.
fn text_formats(tasks: &[Task]) -> Vec<TextFormat> {
    tasks
        .iter()
        .filter_map(|task| match task {
            Task::Txt => Some(TextFormat::Txt),
            Task::Md => Some(TextFormat::Md),
            Task::Html => Some(TextFormat::Html),
            _ => None,
        })
        .collect()
}

/// Loads `directory` and runs `tasks` on it.
pub async fn make(
    directory: &Path,
    tasks: &[Task],
    config: &ToolkitConfig,
    probes: Arc<ProbeCache>,
) -> Result<()> {
    if tasks.contains(&Task::All) && tasks.len() > 1 {
        bail!("the `all` task cannot be combined with others");
    }

    let problem = Problem::load(directory)?;
    let mut maker = Maker::new(problem, config.clone(), probes)?;

    if tasks.is_empty() || tasks.contains(&Task::All) {
        maker.show_directory()?;
        return maker.build_all().await;
    }

    if tasks.contains(&Task::Info) {
        maker.show_directory()?;
        maker.problem().info()?;
    }
    if tasks.contains(&Task::Exe) {
        maker.compile_all().await?;
    }
    if tasks.contains(&Task::Cor) {
        maker.compile_golden().await?;
        maker.compute_golden_outputs().await?;
    }
    if tasks.contains(&Task::Pdf) {
        maker.regenerate_pdf_statements().await?;
    }
    let formats = text_formats(tasks);
    if !formats.is_empty() {
        maker
            .regenerate_textual_statements(&formats, Length::Full)
            .await?;
        maker
            .regenerate_textual_statements(&formats, Length::Short)
            .await?;
    }
    Ok(())
}

/// Builds `directory` once, then rebuilds on every change until Ctrl-C.
pub async fn watch(directory: &Path, config: &ToolkitConfig, probes: Arc<ProbeCache>) -> Result<()> {
    let problem = Problem::load(directory)?;
    let maker = Maker::new(problem, config.clone(), probes)?;
    maker.show_directory()?;
    watch::Watcher::new(maker).run().await
}

/// Row of the `doctor` table.
#[derive(Tabled)]
struct DoctorRow {
    #[tabled(rename = "Tool")]
    /// Tool name.
    tool:    String,
    #[tabled(rename = "Status")]
    /// Found or missing.
    status:  String,
    #[tabled(rename = "Version")]
    /// Version line.
    version: String,
}

/// Probes every external tool and prints what was found.
pub async fn doctor(probes: &ProbeCache) -> Result<()> {
    let rows = probes
        .check_all()
        .await
        .into_iter()
        .map(|(probe, outcome)| DoctorRow {
            tool:    probe.label().to_string(),
            status:  if outcome.available {
                format!("{}", "found".green())
            } else {
                format!("{}", "missing".red())
            },
            version: outcome.version,
        });
    println!("{}", Table::new(rows).with(Style::modern()));

    let available = available_ids(probes).await;
    let total = defined_ids().len();
    println!("{} of {total} compilers available: {}", available.len(), available.join(" "));
    Ok(())
}

/// Prints the author settings as YAML, preceded by the file they live in.
pub fn show_settings(config: &ToolkitConfig) -> Result<()> {
    if let Some(path) = Settings::default_path() {
        println!("# {}", path.display());
    }
    let text = serde_yaml::to_string(config.settings()).context("Could not serialize settings")?;
    print!("{text}");
    Ok(())
}

/// Updates one settings key and saves the settings file.
pub fn set_setting(config: &ToolkitConfig, key: &str, value: &str) -> Result<()> {
    let path = Settings::default_path()
        .context("Could not locate the settings file, set JTK_SETTINGS")?;
    let mut settings = config.settings().clone();
    settings.set(key, value)?;
    settings.save(&path)?;
    tracing::info!("Configuration key {key} updated in {}", path.display());
    Ok(())
}

/// Row of the `compilers` table.
#[derive(Tabled)]
struct CompilerRow {
    #[tabled(rename = "Id")]
    /// Registry id.
    id:        String,
    #[tabled(rename = "Language")]
    /// Source language.
    language:  String,
    #[tabled(rename = "Extension")]
    /// Source extension.
    extension: String,
    #[tabled(rename = "Flags")]
    /// Compiler flags.
    flags:     String,
    #[tabled(rename = "Version")]
    /// Probed version, colored by availability.
    version:   String,
    #[tabled(rename = "Notes")]
    /// Caveats.
    warning:   String,
}

/// Lists every registered toolchain with its availability.
pub async fn compilers(probes: &ProbeCache) -> Result<()> {
    let rows = infos(probes).await.into_iter().map(|info| CompilerRow {
        id:        info.id,
        language:  info.language,
        extension: info.extension,
        flags:     info.flags,
        version:   if info.available {
            format!("{}", info.version.green())
        } else {
            format!("{}", info.version.red())
        },
        warning:   info.warning,
    });
    println!("{}", Table::new(rows).with(Style::modern()));
    Ok(())
}
