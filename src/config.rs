#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use bon::Builder;
use serde::{Deserialize, Serialize};

/// Default prefix for scratch directories and generated scratch files.
pub const DEFAULT_PREFIX: &str = "jtk";
/// Default problem identifier used in statement headers.
pub const DEFAULT_PROBLEM_NM: &str = "DRAFT";
/// Testcases whose name starts with this are samples shown in statements.
pub const SAMPLE_PREFIX: &str = "sample";

/// Author-level settings persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Author name.
    pub name:      String,
    /// Author contact email.
    pub email:     String,
    /// Keeps scratch arenas on disk for inspection.
    pub developer: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name:      "John Doe".into(),
            email:     "john.doe@example.com".into(),
            developer: false,
        }
    }
}

impl Settings {
    /// Default location of the settings file: `$JTK_SETTINGS`, else
    /// `$XDG_CONFIG_HOME/jtk/settings.yml`, else `~/.config/jtk/settings.yml`.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("JTK_SETTINGS")
            && !path.trim().is_empty()
        {
            return Some(PathBuf::from(path.trim()));
        }
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
        Some(base.join("jtk").join("settings.yml"))
    }

    /// Loads settings from `path`, falling back to defaults when the file is
    /// missing or malformed.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match std::fs::read_to_string(path) {
            Ok(text) => match serde_yaml::from_str(&text) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!("Ignoring malformed settings in {}: {e}", path.display());
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Value of `key` as text.
    pub fn get(&self, key: &str) -> Result<String> {
        match key {
            "name" => Ok(self.name.clone()),
            "email" => Ok(self.email.clone()),
            "developer" => Ok(self.developer.to_string()),
            other => bail!("Configuration key {other} does not exist"),
        }
    }

    /// Sets `key` from its textual `value`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "name" => self.name = value.to_string(),
            "email" => self.email = value.to_string(),
            "developer" => {
                self.developer = value
                    .parse()
                    .with_context(|| format!("developer must be true or false, not `{value}`"))?
            }
            other => bail!("Configuration key {other} does not exist"),
        }
        Ok(())
    }

    /// Writes the settings as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create {}", parent.display()))?;
        }
        let text = serde_yaml::to_string(self).context("Could not serialize settings")?;
        std::fs::write(path, text).with_context(|| format!("Could not write {}", path.display()))
    }
}

/// Everything the build pipeline needs to know that is not part of the
/// problem directory itself. Built once and handed to `Maker` and `Watcher`.
#[derive(Debug, Clone, Builder)]
pub struct ToolkitConfig {
    /// Prefix of the scratch arena and scratch file names.
    #[builder(into, default = DEFAULT_PREFIX.to_string())]
    prefix:             String,
    /// Problem identifier printed in statement headers.
    #[builder(into, default = DEFAULT_PROBLEM_NM.to_string())]
    problem_nm:         String,
    /// Upper bound on every compile or `make` step.
    #[builder(default = Duration::from_secs(120))]
    compile_timeout:    Duration,
    /// Upper bound on a single testcase run; unbounded when absent.
    execution_timeout:  Option<Duration>,
    /// Quiet period before a statement rebuild fires in watch mode.
    #[builder(default = Duration::from_millis(300))]
    statement_debounce: Duration,
    /// Leave the scratch arena on disk after the build.
    #[builder(default)]
    keep_scratch:       bool,
    /// Directory holding `sty/` and `lua/` statement assets.
    #[builder(into)]
    assets_dir:         Option<PathBuf>,
    /// Author settings.
    #[builder(default)]
    settings:           Settings,
}

impl Default for ToolkitConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ToolkitConfig {
    /// Reads the configuration from the environment (after `.env` has been
    /// loaded by the caller). Unparseable values fall back to defaults.
    pub fn from_env() -> Self {
        let prefix = read_string("JTK_PREFIX").unwrap_or_else(|| DEFAULT_PREFIX.to_string());
        let problem_nm =
            read_string("JTK_PROBLEM_NM").unwrap_or_else(|| DEFAULT_PROBLEM_NM.to_string());
        let settings = Settings::load_or_default(Settings::default_path().as_deref());

        Self::builder()
            .prefix(prefix)
            .problem_nm(problem_nm)
            .compile_timeout(read_timeout_secs("JTK_COMPILE_TIMEOUT_SECS", 120))
            .maybe_execution_timeout(
                read_string("JTK_EXEC_TIMEOUT_SECS")
                    .and_then(|value| value.parse::<u64>().ok())
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs),
            )
            .statement_debounce(
                read_string("JTK_DEBOUNCE_MS")
                    .and_then(|value| value.parse::<u64>().ok())
                    .map(Duration::from_millis)
                    .unwrap_or(Duration::from_millis(300)),
            )
            .keep_scratch(read_flag("JTK_KEEP_SCRATCH") || settings.developer)
            .maybe_assets_dir(read_string("JTK_ASSETS_DIR").map(PathBuf::from))
            .settings(settings)
            .build()
    }

    /// Scratch prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Problem identifier for statements.
    pub fn problem_nm(&self) -> &str {
        &self.problem_nm
    }

    /// Returns a copy with another problem identifier.
    pub fn with_problem_nm(mut self, problem_nm: impl Into<String>) -> Self {
        self.problem_nm = problem_nm.into();
        self
    }

    /// Compile timeout.
    pub fn compile_timeout(&self) -> Duration {
        self.compile_timeout
    }

    /// Per-testcase timeout, if any.
    pub fn execution_timeout(&self) -> Option<Duration> {
        self.execution_timeout
    }

    /// Statement debounce delay.
    pub fn statement_debounce(&self) -> Duration {
        self.statement_debounce
    }

    /// Whether scratch arenas survive the build.
    pub fn keep_scratch(&self) -> bool {
        self.keep_scratch
    }

    /// Statement asset directory, if configured.
    pub fn assets_dir(&self) -> Option<&Path> {
        self.assets_dir.as_deref()
    }

    /// Author settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

/// Reads a non-empty, trimmed environment variable.
fn read_string(env: &str) -> Option<String> {
    std::env::var(env)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Reads a boolean flag (`1`, `true`, `yes`, `on`).
fn read_flag(env: &str) -> bool {
    read_string(env)
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Read a timeout (seconds) from the environment, falling back to the
/// provided default when unset or invalid.
fn read_timeout_secs(env: &str, default_secs: u64) -> Duration {
    std::env::var(env)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default_secs))
}
