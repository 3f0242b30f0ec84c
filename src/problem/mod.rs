#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! A validated snapshot of a problem directory.

/// `handler.yml`.
pub mod handler;
/// `scores.yml`.
pub mod scores;

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
pub use handler::{GameConfig, HandlerConfig, HandlerKind, SourceModifier};
pub use scores::{ScorePart, parse_scores};
use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::{
    error::BuildError,
    toolchain::{extension_for_language, resolve_by_id, solution_extensions},
    util::{file_names_matching, png_dimensions},
};

/// Statement languages, in canonical order, with their names.
pub const LANGUAGES: [(&str, &str); 5] = [
    ("en", "English"),
    ("ca", "Catalan"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
];

/// English name of a language tag.
pub fn language_name(tag: &str) -> Option<&'static str> {
    LANGUAGES
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, name)| *name)
}

/// How languages are laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Structure {
    /// `<name>.pbm/` holds every language.
    Multi,
    /// `<name>.pbm/<lang>/` holds one; siblings hold the others.
    Single,
}

/// A problem directory, loaded and checked once.
#[derive(Debug, Clone, Serialize)]
pub struct Problem {
    /// Absolute directory.
    directory:         PathBuf,
    /// Language layout.
    structure:         Structure,
    /// Language slot of a single-structure directory.
    language:          Option<String>,
    /// Parsed `handler.yml`.
    handler:           HandlerConfig,
    /// Languages with a `problem.<lang>.yml`, sorted.
    languages:         Vec<String>,
    /// Contents of each `problem.<lang>.yml`.
    metadata:          BTreeMap<String, Mapping>,
    /// Language whose metadata names the author.
    original_language: String,
    /// `solution.<ext>` files, sorted.
    solutions:         Vec<String>,
    /// The authoritative solution; absent for game and quiz problems.
    golden_solution:   Option<String>,
    /// Base names of `*.inp` files, sorted.
    testcases:         Vec<String>,
    /// Parsed `scores.yml`, when present.
    scores:            Option<Vec<ScorePart>>,
}

impl Problem {
    /// Loads `directory`, failing with [`BuildError::MissingMetadata`] on the
    /// first missing or invalid required piece.
    pub fn load(directory: &Path) -> Result<Self> {
        let directory = std::fs::canonicalize(directory).map_err(|e| {
            missing(directory, format!("problem directory cannot be opened: {e}"))
        })?;
        tracing::info!("Loading problem from {}", directory.display());

        let structure = if directory
            .file_name()
            .is_some_and(|n| n.to_string_lossy().ends_with(".pbm"))
        {
            Structure::Multi
        } else {
            Structure::Single
        };
        tracing::debug!("structure: {structure:?}");

        let (languages, language) = match structure {
            Structure::Multi => (languages_multi(&directory)?, None),
            Structure::Single => (
                languages_single(&directory),
                directory
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned()),
            ),
        };
        tracing::info!("languages: {}", languages.join(" "));

        let mut metadata = BTreeMap::new();
        for lang in &languages {
            let path = metadata_path(&directory, structure, lang);
            metadata.insert(lang.clone(), read_mapping(&directory, &path)?);
        }

        let handler = load_handler(&directory)?;
        report_problem_yml(&directory);

        let original_language = languages
            .iter()
            .find(|lang| {
                metadata
                    .get(*lang)
                    .is_some_and(|m| m.contains_key(Value::from("author")))
            })
            .cloned()
            .ok_or_else(|| {
                missing(
                    &directory,
                    "No original language found (a language with an author field)",
                )
            })?;
        tracing::info!("original language: {original_language}");

        let mut problem = Self {
            directory,
            structure,
            language,
            handler,
            languages,
            metadata,
            original_language,
            solutions: Vec::new(),
            golden_solution: None,
            testcases: Vec::new(),
            scores: None,
        };

        if !matches!(problem.handler.handler, HandlerKind::Game | HandlerKind::Quiz) {
            problem.refresh_solutions()?;
            problem.golden_solution = Some(problem.resolve_golden()?);
            problem.refresh_testcases()?;
            problem.scores = load_scores(&problem.directory)?;
        }
        report_awards(&problem.directory);

        Ok(problem)
    }

    /// Re-scans `*.inp`.
    pub fn refresh_testcases(&mut self) -> Result<()> {
        self.testcases = file_names_matching(&self.directory, "*.inp")?
            .into_iter()
            .filter_map(|name| name.strip_suffix(".inp").map(str::to_string))
            .collect();
        self.testcases.sort();
        tracing::debug!("testcases: {}", self.testcases.join(" "));
        Ok(())
    }

    /// Re-scans `solution.<ext>` for every known extension.
    pub fn refresh_solutions(&mut self) -> Result<()> {
        let mut solutions = Vec::new();
        for extension in solution_extensions() {
            let name = format!("solution.{extension}");
            if self.directory.join(&name).is_file() {
                solutions.push(name);
            }
        }
        solutions.sort();
        if solutions.is_empty() {
            return Err(missing(&self.directory, "No solutions found"));
        }
        tracing::info!("solutions: {}", solutions.join(" "));
        self.solutions = solutions;
        Ok(())
    }

    /// Decides which solution is authoritative and checks it exists.
    fn resolve_golden(&self) -> Result<String> {
        let handler = &self.handler;
        let name = if handler.handler == HandlerKind::Circuits {
            "solution.v".to_string()
        } else {
            match handler.compilers() {
                Some("RunPython") => "solution.py".to_string(),
                Some("RunHaskell" | "GHC") => "solution.hs".to_string(),
                Some("RunClojure" | "Clojure") => "solution.clj".to_string(),
                overriding => {
                    let language = if matches!(overriding, Some("PRO2" | "MakePRO2")) {
                        "C++"
                    } else {
                        handler.solution.as_str()
                    };
                    let extension = extension_for_language(language).ok_or_else(|| {
                        missing(
                            &self.directory,
                            format!(
                                "Unknown programming language {} for solution",
                                handler.solution
                            ),
                        )
                    })?;
                    format!("solution.{extension}")
                }
            }
        };

        if !self.directory.join(&name).is_file() {
            return Err(missing(
                &self.directory,
                format!("Golden solution file {name} not found"),
            ));
        }
        tracing::info!("golden solution: {name}");
        Ok(name)
    }

    /// Absolute problem directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Language layout.
    pub fn structure(&self) -> Structure {
        self.structure
    }

    /// Language slot of a single-structure directory.
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Parsed `handler.yml`.
    pub fn handler(&self) -> &HandlerConfig {
        &self.handler
    }

    /// Languages present.
    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    /// Languages whose statements this directory builds: all of them for a
    /// multi structure, only its own slot otherwise.
    pub fn statement_languages(&self) -> Vec<&str> {
        self.languages
            .iter()
            .map(String::as_str)
            .filter(|lang| match self.structure {
                Structure::Multi => true,
                Structure::Single => self.language.as_deref() == Some(*lang),
            })
            .collect()
    }

    /// Metadata of one language.
    pub fn metadata(&self, language: &str) -> Option<&Mapping> {
        self.metadata.get(language)
    }

    /// A string field of one language's metadata.
    pub fn metadata_field(&self, language: &str, field: &str) -> Option<&str> {
        self.metadata
            .get(language)?
            .get(Value::from(field))?
            .as_str()
    }

    /// Language whose metadata names the author.
    pub fn original_language(&self) -> &str {
        &self.original_language
    }

    /// Solution file names.
    pub fn solutions(&self) -> &[String] {
        &self.solutions
    }

    /// Authoritative solution.
    pub fn golden_solution(&self) -> Option<&str> {
        self.golden_solution.as_deref()
    }

    /// Solutions other than the golden one.
    pub fn alternative_solutions(&self) -> Vec<&str> {
        self.solutions
            .iter()
            .map(String::as_str)
            .filter(|s| Some(*s) != self.golden_solution())
            .collect()
    }

    /// Testcase base names.
    pub fn testcases(&self) -> &[String] {
        &self.testcases
    }

    /// Parsed scores, when the problem has them.
    pub fn scores(&self) -> Option<&[ScorePart]> {
        self.scores.as_deref()
    }

    /// Prints the problem as JSON.
    pub fn info(&self) -> Result<()> {
        println!(
            "{}",
            serde_json::to_string_pretty(self).context("Could not serialize problem")?
        );
        Ok(())
    }
}

/// Builds a `MissingMetadata` error.
fn missing(directory: &Path, reason: impl Into<String>) -> anyhow::Error {
    BuildError::MissingMetadata {
        directory: directory.to_path_buf(),
        reason:    reason.into(),
    }
    .into()
}

/// Where `problem.<lang>.yml` of `lang` lives.
fn metadata_path(directory: &Path, structure: Structure, lang: &str) -> PathBuf {
    let name = format!("problem.{lang}.yml");
    match structure {
        Structure::Multi => directory.join(name),
        Structure::Single => directory.join("..").join(lang).join(name),
    }
}

/// Languages with a metadata file in a multi directory.
fn languages_multi(directory: &Path) -> Result<Vec<String>> {
    let mut languages: Vec<String> = file_names_matching(directory, "problem.*.yml")?
        .into_iter()
        .filter_map(|name| {
            name.strip_prefix("problem.")
                .and_then(|rest| rest.strip_suffix(".yml"))
                .map(str::to_string)
        })
        .filter(|lang| language_name(lang).is_some())
        .collect();
    languages.sort();
    Ok(languages)
}

/// Languages with a metadata file in a sibling directory.
fn languages_single(directory: &Path) -> Vec<String> {
    let mut languages: Vec<String> = LANGUAGES
        .iter()
        .map(|(tag, _)| *tag)
        .filter(|tag| metadata_path(directory, Structure::Single, tag).is_file())
        .map(str::to_string)
        .collect();
    languages.sort();
    languages
}

/// Reads a YAML file as a mapping; an empty file is an empty mapping.
fn read_mapping(directory: &Path, path: &Path) -> Result<Mapping> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    match serde_yaml::from_str::<Value>(&text) {
        Ok(Value::Mapping(mapping)) => Ok(mapping),
        Ok(Value::Null) => Ok(Mapping::new()),
        Ok(_) => Err(missing(
            directory,
            format!("{} is not a mapping", path.display()),
        )),
        Err(e) => Err(missing(
            directory,
            format!("{} is not valid YAML: {e}", path.display()),
        )),
    }
}

/// Reads, validates and normalises `handler.yml`.
fn load_handler(directory: &Path) -> Result<HandlerConfig> {
    let path = directory.join("handler.yml");
    let text = std::fs::read_to_string(&path)
        .map_err(|_| missing(directory, "handler.yml not found"))?;
    let handler = HandlerConfig::from_yaml(&text)
        .map_err(|e| missing(directory, format!("handler.yml is invalid: {e}")))?
        .normalize();
    if let Some(id) = handler.compilers() {
        resolve_by_id(id).map_err(|_| {
            missing(
                directory,
                format!("handler.yml names an unknown compiler `{id}`"),
            )
        })?;
    }
    tracing::debug!("handler: {handler:?}");
    Ok(handler)
}

/// Reports `problem.yml`, which is optional.
fn report_problem_yml(directory: &Path) {
    if directory.join("problem.yml").is_file() {
        tracing::info!("problem.yml found");
    } else {
        tracing::info!("problem.yml not defined");
    }
}

/// Parses `scores.yml` when present.
fn load_scores(directory: &Path) -> Result<Option<Vec<ScorePart>>> {
    let path = directory.join("scores.yml");
    if !path.is_file() {
        tracing::info!("scores.yml not defined");
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    let scores = parse_scores(&text)
        .map_err(|e| missing(directory, format!("scores.yml is invalid: {e:#}")))?;
    tracing::info!("scores.yml: {} parts", scores.len());
    Ok(Some(scores))
}

/// Reports `award.html` and `award.png`, which are optional.
fn report_awards(directory: &Path) {
    if directory.join("award.html").is_file() {
        tracing::info!("award.html found");
    } else {
        tracing::warn!("award.html not found");
    }

    let png = directory.join("award.png");
    if png.is_file() {
        match png_dimensions(&png) {
            Ok((width, height)) => tracing::info!("award.png found ({width}x{height})"),
            Err(e) => tracing::warn!("award.png found but unreadable: {e:#}"),
        }
    } else {
        tracing::warn!("award.png not found");
    }
}
