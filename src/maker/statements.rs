#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Statement typesetting. Each language is staged in its own scratch
//! directory, a root document is rendered around `problem.<lang>.tex`, and
//! `xelatex` or `pandoc` runs there. Only the final file is copied back.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use anyhow::{Context, Result};
use chrono::{Datelike, SecondsFormat, Utc};
use regex::{Captures, Regex};

use super::{Maker, run_external};
use crate::{
    config::SAMPLE_PREFIX,
    problem::{HandlerKind, language_name},
    toolchain::Probe,
    util::{copy_file, png_dimensions},
};

/// Root document for PDF statements.
const ROOT_PDF: &str = include_str!("templates/root-pdf.tex");
/// Root document for full textual statements.
const ROOT_TEXT_FULL: &str = include_str!("templates/root-text-full.tex");
/// Root document for short textual statements.
const ROOT_TEXT_SHORT: &str = include_str!("templates/root-text-short.tex");
/// Pandoc filter used for markdown output.
const FIX_CODE_BLOCKS: &str = include_str!("templates/fixCodeBlocks.lua");

/// `{{name}}` placeholders.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{(\w+)\}\}").expect("placeholder pattern is valid")
});
/// Whole `htmlonly` environments.
static HTML_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\\begin\{htmlonly\}.*?\\end\{htmlonly\}").expect("htmlonly pattern is valid")
});
/// Whole `latexonly` environments.
static LATEX_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\\begin\{latexonly\}.*?\\end\{latexonly\}")
        .expect("latexonly pattern is valid")
});

/// Output format of a textual statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    /// Plain text.
    Txt,
    /// Markdown.
    Md,
    /// Standalone HTML.
    Html,
}

impl TextFormat {
    /// Every format, in the order they are produced.
    pub const ALL: [TextFormat; 3] = [TextFormat::Txt, TextFormat::Md, TextFormat::Html];

    /// File extension.
    pub fn extension(&self) -> &'static str {
        match self {
            TextFormat::Txt => "txt",
            TextFormat::Md => "md",
            TextFormat::Html => "html",
        }
    }

    /// Pandoc arguments converting `root.tex` into `root.<ext>`.
    pub fn pandoc_args(&self) -> Vec<&'static str> {
        let mut args = vec!["--quiet", "root.tex"];
        match self {
            TextFormat::Txt => args.extend(["--to", "plain", "--output", "root.txt"]),
            TextFormat::Md => args.extend([
                "--to",
                "markdown-header_attributes",
                "--lua-filter=fixCodeBlocks.lua",
                "--output",
                "root.md",
            ]),
            TextFormat::Html => args.extend([
                "--to",
                "html",
                "--mathml",
                "--embed-resources",
                "--output",
                "root.html",
            ]),
        }
        args
    }
}

/// Full statements or the short version without credits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    /// `problem.<lang>.<ext>`.
    Full,
    /// `problem.<lang>.short.<ext>`.
    Short,
}

impl Length {
    /// Base name of the generated files for `language`.
    pub fn file_stem(&self, language: &str) -> String {
        match self {
            Length::Full => format!("problem.{language}"),
            Length::Short => format!("problem.{language}.short"),
        }
    }

    /// Root document template.
    fn template(&self) -> &'static str {
        match self {
            Length::Full => ROOT_TEXT_FULL,
            Length::Short => ROOT_TEXT_SHORT,
        }
    }

    /// Label for messages and staging directories.
    fn label(&self) -> &'static str {
        match self {
            Length::Full => "full",
            Length::Short => "short",
        }
    }
}

/// Replaces every `{{name}}` with its value; unknown names become empty.
pub fn render_template(template: &str, vars: &BTreeMap<&str, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            vars.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Prepares a statement for LaTeX.
pub fn tweak_tex_for_pdf(tex: &str) -> String {
    HTML_ONLY
        .replace_all(tex, "")
        .replace(r"\begin{latexonly}", "")
        .replace(r"\end{latexonly}", "")
        .replace(".eps}", "}")
}

/// Prepares a statement for pandoc.
pub fn tweak_tex_for_text(tex: &str) -> String {
    LATEX_ONLY
        .replace_all(tex, "")
        .replace(r"\begin{htmlonly}", "")
        .replace(r"\end{htmlonly}", "")
        .replace(r"\begin{minipage}", "")
        .replace(r"\end{minipage}", "")
}

/// Sample macros in one- and two-column layouts for `testcases`.
///
/// `size` yields the optional size annotation of a sample.
pub fn sample_macros(
    testcases: &[String],
    mut size: impl FnMut(&str) -> String,
) -> (String, String) {
    let mut one_column = Vec::new();
    let mut two_columns = Vec::new();
    for (index, testcase) in testcases
        .iter()
        .filter(|t| t.starts_with(SAMPLE_PREFIX))
        .enumerate()
    {
        let size = size(testcase);
        let index = index + 1;
        one_column.push(format!(
            "\n\\SampleOneColInputOutput[{size}]{{{testcase}}}{{{index}}}\n"
        ));
        two_columns.push(format!(
            "\n\\SampleTwoColInputOutput[{size}]{{{testcase}}}{{{index}}}\n"
        ));
    }
    (one_column.join("\n"), two_columns.join("\n"))
}

/// True for top-level entries that are not copied into a staging directory.
fn skipped_when_staging(name: &str, prefix: &str, is_dir: bool) -> bool {
    is_dir
        || name.starts_with(prefix)
        || [".exe", ".html", ".md", ".txt"]
            .iter()
            .any(|ext| name.ends_with(ext))
}

impl Maker {
    /// Typesets `problem.<lang>.pdf` for every statement language.
    ///
    /// Problems with one language are logged; the others still run.
    pub async fn regenerate_pdf_statements(&self) -> Result<()> {
        for language in self.problem.statement_languages() {
            let name = language_name(language).unwrap_or(language);
            tracing::info!("Making PDF statement for {name}");
            if let Err(e) = self.make_pdf_statement(language).await {
                tracing::error!("PDF statement for {name} failed: {e:#}");
            }
        }
        Ok(())
    }

    /// Converts statements to `formats` for every statement language.
    pub async fn regenerate_textual_statements(
        &self,
        formats: &[TextFormat],
        length: Length,
    ) -> Result<()> {
        for language in self.problem.statement_languages() {
            let name = language_name(language).unwrap_or(language);
            tracing::info!("Making {} textual statements for {name}", length.label());
            if let Err(e) = self.make_textual_statement(language, formats, length).await {
                tracing::error!("Textual statements for {name} failed: {e:#}");
            }
        }
        Ok(())
    }

    /// One PDF statement.
    async fn make_pdf_statement(&self, language: &str) -> Result<()> {
        let stage = self.scratch.fresh_dir(&format!("pdf-{language}"))?;
        self.stage_problem_files(&stage).await?;

        let original = stage.join(format!("original.{language}.pdf"));
        if original.is_file() {
            tracing::warn!("Found original.{language}.pdf");
            let target = self.problem.directory().join(format!("problem.{language}.pdf"));
            return copy_file(&original, &target).await;
        }

        let (samples1c, samples2c) = self.samples(&stage).await?;
        let original_language = self.problem.original_language();
        let mut vars = self.statement_vars(language, original_language);
        vars.insert("samples1c", samples1c);
        vars.insert("samples2c", samples2c);
        write(&stage.join("root.tex"), &render_template(ROOT_PDF, &vars)).await?;

        let tex = stage.join(format!("problem.{language}.tex"));
        let text = tokio::fs::read_to_string(&tex)
            .await
            .with_context(|| format!("Could not read problem.{language}.tex"))?;
        write(&tex, &tweak_tex_for_pdf(&text)).await?;

        self.copy_style_files(&stage, language).await;

        if !self.probes.is_available(Probe::XeLatex).await {
            tracing::warn!("xelatex not found, skipping problem.{language}.pdf");
            return Ok(());
        }

        match run_external(
            "xelatex",
            &["-interaction=nonstopmode", "-file-line-error", "root.tex"],
            &stage,
            &self.config,
        )
        .await
        {
            Ok(()) => {
                let target = self.problem.directory().join(format!("problem.{language}.pdf"));
                copy_file(&stage.join("root.pdf"), &target).await?;
                tracing::info!("Generated {}", target.display());
            }
            Err(e) => {
                tracing::error!(
                    "Error in LaTeX: {e:#}, see {}",
                    stage.join("root.log").display()
                );
            }
        }
        Ok(())
    }

    /// One language's textual statements.
    async fn make_textual_statement(
        &self,
        language: &str,
        formats: &[TextFormat],
        length: Length,
    ) -> Result<()> {
        let stage = self
            .scratch
            .fresh_dir(&format!("{}-{language}", length.label()))?;
        self.stage_problem_files(&stage).await?;

        if stage.join(format!("original.{language}.pdf")).is_file() {
            tracing::warn!("Found original.{language}.pdf, no textual statements");
            return Ok(());
        }

        let vars = self.statement_vars(language, language);
        write(
            &stage.join("root.tex"),
            &render_template(length.template(), &vars),
        )
        .await?;

        let tex = stage.join(format!("problem.{language}.tex"));
        let text = tokio::fs::read_to_string(&tex)
            .await
            .with_context(|| format!("Could not read problem.{language}.tex"))?;
        write(&tex, &tweak_tex_for_text(&text)).await?;

        self.copy_style_files(&stage, language).await;

        if !self.probes.is_available(Probe::Pandoc).await {
            tracing::warn!("pandoc with lua support not found, skipping textual statements");
            return Ok(());
        }
        self.write_lua_filter(&stage).await?;

        let stem = length.file_stem(language);
        for format in formats {
            let extension = format.extension();
            match run_external("pandoc", &format.pandoc_args(), &stage, &self.config).await {
                Ok(()) => {
                    let target = self.problem.directory().join(format!("{stem}.{extension}"));
                    copy_file(&stage.join(format!("root.{extension}")), &target).await?;
                    tracing::info!("Generated {}", target.display());
                }
                Err(e) => tracing::error!("pandoc error: {e:#}"),
            }
        }
        Ok(())
    }

    /// Values for the root templates. The author comes from
    /// `author_language`, the translator from `language`.
    fn statement_vars(&self, language: &str, author_language: &str) -> BTreeMap<&'static str, String> {
        let now = Utc::now();
        let author = self
            .problem
            .metadata_field(author_language, "author")
            .unwrap_or("Unknown");
        let translator = self
            .problem
            .metadata_field(language, "translator")
            .unwrap_or_default();

        BTreeMap::from([
            ("language", language.to_string()),
            ("jutgeLanguage", format!("jutge.{language}")),
            ("id", format!("{}\\_{language}", self.config.problem_nm())),
            ("author", author.to_string()),
            ("translator", translator.to_string()),
            ("date", now.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ("year", now.year().to_string()),
        ])
    }

    /// Sample macros; graphic samples get their `.cor` image staged and
    /// sized.
    async fn samples(&self, stage: &Path) -> Result<(String, String)> {
        let graphic = self.problem.handler().handler == HandlerKind::Graphic;
        let mut sizes = BTreeMap::new();
        if graphic {
            for testcase in self.problem.testcases() {
                if !testcase.starts_with(SAMPLE_PREFIX) {
                    continue;
                }
                let image = stage.join(format!("{testcase}.cor.png"));
                copy_file(
                    &self.problem.directory().join(format!("{testcase}.cor")),
                    &image,
                )
                .await?;
                let (width, height) = png_dimensions(&image)?;
                sizes.insert(testcase.clone(), format!("({width}$\\times${height})"));
            }
        }
        Ok(sample_macros(self.problem.testcases(), |testcase| {
            sizes.get(testcase).cloned().unwrap_or_default()
        }))
    }

    /// Copies the top-level problem files into `stage`.
    async fn stage_problem_files(&self, stage: &Path) -> Result<()> {
        let directory = self.problem.directory();
        let mut entries = tokio::fs::read_dir(directory)
            .await
            .with_context(|| format!("Could not list {}", directory.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().await?.is_dir();
            if skipped_when_staging(&name, self.config.prefix(), is_dir) {
                continue;
            }
            copy_file(&entry.path(), &stage.join(&name)).await?;
        }
        Ok(())
    }

    /// Copies `picins.sty`, `jutge.sty` and `jutge.<lang>.sty` from the
    /// assets directory, warning about anything missing.
    async fn copy_style_files(&self, stage: &Path, language: &str) {
        let Some(assets) = self.config.assets_dir() else {
            tracing::warn!("No statement assets directory configured (JTK_ASSETS_DIR)");
            return;
        };
        let names = [
            "picins.sty".to_string(),
            "jutge.sty".to_string(),
            format!("jutge.{language}.sty"),
        ];
        for name in names {
            let source: PathBuf = assets.join("sty").join(&name);
            if let Err(e) = copy_file(&source, &stage.join(&name)).await {
                tracing::warn!("{e:#}");
            }
        }
    }

    /// Writes `fixCodeBlocks.lua`, preferring a copy in the assets directory.
    async fn write_lua_filter(&self, stage: &Path) -> Result<()> {
        let target = stage.join("fixCodeBlocks.lua");
        if let Some(assets) = self.config.assets_dir() {
            let custom = assets.join("lua").join("fixCodeBlocks.lua");
            if custom.is_file() {
                return copy_file(&custom, &target).await;
            }
        }
        write(&target, FIX_CODE_BLOCKS).await
    }
}

/// Writes a text file with context.
async fn write(path: &Path, text: &str) -> Result<()> {
    tokio::fs::write(path, text)
        .await
        .with_context(|| format!("Could not write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_inside_latex_braces_are_filled() {
        let vars = BTreeMap::from([
            ("jutgeLanguage", "jutge.en".to_string()),
            ("language", "en".to_string()),
        ]);
        let root = render_template(
            "\\usepackage{{{jutgeLanguage}}}\n\\input{problem.{{language}}.tex}\n{{missing}}",
            &vars,
        );
        assert_eq!(root, "\\usepackage{jutge.en}\n\\input{problem.en.tex}\n");
    }

    #[test]
    fn pdf_tweak_drops_html_only_blocks() {
        let tex = "a\\begin{htmlonly}web\\end{htmlonly}b\\begin{latexonly}pdf\\end{latexonly}\\includegraphics{x.eps}";
        assert_eq!(tweak_tex_for_pdf(tex), "abpdf\\includegraphics{x}");
    }

    #[test]
    fn text_tweak_drops_latex_only_blocks() {
        let tex = "a\\begin{latexonly}\npdf\n\\end{latexonly}b\\begin{htmlonly}web\\end{htmlonly}\\begin{minipage}m\\end{minipage}";
        assert_eq!(tweak_tex_for_text(tex), "abwebm");
    }

    #[test]
    fn only_sample_testcases_become_macros() {
        let testcases = ["hard-1", "sample-1", "sample-2"].map(String::from);
        let (one, two) = sample_macros(&testcases, |_| String::new());
        assert_eq!(
            one,
            "\n\\SampleOneColInputOutput[]{sample-1}{1}\n\n\n\\SampleOneColInputOutput[]{sample-2}{2}\n"
        );
        assert!(two.contains("\\SampleTwoColInputOutput[]{sample-2}{2}"));
        assert!(!one.contains("hard-1"));
    }

    #[test]
    fn graphic_sizes_are_annotated() {
        let testcases = ["sample".to_string()];
        let (one, _) = sample_macros(&testcases, |_| "(20$\\times$10)".into());
        assert!(one.contains("[(20$\\times$10)]{sample}{1}"));
    }

    #[test]
    fn staging_skips_generated_and_scratch_entries() {
        assert!(skipped_when_staging("jtk-work", "jtk", true));
        assert!(skipped_when_staging("jtk-solution.cc", "jtk", false));
        assert!(skipped_when_staging("solution.cc.exe", "jtk", false));
        assert!(skipped_when_staging("problem.en.md", "jtk", false));
        assert!(skipped_when_staging("public", "jtk", true));
        assert!(!skipped_when_staging("problem.en.tex", "jtk", false));
        assert!(!skipped_when_staging("sample.inp", "jtk", false));
    }

    #[test]
    fn short_statements_have_their_own_names() {
        assert_eq!(Length::Full.file_stem("ca"), "problem.ca");
        assert_eq!(Length::Short.file_stem("ca"), "problem.ca.short");
        assert_eq!(TextFormat::Md.pandoc_args()[3], "markdown-header_attributes");
    }
}
