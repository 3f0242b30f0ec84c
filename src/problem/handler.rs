#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use serde::{Deserialize, Serialize};

/// Kind of problem, which decides what a build does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerKind {
    /// Text in, text out.
    #[default]
    Std,
    /// The program draws `output.png`.
    Graphic,
    /// Questionnaire; nothing to build.
    Quiz,
    /// Verilog circuits, checked remotely.
    Circuits,
    /// Multiplayer game with a runner and public files.
    Game,
}

/// Whether solutions are complete programs or need `main.<ext>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceModifier {
    /// Complete program.
    #[default]
    None,
    /// Functions only; the problem's `main.<ext>` is appended.
    NoMain,
    /// Legacy spelling of `no_main`.
    Structs,
}

/// Game-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Runner files that must not be published.
    pub hide: Vec<String>,
}

/// Parsed `handler.yml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Problem kind.
    pub handler:         HandlerKind,
    /// Declared language of the golden solution.
    pub solution:        String,
    /// Whether `main.<ext>` is merged in.
    pub source_modifier: SourceModifier,
    /// Toolchain id forced regardless of extension.
    pub compilers:       Option<String>,
    /// Game settings, for game problems.
    pub game:            Option<GameConfig>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            handler:         HandlerKind::Std,
            solution:        "C++".into(),
            source_modifier: SourceModifier::None,
            compilers:       None,
            game:            None,
        }
    }
}

impl HandlerConfig {
    /// Parses YAML text; an empty document yields the defaults.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Applies the legacy and kind-specific fix-ups done at load time.
    pub fn normalize(mut self) -> Self {
        if self.source_modifier == SourceModifier::Structs {
            tracing::warn!(
                "source_modifier \"structs\" is deprecated, using \"no_main\" instead. please \
                 update handler.yml"
            );
            self.source_modifier = SourceModifier::NoMain;
        }
        if self.handler == HandlerKind::Circuits {
            self.solution = "Verilog".into();
        }
        self
    }

    /// True when solutions are merged with `main.<ext>`.
    pub fn merges_main(&self) -> bool {
        matches!(self.source_modifier, SourceModifier::NoMain | SourceModifier::Structs)
    }

    /// Toolchain override, if any.
    pub fn compilers(&self) -> Option<&str> {
        self.compilers.as_deref()
    }

    /// Hide list of a game problem.
    pub fn hidden_files(&self) -> &[String] {
        self.game.as_ref().map(|g| g.hide.as_slice()).unwrap_or(&[])
    }

    /// True for overrides that build from `public/`, `private/` trees.
    pub fn uses_pro2(&self) -> bool {
        matches!(self.compilers(), Some("PRO2" | "MakePRO2"))
    }
}
