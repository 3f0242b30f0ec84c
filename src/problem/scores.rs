#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

/// One scored group of testcases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScorePart {
    /// Label of the group.
    pub part:   String,
    /// Testcases whose name starts with this belong to the group.
    pub prefix: String,
    /// Points awarded, never negative.
    pub points: f64,
}

/// Parses and validates `scores.yml`.
pub fn parse_scores(text: &str) -> Result<Vec<ScorePart>> {
    let parts: Vec<ScorePart> = serde_yaml::from_str(text)?;
    for part in &parts {
        ensure!(
            part.points >= 0.0,
            "part `{}` has negative points ({})",
            part.part,
            part.points
        );
    }
    Ok(parts)
}
