#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{fmt::Display, time::Duration};

use owo_colors::OwoColorize;
use similar::{Algorithm, ChangeTag, utils::diff_unicode_words};
use tabled::{Table, Tabled, settings::Style};

use crate::util::{pretty_bytes, pretty_duration};

/// Outcome of comparing one output against its `.cor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Identical bytes.
    Ok,
    /// Ran fine, different output.
    WrongAnswer,
    /// Did not run to a clean exit.
    ExecutionError,
}

impl Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Verdict::Ok => "OK",
            Verdict::WrongAnswer => "WA",
            Verdict::ExecutionError => "EE",
        };
        write!(f, "{tag}")
    }
}

/// What happened when one artifact ran on one testcase.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Testcase base name.
    pub testcase:    String,
    /// Wall time of the run.
    pub elapsed:     Duration,
    /// Size of `<testcase>.inp`.
    pub input_size:  u64,
    /// Size of the produced output.
    pub output_size: u64,
    /// True when the run failed or the output was wrong.
    pub failed:      bool,
    /// Comparison result, for verification runs only.
    pub verdict:     Option<Verdict>,
}

/// Row of the golden output table.
#[derive(Tabled)]
struct GoldenRow {
    #[tabled(rename = "testcase")]
    /// Testcase name.
    testcase: String,
    #[tabled(rename = "time")]
    /// Elapsed time.
    time:     String,
    #[tabled(rename = "input")]
    /// Input size.
    input:    String,
    #[tabled(rename = "output")]
    /// Output size.
    output:   String,
}

/// Row of a verification table.
#[derive(Tabled)]
struct VerifyRow {
    #[tabled(rename = "testcase")]
    /// Testcase name.
    testcase: String,
    #[tabled(rename = "time")]
    /// Elapsed time.
    time:     String,
    #[tabled(rename = "input")]
    /// Input size.
    input:    String,
    #[tabled(rename = "output")]
    /// Output size.
    output:   String,
    #[tabled(rename = "status")]
    /// Verdict.
    status:   String,
}

/// Colors a cell green for a passing row and red otherwise.
fn paint(text: impl Display, failed: bool) -> String {
    if failed {
        format!("{}", text.red())
    } else {
        format!("{}", text.green())
    }
}

/// Renders the golden output table.
pub fn golden_table(results: &[ExecutionResult]) -> String {
    let rows = results.iter().map(|r| GoldenRow {
        testcase: paint(&r.testcase, r.failed),
        time:     paint(pretty_duration(r.elapsed), r.failed),
        input:    paint(pretty_bytes(r.input_size), r.failed),
        output:   paint(pretty_bytes(r.output_size), r.failed),
    });
    Table::new(rows).with(Style::modern()).to_string()
}

/// Renders a verification table with one status column.
pub fn verify_table(results: &[ExecutionResult]) -> String {
    let rows = results.iter().map(|r| VerifyRow {
        testcase: paint(&r.testcase, r.failed),
        time:     paint(pretty_duration(r.elapsed), r.failed),
        input:    paint(pretty_bytes(r.input_size), r.failed),
        output:   paint(pretty_bytes(r.output_size), r.failed),
        status:   paint(
            r.verdict.map(|v| v.to_string()).unwrap_or_default(),
            r.failed,
        ),
    });
    Table::new(rows).with(Style::modern()).to_string()
}

/// Word-level diff of two outputs, colored, as `(expected, actual)`.
///
/// Returns `None` when the texts only differ in whitespace.
pub fn word_diff(expected: &str, actual: &str) -> Option<(String, String)> {
    let diff = diff_unicode_words(Algorithm::Patience, expected, actual);

    let mut is_equal = true;
    let mut colored_expected = String::new();
    let mut colored_actual = String::new();

    for (change, value) in diff {
        match change {
            ChangeTag::Equal => {
                colored_expected.push_str(value);
                colored_actual.push_str(value);
            }
            ChangeTag::Insert => {
                colored_actual.push_str(&format!("{}", value.green()));
                if !value.trim().is_empty() {
                    is_equal = false;
                }
            }
            ChangeTag::Delete => {
                colored_expected.push_str(&format!("{}", value.red()));
                if !value.trim().is_empty() {
                    is_equal = false;
                }
            }
        }
    }

    if is_equal {
        None
    } else {
        Some((colored_expected, colored_actual))
    }
}

/// Number of failed rows.
pub fn failures(results: &[ExecutionResult]) -> usize {
    results.iter().filter(|r| r.failed).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(testcase: &str, failed: bool, verdict: Option<Verdict>) -> ExecutionResult {
        ExecutionResult {
            testcase: testcase.into(),
            elapsed: Duration::from_millis(12),
            input_size: 0,
            output_size: 3,
            failed,
            verdict,
        }
    }

    #[test]
    fn verdicts_use_short_tags() {
        assert_eq!(Verdict::Ok.to_string(), "OK");
        assert_eq!(Verdict::WrongAnswer.to_string(), "WA");
        assert_eq!(Verdict::ExecutionError.to_string(), "EE");
    }

    #[test]
    fn golden_table_has_the_four_columns() {
        let table = golden_table(&[result("sample", false, None)]);
        for header in ["testcase", "time", "input", "output"] {
            assert!(table.contains(header), "missing {header} in\n{table}");
        }
        assert!(table.contains("sample"));
        assert!(!table.contains("status"));
    }

    #[test]
    fn verify_table_shows_the_verdict() {
        let table = verify_table(&[result("sample-1", true, Some(Verdict::WrongAnswer))]);
        assert!(table.contains("status"));
        assert!(table.contains("WA"));
    }

    #[test]
    fn whitespace_only_changes_are_not_a_diff() {
        assert!(word_diff("1 2 3\n", "1 2  3\n").is_none());
        assert!(word_diff("OK\n", "WRONG\n").is_some());
    }

    #[test]
    fn failures_are_counted() {
        let results = [
            result("a", false, None),
            result("b", true, None),
            result("c", true, None),
        ];
        assert_eq!(failures(&results), 2);
    }
}
