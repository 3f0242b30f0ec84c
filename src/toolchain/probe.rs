#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use serde::Serialize;
use tokio::sync::OnceCell;

use crate::{
    process::{Invocation, os_args},
    util::on_path,
};

/// Bound on a single version command.
const PROBE_TIMEOUT: Duration = Duration::from_secs(20);

/// One external tool whose presence gates some work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Probe {
    /// `g++` or Apple clang, shared by C and C++.
    Gcc,
    /// `python3`.
    Python3,
    /// `ghc`.
    Haskell,
    /// `clj`.
    Clojure,
    /// `javac`.
    Java,
    /// `rustc`.
    Rust,
    /// `R`.
    R,
    /// GNU `make`.
    Make,
    /// `xelatex`, for PDF statements.
    XeLatex,
    /// `pandoc` with Lua filters, for textual statements.
    Pandoc,
    /// Circuit problems need nothing installed.
    Verilog,
}

/// Version line captured by a probe and the verdict drawn from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeOutcome {
    /// Whether the tool looks usable.
    pub available: bool,
    /// First line of the version output, or `not found`.
    pub version:   String,
}

impl ProbeOutcome {
    /// An outcome for a tool that is present.
    pub fn found(version: impl Into<String>) -> Self {
        Self {
            available: true,
            version:   version.into(),
        }
    }

    /// An outcome for a missing tool.
    pub fn missing() -> Self {
        Self {
            available: false,
            version:   "not found".into(),
        }
    }
}

impl Probe {
    /// Every probe, in display order.
    pub const ALL: [Probe; 11] = [
        Probe::Gcc,
        Probe::Python3,
        Probe::Haskell,
        Probe::Clojure,
        Probe::Java,
        Probe::Rust,
        Probe::R,
        Probe::Make,
        Probe::XeLatex,
        Probe::Pandoc,
        Probe::Verilog,
    ];

    /// Human readable tool name.
    pub fn label(&self) -> &'static str {
        match self {
            Probe::Gcc => "C/C++ (g++)",
            Probe::Python3 => "Python 3",
            Probe::Haskell => "Haskell (ghc)",
            Probe::Clojure => "Clojure (clj)",
            Probe::Java => "Java (javac)",
            Probe::Rust => "Rust (rustc)",
            Probe::R => "R",
            Probe::Make => "make",
            Probe::XeLatex => "XeLaTeX",
            Probe::Pandoc => "pandoc",
            Probe::Verilog => "Verilog",
        }
    }

    /// Version command, or `None` when nothing needs to be checked.
    pub fn command(&self) -> Option<(&'static str, &'static [&'static str])> {
        match self {
            Probe::Gcc => Some(("g++", &["--version"])),
            Probe::Python3 => Some(("python3", &["--version"])),
            Probe::Haskell => Some(("ghc", &["--version"])),
            Probe::Clojure => Some(("clj", &["--version"])),
            Probe::Java => Some(("javac", &["-version"])),
            Probe::Rust => Some(("rustc", &["--version"])),
            Probe::R => Some(("R", &["--version"])),
            Probe::Make => Some(("make", &["--version"])),
            Probe::XeLatex => Some(("xelatex", &["--version"])),
            Probe::Pandoc => Some(("pandoc", &["--version"])),
            Probe::Verilog => None,
        }
    }

    /// Decides availability from the combined version output.
    pub fn recognizes(&self, output: &str) -> bool {
        let output = output.trim_start();
        match self {
            Probe::Gcc => output.starts_with("g++") || output.starts_with("Apple clang"),
            Probe::Python3 => output.starts_with("Python 3"),
            Probe::Haskell => {
                output.starts_with("The Glorious Glasgow Haskell Compilation System")
            }
            Probe::Clojure => output.starts_with("Clojure"),
            Probe::Java => output.starts_with("javac"),
            Probe::Rust => output.starts_with("rustc"),
            Probe::R => output.starts_with("R version"),
            Probe::Make => output.starts_with("GNU Make"),
            Probe::XeLatex => output.contains("XeTeX"),
            Probe::Pandoc => output.starts_with("pandoc") && output.contains("+lua"),
            Probe::Verilog => true,
        }
    }

    /// Runs the version command once, without caching.
    pub async fn run(&self) -> ProbeOutcome {
        let Some((program, args)) = self.command() else {
            return ProbeOutcome::found("built in");
        };
        if !on_path(program) {
            tracing::debug!("{program} is not on PATH");
            return ProbeOutcome::missing();
        }

        let invocation = Invocation::builder()
            .program(program)
            .args(os_args(args))
            .deadline(PROBE_TIMEOUT)
            .build();
        tracing::debug!("probing {}", invocation.render());
        match invocation.run().await {
            Ok(collected) => {
                // Some tools (old javac) print their banner on stderr.
                let text = if collected.stdout.is_empty() {
                    collected.stderr_lossy()
                } else {
                    collected.stdout_lossy()
                };
                if self.recognizes(&text) {
                    let first = text.lines().next().unwrap_or_default().trim();
                    ProbeOutcome::found(first)
                } else {
                    ProbeOutcome::missing()
                }
            }
            Err(_) => ProbeOutcome::missing(),
        }
    }
}

/// Memoized probe results, shared by everything that gates on a tool.
///
/// Each probe owns a `OnceCell`: the first caller runs the version command
/// and concurrent callers wait for that same run.
#[derive(Debug, Default)]
pub struct ProbeCache {
    /// One cell per probe, created on first use.
    cells: Mutex<HashMap<Probe, Arc<OnceCell<ProbeOutcome>>>>,
}

impl ProbeCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cell for `probe`, creating it if needed.
    fn cell(&self, probe: Probe) -> Arc<OnceCell<ProbeOutcome>> {
        let mut cells = self.cells.lock().expect("probe cache poisoned");
        Arc::clone(cells.entry(probe).or_default())
    }

    /// Outcome of `probe`, running it at most once per cache lifetime.
    pub async fn check(&self, probe: Probe) -> ProbeOutcome {
        self.check_with(probe, move || async move { probe.run().await })
            .await
    }

    /// Outcome of `probe`, computed by `run` unless it is already known or
    /// another caller is computing it.
    async fn check_with<F, Fut>(&self, probe: Probe, run: F) -> ProbeOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ProbeOutcome>,
    {
        self.cell(probe).get_or_init(run).await.clone()
    }

    /// Shorthand for `check(probe).await.available`.
    pub async fn is_available(&self, probe: Probe) -> bool {
        self.check(probe).await.available
    }

    /// Seeds an outcome so `probe` never runs. Replaces any earlier outcome.
    pub fn preset(&self, probe: Probe, outcome: ProbeOutcome) {
        let mut cells = self.cells.lock().expect("probe cache poisoned");
        cells.insert(probe, Arc::new(OnceCell::new_with(Some(outcome))));
    }

    /// Forgets every outcome.
    pub fn clear(&self) {
        self.cells.lock().expect("probe cache poisoned").clear();
    }

    /// Every probe with its outcome, in display order.
    pub async fn check_all(&self) -> Vec<(Probe, ProbeOutcome)> {
        let outcomes = futures::future::join_all(Probe::ALL.iter().map(|p| self.check(*p))).await;
        Probe::ALL.into_iter().zip(outcomes).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn banners_are_matched() {
        assert!(Probe::Gcc.recognizes("g++ (GCC) 13.2.0\nCopyright"));
        assert!(Probe::Gcc.recognizes("Apple clang version 15.0.0"));
        assert!(!Probe::Gcc.recognizes("bash: g++: command not found"));
        assert!(Probe::Python3.recognizes("Python 3.12.1"));
        assert!(!Probe::Python3.recognizes("Python 2.7.18"));
        assert!(Probe::Pandoc.recognizes("pandoc 3.1\nFeatures: +server +lua"));
        assert!(!Probe::Pandoc.recognizes("pandoc 3.1\nFeatures: -lua"));
        assert!(Probe::XeLatex.recognizes("XeTeX 3.141592653-2.6-0.999995 (TeX Live 2023)"));
    }

    #[tokio::test]
    async fn preset_outcomes_short_circuit_the_probe() {
        let cache = ProbeCache::new();
        cache.preset(Probe::Haskell, ProbeOutcome::missing());
        assert!(!cache.is_available(Probe::Haskell).await);
        cache.preset(Probe::Haskell, ProbeOutcome::found("ghc 9.4"));
        assert_eq!(cache.check(Probe::Haskell).await.version, "ghc 9.4");

        cache.clear();
        cache.preset(Probe::Rust, ProbeOutcome::missing());
        assert!(!cache.is_available(Probe::Rust).await);
        assert!(cache.cells.lock().expect("lock").get(&Probe::Haskell).is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_callers_run_the_check_once() {
        let cache = Arc::new(ProbeCache::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let runs = Arc::clone(&runs);
                tokio::spawn(async move {
                    cache
                        .check_with(Probe::Make, move || async move {
                            runs.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            ProbeOutcome::found("GNU Make 4.4")
                        })
                        .await
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.expect("join"), ProbeOutcome::found("GNU Make 4.4"));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(cache.check(Probe::Make).await.version, "GNU Make 4.4");
        assert!(cache.is_available(Probe::Verilog).await);
    }
}
