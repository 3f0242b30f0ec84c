#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use anyhow::Result;

use super::{
    Family, Injector, Probe, ProbeCache, Toolchain, ToolchainInfo, ToolchainSpec,
    script::use_turtle_pil,
};
use crate::error::BuildError;

/// Flags shared by the C++ toolchains.
const GXX_FLAGS: &[&str] = &[
    "-std=c++17",
    "-D_JUDGE_",
    "-O2",
    "-DNDEBUG",
    "-Wall",
    "-Wextra",
    "-Wno-sign-compare",
    "-Wshadow",
];

/// Flags that keep `ghci`/`runhaskell` quiet about harmless warnings.
const HASKELL_SCRIPT_FLAGS: &[&str] = &["-Wno-empty-enumerations", "-Wno-tabs", "-Wno-x-partial"];

/// Every toolchain, in listing order.
static TOOLCHAINS: [ToolchainSpec; 14] = [
    ToolchainSpec {
        id:        "C",
        name:      "GNU C Compiler",
        language:  "C",
        tool:      "gcc",
        flags:     &["-D_JUDGE_", "-O2", "-DNDEBUG", "-Wall", "-Wextra", "-Wno-sign-compare"],
        extension: "c",
        family:    Family::Native,
        probe:     Probe::Gcc,
        check:     &[],
        runner:    &[],
        injector:  None,
        rewrite:   None,
        warning:   "",
    },
    ToolchainSpec {
        id:        "C++",
        name:      "GNU C++ Compiler",
        language:  "C++",
        tool:      "g++",
        flags:     GXX_FLAGS,
        extension: "cc",
        family:    Family::Native,
        probe:     Probe::Gcc,
        check:     &[],
        runner:    &[],
        injector:  None,
        rewrite:   None,
        warning:   "",
    },
    ToolchainSpec {
        id:        "Python3",
        name:      "Python3",
        language:  "Python",
        tool:      "python3",
        flags:     &[],
        extension: "py",
        family:    Family::Script,
        probe:     Probe::Python3,
        check:     &["python3", "-m", "py_compile"],
        runner:    &["python3"],
        injector:  None,
        rewrite:   Some(use_turtle_pil),
        warning:   "",
    },
    ToolchainSpec {
        id:        "Haskell",
        name:      "Glasgow Haskell Compiler",
        language:  "Haskell",
        tool:      "ghc",
        flags:     &["-O3"],
        extension: "hs",
        family:    Family::Native,
        probe:     Probe::Haskell,
        check:     &[],
        runner:    &[],
        injector:  None,
        rewrite:   None,
        warning:   "",
    },
    ToolchainSpec {
        id:        "Clojure",
        name:      "Clojure",
        language:  "Clojure",
        tool:      "clj",
        flags:     &[],
        extension: "clj",
        family:    Family::Script,
        probe:     Probe::Clojure,
        check:     &[],
        runner:    &["clj", "-M"],
        injector:  None,
        rewrite:   None,
        warning:   "no syntax check before running",
    },
    ToolchainSpec {
        id:        "Java",
        name:      "Java",
        language:  "Java",
        tool:      "javac",
        flags:     &[],
        extension: "java",
        family:    Family::Vm,
        probe:     Probe::Java,
        check:     &[],
        runner:    &["java"],
        injector:  None,
        rewrite:   None,
        warning:   "the entry point must be class Main",
    },
    ToolchainSpec {
        id:        "Rust",
        name:      "Rust Compiler",
        language:  "Rust",
        tool:      "rustc",
        flags:     &["-C", "opt-level=2", "-D", "warnings"],
        extension: "rs",
        family:    Family::Native,
        probe:     Probe::Rust,
        check:     &[],
        runner:    &[],
        injector:  None,
        rewrite:   None,
        warning:   "",
    },
    ToolchainSpec {
        id:        "R",
        name:      "R",
        language:  "R",
        tool:      "Rscript",
        flags:     &[],
        extension: "R",
        family:    Family::Script,
        probe:     Probe::R,
        check:     &[],
        runner:    &["Rscript"],
        injector:  None,
        rewrite:   None,
        warning:   "no syntax check before running",
    },
    ToolchainSpec {
        id:        "Verilog",
        name:      "Verilog",
        language:  "Verilog",
        tool:      "verilog",
        flags:     &[],
        extension: "v",
        family:    Family::Placeholder,
        probe:     Probe::Verilog,
        check:     &[],
        runner:    &[],
        injector:  None,
        rewrite:   None,
        warning:   "circuits are not executed locally",
    },
    ToolchainSpec {
        id:        "PRO2",
        name:      "PRO2 C++ project",
        language:  "C++",
        tool:      "g++",
        flags:     GXX_FLAGS,
        extension: "cc",
        family:    Family::Project,
        probe:     Probe::Gcc,
        check:     &[],
        runner:    &[],
        injector:  None,
        rewrite:   None,
        warning:   "",
    },
    ToolchainSpec {
        id:        "MakePRO2",
        name:      "PRO2 C++ project with Makefile",
        language:  "C++",
        tool:      "make",
        flags:     &[],
        extension: "cc",
        family:    Family::Make,
        probe:     Probe::Gcc,
        check:     &[],
        runner:    &[],
        injector:  None,
        rewrite:   None,
        warning:   "",
    },
    ToolchainSpec {
        id:        "RunPython",
        name:      "RunPython",
        language:  "Python",
        tool:      "python3",
        flags:     &[],
        extension: "py",
        family:    Family::Injected,
        probe:     Probe::Python3,
        check:     &["python3", "-m", "py_compile"],
        runner:    &["python3"],
        injector:  Some(Injector::Python),
        rewrite:   None,
        warning:   "",
    },
    ToolchainSpec {
        id:        "RunHaskell",
        name:      "RunHaskell",
        language:  "Haskell",
        tool:      "runhaskell",
        flags:     HASKELL_SCRIPT_FLAGS,
        extension: "hs",
        family:    Family::Injected,
        probe:     Probe::Haskell,
        check:     &[
            "ghci",
            "-e",
            ":q",
            "-Wno-empty-enumerations",
            "-Wno-tabs",
            "-Wno-x-partial",
        ],
        runner:    &[
            "runhaskell",
            "-Wno-empty-enumerations",
            "-Wno-tabs",
            "-Wno-x-partial",
        ],
        injector:  Some(Injector::Haskell),
        rewrite:   None,
        warning:   "",
    },
    ToolchainSpec {
        id:        "RunClojure",
        name:      "RunClojure",
        language:  "Clojure",
        tool:      "clj",
        flags:     &[],
        extension: "clj",
        family:    Family::Injected,
        probe:     Probe::Clojure,
        check:     &[],
        runner:    &["clj", "-M"],
        injector:  Some(Injector::Clojure),
        rewrite:   None,
        warning:   "",
    },
];

/// Alternative spellings accepted in `handler.yml`.
const ALIASES: [(&str, &str); 6] = [
    ("GCC", "C"),
    ("G++", "C++"),
    ("GXX", "C++"),
    ("GHC", "Haskell"),
    ("JDK", "Java"),
    ("Circuits", "Verilog"),
];

/// Extension to toolchain id.
const EXTENSIONS: [(&str, &str); 10] = [
    ("c", "C"),
    ("cc", "C++"),
    ("cpp", "C++"),
    ("py", "Python3"),
    ("hs", "Haskell"),
    ("clj", "Clojure"),
    ("java", "Java"),
    ("rs", "Rust"),
    ("R", "R"),
    ("v", "Verilog"),
];

/// Looks up a toolchain by registry id or alias.
pub fn resolve_by_id(id: &str) -> Result<Toolchain> {
    let canonical = ALIASES
        .iter()
        .find(|(alias, _)| *alias == id)
        .map(|(_, target)| *target)
        .unwrap_or(id);
    TOOLCHAINS
        .iter()
        .find(|spec| spec.id == canonical)
        .map(Toolchain::new)
        .ok_or_else(|| BuildError::UnknownToolchain(format!("id `{id}`")).into())
}

/// Looks up the default toolchain for a file extension (without the dot).
pub fn resolve_by_extension(extension: &str) -> Result<Toolchain> {
    EXTENSIONS
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, id)| resolve_by_id(id))
        .unwrap_or_else(|| {
            Err(BuildError::UnknownToolchain(format!("extension `.{extension}`")).into())
        })
}

/// Solution file extension for a declared programming language (`C++` is
/// `cc`). Accepts the same aliases as [`resolve_by_id`].
pub fn extension_for_language(language: &str) -> Option<&'static str> {
    let canonical = ALIASES
        .iter()
        .find(|(alias, _)| *alias == language)
        .map(|(_, target)| *target)
        .unwrap_or(language);
    EXTENSIONS
        .iter()
        .find(|(_, id)| *id == canonical)
        .map(|(ext, _)| *ext)
}

/// Probe gating solutions with this extension.
pub fn probe_for_extension(extension: &str) -> Result<Probe> {
    resolve_by_extension(extension).map(|toolchain| toolchain.probe())
}

/// Every extension that names a solution file.
pub fn solution_extensions() -> impl Iterator<Item = &'static str> {
    EXTENSIONS.iter().map(|(ext, _)| *ext)
}

/// Every registry id, in listing order.
pub fn defined_ids() -> Vec<&'static str> {
    TOOLCHAINS.iter().map(|spec| spec.id).collect()
}

/// Ids whose probe succeeds.
pub async fn available_ids(cache: &ProbeCache) -> Vec<&'static str> {
    let mut ids = Vec::new();
    for spec in &TOOLCHAINS {
        if cache.is_available(spec.probe).await {
            ids.push(spec.id);
        }
    }
    ids
}

/// Full description of every toolchain.
pub async fn infos(cache: &ProbeCache) -> Vec<ToolchainInfo> {
    let mut infos = Vec::with_capacity(TOOLCHAINS.len());
    for spec in &TOOLCHAINS {
        infos.push(Toolchain::new(spec).info(cache).await);
    }
    infos
}
