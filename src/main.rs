#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # jtk
//! ## Introduction
//!
//! Builds online-judge problem directories: `jtk make` compiles the golden
//! solution, computes every `.cor`, verifies the other solutions and
//! regenerates the statements. `jtk make --watch` keeps doing so as files
//! change.
//!
//! ## Configuration
//!
//! Settings come from the environment (a `.env` file is read first):
//! `JTK_PREFIX`, `JTK_PROBLEM_NM`, `JTK_COMPILE_TIMEOUT_SECS`,
//! `JTK_EXEC_TIMEOUT_SECS`, `JTK_DEBOUNCE_MS`, `JTK_KEEP_SCRATCH`,
//! `JTK_ASSETS_DIR` and `JTK_SETTINGS`. The author settings file is managed
//! with `jtk config`.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Result, bail};
use bpaf::*;
use dotenvy::dotenv;
use jtk::{Task, config::ToolkitConfig, problem::Problem, toolchain::ProbeCache};
use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Arguments of `jtk make`.
#[derive(Debug, Clone)]
struct MakeArgs {
    /// Problem directories.
    directories:   Vec<PathBuf>,
    /// Problem identifier for statements.
    problem_nm:    Option<String>,
    /// Keep going after a directory fails.
    ignore_errors: bool,
    /// Only list failing directories in the summary.
    only_errors:   bool,
    /// Watch the first directory after building it.
    watch:         bool,
    /// What to make.
    tasks:         Vec<Task>,
}

/// `jtk config` actions.
#[derive(Debug, Clone)]
enum ConfigCmd {
    /// Print every setting
    Show,
    /// Print one setting
    Get(String),
    /// Change one setting
    Set(String, String),
}

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Build problems
    Make(MakeArgs),
    /// Probe external tools
    Doctor,
    /// List toolchains
    Compilers,
    /// Describe a problem as JSON
    Info(PathBuf),
    /// Remove scratch files
    Clean(PathBuf),
    /// Author settings
    Config(ConfigCmd),
}

/// Parsed command line.
#[derive(Debug, Clone)]
struct Opts {
    /// Debug logging.
    verbose: bool,
    /// Command to run.
    cmd:     Cmd,
}

/// Parse the command line arguments and return the options
fn options() -> Opts {
    /// parses one problem directory, defaulting to the current one
    fn d() -> impl Parser<PathBuf> {
        short('d')
            .long("directory")
            .help("Problem directory")
            .argument::<PathBuf>("DIR")
            .fallback(PathBuf::from("."))
    }

    let directories = short('d')
        .long("directory")
        .help("Problem directory (repeatable, defaults to the current one)")
        .argument::<PathBuf>("DIR")
        .many()
        .map(|dirs| {
            if dirs.is_empty() {
                vec![PathBuf::from(".")]
            } else {
                dirs
            }
        });
    let problem_nm = short('p')
        .long("problem-nm")
        .help("Problem identifier shown in statements")
        .argument::<String>("PROBLEM_NM")
        .optional();
    let ignore_errors = short('i')
        .long("ignore-errors")
        .help("Report failing directories and continue")
        .switch();
    let only_errors = short('e')
        .long("only-errors")
        .help("Only list failing directories in the summary")
        .switch();
    let watch = short('w')
        .long("watch")
        .help("Keep rebuilding the first directory as files change")
        .switch();
    let tasks = positional::<String>("TASK")
        .help("all (default), info, exe, cor, pdf, txt, md or html")
        .parse(|task| task.parse::<Task>())
        .many();

    let make = construct!(MakeArgs {
        directories,
        problem_nm,
        ignore_errors,
        only_errors,
        watch,
        tasks
    })
    .guard(
        |args| !(args.tasks.contains(&Task::All) && args.tasks.len() > 1),
        "the `all` task cannot be combined with others",
    )
    .to_options()
    .command("make")
    .help("Build problem directories")
    .map(Cmd::Make);

    let doctor = pure(Cmd::Doctor)
        .to_options()
        .command("doctor")
        .help("Check which compilers and external tools are installed");

    let compilers = pure(Cmd::Compilers)
        .to_options()
        .command("compilers")
        .help("List the supported compilers");

    let info = construct!(Cmd::Info(d()))
        .to_options()
        .command("info")
        .help("Prints a JSON description of the problem as loaded");

    let clean = construct!(Cmd::Clean(d()))
        .to_options()
        .command("clean")
        .help("Remove scratch directories and executables");

    let show = pure(ConfigCmd::Show)
        .to_options()
        .command("show")
        .help("Show the settings");
    let get = {
        let key = positional::<String>("KEY");
        construct!(ConfigCmd::Get(key))
    }
    .to_options()
    .command("get")
    .help("Print the value of one setting");
    let set = {
        let key = positional::<String>("KEY");
        let value = positional::<String>("VALUE");
        construct!(ConfigCmd::Set(key, value))
    }
    .to_options()
    .command("set")
    .help("Change one setting (name, email or developer)");
    let config = construct!([show, get, set])
        .to_options()
        .command("config")
        .help("Manage the author settings")
        .map(Cmd::Config);

    let verbose = short('v').long("verbose").help("Debug output").switch();
    let cmd = construct!([make, doctor, compilers, info, clean, config]);

    construct!(Opts { verbose, cmd })
        .to_options()
        .descr("Build tool for online judge problems")
        .run()
}

/// Row of the `make` summary.
#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Directory")]
    /// Problem directory.
    directory: String,
    #[tabled(rename = "Result")]
    /// `ok` or the error.
    result:    String,
}

/// Runs `jtk make` over every directory and prints a summary.
async fn make(args: MakeArgs, config: ToolkitConfig, probes: Arc<ProbeCache>) -> Result<()> {
    let config = match args.problem_nm {
        Some(problem_nm) => config.with_problem_nm(problem_nm),
        None => config,
    };

    if args.watch {
        let directory = &args.directories[0];
        if args.directories.len() > 1 {
            tracing::warn!("Only {} is watched", directory.display());
        }
        return jtk::watch(directory, &config, probes).await;
    }

    let mut rows = Vec::new();
    let mut fatal = None;
    for directory in &args.directories {
        tracing::info!("Making {}", directory.display());
        let outcome = jtk::make(directory, &args.tasks, &config, Arc::clone(&probes)).await;
        match outcome {
            Ok(()) => {
                if !args.only_errors {
                    rows.push(SummaryRow {
                        directory: directory.display().to_string(),
                        result:    format!("{}", "ok".green()),
                    });
                }
            }
            Err(e) => {
                tracing::error!("{}: {e:#}", directory.display());
                rows.push(SummaryRow {
                    directory: directory.display().to_string(),
                    result:    format!("{}", format!("{e}").red()),
                });
                if !args.ignore_errors {
                    fatal = Some(e);
                    break;
                }
            }
        }
    }

    if args.directories.len() > 1 && !rows.is_empty() {
        println!("{}", Table::new(rows).with(Style::modern()));
    }
    match fatal {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let opts = options();

    // stdout carries `info` JSON and tables; logs go to stderr.
    let fmt = fmt::layer()
        .with_writer(std::io::stderr)
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let filter_layer = LevelFilter::from_level(if opts.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    });
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    let config = ToolkitConfig::from_env();
    let probes = Arc::new(ProbeCache::new());

    match opts.cmd {
        Cmd::Make(args) => make(args, config, probes).await?,
        Cmd::Doctor => jtk::doctor(&probes).await?,
        Cmd::Compilers => jtk::compilers(&probes).await?,
        Cmd::Info(directory) => Problem::load(&directory)?.info()?,
        Cmd::Clean(directory) => {
            if !directory.is_dir() {
                bail!("{} is not a directory", directory.display());
            }
            let removed = jtk::maker::clean(&directory, config.prefix())?;
            println!("Removed {removed} entries");
        }
        Cmd::Config(ConfigCmd::Show) => jtk::show_settings(&config)?,
        Cmd::Config(ConfigCmd::Get(key)) => println!("{}", config.settings().get(&key)?),
        Cmd::Config(ConfigCmd::Set(key, value)) => jtk::set_setting(&config, &key, &value)?,
    };

    Ok(())
}
