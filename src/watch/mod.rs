#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Watch mode: rebuild the parts of a problem affected by each saved file.

/// File event classification.
pub mod classify;
/// Statement rebuild debounce.
pub mod debounce;
/// Serial task queue.
pub mod queue;

use anyhow::{Context, Result};
pub use classify::{Trigger, classify};
pub use debounce::StatementDebounce;
use notify::{Event, EventKind, RecursiveMode, Watcher as _};
pub use queue::{RunQueue, TaskRunner, WatchTask};
use tokio::sync::mpsc;

use crate::{maker::Maker, problem::HandlerKind};

/// Watches one problem directory and feeds a [`RunQueue`].
#[derive(Debug)]
pub struct Watcher {
    /// Maker for the watched problem; moved into the queue worker.
    maker: Maker,
}

impl Watcher {
    /// Wraps a maker.
    pub fn new(maker: Maker) -> Self {
        Self { maker }
    }

    /// Runs the initial build, then watches until Ctrl-C.
    ///
    /// A failing initial build is returned and nothing is watched.
    pub async fn run(mut self) -> Result<()> {
        let kind = self.maker.problem().handler().handler;
        if matches!(kind, HandlerKind::Game | HandlerKind::Quiz) {
            tracing::warn!("Watch mode is not available for {kind:?} problems");
            return Ok(());
        }

        self.maker
            .build_all()
            .await
            .context("Initial build failed, not watching")?;

        let directory = self.maker.problem().directory().to_path_buf();
        let prefix = self.maker.config().prefix().to_string();
        let golden = self.maker.problem().golden_solution().map(str::to_string);
        let mut debounce = StatementDebounce::new(self.maker.config().statement_debounce());

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = event_tx.send(res);
        })
        .context("Could not create file watcher")?;
        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .with_context(|| format!("Could not watch {}", directory.display()))?;

        let (queue, worker) = RunQueue::start(self.maker);
        tracing::info!("Watching {} (Ctrl-C to stop)", directory.display());

        let interrupted = tokio::signal::ctrl_c();
        tokio::pin!(interrupted);
        loop {
            let deadline = debounce.deadline().map(tokio::time::Instant::from_std);
            tokio::select! {
                _ = &mut interrupted => {
                    tracing::info!("Stopped watching");
                    break;
                }
                received = event_rx.recv() => {
                    let Some(received) = received else { break };
                    let event = match received {
                        Ok(event) => event,
                        Err(e) => {
                            tracing::warn!("watch error: {e}");
                            continue;
                        }
                    };
                    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        continue;
                    }
                    for path in &event.paths {
                        let trigger = classify(&directory, &prefix, golden.as_deref(), path);
                        dispatch(trigger, &queue, &mut debounce);
                    }
                }
                _ = sleep_until(deadline), if deadline.is_some() => {
                    if debounce.fire(std::time::Instant::now()) {
                        queue.push(WatchTask::RebuildStatements);
                    }
                }
            }
        }

        drop(watcher);
        drop(queue);
        worker.abort();
        Ok(())
    }
}

/// Queues the work a trigger calls for.
pub fn dispatch(trigger: Trigger, queue: &RunQueue, debounce: &mut StatementDebounce) {
    let now = std::time::Instant::now();
    match trigger {
        Trigger::Golden => queue.push(WatchTask::RecompileGolden),
        Trigger::Alternative(solution) => queue.push(WatchTask::Reverify(solution)),
        Trigger::Testcase { name, sample } => {
            queue.push(WatchTask::Testcase(name));
            if sample {
                debounce.poke(now);
            }
        }
        Trigger::SampleOutput | Trigger::Statement => debounce.poke(now),
        Trigger::Ignored => {}
    }
}

/// Sleeps until `deadline`, or forever without one.
async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
