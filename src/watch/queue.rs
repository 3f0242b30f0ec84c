#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    collections::HashSet,
    future::Future,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::maker::Maker;

/// Work queued by the watcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WatchTask {
    /// Recompile the golden solution and recompute every `.cor`.
    RecompileGolden,
    /// Recompile one alternative solution and verify it.
    Reverify(String),
    /// Recompute one testcase and re-run the alternatives on it.
    Testcase(String),
    /// Regenerate every statement.
    RebuildStatements,
}

/// Something that can carry out watch tasks, one at a time.
pub trait TaskRunner: Send + 'static {
    /// Runs one task to completion.
    fn run(&mut self, task: WatchTask) -> impl Future<Output = Result<()>> + Send;
}

impl TaskRunner for Maker {
    async fn run(&mut self, task: WatchTask) -> Result<()> {
        match task {
            WatchTask::RecompileGolden => {
                if let Some(golden) = self.problem().golden_solution().map(str::to_string) {
                    self.forget(&golden);
                }
                self.compile_golden().await?;
                self.compute_golden_outputs().await?;
            }
            WatchTask::Reverify(solution) => {
                self.problem_mut().refresh_solutions()?;
                self.verify_solution(&solution).await?;
            }
            WatchTask::Testcase(name) => {
                self.problem_mut().refresh_testcases()?;
                if !self.problem().testcases().contains(&name) {
                    tracing::debug!("{name} is no longer a testcase");
                    return Ok(());
                }
                let testcases = [name];
                self.compute_golden_outputs_for(&testcases).await?;
                self.run_alternatives_for(&testcases).await?;
            }
            WatchTask::RebuildStatements => {
                self.regenerate_pdf_statements().await?;
                self.regenerate_textual_statements(
                    &crate::maker::TextFormat::ALL,
                    crate::maker::Length::Full,
                )
                .await?;
                self.regenerate_textual_statements(
                    &crate::maker::TextFormat::ALL,
                    crate::maker::Length::Short,
                )
                .await?;
            }
        }
        Ok(())
    }
}

/// FIFO of watch tasks drained by one worker that owns the runner, so no two
/// tasks ever overlap. A failing task is logged and the next one runs.
///
/// A task identical to one still waiting is dropped: one save usually
/// raises several file events.
#[derive(Debug)]
pub struct RunQueue {
    /// Producer side.
    sender:  mpsc::UnboundedSender<WatchTask>,
    /// Tasks sent but not yet started.
    pending: Arc<Mutex<HashSet<WatchTask>>>,
}

impl RunQueue {
    /// Spawns the worker. It hands the runner back once every queue handle
    /// is dropped and the backlog is done.
    pub fn start<R: TaskRunner>(mut runner: R) -> (Self, JoinHandle<R>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<WatchTask>();
        let pending = Arc::new(Mutex::new(HashSet::new()));
        let started = Arc::clone(&pending);
        let worker = tokio::spawn(async move {
            while let Some(task) = receiver.recv().await {
                started.lock().expect("watch queue poisoned").remove(&task);
                tracing::debug!("running {task:?}");
                if let Err(e) = runner.run(task.clone()).await {
                    tracing::error!("{task:?} failed: {e:#}");
                }
            }
            runner
        });
        (Self { sender, pending }, worker)
    }

    /// Appends a task unless an identical one is already waiting.
    pub fn push(&self, task: WatchTask) {
        if !self
            .pending
            .lock()
            .expect("watch queue poisoned")
            .insert(task.clone())
        {
            tracing::debug!("{task:?} is already queued");
            return;
        }
        if self.sender.send(task).is_err() {
            tracing::warn!("watch worker has stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::bail;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<WatchTask>,
    }

    impl TaskRunner for Recorder {
        async fn run(&mut self, task: WatchTask) -> Result<()> {
            tokio::task::yield_now().await;
            self.seen.push(task.clone());
            if task == WatchTask::RecompileGolden {
                bail!("golden does not compile");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn tasks_run_in_order_past_failures() {
        let (queue, worker) = RunQueue::start(Recorder::default());
        let tasks = [
            WatchTask::Testcase("sample".into()),
            WatchTask::RecompileGolden,
            WatchTask::Reverify("solution.py".into()),
            WatchTask::RebuildStatements,
        ];
        for task in tasks.clone() {
            queue.push(task);
        }
        drop(queue);

        let recorder = worker.await.expect("worker panicked");
        assert_eq!(recorder.seen, tasks);
    }

    #[tokio::test]
    async fn waiting_duplicates_are_dropped() {
        let (queue, worker) = RunQueue::start(Recorder::default());
        queue.push(WatchTask::Testcase("b".into()));
        queue.push(WatchTask::Testcase("b".into()));
        queue.push(WatchTask::Reverify("solution.py".into()));
        queue.push(WatchTask::Testcase("b".into()));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        queue.push(WatchTask::Testcase("b".into()));
        drop(queue);

        let recorder = worker.await.expect("worker panicked");
        assert_eq!(
            recorder.seen,
            [
                WatchTask::Testcase("b".into()),
                WatchTask::Reverify("solution.py".into()),
                WatchTask::Testcase("b".into()),
            ]
        );
    }
}
