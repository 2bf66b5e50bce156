use std::any::Any;
use std::cmp::{max, min};
use std::ops::Add;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// An independent unit of work of a pipeline stage
pub trait PipelineTask: Sync {
    fn name(&self) -> String;
    fn run(&self) -> anyhow::Result<()>;
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TasksSummary {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Add for TasksSummary {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            completed: self.completed + other.completed,
            failed: self.failed + other.failed,
            skipped: self.skipped + other.skipped,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn tasks_worker<T: PipelineTask>(tasks: &[Option<T>], cursor: &AtomicUsize) -> TasksSummary {
    let mut summary = TasksSummary::default();

    loop {
        let index = cursor.fetch_add(1, Ordering::Relaxed);
        let Some(slot) = tasks.get(index) else {
            break;
        };

        let Some(task) = slot else {
            logging::warn!("Skipping missing task at position {}", index);
            summary.skipped += 1;
            continue;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
            Ok(Ok(())) => summary.completed += 1,
            Ok(Err(err)) => {
                logging::error!("Task {} failed: {:#}", task.name(), err);
                summary.failed += 1;
            }
            Err(payload) => {
                logging::error!(
                    "Task {} panicked: {}",
                    task.name(),
                    panic_message(payload.as_ref())
                );
                summary.failed += 1;
            }
        }
    }

    summary
}

/// Runs every task on a pool of `threads_count` scoped threads.
///
/// Each thread claims the next task from a shared atomic cursor until the list
/// is exhausted. Failing or panicking tasks are logged and do not stop the others.
pub fn run_tasks<T: PipelineTask>(tasks: &[Option<T>], threads_count: usize) -> TasksSummary {
    let cursor = AtomicUsize::new(0);
    let threads_count = max(1, min(threads_count, tasks.len()));

    thread::scope(|scope| {
        let workers: Vec<_> = (0..threads_count)
            .map(|_| scope.spawn(|| tasks_worker(tasks, &cursor)))
            .collect();

        workers
            .into_iter()
            .map(|worker| worker.join().unwrap_or_default())
            .fold(TasksSummary::default(), |total, summary| total + summary)
    })
}
