//! Worker thread pool.

use super::{run_task, Executor, Task};
use crate::{Error, ExecutorConfig, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thread_priority::ThreadPriority;

/// How often idle workers check for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Fixed pool of worker threads fed by a bounded queue.
///
/// `submit` never blocks, which makes it callable from the processing
/// thread. Tasks still queued at shutdown are completed as unsuccessful.
pub struct TaskExecutor {
    tx: Sender<Arc<dyn Task>>,
    rx: Receiver<Arc<dyn Task>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
}

impl TaskExecutor {
    pub fn new(config: &ExecutorConfig) -> Result<Self> {
        config.validate()?;
        let (tx, rx) = bounded::<Arc<dyn Task>>(config.queue_capacity);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(config.workers);
        for i in 0..config.workers {
            let rx = rx.clone();
            let worker_shutdown = Arc::clone(&shutdown);
            let low_priority = config.low_priority;
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", config.thread_name, i))
                .spawn(move || {
                    if low_priority {
                        let _ = thread_priority::set_current_thread_priority(ThreadPriority::Min);
                    }
                    worker_loop(rx, worker_shutdown);
                });
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    shutdown.store(true, Ordering::Release);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(Error::Io(e));
                }
            }
        }

        tracing::debug!(
            "Started {} executor worker(s), queue capacity {}",
            config.workers,
            config.queue_capacity
        );
        Ok(Self {
            tx,
            rx,
            workers: Mutex::new(workers),
            shutdown,
        })
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Tasks waiting for a worker.
    pub fn queued(&self) -> usize {
        self.rx.len()
    }

    /// Stop accepting tasks, join the workers and fail what is still queued.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if handle.join().is_err() {
                tracing::warn!("Executor worker panicked");
            }
        }

        let mut dropped = 0;
        for task in self.rx.try_iter() {
            task.status().complete(false);
            dropped += 1;
        }
        tracing::debug!("Executor shut down, {} queued task(s) dropped", dropped);
    }
}

impl Executor for TaskExecutor {
    fn submit(&self, task: Arc<dyn Task>) -> bool {
        if self.is_shutdown() || !task.status().mark_submitted() {
            return false;
        }
        match self.tx.try_send(task) {
            Ok(()) => true,
            Err(TrySendError::Full(task)) | Err(TrySendError::Disconnected(task)) => {
                task.status().revert_submitted();
                false
            }
        }
    }
}

impl Drop for TaskExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(rx: Receiver<Arc<dyn Task>>, shutdown: Arc<AtomicBool>) {
    loop {
        if shutdown.load(Ordering::Acquire) {
            break;
        }
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(task) => run_task(task.as_ref()),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::tests::CountingTask;
    use std::time::Instant;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }

    fn config(workers: usize, queue_capacity: usize) -> ExecutorConfig {
        ExecutorConfig {
            workers,
            queue_capacity,
            low_priority: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_runs_tasks() {
        init_tracing();
        let executor = TaskExecutor::new(&config(2, 16)).unwrap();
        let tasks: Vec<_> = (0..8).map(|_| CountingTask::new(false)).collect();
        for task in &tasks {
            assert!(executor.submit(task.clone()));
        }
        assert!(wait_until(|| tasks.iter().all(|t| t.completed())));
        assert!(tasks
            .iter()
            .all(|t| t.successful() && t.runs.load(Ordering::SeqCst) == 1));
    }

    #[test]
    fn test_resubmit_after_reset() {
        let executor = TaskExecutor::new(&config(1, 4)).unwrap();
        let task = CountingTask::new(false);
        assert!(executor.submit(task.clone()));
        assert!(wait_until(|| task.completed()));
        assert!(!executor.submit(task.clone()), "completed tasks need a reset");
        assert!(task.reset());
        assert!(executor.submit(task.clone()));
        assert!(wait_until(|| task.completed()));
        assert_eq!(task.runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let executor = TaskExecutor::new(&config(1, 4)).unwrap();
        executor.shutdown();
        executor.shutdown();
        let task = CountingTask::new(false);
        assert!(!executor.submit(task.clone()));
        assert!(task.idle());
    }

    #[test]
    fn test_shutdown_joins_every_worker() {
        let executor = TaskExecutor::new(&config(3, 4)).unwrap();
        assert_eq!(executor.workers.lock().len(), 3);
        assert!(!executor.is_shutdown());

        executor.shutdown();
        assert!(executor.is_shutdown());
        assert!(executor.workers.lock().is_empty());
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            TaskExecutor::new(&config(0, 4)),
            Err(Error::InvalidConfig(_))
        ));
    }
}
