//! Background tasks.
//!
//! A [`Task`] is a small shared object with a four-state lifecycle
//! (`Idle -> Submitted -> Running -> Completed`) and a success flag. The
//! processing thread polls the state to decide when to submit again and when
//! to pick up results, so a given task is queued at most once at a time.

mod pool;

pub use pool::TaskExecutor;

use crate::Result;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    Idle = 0,
    Submitted = 1,
    Running = 2,
    Completed = 3,
}

impl TaskState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => TaskState::Submitted,
            2 => TaskState::Running,
            3 => TaskState::Completed,
            _ => TaskState::Idle,
        }
    }
}

/// Lifecycle of one task, shared by the submitter and the executor.
#[derive(Debug)]
pub struct TaskStatus {
    state: AtomicU8,
    success: AtomicBool,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskStatus {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(TaskState::Idle as u8),
            success: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn idle(&self) -> bool {
        self.state() == TaskState::Idle
    }

    #[inline]
    pub fn completed(&self) -> bool {
        self.state() == TaskState::Completed
    }

    /// Outcome of the last run. Only meaningful once completed.
    #[inline]
    pub fn successful(&self) -> bool {
        self.completed() && self.success.load(Ordering::Acquire)
    }

    /// Completed back to idle. False in any other state.
    pub fn reset(&self) -> bool {
        self.transition(TaskState::Completed, TaskState::Idle)
    }

    /// Idle to submitted. Executors call this before queuing.
    pub fn mark_submitted(&self) -> bool {
        self.transition(TaskState::Idle, TaskState::Submitted)
    }

    /// Undo [`mark_submitted`](Self::mark_submitted) when queuing failed.
    pub fn revert_submitted(&self) {
        self.transition(TaskState::Submitted, TaskState::Idle);
    }

    /// Record the outcome. Result writes made by the task before this call
    /// are visible to whoever observes `completed()`.
    pub fn complete(&self, success: bool) {
        self.success.store(success, Ordering::Release);
        self.state.store(TaskState::Completed as u8, Ordering::Release);
    }

    fn transition(&self, from: TaskState, to: TaskState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// A unit of background work.
pub trait Task: Send + Sync {
    fn status(&self) -> &TaskStatus;

    /// Do the work. Called on an executor thread.
    fn run(&self) -> Result<()>;

    fn idle(&self) -> bool {
        self.status().idle()
    }

    fn completed(&self) -> bool {
        self.status().completed()
    }

    fn successful(&self) -> bool {
        self.status().successful()
    }

    fn reset(&self) -> bool {
        self.status().reset()
    }
}

/// Runs submitted tasks off the calling thread.
pub trait Executor: Send + Sync {
    /// Queue `task`. Never blocks. False if the task is not idle, the queue
    /// is full or the executor is shut down.
    fn submit(&self, task: Arc<dyn Task>) -> bool;
}

/// Run a submitted task to completion, catching panics.
pub fn run_task(task: &dyn Task) {
    let status = task.status();
    if !status.transition(TaskState::Submitted, TaskState::Running) {
        tracing::warn!("Task run in state {:?}, skipped", status.state());
        return;
    }

    let success = match catch_unwind(AssertUnwindSafe(|| task.run())) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!("Task failed: {}", e);
            false
        }
        Err(_) => {
            tracing::warn!("Task panicked");
            false
        }
    };
    status.complete(success);
}

/// Executor that runs tasks when the owner asks it to.
///
/// For hosts that pump background work from their own idle loop, and for
/// deterministic tests.
pub struct ManualExecutor {
    queue: Mutex<VecDeque<Arc<dyn Task>>>,
    capacity: usize,
}

impl ManualExecutor {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Queued tasks.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run everything queued so far, in submission order.
    /// Returns the number of tasks run.
    pub fn run_pending(&self) -> usize {
        let mut count = 0;
        loop {
            // Lock is released before running so tasks may submit again
            let Some(task) = self.queue.lock().pop_front() else {
                break;
            };
            run_task(task.as_ref());
            count += 1;
        }
        count
    }
}

impl Default for ManualExecutor {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Executor for ManualExecutor {
    fn submit(&self, task: Arc<dyn Task>) -> bool {
        let mut queue = self.queue.lock();
        if queue.len() >= self.capacity || !task.status().mark_submitted() {
            return false;
        }
        queue.push_back(task);
        true
    }
}
