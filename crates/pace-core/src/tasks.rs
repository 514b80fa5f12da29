//! Deferred work drained from the leftover frame budget.
//!
//! Jobs are short closures. A job that cannot finish in one slice returns
//! [`TaskStatus::Incomplete`] and is put back at the head of its priority
//! bucket; there is no preemption. Buckets are FIFO, and the drain always
//! serves the most urgent non-empty bucket first.

use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::constants::{MAX_TASK_ATTEMPTS, MIN_TASK_WINDOW_MS, TASK_WINDOW_RATIO};
use crate::error::TaskError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Critical = 0,
    High = 1,
    #[default]
    Normal = 2,
    Low = 3,
    Idle = 4,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 5] = [
        TaskPriority::Critical,
        TaskPriority::High,
        TaskPriority::Normal,
        TaskPriority::Low,
        TaskPriority::Idle,
    ];

    fn rank(self) -> usize {
        self as usize
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskPriority::Critical => "critical",
            TaskPriority::High => "high",
            TaskPriority::Normal => "normal",
            TaskPriority::Low => "low",
            TaskPriority::Idle => "idle",
        };
        f.write_str(name)
    }
}

/// What a job reports after one slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Complete,
    /// More work remains; run again later.
    Incomplete,
}

pub type TaskResult = Result<TaskStatus, TaskError>;

type Job = Box<dyn FnMut() -> TaskResult>;

struct Task {
    id: String,
    job: Job,
    priority: TaskPriority,
    max_time: f64,
    attempts: u32,
}

/// Outcome of one [`TaskScheduler::drain`] pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    pub executed: u32,
    pub completed: u32,
    pub retried: u32,
    pub dropped: u32,
    /// Jobs that failed or panicked; they are already removed from the queue.
    pub failures: Vec<(String, TaskError)>,
}

/// Lifetime counters plus the current queue shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchedulerStats {
    pub queued: usize,
    pub queued_by_priority: [usize; 5],
    pub scheduled: u64,
    pub executed: u64,
    pub completed: u64,
    pub retried: u64,
    pub dropped: u64,
    pub failed: u64,
    pub completed_ids: usize,
}

#[derive(Default)]
pub struct TaskScheduler {
    buckets: [VecDeque<Task>; 5],
    completed_ids: HashSet<String>,
    stats: SchedulerStats,
}

impl fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("stats", &self.stats())
            .finish()
    }
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `job` behind every task of the same priority.
    pub fn schedule(
        &mut self,
        id: impl Into<String>,
        priority: TaskPriority,
        max_time: f64,
        job: impl FnMut() -> TaskResult + 'static,
    ) {
        let task = Task {
            id: id.into(),
            job: Box::new(job),
            priority,
            max_time,
            attempts: 0,
        };
        tracing::trace!(id = %task.id, %priority, max_time, "task scheduled");
        self.buckets[priority.rank()].push_back(task);
        self.stats.scheduled += 1;
    }

    /// Run queued jobs until the queue empties or the drain has used
    /// `TASK_WINDOW_RATIO` of `remaining`. Only priorities at or above
    /// `lowest` are eligible. Nothing runs when less than
    /// `MIN_TASK_WINDOW_MS` remains. Failed jobs are collected and the drain
    /// carries on; use [`drain_until`](Self::drain_until) to react to each
    /// failure before the next job runs.
    pub fn drain(
        &mut self,
        clock: &dyn Clock,
        remaining: f64,
        lowest: TaskPriority,
    ) -> DrainReport {
        let mut report = DrainReport::default();
        if let Some(deadline) = Self::window_end(clock, remaining) {
            while self.drain_until(clock, deadline, lowest, &mut report) {}
        }
        report
    }

    /// Absolute time at which a drain starting now must stop, or `None`
    /// when `remaining` is too small to start one.
    pub fn window_end(clock: &dyn Clock, remaining: f64) -> Option<f64> {
        (remaining >= MIN_TASK_WINDOW_MS).then(|| clock.now_ms() + TASK_WINDOW_RATIO * remaining)
    }

    /// Run jobs into `report` until the queue empties, `deadline` passes, or
    /// a job fails. Returns true when it stopped on a failure, which is the
    /// last entry of `report.failures`.
    pub fn drain_until(
        &mut self,
        clock: &dyn Clock,
        deadline: f64,
        lowest: TaskPriority,
        report: &mut DrainReport,
    ) -> bool {
        while clock.now_ms() < deadline {
            let Some(mut task) = self.pop_next(lowest) else {
                break;
            };
            let began = clock.now_ms();
            let outcome = catch_unwind(AssertUnwindSafe(|| (task.job)()));
            let elapsed = clock.now_ms() - began;
            report.executed += 1;
            self.stats.executed += 1;

            let error = match outcome {
                Ok(Ok(TaskStatus::Incomplete)) if elapsed < task.max_time => {
                    task.attempts += 1;
                    if task.attempts >= MAX_TASK_ATTEMPTS {
                        tracing::warn!(
                            id = %task.id,
                            attempts = task.attempts,
                            "task dropped after retry limit"
                        );
                        report.dropped += 1;
                        self.stats.dropped += 1;
                    } else {
                        report.retried += 1;
                        self.stats.retried += 1;
                        self.buckets[task.priority.rank()].push_front(task);
                    }
                    continue;
                }
                Ok(Ok(_)) => {
                    report.completed += 1;
                    self.stats.completed += 1;
                    self.completed_ids.insert(task.id);
                    continue;
                }
                Ok(Err(e)) => {
                    tracing::error!(id = %task.id, error = %e, "task failed");
                    e
                }
                Err(payload) => {
                    let e = TaskError::new(panic_message(payload.as_ref()));
                    tracing::error!(id = %task.id, error = %e, "task panicked");
                    e
                }
            };
            self.stats.failed += 1;
            report.failures.push((task.id, error));
            return true;
        }
        false
    }

    fn pop_next(&mut self, lowest: TaskPriority) -> Option<Task> {
        self.buckets[..=lowest.rank()]
            .iter_mut()
            .find_map(|bucket| bucket.pop_front())
    }

    pub fn is_completed(&self, id: &str) -> bool {
        self.completed_ids.contains(id)
    }

    pub fn clear_completed(&mut self) {
        self.completed_ids.clear();
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(VecDeque::is_empty)
    }

    /// Queued ids in the order they would run.
    pub fn queued_ids(&self) -> Vec<&str> {
        self.buckets
            .iter()
            .flat_map(|b| b.iter().map(|t| t.id.as_str()))
            .collect()
    }

    pub fn stats(&self) -> SchedulerStats {
        let mut stats = self.stats.clone();
        for (slot, bucket) in stats.queued_by_priority.iter_mut().zip(&self.buckets) {
            *slot = bucket.len();
        }
        stats.queued = self.len();
        stats.completed_ids = self.completed_ids.len();
        stats
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {s}")
    } else {
        "panic".to_string()
    }
}
