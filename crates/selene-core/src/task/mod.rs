// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Background task scheduling.
//!
//! A [`TaskGroup`] owns a small pool of worker threads fed through a shared
//! channel. Work is described by a [`TaskHandle`] builder: callers attach
//! closures, optionally bind a counting [`TaskSignal`] fence, and dispatch.
//! The fence is incremented exactly once per task, after every attached
//! closure has run, which lets subsystems bound the amount of work they have
//! in flight without tracking individual completions.

use std::sync::{Arc, Condvar, Mutex};
use std::thread;

/// Scheduling class carried by a task.
///
/// Used for diagnostics and future queue routing; the pool itself is FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskClass {
    /// Latency-sensitive work tied to the current frame.
    #[default]
    Foreground,
    /// Streaming and other work that may complete whenever capacity allows.
    Background,
}

/// A monotonic counting fence.
///
/// Workers increment the count as tasks complete; producers compare the
/// count against a logical timestamp to decide whether more work may be
/// issued, and can block until a target count is reached.
#[derive(Debug, Default)]
pub struct TaskSignal {
    count: Mutex<u64>,
    condvar: Condvar,
}

impl TaskSignal {
    /// Creates a fence with a count of zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current count.
    pub fn count(&self) -> u64 {
        *self.count.lock().unwrap()
    }

    /// Increments the count and wakes every waiter.
    pub fn signal_increment(&self) {
        let mut count = self.count.lock().unwrap();
        *count += 1;
        self.condvar.notify_all();
    }

    /// Blocks the calling thread until the count reaches `target`.
    pub fn wait_until_at_least(&self, target: u64) {
        let mut count = self.count.lock().unwrap();
        while *count < target {
            count = self.condvar.wait(count).unwrap();
        }
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

struct TaskPayload {
    description: String,
    class: TaskClass,
    signal: Option<Arc<TaskSignal>>,
    jobs: Vec<Job>,
}

impl TaskPayload {
    fn run(self) {
        for job in self.jobs {
            job();
        }
        if let Some(signal) = self.signal {
            signal.signal_increment();
        }
    }
}

/// Builder for a unit of background work.
///
/// Obtained from [`TaskGroup::create_task`]. Closures attached via
/// [`attach`](TaskHandle::attach) run in order on one worker thread; the
/// fence signal, if set, fires once after the last of them. An undispatched
/// handle dispatches itself when dropped, so a bound fence always fires.
pub struct TaskHandle<'group> {
    sender: &'group flume::Sender<TaskPayload>,
    payload: Option<TaskPayload>,
}

impl TaskHandle<'_> {
    /// Sets the human-readable description used in worker logs.
    pub fn set_description(&mut self, description: impl Into<String>) {
        if let Some(payload) = &mut self.payload {
            payload.description = description.into();
        }
    }

    /// Sets the scheduling class.
    pub fn set_class(&mut self, class: TaskClass) {
        if let Some(payload) = &mut self.payload {
            payload.class = class;
        }
    }

    /// Binds the counting fence incremented when this task completes.
    pub fn set_fence_signal(&mut self, signal: Arc<TaskSignal>) {
        if let Some(payload) = &mut self.payload {
            payload.signal = Some(signal);
        }
    }

    /// Appends a closure to this task's work list.
    pub fn attach(&mut self, job: impl FnOnce() + Send + 'static) {
        if let Some(payload) = &mut self.payload {
            payload.jobs.push(Box::new(job));
        }
    }

    /// Submits the task to the group's worker pool.
    pub fn dispatch(mut self) {
        self.submit();
    }

    fn submit(&mut self) {
        if let Some(payload) = self.payload.take() {
            if let Err(flume::SendError(payload)) = self.sender.send(payload) {
                // No workers are left to run it; run inline so a bound
                // fence still fires.
                log::warn!(
                    "task group has no workers; running '{}' inline",
                    payload.description
                );
                payload.run();
            }
        }
    }
}

impl Drop for TaskHandle<'_> {
    fn drop(&mut self) {
        self.submit();
    }
}

/// A fixed pool of worker threads executing [`TaskHandle`] work.
///
/// Dropping the group closes the queue and joins every worker, so all
/// dispatched tasks complete before the group is gone.
pub struct TaskGroup {
    sender: Option<flume::Sender<TaskPayload>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl TaskGroup {
    /// Spawns a group with `worker_count` threads (at least one).
    pub fn new(worker_count: usize) -> Self {
        let (sender, receiver) = flume::unbounded::<TaskPayload>();
        let workers = (0..worker_count.max(1))
            .map(|index| {
                let receiver = receiver.clone();
                thread::Builder::new()
                    .name(format!("selene-task-{index}"))
                    .spawn(move || {
                        while let Ok(payload) = receiver.recv() {
                            log::trace!(
                                "running task '{}' ({:?})",
                                payload.description,
                                payload.class
                            );
                            payload.run();
                        }
                    })
                    .expect("failed to spawn task group worker")
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// Creates an empty task bound to this group.
    pub fn create_task(&self) -> TaskHandle<'_> {
        TaskHandle {
            sender: self.sender.as_ref().expect("task group is shut down"),
            payload: Some(TaskPayload {
                description: String::from("unnamed"),
                class: TaskClass::default(),
                signal: None,
                jobs: Vec::new(),
            }),
        }
    }
}

impl Drop for TaskGroup {
    fn drop(&mut self) {
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
