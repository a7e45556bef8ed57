#![deny(missing_docs)]
//! Runs tasks on a native pool and delivers their callbacks on the runtime
//! thread.
//!
//! The [`Dispatcher`] lives on the host runtime's single thread (it is
//! `!Send`). [`Dispatcher::submit`] moves a task's native step onto a
//! `tokio` blocking pool and returns immediately. Finished jobs come back
//! through a channel; the runtime thread drains it with
//! [`poll`](Dispatcher::poll), [`run_until_idle`](Dispatcher::run_until_idle)
//! or [`next`](Dispatcher::next), building each result and invoking its
//! callback exactly once.
//!
//! Callback arguments follow the host convention: `(error)` on failure,
//! `(null, result)` on success.
//!
//! No retries, no cancellation. A failed job surfaces once; resubmit a new
//! task to try again. Dropping the dispatcher abandons undelivered jobs.

mod config;

pub use config::DispatcherConfig;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::future::poll_fn;

use cvbridge_types::{Function, Job, JobState, Task, Value};
use thiserror::Error;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::mpsc;

/// Errors starting a dispatcher.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The configuration cannot produce a working pool.
    #[error("invalid dispatcher config: {0}")]
    InvalidConfig(String),

    /// The native pool could not be started.
    #[error("failed to start native pool: {0}")]
    Pool(#[from] std::io::Error),
}

/// Identifies one submitted job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    /// The numeric id. Ids increase in submission order.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// A job whose native step has finished, on its way back.
struct Completion {
    id: JobId,
    job: Job,
}

/// Submits tasks to the native pool and delivers completions on the
/// runtime thread.
pub struct Dispatcher {
    runtime: Option<Runtime>,
    handle: Handle,
    tx: mpsc::UnboundedSender<Completion>,
    rx: RefCell<mpsc::UnboundedReceiver<Completion>>,
    callbacks: RefCell<HashMap<JobId, Function>>,
    next_id: Cell<u64>,
}

impl Dispatcher {
    /// Start the native pool described by `config`.
    pub fn new(config: DispatcherConfig) -> Result<Self, DispatchError> {
        if config.native_threads == 0 {
            return Err(DispatchError::InvalidConfig(
                "native_threads must be at least 1".into(),
            ));
        }

        let mut builder = Builder::new_multi_thread();
        builder
            .worker_threads(1)
            .max_blocking_threads(config.native_threads)
            .thread_name(config.thread_name.clone());
        if let Some(bytes) = config.thread_stack_size {
            builder.thread_stack_size(bytes);
        }
        let runtime = builder.build()?;
        let handle = runtime.handle().clone();
        let (tx, rx) = mpsc::unbounded_channel();

        tracing::debug!(
            native_threads = config.native_threads,
            thread_name = %config.thread_name,
            "dispatcher started"
        );

        Ok(Self {
            runtime: Some(runtime),
            handle,
            tx,
            rx: RefCell::new(rx),
            callbacks: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
        })
    }

    /// Submit a typed task. Returns immediately.
    pub fn submit<T: Task>(&self, task: T, callback: Function) -> JobId {
        self.submit_job(Job::new(task), callback)
    }

    /// Submit a job that has not run yet. Returns immediately.
    ///
    /// # Panics
    ///
    /// If `job` is not in [`JobState::Created`].
    pub fn submit_job(&self, mut job: Job, callback: Function) -> JobId {
        assert_eq!(
            job.state(),
            JobState::Created,
            "job `{}` submitted while {}",
            job.name(),
            job.state()
        );

        let id = JobId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.callbacks.borrow_mut().insert(id, callback);

        tracing::debug!(job = %id, task = job.name(), "submitted");
        let tx = self.tx.clone();
        self.handle.spawn_blocking(move || {
            job.run_native();
            if tx.send(Completion { id, job }).is_err() {
                tracing::debug!(job = %id, "dispatcher gone; completion dropped");
            }
        });
        id
    }

    /// Jobs submitted but not yet delivered.
    pub fn pending(&self) -> usize {
        self.callbacks.borrow().len()
    }

    /// Whether every submitted job has been delivered.
    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Deliver every completion that is already available. Never blocks.
    /// Returns the number delivered.
    pub fn poll(&self) -> usize {
        let mut delivered = 0;
        loop {
            let next = self.rx.borrow_mut().try_recv();
            let Ok(completion) = next else {
                break;
            };
            self.deliver(completion);
            delivered += 1;
        }
        delivered
    }

    /// Block the runtime thread until every pending job, including jobs
    /// submitted by callbacks along the way, has been delivered. Returns
    /// the number delivered.
    ///
    /// # Panics
    ///
    /// If called from within an async execution context; use
    /// [`next`](Self::next) there.
    pub fn run_until_idle(&self) -> usize {
        let mut delivered = 0;
        while !self.is_idle() {
            let next = self.rx.borrow_mut().blocking_recv();
            let Some(completion) = next else {
                break;
            };
            self.deliver(completion);
            delivered += 1;
        }
        delivered
    }

    /// Wait for the next completion and deliver it. Returns `None`
    /// immediately when nothing is pending.
    ///
    /// For hosts that run their own single-threaded event loop.
    pub async fn next(&self) -> Option<JobId> {
        if self.is_idle() {
            return None;
        }
        let completion = poll_fn(|cx| self.rx.borrow_mut().poll_recv(cx)).await?;
        let id = completion.id;
        self.deliver(completion);
        Some(id)
    }

    fn deliver(&self, completion: Completion) {
        let Completion { id, mut job } = completion;
        let callback = self.callbacks.borrow_mut().remove(&id);
        let Some(callback) = callback else {
            tracing::warn!(job = %id, task = job.name(), "no callback registered; dropping job");
            return;
        };

        let failure = job.error().map(ToString::to_string);
        let args = match failure {
            Some(message) => {
                tracing::debug!(job = %id, task = job.name(), error = %message, "delivering failure");
                vec![Value::Error(message)]
            }
            None => {
                let result = job.build_result();
                tracing::trace!(job = %id, task = job.name(), result = %result.to_json(), "result built");
                vec![Value::Null, result]
            }
        };

        callback.call(args);
        drop(job);
        tracing::trace!(job = %id, "callback returned; job disposed");
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pending", &self.pending())
            .field("next_id", &self.next_id.get())
            .finish()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let pending = self.pending();
        if pending > 0 {
            tracing::warn!(pending, "dispatcher dropped with undelivered jobs");
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
