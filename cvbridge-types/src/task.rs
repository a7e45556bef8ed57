//! Tasks: one asynchronous unit of work spanning both execution contexts.
//!
//! A [`Task`] owns its inputs. [`Task::run_native`] runs on a native worker
//! and must not touch host values. Its output is a [`TaskResult`] that turns
//! into a host [`Value`] back on the runtime thread. Because `Value` is
//! `!Send`, neither a task nor its output can smuggle one across.
//!
//! The task itself stays alive inside its [`Job`] until the job is dropped,
//! which the dispatcher does only after the callback has returned.
//!
//! [`Job`] wraps an erased task in the state machine the dispatcher drives:
//!
//! ```text
//! Created ──run_native──▶ Running ──▶ Succeeded ──build_result──▶ Consumed
//!                                 └─▶ Failed
//! ```

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::error::TaskError;
use crate::value::Value;

/// Strongly-typed task. Implement this for each native operation.
///
/// The blanket impl of [`TaskDyn`] erases it for the dispatcher.
///
/// # Example
///
/// ```
/// use cvbridge_types::{Task, TaskError, TaskResult, Value};
///
/// struct Sum(Vec<f64>);
/// struct Total(f64);
///
/// impl TaskResult for Total {
///     fn build_result(self) -> Value {
///         Value::object().set("total", self.0).build()
///     }
/// }
///
/// impl Task for Sum {
///     const NAME: &'static str = "sum";
///     type Output = Total;
///
///     fn run_native(&mut self) -> Result<Total, TaskError> {
///         if self.0.is_empty() {
///             return Err(TaskError::domain("nothing to add"));
///         }
///         Ok(Total(self.0.iter().sum()))
///     }
/// }
/// ```
pub trait Task: Send + 'static {
    /// Name used in logs.
    const NAME: &'static str;

    /// What the native step produces.
    type Output: TaskResult;

    /// The native step. Runs once, off the runtime thread, and may block
    /// for as long as the computation takes. Inputs needed only here can be
    /// moved out with `std::mem::take`.
    fn run_native(&mut self) -> Result<Self::Output, TaskError>;
}

/// Native output that can become a host value.
pub trait TaskResult: Send + 'static {
    /// Build the callback's result. Runs once, on the runtime thread, and
    /// must not do further native computation.
    fn build_result(self) -> Value;
}

/// Type-erased [`Task`]. Blanket-implemented for all `Task` impls.
pub trait TaskDyn: Send {
    /// The task's name.
    fn name(&self) -> &'static str;

    /// Run the native step, erasing the output type.
    fn run_native_dyn(&mut self) -> Result<Box<dyn ResultDyn>, TaskError>;
}

/// Type-erased [`TaskResult`].
pub trait ResultDyn: Send {
    /// Build the host value.
    fn build_result_dyn(self: Box<Self>) -> Value;
}

impl<T: Task> TaskDyn for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn run_native_dyn(&mut self) -> Result<Box<dyn ResultDyn>, TaskError> {
        let output = self.run_native()?;
        Ok(Box::new(output))
    }
}

impl<R: TaskResult> ResultDyn for R {
    fn build_result_dyn(self: Box<Self>) -> Value {
        (*self).build_result()
    }
}

/// Where a [`Job`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Constructed, not yet run.
    Created,
    /// The native step is executing.
    Running,
    /// The native step produced an output that has not been built yet.
    Succeeded,
    /// The native step recorded an error.
    Failed,
    /// The result value has been built.
    Consumed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Consumed => "consumed",
        };
        f.write_str(s)
    }
}

/// A single-use erased task plus its output or error slot.
///
/// Calling [`run_native`](Job::run_native) twice, or
/// [`build_result`](Job::build_result) in any state other than
/// [`JobState::Succeeded`], is a programming error and panics.
pub struct Job {
    name: &'static str,
    state: JobState,
    task: Box<dyn TaskDyn>,
    output: Option<Box<dyn ResultDyn>>,
    error: Option<TaskError>,
}

impl Job {
    /// Wrap a typed task.
    pub fn new<T: Task>(task: T) -> Self {
        Self::from_dyn(Box::new(task))
    }

    /// Wrap an already-erased task.
    pub fn from_dyn(task: Box<dyn TaskDyn>) -> Self {
        Self {
            name: task.name(),
            state: JobState::Created,
            task,
            output: None,
            error: None,
        }
    }

    /// The wrapped task's name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> JobState {
        self.state
    }

    /// The recorded error, if the native step failed.
    pub fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    /// Execute the native step, recording its output or error.
    ///
    /// A panic inside the task is caught and recorded as
    /// [`TaskError::internal`].
    pub fn run_native(&mut self) {
        assert_eq!(
            self.state,
            JobState::Created,
            "job `{}` run while {}",
            self.name,
            self.state
        );
        self.state = JobState::Running;
        tracing::trace!(task = self.name, "native step started");

        let task = &mut self.task;
        match catch_unwind(AssertUnwindSafe(|| task.run_native_dyn())) {
            Ok(Ok(output)) => {
                self.output = Some(output);
                self.state = JobState::Succeeded;
            }
            Ok(Err(err)) => {
                tracing::debug!(task = self.name, error = %err, "native step failed");
                self.error = Some(err);
                self.state = JobState::Failed;
            }
            Err(_) => {
                tracing::warn!(task = self.name, "native step panicked");
                self.error = Some(TaskError::internal());
                self.state = JobState::Failed;
            }
        }
    }

    /// Build the host result from a successful native step.
    pub fn build_result(&mut self) -> Value {
        assert_eq!(
            self.state,
            JobState::Succeeded,
            "job `{}` built while {}",
            self.name,
            self.state
        );
        let Some(output) = self.output.take() else {
            unreachable!("succeeded job `{}` has no output", self.name);
        };
        self.state = JobState::Consumed;
        output.build_result_dyn()
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("error", &self.error)
            .finish()
    }
}
