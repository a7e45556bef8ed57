//! Configuration for the native execution context.

use std::num::NonZeroUsize;

/// Default name prefix for native worker threads.
const DEFAULT_THREAD_NAME: &str = "cvbridge-native";

/// Static configuration for a [`Dispatcher`](crate::Dispatcher).
///
/// # Example
///
/// ```
/// use cvbridge_dispatch::DispatcherConfig;
///
/// let config = DispatcherConfig::default()
///     .native_threads(2)
///     .thread_name("calib-worker");
/// assert_eq!(config.native_threads, 2);
/// ```
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Maximum number of tasks executing natively at once.
    /// Defaults to the machine's available parallelism.
    pub native_threads: usize,

    /// Name given to native worker threads.
    pub thread_name: String,

    /// Stack size for native worker threads. `None` keeps the platform default.
    pub thread_stack_size: Option<usize>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            native_threads: std::thread::available_parallelism().map_or(1, NonZeroUsize::get),
            thread_name: DEFAULT_THREAD_NAME.into(),
            thread_stack_size: None,
        }
    }
}

impl DispatcherConfig {
    /// Override the native pool size.
    #[must_use]
    pub fn native_threads(mut self, n: usize) -> Self {
        self.native_threads = n;
        self
    }

    /// Override the worker thread name.
    #[must_use]
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Override the worker stack size.
    #[must_use]
    pub fn thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = Some(bytes);
        self
    }
}
