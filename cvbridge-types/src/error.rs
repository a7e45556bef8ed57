//! Error types for marshaling, binding and task execution.

use thiserror::Error;

/// Message used for any fault caught while a task ran natively.
pub const INTERNAL_EXCEPTION: &str = "Internal exception";

/// A dynamic value could not be converted to the requested native type.
///
/// `path` locates the failing element inside a composite, e.g. `[3].x`
/// for the `x` field of the fourth point. It is empty for top-level values.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}expected {expected}, got {actual}", location(.path))]
pub struct MarshalError {
    /// Location of the failing element, innermost last.
    pub path: String,
    /// What the converter wanted.
    pub expected: String,
    /// What it found.
    pub actual: String,
}

fn location(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!("at {path}: ")
    }
}

impl MarshalError {
    /// A top-level mismatch.
    pub fn new(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            path: String::new(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Prefix the path with an array index.
    #[must_use]
    pub fn at_index(mut self, index: usize) -> Self {
        self.path.insert_str(0, &format!("[{index}]"));
        self
    }

    /// Prefix the path with an object field.
    #[must_use]
    pub fn at_field(mut self, field: &str) -> Self {
        self.path.insert_str(0, &format!(".{field}"));
        self
    }
}

/// A call's arguments did not satisfy its binding spec.
///
/// Surfaced synchronously to the caller of a call site, never through a
/// callback. Only the first violation is reported.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindingError {
    /// The call supplied a different number of arguments than declared.
    #[error("unexpected argument count: expected {expected}, got {actual}")]
    ArgumentCount {
        /// Declared count.
        expected: usize,
        /// Supplied count.
        actual: usize,
    },

    /// An argument failed its type predicate.
    #[error("argument {index}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Zero-based argument position.
        index: usize,
        /// The predicate that failed, e.g. `buffer`.
        expected: &'static str,
        /// Host type name of the supplied value.
        actual: &'static str,
    },

    /// A string argument did not match any declared label.
    #[error(
        "argument {index}: unrecognized option {value:?} (expected one of: {})",
        .allowed.join(", ")
    )]
    UnrecognizedOption {
        /// Zero-based argument position.
        index: usize,
        /// The string that was supplied.
        value: String,
        /// Labels the call site accepts.
        allowed: Vec<&'static str>,
    },

    /// An argument passed its predicate but could not be marshaled.
    #[error("argument {index}: {source}")]
    Marshal {
        /// Zero-based argument position.
        index: usize,
        /// The element-level failure.
        #[source]
        source: MarshalError,
    },
}

/// A task's native step did not produce a result.
///
/// Delivered to the callback's error channel.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskError {
    /// The operation cannot proceed with these inputs (e.g. an undecodable image).
    #[error("{0}")]
    Domain(String),

    /// An unexpected fault during native execution.
    #[error("{0}")]
    Internal(String),
}

impl TaskError {
    /// A domain failure with a precise message.
    pub fn domain(message: impl Into<String>) -> Self {
        Self::Domain(message.into())
    }

    /// The generic internal failure.
    pub fn internal() -> Self {
        Self::Internal(INTERNAL_EXCEPTION.to_string())
    }

    /// Whether this was an unexpected fault rather than a domain failure.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}
