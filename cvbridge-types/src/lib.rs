//! # cvbridge-types — the contract between a dynamic host and native tasks
//!
//! This crate defines everything a binding needs that does not depend on
//! an execution context:
//!
//! | Piece | Types | What it does |
//! |-------|-------|-------------|
//! | Host values | [`Value`], [`HostBuffer`], [`Function`] | The runtime-owned value model |
//! | Marshaling | [`ToDynamic`], [`FromDynamic`] | Native ⇄ dynamic conversion, per type |
//! | Binding | [`BindingSpec`], [`Overloads`], [`Param`] | Validate and convert a call's arguments |
//! | Tasks | [`Task`], [`TaskResult`], [`Job`] | Work split into a native step and a result step |
//!
//! ## Thread boundary
//!
//! [`Value`] is `!Send`. Buffers and functions are reference counted with
//! `Rc`, so the compiler rejects any task that tries to carry a host value
//! into the native execution context. Binding copies host-owned bytes into
//! [`bytes::Bytes`] before a task is constructed.
//!
//! ## Errors
//!
//! [`BindingError`] is synchronous and returned to the caller of a call
//! site. [`TaskError`] is asynchronous and only ever reaches a callback.

#![deny(missing_docs)]

pub mod binding;
pub mod error;
pub mod geometry;
pub mod marshal;
pub mod task;
pub mod value;

pub use binding::{
    ArrayOf, BindingSpec, Buffer, Callback, Overloads, Param, ParamList, StringEnum, Typed,
};
pub use error::{BindingError, MarshalError, TaskError, INTERNAL_EXCEPTION};
pub use geometry::{Mat, Point2f, Point3f, Size};
pub use marshal::{FromDynamic, ToDynamic};
pub use task::{Job, JobState, ResultDyn, Task, TaskDyn, TaskResult};
pub use value::{Function, HostBuffer, Object, ObjectBuilder, Value};
