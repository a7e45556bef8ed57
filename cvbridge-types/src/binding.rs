//! Declarative argument binding for call sites.
//!
//! A [`BindingSpec`] is an ordered tuple of [`Param`] descriptors. Binding
//! checks the argument count, then each argument left to right, and stops
//! at the first violation. Nothing is returned unless every argument bound,
//! so callers never observe a partial binding.
//!
//! ```ignore
//! let spec = BindingSpec::new(
//!     "calibrationPatternDetect",
//!     (Buffer, Typed::<Size>::new(), StringEnum::new(PatternType::LABELS), Callback),
//! );
//! let (image, size, pattern, callback) = spec.bind(args)?;
//! ```
//!
//! Call sites that accept structurally different forms list them in an
//! [`Overloads`], tried in declaration order.

use std::borrow::Cow;
use std::marker::PhantomData;

use bytes::Bytes;

use crate::error::BindingError;
use crate::marshal::FromDynamic;
use crate::value::{Function, Value};

/// One argument position: a type predicate plus conversion.
pub trait Param {
    /// The native value produced on success.
    type Native;

    /// Short description of what this position accepts.
    fn describe(&self) -> Cow<'static, str>;

    /// Check and convert the argument at `index`.
    fn bind(&self, index: usize, value: &Value) -> Result<Self::Native, BindingError>;
}

fn mismatch(index: usize, expected: &'static str, value: &Value) -> BindingError {
    BindingError::TypeMismatch {
        index,
        expected,
        actual: value.type_name(),
    }
}

/// A byte buffer, copied into task-owned storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct Buffer;

impl Param for Buffer {
    type Native = Bytes;

    fn describe(&self) -> Cow<'static, str> {
        "buffer".into()
    }

    fn bind(&self, index: usize, value: &Value) -> Result<Bytes, BindingError> {
        match value {
            Value::Buffer(buf) => Ok(Bytes::copy_from_slice(&buf.borrow())),
            other => Err(mismatch(index, "buffer", other)),
        }
    }
}

/// A function, bound as the completion callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct Callback;

impl Param for Callback {
    type Native = Function;

    fn describe(&self) -> Cow<'static, str> {
        "function".into()
    }

    fn bind(&self, index: usize, value: &Value) -> Result<Function, BindingError> {
        match value {
            Value::Function(f) => Ok(f.clone()),
            other => Err(mismatch(index, "function", other)),
        }
    }
}

/// An array whose elements each marshal to `T`.
#[derive(Debug)]
pub struct ArrayOf<T>(PhantomData<fn() -> T>);

impl<T> ArrayOf<T> {
    /// Accept an array of `T`.
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for ArrayOf<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FromDynamic> Param for ArrayOf<T> {
    type Native = Vec<T>;

    fn describe(&self) -> Cow<'static, str> {
        format!("array of {}", T::TYPE_NAME).into()
    }

    fn bind(&self, index: usize, value: &Value) -> Result<Vec<T>, BindingError> {
        if !value.is_array() {
            return Err(mismatch(index, "array", value));
        }
        Vec::<T>::from_dynamic(value).map_err(|source| BindingError::Marshal { index, source })
    }
}

/// Any value that marshals to `T`, e.g. a [`Size`](crate::Size) given as
/// two numeric fields.
#[derive(Debug)]
pub struct Typed<T>(PhantomData<fn() -> T>);

impl<T> Typed<T> {
    /// Accept anything `T` can be marshaled from.
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Typed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: FromDynamic> Param for Typed<T> {
    type Native = T;

    fn describe(&self) -> Cow<'static, str> {
        T::TYPE_NAME.into()
    }

    fn bind(&self, index: usize, value: &Value) -> Result<T, BindingError> {
        T::from_dynamic(value).map_err(|source| BindingError::Marshal { index, source })
    }
}

/// A string drawn from a closed, case-sensitive set of labels, each mapped
/// to a native constant.
#[derive(Debug)]
pub struct StringEnum<E: 'static> {
    options: &'static [(&'static str, E)],
}

impl<E: 'static> StringEnum<E> {
    /// Accept exactly these labels.
    pub fn new(options: &'static [(&'static str, E)]) -> Self {
        Self { options }
    }

    /// The accepted labels, in declaration order.
    pub fn labels(&self) -> Vec<&'static str> {
        self.options.iter().map(|(label, _)| *label).collect()
    }
}

impl<E: Copy + 'static> Param for StringEnum<E> {
    type Native = E;

    fn describe(&self) -> Cow<'static, str> {
        format!("one of {}", self.labels().join(", ")).into()
    }

    fn bind(&self, index: usize, value: &Value) -> Result<E, BindingError> {
        let Value::String(s) = value else {
            return Err(mismatch(index, "string", value));
        };
        self.options
            .iter()
            .find(|(label, _)| *label == s.as_str())
            .map(|(_, constant)| *constant)
            .ok_or_else(|| BindingError::UnrecognizedOption {
                index,
                value: s.clone(),
                allowed: self.labels(),
            })
    }
}

/// An ordered list of [`Param`]s. Implemented for `()` and tuples of one to six.
pub trait ParamList {
    /// Required argument count.
    const ARITY: usize;

    /// Tuple of bound native values.
    type Bound;

    /// Bind every position left to right, stopping at the first failure.
    /// `args.len()` has already been checked against [`ARITY`](Self::ARITY).
    fn bind_all(&self, args: &[Value]) -> Result<Self::Bound, BindingError>;

    /// Per-position descriptions.
    fn describe_all(&self) -> Vec<Cow<'static, str>>;
}

macro_rules! impl_param_list {
    ($arity:expr; $($P:ident $idx:tt),+) => {
        impl<$($P: Param),+> ParamList for ($($P,)+) {
            const ARITY: usize = $arity;
            type Bound = ($($P::Native,)+);

            fn bind_all(&self, args: &[Value]) -> Result<Self::Bound, BindingError> {
                Ok(($(self.$idx.bind($idx, &args[$idx])?,)+))
            }

            fn describe_all(&self) -> Vec<Cow<'static, str>> {
                vec![$(self.$idx.describe()),+]
            }
        }
    };
}

/// Accessors that take no arguments.
impl ParamList for () {
    const ARITY: usize = 0;
    type Bound = ();

    fn bind_all(&self, _args: &[Value]) -> Result<(), BindingError> {
        Ok(())
    }

    fn describe_all(&self) -> Vec<Cow<'static, str>> {
        Vec::new()
    }
}

impl_param_list!(1; A 0);
impl_param_list!(2; A 0, B 1);
impl_param_list!(3; A 0, B 1, C 2);
impl_param_list!(4; A 0, B 1, C 2, D 3);
impl_param_list!(5; A 0, B 1, C 2, D 3, E 4);
impl_param_list!(6; A 0, B 1, C 2, D 3, E 4, F 5);

/// The expected shape of one call form.
///
/// Immutable once built; construct it once per call site and reuse it.
#[derive(Debug)]
pub struct BindingSpec<P> {
    label: &'static str,
    params: P,
}

impl<P: ParamList> BindingSpec<P> {
    /// Describe a call form. `label` names the call site in logs.
    pub fn new(label: &'static str, params: P) -> Self {
        Self { label, params }
    }

    /// The call site this spec belongs to.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Required argument count.
    pub fn arity(&self) -> usize {
        P::ARITY
    }

    /// Human-readable signature, e.g. `calibrationPatternDetect(buffer, ...)`.
    pub fn signature(&self) -> String {
        format!("{}({})", self.label, self.params.describe_all().join(", "))
    }

    /// Validate and convert `args`.
    pub fn bind(&self, args: &[Value]) -> Result<P::Bound, BindingError> {
        if args.len() != P::ARITY {
            tracing::trace!(
                call = self.label,
                expected = P::ARITY,
                actual = args.len(),
                "argument count mismatch"
            );
            return Err(BindingError::ArgumentCount {
                expected: P::ARITY,
                actual: args.len(),
            });
        }
        let bound = self.params.bind_all(args);
        if let Err(err) = &bound {
            tracing::trace!(call = self.label, error = %err, "binding failed");
        }
        bound
    }
}

type Form<'a, T> = Box<dyn Fn(&[Value]) -> Result<T, BindingError> + 'a>;

/// Alternative call forms for one logical operation.
///
/// Forms are tried in the order they were added; the first that binds
/// completely wins. When none binds, the error from the last form tried is
/// returned.
pub struct Overloads<'a, T> {
    label: &'static str,
    first: Form<'a, T>,
    rest: Vec<Form<'a, T>>,
}

impl<'a, T> Overloads<'a, T> {
    /// Start with the highest-priority form. `build` maps its bound tuple
    /// into the call-form value.
    pub fn new<P>(spec: BindingSpec<P>, build: impl Fn(P::Bound) -> T + 'a) -> Self
    where
        P: ParamList + 'a,
    {
        Self {
            label: spec.label,
            first: Self::form_of(spec, build),
            rest: Vec::new(),
        }
    }

    /// Add a lower-priority form.
    #[must_use]
    pub fn or<P>(mut self, spec: BindingSpec<P>, build: impl Fn(P::Bound) -> T + 'a) -> Self
    where
        P: ParamList + 'a,
    {
        self.rest.push(Self::form_of(spec, build));
        self
    }

    fn form_of<P>(spec: BindingSpec<P>, build: impl Fn(P::Bound) -> T + 'a) -> Form<'a, T>
    where
        P: ParamList + 'a,
    {
        Box::new(move |args: &[Value]| spec.bind(args).map(&build))
    }

    /// Number of declared forms.
    pub fn len(&self) -> usize {
        1 + self.rest.len()
    }

    /// Always `false`: an overload set has at least one form.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Bind `args` against each form in order.
    pub fn bind(&self, args: &[Value]) -> Result<T, BindingError> {
        let mut result = (self.first)(args);
        for (n, form) in self.rest.iter().enumerate() {
            if result.is_ok() {
                break;
            }
            tracing::trace!(call = self.label, form = n + 1, "trying next call form");
            result = form(args);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Size;
    use crate::value::HostBuffer;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Mode {
        Fast,
        Slow,
    }

    const MODES: &[(&str, Mode)] = &[("FAST", Mode::Fast), ("SLOW", Mode::Slow)];

    fn size(w: i32, h: i32) -> Value {
        Value::object().set("width", w).set("height", h).build()
    }

    #[test]
    fn buffer_is_copied() {
        let host = HostBuffer::new(vec![1, 2, 3]);
        let bytes = Buffer.bind(0, &Value::Buffer(host.clone())).unwrap();
        host.with_mut(|b| b[0] = 9);
        assert_eq!(&bytes[..], &[1, 2, 3]);
    }

    #[test]
    fn first_violation_wins() {
        let spec = BindingSpec::new("op", (Buffer, Typed::<Size>::new(), Callback));
        let args = [Value::Null, Value::Null, Value::Null];
        assert_eq!(
            spec.bind(&args).unwrap_err(),
            BindingError::TypeMismatch {
                index: 0,
                expected: "buffer",
                actual: "null"
            }
        );
    }

    #[test]
    fn count_is_checked_before_types() {
        let spec = BindingSpec::new("op", (Buffer, Callback));
        let err = spec.bind(&[Value::Null]).unwrap_err();
        assert_eq!(err, BindingError::ArgumentCount { expected: 2, actual: 1 });
    }

    #[test]
    fn string_enum_is_case_sensitive() {
        let p = StringEnum::new(MODES);
        assert_eq!(p.bind(0, &Value::from("SLOW")), Ok(Mode::Slow));
        assert!(matches!(
            p.bind(0, &Value::from("slow")),
            Err(BindingError::UnrecognizedOption { .. })
        ));
        assert!(matches!(
            p.bind(0, &Value::Number(1.0)),
            Err(BindingError::TypeMismatch { expected: "string", .. })
        ));
    }

    #[test]
    fn array_predicate_precedes_marshal() {
        let p = ArrayOf::<String>::new();
        assert!(matches!(
            p.bind(1, &Value::from("a.png")),
            Err(BindingError::TypeMismatch { index: 1, expected: "array", .. })
        ));
        let err = p
            .bind(1, &Value::from(vec![Value::from("a.png"), Value::Null]))
            .unwrap_err();
        let BindingError::Marshal { index, source } = err else {
            panic!("expected marshal error");
        };
        assert_eq!(index, 1);
        assert_eq!(source.path, "[1]");
    }

    #[test]
    fn signature_lists_positions() {
        let spec = BindingSpec::new("run", (Typed::<Size>::new(), StringEnum::new(MODES), Callback));
        assert_eq!(
            spec.signature(),
            format!("run({}, one of FAST, SLOW, function)", Size::TYPE_NAME)
        );
    }

    #[derive(Debug, PartialEq)]
    enum Call {
        Short(Mode),
        Long(Size, Mode),
    }

    fn overloads() -> Overloads<'static, Call> {
        Overloads::new(
            BindingSpec::new("op", (StringEnum::new(MODES), Callback)),
            |(mode, _)| Call::Short(mode),
        )
        .or(
            BindingSpec::new("op", (Typed::<Size>::new(), StringEnum::new(MODES), Callback)),
            |(size, mode, _)| Call::Long(size, mode),
        )
    }

    #[test]
    fn overloads_pick_first_matching_form() {
        let cb = Value::Function(Function::new(|_| {}));
        let set = overloads();
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.bind(&[Value::from("FAST"), cb.clone()]),
            Ok(Call::Short(Mode::Fast))
        );
        assert_eq!(
            set.bind(&[size(9, 6), Value::from("SLOW"), cb]),
            Ok(Call::Long(Size::new(9, 6), Mode::Slow))
        );
    }

    #[test]
    fn overloads_report_last_form_error() {
        let err = overloads().bind(&[Value::from("FAST")]).unwrap_err();
        assert_eq!(err, BindingError::ArgumentCount { expected: 3, actual: 1 });
    }
}
