//! Type-indexed conversion between native values and host values.
//!
//! Each supported native type implements [`ToDynamic`] (runtime thread
//! only, since it allocates host values) and [`FromDynamic`].
//!
//! # Numeric coercion
//!
//! The host has a single `f64` number type. Integer targets use the host's
//! modular coercion: non-finite numbers become 0, everything else is
//! truncated toward zero and wrapped modulo 2^32. There is no overflow
//! error, so `2^31` read as `i32` is `-2^31`. Booleans coerce to 0 or 1.
//! `f32` targets narrow with `as`. Any other host type is a [`MarshalError`].

use crate::error::MarshalError;
use crate::geometry::{Mat, Point2f, Point3f, Size};
use crate::value::{Object, Value};

/// Native → host.
pub trait ToDynamic {
    /// Build the host representation.
    fn to_dynamic(&self) -> Value;
}

/// Host → native.
pub trait FromDynamic: Sized {
    /// Name used in error messages.
    const TYPE_NAME: &'static str;

    /// Convert, copying anything the host owns.
    fn from_dynamic(value: &Value) -> Result<Self, MarshalError>;
}

const TWO_POW_32: f64 = 4_294_967_296.0;

/// The host's `ToUint32`.
pub fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(TWO_POW_32) as u32
}

/// The host's `ToInt32`.
pub fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

fn number(value: &Value, expected: &str) -> Result<f64, MarshalError> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => Err(MarshalError::new(expected, other.type_name())),
    }
}

/// A size dimension: a finite host number, then `ToInt32`. Booleans and
/// non-finite numbers are rejected rather than coerced to 0 or 1.
fn dimension(value: &Value) -> Result<i32, MarshalError> {
    const EXPECTED: &str = "finite number";
    if !value.is_number() {
        return Err(MarshalError::new(EXPECTED, value.type_name()));
    }
    match value.as_f64() {
        Some(n) if n.is_finite() => Ok(to_int32(n)),
        Some(n) if n.is_nan() => Err(MarshalError::new(EXPECTED, "NaN")),
        _ => Err(MarshalError::new(EXPECTED, "infinite number")),
    }
}

fn field<T: FromDynamic>(fields: &Object, name: &str) -> Result<T, MarshalError> {
    let value = fields.get(name).unwrap_or(&Value::Undefined);
    T::from_dynamic(value).map_err(|e| e.at_field(name))
}

fn elements<'a>(value: &'a Value, expected: &str) -> Result<&'a [Value], MarshalError> {
    value
        .as_array()
        .ok_or_else(|| MarshalError::new(expected, value.type_name()))
}

// --- Primitives ---

impl ToDynamic for Value {
    fn to_dynamic(&self) -> Value {
        self.clone()
    }
}

impl ToDynamic for bool {
    fn to_dynamic(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromDynamic for bool {
    const TYPE_NAME: &'static str = "boolean";

    fn from_dynamic(value: &Value) -> Result<Self, MarshalError> {
        value
            .as_bool()
            .ok_or_else(|| MarshalError::new(Self::TYPE_NAME, value.type_name()))
    }
}

impl ToDynamic for i32 {
    fn to_dynamic(&self) -> Value {
        Value::Number(f64::from(*self))
    }
}

impl FromDynamic for i32 {
    const TYPE_NAME: &'static str = "int32";

    fn from_dynamic(value: &Value) -> Result<Self, MarshalError> {
        number(value, Self::TYPE_NAME).map(to_int32)
    }
}

impl ToDynamic for u32 {
    fn to_dynamic(&self) -> Value {
        Value::Number(f64::from(*self))
    }
}

impl FromDynamic for u32 {
    const TYPE_NAME: &'static str = "uint32";

    fn from_dynamic(value: &Value) -> Result<Self, MarshalError> {
        number(value, Self::TYPE_NAME).map(to_uint32)
    }
}

impl ToDynamic for f32 {
    fn to_dynamic(&self) -> Value {
        Value::Number(f64::from(*self))
    }
}

impl FromDynamic for f32 {
    const TYPE_NAME: &'static str = "float";

    fn from_dynamic(value: &Value) -> Result<Self, MarshalError> {
        number(value, Self::TYPE_NAME).map(|n| n as f32)
    }
}

impl ToDynamic for f64 {
    fn to_dynamic(&self) -> Value {
        Value::Number(*self)
    }
}

impl FromDynamic for f64 {
    const TYPE_NAME: &'static str = "number";

    fn from_dynamic(value: &Value) -> Result<Self, MarshalError> {
        number(value, Self::TYPE_NAME)
    }
}

impl ToDynamic for str {
    fn to_dynamic(&self) -> Value {
        Value::String(self.to_owned())
    }
}

impl ToDynamic for String {
    fn to_dynamic(&self) -> Value {
        Value::String(self.clone())
    }
}

impl FromDynamic for String {
    const TYPE_NAME: &'static str = "string";

    fn from_dynamic(value: &Value) -> Result<Self, MarshalError> {
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| MarshalError::new(Self::TYPE_NAME, value.type_name()))
    }
}

// --- Containers ---

impl<T: ToDynamic + ?Sized> ToDynamic for &T {
    fn to_dynamic(&self) -> Value {
        (**self).to_dynamic()
    }
}

impl<T: ToDynamic> ToDynamic for [T] {
    fn to_dynamic(&self) -> Value {
        Value::Array(self.iter().map(ToDynamic::to_dynamic).collect())
    }
}

impl<T: ToDynamic> ToDynamic for Vec<T> {
    fn to_dynamic(&self) -> Value {
        self.as_slice().to_dynamic()
    }
}

impl<T: FromDynamic> FromDynamic for Vec<T> {
    const TYPE_NAME: &'static str = "array";

    fn from_dynamic(value: &Value) -> Result<Self, MarshalError> {
        elements(value, Self::TYPE_NAME)?
            .iter()
            .enumerate()
            .map(|(i, item)| T::from_dynamic(item).map_err(|e| e.at_index(i)))
            .collect()
    }
}

impl<T: ToDynamic> ToDynamic for Option<T> {
    fn to_dynamic(&self) -> Value {
        self.as_ref().map_or(Value::Undefined, ToDynamic::to_dynamic)
    }
}

// --- Geometry ---

impl ToDynamic for Point2f {
    fn to_dynamic(&self) -> Value {
        Value::object().set("x", self.x).set("y", self.y).build()
    }
}

impl FromDynamic for Point2f {
    const TYPE_NAME: &'static str = "point ({x, y})";

    fn from_dynamic(value: &Value) -> Result<Self, MarshalError> {
        let fields = value
            .as_object()
            .ok_or_else(|| MarshalError::new(Self::TYPE_NAME, value.type_name()))?;
        Ok(Self::new(field(fields, "x")?, field(fields, "y")?))
    }
}

impl ToDynamic for Point3f {
    fn to_dynamic(&self) -> Value {
        Value::object()
            .set("x", self.x)
            .set("y", self.y)
            .set("z", self.z)
            .build()
    }
}

impl FromDynamic for Point3f {
    const TYPE_NAME: &'static str = "point ({x, y, z})";

    fn from_dynamic(value: &Value) -> Result<Self, MarshalError> {
        let fields = value
            .as_object()
            .ok_or_else(|| MarshalError::new(Self::TYPE_NAME, value.type_name()))?;
        Ok(Self::new(
            field(fields, "x")?,
            field(fields, "y")?,
            field(fields, "z")?,
        ))
    }
}

impl ToDynamic for Size {
    fn to_dynamic(&self) -> Value {
        Value::object()
            .set("width", self.width)
            .set("height", self.height)
            .build()
    }
}

impl FromDynamic for Size {
    const TYPE_NAME: &'static str = "size ({width, height} or [width, height])";

    fn from_dynamic(value: &Value) -> Result<Self, MarshalError> {
        match value {
            Value::Object(fields) => {
                let dim = |name: &str| {
                    dimension(fields.get(name).unwrap_or(&Value::Undefined))
                        .map_err(|e| e.at_field(name))
                };
                Ok(Self::new(dim("width")?, dim("height")?))
            }
            Value::Array(items) if items.len() == 2 => {
                let dim = |i: usize| dimension(&items[i]).map_err(|e| e.at_index(i));
                Ok(Self::new(dim(0)?, dim(1)?))
            }
            Value::Array(items) => Err(MarshalError::new(
                Self::TYPE_NAME,
                format!("array of length {}", items.len()),
            )),
            other => Err(MarshalError::new(Self::TYPE_NAME, other.type_name())),
        }
    }
}

impl ToDynamic for Mat {
    fn to_dynamic(&self) -> Value {
        Value::Array(self.row_iter().map(ToDynamic::to_dynamic).collect())
    }
}

impl FromDynamic for Mat {
    const TYPE_NAME: &'static str = "matrix (array of numeric rows)";

    fn from_dynamic(value: &Value) -> Result<Self, MarshalError> {
        let rows: Vec<Vec<f64>> = Vec::from_dynamic(value).map_err(|mut e| {
            if e.path.is_empty() {
                e.expected = Self::TYPE_NAME.to_string();
            }
            e
        })?;
        let cols = rows.first().map_or(0, Vec::len);
        if let Some(r) = rows.iter().position(|row| row.len() != cols) {
            return Err(MarshalError::new(
                format!("row of {cols} numbers"),
                format!("row of {} numbers", rows[r].len()),
            )
            .at_index(r));
        }
        Mat::from_rows(rows).ok_or_else(|| MarshalError::new(Self::TYPE_NAME, "ragged rows"))
    }
}
