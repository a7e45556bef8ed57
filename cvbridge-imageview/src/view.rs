//! The `ImageView` host class.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use cvbridge_dispatch::Dispatcher;
use cvbridge_types::{BindingError, BindingSpec, Callback, HostBuffer, Typed, Value};
use image::DynamicImage;
use thiserror::Error;

use crate::encode::{self, EncodeImageTask, ImageEncoding, Packaging};

/// Why `new ImageView(path)` failed.
///
/// Construction is synchronous, so every variant surfaces to the caller.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ImageViewError {
    /// The constructor arguments did not bind.
    #[error(transparent)]
    Binding(#[from] BindingError),

    /// The file could not be read.
    #[error("Cannot read image file \"{}\": {source}", .path.display())]
    Read {
        /// Path as given by the host.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The file was read but is not a decodable image.
    #[error("Cannot decode image file \"{}\": {source}", .path.display())]
    Decode {
        /// Path as given by the host.
        path: PathBuf,
        /// Decoder failure.
        source: image::ImageError,
    },
}

/// A decoded image held on behalf of the host.
///
/// Pixels live behind an `Arc` so encoding tasks share them with the view
/// rather than copying.
pub struct ImageView {
    image: Arc<DynamicImage>,
}

impl ImageView {
    /// `new ImageView(path)`: read and decode the file synchronously.
    pub fn open(args: &[Value]) -> Result<Self, ImageViewError> {
        let (path,) = BindingSpec::new("ImageView", (Typed::<String>::new(),)).bind(args)?;
        let path = PathBuf::from(path);
        let bytes = std::fs::read(&path).map_err(|source| ImageViewError::Read {
            path: path.clone(),
            source,
        })?;
        let image = image::load_from_memory(&bytes)
            .map_err(|source| ImageViewError::Decode { path: path.clone(), source })?;
        tracing::debug!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "image view opened"
        );
        Ok(Self::from_image(image))
    }

    /// Wrap an already decoded image.
    pub fn from_image(image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    /// `width()`.
    pub fn width(&self, args: &[Value]) -> Result<Value, BindingError> {
        BindingSpec::new("width", ()).bind(args)?;
        Ok(Value::from(f64::from(self.image.width())))
    }

    /// `height()`.
    pub fn height(&self, args: &[Value]) -> Result<Value, BindingError> {
        BindingSpec::new("height", ()).bind(args)?;
        Ok(Value::from(f64::from(self.image.height())))
    }

    /// `asObject()`: `{width, height, channels, data}`, where `data` is a
    /// buffer of interleaved 8-bit samples, row-major.
    pub fn as_object(&self, args: &[Value]) -> Result<Value, BindingError> {
        BindingSpec::new("asObject", ()).bind(args)?;
        let pixels = encode::eight_bit(&self.image);
        Ok(Value::object()
            .set("width", pixels.width())
            .set("height", pixels.height())
            .set("channels", u32::from(pixels.color().channel_count()))
            .set("data", Value::Buffer(HostBuffer::new(pixels.as_bytes())))
            .build())
    }

    /// `asJpegStream(callback)`: the callback receives a JPEG buffer.
    pub fn as_jpeg_stream(
        &self,
        dispatcher: &Dispatcher,
        args: &[Value],
    ) -> Result<Value, BindingError> {
        self.submit("asJpegStream", dispatcher, args, ImageEncoding::Jpeg, Packaging::Stream)
    }

    /// `asPngStream(callback)`: the callback receives a PNG buffer.
    pub fn as_png_stream(
        &self,
        dispatcher: &Dispatcher,
        args: &[Value],
    ) -> Result<Value, BindingError> {
        self.submit("asPngStream", dispatcher, args, ImageEncoding::Png, Packaging::Stream)
    }

    /// `asJpegDataUri(callback)`: the callback receives a
    /// `data:image/jpeg;base64,...` string.
    pub fn as_jpeg_data_uri(
        &self,
        dispatcher: &Dispatcher,
        args: &[Value],
    ) -> Result<Value, BindingError> {
        self.submit("asJpegDataUri", dispatcher, args, ImageEncoding::Jpeg, Packaging::DataUri)
    }

    /// `asPngDataUri(callback)`: the callback receives a
    /// `data:image/png;base64,...` string.
    pub fn as_png_data_uri(
        &self,
        dispatcher: &Dispatcher,
        args: &[Value],
    ) -> Result<Value, BindingError> {
        self.submit("asPngDataUri", dispatcher, args, ImageEncoding::Png, Packaging::DataUri)
    }

    fn submit(
        &self,
        label: &'static str,
        dispatcher: &Dispatcher,
        args: &[Value],
        encoding: ImageEncoding,
        packaging: Packaging,
    ) -> Result<Value, BindingError> {
        let (callback,) = BindingSpec::new(label, (Callback,)).bind(args)?;
        let task = EncodeImageTask::new(self.image.clone(), encoding, packaging);
        let id = dispatcher.submit(task, callback);
        tracing::debug!(job = %id, call = label, "image encoding submitted");
        Ok(Value::Undefined)
    }
}

impl fmt::Debug for ImageView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageView")
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .field("color", &self.image.color())
            .finish()
    }
}
