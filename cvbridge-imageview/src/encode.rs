//! Encoding tasks behind the `as*Stream` and `as*DataUri` call sites.

use std::borrow::Cow;
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use cvbridge_types::{HostBuffer, Task, TaskError, TaskResult, Value};
use image::{ColorType, DynamicImage, ImageFormat};

/// Target container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageEncoding {
    /// Baseline JPEG; alpha is dropped.
    Jpeg,
    /// Lossless PNG.
    Png,
}

impl ImageEncoding {
    /// MIME type used in data URIs.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    fn format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
        }
    }
}

impl fmt::Display for ImageEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        })
    }
}

/// How encoded bytes are handed to the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Packaging {
    /// A host buffer holding the raw file bytes.
    Stream,
    /// A `data:<mime>;base64,...` string.
    DataUri,
}

/// Encodes a shared image off the runtime thread.
pub struct EncodeImageTask {
    image: Arc<DynamicImage>,
    encoding: ImageEncoding,
    packaging: Packaging,
}

impl EncodeImageTask {
    /// `image` is shared with the view that submitted the task, never copied.
    pub fn new(image: Arc<DynamicImage>, encoding: ImageEncoding, packaging: Packaging) -> Self {
        Self {
            image,
            encoding,
            packaging,
        }
    }
}

/// Outcome of [`EncodeImageTask`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedImage {
    /// Raw encoded bytes.
    Stream(Vec<u8>),
    /// A complete data URI.
    DataUri(String),
}

impl TaskResult for EncodedImage {
    fn build_result(self) -> Value {
        match self {
            Self::Stream(bytes) => Value::Buffer(HostBuffer::new(bytes)),
            Self::DataUri(uri) => Value::String(uri),
        }
    }
}

impl Task for EncodeImageTask {
    const NAME: &'static str = "encode_image";
    type Output = EncodedImage;

    fn run_native(&mut self) -> Result<EncodedImage, TaskError> {
        let bytes = encode(&self.image, self.encoding)?;
        tracing::debug!(
            encoding = %self.encoding,
            len = bytes.len(),
            "image encoded"
        );
        Ok(match self.packaging {
            Packaging::Stream => EncodedImage::Stream(bytes),
            Packaging::DataUri => EncodedImage::DataUri(data_uri(self.encoding, &bytes)),
        })
    }
}

/// Encode `image` into `encoding`'s container.
pub fn encode(image: &DynamicImage, encoding: ImageEncoding) -> Result<Vec<u8>, TaskError> {
    let prepared = match encoding {
        ImageEncoding::Jpeg => without_alpha(eight_bit(image)),
        ImageEncoding::Png => eight_bit(image),
    };
    let mut out = Cursor::new(Vec::new());
    prepared
        .write_to(&mut out, encoding.format())
        .map_err(|err| {
            tracing::debug!(%encoding, error = %err, "image encoding failed");
            TaskError::domain("Cannot encode image")
        })?;
    Ok(out.into_inner())
}

/// `data:<mime>;base64,<payload>`.
pub fn data_uri(encoding: ImageEncoding, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        encoding.mime_type(),
        BASE64_STANDARD.encode(bytes)
    )
}

/// The same channels at 8 bits per sample.
pub(crate) fn eight_bit(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image.color() {
        ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => {
            Cow::Borrowed(image)
        }
        color => Cow::Owned(match (color.has_color(), color.has_alpha()) {
            (false, false) => DynamicImage::ImageLuma8(image.to_luma8()),
            (false, true) => DynamicImage::ImageLumaA8(image.to_luma_alpha8()),
            (true, false) => DynamicImage::ImageRgb8(image.to_rgb8()),
            (true, true) => DynamicImage::ImageRgba8(image.to_rgba8()),
        }),
    }
}

fn without_alpha(image: Cow<'_, DynamicImage>) -> Cow<'_, DynamicImage> {
    let color = image.color();
    if !color.has_alpha() {
        return image;
    }
    Cow::Owned(if color.has_color() {
        DynamicImage::ImageRgb8(image.to_rgb8())
    } else {
        DynamicImage::ImageLuma8(image.to_luma8())
    })
}
