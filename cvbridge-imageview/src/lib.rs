#![deny(missing_docs)]
//! The `ImageView` host class: a decoded image with synchronous accessors
//! and asynchronous encoders.
//!
//! | Call | Arguments | Returns | Callback result |
//! |------|-----------|---------|-----------------|
//! | `new ImageView` | path | view, or a synchronous error | |
//! | `width`, `height` | | number | |
//! | `asObject` | | `{width, height, channels, data}` | |
//! | `asJpegStream`, `asPngStream` | callback | `undefined` | buffer |
//! | `asJpegDataUri`, `asPngDataUri` | callback | `undefined` | `data:` URI string |

pub mod encode;
pub mod view;

pub use encode::{EncodeImageTask, EncodedImage, ImageEncoding, Packaging, data_uri};
pub use view::{ImageView, ImageViewError};
